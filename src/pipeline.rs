use std::sync::Arc;

use crate::data::Post;
use crate::errors::PipelineError;
use crate::grid::RegionGrid;
use crate::lexicon::Lexicon;
use crate::types::{RegionId, Token, Weight};

/// Rewrites one token. Mappers run whole-list-at-a-time in
/// registration order: every token passes through mapper N before any
/// token reaches mapper N+1.
pub type TokenMapper = Arc<dyn Fn(&str) -> Token + Send + Sync + 'static>;

/// Accepts or rejects one token. Filters are ANDed in registration
/// order: a token survives only if every filter accepts it.
pub type TokenFilter = Arc<dyn Fn(&str) -> bool + Send + Sync + 'static>;

/// Policy for a token that survived filtering but has no lexicon entry.
///
/// The deployed filter list should guarantee this never happens (see
/// [`filters::in_lexicon`]); when it does anyway, it is a configuration
/// problem, not a data problem.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MissingTokenPolicy {
    /// Fail that record's reduction with `MissingToken`. The driver
    /// counts these; they are never silently dropped.
    #[default]
    Fail,
    /// Score the token as weight zero.
    ScoreZero,
}

/// Result of pushing one post through the pipeline.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    /// The post landed in a region and contributed a score.
    Scored {
        /// Region the post's coordinate classified into.
        region: RegionId,
        /// Sum of lexicon weights over the surviving tokens.
        score: Weight,
    },
    /// The coordinate matched no region: a drop signal, not an error.
    Unclassified,
}

/// Per-record transform: tokenize, map, filter, classify, reduce.
///
/// Immutable after configuration and free of interior mutability, so a
/// single instance is safe to invoke concurrently from every worker
/// against the same shared lexicon and grid.
pub struct PostPipeline {
    lexicon: Arc<Lexicon>,
    grid: Arc<RegionGrid>,
    mappers: Vec<TokenMapper>,
    filters: Vec<TokenFilter>,
    missing_tokens: MissingTokenPolicy,
}

impl PostPipeline {
    /// Create a pipeline with no mappers or filters configured.
    pub fn new(lexicon: Arc<Lexicon>, grid: Arc<RegionGrid>) -> Self {
        Self {
            lexicon,
            grid,
            mappers: Vec::new(),
            filters: Vec::new(),
            missing_tokens: MissingTokenPolicy::default(),
        }
    }

    /// Append a token mapper. Registration order is execution order.
    pub fn with_mapper(mut self, mapper: TokenMapper) -> Self {
        self.mappers.push(mapper);
        self
    }

    /// Append a token filter. Registration order is execution order.
    pub fn with_filter(mut self, filter: TokenFilter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Override the missing-token policy (default: fail loud).
    pub fn with_missing_token_policy(mut self, policy: MissingTokenPolicy) -> Self {
        self.missing_tokens = policy;
        self
    }

    /// Transform one post into a region score or a drop signal.
    ///
    /// Tokenization splits on single spaces, so runs of spaces produce
    /// empty tokens; they flow through mappers and filters like any
    /// other token and are typically removed by [`filters::non_empty`].
    pub fn produce(&self, post: &Post) -> Result<Outcome, PipelineError> {
        let mut tokens: Vec<Token> = post.text.split(' ').map(str::to_string).collect();
        for mapper in &self.mappers {
            for token in &mut tokens {
                *token = mapper(token);
            }
        }
        tokens.retain(|token| self.filters.iter().all(|filter| filter(token)));

        let Some(region) = self.grid.classify(post.coordinate) else {
            return Ok(Outcome::Unclassified);
        };

        let mut score: Weight = 0;
        for token in &tokens {
            match self.lexicon.lookup(token) {
                Some(weight) => score += weight,
                None => match self.missing_tokens {
                    MissingTokenPolicy::Fail => {
                        return Err(PipelineError::MissingToken(token.clone()));
                    }
                    MissingTokenPolicy::ScoreZero => {}
                },
            }
        }
        Ok(Outcome::Scored {
            region: region.to_string(),
            score,
        })
    }
}

/// Stock token mappers.
pub mod mappers {
    use super::TokenMapper;
    use std::sync::Arc;

    /// Case-fold every token to lowercase.
    pub fn lowercase() -> TokenMapper {
        Arc::new(|token| token.to_lowercase())
    }

    /// Strip trailing ASCII punctuation, so `great!` and `great,`
    /// match the lexicon entry `great`.
    pub fn strip_trailing_punctuation() -> TokenMapper {
        Arc::new(|token| token.trim_end_matches(|ch: char| ch.is_ascii_punctuation()).to_string())
    }
}

/// Stock token filters.
pub mod filters {
    use super::TokenFilter;
    use crate::lexicon::Lexicon;
    use std::sync::Arc;

    /// Reject the empty tokens produced by runs of spaces.
    pub fn non_empty() -> TokenFilter {
        Arc::new(|token| !token.is_empty())
    }

    /// Keep only tokens with a lexicon entry. Registering this filter
    /// guarantees the reducer never sees a missing token.
    pub fn in_lexicon(lexicon: Arc<Lexicon>) -> TokenFilter {
        Arc::new(move |token| lexicon.contains(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Coordinate;
    use crate::grid::Region;

    fn unit_grid() -> Arc<RegionGrid> {
        Arc::new(RegionGrid::new(vec![Region {
            id: "A".to_string(),
            xmin: 0.0,
            xmax: 10.0,
            ymin: 0.0,
            ymax: 10.0,
        }]))
    }

    fn good_bad_lexicon() -> Arc<Lexicon> {
        Arc::new(Lexicon::from_entries([
            ("good".to_string(), 2),
            ("bad".to_string(), -3),
        ]))
    }

    #[test]
    fn scores_a_classified_post_by_summed_weights() {
        let lexicon = good_bad_lexicon();
        let pipeline = PostPipeline::new(Arc::clone(&lexicon), unit_grid())
            .with_filter(filters::in_lexicon(lexicon));
        let outcome = pipeline
            .produce(&Post::new("good bad", Coordinate::new(5.0, 5.0)))
            .unwrap();
        assert_eq!(
            outcome,
            Outcome::Scored {
                region: "A".to_string(),
                score: -1,
            }
        );
    }

    #[test]
    fn unmatched_coordinate_is_a_drop_signal() {
        let lexicon = good_bad_lexicon();
        let pipeline = PostPipeline::new(Arc::clone(&lexicon), unit_grid())
            .with_filter(filters::in_lexicon(lexicon));
        let outcome = pipeline
            .produce(&Post::new("good bad", Coordinate::new(50.0, 50.0)))
            .unwrap();
        assert_eq!(outcome, Outcome::Unclassified);
    }

    #[test]
    fn mappers_run_stage_by_stage_in_registration_order() {
        // Swapping registration order would leave "ok!" tokens that
        // fail the reducer, so this pins mapper execution order.
        let lexicon = Arc::new(Lexicon::from_entries([("ok".to_string(), 1)]));
        let pipeline = PostPipeline::new(lexicon, unit_grid())
            .with_mapper(Arc::new(|token| format!("{token}!")))
            .with_mapper(Arc::new(|token| token.trim_end_matches('!').to_string()))
            .with_filter(filters::non_empty());
        let outcome = pipeline
            .produce(&Post::new("ok ok", Coordinate::new(1.0, 1.0)))
            .unwrap();
        assert_eq!(
            outcome,
            Outcome::Scored {
                region: "A".to_string(),
                score: 2,
            }
        );
    }

    #[test]
    fn filters_are_anded_regardless_of_later_opinions() {
        let lexicon = good_bad_lexicon();
        // First filter rejects "bad"; second would accept everything.
        let pipeline = PostPipeline::new(Arc::clone(&lexicon), unit_grid())
            .with_filter(Arc::new(|token| token != "bad"))
            .with_filter(Arc::new(|_| true))
            .with_filter(filters::in_lexicon(lexicon));
        let outcome = pipeline
            .produce(&Post::new("good bad", Coordinate::new(5.0, 5.0)))
            .unwrap();
        assert_eq!(
            outcome,
            Outcome::Scored {
                region: "A".to_string(),
                score: 2,
            }
        );
    }

    #[test]
    fn lowercase_mapper_normalizes_before_lookup() {
        let lexicon = good_bad_lexicon();
        let pipeline = PostPipeline::new(Arc::clone(&lexicon), unit_grid())
            .with_mapper(mappers::lowercase())
            .with_filter(filters::in_lexicon(lexicon));
        let outcome = pipeline
            .produce(&Post::new("GOOD Bad", Coordinate::new(5.0, 5.0)))
            .unwrap();
        assert_eq!(
            outcome,
            Outcome::Scored {
                region: "A".to_string(),
                score: -1,
            }
        );
    }

    #[test]
    fn trailing_punctuation_mapper_recovers_lexicon_matches() {
        let lexicon = good_bad_lexicon();
        let pipeline = PostPipeline::new(Arc::clone(&lexicon), unit_grid())
            .with_mapper(mappers::strip_trailing_punctuation())
            .with_filter(filters::non_empty())
            .with_filter(filters::in_lexicon(lexicon));
        let outcome = pipeline
            .produce(&Post::new("good!! bad,", Coordinate::new(5.0, 5.0)))
            .unwrap();
        assert_eq!(
            outcome,
            Outcome::Scored {
                region: "A".to_string(),
                score: -1,
            }
        );
    }

    #[test]
    fn surviving_unknown_token_fails_loud_by_default() {
        let pipeline = PostPipeline::new(good_bad_lexicon(), unit_grid());
        let err = pipeline
            .produce(&Post::new("good unknown", Coordinate::new(5.0, 5.0)))
            .unwrap_err();
        match err {
            PipelineError::MissingToken(token) => assert_eq!(token, "unknown"),
            other => panic!("expected MissingToken, got {other:?}"),
        }
    }

    #[test]
    fn score_zero_policy_ignores_unknown_tokens() {
        let pipeline = PostPipeline::new(good_bad_lexicon(), unit_grid())
            .with_missing_token_policy(MissingTokenPolicy::ScoreZero);
        let outcome = pipeline
            .produce(&Post::new("good unknown bad", Coordinate::new(5.0, 5.0)))
            .unwrap();
        assert_eq!(
            outcome,
            Outcome::Scored {
                region: "A".to_string(),
                score: -1,
            }
        );
    }

    #[test]
    fn single_space_split_preserves_empty_tokens_for_filters() {
        let lexicon = good_bad_lexicon();
        // Without non_empty the double space would surface "" to the
        // reducer and fail; with it the record scores normally.
        let strict = PostPipeline::new(Arc::clone(&lexicon), unit_grid());
        let err = strict
            .produce(&Post::new("good  bad", Coordinate::new(5.0, 5.0)))
            .unwrap_err();
        assert!(matches!(err, PipelineError::MissingToken(token) if token.is_empty()));

        let filtered = PostPipeline::new(Arc::clone(&lexicon), unit_grid())
            .with_filter(filters::non_empty())
            .with_filter(filters::in_lexicon(lexicon));
        let outcome = filtered
            .produce(&Post::new("good  bad", Coordinate::new(5.0, 5.0)))
            .unwrap();
        assert_eq!(
            outcome,
            Outcome::Scored {
                region: "A".to_string(),
                score: -1,
            }
        );
    }

    #[test]
    fn classification_happens_before_reduction() {
        // An unclassifiable post never reaches the reducer, so unknown
        // tokens in it cannot fail the record.
        let pipeline = PostPipeline::new(good_bad_lexicon(), unit_grid());
        let outcome = pipeline
            .produce(&Post::new("entirely unknown words", Coordinate::new(99.0, 99.0)))
            .unwrap();
        assert_eq!(outcome, Outcome::Unclassified);
    }
}
