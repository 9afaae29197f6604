use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::errors::PipelineError;
use crate::types::{Token, Weight};

/// Immutable token-to-weight sentiment map.
///
/// Lookup is exact: the lexicon performs no normalization of its own,
/// so pipeline mappers must produce tokens in the same form the lexicon
/// rows use (typically lowercase). Shared read-only across workers via
/// `Arc`.
#[derive(Clone, Debug)]
pub struct Lexicon {
    weights: HashMap<Token, Weight>,
}

impl Lexicon {
    /// Build a lexicon from prebuilt entries. Later duplicates win.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (Token, Weight)>,
    {
        Self {
            weights: entries.into_iter().collect(),
        }
    }

    /// Build a lexicon from newline-separated `token<TAB>weight` rows.
    ///
    /// Blank lines are skipped. Any other malformed row (not exactly
    /// two tab-separated fields, or a weight that is not an integer)
    /// fails construction with a `Format` error naming the line.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, PipelineError> {
        let mut weights = HashMap::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            let mut fields = line.split('\t');
            let (token, weight) = match (fields.next(), fields.next(), fields.next()) {
                (Some(token), Some(weight), None) => (token, weight),
                _ => {
                    return Err(PipelineError::Format {
                        input: "lexicon row",
                        detail: format!(
                            "line {}: expected exactly two tab-separated fields",
                            idx + 1
                        ),
                    });
                }
            };
            let weight: Weight = weight.parse().map_err(|_| PipelineError::Format {
                input: "lexicon row",
                detail: format!("line {}: weight '{weight}' is not an integer", idx + 1),
            })?;
            weights.insert(token.to_string(), weight);
        }
        Ok(Self { weights })
    }

    /// Build a lexicon from a file of `token<TAB>weight` rows.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        Self::from_reader(BufReader::new(File::open(path)?))
    }

    /// Exact-match weight lookup for a pipeline-normalized token.
    pub fn lookup(&self, token: &str) -> Option<Weight> {
        self.weights.get(token).copied()
    }

    /// Returns `true` when `token` has an entry.
    pub fn contains(&self, token: &str) -> bool {
        self.weights.contains_key(token)
    }

    /// Number of entries in the lexicon.
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// Returns `true` when the lexicon has no entries.
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}
