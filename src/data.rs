use serde::Deserialize;
use serde_json::Value;

use crate::errors::PipelineError;

/// A longitude/latitude pair in the order supplied by the post source.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Coordinate {
    /// Longitude.
    pub x: f64,
    /// Latitude.
    pub y: f64,
}

impl Coordinate {
    /// Create a coordinate from an `(x, y)` pair.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// One raw post record before pipeline processing.
///
/// Ephemeral by design: created by a record stream, consumed once by
/// the pipeline, then discarded.
#[derive(Clone, Debug, PartialEq)]
pub struct Post {
    /// Free text as supplied by the source, pre-tokenization.
    pub text: String,
    /// Geotag attached to the post.
    pub coordinate: Coordinate,
}

impl Post {
    /// Create a post from raw text and a coordinate.
    pub fn new(text: impl Into<String>, coordinate: Coordinate) -> Self {
        Self {
            text: text.into(),
            coordinate,
        }
    }
}

/// One array element of the post document.
///
/// Rows come in two shapes: the CouchDB export wraps the payload in a
/// `doc` object, while flat exports put `text`/`coordinates` directly
/// on the row. Fields stay optional so a missing one surfaces as a
/// per-record error instead of failing the whole document.
#[derive(Debug, Deserialize)]
pub(crate) struct RawRow {
    #[serde(default)]
    doc: Option<RawDoc>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    coordinates: Option<RawCoordinates>,
}

#[derive(Debug, Deserialize)]
struct RawDoc {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    coordinates: Option<RawCoordinates>,
}

/// Coordinates appear either as a bare `[x, y]` pair or nested one
/// level deeper in GeoJSON point style.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawCoordinates {
    Pair([f64; 2]),
    Point { coordinates: [f64; 2] },
}

impl RawCoordinates {
    fn into_coordinate(self) -> Coordinate {
        let [x, y] = match self {
            RawCoordinates::Pair(pair) => pair,
            RawCoordinates::Point { coordinates } => coordinates,
        };
        Coordinate { x, y }
    }
}

impl RawRow {
    fn into_post(self) -> Result<Post, PipelineError> {
        let (text, coordinates) = match self.doc {
            Some(doc) => (doc.text, doc.coordinates),
            None => (self.text, self.coordinates),
        };
        let text = text.ok_or_else(|| {
            PipelineError::Record("row is missing its 'text' field".into())
        })?;
        let coordinates = coordinates.ok_or_else(|| {
            PipelineError::Record("row is missing its 'coordinates' field".into())
        })?;
        Ok(Post {
            text,
            coordinate: coordinates.into_coordinate(),
        })
    }
}

/// Convert one raw row value into a `Post`.
///
/// Shared by the bounded and streaming sources so both modes agree on
/// which rows are malformed and why.
pub(crate) fn post_from_row(row: Value) -> Result<Post, PipelineError> {
    let raw: RawRow = serde_json::from_value(row)
        .map_err(|err| PipelineError::Record(err.to_string()))?;
    raw.into_post()
}
