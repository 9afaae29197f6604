use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::Deserialize;

use crate::data::Coordinate;
use crate::errors::PipelineError;
use crate::types::RegionId;

/// A named rectangular region with inclusive bounds on all four sides.
#[derive(Clone, Debug, PartialEq)]
pub struct Region {
    /// Region identifier used in aggregate totals.
    pub id: RegionId,
    /// Inclusive lower x (longitude) bound.
    pub xmin: f64,
    /// Inclusive upper x (longitude) bound.
    pub xmax: f64,
    /// Inclusive lower y (latitude) bound.
    pub ymin: f64,
    /// Inclusive upper y (latitude) bound.
    pub ymax: f64,
}

impl Region {
    /// Returns `true` when `coordinate` lies inside the bounding box,
    /// boundaries included.
    pub fn contains(&self, coordinate: Coordinate) -> bool {
        self.xmin <= coordinate.x
            && coordinate.x <= self.xmax
            && self.ymin <= coordinate.y
            && coordinate.y <= self.ymax
    }
}

/// An ordered sequence of regions.
///
/// Order is significant: `classify` returns the first region in
/// definition order whose box contains the point, which makes
/// shared-boundary classification deterministic.
#[derive(Clone, Debug)]
pub struct RegionGrid {
    regions: Vec<Region>,
}

/// Wire shape of the grid file: a feature collection whose features
/// carry the region id and bounds under `properties`.
#[derive(Deserialize)]
struct FeatureCollection {
    features: Vec<Feature>,
}

#[derive(Deserialize)]
struct Feature {
    #[serde(default)]
    properties: Option<FeatureProperties>,
}

#[derive(Deserialize)]
struct FeatureProperties {
    #[serde(default)]
    id: Option<RegionId>,
    #[serde(default)]
    xmin: Option<f64>,
    #[serde(default)]
    xmax: Option<f64>,
    #[serde(default)]
    ymin: Option<f64>,
    #[serde(default)]
    ymax: Option<f64>,
}

impl RegionGrid {
    /// Build a grid from prebuilt regions, preserving their order.
    pub fn new(regions: Vec<Region>) -> Self {
        Self { regions }
    }

    /// Build a grid from a JSON feature collection.
    ///
    /// Features load in document order. A feature missing `properties`,
    /// its `id`, or any of the four bounds fails construction with a
    /// `Format` error naming the feature index.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, PipelineError> {
        let collection: FeatureCollection = serde_json::from_reader(reader)
            .map_err(|err| PipelineError::Format {
                input: "region grid",
                detail: err.to_string(),
            })?;
        let mut regions = Vec::with_capacity(collection.features.len());
        for (idx, feature) in collection.features.into_iter().enumerate() {
            regions.push(Self::region_from_feature(idx, feature)?);
        }
        Ok(Self { regions })
    }

    /// Build a grid from a feature collection file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        Self::from_reader(BufReader::new(File::open(path)?))
    }

    fn region_from_feature(idx: usize, feature: Feature) -> Result<Region, PipelineError> {
        let missing = |field: &str| PipelineError::Format {
            input: "region grid feature",
            detail: format!("feature {idx} is missing '{field}'"),
        };
        let properties = feature.properties.ok_or_else(|| missing("properties"))?;
        Ok(Region {
            id: properties.id.ok_or_else(|| missing("properties.id"))?,
            xmin: properties.xmin.ok_or_else(|| missing("properties.xmin"))?,
            xmax: properties.xmax.ok_or_else(|| missing("properties.xmax"))?,
            ymin: properties.ymin.ok_or_else(|| missing("properties.ymin"))?,
            ymax: properties.ymax.ok_or_else(|| missing("properties.ymax"))?,
        })
    }

    /// Classify a coordinate into the first matching region.
    ///
    /// Returns `None` when no region contains the point. That is an
    /// expected outcome, not an error; callers decide whether to bucket
    /// or drop such records.
    pub fn classify(&self, coordinate: Coordinate) -> Option<&str> {
        self.regions
            .iter()
            .find(|region| region.contains(coordinate))
            .map(|region| region.id.as_str())
    }

    /// Regions in definition order.
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Number of regions in the grid.
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Returns `true` when the grid has no regions.
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}
