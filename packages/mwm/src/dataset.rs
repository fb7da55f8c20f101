//! TOML dataset definitions.
//!
//! A dataset lists partitions and their points of interest:
//!
//! ```toml
//! [[mwm]]
//! name = "WhiskeyTown"
//! version = 1
//! scale_range = [0, 6]
//!
//! [[mwm.poi]]
//! x = 0.0
//! y = 0.0
//! name = "Whiskey bar"
//! lang = "en"
//! ```

use std::path::Path;

use geo::Coord;
use map_search_mwm_models::{FeatureRecord, Lang};
use serde::Deserialize;

use crate::builder::{DEFAULT_SCALE_RANGE, MwmBuilder};
use crate::container::MwmContainer;
use crate::MwmError;

/// A set of partitions to build.
#[derive(Debug, Deserialize)]
pub struct DatasetDefinition {
    #[serde(default)]
    pub mwm: Vec<MwmDefinition>,
}

/// One partition of a dataset.
#[derive(Debug, Deserialize)]
pub struct MwmDefinition {
    /// Partition name; also the file stem when written to disk.
    pub name: String,
    #[serde(default = "default_version")]
    pub version: u64,
    /// Inclusive `[min, max]` scale range of the scale index.
    #[serde(default = "default_scale_range")]
    pub scale_range: (u8, u8),
    #[serde(default)]
    pub poi: Vec<PoiDefinition>,
}

/// A named point of interest.
#[derive(Debug, Deserialize)]
pub struct PoiDefinition {
    pub x: f64,
    pub y: f64,
    pub name: String,
    #[serde(default = "default_lang")]
    pub lang: Lang,
    #[serde(default)]
    pub min_scale: u8,
}

const fn default_version() -> u64 {
    1
}

const fn default_scale_range() -> (u8, u8) {
    DEFAULT_SCALE_RANGE
}

const fn default_lang() -> Lang {
    Lang::Default
}

impl MwmDefinition {
    /// Builds this partition's container.
    ///
    /// # Errors
    ///
    /// Returns an error if the partition has no points or a point lies
    /// outside the world extent.
    pub fn build(&self) -> Result<MwmContainer, MwmError> {
        let (min, max) = self.scale_range;
        let mut builder = MwmBuilder::new(&self.name)
            .version(self.version)
            .scale_range(min, max);

        for poi in &self.poi {
            let mut record = FeatureRecord::poi(Coord { x: poi.x, y: poi.y }, &poi.name, poi.lang);
            record.min_scale = poi.min_scale;
            builder.add_feature(record);
        }

        builder.finish()
    }
}

impl DatasetDefinition {
    /// Builds every partition, in definition order.
    ///
    /// # Errors
    ///
    /// Returns the first partition build error.
    pub fn build(&self) -> Result<Vec<MwmContainer>, MwmError> {
        self.mwm.iter().map(MwmDefinition::build).collect()
    }
}

/// Parses a dataset from TOML text.
///
/// # Errors
///
/// Returns an error if the TOML is malformed or does not match the schema.
pub fn parse_dataset_toml(toml_str: &str) -> Result<DatasetDefinition, MwmError> {
    Ok(toml::de::from_str(toml_str)?)
}

/// Reads and parses a dataset file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_dataset(path: impl AsRef<Path>) -> Result<DatasetDefinition, MwmError> {
    let path = path.as_ref();
    log::debug!("Loading dataset {}", path.display());
    parse_dataset_toml(&std::fs::read_to_string(path)?)
}
