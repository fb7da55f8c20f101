#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Map data partitions ("mwms") for the map search engine.
//!
//! # Architecture
//!
//! - **Container**: a partition is a [`DataHeader`] plus named byte
//!   sections, serialized with `rmp-serde`. The text trie lives in
//!   [`SEARCH_INDEX_FILE_TAG`], the scale index in [`INDEX_FILE_TAG`] and
//!   the feature records in [`FEATURES_FILE_TAG`].
//! - **Indexes**: [`SearchTrie`] maps normalized tokens (per language) to
//!   feature ids; [`ScaleIndex`] maps quadtree cell keys (per scale) to
//!   feature ids. Both are decoded and validated on every read, so a
//!   corrupt section surfaces as [`MwmError::MalformedIndex`].
//! - **Registry**: [`MwmSet`] owns registered partitions and hands out
//!   [`MwmHandle`]s that keep the partition data alive.
//! - **Build**: [`MwmBuilder`] and [`DatasetDefinition`] produce
//!   containers from points and names.
//!
//! # Usage
//!
//! ```rust
//! use map_search_mwm::{MwmBuilder, MwmSet, RegResult};
//! use map_search_mwm_models::Lang;
//! use geo::Coord;
//!
//! let mut builder = MwmBuilder::new("WhiskeyTown");
//! builder.add_poi(Coord { x: 1.0, y: 2.0 }, "Whiskey bar", Lang::En);
//! let container = builder.finish().unwrap();
//!
//! let mut mwms = MwmSet::new();
//! let (handle, result) = mwms.register_map(container);
//! assert_eq!(result, RegResult::Success);
//! assert!(handle.is_alive());
//! ```

pub mod builder;
pub mod container;
pub mod dataset;
pub mod normalize;
pub mod registry;
pub mod scale_index;
pub mod trie;

pub use builder::{DEFAULT_SCALE_RANGE, MwmBuilder};
pub use container::MwmContainer;
pub use dataset::{DatasetDefinition, MwmDefinition, PoiDefinition, load_dataset, parse_dataset_toml};
pub use map_search_mwm_models::{
    DataHeader, FEATURES_FILE_TAG, FeatureId, FeatureRecord, INDEX_FILE_TAG, Lang, MwmId,
    SEARCH_INDEX_FILE_TAG,
};
pub use registry::{MwmHandle, MwmInfo, MwmRegistry, MwmSet, MwmValue, RegResult};
pub use scale_index::{ScaleIndex, ScaleIndexBuilder};
pub use trie::{SearchTrie, TrieBuilder, TrieNodeRef};

/// Errors from partition containers, indexes and datasets.
#[derive(Debug, thiserror::Error)]
pub enum MwmError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error while writing a container or index.
    #[error("Encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// The container itself could not be decoded.
    #[error("Decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    /// An index section exists but its contents are corrupt.
    #[error("Malformed '{tag}' section: {reason}")]
    MalformedIndex {
        /// Section tag, e.g. [`SEARCH_INDEX_FILE_TAG`].
        tag: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// A required section is absent.
    #[error("Missing '{0}' section")]
    MissingSection(&'static str),

    /// The container was written by an incompatible format version.
    #[error("Unsupported container format version {found} (expected {expected})")]
    UnsupportedFormat {
        /// Version found in the container header.
        found: u32,
        /// Version this build reads.
        expected: u32,
    },

    /// A partition cannot be built without features.
    #[error("Partition '{0}' has no features")]
    EmptyPartition(String),

    /// A feature lies outside the projected world extent and could never
    /// be found by a viewport lookup.
    #[error("Feature {feature} of partition '{mwm}' at ({x}, {y}) is outside the world")]
    OutOfWorld {
        mwm: String,
        feature: FeatureId,
        x: f64,
        y: f64,
    },

    /// Dataset TOML could not be parsed.
    #[error("Dataset error: {0}")]
    Dataset(#[from] toml::de::Error),

    /// A language index or code is not known.
    #[error("Unknown language: {0}")]
    UnknownLang(String),
}

impl MwmError {
    pub(crate) fn malformed(tag: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedIndex {
            tag,
            reason: reason.into(),
        }
    }
}
