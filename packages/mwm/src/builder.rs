//! Builds partition containers from point features.

use geo::Coord;
use map_search_geometry::scales::{clamp_scale, world_rect};
use map_search_geometry::{CellId, RectExt, bounding_rect};
use map_search_mwm_models::{
    CONTAINER_FORMAT_VERSION, DataHeader, FEATURES_FILE_TAG, FeatureId, FeatureRecord,
    INDEX_FILE_TAG, Lang, SEARCH_INDEX_FILE_TAG,
};

use crate::container::MwmContainer;
use crate::normalize::split_tokens;
use crate::scale_index::ScaleIndexBuilder;
use crate::trie::TrieBuilder;
use crate::MwmError;

/// Scale range written when none is configured.
///
/// The scale index is built coarse on purpose: at scale 6 a cell is
/// 5.625 units wide, so a viewport lookup returns whole cells.
pub const DEFAULT_SCALE_RANGE: (u8, u8) = (0, 6);

/// Collects features and writes them into a [`MwmContainer`] with a
/// text trie, a scale index and the feature records.
#[derive(Debug)]
pub struct MwmBuilder {
    name: String,
    version: u64,
    scale_range: (u8, u8),
    features: Vec<FeatureRecord>,
}

impl MwmBuilder {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: 1,
            scale_range: DEFAULT_SCALE_RANGE,
            features: Vec::new(),
        }
    }

    /// Sets the data version written to the header.
    #[must_use]
    pub const fn version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    /// Sets the inclusive scale range the scale index is built for.
    #[must_use]
    pub const fn scale_range(mut self, min: u8, max: u8) -> Self {
        self.scale_range = (min, max);
        self
    }

    /// Adds a point of interest with a single name and returns its id.
    pub fn add_poi(&mut self, point: Coord<f64>, name: &str, lang: Lang) -> FeatureId {
        self.add_feature(FeatureRecord::poi(point, name, lang))
    }

    /// Adds an arbitrary feature record and returns its id.
    #[allow(clippy::cast_possible_truncation)]
    pub fn add_feature(&mut self, record: FeatureRecord) -> FeatureId {
        self.features.push(record);
        (self.features.len() - 1) as FeatureId
    }

    /// Number of features added so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Builds the container.
    ///
    /// # Errors
    ///
    /// Returns an error if no feature was added, a feature lies outside
    /// the world extent, a feature name uses an unknown language index,
    /// or an index cannot be encoded.
    pub fn finish(self) -> Result<MwmContainer, MwmError> {
        let world = world_rect();
        if let Some((feature, point)) = (0..)
            .zip(&self.features)
            .map(|(id, f)| (id, f.point))
            .find(|&(_, point)| !world.contains_coord(point))
        {
            return Err(MwmError::OutOfWorld {
                mwm: self.name,
                feature,
                x: point.x,
                y: point.y,
            });
        }

        let Some(bounds) = bounding_rect(self.features.iter().map(|f| f.point)) else {
            return Err(MwmError::EmptyPartition(self.name));
        };

        let mut trie = TrieBuilder::new();
        let mut scale_index = ScaleIndexBuilder::new();

        for (id, feature) in (0..).zip(&self.features) {
            for (lang_index, name) in &feature.names {
                let lang = Lang::from_index(*lang_index)
                    .ok_or_else(|| MwmError::UnknownLang(lang_index.to_string()))?;
                for token in split_tokens(name) {
                    trie.insert(lang, &token, id);
                }
            }

            let scale = clamp_scale(feature.min_scale, self.scale_range);
            scale_index.insert(CellId::key_for_point(feature.point), scale, id);
        }

        let header = DataHeader {
            format_version: CONTAINER_FORMAT_VERSION,
            version: self.version,
            bounds,
            scale_range: self.scale_range,
        };

        let mut container = MwmContainer::new(self.name, header);
        container.set_section(SEARCH_INDEX_FILE_TAG, trie.build().encode()?);
        container.set_section(INDEX_FILE_TAG, scale_index.build().encode()?);
        container.set_section(FEATURES_FILE_TAG, rmp_serde::to_vec_named(&self.features)?);

        log::debug!(
            "Built mwm '{}' v{}: {} features",
            container.name(),
            self.version,
            self.features.len()
        );

        Ok(container)
    }
}
