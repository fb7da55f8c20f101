//! Scale index: quadtree cell keys to feature ids, bucketed by scale.
//!
//! A feature lives in the bucket of the coarsest scale at which it is
//! visible. A lookup at scale `s` consults every bucket up to `s`.

use std::collections::BTreeMap;

use map_search_mwm_models::{FeatureId, INDEX_FILE_TAG};
use serde::{Deserialize, Serialize};

use crate::MwmError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ScaleBucket {
    scale: u8,
    /// `(cell key, feature)` pairs sorted by key, then feature.
    entries: Vec<(u64, FeatureId)>,
}

/// Decoded scale index of one partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaleIndex {
    buckets: Vec<ScaleBucket>,
}

impl ScaleIndex {
    /// Decodes and validates a scale index section.
    ///
    /// # Errors
    ///
    /// Returns [`MwmError::MalformedIndex`] if the bytes are not a scale
    /// index or its buckets or entries are out of order.
    pub fn decode(bytes: &[u8]) -> Result<Self, MwmError> {
        let index: Self = rmp_serde::from_slice(bytes)
            .map_err(|e| MwmError::malformed(INDEX_FILE_TAG, e.to_string()))?;
        index.validate()?;
        Ok(index)
    }

    /// Encodes the index for storage in a container.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn encode(&self) -> Result<Vec<u8>, MwmError> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    fn validate(&self) -> Result<(), MwmError> {
        if self.buckets.windows(2).any(|pair| pair[0].scale >= pair[1].scale) {
            return Err(MwmError::malformed(
                INDEX_FILE_TAG,
                "scale buckets out of order",
            ));
        }
        for bucket in &self.buckets {
            if bucket.entries.windows(2).any(|pair| pair[0] > pair[1]) {
                return Err(MwmError::malformed(
                    INDEX_FILE_TAG,
                    format!("entries of scale {} out of order", bucket.scale),
                ));
            }
        }
        Ok(())
    }

    /// Visits every feature visible at `scale` whose cell key lies in
    /// `[begin, end)`.
    pub fn for_each_in_interval_and_scale(
        &self,
        begin: u64,
        end: u64,
        scale: u8,
        mut f: impl FnMut(FeatureId),
    ) {
        for bucket in self.buckets.iter().take_while(|b| b.scale <= scale) {
            let start = bucket.entries.partition_point(|&(key, _)| key < begin);
            bucket.entries[start..]
                .iter()
                .take_while(|&&(key, _)| key < end)
                .for_each(|&(_, feature)| f(feature));
        }
    }

    /// Total number of indexed entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.iter().map(|b| b.entries.len()).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Incrementally builds a [`ScaleIndex`].
#[derive(Debug, Default)]
pub struct ScaleIndexBuilder {
    buckets: BTreeMap<u8, Vec<(u64, FeatureId)>>,
}

impl ScaleIndexBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes `feature` at cell `key`, visible from `scale` on.
    pub fn insert(&mut self, key: u64, scale: u8, feature: FeatureId) {
        self.buckets.entry(scale).or_default().push((key, feature));
    }

    #[must_use]
    pub fn build(self) -> ScaleIndex {
        ScaleIndex {
            buckets: self
                .buckets
                .into_iter()
                .map(|(scale, mut entries)| {
                    entries.sort_unstable();
                    entries.dedup();
                    ScaleBucket { scale, entries }
                })
                .collect(),
        }
    }
}
