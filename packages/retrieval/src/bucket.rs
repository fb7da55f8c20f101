//! Per-partition retrieval state.

use std::sync::Arc;

use geo::Rect;
use map_search_mwm::{MwmHandle, MwmId, MwmValue, ScaleIndex};
use map_search_mwm_models::FeatureId;
use map_search_retrieval_models::QueryParams;

use crate::RetrievalError;
use crate::matcher::{geometry_features_in_index, retrieve_address_features};

#[derive(Debug, Default)]
struct Matches {
    address: Vec<FeatureId>,
    geometry: Vec<FeatureId>,
    intersection: Vec<FeatureId>,
}

/// Lifecycle of a bucket within one `go` run.
///
/// `Covered`, `Flushed` and `Failed` are terminal. Address features and
/// the decoded scale index are produced once, on the way out of
/// `Pending`; geometry features are recomputed from that index on every
/// retrieval while `Intersected`.
#[derive(Debug, Default)]
enum BucketState {
    /// No viewport has intersected the partition yet.
    #[default]
    Pending,
    Intersected { matches: Matches, index: ScaleIndex },
    /// A viewport contained the whole partition.
    Covered(Matches),
    /// The search ended before the partition was covered.
    Flushed(Matches),
    /// An index turned out to be unusable.
    Failed,
}

/// Retrieval state of one partition.
#[derive(Debug)]
pub struct FeatureBucket {
    value: Arc<MwmValue>,
    bounds: Rect<f64>,
    state: BucketState,
}

impl FeatureBucket {
    /// Creates a pending bucket, or `None` if `handle` is dead.
    #[must_use]
    pub fn new(handle: MwmHandle) -> Option<Self> {
        let value = handle.into_value()?;
        let bounds = value.header().bounds;
        Some(Self {
            value,
            bounds,
            state: BucketState::Pending,
        })
    }

    #[must_use]
    pub fn id(&self) -> &MwmId {
        self.value.id()
    }

    #[must_use]
    pub const fn bounds(&self) -> &Rect<f64> {
        &self.bounds
    }

    /// Returns `true` once some viewport has intersected the partition.
    #[must_use]
    pub const fn intersects_viewport(&self) -> bool {
        !matches!(self.state, BucketState::Pending)
    }

    #[must_use]
    pub const fn is_covered(&self) -> bool {
        matches!(self.state, BucketState::Covered(_))
    }

    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self.state, BucketState::Failed)
    }

    /// Returns `true` if the bucket will not be retrieved or reported
    /// again.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        matches!(
            self.state,
            BucketState::Covered(_) | BucketState::Flushed(_) | BucketState::Failed
        )
    }

    /// Sorted, unique ids matching the query text.
    #[must_use]
    pub fn address_features(&self) -> &[FeatureId] {
        self.matches()
            .map(|m| m.address.as_slice())
            .unwrap_or_default()
    }

    /// Sorted, unique ids found in the last retrieved viewport.
    #[must_use]
    pub fn geometry_features(&self) -> &[FeatureId] {
        self.matches()
            .map(|m| m.geometry.as_slice())
            .unwrap_or_default()
    }

    /// Sorted, unique ids present in both address and geometry features.
    #[must_use]
    pub fn intersection(&self) -> &[FeatureId] {
        self.matches()
            .map(|m| m.intersection.as_slice())
            .unwrap_or_default()
    }

    const fn matches(&self) -> Option<&Matches> {
        match &self.state {
            BucketState::Intersected { matches: m, .. }
            | BucketState::Covered(m)
            | BucketState::Flushed(m) => Some(m),
            BucketState::Pending | BucketState::Failed => None,
        }
    }

    /// Retrieves the partition for `viewport` and recomputes the
    /// intersection. Finished buckets are left untouched.
    ///
    /// On error the bucket is left pending; the caller is expected to
    /// [`fail`](Self::fail) it.
    pub(crate) fn retrieve(
        &mut self,
        viewport: &Rect<f64>,
        params: &QueryParams,
    ) -> Result<(), RetrievalError> {
        let (mut matches, index) = match std::mem::take(&mut self.state) {
            BucketState::Pending => {
                let mut address =
                    retrieve_address_features(&self.value, params).map_err(|source| {
                        RetrievalError::AddressIndex {
                            mwm: self.value.id().clone(),
                            source,
                        }
                    })?;
                sort_unique(&mut address);
                let index = self.value.scale_index().map_err(|source| {
                    RetrievalError::GeometryIndex {
                        mwm: self.value.id().clone(),
                        source,
                    }
                })?;
                let matches = Matches {
                    address,
                    ..Matches::default()
                };
                (matches, index)
            }
            BucketState::Intersected { matches, index } => (matches, index),
            finished => {
                self.state = finished;
                return Ok(());
            }
        };

        let mut geometry =
            geometry_features_in_index(&index, self.value.header(), viewport, params);
        sort_unique(&mut geometry);

        matches.intersection = intersect_sorted(&matches.address, &geometry);
        matches.geometry = geometry;

        log::trace!(
            "mwm {}: {} address, {} geometry, {} common",
            self.value.id(),
            matches.address.len(),
            matches.geometry.len(),
            matches.intersection.len()
        );

        self.state = BucketState::Intersected { matches, index };
        Ok(())
    }

    /// Marks an intersected bucket as covered. Returns `true` if the
    /// state changed.
    pub(crate) fn mark_covered(&mut self) -> bool {
        match std::mem::take(&mut self.state) {
            BucketState::Intersected { matches, .. } => {
                self.state = BucketState::Covered(matches);
                true
            }
            other => {
                self.state = other;
                false
            }
        }
    }

    /// Finishes a bucket the search never covered. Returns `true` if the
    /// state changed.
    pub(crate) fn flush(&mut self) -> bool {
        match std::mem::take(&mut self.state) {
            BucketState::Pending => {
                self.state = BucketState::Flushed(Matches::default());
                true
            }
            BucketState::Intersected { matches, .. } => {
                self.state = BucketState::Flushed(matches);
                true
            }
            finished => {
                self.state = finished;
                false
            }
        }
    }

    pub(crate) fn fail(&mut self) {
        self.state = BucketState::Failed;
    }
}

fn sort_unique(ids: &mut Vec<FeatureId>) {
    ids.sort_unstable();
    ids.dedup();
}

/// Intersection of two ascending, duplicate-free slices.
fn intersect_sorted(a: &[FeatureId], b: &[FeatureId]) -> Vec<FeatureId> {
    let mut result = Vec::with_capacity(a.len().min(b.len()));
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                result.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    result
}
