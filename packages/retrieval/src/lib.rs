#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Progressive, viewport-driven feature retrieval.
//!
//! A [`Retrieval`] searches every registered partition for features that
//! match a text query *and* lie near a viewport. It starts with the
//! viewport itself and keeps enlarging it by `√2` until one of the
//! following holds:
//!
//! - every partition is fully inside the enlarged viewport
//! - the viewport reached [`Limits::max_viewport_scale`]
//! - at least [`Limits::min_num_features`] features were found
//!
//! Results are delivered per partition through a [`Callback`], at most
//! once per partition per `go` run, and never empty.
//!
//! # Usage
//!
//! ```rust
//! use geo::{Coord, Rect};
//! use map_search_mwm::{MwmBuilder, MwmSet};
//! use map_search_mwm_models::{FeatureId, Lang, MwmId};
//! use map_search_retrieval::{Retrieval, build_query_params};
//! use map_search_retrieval_models::Limits;
//!
//! let mut builder = MwmBuilder::new("WhiskeyTown");
//! builder.add_poi(Coord { x: 0.5, y: 0.5 }, "Whiskey bar", Lang::En);
//! let mut mwms = MwmSet::new();
//! mwms.register_map(builder.finish().unwrap());
//!
//! let viewport = Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 1.0, y: 1.0 });
//! let mut retrieval = Retrieval::new();
//! retrieval.init(
//!     &mwms,
//!     viewport,
//!     build_query_params("whiskey", [Lang::En]),
//!     Limits::new(),
//! );
//!
//! let mut found = Vec::new();
//! retrieval.go(&mut |id: &MwmId, features: &[FeatureId]| {
//!     found.push((id.name().to_string(), features.to_vec()));
//! });
//! assert_eq!(found, vec![("WhiskeyTown".to_string(), vec![0])]);
//! ```

pub mod bucket;
pub mod matcher;
pub mod params;

use geo::Rect;
use map_search_geometry::{RectExt, WORLD_MAX, WORLD_MIN};
use map_search_mwm::{MwmError, MwmRegistry};
use map_search_mwm_models::{FeatureId, MwmId};
use map_search_retrieval_models::{Limits, QueryParams};

pub use bucket::FeatureBucket;
pub use matcher::{
    geometry_features_in_index, match_features_in_trie, retrieve_address_features,
    retrieve_address_features_filtered, retrieve_geometry_features,
};
pub use params::build_query_params;

/// Growth factor of the viewport between iterations.
const VIEWPORT_SCALE_STEP: f64 = std::f64::consts::SQRT_2;

/// Errors that take a single partition out of a search.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    /// The text index could not be read.
    #[error("Text index of mwm {mwm} is unusable: {source}")]
    AddressIndex {
        /// Partition whose index failed.
        mwm: MwmId,
        /// Underlying error.
        source: MwmError,
    },

    /// The spatial index could not be read.
    #[error("Spatial index of mwm {mwm} is unusable: {source}")]
    GeometryIndex {
        /// Partition whose index failed.
        mwm: MwmId,
        /// Underlying error.
        source: MwmError,
    },
}

/// Receives retrieval results.
pub trait Callback {
    /// Called with the non-empty, ascending feature ids found in `id`.
    fn on_mwm_processed(&mut self, id: &MwmId, features: &[FeatureId]);

    /// Called once when `id` is dropped from the search because of
    /// `error`. The partition is not reported afterwards.
    fn on_mwm_failed(&mut self, id: &MwmId, error: &RetrievalError) {
        let _ = (id, error);
    }
}

impl<F: FnMut(&MwmId, &[FeatureId])> Callback for F {
    fn on_mwm_processed(&mut self, id: &MwmId, features: &[FeatureId]) {
        self(id, features);
    }
}

/// Where a [`Retrieval`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetrievalState {
    #[default]
    Uninitialized,
    Initialized,
    Searching,
    /// Every bucket has been reported or discarded.
    Done,
}

/// The retrieval controller.
#[derive(Debug)]
pub struct Retrieval {
    viewport: Rect<f64>,
    params: QueryParams,
    limits: Limits,
    buckets: Vec<FeatureBucket>,
    state: RetrievalState,
}

impl Default for Retrieval {
    fn default() -> Self {
        Self::new()
    }
}

impl Retrieval {
    #[must_use]
    pub fn new() -> Self {
        Self {
            viewport: Rect::new((0.0, 0.0), (0.0, 0.0)),
            params: QueryParams::default(),
            limits: Limits::new(),
            buckets: Vec::new(),
            state: RetrievalState::Uninitialized,
        }
    }

    /// Prepares a search, discarding any previous one.
    ///
    /// One bucket is created per live partition of `registry` that has
    /// both a text and a spatial index; other partitions are skipped.
    pub fn init<R: MwmRegistry + ?Sized>(
        &mut self,
        registry: &R,
        viewport: Rect<f64>,
        params: QueryParams,
        limits: Limits,
    ) {
        self.viewport = viewport;
        self.params = params;
        self.limits = limits;
        self.buckets.clear();

        for id in registry.mwm_ids() {
            let handle = registry.handle(&id);
            match handle.value() {
                None => {
                    log::debug!("Skipping mwm {id}: not registered anymore");
                    continue;
                }
                Some(value) if !(value.has_search_index() && value.has_geometry_index()) => {
                    log::debug!("Skipping mwm {id}: missing search or geometry index");
                    continue;
                }
                Some(_) => {}
            }
            if let Some(bucket) = FeatureBucket::new(handle) {
                self.buckets.push(bucket);
            }
        }

        log::debug!(
            "Initialized retrieval over {} mwms, viewport {:?}, {:?}",
            self.buckets.len(),
            self.viewport,
            self.limits
        );
        self.state = RetrievalState::Initialized;
    }

    /// Runs the search, reporting every partition with results through
    /// `callback`.
    ///
    /// Calling `go` again without a new [`init`](Self::init) reports
    /// nothing.
    pub fn go<C: Callback + ?Sized>(&mut self, callback: &mut C) {
        if self.buckets.iter().all(FeatureBucket::is_finished) {
            log::debug!("Nothing left to retrieve");
            self.state = RetrievalState::Done;
            return;
        }
        self.state = RetrievalState::Searching;

        let max_scale = self.limits.max_viewport_scale();
        let mut viewport_scale = 1.0_f64;
        let mut previous: Option<Rect<f64>> = None;

        loop {
            let scale = max_scale.map_or(viewport_scale, |max| viewport_scale.min(max));
            let viewport = self.viewport.scaled(scale);
            if !is_finite(&viewport) {
                log::debug!("Viewport overflowed at scale {scale:.3}");
                break;
            }

            self.retrieve_for_viewport(&viewport, callback);

            let retrieved = self.count_retrieved_features();
            log::debug!("Viewport scale {scale:.3} {viewport:?}: {retrieved} features retrieved");

            if self.viewport_covers_all_mwms() {
                break;
            }
            if max_scale.is_some_and(|max| viewport_scale >= max) {
                break;
            }
            if self
                .limits
                .min_num_features()
                .is_some_and(|min| retrieved >= min)
            {
                break;
            }
            if previous.is_some_and(|previous| !still_growing(&previous, &viewport)) {
                log::debug!("Viewport stopped growing at scale {scale:.3}");
                break;
            }

            previous = Some(viewport);
            viewport_scale *= VIEWPORT_SCALE_STEP;
        }

        for bucket in &mut self.buckets {
            if bucket.flush() {
                report(bucket, callback);
            }
        }

        self.state = RetrievalState::Done;
    }

    /// Retrieves every unfinished partition touched by `viewport` and
    /// reports the ones it covers.
    fn retrieve_for_viewport<C: Callback + ?Sized>(
        &mut self,
        viewport: &Rect<f64>,
        callback: &mut C,
    ) {
        for bucket in &mut self.buckets {
            if bucket.is_finished() || !viewport.intersects_rect(bucket.bounds()) {
                continue;
            }

            if let Err(error) = bucket.retrieve(viewport, &self.params) {
                log::warn!("Dropping mwm {} from retrieval: {error}", bucket.id());
                bucket.fail();
                callback.on_mwm_failed(bucket.id(), &error);
                continue;
            }

            if viewport.contains_rect(bucket.bounds()) && bucket.mark_covered() {
                report(bucket, callback);
            }
        }
    }

    /// Returns `true` if no partition is left outside the viewport.
    #[must_use]
    pub fn viewport_covers_all_mwms(&self) -> bool {
        self.buckets
            .iter()
            .all(|bucket| bucket.is_covered() || bucket.is_failed())
    }

    /// Total size of the current intersections over all partitions.
    #[must_use]
    pub fn count_retrieved_features(&self) -> u64 {
        self.buckets
            .iter()
            .map(|bucket| bucket.intersection().len() as u64)
            .sum()
    }

    #[must_use]
    pub const fn state(&self) -> RetrievalState {
        self.state
    }

    #[must_use]
    pub const fn viewport(&self) -> &Rect<f64> {
        &self.viewport
    }

    #[must_use]
    pub const fn params(&self) -> &QueryParams {
        &self.params
    }

    #[must_use]
    pub const fn limits(&self) -> &Limits {
        &self.limits
    }

    #[must_use]
    pub fn buckets(&self) -> &[FeatureBucket] {
        &self.buckets
    }
}

fn is_finite(rect: &Rect<f64>) -> bool {
    [rect.min().x, rect.min().y, rect.max().x, rect.max().y]
        .iter()
        .all(|c| c.is_finite())
}

/// Returns `true` if `viewport` reaches further than `previous` along an
/// axis that did not already span the whole world. Zero-width axes and
/// axes past the world extent can no longer bring new partitions in.
fn still_growing(previous: &Rect<f64>, viewport: &Rect<f64>) -> bool {
    let grows = |before: (f64, f64), after: (f64, f64)| {
        let spans_world = before.0 <= WORLD_MIN && before.1 >= WORLD_MAX;
        !spans_world && (after.0 < before.0 || after.1 > before.1)
    };
    grows(
        (previous.min().x, previous.max().x),
        (viewport.min().x, viewport.max().x),
    ) || grows(
        (previous.min().y, previous.max().y),
        (viewport.min().y, viewport.max().y),
    )
}

fn report<C: Callback + ?Sized>(bucket: &FeatureBucket, callback: &mut C) {
    let features = bucket.intersection();
    if features.is_empty() {
        return;
    }
    log::info!("Reporting {} features of mwm {}", features.len(), bucket.id());
    callback.on_mwm_processed(bucket.id(), features);
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use geo::Coord;
    use map_search_mwm::{MwmBuilder, MwmContainer, MwmHandle, MwmSet, SEARCH_INDEX_FILE_TAG};
    use map_search_mwm_models::{INDEX_FILE_TAG, Lang};

    use super::*;

    fn rect(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Rect<f64> {
        Rect::new(Coord { x: min_x, y: min_y }, Coord { x: max_x, y: max_y })
    }

    fn whiskey_town() -> MwmContainer {
        grid(MwmBuilder::new("WhiskeyTown"))
    }

    fn fine_whiskey_town() -> MwmContainer {
        grid(MwmBuilder::new("WhiskeyTown").scale_range(0, 17))
    }

    fn grid(mut builder: MwmBuilder) -> MwmContainer {
        for x in 0..10 {
            for y in 0..10 {
                builder.add_poi(
                    Coord {
                        x: f64::from(x),
                        y: f64::from(y),
                    },
                    "Whiskey bar",
                    Lang::En,
                );
            }
        }
        builder.finish().unwrap()
    }

    fn city(name: &str, x: f64, y: f64, poi: &str) -> MwmContainer {
        let mut builder = MwmBuilder::new(name);
        builder.add_poi(Coord { x, y }, poi, Lang::En);
        builder.finish().unwrap()
    }

    fn three_cities(names: [&str; 3]) -> MwmSet {
        let mut mwms = MwmSet::new();
        mwms.register_map(city("msk", 0.0, 0.0, names[0]));
        mwms.register_map(city("mtv", 10.0, 0.0, names[1]));
        mwms.register_map(city("zrh", 0.0, 10.0, names[2]));
        mwms
    }

    #[derive(Debug, Default)]
    struct Recorder {
        processed: Vec<(String, Vec<FeatureId>)>,
        failed: Vec<String>,
    }

    impl Callback for Recorder {
        fn on_mwm_processed(&mut self, id: &MwmId, features: &[FeatureId]) {
            self.processed
                .push((id.name().to_string(), features.to_vec()));
        }

        fn on_mwm_failed(&mut self, id: &MwmId, _error: &RetrievalError) {
            self.failed.push(id.name().to_string());
        }
    }

    impl Recorder {
        fn assert_well_formed(&self) {
            let names: BTreeSet<_> = self.processed.iter().map(|(name, _)| name).collect();
            assert_eq!(names.len(), self.processed.len(), "mwm reported twice");
            for (name, features) in &self.processed {
                assert!(!features.is_empty(), "{name} reported empty");
                assert!(
                    features.windows(2).all(|w| w[0] < w[1]),
                    "{name} not strictly ascending"
                );
            }
        }

        fn names(&self) -> Vec<&str> {
            self.processed.iter().map(|(name, _)| name.as_str()).collect()
        }
    }

    fn run(mwms: &MwmSet, viewport: Rect<f64>, query: &str, limits: Limits) -> Recorder {
        let mut retrieval = Retrieval::new();
        retrieval.init(
            mwms,
            viewport,
            build_query_params(query, [Lang::En]),
            limits,
        );
        let mut recorder = Recorder::default();
        retrieval.go(&mut recorder);
        recorder.assert_well_formed();
        recorder
    }

    #[test]
    fn unlimited_search_reports_the_whole_partition() {
        let mut mwms = MwmSet::new();
        mwms.register_map(whiskey_town());

        let mut retrieval = Retrieval::new();
        retrieval.init(
            &mwms,
            rect(0.0, 0.0, 1.0, 1.0),
            build_query_params("whiskey bar", [Lang::En]),
            Limits::new(),
        );
        assert_eq!(retrieval.state(), RetrievalState::Initialized);

        let mut recorder = Recorder::default();
        retrieval.go(&mut recorder);
        recorder.assert_well_formed();

        assert_eq!(recorder.names(), vec!["WhiskeyTown"]);
        assert_eq!(recorder.processed[0].1, (0..100).collect::<Vec<_>>());
        assert!(retrieval.viewport_covers_all_mwms());
        assert_eq!(retrieval.state(), RetrievalState::Done);

        let mut again = Recorder::default();
        retrieval.go(&mut again);
        assert!(again.processed.is_empty());
    }

    #[test]
    fn max_viewport_scale_bounds_the_search() {
        let mut mwms = MwmSet::new();
        mwms.register_map(whiskey_town());

        let recorder = run(
            &mwms,
            rect(0.0, 0.0, 1.0, 1.0),
            "whiskey bar",
            Limits::new().with_max_viewport_scale(5.0),
        );

        assert_eq!(recorder.names(), vec!["WhiskeyTown"]);
        assert_eq!(recorder.processed[0].1.len(), 36);
    }

    #[test]
    fn min_num_features_stops_the_search_early() {
        let mut mwms = MwmSet::new();
        mwms.register_map(whiskey_town());

        let recorder = run(
            &mwms,
            rect(4.9, 4.9, 5.1, 5.1),
            "whiskey bar",
            Limits::new().with_min_num_features(8),
        );

        assert_eq!(recorder.names(), vec!["WhiskeyTown"]);
        assert!(recorder.processed[0].1.len() >= 8);
        assert!(recorder.processed[0].1.len() < 100);
    }

    #[test]
    fn min_num_features_reports_only_the_nearest_partition() {
        let mwms = three_cities(["Cafe MTV", "MTV", "Bar MTV"]);

        let recorder = run(
            &mwms,
            rect(-1.0, -1.0, 1.0, 1.0),
            "mtv",
            Limits::new().with_min_num_features(1),
        );

        assert_eq!(recorder.processed, vec![("msk".to_string(), vec![0])]);
    }

    #[test]
    fn non_matching_partitions_are_never_reported() {
        let mwms = three_cities(["Cafe MTV", "Pizza", "Bar"]);

        let recorder = run(&mwms, rect(-1.0, -1.0, 1.0, 1.0), "mtv", Limits::new());

        assert_eq!(recorder.processed, vec![("msk".to_string(), vec![0])]);
        assert!(recorder.failed.is_empty());
    }

    #[test]
    fn unlimited_search_reaches_every_partition() {
        let mwms = three_cities(["Cafe MTV", "MTV", "Bar MTV"]);

        let recorder = run(&mwms, rect(-1.0, -1.0, 1.0, 1.0), "mtv", Limits::new());

        assert_eq!(recorder.names(), vec!["msk", "mtv", "zrh"]);
        assert!(recorder.processed.iter().all(|(_, f)| f == &vec![0]));
    }

    #[test]
    fn partitions_without_indexes_are_skipped() {
        let mut mwms = three_cities(["Cafe MTV", "MTV", "Bar MTV"]);
        let mut broken = city("ams", 0.5, 0.5, "MTV");
        broken.remove_section(INDEX_FILE_TAG);
        mwms.register_map(broken);

        let mut retrieval = Retrieval::new();
        retrieval.init(
            &mwms,
            rect(-1.0, -1.0, 1.0, 1.0),
            build_query_params("mtv", [Lang::En]),
            Limits::new(),
        );
        let ids: Vec<_> = retrieval.buckets().iter().map(|b| b.id().name()).collect();
        assert_eq!(ids, vec!["msk", "mtv", "zrh"]);
    }

    struct StaleRegistry {
        ids: Vec<MwmId>,
        mwms: MwmSet,
    }

    impl MwmRegistry for StaleRegistry {
        fn mwm_ids(&self) -> Vec<MwmId> {
            self.ids.clone()
        }

        fn handle(&self, id: &MwmId) -> MwmHandle {
            self.mwms.handle(id)
        }
    }

    #[test]
    fn dead_handles_are_skipped() {
        let mut mwms = three_cities(["Cafe MTV", "MTV", "Bar MTV"]);
        let ids = mwms.mwm_ids();
        assert!(mwms.deregister("mtv"));
        let registry = StaleRegistry { ids, mwms };

        let mut retrieval = Retrieval::new();
        retrieval.init(
            &registry,
            rect(-1.0, -1.0, 1.0, 1.0),
            build_query_params("mtv", [Lang::En]),
            Limits::new(),
        );
        assert_eq!(retrieval.buckets().len(), 2);

        let mut recorder = Recorder::default();
        retrieval.go(&mut recorder);
        assert_eq!(recorder.names(), vec!["msk", "zrh"]);
    }

    #[test]
    fn malformed_index_fails_only_its_partition() {
        let mut mwms = MwmSet::new();
        mwms.register_map(city("msk", 0.0, 0.0, "Cafe MTV"));
        let mut corrupt = city("mtv", 10.0, 0.0, "MTV");
        corrupt.set_section(SEARCH_INDEX_FILE_TAG, vec![0xc1, 0xc1, 0xc1]);
        mwms.register_map(corrupt);

        let recorder = run(&mwms, rect(-1.0, -1.0, 1.0, 1.0), "mtv", Limits::new());

        assert_eq!(recorder.failed, vec!["mtv".to_string()]);
        assert_eq!(recorder.names(), vec!["msk"]);
    }

    #[test]
    fn degenerate_viewport_terminates() {
        let mut mwms = MwmSet::new();
        mwms.register_map(whiskey_town());

        let recorder = run(&mwms, rect(0.0, 0.0, 0.0, 0.0), "whiskey", Limits::new());

        assert_eq!(recorder.names(), vec!["WhiskeyTown"]);
        assert_eq!(recorder.processed[0].1.len(), 36);
    }

    #[test]
    fn line_viewport_terminates() {
        let mut mwms = MwmSet::new();
        mwms.register_map(whiskey_town());

        let recorder = run(&mwms, rect(0.5, 0.0, 0.5, 1.0), "whiskey", Limits::new());

        assert_eq!(recorder.names(), vec!["WhiskeyTown"]);
        assert_eq!(recorder.processed[0].1.len(), 60);
    }

    #[test]
    fn stops_growing_once_the_world_is_spanned() {
        let line = rect(0.5, 0.0, 0.5, 1.0);
        assert!(still_growing(&line, &line.scaled(2.0)));
        assert!(!still_growing(&line, &line));

        let tall = line.scaled(1000.0);
        assert!(!still_growing(&tall, &tall.scaled(2.0)));

        let square = rect(0.0, 0.0, 1.0, 1.0);
        assert!(still_growing(&square, &square.scaled(2.0)));
        assert!(!is_finite(&square.scaled(f64::INFINITY)));
        assert!(!is_finite(&line.scaled(f64::INFINITY)));
    }

    #[test]
    fn ceiling_wins_over_an_unreached_floor() {
        let mut mwms = MwmSet::new();
        mwms.register_map(whiskey_town());

        let recorder = run(
            &mwms,
            rect(0.0, 0.0, 1.0, 1.0),
            "whiskey bar",
            Limits::new()
                .with_max_viewport_scale(1.0)
                .with_min_num_features(1000),
        );

        assert_eq!(recorder.names(), vec!["WhiskeyTown"]);
        assert_eq!(recorder.processed[0].1.len(), 36);
    }

    #[test]
    fn ceiling_below_one_shrinks_the_viewport() {
        let mut mwms = MwmSet::new();
        mwms.register_map(fine_whiskey_town());

        let mut retrieval = Retrieval::new();
        retrieval.init(
            &mwms,
            rect(0.0, 0.0, 2.0, 2.0),
            build_query_params("whiskey", [Lang::En]),
            Limits::new()
                .with_max_viewport_scale(0.5)
                .with_min_num_features(1000),
        );
        let mut recorder = Recorder::default();
        retrieval.go(&mut recorder);
        recorder.assert_well_formed();

        // Only (1, 1) lies in the halved viewport [0.5, 1.5].
        assert_eq!(recorder.processed, vec![("WhiskeyTown".to_string(), vec![11])]);
        assert_eq!(retrieval.buckets()[0].geometry_features(), &[11]);
        assert_eq!(retrieval.count_retrieved_features(), 1);
    }

    #[test]
    fn go_before_init_does_nothing() {
        let mut retrieval = Retrieval::new();
        assert_eq!(retrieval.state(), RetrievalState::Uninitialized);

        let mut calls = 0;
        retrieval.go(&mut |_: &MwmId, _: &[FeatureId]| calls += 1);

        assert_eq!(calls, 0);
        assert_eq!(retrieval.state(), RetrievalState::Done);
    }

    #[test]
    fn init_starts_a_fresh_search() {
        let mwms = three_cities(["Cafe MTV", "MTV", "Bar MTV"]);
        let viewport = rect(-1.0, -1.0, 1.0, 1.0);
        let params = build_query_params("mtv", [Lang::En]);

        let mut retrieval = Retrieval::new();
        let mut reported = Vec::new();
        for _ in 0..2 {
            retrieval.init(&mwms, viewport, params.clone(), Limits::new());
            retrieval.go(&mut |id: &MwmId, _: &[FeatureId]| {
                reported.push(id.name().to_string());
            });
        }

        assert_eq!(reported, vec!["msk", "mtv", "zrh", "msk", "mtv", "zrh"]);
    }

    #[test]
    fn counts_current_intersections() {
        let mut mwms = MwmSet::new();
        mwms.register_map(whiskey_town());

        let mut retrieval = Retrieval::new();
        retrieval.init(
            &mwms,
            rect(0.0, 0.0, 1.0, 1.0),
            build_query_params("whiskey", [Lang::En]),
            Limits::new().with_max_viewport_scale(1.0),
        );
        assert_eq!(retrieval.count_retrieved_features(), 0);

        retrieval.go(&mut |_: &MwmId, _: &[FeatureId]| {});
        assert_eq!(retrieval.count_retrieved_features(), 36);
        assert!(!retrieval.viewport_covers_all_mwms());
        assert!(retrieval.buckets()[0].is_finished());
    }
}
