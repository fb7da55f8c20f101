//! The two index matchers.
//!
//! Both return feature ids in no particular order; the bucket sorts and
//! deduplicates them before intersecting.

use std::collections::BTreeSet;

use geo::Rect;
use map_search_geometry::scales::{cell_level_for_scale, clamp_scale};
use map_search_geometry::{RectExt, cover};
use map_search_mwm::{DataHeader, MwmError, MwmValue, ScaleIndex, SearchTrie};
use map_search_mwm_models::{FeatureId, Lang};
use map_search_retrieval_models::QueryParams;

/// Features of `value` whose names match `params`.
///
/// # Errors
///
/// Returns an error if the text trie is missing or malformed.
pub fn retrieve_address_features(
    value: &MwmValue,
    params: &QueryParams,
) -> Result<Vec<FeatureId>, MwmError> {
    retrieve_address_features_filtered(value, params, |_| true)
}

/// Like [`retrieve_address_features`], keeping only ids accepted by
/// `filter`.
///
/// # Errors
///
/// Returns an error if the text trie is missing or malformed.
pub fn retrieve_address_features_filtered(
    value: &MwmValue,
    params: &QueryParams,
    filter: impl Fn(FeatureId) -> bool,
) -> Result<Vec<FeatureId>, MwmError> {
    let trie = value.search_index()?;
    let mut features = Vec::new();
    match_features_in_trie(params, &trie, filter, |id| features.push(id));
    Ok(features)
}

/// Features of `value` located in `viewport`, looked up at the query's
/// scale clamped to the partition's scale range.
///
/// The lookup works on whole quadtree cells, so features close to the
/// viewport border may be included.
///
/// # Errors
///
/// Returns an error if the scale index is missing or malformed.
pub fn retrieve_geometry_features(
    value: &MwmValue,
    viewport: &Rect<f64>,
    params: &QueryParams,
) -> Result<Vec<FeatureId>, MwmError> {
    let index = value.scale_index()?;
    Ok(geometry_features_in_index(
        &index,
        value.header(),
        viewport,
        params,
    ))
}

/// Like [`retrieve_geometry_features`] over an already decoded index.
#[must_use]
pub fn geometry_features_in_index(
    index: &ScaleIndex,
    header: &DataHeader,
    viewport: &Rect<f64>,
    params: &QueryParams,
) -> Vec<FeatureId> {
    debug_assert!(viewport.intersects_rect(&header.bounds));

    let scale = clamp_scale(params.scale, header.scale_range);
    let intervals = cover(viewport, cell_level_for_scale(scale));

    let mut features = Vec::new();
    for (begin, end) in intervals {
        index.for_each_in_interval_and_scale(begin, end, scale, |id| features.push(id));
    }
    features
}

/// Walks `trie` for every word of `params` and hands each feature that
/// matches all words and passes `filter` to `collector`, once.
///
/// A full word matches a feature when one of its forms equals one of the
/// feature's tokens; the prefix word matches when one of its forms
/// starts one of them. Only languages allowed by `params` are searched.
pub fn match_features_in_trie(
    params: &QueryParams,
    trie: &SearchTrie,
    filter: impl Fn(FeatureId) -> bool,
    mut collector: impl FnMut(FeatureId),
) {
    if params.is_empty() {
        return;
    }

    let langs: Vec<Lang> = trie
        .langs()
        .filter(|&lang| params.is_lang_allowed(lang))
        .collect();

    let mut matched: Option<BTreeSet<FeatureId>> = None;

    for forms in &params.tokens {
        let mut word = BTreeSet::new();
        for &lang in &langs {
            for form in forms {
                if let Some(node) = trie.find(lang, form) {
                    word.extend(node.values().iter().copied());
                }
            }
        }
        if !narrow(&mut matched, word) {
            return;
        }
    }

    if !params.prefix_tokens.is_empty() {
        let mut word = BTreeSet::new();
        for &lang in &langs {
            for form in &params.prefix_tokens {
                if let Some(node) = trie.find(lang, form) {
                    node.for_each_in_subtree(|id| {
                        word.insert(id);
                    });
                }
            }
        }
        if !narrow(&mut matched, word) {
            return;
        }
    }

    matched
        .unwrap_or_default()
        .into_iter()
        .filter(|&id| filter(id))
        .for_each(&mut collector);
}

/// Intersects the running match set with one word's matches. Returns
/// `false` once nothing can match anymore.
fn narrow(matched: &mut Option<BTreeSet<FeatureId>>, word: BTreeSet<FeatureId>) -> bool {
    let next = match matched.take() {
        None => word,
        Some(current) => current.intersection(&word).copied().collect(),
    };
    let any = !next.is_empty();
    *matched = Some(next);
    any
}
