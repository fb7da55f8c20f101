#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared types for viewport retrieval.
//!
//! [`QueryParams`] is what a tokenized query looks like to the matchers,
//! [`Limits`] bounds the expanding viewport search, and [`SearchConfig`]
//! is the file form of both.

use std::collections::BTreeSet;

use map_search_geometry::UPPER_SCALE;
use map_search_mwm_models::Lang;
use serde::{Deserialize, Serialize};

/// A normalized, tokenized search query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParams {
    /// Complete query words. Each inner set holds the alternative forms
    /// (synonyms) of one word; a feature must match one form of every set.
    pub tokens: Vec<Vec<String>>,
    /// Forms of the trailing, possibly incomplete word. Matched as a
    /// prefix. Empty when the query ends with a delimiter.
    #[serde(default)]
    pub prefix_tokens: Vec<String>,
    /// Languages whose names are searched. Empty means every language.
    #[serde(default)]
    pub langs: BTreeSet<Lang>,
    /// Preferred resolution scale for spatial lookups. Clamped to each
    /// partition's supported range.
    #[serde(default = "default_scale")]
    pub scale: u8,
}

const fn default_scale() -> u8 {
    UPPER_SCALE
}

impl Default for QueryParams {
    fn default() -> Self {
        Self {
            tokens: Vec::new(),
            prefix_tokens: Vec::new(),
            langs: BTreeSet::new(),
            scale: default_scale(),
        }
    }
}

impl QueryParams {
    /// Returns `true` if the query has no words at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty() && self.prefix_tokens.is_empty()
    }

    /// Resets to an empty query, keeping nothing.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Returns `true` if names in `lang` should be searched.
    #[must_use]
    pub fn is_lang_allowed(&self, lang: Lang) -> bool {
        self.langs.is_empty() || self.langs.contains(&lang)
    }
}

/// Optional termination limits for the expanding viewport search.
///
/// Both limits are unset by default. An unset limit imposes no
/// constraint and can only be observed through its `Option` getter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Limits {
    #[serde(default)]
    min_num_features: Option<u64>,
    #[serde(default)]
    max_viewport_scale: Option<f64>,
}

impl Limits {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            min_num_features: None,
            max_viewport_scale: None,
        }
    }

    /// Stop expanding once at least this many features were retrieved.
    pub const fn set_min_num_features(&mut self, min_num_features: u64) {
        self.min_num_features = Some(min_num_features);
    }

    /// Never expand the viewport beyond this factor of its original size.
    pub const fn set_max_viewport_scale(&mut self, max_viewport_scale: f64) {
        self.max_viewport_scale = Some(max_viewport_scale);
    }

    /// Builder form of [`Limits::set_min_num_features`].
    #[must_use]
    pub const fn with_min_num_features(mut self, min_num_features: u64) -> Self {
        self.set_min_num_features(min_num_features);
        self
    }

    /// Builder form of [`Limits::set_max_viewport_scale`].
    #[must_use]
    pub const fn with_max_viewport_scale(mut self, max_viewport_scale: f64) -> Self {
        self.set_max_viewport_scale(max_viewport_scale);
        self
    }

    #[must_use]
    pub const fn is_min_num_features_set(&self) -> bool {
        self.min_num_features.is_some()
    }

    #[must_use]
    pub const fn is_max_viewport_scale_set(&self) -> bool {
        self.max_viewport_scale.is_some()
    }

    #[must_use]
    pub const fn min_num_features(&self) -> Option<u64> {
        self.min_num_features
    }

    #[must_use]
    pub const fn max_viewport_scale(&self) -> Option<f64> {
        self.max_viewport_scale
    }
}

/// File form of a search setup.
///
/// ```toml
/// langs = ["en"]
/// scale = 17
///
/// [limits]
/// min_num_features = 8
/// max_viewport_scale = 5.0
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default)]
    pub langs: Vec<Lang>,
    #[serde(default)]
    pub scale: Option<u8>,
    #[serde(default)]
    pub limits: Limits,
}
