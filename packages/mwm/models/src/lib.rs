#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared types for map data partitions ("mwms").
//!
//! This crate contains only data types and simple conversions. It has no
//! I/O and no index logic; see `map_search_mwm` for that.

use std::fmt;

use geo::{Coord, Rect};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Identifier of a feature inside one partition. Ids are dense and start
/// at 0 in the order features were added to the partition.
pub type FeatureId = u32;

/// Container section holding the text trie index.
pub const SEARCH_INDEX_FILE_TAG: &str = "search";

/// Container section holding the scale (spatial) index.
pub const INDEX_FILE_TAG: &str = "idx";

/// Container section holding the feature records.
pub const FEATURES_FILE_TAG: &str = "dat";

/// Container format version written by this workspace.
pub const CONTAINER_FORMAT_VERSION: u32 = 1;

/// Identifies one registration of a partition.
///
/// Re-registering a partition under the same name yields a new id with
/// a higher generation, so ids of replaced partitions never compare
/// equal to the live one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MwmId {
    name: String,
    generation: u64,
}

impl MwmId {
    #[must_use]
    pub fn new(name: impl Into<String>, generation: u64) -> Self {
        Self {
            name: name.into(),
            generation,
        }
    }

    /// Partition name, e.g. `"WhiskeyTown"`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }
}

impl fmt::Display for MwmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.generation)
    }
}

/// Languages a feature name can be indexed under.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
#[repr(u8)]
pub enum Lang {
    Default = 0,
    En = 1,
    Ja = 2,
    Fr = 3,
    KoRm = 4,
    Ar = 5,
    De = 6,
    IntName = 7,
    Ru = 8,
    Sv = 9,
    Zh = 10,
    Fi = 11,
    Be = 12,
    Ka = 13,
    Ko = 14,
    He = 15,
    Nl = 16,
    Ga = 17,
    JaRm = 18,
    El = 19,
    It = 20,
    Es = 21,
    Th = 22,
    Uk = 23,
    Pl = 24,
    Pt = 25,
    Tr = 26,
}

impl Lang {
    pub const ALL: &[Self] = &[
        Self::Default,
        Self::En,
        Self::Ja,
        Self::Fr,
        Self::KoRm,
        Self::Ar,
        Self::De,
        Self::IntName,
        Self::Ru,
        Self::Sv,
        Self::Zh,
        Self::Fi,
        Self::Be,
        Self::Ka,
        Self::Ko,
        Self::He,
        Self::Nl,
        Self::Ga,
        Self::JaRm,
        Self::El,
        Self::It,
        Self::Es,
        Self::Th,
        Self::Uk,
        Self::Pl,
        Self::Pt,
        Self::Tr,
    ];

    /// Numeric index used in the binary index encodings.
    #[must_use]
    pub const fn index(self) -> u8 {
        self as u8
    }

    /// Inverse of [`Lang::index`].
    #[must_use]
    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(usize::from(index)).copied()
    }
}

/// Fixed metadata of a partition, read once when it is registered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataHeader {
    /// Container format version the partition was written with.
    pub format_version: u32,
    /// Data version; newer registrations replace older ones.
    pub version: u64,
    /// Bounding rectangle of every feature in the partition.
    pub bounds: Rect<f64>,
    /// Inclusive `(min, max)` scales the scale index was built for.
    pub scale_range: (u8, u8),
}

/// A single map feature as stored in the features section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    /// Feature position in projected coordinates.
    pub point: Coord<f64>,
    /// Names keyed by [`Lang::index`].
    pub names: Vec<(u8, String)>,
    /// Coarsest scale at which the feature is visible.
    pub min_scale: u8,
}

impl FeatureRecord {
    /// Creates a point feature with one name.
    #[must_use]
    pub fn poi(point: Coord<f64>, name: impl Into<String>, lang: Lang) -> Self {
        Self {
            point,
            names: vec![(lang.index(), name.into())],
            min_scale: 0,
        }
    }

    /// Returns the name in `lang`, if present.
    #[must_use]
    pub fn name(&self, lang: Lang) -> Option<&str> {
        self.names
            .iter()
            .find(|(index, _)| *index == lang.index())
            .map(|(_, name)| name.as_str())
    }

    /// Returns the first name in any language.
    #[must_use]
    pub fn any_name(&self) -> Option<&str> {
        self.names.first().map(|(_, name)| name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn lang_indices_round_trip() {
        for (position, lang) in Lang::ALL.iter().enumerate() {
            assert_eq!(usize::from(lang.index()), position);
            assert_eq!(Lang::from_index(lang.index()), Some(*lang));
        }
        assert_eq!(Lang::from_index(200), None);
    }

    #[test]
    fn lang_codes_parse() {
        assert_eq!(Lang::from_str("en").unwrap(), Lang::En);
        assert_eq!(Lang::from_str("int_name").unwrap(), Lang::IntName);
        assert_eq!(Lang::KoRm.as_ref(), "ko_rm");
        assert!(Lang::from_str("klingon").is_err());
    }

    #[test]
    fn mwm_ids_differ_by_generation() {
        let first = MwmId::new("msk", 1);
        let second = MwmId::new("msk", 2);
        assert_ne!(first, second);
        assert_eq!(first.name(), second.name());
        assert_eq!(second.to_string(), "msk#2");
    }

    #[test]
    fn feature_names_by_lang() {
        let feature = FeatureRecord::poi(Coord { x: 1.0, y: 2.0 }, "Whiskey bar", Lang::En);
        assert_eq!(feature.name(Lang::En), Some("Whiskey bar"));
        assert_eq!(feature.name(Lang::Ru), None);
        assert_eq!(feature.any_name(), Some("Whiskey bar"));
    }
}
