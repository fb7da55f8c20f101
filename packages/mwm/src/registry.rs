//! Registry of loaded partitions.
//!
//! [`MwmSet`] owns every registered partition. Callers acquire an
//! [`MwmHandle`] per partition; a live handle shares ownership of the
//! partition data, so the data stays valid for as long as the handle is
//! held, even if the partition is deregistered meanwhile.

use std::path::Path;
use std::sync::Arc;

use map_search_mwm_models::{
    DataHeader, FEATURES_FILE_TAG, FeatureRecord, INDEX_FILE_TAG, MwmId, SEARCH_INDEX_FILE_TAG,
};

use crate::container::MwmContainer;
use crate::scale_index::ScaleIndex;
use crate::trie::SearchTrie;
use crate::MwmError;

/// Outcome of [`MwmSet::register_map`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegResult {
    /// The partition was added, or replaced an older version.
    Success,
    /// The same version is already registered; its handle is returned.
    VersionAlreadyExists,
    /// A newer version is already registered; the returned handle is dead.
    VersionTooOld,
}

/// Registration-time information about a partition.
#[derive(Debug, Clone, PartialEq)]
pub struct MwmInfo {
    pub id: MwmId,
    pub header: DataHeader,
}

/// A registered partition's data.
#[derive(Debug)]
pub struct MwmValue {
    id: MwmId,
    container: MwmContainer,
}

impl MwmValue {
    #[must_use]
    pub const fn id(&self) -> &MwmId {
        &self.id
    }

    #[must_use]
    pub const fn header(&self) -> &DataHeader {
        self.container.header()
    }

    #[must_use]
    pub const fn container(&self) -> &MwmContainer {
        &self.container
    }

    /// Returns `true` if the partition has a text trie section.
    #[must_use]
    pub fn has_search_index(&self) -> bool {
        self.container.is_exist(SEARCH_INDEX_FILE_TAG)
    }

    /// Returns `true` if the partition has a scale index section.
    #[must_use]
    pub fn has_geometry_index(&self) -> bool {
        self.container.is_exist(INDEX_FILE_TAG)
    }

    /// Decodes the text trie.
    ///
    /// # Errors
    ///
    /// Returns an error if the section is missing or malformed.
    pub fn search_index(&self) -> Result<SearchTrie, MwmError> {
        let bytes = self
            .container
            .section(SEARCH_INDEX_FILE_TAG)
            .ok_or(MwmError::MissingSection(SEARCH_INDEX_FILE_TAG))?;
        SearchTrie::decode(bytes)
    }

    /// Decodes the scale index.
    ///
    /// # Errors
    ///
    /// Returns an error if the section is missing or malformed.
    pub fn scale_index(&self) -> Result<ScaleIndex, MwmError> {
        let bytes = self
            .container
            .section(INDEX_FILE_TAG)
            .ok_or(MwmError::MissingSection(INDEX_FILE_TAG))?;
        ScaleIndex::decode(bytes)
    }

    /// Decodes the feature records, indexed by feature id.
    ///
    /// # Errors
    ///
    /// Returns an error if the section is missing or malformed.
    pub fn features(&self) -> Result<Vec<FeatureRecord>, MwmError> {
        let bytes = self
            .container
            .section(FEATURES_FILE_TAG)
            .ok_or(MwmError::MissingSection(FEATURES_FILE_TAG))?;
        rmp_serde::from_slice(bytes).map_err(|e| MwmError::malformed(FEATURES_FILE_TAG, e.to_string()))
    }
}

/// A possibly-dead reference to a registered partition.
#[derive(Debug, Clone)]
pub struct MwmHandle {
    id: MwmId,
    value: Option<Arc<MwmValue>>,
}

impl MwmHandle {
    fn alive(value: Arc<MwmValue>) -> Self {
        Self {
            id: value.id.clone(),
            value: Some(value),
        }
    }

    const fn dead(id: MwmId) -> Self {
        Self { id, value: None }
    }

    /// Returns `true` if the handle refers to partition data.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.value.is_some()
    }

    #[must_use]
    pub const fn id(&self) -> &MwmId {
        &self.id
    }

    /// The partition data, or `None` for a dead handle.
    #[must_use]
    pub fn value(&self) -> Option<&MwmValue> {
        self.value.as_deref()
    }

    /// Releases the handle, keeping the partition data alive.
    #[must_use]
    pub fn into_value(self) -> Option<Arc<MwmValue>> {
        self.value
    }
}

/// The partition source consumed by the retrieval controller.
pub trait MwmRegistry {
    /// Ids of every registered partition, in registration order.
    fn mwm_ids(&self) -> Vec<MwmId>;

    /// Acquires a handle; dead if `id` is no longer registered.
    fn handle(&self, id: &MwmId) -> MwmHandle;
}

/// In-memory registry of partitions.
#[derive(Debug, Default)]
pub struct MwmSet {
    mwms: Vec<Arc<MwmValue>>,
    next_generation: u64,
}

impl MwmSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a partition.
    ///
    /// A partition with the same name is replaced only by a newer
    /// version; the replacement keeps the original registration slot.
    pub fn register_map(&mut self, container: MwmContainer) -> (MwmHandle, RegResult) {
        let name = container.name().to_string();
        let version = container.header().version;

        if let Some(slot) = self.mwms.iter().position(|v| v.id.name() == name) {
            let existing = &self.mwms[slot];
            let existing_version = existing.header().version;

            if version == existing_version {
                return (
                    MwmHandle::alive(Arc::clone(existing)),
                    RegResult::VersionAlreadyExists,
                );
            }
            if version < existing_version {
                log::debug!(
                    "Ignoring mwm '{name}' v{version}: v{existing_version} is registered"
                );
                return (
                    MwmHandle::dead(MwmId::new(name, 0)),
                    RegResult::VersionTooOld,
                );
            }

            let value = self.new_value(container);
            log::info!("Replaced mwm '{name}' v{existing_version} with v{version}");
            self.mwms[slot] = Arc::clone(&value);
            return (MwmHandle::alive(value), RegResult::Success);
        }

        let value = self.new_value(container);
        log::info!("Registered mwm {}", value.id);
        self.mwms.push(Arc::clone(&value));
        (MwmHandle::alive(value), RegResult::Success)
    }

    /// Reads a container file and registers it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or decoded.
    pub fn register_map_file(
        &mut self,
        path: impl AsRef<Path>,
    ) -> Result<(MwmHandle, RegResult), MwmError> {
        let container = MwmContainer::read_from_file(path)?;
        Ok(self.register_map(container))
    }

    /// Removes the partition called `name`. Handles already acquired stay
    /// usable; new acquisitions return dead handles.
    pub fn deregister(&mut self, name: &str) -> bool {
        let before = self.mwms.len();
        self.mwms.retain(|v| v.id.name() != name);
        let removed = self.mwms.len() != before;
        if removed {
            log::info!("Deregistered mwm '{name}'");
        }
        removed
    }

    /// Information about every registered partition.
    #[must_use]
    pub fn mwms_info(&self) -> Vec<MwmInfo> {
        self.mwms
            .iter()
            .map(|v| MwmInfo {
                id: v.id.clone(),
                header: v.header().clone(),
            })
            .collect()
    }

    /// Acquires a handle by partition name.
    #[must_use]
    pub fn handle_by_name(&self, name: &str) -> MwmHandle {
        self.mwms
            .iter()
            .find(|v| v.id.name() == name)
            .map_or_else(
                || MwmHandle::dead(MwmId::new(name, 0)),
                |v| MwmHandle::alive(Arc::clone(v)),
            )
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.mwms.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mwms.is_empty()
    }

    fn new_value(&mut self, container: MwmContainer) -> Arc<MwmValue> {
        self.next_generation += 1;
        let id = MwmId::new(container.name(), self.next_generation);
        Arc::new(MwmValue { id, container })
    }
}

impl MwmRegistry for MwmSet {
    fn mwm_ids(&self) -> Vec<MwmId> {
        self.mwms.iter().map(|v| v.id.clone()).collect()
    }

    fn handle(&self, id: &MwmId) -> MwmHandle {
        self.mwms
            .iter()
            .find(|v| &v.id == id)
            .map_or_else(
                || MwmHandle::dead(id.clone()),
                |v| MwmHandle::alive(Arc::clone(v)),
            )
    }
}
