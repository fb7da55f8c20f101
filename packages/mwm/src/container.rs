//! Partition container: a header plus named byte sections.

use std::collections::BTreeMap;
use std::path::Path;

use map_search_mwm_models::{CONTAINER_FORMAT_VERSION, DataHeader};
use serde::{Deserialize, Serialize};

use crate::MwmError;

/// One partition's data as written to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MwmContainer {
    name: String,
    header: DataHeader,
    sections: BTreeMap<String, Vec<u8>>,
}

impl MwmContainer {
    #[must_use]
    pub fn new(name: impl Into<String>, header: DataHeader) -> Self {
        Self {
            name: name.into(),
            header,
            sections: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn header(&self) -> &DataHeader {
        &self.header
    }

    /// Returns `true` if a section named `tag` is present.
    #[must_use]
    pub fn is_exist(&self, tag: &str) -> bool {
        self.sections.contains_key(tag)
    }

    /// Returns the raw bytes of section `tag`.
    #[must_use]
    pub fn section(&self, tag: &str) -> Option<&[u8]> {
        self.sections.get(tag).map(Vec::as_slice)
    }

    /// Adds or replaces section `tag`.
    pub fn set_section(&mut self, tag: impl Into<String>, bytes: Vec<u8>) {
        self.sections.insert(tag.into(), bytes);
    }

    /// Removes section `tag`, returning its bytes.
    pub fn remove_section(&mut self, tag: &str) -> Option<Vec<u8>> {
        self.sections.remove(tag)
    }

    /// Serializes the container.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, MwmError> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    /// Deserializes a container and checks its format version.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a container or were written
    /// by an unsupported format version.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MwmError> {
        let container: Self = rmp_serde::from_slice(bytes)?;
        if container.header.format_version != CONTAINER_FORMAT_VERSION {
            return Err(MwmError::UnsupportedFormat {
                found: container.header.format_version,
                expected: CONTAINER_FORMAT_VERSION,
            });
        }
        Ok(container)
    }

    /// Writes the container to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), MwmError> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;
        std::fs::write(path, &bytes)?;
        log::debug!(
            "Wrote mwm '{}' ({} bytes) to {}",
            self.name,
            bytes.len(),
            path.display()
        );
        Ok(())
    }

    /// Reads a container from `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or decoded.
    pub fn read_from_file(path: impl AsRef<Path>) -> Result<Self, MwmError> {
        let bytes = std::fs::read(path.as_ref())?;
        Self::from_bytes(&bytes)
    }
}
