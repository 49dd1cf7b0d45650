//! Handles and node payload types of the media set arena.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use tracing::warn;

use arinc645::{CheckValue, CheckValueType};
use arinc665_files::{LoadType, TargetHardwareIdPositions};

/// Handle to a directory of a [`crate::MediaSet`].
///
/// Carries the identity of the owning media set; handles are only valid
/// against the set that created them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DirectoryId {
    pub(crate) set: u64,
    pub(crate) index: u32,
}

/// Handle to a file (regular file, load or batch) of a [`crate::MediaSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId {
    pub(crate) set: u64,
    pub(crate) index: u32,
}

/// A container within the media set tree: the set root or a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerId {
    Root,
    Directory(DirectoryId),
}

/// Mapping from files to their source paths outside the media set.
///
/// Produced by the decompiler, consumed by the compiler to locate payload
/// bytes.
pub type FilePathMapping = HashMap<FileId, PathBuf>;

/// Check values verified or computed per file during decompilation.
pub type CheckValues = HashMap<FileId, BTreeSet<CheckValue>>;

/// Payload discriminator of a file node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileKind {
    /// Opaque payload sourced through the external file mapping.
    Regular,
    /// A load: header file plus referenced data and support files.
    Load(Load),
    /// A batch: target hardware to load assignments.
    Batch(Batch),
}

impl FileKind {
    pub fn name(&self) -> &'static str {
        match self {
            FileKind::Regular => "regular file",
            FileKind::Load(_) => "load",
            FileKind::Batch(_) => "batch",
        }
    }
}

/// A data or support file reference of a [`Load`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadFileReference {
    pub file: FileId,
    /// Part number of the referenced file within this load.
    pub part_number: String,
    /// Check value type override for this file reference.
    pub check_value_type: Option<CheckValueType>,
}

/// Load payload of a file node.
///
/// The data and support file lists are mutated through
/// [`crate::MediaSet::add_load_data_file`] and
/// [`crate::MediaSet::add_load_support_file`], which validate that the
/// referenced files live in the same media set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Load {
    pub part_number: String,
    pub part_flags: u16,
    pub load_type: Option<LoadType>,
    /// Target hardware identifiers with their positions, in insertion
    /// order. An empty position list is allowed.
    pub target_hardware_id_positions: Vec<TargetHardwareIdPositions>,
    pub(crate) data_files: Vec<LoadFileReference>,
    pub(crate) support_files: Vec<LoadFileReference>,
    pub(crate) user_defined_data: Vec<u8>,
    pub load_check_value_type: Option<CheckValueType>,
    pub data_files_check_value_type: Option<CheckValueType>,
    pub support_files_check_value_type: Option<CheckValueType>,
}

impl Load {
    /// The target hardware identifiers, without positions.
    pub fn target_hardware_ids(&self) -> Vec<&str> {
        self.target_hardware_id_positions
            .iter()
            .map(|entry| entry.target_hardware_id.as_str())
            .collect()
    }

    /// Adds a target hardware identifier with the given positions.
    ///
    /// An already present identifier gets its positions replaced.
    pub fn set_target_hardware_id(
        &mut self,
        target_hardware_id: impl Into<String>,
        positions: Vec<String>,
    ) {
        let target_hardware_id = target_hardware_id.into();
        if let Some(existing) = self
            .target_hardware_id_positions
            .iter_mut()
            .find(|entry| entry.target_hardware_id == target_hardware_id)
        {
            existing.positions = positions;
        } else {
            self.target_hardware_id_positions
                .push(TargetHardwareIdPositions {
                    target_hardware_id,
                    positions,
                });
        }
    }

    pub fn data_files(&self) -> &[LoadFileReference] {
        &self.data_files
    }

    pub fn support_files(&self) -> &[LoadFileReference] {
        &self.support_files
    }

    pub fn user_defined_data(&self) -> &[u8] {
        &self.user_defined_data
    }

    /// Sets the user-defined data, padding odd-length input with one zero
    /// byte.
    pub fn set_user_defined_data(&mut self, mut user_defined_data: Vec<u8>) {
        if user_defined_data.len() % 2 != 0 {
            warn!(
                length = user_defined_data.len(),
                "user defined data must be 2-byte aligned - extending range"
            );
            user_defined_data.push(0);
        }
        self.user_defined_data = user_defined_data;
    }
}

/// The loads assigned to one target hardware identifier of a [`Batch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchTarget {
    pub target_hardware_id: String,
    pub(crate) loads: Vec<FileId>,
}

impl BatchTarget {
    pub fn loads(&self) -> &[FileId] {
        &self.loads
    }
}

/// Batch payload of a file node.
///
/// The part number is validated against the ARINC 665 part number format
/// at creation time. Load assignments are added through
/// [`crate::MediaSet::add_batch_load`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Batch {
    pub part_number: String,
    pub comment: String,
    pub(crate) targets: Vec<BatchTarget>,
}

impl Batch {
    /// Target hardware groups in insertion order.
    pub fn targets(&self) -> &[BatchTarget] {
        &self.targets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_set_target_hardware_id_replaces_positions() {
        let mut load = Load::default();
        load.set_target_hardware_id("FMS-L", vec![]);
        load.set_target_hardware_id("FMS-R", vec!["1".to_string()]);
        load.set_target_hardware_id("FMS-L", vec!["2".to_string()]);

        assert_eq!(load.target_hardware_ids(), vec!["FMS-L", "FMS-R"]);
        assert_eq!(
            load.target_hardware_id_positions[0].positions,
            vec!["2".to_string()]
        );
    }

    #[test]
    fn test_odd_user_defined_data_padded() {
        let mut load = Load::default();
        load.set_user_defined_data(vec![1, 2, 3]);
        assert_eq!(load.user_defined_data(), [1, 2, 3, 0]);

        load.set_user_defined_data(vec![1, 2]);
        assert_eq!(load.user_defined_data(), [1, 2]);
    }
}
