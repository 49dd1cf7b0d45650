//! The media set arena and its operations.

use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

use arinc645::CheckValueType;
use arinc665_files::{MediumNumber, PartNumber};

use crate::types::{
    Batch, BatchTarget, ContainerId, DirectoryId, FileId, FileKind, Load, LoadFileReference,
};
use crate::{Error, Result};

// Media set instance identities; embedded into handles so a handle from one
// set cannot address another.
static NEXT_SET_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
struct DirectoryNode {
    name: String,
    parent: ContainerId,
    default_medium_number: Option<MediumNumber>,
}

#[derive(Debug)]
struct FileNode {
    name: String,
    parent: ContainerId,
    medium_number: Option<MediumNumber>,
    check_value_type: Option<CheckValueType>,
    kind: FileKind,
}

/// An ARINC 665 media set: part number, media, the directory tree and all
/// files, loads and batches.
///
/// The set owns every node; see the crate documentation for the handle
/// scheme.
#[derive(Debug)]
pub struct MediaSet {
    set_id: u64,
    part_number: String,
    media_count: MediumNumber,

    /// Default medium for files without an explicit assignment anywhere on
    /// their parent chain.
    pub default_medium_number: MediumNumber,

    /// Media set check value type; `None` means *not used*.
    pub media_set_check_value_type: Option<CheckValueType>,
    /// List of Files check value type; `None` inherits the media set type.
    pub list_of_files_check_value_type: Option<CheckValueType>,
    /// List of Loads check value type; `None` inherits the media set type.
    pub list_of_loads_check_value_type: Option<CheckValueType>,
    /// List of Batches check value type; `None` inherits the media set type.
    pub list_of_batches_check_value_type: Option<CheckValueType>,
    /// Check value type for file list entries without an override.
    pub files_check_value_type: CheckValueType,

    /// User-defined data carried in every medium's `FILES.LUM`.
    pub files_user_defined_data: Vec<u8>,
    /// User-defined data carried in every medium's `LOADS.LUM`.
    pub loads_user_defined_data: Vec<u8>,
    /// User-defined data carried in every medium's `BATCHES.LUM`.
    pub batches_user_defined_data: Vec<u8>,

    directories: Vec<DirectoryNode>,
    files: Vec<FileNode>,
}

impl MediaSet {
    /// Creates an empty media set with one medium.
    pub fn new(part_number: impl Into<String>) -> Self {
        let part_number = part_number.into();
        debug!(part_number, "creating media set");

        Self {
            set_id: NEXT_SET_ID.fetch_add(1, Ordering::Relaxed),
            part_number,
            media_count: MediumNumber::FIRST,
            default_medium_number: MediumNumber::FIRST,
            media_set_check_value_type: None,
            list_of_files_check_value_type: None,
            list_of_loads_check_value_type: None,
            list_of_batches_check_value_type: None,
            files_check_value_type: CheckValueType::NotUsed,
            files_user_defined_data: Vec::new(),
            loads_user_defined_data: Vec::new(),
            batches_user_defined_data: Vec::new(),
            directories: Vec::new(),
            files: Vec::new(),
        }
    }

    pub fn part_number(&self) -> &str {
        &self.part_number
    }

    pub fn set_part_number(&mut self, part_number: impl Into<String>) {
        self.part_number = part_number.into();
    }

    /// Number of media; the media are numbered contiguously `1..=count`.
    pub fn media_count(&self) -> MediumNumber {
        self.media_count
    }

    pub fn set_media_count(&mut self, media_count: MediumNumber) {
        self.media_count = media_count;
    }

    /// The medium numbers `1..=media_count` in order.
    pub fn media_numbers(&self) -> impl Iterator<Item = MediumNumber> + use<> {
        (1..=self.media_count.get()).map(MediumNumber::new)
    }

    /// Media set check value type with `None` resolved to `NotUsed`.
    pub fn effective_media_set_check_value_type(&self) -> CheckValueType {
        self.media_set_check_value_type
            .unwrap_or(CheckValueType::NotUsed)
    }

    pub fn effective_list_of_files_check_value_type(&self) -> CheckValueType {
        self.list_of_files_check_value_type
            .or(self.media_set_check_value_type)
            .unwrap_or(CheckValueType::NotUsed)
    }

    pub fn effective_list_of_loads_check_value_type(&self) -> CheckValueType {
        self.list_of_loads_check_value_type
            .or(self.media_set_check_value_type)
            .unwrap_or(CheckValueType::NotUsed)
    }

    pub fn effective_list_of_batches_check_value_type(&self) -> CheckValueType {
        self.list_of_batches_check_value_type
            .or(self.media_set_check_value_type)
            .unwrap_or(CheckValueType::NotUsed)
    }

    // ------------------------------------------------------------------
    // Tree construction
    // ------------------------------------------------------------------

    /// Creates a directory under `parent`.
    pub fn create_directory(
        &mut self,
        parent: ContainerId,
        name: impl Into<String>,
    ) -> Result<DirectoryId> {
        let name = name.into();
        self.check_container(parent)?;
        self.check_name_free(parent, &name)?;

        let index = u32::try_from(self.directories.len())
            .map_err(|_| Error::UnknownEntity { entity: "directory" })?;
        self.directories.push(DirectoryNode {
            name,
            parent,
            default_medium_number: None,
        });

        Ok(DirectoryId {
            set: self.set_id,
            index,
        })
    }

    /// Creates a regular file under `parent`.
    pub fn create_regular_file(
        &mut self,
        parent: ContainerId,
        name: impl Into<String>,
    ) -> Result<FileId> {
        self.create_file_node(parent, name.into(), FileKind::Regular)
    }

    /// Creates a load under `parent`. `name` is the load header filename.
    pub fn create_load(&mut self, parent: ContainerId, name: impl Into<String>) -> Result<FileId> {
        self.create_file_node(parent, name.into(), FileKind::Load(Load::default()))
    }

    /// Creates a batch under `parent`.
    ///
    /// The part number must conform to the ARINC 665 part number format.
    pub fn create_batch(
        &mut self,
        parent: ContainerId,
        name: impl Into<String>,
        part_number: &str,
    ) -> Result<FileId> {
        let part_number: PartNumber = part_number.parse()?;

        self.create_file_node(
            parent,
            name.into(),
            FileKind::Batch(Batch {
                part_number: part_number.to_string(),
                ..Batch::default()
            }),
        )
    }

    fn create_file_node(
        &mut self,
        parent: ContainerId,
        name: String,
        kind: FileKind,
    ) -> Result<FileId> {
        self.check_container(parent)?;
        self.check_name_free(parent, &name)?;

        let index =
            u32::try_from(self.files.len()).map_err(|_| Error::UnknownEntity { entity: "file" })?;
        self.files.push(FileNode {
            name,
            parent,
            medium_number: None,
            check_value_type: None,
            kind,
        });

        Ok(FileId {
            set: self.set_id,
            index,
        })
    }

    /// Renames a file, enforcing sibling-name uniqueness.
    pub fn rename_file(&mut self, file: FileId, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        let parent = self.file_node(file)?.parent;
        if self.file_node(file)?.name != name {
            self.check_name_free(parent, &name)?;
        }
        self.file_node_mut(file)?.name = name;
        Ok(())
    }

    /// Renames a directory, enforcing sibling-name uniqueness.
    pub fn rename_directory(&mut self, directory: DirectoryId, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        let parent = self.directory_node(directory)?.parent;
        if self.directory_node(directory)?.name != name {
            self.check_name_free(parent, &name)?;
        }
        self.directory_node_mut(directory)?.name = name;
        Ok(())
    }

    /// Moves a file to another container of the same media set.
    pub fn move_file(&mut self, file: FileId, new_parent: ContainerId) -> Result<()> {
        self.check_container(new_parent)?;
        let name = self.file_node(file)?.name.clone();
        self.check_name_free(new_parent, &name)?;
        self.file_node_mut(file)?.parent = new_parent;
        Ok(())
    }

    /// Moves a directory to another container of the same media set.
    pub fn move_directory(&mut self, directory: DirectoryId, new_parent: ContainerId) -> Result<()> {
        self.check_container(new_parent)?;

        // The new parent must not lie inside the moved directory.
        let mut container = new_parent;
        while let ContainerId::Directory(ancestor) = container {
            if ancestor == directory {
                return Err(Error::RecursiveMove {
                    path: self.directory_path(directory)?,
                });
            }
            container = self.directory_node(ancestor)?.parent;
        }

        let name = self.directory_node(directory)?.name.clone();
        self.check_name_free(new_parent, &name)?;
        self.directory_node_mut(directory)?.parent = new_parent;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Node access
    // ------------------------------------------------------------------

    pub fn directory_name(&self, directory: DirectoryId) -> Result<&str> {
        Ok(&self.directory_node(directory)?.name)
    }

    pub fn directory_parent(&self, directory: DirectoryId) -> Result<ContainerId> {
        Ok(self.directory_node(directory)?.parent)
    }

    pub fn directory_default_medium_number(
        &self,
        directory: DirectoryId,
    ) -> Result<Option<MediumNumber>> {
        Ok(self.directory_node(directory)?.default_medium_number)
    }

    pub fn set_directory_default_medium_number(
        &mut self,
        directory: DirectoryId,
        medium_number: Option<MediumNumber>,
    ) -> Result<()> {
        self.directory_node_mut(directory)?.default_medium_number = medium_number;
        Ok(())
    }

    pub fn file_name(&self, file: FileId) -> Result<&str> {
        Ok(&self.file_node(file)?.name)
    }

    pub fn file_parent(&self, file: FileId) -> Result<ContainerId> {
        Ok(self.file_node(file)?.parent)
    }

    pub fn file_kind(&self, file: FileId) -> Result<&FileKind> {
        Ok(&self.file_node(file)?.kind)
    }

    /// Medium-number override of the file, if any.
    pub fn file_medium_number(&self, file: FileId) -> Result<Option<MediumNumber>> {
        Ok(self.file_node(file)?.medium_number)
    }

    pub fn set_file_medium_number(
        &mut self,
        file: FileId,
        medium_number: Option<MediumNumber>,
    ) -> Result<()> {
        self.file_node_mut(file)?.medium_number = medium_number;
        Ok(())
    }

    /// Check-value-type override of the file, if any.
    pub fn file_check_value_type(&self, file: FileId) -> Result<Option<CheckValueType>> {
        Ok(self.file_node(file)?.check_value_type)
    }

    pub fn set_file_check_value_type(
        &mut self,
        file: FileId,
        check_value_type: Option<CheckValueType>,
    ) -> Result<()> {
        self.file_node_mut(file)?.check_value_type = check_value_type;
        Ok(())
    }

    /// The medium a file lands on: its own override, else the first
    /// assignment on its parent chain, else the set default.
    pub fn effective_medium_number(&self, file: FileId) -> Result<MediumNumber> {
        let node = self.file_node(file)?;
        if let Some(medium_number) = node.medium_number {
            return Ok(medium_number);
        }

        let mut container = node.parent;
        loop {
            match container {
                ContainerId::Root => return Ok(self.default_medium_number),
                ContainerId::Directory(directory) => {
                    let node = self.directory_node(directory)?;
                    if let Some(medium_number) = node.default_medium_number {
                        return Ok(medium_number);
                    }
                    container = node.parent;
                }
            }
        }
    }

    /// The check value type for a file's list entry: its own override, else
    /// the set-wide files check value type.
    pub fn effective_file_check_value_type(&self, file: FileId) -> Result<CheckValueType> {
        Ok(self
            .file_node(file)?
            .check_value_type
            .unwrap_or(self.files_check_value_type))
    }

    // ------------------------------------------------------------------
    // Loads and batches
    // ------------------------------------------------------------------

    pub fn load(&self, file: FileId) -> Result<&Load> {
        match &self.file_node(file)?.kind {
            FileKind::Load(load) => Ok(load),
            kind => Err(Error::WrongFileKind {
                path: format!("{} ({})", self.path_of_file(file)?, kind.name()),
                expected: "load",
            }),
        }
    }

    pub fn load_mut(&mut self, file: FileId) -> Result<&mut Load> {
        let path = self.path_of_file(file)?;
        match &mut self.file_node_mut(file)?.kind {
            FileKind::Load(load) => Ok(load),
            kind => Err(Error::WrongFileKind {
                path: format!("{path} ({})", kind.name()),
                expected: "load",
            }),
        }
    }

    pub fn batch(&self, file: FileId) -> Result<&Batch> {
        match &self.file_node(file)?.kind {
            FileKind::Batch(batch) => Ok(batch),
            kind => Err(Error::WrongFileKind {
                path: format!("{} ({})", self.path_of_file(file)?, kind.name()),
                expected: "batch",
            }),
        }
    }

    pub fn batch_mut(&mut self, file: FileId) -> Result<&mut Batch> {
        let path = self.path_of_file(file)?;
        match &mut self.file_node_mut(file)?.kind {
            FileKind::Batch(batch) => Ok(batch),
            kind => Err(Error::WrongFileKind {
                path: format!("{path} ({})", kind.name()),
                expected: "batch",
            }),
        }
    }

    /// Adds a data file reference to a load.
    ///
    /// The referenced file must be a regular file of this media set.
    pub fn add_load_data_file(
        &mut self,
        load: FileId,
        file: FileId,
        part_number: impl Into<String>,
        check_value_type: Option<CheckValueType>,
    ) -> Result<()> {
        self.check_regular_file(file)?;
        self.load_mut(load)?.data_files.push(LoadFileReference {
            file,
            part_number: part_number.into(),
            check_value_type,
        });
        Ok(())
    }

    /// Adds a support file reference to a load.
    ///
    /// The referenced file must be a regular file of this media set.
    pub fn add_load_support_file(
        &mut self,
        load: FileId,
        file: FileId,
        part_number: impl Into<String>,
        check_value_type: Option<CheckValueType>,
    ) -> Result<()> {
        self.check_regular_file(file)?;
        self.load_mut(load)?.support_files.push(LoadFileReference {
            file,
            part_number: part_number.into(),
            check_value_type,
        });
        Ok(())
    }

    /// Assigns a load to a target hardware identifier of a batch.
    ///
    /// The referenced load must live in this media set.
    pub fn add_batch_load(
        &mut self,
        batch: FileId,
        target_hardware_id: impl Into<String>,
        load: FileId,
    ) -> Result<()> {
        // Validates set membership and kind.
        self.load(load)?;

        let target_hardware_id = target_hardware_id.into();
        let batch = self.batch_mut(batch)?;
        if let Some(target) = batch
            .targets
            .iter_mut()
            .find(|target| target.target_hardware_id == target_hardware_id)
        {
            target.loads.push(load);
        } else {
            batch.targets.push(BatchTarget {
                target_hardware_id,
                loads: vec![load],
            });
        }
        Ok(())
    }

    /// Looks up a data or support file of a load by filename and optional
    /// part number. Returns `None` when no or more than one file matches.
    pub fn load_file(
        &self,
        load: FileId,
        filename: &str,
        part_number: Option<&str>,
    ) -> Result<Option<FileId>> {
        let load = self.load(load)?;

        let mut matches = Vec::new();
        for reference in load.data_files.iter().chain(&load.support_files) {
            let node = self.file_node(reference.file)?;
            if node.name == filename
                && part_number.is_none_or(|part_number| part_number == reference.part_number)
            {
                matches.push(reference.file);
            }
        }

        if matches.len() > 1 {
            info!(filename, "more than one load file matches");
            return Ok(None);
        }
        Ok(matches.into_iter().next())
    }

    /// Load check value type: the load's override, else the media set
    /// check value type, else `NotUsed`.
    pub fn effective_load_check_value_type(&self, load: FileId) -> Result<CheckValueType> {
        Ok(self
            .load(load)?
            .load_check_value_type
            .or(self.media_set_check_value_type)
            .unwrap_or(CheckValueType::NotUsed))
    }

    /// Data-files check value type of a load.
    pub fn effective_data_files_check_value_type(&self, load: FileId) -> Result<CheckValueType> {
        Ok(self
            .load(load)?
            .data_files_check_value_type
            .unwrap_or(self.effective_media_set_check_value_type()))
    }

    /// Support-files check value type of a load.
    pub fn effective_support_files_check_value_type(
        &self,
        load: FileId,
    ) -> Result<CheckValueType> {
        Ok(self
            .load(load)?
            .support_files_check_value_type
            .unwrap_or(self.effective_media_set_check_value_type()))
    }

    // ------------------------------------------------------------------
    // Traversal
    // ------------------------------------------------------------------

    /// Direct subdirectories of a container, in insertion order.
    pub fn directories_in(&self, container: ContainerId) -> Vec<DirectoryId> {
        self.directories
            .iter()
            .enumerate()
            .filter(|(_, node)| node.parent == container)
            .map(|(index, _)| DirectoryId {
                set: self.set_id,
                index: index as u32,
            })
            .collect()
    }

    /// Direct files of a container, in insertion order.
    pub fn files_in(&self, container: ContainerId) -> Vec<FileId> {
        self.files
            .iter()
            .enumerate()
            .filter(|(_, node)| node.parent == container)
            .map(|(index, _)| FileId {
                set: self.set_id,
                index: index as u32,
            })
            .collect()
    }

    /// All directories of the set in pre-order.
    pub fn recursive_directories(&self) -> Vec<DirectoryId> {
        let mut directories = Vec::new();
        self.collect_directories(ContainerId::Root, &mut directories);
        directories
    }

    fn collect_directories(&self, container: ContainerId, out: &mut Vec<DirectoryId>) {
        for directory in self.directories_in(container) {
            out.push(directory);
            self.collect_directories(ContainerId::Directory(directory), out);
        }
    }

    /// All files of the set in pre-order: a container's files first, then
    /// its subdirectories, each in insertion order.
    pub fn recursive_files(&self) -> Vec<FileId> {
        let mut files = Vec::new();
        self.collect_files(ContainerId::Root, &mut files);
        files
    }

    fn collect_files(&self, container: ContainerId, out: &mut Vec<FileId>) {
        out.extend(self.files_in(container));
        for directory in self.directories_in(container) {
            self.collect_files(ContainerId::Directory(directory), out);
        }
    }

    /// All loads in pre-order.
    pub fn recursive_loads(&self) -> Vec<FileId> {
        self.recursive_files()
            .into_iter()
            .filter(|file| {
                matches!(
                    self.file_kind(*file),
                    Ok(FileKind::Load(_))
                )
            })
            .collect()
    }

    /// All batches in pre-order.
    pub fn recursive_batches(&self) -> Vec<FileId> {
        self.recursive_files()
            .into_iter()
            .filter(|file| {
                matches!(
                    self.file_kind(*file),
                    Ok(FileKind::Batch(_))
                )
            })
            .collect()
    }

    /// Directory path components from the root, e.g. `["SW", "CFG"]`.
    pub fn directory_path_components(&self, directory: DirectoryId) -> Result<Vec<String>> {
        let mut components = Vec::new();
        let mut current = directory;
        loop {
            let node = self.directory_node(current)?;
            components.push(node.name.clone());
            match node.parent {
                ContainerId::Root => break,
                ContainerId::Directory(parent) => current = parent,
            }
        }
        components.reverse();
        Ok(components)
    }

    /// Slash-joined directory path, e.g. `"SW/CFG"`.
    pub fn directory_path(&self, directory: DirectoryId) -> Result<String> {
        Ok(self.directory_path_components(directory)?.join("/"))
    }

    /// Path components of a file's containing directory.
    pub fn file_path_components(&self, file: FileId) -> Result<Vec<String>> {
        match self.file_node(file)?.parent {
            ContainerId::Root => Ok(Vec::new()),
            ContainerId::Directory(directory) => self.directory_path_components(directory),
        }
    }

    /// Slash-joined path of a file relative to the medium root, e.g.
    /// `"SW/CFG/APP.BIN"`.
    pub fn path_of_file(&self, file: FileId) -> Result<String> {
        let node = self.file_node(file)?;
        let mut components = match node.parent {
            ContainerId::Root => Vec::new(),
            ContainerId::Directory(directory) => self.directory_path_components(directory)?,
        };
        components.push(node.name.clone());
        Ok(components.join("/"))
    }

    /// Finds a file by its medium-relative slash-joined path.
    pub fn find_file_by_path(&self, path: &str) -> Option<FileId> {
        self.recursive_files()
            .into_iter()
            .find(|file| self.path_of_file(*file).is_ok_and(|p| p == path))
    }

    /// Finds a file by bare filename anywhere in the tree.
    ///
    /// Returns the first match in creation order.
    pub fn find_file_by_name(&self, name: &str) -> Option<FileId> {
        self.files
            .iter()
            .position(|node| node.name == name)
            .map(|index| FileId {
                set: self.set_id,
                index: index as u32,
            })
    }

    /// Checks model invariants that cannot be enforced structurally:
    /// every file's effective medium number must address an existing
    /// medium.
    pub fn validate(&self) -> Result<()> {
        for file in self.recursive_files() {
            let medium_number = self.effective_medium_number(file)?;
            if medium_number > self.media_count {
                return Err(Error::MediumOutOfRange {
                    file: self.path_of_file(file)?,
                    medium_number,
                    media_count: self.media_count,
                });
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Internal helpers
    // ------------------------------------------------------------------

    fn directory_node(&self, directory: DirectoryId) -> Result<&DirectoryNode> {
        if directory.set != self.set_id {
            return Err(Error::CrossMediaSetReference);
        }
        self.directories
            .get(directory.index as usize)
            .ok_or(Error::UnknownEntity { entity: "directory" })
    }

    fn directory_node_mut(&mut self, directory: DirectoryId) -> Result<&mut DirectoryNode> {
        if directory.set != self.set_id {
            return Err(Error::CrossMediaSetReference);
        }
        self.directories
            .get_mut(directory.index as usize)
            .ok_or(Error::UnknownEntity { entity: "directory" })
    }

    fn file_node(&self, file: FileId) -> Result<&FileNode> {
        if file.set != self.set_id {
            return Err(Error::CrossMediaSetReference);
        }
        self.files
            .get(file.index as usize)
            .ok_or(Error::UnknownEntity { entity: "file" })
    }

    fn file_node_mut(&mut self, file: FileId) -> Result<&mut FileNode> {
        if file.set != self.set_id {
            return Err(Error::CrossMediaSetReference);
        }
        self.files
            .get_mut(file.index as usize)
            .ok_or(Error::UnknownEntity { entity: "file" })
    }

    fn check_container(&self, container: ContainerId) -> Result<()> {
        match container {
            ContainerId::Root => Ok(()),
            ContainerId::Directory(directory) => self.directory_node(directory).map(|_| ()),
        }
    }

    fn check_regular_file(&self, file: FileId) -> Result<()> {
        match &self.file_node(file)?.kind {
            FileKind::Regular => Ok(()),
            kind => Err(Error::WrongFileKind {
                path: format!("{} ({})", self.path_of_file(file)?, kind.name()),
                expected: "regular file",
            }),
        }
    }

    fn check_name_free(&self, parent: ContainerId, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::EmptyName);
        }

        let taken = self
            .directories
            .iter()
            .any(|node| node.parent == parent && node.name == name)
            || self
                .files
                .iter()
                .any(|node| node.parent == parent && node.name == name);

        if taken {
            let parent_path = match parent {
                ContainerId::Root => String::new(),
                ContainerId::Directory(directory) => {
                    let mut path = self.directory_path(directory)?;
                    path.push('/');
                    path
                }
            };
            return Err(Error::NameConflict {
                path: format!("{parent_path}{name}"),
            });
        }

        Ok(())
    }
}
