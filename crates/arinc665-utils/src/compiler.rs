//! Media set compiler.
//!
//! Walks a media set model and materializes it as an on-disk media set
//! through the injected handlers: payload files are copied from the source
//! mapping, load headers and batch files are generated according to the
//! configured policies, and each medium receives its three list files with
//! all CRCs and check values computed from the bytes actually written.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info};

use arinc645::{Arinc645Crc32, CheckValue, CheckValueGenerator, check_value_of, crc16};
use arinc665_files::{
    BatchFile, BatchListEntry, BatchListFile, BatchLoad, BatchTargetHardware, FileListEntry,
    FileListFile, LIST_OF_BATCHES_NAME, LIST_OF_FILES_NAME, LIST_OF_LOADS_NAME, LoadFileEntry,
    LoadHeaderFile, LoadListEntry, LoadListFile, MediaSetInformation, MediumNumber,
    SupportedArinc665Version, encode_path_name,
};
use arinc665_media::{FileId, FileKind, FilePathMapping, MediaSet};

use crate::handlers::{
    CopyFileHandler, CreateDirectoryHandler, OutputExistsHandler, ProgressHandler, ProgressInfo,
    ReadFileHandler, WriteFileHandler,
};
use crate::{Error, Result};

/// Whether the compiler synthesizes load header and batch files or expects
/// them in the source mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileCreationPolicy {
    /// Never synthesize; a missing source file is an error.
    None,
    /// Synthesize only files absent from the source mapping.
    NoneExisting,
    /// Always synthesize, ignoring any provided source.
    All,
}

/// Medium number to medium directory name, e.g. `1 -> "MEDIUM_001"`.
pub type MediaPaths = BTreeMap<MediumNumber, String>;

/// Output locations of a compiled media set, relative to the output base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSetPaths {
    /// Name of the media set root directory.
    pub media_set_root: String,
    /// Relative directory per medium.
    pub media_paths: MediaPaths,
}

/// Compiles a media set model into an on-disk media set.
///
/// All handlers address paths relative to a medium root; the backend maps
/// `(medium, path)` to `<output>/<media_set_root>/MEDIUM_NNN/<path>`.
pub struct MediaSetCompiler<'a> {
    media_set: &'a MediaSet,
    file_path_mapping: &'a FilePathMapping,
    version: SupportedArinc665Version,
    create_load_header_files: FileCreationPolicy,
    create_batch_files: FileCreationPolicy,
    media_set_name: Option<String>,
    write_file: WriteFileHandler<'a>,
    read_file: ReadFileHandler<'a>,
    create_directory: CreateDirectoryHandler<'a>,
    copy_file: CopyFileHandler<'a>,
    output_exists: Option<OutputExistsHandler<'a>>,
    progress: Option<ProgressHandler<'a>>,
}

impl<'a> MediaSetCompiler<'a> {
    pub fn new(
        media_set: &'a MediaSet,
        file_path_mapping: &'a FilePathMapping,
        write_file: WriteFileHandler<'a>,
        read_file: ReadFileHandler<'a>,
        create_directory: CreateDirectoryHandler<'a>,
        copy_file: CopyFileHandler<'a>,
    ) -> Self {
        Self {
            media_set,
            file_path_mapping,
            version: SupportedArinc665Version::Supplement345,
            create_load_header_files: FileCreationPolicy::NoneExisting,
            create_batch_files: FileCreationPolicy::NoneExisting,
            media_set_name: None,
            write_file,
            read_file,
            create_directory,
            copy_file,
            output_exists: None,
            progress: None,
        }
    }

    /// Target ARINC 665 supplement (defaults to 3/4/5).
    #[must_use]
    pub fn arinc665_version(mut self, version: SupportedArinc665Version) -> Self {
        self.version = version;
        self
    }

    #[must_use]
    pub fn create_load_header_files(mut self, policy: FileCreationPolicy) -> Self {
        self.create_load_header_files = policy;
        self
    }

    #[must_use]
    pub fn create_batch_files(mut self, policy: FileCreationPolicy) -> Self {
        self.create_batch_files = policy;
        self
    }

    /// Name of the media set root directory (defaults to the part number).
    #[must_use]
    pub fn media_set_name(mut self, name: impl Into<String>) -> Self {
        self.media_set_name = Some(name.into());
        self
    }

    /// Probe refusing to overwrite an existing output root.
    #[must_use]
    pub fn output_exists_handler(mut self, handler: OutputExistsHandler<'a>) -> Self {
        self.output_exists = Some(handler);
        self
    }

    #[must_use]
    pub fn progress_handler(mut self, handler: ProgressHandler<'a>) -> Self {
        self.progress = Some(handler);
        self
    }

    /// Runs the compilation.
    pub fn compile(mut self) -> Result<MediaSetPaths> {
        self.media_set.validate()?;

        let media_set_root = self
            .media_set_name
            .clone()
            .unwrap_or_else(|| self.media_set.part_number().to_string());

        if let Some(output_exists) = &mut self.output_exists {
            let exists = output_exists(&media_set_root).map_err(|source| {
                Error::backend(format!("probing output root {media_set_root:?}"), source)
            })?;
            if exists {
                return Err(Error::OutputExists {
                    path: media_set_root,
                });
            }
        }

        let total_media = self.media_set.media_count();
        debug!(
            part_number = self.media_set.part_number(),
            media = total_media.get(),
            "compiling media set"
        );

        // Media roots and directories. A directory is created on its
        // effective medium and on every medium carrying one of its files,
        // so every listed path resolves on the file's medium.
        for medium in self.media_set.media_numbers() {
            self.create_dir(medium, "")?;
        }
        for (medium, path) in self.directory_set()? {
            self.create_dir(medium, &path)?;
        }

        // Payload files everywhere before any load header is generated: a
        // load may bundle files of a later medium.
        let mut generated_loads = Vec::new();
        let mut generated_batches = Vec::new();

        for file in self.media_set.recursive_files() {
            let medium = self.media_set.effective_medium_number(file)?;
            let path = self.media_set.path_of_file(file)?;

            match self.media_set.file_kind(file)? {
                FileKind::Regular => {
                    let source = self.file_path_mapping.get(&file).ok_or_else(|| {
                        Error::DanglingReference {
                            from: "file path mapping".to_string(),
                            to: path.clone(),
                        }
                    })?;
                    let source = source.clone();
                    (self.copy_file)(&source, medium, &path).map_err(|source| {
                        Error::backend(format!("copying {path} to medium {medium}"), source)
                    })?;
                }
                FileKind::Load(_) => {
                    if self.synthesize(file, self.create_load_header_files, &path)? {
                        generated_loads.push(file);
                    }
                }
                FileKind::Batch(_) => {
                    if self.synthesize(file, self.create_batch_files, &path)? {
                        generated_batches.push(file);
                    }
                }
            }
        }

        // Load headers, then batches referencing them.
        let mut load_check_values: HashMap<FileId, CheckValue> = HashMap::new();
        for load in self.media_set.recursive_loads() {
            if generated_loads.contains(&load) {
                let check_value = self.generate_load_header(load)?;
                load_check_values.insert(load, check_value);
            } else {
                // Pre-existing header: decode the copied file to pick up
                // its load check value for the list of loads.
                let medium = self.media_set.effective_medium_number(load)?;
                let path = self.media_set.path_of_file(load)?;
                let header = LoadHeaderFile::decode(&self.read(medium, &path)?)?;
                load_check_values.insert(load, header.load_check_value);
            }
        }
        for batch in &generated_batches {
            self.generate_batch(*batch)?;
        }

        // Inventory entries common to all media: one read per file, CRC and
        // check value computed together.
        let mut base_entries = Vec::new();
        for file in self.media_set.recursive_files() {
            let medium = self.media_set.effective_medium_number(file)?;
            let path = self.media_set.path_of_file(file)?;
            let raw = self.read(medium, &path)?;

            let check_value_type = self.media_set.effective_file_check_value_type(file)?;
            base_entries.push(FileListEntry {
                filename: self.media_set.file_name(file)?.to_string(),
                path_name: encode_path_name(&self.media_set.file_path_components(file)?),
                member_sequence_number: medium,
                crc: crc16(&raw),
                check_value: check_value_of(check_value_type, &raw),
            });
        }

        let load_entries = self.load_list_entries(&load_check_values)?;
        let batch_entries = self.batch_list_entries()?;

        // Finalize each medium: LOADS.LUM and BATCHES.LUM first, then the
        // FILES.LUM indexing them.
        let mut media_paths = MediaPaths::new();
        for medium in self.media_set.media_numbers() {
            let media_information = MediaSetInformation {
                part_number: self.media_set.part_number().to_string(),
                media_sequence_number: medium,
                number_of_media_set_members: total_media,
            };

            let load_list = LoadListFile {
                version: self.version,
                media_information: media_information.clone(),
                loads: load_entries.clone(),
                user_defined_data: self.media_set.loads_user_defined_data.clone(),
                list_check_value_type: self.media_set.effective_list_of_loads_check_value_type(),
            };
            let raw_load_list = load_list.encode()?;
            self.write(medium, LIST_OF_LOADS_NAME, &raw_load_list)?;

            let mut entries = base_entries.clone();
            entries.push(generated_list_entry(
                LIST_OF_LOADS_NAME,
                medium,
                &raw_load_list,
                self.media_set,
            ));

            if !batch_entries.is_empty() {
                let batch_list = BatchListFile {
                    version: self.version,
                    media_information: media_information.clone(),
                    batches: batch_entries.clone(),
                    user_defined_data: self.media_set.batches_user_defined_data.clone(),
                    list_check_value_type: self
                        .media_set
                        .effective_list_of_batches_check_value_type(),
                };
                let raw_batch_list = batch_list.encode()?;
                self.write(medium, LIST_OF_BATCHES_NAME, &raw_batch_list)?;

                entries.push(generated_list_entry(
                    LIST_OF_BATCHES_NAME,
                    medium,
                    &raw_batch_list,
                    self.media_set,
                ));
            }

            let file_list = FileListFile {
                version: self.version,
                media_information,
                files: entries,
                user_defined_data: self.media_set.files_user_defined_data.clone(),
                media_set_check_value_type: self.media_set.effective_media_set_check_value_type(),
                list_check_value_type: self.media_set.effective_list_of_files_check_value_type(),
            };
            self.write(medium, LIST_OF_FILES_NAME, &file_list.encode()?)?;

            media_paths.insert(medium, format!("MEDIUM_{medium}"));
            self.emit_progress(medium, total_media)?;
        }

        info!(
            part_number = self.media_set.part_number(),
            media = total_media.get(),
            "compiled media set"
        );

        Ok(MediaSetPaths {
            media_set_root,
            media_paths,
        })
    }

    /// Decides per policy whether `file` is synthesized; a present source
    /// is copied right away.
    fn synthesize(&mut self, file: FileId, policy: FileCreationPolicy, path: &str) -> Result<bool> {
        let source = self.file_path_mapping.get(&file);
        match policy {
            FileCreationPolicy::None => {
                let source = source
                    .ok_or_else(|| Error::DanglingReference {
                        from: "file path mapping".to_string(),
                        to: path.to_string(),
                    })?
                    .clone();
                let medium = self.media_set.effective_medium_number(file)?;
                (self.copy_file)(&source, medium, path).map_err(|source| {
                    Error::backend(format!("copying {path} to medium {medium}"), source)
                })?;
                Ok(false)
            }
            FileCreationPolicy::NoneExisting => match source {
                Some(source) => {
                    let source = source.clone();
                    let medium = self.media_set.effective_medium_number(file)?;
                    (self.copy_file)(&source, medium, path).map_err(|source| {
                        Error::backend(format!("copying {path} to medium {medium}"), source)
                    })?;
                    Ok(false)
                }
                None => Ok(true),
            },
            FileCreationPolicy::All => Ok(true),
        }
    }

    /// Generates one load header from the model, reading the payload files
    /// back from the output tree for lengths, CRCs and check values.
    /// Returns the load check value for the list of loads.
    fn generate_load_header(&mut self, load: FileId) -> Result<CheckValue> {
        let medium = self.media_set.effective_medium_number(load)?;
        let path = self.media_set.path_of_file(load)?;
        let load_data = self.media_set.load(load)?;

        let mut header = LoadHeaderFile::new(self.version);
        header.part_flags = load_data.part_flags;
        header.part_number = load_data.part_number.clone();
        header.load_type = load_data.load_type.clone();
        header.target_hardware_ids = load_data
            .target_hardware_ids()
            .into_iter()
            .map(str::to_string)
            .collect();
        header.target_hardware_id_positions = load_data.target_hardware_id_positions.clone();
        header.user_defined_data = load_data.user_defined_data().to_vec();

        let mut load_crc = Arinc645Crc32::new();
        let mut generator =
            CheckValueGenerator::new(self.media_set.effective_load_check_value_type(load)?);

        let data_files_check_value_type =
            self.media_set.effective_data_files_check_value_type(load)?;
        let data_references = load_data.data_files().to_vec();
        for reference in &data_references {
            let entry = self.load_file_entry(
                reference,
                reference
                    .check_value_type
                    .unwrap_or(data_files_check_value_type),
                &mut load_crc,
                &mut generator,
            )?;
            header.data_files.push(entry);
        }

        let support_files_check_value_type = self
            .media_set
            .effective_support_files_check_value_type(load)?;
        let support_references = self.media_set.load(load)?.support_files().to_vec();
        for reference in &support_references {
            let entry = self.load_file_entry(
                reference,
                reference
                    .check_value_type
                    .unwrap_or(support_files_check_value_type),
                &mut load_crc,
                &mut generator,
            )?;
            header.support_files.push(entry);
        }

        // The load check value is a body section and must be in place
        // before encoding; the trailing load CRC is patched into the
        // encoded file afterwards.
        header.load_check_value = generator.finalize();
        let check_value = header.load_check_value.clone();

        debug!(path, part_number = header.part_number, "generated load header");
        let mut raw = header.encode()?;
        LoadHeaderFile::patch_load_crc(&mut raw, load_crc.finalize())?;
        self.write(medium, &path, &raw)?;

        Ok(check_value)
    }

    /// Builds one data/support file entry, feeding the file's bytes into
    /// the running load CRC and load check value.
    fn load_file_entry(
        &mut self,
        reference: &arinc665_media::LoadFileReference,
        check_value_type: arinc645::CheckValueType,
        load_crc: &mut Arinc645Crc32,
        generator: &mut CheckValueGenerator,
    ) -> Result<LoadFileEntry> {
        let medium = self.media_set.effective_medium_number(reference.file)?;
        let path = self.media_set.path_of_file(reference.file)?;
        let raw = self.read(medium, &path)?;

        let length = match self.version {
            SupportedArinc665Version::Supplement2 => {
                if raw.len() % 2 != 0 {
                    return Err(Error::Files(arinc665_files::Error::InvalidFormat(format!(
                        "data file {path:?} has odd size, not representable in ARINC 665-2"
                    ))));
                }
                (raw.len() / 2) as u32
            }
            SupportedArinc665Version::Supplement345 => raw.len() as u32,
        };

        load_crc.update(&raw);
        generator.update(&raw);

        Ok(LoadFileEntry {
            filename: self.media_set.file_name(reference.file)?.to_string(),
            part_number: reference.part_number.clone(),
            length,
            crc: crc16(&raw),
            check_value: check_value_of(check_value_type, &raw),
        })
    }

    /// Generates one batch file from the model.
    fn generate_batch(&mut self, batch: FileId) -> Result<()> {
        let medium = self.media_set.effective_medium_number(batch)?;
        let path = self.media_set.path_of_file(batch)?;
        let batch_data = self.media_set.batch(batch)?;

        let mut file = BatchFile::new(self.version);
        file.part_number = batch_data.part_number.clone();
        file.comment = batch_data.comment.clone();
        for target in batch_data.targets() {
            let mut loads = Vec::new();
            for load in target.loads() {
                loads.push(BatchLoad {
                    header_filename: self.media_set.file_name(*load)?.to_string(),
                    part_number: self.media_set.load(*load)?.part_number.clone(),
                });
            }
            file.target_hardware_loads.push(BatchTargetHardware {
                target_hardware_id: target.target_hardware_id.clone(),
                loads,
            });
        }

        debug!(path, part_number = file.part_number, "generated batch file");
        let raw = file.encode()?;
        self.write(medium, &path, &raw)
    }

    fn load_list_entries(
        &self,
        load_check_values: &HashMap<FileId, CheckValue>,
    ) -> Result<Vec<LoadListEntry>> {
        let mut entries = Vec::new();
        for load in self.media_set.recursive_loads() {
            let load_data = self.media_set.load(load)?;
            entries.push(LoadListEntry {
                part_number: load_data.part_number.clone(),
                header_filename: self.media_set.file_name(load)?.to_string(),
                member_sequence_number: self.media_set.effective_medium_number(load)?,
                target_hardware_ids: load_data
                    .target_hardware_ids()
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
                target_hardware_id_positions: load_data.target_hardware_id_positions.clone(),
                check_value: load_check_values
                    .get(&load)
                    .cloned()
                    .unwrap_or(CheckValue::NOT_USED),
            });
        }
        Ok(entries)
    }

    fn batch_list_entries(&self) -> Result<Vec<BatchListEntry>> {
        let mut entries = Vec::new();
        for batch in self.media_set.recursive_batches() {
            entries.push(BatchListEntry {
                part_number: self.media_set.batch(batch)?.part_number.clone(),
                filename: self.media_set.file_name(batch)?.to_string(),
                member_sequence_number: self.media_set.effective_medium_number(batch)?,
            });
        }
        Ok(entries)
    }

    /// The directories to create: every model directory on its effective
    /// medium plus the parent chain of every file on the file's medium.
    fn directory_set(&self) -> Result<BTreeSet<(MediumNumber, String)>> {
        let mut directories = BTreeSet::new();

        for directory in self.media_set.recursive_directories() {
            let medium = self.effective_directory_medium(directory)?;
            let components = self.media_set.directory_path_components(directory)?;
            insert_with_parents(&mut directories, medium, &components);
        }

        for file in self.media_set.recursive_files() {
            let medium = self.media_set.effective_medium_number(file)?;
            let components = self.media_set.file_path_components(file)?;
            insert_with_parents(&mut directories, medium, &components);
        }

        Ok(directories)
    }

    fn effective_directory_medium(
        &self,
        directory: arinc665_media::DirectoryId,
    ) -> Result<MediumNumber> {
        let mut current = directory;
        loop {
            if let Some(medium) = self.media_set.directory_default_medium_number(current)? {
                return Ok(medium);
            }
            match self.media_set.directory_parent(current)? {
                arinc665_media::ContainerId::Root => {
                    return Ok(self.media_set.default_medium_number);
                }
                arinc665_media::ContainerId::Directory(parent) => current = parent,
            }
        }
    }

    fn read(&mut self, medium: MediumNumber, path: &str) -> Result<Vec<u8>> {
        (self.read_file)(medium, path).map_err(|source| {
            Error::backend(format!("reading {path} from medium {medium}"), source)
        })
    }

    fn write(&mut self, medium: MediumNumber, path: &str, raw: &[u8]) -> Result<()> {
        (self.write_file)(medium, path, raw).map_err(|source| {
            Error::backend(format!("writing {path} to medium {medium}"), source)
        })
    }

    fn create_dir(&mut self, medium: MediumNumber, path: &str) -> Result<()> {
        (self.create_directory)(medium, path).map_err(|source| {
            Error::backend(format!("creating directory {path:?} on medium {medium}"), source)
        })
    }

    fn emit_progress(&mut self, current_medium: MediumNumber, total_media: MediumNumber) -> Result<()> {
        if let Some(progress) = &mut self.progress {
            let info = ProgressInfo {
                current_media_set: 1,
                total_media_sets: 1,
                part_number: self.media_set.part_number(),
                current_medium,
                total_media,
            };
            progress(&info).map_err(|_| Error::Cancelled)?;
        }
        Ok(())
    }
}

/// Inventory entry for a generated list file on one medium.
fn generated_list_entry(
    filename: &str,
    medium: MediumNumber,
    raw: &[u8],
    media_set: &MediaSet,
) -> FileListEntry {
    FileListEntry {
        filename: filename.to_string(),
        path_name: encode_path_name::<&str>(&[]),
        member_sequence_number: medium,
        crc: crc16(raw),
        check_value: check_value_of(media_set.files_check_value_type, raw),
    }
}

fn insert_with_parents(
    directories: &mut BTreeSet<(MediumNumber, String)>,
    medium: MediumNumber,
    components: &[String],
) {
    let mut path = String::new();
    for component in components {
        if !path.is_empty() {
            path.push('/');
        }
        path.push_str(component);
        directories.insert((medium, path.clone()));
    }
}
