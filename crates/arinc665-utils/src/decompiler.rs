//! Media set decompiler.
//!
//! Reads the media of an existing ARINC 665 media set through the injected
//! handlers, validates cross-file and cross-media consistency and builds
//! the in-memory media set model.

use std::collections::HashMap;
use tracing::{debug, info};

use arinc645::{Arinc645Crc32, CheckValueGenerator, CheckValueType, check_value_of, crc16};
use arinc665_files::{
    BatchFile, BatchListFile, FileListEntry, FileListFile, FileType, LIST_OF_BATCHES_NAME,
    LIST_OF_FILES_NAME, LIST_OF_LOADS_NAME, LoadHeaderFile, LoadListFile, MediumNumber,
};
use arinc665_media::{CheckValues, ContainerId, FileId, MediaSet};

use crate::handlers::{FileSizeHandler, ProgressHandler, ProgressInfo, ReadFileHandler};
use crate::{Error, Result};

/// Decompiles a media set from its media into the in-memory model.
///
/// Built in the fluent style; [`Self::decompile`] consumes the decompiler
/// and returns the model together with the check values encountered.
///
/// ```no_run
/// # fn handlers() -> arinc665_utils::ReadFileHandler<'static> { unimplemented!() }
/// # fn example() -> arinc665_utils::Result<()> {
/// let (media_set, check_values) = arinc665_utils::MediaSetDecompiler::new(handlers())
///     .check_file_integrity(true)
///     .decompile()?;
/// # Ok(())
/// # }
/// ```
pub struct MediaSetDecompiler<'a> {
    read_file: ReadFileHandler<'a>,
    file_size: Option<FileSizeHandler<'a>>,
    progress: Option<ProgressHandler<'a>>,
    check_file_integrity: bool,
}

impl<'a> MediaSetDecompiler<'a> {
    pub fn new(read_file: ReadFileHandler<'a>) -> Self {
        Self {
            read_file,
            file_size: None,
            progress: None,
            check_file_integrity: true,
        }
    }

    /// Handler used to probe file existence and sizes without reading.
    #[must_use]
    pub fn file_size_handler(mut self, handler: FileSizeHandler<'a>) -> Self {
        self.file_size = Some(handler);
        self
    }

    #[must_use]
    pub fn progress_handler(mut self, handler: ProgressHandler<'a>) -> Self {
        self.progress = Some(handler);
        self
    }

    /// Whether to re-read every file and verify CRCs and check values
    /// (defaults to `true`).
    #[must_use]
    pub fn check_file_integrity(mut self, check_file_integrity: bool) -> Self {
        self.check_file_integrity = check_file_integrity;
        self
    }

    /// Runs the decompilation.
    pub fn decompile(mut self) -> Result<(MediaSet, CheckValues)> {
        // First medium: the three list files establish the set's identity.
        let file_list = FileListFile::decode(&self.read(MediumNumber::FIRST, LIST_OF_FILES_NAME)?)?;
        let part_number = file_list.media_information.part_number.clone();
        let total_media = file_list.media_information.number_of_media_set_members;

        if file_list.media_information.media_sequence_number != MediumNumber::FIRST {
            return Err(Error::MediaSetInconsistent {
                medium: MediumNumber::FIRST,
                field: "media sequence number of first medium is not 1".to_string(),
            });
        }

        let load_list = LoadListFile::decode(&self.read(MediumNumber::FIRST, LIST_OF_LOADS_NAME)?)?;
        check_media_information(&file_list, &load_list.media_information, MediumNumber::FIRST)?;

        // The file inventory tells whether the set carries batches.
        let batches_present = file_list
            .files
            .iter()
            .any(|entry| entry.filename == LIST_OF_BATCHES_NAME);
        let batch_list = if batches_present {
            let list = BatchListFile::decode(&self.read(MediumNumber::FIRST, LIST_OF_BATCHES_NAME)?)?;
            check_media_information(&file_list, &list.media_information, MediumNumber::FIRST)?;
            Some(list)
        } else {
            None
        };

        debug!(
            part_number,
            total_media = total_media.get(),
            loads = load_list.loads.len(),
            "loaded first medium"
        );
        self.emit_progress(&part_number, MediumNumber::FIRST, total_media)?;

        // Further media must agree with the first one.
        let mut further_file_lists = Vec::new();
        for medium in media_range(MediumNumber::new(2), total_media) {
            let medium_file_list = FileListFile::decode(&self.read(medium, LIST_OF_FILES_NAME)?)?;
            if !file_list.belongs_to_same_media_set(&medium_file_list) {
                return Err(Error::MediaSetInconsistent {
                    medium,
                    field: "list of files differs from first medium".to_string(),
                });
            }
            check_sequence_number(&medium_file_list.media_information, medium)?;

            let medium_load_list = LoadListFile::decode(&self.read(medium, LIST_OF_LOADS_NAME)?)?;
            if !load_list.belongs_to_same_media_set(&medium_load_list) {
                return Err(Error::MediaSetInconsistent {
                    medium,
                    field: "list of loads differs from first medium".to_string(),
                });
            }
            check_sequence_number(&medium_load_list.media_information, medium)?;

            if let Some(batch_list) = &batch_list {
                let medium_batch_list =
                    BatchListFile::decode(&self.read(medium, LIST_OF_BATCHES_NAME)?)?;
                if !batch_list.belongs_to_same_media_set(&medium_batch_list) {
                    return Err(Error::MediaSetInconsistent {
                        medium,
                        field: "list of batches differs from first medium".to_string(),
                    });
                }
                check_sequence_number(&medium_batch_list.media_information, medium)?;
            }

            further_file_lists.push(medium_file_list);
            self.emit_progress(&part_number, medium, total_media)?;
        }

        // Build the model.
        let mut media_set = MediaSet::new(part_number.clone());
        media_set.set_media_count(total_media);
        media_set.files_user_defined_data = file_list.user_defined_data.clone();
        media_set.loads_user_defined_data = load_list.user_defined_data.clone();
        media_set.media_set_check_value_type = used_type(file_list.media_set_check_value_type);
        media_set.list_of_files_check_value_type = used_type(file_list.list_check_value_type);
        media_set.list_of_loads_check_value_type = used_type(load_list.list_check_value_type);
        if let Some(batch_list) = &batch_list {
            media_set.batches_user_defined_data = batch_list.user_defined_data.clone();
            media_set.list_of_batches_check_value_type = used_type(batch_list.list_check_value_type);
        }

        let mut check_values: CheckValues = HashMap::new();
        let mut directories: HashMap<String, ContainerId> = HashMap::new();
        let mut regular_by_name: HashMap<String, FileId> = HashMap::new();

        for entry in &file_list.files {
            match FileType::from_filename(&entry.filename) {
                // The list files are generated per medium; load headers and
                // batches are populated from their own protocol files.
                Some(
                    FileType::FileList
                    | FileType::LoadList
                    | FileType::BatchList
                    | FileType::LoadUploadHeader
                    | FileType::BatchFile,
                ) => {}
                None => {
                    let parent =
                        ensure_directory(&mut media_set, &mut directories, &entry.path_components())?;
                    let file = media_set.create_regular_file(parent, &entry.filename)?;
                    media_set.set_file_medium_number(file, Some(entry.member_sequence_number))?;
                    if entry.check_value.is_used() {
                        media_set.set_file_check_value_type(
                            file,
                            Some(entry.check_value.check_value_type()),
                        )?;
                        check_values
                            .entry(file)
                            .or_default()
                            .insert(entry.check_value.clone());
                    }
                    regular_by_name.insert(entry.filename.clone(), file);
                }
            }
        }

        let entries_by_name: HashMap<&str, &FileListEntry> = file_list
            .files
            .iter()
            .map(|entry| (entry.filename.as_str(), entry))
            .collect();

        // Loads.
        let mut loads_by_name: HashMap<String, FileId> = HashMap::new();
        let mut decoded_headers: Vec<(FileId, LoadHeaderFile)> = Vec::new();

        for load_entry in &load_list.loads {
            let entry = *entries_by_name
                .get(load_entry.header_filename.as_str())
                .ok_or_else(|| Error::DanglingReference {
                    from: LIST_OF_LOADS_NAME.to_string(),
                    to: load_entry.header_filename.clone(),
                })?;

            if entry.member_sequence_number != load_entry.member_sequence_number {
                return Err(Error::MediaSetInconsistent {
                    medium: entry.member_sequence_number,
                    field: format!(
                        "member sequence number of load header {:?} differs between lists",
                        entry.filename
                    ),
                });
            }

            let raw = self.read(entry.member_sequence_number, &entry.relative_path())?;
            let header = LoadHeaderFile::decode(&raw)?;

            if header.part_number != load_entry.part_number {
                return Err(Error::MediaSetInconsistent {
                    medium: entry.member_sequence_number,
                    field: format!(
                        "part number of load header {:?} differs from list of loads",
                        entry.filename
                    ),
                });
            }
            if load_entry.check_value.is_used()
                && header.load_check_value.is_used()
                && load_entry.check_value != header.load_check_value
            {
                return Err(Error::MediaSetInconsistent {
                    medium: entry.member_sequence_number,
                    field: format!(
                        "load check value of {:?} differs from list of loads",
                        entry.filename
                    ),
                });
            }

            let parent =
                ensure_directory(&mut media_set, &mut directories, &entry.path_components())?;
            let load = media_set.create_load(parent, &entry.filename)?;
            media_set.set_file_medium_number(load, Some(entry.member_sequence_number))?;
            if entry.check_value.is_used() {
                media_set
                    .set_file_check_value_type(load, Some(entry.check_value.check_value_type()))?;
                check_values
                    .entry(load)
                    .or_default()
                    .insert(entry.check_value.clone());
            }

            {
                let load_data = media_set.load_mut(load)?;
                load_data.part_number = header.part_number.clone();
                load_data.part_flags = header.part_flags;
                load_data.load_type = header.load_type.clone();
                if header.target_hardware_id_positions.is_empty() {
                    for target_hardware_id in &header.target_hardware_ids {
                        load_data.set_target_hardware_id(target_hardware_id.clone(), Vec::new());
                    }
                } else {
                    load_data.target_hardware_id_positions =
                        header.target_hardware_id_positions.clone();
                }
                load_data.set_user_defined_data(header.user_defined_data.clone());
                load_data.load_check_value_type =
                    used_type(header.load_check_value.check_value_type());
            }

            for file_entry in &header.data_files {
                let file = *regular_by_name.get(&file_entry.filename).ok_or_else(|| {
                    Error::DanglingReference {
                        from: entry.filename.clone(),
                        to: file_entry.filename.clone(),
                    }
                })?;
                media_set.add_load_data_file(
                    load,
                    file,
                    file_entry.part_number.clone(),
                    used_type(file_entry.check_value.check_value_type()),
                )?;
                if file_entry.check_value.is_used() {
                    check_values
                        .entry(file)
                        .or_default()
                        .insert(file_entry.check_value.clone());
                }
            }
            for file_entry in &header.support_files {
                let file = *regular_by_name.get(&file_entry.filename).ok_or_else(|| {
                    Error::DanglingReference {
                        from: entry.filename.clone(),
                        to: file_entry.filename.clone(),
                    }
                })?;
                media_set.add_load_support_file(
                    load,
                    file,
                    file_entry.part_number.clone(),
                    used_type(file_entry.check_value.check_value_type()),
                )?;
                if file_entry.check_value.is_used() {
                    check_values
                        .entry(file)
                        .or_default()
                        .insert(file_entry.check_value.clone());
                }
            }

            if header.load_check_value.is_used() {
                check_values
                    .entry(load)
                    .or_default()
                    .insert(header.load_check_value.clone());
            }

            loads_by_name.insert(entry.filename.clone(), load);
            decoded_headers.push((load, header));
        }

        // Batches.
        if let Some(batch_list) = &batch_list {
            for batch_entry in &batch_list.batches {
                let entry = *entries_by_name
                    .get(batch_entry.filename.as_str())
                    .ok_or_else(|| Error::DanglingReference {
                        from: LIST_OF_BATCHES_NAME.to_string(),
                        to: batch_entry.filename.clone(),
                    })?;

                let raw = self.read(entry.member_sequence_number, &entry.relative_path())?;
                let batch_file = BatchFile::decode(&raw)?;

                if batch_file.part_number != batch_entry.part_number {
                    return Err(Error::MediaSetInconsistent {
                        medium: entry.member_sequence_number,
                        field: format!(
                            "part number of batch file {:?} differs from list of batches",
                            entry.filename
                        ),
                    });
                }

                let parent =
                    ensure_directory(&mut media_set, &mut directories, &entry.path_components())?;
                let batch = media_set.create_batch(parent, &entry.filename, &batch_file.part_number)?;
                media_set.set_file_medium_number(batch, Some(entry.member_sequence_number))?;
                if entry.check_value.is_used() {
                    media_set.set_file_check_value_type(
                        batch,
                        Some(entry.check_value.check_value_type()),
                    )?;
                    check_values
                        .entry(batch)
                        .or_default()
                        .insert(entry.check_value.clone());
                }
                media_set.batch_mut(batch)?.comment = batch_file.comment.clone();

                for target in &batch_file.target_hardware_loads {
                    for batch_load in &target.loads {
                        let load = *loads_by_name
                            .get(&batch_load.header_filename)
                            .ok_or_else(|| Error::DanglingReference {
                                from: entry.filename.clone(),
                                to: batch_load.header_filename.clone(),
                            })?;
                        if media_set.load(load)?.part_number != batch_load.part_number {
                            return Err(Error::MediaSetInconsistent {
                                medium: entry.member_sequence_number,
                                field: format!(
                                    "part number of load {:?} differs from batch {:?}",
                                    batch_load.header_filename, entry.filename
                                ),
                            });
                        }
                        media_set.add_batch_load(batch, target.target_hardware_id.clone(), load)?;
                    }
                }
            }
        }

        // Existence probe through the size handler, independent of the
        // integrity pass.
        if self.file_size.is_some() {
            for entry in &file_list.files {
                if matches!(
                    FileType::from_filename(&entry.filename),
                    Some(FileType::FileList | FileType::LoadList | FileType::BatchList)
                ) {
                    continue;
                }
                let path = entry.relative_path();
                let medium = entry.member_sequence_number;
                if let Some(file_size) = &mut self.file_size {
                    file_size(medium, &path).map_err(|source| {
                        Error::backend(format!("probing {path} on medium {medium}"), source)
                    })?;
                }
            }
        }

        if self.check_file_integrity {
            self.check_integrity(
                &file_list,
                &further_file_lists,
                &decoded_headers,
                &entries_by_name,
                &media_set,
            )?;
        }

        info!(
            part_number,
            files = media_set.recursive_files().len(),
            "decompiled media set"
        );

        Ok((media_set, check_values))
    }

    /// Integrity pass: re-reads every file and verifies CRCs and check
    /// values, plus the load CRC of every load.
    fn check_integrity(
        &mut self,
        file_list: &FileListFile,
        further_file_lists: &[FileListFile],
        decoded_headers: &[(FileId, LoadHeaderFile)],
        entries_by_name: &HashMap<&str, &FileListEntry>,
        media_set: &MediaSet,
    ) -> Result<()> {
        // Model files, from the unified inventory of the first medium.
        for entry in &file_list.files {
            if matches!(
                FileType::from_filename(&entry.filename),
                Some(FileType::FileList | FileType::LoadList | FileType::BatchList)
            ) {
                continue;
            }
            let raw = self.read(entry.member_sequence_number, &entry.relative_path())?;
            verify_file_entry(entry, &raw)?;
        }

        // The generated list files differ per medium; verify each medium's
        // own copies against its own inventory.
        for (index, medium_file_list) in std::iter::once(file_list)
            .chain(further_file_lists)
            .enumerate()
        {
            let medium = MediumNumber::new(1) + index as u8;
            for entry in &medium_file_list.files {
                if matches!(
                    FileType::from_filename(&entry.filename),
                    Some(FileType::LoadList | FileType::BatchList)
                ) {
                    let raw = self.read(medium, &entry.relative_path())?;
                    verify_file_entry(entry, &raw)?;
                }
            }
        }

        // Load CRCs and load check values over the concatenated data and
        // support file contents.
        for (load, header) in decoded_headers {
            let load_name = media_set.path_of_file(*load)?;

            let mut load_crc = Arinc645Crc32::new();
            let mut generator =
                CheckValueGenerator::new(header.load_check_value.check_value_type());

            for file_entry in header.data_files.iter().chain(&header.support_files) {
                let entry = *entries_by_name
                    .get(file_entry.filename.as_str())
                    .ok_or_else(|| Error::DanglingReference {
                        from: load_name.clone(),
                        to: file_entry.filename.clone(),
                    })?;
                let raw = self.read(entry.member_sequence_number, &entry.relative_path())?;

                if raw.len() as u64 != file_entry.length_in_bytes(header.version) {
                    return Err(Error::integrity(
                        &file_entry.filename,
                        Error::FileLengthMismatch {
                            file: file_entry.filename.clone(),
                            stored: file_entry.length_in_bytes(header.version),
                            actual: raw.len() as u64,
                        },
                    ));
                }
                let computed = crc16(&raw);
                if computed != file_entry.crc {
                    return Err(Error::integrity(
                        &file_entry.filename,
                        Error::ChecksumMismatch {
                            file: file_entry.filename.clone(),
                            stored: file_entry.crc,
                            computed,
                        },
                    ));
                }
                if file_entry.check_value.is_used() {
                    let computed =
                        check_value_of(file_entry.check_value.check_value_type(), &raw);
                    if computed != file_entry.check_value {
                        return Err(Error::integrity(
                            &file_entry.filename,
                            Error::CheckValueMismatch {
                                file: file_entry.filename.clone(),
                                check_value_type: file_entry.check_value.check_value_type(),
                            },
                        ));
                    }
                }

                load_crc.update(&raw);
                generator.update(&raw);
            }

            let computed = load_crc.finalize();
            if computed != header.load_crc {
                return Err(Error::LoadCrcMismatch {
                    load: load_name,
                    stored: header.load_crc,
                    computed,
                });
            }

            let computed = generator.finalize();
            if header.load_check_value.is_used() && computed != header.load_check_value {
                return Err(Error::integrity(
                    &load_name,
                    Error::CheckValueMismatch {
                        file: load_name.clone(),
                        check_value_type: header.load_check_value.check_value_type(),
                    },
                ));
            }
        }

        Ok(())
    }

    fn read(&mut self, medium: MediumNumber, path: &str) -> Result<Vec<u8>> {
        (self.read_file)(medium, path).map_err(|source| {
            Error::backend(format!("reading {path} from medium {medium}"), source)
        })
    }

    fn emit_progress(
        &mut self,
        part_number: &str,
        current_medium: MediumNumber,
        total_media: MediumNumber,
    ) -> Result<()> {
        if let Some(progress) = &mut self.progress {
            let info = ProgressInfo {
                current_media_set: 1,
                total_media_sets: 1,
                part_number,
                current_medium,
                total_media,
            };
            progress(&info).map_err(|_| Error::Cancelled)?;
        }
        Ok(())
    }
}

/// Verifies a file's CRC and check value against its list entry.
fn verify_file_entry(entry: &FileListEntry, raw: &[u8]) -> Result<()> {
    let computed = crc16(raw);
    if computed != entry.crc {
        return Err(Error::integrity(
            entry.relative_path(),
            Error::ChecksumMismatch {
                file: entry.relative_path(),
                stored: entry.crc,
                computed,
            },
        ));
    }

    if entry.check_value.is_used() {
        let computed = check_value_of(entry.check_value.check_value_type(), raw);
        if computed != entry.check_value {
            return Err(Error::integrity(
                entry.relative_path(),
                Error::CheckValueMismatch {
                    file: entry.relative_path(),
                    check_value_type: entry.check_value.check_value_type(),
                },
            ));
        }
    }

    Ok(())
}

fn check_media_information(
    file_list: &FileListFile,
    other: &arinc665_files::MediaSetInformation,
    medium: MediumNumber,
) -> Result<()> {
    let expected = &file_list.media_information;
    if expected.part_number != other.part_number {
        return Err(Error::MediaSetInconsistent {
            medium,
            field: "media set part number differs between list files".to_string(),
        });
    }
    if expected.number_of_media_set_members != other.number_of_media_set_members {
        return Err(Error::MediaSetInconsistent {
            medium,
            field: "number of media set members differs between list files".to_string(),
        });
    }
    if expected.media_sequence_number != other.media_sequence_number {
        return Err(Error::MediaSetInconsistent {
            medium,
            field: "media sequence number differs between list files".to_string(),
        });
    }
    Ok(())
}

fn check_sequence_number(
    information: &arinc665_files::MediaSetInformation,
    medium: MediumNumber,
) -> Result<()> {
    if information.media_sequence_number != medium {
        return Err(Error::MediaSetInconsistent {
            medium,
            field: format!(
                "media sequence number is {} instead of {}",
                information.media_sequence_number, medium
            ),
        });
    }
    Ok(())
}

fn used_type(check_value_type: CheckValueType) -> Option<CheckValueType> {
    (check_value_type != CheckValueType::NotUsed).then_some(check_value_type)
}

fn media_range(from: MediumNumber, to: MediumNumber) -> impl Iterator<Item = MediumNumber> {
    (from.get()..=to.get()).map(MediumNumber::new)
}

fn ensure_directory(
    media_set: &mut MediaSet,
    directories: &mut HashMap<String, ContainerId>,
    components: &[&str],
) -> Result<ContainerId> {
    let mut container = ContainerId::Root;
    let mut path = String::new();

    for component in components {
        if !path.is_empty() {
            path.push('/');
        }
        path.push_str(component);

        container = if let Some(container) = directories.get(&path) {
            *container
        } else {
            let directory = media_set.create_directory(container, *component)?;
            let container = ContainerId::Directory(directory);
            directories.insert(path.clone(), container);
            container
        };
    }

    Ok(container)
}
