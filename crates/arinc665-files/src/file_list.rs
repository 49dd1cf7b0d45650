//! List of Files (`FILES.LUM`) codec.
//!
//! Every medium of a media set carries a List of Files indexing *all* files
//! of the whole set: filename, encoded path, member sequence number
//! (the medium the file physically resides on), a CRC over the file
//! contents and, from supplement 3 on, a check value. The supplement 3+
//! layout additionally embeds a media-set check value and a list check
//! value, both computed over the encoded list file up to the respective
//! field.

use binrw::{BinRead, BinWrite};
use std::collections::BTreeMap;
use std::io::{Cursor, Seek, Write};
use tracing::debug;

use arinc645::{CheckValue, CheckValueType, check_value_of};

use crate::check_value::{decode_check_value, encode_check_value, encoded_check_value_size};
use crate::frame::{
    DEFAULT_CHECKSUM_POSITION, POINTER_TABLE_OFFSET, append_file_crc, check_spare, decode_header,
    even_user_defined_data, section_cursor, set_pointer, write_header,
};
use crate::media_information::MediaSetInformation;
use crate::medium_number::MediumNumber;
use crate::strings::{decode_string, encode_string};
use crate::version::{FileType, SupportedArinc665Version};
use crate::{Error, Result};

const MEDIA_INFORMATION_POINTER_OFFSET: usize = POINTER_TABLE_OFFSET;
const FILE_LIST_POINTER_OFFSET: usize = POINTER_TABLE_OFFSET + 4;
const USER_DEFINED_DATA_POINTER_OFFSET: usize = POINTER_TABLE_OFFSET + 8;
const MEDIA_SET_CHECK_VALUE_POINTER_OFFSET: usize = POINTER_TABLE_OFFSET + 12;
const LIST_CHECK_VALUE_POINTER_OFFSET: usize = POINTER_TABLE_OFFSET + 16;

const FIXED_HEADER_SIZE_V2: usize = POINTER_TABLE_OFFSET + 3 * size_of::<u32>();
const FIXED_HEADER_SIZE_V345: usize = POINTER_TABLE_OFFSET + 5 * size_of::<u32>();

/// One entry of the file list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileListEntry {
    pub filename: String,
    /// Path of the containing directory, encoded with `\` separators and a
    /// trailing `\` (see [`encode_path_name`]).
    pub path_name: String,
    /// Medium the file physically resides on.
    pub member_sequence_number: MediumNumber,
    /// ARINC 645 CRC-16 over the complete file contents.
    pub crc: u16,
    /// Check value over the file contents (supplement 3+; `NOT_USED`
    /// otherwise).
    pub check_value: CheckValue,
}

impl FileListEntry {
    /// Path components of [`Self::path_name`], without separators.
    pub fn path_components(&self) -> Vec<&str> {
        self.path_name
            .split('\\')
            .filter(|component| !component.is_empty())
            .collect()
    }

    /// Slash-separated path of the file relative to the medium root.
    pub fn relative_path(&self) -> String {
        let mut components = self.path_components();
        components.push(&self.filename);
        components.join("/")
    }
}

/// Encodes directory components into an ARINC 665 path name.
///
/// Components are joined with `\` and a trailing `\` is always present;
/// forward slashes inside components are converted.
pub fn encode_path_name<S: AsRef<str>>(components: &[S]) -> String {
    let mut path_name = String::new();
    for component in components {
        path_name.push_str(&component.as_ref().replace('/', "\\"));
        path_name.push('\\');
    }
    if path_name.is_empty() {
        path_name.push('\\');
    }
    path_name
}

/// List of Files (`FILES.LUM`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileListFile {
    pub version: SupportedArinc665Version,
    pub media_information: MediaSetInformation,
    pub files: Vec<FileListEntry>,
    pub user_defined_data: Vec<u8>,
    /// Check value type protecting the media set index (supplement 3+).
    pub media_set_check_value_type: CheckValueType,
    /// Check value type protecting this list file (supplement 3+).
    pub list_check_value_type: CheckValueType,
}

impl FileListFile {
    pub fn new(version: SupportedArinc665Version) -> Self {
        Self {
            version,
            media_information: MediaSetInformation {
                part_number: String::new(),
                media_sequence_number: MediumNumber::FIRST,
                number_of_media_set_members: MediumNumber::FIRST,
            },
            files: Vec::new(),
            user_defined_data: Vec::new(),
            media_set_check_value_type: CheckValueType::NotUsed,
            list_check_value_type: CheckValueType::NotUsed,
        }
    }

    /// Decodes and validates a raw List of Files.
    pub fn decode(raw: &[u8]) -> Result<Self> {
        let version = decode_header(raw, FileType::FileList, DEFAULT_CHECKSUM_POSITION)?;
        check_spare(raw)?;

        let mut pointers = Cursor::new(raw);
        pointers.set_position(MEDIA_INFORMATION_POINTER_OFFSET as u64);
        let media_information_pointer = u32::read_be(&mut pointers)?;
        let file_list_pointer = u32::read_be(&mut pointers)?;
        let user_defined_data_pointer = u32::read_be(&mut pointers)?;

        let media_information =
            MediaSetInformation::read(&mut section_cursor(raw, media_information_pointer)?)?;

        let files = decode_file_entries(raw, file_list_pointer, version)?;

        let (media_set_check_value_type, list_check_value_type, user_defined_data_end) =
            match version {
                SupportedArinc665Version::Supplement2 => (
                    CheckValueType::NotUsed,
                    CheckValueType::NotUsed,
                    raw.len() - DEFAULT_CHECKSUM_POSITION,
                ),
                SupportedArinc665Version::Supplement345 => {
                    let media_set_check_value_pointer = u32::read_be(&mut pointers)?;
                    let list_check_value_pointer = u32::read_be(&mut pointers)?;

                    let media_set_check_value_type = decode_prefix_check_value(
                        raw,
                        media_set_check_value_pointer,
                        "media set check value",
                    )?;
                    let list_check_value_type = decode_prefix_check_value(
                        raw,
                        list_check_value_pointer,
                        "list of files check value",
                    )?;

                    (
                        media_set_check_value_type,
                        list_check_value_type,
                        media_set_check_value_pointer as usize * 2,
                    )
                }
            };

        let user_defined_data = if user_defined_data_pointer == 0 {
            Vec::new()
        } else {
            let start = user_defined_data_pointer as usize * 2;
            if start > user_defined_data_end {
                return Err(Error::invalid("user defined data pointer exceeds file"));
            }
            raw[start..user_defined_data_end].to_vec()
        };

        debug!(
            part_number = media_information.part_number,
            files = files.len(),
            "decoded list of files"
        );

        Ok(Self {
            version,
            media_information,
            files,
            user_defined_data,
            media_set_check_value_type,
            list_check_value_type,
        })
    }

    /// Encodes the List of Files, computing all pointers, check values and
    /// the file CRC.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let fixed_header_size = match self.version {
            SupportedArinc665Version::Supplement2 => FIXED_HEADER_SIZE_V2,
            SupportedArinc665Version::Supplement345 => FIXED_HEADER_SIZE_V345,
        };
        let mut writer = Cursor::new(vec![0u8; fixed_header_size]);
        writer.set_position(fixed_header_size as u64);

        let offset = writer.get_ref().len();
        self.media_information.write(&mut writer)?;
        set_pointer(writer.get_mut(), MEDIA_INFORMATION_POINTER_OFFSET, offset)?;

        let offset = writer.get_ref().len();
        encode_file_entries(&mut writer, &self.files, self.version)?;
        set_pointer(writer.get_mut(), FILE_LIST_POINTER_OFFSET, offset)?;

        let user_defined_data = even_user_defined_data(&self.user_defined_data);
        if !user_defined_data.is_empty() {
            let offset = writer.get_ref().len();
            writer.write_all(&user_defined_data)?;
            set_pointer(writer.get_mut(), USER_DEFINED_DATA_POINTER_OFFSET, offset)?;
        }

        match self.version {
            SupportedArinc665Version::Supplement2 => {
                let total = writer.get_ref().len() + DEFAULT_CHECKSUM_POSITION;
                write_header(writer.get_mut(), FileType::FileList, self.version, total)?;
            }
            SupportedArinc665Version::Supplement345 => {
                let media_set_offset = writer.get_ref().len();
                let list_offset =
                    media_set_offset + encoded_check_value_size(self.media_set_check_value_type);
                let total = list_offset
                    + encoded_check_value_size(self.list_check_value_type)
                    + DEFAULT_CHECKSUM_POSITION;

                set_pointer(
                    writer.get_mut(),
                    MEDIA_SET_CHECK_VALUE_POINTER_OFFSET,
                    media_set_offset,
                )?;
                set_pointer(writer.get_mut(), LIST_CHECK_VALUE_POINTER_OFFSET, list_offset)?;
                write_header(writer.get_mut(), FileType::FileList, self.version, total)?;

                let media_set_check_value =
                    check_value_of(self.media_set_check_value_type, writer.get_ref());
                encode_check_value(&mut writer, &media_set_check_value)?;

                let list_check_value =
                    check_value_of(self.list_check_value_type, writer.get_ref());
                encode_check_value(&mut writer, &list_check_value)?;
            }
        }

        let mut raw = writer.into_inner();
        append_file_crc(&mut raw);
        Ok(raw)
    }

    /// Whether `other` describes the same media set as `self`.
    ///
    /// List entries of the generated list files (`LOADS.LUM`,
    /// `BATCHES.LUM`) naturally differ between media in CRC and member
    /// sequence number, so those fields are exempted for them.
    pub fn belongs_to_same_media_set(&self, other: &FileListFile) -> bool {
        if self.media_information.part_number != other.media_information.part_number
            || self.media_information.number_of_media_set_members
                != other.media_information.number_of_media_set_members
            || self.user_defined_data != other.user_defined_data
            || self.files.len() != other.files.len()
        {
            return false;
        }

        self.files.iter().zip(&other.files).all(|(mine, theirs)| {
            if mine.filename != theirs.filename || mine.path_name != theirs.path_name {
                return false;
            }

            match FileType::from_filename(&mine.filename) {
                Some(FileType::LoadList | FileType::BatchList) => true,
                _ => {
                    mine.crc == theirs.crc
                        && mine.member_sequence_number == theirs.member_sequence_number
                        && mine.check_value == theirs.check_value
                }
            }
        })
    }

    /// File entries keyed by medium and medium-relative path.
    pub fn files_by_path(&self) -> BTreeMap<(MediumNumber, String), &FileListEntry> {
        self.files
            .iter()
            .map(|entry| {
                (
                    (entry.member_sequence_number, entry.relative_path()),
                    entry,
                )
            })
            .collect()
    }
}

fn decode_prefix_check_value(
    raw: &[u8],
    word_pointer: u32,
    field: &str,
) -> Result<CheckValueType> {
    let byte_offset = word_pointer as usize * 2;
    let mut cursor = section_cursor(raw, word_pointer)?;
    let stored = decode_check_value(&mut cursor)?;

    if stored.is_used() {
        let computed = check_value_of(stored.check_value_type(), &raw[..byte_offset]);
        if computed != stored {
            return Err(Error::CheckValueMismatch {
                stored: format!("{field} {stored}"),
                computed: computed.to_string(),
            });
        }
    }

    Ok(stored.check_value_type())
}

fn encode_file_entries<W: Write + Seek>(
    writer: &mut W,
    files: &[FileListEntry],
    version: SupportedArinc665Version,
) -> Result<()> {
    let count = u16::try_from(files.len())
        .map_err(|_| Error::invalid("more file list entries than allowed"))?;
    count.write_be(writer)?;

    for (index, file) in files.iter().enumerate() {
        let mut entry = Cursor::new(vec![0u8; size_of::<u16>()]);
        entry.set_position(size_of::<u16>() as u64);

        encode_string(&mut entry, &file.filename)?;
        encode_string(&mut entry, &file.path_name)?;
        u16::from(file.member_sequence_number.get()).write_be(&mut entry)?;
        file.crc.write_be(&mut entry)?;
        if version == SupportedArinc665Version::Supplement345 {
            encode_check_value(&mut entry, &file.check_value)?;
        }

        // Next-entry pointer in 16-bit words; zero terminates the list.
        let mut entry = entry.into_inner();
        if index + 1 < files.len() {
            let words = u16::try_from(entry.len() / 2)
                .map_err(|_| Error::invalid("file list entry exceeds pointer range"))?;
            entry[0..2].copy_from_slice(&words.to_be_bytes());
        }

        writer.write_all(&entry)?;
    }

    Ok(())
}

fn decode_file_entries(
    raw: &[u8],
    file_list_pointer: u32,
    version: SupportedArinc665Version,
) -> Result<Vec<FileListEntry>> {
    let mut cursor = section_cursor(raw, file_list_pointer)?;
    let count = u16::read_be(&mut cursor)?;

    let mut files = Vec::with_capacity(count as usize);
    let mut entry_offset = cursor.position();

    for index in 0..count {
        cursor.set_position(entry_offset);

        let next_pointer = u16::read_be(&mut cursor)?;
        if index + 1 < count && next_pointer == 0 {
            return Err(Error::invalid("next file pointer is 0"));
        }
        if index + 1 == count && next_pointer != 0 {
            return Err(Error::invalid("next file pointer is not 0"));
        }

        let filename = decode_string(&mut cursor)?;
        let path_name = decode_string(&mut cursor)?;

        let member_sequence_number = u16::read_be(&mut cursor)?;
        if !(1..=255).contains(&member_sequence_number) {
            return Err(Error::invalid("member sequence number out of range"));
        }

        let crc = u16::read_be(&mut cursor)?;

        let check_value = match version {
            SupportedArinc665Version::Supplement2 => CheckValue::NOT_USED,
            SupportedArinc665Version::Supplement345 => decode_check_value(&mut cursor)?,
        };

        files.push(FileListEntry {
            filename,
            path_name,
            member_sequence_number: MediumNumber::new(member_sequence_number as u8),
            crc,
            check_value,
        });

        entry_offset += u64::from(next_pointer) * 2;
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_list(version: SupportedArinc665Version) -> FileListFile {
        FileListFile {
            version,
            media_information: MediaSetInformation {
                part_number: "MSET0012345".to_string(),
                media_sequence_number: MediumNumber::new(1),
                number_of_media_set_members: MediumNumber::new(2),
            },
            files: vec![
                FileListEntry {
                    filename: "APP.BIN".to_string(),
                    path_name: "\\".to_string(),
                    member_sequence_number: MediumNumber::new(1),
                    crc: 0xABCD,
                    check_value: CheckValue::NOT_USED,
                },
                FileListEntry {
                    filename: "DATA.BIN".to_string(),
                    path_name: "SW\\CFG\\".to_string(),
                    member_sequence_number: MediumNumber::new(2),
                    crc: 0x1234,
                    check_value: CheckValue::NOT_USED,
                },
            ],
            user_defined_data: vec![0xDE, 0xAD],
            media_set_check_value_type: CheckValueType::NotUsed,
            list_check_value_type: CheckValueType::NotUsed,
        }
    }

    #[test]
    fn test_round_trip_supplement2() {
        let list = sample_list(SupportedArinc665Version::Supplement2);
        let raw = list.encode().unwrap();

        assert_eq!(raw.len() % 2, 0);
        // Length field counts 16-bit words in supplement 2
        assert_eq!(
            u32::from_be_bytes(raw[0..4].try_into().unwrap()) as usize * 2,
            raw.len()
        );
        assert_eq!(u16::from_be_bytes([raw[4], raw[5]]), 0x8004);

        let decoded = FileListFile::decode(&raw).unwrap();
        assert_eq!(decoded, list);
        // Byte-exact re-encode
        assert_eq!(decoded.encode().unwrap(), raw);
    }

    #[test]
    fn test_round_trip_supplement345_with_check_values() {
        let mut list = sample_list(SupportedArinc665Version::Supplement345);
        list.files[0].check_value = arinc645::check_value_of(CheckValueType::Sha256, b"APP");
        list.media_set_check_value_type = CheckValueType::Crc32;
        list.list_check_value_type = CheckValueType::Crc16;

        let raw = list.encode().unwrap();
        assert_eq!(u16::from_be_bytes([raw[4], raw[5]]), 0x8005);
        assert_eq!(
            u32::from_be_bytes(raw[0..4].try_into().unwrap()) as usize,
            raw.len()
        );

        let decoded = FileListFile::decode(&raw).unwrap();
        assert_eq!(decoded, list);
        assert_eq!(decoded.encode().unwrap(), raw);
    }

    #[test]
    fn test_corrupted_list_check_value_rejected() {
        let mut list = sample_list(SupportedArinc665Version::Supplement345);
        list.list_check_value_type = CheckValueType::Crc16;
        let mut raw = list.encode().unwrap();

        // Flip a bit inside the media information section; the file CRC is
        // then fixed up so the check value comparison is what fails.
        raw[FIXED_HEADER_SIZE_V345 + 2] ^= 0x01;
        let crc_offset = raw.len() - 2;
        let crc = arinc645::crc16(&raw[..crc_offset]);
        raw[crc_offset..].copy_from_slice(&crc.to_be_bytes());

        assert!(matches!(
            FileListFile::decode(&raw),
            Err(Error::CheckValueMismatch { .. })
        ));
    }

    #[test]
    fn test_empty_file_list() {
        let mut list = sample_list(SupportedArinc665Version::Supplement345);
        list.files.clear();
        list.user_defined_data.clear();

        let raw = list.encode().unwrap();
        let decoded = FileListFile::decode(&raw).unwrap();
        assert_eq!(decoded, list);
    }

    #[test]
    fn test_belongs_to_same_media_set() {
        let mut first = sample_list(SupportedArinc665Version::Supplement2);
        first.files.push(FileListEntry {
            filename: "LOADS.LUM".to_string(),
            path_name: "\\".to_string(),
            member_sequence_number: MediumNumber::new(1),
            crc: 0x1111,
            check_value: CheckValue::NOT_USED,
        });

        let mut second = first.clone();
        second.media_information.media_sequence_number = MediumNumber::new(2);
        // The generated list file differs per medium
        second.files[2].crc = 0x2222;
        second.files[2].member_sequence_number = MediumNumber::new(2);
        assert!(first.belongs_to_same_media_set(&second));

        // A payload file difference is a real mismatch
        second.files[0].crc = 0x9999;
        assert!(!first.belongs_to_same_media_set(&second));
    }

    #[test]
    fn test_path_helpers() {
        assert_eq!(encode_path_name::<&str>(&[]), "\\");
        assert_eq!(encode_path_name(&["SW", "CFG"]), "SW\\CFG\\");
        assert_eq!(encode_path_name(&["SW/CFG"]), "SW\\CFG\\");

        let entry = FileListEntry {
            filename: "DATA.BIN".to_string(),
            path_name: "SW\\CFG\\".to_string(),
            member_sequence_number: MediumNumber::new(1),
            crc: 0,
            check_value: CheckValue::NOT_USED,
        };
        assert_eq!(entry.path_components(), vec!["SW", "CFG"]);
        assert_eq!(entry.relative_path(), "SW/CFG/DATA.BIN");
    }

    #[test]
    fn test_files_by_path() {
        let list = sample_list(SupportedArinc665Version::Supplement2);
        let by_path = list.files_by_path();
        assert_eq!(by_path.len(), 2);
        assert!(by_path.contains_key(&(MediumNumber::new(1), "APP.BIN".to_string())));
        assert!(by_path.contains_key(&(MediumNumber::new(2), "SW/CFG/DATA.BIN".to_string())));
    }
}
