//! Load Upload Header (`*.LUH`) codec.
//!
//! A load header bundles one load: its part number, the target hardware it
//! may be uploaded to, the data and support files making up the load and
//! optional user-defined data. Two CRCs trail the file: the 16-bit file CRC
//! six bytes before the end, and the 32-bit *load CRC* over the
//! concatenated contents of all data and support files in the last four
//! bytes.
//!
//! Supplement 3+ headers additionally carry part flags, an optional load
//! type, per-target positions, per-file check values and a load check value
//! computed over the same stream as the load CRC.

use binrw::{BinRead, BinWrite};
use std::io::{Cursor, Seek, Write};
use tracing::debug;

use arinc645::CheckValue;

use crate::check_value::{decode_check_value, encode_check_value};
use crate::frame::{
    LOAD_HEADER_CHECKSUM_POSITION, POINTER_TABLE_OFFSET, SPARE_FIELD_OFFSET, append_file_crc,
    check_spare, decode_header, even_user_defined_data, read_u16_at, read_u32_at, section_cursor,
    set_pointer, write_header,
};
use crate::strings::{decode_string, decode_strings, encode_string, encode_strings};
use crate::version::{FileType, SupportedArinc665Version};
use crate::{Error, Result};

const PART_NUMBER_POINTER_OFFSET: usize = POINTER_TABLE_OFFSET;
const TARGET_HARDWARE_POINTER_OFFSET: usize = POINTER_TABLE_OFFSET + 4;
const DATA_FILES_POINTER_OFFSET: usize = POINTER_TABLE_OFFSET + 8;
const SUPPORT_FILES_POINTER_OFFSET: usize = POINTER_TABLE_OFFSET + 12;
const USER_DEFINED_DATA_POINTER_OFFSET: usize = POINTER_TABLE_OFFSET + 16;
const LOAD_TYPE_POINTER_OFFSET: usize = POINTER_TABLE_OFFSET + 20;
const THW_POSITIONS_POINTER_OFFSET: usize = POINTER_TABLE_OFFSET + 24;
const LOAD_CHECK_VALUE_POINTER_OFFSET: usize = POINTER_TABLE_OFFSET + 28;

const FIXED_HEADER_SIZE_V2: usize = POINTER_TABLE_OFFSET + 5 * size_of::<u32>();
const FIXED_HEADER_SIZE_V345: usize = POINTER_TABLE_OFFSET + 8 * size_of::<u32>();

/// Load type: free-text description plus a 16-bit type identifier
/// (supplement 3+).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadType {
    pub description: String,
    pub id: u16,
}

/// A target hardware identifier with the positions the load applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetHardwareIdPositions {
    pub target_hardware_id: String,
    pub positions: Vec<String>,
}

impl TargetHardwareIdPositions {
    pub(crate) fn encode_list<W: Write + Seek>(writer: &mut W, items: &[Self]) -> Result<()> {
        let count = u16::try_from(items.len())
            .map_err(|_| Error::invalid("more target hardware entries than allowed"))?;
        count.write_be(writer)?;

        for item in items {
            encode_string(writer, &item.target_hardware_id)?;
            encode_strings(writer, &item.positions)?;
        }

        Ok(())
    }

    pub(crate) fn decode_list(cursor: &mut Cursor<&[u8]>) -> Result<Vec<Self>> {
        let count = u16::read_be(cursor)?;

        let mut items = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let target_hardware_id = decode_string(cursor)?;
            let positions = decode_strings(cursor)?;
            items.push(Self {
                target_hardware_id,
                positions,
            });
        }

        Ok(items)
    }
}

/// A data or support file reference inside a load header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadFileEntry {
    pub filename: String,
    pub part_number: String,
    /// Raw file length field. Supplement 2 counts 16-bit words, supplement
    /// 3+ bytes; see [`Self::length_in_bytes`].
    pub length: u32,
    /// ARINC 645 CRC-16 over the file contents.
    pub crc: u16,
    /// Check value over the file contents (supplement 3+).
    pub check_value: CheckValue,
}

impl LoadFileEntry {
    /// File length in bytes under the given supplement's length unit.
    pub fn length_in_bytes(&self, version: SupportedArinc665Version) -> u64 {
        match version {
            SupportedArinc665Version::Supplement2 => u64::from(self.length) * 2,
            SupportedArinc665Version::Supplement345 => u64::from(self.length),
        }
    }
}

/// Load Upload Header (`*.LUH`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadHeaderFile {
    pub version: SupportedArinc665Version,
    /// Part flags (supplement 3+; reads as 0 from supplement 2 headers).
    pub part_flags: u16,
    pub part_number: String,
    pub load_type: Option<LoadType>,
    pub target_hardware_ids: Vec<String>,
    /// Target hardware with positions (supplement 3+).
    pub target_hardware_id_positions: Vec<TargetHardwareIdPositions>,
    pub data_files: Vec<LoadFileEntry>,
    pub support_files: Vec<LoadFileEntry>,
    pub user_defined_data: Vec<u8>,
    /// Load check value over the concatenated data and support file
    /// contents (supplement 3+).
    pub load_check_value: CheckValue,
    /// 32-bit CRC over the concatenated data and support file contents.
    pub load_crc: u32,
}

impl LoadHeaderFile {
    pub fn new(version: SupportedArinc665Version) -> Self {
        Self {
            version,
            part_flags: 0,
            part_number: String::new(),
            load_type: None,
            target_hardware_ids: Vec::new(),
            target_hardware_id_positions: Vec::new(),
            data_files: Vec::new(),
            support_files: Vec::new(),
            user_defined_data: Vec::new(),
            load_check_value: CheckValue::NOT_USED,
            load_crc: 0,
        }
    }

    /// Decodes and validates a raw load header.
    pub fn decode(raw: &[u8]) -> Result<Self> {
        let version = decode_header(raw, FileType::LoadUploadHeader, LOAD_HEADER_CHECKSUM_POSITION)?;

        let part_flags = match version {
            SupportedArinc665Version::Supplement2 => {
                check_spare(raw)?;
                0
            }
            SupportedArinc665Version::Supplement345 => read_u16_at(raw, SPARE_FIELD_OFFSET),
        };

        let mut pointers = Cursor::new(raw);
        pointers.set_position(PART_NUMBER_POINTER_OFFSET as u64);
        let part_number_pointer = u32::read_be(&mut pointers)?;
        let target_hardware_pointer = u32::read_be(&mut pointers)?;
        let data_files_pointer = u32::read_be(&mut pointers)?;
        let support_files_pointer = u32::read_be(&mut pointers)?;
        let user_defined_data_pointer = u32::read_be(&mut pointers)?;

        let part_number = decode_string(&mut section_cursor(raw, part_number_pointer)?)?;
        let target_hardware_ids =
            decode_strings(&mut section_cursor(raw, target_hardware_pointer)?)?;

        let data_files = decode_file_entries(raw, data_files_pointer, version)?;
        let support_files = if support_files_pointer == 0 {
            Vec::new()
        } else {
            decode_file_entries(raw, support_files_pointer, version)?
        };

        let mut load_type = None;
        let mut target_hardware_id_positions = Vec::new();
        let mut load_check_value = CheckValue::NOT_USED;
        let user_defined_data_end;

        match version {
            SupportedArinc665Version::Supplement2 => {
                user_defined_data_end = raw.len() - LOAD_HEADER_CHECKSUM_POSITION;
            }
            SupportedArinc665Version::Supplement345 => {
                let load_type_pointer = u32::read_be(&mut pointers)?;
                let thw_positions_pointer = u32::read_be(&mut pointers)?;
                let load_check_value_pointer = u32::read_be(&mut pointers)?;

                if load_type_pointer != 0 {
                    let mut cursor = section_cursor(raw, load_type_pointer)?;
                    let description = decode_string(&mut cursor)?;
                    let id = u16::read_be(&mut cursor)?;
                    load_type = Some(LoadType { description, id });
                }

                if thw_positions_pointer != 0 {
                    target_hardware_id_positions = TargetHardwareIdPositions::decode_list(
                        &mut section_cursor(raw, thw_positions_pointer)?,
                    )?;
                }

                load_check_value =
                    decode_check_value(&mut section_cursor(raw, load_check_value_pointer)?)?;
                user_defined_data_end = load_check_value_pointer as usize * 2;
            }
        }

        let user_defined_data = if user_defined_data_pointer == 0 {
            Vec::new()
        } else {
            let start = user_defined_data_pointer as usize * 2;
            if start > user_defined_data_end {
                return Err(Error::invalid("user defined data pointer exceeds file"));
            }
            raw[start..user_defined_data_end].to_vec()
        };

        let load_crc = read_u32_at(raw, raw.len() - 4);

        debug!(
            part_number,
            data_files = data_files.len(),
            support_files = support_files.len(),
            "decoded load header"
        );

        Ok(Self {
            version,
            part_flags,
            part_number,
            load_type,
            target_hardware_ids,
            target_hardware_id_positions,
            data_files,
            support_files,
            user_defined_data,
            load_check_value,
            load_crc,
        })
    }

    /// Encodes the load header, computing pointers and the file CRC.
    ///
    /// The trailing load CRC is taken from [`Self::load_crc`]; use
    /// [`Self::patch_load_crc`] to update it from the actual file contents
    /// afterwards.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let fixed_header_size = match self.version {
            SupportedArinc665Version::Supplement2 => FIXED_HEADER_SIZE_V2,
            SupportedArinc665Version::Supplement345 => FIXED_HEADER_SIZE_V345,
        };
        let mut writer = Cursor::new(vec![0u8; fixed_header_size]);
        writer.set_position(fixed_header_size as u64);

        if self.version == SupportedArinc665Version::Supplement345 {
            writer.get_mut()[SPARE_FIELD_OFFSET..SPARE_FIELD_OFFSET + 2]
                .copy_from_slice(&self.part_flags.to_be_bytes());
        }

        let offset = writer.get_ref().len();
        encode_string(&mut writer, &self.part_number)?;
        set_pointer(writer.get_mut(), PART_NUMBER_POINTER_OFFSET, offset)?;

        let offset = writer.get_ref().len();
        encode_strings(&mut writer, &self.target_hardware_ids)?;
        set_pointer(writer.get_mut(), TARGET_HARDWARE_POINTER_OFFSET, offset)?;

        let offset = writer.get_ref().len();
        encode_file_entries(&mut writer, &self.data_files, self.version)?;
        set_pointer(writer.get_mut(), DATA_FILES_POINTER_OFFSET, offset)?;

        let offset = writer.get_ref().len();
        encode_file_entries(&mut writer, &self.support_files, self.version)?;
        set_pointer(writer.get_mut(), SUPPORT_FILES_POINTER_OFFSET, offset)?;

        if self.version == SupportedArinc665Version::Supplement345 {
            if let Some(load_type) = &self.load_type {
                let offset = writer.get_ref().len();
                encode_string(&mut writer, &load_type.description)?;
                load_type.id.write_be(&mut writer)?;
                set_pointer(writer.get_mut(), LOAD_TYPE_POINTER_OFFSET, offset)?;
            }

            let offset = writer.get_ref().len();
            TargetHardwareIdPositions::encode_list(
                &mut writer,
                &self.target_hardware_id_positions,
            )?;
            set_pointer(writer.get_mut(), THW_POSITIONS_POINTER_OFFSET, offset)?;
        }

        let user_defined_data = even_user_defined_data(&self.user_defined_data);
        if !user_defined_data.is_empty() {
            let offset = writer.get_ref().len();
            writer.write_all(&user_defined_data)?;
            set_pointer(writer.get_mut(), USER_DEFINED_DATA_POINTER_OFFSET, offset)?;
        }

        if self.version == SupportedArinc665Version::Supplement345 {
            let offset = writer.get_ref().len();
            encode_check_value(&mut writer, &self.load_check_value)?;
            set_pointer(writer.get_mut(), LOAD_CHECK_VALUE_POINTER_OFFSET, offset)?;
        }

        let total = writer.get_ref().len() + LOAD_HEADER_CHECKSUM_POSITION;
        write_header(
            writer.get_mut(),
            FileType::LoadUploadHeader,
            self.version,
            total,
        )?;

        let mut raw = writer.into_inner();
        append_file_crc(&mut raw);
        raw.extend_from_slice(&self.load_crc.to_be_bytes());

        Ok(raw)
    }

    /// Rewrites the trailing load CRC of an encoded header and fixes up the
    /// file CRC accordingly.
    ///
    /// The file CRC does not cover the trailing six bytes, so only the load
    /// CRC field changes.
    pub fn patch_load_crc(raw: &mut [u8], load_crc: u32) -> Result<()> {
        if raw.len() < LOAD_HEADER_CHECKSUM_POSITION {
            return Err(Error::invalid("file too small for a load header"));
        }
        let offset = raw.len() - 4;
        raw[offset..].copy_from_slice(&load_crc.to_be_bytes());
        Ok(())
    }
}

fn encode_file_entries<W: Write + Seek>(
    writer: &mut W,
    files: &[LoadFileEntry],
    version: SupportedArinc665Version,
) -> Result<()> {
    let count =
        u16::try_from(files.len()).map_err(|_| Error::invalid("more load files than allowed"))?;
    count.write_be(writer)?;

    for (index, file) in files.iter().enumerate() {
        let mut entry = Cursor::new(vec![0u8; size_of::<u16>()]);
        entry.set_position(size_of::<u16>() as u64);

        encode_string(&mut entry, &file.filename)?;
        encode_string(&mut entry, &file.part_number)?;
        file.length.write_be(&mut entry)?;
        file.crc.write_be(&mut entry)?;
        if version == SupportedArinc665Version::Supplement345 {
            encode_check_value(&mut entry, &file.check_value)?;
        }

        let mut entry = entry.into_inner();
        if index + 1 < files.len() {
            let words = u16::try_from(entry.len() / 2)
                .map_err(|_| Error::invalid("load file entry exceeds pointer range"))?;
            entry[0..2].copy_from_slice(&words.to_be_bytes());
        }

        writer.write_all(&entry)?;
    }

    Ok(())
}

fn decode_file_entries(
    raw: &[u8],
    list_pointer: u32,
    version: SupportedArinc665Version,
) -> Result<Vec<LoadFileEntry>> {
    let mut cursor = section_cursor(raw, list_pointer)?;
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
        let part_number = decode_string(&mut cursor)?;
        let length = u32::read_be(&mut cursor)?;
        let crc = u16::read_be(&mut cursor)?;

        let check_value = match version {
            SupportedArinc665Version::Supplement2 => CheckValue::NOT_USED,
            SupportedArinc665Version::Supplement345 => decode_check_value(&mut cursor)?,
        };

        files.push(LoadFileEntry {
            filename,
            part_number,
            length,
            crc,
            check_value,
        });

        entry_offset += u64::from(next_pointer) * 2;
    }

    Ok(files)
}
