//! List of Loads (`LOADS.LUM`) codec.
//!
//! Indexes every load of the media set: load part number, header filename,
//! the medium carrying the header and the target hardware the load applies
//! to. Supplement 3+ adds per-target positions, the load check value and a
//! list check value.

use binrw::{BinRead, BinWrite};
use std::io::{Cursor, Seek, Write};
use tracing::debug;

use arinc645::{CheckValue, CheckValueType, check_value_of};

use crate::check_value::{decode_check_value, encode_check_value, encoded_check_value_size};
use crate::frame::{
    DEFAULT_CHECKSUM_POSITION, POINTER_TABLE_OFFSET, append_file_crc, check_spare, decode_header,
    even_user_defined_data, section_cursor, set_pointer, write_header,
};
use crate::load_header::TargetHardwareIdPositions;
use crate::media_information::MediaSetInformation;
use crate::medium_number::MediumNumber;
use crate::strings::{decode_string, decode_strings, encode_string, encode_strings};
use crate::version::{FileType, SupportedArinc665Version};
use crate::{Error, Result};

const MEDIA_INFORMATION_POINTER_OFFSET: usize = POINTER_TABLE_OFFSET;
const LOAD_LIST_POINTER_OFFSET: usize = POINTER_TABLE_OFFSET + 4;
const USER_DEFINED_DATA_POINTER_OFFSET: usize = POINTER_TABLE_OFFSET + 8;
const LIST_CHECK_VALUE_POINTER_OFFSET: usize = POINTER_TABLE_OFFSET + 12;

const FIXED_HEADER_SIZE_V2: usize = POINTER_TABLE_OFFSET + 3 * size_of::<u32>();
const FIXED_HEADER_SIZE_V345: usize = POINTER_TABLE_OFFSET + 4 * size_of::<u32>();

/// One entry of the load list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadListEntry {
    pub part_number: String,
    pub header_filename: String,
    /// Medium the load header resides on.
    pub member_sequence_number: MediumNumber,
    pub target_hardware_ids: Vec<String>,
    /// Target hardware with positions (supplement 3+; empty otherwise).
    pub target_hardware_id_positions: Vec<TargetHardwareIdPositions>,
    /// Load check value, copied from the load header (supplement 3+).
    pub check_value: CheckValue,
}

/// List of Loads (`LOADS.LUM`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadListFile {
    pub version: SupportedArinc665Version,
    pub media_information: MediaSetInformation,
    pub loads: Vec<LoadListEntry>,
    pub user_defined_data: Vec<u8>,
    /// Check value type protecting this list file (supplement 3+).
    pub list_check_value_type: CheckValueType,
}

impl LoadListFile {
    pub fn new(version: SupportedArinc665Version) -> Self {
        Self {
            version,
            media_information: MediaSetInformation {
                part_number: String::new(),
                media_sequence_number: MediumNumber::FIRST,
                number_of_media_set_members: MediumNumber::FIRST,
            },
            loads: Vec::new(),
            user_defined_data: Vec::new(),
            list_check_value_type: CheckValueType::NotUsed,
        }
    }

    /// Decodes and validates a raw List of Loads.
    pub fn decode(raw: &[u8]) -> Result<Self> {
        let version = decode_header(raw, FileType::LoadList, DEFAULT_CHECKSUM_POSITION)?;
        check_spare(raw)?;

        let mut pointers = Cursor::new(raw);
        pointers.set_position(MEDIA_INFORMATION_POINTER_OFFSET as u64);
        let media_information_pointer = u32::read_be(&mut pointers)?;
        let load_list_pointer = u32::read_be(&mut pointers)?;
        let user_defined_data_pointer = u32::read_be(&mut pointers)?;

        let media_information =
            MediaSetInformation::read(&mut section_cursor(raw, media_information_pointer)?)?;

        let loads = decode_load_entries(raw, load_list_pointer, version)?;

        let (list_check_value_type, user_defined_data_end) = match version {
            SupportedArinc665Version::Supplement2 => (
                CheckValueType::NotUsed,
                raw.len() - DEFAULT_CHECKSUM_POSITION,
            ),
            SupportedArinc665Version::Supplement345 => {
                let list_check_value_pointer = u32::read_be(&mut pointers)?;
                let byte_offset = list_check_value_pointer as usize * 2;

                let stored =
                    decode_check_value(&mut section_cursor(raw, list_check_value_pointer)?)?;
                if stored.is_used() {
                    let computed = check_value_of(stored.check_value_type(), &raw[..byte_offset]);
                    if computed != stored {
                        return Err(Error::CheckValueMismatch {
                            stored: format!("list of loads check value {stored}"),
                            computed: computed.to_string(),
                        });
                    }
                }

                (stored.check_value_type(), byte_offset)
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
            loads = loads.len(),
            "decoded list of loads"
        );

        Ok(Self {
            version,
            media_information,
            loads,
            user_defined_data,
            list_check_value_type,
        })
    }

    /// Encodes the List of Loads.
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
        encode_load_entries(&mut writer, &self.loads, self.version)?;
        set_pointer(writer.get_mut(), LOAD_LIST_POINTER_OFFSET, offset)?;

        let user_defined_data = even_user_defined_data(&self.user_defined_data);
        if !user_defined_data.is_empty() {
            let offset = writer.get_ref().len();
            writer.write_all(&user_defined_data)?;
            set_pointer(writer.get_mut(), USER_DEFINED_DATA_POINTER_OFFSET, offset)?;
        }

        match self.version {
            SupportedArinc665Version::Supplement2 => {
                let total = writer.get_ref().len() + DEFAULT_CHECKSUM_POSITION;
                write_header(writer.get_mut(), FileType::LoadList, self.version, total)?;
            }
            SupportedArinc665Version::Supplement345 => {
                let list_offset = writer.get_ref().len();
                let total = list_offset
                    + encoded_check_value_size(self.list_check_value_type)
                    + DEFAULT_CHECKSUM_POSITION;

                set_pointer(writer.get_mut(), LIST_CHECK_VALUE_POINTER_OFFSET, list_offset)?;
                write_header(writer.get_mut(), FileType::LoadList, self.version, total)?;

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
    pub fn belongs_to_same_media_set(&self, other: &LoadListFile) -> bool {
        self.media_information.part_number == other.media_information.part_number
            && self.media_information.number_of_media_set_members
                == other.media_information.number_of_media_set_members
            && self.user_defined_data == other.user_defined_data
            && self.loads == other.loads
    }
}

fn encode_load_entries<W: Write + Seek>(
    writer: &mut W,
    loads: &[LoadListEntry],
    version: SupportedArinc665Version,
) -> Result<()> {
    let count =
        u16::try_from(loads.len()).map_err(|_| Error::invalid("more loads than allowed"))?;
    count.write_be(writer)?;

    for (index, load) in loads.iter().enumerate() {
        let mut entry = Cursor::new(vec![0u8; size_of::<u16>()]);
        entry.set_position(size_of::<u16>() as u64);

        encode_string(&mut entry, &load.part_number)?;
        encode_string(&mut entry, &load.header_filename)?;
        u16::from(load.member_sequence_number.get()).write_be(&mut entry)?;
        encode_strings(&mut entry, &load.target_hardware_ids)?;

        if version == SupportedArinc665Version::Supplement345 {
            TargetHardwareIdPositions::encode_list(&mut entry, &load.target_hardware_id_positions)?;
            encode_check_value(&mut entry, &load.check_value)?;
        }

        let mut entry = entry.into_inner();
        if index + 1 < loads.len() {
            let words = u16::try_from(entry.len() / 2)
                .map_err(|_| Error::invalid("load list entry exceeds pointer range"))?;
            entry[0..2].copy_from_slice(&words.to_be_bytes());
        }

        writer.write_all(&entry)?;
    }

    Ok(())
}

fn decode_load_entries(
    raw: &[u8],
    load_list_pointer: u32,
    version: SupportedArinc665Version,
) -> Result<Vec<LoadListEntry>> {
    let mut cursor = section_cursor(raw, load_list_pointer)?;
    let count = u16::read_be(&mut cursor)?;

    let mut loads = Vec::with_capacity(count as usize);
    let mut entry_offset = cursor.position();

    for index in 0..count {
        cursor.set_position(entry_offset);

        let next_pointer = u16::read_be(&mut cursor)?;
        if index + 1 < count && next_pointer == 0 {
            return Err(Error::invalid("next load pointer is 0"));
        }
        if index + 1 == count && next_pointer != 0 {
            return Err(Error::invalid("next load pointer is not 0"));
        }

        let part_number = decode_string(&mut cursor)?;
        let header_filename = decode_string(&mut cursor)?;

        let member_sequence_number = u16::read_be(&mut cursor)?;
        if !(1..=255).contains(&member_sequence_number) {
            return Err(Error::invalid("member sequence number out of range"));
        }

        let target_hardware_ids = decode_strings(&mut cursor)?;

        let (target_hardware_id_positions, check_value) = match version {
            SupportedArinc665Version::Supplement2 => (Vec::new(), CheckValue::NOT_USED),
            SupportedArinc665Version::Supplement345 => (
                TargetHardwareIdPositions::decode_list(&mut cursor)?,
                decode_check_value(&mut cursor)?,
            ),
        };

        loads.push(LoadListEntry {
            part_number,
            header_filename,
            member_sequence_number: MediumNumber::new(member_sequence_number as u8),
            target_hardware_ids,
            target_hardware_id_positions,
            check_value,
        });

        entry_offset += u64::from(next_pointer) * 2;
    }

    Ok(loads)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_list(version: SupportedArinc665Version) -> LoadListFile {
        LoadListFile {
            version,
            media_information: MediaSetInformation {
                part_number: "MSET0012345".to_string(),
                media_sequence_number: MediumNumber::new(1),
                number_of_media_set_members: MediumNumber::new(1),
            },
            loads: vec![
                LoadListEntry {
                    part_number: "LOAD-PN-1".to_string(),
                    header_filename: "FMS.LUH".to_string(),
                    member_sequence_number: MediumNumber::new(1),
                    target_hardware_ids: vec!["FMS-L".to_string(), "FMS-R".to_string()],
                    target_hardware_id_positions: Vec::new(),
                    check_value: CheckValue::NOT_USED,
                },
                LoadListEntry {
                    part_number: "LOAD-PN-2".to_string(),
                    header_filename: "EEC.LUH".to_string(),
                    member_sequence_number: MediumNumber::new(1),
                    target_hardware_ids: vec!["EEC".to_string()],
                    target_hardware_id_positions: Vec::new(),
                    check_value: CheckValue::NOT_USED,
                },
            ],
            user_defined_data: Vec::new(),
            list_check_value_type: CheckValueType::NotUsed,
        }
    }

    #[test]
    fn test_round_trip_supplement2() {
        let list = sample_list(SupportedArinc665Version::Supplement2);
        let raw = list.encode().unwrap();

        assert_eq!(u16::from_be_bytes([raw[4], raw[5]]), 0x8004);
        let decoded = LoadListFile::decode(&raw).unwrap();
        assert_eq!(decoded, list);
        assert_eq!(decoded.encode().unwrap(), raw);
    }

    #[test]
    fn test_round_trip_supplement345() {
        let mut list = sample_list(SupportedArinc665Version::Supplement345);
        list.loads[0].target_hardware_id_positions = vec![TargetHardwareIdPositions {
            target_hardware_id: "FMS-L".to_string(),
            positions: vec!["L1".to_string(), "L2".to_string()],
        }];
        list.loads[0].check_value = CheckValue::crc32(0xDEADBEEF);
        list.list_check_value_type = CheckValueType::Crc16;
        list.user_defined_data = vec![0xCA, 0xFE];

        let raw = list.encode().unwrap();
        assert_eq!(u16::from_be_bytes([raw[4], raw[5]]), 0x8005);

        let decoded = LoadListFile::decode(&raw).unwrap();
        assert_eq!(decoded, list);
        assert_eq!(decoded.encode().unwrap(), raw);
    }

    #[test]
    fn test_spare_must_be_zero() {
        let list = sample_list(SupportedArinc665Version::Supplement2);
        let mut raw = list.encode().unwrap();
        raw[6] = 0xFF;
        let crc_offset = raw.len() - 2;
        let crc = arinc645::crc16(&raw[..crc_offset]);
        raw[crc_offset..].copy_from_slice(&crc.to_be_bytes());

        assert!(matches!(
            LoadListFile::decode(&raw),
            Err(Error::InvalidFormat(reason)) if reason.contains("spare")
        ));
    }

    #[test]
    fn test_wrong_file_type_rejected() {
        let list = sample_list(SupportedArinc665Version::Supplement2);
        let raw = list.encode().unwrap();

        // A batch file decoder must refuse a list file
        assert!(matches!(
            crate::batch::BatchFile::decode(&raw),
            Err(Error::UnexpectedFileType { .. })
        ));
    }

    #[test]
    fn test_empty_load_list() {
        let mut list = sample_list(SupportedArinc665Version::Supplement2);
        list.loads.clear();

        let raw = list.encode().unwrap();
        let decoded = LoadListFile::decode(&raw).unwrap();
        assert!(decoded.loads.is_empty());
    }

    #[test]
    fn test_belongs_to_same_media_set_checks_user_defined_data() {
        let mut first = sample_list(SupportedArinc665Version::Supplement2);
        first.user_defined_data = vec![0x01, 0x02];

        let mut second = first.clone();
        second.media_information.media_sequence_number = MediumNumber::new(2);
        assert!(first.belongs_to_same_media_set(&second));

        second.user_defined_data = vec![0x01, 0x03];
        assert!(!first.belongs_to_same_media_set(&second));
    }
}
