//! List of Batches (`BATCHES.LUM`) codec.
//!
//! Mirrors the List of Loads, storing per entry the batch part number, the
//! batch filename and the medium carrying it.

use binrw::{BinRead, BinWrite};
use std::io::{Cursor, Seek, Write};
use tracing::debug;

use arinc645::{CheckValueType, check_value_of};

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
const BATCH_LIST_POINTER_OFFSET: usize = POINTER_TABLE_OFFSET + 4;
const USER_DEFINED_DATA_POINTER_OFFSET: usize = POINTER_TABLE_OFFSET + 8;
const LIST_CHECK_VALUE_POINTER_OFFSET: usize = POINTER_TABLE_OFFSET + 12;

const FIXED_HEADER_SIZE_V2: usize = POINTER_TABLE_OFFSET + 3 * size_of::<u32>();
const FIXED_HEADER_SIZE_V345: usize = POINTER_TABLE_OFFSET + 4 * size_of::<u32>();

/// One entry of the batch list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchListEntry {
    pub part_number: String,
    pub filename: String,
    /// Medium the batch file resides on.
    pub member_sequence_number: MediumNumber,
}

/// List of Batches (`BATCHES.LUM`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchListFile {
    pub version: SupportedArinc665Version,
    pub media_information: MediaSetInformation,
    pub batches: Vec<BatchListEntry>,
    pub user_defined_data: Vec<u8>,
    /// Check value type protecting this list file (supplement 3+).
    pub list_check_value_type: CheckValueType,
}

impl BatchListFile {
    pub fn new(version: SupportedArinc665Version) -> Self {
        Self {
            version,
            media_information: MediaSetInformation {
                part_number: String::new(),
                media_sequence_number: MediumNumber::FIRST,
                number_of_media_set_members: MediumNumber::FIRST,
            },
            batches: Vec::new(),
            user_defined_data: Vec::new(),
            list_check_value_type: CheckValueType::NotUsed,
        }
    }

    /// Decodes and validates a raw List of Batches.
    pub fn decode(raw: &[u8]) -> Result<Self> {
        let version = decode_header(raw, FileType::BatchList, DEFAULT_CHECKSUM_POSITION)?;
        check_spare(raw)?;

        let mut pointers = Cursor::new(raw);
        pointers.set_position(MEDIA_INFORMATION_POINTER_OFFSET as u64);
        let media_information_pointer = u32::read_be(&mut pointers)?;
        let batch_list_pointer = u32::read_be(&mut pointers)?;
        let user_defined_data_pointer = u32::read_be(&mut pointers)?;

        let media_information =
            MediaSetInformation::read(&mut section_cursor(raw, media_information_pointer)?)?;

        let batches = decode_batch_entries(raw, batch_list_pointer)?;

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
                            stored: format!("list of batches check value {stored}"),
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
            batches = batches.len(),
            "decoded list of batches"
        );

        Ok(Self {
            version,
            media_information,
            batches,
            user_defined_data,
            list_check_value_type,
        })
    }

    /// Encodes the List of Batches.
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
        encode_batch_entries(&mut writer, &self.batches)?;
        set_pointer(writer.get_mut(), BATCH_LIST_POINTER_OFFSET, offset)?;

        let user_defined_data = even_user_defined_data(&self.user_defined_data);
        if !user_defined_data.is_empty() {
            let offset = writer.get_ref().len();
            writer.write_all(&user_defined_data)?;
            set_pointer(writer.get_mut(), USER_DEFINED_DATA_POINTER_OFFSET, offset)?;
        }

        match self.version {
            SupportedArinc665Version::Supplement2 => {
                let total = writer.get_ref().len() + DEFAULT_CHECKSUM_POSITION;
                write_header(writer.get_mut(), FileType::BatchList, self.version, total)?;
            }
            SupportedArinc665Version::Supplement345 => {
                let list_offset = writer.get_ref().len();
                let total = list_offset
                    + encoded_check_value_size(self.list_check_value_type)
                    + DEFAULT_CHECKSUM_POSITION;

                set_pointer(writer.get_mut(), LIST_CHECK_VALUE_POINTER_OFFSET, list_offset)?;
                write_header(writer.get_mut(), FileType::BatchList, self.version, total)?;

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
    pub fn belongs_to_same_media_set(&self, other: &BatchListFile) -> bool {
        self.media_information.part_number == other.media_information.part_number
            && self.media_information.number_of_media_set_members
                == other.media_information.number_of_media_set_members
            && self.user_defined_data == other.user_defined_data
            && self.batches == other.batches
    }
}

fn encode_batch_entries<W: Write + Seek>(
    writer: &mut W,
    batches: &[BatchListEntry],
) -> Result<()> {
    let count =
        u16::try_from(batches.len()).map_err(|_| Error::invalid("more batches than allowed"))?;
    count.write_be(writer)?;

    for (index, batch) in batches.iter().enumerate() {
        let mut entry = Cursor::new(vec![0u8; size_of::<u16>()]);
        entry.set_position(size_of::<u16>() as u64);

        encode_string(&mut entry, &batch.part_number)?;
        encode_string(&mut entry, &batch.filename)?;
        u16::from(batch.member_sequence_number.get()).write_be(&mut entry)?;

        let mut entry = entry.into_inner();
        if index + 1 < batches.len() {
            let words = u16::try_from(entry.len() / 2)
                .map_err(|_| Error::invalid("batch list entry exceeds pointer range"))?;
            entry[0..2].copy_from_slice(&words.to_be_bytes());
        }

        writer.write_all(&entry)?;
    }

    Ok(())
}

fn decode_batch_entries(raw: &[u8], batch_list_pointer: u32) -> Result<Vec<BatchListEntry>> {
    let mut cursor = section_cursor(raw, batch_list_pointer)?;
    let count = u16::read_be(&mut cursor)?;

    let mut batches = Vec::with_capacity(count as usize);
    let mut entry_offset = cursor.position();

    for index in 0..count {
        cursor.set_position(entry_offset);

        let next_pointer = u16::read_be(&mut cursor)?;
        if index + 1 < count && next_pointer == 0 {
            return Err(Error::invalid("next batch pointer is 0"));
        }
        if index + 1 == count && next_pointer != 0 {
            return Err(Error::invalid("next batch pointer is not 0"));
        }

        let part_number = decode_string(&mut cursor)?;
        let filename = decode_string(&mut cursor)?;

        let member_sequence_number = u16::read_be(&mut cursor)?;
        if !(1..=255).contains(&member_sequence_number) {
            return Err(Error::invalid("member sequence number out of range"));
        }

        batches.push(BatchListEntry {
            part_number,
            filename,
            member_sequence_number: MediumNumber::new(member_sequence_number as u8),
        });

        entry_offset += u64::from(next_pointer) * 2;
    }

    Ok(batches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_list(version: SupportedArinc665Version) -> BatchListFile {
        BatchListFile {
            version,
            media_information: MediaSetInformation {
                part_number: "MSET0012345".to_string(),
                media_sequence_number: MediumNumber::new(1),
                number_of_media_set_members: MediumNumber::new(1),
            },
            batches: vec![
                BatchListEntry {
                    part_number: "ABC48BATCH01".to_string(),
                    filename: "NIGHTLY.LBP".to_string(),
                    member_sequence_number: MediumNumber::new(1),
                },
                BatchListEntry {
                    part_number: "ABC48BATCH02".to_string(),
                    filename: "FULL.LBP".to_string(),
                    member_sequence_number: MediumNumber::new(1),
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

        let decoded = BatchListFile::decode(&raw).unwrap();
        assert_eq!(decoded, list);
        assert_eq!(decoded.encode().unwrap(), raw);
    }

    #[test]
    fn test_round_trip_supplement345() {
        let mut list = sample_list(SupportedArinc665Version::Supplement345);
        list.list_check_value_type = CheckValueType::Sha1;
        list.user_defined_data = vec![1, 2, 3, 4];

        let raw = list.encode().unwrap();
        let decoded = BatchListFile::decode(&raw).unwrap();
        assert_eq!(decoded, list);
        assert_eq!(decoded.encode().unwrap(), raw);
    }

    #[test]
    fn test_single_entry_has_zero_next_pointer() {
        let mut list = sample_list(SupportedArinc665Version::Supplement2);
        list.batches.truncate(1);

        let raw = list.encode().unwrap();
        let decoded = BatchListFile::decode(&raw).unwrap();
        assert_eq!(decoded.batches, list.batches);
    }

    #[test]
    fn test_corrupted_crc_rejected() {
        let list = sample_list(SupportedArinc665Version::Supplement2);
        let mut raw = list.encode().unwrap();
        let index = raw.len() / 2;
        raw[index] ^= 0xFF;

        assert!(matches!(
            BatchListFile::decode(&raw),
            Err(Error::ChecksumMismatch { .. })
        ));
    }
}
