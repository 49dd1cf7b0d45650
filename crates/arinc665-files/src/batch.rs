//! Batch file (`*.LBP`) codec.
//!
//! A batch file assigns loads to target hardware: for each target hardware
//! identifier it lists the loads (header filename and part number) to be
//! uploaded. The layout is identical in both supported supplements apart
//! from the format-version code.

use binrw::{BinRead, BinWrite};
use std::io::{Cursor, Seek, Write};
use tracing::debug;

use crate::frame::{
    DEFAULT_CHECKSUM_POSITION, POINTER_TABLE_OFFSET, append_file_crc, check_spare, decode_header,
    section_cursor, set_pointer, write_header,
};
use crate::strings::{decode_string, encode_string};
use crate::version::{FileType, SupportedArinc665Version};
use crate::{Error, Result};

const PART_NUMBER_POINTER_OFFSET: usize = POINTER_TABLE_OFFSET;
const COMMENT_POINTER_OFFSET: usize = POINTER_TABLE_OFFSET + 4;
const TARGET_HARDWARE_POINTER_OFFSET: usize = POINTER_TABLE_OFFSET + 8;

const FIXED_HEADER_SIZE: usize = POINTER_TABLE_OFFSET + 3 * size_of::<u32>();

/// One load assignment within a batch target group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchLoad {
    pub header_filename: String,
    pub part_number: String,
}

/// The loads assigned to one target hardware identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchTargetHardware {
    pub target_hardware_id: String,
    pub loads: Vec<BatchLoad>,
}

/// Batch file (`*.LBP`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFile {
    pub version: SupportedArinc665Version,
    pub part_number: String,
    pub comment: String,
    pub target_hardware_loads: Vec<BatchTargetHardware>,
}

impl BatchFile {
    pub fn new(version: SupportedArinc665Version) -> Self {
        Self {
            version,
            part_number: String::new(),
            comment: String::new(),
            target_hardware_loads: Vec::new(),
        }
    }

    /// Decodes and validates a raw batch file.
    pub fn decode(raw: &[u8]) -> Result<Self> {
        let version = decode_header(raw, FileType::BatchFile, DEFAULT_CHECKSUM_POSITION)?;
        check_spare(raw)?;

        let mut pointers = Cursor::new(raw);
        pointers.set_position(PART_NUMBER_POINTER_OFFSET as u64);
        let part_number_pointer = u32::read_be(&mut pointers)?;
        let comment_pointer = u32::read_be(&mut pointers)?;
        let target_hardware_pointer = u32::read_be(&mut pointers)?;

        let part_number = decode_string(&mut section_cursor(raw, part_number_pointer)?)?;

        let comment = if comment_pointer == 0 {
            String::new()
        } else {
            decode_string(&mut section_cursor(raw, comment_pointer)?)?
        };

        let target_hardware_loads =
            decode_target_hardware_loads(&mut section_cursor(raw, target_hardware_pointer)?)?;

        debug!(
            part_number,
            targets = target_hardware_loads.len(),
            "decoded batch file"
        );

        Ok(Self {
            version,
            part_number,
            comment,
            target_hardware_loads,
        })
    }

    /// Encodes the batch file.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut writer = Cursor::new(vec![0u8; FIXED_HEADER_SIZE]);
        writer.set_position(FIXED_HEADER_SIZE as u64);

        let offset = writer.get_ref().len();
        encode_string(&mut writer, &self.part_number)?;
        set_pointer(writer.get_mut(), PART_NUMBER_POINTER_OFFSET, offset)?;

        if !self.comment.is_empty() {
            let offset = writer.get_ref().len();
            encode_string(&mut writer, &self.comment)?;
            set_pointer(writer.get_mut(), COMMENT_POINTER_OFFSET, offset)?;
        }

        let offset = writer.get_ref().len();
        encode_target_hardware_loads(&mut writer, &self.target_hardware_loads)?;
        set_pointer(writer.get_mut(), TARGET_HARDWARE_POINTER_OFFSET, offset)?;

        let total = writer.get_ref().len() + DEFAULT_CHECKSUM_POSITION;
        write_header(writer.get_mut(), FileType::BatchFile, self.version, total)?;

        let mut raw = writer.into_inner();
        append_file_crc(&mut raw);
        Ok(raw)
    }
}

fn encode_target_hardware_loads<W: Write + Seek>(
    writer: &mut W,
    targets: &[BatchTargetHardware],
) -> Result<()> {
    let count = u16::try_from(targets.len())
        .map_err(|_| Error::invalid("more target hardware groups than allowed"))?;
    count.write_be(writer)?;

    for target in targets {
        encode_string(writer, &target.target_hardware_id)?;

        let loads = u16::try_from(target.loads.len())
            .map_err(|_| Error::invalid("more batch loads than allowed"))?;
        loads.write_be(writer)?;

        for load in &target.loads {
            encode_string(writer, &load.header_filename)?;
            encode_string(writer, &load.part_number)?;
        }
    }

    Ok(())
}

fn decode_target_hardware_loads(
    cursor: &mut Cursor<&[u8]>,
) -> Result<Vec<BatchTargetHardware>> {
    let count = u16::read_be(cursor)?;

    let mut targets = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let target_hardware_id = decode_string(cursor)?;

        let load_count = u16::read_be(cursor)?;
        let mut loads = Vec::with_capacity(load_count as usize);
        for _ in 0..load_count {
            let header_filename = decode_string(cursor)?;
            let part_number = decode_string(cursor)?;
            loads.push(BatchLoad {
                header_filename,
                part_number,
            });
        }

        targets.push(BatchTargetHardware {
            target_hardware_id,
            loads,
        });
    }

    Ok(targets)
}
