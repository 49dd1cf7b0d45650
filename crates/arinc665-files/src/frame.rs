//! Common protocol-file framing.
//!
//! Every protocol file starts with a `u32` file length and the `u16` format
//! version, and carries a 16-bit ARINC 645 CRC at a fixed position from its
//! end: the last two bytes for most files, six bytes before the end for
//! load headers (which append the 32-bit load CRC).
//!
//! The length field counts 16-bit words in supplement 2 files and bytes in
//! supplement 3/4/5 files. The file CRC is computed over the file content
//! *up to* the checksum position; the trailing CRC fields are excluded from
//! the computation, not zeroed.

use std::io::Cursor;
use tracing::trace;

use crate::version::{FileType, SupportedArinc665Version};
use crate::{Error, Result};

/// Size of the common header: file length field plus format version field.
pub(crate) const BASE_HEADER_SIZE: usize = size_of::<u32>() + size_of::<u16>();

/// Offset of the spare / part-flags word following the common header.
pub(crate) const SPARE_FIELD_OFFSET: usize = BASE_HEADER_SIZE;

/// First byte after the spare word; pointer tables start here.
pub(crate) const POINTER_TABLE_OFFSET: usize = SPARE_FIELD_OFFSET + size_of::<u16>();

/// Checksum position of all files except load headers.
pub(crate) const DEFAULT_CHECKSUM_POSITION: usize = size_of::<u16>();

/// Checksum position of load headers (file CRC, then 32-bit load CRC).
pub(crate) const LOAD_HEADER_CHECKSUM_POSITION: usize = size_of::<u16>() + size_of::<u32>();

pub(crate) fn read_u16_at(raw: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([raw[offset], raw[offset + 1]])
}

pub(crate) fn read_u32_at(raw: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        raw[offset],
        raw[offset + 1],
        raw[offset + 2],
        raw[offset + 3],
    ])
}

/// Decodes the file length field of a raw protocol file.
pub fn file_length(raw: &[u8]) -> Result<u32> {
    if raw.len() < BASE_HEADER_SIZE {
        return Err(Error::invalid("file too small for ARINC 665 header"));
    }
    Ok(read_u32_at(raw, 0))
}

/// Decodes the format version field of a raw protocol file.
pub fn format_version_field(raw: &[u8]) -> Result<u16> {
    if raw.len() < BASE_HEADER_SIZE {
        return Err(Error::invalid("file too small for ARINC 665 header"));
    }
    Ok(read_u16_at(raw, 4))
}

/// Validates header, length field and file CRC of a raw file and returns
/// the supplement it was written against.
pub(crate) fn decode_header(
    raw: &[u8],
    file_type: FileType,
    checksum_position: usize,
) -> Result<SupportedArinc665Version> {
    if raw.len() < POINTER_TABLE_OFFSET + checksum_position {
        return Err(Error::invalid(format!(
            "{} bytes are too small for a {} file",
            raw.len(),
            file_type.name()
        )));
    }

    let version = file_type.version_for(format_version_field(raw)?)?;

    let length_field = file_length(raw)? as usize;
    let encoded_length = match version {
        SupportedArinc665Version::Supplement2 => length_field * 2,
        SupportedArinc665Version::Supplement345 => length_field,
    };
    if encoded_length != raw.len() {
        return Err(Error::invalid(format!(
            "file length field {encoded_length} does not match file size {}",
            raw.len()
        )));
    }

    let crc_offset = raw.len() - checksum_position;
    let stored = read_u16_at(raw, crc_offset);
    let computed = arinc645::crc16(&raw[..crc_offset]);
    if stored != computed {
        return Err(Error::ChecksumMismatch { stored, computed });
    }

    trace!(
        file_type = file_type.name(),
        ?version,
        length = raw.len(),
        "decoded file header"
    );

    Ok(version)
}

/// Backfills the length and format-version fields of an encoded file.
///
/// `total` is the final file size in bytes, including everything not yet
/// appended to the buffer (check value sections and trailing CRCs).
pub(crate) fn write_header(
    raw: &mut [u8],
    file_type: FileType,
    version: SupportedArinc665Version,
    total: usize,
) -> Result<()> {
    let length_field = match version {
        SupportedArinc665Version::Supplement2 => {
            debug_assert_eq!(total % 2, 0);
            total / 2
        }
        SupportedArinc665Version::Supplement345 => total,
    };
    let length_field =
        u32::try_from(length_field).map_err(|_| Error::invalid("file exceeds 4 GiB"))?;

    raw[0..4].copy_from_slice(&length_field.to_be_bytes());
    raw[4..6].copy_from_slice(&file_type.format_version(version).to_be_bytes());

    Ok(())
}

/// Appends the 16-bit file CRC over the current buffer content.
pub(crate) fn append_file_crc(raw: &mut Vec<u8>) {
    let crc = arinc645::crc16(raw);
    raw.extend_from_slice(&crc.to_be_bytes());
}

/// Writes a section pointer (an offset in 16-bit words from file start).
pub(crate) fn set_pointer(raw: &mut [u8], pointer_offset: usize, byte_offset: usize) -> Result<()> {
    debug_assert_eq!(byte_offset % 2, 0);
    let words = u32::try_from(byte_offset / 2)
        .map_err(|_| Error::invalid("section pointer exceeds field"))?;
    raw[pointer_offset..pointer_offset + 4].copy_from_slice(&words.to_be_bytes());
    Ok(())
}

/// Positions a cursor at a section given its word pointer.
pub(crate) fn section_cursor<'a>(raw: &'a [u8], word_pointer: u32) -> Result<Cursor<&'a [u8]>> {
    let byte_offset = word_pointer as usize * 2;
    if byte_offset >= raw.len() {
        return Err(Error::invalid("section pointer exceeds file"));
    }

    let mut cursor = Cursor::new(raw);
    cursor.set_position(byte_offset as u64);
    Ok(cursor)
}

/// Validates the spare word at [`SPARE_FIELD_OFFSET`].
pub(crate) fn check_spare(raw: &[u8]) -> Result<()> {
    if read_u16_at(raw, SPARE_FIELD_OFFSET) != 0 {
        return Err(Error::invalid("spare field is not zero"));
    }
    Ok(())
}

/// Returns user-defined data ready for encoding: odd-length input gets one
/// zero byte appended, with a warning.
pub(crate) fn even_user_defined_data(data: &[u8]) -> std::borrow::Cow<'_, [u8]> {
    if data.len() % 2 == 0 {
        return std::borrow::Cow::Borrowed(data);
    }

    tracing::warn!(
        length = data.len(),
        "user defined data must be 2-byte aligned - extending range"
    );
    let mut padded = data.to_vec();
    padded.push(0);
    std::borrow::Cow::Owned(padded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_length_and_version_fields() {
        let raw = [0x00, 0x00, 0x00, 0x35, 0x80, 0x03, 0x00, 0x00];
        assert_eq!(file_length(&raw).unwrap(), 0x35);
        assert_eq!(format_version_field(&raw).unwrap(), 0x8003);
        assert!(file_length(&raw[..4]).is_err());
    }

    #[test]
    fn test_decode_header_rejects_truncated_input() {
        assert!(matches!(
            decode_header(&[0x00, 0x00], FileType::FileList, DEFAULT_CHECKSUM_POSITION),
            Err(Error::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_header_round_trip() {
        // Minimal file: header + spare + CRC, supplement 3+ byte counting
        let mut raw = vec![0u8; POINTER_TABLE_OFFSET];
        let total = raw.len() + DEFAULT_CHECKSUM_POSITION;
        write_header(
            &mut raw,
            FileType::FileList,
            SupportedArinc665Version::Supplement345,
            total,
        )
        .unwrap();
        append_file_crc(&mut raw);

        assert_eq!(
            decode_header(&raw, FileType::FileList, DEFAULT_CHECKSUM_POSITION).unwrap(),
            SupportedArinc665Version::Supplement345
        );
    }

    #[test]
    fn test_corrupted_crc_detected() {
        let mut raw = vec![0u8; POINTER_TABLE_OFFSET];
        let total = raw.len() + DEFAULT_CHECKSUM_POSITION;
        write_header(
            &mut raw,
            FileType::FileList,
            SupportedArinc665Version::Supplement345,
            total,
        )
        .unwrap();
        append_file_crc(&mut raw);

        let last = raw.len() - 1;
        raw[last] ^= 0xFF;
        assert!(matches!(
            decode_header(&raw, FileType::FileList, DEFAULT_CHECKSUM_POSITION),
            Err(Error::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_length_field_mismatch_detected() {
        let mut raw = vec![0u8; POINTER_TABLE_OFFSET];
        let total = raw.len() + DEFAULT_CHECKSUM_POSITION;
        write_header(
            &mut raw,
            FileType::FileList,
            SupportedArinc665Version::Supplement345,
            total,
        )
        .unwrap();
        append_file_crc(&mut raw);
        raw.push(0);
        raw.push(0);

        assert!(matches!(
            decode_header(&raw, FileType::FileList, DEFAULT_CHECKSUM_POSITION),
            Err(Error::InvalidFormat(_))
        ));
    }
}
