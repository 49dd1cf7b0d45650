//! Wire codec for embedded check values.
//!
//! A check value field is a `u16` total length (covering the length field,
//! the type code and the payload), a `u16` type code and the fixed-size
//! payload. A length of zero denotes "no check value". Payloads with an odd
//! size (CRC-8) are followed by one zero pad byte that is *not* counted in
//! the length field, keeping all sections 16-bit aligned.

use binrw::{BinRead, BinWrite};
use std::io::{Read, Seek, Write};

use arinc645::{CheckValue, CheckValueType};

use crate::{Error, Result};

const CHECK_VALUE_HEADER_SIZE: usize = 2 * size_of::<u16>();

/// Size of an encoded check value field for the given type, pad included.
pub fn encoded_check_value_size(check_value_type: CheckValueType) -> usize {
    if check_value_type == CheckValueType::NotUsed {
        return size_of::<u16>();
    }

    let payload = check_value_type.value_size();
    CHECK_VALUE_HEADER_SIZE + payload + (payload % 2)
}

/// Encodes a check value field.
pub fn encode_check_value<W: Write + Seek>(
    writer: &mut W,
    check_value: &CheckValue,
) -> Result<()> {
    if !check_value.is_used() {
        0u16.write_be(writer)?;
        return Ok(());
    }

    let length = (CHECK_VALUE_HEADER_SIZE + check_value.value().len()) as u16;
    length.write_be(writer)?;
    check_value.check_value_type().code().write_be(writer)?;
    writer.write_all(check_value.value())?;
    if check_value.value().len() % 2 == 1 {
        writer.write_all(&[0])?;
    }

    Ok(())
}

/// Decodes a check value field, validating length against type.
pub fn decode_check_value<R: Read + Seek>(reader: &mut R) -> Result<CheckValue> {
    let length = u16::read_be(reader)? as usize;
    if length == 0 {
        return Ok(CheckValue::NOT_USED);
    }

    if length < CHECK_VALUE_HEADER_SIZE {
        return Err(Error::invalid("check value length field too small"));
    }

    let code = u16::read_be(reader)?;
    let check_value_type = CheckValueType::from_code(code)?;
    if check_value_type == CheckValueType::NotUsed {
        return Err(Error::invalid(
            "check value type is Not Used but length is non-zero",
        ));
    }

    let payload_length = length - CHECK_VALUE_HEADER_SIZE;
    if payload_length != check_value_type.value_size() {
        return Err(Error::invalid(format!(
            "check value length {payload_length} does not match {check_value_type}"
        )));
    }

    let mut payload = vec![0u8; payload_length];
    reader.read_exact(&mut payload)?;

    if payload_length % 2 == 1 {
        let fill = u8::read_be(reader)?;
        if fill != 0 {
            return Err(Error::invalid("check value fill character is not zero"));
        }
    }

    Ok(CheckValue::new(check_value_type, payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use binrw::io::Cursor;
    use pretty_assertions::assert_eq;

    fn encode_all(check_value: &CheckValue) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        encode_check_value(&mut cursor, check_value).unwrap();
        cursor.into_inner()
    }

    fn round_trip(check_value: &CheckValue) -> CheckValue {
        let raw = encode_all(check_value);
        assert_eq!(
            raw.len(),
            encoded_check_value_size(check_value.check_value_type())
        );
        assert_eq!(raw.len() % 2, 0, "field must be 16-bit aligned");

        let mut cursor = Cursor::new(raw.as_slice());
        let decoded = decode_check_value(&mut cursor).unwrap();
        assert_eq!(cursor.position() as usize, raw.len());
        decoded
    }

    #[test]
    fn test_not_used_encodes_to_zero_length() {
        assert_eq!(encode_all(&CheckValue::NOT_USED), [0x00, 0x00]);
        assert_eq!(round_trip(&CheckValue::NOT_USED), CheckValue::NOT_USED);
    }

    #[test]
    fn test_crc16_layout() {
        // length 6, type code 2, payload
        assert_eq!(
            encode_all(&CheckValue::crc16(0xABCD)),
            [0x00, 0x06, 0x00, 0x02, 0xAB, 0xCD]
        );
    }

    #[test]
    fn test_crc8_padded_to_even() {
        let check_value = CheckValue::crc8(0x5A);
        // length field counts 5 bytes, a pad byte follows
        assert_eq!(
            encode_all(&check_value),
            [0x00, 0x05, 0x00, 0x01, 0x5A, 0x00]
        );
        assert_eq!(round_trip(&check_value), check_value);
    }

    #[test]
    fn test_sha256_round_trip() {
        let check_value = arinc645::check_value_of(CheckValueType::Sha256, b"payload");
        assert_eq!(round_trip(&check_value), check_value);
    }

    #[test]
    fn test_wrong_length_rejected() {
        // Claims CRC-32 but carries only two payload bytes
        let raw: &[u8] = &[0x00, 0x06, 0x00, 0x03, 0xAB, 0xCD];
        let mut cursor = Cursor::new(raw);
        assert!(decode_check_value(&mut cursor).is_err());
    }

    #[test]
    fn test_unknown_type_rejected() {
        let raw: &[u8] = &[0x00, 0x06, 0x00, 0x63, 0xAB, 0xCD];
        let mut cursor = Cursor::new(raw);
        assert!(matches!(
            decode_check_value(&mut cursor),
            Err(Error::CheckValue(arinc645::Error::UnknownCheckValueType(
                0x63
            )))
        ));
    }
}
