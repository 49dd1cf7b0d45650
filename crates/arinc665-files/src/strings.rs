//! Length-prefixed string codec.
//!
//! Strings are stored as a 16-bit byte length followed by the character
//! data; odd-length strings are padded with a single zero byte so every
//! field ends on a 16-bit boundary. String lists prepend a 16-bit element
//! count.

use binrw::{BinRead, BinWrite};
use std::io::{Read, Seek, Write};

use crate::{Error, Result};

/// Encodes one string: `u16` length, bytes, zero pad byte when odd.
pub fn encode_string<W: Write + Seek>(writer: &mut W, value: &str) -> Result<()> {
    let length =
        u16::try_from(value.len()).map_err(|_| Error::invalid("string exceeds 65535 bytes"))?;

    length.write_be(writer)?;
    writer.write_all(value.as_bytes())?;
    if value.len() % 2 == 1 {
        writer.write_all(&[0])?;
    }

    Ok(())
}

/// Decodes one string, verifying the pad byte of odd-length strings.
pub fn decode_string<R: Read + Seek>(reader: &mut R) -> Result<String> {
    let length = u16::read_be(reader)? as usize;

    let mut bytes = vec![0u8; length];
    reader.read_exact(&mut bytes)?;

    if length % 2 == 1 {
        let fill = u8::read_be(reader)?;
        if fill != 0 {
            return Err(Error::invalid("string fill character is not zero"));
        }
    }

    String::from_utf8(bytes).map_err(|_| Error::invalid("string is not valid UTF-8"))
}

/// Encodes a string list: `u16` count, then each string.
pub fn encode_strings<W: Write + Seek>(writer: &mut W, values: &[String]) -> Result<()> {
    let count = u16::try_from(values.len())
        .map_err(|_| Error::invalid("string list exceeds 65535 entries"))?;

    count.write_be(writer)?;
    for value in values {
        encode_string(writer, value)?;
    }

    Ok(())
}

/// Decodes a string list.
pub fn decode_strings<R: Read + Seek>(reader: &mut R) -> Result<Vec<String>> {
    let count = u16::read_be(reader)?;

    let mut values = Vec::with_capacity(count as usize);
    for _ in 0..count {
        values.push(decode_string(reader)?);
    }

    Ok(values)
}
