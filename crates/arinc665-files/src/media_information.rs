//! Media set information block shared by the three list files.

use binrw::{BinRead, BinResult, BinWrite};
use std::io::{Read, Seek, Write};

use crate::medium_number::MediumNumber;
use crate::strings::{decode_string, encode_string};

/// The media information block of a list file: media set part number,
/// position of this medium and total number of media.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSetInformation {
    /// Part number of the whole media set.
    pub part_number: String,
    /// Position of the carrying medium within the set.
    pub media_sequence_number: MediumNumber,
    /// Total number of media in the set.
    pub number_of_media_set_members: MediumNumber,
}

impl BinRead for MediaSetInformation {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        _endian: binrw::Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<Self> {
        let position = reader.stream_position().unwrap_or(0);
        let part_number = decode_string(reader).map_err(|error| binrw::Error::Custom {
            pos: position,
            err: Box::new(error),
        })?;

        let media_sequence_number = u8::read_be(reader)?;
        if media_sequence_number == 0 {
            return Err(invalid_field(reader, "media sequence number is zero"));
        }

        let number_of_media_set_members = u8::read_be(reader)?;
        if number_of_media_set_members == 0 {
            return Err(invalid_field(reader, "number of media set members is zero"));
        }

        Ok(Self {
            part_number,
            media_sequence_number: MediumNumber::new(media_sequence_number),
            number_of_media_set_members: MediumNumber::new(number_of_media_set_members),
        })
    }
}

impl BinWrite for MediaSetInformation {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        _endian: binrw::Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<()> {
        let position = writer.stream_position().unwrap_or(0);
        encode_string(writer, &self.part_number).map_err(|error| binrw::Error::Custom {
            pos: position,
            err: Box::new(error),
        })?;
        self.media_sequence_number.get().write_be(writer)?;
        self.number_of_media_set_members.get().write_be(writer)?;
        Ok(())
    }
}

impl binrw::meta::ReadEndian for MediaSetInformation {
    const ENDIAN: binrw::meta::EndianKind = binrw::meta::EndianKind::Endian(binrw::Endian::Big);
}

impl binrw::meta::WriteEndian for MediaSetInformation {
    const ENDIAN: binrw::meta::EndianKind = binrw::meta::EndianKind::Endian(binrw::Endian::Big);
}

fn invalid_field<S: Seek>(stream: &mut S, message: &str) -> binrw::Error {
    binrw::Error::Custom {
        pos: stream.stream_position().unwrap_or(0),
        err: Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            message.to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use binrw::io::Cursor;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_round_trip() {
        let information = MediaSetInformation {
            part_number: "MSET0012345".to_string(),
            media_sequence_number: MediumNumber::new(2),
            number_of_media_set_members: MediumNumber::new(3),
        };

        let mut cursor = Cursor::new(Vec::new());
        information.write(&mut cursor).unwrap();
        let raw = cursor.into_inner();
        // 2 + 11 + pad + 2 medium bytes
        assert_eq!(raw.len(), 2 + 11 + 1 + 2);

        let mut cursor = Cursor::new(raw.as_slice());
        assert_eq!(
            MediaSetInformation::read(&mut cursor).unwrap(),
            information
        );
    }

    #[test]
    fn test_zero_sequence_number_rejected() {
        let raw = [0x00, 0x02, b'P', b'N', 0x00, 0x01];
        let mut cursor = Cursor::new(raw.as_slice());
        assert!(MediaSetInformation::read(&mut cursor).is_err());
    }
}
