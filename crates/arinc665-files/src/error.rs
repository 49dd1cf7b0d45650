use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Binary format error: {0}")]
    BinRw(#[from] binrw::Error),

    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    #[error("Format version field {format_version:#06x} maps to no supported ARINC 665 version")]
    UnsupportedVersion { format_version: u16 },

    #[error("Format version field {format_version:#06x} does not denote a {expected} file")]
    UnexpectedFileType {
        expected: &'static str,
        format_version: u16,
    },

    #[error("File CRC mismatch: stored {stored:#06x}, computed {computed:#06x}")]
    ChecksumMismatch { stored: u16, computed: u16 },

    #[error("Check value mismatch: stored {stored}, computed {computed}")]
    CheckValueMismatch { stored: String, computed: String },

    #[error("Invalid part number {part_number:?}: {reason}")]
    InvalidPartNumber {
        part_number: String,
        reason: &'static str,
    },

    #[error(transparent)]
    CheckValue(#[from] arinc645::Error),
}

impl Error {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Error::InvalidFormat(reason.into())
    }
}
