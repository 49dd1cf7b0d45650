use thiserror::Error;

use arinc645::CheckValueType;
use arinc665_files::MediumNumber;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Files(#[from] arinc665_files::Error),

    #[error(transparent)]
    Media(#[from] arinc665_media::Error),

    #[error("Backend error while {context}: {source}")]
    Backend {
        context: String,
        #[source]
        source: crate::HandlerError,
    },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Medium {medium} is inconsistent with the media set: {field}")]
    MediaSetInconsistent { medium: MediumNumber, field: String },

    #[error("{from} references {to}, which does not exist")]
    DanglingReference { from: String, to: String },

    #[error("File CRC mismatch for {file:?}: stored {stored:#06x}, computed {computed:#06x}")]
    ChecksumMismatch {
        file: String,
        stored: u16,
        computed: u16,
    },

    #[error("Load CRC mismatch for {load:?}: stored {stored:#010x}, computed {computed:#010x}")]
    LoadCrcMismatch {
        load: String,
        stored: u32,
        computed: u32,
    },

    #[error("{check_value_type} check value mismatch for {file:?}")]
    CheckValueMismatch {
        file: String,
        check_value_type: CheckValueType,
    },

    #[error("File length mismatch for {file:?}: stored {stored}, actual {actual}")]
    FileLengthMismatch {
        file: String,
        stored: u64,
        actual: u64,
    },

    #[error("Integrity check failed for {file:?}: {cause}")]
    IntegrityFailure { file: String, cause: Box<Error> },

    #[error("Output directory {path:?} already exists")]
    OutputExists { path: String },
}

impl Error {
    pub(crate) fn backend(context: impl Into<String>, source: crate::HandlerError) -> Self {
        Error::Backend {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn integrity(file: impl Into<String>, cause: Error) -> Self {
        Error::IntegrityFailure {
            file: file.into(),
            cause: Box::new(cause),
        }
    }
}
