use thiserror::Error;

use arinc665_files::MediumNumber;

#[derive(Error, Debug)]
pub enum Error {
    #[error("An entry named {path:?} already exists")]
    NameConflict { path: String },

    #[error("Name must not be empty")]
    EmptyName,

    #[error("Referenced entity belongs to another media set")]
    CrossMediaSetReference,

    #[error("Unknown {entity} handle (entity was removed or handle is stale)")]
    UnknownEntity { entity: &'static str },

    #[error("{path:?} is not a {expected}")]
    WrongFileKind {
        path: String,
        expected: &'static str,
    },

    #[error("Moving {path:?} into its own subtree")]
    RecursiveMove { path: String },

    #[error(
        "File {file:?} resides on medium {medium_number} but the media set has {media_count} media"
    )]
    MediumOutOfRange {
        file: String,
        medium_number: MediumNumber,
        media_count: MediumNumber,
    },

    #[error(transparent)]
    InvalidPartNumber(#[from] arinc665_files::Error),
}
