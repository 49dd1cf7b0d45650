//! # ARINC 665 Media Set Model
//!
//! In-memory representation of an ARINC 665 media set: the ordered media,
//! the directory tree, regular files, loads and batches, together with the
//! cascading "effective value" attributes (medium number, check value
//! types) and the external file-path and check-value mappings exchanged
//! with the compiler and decompiler.
//!
//! The model is an arena owned by [`MediaSet`]: directories and files are
//! addressed through [`DirectoryId`] and [`FileId`] handles carrying the
//! identity of their media set, so a handle from one set can never mutate
//! another ([`Error::CrossMediaSetReference`]). Loads and batches reference
//! the files they bundle through handles, never through pointers, which
//! sidesteps the reference cycles of an owning tree.
//!
//! ## Quick Start
//!
//! ```
//! use arinc665_media::{ContainerId, MediaSet};
//!
//! # fn main() -> arinc665_media::Result<()> {
//! let mut media_set = MediaSet::new("MSET0012345");
//!
//! let software = media_set.create_directory(ContainerId::Root, "SW")?;
//! let app = media_set.create_regular_file(ContainerId::Directory(software), "APP.BIN")?;
//! let load = media_set.create_load(ContainerId::Root, "APP.LUH")?;
//! media_set.add_load_data_file(load, app, "LOAD-PN-1", None)?;
//!
//! assert_eq!(media_set.path_of_file(app)?, "SW/APP.BIN");
//! assert_eq!(media_set.recursive_loads().len(), 1);
//! # Ok(())
//! # }
//! ```

mod error;
mod media_set;
mod types;

pub use error::Error;
pub use media_set::MediaSet;
pub use types::{
    Batch, BatchTarget, CheckValues, ContainerId, DirectoryId, FileId, FileKind,
    FilePathMapping, Load, LoadFileReference,
};

/// Result alias for media model operations.
pub type Result<T> = std::result::Result<T, Error>;
