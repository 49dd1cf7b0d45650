//! # ARINC 665 Media Set Compiler and Decompiler
//!
//! The two pipelines tying the protocol-file codec and the media set model
//! together:
//!
//! - [`MediaSetDecompiler`] reads the media of an existing media set,
//!   validates cross-file and cross-media consistency and produces the
//!   in-memory [`arinc665_media::MediaSet`] plus the check values found on
//!   the way. An optional integrity pass re-reads every file and verifies
//!   file CRCs, check values and load CRCs.
//! - [`MediaSetCompiler`] walks a media set model, copies payload files
//!   from a source mapping, generates load headers and batch files
//!   according to the configured [`FileCreationPolicy`] and writes the
//!   three list files per medium, computing every CRC and check value from
//!   the bytes actually written.
//!
//! Both pipelines are single-threaded and perform all I/O through injected
//! handlers (closures), so they are independent of the storage backend.
//! [`medium_information`] is a small filesystem probe classifying a
//! directory as an ARINC 665 medium.

mod compiler;
mod decompiler;
mod error;
mod handlers;
mod probe;

pub use compiler::{FileCreationPolicy, MediaPaths, MediaSetCompiler, MediaSetPaths};
pub use decompiler::MediaSetDecompiler;
pub use error::Error;
pub use handlers::{
    CopyFileHandler, CreateDirectoryHandler, FileSizeHandler, HandlerError, HandlerResult,
    OutputExistsHandler, ProgressHandler, ProgressInfo, ReadFileHandler, WriteFileHandler,
};
pub use probe::medium_information;

/// Result alias for compiler and decompiler operations.
pub type Result<T> = std::result::Result<T, Error>;
