//! Handler types through which the compiler and decompiler perform I/O.
//!
//! All paths handed to handlers are slash-separated and relative to the
//! medium root; the empty path denotes the medium root itself. Handler
//! failures surface as [`crate::Error::Backend`]; a failing progress
//! handler cancels the running operation ([`crate::Error::Cancelled`]).

use std::path::Path;

use arinc665_files::MediumNumber;

/// Error type handlers report failures with.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Result alias for handler implementations.
pub type HandlerResult<T> = std::result::Result<T, HandlerError>;

/// Reads a file from a medium.
pub type ReadFileHandler<'a> = Box<dyn FnMut(MediumNumber, &str) -> HandlerResult<Vec<u8>> + 'a>;

/// Returns the size of a file on a medium.
pub type FileSizeHandler<'a> = Box<dyn FnMut(MediumNumber, &str) -> HandlerResult<u64> + 'a>;

/// Writes a file to a medium.
pub type WriteFileHandler<'a> =
    Box<dyn FnMut(MediumNumber, &str, &[u8]) -> HandlerResult<()> + 'a>;

/// Creates a directory on a medium. Called with the empty path to create
/// the medium root itself.
pub type CreateDirectoryHandler<'a> = Box<dyn FnMut(MediumNumber, &str) -> HandlerResult<()> + 'a>;

/// Copies an external source file onto a medium.
pub type CopyFileHandler<'a> =
    Box<dyn FnMut(&Path, MediumNumber, &str) -> HandlerResult<()> + 'a>;

/// Probes whether the media set output root already exists.
pub type OutputExistsHandler<'a> = Box<dyn FnMut(&str) -> HandlerResult<bool> + 'a>;

/// Progress notification. An `Err` return cancels the operation.
pub type ProgressHandler<'a> = Box<dyn FnMut(&ProgressInfo<'_>) -> HandlerResult<()> + 'a>;

/// One progress step of a compiler or decompiler run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressInfo<'a> {
    /// Position within a multi-set operation; 1 for bare runs.
    pub current_media_set: usize,
    /// Total number of media sets; 1 for bare runs.
    pub total_media_sets: usize,
    /// Part number of the media set being processed.
    pub part_number: &'a str,
    /// The medium just finished.
    pub current_medium: MediumNumber,
    /// Total number of media of this set.
    pub total_media: MediumNumber,
}
