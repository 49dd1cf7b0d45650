//! Medium directory probe.

use std::fs;
use std::path::Path;
use tracing::trace;

use arinc665_files::{FileListFile, LIST_OF_FILES_NAME, MediaSetInformation};

/// Classifies a directory as an ARINC 665 medium.
///
/// Reads and decodes the directory's `FILES.LUM`; on success the media set
/// part number, the medium's sequence number and the total number of media
/// are returned. `None` means the directory is no valid ARINC 665 medium.
pub fn medium_information(directory: &Path) -> Option<MediaSetInformation> {
    let raw = fs::read(directory.join(LIST_OF_FILES_NAME)).ok()?;

    match FileListFile::decode(&raw) {
        Ok(file_list) => Some(file_list.media_information),
        Err(error) => {
            trace!(
                directory = %directory.display(),
                %error,
                "directory holds no valid list of files"
            );
            None
        }
    }
}
