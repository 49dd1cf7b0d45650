//! File types, supplements and the format-version field.
//!
//! Every ARINC 665 protocol file carries a 16-bit *file format version*
//! whose value encodes the file class and the supplement it was written
//! against. The values are a closed enumeration and must be emitted and
//! accepted bit-exactly.
//!
//! Note that `0x8004` is both the supplement 3 load header version and the
//! supplement 2 media file version, so mapping a raw field back to a
//! supplement always takes the expected file class.

use crate::{Error, Result};

/// Supported ARINC 665 supplements.
///
/// Supplements 3, 4 and 5 share one byte layout and are treated as one
/// version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SupportedArinc665Version {
    /// ARINC 665-2
    Supplement2,
    /// ARINC 665-3 / -4 / -5
    Supplement345,
}

/// Canonical filename of the List of Files.
pub const LIST_OF_FILES_NAME: &str = "FILES.LUM";
/// Canonical filename of the List of Loads.
pub const LIST_OF_LOADS_NAME: &str = "LOADS.LUM";
/// Canonical filename of the List of Batches.
pub const LIST_OF_BATCHES_NAME: &str = "BATCHES.LUM";
/// Filename extension of load upload header files.
pub const LOAD_UPLOAD_HEADER_EXTENSION: &str = "LUH";
/// Filename extension of batch files.
pub const BATCH_FILE_EXTENSION: &str = "LBP";

const LOAD_FILE_VERSION_2: u16 = 0x8003;
const LOAD_FILE_VERSION_345: u16 = 0x8004;
const MEDIA_FILE_VERSION_2: u16 = 0x8004;
const MEDIA_FILE_VERSION_345: u16 = 0x8005;
const BATCH_FILE_VERSION_2: u16 = 0x9004;
const BATCH_FILE_VERSION_345: u16 = 0x9005;

/// The five ARINC 665 protocol file types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    /// List of Files (`FILES.LUM`)
    FileList,
    /// List of Loads (`LOADS.LUM`)
    LoadList,
    /// List of Batches (`BATCHES.LUM`)
    BatchList,
    /// Load Upload Header (`*.LUH`)
    LoadUploadHeader,
    /// Batch File (`*.LBP`)
    BatchFile,
}

impl FileType {
    /// The format-version field value for this file type and supplement.
    pub fn format_version(self, version: SupportedArinc665Version) -> u16 {
        match (self, version) {
            (FileType::LoadUploadHeader, SupportedArinc665Version::Supplement2) => {
                LOAD_FILE_VERSION_2
            }
            (FileType::LoadUploadHeader, SupportedArinc665Version::Supplement345) => {
                LOAD_FILE_VERSION_345
            }
            (
                FileType::FileList | FileType::LoadList | FileType::BatchList,
                SupportedArinc665Version::Supplement2,
            ) => MEDIA_FILE_VERSION_2,
            (
                FileType::FileList | FileType::LoadList | FileType::BatchList,
                SupportedArinc665Version::Supplement345,
            ) => MEDIA_FILE_VERSION_345,
            (FileType::BatchFile, SupportedArinc665Version::Supplement2) => BATCH_FILE_VERSION_2,
            (FileType::BatchFile, SupportedArinc665Version::Supplement345) => {
                BATCH_FILE_VERSION_345
            }
        }
    }

    /// Maps a raw format-version field to the supplement, for a file that is
    /// expected to be of this type.
    pub fn version_for(self, format_version: u16) -> Result<SupportedArinc665Version> {
        if format_version == self.format_version(SupportedArinc665Version::Supplement2) {
            return Ok(SupportedArinc665Version::Supplement2);
        }
        if format_version == self.format_version(SupportedArinc665Version::Supplement345) {
            return Ok(SupportedArinc665Version::Supplement345);
        }

        // A known code of another class means the wrong kind of file was
        // handed in; everything else is an unsupported supplement.
        let known = [
            LOAD_FILE_VERSION_2,
            LOAD_FILE_VERSION_345,
            MEDIA_FILE_VERSION_2,
            MEDIA_FILE_VERSION_345,
            BATCH_FILE_VERSION_2,
            BATCH_FILE_VERSION_345,
        ];
        if known.contains(&format_version) {
            Err(Error::UnexpectedFileType {
                expected: self.name(),
                format_version,
            })
        } else {
            Err(Error::UnsupportedVersion { format_version })
        }
    }

    /// Classifies a filename into a protocol file type.
    ///
    /// The list filenames and extensions are matched exactly as the standard
    /// spells them.
    pub fn from_filename(filename: &str) -> Option<FileType> {
        match filename {
            LIST_OF_FILES_NAME => return Some(FileType::FileList),
            LIST_OF_LOADS_NAME => return Some(FileType::LoadList),
            LIST_OF_BATCHES_NAME => return Some(FileType::BatchList),
            _ => {}
        }

        match filename.rsplit_once('.').map(|(_, extension)| extension) {
            Some(LOAD_UPLOAD_HEADER_EXTENSION) => Some(FileType::LoadUploadHeader),
            Some(BATCH_FILE_EXTENSION) => Some(FileType::BatchFile),
            _ => None,
        }
    }

    /// Human-readable type name, used in error messages.
    pub fn name(self) -> &'static str {
        match self {
            FileType::FileList => "List of Files",
            FileType::LoadList => "List of Loads",
            FileType::BatchList => "List of Batches",
            FileType::LoadUploadHeader => "Load Upload Header",
            FileType::BatchFile => "Batch File",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_version_values() {
        assert_eq!(
            FileType::LoadUploadHeader.format_version(SupportedArinc665Version::Supplement2),
            0x8003
        );
        assert_eq!(
            FileType::LoadUploadHeader.format_version(SupportedArinc665Version::Supplement345),
            0x8004
        );
        assert_eq!(
            FileType::FileList.format_version(SupportedArinc665Version::Supplement2),
            0x8004
        );
        assert_eq!(
            FileType::LoadList.format_version(SupportedArinc665Version::Supplement345),
            0x8005
        );
        assert_eq!(
            FileType::BatchFile.format_version(SupportedArinc665Version::Supplement2),
            0x9004
        );
        assert_eq!(
            FileType::BatchFile.format_version(SupportedArinc665Version::Supplement345),
            0x9005
        );
    }

    #[test]
    fn test_version_for_resolves_shared_code_by_class() {
        // 0x8004 is a load header in supplement 3+ but a media file in
        // supplement 2 - the expected class decides.
        assert_eq!(
            FileType::LoadUploadHeader.version_for(0x8004).unwrap(),
            SupportedArinc665Version::Supplement345
        );
        assert_eq!(
            FileType::FileList.version_for(0x8004).unwrap(),
            SupportedArinc665Version::Supplement2
        );
    }

    #[test]
    fn test_version_for_rejects_foreign_class() {
        assert!(matches!(
            FileType::FileList.version_for(0x9004),
            Err(Error::UnexpectedFileType {
                format_version: 0x9004,
                ..
            })
        ));
    }

    #[test]
    fn test_version_for_rejects_unknown_code() {
        assert!(matches!(
            FileType::LoadList.version_for(0x1234),
            Err(Error::UnsupportedVersion {
                format_version: 0x1234
            })
        ));
    }

    #[test]
    fn test_filename_classification() {
        assert_eq!(
            FileType::from_filename("FILES.LUM"),
            Some(FileType::FileList)
        );
        assert_eq!(
            FileType::from_filename("LOADS.LUM"),
            Some(FileType::LoadList)
        );
        assert_eq!(
            FileType::from_filename("BATCHES.LUM"),
            Some(FileType::BatchList)
        );
        assert_eq!(
            FileType::from_filename("ACM47.LUH"),
            Some(FileType::LoadUploadHeader)
        );
        assert_eq!(
            FileType::from_filename("NIGHTLY.LBP"),
            Some(FileType::BatchFile)
        );
        assert_eq!(FileType::from_filename("APP.BIN"), None);
        assert_eq!(FileType::from_filename("lowercase.luh"), None);
    }
}
