//! # ARINC 665 Protocol File Codec
//!
//! Binary encoding and decoding of the five ARINC 665 protocol file kinds
//! used on loadable-software media sets:
//!
//! - **List of Files** (`FILES.LUM`) — per-medium inventory of every file on
//!   the media set
//! - **List of Loads** (`LOADS.LUM`) — inventory of the loads and their
//!   target hardware
//! - **List of Batches** (`BATCHES.LUM`) — inventory of the batch files
//! - **Load Upload Header** (`*.LUH`) — one load: part number, target
//!   hardware, data and support files, load CRC
//! - **Batch** (`*.LBP`) — target hardware to load assignments
//!
//! Both ARINC 665-2 and ARINC 665-3/-4/-5 byte layouts are supported; the
//! supplement is selected through [`SupportedArinc665Version`]. All
//! multi-byte fields are big-endian, section pointers count 16-bit words
//! from the file start, and every file carries a 16-bit ARINC 645 CRC near
//! its end.
//!
//! ## Quick Start
//!
//! ```
//! use arinc665_files::{LoadHeaderFile, LoadFileEntry, SupportedArinc665Version};
//! use arinc645::CheckValue;
//!
//! # fn main() -> arinc665_files::Result<()> {
//! let header = LoadHeaderFile {
//!     version: SupportedArinc665Version::Supplement345,
//!     part_number: "ACM47-1234-5678".to_string(),
//!     target_hardware_ids: vec!["FMS-L".to_string()],
//!     data_files: vec![LoadFileEntry {
//!         filename: "FMS.BIN".to_string(),
//!         part_number: "P/N 1".to_string(),
//!         length: 1024,
//!         crc: 0x1234,
//!         check_value: CheckValue::NOT_USED,
//!     }],
//!     ..LoadHeaderFile::new(SupportedArinc665Version::Supplement345)
//! };
//!
//! let raw = header.encode()?;
//! let decoded = LoadHeaderFile::decode(&raw)?;
//! assert_eq!(decoded, header);
//! # Ok(())
//! # }
//! ```

mod batch;
mod batch_list;
mod check_value;
mod error;
mod file_list;
mod frame;
mod load_header;
mod load_list;
mod media_information;
mod medium_number;
mod part_number;
mod strings;
mod version;

pub use batch::{BatchFile, BatchLoad, BatchTargetHardware};
pub use batch_list::{BatchListEntry, BatchListFile};
pub use check_value::{decode_check_value, encode_check_value, encoded_check_value_size};
pub use error::Error;
pub use file_list::{FileListEntry, FileListFile, encode_path_name};
pub use frame::{file_length, format_version_field};
pub use load_header::{LoadFileEntry, LoadHeaderFile, LoadType, TargetHardwareIdPositions};
pub use load_list::{LoadListEntry, LoadListFile};
pub use media_information::MediaSetInformation;
pub use medium_number::MediumNumber;
pub use part_number::PartNumber;
pub use strings::{decode_string, decode_strings, encode_string, encode_strings};
pub use version::{
    BATCH_FILE_EXTENSION, FileType, LIST_OF_BATCHES_NAME, LIST_OF_FILES_NAME, LIST_OF_LOADS_NAME,
    LOAD_UPLOAD_HEADER_EXTENSION, SupportedArinc665Version,
};

/// Result alias for codec operations.
pub type Result<T> = std::result::Result<T, Error>;
