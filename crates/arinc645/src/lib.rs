//! # ARINC 645 Integrity Primitives
//!
//! Implementation of the integrity algorithms shared by the ARINC 6xx
//! loadable-software standards: the CRC family used for file and load CRCs,
//! and the *check value* container embedded in ARINC 665 supplement 3 and
//! later protocol files.
//!
//! ## Quick Start
//!
//! ```
//! use arinc645::{Arinc645Crc16, CheckValueGenerator, CheckValueType};
//!
//! // One-shot CRC over a buffer.
//! let crc = arinc645::crc16(b"123456789");
//! assert_eq!(crc, 0x29B1);
//!
//! // Incremental check value over streamed content.
//! let mut generator = CheckValueGenerator::new(CheckValueType::Crc32);
//! generator.update(b"1234");
//! generator.update(b"56789");
//! let check_value = generator.finalize();
//! assert_eq!(check_value.check_value_type(), CheckValueType::Crc32);
//! ```

mod check_value;
mod crc;
mod error;

pub use check_value::{CheckValue, CheckValueGenerator, CheckValueType, check_value_of};
pub use crc::{
    Arinc645Crc8, Arinc645Crc16, Arinc645Crc32, Arinc645Crc64, crc8, crc16, crc32, crc64,
};
pub use error::Error;

/// Result alias for ARINC 645 operations.
pub type Result<T> = std::result::Result<T, Error>;
