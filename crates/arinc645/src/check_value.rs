//! Check value types and incremental generation.
//!
//! A *check value* is the integrity tag embedded in ARINC 665 supplement 3
//! and later files. On the wire it is a type code plus a fixed-size payload;
//! `CheckValueType::NotUsed` denotes the absence of a value.

use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};
use std::fmt;

use crate::crc::{Arinc645Crc8, Arinc645Crc16, Arinc645Crc32, Arinc645Crc64};
use crate::{Error, Result};

/// Check value algorithm selector.
///
/// The discriminants are the 16-bit wire codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u16)]
pub enum CheckValueType {
    NotUsed = 0,
    Crc8 = 1,
    Crc16 = 2,
    Crc32 = 3,
    Crc64 = 4,
    Sha1 = 5,
    Sha256 = 6,
    Sha512 = 7,
}

impl CheckValueType {
    /// All types with an actual payload, i.e. everything but `NotUsed`.
    pub const USED: [CheckValueType; 7] = [
        CheckValueType::Crc8,
        CheckValueType::Crc16,
        CheckValueType::Crc32,
        CheckValueType::Crc64,
        CheckValueType::Sha1,
        CheckValueType::Sha256,
        CheckValueType::Sha512,
    ];

    /// Wire code of this type.
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Maps a wire code back to the type.
    pub fn from_code(code: u16) -> Result<Self> {
        match code {
            0 => Ok(CheckValueType::NotUsed),
            1 => Ok(CheckValueType::Crc8),
            2 => Ok(CheckValueType::Crc16),
            3 => Ok(CheckValueType::Crc32),
            4 => Ok(CheckValueType::Crc64),
            5 => Ok(CheckValueType::Sha1),
            6 => Ok(CheckValueType::Sha256),
            7 => Ok(CheckValueType::Sha512),
            other => Err(Error::UnknownCheckValueType(other)),
        }
    }

    /// Payload size in bytes. `NotUsed` has no payload.
    pub fn value_size(self) -> usize {
        match self {
            CheckValueType::NotUsed => 0,
            CheckValueType::Crc8 => 1,
            CheckValueType::Crc16 => 2,
            CheckValueType::Crc32 => 4,
            CheckValueType::Crc64 => 8,
            CheckValueType::Sha1 => 20,
            CheckValueType::Sha256 => 32,
            CheckValueType::Sha512 => 64,
        }
    }

    /// Human-readable algorithm name.
    pub fn name(self) -> &'static str {
        match self {
            CheckValueType::NotUsed => "Not Used",
            CheckValueType::Crc8 => "CRC-8",
            CheckValueType::Crc16 => "CRC-16",
            CheckValueType::Crc32 => "CRC-32",
            CheckValueType::Crc64 => "CRC-64",
            CheckValueType::Sha1 => "SHA-1",
            CheckValueType::Sha256 => "SHA-256",
            CheckValueType::Sha512 => "SHA-512",
        }
    }
}

impl fmt::Display for CheckValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A check value: algorithm tag plus payload bytes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CheckValue {
    check_value_type: CheckValueType,
    value: Vec<u8>,
}

impl CheckValue {
    /// The "no check value" sentinel.
    pub const NOT_USED: CheckValue = CheckValue {
        check_value_type: CheckValueType::NotUsed,
        value: Vec::new(),
    };

    /// Creates a check value, validating the payload length against the type.
    pub fn new(check_value_type: CheckValueType, value: Vec<u8>) -> Result<Self> {
        if value.len() != check_value_type.value_size() {
            return Err(Error::CheckValueLength {
                kind: check_value_type.name(),
                expected: check_value_type.value_size(),
                actual: value.len(),
            });
        }
        Ok(Self {
            check_value_type,
            value,
        })
    }

    pub fn crc8(crc: u8) -> Self {
        Self {
            check_value_type: CheckValueType::Crc8,
            value: vec![crc],
        }
    }

    pub fn crc16(crc: u16) -> Self {
        Self {
            check_value_type: CheckValueType::Crc16,
            value: crc.to_be_bytes().to_vec(),
        }
    }

    pub fn crc32(crc: u32) -> Self {
        Self {
            check_value_type: CheckValueType::Crc32,
            value: crc.to_be_bytes().to_vec(),
        }
    }

    pub fn crc64(crc: u64) -> Self {
        Self {
            check_value_type: CheckValueType::Crc64,
            value: crc.to_be_bytes().to_vec(),
        }
    }

    pub fn check_value_type(&self) -> CheckValueType {
        self.check_value_type
    }

    /// Payload bytes (big-endian for the CRC family, digest bytes for SHA).
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Whether this is the `NotUsed` sentinel.
    pub fn is_used(&self) -> bool {
        self.check_value_type != CheckValueType::NotUsed
    }
}

impl fmt::Display for CheckValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_used() {
            write!(f, "{}:{}", self.check_value_type, hex::encode(&self.value))
        } else {
            f.write_str(self.check_value_type.name())
        }
    }
}

enum GeneratorState {
    NotUsed,
    Crc8(Arinc645Crc8),
    Crc16(Arinc645Crc16),
    Crc32(Arinc645Crc32),
    Crc64(Arinc645Crc64),
    Sha1(Sha1),
    Sha256(Sha256),
    Sha512(Sha512),
}

/// Incremental check value generation over streamed content.
///
/// A `NotUsed` generator swallows all input and finalizes to
/// [`CheckValue::NOT_USED`], so callers need not special-case disabled
/// check values.
pub struct CheckValueGenerator {
    state: GeneratorState,
}

impl CheckValueGenerator {
    pub fn new(check_value_type: CheckValueType) -> Self {
        let state = match check_value_type {
            CheckValueType::NotUsed => GeneratorState::NotUsed,
            CheckValueType::Crc8 => GeneratorState::Crc8(Arinc645Crc8::new()),
            CheckValueType::Crc16 => GeneratorState::Crc16(Arinc645Crc16::new()),
            CheckValueType::Crc32 => GeneratorState::Crc32(Arinc645Crc32::new()),
            CheckValueType::Crc64 => GeneratorState::Crc64(Arinc645Crc64::new()),
            CheckValueType::Sha1 => GeneratorState::Sha1(Sha1::new()),
            CheckValueType::Sha256 => GeneratorState::Sha256(Sha256::new()),
            CheckValueType::Sha512 => GeneratorState::Sha512(Sha512::new()),
        };
        Self { state }
    }

    pub fn check_value_type(&self) -> CheckValueType {
        match &self.state {
            GeneratorState::NotUsed => CheckValueType::NotUsed,
            GeneratorState::Crc8(_) => CheckValueType::Crc8,
            GeneratorState::Crc16(_) => CheckValueType::Crc16,
            GeneratorState::Crc32(_) => CheckValueType::Crc32,
            GeneratorState::Crc64(_) => CheckValueType::Crc64,
            GeneratorState::Sha1(_) => CheckValueType::Sha1,
            GeneratorState::Sha256(_) => CheckValueType::Sha256,
            GeneratorState::Sha512(_) => CheckValueType::Sha512,
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match &mut self.state {
            GeneratorState::NotUsed => {}
            GeneratorState::Crc8(crc) => crc.update(data),
            GeneratorState::Crc16(crc) => crc.update(data),
            GeneratorState::Crc32(crc) => crc.update(data),
            GeneratorState::Crc64(crc) => crc.update(data),
            GeneratorState::Sha1(digest) => digest.update(data),
            GeneratorState::Sha256(digest) => digest.update(data),
            GeneratorState::Sha512(digest) => digest.update(data),
        }
    }

    pub fn finalize(self) -> CheckValue {
        match self.state {
            GeneratorState::NotUsed => CheckValue::NOT_USED,
            GeneratorState::Crc8(crc) => CheckValue::crc8(crc.finalize()),
            GeneratorState::Crc16(crc) => CheckValue::crc16(crc.finalize()),
            GeneratorState::Crc32(crc) => CheckValue::crc32(crc.finalize()),
            GeneratorState::Crc64(crc) => CheckValue::crc64(crc.finalize()),
            GeneratorState::Sha1(digest) => CheckValue {
                check_value_type: CheckValueType::Sha1,
                value: digest.finalize().to_vec(),
            },
            GeneratorState::Sha256(digest) => CheckValue {
                check_value_type: CheckValueType::Sha256,
                value: digest.finalize().to_vec(),
            },
            GeneratorState::Sha512(digest) => CheckValue {
                check_value_type: CheckValueType::Sha512,
                value: digest.finalize().to_vec(),
            },
        }
    }
}

/// One-shot check value over a buffer.
pub fn check_value_of(check_value_type: CheckValueType, data: &[u8]) -> CheckValue {
    let mut generator = CheckValueGenerator::new(check_value_type);
    generator.update(data);
    generator.finalize()
}
