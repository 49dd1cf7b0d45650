//! ARINC 665 part numbers.

use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

const MANUFACTURER_CODE_LENGTH: usize = 3;
const CHECK_CODE_LENGTH: usize = 2;
const PRODUCT_IDENTIFIER_LENGTH: usize = 8;
const PART_NUMBER_LENGTH: usize =
    MANUFACTURER_CODE_LENGTH + CHECK_CODE_LENGTH + PRODUCT_IDENTIFIER_LENGTH;

/// A structured ARINC 665 part number `MMMCCPPPPPPPP`.
///
/// - `MMM` — manufacturer code: 3 uppercase alphanumeric characters
/// - `CC` — check code: XOR over the manufacturer code and product
///   identifier bytes, printed as two uppercase hex digits
/// - `PPPPPPPP` — product identifier: 8 uppercase alphanumeric characters,
///   excluding the easily confused letters `I`, `O`, `Q` and `Z`
///
/// The check code is always derived, never stored; parsing the 13-character
/// form verifies it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartNumber {
    manufacturer_code: String,
    product_identifier: String,
}

impl PartNumber {
    /// Creates a part number from its manufacturer code and product
    /// identifier, validating both.
    pub fn new(manufacturer_code: &str, product_identifier: &str) -> Result<Self> {
        check_manufacturer_code(manufacturer_code)?;
        check_product_identifier(product_identifier)?;

        Ok(Self {
            manufacturer_code: manufacturer_code.to_string(),
            product_identifier: product_identifier.to_string(),
        })
    }

    pub fn manufacturer_code(&self) -> &str {
        &self.manufacturer_code
    }

    pub fn product_identifier(&self) -> &str {
        &self.product_identifier
    }

    /// The derived two-digit check code.
    pub fn check_code(&self) -> String {
        let code = self
            .manufacturer_code
            .bytes()
            .chain(self.product_identifier.bytes())
            .fold(0u8, |check, byte| check ^ byte);

        format!("{code:02X}")
    }
}

impl FromStr for PartNumber {
    type Err = Error;

    fn from_str(part_number: &str) -> Result<Self> {
        if part_number.len() != PART_NUMBER_LENGTH || !part_number.is_ascii() {
            return Err(Error::InvalidPartNumber {
                part_number: part_number.to_string(),
                reason: "part number must be 13 ASCII characters long",
            });
        }

        let parsed = Self::new(
            &part_number[..MANUFACTURER_CODE_LENGTH],
            &part_number[MANUFACTURER_CODE_LENGTH + CHECK_CODE_LENGTH..],
        )?;

        let check_code =
            &part_number[MANUFACTURER_CODE_LENGTH..MANUFACTURER_CODE_LENGTH + CHECK_CODE_LENGTH];
        if check_code != parsed.check_code() {
            return Err(Error::InvalidPartNumber {
                part_number: part_number.to_string(),
                reason: "calculated and given check code differ",
            });
        }

        Ok(parsed)
    }
}

impl fmt::Display for PartNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.manufacturer_code,
            self.check_code(),
            self.product_identifier
        )
    }
}

fn check_manufacturer_code(manufacturer_code: &str) -> Result<()> {
    if manufacturer_code.len() != MANUFACTURER_CODE_LENGTH {
        return Err(Error::InvalidPartNumber {
            part_number: manufacturer_code.to_string(),
            reason: "manufacturer code must be 3 characters long",
        });
    }

    if !manufacturer_code
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
    {
        return Err(Error::InvalidPartNumber {
            part_number: manufacturer_code.to_string(),
            reason: "manufacturer code must be uppercase alphanumeric",
        });
    }

    Ok(())
}

fn check_product_identifier(product_identifier: &str) -> Result<()> {
    if product_identifier.len() != PRODUCT_IDENTIFIER_LENGTH {
        return Err(Error::InvalidPartNumber {
            part_number: product_identifier.to_string(),
            reason: "product identifier must be 8 characters long",
        });
    }

    if !product_identifier
        .chars()
        .all(|c| (c.is_ascii_uppercase() || c.is_ascii_digit()) && !"IOQZ".contains(c))
    {
        return Err(Error::InvalidPartNumber {
            part_number: product_identifier.to_string(),
            reason: "product identifier must be uppercase alphanumeric excluding I, O, Q and Z",
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_check_code() {
        let part_number = PartNumber::new("VND", "ABCDEF12").unwrap();
        // XOR over b"VND" and b"ABCDEF12"
        let expected = b"VNDABCDEF12".iter().fold(0u8, |check, b| check ^ b);
        assert_eq!(part_number.check_code(), format!("{expected:02X}"));
    }

    #[test]
    fn test_parse_round_trip() {
        let part_number = PartNumber::new("AB1", "PRDA0123").unwrap();
        let rendered = part_number.to_string();
        assert_eq!(rendered.len(), 13);
        assert_eq!(rendered.parse::<PartNumber>().unwrap(), part_number);
    }

    #[test]
    fn test_parse_rejects_wrong_check_code() {
        let part_number = PartNumber::new("AB1", "PRDA0123").unwrap();
        let mut rendered = part_number.to_string();
        // Corrupt the check code digits
        rendered.replace_range(3..5, "FF");
        assert!(rendered.parse::<PartNumber>().is_err());
    }

    #[test]
    fn test_rejects_lowercase() {
        assert!(PartNumber::new("ab1", "PRDA0123").is_err());
        assert!(PartNumber::new("AB1", "prda0123").is_err());
    }

    #[test]
    fn test_rejects_forbidden_product_letters() {
        for forbidden in ["ABCDEFI2", "ABCDEFO2", "ABCDEFQ2", "ABCDEFZ2"] {
            assert!(
                PartNumber::new("AB1", forbidden).is_err(),
                "{forbidden} must be rejected"
            );
        }
        // The forbidden letters are fine in the manufacturer code
        assert!(PartNumber::new("IOQ", "PRDA0123").is_ok());
    }

    #[test]
    fn test_rejects_wrong_length() {
        assert!(PartNumber::new("ABCD", "PRDA0123").is_err());
        assert!(PartNumber::new("AB1", "PRD1234").is_err());
        assert!("ABC12".parse::<PartNumber>().is_err());
    }
}
