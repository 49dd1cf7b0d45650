use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("Unknown check value type code {0:#06x}")]
    UnknownCheckValueType(u16),

    #[error("Check value payload length {actual} does not match {expected} for {kind}")]
    CheckValueLength {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },
}
