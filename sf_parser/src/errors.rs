use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Empty decimal field")]
    Empty,

    #[error("Invalid byte {byte:#x} at position {position}")]
    InvalidByte { byte: u8, position: usize },

    #[error("Decimal has no digits")]
    NoDigits,

    #[error("Decimal out of fixed-point range")]
    Overflow,
}

pub type Result<T> = std::result::Result<T, DecodeError>;
