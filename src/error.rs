use thiserror::Error;

use crate::format::Section;

#[derive(Error, Debug)]
pub enum PackError {
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    // Preconditions
    #[error("pair name must not be empty")]
    EmptyName,
    #[error("prefix of {0} bytes exceeds the 255 byte limit")]
    PrefixTooLong(usize),
    #[error("too many {what}: {count} exceeds {max}", max = u16::MAX)]
    TooMany { what: &'static str, count: usize },
    #[error("content is push-only and cannot be opened for reading")]
    PushOnly,
    #[error("sign algorithm holds no secret key")]
    MissingSecretKey,

    // Format
    #[error("wrong prefix: expected {expected:?}, found {found:?}")]
    WrongPrefix { expected: Vec<u8>, found: Vec<u8> },
    #[error("{0} section not found")]
    SectionNotFound(Section),
    #[error("unknown sign flag {0:#04x}")]
    UnknownSignFlag(u8),
    #[error("pack is already signed")]
    AlreadySigned,
    #[error("pack is not signed")]
    NotSigned,
    #[error("malformed pack: {0}")]
    Malformed(&'static str),
    #[error("malformed record: {0}")]
    RecordError(&'static str),

    // Range
    #[error("window [{start}, {start} + {length}) exceeds stream of {available} bytes")]
    WindowOutOfBounds { start: u64, length: u64, available: u64 },
    #[error("offset or size {0} does not fit in 32 bits")]
    AddressOverflow(u64),

    // Dates
    #[error(transparent)]
    DateFormatError(#[from] time::error::Format),
    #[error(transparent)]
    DateParseError(#[from] time::error::Parse),
    #[error(transparent)]
    DateRangeError(#[from] time::error::ComponentRange),

    // External
    #[error("crypto failure: {0}")]
    CryptoError(&'static str),
    #[error(transparent)]
    KeyError(#[from] base64::DecodeError),
    #[error(transparent)]
    ConfigError(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, PackError>;
