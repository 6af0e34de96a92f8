use thiserror::Error;

/**
    Errors from content header (PSSH) parsing.
*/
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeaderError {
    #[error("invalid base64: {0}")]
    InvalidBase64(String),

    #[error("malformed PSSH box: {0}")]
    Malformed(String),

    #[error("content header is empty")]
    Empty,
}

/**
    Errors from constructing or parsing a [`ContentKey`](crate::ContentKey).
*/
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContentKeyError {
    #[error("key ID must be 16 bytes, got {0}")]
    InvalidKidLength(usize),

    #[error("key material is empty")]
    EmptyKey,

    #[error("expected 'kid:key' format")]
    InvalidFormat,

    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

/**
    Error returned by `FromStr` implementations on enum types.
*/
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseError {
    pub kind: &'static str,
    pub value: String,
}
