use thiserror::Error;

use drm_core::{ContentKeyError, HeaderError};

/**
    Failures raised while loading a device or running a license exchange.

    Variants are grouped by the stage that produces them: device file,
    protobuf framing, key recovery, integrity checks and session state.
*/
#[derive(Debug, Clone, Error)]
pub enum CdmError {
    #[error(transparent)]
    Header(#[from] HeaderError),
    #[error(transparent)]
    ContentKey(#[from] ContentKeyError),

    // device file
    #[error("device blob is not base64: {0}")]
    InvalidBase64(String),
    #[error("device blob does not start with WVD")]
    WvdBadMagic,
    #[error("device blob ended early")]
    WvdTruncated,
    #[error("device blob version {0} is not supported")]
    WvdUnsupportedVersion(u8),
    #[error("device blob has unknown device type {0}")]
    WvdBadDeviceType(u8),
    #[error("device blob has unknown security level {0}")]
    WvdBadSecurityLevel(u8),
    #[error("device blob field of {0} bytes exceeds the u16 length prefix")]
    WvdFieldTooLarge(usize),

    // framing
    #[error("malformed protobuf: {0}")]
    ProtobufDecode(String),
    #[error("signed message has type {actual}, wanted {expected}")]
    UnexpectedMessageType { expected: i32, actual: i32 },
    #[error("message lacks required field {0}")]
    MissingField(&'static str),

    // key recovery
    #[error("private key rejected: {0}")]
    RsaKeyParse(String),
    #[error("RSA failure: {0}")]
    RsaOperation(String),
    #[error("recovered session key has {0} bytes instead of 16")]
    InvalidSessionKeyLength(usize),
    #[error("AES-CBC rejected input: {0}")]
    AesCbcInvalidInput(String),
    #[error("bad PKCS#7 padding after decryption")]
    Pkcs7PaddingInvalid,

    // integrity
    #[error("license signature does not match derived server key")]
    HmacMismatch,
    #[error("service certificate could not be decoded: {0}")]
    CertificateDecode(String),
    #[error("service certificate is not signed by the root")]
    CertificateSignatureMismatch,

    // session state
    #[error("no open session {0}")]
    SessionNotFound(String),
    #[error("session limit of {0} reached")]
    TooManySessions(usize),
    #[error("request {0} has no pending context")]
    ContextNotFound(String),
}

impl From<drm_widevine_proto::prost::DecodeError> for CdmError {
    fn from(e: drm_widevine_proto::prost::DecodeError) -> Self {
        Self::ProtobufDecode(e.to_string())
    }
}

pub type CdmResult<T> = std::result::Result<T, CdmError>;
