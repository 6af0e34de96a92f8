use thiserror::Error;

use drm_widevine::CdmError;

use crate::store::RequestId;

/**
    Why a single license exchange was abandoned.

    None of these stop the process; the dispatcher logs them and keeps
    serving later events.
*/
#[derive(Debug, Clone, Error)]
pub enum InterceptError {
    /// Malformed envelope or inner message.
    #[error("parse error: {0}")]
    Parse(String),

    /// The selected strategy cannot handle this challenge.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A license whose request id has no stored context.
    #[error("no exchange in flight for request id {0}")]
    Correlation(RequestId),

    /// The DRM client capability failed.
    #[error("license client failed: {0}")]
    Capability(CdmError),

    /// The license signature does not verify. Keys are never emitted.
    #[error("license signature mismatch, rejecting license")]
    SignatureMismatch,

    #[error("an exchange for request id {0} is already in flight")]
    DuplicateRequest(RequestId),

    /// Local cryptography failed (signing, session key recovery, key unwrap).
    #[error("crypto error: {0}")]
    Crypto(CdmError),
}

impl InterceptError {
    /**
        Classify a failure of the DRM client capability. A license rejected
        for its signature keeps its own kind.
    */
    pub fn capability(e: CdmError) -> Self {
        match e {
            CdmError::HmacMismatch => Self::SignatureMismatch,
            other => Self::Capability(other),
        }
    }

    pub fn crypto(e: CdmError) -> Self {
        match e {
            CdmError::HmacMismatch => Self::SignatureMismatch,
            other => Self::Crypto(other),
        }
    }

    /// Short kind name for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Parse(_) => "parse",
            Self::Configuration(_) => "configuration",
            Self::Correlation(_) => "correlation",
            Self::Capability(_) => "capability",
            Self::SignatureMismatch => "signature_mismatch",
            Self::DuplicateRequest(_) => "duplicate_request",
            Self::Crypto(_) => "crypto",
        }
    }
}

impl From<drm_widevine::proto::prost::DecodeError> for InterceptError {
    fn from(e: drm_widevine::proto::prost::DecodeError) -> Self {
        Self::Parse(e.to_string())
    }
}

/**
    Type alias for results that may return an [`InterceptError`].
*/
pub type InterceptResult<T> = std::result::Result<T, InterceptError>;
