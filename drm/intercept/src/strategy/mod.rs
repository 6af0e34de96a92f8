use std::fmt;

use drm_core::ContentKey;
use drm_widevine::proto::client_identification::NameValue;

use crate::error::InterceptResult;
use crate::store::{CorrelationStore, ExchangeContext};

mod negotiate;
mod token;

pub use negotiate::FullNegotiation;
pub use token::TokenSubstitution;

/// Attribute that ends optional-parameter collection.
const STOP_ATTRIBUTE: &str = "company_name";

/**
    How challenges are rewritten, fixed when the engine is built.
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Swap the identity token of the intercepted challenge and re-sign it.
    TokenSubstitution,
    /// Replace the challenge with one built by a local DRM client.
    FullNegotiation,
}

impl Mode {
    pub const fn to_name(self) -> &'static str {
        match self {
            Self::TokenSubstitution => "token-substitution",
            Self::FullNegotiation => "full-negotiation",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_name())
    }
}

/**
    One way of running a license exchange through the interceptor.

    `rewrite_challenge` publishes exactly one context to the store when it
    succeeds and none when it fails. `extract_keys` consumes that context
    whatever its outcome.
*/
pub trait Strategy: Send + Sync {
    fn mode(&self) -> Mode;

    /**
        Turn an intercepted challenge into the one sent to the license
        server. `service_certificate` is the certificate the application
        installed on its own session, if any.
    */
    fn rewrite_challenge(
        &self,
        store: &CorrelationStore,
        challenge: &[u8],
        service_certificate: Option<&[u8]>,
    ) -> InterceptResult<Vec<u8>>;

    /// Verify a license answering a rewritten challenge and unwrap its CONTENT keys.
    fn extract_keys(
        &self,
        store: &CorrelationStore,
        license: &[u8],
    ) -> InterceptResult<Vec<ContentKey>>;

    /// Release whatever a context holds once its exchange is over.
    fn abandon(&self, context: ExchangeContext);
}

/**
    Collect `client_info` attributes as optional challenge parameters.

    Collection stops at the first attribute named `company_name`; it and
    everything after it are left out. A repeated name keeps the position of
    its first occurrence and the value of its last.
*/
pub fn extract_optional_parameters(client_info: &[NameValue]) -> Vec<(String, String)> {
    let mut parameters: Vec<(String, String)> = Vec::new();
    for attribute in client_info {
        let name = attribute.name.as_deref().unwrap_or_default();
        if name == STOP_ATTRIBUTE {
            break;
        }
        let value = attribute.value.clone().unwrap_or_default();
        match parameters.iter_mut().find(|(existing, _)| existing == name) {
            Some(entry) => entry.1 = value,
            None => parameters.push((name.to_owned(), value)),
        }
    }
    parameters
}
