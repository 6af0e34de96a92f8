use drm_core::{ContentKey, KeyType};
use drm_widevine::{DerivationContext, Device, SessionKeys};

use crate::envelope::{ChallengeMessage, LicenseMessage, SignedEnvelope};
use crate::error::{InterceptError, InterceptResult};
use crate::store::{CorrelationStore, ExchangeContext};

use super::{Mode, Strategy};

/**
    Keeps the application's challenge and swaps in the local device.

    Only `ClientIdentification.token` is replaced; the request is then
    re-signed with the device key. The license server wraps its session key
    to that device, so the license can be verified and unwrapped here
    without any DRM client session.
*/
#[derive(Debug)]
pub struct TokenSubstitution {
    device: Device,
}

impl TokenSubstitution {
    pub fn new(device: Device) -> Self {
        Self { device }
    }

    pub fn device(&self) -> &Device {
        &self.device
    }
}

impl Strategy for TokenSubstitution {
    fn mode(&self) -> Mode {
        Mode::TokenSubstitution
    }

    fn rewrite_challenge(
        &self,
        store: &CorrelationStore,
        challenge: &[u8],
        _service_certificate: Option<&[u8]>,
    ) -> InterceptResult<Vec<u8>> {
        let mut envelope = SignedEnvelope::decode(challenge)?;
        let mut message = ChallengeMessage::decode(&envelope)?;

        if !message.set_identity_token(self.device.token())? {
            return Err(InterceptError::Configuration(
                "challenge has no client identification to substitute \
                 (service certificate in use); run in full negotiation mode"
                    .into(),
            ));
        }
        let request_id = message.request_id()?;

        let payload = message.encode();
        let signature = self.device.sign(&payload).map_err(InterceptError::crypto)?;
        let context = DerivationContext::new(payload.clone());
        envelope.set_payload(payload)?;
        envelope.set_signature(signature)?;

        store
            .put(request_id, ExchangeContext::Derivation(context))
            .map_err(|rejected| {
                let err = InterceptError::from(&rejected);
                self.abandon(rejected.context);
                err
            })?;

        Ok(envelope.encode())
    }

    fn extract_keys(
        &self,
        store: &CorrelationStore,
        license: &[u8],
    ) -> InterceptResult<Vec<ContentKey>> {
        let envelope = SignedEnvelope::decode(license)?;
        let message = LicenseMessage::decode(&envelope)?;
        let request_id = message.request_id()?;

        let context = match store.take(&request_id)? {
            ExchangeContext::Derivation(context) => context,
            other => {
                self.abandon(other);
                return Err(InterceptError::Correlation(request_id));
            }
        };

        let encrypted = envelope
            .encrypted_session_key()
            .ok_or_else(|| InterceptError::Parse("license carries no session key".into()))?;
        let session_key = self
            .device
            .decrypt_session_key(encrypted)
            .map_err(InterceptError::crypto)?;

        let keys = SessionKeys::derive(&context, &session_key);
        keys.verify_license(
            envelope.side_channel(),
            envelope.payload().unwrap_or_default(),
            envelope.signature(),
        )
        .map_err(InterceptError::crypto)?;

        keys.unwrap_keys(message.license(), Some(KeyType::Content))
            .map_err(InterceptError::crypto)
    }

    fn abandon(&self, _context: ExchangeContext) {}
}
