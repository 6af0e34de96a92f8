use drm_core::{ContentHeader, ContentKey, KeyType};
use drm_widevine::{LicenseType, SessionId};

use crate::client::LicenseClient;
use crate::envelope::{ChallengeMessage, LicenseMessage, SignedEnvelope};
use crate::error::{InterceptError, InterceptResult};
use crate::store::{CorrelationStore, ExchangeContext, RequestId};

use super::{Mode, Strategy, extract_optional_parameters};

/**
    Replaces the application's challenge with one made by a local DRM client.

    Each exchange runs in its own client session, stored under the request
    id the client assigned. The application's side channel is moved onto
    the new envelope unchanged.
*/
#[derive(Debug)]
pub struct FullNegotiation<C> {
    client: C,
}

impl<C: LicenseClient> FullNegotiation<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    fn negotiate(
        &self,
        session: SessionId,
        original: &SignedEnvelope,
        header: &ContentHeader,
        license_type: LicenseType,
        parameters: &[(String, String)],
        service_certificate: Option<&[u8]>,
    ) -> InterceptResult<(RequestId, Vec<u8>)> {
        if let Some(certificate) = service_certificate {
            let provider_id = self
                .client
                .set_service_certificate(session, certificate)
                .map_err(InterceptError::capability)?;
            tracing::info!(%session, %provider_id, "service certificate installed");
        }

        let raw = self
            .client
            .get_license_challenge(session, header, license_type, parameters)
            .map_err(InterceptError::capability)?;

        let mut envelope = SignedEnvelope::decode(&raw)?;
        envelope.set_side_channel(original.side_channel().map(<[u8]>::to_vec))?;
        let request_id = ChallengeMessage::decode(&envelope)?.request_id()?;

        Ok((request_id, envelope.encode()))
    }

    fn close(&self, session: SessionId) {
        if let Err(e) = self.client.close(session) {
            tracing::warn!(%session, "failed to close session: {e}");
        }
    }
}

impl<C: LicenseClient> Strategy for FullNegotiation<C> {
    fn mode(&self) -> Mode {
        Mode::FullNegotiation
    }

    fn rewrite_challenge(
        &self,
        store: &CorrelationStore,
        challenge: &[u8],
        service_certificate: Option<&[u8]>,
    ) -> InterceptResult<Vec<u8>> {
        let original = SignedEnvelope::decode(challenge)?;
        let message = ChallengeMessage::decode(&original)?;
        let header = message.content_header()?;
        let license_type = message.license_type();
        let parameters = extract_optional_parameters(message.client_info());
        let service_certificate = service_certificate.filter(|c| !c.is_empty());

        let session = self.client.open().map_err(InterceptError::capability)?;
        let (request_id, rewritten) = self
            .negotiate(
                session,
                &original,
                &header,
                license_type,
                &parameters,
                service_certificate,
            )
            .inspect_err(|_| self.close(session))?;

        store
            .put(request_id, ExchangeContext::Session(session))
            .map_err(|rejected| {
                let err = InterceptError::from(&rejected);
                self.abandon(rejected.context);
                err
            })?;

        Ok(rewritten)
    }

    fn extract_keys(
        &self,
        store: &CorrelationStore,
        license: &[u8],
    ) -> InterceptResult<Vec<ContentKey>> {
        let envelope = SignedEnvelope::decode(license)?;
        let request_id = LicenseMessage::decode(&envelope)?.request_id()?;

        let session = match store.take(&request_id)? {
            ExchangeContext::Session(session) => session,
            other => {
                self.abandon(other);
                return Err(InterceptError::Correlation(request_id));
            }
        };

        let keys = self
            .client
            .parse_license(session, license)
            .and_then(|()| self.client.get_keys(session, Some(KeyType::Content)))
            .map_err(InterceptError::capability);
        self.close(session);
        keys
    }

    fn abandon(&self, context: ExchangeContext) {
        if let ExchangeContext::Session(session) = context {
            self.close(session);
        }
    }
}
