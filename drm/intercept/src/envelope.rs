use drm_core::ContentHeader;
use drm_widevine::LicenseType;
use drm_widevine::proto::client_identification::NameValue;
use drm_widevine::proto::license_request::content_identification::ContentIdVariant;
use drm_widevine::proto::signed_message::MessageType;
use drm_widevine::proto::{ClientIdentification, License, LicenseRequest, Message, SignedMessage};

use crate::error::{InterceptError, InterceptResult};
use crate::store::RequestId;
use crate::wire;

/// `SignedMessage.msg`
const MSG_FIELD: u32 = 2;
/// `SignedMessage.signature`
const SIGNATURE_FIELD: u32 = 3;
/// `SignedMessage.oemcrypto_core_message`
const SIDE_CHANNEL_FIELD: u32 = 9;
/// `LicenseRequest.client_id`
const CLIENT_ID_FIELD: u32 = 1;
/// `ClientIdentification.token`
const TOKEN_FIELD: u32 = 2;

/**
    The outer `SignedMessage` of every protocol message.

    The received bytes are kept next to the decoded view and setters edit
    them in place, so fields the exchange does not touch (attestation,
    metrics, version info, fields unknown to this schema) leave exactly as
    they arrived.
*/
#[derive(Debug, Clone, PartialEq)]
pub struct SignedEnvelope {
    raw: Vec<u8>,
    message: SignedMessage,
}

impl SignedEnvelope {
    pub fn decode(bytes: &[u8]) -> InterceptResult<Self> {
        Ok(Self {
            raw: bytes.to_vec(),
            message: SignedMessage::decode(bytes)?,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        self.raw.clone()
    }

    pub fn message_type(&self) -> Option<MessageType> {
        self.message
            .r#type
            .and_then(|t| MessageType::try_from(t).ok())
    }

    pub fn payload(&self) -> Option<&[u8]> {
        self.message.msg.as_deref()
    }

    pub fn signature(&self) -> &[u8] {
        self.message.signature.as_deref().unwrap_or_default()
    }

    /// `oemcrypto_core_message`, echoed end to end by the server.
    pub fn side_channel(&self) -> Option<&[u8]> {
        self.message.oemcrypto_core_message.as_deref()
    }

    pub fn encrypted_session_key(&self) -> Option<&[u8]> {
        self.message.session_key.as_deref()
    }

    pub fn set_payload(&mut self, payload: Vec<u8>) -> InterceptResult<()> {
        self.raw = wire::set_bytes(&self.raw, MSG_FIELD, &payload)?;
        self.message.msg = Some(payload);
        Ok(())
    }

    pub fn set_signature(&mut self, signature: Vec<u8>) -> InterceptResult<()> {
        self.raw = wire::set_bytes(&self.raw, SIGNATURE_FIELD, &signature)?;
        self.message.signature = Some(signature);
        Ok(())
    }

    pub fn set_side_channel(&mut self, side_channel: Option<Vec<u8>>) -> InterceptResult<()> {
        self.raw = match &side_channel {
            Some(bytes) => wire::set_bytes(&self.raw, SIDE_CHANNEL_FIELD, bytes)?,
            None => wire::remove(&self.raw, SIDE_CHANNEL_FIELD)?,
        };
        self.message.oemcrypto_core_message = side_channel;
        Ok(())
    }

    fn expect(&self, expected: MessageType) -> InterceptResult<&[u8]> {
        if self.message_type() != Some(expected) {
            return Err(InterceptError::Parse(format!(
                "expected a {expected:?} envelope, got message type {:?}",
                self.message.r#type
            )));
        }
        self.payload()
            .ok_or_else(|| InterceptError::Parse("envelope carries no payload".into()))
    }
}

/**
    The `LicenseRequest` inside a challenge envelope.
*/
#[derive(Debug, Clone, PartialEq)]
pub struct ChallengeMessage {
    payload: Vec<u8>,
    request: LicenseRequest,
}

impl ChallengeMessage {
    pub fn decode(envelope: &SignedEnvelope) -> InterceptResult<Self> {
        let payload = envelope.expect(MessageType::LicenseRequest)?;
        Ok(Self {
            payload: payload.to_vec(),
            request: LicenseRequest::decode(payload)?,
        })
    }

    /// The request bytes, byte-identical to the received ones apart from edits.
    pub fn encode(&self) -> Vec<u8> {
        self.payload.clone()
    }

    pub fn request(&self) -> &LicenseRequest {
        &self.request
    }

    /**
        The plain client identification, if the challenge carries one with
        any field set. Challenges made under a service certificate only
        carry the encrypted form.
    */
    pub fn identity_binding(&self) -> Option<&ClientIdentification> {
        self.request
            .client_id
            .as_ref()
            .filter(|client_id| **client_id != ClientIdentification::default())
    }

    pub fn client_info(&self) -> &[NameValue] {
        self.identity_binding()
            .map(|client_id| client_id.client_info.as_slice())
            .unwrap_or_default()
    }

    /**
        Replace `ClientIdentification.token`, leaving every other byte of the
        request as it was. Returns `false` when there is no identity binding.
    */
    pub fn set_identity_token(&mut self, token: &[u8]) -> InterceptResult<bool> {
        if self.identity_binding().is_none() {
            return Ok(false);
        }
        let (payload, _) = wire::edit_message(&self.payload, CLIENT_ID_FIELD, |client_id| {
            wire::set_bytes(client_id, TOKEN_FIELD, token)
        })?;
        self.request = LicenseRequest::decode(payload.as_slice())?;
        self.payload = payload;
        Ok(true)
    }

    fn variant(&self) -> InterceptResult<&ContentIdVariant> {
        self.request
            .content_id
            .as_ref()
            .and_then(|content_id| content_id.content_id_variant.as_ref())
            .ok_or_else(|| InterceptError::Parse("challenge has no content identification".into()))
    }

    pub fn request_id(&self) -> InterceptResult<RequestId> {
        let request_id = match self.variant()? {
            ContentIdVariant::WidevinePsshData(data) => data.request_id.as_deref(),
            ContentIdVariant::WebmKeyId(data) => data.request_id.as_deref(),
            ContentIdVariant::InitData(data) => data.request_id.as_deref(),
            ContentIdVariant::ExistingLicense(data) => data
                .license_id
                .as_ref()
                .and_then(|id| id.request_id.as_deref()),
        };
        request_id
            .map(RequestId::from)
            .ok_or_else(|| InterceptError::Parse("challenge has no request id".into()))
    }

    pub fn license_type(&self) -> LicenseType {
        let raw = match self.variant() {
            Ok(ContentIdVariant::WidevinePsshData(data)) => data.license_type,
            Ok(ContentIdVariant::WebmKeyId(data)) => data.license_type,
            Ok(ContentIdVariant::InitData(data)) => data.license_type,
            _ => None,
        };
        LicenseType::from_proto_raw(raw)
    }

    /**
        The first content header of the challenge (the first `pssh_data`
        entry, or the init data of an init-data request).
    */
    pub fn content_header(&self) -> InterceptResult<ContentHeader> {
        let header = match self.variant()? {
            ContentIdVariant::WidevinePsshData(data) => data.pssh_data.first(),
            ContentIdVariant::InitData(data) => data.init_data.as_ref(),
            _ => None,
        };
        let header =
            header.ok_or_else(|| InterceptError::Parse("challenge has no PSSH data".into()))?;
        ContentHeader::parse(header).map_err(|e| InterceptError::Parse(e.to_string()))
    }
}

/**
    The `License` inside a license envelope.
*/
#[derive(Debug, Clone, PartialEq)]
pub struct LicenseMessage {
    license: License,
}

impl LicenseMessage {
    pub fn decode(envelope: &SignedEnvelope) -> InterceptResult<Self> {
        let payload = envelope.expect(MessageType::License)?;
        Ok(Self {
            license: License::decode(payload)?,
        })
    }

    pub fn license(&self) -> &License {
        &self.license
    }

    pub fn request_id(&self) -> InterceptResult<RequestId> {
        self.license
            .id
            .as_ref()
            .and_then(|id| id.request_id.as_deref())
            .map(RequestId::from)
            .ok_or_else(|| InterceptError::Parse("license has no request id".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drm_widevine::proto::license_request::ContentIdentification;
    use drm_widevine::proto::license_request::content_identification::{
        ExistingLicense, WebmKeyId, WidevinePsshData,
    };
    use drm_widevine::proto::{LicenseIdentification, MetricData, VersionInfo};

    fn request(client_id: Option<ClientIdentification>, variant: ContentIdVariant) -> LicenseRequest {
        LicenseRequest {
            client_id,
            content_id: Some(ContentIdentification {
                content_id_variant: Some(variant),
            }),
            ..Default::default()
        }
    }

    fn pssh_variant(request_id: &[u8]) -> ContentIdVariant {
        ContentIdVariant::WidevinePsshData(WidevinePsshData {
            pssh_data: vec![b"init-data".to_vec()],
            license_type: Some(drm_widevine::proto::LicenseType::Offline as i32),
            request_id: Some(request_id.to_vec()),
        })
    }

    fn envelope(message: SignedMessage) -> SignedEnvelope {
        SignedEnvelope::decode(&message.encode_to_vec()).unwrap()
    }

    fn challenge_envelope(request: &LicenseRequest) -> SignedEnvelope {
        envelope(SignedMessage {
            r#type: Some(MessageType::LicenseRequest as i32),
            msg: Some(request.encode_to_vec()),
            signature: Some(vec![0xEE; 4]),
            ..Default::default()
        })
    }

    fn identity() -> ClientIdentification {
        ClientIdentification {
            token: Some(b"original-token".to_vec()),
            client_info: vec![NameValue {
                name: Some("company_name".into()),
                value: Some("Vendor".into()),
            }],
            ..Default::default()
        }
    }

    #[test]
    fn envelope_round_trip_keeps_unmodelled_fields() {
        let message = SignedMessage {
            r#type: Some(MessageType::License as i32),
            msg: Some(b"payload".to_vec()),
            signature: Some(b"sig".to_vec()),
            session_key: Some(b"wrapped".to_vec()),
            metric_data: vec![MetricData {
                stage_name: Some("stage".into()),
                ..Default::default()
            }],
            service_version_info: Some(VersionInfo {
                license_sdk_version: Some("1.0".into()),
                ..Default::default()
            }),
            oemcrypto_core_message: Some(b"core".to_vec()),
            ..Default::default()
        };
        let bytes = message.encode_to_vec();

        let envelope = SignedEnvelope::decode(&bytes).unwrap();
        assert_eq!(envelope.side_channel(), Some(&b"core"[..]));
        assert_eq!(envelope.encrypted_session_key(), Some(&b"wrapped"[..]));
        assert_eq!(envelope.message_type(), Some(MessageType::License));
        assert_eq!(envelope.encode(), bytes);
        assert_eq!(SignedEnvelope::decode(&envelope.encode()).unwrap(), envelope);
    }

    #[test]
    fn truncated_envelope_is_parse_error() {
        let bytes = challenge_envelope(&request(None, pssh_variant(b"R1"))).encode();
        let err = SignedEnvelope::decode(&bytes[..bytes.len() - 3]).unwrap_err();
        assert!(matches!(err, InterceptError::Parse(_)));
    }

    #[test]
    fn challenge_fields() {
        let envelope = challenge_envelope(&request(Some(identity()), pssh_variant(b"R1")));
        let challenge = ChallengeMessage::decode(&envelope).unwrap();

        assert_eq!(challenge.request_id().unwrap(), RequestId::from(b"R1".as_slice()));
        assert_eq!(challenge.license_type(), LicenseType::Offline);
        assert_eq!(challenge.content_header().unwrap().init_data(), b"init-data");
        assert!(challenge.identity_binding().is_some());
        assert_eq!(challenge.client_info().len(), 1);
    }

    #[test]
    fn token_replacement_touches_only_token() {
        let envelope = challenge_envelope(&request(Some(identity()), pssh_variant(b"R1")));
        let mut challenge = ChallengeMessage::decode(&envelope).unwrap();
        assert!(challenge.set_identity_token(b"local-token").unwrap());

        let mut expected = request(Some(identity()), pssh_variant(b"R1"));
        expected.client_id.as_mut().unwrap().token = Some(b"local-token".to_vec());
        assert_eq!(challenge.request(), &expected);
    }

    /// Field 20, length-delimited, not part of this schema.
    const FUTURE_FIELD: [u8; 9] = [0xA2, 0x01, 0x06, b'f', b'u', b't', b'u', b'r', b'e'];

    #[test]
    fn token_replacement_keeps_unknown_request_fields() {
        let payload = [
            request(Some(identity()), pssh_variant(b"R1")).encode_to_vec(),
            FUTURE_FIELD.to_vec(),
        ]
        .concat();
        let envelope = envelope(SignedMessage {
            r#type: Some(MessageType::LicenseRequest as i32),
            msg: Some(payload),
            ..Default::default()
        });
        let mut challenge = ChallengeMessage::decode(&envelope).unwrap();
        assert!(challenge.set_identity_token(b"local-token").unwrap());

        let mut expected = request(Some(identity()), pssh_variant(b"R1"));
        expected.client_id.as_mut().unwrap().token = Some(b"local-token".to_vec());
        assert_eq!(
            challenge.encode(),
            [expected.encode_to_vec(), FUTURE_FIELD.to_vec()].concat()
        );
    }

    #[test]
    fn envelope_edits_keep_unknown_fields() {
        let original = SignedMessage {
            r#type: Some(MessageType::LicenseRequest as i32),
            msg: Some(b"request".to_vec()),
            signature: Some(b"app-signature".to_vec()),
            ..Default::default()
        };
        let bytes = [original.encode_to_vec(), FUTURE_FIELD.to_vec()].concat();

        let mut envelope = SignedEnvelope::decode(&bytes).unwrap();
        envelope.set_payload(b"rewritten".to_vec()).unwrap();
        envelope.set_signature(b"local-signature".to_vec()).unwrap();
        envelope.set_side_channel(Some(b"core".to_vec())).unwrap();

        let expected = SignedMessage {
            msg: Some(b"rewritten".to_vec()),
            signature: Some(b"local-signature".to_vec()),
            ..original
        };
        let encoded = envelope.encode();
        assert_eq!(
            &encoded[..encoded.len() - 6],
            [
                expected.encode_to_vec(),
                FUTURE_FIELD.to_vec(),
            ]
            .concat()
            .as_slice()
        );
        assert_eq!(SignedEnvelope::decode(&encoded).unwrap().side_channel(), Some(&b"core"[..]));

        envelope.set_side_channel(None).unwrap();
        assert_eq!(envelope.encode(), [expected.encode_to_vec(), FUTURE_FIELD.to_vec()].concat());
    }

    #[test]
    fn empty_client_id_is_no_identity_binding() {
        let envelope = challenge_envelope(&request(
            Some(ClientIdentification::default()),
            pssh_variant(b"R1"),
        ));
        let mut challenge = ChallengeMessage::decode(&envelope).unwrap();
        assert!(challenge.identity_binding().is_none());
        assert!(challenge.client_info().is_empty());
        assert!(!challenge.set_identity_token(b"token").unwrap());
    }

    #[test]
    fn request_id_from_every_variant() {
        let variants = [
            ContentIdVariant::WebmKeyId(WebmKeyId {
                request_id: Some(b"W".to_vec()),
                ..Default::default()
            }),
            ContentIdVariant::ExistingLicense(ExistingLicense {
                license_id: Some(LicenseIdentification {
                    request_id: Some(b"W".to_vec()),
                    ..Default::default()
                }),
                ..Default::default()
            }),
        ];
        for variant in variants {
            let envelope = challenge_envelope(&request(None, variant));
            let challenge = ChallengeMessage::decode(&envelope).unwrap();
            assert_eq!(challenge.request_id().unwrap(), RequestId::from(b"W".as_slice()));
            assert_eq!(challenge.license_type(), LicenseType::Streaming);
            assert!(matches!(challenge.content_header(), Err(InterceptError::Parse(_))));
        }
    }

    #[test]
    fn wrong_message_type_is_parse_error() {
        let mut envelope = challenge_envelope(&request(None, pssh_variant(b"R1")));
        assert!(matches!(LicenseMessage::decode(&envelope), Err(InterceptError::Parse(_))));

        envelope.message.r#type = None;
        assert!(matches!(ChallengeMessage::decode(&envelope), Err(InterceptError::Parse(_))));
    }

    #[test]
    fn license_request_id() {
        let license = License {
            id: Some(LicenseIdentification {
                request_id: Some(b"R1".to_vec()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let envelope = envelope(SignedMessage {
            r#type: Some(MessageType::License as i32),
            msg: Some(license.encode_to_vec()),
            ..Default::default()
        });
        let message = LicenseMessage::decode(&envelope).unwrap();
        assert_eq!(message.request_id().unwrap(), RequestId::from(b"R1".as_slice()));

        let mut missing = envelope.clone();
        missing.set_payload(License::default().encode_to_vec()).unwrap();
        let message = LicenseMessage::decode(&missing).unwrap();
        assert!(matches!(message.request_id(), Err(InterceptError::Parse(_))));
    }
}
