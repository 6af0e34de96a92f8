use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::{Rng, RngCore};

use drm_core::{ContentHeader, ContentKey, KeyType};
use drm_widevine_proto::client_identification::NameValue;
use drm_widevine_proto::license_request::content_identification::{
    ContentIdVariant, WidevinePsshData,
};
use drm_widevine_proto::license_request::{ContentIdentification, RequestType};
use drm_widevine_proto::signed_message::MessageType;
use drm_widevine_proto::{License, LicenseRequest, SignedMessage, prost::Message};

use crate::constants::PROTOCOL_VERSION;
use crate::crypto::privacy::ServiceCertificate;
use crate::derivation::{DerivationContext, SessionKeys};
use crate::device::Device;
use crate::error::{CdmError, CdmResult};
use crate::types::{DeviceType, LicenseType};

/**
    State of one CDM session: an optional service certificate, the
    derivation contexts of challenges still waiting for a license, and the
    keys of the last parsed license.

    A session does not own the device; [`Cdm`](crate::Cdm) passes it in.
*/
#[derive(Debug)]
pub struct Session {
    number: u64,
    service_certificate: Option<ServiceCertificate>,
    contexts: HashMap<Vec<u8>, DerivationContext>,
    keys: Vec<ContentKey>,
}

impl Session {
    pub fn new(number: u64) -> Self {
        Self {
            number,
            service_certificate: None,
            contexts: HashMap::new(),
            keys: Vec::new(),
        }
    }

    pub fn number(&self) -> u64 {
        self.number
    }

    /**
        Install a verified service certificate. Later challenges carry an
        encrypted client identification instead of the plain one.
    */
    pub fn set_service_certificate(&mut self, certificate: ServiceCertificate) {
        self.service_certificate = Some(certificate);
    }

    pub fn service_certificate(&self) -> Option<&ServiceCertificate> {
        self.service_certificate.as_ref()
    }

    /**
        Build and sign a license challenge (serialized `SignedMessage`).

        `optional_parameters` are sent as `client_info` entries ahead of the
        device's own entries, in the given order.
    */
    pub fn license_challenge(
        &mut self,
        device: &Device,
        header: &ContentHeader,
        license_type: LicenseType,
        optional_parameters: &[(String, String)],
    ) -> CdmResult<Vec<u8>> {
        let request_id = generate_request_id(device.device_type, self.number);

        let mut client_id = device.client_id().clone();
        if !optional_parameters.is_empty() {
            let mut client_info: Vec<NameValue> = optional_parameters
                .iter()
                .map(|(name, value)| NameValue {
                    name: Some(name.clone()),
                    value: Some(value.clone()),
                })
                .collect();
            client_info.append(&mut client_id.client_info);
            client_id.client_info = client_info;
        }

        let (client_id, encrypted_client_id) = match &self.service_certificate {
            Some(certificate) => (None, Some(certificate.encrypt_client_id(&client_id)?)),
            None => (Some(client_id), None),
        };

        let proto_license_type: drm_widevine_proto::LicenseType = license_type.into();
        let request = LicenseRequest {
            client_id,
            content_id: Some(ContentIdentification {
                content_id_variant: Some(ContentIdVariant::WidevinePsshData(WidevinePsshData {
                    pssh_data: vec![header.init_data().to_vec()],
                    license_type: Some(proto_license_type as i32),
                    request_id: Some(request_id.clone()),
                })),
            }),
            r#type: Some(RequestType::New as i32),
            request_time: Some(unix_time()),
            key_control_nonce_deprecated: None,
            protocol_version: Some(PROTOCOL_VERSION),
            // Below 2^31 so the nonce survives a signed 32-bit round trip.
            key_control_nonce: Some(rand::rng().random_range(1..2_147_483_648u32)),
            encrypted_client_id,
        };

        let request_bytes = request.encode_to_vec();
        let signature = device.sign(&request_bytes)?;
        self.contexts
            .insert(request_id, DerivationContext::new(request_bytes.clone()));

        Ok(SignedMessage {
            r#type: Some(MessageType::LicenseRequest as i32),
            msg: Some(request_bytes),
            signature: Some(signature),
            ..Default::default()
        }
        .encode_to_vec())
    }

    /**
        Verify a license response and unwrap all of its keys.

        The license must answer a challenge built by this session. The
        derivation context for it is consumed whether or not verification
        succeeds.
    */
    pub fn parse_license(&mut self, device: &Device, raw: &[u8]) -> CdmResult<()> {
        let signed = SignedMessage::decode(raw)?;
        let message_type = signed.r#type.unwrap_or_default();
        if message_type != MessageType::License as i32 {
            return Err(CdmError::UnexpectedMessageType {
                expected: MessageType::License as i32,
                actual: message_type,
            });
        }

        let msg = signed.msg.as_deref().ok_or(CdmError::MissingField("SignedMessage.msg"))?;
        let signature = signed
            .signature
            .as_deref()
            .ok_or(CdmError::MissingField("SignedMessage.signature"))?;
        let session_key = signed
            .session_key
            .as_deref()
            .ok_or(CdmError::MissingField("SignedMessage.session_key"))?;

        let license = License::decode(msg)?;
        let request_id = license
            .id
            .as_ref()
            .and_then(|id| id.request_id.as_deref())
            .ok_or(CdmError::MissingField("LicenseIdentification.request_id"))?;
        let context = self
            .contexts
            .remove(request_id)
            .ok_or_else(|| CdmError::ContextNotFound(hex::encode(request_id)))?;

        let keys = SessionKeys::derive(&context, &device.decrypt_session_key(session_key)?);
        keys.verify_license(signed.oemcrypto_core_message.as_deref(), msg, signature)?;

        self.keys = keys.unwrap_keys(&license, None)?;
        Ok(())
    }

    /**
        Keys from the last parsed license, optionally restricted to one type.
    */
    pub fn keys(&self, filter: Option<KeyType>) -> Vec<ContentKey> {
        self.keys
            .iter()
            .filter(|k| filter.is_none_or(|wanted| k.key_type() == wanted))
            .cloned()
            .collect()
    }

    /// Number of challenges still waiting for their license.
    pub fn pending(&self) -> usize {
        self.contexts.len()
    }
}

fn unix_time() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

/**
    Android CDMs use an OEMCrypto counter block: 4 random bytes, 4 zero
    bytes, then the session number little-endian. Chrome sends 16 random
    bytes.
*/
fn generate_request_id(device_type: DeviceType, session_number: u64) -> Vec<u8> {
    let mut id = vec![0u8; 16];
    let mut rng = rand::rng();
    match device_type {
        DeviceType::Android => {
            rng.fill_bytes(&mut id[..4]);
            id[8..].copy_from_slice(&session_number.to_le_bytes());
        }
        DeviceType::Chrome => rng.fill_bytes(&mut id),
    }
    id
}
