#![allow(clippy::doc_overindented_list_items)]

mod cdm;
mod constants;
mod derivation;
mod device;
mod error;
mod session;
mod types;

pub mod crypto;

pub mod proto {
    pub use drm_widevine_proto::prost::Message;
    pub use drm_widevine_proto::*;
}

// Re-export shared DRM types from drm-core
pub use drm_core::{ContentHeader, ContentKey, HeaderError, KeyType, WIDEVINE_SYSTEM_ID};

// Widevine-specific exports
pub use self::cdm::{Cdm, MAX_SESSIONS, SessionId};
pub use self::derivation::{DerivationContext, SessionKeys};
pub use self::device::Device;
pub use self::error::{CdmError, CdmResult};
pub use self::session::Session;
pub use self::types::{DeviceType, LicenseType, SecurityLevel};

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::OnceLock;

    use rsa::RsaPrivateKey;

    use drm_widevine_proto::client_identification::{NameValue, TokenType};
    use drm_widevine_proto::license::KeyContainer;
    use drm_widevine_proto::license::key_container::KeyType as ProtoKeyType;
    use drm_widevine_proto::license_request::content_identification::ContentIdVariant;
    use drm_widevine_proto::signed_message::MessageType;
    use drm_widevine_proto::{
        ClientIdentification, DrmCertificate, License, LicenseIdentification, LicenseRequest,
        SignedDrmCertificate, SignedMessage, prost::Message,
    };

    use crate::crypto::rsa::{oaep_sha1_encrypt, pss_sha1_sign, public_key_to_der};
    use crate::crypto::{aes, hmac, padding};
    use crate::{DerivationContext, Device, DeviceType, SecurityLevel, SessionKeys};

    pub fn test_private_key() -> &'static RsaPrivateKey {
        static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
        KEY.get_or_init(|| RsaPrivateKey::new(&mut rsa::rand_core::OsRng, 1024).unwrap())
    }

    pub fn test_device() -> &'static Device {
        static DEVICE: OnceLock<Device> = OnceLock::new();
        DEVICE.get_or_init(|| {
            let client_id = ClientIdentification {
                r#type: Some(TokenType::DrmDeviceCertificate as i32),
                token: Some(b"device-certificate".to_vec()),
                client_info: vec![
                    NameValue {
                        name: Some("company_name".into()),
                        value: Some("Example".into()),
                    },
                    NameValue {
                        name: Some("model_name".into()),
                        value: Some("Test".into()),
                    },
                ],
                ..Default::default()
            };
            Device::new(
                DeviceType::Android,
                SecurityLevel::L3,
                test_private_key().clone(),
                client_id,
            )
        })
    }

    /**
        Answer a challenge the way a license server would: wrap a random
        session key to the test device and sign the license with the keys
        derived from the received request.
    */
    pub fn license_response(
        challenge: &[u8],
        keys: &[(&[u8], &[u8], ProtoKeyType)],
        side_channel: Option<Vec<u8>>,
    ) -> Vec<u8> {
        let signed = SignedMessage::decode(challenge).unwrap();
        let request_bytes = signed.msg.unwrap();
        let request = LicenseRequest::decode(request_bytes.as_slice()).unwrap();
        let request_id = match request.content_id.unwrap().content_id_variant.unwrap() {
            ContentIdVariant::WidevinePsshData(data) => data.request_id.unwrap(),
            _ => unreachable!(),
        };

        let session_key = [0x3Cu8; 16];
        let derived = SessionKeys::derive(&DerivationContext::new(request_bytes), &session_key);
        let iv = [0x01u8; 16];
        let license = License {
            id: Some(LicenseIdentification {
                request_id: Some(request_id),
                ..Default::default()
            }),
            key: keys
                .iter()
                .map(|(kid, key, key_type)| KeyContainer {
                    id: Some(kid.to_vec()),
                    iv: Some(iv.to_vec()),
                    key: Some(aes::cbc_encrypt(&derived.enc_key, &iv, &padding::pkcs7_pad(key, 16))),
                    r#type: Some(*key_type as i32),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
        .encode_to_vec();

        let signature =
            hmac::sign_license(&derived.mac_key_server, side_channel.as_deref(), &license);
        SignedMessage {
            r#type: Some(MessageType::License as i32),
            msg: Some(license),
            signature: Some(signature.to_vec()),
            session_key: Some(
                oaep_sha1_encrypt(&test_device().public_key(), &session_key).unwrap(),
            ),
            oemcrypto_core_message: side_channel,
            ..Default::default()
        }
        .encode_to_vec()
    }

    /**
        A bare `SignedDrmCertificate` for the test key, signed by `root`.
    */
    pub fn signed_service_certificate(root: &RsaPrivateKey) -> Vec<u8> {
        let certificate = DrmCertificate {
            serial_number: Some(b"serial".to_vec()),
            public_key: Some(public_key_to_der(&test_private_key().to_public_key()).unwrap()),
            provider_id: Some("license.example.com".into()),
            ..Default::default()
        }
        .encode_to_vec();
        SignedDrmCertificate {
            signature: Some(pss_sha1_sign(root, &certificate).unwrap()),
            drm_certificate: Some(certificate),
            ..Default::default()
        }
        .encode_to_vec()
    }
}
