pub mod license_protocol;

pub use license_protocol::*;

pub use prost;

/*
    drm-core ↔ proto conversions

    These live here (rather than in drm-widevine) because the orphan rule
    requires at least one of the two types to be local to the crate that
    implements `From`. The proto types are local to this crate.
*/

use drm_core::KeyType;

type ProtoKeyType = license::key_container::KeyType;

impl From<KeyType> for ProtoKeyType {
    fn from(kt: KeyType) -> Self {
        match kt {
            KeyType::Signing => Self::Signing,
            KeyType::Content => Self::Content,
            KeyType::KeyControl => Self::KeyControl,
            KeyType::OperatorSession => Self::OperatorSession,
            KeyType::Entitlement => Self::Entitlement,
            KeyType::OemContent => Self::OemContent,
        }
    }
}

impl From<ProtoKeyType> for KeyType {
    fn from(proto: ProtoKeyType) -> Self {
        match proto {
            ProtoKeyType::Signing => Self::Signing,
            ProtoKeyType::Content => Self::Content,
            ProtoKeyType::KeyControl => Self::KeyControl,
            ProtoKeyType::OperatorSession => Self::OperatorSession,
            ProtoKeyType::Entitlement => Self::Entitlement,
            ProtoKeyType::OemContent => Self::OemContent,
        }
    }
}

/**
    Map a raw `KeyContainer.type` value to a [`KeyType`].
    Returns `None` for 0 and for values outside the enum.
*/
pub fn key_type_from_raw(raw: i32) -> Option<KeyType> {
    ProtoKeyType::try_from(raw).ok().map(KeyType::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn key_type_proto_round_trip() {
        for value in 1u8..=6 {
            let kt = KeyType::from_u8(value).unwrap();
            let proto: ProtoKeyType = kt.into();
            assert_eq!(KeyType::from(proto), kt);
        }
    }

    #[test]
    fn unknown_key_type_is_none() {
        assert_eq!(key_type_from_raw(0), None);
        assert_eq!(key_type_from_raw(42), None);
        assert_eq!(key_type_from_raw(2), Some(KeyType::Content));
    }

    #[test]
    fn content_id_oneof_round_trip() {
        use license_request::ContentIdentification;
        use license_request::content_identification::{ContentIdVariant, WidevinePsshData};

        let request = LicenseRequest {
            content_id: Some(ContentIdentification {
                content_id_variant: Some(ContentIdVariant::WidevinePsshData(WidevinePsshData {
                    pssh_data: vec![b"header".to_vec()],
                    license_type: Some(LicenseType::Streaming as i32),
                    request_id: Some(b"R1".to_vec()),
                })),
            }),
            ..Default::default()
        };
        let decoded = LicenseRequest::decode(request.encode_to_vec().as_slice()).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn signed_message_keeps_side_channel() {
        let message = SignedMessage {
            r#type: Some(signed_message::MessageType::LicenseRequest as i32),
            msg: Some(b"payload".to_vec()),
            signature: Some(vec![1, 2, 3]),
            oemcrypto_core_message: Some(b"core".to_vec()),
            ..Default::default()
        };
        let decoded = SignedMessage::decode(message.encode_to_vec().as_slice()).unwrap();
        assert_eq!(decoded.oemcrypto_core_message.as_deref(), Some(&b"core"[..]));
        assert_eq!(decoded, message);
    }
}
