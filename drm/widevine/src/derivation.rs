use drm_core::{ContentKey, KeyType};
use drm_widevine_proto::License;
use drm_widevine_proto::key_type_from_raw;

use crate::crypto::{aes, hmac, padding};
use crate::error::{CdmError, CdmResult};

const ENCRYPTION_LABEL: &[u8] = b"ENCRYPTION\x00";
const ENCRYPTION_LENGTH: [u8; 4] = [0x00, 0x00, 0x00, 0x80];
const AUTHENTICATION_LABEL: &[u8] = b"AUTHENTICATION\x00";
const AUTHENTICATION_LENGTH: [u8; 4] = [0x00, 0x00, 0x02, 0x00];

/**
    Key-derivation input for one license exchange.

    Holds the exact serialized `LicenseRequest` that was signed and sent.
    The server derives its keys from the bytes it received, so a copy
    re-encoded from a decoded message is not a substitute.
*/
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivationContext {
    request: Vec<u8>,
}

impl DerivationContext {
    pub fn new(request: impl Into<Vec<u8>>) -> Self {
        Self {
            request: request.into(),
        }
    }

    pub fn request(&self) -> &[u8] {
        &self.request
    }

    /// `"ENCRYPTION\0" || request || 00 00 00 80`
    pub fn enc_context(&self) -> Vec<u8> {
        labelled(ENCRYPTION_LABEL, &self.request, &ENCRYPTION_LENGTH)
    }

    /// `"AUTHENTICATION\0" || request || 00 00 02 00`
    pub fn mac_context(&self) -> Vec<u8> {
        labelled(AUTHENTICATION_LABEL, &self.request, &AUTHENTICATION_LENGTH)
    }
}

fn labelled(label: &[u8], request: &[u8], length: &[u8; 4]) -> Vec<u8> {
    let mut out = Vec::with_capacity(label.len() + request.len() + length.len());
    out.extend_from_slice(label);
    out.extend_from_slice(request);
    out.extend_from_slice(length);
    out
}

/**
    Keys derived from a session key with AES-128-CMAC (counter mode, the
    counter byte prefixed to the context):

      enc_key        = CMAC(k, 01 || enc_context)
      mac_key_server = CMAC(k, 01 || mac_context) || CMAC(k, 02 || mac_context)
      mac_key_client = CMAC(k, 03 || mac_context) || CMAC(k, 04 || mac_context)
*/
#[derive(Clone, PartialEq, Eq)]
pub struct SessionKeys {
    pub enc_key: [u8; 16],
    pub mac_key_server: [u8; 32],
    pub mac_key_client: [u8; 32],
}

impl SessionKeys {
    pub fn derive(context: &DerivationContext, session_key: &[u8; 16]) -> Self {
        let enc_context = context.enc_context();
        let mac_context = context.mac_context();
        let block = |counter: u8, ctx: &[u8]| {
            let mut msg = Vec::with_capacity(1 + ctx.len());
            msg.push(counter);
            msg.extend_from_slice(ctx);
            aes::cmac(session_key, &msg)
        };

        let mut mac_key_server = [0u8; 32];
        mac_key_server[..16].copy_from_slice(&block(0x01, &mac_context));
        mac_key_server[16..].copy_from_slice(&block(0x02, &mac_context));

        let mut mac_key_client = [0u8; 32];
        mac_key_client[..16].copy_from_slice(&block(0x03, &mac_context));
        mac_key_client[16..].copy_from_slice(&block(0x04, &mac_context));

        Self {
            enc_key: block(0x01, &enc_context),
            mac_key_server,
            mac_key_client,
        }
    }

    /**
        Check `SignedMessage.signature` of a license against `mac_key_server`.
    */
    pub fn verify_license(
        &self,
        side_channel: Option<&[u8]>,
        msg: &[u8],
        signature: &[u8],
    ) -> CdmResult<()> {
        hmac::verify_license(&self.mac_key_server, side_channel, msg, signature)
    }

    /**
        Unwrap one `KeyContainer.key` (AES-128-CBC under `enc_key`, PKCS#7).
    */
    pub fn unwrap_key(&self, iv: &[u8], wrapped: &[u8]) -> CdmResult<Vec<u8>> {
        let padded = aes::cbc_decrypt(&self.enc_key, iv, wrapped)?;
        padding::pkcs7_unpad(&padded, 16).map(<[u8]>::to_vec)
    }

    /**
        Unwrap the key containers of a verified license, in license order.

        With a `filter` only containers of that type are decrypted. Containers
        with an unknown type are skipped; a wanted container without IV or key
        material is an error.
    */
    pub fn unwrap_keys(&self, license: &License, filter: Option<KeyType>) -> CdmResult<Vec<ContentKey>> {
        let mut keys = Vec::new();
        for container in &license.key {
            let Some(key_type) = container.r#type.and_then(key_type_from_raw) else {
                continue;
            };
            if filter.is_some_and(|wanted| wanted != key_type) {
                continue;
            }

            let iv = container.iv.as_deref().ok_or(CdmError::MissingField("KeyContainer.iv"))?;
            let wrapped = container
                .key
                .as_deref()
                .ok_or(CdmError::MissingField("KeyContainer.key"))?;
            let key = self.unwrap_key(iv, wrapped)?;
            let kid = container.id.as_deref().unwrap_or_default();

            keys.push(ContentKey::from_container(kid, key, key_type)?);
        }
        Ok(keys)
    }
}
