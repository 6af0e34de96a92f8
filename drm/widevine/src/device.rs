use rsa::{
    RsaPrivateKey, RsaPublicKey,
    pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey},
};

use drm_widevine_proto::{ClientIdentification, prost::Message};

use crate::crypto::rsa::{oaep_sha1_decrypt, pss_sha1_sign};
use crate::error::{CdmError, CdmResult};
use crate::types::{DeviceType, SecurityLevel};

const WVD_MAGIC: [u8; 3] = *b"WVD";
const WVD_VERSION: u8 = 2;

/**
    Identity used to sign challenges and unwrap session keys.

    Persisted as a WVD v2 blob:

    ```text
    "WVD" | version=2 | device_type | security_level | flags
    u16be len | RSA private key (PKCS#1 DER)
    u16be len | ClientIdentification
    ```
*/
#[derive(Debug, Clone)]
pub struct Device {
    pub device_type: DeviceType,
    pub security_level: SecurityLevel,
    private_key: RsaPrivateKey,
    client_id: ClientIdentification,
}

impl Device {
    pub fn new(
        device_type: DeviceType,
        security_level: SecurityLevel,
        private_key: RsaPrivateKey,
        client_id: ClientIdentification,
    ) -> Self {
        Self {
            device_type,
            security_level,
            private_key,
            client_id,
        }
    }

    pub fn private_key(&self) -> &RsaPrivateKey {
        &self.private_key
    }

    pub fn public_key(&self) -> RsaPublicKey {
        self.private_key.to_public_key()
    }

    pub fn client_id(&self) -> &ClientIdentification {
        &self.client_id
    }

    /**
        Device certificate chain from the client identification, or an
        empty slice when none was provisioned.
    */
    pub fn token(&self) -> &[u8] {
        self.client_id.token.as_deref().unwrap_or_default()
    }

    /** RSA-PSS-SHA1 over `message`. */
    pub fn sign(&self, message: &[u8]) -> CdmResult<Vec<u8>> {
        pss_sha1_sign(&self.private_key, message)
    }

    pub fn decrypt_session_key(&self, encrypted: &[u8]) -> CdmResult<[u8; 16]> {
        let plain = oaep_sha1_decrypt(&self.private_key, encrypted)?;
        let len = plain.len();
        <[u8; 16]>::try_from(plain).map_err(|_| CdmError::InvalidSessionKeyLength(len))
    }

    /**
        Load a device file that is either the raw blob or its base64 text.
    */
    pub fn load(data: &[u8]) -> CdmResult<Self> {
        if data.starts_with(&WVD_MAGIC) {
            Self::from_bytes(data)
        } else {
            Self::from_base64(data.trim_ascii())
        }
    }

    pub fn from_base64(text: impl AsRef<[u8]>) -> CdmResult<Self> {
        let raw = data_encoding::BASE64
            .decode(text.as_ref())
            .map_err(|e| CdmError::InvalidBase64(e.to_string()))?;
        Self::from_bytes(raw)
    }

    pub fn from_bytes(data: impl AsRef<[u8]>) -> CdmResult<Self> {
        let mut blob = Blob(data.as_ref());

        if blob.take(WVD_MAGIC.len()).ok() != Some(&WVD_MAGIC[..]) {
            return Err(CdmError::WvdBadMagic);
        }
        let version = blob.byte()?;
        if version != WVD_VERSION {
            return Err(CdmError::WvdUnsupportedVersion(version));
        }
        let raw_type = blob.byte()?;
        let device_type = DeviceType::from_u8(raw_type).ok_or(CdmError::WvdBadDeviceType(raw_type))?;
        let raw_level = blob.byte()?;
        let security_level =
            SecurityLevel::from_u8(raw_level).ok_or(CdmError::WvdBadSecurityLevel(raw_level))?;
        let _flags = blob.byte()?;

        let private_key = RsaPrivateKey::from_pkcs1_der(blob.prefixed()?)
            .map_err(|e| CdmError::RsaKeyParse(e.to_string()))?;
        let client_id = ClientIdentification::decode(blob.prefixed()?)?;

        Ok(Self::new(device_type, security_level, private_key, client_id))
    }

    pub fn to_bytes(&self) -> CdmResult<Vec<u8>> {
        let der = self
            .private_key
            .to_pkcs1_der()
            .map_err(|e| CdmError::RsaKeyParse(e.to_string()))?;

        let mut out = WVD_MAGIC.to_vec();
        out.extend([
            WVD_VERSION,
            self.device_type.to_u8(),
            self.security_level.to_u8(),
            0,
        ]);
        push_prefixed(&mut out, der.as_bytes())?;
        push_prefixed(&mut out, &self.client_id.encode_to_vec())?;
        Ok(out)
    }

    pub fn to_base64(&self) -> CdmResult<String> {
        Ok(data_encoding::BASE64.encode(&self.to_bytes()?))
    }
}

/// Forward-only reader over a WVD blob. Every short read is `WvdTruncated`.
struct Blob<'a>(&'a [u8]);

impl<'a> Blob<'a> {
    fn take(&mut self, n: usize) -> CdmResult<&'a [u8]> {
        if self.0.len() < n {
            return Err(CdmError::WvdTruncated);
        }
        let (head, tail) = self.0.split_at(n);
        self.0 = tail;
        Ok(head)
    }

    fn byte(&mut self) -> CdmResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn prefixed(&mut self) -> CdmResult<&'a [u8]> {
        let len = u16::from_be_bytes([self.byte()?, self.byte()?]);
        self.take(len.into())
    }
}

fn push_prefixed(out: &mut Vec<u8>, field: &[u8]) -> CdmResult<()> {
    let len = u16::try_from(field.len()).map_err(|_| CdmError::WvdFieldTooLarge(field.len()))?;
    out.extend(len.to_be_bytes());
    out.extend_from_slice(field);
    Ok(())
}
