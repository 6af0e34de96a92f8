use rsa::RsaPublicKey;

use drm_widevine_proto::{
    ClientIdentification, DrmCertificate, EncryptedClientIdentification, SignedDrmCertificate,
    SignedMessage, prost::Message, signed_message::MessageType,
};

use crate::constants::{ROOT_PUBLIC_KEY_E, ROOT_PUBLIC_KEY_N};
use crate::error::{CdmError, CdmResult};

use super::aes::cbc_encrypt;
use super::padding::pkcs7_pad;
use super::rsa::{oaep_sha1_encrypt, pss_sha1_verify, public_key_from_der, public_key_from_parts};

/**
    A license service certificate whose signature has been checked.

    Installing one on a session switches challenges to privacy mode: the
    client identification is sent encrypted to the certificate's key.
*/
#[derive(Debug, Clone)]
pub struct ServiceCertificate {
    certificate: DrmCertificate,
    public_key: RsaPublicKey,
}

impl ServiceCertificate {
    /**
        Parse and verify a certificate against the Widevine root key.

        Accepts either a `SignedMessage` of type SERVICE_CERTIFICATE (what a
        license server returns for a certificate request) or a bare
        `SignedDrmCertificate`.
    */
    pub fn from_bytes(raw: &[u8]) -> CdmResult<Self> {
        let root = public_key_from_parts(&ROOT_PUBLIC_KEY_N, &ROOT_PUBLIC_KEY_E)?;
        Self::from_bytes_with_root(raw, &root)
    }

    pub fn from_bytes_with_root(raw: &[u8], root: &RsaPublicKey) -> CdmResult<Self> {
        let signed = extract_signed_certificate(raw)?;

        let cert_bytes = signed
            .drm_certificate
            .as_deref()
            .ok_or(CdmError::MissingField("SignedDrmCertificate.drm_certificate"))?;
        let signature = signed
            .signature
            .as_deref()
            .ok_or(CdmError::MissingField("SignedDrmCertificate.signature"))?;
        pss_sha1_verify(root, cert_bytes, signature)?;

        let certificate = DrmCertificate::decode(cert_bytes)
            .map_err(|e| CdmError::CertificateDecode(e.to_string()))?;
        let public_key = public_key_from_der(
            certificate
                .public_key
                .as_deref()
                .ok_or(CdmError::MissingField("DrmCertificate.public_key"))?,
        )?;

        Ok(Self {
            certificate,
            public_key,
        })
    }

    pub fn provider_id(&self) -> &str {
        self.certificate.provider_id.as_deref().unwrap_or_default()
    }

    pub fn certificate(&self) -> &DrmCertificate {
        &self.certificate
    }

    /**
        Encrypt a client identification for this service.

        A fresh AES-128 key and IV encrypt the PKCS#7 padded message
        (AES-CBC); the AES key itself is wrapped with RSA-OAEP-SHA1 under the
        certificate key.
    */
    pub fn encrypt_client_id(
        &self,
        client_id: &ClientIdentification,
    ) -> CdmResult<EncryptedClientIdentification> {
        let mut privacy_key = [0u8; 16];
        let mut privacy_iv = [0u8; 16];
        let mut rng = rand::rng();
        rand::RngCore::fill_bytes(&mut rng, &mut privacy_key);
        rand::RngCore::fill_bytes(&mut rng, &mut privacy_iv);

        let padded = pkcs7_pad(&client_id.encode_to_vec(), 16);
        let ciphertext = cbc_encrypt(&privacy_key, &privacy_iv, &padded);
        let wrapped_key = oaep_sha1_encrypt(&self.public_key, &privacy_key)?;

        Ok(EncryptedClientIdentification {
            provider_id: self.certificate.provider_id.clone(),
            service_certificate_serial_number: self.certificate.serial_number.clone(),
            encrypted_client_id: Some(ciphertext),
            encrypted_client_id_iv: Some(privacy_iv.to_vec()),
            encrypted_privacy_key: Some(wrapped_key),
        })
    }
}

fn extract_signed_certificate(data: &[u8]) -> CdmResult<SignedDrmCertificate> {
    if let Ok(message) = SignedMessage::decode(data)
        && message.r#type == Some(MessageType::ServiceCertificate as i32)
        && let Some(msg) = &message.msg
    {
        return SignedDrmCertificate::decode(msg.as_slice())
            .map_err(|e| CdmError::CertificateDecode(e.to_string()));
    }

    SignedDrmCertificate::decode(data).map_err(|e| CdmError::CertificateDecode(e.to_string()))
}
