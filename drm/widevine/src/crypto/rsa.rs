use rsa::{
    BigUint, RsaPrivateKey, RsaPublicKey, oaep,
    pkcs1::{DecodeRsaPublicKey, EncodeRsaPublicKey},
    pss,
    traits::{Decryptor, RandomizedEncryptor},
};
use sha1::Sha1;
use signature::{RandomizedSigner, Verifier};

use crate::error::{CdmError, CdmResult};

/// PSS salt length: the SHA-1 digest size.
const PSS_SALT_LEN: usize = 20;

/**
    RSA-PSS-SHA1 signature (MGF1-SHA1, 20-byte salt) over `message`.

    `message` is the raw serialized request. The signing key hashes it
    internally, so it must not be pre-hashed.
*/
pub fn pss_sha1_sign(private_key: &RsaPrivateKey, message: &[u8]) -> CdmResult<Vec<u8>> {
    let signing_key = pss::SigningKey::<Sha1>::new_with_salt_len(private_key.clone(), PSS_SALT_LEN);
    let signature = signing_key
        .try_sign_with_rng(&mut rsa::rand_core::OsRng, message)
        .map_err(|e| CdmError::RsaOperation(e.to_string()))?;

    let bytes: Box<[u8]> = signature.into();
    Ok(bytes.into_vec())
}

/**
    Verify an RSA-PSS-SHA1 signature. Any failure, including a malformed
    signature, is [`CdmError::CertificateSignatureMismatch`].
*/
pub fn pss_sha1_verify(public_key: &RsaPublicKey, message: &[u8], signature: &[u8]) -> CdmResult<()> {
    let verifying_key =
        pss::VerifyingKey::<Sha1>::new_with_salt_len(public_key.clone(), PSS_SALT_LEN);
    let signature =
        pss::Signature::try_from(signature).map_err(|_| CdmError::CertificateSignatureMismatch)?;
    verifying_key
        .verify(message, &signature)
        .map_err(|_| CdmError::CertificateSignatureMismatch)
}

/**
    RSA-OAEP-SHA1 decryption with an empty label.
*/
pub fn oaep_sha1_decrypt(private_key: &RsaPrivateKey, ciphertext: &[u8]) -> CdmResult<Vec<u8>> {
    oaep::DecryptingKey::<Sha1>::new(private_key.clone())
        .decrypt(ciphertext)
        .map_err(|e| CdmError::RsaOperation(e.to_string()))
}

/**
    RSA-OAEP-SHA1 encryption with an empty label.
*/
pub fn oaep_sha1_encrypt(public_key: &RsaPublicKey, plaintext: &[u8]) -> CdmResult<Vec<u8>> {
    oaep::EncryptingKey::<Sha1>::new(public_key.clone())
        .encrypt_with_rng(&mut rsa::rand_core::OsRng, plaintext)
        .map_err(|e| CdmError::RsaOperation(e.to_string()))
}

/// Parse a PKCS#1 DER public key, as carried in `DrmCertificate.public_key`.
pub fn public_key_from_der(der: &[u8]) -> CdmResult<RsaPublicKey> {
    RsaPublicKey::from_pkcs1_der(der).map_err(|e| CdmError::RsaKeyParse(e.to_string()))
}

pub fn public_key_to_der(public_key: &RsaPublicKey) -> CdmResult<Vec<u8>> {
    public_key
        .to_pkcs1_der()
        .map(|der| der.as_bytes().to_vec())
        .map_err(|e| CdmError::RsaKeyParse(e.to_string()))
}

/// Build a public key from big-endian modulus and exponent bytes.
pub fn public_key_from_parts(n: &[u8], e: &[u8]) -> CdmResult<RsaPublicKey> {
    RsaPublicKey::new(BigUint::from_bytes_be(n), BigUint::from_bytes_be(e))
        .map_err(|e| CdmError::RsaKeyParse(e.to_string()))
}
