use aes::{
    Aes128,
    cipher::{BlockDecrypt, BlockEncrypt, KeyInit, generic_array::GenericArray},
};
use cmac::{Cmac, Mac};

use crate::error::{CdmError, CdmResult};

const BLOCK: usize = 16;

/**
    Single AES-128-CMAC computation (RFC 4493).
*/
pub fn cmac(key: &[u8; 16], message: &[u8]) -> [u8; 16] {
    let mut mac = <Cmac<Aes128> as Mac>::new(key.into());
    mac.update(message);
    mac.finalize().into_bytes().into()
}

/**
    AES-128-CBC decryption without unpadding.

    `iv` must be one block and `ciphertext` a non-empty multiple of the
    block size; anything else is [`CdmError::AesCbcInvalidInput`].
*/
pub fn cbc_decrypt(key: &[u8; 16], iv: &[u8], ciphertext: &[u8]) -> CdmResult<Vec<u8>> {
    let iv: [u8; BLOCK] = iv
        .try_into()
        .map_err(|_| CdmError::AesCbcInvalidInput(format!("IV is {} bytes", iv.len())))?;
    if ciphertext.is_empty() || !ciphertext.len().is_multiple_of(BLOCK) {
        return Err(CdmError::AesCbcInvalidInput(format!(
            "ciphertext is {} bytes, not a non-empty multiple of {BLOCK}",
            ciphertext.len()
        )));
    }

    let cipher = Aes128::new(key.into());
    let mut plaintext = Vec::with_capacity(ciphertext.len());
    let mut prev = GenericArray::from(iv);

    for chunk in ciphertext.chunks_exact(BLOCK) {
        let mut block = GenericArray::clone_from_slice(chunk);
        cipher.decrypt_block(&mut block);
        plaintext.extend(block.iter().zip(prev.iter()).map(|(b, p)| b ^ p));
        prev = GenericArray::clone_from_slice(chunk);
    }

    Ok(plaintext)
}

/**
    AES-128-CBC encryption of already padded plaintext.
*/
pub fn cbc_encrypt(key: &[u8; 16], iv: &[u8; 16], plaintext: &[u8]) -> Vec<u8> {
    debug_assert!(
        plaintext.len().is_multiple_of(BLOCK),
        "plaintext must be padded to the AES block size"
    );

    let cipher = Aes128::new(key.into());
    let mut ciphertext = Vec::with_capacity(plaintext.len());
    let mut prev = GenericArray::from(*iv);

    for chunk in plaintext.chunks_exact(BLOCK) {
        for (p, c) in prev.iter_mut().zip(chunk) {
            *p ^= c;
        }
        cipher.encrypt_block(&mut prev);
        ciphertext.extend_from_slice(&prev);
    }

    ciphertext
}
