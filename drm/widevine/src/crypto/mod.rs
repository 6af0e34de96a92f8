/*!
    Protocol cryptography.

    Every primitive here is fixed by the license protocol: SHA-1 based RSA
    padding on the device key, AES-128 for derivation and key wrapping,
    HMAC-SHA256 for license authenticity.
*/

pub mod aes;
pub mod hmac;
pub mod padding;
pub mod privacy;
pub mod rsa;
