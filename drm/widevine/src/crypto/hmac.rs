use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{CdmError, CdmResult};

type HmacSha256 = Hmac<Sha256>;

fn license_mac(mac_key_server: &[u8; 32], side_channel: Option<&[u8]>, msg: &[u8]) -> HmacSha256 {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(mac_key_server)
        .expect("HMAC accepts keys of any length");
    mac.update(side_channel.unwrap_or_default());
    mac.update(msg);
    mac
}

/**
    HMAC-SHA256 over `side_channel || msg`, as a license server signs
    `SignedMessage.msg` together with `oemcrypto_core_message`.
*/
pub fn sign_license(mac_key_server: &[u8; 32], side_channel: Option<&[u8]>, msg: &[u8]) -> [u8; 32] {
    license_mac(mac_key_server, side_channel, msg)
        .finalize()
        .into_bytes()
        .into()
}

/**
    Constant-time check of a license signature. An absent side channel is
    treated as empty.
*/
pub fn verify_license(
    mac_key_server: &[u8; 32],
    side_channel: Option<&[u8]>,
    msg: &[u8],
    signature: &[u8],
) -> CdmResult<()> {
    license_mac(mac_key_server, side_channel, msg)
        .verify_slice(signature)
        .map_err(|_| CdmError::HmacMismatch)
}
