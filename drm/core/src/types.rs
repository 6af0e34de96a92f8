use core::fmt;
use core::str::FromStr;

use crate::error::{ContentKeyError, ParseError};
use crate::utils::{eq_ignore_ascii_case, trim_ascii};

/**
    Key container kind from License.KeyContainer.KeyType.

    Protobuf value 0 has no named variant; containers carrying it are
    skipped by every key extraction path.
*/
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyType {
    Signing = 1,
    Content = 2,
    KeyControl = 3,
    OperatorSession = 4,
    Entitlement = 5,
    OemContent = 6,
}

/** Wire order; index `i` holds wire value `i + 1`. */
const KEY_TYPES: [(KeyType, &str); 6] = [
    (KeyType::Signing, "SIGNING"),
    (KeyType::Content, "CONTENT"),
    (KeyType::KeyControl, "KEY_CONTROL"),
    (KeyType::OperatorSession, "OPERATOR_SESSION"),
    (KeyType::Entitlement, "ENTITLEMENT"),
    (KeyType::OemContent, "OEM_CONTENT"),
];

impl KeyType {
    pub const fn from_u8(u: u8) -> Option<Self> {
        if u == 0 || u as usize > KEY_TYPES.len() {
            return None;
        }
        Some(KEY_TYPES[u as usize - 1].0)
    }

    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    /**
        Case-insensitive lookup of the protobuf enum name, ignoring
        surrounding ASCII whitespace.
    */
    pub const fn from_name(name: &[u8]) -> Option<Self> {
        let name = trim_ascii(name);
        let mut i = 0;
        while i < KEY_TYPES.len() {
            let (kind, label) = KEY_TYPES[i];
            if eq_ignore_ascii_case(name, label.as_bytes()) {
                return Some(kind);
            }
            i += 1;
        }
        None
    }

    pub const fn to_name(self) -> &'static str {
        KEY_TYPES[self as usize - 1].1
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_name())
    }
}

impl FromStr for KeyType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s.as_bytes()).ok_or_else(|| ParseError {
            kind: "key type",
            value: s.to_owned(),
        })
    }
}

/**
    A decryption key recovered from a license.

    `Display` prints `kid_hex:key_hex`, `Debug` prefixes the key type
    (`[CONTENT] kid_hex:key_hex`).
*/
#[derive(Clone, PartialEq, Eq)]
pub struct ContentKey {
    kid: [u8; 16],
    key: Vec<u8>,
    key_type: KeyType,
}

impl ContentKey {
    /**
        Create a [`KeyType::Content`] key.
    */
    pub fn new(kid: impl AsRef<[u8]>, key: impl AsRef<[u8]>) -> Result<Self, ContentKeyError> {
        Self::new_with_type(kid, key, KeyType::Content)
    }

    pub fn new_with_type(
        kid: impl AsRef<[u8]>,
        key: impl AsRef<[u8]>,
        key_type: KeyType,
    ) -> Result<Self, ContentKeyError> {
        let kid_bytes: &[u8] = kid.as_ref();
        let kid: [u8; 16] = kid_bytes
            .try_into()
            .map_err(|_| ContentKeyError::InvalidKidLength(kid_bytes.len()))?;
        let key: &[u8] = key.as_ref();
        if key.is_empty() {
            return Err(ContentKeyError::EmptyKey);
        }
        Ok(Self {
            kid,
            key: key.to_vec(),
            key_type,
        })
    }

    /**
        Build a key from a raw key-container ID, normalising it with [`normalize_kid`].
    */
    pub fn from_container(
        raw_kid: &[u8],
        key: Vec<u8>,
        key_type: KeyType,
    ) -> Result<Self, ContentKeyError> {
        if key.is_empty() {
            return Err(ContentKeyError::EmptyKey);
        }
        Ok(Self {
            kid: normalize_kid(raw_kid),
            key,
            key_type,
        })
    }

    pub fn kid(&self) -> [u8; 16] {
        self.kid
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    pub fn is_content(&self) -> bool {
        self.key_type == KeyType::Content
    }

    pub fn kid_hex(&self) -> String {
        hex::encode(self.kid)
    }

    pub fn key_hex(&self) -> String {
        hex::encode(&self.key)
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kid_hex(), self.key_hex())
    }
}

impl fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}:{}", self.key_type, self.kid_hex(), self.key_hex())
    }
}

/**
    Parse `kid_hex:key_hex`. The key type defaults to [`KeyType::Content`].
*/
impl FromStr for ContentKey {
    type Err = ContentKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kid_hex, key_hex) = s.split_once(':').ok_or(ContentKeyError::InvalidFormat)?;
        let kid =
            hex::decode(kid_hex.trim()).map_err(|e| ContentKeyError::InvalidHex(e.to_string()))?;
        let key =
            hex::decode(key_hex.trim()).map_err(|e| ContentKeyError::InvalidHex(e.to_string()))?;
        Self::new(kid, key)
    }
}

/**
    Normalize a key-container ID to 16 bytes.

    1. Valid UTF-8 that parses as a decimal integer becomes that integer
       as 16 big-endian bytes.
    2. Anything else is zero-padded or truncated to 16 bytes.
*/
pub fn normalize_kid(kid: &[u8]) -> [u8; 16] {
    if let Ok(s) = std::str::from_utf8(kid)
        && let Ok(n) = s.parse::<u128>()
    {
        return n.to_be_bytes();
    }

    let mut out = [0u8; 16];
    let len = kid.len().min(16);
    out[..len].copy_from_slice(&kid[..len]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn key_type_names_round_trip() {
        for value in 1u8..=6 {
            let kt = KeyType::from_u8(value).unwrap();
            assert_eq!(KeyType::from_name(kt.to_name().as_bytes()), Some(kt));
            assert_eq!(kt.to_u8(), value);
        }
        assert_eq!(KeyType::from_u8(0), None);
    }

    #[test]
    fn key_type_from_str_is_case_insensitive() {
        assert_eq!("content".parse::<KeyType>().unwrap(), KeyType::Content);
        assert_eq!(" OEM_CONTENT ".parse::<KeyType>().unwrap(), KeyType::OemContent);
        assert!("bogus".parse::<KeyType>().is_err());
    }

    #[test]
    fn content_key_formats() {
        let key = ContentKey::new(hex!("00000000000000000000000000000001"), [0xab, 0xcd]).unwrap();
        assert_eq!(key.to_string(), "00000000000000000000000000000001:abcd");
        assert_eq!(format!("{key:?}"), "[CONTENT] 00000000000000000000000000000001:abcd");
        assert!(key.is_content());
    }

    #[test]
    fn content_key_parse_round_trip() {
        let key: ContentKey = "00000000000000000000000000000001:abcdef01".parse().unwrap();
        let again: ContentKey = key.to_string().parse().unwrap();
        assert_eq!(key, again);
    }

    #[test]
    fn content_key_rejects_bad_input() {
        assert_eq!(
            ContentKey::new([0u8; 15], [1u8]).unwrap_err(),
            ContentKeyError::InvalidKidLength(15)
        );
        assert_eq!(ContentKey::new([0u8; 16], Vec::<u8>::new()).unwrap_err(), ContentKeyError::EmptyKey);
        assert_eq!(
            "00".parse::<ContentKey>().unwrap_err(),
            ContentKeyError::InvalidFormat
        );
    }

    #[test]
    fn normalize_short_kid_pads() {
        let kid = normalize_kid(&[0xAA]);
        assert_eq!(kid[0], 0xAA);
        assert!(kid[1..].iter().all(|b| *b == 0));
    }

    #[test]
    fn normalize_decimal_kid() {
        assert_eq!(normalize_kid(b"1"), hex!("00000000000000000000000000000001"));
    }

    #[test]
    fn normalize_long_kid_truncates() {
        let raw = [0x11u8; 20];
        assert_eq!(normalize_kid(&raw), [0x11u8; 16]);
    }

    #[test]
    fn container_key_uses_normalized_kid() {
        let key = ContentKey::from_container(&[0xAA], vec![1, 2, 3], KeyType::Content).unwrap();
        assert_eq!(key.kid(), normalize_kid(&[0xAA]));
    }
}
