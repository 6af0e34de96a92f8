use crate::constants::WIDEVINE_SYSTEM_ID;
use crate::error::HeaderError;

const BOX_TYPE: &[u8; 4] = b"pssh";
const BOX_HEADER_LEN: usize = 32;

/**
    Content-system header carried inside a license challenge.

    License requests embed the *data* payload of a PSSH box (for Widevine a
    serialized `WidevinePsshData`). Applications sometimes hand over the full
    ISOBMFF box instead, so [`ContentHeader::parse`] accepts both and keeps
    only the init data.

    PSSH box layout:
      [0..4]    box_size: u32 big-endian
      [4..8]    box_type: "pssh"
      [8]       version: u8 (0 or 1)
      [9..12]   flags: u24
      [12..28]  system_id: 16 bytes
      if version == 1:
        [28..32]  key_id_count: u32 big-endian
        [32..]    key_ids: key_id_count * 16 bytes
      [..]      data_size: u32 big-endian
      [..]      data: data_size bytes
*/
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentHeader {
    system_id: [u8; 16],
    init_data: Vec<u8>,
}

impl ContentHeader {
    /**
        Wrap raw Widevine init data.
    */
    pub fn from_init_data(init_data: impl Into<Vec<u8>>) -> Self {
        Self {
            system_id: WIDEVINE_SYSTEM_ID,
            init_data: init_data.into(),
        }
    }

    /**
        Parse a header that is either a complete PSSH box or bare init data.
    */
    pub fn parse(bytes: &[u8]) -> Result<Self, HeaderError> {
        if bytes.is_empty() {
            return Err(HeaderError::Empty);
        }
        if looks_like_box(bytes) {
            return parse_box(bytes);
        }
        Ok(Self::from_init_data(bytes))
    }

    /**
        Parse a base64-encoded header (box or init data).
    */
    pub fn from_base64(encoded: &str) -> Result<Self, HeaderError> {
        let bytes = data_encoding::BASE64
            .decode(encoded.trim().as_bytes())
            .map_err(|e| HeaderError::InvalidBase64(format!("content header: {e}")))?;
        Self::parse(&bytes)
    }

    /**
        DRM system the header belongs to (Widevine for bare init data).
    */
    pub fn system_id(&self) -> [u8; 16] {
        self.system_id
    }

    /**
        Returns `true` when the header targets Widevine.
    */
    pub fn is_widevine(&self) -> bool {
        self.system_id == WIDEVINE_SYSTEM_ID
    }

    /**
        The init data that goes into the license request.
    */
    pub fn init_data(&self) -> &[u8] {
        &self.init_data
    }
}

fn looks_like_box(bytes: &[u8]) -> bool {
    bytes.len() >= BOX_HEADER_LEN && &bytes[4..8] == BOX_TYPE
}

fn parse_box(bytes: &[u8]) -> Result<ContentHeader, HeaderError> {
    let box_size = read_u32_be(bytes, 0) as usize;
    if box_size > bytes.len() || box_size < BOX_HEADER_LEN {
        return Err(malformed("box_size does not match input length"));
    }
    let body = &bytes[..box_size];

    let version = body[8];
    if version > 1 {
        return Err(malformed(&format!("unsupported version {version}")));
    }

    let mut system_id = [0u8; 16];
    system_id.copy_from_slice(&body[12..28]);

    let mut offset = 28;
    if version == 1 {
        let kid_count = read_u32_be(body, offset) as usize;
        offset = kid_count
            .checked_mul(16)
            .and_then(|len| len.checked_add(offset + 4))
            .ok_or_else(|| malformed("key_id_count overflow"))?;
    }

    if offset + 4 > body.len() {
        return Err(malformed("truncated data_size"));
    }
    let data_size = read_u32_be(body, offset) as usize;
    offset += 4;

    if offset + data_size != body.len() {
        return Err(malformed("data_size does not match box_size"));
    }

    Ok(ContentHeader {
        system_id,
        init_data: body[offset..].to_vec(),
    })
}

fn read_u32_be(data: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

fn malformed(msg: &str) -> HeaderError {
    HeaderError::Malformed(msg.into())
}
