use crate::error::{CdmError, CdmResult};

/**
    Strip PKCS#7 padding. The pad length must be 1..=block_size and every
    pad byte must equal it.
*/
pub fn pkcs7_unpad(data: &[u8], block_size: usize) -> CdmResult<&[u8]> {
    if data.is_empty() || !data.len().is_multiple_of(block_size) {
        return Err(CdmError::Pkcs7PaddingInvalid);
    }

    let pad = data[data.len() - 1] as usize;
    if pad == 0 || pad > block_size {
        return Err(CdmError::Pkcs7PaddingInvalid);
    }

    let (body, padding) = data.split_at(data.len() - pad);
    if padding.iter().any(|&b| b as usize != pad) {
        return Err(CdmError::Pkcs7PaddingInvalid);
    }
    Ok(body)
}

/// Append 1..=block_size bytes of PKCS#7 padding.
pub fn pkcs7_pad(data: &[u8], block_size: usize) -> Vec<u8> {
    let pad = block_size - (data.len() % block_size);
    let mut out = Vec::with_capacity(data.len() + pad);
    out.extend_from_slice(data);
    out.resize(data.len() + pad, pad as u8);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pad_then_unpad() {
        for len in [0usize, 1, 15, 16, 17] {
            let data = vec![0xAB; len];
            let padded = pkcs7_pad(&data, 16);
            assert!(padded.len().is_multiple_of(16));
            assert!(padded.len() > len);
            assert_eq!(pkcs7_unpad(&padded, 16).unwrap(), data.as_slice());
        }
    }

    #[test]
    fn rejects_malformed_padding() {
        let mut block = [0x04u8; 16];
        block[13] = 0x03;
        assert!(pkcs7_unpad(&block, 16).is_err());
        assert!(pkcs7_unpad(&[0u8; 16], 16).is_err());
        assert!(pkcs7_unpad(&[0x11u8; 16], 16).is_err());
        assert!(pkcs7_unpad(&[0x01u8; 15], 16).is_err());
    }
}
