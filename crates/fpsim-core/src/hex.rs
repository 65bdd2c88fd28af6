//! Hex-encoded fingerprints
//!
//! Each character carries four fingerprint bits; two characters make one
//! byte of the packed form. Upper and lower case digits are both accepted.
//! Scoring works directly on the text without decoding it first.

use crate::error::{FpSimError, Result};
use crate::popcount::tanimoto_from_counts;

/// Marks a byte that is not a hex digit. Any nibble OR-ed with it stays >= 16.
const INVALID: u8 = 16;

const HEX_VALUE: [u8; 256] = build_hex_table();

const fn build_hex_table() -> [u8; 256] {
    let mut table = [INVALID; 256];
    let mut i = 0;
    while i < 10 {
        table[b'0' as usize + i] = i as u8;
        i += 1;
    }
    let mut i = 0;
    while i < 6 {
        table[b'a' as usize + i] = 10 + i as u8;
        table[b'A' as usize + i] = 10 + i as u8;
        i += 1;
    }
    table
}

#[inline(always)]
fn nibble_popcount(value: u8) -> u32 {
    (value & 0x0f).count_ones()
}

fn check_lengths(a: &[u8], b: &[u8]) -> Result<()> {
    if a.len() != b.len() {
        return Err(FpSimError::bytes(a.len(), b.len()));
    }
    Ok(())
}

fn invalid(fp: &[u8]) -> FpSimError {
    FpSimError::InvalidHex(String::from_utf8_lossy(fp).into_owned())
}

/// True if `fp` only contains hex digits.
pub fn hex_is_valid(fp: &[u8]) -> bool {
    fp.iter().fold(0u8, |acc, &c| acc | HEX_VALUE[c as usize]) < INVALID
}

/// Number of set bits encoded by a hex fingerprint.
pub fn hex_popcount(fp: &[u8]) -> Result<u32> {
    let mut seen = 0u8;
    let mut total = 0u32;
    for &c in fp {
        let value = HEX_VALUE[c as usize];
        seen |= value;
        total += nibble_popcount(value);
    }
    if seen >= INVALID {
        return Err(invalid(fp));
    }
    Ok(total)
}

fn hex_counts(a: &[u8], b: &[u8]) -> Result<(u32, u32)> {
    check_lengths(a, b)?;
    let mut seen = 0u8;
    let mut intersect = 0u32;
    let mut union = 0u32;
    for (&ca, &cb) in a.iter().zip(b) {
        let va = HEX_VALUE[ca as usize];
        let vb = HEX_VALUE[cb as usize];
        seen |= va | vb;
        intersect += nibble_popcount(va & vb);
        union += nibble_popcount(va | vb);
    }
    if seen >= INVALID {
        let culprit = if hex_is_valid(a) { b } else { a };
        return Err(invalid(culprit));
    }
    Ok((intersect, union))
}

/// Number of bits set in both hex fingerprints.
pub fn hex_intersect_popcount(a: &[u8], b: &[u8]) -> Result<u32> {
    hex_counts(a, b).map(|(intersect, _)| intersect)
}

/// Tanimoto similarity of two hex fingerprints. Two empty fingerprints score 0.0.
pub fn hex_tanimoto(a: &[u8], b: &[u8]) -> Result<f64> {
    let (intersect, union) = hex_counts(a, b)?;
    Ok(tanimoto_from_counts(intersect, union))
}

/// True when every bit of `query` is also set in `target`.
pub fn hex_contains(query: &[u8], target: &[u8]) -> Result<bool> {
    check_lengths(query, target)?;
    let mut seen = 0u8;
    let mut subset = true;
    for (&cq, &ct) in query.iter().zip(target) {
        let vq = HEX_VALUE[cq as usize];
        let vt = HEX_VALUE[ct as usize];
        seen |= vq | vt;
        if vq & vt != vq {
            subset = false;
        }
    }
    if seen >= INVALID {
        let culprit = if hex_is_valid(query) { target } else { query };
        return Err(invalid(culprit));
    }
    Ok(subset)
}

/// Decode a hex fingerprint into packed bytes.
pub fn hex_decode(fp: &str) -> Result<Vec<u8>> {
    let text = fp.as_bytes();
    if text.len() % 2 != 0 {
        return Err(FpSimError::InvalidHex(format!(
            "odd number of characters ({})",
            text.len()
        )));
    }
    text.chunks_exact(2)
        .map(|pair| {
            let hi = HEX_VALUE[pair[0] as usize];
            let lo = HEX_VALUE[pair[1] as usize];
            if (hi | lo) >= INVALID {
                Err(invalid(text))
            } else {
                Ok((hi << 4) | lo)
            }
        })
        .collect()
}

/// Encode packed bytes as lower-case hex.
pub fn hex_encode(fp: &[u8]) -> String {
    const DIGITS: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(fp.len() * 2);
    for &byte in fp {
        out.push(DIGITS[(byte >> 4) as usize] as char);
        out.push(DIGITS[(byte & 0x0f) as usize] as char);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::popcount::tanimoto;

    #[test]
    fn test_validity() {
        assert!(hex_is_valid(b"0123456789abcdefABCDEF"));
        assert!(!hex_is_valid(b"00g0"));
        assert!(hex_is_valid(b""));
    }

    #[test]
    fn test_popcount() {
        assert_eq!(hex_popcount(b"f0").unwrap(), 4);
        assert_eq!(hex_popcount(b"FFff").unwrap(), 16);
        assert!(matches!(hex_popcount(b"0x"), Err(FpSimError::InvalidHex(_))));
    }

    #[test]
    fn test_tanimoto_matches_byte_core() {
        let a = "f0c3";
        let b = "c0ff";
        let bytes_a = hex_decode(a).unwrap();
        let bytes_b = hex_decode(b).unwrap();
        assert_eq!(
            hex_tanimoto(a.as_bytes(), b.as_bytes()).unwrap(),
            tanimoto(&bytes_a, &bytes_b)
        );
        assert_eq!(hex_tanimoto(b"00", b"00").unwrap(), 0.0);
    }

    #[test]
    fn test_intersect_and_contains() {
        assert_eq!(hex_intersect_popcount(b"f0", b"30").unwrap(), 2);
        assert!(hex_contains(b"30", b"f0").unwrap());
        assert!(!hex_contains(b"31", b"f0").unwrap());
        assert!(hex_contains(b"zz", b"f0").is_err());
    }

    #[test]
    fn test_length_mismatch() {
        let err = hex_tanimoto(b"f0", b"f0f0").unwrap_err();
        assert!(matches!(err, FpSimError::SizeMismatch { unit: "bytes", .. }));
    }

    #[test]
    fn test_decode_encode() {
        let bytes = hex_decode("00FfA5").unwrap();
        assert_eq!(bytes, vec![0x00, 0xff, 0xa5]);
        assert_eq!(hex_encode(&bytes), "00ffa5");
        assert!(hex_decode("abc").is_err());
        assert!(hex_decode("zz").is_err());
    }
}
