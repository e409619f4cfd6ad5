//! Share wire format
//!
//! `index (1 byte) || payload (32 bytes) || CRC-32C (4 bytes, big-endian)`,
//! hex-encoded for transport inside envelopes. The checksum covers index
//! and payload and catches corruption before a bad share ever reaches
//! interpolation.

use crc::{Crc, CRC_32_ISCSI};
use zeroize::Zeroizing;

use crate::shamir::{Share, SECRET_LEN};
use crate::ShamirError;

/// Raw wire length in bytes (74 hex characters once encoded).
pub const SHARE_WIRE_LEN: usize = 1 + SECRET_LEN + 4;

const CRC32C: Crc<u32> = Crc::<u32>::new(&CRC_32_ISCSI);

/// Encode a share to its hex wire form.
pub fn encode_share(share: &Share) -> String {
    let mut raw = Zeroizing::new([0u8; SHARE_WIRE_LEN]);
    raw[0] = share.index;
    raw[1..=SECRET_LEN].copy_from_slice(&share.payload);

    let checksum = CRC32C.checksum(&raw[..=SECRET_LEN]);
    raw[SECRET_LEN + 1..].copy_from_slice(&checksum.to_be_bytes());

    hex::encode(&raw[..])
}

/// Decode a hex wire string back into a share.
///
/// Fails with [`ShamirError::CorruptShare`] when the checksum does not
/// match and [`ShamirError::InvalidInput`] on bad length, bad hex, or a
/// zero index.
pub fn decode_share(encoded: &str) -> Result<Share, ShamirError> {
    let raw = Zeroizing::new(
        hex::decode(encoded).map_err(|_| ShamirError::InvalidInput("share is not hex".into()))?,
    );
    if raw.len() != SHARE_WIRE_LEN {
        return Err(ShamirError::InvalidInput(format!(
            "share wire length {} (expected {})",
            raw.len(),
            SHARE_WIRE_LEN
        )));
    }

    let index = raw[0];
    if index == 0 {
        return Err(ShamirError::InvalidInput("share index zero".into()));
    }

    let stored = u32::from_be_bytes([
        raw[SECRET_LEN + 1],
        raw[SECRET_LEN + 2],
        raw[SECRET_LEN + 3],
        raw[SECRET_LEN + 4],
    ]);
    if CRC32C.checksum(&raw[..=SECRET_LEN]) != stored {
        return Err(ShamirError::CorruptShare { index });
    }

    let mut payload = [0u8; SECRET_LEN];
    payload.copy_from_slice(&raw[1..=SECRET_LEN]);

    Ok(Share { index, payload })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shamir::split;

    fn sample_share() -> Share {
        let mut secret = [0u8; SECRET_LEN];
        secret[0] = 0x42;
        split(&secret, 2, 3).unwrap().remove(1)
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let share = sample_share();
        let encoded = encode_share(&share);
        assert_eq!(encoded.len(), SHARE_WIRE_LEN * 2);

        let decoded = decode_share(&encoded).unwrap();
        assert_eq!(decoded.index, share.index);
        assert_eq!(decoded.payload, share.payload);
    }

    #[test]
    fn test_crc32c_known_vector() {
        // CRC-32/iSCSI of "123456789" is 0xE3069283
        assert_eq!(CRC32C.checksum(b"123456789"), 0xE306_9283);
    }

    #[test]
    fn test_payload_flip_detected() {
        let share = sample_share();
        let encoded = encode_share(&share);

        let mut raw = hex::decode(&encoded).unwrap();
        raw[5] ^= 0x10;
        let result = decode_share(&hex::encode(&raw));
        assert!(matches!(result, Err(ShamirError::CorruptShare { .. })));
    }

    #[test]
    fn test_every_single_bit_flip_detected() {
        let share = sample_share();
        let raw = hex::decode(encode_share(&share)).unwrap();

        for byte in 0..SHARE_WIRE_LEN {
            for bit in 0..8 {
                let mut mutated = raw.clone();
                mutated[byte] ^= 1 << bit;
                let result = decode_share(&hex::encode(&mutated));
                // A flip in the index byte may also surface as a zero index
                assert!(
                    result.is_err(),
                    "flip at byte {} bit {} slipped through",
                    byte,
                    bit
                );
            }
        }
    }

    #[test]
    fn test_bad_length_rejected() {
        assert!(matches!(
            decode_share("0011"),
            Err(ShamirError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_bad_hex_rejected() {
        let bad = "zz".repeat(SHARE_WIRE_LEN);
        assert!(matches!(
            decode_share(&bad),
            Err(ShamirError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_zero_index_rejected() {
        let share = sample_share();
        let mut raw = hex::decode(encode_share(&share)).unwrap();
        raw[0] = 0;
        // Recompute the checksum so only the index rule can reject it
        let crc = CRC32C.checksum(&raw[..=SECRET_LEN]);
        raw[SECRET_LEN + 1..].copy_from_slice(&crc.to_be_bytes());

        assert!(matches!(
            decode_share(&hex::encode(&raw)),
            Err(ShamirError::InvalidInput(_))
        ));
    }
}
