//! Split and combine
//!
//! One random polynomial of degree k−1 per secret byte, with the secret
//! byte as its constant term; share i is the vector of evaluations at
//! x = i. Combining k shares interpolates each byte back at x = 0.

use crate::gf256::{interpolate_at_zero, poly_eval};
use crate::ShamirError;
use rand::RngCore;
use zeroize::{Zeroize, Zeroizing};

/// Secrets are always 256-bit encryption keys.
pub const SECRET_LEN: usize = 32;

/// One evaluation of the share polynomials.
///
/// Indices are 1-based and never zero — evaluating at zero would leak
/// the secret itself.
#[derive(Clone, PartialEq, Eq, Zeroize)]
pub struct Share {
    pub index: u8,
    pub payload: [u8; SECRET_LEN],
}

// Payload bytes stay out of Debug output and logs.
impl std::fmt::Debug for Share {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Share")
            .field("index", &self.index)
            .field("payload", &"[redacted]")
            .finish()
    }
}

/// Split `secret` into `total` shares, any `threshold` of which combine
/// back to it.
pub fn split(
    secret: &[u8; SECRET_LEN],
    threshold: u8,
    total: u8,
) -> Result<Vec<Share>, ShamirError> {
    if threshold < 2 {
        return Err(ShamirError::InvalidInput(
            "threshold must be at least 2".into(),
        ));
    }
    if threshold > total {
        return Err(ShamirError::InvalidInput(format!(
            "threshold {} exceeds share count {}",
            threshold, total
        )));
    }

    let mut rng = rand::thread_rng();
    let mut shares: Vec<Share> = (1..=total)
        .map(|index| Share {
            index,
            payload: [0u8; SECRET_LEN],
        })
        .collect();

    let mut coefficients = Zeroizing::new(vec![0u8; threshold as usize]);
    for (byte_idx, &secret_byte) in secret.iter().enumerate() {
        coefficients[0] = secret_byte;
        rng.fill_bytes(&mut coefficients[1..]);

        for share in &mut shares {
            share.payload[byte_idx] = poly_eval(&coefficients, share.index);
        }
    }

    Ok(shares)
}

/// Reconstruct the secret from at least `threshold` distinct shares.
///
/// Fails with [`ShamirError::InsufficientShares`] below the threshold and
/// [`ShamirError::InvalidInput`] on duplicate or zero indices. The
/// returned secret is zeroized on drop.
pub fn combine(
    shares: &[Share],
    threshold: u8,
) -> Result<Zeroizing<[u8; SECRET_LEN]>, ShamirError> {
    if shares.len() < threshold as usize {
        return Err(ShamirError::InsufficientShares {
            got: shares.len(),
            need: threshold as usize,
        });
    }

    let mut seen = [false; 256];
    for share in shares {
        if share.index == 0 {
            return Err(ShamirError::InvalidInput("share index zero".into()));
        }
        if seen[share.index as usize] {
            return Err(ShamirError::InvalidInput(format!(
                "duplicate share index {}",
                share.index
            )));
        }
        seen[share.index as usize] = true;
    }

    // Only the first k shares participate; extras are redundant.
    let used = &shares[..threshold as usize];

    let mut secret = Zeroizing::new([0u8; SECRET_LEN]);
    let mut points = Zeroizing::new(vec![(0u8, 0u8); used.len()]);
    for byte_idx in 0..SECRET_LEN {
        for (slot, share) in points.iter_mut().zip(used) {
            *slot = (share.index, share.payload[byte_idx]);
        }
        secret[byte_idx] = interpolate_at_zero(&points);
    }

    Ok(secret)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_secret() -> [u8; SECRET_LEN] {
        let mut s = [0u8; SECRET_LEN];
        for (i, b) in s.iter_mut().enumerate() {
            *b = (i * 7 + 3) as u8;
        }
        s
    }

    #[test]
    fn test_split_and_combine_3_of_5() {
        let secret = test_secret();
        let shares = split(&secret, 3, 5).unwrap();
        assert_eq!(shares.len(), 5);

        let recovered = combine(&shares[0..3], 3).unwrap();
        assert_eq!(*recovered, secret);

        let recovered = combine(&shares[2..5], 3).unwrap();
        assert_eq!(*recovered, secret);

        let picked = [shares[0].clone(), shares[2].clone(), shares[4].clone()];
        let recovered = combine(&picked, 3).unwrap();
        assert_eq!(*recovered, secret);
    }

    #[test]
    fn test_any_subset_of_size_k() {
        let secret = test_secret();
        let shares = split(&secret, 2, 4).unwrap();

        for i in 0..4 {
            for j in (i + 1)..4 {
                let pair = [shares[i].clone(), shares[j].clone()];
                assert_eq!(*combine(&pair, 2).unwrap(), secret);
            }
        }
    }

    #[test]
    fn test_extra_shares_are_harmless() {
        let secret = test_secret();
        let shares = split(&secret, 3, 6).unwrap();
        let recovered = combine(&shares, 3).unwrap();
        assert_eq!(*recovered, secret);
    }

    #[test]
    fn test_below_threshold_fails() {
        let shares = split(&test_secret(), 3, 5).unwrap();
        let result = combine(&shares[0..2], 3);
        assert!(matches!(
            result,
            Err(ShamirError::InsufficientShares { got: 2, need: 3 })
        ));
    }

    #[test]
    fn test_duplicate_index_rejected() {
        let shares = split(&test_secret(), 2, 3).unwrap();
        let dup = [shares[0].clone(), shares[0].clone()];
        assert!(matches!(combine(&dup, 2), Err(ShamirError::InvalidInput(_))));
    }

    #[test]
    fn test_zero_index_rejected() {
        let shares = split(&test_secret(), 2, 3).unwrap();
        let mut bad = shares[0].clone();
        bad.index = 0;
        let set = [bad, shares[1].clone()];
        assert!(matches!(combine(&set, 2), Err(ShamirError::InvalidInput(_))));
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(split(&test_secret(), 1, 3).is_err());
        assert!(split(&test_secret(), 6, 5).is_err());
    }

    #[test]
    fn test_indices_are_one_based_and_unique() {
        let shares = split(&test_secret(), 3, 15).unwrap();
        for (i, share) in shares.iter().enumerate() {
            assert_eq!(share.index, (i + 1) as u8);
        }
    }

    #[test]
    fn test_share_bytes_look_uniform() {
        // With a fixed secret, a single share byte must vary across splits —
        // k−1 shares carry no information about the secret. 256 independent
        // splits should produce well over 100 distinct values for share 1,
        // byte 0 (expected ~162 under uniformity; under ~100 is a red flag).
        let secret = test_secret();
        let mut seen = [false; 256];
        let mut distinct = 0;
        for _ in 0..256 {
            let shares = split(&secret, 3, 3).unwrap();
            let b = shares[0].payload[0] as usize;
            if !seen[b] {
                seen[b] = true;
                distinct += 1;
            }
        }
        assert!(distinct > 100, "only {} distinct share bytes", distinct);
    }

    #[test]
    fn test_debug_redacts_payload() {
        let shares = split(&test_secret(), 2, 2).unwrap();
        let rendered = format!("{:?}", shares[0]);
        assert!(rendered.contains("redacted"));
    }
}
