//! Deterministic hashing of sorted id sets.
//!
//! The dedup build variant shares one graph between states whose id sets are
//! identical; set equality is detected by hashing. [`sha256_hex`] is the
//! collision-resistant default; [`poly_hash`] is the faster
//! non-cryptographic alternative. [`xor_hash`] and [`sum_hash`] are order-
//! insensitive helpers kept for quick diagnostics.

use sha2::{Digest, Sha256};

/// XOR of all elements.
#[must_use]
pub fn xor_hash(ids: &[u32]) -> u64 {
    ids.iter().fold(0u64, |h, &x| h ^ u64::from(x))
}

/// Sum of all elements (mod 2^64).
#[must_use]
pub fn sum_hash(ids: &[u32]) -> u64 {
    ids.iter().fold(0u64, |h, &x| h.wrapping_add(u64::from(x)))
}

/// Multiplicative polynomial hash modulo 2^61 − 1.
#[must_use]
pub fn poly_hash(ids: &[u32]) -> u64 {
    const MOD: u128 = (1 << 61) - 1;
    const P: u128 = 1_000_003;
    let mut h: u128 = 1;
    for &x in ids {
        h = (h * (P + u128::from(x))) % MOD;
    }
    h as u64
}

/// SHA-256 over the comma-terminated decimal rendering of the ids
/// (`[1, 5, 9]` hashes `"1,5,9,"`), as a lowercase hex string.
///
/// Callers pass the already-sorted id sets maintained by the automaton, so
/// equal sets always render identically.
#[must_use]
pub fn sha256_hex(ids: &[u32]) -> String {
    let mut data = String::with_capacity(ids.len() * 4);
    for &x in ids {
        data.push_str(&x.to_string());
        data.push(',');
    }
    let digest = Sha256::digest(data.as_bytes());
    let mut hex = String::with_capacity(64);
    for b in digest {
        hex.push_str(&format!("{b:02x}"));
    }
    hex
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_answer() {
        // sha256("0,1,2,")
        assert_eq!(
            sha256_hex(&[0, 1, 2]),
            "0231a1ef35e7b77dc1cc4897f44cc48672d7d58c435c1a8b703fa411e65390a2"
        );
        // sha256("") for the empty set
        assert_eq!(
            sha256_hex(&[]),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_sha256_distinguishes_concatenation() {
        // The separator keeps {12} and {1, 2} apart.
        assert_ne!(sha256_hex(&[12]), sha256_hex(&[1, 2]));
    }

    #[test]
    fn test_equal_sets_equal_hashes() {
        let a = vec![3, 17, 99, 1024];
        let b = a.clone();
        assert_eq!(sha256_hex(&a), sha256_hex(&b));
        assert_eq!(poly_hash(&a), poly_hash(&b));
    }

    #[test]
    fn test_poly_hash_is_order_sensitive_only_in_value() {
        assert_ne!(poly_hash(&[1, 2, 3]), poly_hash(&[1, 2, 4]));
        assert_ne!(poly_hash(&[]), poly_hash(&[0]));
    }

    #[test]
    fn test_xor_sum_basics() {
        assert_eq!(xor_hash(&[5, 5]), 0);
        assert_eq!(sum_hash(&[5, 5]), 10);
        assert_eq!(xor_hash(&[]), 0);
    }
}
