//! Difficulty to target conversion and proof-of-work comparison.

/// Convert a difficulty to a 256-bit big-endian target.
///
/// Target = floor(2^256 / difficulty). A difficulty of 1 would need 257 bits
/// and saturates to 2^256 - 1, which every hash meets. A difficulty of 0 is
/// invalid and yields the all-zero target.
pub fn difficulty_to_target(difficulty: u128) -> [u8; 32] {
    match difficulty {
        0 => return [0u8; 32],
        1 => return [0xFF; 32],
        _ => {}
    }

    // Binary long division of 2^256 by the difficulty. The remainder starts
    // as the leading 1 bit and always stays below the divisor.
    let mut target = [0u8; 32];
    let mut remainder: u128 = 1;
    for bit in (0..256usize).rev() {
        let gap = difficulty - remainder;
        if remainder >= gap {
            remainder -= gap;
            target[31 - bit / 8] |= 1 << (bit % 8);
        } else {
            remainder <<= 1;
        }
    }

    target
}

/// Check if a hash meets the difficulty target.
///
/// Returns true if hash <= target, both read as big-endian numbers.
#[inline]
pub fn hash_meets_target(hash: &[u8; 32], target: &[u8; 32]) -> bool {
    for i in 0..32 {
        if hash[i] < target[i] {
            return true;
        }
        if hash[i] > target[i] {
            return false;
        }
    }
    true
}

/// Average number of guesses needed to find a valid nonce.
pub fn expected_attempts(difficulty: u128) -> f64 {
    difficulty as f64
}

/// Format an attempt count for display (e.g., "1.23M").
pub fn format_attempts(attempts: f64) -> String {
    if attempts >= 1e12 {
        format!("{:.2}T", attempts / 1e12)
    } else if attempts >= 1e9 {
        format!("{:.2}G", attempts / 1e9)
    } else if attempts >= 1e6 {
        format!("{:.2}M", attempts / 1e6)
    } else if attempts >= 1e3 {
        format!("{:.2}K", attempts / 1e3)
    } else {
        format!("{:.0}", attempts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_of_two_difficulties() {
        let target = difficulty_to_target(2);
        assert_eq!(target[0], 0x80);
        assert!(target[1..].iter().all(|b| *b == 0));

        // 2^256 / 2^8 = 2^248
        let target = difficulty_to_target(256);
        assert_eq!(target[0], 0x00);
        assert_eq!(target[1], 0x01);
        assert!(target[2..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_non_power_of_two() {
        // 3 * 0x5555...55 = 2^256 - 1
        assert_eq!(difficulty_to_target(3), [0x55; 32]);
    }

    #[test]
    fn test_edge_difficulties() {
        assert_eq!(difficulty_to_target(0), [0u8; 32]);
        assert_eq!(difficulty_to_target(1), [0xFF; 32]);

        // 2^256 / (2^128 - 1) = 2^128 + 1 with a small remainder
        let target = difficulty_to_target(u128::MAX);
        assert!(target[..15].iter().all(|b| *b == 0));
        assert_eq!(target[15], 0x01);
        assert!(target[16..31].iter().all(|b| *b == 0));
        assert_eq!(target[31], 0x01);
    }

    #[test]
    fn test_hash_meets_target() {
        let target = difficulty_to_target(256);

        let mut good_hash = [0xFF; 32];
        good_hash[0] = 0x00;
        good_hash[1] = 0x00;
        assert!(hash_meets_target(&good_hash, &target));

        // Equal to target still passes
        assert!(hash_meets_target(&target, &target));

        let mut bad_hash = [0x00; 32];
        bad_hash[1] = 0x01;
        bad_hash[31] = 0x01;
        assert!(!hash_meets_target(&bad_hash, &target));
    }

    #[test]
    fn test_format_attempts() {
        assert_eq!(format_attempts(950.0), "950");
        assert_eq!(format_attempts(1_500_000.0), "1.50M");
    }
}
