//! Small helpers shared across modules.

use rand::RngCore as _;

/// A lowercase hex string encoding `num_bytes` of CSPRNG output.
#[must_use]
pub fn random_hex(num_bytes: usize) -> String {
    let mut bytes = vec![0_u8; num_bytes];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_hex_has_expected_length() {
        assert_eq!(random_hex(16).len(), 32);
        assert_eq!(random_hex(32).len(), 64);
    }

    #[test]
    fn random_hex_is_actually_random() {
        assert_ne!(random_hex(16), random_hex(16));
    }
}
