//! Random password generation.

use rand::rngs::OsRng;
use rand::Rng;
use zeroize::Zeroizing;

use crate::errors::{PasshError, Result};

const LOWER: &str = "abcdefghijklmnopqrstuvwxyz";
const UPPER: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &str = "0123456789";
const SYMBOLS: &str = "!@#$%^&*()-_=+[]{}|;:,.<>?";

/// The character set passwords are drawn from.
pub fn charset(symbols: bool) -> Vec<char> {
    let mut chars: Vec<char> = LOWER.chars().chain(UPPER.chars()).chain(DIGITS.chars()).collect();
    if symbols {
        chars.extend(SYMBOLS.chars());
    }
    chars
}

/// Generate a password of `length` characters, each drawn uniformly from
/// the OS RNG.
pub fn generate(length: usize, symbols: bool) -> Result<Zeroizing<String>> {
    if length == 0 {
        return Err(PasshError::CommandFailed(
            "password length must be at least 1".into(),
        ));
    }

    let chars = charset(symbols);
    let mut rng = OsRng;
    let password: String = (0..length)
        .map(|_| chars[rng.gen_range(0..chars.len())])
        .collect();
    Ok(Zeroizing::new(password))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn respects_length() {
        assert_eq!(generate(1, true).unwrap().len(), 1);
        assert_eq!(generate(64, true).unwrap().len(), 64);
    }

    #[test]
    fn zero_length_is_rejected() {
        assert!(generate(0, true).is_err());
    }

    #[test]
    fn no_symbols_means_alphanumeric() {
        let pw = generate(200, false).unwrap();
        assert!(pw.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn charset_sizes() {
        assert_eq!(charset(false).len(), 62);
        assert_eq!(charset(true).len(), 62 + SYMBOLS.len());
    }
}
