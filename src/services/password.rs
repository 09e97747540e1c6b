//! Password hashing with transparent support for two stored formats:
//! the current bcrypt format and a legacy salted SHA-256 format left over from
//! the service's first generation of accounts. Legacy hashes are only ever
//! verified; new hashes are always bcrypt. Verification failures of any kind
//! (unknown format, malformed hash, wrong password) collapse to `false` so the
//! caller sees nothing but "wrong credentials".

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{AppError, AppResult};

type HmacSha256 = Hmac<Sha256>;

const LEGACY_METHOD: &str = "sha256";

/// A stored hash, tagged by its algorithm prefix.
#[derive(Debug, PartialEq, Eq)]
pub enum StoredHash<'a> {
    /// Current format: `$2a$` / `$2b$` / `$2y$` modular-crypt bcrypt string.
    Bcrypt(&'a str),
    /// Legacy format: `sha256$<salt>$<hexdigest>`, an HMAC-SHA256 keyed by the
    /// salt over the password.
    LegacySha256 { salt: &'a str, digest: &'a str },
}

pub fn parse_stored_hash(stored: &str) -> Option<StoredHash<'_>> {
    if stored.starts_with("$2a$") || stored.starts_with("$2b$") || stored.starts_with("$2y$") {
        return Some(StoredHash::Bcrypt(stored));
    }

    let mut parts = stored.splitn(3, '$');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(LEGACY_METHOD), Some(salt), Some(digest)) if !salt.is_empty() && !digest.is_empty() => {
            Some(StoredHash::LegacySha256 { salt, digest })
        }
        _ => None,
    }
}

/// Hash a new password in the current format.
pub fn hash_password(password: &str) -> AppResult<String> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to hash password: {}", e)))
}

/// Verify a password against a stored hash, dispatching on the hash format.
pub fn verify_password(password: &str, stored: &str) -> bool {
    match parse_stored_hash(stored) {
        Some(StoredHash::Bcrypt(hash)) => bcrypt::verify(password, hash).unwrap_or(false),
        Some(StoredHash::LegacySha256 { salt, digest }) => {
            verify_legacy(password, salt, digest)
        }
        None => false,
    }
}

fn verify_legacy(password: &str, salt: &str, digest: &str) -> bool {
    HmacSha256::new_from_slice(salt.as_bytes())
        .map(|mut mac| {
            mac.update(password.as_bytes());
            hex::encode(mac.finalize().into_bytes()).eq_ignore_ascii_case(digest)
        })
        .unwrap_or(false)
}

/// True when the stored hash should be recomputed in the current format.
pub fn needs_rehash(stored: &str) -> bool {
    !matches!(parse_stored_hash(stored), Some(StoredHash::Bcrypt(_)))
}

#[cfg(test)]
pub fn legacy_hash(password: &str, salt: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(salt.as_bytes()).unwrap();
    mac.update(password.as_bytes());
    format!("{}${}${}", LEGACY_METHOD, salt, hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    // bcrypt's minimum cost keeps tests fast; verification is cost-agnostic.
    fn fast_bcrypt(password: &str) -> String {
        bcrypt::hash(password, 4).unwrap()
    }

    #[test]
    fn bcrypt_round_trip() {
        let hash = fast_bcrypt("pw1234");
        assert!(verify_password("pw1234", &hash));
        assert!(!verify_password("pw12345", &hash));
    }

    #[test]
    fn legacy_verifies_and_is_flagged_for_rehash() {
        let stored = legacy_hash("pw1234", "somesalt");
        assert!(verify_password("pw1234", &stored));
        assert!(!verify_password("wrong", &stored));
        assert!(needs_rehash(&stored));
    }

    #[test]
    fn current_format_needs_no_rehash() {
        assert!(!needs_rehash(&fast_bcrypt("pw1234")));
    }

    #[test]
    fn unknown_formats_verify_false() {
        assert!(!verify_password("pw1234", ""));
        assert!(!verify_password("pw1234", "md5$salt$digest"));
        assert!(!verify_password("pw1234", "sha256$$"));
        assert!(!verify_password("pw1234", "plaintext"));
    }

    #[test]
    fn parse_dispatches_on_prefix() {
        assert!(matches!(
            parse_stored_hash("$2b$12$abcdefghijklmnopqrstuv"),
            Some(StoredHash::Bcrypt(_))
        ));
        assert!(matches!(
            parse_stored_hash("sha256$salt$deadbeef"),
            Some(StoredHash::LegacySha256 { .. })
        ));
        assert_eq!(parse_stored_hash("pbkdf2$salt$digest"), None);
    }
}
