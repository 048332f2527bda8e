use std::num::NonZeroU32;

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use ring::pbkdf2;
use tracing::error;

// Parameters of credentials imported from the previous store: "<hexsalt>:<hexhash>".
const LEGACY_ITERATIONS: u32 = 1000;
const LEGACY_HASH_LEN: usize = 64;

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    if is_legacy(hash) {
        return verify_legacy(plain, hash);
    }
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

/// Legacy PBKDF2 credentials should be replaced after the next successful login.
pub fn needs_rehash(hash: &str) -> bool {
    is_legacy(hash)
}

fn is_legacy(hash: &str) -> bool {
    !hash.starts_with('$') && hash.contains(':')
}

fn verify_legacy(plain: &str, stored: &str) -> anyhow::Result<bool> {
    let (salt, digest) = stored
        .split_once(':')
        .ok_or_else(|| anyhow::anyhow!("malformed legacy credential"))?;
    let expected = hex::decode(digest)
        .map_err(|e| anyhow::anyhow!("malformed legacy credential: {e}"))?;
    if expected.len() != LEGACY_HASH_LEN {
        anyhow::bail!("malformed legacy credential: unexpected digest length");
    }
    let iterations = NonZeroU32::new(LEGACY_ITERATIONS)
        .ok_or_else(|| anyhow::anyhow!("legacy iteration count must be non-zero"))?;
    // The previous store salted with the hex text itself, not the decoded bytes.
    Ok(pbkdf2::verify(
        pbkdf2::PBKDF2_HMAC_SHA512,
        iterations,
        salt.as_bytes(),
        plain.as_bytes(),
        &expected,
    )
    .is_ok())
}
