use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use regex::Regex;
use tracing::{error, warn};

use crate::error::{AppError, AppResult};

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

/// Emails are compared and stored trimmed and lowercased.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Normalised registration email, or `InvalidInput` when it has no `local@domain.tld` shape.
pub fn registration_email(raw: &str) -> AppResult<String> {
    let email = normalize_email(raw);
    if !EMAIL_RE.is_match(&email) {
        warn!(email = %email, "invalid email");
        return Err(AppError::InvalidInput("Invalid email".into()));
    }
    Ok(email)
}

fn argon2_failure(step: &'static str, e: password_hash::Error) -> anyhow::Error {
    error!(error = %e, step, "argon2 failure");
    anyhow::anyhow!("{step}: {e}")
}

/// PHC string with a fresh random salt.
pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|phc| phc.to_string())
        .map_err(|e| argon2_failure("hash password", e))
}

/// `Ok(false)` on mismatch; `Err` only when the stored hash is unreadable.
pub fn verify_password(plain: &str, stored: &str) -> anyhow::Result<bool> {
    let parsed =
        PasswordHash::new(stored).map_err(|e| argon2_failure("parse stored password hash", e))?;
    match Argon2::default().verify_password(plain.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => Err(argon2_failure("verify password", e)),
    }
}
