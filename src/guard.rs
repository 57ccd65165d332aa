//! Steam Guard codes for accounts with a mobile authenticator.
//!
//! Codes are derived from the base64 `shared_secret` stored in the authenticator's maFile
//! and are valid for a 30 second window.

use serde::Deserialize;
use std::fmt::{Debug, Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Number of characters in a generated code
pub const CODE_LENGTH: usize = 5;

/// Length in seconds of the window a code is valid for
pub const WINDOW_SECONDS: u64 = 30;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GuardError {
    #[error("invalid shared secret: {0}")]
    Totp(#[from] another_steam_totp::Error),
    #[error("system clock is set before the unix epoch")]
    Clock,
}

pub type Result<T> = std::result::Result<T, GuardError>;

/// A generated Steam Guard code
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AuthCode(String);

impl AuthCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for AuthCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for AuthCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The base64 encoded steam guard secret
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct SharedSecret(String);

impl SharedSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        SharedSecret(secret.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Generate the code for the current system time
    ///
    /// Codes expire quickly, generate them right before they are submitted.
    pub fn auth_code(&self) -> Result<AuthCode> {
        generate_auth_code_now(&self.0)
    }

    /// Generate the code for `unix_time`
    pub fn auth_code_at(&self, unix_time: u64) -> Result<AuthCode> {
        generate_auth_code(&self.0, unix_time)
    }
}

impl Debug for SharedSecret {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("SharedSecret(..)")
    }
}

/// The counter a timestamp falls into
pub fn time_window(unix_time: u64) -> u64 {
    unix_time / WINDOW_SECONDS
}

fn unix_now() -> Result<u64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|now| now.as_secs())
        .map_err(|_| GuardError::Clock)
}

/// Generate the code for `shared_secret` at `unix_time` (seconds)
///
/// The time is passed on as an offset from the system clock, a clock tick between the two
/// reads can shift it by a second.
pub fn generate_auth_code(shared_secret: &str, unix_time: u64) -> Result<AuthCode> {
    let offset = i128::from(unix_time) - i128::from(unix_now()?);
    let offset = i64::try_from(offset).map_err(|_| GuardError::Clock)?;
    let code = another_steam_totp::generate_auth_code(shared_secret.trim(), Some(offset))?;
    Ok(AuthCode(code))
}

/// Generate the code for the current system time
pub fn generate_auth_code_now(shared_secret: &str) -> Result<AuthCode> {
    let code = another_steam_totp::generate_auth_code(shared_secret.trim(), None)?;
    Ok(AuthCode(code))
}
