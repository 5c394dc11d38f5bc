//! Credentials rendered into an HTTP Basic `Authorization` header.

use std::fmt;

use base64ct::{Base64, Encoding};

use crate::error::ApiError;

/// Environment variable read by [`ApiKey::from_env`].
pub const API_KEY_ENV: &str = "PRINTNODE_API_KEY";

/// Anything that can be rendered as a `user:secret` Basic credential.
pub trait Credentials {
    /// The unencoded `user:secret` pair.
    fn to_basic(&self) -> String;

    /// Full `Authorization` header value.
    fn authorization(&self) -> String {
        format!("Basic {}", Base64::encode_string(self.to_basic().as_bytes()))
    }
}

/// An account API key. Sent as the Basic user name with an empty password.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey {
    key: String,
}

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    pub fn from_env() -> Result<Self, ApiError> {
        let key = std::env::var(API_KEY_ENV)
            .map_err(|_| ApiError::ConfigurationError(format!("{API_KEY_ENV} is not set")))?;
        if key.trim().is_empty() {
            return Err(ApiError::ConfigurationError(format!("{API_KEY_ENV} is empty")));
        }
        Ok(Self::new(key.trim()))
    }
}

impl Credentials for ApiKey {
    fn to_basic(&self) -> String {
        format!("{}:", self.key)
    }
}

// Keys never end up in logs through `{:?}`.
impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKey").field("key", &"<redacted>").finish()
    }
}

/// Email and password of an account.
#[derive(Clone, PartialEq, Eq)]
pub struct UsernamePassword {
    username: String,
    password: String,
}

impl UsernamePassword {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl Credentials for UsernamePassword {
    fn to_basic(&self) -> String {
        format!("{}:{}", self.username, self.password)
    }
}

impl fmt::Debug for UsernamePassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UsernamePassword")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
