//! Identity provider boundary.
//!
//! The handshake never talks to an identity service directly: it is handed an
//! [`IdentityProvider`] at construction time. [`firebase::FirebaseProvider`] is
//! the production implementation. An in-memory `fixture::FixtureProvider` is
//! compiled for tests and behind the `test-support` feature.

pub mod consent;
pub mod firebase;
#[cfg(any(test, feature = "test-support"))]
pub mod fixture;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Identity acquisition or token minting failed.
///
/// `message` is provider supplied and shown to the user verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ProviderError {
    code: Option<String>,
    message: String,
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
        }
    }

    /// Machine readable code, e.g. `wrong-password`, when the provider gave one.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Short-lived bearer credential minted from a [`Principal`].
#[derive(Clone)]
pub struct IdentityToken(SecretString);

impl IdentityToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.expose_secret().trim().is_empty()
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl fmt::Debug for IdentityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("IdentityToken(***)")
    }
}

/// A signed-in user as returned by the provider.
#[derive(Clone)]
pub struct Principal {
    uid: String,
    email: Option<String>,
    id_token: SecretString,
    refresh_token: SecretString,
    expires_at: Instant,
}

impl Principal {
    pub fn new(
        uid: impl Into<String>,
        email: Option<String>,
        id_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_in: Duration,
    ) -> Self {
        let issued_at = Instant::now();
        Self {
            uid: uid.into(),
            email,
            id_token: SecretString::from(id_token.into()),
            refresh_token: SecretString::from(refresh_token.into()),
            // A lifetime the clock cannot represent counts as already expired.
            expires_at: issued_at.checked_add(expires_in).unwrap_or(issued_at),
        }
    }

    #[must_use]
    pub fn uid(&self) -> &str {
        &self.uid
    }

    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    #[must_use]
    pub fn id_token(&self) -> &SecretString {
        &self.id_token
    }

    #[must_use]
    pub fn refresh_token(&self) -> &SecretString {
        &self.refresh_token
    }

    /// True while the cached ID token stays valid for at least `buffer` past `now`.
    #[must_use]
    pub fn is_fresh(&self, now: Instant, buffer: Duration) -> bool {
        !self.id_token.expose_secret().is_empty()
            && self.expires_at.saturating_duration_since(now) > buffer
    }
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Principal")
            .field("uid", &self.uid)
            .field("email", &self.email)
            .field("id_token", &"***")
            .field("refresh_token", &"***")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Operations the handshake needs from an identity service.
///
/// Every operation reports failure as a [`ProviderError`]; none of them panic.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Sign in an existing account.
    async fn verify_password(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Principal, ProviderError>;

    /// Create a new account and sign it in.
    async fn create_password(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Principal, ProviderError>;

    /// Run the interactive consent flow for `provider` (e.g. `google.com`).
    async fn sign_in_federated(&self, provider: &str) -> Result<Principal, ProviderError>;

    /// Produce a bearer token for `principal`.
    async fn mint_token(&self, principal: &Principal) -> Result<IdentityToken, ProviderError>;
}
