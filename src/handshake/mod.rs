//! The two-step sign-in handshake.
//!
//! An attempt moves through `Idle -> Authenticating -> Exchanging -> Resolved`.
//! The `Exchanging` stage can only be built from an [`IdentityToken`], so the
//! backend is never contacted before the identity provider produced one, and
//! the loop visits it at most once per attempt.

mod exchange;
mod intent;

pub use self::intent::{SessionIntent, ViewMode};

use crate::identity::{IdentityProvider, IdentityToken, ProviderError};
use crate::APP_USER_AGENT;
use reqwest::Client;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument};
use ulid::Ulid;
use url::Url;

/// Prefix of every backend rejection shown to the user.
pub const SERVER_ERROR_LABEL: &str = "Server Error:";

const EMPTY_TOKEN: &str = "Identity provider returned an empty token.";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {name} {value:?}: {source}")]
    InvalidUrl {
        name: &'static str,
        value: String,
        #[source]
        source: url::ParseError,
    },
    #[error("{name} must use http or https, got {scheme}")]
    UnsupportedScheme { name: &'static str, scheme: String },
    #[error("{name} has no host")]
    MissingHost { name: &'static str },
}

/// Parse an absolute `http(s)` URL with a host.
///
/// # Errors
/// Returns a [`ConfigError`] naming `name` when `value` is not usable.
pub fn parse_http_url(name: &'static str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value.trim()).map_err(|source| ConfigError::InvalidUrl {
        name,
        value: value.to_string(),
        source,
    })?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(ConfigError::UnsupportedScheme {
                name,
                scheme: scheme.to_string(),
            })
        }
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(ConfigError::MissingHost { name });
    }

    Ok(url)
}

/// Where to exchange tokens and where to send the user afterwards.
#[derive(Debug, Clone)]
pub struct HandshakeConfig {
    backend_url: Url,
    login_url: Url,
    redirect_url: Url,
}

impl HandshakeConfig {
    /// # Errors
    /// Returns a [`ConfigError`] if either URL is not an `http(s)` URL with a host.
    pub fn parse(backend_url: &str, redirect_url: &str) -> Result<Self, ConfigError> {
        let backend_url = parse_http_url("backend URL", backend_url)?;
        let redirect_url = parse_http_url("redirect URL", redirect_url)?;

        let mut login_url = backend_url.clone();
        login_url.set_query(None);
        login_url.set_fragment(None);
        login_url
            .path_segments_mut()
            .map_err(|()| ConfigError::MissingHost {
                name: "backend URL",
            })?
            .pop_if_empty()
            .push("login");

        Ok(Self {
            backend_url,
            login_url,
            redirect_url,
        })
    }

    #[must_use]
    pub fn backend_url(&self) -> &Url {
        &self.backend_url
    }

    /// `<backend>/login`.
    #[must_use]
    pub fn login_url(&self) -> &Url {
        &self.login_url
    }

    #[must_use]
    pub fn redirect_url(&self) -> &Url {
        &self.redirect_url
    }
}

/// Outcome of one attempt. Exactly one is produced per attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeResult {
    Success { destination: Url },
    ProviderError(String),
    BackendError { status: u16, body: String },
    TransportError(String),
}

impl HandshakeResult {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// The text to show the user, `None` on success.
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        match self {
            Self::Success { .. } => None,
            Self::ProviderError(message) | Self::TransportError(message) => Some(message.clone()),
            Self::BackendError { body, .. } => Some(format!("{SERVER_ERROR_LABEL} {body}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Authenticating,
    Exchanging,
    Resolved,
}

impl Phase {
    #[must_use]
    pub fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Authenticating)
                | (Self::Authenticating, Self::Exchanging | Self::Resolved)
                | (Self::Exchanging, Self::Resolved)
        )
    }
}

enum Stage<A> {
    Idle(A),
    Authenticating(A),
    Exchanging(IdentityToken),
    Resolved(HandshakeResult),
}

impl<A> Stage<A> {
    fn phase(&self) -> Phase {
        match self {
            Self::Idle(_) => Phase::Idle,
            Self::Authenticating(_) => Phase::Authenticating,
            Self::Exchanging(_) => Phase::Exchanging,
            Self::Resolved(_) => Phase::Resolved,
        }
    }
}

/// Run one attempt: `acquire` yields the token, `exchange` spends it.
async fn drive<A, E, F>(acquire: A, exchange: E, mut observe: impl FnMut(Phase)) -> HandshakeResult
where
    A: Future<Output = Result<IdentityToken, ProviderError>>,
    E: Fn(IdentityToken) -> F,
    F: Future<Output = HandshakeResult>,
{
    let mut stage = Stage::Idle(acquire);

    loop {
        let phase = stage.phase();
        observe(phase);

        stage = match stage {
            Stage::Idle(acquire) => Stage::Authenticating(acquire),
            Stage::Authenticating(acquire) => match acquire.await {
                Ok(token) if token.is_empty() => {
                    Stage::Resolved(HandshakeResult::ProviderError(EMPTY_TOKEN.to_string()))
                }
                Ok(token) => Stage::Exchanging(token),
                Err(err) => Stage::Resolved(HandshakeResult::ProviderError(err.to_string())),
            },
            Stage::Exchanging(token) => Stage::Resolved(exchange(token).await),
            Stage::Resolved(result) => return result,
        };

        debug_assert!(phase.can_advance_to(stage.phase()));
    }
}

/// Handshake client. Build one per process and reuse it for every attempt.
#[derive(Clone)]
pub struct HandshakeClient {
    config: HandshakeConfig,
    provider: Arc<dyn IdentityProvider>,
    http: Client,
}

impl std::fmt::Debug for HandshakeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandshakeClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl HandshakeClient {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: HandshakeConfig, provider: Arc<dyn IdentityProvider>) -> anyhow::Result<Self> {
        // No timeout: the exchange relies on the HTTP stack's defaults.
        let http = Client::builder()
            .user_agent(APP_USER_AGENT)
            .cookie_store(true)
            .build()?;

        Ok(Self {
            config,
            provider,
            http,
        })
    }

    #[must_use]
    pub fn config(&self) -> &HandshakeConfig {
        &self.config
    }

    /// Email/password attempt: sign in (Login) or create the account (Signup).
    #[instrument(skip(self, intent), fields(mode = ?intent.mode))]
    pub async fn submit_password(&self, intent: &SessionIntent) -> HandshakeResult {
        self.run(self.acquire_password(intent)).await
    }

    /// Federated attempt through the provider's consent flow.
    #[instrument(skip(self))]
    pub async fn submit_federated(&self, provider: &str) -> HandshakeResult {
        self.run(self.acquire_federated(provider)).await
    }

    async fn acquire_password(&self, intent: &SessionIntent) -> Result<IdentityToken, ProviderError> {
        let principal = match intent.mode {
            ViewMode::Login => {
                self.provider
                    .verify_password(&intent.email, &intent.password)
                    .await?
            }
            ViewMode::Signup => {
                self.provider
                    .create_password(&intent.email, &intent.password)
                    .await?
            }
        };

        self.provider.mint_token(&principal).await
    }

    async fn acquire_federated(&self, provider: &str) -> Result<IdentityToken, ProviderError> {
        let principal = self.provider.sign_in_federated(provider).await?;
        self.provider.mint_token(&principal).await
    }

    async fn run(
        &self,
        acquire: impl Future<Output = Result<IdentityToken, ProviderError>>,
    ) -> HandshakeResult {
        let attempt = Ulid::new();

        drive(
            acquire,
            |token| async move {
                exchange::post_token(
                    &self.http,
                    self.config.login_url(),
                    self.config.redirect_url(),
                    &token,
                )
                .await
            },
            |phase| debug!(%attempt, ?phase, "handshake"),
        )
        .await
    }
}
