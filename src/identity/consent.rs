//! Interactive consent for federated sign-in.
//!
//! The desktop stand-in for a sign-in popup: the user approves access in the
//! system browser, Google redirects to a one-shot listener on the loopback
//! interface, and the authorization code is traded for a Google ID token that
//! Firebase accepts through `accounts:signInWithIdp`.

use crate::identity::{firebase::errors, ProviderError};
use crate::APP_USER_AGENT;
use anyhow::Result;
use async_trait::async_trait;
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};
use ulid::Ulid;
use url::Url;

pub const GOOGLE_AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const GOOGLE_SCOPES: &str = "openid email profile";
pub const DEFAULT_CONSENT_WINDOW: Duration = Duration::from_secs(120);

const CALLBACK_PATH: &str = "/callback";
const MAX_REQUEST_BYTES: u64 = 8192;
/// Browsers may open a connection and send nothing on it.
const REQUEST_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Credential produced by the consent flow, ready for the identity provider.
pub struct FederatedCredential {
    pub id_token: SecretString,
    /// Redirect URI the credential was issued for.
    pub request_uri: Url,
}

impl fmt::Debug for FederatedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FederatedCredential")
            .field("id_token", &"***")
            .field("request_uri", &self.request_uri.as_str())
            .finish()
    }
}

/// PKCE verifier and its S256 challenge (RFC 7636).
pub struct Pkce {
    verifier: SecretString,
    challenge: String,
}

impl Pkce {
    /// 32 random bytes, base64url encoded.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        Self::from_verifier(Base64UrlUnpadded::encode_string(&bytes))
    }

    #[must_use]
    pub fn from_verifier(verifier: String) -> Self {
        let challenge = Base64UrlUnpadded::encode_string(&Sha256::digest(verifier.as_bytes()));
        Self {
            verifier: SecretString::from(verifier),
            challenge,
        }
    }

    #[must_use]
    pub fn challenge(&self) -> &str {
        &self.challenge
    }

    #[must_use]
    pub fn verifier(&self) -> &SecretString {
        &self.verifier
    }
}

impl fmt::Debug for Pkce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pkce")
            .field("verifier", &"***")
            .field("challenge", &self.challenge)
            .finish()
    }
}

/// Something that can obtain the user's consent for a federated provider.
#[async_trait]
pub trait ConsentFlow: Send + Sync {
    /// # Errors
    /// `auth/popup-closed-by-user` when the user declines or never finishes,
    /// `auth/popup-blocked` when the flow cannot be started.
    async fn authorize(&self, provider: &str) -> Result<FederatedCredential, ProviderError>;
}

/// What the browser told us when it hit the loopback listener.
#[derive(Debug, PartialEq, Eq)]
pub enum Callback {
    Code(String),
    Denied(String),
    StateMismatch,
    /// Not the callback (favicon, probes, malformed requests).
    Ignored,
}

/// Inspect a raw HTTP request received on the loopback listener.
#[must_use]
pub fn parse_callback(request: &str, expected_state: &str) -> Callback {
    let Some(target) = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
    else {
        return Callback::Ignored;
    };

    let Ok(url) = Url::parse(&format!("http://127.0.0.1{target}")) else {
        return Callback::Ignored;
    };

    if url.path() != CALLBACK_PATH {
        return Callback::Ignored;
    }

    let param = |name: &str| {
        url.query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.to_string())
    };

    if param("state").as_deref() != Some(expected_state) {
        return Callback::StateMismatch;
    }

    if let Some(error) = param("error") {
        return Callback::Denied(error);
    }

    match param("code") {
        Some(code) if !code.is_empty() => Callback::Code(code),
        _ => Callback::Denied("missing_code".to_string()),
    }
}

async fn respond<W: AsyncWrite + Unpin>(stream: &mut W, status: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    if let Err(err) = stream.write_all(response.as_bytes()).await {
        debug!("Error answering consent callback: {err}");
    }
    let _ = stream.shutdown().await;
}

fn page(message: &str) -> String {
    format!(
        "<!doctype html><html><head><meta charset=\"utf-8\" /><title>TaskSteer</title></head><body><p>{message}</p></body></html>"
    )
}

/// Read the request line and skip the headers that follow it.
async fn read_request_head<R: AsyncBufRead + Unpin>(reader: &mut R) -> std::io::Result<String> {
    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;

    let mut header = String::new();
    loop {
        header.clear();
        if reader.read_line(&mut header).await? == 0 || header.trim().is_empty() {
            break;
        }
    }

    Ok(request_line)
}

type Outcome = Result<String, ProviderError>;

/// Answer one connection. `None` when it was not the callback.
async fn serve_connection(
    stream: TcpStream,
    expected_state: &str,
) -> std::io::Result<Option<Outcome>> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader.take(MAX_REQUEST_BYTES));

    let Ok(request) = timeout(REQUEST_READ_TIMEOUT, read_request_head(&mut reader)).await else {
        debug!("closing idle consent connection");
        return Ok(None);
    };
    let request = request?;

    let outcome = match parse_callback(&request, expected_state) {
        Callback::Code(code) => {
            respond(
                &mut writer,
                "200 OK",
                &page("Signed in. Return to your terminal to continue."),
            )
            .await;
            Some(Ok(code))
        }
        Callback::Denied(reason) => {
            debug!("consent denied: {reason}");
            respond(&mut writer, "200 OK", &page("Sign-in cancelled.")).await;
            Some(Err(errors::sdk_error("popup-closed-by-user", None)))
        }
        Callback::StateMismatch => {
            respond(&mut writer, "400 Bad Request", &page("Invalid sign-in state.")).await;
            Some(Err(errors::sdk_error("invalid-auth-event", None)))
        }
        Callback::Ignored => {
            respond(&mut writer, "404 Not Found", &page("Not found.")).await;
            None
        }
    };

    Ok(outcome)
}

/// One-shot HTTP listener on `127.0.0.1` receiving the OAuth redirect.
#[derive(Debug)]
pub struct CallbackListener {
    listener: TcpListener,
    redirect_uri: Url,
}

impl CallbackListener {
    /// Bind an ephemeral loopback port.
    ///
    /// # Errors
    /// `auth/popup-blocked` if no port can be bound.
    pub async fn bind() -> Result<Self, ProviderError> {
        let listener = TcpListener::bind("127.0.0.1:0").await.map_err(|err| {
            warn!("Unable to bind consent listener: {err}");
            errors::sdk_error("popup-blocked", None)
        })?;

        let port = listener
            .local_addr()
            .map_err(|err| {
                warn!("Unable to read consent listener address: {err}");
                errors::sdk_error("popup-blocked", None)
            })?
            .port();

        let redirect_uri = Url::parse(&format!("http://127.0.0.1:{port}{CALLBACK_PATH}"))
            .map_err(|err| {
                warn!("Invalid redirect URI: {err}");
                errors::sdk_error("popup-blocked", None)
            })?;

        Ok(Self {
            listener,
            redirect_uri,
        })
    }

    #[must_use]
    pub fn redirect_uri(&self) -> &Url {
        &self.redirect_uri
    }

    /// Serve requests until the callback for `expected_state` arrives.
    ///
    /// # Errors
    /// `auth/popup-closed-by-user` if consent was denied, `auth/invalid-auth-event`
    /// on a state mismatch.
    pub async fn wait_for_code(&self, expected_state: &str) -> Result<String, ProviderError> {
        let (tx, mut rx) = mpsc::channel::<Outcome>(1);

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, peer) = accepted.map_err(|err| {
                        warn!("Consent listener failed: {err}");
                        errors::sdk_error("popup-blocked", None)
                    })?;

                    let tx = tx.clone();
                    let expected_state = expected_state.to_string();
                    tokio::spawn(async move {
                        match serve_connection(stream, &expected_state).await {
                            Ok(Some(outcome)) => {
                                let _ = tx.send(outcome).await;
                            }
                            Ok(None) => debug!("ignoring request from {peer}"),
                            Err(err) => debug!("Error reading consent request from {peer}: {err}"),
                        }
                    });
                }
                Some(outcome) = rx.recv() => return outcome,
            }
        }
    }
}

/// Called with the authorization URL; expected to bring it in front of the user.
pub type Launcher = Arc<dyn Fn(&Url) + Send + Sync>;

/// Print the URL and try the system browser.
#[must_use]
pub fn browser_launcher() -> Launcher {
    Arc::new(|url: &Url| {
        eprintln!("Continue signing in with Google in your browser:");
        eprintln!("  {url}");
        if let Err(err) = open::that(url.as_str()) {
            warn!("Unable to open browser: {err}");
        }
    })
}

/// Print the URL only.
#[must_use]
pub fn print_launcher() -> Launcher {
    Arc::new(|url: &Url| {
        eprintln!("Open this URL to continue signing in with Google:");
        eprintln!("  {url}");
    })
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    id_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenError {
    #[serde(default)]
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Google OAuth (desktop client) consent through a loopback redirect.
#[derive(Clone)]
pub struct GoogleConsent {
    client: Client,
    client_id: String,
    client_secret: SecretString,
    authorize_url: Url,
    token_url: Url,
    window: Duration,
    launcher: Launcher,
}

impl fmt::Debug for GoogleConsent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoogleConsent")
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("authorize_url", &self.authorize_url.as_str())
            .field("token_url", &self.token_url.as_str())
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}

impl GoogleConsent {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(client_id: impl Into<String>, client_secret: SecretString) -> Result<Self> {
        let client = Client::builder().user_agent(APP_USER_AGENT).build()?;

        Ok(Self {
            client,
            client_id: client_id.into(),
            client_secret,
            authorize_url: Url::parse(GOOGLE_AUTHORIZE_URL)?,
            token_url: Url::parse(GOOGLE_TOKEN_URL)?,
            window: DEFAULT_CONSENT_WINDOW,
            launcher: browser_launcher(),
        })
    }

    #[must_use]
    pub fn with_endpoints(mut self, authorize_url: Url, token_url: Url) -> Self {
        self.authorize_url = authorize_url;
        self.token_url = token_url;
        self
    }

    /// How long to wait for the user before treating the flow as abandoned.
    #[must_use]
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    #[must_use]
    pub fn with_launcher(mut self, launcher: Launcher) -> Self {
        self.launcher = launcher;
        self
    }

    #[must_use]
    pub fn authorization_url(&self, redirect_uri: &Url, state: &str, pkce: &Pkce) -> Url {
        let mut url = self.authorize_url.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", redirect_uri.as_str())
            .append_pair("response_type", "code")
            .append_pair("scope", GOOGLE_SCOPES)
            .append_pair("state", state)
            .append_pair("code_challenge", pkce.challenge())
            .append_pair("code_challenge_method", "S256")
            .append_pair("prompt", "select_account");
        url
    }

    #[instrument(skip(self, code, pkce))]
    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &Url,
        pkce: &Pkce,
    ) -> Result<SecretString, ProviderError> {
        let form = [
            ("code", code),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret()),
            ("redirect_uri", redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
            ("code_verifier", pkce.verifier().expose_secret()),
        ];

        let response = self
            .client
            .post(self.token_url.clone())
            .form(&form)
            .send()
            .await
            .map_err(|err| {
                warn!("Google token endpoint unreachable: {}", err.without_url());
                errors::network_request_failed()
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|err| {
            warn!("Error reading Google token response: {}", err.without_url());
            errors::network_request_failed()
        })?;

        if !status.is_success() {
            let detail = serde_json::from_str::<TokenError>(&body)
                .ok()
                .map(|err| err.error_description.unwrap_or(err.error));
            warn!("Google rejected authorization code: {status}");
            return Err(errors::sdk_error("internal-error", detail.as_deref()));
        }

        serde_json::from_str::<TokenResponse>(&body)
            .ok()
            .and_then(|token| token.id_token)
            .filter(|token| !token.is_empty())
            .map(SecretString::from)
            .ok_or_else(|| errors::sdk_error("internal-error", None))
    }
}

#[async_trait]
impl ConsentFlow for GoogleConsent {
    #[instrument(skip(self))]
    async fn authorize(&self, provider: &str) -> Result<FederatedCredential, ProviderError> {
        let listener = CallbackListener::bind().await?;
        let state = Ulid::new().to_string();
        let pkce = Pkce::generate();
        let url = self.authorization_url(listener.redirect_uri(), &state, &pkce);

        (self.launcher)(&url);

        let code = timeout(self.window, listener.wait_for_code(&state))
            .await
            .map_err(|_elapsed| {
                debug!("consent window of {:?} elapsed", self.window);
                errors::sdk_error("popup-closed-by-user", None)
            })??;

        let id_token = self
            .exchange_code(&code, listener.redirect_uri(), &pkce)
            .await?;

        Ok(FederatedCredential {
            id_token,
            request_uri: listener.redirect_uri().clone(),
        })
    }
}
