//! Firebase Authentication over its REST surface.
//!
//! Password sign-in and sign-up go to the Identity Toolkit `accounts:*`
//! endpoints, Google sign-in exchanges a consent-flow credential through
//! `accounts:signInWithIdp`, and stale ID tokens are refreshed at the Secure
//! Token service. All calls carry the project's Web API key as `?key=`.

pub mod errors;

use crate::identity::{
    consent::ConsentFlow, IdentityProvider, IdentityToken, Principal, ProviderError,
};
use crate::APP_USER_AGENT;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, instrument, warn};
use url::{form_urlencoded, Url};

pub const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com";
pub const SECURE_TOKEN_URL: &str = "https://securetoken.googleapis.com";
pub const GOOGLE_PROVIDER_ID: &str = "google.com";

/// Cached ID tokens closer than this to expiry are refreshed before use.
pub const TOKEN_REFRESH_BUFFER: Duration = Duration::from_secs(30);

const DEFAULT_EXPIRES_IN: u64 = 3600;

/// Base URLs of the two Firebase services; overridable for emulators and tests.
#[derive(Debug, Clone)]
pub struct FirebaseEndpoints {
    pub identity_toolkit: Url,
    pub secure_token: Url,
}

impl FirebaseEndpoints {
    /// # Errors
    /// Returns an error if either base URL does not parse.
    pub fn new(identity_toolkit: &str, secure_token: &str) -> Result<Self> {
        Ok(Self {
            identity_toolkit: Url::parse(identity_toolkit)?,
            secure_token: Url::parse(secure_token)?,
        })
    }

    /// The public Google endpoints.
    ///
    /// # Errors
    /// Never fails in practice; the constants are absolute URLs.
    pub fn production() -> Result<Self> {
        Self::new(IDENTITY_TOOLKIT_URL, SECURE_TOKEN_URL)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    id_token: String,
    #[serde(default)]
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    id_token: String,
    #[serde(default)]
    expires_in: Option<String>,
}

/// ID tokens never outlive an hour; longer claims are clamped.
fn parse_expires_in(value: Option<&str>) -> Duration {
    Duration::from_secs(
        value
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map_or(DEFAULT_EXPIRES_IN, |secs| secs.min(DEFAULT_EXPIRES_IN)),
    )
}

impl SignInResponse {
    fn into_principal(self) -> Result<Principal, ProviderError> {
        // signInWithIdp reports some failures in a 200 body.
        if let Some(message) = self.error_message.as_deref() {
            return Err(errors::from_server_message(message));
        }
        let expires_in = parse_expires_in(self.expires_in.as_deref());
        Ok(Principal::new(
            self.local_id,
            self.email,
            self.id_token,
            self.refresh_token,
            expires_in,
        ))
    }
}

/// [`IdentityProvider`] backed by a Firebase project.
#[derive(Clone)]
pub struct FirebaseProvider {
    client: Client,
    api_key: SecretString,
    endpoints: FirebaseEndpoints,
    consent: Option<Arc<dyn ConsentFlow>>,
}

impl std::fmt::Debug for FirebaseProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirebaseProvider")
            .field("api_key", &"***")
            .field("endpoints", &self.endpoints)
            .field("consent", &self.consent.is_some())
            .finish_non_exhaustive()
    }
}

impl FirebaseProvider {
    /// Build a provider for the project owning `api_key`.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(api_key: SecretString) -> Result<Self> {
        let client = Client::builder().user_agent(APP_USER_AGENT).build()?;

        Ok(Self {
            client,
            api_key,
            endpoints: FirebaseEndpoints::production()?,
            consent: None,
        })
    }

    #[must_use]
    pub fn with_endpoints(mut self, endpoints: FirebaseEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Enable federated sign-in through `consent`.
    #[must_use]
    pub fn with_consent(mut self, consent: Arc<dyn ConsentFlow>) -> Self {
        self.consent = Some(consent);
        self
    }

    fn endpoint(&self, base: &Url, path: &str) -> Result<Url, ProviderError> {
        let raw = format!("{}/{}", base.as_str().trim_end_matches('/'), path);
        let mut url = Url::parse(&raw).map_err(|err| {
            error!("Error building Firebase URL {raw}: {err}");
            errors::sdk_error("internal-error", None)
        })?;
        url.query_pairs_mut()
            .append_pair("key", self.api_key.expose_secret());
        Ok(url)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ProviderError> {
        let response = request.send().await.map_err(|err| {
            warn!("Firebase unreachable: {}", err.without_url());
            errors::network_request_failed()
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|err| {
            warn!("Error reading Firebase response: {}", err.without_url());
            errors::network_request_failed()
        })?;

        if !status.is_success() {
            let err = errors::from_response_body(&body);
            debug!("Firebase rejected request: {} - {}", status, err);
            return Err(err);
        }

        serde_json::from_str(&body).map_err(|err| {
            error!("Error parsing Firebase response: {err}");
            errors::sdk_error("internal-error", None)
        })
    }

    async fn password_request(
        &self,
        path: &str,
        email: &str,
        password: &SecretString,
    ) -> Result<Principal, ProviderError> {
        let url = self.endpoint(&self.endpoints.identity_toolkit, path)?;
        let payload = json!({
            "email": email,
            "password": password.expose_secret(),
            "returnSecureToken": true,
        });

        let response: SignInResponse = self.send(self.client.post(url).json(&payload)).await?;
        response.into_principal()
    }
}

#[async_trait]
impl IdentityProvider for FirebaseProvider {
    #[instrument(skip(self, password))]
    async fn verify_password(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Principal, ProviderError> {
        self.password_request("v1/accounts:signInWithPassword", email, password)
            .await
    }

    #[instrument(skip(self, password))]
    async fn create_password(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Principal, ProviderError> {
        self.password_request("v1/accounts:signUp", email, password)
            .await
    }

    #[instrument(skip(self))]
    async fn sign_in_federated(&self, provider: &str) -> Result<Principal, ProviderError> {
        if provider != GOOGLE_PROVIDER_ID {
            return Err(errors::sdk_error("operation-not-allowed", None));
        }

        let Some(consent) = self.consent.as_ref() else {
            warn!("federated sign-in requested without a consent flow");
            return Err(errors::sdk_error("operation-not-allowed", None));
        };

        let credential = consent.authorize(provider).await?;

        let post_body = form_urlencoded::Serializer::new(String::new())
            .append_pair("id_token", credential.id_token.expose_secret())
            .append_pair("providerId", provider)
            .finish();

        let payload = json!({
            "postBody": post_body,
            "requestUri": credential.request_uri.as_str(),
            "returnSecureToken": true,
            "returnIdpCredential": true,
        });

        let url = self.endpoint(&self.endpoints.identity_toolkit, "v1/accounts:signInWithIdp")?;
        let response: SignInResponse = self.send(self.client.post(url).json(&payload)).await?;
        response.into_principal()
    }

    #[instrument(skip(self, principal), fields(uid = principal.uid()))]
    async fn mint_token(&self, principal: &Principal) -> Result<IdentityToken, ProviderError> {
        if principal.is_fresh(Instant::now(), TOKEN_REFRESH_BUFFER) {
            return Ok(IdentityToken::new(
                principal.id_token().expose_secret().to_string(),
            ));
        }

        debug!("cached ID token is stale, refreshing");

        let url = self.endpoint(&self.endpoints.secure_token, "v1/token")?;
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", principal.refresh_token().expose_secret()),
        ];

        let response: RefreshResponse = self.send(self.client.post(url).form(&form)).await?;
        debug!(
            "refreshed ID token, expires in {:?}",
            parse_expires_in(response.expires_in.as_deref())
        );

        Ok(IdentityToken::new(response.id_token))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::identity::consent::FederatedCredential;
    use serde_json::json;
    use std::net::TcpListener;
    use wiremock::matchers::{body_partial_json, body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn can_bind_localhost() -> bool {
        TcpListener::bind("127.0.0.1:0").is_ok()
    }

    fn provider(server: &MockServer) -> FirebaseProvider {
        FirebaseProvider::new(SecretString::from("api-key".to_string()))
            .unwrap()
            .with_endpoints(FirebaseEndpoints::new(&server.uri(), &server.uri()).unwrap())
    }

    fn password() -> SecretString {
        SecretString::from("hunter22".to_string())
    }

    struct StaticConsent;

    #[async_trait]
    impl ConsentFlow for StaticConsent {
        async fn authorize(&self, _provider: &str) -> Result<FederatedCredential, ProviderError> {
            Ok(FederatedCredential {
                id_token: SecretString::from("google-id-token".to_string()),
                request_uri: Url::parse("http://127.0.0.1:9999/callback").unwrap(),
            })
        }
    }

    struct CancelledConsent;

    #[async_trait]
    impl ConsentFlow for CancelledConsent {
        async fn authorize(&self, _provider: &str) -> Result<FederatedCredential, ProviderError> {
            Err(errors::sdk_error("popup-closed-by-user", None))
        }
    }

    #[tokio::test]
    async fn verify_password_returns_principal() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/accounts:signInWithPassword"))
            .and(query_param("key", "api-key"))
            .and(body_partial_json(json!({
                "email": "ada@example.com",
                "password": "hunter22",
                "returnSecureToken": true
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "localId": "uid-1",
                "email": "ada@example.com",
                "idToken": "id-token-1",
                "refreshToken": "refresh-1",
                "expiresIn": "3600"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let principal = provider(&server)
            .verify_password("ada@example.com", &password())
            .await
            .unwrap();

        assert_eq!(principal.uid(), "uid-1");
        assert_eq!(principal.email(), Some("ada@example.com"));
        assert_eq!(principal.id_token().expose_secret(), "id-token-1");
    }

    #[tokio::test]
    async fn verify_password_maps_rejection() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/accounts:signInWithPassword"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": { "code": 400, "message": "INVALID_LOGIN_CREDENTIALS", "errors": [] }
            })))
            .mount(&server)
            .await;

        let err = provider(&server)
            .verify_password("ada@example.com", &password())
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Firebase: Error (auth/invalid-credential).");
    }

    #[tokio::test]
    async fn create_password_surfaces_weak_password_detail() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/accounts:signUp"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {
                    "code": 400,
                    "message": "WEAK_PASSWORD : Password should be at least 6 characters"
                }
            })))
            .mount(&server)
            .await;

        let err = provider(&server)
            .create_password("ada@example.com", &SecretString::from("123".to_string()))
            .await
            .unwrap_err();

        assert_eq!(err.code(), Some("weak-password"));
        assert_eq!(
            err.to_string(),
            "Firebase: Password should be at least 6 characters (auth/weak-password)."
        );
    }

    #[tokio::test]
    async fn unreachable_provider_is_network_failure() {
        // Nothing listens on port 9 (discard) on a test host.
        let provider = FirebaseProvider::new(SecretString::from("api-key".to_string()))
            .unwrap()
            .with_endpoints(
                FirebaseEndpoints::new("http://127.0.0.1:9", "http://127.0.0.1:9").unwrap(),
            );

        let err = provider
            .verify_password("ada@example.com", &password())
            .await
            .unwrap_err();

        assert_eq!(err.code(), Some("network-request-failed"));
    }

    #[tokio::test]
    async fn mint_token_reuses_fresh_token() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/token"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let principal = Principal::new("uid", None, "cached", "refresh", Duration::from_secs(3600));
        let token = provider(&server).mint_token(&principal).await.unwrap();

        assert_eq!(token.expose(), "cached");
    }

    #[tokio::test]
    async fn mint_token_refreshes_stale_token() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/token"))
            .and(query_param("key", "api-key"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=refresh-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id_token": "fresh-token",
                "refresh_token": "refresh-2",
                "expires_in": "3600",
                "user_id": "uid"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let principal = Principal::new("uid", None, "old", "refresh-1", Duration::from_secs(10));
        let token = provider(&server).mint_token(&principal).await.unwrap();

        assert_eq!(token.expose(), "fresh-token");
    }

    #[tokio::test]
    async fn mint_token_failure_is_provider_error() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": { "code": 400, "message": "TOKEN_EXPIRED" }
            })))
            .mount(&server)
            .await;

        let principal = Principal::new("uid", None, "", "refresh-1", Duration::ZERO);
        let err = provider(&server).mint_token(&principal).await.unwrap_err();

        assert_eq!(err.code(), Some("user-token-expired"));
    }

    #[tokio::test]
    async fn google_sign_in_exchanges_consent_credential() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/accounts:signInWithIdp"))
            .and(body_partial_json(json!({
                "postBody": "id_token=google-id-token&providerId=google.com",
                "requestUri": "http://127.0.0.1:9999/callback",
                "returnSecureToken": true
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "providerId": "google.com",
                "localId": "uid-g",
                "email": "ada@gmail.com",
                "idToken": "firebase-id-token",
                "refreshToken": "refresh-g",
                "expiresIn": "3600"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let principal = provider(&server)
            .with_consent(Arc::new(StaticConsent))
            .sign_in_federated(GOOGLE_PROVIDER_ID)
            .await
            .unwrap();

        assert_eq!(principal.uid(), "uid-g");
        assert_eq!(principal.id_token().expose_secret(), "firebase-id-token");
    }

    #[tokio::test]
    async fn google_sign_in_error_in_success_body() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/accounts:signInWithIdp"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "localId": "",
                "errorMessage": "FEDERATED_USER_ID_ALREADY_LINKED"
            })))
            .mount(&server)
            .await;

        let err = provider(&server)
            .with_consent(Arc::new(StaticConsent))
            .sign_in_federated(GOOGLE_PROVIDER_ID)
            .await
            .unwrap_err();

        assert_eq!(err.code(), Some("credential-already-in-use"));
    }

    #[tokio::test]
    async fn cancelled_consent_skips_firebase() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = provider(&server)
            .with_consent(Arc::new(CancelledConsent))
            .sign_in_federated(GOOGLE_PROVIDER_ID)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Firebase: Error (auth/popup-closed-by-user).");
    }

    #[tokio::test]
    async fn unsupported_federated_provider_is_rejected() {
        let provider = FirebaseProvider::new(SecretString::from("api-key".to_string()))
            .unwrap()
            .with_consent(Arc::new(StaticConsent));

        let err = provider.sign_in_federated("github.com").await.unwrap_err();
        assert_eq!(err.code(), Some("operation-not-allowed"));

        let without_consent = FirebaseProvider::new(SecretString::from("k".to_string())).unwrap();
        let err = without_consent
            .sign_in_federated(GOOGLE_PROVIDER_ID)
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some("operation-not-allowed"));
    }

    #[test]
    fn expires_in_defaults_to_an_hour() {
        assert_eq!(parse_expires_in(None), Duration::from_secs(3600));
        assert_eq!(parse_expires_in(Some("bogus")), Duration::from_secs(3600));
        assert_eq!(parse_expires_in(Some("120")), Duration::from_secs(120));
        assert_eq!(
            parse_expires_in(Some("18446744073709551615")),
            Duration::from_secs(3600)
        );
    }

    #[tokio::test]
    async fn oversized_expires_in_is_clamped() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/accounts:signInWithPassword"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "localId": "uid-1",
                "email": "ada@example.com",
                "idToken": "id-token-1",
                "refreshToken": "refresh-1",
                "expiresIn": "18446744073709551615"
            })))
            .mount(&server)
            .await;

        let provider = provider(&server);
        let principal = provider
            .verify_password("ada@example.com", &password())
            .await
            .unwrap();
        assert!(principal.is_fresh(Instant::now(), TOKEN_REFRESH_BUFFER));

        let token = provider.mint_token(&principal).await.unwrap();
        assert_eq!(token.expose(), "id-token-1");
    }
}
