use crate::handshake::HandshakeConfig;
use crate::identity::firebase::FirebaseEndpoints;
use secrecy::SecretString;
use std::time::Duration;

/// Google OAuth desktop client credentials.
#[derive(Clone)]
pub struct GoogleClient {
    pub client_id: String,
    pub client_secret: SecretString,
}

/// Validated configuration shared by every action.
#[derive(Clone)]
pub struct GlobalArgs {
    pub handshake: HandshakeConfig,
    pub firebase: FirebaseEndpoints,
    pub api_key: SecretString,
    pub google: Option<GoogleClient>,
    pub consent_window: Duration,
    pub open_browser: bool,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(handshake: HandshakeConfig, firebase: FirebaseEndpoints, api_key: SecretString) -> Self {
        Self {
            handshake,
            firebase,
            api_key,
            google: None,
            consent_window: crate::identity::consent::DEFAULT_CONSENT_WINDOW,
            open_browser: true,
        }
    }

    #[must_use]
    pub fn federated_enabled(&self) -> bool {
        self.google.is_some()
    }
}

impl std::fmt::Debug for GlobalArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalArgs")
            .field("backend_url", &self.handshake.backend_url().as_str())
            .field("redirect_url", &self.handshake.redirect_url().as_str())
            .field("firebase", &self.firebase)
            .field("api_key", &"***")
            .field(
                "google_client_id",
                &self.google.as_ref().map(|google| google.client_id.as_str()),
            )
            .field("google_client_secret", &"***")
            .field("consent_window", &self.consent_window)
            .field("open_browser", &self.open_browser)
            .finish()
    }
}
