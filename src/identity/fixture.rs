//! In-memory identity provider for local runs and tests.
//!
//! Errors use the same `Firebase: ... (auth/<code>).` wording as
//! [`FirebaseProvider`](super::firebase::FirebaseProvider), so callers cannot
//! tell the two apart by message.

use super::firebase::errors::sdk_error;
use super::firebase::GOOGLE_PROVIDER_ID;
use super::{IdentityProvider, IdentityToken, Principal, ProviderError};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

const MIN_PASSWORD_LEN: usize = 6;
const TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

#[derive(Debug, Default)]
pub struct FixtureProvider {
    accounts: Mutex<HashMap<String, String>>,
    federated_user: Option<String>,
    mint_failure: Option<ProviderError>,
    latency: Option<Duration>,
    calls: AtomicUsize,
}

impl FixtureProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_account(self, email: &str, password: &str) -> Self {
        self.lock_accounts()
            .insert(email.to_string(), password.to_string());
        self
    }

    /// Email of the account a completed consent flow signs in.
    /// Without one, federated sign-in behaves as if the user closed the popup.
    #[must_use]
    pub fn with_federated_user(mut self, email: &str) -> Self {
        self.federated_user = Some(email.to_string());
        self
    }

    #[must_use]
    pub fn with_mint_failure(mut self, err: ProviderError) -> Self {
        self.mint_failure = Some(err);
        self
    }

    /// Delay every operation, e.g. to keep an attempt in flight.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of provider operations invoked so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn has_account(&self, email: &str) -> bool {
        self.lock_accounts().contains_key(email)
    }

    fn lock_accounts(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.accounts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn enter(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn principal(email: &str) -> Principal {
        Principal::new(
            format!("fixture-{email}"),
            Some(email.to_string()),
            format!("fixture-token-{email}"),
            format!("fixture-refresh-{email}"),
            TOKEN_LIFETIME,
        )
    }
}

#[async_trait]
impl IdentityProvider for FixtureProvider {
    async fn verify_password(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Principal, ProviderError> {
        self.enter().await;

        match self.lock_accounts().get(email) {
            Some(stored) if stored == password.expose_secret() => Ok(Self::principal(email)),
            Some(_) => Err(sdk_error("wrong-password", None)),
            None => Err(sdk_error("user-not-found", None)),
        }
    }

    async fn create_password(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Principal, ProviderError> {
        self.enter().await;

        if !email.contains('@') {
            return Err(sdk_error("invalid-email", None));
        }
        if password.expose_secret().chars().count() < MIN_PASSWORD_LEN {
            return Err(sdk_error(
                "weak-password",
                Some("Password should be at least 6 characters"),
            ));
        }

        let mut accounts = self.lock_accounts();
        if accounts.contains_key(email) {
            return Err(sdk_error("email-already-in-use", None));
        }
        accounts.insert(email.to_string(), password.expose_secret().to_string());

        Ok(Self::principal(email))
    }

    async fn sign_in_federated(&self, provider: &str) -> Result<Principal, ProviderError> {
        self.enter().await;

        if provider != GOOGLE_PROVIDER_ID {
            return Err(sdk_error("operation-not-allowed", None));
        }

        match &self.federated_user {
            Some(email) => Ok(Self::principal(email)),
            None => Err(sdk_error("popup-closed-by-user", None)),
        }
    }

    async fn mint_token(&self, principal: &Principal) -> Result<IdentityToken, ProviderError> {
        self.enter().await;

        match &self.mint_failure {
            Some(err) => Err(err.clone()),
            None => Ok(IdentityToken::new(principal.id_token().expose_secret())),
        }
    }
}
