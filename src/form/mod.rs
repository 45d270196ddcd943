//! Credential form controller.
//!
//! Holds what the user typed, the visible error and the loading flag, and
//! turns a submission into one handshake attempt. Methods take `&self` so a
//! single form can be driven from several tasks; the state lock is only held
//! for synchronous reads and writes.

use crate::handshake::{HandshakeClient, HandshakeResult, SessionIntent};
use secrecy::{ExposeSecret, SecretString};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;
use url::Url;

pub use crate::handshake::ViewMode;

/// Performs the full redirect once the backend accepted the token.
pub trait Navigator: Send + Sync {
    fn navigate(&self, destination: &Url);
}

/// What happened to a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// An attempt is already in flight; nothing was sent.
    Busy,
    /// A required field is empty; nothing was sent.
    Incomplete(String),
    Redirected(Url),
    Failed(String),
}

/// Read-only copy of the visible form state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormSnapshot {
    pub mode: ViewMode,
    pub name: String,
    pub email: String,
    pub error: Option<String>,
    pub loading: bool,
}

struct FormState {
    mode: ViewMode,
    name: String,
    email: String,
    password: SecretString,
    error: Option<String>,
    loading: bool,
}

impl Default for FormState {
    fn default() -> Self {
        Self {
            mode: ViewMode::default(),
            name: String::new(),
            email: String::new(),
            password: SecretString::from(String::new()),
            error: None,
            loading: false,
        }
    }
}

impl FormState {
    fn intent(&self) -> Result<SessionIntent, String> {
        let name = self.name.trim();
        let email = self.email.trim();

        if self.mode == ViewMode::Signup && name.is_empty() {
            return Err("Name is required".to_string());
        }
        if email.is_empty() {
            return Err("Email is required".to_string());
        }
        if self.password.expose_secret().is_empty() {
            return Err("Password is required".to_string());
        }

        Ok(match self.mode {
            ViewMode::Login => SessionIntent::login(email, self.password.clone()),
            ViewMode::Signup => SessionIntent::signup(name, email, self.password.clone()),
        })
    }
}

/// Clears `loading` when dropped, whichever way the attempt ends.
struct LoadingGuard<'a> {
    form: &'a CredentialForm,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.form.lock().loading = false;
    }
}

#[derive(Default)]
pub struct CredentialForm {
    state: Mutex<FormState>,
}

impl std::fmt::Debug for CredentialForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("CredentialForm")
            .field(&self.snapshot())
            .finish()
    }
}

impl CredentialForm {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FormState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_name(&self, name: impl Into<String>) {
        self.lock().name = name.into();
    }

    pub fn set_email(&self, email: impl Into<String>) {
        self.lock().email = email.into();
    }

    pub fn set_password(&self, password: SecretString) {
        self.lock().password = password;
    }

    /// Switch between Login and Signup. Clears the error, keeps the fields.
    pub fn toggle_mode(&self) -> ViewMode {
        let mut state = self.lock();
        state.mode = state.mode.toggled();
        state.error = None;
        state.mode
    }

    #[must_use]
    pub fn mode(&self) -> ViewMode {
        self.lock().mode
    }

    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.lock().error.clone()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.lock().loading
    }

    #[must_use]
    pub fn snapshot(&self) -> FormSnapshot {
        let state = self.lock();
        FormSnapshot {
            mode: state.mode,
            name: state.name.clone(),
            email: state.email.clone(),
            error: state.error.clone(),
            loading: state.loading,
        }
    }

    /// Submit the email/password fields in the current mode.
    pub async fn submit_password(
        &self,
        client: &HandshakeClient,
        navigator: &dyn Navigator,
    ) -> Submission {
        let (intent, guard) = {
            let mut state = self.lock();
            if state.loading {
                debug!("submission ignored, attempt in flight");
                return Submission::Busy;
            }
            let intent = match state.intent() {
                Ok(intent) => intent,
                Err(message) => {
                    state.error = Some(message.clone());
                    return Submission::Incomplete(message);
                }
            };
            (intent, self.begin(&mut state))
        };

        let result = client.submit_password(&intent).await;
        self.resolve(result, guard, navigator)
    }

    /// Sign in through `provider`'s consent flow, e.g. `google.com`.
    pub async fn submit_federated(
        &self,
        client: &HandshakeClient,
        navigator: &dyn Navigator,
        provider: &str,
    ) -> Submission {
        let guard = {
            let mut state = self.lock();
            if state.loading {
                debug!("submission ignored, attempt in flight");
                return Submission::Busy;
            }
            self.begin(&mut state)
        };

        let result = client.submit_federated(provider).await;
        self.resolve(result, guard, navigator)
    }

    fn begin(&self, state: &mut FormState) -> LoadingGuard<'_> {
        state.loading = true;
        state.error = None;
        LoadingGuard { form: self }
    }

    fn resolve(
        &self,
        result: HandshakeResult,
        guard: LoadingGuard<'_>,
        navigator: &dyn Navigator,
    ) -> Submission {
        match result {
            HandshakeResult::Success { destination } => {
                drop(guard);
                navigator.navigate(&destination);
                Submission::Redirected(destination)
            }
            failed => {
                let message = failed.error_message().unwrap_or_default();
                self.lock().error = Some(message.clone());
                drop(guard);
                Submission::Failed(message)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::handshake::HandshakeConfig;
    use crate::identity::fixture::FixtureProvider;
    use std::net::TcpListener;
    use std::sync::Arc;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const DESTINATION: &str = "http://127.0.0.1:5500/html/index.html";

    fn can_bind_localhost() -> bool {
        TcpListener::bind("127.0.0.1:0").is_ok()
    }

    #[derive(Default)]
    struct RecordingNavigator {
        visits: Mutex<Vec<Url>>,
    }

    impl RecordingNavigator {
        fn visits(&self) -> Vec<Url> {
            self.visits.lock().unwrap().clone()
        }
    }

    impl Navigator for RecordingNavigator {
        fn navigate(&self, destination: &Url) {
            self.visits.lock().unwrap().push(destination.clone());
        }
    }

    fn client(backend: &str, provider: FixtureProvider) -> HandshakeClient {
        let config = HandshakeConfig::parse(backend, DESTINATION).unwrap();
        HandshakeClient::new(config, Arc::new(provider)).unwrap()
    }

    fn filled_form(email: &str, password: &str) -> CredentialForm {
        let form = CredentialForm::new();
        form.set_email(email);
        form.set_password(SecretString::from(password.to_string()));
        form
    }

    async fn backend(status: u16, body: &str, expected_posts: u64) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .expect(expected_posts)
            .mount(&server)
            .await;
        server
    }

    #[test]
    fn toggle_clears_error_and_keeps_fields() {
        let form = filled_form("ada@example.com", "hunter22");
        form.lock().error = Some("Firebase: Error (auth/wrong-password).".to_string());

        assert_eq!(form.toggle_mode(), ViewMode::Signup);
        assert_eq!(form.error(), None);
        assert_eq!(form.snapshot().email, "ada@example.com");

        assert_eq!(form.toggle_mode(), ViewMode::Login);
        assert_eq!(form.mode(), ViewMode::Login);
    }

    #[test]
    fn debug_hides_password() {
        let form = filled_form("ada@example.com", "pw-secret");
        assert!(!format!("{form:?}").contains("pw-secret"));
    }

    #[tokio::test]
    async fn missing_fields_make_no_calls() {
        let client = client("http://127.0.0.1:9", FixtureProvider::new());
        let navigator = RecordingNavigator::default();

        let form = filled_form("", "hunter22");
        assert_eq!(
            form.submit_password(&client, &navigator).await,
            Submission::Incomplete("Email is required".to_string())
        );
        assert_eq!(form.error().as_deref(), Some("Email is required"));

        let form = filled_form("ada@example.com", "");
        assert_eq!(
            form.submit_password(&client, &navigator).await,
            Submission::Incomplete("Password is required".to_string())
        );

        let form = filled_form("ada@example.com", "hunter22");
        form.toggle_mode();
        assert_eq!(
            form.submit_password(&client, &navigator).await,
            Submission::Incomplete("Name is required".to_string())
        );
        assert!(!form.is_loading());
        assert!(navigator.visits().is_empty());
    }

    #[tokio::test]
    async fn success_redirects_with_clean_state() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = backend(200, "", 1).await;
        let client = client(
            &server.uri(),
            FixtureProvider::new().with_account("ada@example.com", "hunter22"),
        );
        let navigator = RecordingNavigator::default();
        let form = filled_form("ada@example.com", "hunter22");
        form.lock().error = Some("stale".to_string());

        let destination = Url::parse(DESTINATION).unwrap();
        assert_eq!(
            form.submit_password(&client, &navigator).await,
            Submission::Redirected(destination.clone())
        );
        assert_eq!(navigator.visits(), vec![destination]);
        assert_eq!(form.error(), None);
        assert!(!form.is_loading());
    }

    #[tokio::test]
    async fn backend_rejection_sets_error() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = backend(401, "invalid token", 1).await;
        let client = client(
            &server.uri(),
            FixtureProvider::new().with_account("ada@example.com", "hunter22"),
        );
        let navigator = RecordingNavigator::default();
        let form = filled_form("ada@example.com", "hunter22");

        assert_eq!(
            form.submit_password(&client, &navigator).await,
            Submission::Failed("Server Error: invalid token".to_string())
        );
        assert_eq!(form.error().as_deref(), Some("Server Error: invalid token"));
        assert!(!form.is_loading());
        assert!(navigator.visits().is_empty());
    }

    #[tokio::test]
    async fn provider_rejection_sets_error() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = backend(200, "", 0).await;
        let client = client(
            &server.uri(),
            FixtureProvider::new().with_account("ada@example.com", "hunter22"),
        );
        let navigator = RecordingNavigator::default();
        let form = filled_form("ada@example.com", "wrong");

        assert_eq!(
            form.submit_password(&client, &navigator).await,
            Submission::Failed("Firebase: Error (auth/wrong-password).".to_string())
        );
        assert!(!form.is_loading());
    }

    #[tokio::test]
    async fn cancelled_consent_clears_loading() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = backend(200, "", 0).await;
        let client = client(&server.uri(), FixtureProvider::new());
        let navigator = RecordingNavigator::default();
        let form = CredentialForm::new();

        assert_eq!(
            form.submit_federated(&client, &navigator, "google.com").await,
            Submission::Failed("Firebase: Error (auth/popup-closed-by-user).".to_string())
        );
        assert!(!form.is_loading());
    }

    #[tokio::test]
    async fn loading_is_set_while_in_flight() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = backend(200, "", 1).await;
        let client = client(
            &server.uri(),
            FixtureProvider::new()
                .with_account("ada@example.com", "hunter22")
                .with_latency(Duration::from_millis(100)),
        );
        let navigator = RecordingNavigator::default();
        let form = filled_form("ada@example.com", "hunter22");

        let (submission, loading_mid_flight) = tokio::join!(
            form.submit_password(&client, &navigator),
            async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                form.is_loading()
            }
        );

        assert!(loading_mid_flight);
        assert!(matches!(submission, Submission::Redirected(_)));
        assert!(!form.is_loading());
    }

    #[tokio::test]
    async fn double_submission_posts_once() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = backend(200, "", 1).await;
        let client = client(
            &server.uri(),
            FixtureProvider::new()
                .with_account("ada@example.com", "hunter22")
                .with_latency(Duration::from_millis(50)),
        );
        let navigator = RecordingNavigator::default();
        let form = filled_form("ada@example.com", "hunter22");

        let (first, second) = tokio::join!(
            form.submit_password(&client, &navigator),
            form.submit_password(&client, &navigator)
        );

        let busy = [first, second]
            .iter()
            .filter(|submission| **submission == Submission::Busy)
            .count();
        assert_eq!(busy, 1);
        assert_eq!(navigator.visits().len(), 1);
    }
}
