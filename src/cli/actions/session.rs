use crate::cli::globals::GlobalArgs;
use crate::cli::navigator::BrowserNavigator;
use crate::form::{CredentialForm, Submission};
use crate::handshake::HandshakeClient;
use crate::identity::consent::{browser_launcher, print_launcher, GoogleConsent};
use crate::identity::firebase::FirebaseProvider;
use anyhow::{anyhow, Result};
use std::sync::Arc;
use url::Url;

/// One form wired to the handshake client for the lifetime of the process.
#[derive(Debug)]
pub struct Session {
    pub client: HandshakeClient,
    pub navigator: BrowserNavigator,
    pub form: CredentialForm,
    federated: bool,
}

impl Session {
    /// # Errors
    /// Returns an error if an HTTP client cannot be built.
    pub fn new(globals: &GlobalArgs) -> Result<Self> {
        let mut provider =
            FirebaseProvider::new(globals.api_key.clone())?.with_endpoints(globals.firebase.clone());

        if let Some(google) = &globals.google {
            let launcher = if globals.open_browser {
                browser_launcher()
            } else {
                print_launcher()
            };
            let consent = GoogleConsent::new(google.client_id.clone(), google.client_secret.clone())?
                .with_window(globals.consent_window)
                .with_launcher(launcher);
            provider = provider.with_consent(Arc::new(consent));
        }

        let client = HandshakeClient::new(globals.handshake.clone(), Arc::new(provider))?;

        Ok(Self::from_parts(
            client,
            BrowserNavigator::new(globals.open_browser),
            globals.federated_enabled(),
        ))
    }

    #[must_use]
    pub fn from_parts(client: HandshakeClient, navigator: BrowserNavigator, federated: bool) -> Self {
        Self {
            client,
            navigator,
            form: CredentialForm::new(),
            federated,
        }
    }

    #[must_use]
    pub fn federated_enabled(&self) -> bool {
        self.federated
    }
}

/// The destination of a redirected submission, or its message as an error.
///
/// # Errors
/// Returns an error for every submission that did not redirect.
pub fn outcome(submission: Submission) -> Result<Url> {
    match submission {
        Submission::Redirected(destination) => Ok(destination),
        Submission::Failed(message) | Submission::Incomplete(message) => Err(anyhow!(message)),
        Submission::Busy => Err(anyhow!("a sign-in attempt is already in progress")),
    }
}
