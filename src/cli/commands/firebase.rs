use crate::identity::consent::DEFAULT_CONSENT_WINDOW;
use crate::identity::firebase::{IDENTITY_TOOLKIT_URL, SECURE_TOKEN_URL};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_API_KEY: &str = "api-key";
pub const ARG_IDENTITY_TOOLKIT_URL: &str = "identity-toolkit-url";
pub const ARG_SECURE_TOKEN_URL: &str = "secure-token-url";
pub const ARG_GOOGLE_CLIENT_ID: &str = "google-client-id";
pub const ARG_GOOGLE_CLIENT_SECRET: &str = "google-client-secret";
pub const ARG_CONSENT_TIMEOUT: &str = "consent-timeout";

#[derive(Clone)]
pub struct Options {
    pub api_key: SecretString,
    pub identity_toolkit_url: String,
    pub secure_token_url: String,
    pub google_client_id: Option<String>,
    pub google_client_secret: Option<SecretString>,
    pub consent_timeout: u64,
}

impl std::fmt::Debug for Options {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Options")
            .field("api_key", &"***")
            .field("identity_toolkit_url", &self.identity_toolkit_url)
            .field("secure_token_url", &self.secure_token_url)
            .field("google_client_id", &self.google_client_id)
            .field("google_client_secret", &"***")
            .field("consent_timeout", &self.consent_timeout)
            .finish()
    }
}

impl Options {
    /// Parse Firebase arguments from matches.
    ///
    /// # Errors
    /// Returns an error if required arguments are missing.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let read_optional = |id: &str| -> Option<String> {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
        };

        let api_key = read_optional(ARG_API_KEY)
            .map(SecretString::from)
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --{ARG_API_KEY}"))?;

        Ok(Self {
            api_key,
            identity_toolkit_url: read_optional(ARG_IDENTITY_TOOLKIT_URL)
                .unwrap_or_else(|| IDENTITY_TOOLKIT_URL.to_string()),
            secure_token_url: read_optional(ARG_SECURE_TOKEN_URL)
                .unwrap_or_else(|| SECURE_TOKEN_URL.to_string()),
            google_client_id: read_optional(ARG_GOOGLE_CLIENT_ID),
            google_client_secret: read_optional(ARG_GOOGLE_CLIENT_SECRET).map(SecretString::from),
            consent_timeout: matches
                .get_one::<u64>(ARG_CONSENT_TIMEOUT)
                .copied()
                .unwrap_or(DEFAULT_CONSENT_WINDOW.as_secs()),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_API_KEY)
                .long(ARG_API_KEY)
                .help("Firebase Web API key")
                .env("TASKSTEER_FIREBASE_API_KEY")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_IDENTITY_TOOLKIT_URL)
                .long(ARG_IDENTITY_TOOLKIT_URL)
                .help("Identity Toolkit base URL, e.g. an emulator")
                .env("TASKSTEER_IDENTITY_TOOLKIT_URL")
                .default_value(IDENTITY_TOOLKIT_URL),
        )
        .arg(
            Arg::new(ARG_SECURE_TOKEN_URL)
                .long(ARG_SECURE_TOKEN_URL)
                .help("Secure Token service base URL, e.g. an emulator")
                .env("TASKSTEER_SECURE_TOKEN_URL")
                .default_value(SECURE_TOKEN_URL),
        )
        .arg(
            Arg::new(ARG_GOOGLE_CLIENT_ID)
                .long(ARG_GOOGLE_CLIENT_ID)
                .help("Google OAuth desktop client id (enables Google sign-in)")
                .env("TASKSTEER_GOOGLE_CLIENT_ID")
                .requires(ARG_GOOGLE_CLIENT_SECRET),
        )
        .arg(
            Arg::new(ARG_GOOGLE_CLIENT_SECRET)
                .long(ARG_GOOGLE_CLIENT_SECRET)
                .help("Google OAuth desktop client secret")
                .env("TASKSTEER_GOOGLE_CLIENT_SECRET")
                .hide_env_values(true)
                .requires(ARG_GOOGLE_CLIENT_ID),
        )
        .arg(
            Arg::new(ARG_CONSENT_TIMEOUT)
                .long(ARG_CONSENT_TIMEOUT)
                .help("Seconds to wait for the Google consent screen")
                .env("TASKSTEER_CONSENT_TIMEOUT")
                .default_value("120")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}
