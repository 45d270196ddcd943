//! Map validated CLI matches to an [`Action`].
//!
//! Both URLs and the Firebase endpoints are parsed here, so a bad value stops
//! the program before any prompt is shown.

use crate::cli::actions::{federated, interactive, password, Action};
use crate::cli::commands::{self, backend, firebase};
use crate::cli::globals::{GlobalArgs, GoogleClient};
use crate::handshake::{HandshakeConfig, ViewMode};
use crate::identity::firebase::{FirebaseEndpoints, GOOGLE_PROVIDER_ID};
use anyhow::{Context, Result};
use std::time::Duration;

fn globals(matches: &clap::ArgMatches) -> Result<GlobalArgs> {
    let backend_opts = backend::Options::parse(matches)?;
    let firebase_opts = firebase::Options::parse(matches)?;

    let handshake = HandshakeConfig::parse(&backend_opts.backend_url, &backend_opts.redirect_url)?;
    let endpoints = FirebaseEndpoints::new(
        &firebase_opts.identity_toolkit_url,
        &firebase_opts.secure_token_url,
    )
    .context("invalid Firebase endpoint URL")?;

    let mut globals = GlobalArgs::new(handshake, endpoints, firebase_opts.api_key);
    globals.consent_window = Duration::from_secs(firebase_opts.consent_timeout);
    globals.open_browser = !matches.get_flag(commands::ARG_NO_BROWSER);
    globals.google = match (firebase_opts.google_client_id, firebase_opts.google_client_secret) {
        (Some(client_id), Some(client_secret)) => Some(GoogleClient {
            client_id,
            client_secret,
        }),
        _ => None,
    };

    Ok(globals)
}

/// # Errors
/// Returns an error if required arguments are missing or invalid.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let globals = globals(matches)?;

    let read_optional = |sub: &clap::ArgMatches, id: &str| -> Option<String> {
        sub.get_one::<String>(id)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    match matches.subcommand() {
        Some((commands::CMD_LOGIN, sub)) => Ok(Action::Password(password::Args {
            globals,
            mode: ViewMode::Login,
            name: None,
            email: read_optional(sub, commands::ARG_EMAIL),
        })),
        Some((commands::CMD_SIGNUP, sub)) => Ok(Action::Password(password::Args {
            globals,
            mode: ViewMode::Signup,
            name: read_optional(sub, commands::ARG_NAME),
            email: read_optional(sub, commands::ARG_EMAIL),
        })),
        Some((commands::CMD_GOOGLE, _)) => {
            anyhow::ensure!(
                globals.federated_enabled(),
                "Google sign-in needs --{} and --{}",
                firebase::ARG_GOOGLE_CLIENT_ID,
                firebase::ARG_GOOGLE_CLIENT_SECRET
            );
            Ok(Action::Federated(federated::Args {
                globals,
                provider: GOOGLE_PROVIDER_ID.to_string(),
            }))
        }
        Some((other, _)) => Err(anyhow::anyhow!("unknown subcommand: {other}")),
        None => Ok(Action::Interactive(interactive::Args { globals })),
    }
}
