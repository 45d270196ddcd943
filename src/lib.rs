//! # TaskSteer sign-in
//!
//! `tasksteer-auth` is the client side of the TaskSteer login handshake. A user
//! proves who they are to Firebase Authentication (email/password or Google),
//! the resulting Firebase ID token is posted to the TaskSteer backend, and on
//! acceptance the user is sent to the TaskSteer dashboard.
//!
//! ## Handshake
//!
//! Every attempt runs the same two sequential steps:
//!
//! 1. **Identity acquisition:** the injected [`identity::IdentityProvider`] signs
//!    the user in (or creates the account) and mints a short-lived ID token.
//! 2. **Backend exchange:** exactly one `POST <backend>/login` with
//!    `{"token": "<id token>"}`, cookies kept for the process lifetime.
//!
//! The exchange is never attempted without a token, never retried, and its
//! outcome is one [`handshake::HandshakeResult`].
//!
//! ## Form
//!
//! [`form::CredentialForm`] holds the login/signup view state and the loading
//! flag that keeps a second submission from starting while one is in flight.

pub mod cli;
pub mod form;
pub mod handshake;
pub mod identity;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(GIT_COMMIT_HASH.len() >= 7);
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
