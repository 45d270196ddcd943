//! Step 2: hand the identity token to the backend.

use super::HandshakeResult;
use crate::identity::IdentityToken;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, error, instrument};
use url::Url;

#[derive(Serialize)]
struct LoginRequest<'a> {
    token: &'a str,
}

/// `POST <backend>/login` with `{"token": ...}`. Exactly one request, no retry.
#[instrument(skip(client, token))]
pub(crate) async fn post_token(
    client: &Client,
    login_url: &Url,
    destination: &Url,
    token: &IdentityToken,
) -> HandshakeResult {
    let response = match client
        .post(login_url.clone())
        .json(&LoginRequest {
            token: token.expose(),
        })
        .send()
        .await
    {
        Ok(response) => response,
        Err(err) => {
            error!("Exchange failed: {err}");
            return HandshakeResult::TransportError(err.to_string());
        }
    };

    let status = response.status();

    if status.is_success() {
        debug!("backend accepted token: {status}");
        return HandshakeResult::Success {
            destination: destination.clone(),
        };
    }

    match response.text().await {
        Ok(body) => {
            error!("Server rejected: {status} - {body}");
            HandshakeResult::BackendError {
                status: status.as_u16(),
                body,
            }
        }
        Err(err) => {
            error!("Exchange failed reading response: {err}");
            HandshakeResult::TransportError(err.to_string())
        }
    }
}
