//! Firebase REST error codes rendered the way the Firebase web SDK shows them.

use crate::identity::ProviderError;
use serde_json::Value;

/// Translate a REST `error.message` code into the SDK's `auth/*` code.
#[must_use]
pub fn auth_code(server_code: &str) -> &'static str {
    match server_code {
        "EMAIL_NOT_FOUND" | "USER_NOT_FOUND" => "user-not-found",
        "INVALID_PASSWORD" => "wrong-password",
        "INVALID_LOGIN_CREDENTIALS" | "INVALID_IDP_RESPONSE" => "invalid-credential",
        "EMAIL_EXISTS" => "email-already-in-use",
        "WEAK_PASSWORD" => "weak-password",
        "INVALID_EMAIL" => "invalid-email",
        "MISSING_PASSWORD" => "missing-password",
        "USER_DISABLED" => "user-disabled",
        "TOO_MANY_ATTEMPTS_TRY_LATER" => "too-many-requests",
        "OPERATION_NOT_ALLOWED" | "PASSWORD_LOGIN_DISABLED" => "operation-not-allowed",
        "TOKEN_EXPIRED" => "user-token-expired",
        "INVALID_REFRESH_TOKEN" | "INVALID_GRANT_TYPE" | "MISSING_REFRESH_TOKEN" => {
            "invalid-user-token"
        }
        "FEDERATED_USER_ID_ALREADY_LINKED" => "credential-already-in-use",
        code if code.starts_with("API key not valid") => "invalid-api-key",
        _ => "internal-error",
    }
}

/// Build the user-facing error for an `auth/*` code with an optional detail.
#[must_use]
pub fn sdk_error(code: &str, detail: Option<&str>) -> ProviderError {
    let message = match detail.map(str::trim) {
        Some(detail) if !detail.is_empty() => format!("Firebase: {detail} (auth/{code})."),
        _ => format!("Firebase: Error (auth/{code})."),
    };
    ProviderError::with_code(code, message)
}

/// Map a REST error message such as `WEAK_PASSWORD : Password should be at least 6 characters`.
#[must_use]
pub fn from_server_message(server_message: &str) -> ProviderError {
    let (server_code, detail) = match server_message.split_once(" : ") {
        Some((code, detail)) => (code.trim(), Some(detail)),
        None => (server_message.trim(), None),
    };
    sdk_error(auth_code(server_code), detail)
}

/// Map a whole error response body; anything unparseable is an internal error.
#[must_use]
pub fn from_response_body(body: &str) -> ProviderError {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|json| {
            json.get("error")
                .and_then(|error| error.get("message"))
                .and_then(Value::as_str)
                .map(from_server_message)
        })
        .unwrap_or_else(|| sdk_error("internal-error", None))
}

/// The provider could not be reached at all.
#[must_use]
pub fn network_request_failed() -> ProviderError {
    sdk_error("network-request-failed", None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_credential_errors() {
        assert_eq!(
            from_server_message("INVALID_PASSWORD").to_string(),
            "Firebase: Error (auth/wrong-password)."
        );
        assert_eq!(
            from_server_message("EMAIL_NOT_FOUND").code(),
            Some("user-not-found")
        );
        assert_eq!(
            from_server_message("INVALID_LOGIN_CREDENTIALS").to_string(),
            "Firebase: Error (auth/invalid-credential)."
        );
        assert_eq!(
            from_server_message("EMAIL_EXISTS").to_string(),
            "Firebase: Error (auth/email-already-in-use)."
        );
    }

    #[test]
    fn keeps_server_detail() {
        let err = from_server_message("WEAK_PASSWORD : Password should be at least 6 characters");
        assert_eq!(
            err.to_string(),
            "Firebase: Password should be at least 6 characters (auth/weak-password)."
        );
        assert_eq!(err.code(), Some("weak-password"));
    }

    #[test]
    fn unknown_codes_are_internal() {
        assert_eq!(
            from_server_message("SOMETHING_NEW").code(),
            Some("internal-error")
        );
        assert_eq!(
            from_server_message("API key not valid. Please pass a valid API key.").code(),
            Some("invalid-api-key")
        );
    }

    #[test]
    fn parses_response_bodies() {
        let body = r#"{"error":{"code":400,"message":"USER_DISABLED","errors":[]}}"#;
        assert_eq!(from_response_body(body).code(), Some("user-disabled"));
        assert_eq!(
            from_response_body("<html>bad gateway</html>").to_string(),
            "Firebase: Error (auth/internal-error)."
        );
    }
}
