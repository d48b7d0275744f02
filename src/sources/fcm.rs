//! Firebase Cloud Messaging HTTP v1 notifier.
//!
//! Authenticates either with a service-account key, from which OAuth tokens
//! with the `firebase.messaging` scope are minted and refreshed, or with a
//! fixed bearer for emulators and stubs.
//!
//! Failed sends are split in two: a rejection of the device token itself
//! becomes [`DaypackError::TokenRejected`], anything else (expired or
//! missing auth, server errors, transport) becomes
//! [`DaypackError::Delivery`].

use std::sync::Arc;

use async_trait::async_trait;
use gcp_auth::{CustomServiceAccount, TokenProvider};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;

use super::Notifier;
use crate::error::{DaypackError, Result};

pub const FCM_URL: &str = "https://fcm.googleapis.com";

const FCM_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";

// ---

/// Where the bearer token for each send comes from.
#[derive(Clone)]
pub enum FcmAuth {
    /// Fixed token, for emulators and local stubs.
    Static(String),
    /// Service-account key. `gcp_auth` caches the minted token and refreshes
    /// it before expiry.
    ServiceAccount(Arc<CustomServiceAccount>),
}

impl std::fmt::Debug for FcmAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FcmAuth::Static(_) => f.write_str("Static(****)"),
            FcmAuth::ServiceAccount(_) => f.write_str("ServiceAccount"),
        }
    }
}

impl FcmAuth {
    async fn bearer(&self) -> Result<String> {
        // ---
        match self {
            FcmAuth::Static(token) => Ok(token.clone()),
            FcmAuth::ServiceAccount(account) => account
                .token(&[FCM_SCOPE])
                .await
                .map(|token| token.as_str().to_string())
                .map_err(|e| DaypackError::Delivery {
                    reason: format!("could not mint access token: {e}"),
                }),
        }
    }
}

/// The only field read from the key ourselves; `gcp_auth` parses the rest.
#[derive(Debug, Deserialize)]
struct ServiceAccountKey {
    project_id: Option<String>,
}

#[derive(Clone, Debug)]
pub struct FcmNotifier {
    client: reqwest::Client,
    send_url: String,
    auth: FcmAuth,
}

impl FcmNotifier {
    // ---
    pub fn new(client: reqwest::Client, base_url: &str, project_id: &str, auth: FcmAuth) -> Self {
        let send_url = format!(
            "{}/v1/projects/{}/messages:send",
            base_url.trim_end_matches('/'),
            project_id
        );
        Self {
            client,
            send_url,
            auth,
        }
    }

    /// Build a notifier from an inline service-account JSON key. The key's
    /// `project_id` is used unless `project_id` overrides it.
    pub fn from_service_account(
        client: reqwest::Client,
        base_url: &str,
        key_json: &str,
        project_id: Option<&str>,
    ) -> Result<Self> {
        // ---
        let key: ServiceAccountKey = serde_json::from_str(key_json)
            .map_err(|e| DaypackError::Credentials(format!("malformed key: {e}")))?;
        let project_id = project_id
            .map(str::to_string)
            .or(key.project_id)
            .ok_or_else(|| DaypackError::Credentials("key has no project_id".into()))?;

        let account = CustomServiceAccount::from_json(key_json)
            .map_err(|e| DaypackError::Credentials(e.to_string()))?;
        let auth = FcmAuth::ServiceAccount(Arc::new(account));
        Ok(Self::new(client, base_url, &project_id, auth))
    }
}

// --- error classification

#[derive(Debug, Default, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: ErrorStatus,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorStatus {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    details: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(rename = "errorCode")]
    error_code: Option<String>,
}

/// Map a non-success FCM response to an error.
///
/// `TokenRejected` only for `UNREGISTERED`, or a 400 `INVALID_ARGUMENT`
/// whose message names the registration token. A bare 404 is not enough:
/// a wrong project id also answers 404.
pub fn classify_failure(status: StatusCode, body: &str) -> DaypackError {
    // ---
    let envelope: ErrorEnvelope = serde_json::from_str(body).unwrap_or_default();
    let error = envelope.error;
    let code = error
        .details
        .iter()
        .find_map(|d| d.error_code.as_deref())
        .unwrap_or(error.status.as_str());
    let reason = format!("HTTP {} {}: {}", status.as_u16(), code, error.message);

    let message = error.message.to_ascii_lowercase();
    let names_token = message.contains("registration token");
    let rejected = code == "UNREGISTERED"
        || (status == StatusCode::BAD_REQUEST && code == "INVALID_ARGUMENT" && names_token);

    if rejected {
        DaypackError::TokenRejected { reason }
    } else {
        DaypackError::Delivery { reason }
    }
}

#[async_trait]
impl Notifier for FcmNotifier {
    async fn send_alert(&self, title: &str, body: &str, token: &str) -> Result<()> {
        // ---
        let message = json!({
            "message": {
                "token": token,
                "notification": { "title": title, "body": body }
            }
        });

        let bearer = self.auth.bearer().await?;
        let response = self
            .client
            .post(&self.send_url)
            .bearer_auth(bearer)
            .json(&message)
            .send()
            .await
            .map_err(|e| DaypackError::Delivery {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let detail = response.text().await.unwrap_or_default();
        Err(classify_failure(status, &detail))
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn fcm_error(code: u16, status: &str, message: &str, error_code: Option<&str>) -> String {
        // ---
        let details = match error_code {
            Some(c) => json!([{
                "@type": "type.googleapis.com/google.firebase.fcm.v1.FcmError",
                "errorCode": c
            }]),
            None => json!([]),
        };
        let body = json!({
            "error": {
                "code": code,
                "message": message,
                "status": status,
                "details": details
            }
        });
        body.to_string()
    }

    #[test]
    fn test_send_url_and_debug_masks_token() {
        // ---
        let auth = FcmAuth::Static("ya29.secret".into());
        let n = FcmNotifier::new(
            reqwest::Client::new(),
            "https://fcm.googleapis.com/",
            "daypack-prod",
            auth,
        );
        assert_eq!(
            n.send_url,
            "https://fcm.googleapis.com/v1/projects/daypack-prod/messages:send"
        );
        let dbg = format!("{n:?}");
        assert!(!dbg.contains("ya29.secret"));
    }

    #[test]
    fn test_unregistered_token_is_rejected() {
        // ---
        let body = fcm_error(
            404,
            "NOT_FOUND",
            "Requested entity was not found.",
            Some("UNREGISTERED"),
        );
        let err = classify_failure(StatusCode::NOT_FOUND, &body);
        assert!(matches!(err, DaypackError::TokenRejected { .. }), "{err}");
    }

    #[test]
    fn test_malformed_token_is_rejected() {
        // ---
        let body = fcm_error(
            400,
            "INVALID_ARGUMENT",
            "The registration token is not a valid FCM registration token",
            Some("INVALID_ARGUMENT"),
        );
        let err = classify_failure(StatusCode::BAD_REQUEST, &body);
        assert!(matches!(err, DaypackError::TokenRejected { .. }), "{err}");
    }

    #[test]
    fn test_auth_and_server_failures_keep_the_token() {
        // ---
        let cases = [
            (401, "UNAUTHENTICATED", "Invalid authentication", None),
            (403, "PERMISSION_DENIED", "Denied", None),
            (503, "UNAVAILABLE", "Try again", Some("UNAVAILABLE")),
            (400, "INVALID_ARGUMENT", "Bad 'message.android.ttl'", None),
            // Wrong project id: 404 without an FCM error code
            (404, "NOT_FOUND", "Requested entity was not found.", None),
        ];

        for (code, status, message, error_code) in cases {
            let body = fcm_error(code, status, message, error_code);
            let err = classify_failure(StatusCode::from_u16(code).unwrap(), &body);
            let kept = matches!(err, DaypackError::Delivery { .. });
            assert!(kept, "{code}: {err}");
        }

        let err = classify_failure(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>");
        assert!(matches!(err, DaypackError::Delivery { .. }));
    }

    #[test]
    fn test_service_account_key_needs_a_project() {
        // ---
        let client = reqwest::Client::new();

        let err = FcmNotifier::from_service_account(client.clone(), FCM_URL, "not json", None)
            .unwrap_err();
        assert!(matches!(err, DaypackError::Credentials(_)));

        let key = r#"{"type": "service_account"}"#;
        let result = FcmNotifier::from_service_account(client, FCM_URL, key, None);
        let err = result.unwrap_err();
        assert!(err.to_string().contains("project_id"), "{err}");
    }
}
