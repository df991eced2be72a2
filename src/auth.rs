//! Bearer credentials for the Petfinder API.
//!
//! The API hands out short-lived access tokens (about an hour) in exchange for
//! a key/secret pair. Expiry is not tracked locally: when the server answers a
//! call with a 401 whose detail says the token expired, [`AuthManager`]
//! re-authenticates once and the call is repeated with the new token.
//!
//! Refreshes are single-flight. The current credential lives behind an async
//! mutex together with a generation counter, so a caller that observed an
//! expired token only re-authenticates if nobody has done so in the meantime.

use crate::metadata::RequestMetadata;
use crate::response::RawResponse;
use crate::transport::Transport;
use crate::{Error, Result};
use http::StatusCode;
use serde::Deserialize;
use std::fmt;
use tokio::sync::Mutex;

/// Path of the token endpoint, relative to the API base URL.
pub const TOKEN_PATH: &str = "oauth2/token";

/// An access token issued by the token endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
    token_type: String,
    expires_in: Option<u64>,
    generation: u64,
}

impl Credential {
    /// The bearer token.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// The token type marker reported by the server (always `Bearer`).
    pub fn token_type(&self) -> &str {
        &self.token_type
    }

    /// Lifetime in seconds as reported when the token was issued.
    pub fn expires_in(&self) -> Option<u64> {
        self.expires_in
    }

    /// How many times the credential has been obtained, starting at 1.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("generation", &self.generation)
            .finish()
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    token_type: Option<String>,
    expires_in: Option<u64>,
    access_token: String,
}

/// Owns the key/secret pair and the current credential.
pub struct AuthManager {
    key: String,
    secret: String,
    current: Mutex<Option<Credential>>,
}

impl fmt::Debug for AuthManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthManager")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl AuthManager {
    /// Creates a manager that has not authenticated yet.
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
            current: Mutex::new(None),
        }
    }

    /// Obtains a fresh credential, replacing any current one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCredentials`] if the server rejects the
    /// key/secret pair or answers without a `Bearer` token type.
    pub async fn authenticate(&self, transport: &dyn Transport) -> Result<Credential> {
        let mut current = self.current.lock().await;
        let generation = current.as_ref().map_or(1, |c| c.generation + 1);
        let credential = request_token(transport, &self.key, &self.secret, generation).await?;
        *current = Some(credential.clone());
        Ok(credential)
    }

    /// Returns the current credential, authenticating first if there is none.
    pub async fn credential(&self, transport: &dyn Transport) -> Result<Credential> {
        let mut current = self.current.lock().await;
        if let Some(credential) = current.as_ref() {
            return Ok(credential.clone());
        }
        let credential = request_token(transport, &self.key, &self.secret, 1).await?;
        *current = Some(credential.clone());
        Ok(credential)
    }

    /// Replaces `stale` with a new credential.
    ///
    /// If another caller already replaced `stale`, its result is returned
    /// without contacting the token endpoint again.
    pub async fn refresh(&self, transport: &dyn Transport, stale: &Credential) -> Result<Credential> {
        let mut current = self.current.lock().await;
        if let Some(credential) = current.as_ref() {
            if credential.generation != stale.generation {
                return Ok(credential.clone());
            }
        }

        tracing::warn!(
            generation = stale.generation,
            "Access token expired, re-authenticating"
        );

        let credential =
            request_token(transport, &self.key, &self.secret, stale.generation + 1).await?;
        *current = Some(credential.clone());
        Ok(credential)
    }

    /// Sends `request` with the current bearer token.
    ///
    /// An expired-token answer triggers one refresh and one repeat of the
    /// request. A second expired-token answer in a row is reported as
    /// [`Error::InvalidCredentials`]. Every other response, including a
    /// genuine 401, is returned as-is for the caller to classify.
    pub async fn send_authorized(
        &self,
        transport: &dyn Transport,
        request: RequestMetadata,
    ) -> Result<RawResponse> {
        let mut credential = self.credential(transport).await?;
        let mut refreshed = false;

        loop {
            let authorized = request.clone().with_bearer(credential.token())?;
            let response = transport.send(authorized).await?;

            if !signals_expired_token(&response) {
                return Ok(response);
            }

            if refreshed {
                return Err(Error::InvalidCredentials {
                    message: format!(
                        "Access token rejected again after refresh: {}",
                        response.detail()
                    ),
                });
            }

            credential = self.refresh(transport, &credential).await?;
            refreshed = true;
        }
    }
}

/// Returns `true` for a 401 whose detail says the token is invalid or expired.
///
/// A 401 without that wording is a genuine credential rejection.
pub fn signals_expired_token(response: &RawResponse) -> bool {
    response.effective_status() == StatusCode::UNAUTHORIZED
        && response.detail().to_lowercase().contains("expired")
}

async fn request_token(
    transport: &dyn Transport,
    key: &str,
    secret: &str,
    generation: u64,
) -> Result<Credential> {
    let request = RequestMetadata::post(TOKEN_PATH)
        .with_form_field("grant_type", "client_credentials")
        .with_form_field("client_id", key)
        .with_form_field("client_secret", secret);

    tracing::debug!(generation = generation, "Requesting access token");

    let response = transport.send(request).await?;
    if !response.is_success() {
        tracing::error!(
            status = response.status.as_u16(),
            "Token endpoint rejected the request"
        );
        return Err(Error::from_response(&response));
    }

    let body: TokenResponse =
        serde_json::from_value(response.body.clone()).map_err(|e| {
            Error::DeserializationFailed {
                raw_response: response.raw_body.clone(),
                serde_error: e.to_string(),
                status: response.status,
            }
        })?;

    match body.token_type {
        Some(token_type) if token_type.eq_ignore_ascii_case("bearer") => {
            tracing::info!(
                generation = generation,
                expires_in = body.expires_in,
                "Obtained access token"
            );
            Ok(Credential {
                token: body.access_token,
                token_type,
                expires_in: body.expires_in,
                generation,
            })
        }
        other => Err(Error::InvalidCredentials {
            message: format!(
                "Expected a Bearer token, got {}",
                other.as_deref().unwrap_or("no token type")
            ),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    /// Answers requests from a queue and records what was sent.
    struct Scripted {
        answers: StdMutex<VecDeque<RawResponse>>,
        sent: StdMutex<Vec<RequestMetadata>>,
    }

    impl Scripted {
        fn new(answers: Vec<(u16, Value)>) -> Self {
            let answers = answers
                .into_iter()
                .map(|(status, body)| {
                    RawResponse::json(StatusCode::from_u16(status).unwrap(), body)
                })
                .collect();
            Self {
                answers: StdMutex::new(answers),
                sent: StdMutex::new(Vec::new()),
            }
        }

        fn sent_paths(&self) -> Vec<String> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .map(|r| r.path.clone())
                .collect()
        }
    }

    #[async_trait]
    impl Transport for Scripted {
        async fn send(&self, request: RequestMetadata) -> Result<RawResponse> {
            self.sent.lock().unwrap().push(request);
            Ok(self
                .answers
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected request"))
        }
    }

    fn token(value: &str) -> (u16, Value) {
        (
            200,
            json!({"token_type": "Bearer", "expires_in": 3600, "access_token": value}),
        )
    }

    fn expired() -> (u16, Value) {
        (
            401,
            json!({"type": "https://httpstatus.es/401", "status": 401,
                   "title": "Unauthorized", "detail": "Access token invalid or expired"}),
        )
    }

    #[tokio::test]
    async fn test_authenticate_posts_client_credentials() {
        let transport = Scripted::new(vec![token("abc")]);
        let auth = AuthManager::new("key", "secret");

        let credential = auth.authenticate(&transport).await.unwrap();
        assert_eq!(credential.token(), "abc");
        assert_eq!(credential.generation(), 1);

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent[0].path, TOKEN_PATH);
        assert_eq!(
            sent[0].form,
            vec![
                ("grant_type".to_string(), "client_credentials".to_string()),
                ("client_id".to_string(), "key".to_string()),
                ("client_secret".to_string(), "secret".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_bearer_marker_is_rejected() {
        let transport = Scripted::new(vec![(200, json!({"access_token": "abc"}))]);
        let auth = AuthManager::new("key", "secret");

        let result = auth.authenticate(&transport).await;
        assert!(matches!(result, Err(Error::InvalidCredentials { .. })));
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed_once() {
        let transport = Scripted::new(vec![
            token("first"),
            expired(),
            token("second"),
            (200, json!({"animals": []})),
        ]);
        let auth = AuthManager::new("key", "secret");

        let response = auth
            .send_authorized(&transport, RequestMetadata::get("animals"))
            .await
            .unwrap();

        assert!(response.is_success());
        assert_eq!(
            transport.sent_paths(),
            vec![TOKEN_PATH, "animals", TOKEN_PATH, "animals"]
        );
        let sent = transport.sent.lock().unwrap();
        assert_eq!(
            sent[3].headers.get("authorization").unwrap(),
            "Bearer second"
        );
    }

    #[tokio::test]
    async fn test_second_expiry_is_invalid_credentials() {
        let transport = Scripted::new(vec![token("first"), expired(), token("second"), expired()]);
        let auth = AuthManager::new("key", "secret");

        let result = auth
            .send_authorized(&transport, RequestMetadata::get("animals"))
            .await;
        assert!(matches!(result, Err(Error::InvalidCredentials { .. })));
        assert_eq!(transport.sent_paths().len(), 4);
    }

    #[tokio::test]
    async fn test_genuine_unauthorized_is_returned_unrefreshed() {
        let transport = Scripted::new(vec![
            token("first"),
            (401, json!({"status": 401, "detail": "Invalid client credentials"})),
        ]);
        let auth = AuthManager::new("key", "secret");

        let response = auth
            .send_authorized(&transport, RequestMetadata::get("animals"))
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert_eq!(transport.sent_paths().len(), 2);
    }

    #[tokio::test]
    async fn test_refresh_of_stale_generation_is_skipped() {
        let transport = Scripted::new(vec![token("first"), token("second")]);
        let auth = AuthManager::new("key", "secret");

        let stale = auth.credential(&transport).await.unwrap();
        let fresh = auth.refresh(&transport, &stale).await.unwrap();
        let again = auth.refresh(&transport, &stale).await.unwrap();

        assert_eq!(fresh.generation(), 2);
        assert_eq!(again, fresh);
        assert_eq!(transport.sent_paths().len(), 2);
    }
}
