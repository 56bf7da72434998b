// Two-step login handshake
// Primary credential check, second-factor verification, and device setup

use reqwest::{Client, StatusCode};
use std::sync::Arc;

use super::types::{
    ApiErrorBody, CredentialPair, LoginOutcome, LoginRequest, SetupChallenge, VerifyRequest,
};
use crate::client::SessionClient;
use crate::error::AuthError;
use crate::store::TokenStore;

pub const LOGIN_PATH: &str = "/api/login/";
pub const VERIFY_PATH: &str = "/api/mfa/verify/";
pub const SETUP_PATH: &str = "/api/mfa/setup/";
pub const CONFIRM_PATH: &str = "/api/mfa/confirm/";
pub const LOGOUT_PATH: &str = "/api/logout/";

/// Login protocol driver
///
/// Pre-session calls go through the bare HTTP client; no bearer token exists
/// yet. Step 1 persists the temporary handshake triple, step 2 exchanges it
/// (plus the user's code) for the full credential pair.
pub struct LoginFlow {
    http: Client,
    base_url: String,
    store: Arc<dyn TokenStore>,
}

impl LoginFlow {
    pub fn new(http: Client, base_url: impl Into<String>, store: Arc<dyn TokenStore>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            store,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Step 1: submit primary credentials
    ///
    /// Persists whatever the server hands back: a credential pair for
    /// accounts without a second factor, or the temporary token triple that
    /// step 2 will consume.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome, AuthError> {
        let response = self
            .http
            .post(self.url(LOGIN_PATH))
            .json(&LoginRequest { username, password })
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::BAD_REQUEST {
            let message = error_message(response).await;
            tracing::warn!("Login rejected: {}", message);
            return Err(AuthError::LoginFailed(message));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AuthError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: super::types::LoginResponse = response.json().await?;

        if body.requires_mfa || body.requires_mfa_setup {
            let (temp_token, user_id, timestamp) =
                match (body.temp_token, body.user_id, body.timestamp) {
                    (Some(t), Some(u), Some(ts)) => (t, u, ts),
                    _ => {
                        return Err(AuthError::Handshake(
                            "second-factor challenge is missing its temporary token fields"
                                .to_string(),
                        ))
                    }
                };
            self.store.set_temp_token(&temp_token, &user_id, &timestamp)?;

            return if body.requires_mfa {
                tracing::info!(user_id = %user_id, "Second-factor code required");
                Ok(LoginOutcome::SecondFactorRequired { user_id })
            } else {
                tracing::info!(user_id = %user_id, "Second-factor setup required");
                Ok(LoginOutcome::SetupRequired { user_id })
            };
        }

        match (body.access, body.refresh) {
            (Some(access), Some(refresh)) => {
                self.store.set_tokens(&access, &refresh)?;
                tracing::info!("Session established");
                Ok(LoginOutcome::LoggedIn)
            }
            _ => Err(AuthError::Handshake(
                "login response carried neither tokens nor a second-factor challenge".to_string(),
            )),
        }
    }

    /// Step 2: submit the second-factor code
    ///
    /// On success the returned credential pair is persisted and the session
    /// becomes authenticated. On a rejected code the stored triple is left
    /// untouched so the user can retry without repeating step 1. The triple
    /// is not cleared on success either; the server expires it out-of-band.
    pub async fn verify_code(&self, code: &str) -> Result<(), AuthError> {
        self.submit_code(VERIFY_PATH, code).await?;
        tracing::info!("Second factor verified, session established");
        Ok(())
    }

    /// Setup variant: fetch the provisioning challenge for a new device
    pub async fn setup_challenge(&self) -> Result<SetupChallenge, AuthError> {
        let (temp_token, user_id, timestamp) = self.handshake_state()?;

        let response = self
            .http
            .get(self.url(SETUP_PATH))
            .query(&[
                ("temp_token", temp_token.as_str()),
                ("user_id", user_id.as_str()),
                ("timestamp", timestamp.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = error_message(response).await;
            return Err(AuthError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }

    /// Setup variant: confirm the new device with its first code
    pub async fn confirm_setup(&self, code: &str) -> Result<(), AuthError> {
        self.submit_code(CONFIRM_PATH, code).await?;
        tracing::info!("Second-factor device confirmed, session established");
        Ok(())
    }

    /// Tear down the session: best-effort server notification, then a local
    /// wipe that happens regardless of the server's answer
    pub async fn logout(&self, session: &SessionClient) -> Result<(), AuthError> {
        let request = session.client().post(session.url(LOGOUT_PATH)).build()?;
        let result = session.send(request).await;

        self.store.clear_tokens()?;
        tracing::info!("Logged out, session cleared");

        match result {
            Ok(_) => Ok(()),
            // Already torn down; logout reached its goal anyway
            Err(AuthError::SessionExpired { .. }) => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Send the stored triple plus a code; shared by verify and confirm
    async fn submit_code(&self, path: &'static str, code: &str) -> Result<(), AuthError> {
        let (temp_token, user_id, timestamp) = self.handshake_state()?;

        let response = self
            .http
            .post(self.url(path))
            .json(&VerifyRequest {
                token: code,
                temp_token: &temp_token,
                user_id: &user_id,
                timestamp: &timestamp,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            // Triple stays put: step 2 can be retried
            let message = error_message(response).await;
            tracing::warn!(status = status.as_u16(), "Second-factor code rejected");
            return Err(AuthError::LoginFailed(message));
        }

        let pair: CredentialPair = response.json().await?;
        self.store.set_tokens(&pair.access, &pair.refresh)?;
        Ok(())
    }

    fn handshake_state(&self) -> Result<(String, String, String), AuthError> {
        let state = self.store.get_temp_token()?;
        match (state.temp_token, state.user_id, state.timestamp) {
            (Some(t), Some(u), Some(ts)) => Ok((t, u, ts)),
            _ => Err(AuthError::Handshake(
                "no pending second-factor handshake; log in first".to_string(),
            )),
        }
    }
}

/// Pull the server's error message out of a failure response, with the raw
/// body as fallback
async fn error_message(response: reqwest::Response) -> String {
    let body = response.text().await.unwrap_or_default();
    serde_json::from_str::<ApiErrorBody>(&body)
        .ok()
        .and_then(|b| b.error)
        .unwrap_or(body)
}
