// Refresh exchange
// Trades the long-lived refresh token for a fresh access token

use reqwest::Client;

use super::types::{RefreshRequest, RefreshResponse};
use crate::error::AuthError;

pub const REFRESH_PATH: &str = "/api/token/refresh/";

/// Get machine fingerprint for User-Agent
pub(crate) fn client_fingerprint() -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());

    let mut hasher = DefaultHasher::new();
    host.hash(&mut hasher);
    format!("{:x}", hasher.finish())
}

/// User-Agent value carried on every request this crate sends
pub fn user_agent() -> String {
    format!(
        "authgate/{}-{}",
        env!("CARGO_PKG_VERSION"),
        client_fingerprint()
    )
}

/// Perform one refresh exchange
///
/// Returns only the new access token; the refresh token is never reissued by
/// this endpoint and the caller must leave its slot untouched.
pub async fn exchange(
    http: &Client,
    base_url: &str,
    refresh_token: &str,
) -> Result<String, AuthError> {
    let url = format!("{}{}", base_url.trim_end_matches('/'), REFRESH_PATH);
    tracing::debug!("Refreshing access token...");

    let response = http
        .post(&url)
        .json(&RefreshRequest {
            refresh: refresh_token,
        })
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        tracing::warn!(
            status = status.as_u16(),
            "Refresh exchange rejected by server"
        );
        return Err(AuthError::Api {
            status: status.as_u16(),
            message,
        });
    }

    let data: RefreshResponse = response.json().await?;
    if data.access.is_empty() {
        return Err(AuthError::Api {
            status: status.as_u16(),
            message: "refresh response does not contain an access token".to_string(),
        });
    }

    tracing::debug!("Access token refreshed");
    Ok(data.access)
}
