// Wire types for the login, second-factor, and refresh endpoints

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Primary login request
#[derive(Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Primary login response
///
/// Carries either a full credential pair or a second-factor challenge; the
/// server decides which based on whether the account has a confirmed device.
#[derive(Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub requires_mfa: bool,
    #[serde(default)]
    pub requires_mfa_setup: bool,
    pub access: Option<String>,
    pub refresh: Option<String>,
    pub temp_token: Option<String>,
    // user_id and timestamp arrive as JSON numbers but are persisted as the
    // opaque strings the storage slots hold
    #[serde(default, deserialize_with = "stringly")]
    pub user_id: Option<String>,
    #[serde(default, deserialize_with = "stringly")]
    pub timestamp: Option<String>,
}

/// Outcome of a primary login, after any handshake state has been persisted
#[derive(Debug, Clone, PartialEq)]
pub enum LoginOutcome {
    /// Full session established, no second factor involved
    LoggedIn,
    /// Second-factor code entry required; temp triple stored
    SecondFactorRequired { user_id: String },
    /// Account has no second-factor device yet; temp triple stored
    SetupRequired { user_id: String },
}

/// Second-factor code submission (verify and setup-confirm share this shape)
#[derive(Serialize)]
pub struct VerifyRequest<'a> {
    pub token: &'a str,
    pub temp_token: &'a str,
    pub user_id: &'a str,
    pub timestamp: &'a str,
}

/// Full credential pair, returned by verification and setup confirmation
#[derive(Deserialize)]
pub struct CredentialPair {
    pub access: String,
    pub refresh: String,
}

/// Second-factor provisioning payload
#[derive(Debug, Deserialize)]
pub struct SetupChallenge {
    #[serde(default)]
    pub setup_required: bool,
    /// otpauth QR code as a data URL, present while setup is pending
    pub qr_code: Option<String>,
    pub secret: Option<String>,
    pub message: Option<String>,
}

/// Refresh exchange request
#[derive(Serialize)]
pub struct RefreshRequest<'a> {
    pub refresh: &'a str,
}

/// Refresh exchange response; only the access token is reissued
#[derive(Deserialize)]
pub struct RefreshResponse {
    pub access: String,
}

/// Error body shape used across the API
#[derive(Deserialize)]
pub struct ApiErrorBody {
    pub error: Option<String>,
}

/// Interpret the stored handshake timestamp (unix seconds as a string)
///
/// Display-only; the client enforces no expiry, the server does.
pub fn issued_at(timestamp: &str) -> Option<DateTime<Utc>> {
    let seconds = timestamp.parse::<i64>().ok()?;
    Utc.timestamp_opt(seconds, 0).single()
}

/// Accept a JSON number or string and keep its string form
fn stringly<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(i64),
        String(String),
    }

    let value = Option::<NumberOrString>::deserialize(deserializer)?;
    Ok(value.map(|v| match v {
        NumberOrString::Number(n) => n.to_string(),
        NumberOrString::String(s) => s,
    }))
}
