// Session-aware HTTP client
// Decorates outgoing requests with the access token and transparently
// refreshes it once on an authorization failure

use anyhow::anyhow;
use reqwest::header::{self, HeaderValue};
use reqwest::{Client, Request, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;

use crate::auth::refresh;
use crate::error::AuthError;
use crate::nav;
use crate::store::{Slot, TokenStore};

/// Transport wrapper around `reqwest::Client`
///
/// Composition is explicit: callers build plain requests against the base
/// client and hand them to [`send`](SessionClient::send), which attaches the
/// bearer credential and owns the refresh-and-retry protocol. Exactly one
/// refresh is attempted per originating request.
pub struct SessionClient {
    /// Shared HTTP client with connection pooling
    http: Client,

    /// Session store holding the credential pair
    store: Arc<dyn TokenStore>,

    /// Base URL of the authentication API
    base_url: String,

    /// In-flight refresh guard: concurrent authorization failures queue here
    /// so only one refresh exchange runs at a time
    refresh_gate: tokio::sync::Mutex<()>,
}

impl SessionClient {
    /// Create a new session client with its own pooled HTTP client
    pub fn new(
        store: Arc<dyn TokenStore>,
        base_url: impl Into<String>,
        connect_timeout: u64,
        request_timeout: u64,
    ) -> Result<Self, AuthError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout))
            .timeout(Duration::from_secs(request_timeout))
            .user_agent(refresh::user_agent())
            .build()
            .map_err(|e| AuthError::Internal(anyhow!("Failed to create HTTP client: {e}")))?;

        Ok(Self::with_client(http, store, base_url))
    }

    /// Wrap an existing HTTP client
    pub fn with_client(http: Client, store: Arc<dyn TokenStore>, base_url: impl Into<String>) -> Self {
        Self {
            http,
            store,
            base_url: base_url.into(),
            refresh_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Get the underlying HTTP client
    pub fn client(&self) -> &Client {
        &self.http
    }

    /// Get the session store
    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    /// Resolve an API path against the configured base URL
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Send a request with the current access token attached
    ///
    /// On a 401 the client performs one refresh exchange, re-decorates the
    /// original request, and re-issues it once; the retried response is what
    /// the caller observes. A 401 on the retry, a failed exchange, or a
    /// missing refresh token tears the session down and surfaces
    /// [`AuthError::SessionExpired`].
    pub async fn send(&self, mut request: Request) -> Result<Response, AuthError> {
        // Clone up front: the body is consumed by the first attempt
        let retry_clone = request.try_clone();

        let sent_with = self.store.get_access_token()?;
        if let Some(ref token) = sent_with {
            set_bearer(&mut request, token)?;
        }

        let method = request.method().clone();
        let url = request.url().clone();
        tracing::debug!(method = %method, url = %url, "Sending request");

        let response = self.http.execute(request).await?;
        let status = response.status();
        if status != StatusCode::UNAUTHORIZED {
            tracing::debug!(status = %status, "Received response");
            return Ok(response);
        }

        tracing::warn!(url = %url, "Authorization failure, attempting token refresh");

        let mut retry = retry_clone.ok_or_else(|| {
            AuthError::Internal(anyhow!("request body is not cloneable, cannot retry"))
        })?;

        let fresh = self.refresh_access(sent_with.as_deref()).await?;
        set_bearer(&mut retry, &fresh)?;

        tracing::debug!(url = %url, "Retrying request with refreshed token");
        let retried = self.http.execute(retry).await?;

        // The retry is final: a second authorization failure means the newly
        // minted token was rejected too, so the session is not salvageable
        if retried.status() == StatusCode::UNAUTHORIZED {
            tracing::warn!(url = %url, "Retried request still unauthorized, tearing down session");
            self.store.clear_tokens()?;
            return Err(self.session_expired());
        }

        Ok(retried)
    }

    /// Obtain a usable access token after an authorization failure
    ///
    /// `stale` is the token the failed attempt carried. Waiters that queued
    /// behind an in-flight refresh find the store already updated and skip
    /// their own exchange.
    async fn refresh_access(&self, stale: Option<&str>) -> Result<String, AuthError> {
        let _gate = self.refresh_gate.lock().await;

        if let Some(current) = self.store.get_access_token()? {
            if stale != Some(current.as_str()) {
                tracing::debug!("Access token already refreshed by a concurrent request");
                return Ok(current);
            }
        }

        let Some(refresh_token) = self.store.get_refresh_token()? else {
            tracing::warn!("No refresh token stored, tearing down session");
            self.store.clear_tokens()?;
            return Err(self.session_expired());
        };

        match refresh::exchange(&self.http, &self.base_url, &refresh_token).await {
            Ok(access) => {
                // Fresh access, untouched refresh
                self.store.put(Slot::AccessToken, &access)?;
                Ok(access)
            }
            Err(err) => {
                tracing::error!(error = %err, "Refresh exchange failed, tearing down session");
                self.store.clear_tokens()?;
                Err(self.session_expired())
            }
        }
    }

    fn session_expired(&self) -> AuthError {
        AuthError::SessionExpired {
            redirect_to: nav::LOGIN,
        }
    }
}

fn set_bearer(request: &mut Request, token: &str) -> Result<(), AuthError> {
    let value = HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|e| AuthError::Internal(anyhow!("access token is not a valid header value: {e}")))?;
    request.headers_mut().insert(header::AUTHORIZATION, value);
    Ok(())
}
