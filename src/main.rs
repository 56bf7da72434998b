use anyhow::{Context, Result};
use dialoguer::{Confirm, Input, Password};
use std::sync::Arc;

use authgate::auth::{issued_at, LoginFlow, LoginOutcome};
use authgate::client::SessionClient;
use authgate::config::Config;
use authgate::error::AuthError;
use authgate::nav;
use authgate::store::{SqliteStore, TokenStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (for log level)
    let config = Config::load()?;
    config.validate()?;

    // Initialize logging with the configured level
    let log_level = config.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    tracing::info!("🔐 Authgate starting...");
    tracing::info!("API: {}", config.api_base_url);
    tracing::debug!("Session store: {}", config.store_file.display());

    let store: Arc<dyn TokenStore> = Arc::new(SqliteStore::open(&config.store_file)?);
    let session = SessionClient::new(
        store.clone(),
        config.api_base_url.clone(),
        config.http_connect_timeout,
        config.http_request_timeout,
    )?;
    let flow = LoginFlow::new(
        session.client().clone(),
        config.api_base_url.clone(),
        store.clone(),
    );

    // Route guard for the protected page
    match nav::resolve(nav::HOME, store.as_ref())? {
        nav::Access::Allow => tracing::info!("✅ Existing session found"),
        nav::Access::Redirect(target) => {
            tracing::debug!("Redirected to {}", target);
            run_login(&flow, &store).await?;
        }
    }

    // The protected page; a stale access token is refreshed transparently,
    // an unsalvageable session drops us back to the login entry point
    match fetch_welcome(&session).await {
        Ok(message) => println!("\n{message}\n"),
        Err(AuthError::SessionExpired { redirect_to }) => {
            tracing::warn!("Session expired, returning to {}", redirect_to);
            run_login(&flow, &store).await?;
            let message = fetch_welcome(&session).await?;
            println!("\n{message}\n");
        }
        Err(err) => return Err(err.into()),
    }

    let logout = Confirm::new()
        .with_prompt("Log out before exiting?")
        .default(false)
        .interact()
        .context("Failed to read confirmation")?;

    if logout {
        flow.logout(&session).await?;
        tracing::info!("👋 Session cleared");
    }

    Ok(())
}

/// Drive the interactive login, including the second-factor branches
async fn run_login(flow: &LoginFlow, store: &Arc<dyn TokenStore>) -> Result<()> {
    loop {
        let username: String = Input::new()
            .with_prompt("Username")
            .interact_text()
            .context("Failed to read username")?;
        let password = Password::new()
            .with_prompt("Password")
            .interact()
            .context("Failed to read password")?;

        let outcome = match flow.login(&username, &password).await {
            Ok(outcome) => outcome,
            Err(AuthError::LoginFailed(message)) => {
                eprintln!("Login failed: {message}");
                continue;
            }
            Err(err) => return Err(err.into()),
        };

        match outcome {
            LoginOutcome::LoggedIn => {
                tracing::info!("✅ Logged in");
                return Ok(());
            }
            LoginOutcome::SecondFactorRequired { user_id } => {
                tracing::info!("Second factor required for user {}", user_id);
                if let Some(ts) = store.get_temp_token()?.timestamp {
                    if let Some(at) = issued_at(&ts) {
                        println!("Code requested at {}", at.to_rfc3339());
                    }
                }
                if prompt_code(flow, CodeTarget::Verify).await? {
                    return Ok(());
                }
            }
            LoginOutcome::SetupRequired { user_id } => {
                tracing::info!("Second-factor setup required for user {}", user_id);
                let challenge = flow.setup_challenge().await?;
                if challenge.setup_required {
                    if let Some(secret) = &challenge.secret {
                        println!("Add this secret to your authenticator app: {secret}");
                    }
                    if let Some(qr) = &challenge.qr_code {
                        println!("QR code (data URL): {qr}");
                    }
                }
                if prompt_code(flow, CodeTarget::Confirm).await? {
                    return Ok(());
                }
            }
        }
    }
}

enum CodeTarget {
    Verify,
    Confirm,
}

/// Prompt for a second-factor code until it is accepted or the user gives up.
/// Returns false to restart the whole login (step 1 again).
async fn prompt_code(flow: &LoginFlow, target: CodeTarget) -> Result<bool> {
    loop {
        let code: String = Input::new()
            .with_prompt("Second-factor code")
            .interact_text()
            .context("Failed to read code")?;

        let result = match target {
            CodeTarget::Verify => flow.verify_code(code.trim()).await,
            CodeTarget::Confirm => flow.confirm_setup(code.trim()).await,
        };

        match result {
            Ok(()) => {
                tracing::info!("✅ Logged in");
                return Ok(true);
            }
            Err(AuthError::LoginFailed(message)) => {
                eprintln!("Code rejected: {message}");
                let retry = Confirm::new()
                    .with_prompt("Try another code?")
                    .default(true)
                    .interact()
                    .context("Failed to read confirmation")?;
                if !retry {
                    // The handshake may have expired server-side; start over
                    return Ok(false);
                }
            }
            Err(err) => return Err(err.into()),
        }
    }
}

/// Fetch the protected page behind the session guard
async fn fetch_welcome(session: &SessionClient) -> Result<String, AuthError> {
    let request = session
        .client()
        .get(session.url("/api/welcome/"))
        .build()?;
    let response = session.send(request).await?;

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if !status.is_success() {
        return Err(AuthError::Api {
            status: status.as_u16(),
            message: body,
        });
    }

    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
        .unwrap_or(body);
    Ok(message)
}
