use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

/// Authgate - session manager CLI
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Base URL of the authentication API
    #[arg(short = 'u', long, env = "API_BASE_URL", default_value = "http://127.0.0.1:8000")]
    pub api_url: String,

    /// Path to the session store database
    #[arg(short = 's', long, env = "SESSION_STORE_FILE")]
    pub store_file: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// HTTP connect timeout in seconds
    #[arg(long, env = "HTTP_CONNECT_TIMEOUT", default_value = "10")]
    pub connect_timeout: u64,

    /// HTTP request timeout in seconds
    #[arg(long, env = "HTTP_REQUEST_TIMEOUT", default_value = "30")]
    pub request_timeout: u64,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub api_base_url: String,
    pub store_file: PathBuf,
    pub log_level: String,
    pub http_connect_timeout: u64,
    pub http_request_timeout: u64,
}

impl Config {
    /// Load configuration with priority: CLI > ENV > defaults
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        Ok(Self::from_args(CliArgs::parse()))
    }

    fn from_args(args: CliArgs) -> Self {
        let store_file = args
            .store_file
            .map(|s| expand_tilde(&s))
            .unwrap_or_else(default_store_file);

        Config {
            api_base_url: args.api_url,
            store_file,
            log_level: args.log_level,
            http_connect_timeout: args.connect_timeout,
            http_request_timeout: args.request_timeout,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !self.api_base_url.starts_with("http://") && !self.api_base_url.starts_with("https://") {
            anyhow::bail!(
                "API_BASE_URL must start with http:// or https:// (got: {})",
                self.api_base_url
            );
        }
        Ok(())
    }
}

/// Default store location under the platform data directory
fn default_store_file() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("authgate")
        .join("session.sqlite3")
}

/// Expand tilde (~) in file paths to user's home directory
fn expand_tilde(path: &str) -> PathBuf {
    if path.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(&path[2..]);
        }
    }
    PathBuf::from(path)
}
