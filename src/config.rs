use anyhow::{Context, Result};
use std::path::PathBuf;

/// Application configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // ── Server ──────────────────────────────────────────────────────────
    pub host: String,
    pub port: u16,
    pub base_url: String,
    /// Where Garmin sends the user back with the authorization code.
    pub redirect_url: String,

    // ── Garmin ──────────────────────────────────────────────────────────
    pub garmin_client_id: String,
    pub garmin_client_secret: String,
    pub garmin_auth_url: String,
    pub garmin_token_url: String,
    /// Host of the wellness API; request paths carry `/wellness-api/rest/...`.
    pub garmin_api_base_url: String,
    pub garmin_scopes: Vec<String>,

    // ── Token storage ───────────────────────────────────────────────────
    pub token_store_path: PathBuf,
    /// 32-byte base64-encoded master key for AES-256-GCM encryption.
    pub master_key: String,
    /// base64-encoded HMAC key for state parameter signing.
    pub hmac_secret: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let base_url =
            std::env::var("BASE_URL").unwrap_or_else(|_| "http://localhost:8420".into());
        let redirect_url = std::env::var("REDIRECT_URL")
            .unwrap_or_else(|_| format!("{base_url}/v1/oauth/callback"));

        Ok(Config {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8420".into())
                .parse()
                .context("Invalid PORT")?,
            base_url,
            redirect_url,

            garmin_client_id: std::env::var("GARMIN_CLIENT_ID")
                .context("Garmin API credentials not configured (GARMIN_CLIENT_ID)")?,
            garmin_client_secret: std::env::var("GARMIN_CLIENT_SECRET")
                .context("Garmin API credentials not configured (GARMIN_CLIENT_SECRET)")?,
            garmin_auth_url: std::env::var("GARMIN_AUTH_URL")
                .unwrap_or_else(|_| "https://connect.garmin.com/oauthConfirm".into()),
            garmin_token_url: std::env::var("GARMIN_TOKEN_URL").unwrap_or_else(|_| {
                "https://connectapi.garmin.com/oauth-service/oauth/token".into()
            }),
            garmin_api_base_url: std::env::var("GARMIN_API_BASE_URL")
                .unwrap_or_else(|_| "https://apis.garmin.com".into()),
            garmin_scopes: parse_scopes(
                &std::env::var("GARMIN_SCOPES")
                    .unwrap_or_else(|_| "activity.read,body_composition.read".into()),
            ),

            token_store_path: std::env::var("TOKEN_STORE_PATH")
                .unwrap_or_else(|_| "data/tokens.json".into())
                .into(),
            master_key: std::env::var("MASTER_KEY")
                .context("MASTER_KEY is required (32 bytes, base64)")?,
            hmac_secret: std::env::var("HMAC_SECRET")
                .context("HMAC_SECRET is required (base64)")?,
        })
    }

    /// Address the HTTP server binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_scopes(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
