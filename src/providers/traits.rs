use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// Tokens returned from the provider after code exchange or refresh.
///
/// This is also the exact shape persisted under the session storage key;
/// it is always written and replaced as a whole.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: String,
    /// Lifetime of the access token in seconds, as reported by the provider.
    pub expires_in: u64,
    pub token_type: String,
}

impl TokenSet {
    pub fn has_refresh_token(&self) -> bool {
        !self.refresh_token.is_empty()
    }
}

// Keep tokens out of logs and panic messages.
impl std::fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .field("token_type", &self.token_type)
            .finish()
    }
}

/// An OAuth 2.0 authorization-code provider.
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Unique provider identifier (e.g., "garmin").
    fn id(&self) -> &str;

    /// Human-readable display name.
    fn display_name(&self) -> &str;

    /// Build the authorization URL that the user should be redirected to.
    fn auth_url(&self, scopes: &[String], state: &str, redirect_uri: &str) -> String;

    /// Exchange an authorization code for a token set.
    ///
    /// Errors: `AuthExchange` for a non-success status, `InvalidTokenResponse`
    /// when a success body is not a token set, `Transport` when no response
    /// arrived.
    async fn exchange_code(&self, code: &str) -> Result<TokenSet, AuthError>;

    /// Obtain a new token set from a refresh token. Every failure is
    /// reported as `RefreshFailed` with its kind.
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenSet, AuthError>;
}
