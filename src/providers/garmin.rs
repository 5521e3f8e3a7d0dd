use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, info, warn};

use super::traits::{OAuthProvider, TokenSet};
use crate::error::{AuthError, RefreshFailure};

pub const DEFAULT_AUTH_URL: &str = "https://connect.garmin.com/oauthConfirm";
pub const DEFAULT_TOKEN_URL: &str = "https://connectapi.garmin.com/oauth-service/oauth/token";

/// Garmin Connect OAuth 2.0 provider.
///
/// Quirks:
/// - Token endpoint requires Basic auth (client_id:client_secret base64).
/// - No `redirect_uri` in the code exchange body.
/// - Scopes are comma separated in the authorize URL.
pub struct GarminProvider {
    client_id: String,
    client_secret: String,
    auth_endpoint: String,
    token_endpoint: String,
    http: reqwest::Client,
}

impl GarminProvider {
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            client_id,
            client_secret,
            auth_endpoint: DEFAULT_AUTH_URL.to_string(),
            token_endpoint: DEFAULT_TOKEN_URL.to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// Point the provider at different authorize/token endpoints.
    pub fn with_endpoints(mut self, auth_endpoint: &str, token_endpoint: &str) -> Self {
        self.auth_endpoint = auth_endpoint.to_string();
        self.token_endpoint = token_endpoint.to_string();
        self
    }

    async fn post_token_form(
        &self,
        form: &[(&str, &str)],
    ) -> Result<(StatusCode, String), reqwest::Error> {
        let resp = self
            .http
            .post(&self.token_endpoint)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(form)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        Ok((status, body))
    }
}

#[async_trait]
impl OAuthProvider for GarminProvider {
    fn id(&self) -> &str {
        "garmin"
    }

    fn display_name(&self) -> &str {
        "Garmin Connect"
    }

    fn auth_url(&self, scopes: &[String], state: &str, redirect_uri: &str) -> String {
        let scope_str = scopes.join(",");
        format!(
            "{endpoint}?\
             client_id={client_id}\
             &response_type=code\
             &redirect_uri={redirect_uri}\
             &scope={scope}\
             &state={state}",
            endpoint = self.auth_endpoint,
            client_id = urlencoding(&self.client_id),
            redirect_uri = urlencoding(redirect_uri),
            scope = urlencoding(&scope_str),
            state = urlencoding(state),
        )
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenSet, AuthError> {
        debug!("Exchanging Garmin authorization code for token");

        let (status, body) = self
            .post_token_form(&[("grant_type", "authorization_code"), ("code", code)])
            .await
            .map_err(|e| AuthError::Transport(format!("Token exchange request failed: {e}")))?;

        info!("Token exchange response status: {}", status.as_u16());

        if !status.is_success() {
            return Err(AuthError::AuthExchange {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| AuthError::InvalidTokenResponse(e.to_string()))
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenSet, AuthError> {
        let (status, body) = self
            .post_token_form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .await
            .map_err(|e| AuthError::RefreshFailed {
                kind: RefreshFailure::Transient,
                message: format!("Refresh request failed: {e}"),
            })?;

        if !status.is_success() {
            let kind = refresh_failure_for_status(status);
            warn!("Garmin refresh answered {} ({kind})", status.as_u16());
            return Err(AuthError::RefreshFailed {
                kind,
                message: format!("{} - {body}", status.as_u16()),
            });
        }

        serde_json::from_str(&body).map_err(|e| AuthError::RefreshFailed {
            kind: RefreshFailure::Rejected,
            message: format!("Failed to parse refresh response: {e}"),
        })
    }
}

/// Server-side trouble may clear up; a 4xx means the refresh token is no good.
fn refresh_failure_for_status(status: StatusCode) -> RefreshFailure {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        RefreshFailure::Transient
    } else {
        RefreshFailure::Rejected
    }
}

fn urlencoding(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_url_encodes_parameters() {
        let provider = GarminProvider::new("client id".into(), "secret".into());
        let url = provider.auth_url(
            &["activity.read".into(), "body_composition.read".into()],
            "st/ate",
            "https://app.example/garmin-callback",
        );

        assert!(url.starts_with("https://connect.garmin.com/oauthConfirm?client_id=client+id"));
        assert!(url.contains("&response_type=code"));
        assert!(url.contains("&redirect_uri=https%3A%2F%2Fapp.example%2Fgarmin-callback"));
        assert!(url.contains("&scope=activity.read%2Cbody_composition.read"));
        assert!(url.contains("&state=st%2Fate"));
    }

    #[test]
    fn test_refresh_failure_classification() {
        assert_eq!(
            refresh_failure_for_status(StatusCode::BAD_REQUEST),
            RefreshFailure::Rejected
        );
        assert_eq!(
            refresh_failure_for_status(StatusCode::UNAUTHORIZED),
            RefreshFailure::Rejected
        );
        assert_eq!(
            refresh_failure_for_status(StatusCode::BAD_GATEWAY),
            RefreshFailure::Transient
        );
        assert_eq!(
            refresh_failure_for_status(StatusCode::TOO_MANY_REQUESTS),
            RefreshFailure::Transient
        );
    }

    #[test]
    fn test_token_set_debug_redacts_secrets() {
        let tokens = TokenSet {
            access_token: "at-secret".into(),
            refresh_token: "rt-secret".into(),
            expires_in: 3600,
            token_type: "bearer".into(),
        };
        let printed = format!("{tokens:?}");
        assert!(!printed.contains("at-secret"));
        assert!(!printed.contains("rt-secret"));
    }
}
