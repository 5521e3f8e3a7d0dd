//! Garmin session lifecycle.
//!
//! `SessionManager` owns the OAuth token set for one user session:
//! - code exchange at the end of the authorize redirect
//! - persistence of the token blob in a `SecretStore`
//! - bearer authentication of wellness API requests
//! - a single refresh-and-retry when the API answers 401
//!
//! The manager is constructed explicitly and shared through `AppState`;
//! tests build as many independent managers as they need.
//!
//! Concurrent 401s are not coordinated: each call performs its own single
//! refresh-and-retry. Only one UI data fetch runs at a time in practice.

use reqwest::{Method, StatusCode};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::error::{AuthError, RefreshFailure};
use crate::providers::{OAuthProvider, TokenSet};
use crate::store::{SecretStore, TOKEN_STORAGE_KEY};

/// Whether a freshly obtained token set reached the secure store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persistence {
    Persisted,
    /// Connected for the lifetime of this process only.
    MemoryOnly,
}

/// Describes a wellness API request before the bearer token is attached.
#[derive(Debug, Clone)]
pub struct ResourceRequest {
    pub method: Method,
    /// Path relative to the API base URL, e.g. `/wellness-api/rest/stressDetails`.
    pub path: String,
    pub query: Vec<(String, String)>,
}

impl ResourceRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            query: Vec::new(),
        }
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }
}

pub struct SessionManager {
    provider: Arc<dyn OAuthProvider>,
    store: Arc<dyn SecretStore>,
    tokens: RwLock<Option<TokenSet>>,
    http: reqwest::Client,
    api_base_url: String,
}

impl SessionManager {
    pub fn new(
        provider: Arc<dyn OAuthProvider>,
        store: Arc<dyn SecretStore>,
        api_base_url: &str,
    ) -> Self {
        Self {
            provider,
            store,
            tokens: RwLock::new(None),
            http: reqwest::Client::new(),
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn provider(&self) -> &dyn OAuthProvider {
        self.provider.as_ref()
    }

    /// Load a previously persisted session. Returns whether one was found.
    ///
    /// A blob that cannot be read or decoded is logged and ignored; the
    /// session then starts unauthenticated.
    pub async fn restore(&self) -> bool {
        let restored = match self.store.get(TOKEN_STORAGE_KEY).await {
            Ok(Some(blob)) => match serde_json::from_str::<TokenSet>(&blob) {
                Ok(tokens) => Some(tokens),
                Err(e) => {
                    error!("Error loading tokens: stored blob is not a token set: {e}");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                error!("Error loading tokens: {e}");
                None
            }
        };

        let found = restored.is_some();
        *self.tokens.write().await = restored;
        if found {
            info!("Restored persisted {} session", self.provider.id());
        }
        found
    }

    /// Exchange a one-time authorization code for tokens and install them.
    pub async fn exchange_code_for_token(&self, code: &str) -> Result<Persistence, AuthError> {
        let tokens = self.provider.exchange_code(code).await.inspect_err(|e| {
            error!("Token exchange error: {e}");
        })?;

        info!("Token exchange successful, saving tokens");
        Ok(self.install(tokens).await)
    }

    /// True iff an access token is held in memory. Does not contact the server.
    pub async fn is_authenticated(&self) -> bool {
        self.tokens
            .read()
            .await
            .as_ref()
            .is_some_and(|t| !t.access_token.is_empty())
    }

    /// Forget the session in memory and in the store. Safe to call repeatedly.
    ///
    /// The in-memory tokens are gone even when the store delete fails.
    pub async fn clear_session(&self) -> Result<(), AuthError> {
        self.tokens.write().await.take();
        self.store.delete(TOKEN_STORAGE_KEY).await.inspect_err(|e| {
            error!("Error clearing tokens: {e}");
        })
    }

    /// Send `request` with the current bearer token.
    ///
    /// On a 401 the session is refreshed once and the request repeated once.
    /// Every other response, successful or not, is handed back unchanged.
    pub async fn fetch_authenticated_resource(
        &self,
        request: &ResourceRequest,
    ) -> Result<reqwest::Response, AuthError> {
        let token = self.access_token().await?;
        let resp = self.send(request, &token).await?;
        if resp.status() != StatusCode::UNAUTHORIZED {
            return Ok(resp);
        }

        warn!("{} answered 401 for {}, refreshing session", self.provider.id(), request.path);
        self.refresh().await?;

        let token = self.access_token().await?;
        let retried = self.send(request, &token).await?;
        if retried.status() == StatusCode::UNAUTHORIZED {
            warn!("Refreshed token rejected for {}, ending session", request.path);
            self.clear_session().await.ok();
            return Err(AuthError::AuthenticationRequired);
        }
        Ok(retried)
    }

    /// Replace the token set using the refresh token.
    ///
    /// Any failure leaves the session unauthenticated. A terminal failure also
    /// drops the persisted blob; a transient one keeps it so the next start
    /// can try again.
    async fn refresh(&self) -> Result<(), AuthError> {
        let refresh_token = self
            .tokens
            .read()
            .await
            .as_ref()
            .filter(|t| t.has_refresh_token())
            .map(|t| t.refresh_token.clone());

        let result = match refresh_token {
            Some(rt) => self.provider.refresh_token(&rt).await,
            None => Err(AuthError::RefreshFailed {
                kind: RefreshFailure::MissingRefreshToken,
                message: "No refresh token available".into(),
            }),
        };

        match result {
            Ok(tokens) => {
                info!("Refreshed {} access token", self.provider.id());
                self.install(tokens).await;
                Ok(())
            }
            Err(e) => {
                let terminal = match &e {
                    AuthError::RefreshFailed { kind, .. } => kind.is_terminal(),
                    _ => true,
                };
                if terminal {
                    error!("Refresh failed, clearing session: {e}");
                    self.clear_session().await.ok();
                } else {
                    warn!("Refresh failed, keeping persisted tokens for next start: {e}");
                    self.tokens.write().await.take();
                }
                Err(e)
            }
        }
    }

    /// Set the in-memory session, then persist it. Persistence failure is
    /// logged and reported, never fatal.
    async fn install(&self, tokens: TokenSet) -> Persistence {
        let blob = serde_json::to_string(&tokens);
        *self.tokens.write().await = Some(tokens);

        let saved = match blob {
            Ok(blob) => self.store.set(TOKEN_STORAGE_KEY, &blob).await,
            Err(e) => Err(AuthError::Storage(format!("failed to serialize tokens: {e}"))),
        };

        match saved {
            Ok(()) => Persistence::Persisted,
            Err(e) => {
                error!("Error saving tokens: {e}");
                Persistence::MemoryOnly
            }
        }
    }

    async fn access_token(&self) -> Result<String, AuthError> {
        // Clone out so the lock is not held across the request.
        self.tokens
            .read()
            .await
            .as_ref()
            .map(|t| t.access_token.clone())
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::AuthenticationRequired)
    }

    async fn send(
        &self,
        request: &ResourceRequest,
        access_token: &str,
    ) -> Result<reqwest::Response, AuthError> {
        let url = format!(
            "{}/{}",
            self.api_base_url,
            request.path.trim_start_matches('/')
        );

        self.http
            .request(request.method.clone(), &url)
            .query(&request.query)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AuthError::Transport(format!("{} {url}: {e}", request.method)))
    }
}
