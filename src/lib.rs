pub mod api;
pub mod changes;
pub mod config;
pub mod crypto;
pub mod error;
pub mod insights;
pub mod providers;
pub mod session;
pub mod store;
pub mod wellness;

pub use config::Config;
pub use error::AuthError;

use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared application state passed to all API handlers.
pub struct AppState {
    pub config: Config,
    pub crypto: Arc<crypto::CryptoEngine>,
    pub session: session::SessionManager,
    pub changes: changes::ChangeLog,
    /// Aggregates from the most recent successful fetch.
    pub body_battery: RwLock<Vec<wellness::DailyAggregate>>,
}

impl AppState {
    pub fn new(
        config: Config,
        crypto: Arc<crypto::CryptoEngine>,
        session: session::SessionManager,
    ) -> Self {
        Self {
            config,
            crypto,
            session,
            changes: changes::ChangeLog::new(),
            body_battery: RwLock::new(Vec::new()),
        }
    }
}

pub type SharedState = Arc<AppState>;
