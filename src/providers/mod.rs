mod garmin;
mod traits;

pub use garmin::GarminProvider;
pub use traits::{OAuthProvider, TokenSet};

use crate::config::Config;

/// Build the Garmin provider from configured credentials and endpoints.
pub fn garmin_from_config(config: &Config) -> GarminProvider {
    GarminProvider::new(
        config.garmin_client_id.clone(),
        config.garmin_client_secret.clone(),
    )
    .with_endpoints(&config.garmin_auth_url, &config.garmin_token_url)
}
