//! The per-scenario handle every principal is bound to.

use crate::error::TestkitError;
use std::sync::Arc;
use testkit_client::GatewayClient;
use testkit_config::SessionSettings;
use testkit_types::ClusterMode;

/// One gateway target plus the mode and settings of the running scenario.
///
/// Constructed once per scenario and passed to [`crate::Admin`] and every
/// [`crate::User`]; clones share the same HTTP client.
#[derive(Debug, Clone)]
pub struct GatewaySession {
    client: Arc<GatewayClient>,
    mode: ClusterMode,
    settings: SessionSettings,
}

impl GatewaySession {
    pub fn new(client: GatewayClient, mode: ClusterMode, settings: SessionSettings) -> Self {
        Self {
            client: Arc::new(client),
            mode,
            settings,
        }
    }

    /// Build the HTTP client and wrap it.
    pub fn connect(
        admin_url: &str,
        public_url: &str,
        mode: ClusterMode,
        settings: SessionSettings,
    ) -> Result<Self, TestkitError> {
        let client = GatewayClient::new(admin_url, public_url, &settings)?;
        Ok(Self::new(client, mode, settings))
    }

    pub fn client(&self) -> &GatewayClient {
        &self.client
    }

    pub fn mode(&self) -> ClusterMode {
        self.mode
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }
}
