//! Client factory and a name-keyed registry of enabled platforms.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, warn};

use super::{FunZoneClient, PlatformClient, StubHubClient, TickPickClient, ViagogoClient};
use crate::config::Config;
use crate::error::Result;
use crate::models::Platform;
use crate::rate_limit::{InMemoryRateLimitStore, RateGovernor};

/// Build the client for `platform`.
pub fn create_client(
    platform: Platform,
    config: &Config,
    rate: RateGovernor,
) -> Result<Arc<dyn PlatformClient>> {
    let client: Arc<dyn PlatformClient> = match platform {
        Platform::StubHub => Arc::new(StubHubClient::new(config, rate)?),
        Platform::FunZone => Arc::new(FunZoneClient::new(config, rate)?),
        Platform::TickPick => Arc::new(TickPickClient::new(config, rate)?),
        Platform::Viagogo => Arc::new(ViagogoClient::new(config, rate)?),
    };
    Ok(client)
}

/// Rate governor for `config`: Redis when `redis_url` is set and the
/// `redis-backend` feature is compiled in, otherwise process-local.
pub async fn build_rate_governor(config: &Config) -> RateGovernor {
    let rules = config.rate_rules();

    #[cfg(feature = "redis-backend")]
    {
        if let Some(url) = config.redis_url.as_deref() {
            match crate::rate_limit::RedisRateLimitStore::new(url).await {
                Ok(store) => {
                    tracing::info!("Using Redis rate-limit store");
                    return RateGovernor::new(Arc::new(store), rules);
                }
                Err(e) => warn!(error = %e, "Redis unavailable, using in-memory rate limits"),
            }
        }
    }

    #[cfg(not(feature = "redis-backend"))]
    {
        if config.redis_url.is_some() {
            warn!("REDIS_URL set but redis-backend feature is disabled, using in-memory rate limits");
        }
    }

    RateGovernor::new(Arc::new(InMemoryRateLimitStore::new()), rules)
}

/// Enabled platform clients by name.
#[derive(Default, Clone)]
pub struct PlatformRegistry {
    clients: BTreeMap<String, Arc<dyn PlatformClient>>,
}

impl PlatformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// One client per enabled platform, all sharing `rate`.
    ///
    /// A platform whose client cannot be built is skipped with a warning.
    pub fn from_config(config: &Config, rate: RateGovernor) -> Self {
        let mut registry = Self::new();
        for platform in Platform::ALL {
            if !config.platform(platform).enabled {
                debug!(platform = %platform, "Platform disabled, not registering");
                continue;
            }
            match create_client(platform, config, rate.clone()) {
                Ok(client) => registry.register(client),
                Err(e) => warn!(platform = %platform, error = %e, "Failed to create client"),
            }
        }
        registry
    }

    pub fn register(&mut self, client: Arc<dyn PlatformClient>) {
        self.clients
            .insert(client.platform_name().to_string(), client);
    }

    /// Client by platform name, case-insensitive.
    pub fn get(&self, name: &str) -> Option<Arc<dyn PlatformClient>> {
        let platform = Platform::from_str(name)?;
        self.clients.get(platform.as_str()).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.clients.keys().map(String::as_str).collect()
    }

    pub fn clients(&self) -> impl Iterator<Item = &Arc<dyn PlatformClient>> {
        self.clients.values()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
