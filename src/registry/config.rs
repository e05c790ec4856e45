//! Registry configuration

use std::time::Duration;

use crate::proxy::ProxyConfig;

/// Default time a new connection stays available for de-duplication
pub const DEFAULT_DEDUP_WINDOW: Duration = Duration::from_secs(10);

/// Connection registry configuration
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// How long the registry keeps a new source attachable, independent of
    /// client behaviour
    pub dedup_window: Duration,

    /// Ring buffer sizing for sources started by the registry
    pub proxy: ProxyConfig,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            dedup_window: DEFAULT_DEDUP_WINDOW,
            proxy: ProxyConfig::default(),
        }
    }
}

impl RegistryConfig {
    /// Set the de-duplication window
    pub fn dedup_window(mut self, window: Duration) -> Self {
        self.dedup_window = window;
        self
    }

    /// Set the proxy configuration
    pub fn proxy(mut self, proxy: ProxyConfig) -> Self {
        self.proxy = proxy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RegistryConfig::default();

        assert_eq!(config.dedup_window, Duration::from_secs(10));
        assert_eq!(config.proxy, ProxyConfig::default());
    }

    #[test]
    fn test_builder_chaining() {
        let proxy = ProxyConfig::default().block_size(4096);
        let config = RegistryConfig::default()
            .dedup_window(Duration::from_millis(500))
            .proxy(proxy);

        assert_eq!(config.dedup_window, Duration::from_millis(500));
        assert_eq!(config.proxy.block_size, 4096);
    }
}
