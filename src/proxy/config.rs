//! Stream proxy configuration

/// Default ring buffer block size (1 MiB)
pub const DEFAULT_BLOCK_SIZE: usize = 1024 * 1024;

/// Default number of blocks in the ring buffer
pub const DEFAULT_BLOCK_COUNT: usize = 16;

/// Smallest block count for which the eviction gate can always make progress
pub const MIN_BLOCK_COUNT: usize = 4;

/// Ring buffer sizing for a [`StreamSource`](super::StreamSource)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Unit of production, delivery and eviction in bytes
    pub block_size: usize,

    /// Number of blocks in the ring buffer
    pub block_count: usize,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            block_count: DEFAULT_BLOCK_COUNT,
        }
    }
}

impl ProxyConfig {
    /// Set the block size (at least 1 byte)
    pub fn block_size(mut self, size: usize) -> Self {
        self.block_size = size.max(1);
        self
    }

    /// Set the block count (at least [`MIN_BLOCK_COUNT`])
    pub fn block_count(mut self, count: usize) -> Self {
        self.block_count = count.max(MIN_BLOCK_COUNT);
        self
    }

    /// Ring buffer capacity in bytes
    pub fn capacity(&self) -> usize {
        self.block_size * self.block_count
    }

    /// The same sizing with the builder limits applied
    ///
    /// The fields are public, so a struct literal can bypass the builders.
    pub(crate) fn clamped(self) -> Self {
        Self::default()
            .block_size(self.block_size)
            .block_count(self.block_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ProxyConfig::default();

        assert_eq!(config.block_size, 1_048_576);
        assert_eq!(config.block_count, 16);
        assert_eq!(config.capacity(), 16 * 1024 * 1024);
    }

    #[test]
    fn test_builder_limits() {
        let config = ProxyConfig::default().block_size(0).block_count(1);

        assert_eq!(config.block_size, 1);
        assert_eq!(config.block_count, MIN_BLOCK_COUNT);
    }

    #[test]
    fn test_clamped_literal() {
        let config = ProxyConfig {
            block_size: 0,
            block_count: 2,
        }
        .clamped();

        assert_eq!(config.block_size, 1);
        assert_eq!(config.block_count, MIN_BLOCK_COUNT);
        assert_eq!(ProxyConfig::default().clamped(), ProxyConfig::default());
    }

    #[test]
    fn test_builder_chaining() {
        let config = ProxyConfig::default().block_size(4096).block_count(8);

        assert_eq!(config.capacity(), 32 * 1024);
    }
}
