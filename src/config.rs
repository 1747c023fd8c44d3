//! Tuning knobs for solvers and backends.

use std::time::Duration;

/// Solver configuration.
///
/// ```
/// use std::time::Duration;
/// use symbv_rs::config::Config;
///
/// let config = Config::default()
///     .with_timeout(Some(Duration::from_millis(500)))
///     .with_node_limit(1 << 18);
/// assert_eq!(config.node_limit, 1 << 18);
/// ```
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Config {
    /// Wall-clock budget of a single backend query; `None` waits forever.
    pub timeout: Option<Duration>,
    /// BDD node budget of quick-check queries.
    pub quick_node_limit: usize,
    /// BDD node budget of full queries.
    pub node_limit: usize,
    /// Initial size (log2) of the BDD unique table.
    pub storage_bits: usize,
    /// Initial size (log2) of the ITE computed table.
    pub cache_bits: usize,
    /// Number of values requested by single-value helpers.
    pub default_n: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(30)),
            quick_node_limit: 1 << 12,
            node_limit: 1 << 22,
            storage_bits: 16,
            cache_bits: 14,
            default_n: 1,
        }
    }
}

impl Config {
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the timeout in milliseconds.
    pub fn with_timeout_ms(self, ms: u64) -> Self {
        self.with_timeout(Some(Duration::from_millis(ms)))
    }

    pub fn with_quick_node_limit(mut self, limit: usize) -> Self {
        self.quick_node_limit = limit;
        self
    }

    pub fn with_node_limit(mut self, limit: usize) -> Self {
        self.node_limit = limit;
        self
    }

    pub fn with_storage_bits(mut self, bits: usize) -> Self {
        self.storage_bits = bits;
        self
    }

    pub fn with_cache_bits(mut self, bits: usize) -> Self {
        self.cache_bits = bits;
        self
    }

    pub fn with_default_n(mut self, n: usize) -> Self {
        self.default_n = n;
        self
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_builders() {
        let config = Config::default()
            .with_timeout_ms(250)
            .with_quick_node_limit(10)
            .with_cache_bits(8)
            .with_storage_bits(9)
            .with_default_n(4);
        assert_eq!(config.timeout, Some(Duration::from_millis(250)));
        assert_eq!(config.quick_node_limit, 10);
        assert_eq!(config.cache_bits, 8);
        assert_eq!(config.storage_bits, 9);
        assert_eq!(config.default_n, 4);
        assert_eq!(config.node_limit, Config::default().node_limit);
        assert_eq!(Config::default().with_timeout(None).timeout, None);
    }
}
