//! Key registry configuration.

/// Configuration for a [`KeyRegistry`](crate::KeyRegistry).
#[derive(Debug, Clone)]
pub struct KeyBoxConfig {
    /// Number of lock stripes guarding instance attachments.
    ///
    /// First access to two instances only contends when both land on the same
    /// stripe.
    pub shards: usize,

    /// Attachments between automatic sweeps of released instances (0 = never).
    pub purge_interval: usize,

    /// Whether an instance-less key ring creates its source as soon as every
    /// part has a value.
    pub instantiate_on_complete: bool,
}

impl Default for KeyBoxConfig {
    fn default() -> Self {
        Self {
            shards: 16,
            purge_interval: 1024,
            instantiate_on_complete: true,
        }
    }
}

impl KeyBoxConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of lock stripes (at least one).
    #[must_use]
    pub const fn shards(mut self, shards: usize) -> Self {
        self.shards = if shards == 0 { 1 } else { shards };
        self
    }

    /// Sets how many attachments happen between automatic sweeps.
    #[must_use]
    pub const fn purge_interval(mut self, interval: usize) -> Self {
        self.purge_interval = interval;
        self
    }

    /// Sets whether completed instance-less rings instantiate their source.
    #[must_use]
    pub const fn instantiate_on_complete(mut self, value: bool) -> Self {
        self.instantiate_on_complete = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = KeyBoxConfig::default();
        assert_eq!(config.shards, 16);
        assert_eq!(config.purge_interval, 1024);
        assert!(config.instantiate_on_complete);
    }

    #[test]
    fn builder_pattern() {
        let config = KeyBoxConfig::new()
            .shards(0)
            .purge_interval(8)
            .instantiate_on_complete(false);

        assert_eq!(config.shards, 1);
        assert_eq!(config.purge_interval, 8);
        assert!(!config.instantiate_on_complete);
    }
}
