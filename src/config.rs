//! Store configuration with sensible defaults.

/// Expected number of user variables in a typical session; the index is
/// presized for this many entries on first `set`.
pub const DEFAULT_INITIAL_CAPACITY: usize = 32;

/// What `delete` reports when the key is not in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingKeyPolicy {
    /// Silent no-op: `delete` returns `Ok(false)`.
    #[default]
    Ignore,

    /// `delete` fails with `UserVarError::KeyNotFound`.
    Error,
}

/// Configuration for a `UserVarStore`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Number of entries the index is sized for when the store initializes.
    pub initial_capacity: usize,

    /// Policy applied uniformly to every `delete` of an absent key.
    pub missing_key_policy: MissingKeyPolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            missing_key_policy: MissingKeyPolicy::Ignore,
        }
    }
}

impl StoreConfig {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for StoreConfig
#[derive(Default)]
pub struct ConfigBuilder {
    config: StoreConfig,
}

impl ConfigBuilder {
    /// Set the number of entries to presize the index for
    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.config.initial_capacity = capacity;
        self
    }

    /// Set the missing-key policy for `delete`
    pub fn missing_key_policy(mut self, policy: MissingKeyPolicy) -> Self {
        self.config.missing_key_policy = policy;
        self
    }

    pub fn build(self) -> StoreConfig {
        self.config
    }
}
