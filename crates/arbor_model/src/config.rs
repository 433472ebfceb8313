//! Registry configuration.

/// Limits applied by a [`ModelRegistry`](crate::registry::ModelRegistry).
///
/// # Example
///
/// ```
/// use arbor_model::config::RegistryConfig;
///
/// let config = RegistryConfig::default()
///     .with_max_trigger_iterations(500)
///     .with_max_reentrancy_depth(16);
///
/// assert_eq!(config.max_trigger_iterations(), 500);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    max_trigger_iterations: usize,
    max_reentrancy_depth: usize,
    max_parent_depth: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_trigger_iterations: 10_000,
            max_reentrancy_depth: 64,
            max_parent_depth: 256,
        }
    }
}

impl RegistryConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how many queued triggers a single top-level drain may process
    /// before failing with a rule cycle.
    #[must_use]
    pub fn with_max_trigger_iterations(mut self, limit: usize) -> Self {
        self.max_trigger_iterations = limit;
        self
    }

    /// Sets how deeply rule drains may nest through stage advances.
    #[must_use]
    pub fn with_max_reentrancy_depth(mut self, limit: usize) -> Self {
        self.max_reentrancy_depth = limit;
        self
    }

    /// Sets the longest parent chain walked when advancing an entity.
    #[must_use]
    pub fn with_max_parent_depth(mut self, limit: usize) -> Self {
        self.max_parent_depth = limit;
        self
    }

    /// Returns the trigger iteration budget.
    #[must_use]
    pub fn max_trigger_iterations(&self) -> usize {
        self.max_trigger_iterations
    }

    /// Returns the nested drain limit.
    #[must_use]
    pub fn max_reentrancy_depth(&self) -> usize {
        self.max_reentrancy_depth
    }

    /// Returns the parent chain limit.
    #[must_use]
    pub fn max_parent_depth(&self) -> usize {
        self.max_parent_depth
    }
}
