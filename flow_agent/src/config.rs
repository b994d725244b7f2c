//! Engine configuration.

use crate::workflow::nodes::ShellConfig;
use flow_core::schedule::DEFAULT_PLAN_CACHE_SIZE;
use std::time::Duration;

/// Configuration for a [`WorkflowEngine`](crate::workflow::WorkflowEngine).
///
/// # Example
///
/// ```ignore
/// let config = EngineConfig::default()
///     .with_node_timeout(Duration::from_secs(120))
///     .with_halt_on_error(true);
/// let engine = WorkflowEngine::new(config);
/// ```
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Upper bound for a single node dispatch; `None` waits indefinitely
    pub node_timeout: Option<Duration>,
    /// Stop dispatching after the first node error
    pub halt_on_error: bool,
    /// Number of memoized execution plans
    pub plan_cache_size: usize,
    /// Settings for the built-in shell executor
    pub shell: ShellConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            node_timeout: None,
            halt_on_error: false,
            plan_cache_size: DEFAULT_PLAN_CACHE_SIZE,
            shell: ShellConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Sets the per-node timeout.
    pub fn with_node_timeout(mut self, timeout: Duration) -> Self {
        self.node_timeout = Some(timeout);
        self
    }

    /// Sets whether the first node error stops dispatching.
    pub fn with_halt_on_error(mut self, halt: bool) -> Self {
        self.halt_on_error = halt;
        self
    }

    /// Sets the plan cache size. Zero disables memoization.
    pub fn with_plan_cache_size(mut self, size: usize) -> Self {
        self.plan_cache_size = size;
        self
    }

    /// Sets the shell executor configuration.
    pub fn with_shell(mut self, shell: ShellConfig) -> Self {
        self.shell = shell;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert!(config.node_timeout.is_none());
        assert!(!config.halt_on_error);
        assert_eq!(config.plan_cache_size, 64);
    }

    #[test]
    fn test_builder() {
        let config = EngineConfig::default()
            .with_node_timeout(Duration::from_secs(5))
            .with_halt_on_error(true)
            .with_plan_cache_size(0);
        assert_eq!(config.node_timeout, Some(Duration::from_secs(5)));
        assert!(config.halt_on_error);
        assert_eq!(config.plan_cache_size, 0);
    }
}
