//! Controller and pool settings.

/// Settings shared by every controller built from one [`crate::ControllerEnv`].
#[derive(Debug, Clone, Default)]
pub struct ControllerConfig {
    /// Send fault messages to clients verbatim instead of `"error"`.
    pub debug: bool,
    /// Record outbound actions instead of performing them.
    pub capture: bool,
}

#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Idle controllers kept for reuse; extra returns are dropped.
    pub max_idle: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { max_idle: 256 }
    }
}
