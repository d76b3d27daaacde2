//! Hub configuration

/// Default bound on deliveries per `run_until_idle` call.
pub const DEFAULT_STEP_LIMIT: usize = 10_000;

/// Runtime knobs of a hub instance
///
/// This is distinct from the shared configuration the hub broadcasts to its
/// ports: it shapes the hub itself and is never seen by ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubConfig {
    /// Maximum deliveries performed by one `run_until_idle` call
    pub step_limit: usize,
}

impl HubConfig {
    /// Sets the step limit
    pub fn with_step_limit(mut self, step_limit: usize) -> Self {
        self.step_limit = step_limit;
        self
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            step_limit: DEFAULT_STEP_LIMIT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_step_limit() {
        assert_eq!(HubConfig::default().step_limit, DEFAULT_STEP_LIMIT);
        assert_eq!(HubConfig::default().with_step_limit(3).step_limit, 3);
    }
}
