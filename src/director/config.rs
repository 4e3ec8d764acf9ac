//! Director configuration.

/// Configuration for the [`Director`](super::Director).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectorConfig {
    /// Call the deadlock reporter when every active actor is blocked.
    pub report_deadlock: bool,
    /// After a deadlock is detected, request a finish so the blocked actors
    /// return [`Terminated`](crate::RendezvousError::Terminated).
    pub finish_on_deadlock: bool,
    /// Prefix for the names of spawned actor threads (`<prefix>-<actor>`).
    pub thread_name_prefix: String,
}

impl Default for DirectorConfig {
    fn default() -> Self {
        Self {
            report_deadlock: true,
            finish_on_deadlock: false,
            thread_name_prefix: "rendezvous".to_string(),
        }
    }
}

impl DirectorConfig {
    /// Enable or suppress deadlock reports.
    #[must_use]
    pub const fn with_report_deadlock(mut self, report: bool) -> Self {
        self.report_deadlock = report;
        self
    }

    /// Finish the run automatically once a deadlock is detected.
    #[must_use]
    pub const fn with_finish_on_deadlock(mut self, finish: bool) -> Self {
        self.finish_on_deadlock = finish;
        self
    }

    /// Set the thread name prefix.
    #[must_use]
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    pub(crate) fn thread_name(&self, actor: &str) -> String {
        format!("{}-{actor}", self.thread_name_prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = DirectorConfig::default();
        assert!(config.report_deadlock);
        assert!(!config.finish_on_deadlock);
        assert_eq!(config.thread_name("merge"), "rendezvous-merge");
    }

    #[test]
    fn test_config_builders() {
        let config = DirectorConfig::default()
            .with_report_deadlock(false)
            .with_finish_on_deadlock(true)
            .with_thread_name_prefix("csp");
        assert!(!config.report_deadlock);
        assert!(config.finish_on_deadlock);
        assert_eq!(config.thread_name("sink"), "csp-sink");
    }
}
