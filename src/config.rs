//! Configuration types for the consumer coordination layer.

use std::time::Duration;

/// Main configuration for a group consumer.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Consumer group this member belongs to.
    pub group_id: String,

    /// Client identifier, used in logs only.
    pub client_id: String,

    /// Group coordination configuration.
    pub coordination: CoordinationConfig,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            group_id: "default-group".to_string(),
            client_id: "cohort".to_string(),
            coordination: CoordinationConfig::default(),
        }
    }
}

impl ConsumerConfig {
    /// Create a new configuration for the given group.
    pub fn new(group_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            ..Default::default()
        }
    }

    /// Set the client identifier.
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    /// Set the coordination configuration.
    pub fn with_coordination_config(mut self, coordination: CoordinationConfig) -> Self {
        self.coordination = coordination;
        self
    }

    /// Set the rebalance timeout directly.
    pub fn with_rebalance_timeout(mut self, timeout: Duration) -> Self {
        self.coordination.rebalance_timeout = timeout;
        self
    }
}

/// Group coordination configuration.
#[derive(Debug, Clone)]
pub struct CoordinationConfig {
    /// Maximum time to wait for the group-wide revocation barrier
    /// before failing the rebalance.
    pub rebalance_timeout: Duration,

    /// Session timeout after which the coordinator considers this
    /// member dead if no heartbeat arrives.
    pub session_timeout: Duration,

    /// Interval between background liveness heartbeats.
    pub heartbeat_interval: Duration,
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            rebalance_timeout: Duration::from_secs(30),
            session_timeout: Duration::from_secs(30),
            heartbeat_interval: Duration::from_secs(3),
        }
    }
}

impl CoordinationConfig {
    /// Set the rebalance timeout.
    pub fn with_rebalance_timeout(mut self, timeout: Duration) -> Self {
        self.rebalance_timeout = timeout;
        self
    }

    /// Set the session timeout.
    pub fn with_session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = timeout;
        self
    }

    /// Set the heartbeat interval.
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ConsumerConfig::default();
        assert_eq!(config.group_id, "default-group");
        assert_eq!(
            config.coordination.rebalance_timeout,
            Duration::from_secs(30)
        );
    }

    #[test]
    fn test_config_builder() {
        let config = ConsumerConfig::new("payments")
            .with_client_id("worker-7")
            .with_rebalance_timeout(Duration::from_secs(5));

        assert_eq!(config.group_id, "payments");
        assert_eq!(config.client_id, "worker-7");
        assert_eq!(config.coordination.rebalance_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_coordination_builder() {
        let coordination = CoordinationConfig::default()
            .with_session_timeout(Duration::from_secs(10))
            .with_heartbeat_interval(Duration::from_secs(1));

        assert_eq!(coordination.session_timeout, Duration::from_secs(10));
        assert_eq!(coordination.heartbeat_interval, Duration::from_secs(1));
    }
}
