use serde::{Deserialize, Serialize};

/// Which queued proposal is surfaced next once the current one resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BacklogOrder {
    #[default]
    Lifo,
    Fifo,
}

/// What happens to a session whose namespaces become empty after the
/// wallet's active chains change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptySessionPolicy {
    #[default]
    KeepSession,
    Disconnect,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    pub backlog_order: BacklogOrder,
    pub empty_session_policy: EmptySessionPolicy,
    /// `None` leaves the current proposal up until the user decides.
    pub proposal_decision_timeout_ms: Option<u64>,
    /// How many answered request ids, and finished proposal ids, are
    /// remembered for duplicate detection.
    pub responded_history_limit: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            backlog_order: BacklogOrder::Lifo,
            empty_session_policy: EmptySessionPolicy::KeepSession,
            proposal_decision_timeout_ms: None,
            responded_history_limit: 1_024,
        }
    }
}
