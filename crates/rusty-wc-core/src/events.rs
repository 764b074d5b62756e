//! Inbound events, wallet commands and outbound messages of the broker.

use serde::{Deserialize, Serialize};

use crate::domain::{
    JsonRpcResponse, ProtocolReason, RequestOutcome, Session, SessionNamespaces,
    SessionProposal, SessionRequest, TimestampMs, WalletActionRequest,
};

/// Everything the pairing/transport client can tell us.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProtocolEvent {
    SessionProposal(SessionProposal),
    SessionRequest(SessionRequest),
    SessionSettled {
        #[serde(default)]
        proposal_id: Option<u64>,
        session: Session,
    },
    SessionDeleted {
        topic: String,
        #[serde(default)]
        reason: Option<ProtocolReason>,
    },
    SessionUpdated {
        topic: String,
        namespaces: SessionNamespaces,
    },
    SessionExtended {
        topic: String,
        expires_at_ms: TimestampMs,
    },
}

impl ProtocolEvent {
    pub fn topic(&self) -> Option<&str> {
        match self {
            ProtocolEvent::SessionProposal(_) => None,
            ProtocolEvent::SessionRequest(req) => Some(&req.topic),
            ProtocolEvent::SessionSettled { session, .. } => Some(&session.topic),
            ProtocolEvent::SessionDeleted { topic, .. }
            | ProtocolEvent::SessionUpdated { topic, .. }
            | ProtocolEvent::SessionExtended { topic, .. } => Some(topic),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ProtocolEvent::SessionProposal(_) => "session_proposal",
            ProtocolEvent::SessionRequest(_) => "session_request",
            ProtocolEvent::SessionSettled { .. } => "session_settled",
            ProtocolEvent::SessionDeleted { .. } => "session_deleted",
            ProtocolEvent::SessionUpdated { .. } => "session_updated",
            ProtocolEvent::SessionExtended { .. } => "session_extended",
        }
    }
}

/// Decisions and housekeeping fed in by the wallet side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum BrokerCommand {
    Pair { uri: String },
    DecideProposal { proposal_id: u64, approve: bool },
    Respond { request_id: u64, outcome: RequestOutcome },
    Disconnect { topic: String },
    ActiveAccountsChanged,
    ExpireStaleProposal,
    PruneExpiredSessions,
}

impl BrokerCommand {
    pub fn kind(&self) -> &'static str {
        match self {
            BrokerCommand::Pair { .. } => "pair",
            BrokerCommand::DecideProposal { .. } => "decide_proposal",
            BrokerCommand::Respond { .. } => "respond",
            BrokerCommand::Disconnect { .. } => "disconnect",
            BrokerCommand::ActiveAccountsChanged => "active_accounts_changed",
            BrokerCommand::ExpireStaleProposal => "expire_stale_proposal",
            BrokerCommand::PruneExpiredSessions => "prune_expired_sessions",
        }
    }
}

/// Commands sent to the pairing/transport client, as recorded or relayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ProtocolCommand {
    Connect {
        uri: String,
    },
    Approve {
        proposal_id: u64,
        namespaces: SessionNamespaces,
    },
    Reject {
        proposal_id: u64,
        reason: ProtocolReason,
    },
    Respond {
        topic: String,
        response: JsonRpcResponse,
    },
    Update {
        topic: String,
        namespaces: SessionNamespaces,
    },
    Disconnect {
        topic: String,
        reason: ProtocolReason,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "notification", rename_all = "snake_case")]
pub enum BrokerNotification {
    ProposalAwaitingDecision { proposal: SessionProposal },
    SessionsChanged { sessions: Vec<Session> },
    WalletActionRequired { request: WalletActionRequest },
    Error { context: String, message: String },
}

impl BrokerNotification {
    pub fn error(context: &str, message: impl Into<String>) -> Self {
        Self::Error {
            context: context.to_owned(),
            message: message.into(),
        }
    }
}
