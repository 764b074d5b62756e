use serde_json::Value;
use thiserror::Error;

use crate::codec::RpcServer;
use crate::domain::{
    Account, JsonRpcResponse, ProtocolReason, Session, SessionNamespaces, SessionProposal,
    SessionRequest, WalletAction,
};
use crate::events::BrokerNotification;

#[derive(Debug, Error)]
pub enum PortError {
    #[error("port not implemented: {0}")]
    NotImplemented(&'static str),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("policy error: {0}")]
    Policy(String),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Command side of the pairing/transport client. Every call is
/// fire-and-forget: state only moves when a later event confirms it.
pub trait ProtocolClientPort {
    fn connect(&self, uri: &str) -> Result<(), PortError>;
    fn approve(&self, proposal_id: u64, namespaces: &SessionNamespaces) -> Result<(), PortError>;
    fn reject(&self, proposal_id: u64, reason: &ProtocolReason) -> Result<(), PortError>;
    fn respond(&self, topic: &str, response: &JsonRpcResponse) -> Result<(), PortError>;
    fn update(&self, topic: &str, namespaces: &SessionNamespaces) -> Result<(), PortError>;
    fn disconnect(&self, topic: &str, reason: &ProtocolReason) -> Result<(), PortError>;
}

/// What the wallet currently exposes: one account per enabled network.
pub trait ActiveChainsPort {
    fn active_accounts(&self) -> Result<Vec<Account>, PortError>;

    fn enabled_servers(&self) -> Result<Vec<RpcServer>, PortError> {
        let mut servers: Vec<RpcServer> = self
            .active_accounts()?
            .iter()
            .filter_map(|a| RpcServer::from_caip2(a.chain()))
            .collect();
        servers.sort();
        servers.dedup();
        Ok(servers)
    }
}

pub trait ActionTranslatorPort {
    fn translate(
        &self,
        request: &SessionRequest,
        server: RpcServer,
        session: &Session,
    ) -> Result<WalletAction, PortError>;
}

/// Narrow signing contract consulted before an approval is sent.
pub trait SignerPort {
    fn authorize_approval(
        &self,
        proposal: &SessionProposal,
        accounts: &[Account],
    ) -> Result<(), PortError>;
}

pub trait NotificationPort {
    fn notify(&self, notification: BrokerNotification);
}

pub trait ClockPort {
    fn now_ms(&self) -> Result<u64, PortError>;
}

/// Durable backing for the session store. `load_sessions` hands back raw
/// entries so that one unreadable record cannot poison the rest.
pub trait SessionPersistencePort {
    fn load_sessions(&self) -> Result<Vec<Value>, PortError>;
    fn save_sessions(&self, sessions: &[Session]) -> Result<(), PortError>;
}
