pub mod broker;
pub mod codec;
pub mod config;
pub mod domain;
pub mod events;
pub mod namespaces;
pub mod negotiator;
pub mod pairing;
pub mod ports;
pub mod proposal_queue;
pub mod router;
pub mod state_machine;
pub mod store;

pub use broker::Broker;
pub use codec::{NetworkKind, RpcServer};
pub use config::{BacklogOrder, BrokerConfig, EmptySessionPolicy};
pub use domain::{
    parse_eip155_address, Account, AccountError, ChainId, ChainIdError, DappMetadata,
    JsonRpcPayload, JsonRpcResponse, ProposalNamespace, ProposalNamespaces, ProtocolReason,
    RequestOutcome, RpcError, Session, SessionNamespace, SessionNamespaces, SessionProposal,
    SessionRequest, SignatureMethod, TimestampMs, WalletAction, WalletActionRequest, WcMethod,
};
pub use events::{BrokerCommand, BrokerNotification, ProtocolCommand, ProtocolEvent};
pub use namespaces::{build_session_namespaces, recompute_session_namespaces, NamespaceError};
pub use negotiator::ProposalLedger;
pub use pairing::{PairingUri, PairingUriError};
pub use ports::{
    ActionTranslatorPort, ActiveChainsPort, ClockPort, NotificationPort, PortError,
    ProtocolClientPort, SessionPersistencePort, SignerPort,
};
pub use proposal_queue::{ProposalQueue, QueueState};
pub use router::RequestLedger;
pub use state_machine::{
    proposal_transition, request_transition, ProposalAction, ProposalStatus, RequestAction,
    RequestStatus, StateTransition,
};
pub use store::{LoadReport, SessionStore};
