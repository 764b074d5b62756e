#![allow(dead_code)]

use alloy::primitives::Address;
use serde_json::json;

use rusty_wc_adapters::{
    Eip155ActionTranslator, InMemorySessionPersistence, KeystoreSigner, ManualClock,
    RecordingNotifier, RecordingProtocolClient, StaticActiveChains,
};
use rusty_wc_core::{
    Account, Broker, BrokerConfig, BrokerNotification, ProtocolCommand, ProtocolEvent, Session,
    SessionProposal, SessionRequest, TimestampMs,
};

pub const NOW_MS: u64 = 1_739_750_400_000;
pub const SESSION_TTL_MS: u64 = 7 * 24 * 60 * 60 * 1000;

pub type TestBroker = Broker<
    RecordingProtocolClient,
    StaticActiveChains,
    Eip155ActionTranslator,
    KeystoreSigner,
    RecordingNotifier,
    ManualClock,
    InMemorySessionPersistence,
>;

pub fn owner_address() -> Address {
    "0x1000000000000000000000000000000000000001"
        .parse()
        .expect("valid owner address")
}

pub fn account(chain: u64) -> Account {
    format!("eip155:{chain}:{}", owner_address())
        .parse()
        .expect("valid account")
}

pub fn new_broker(accounts: Vec<Account>) -> TestBroker {
    new_broker_with(accounts, BrokerConfig::default(), false)
}

pub fn new_broker_with(
    accounts: Vec<Account>,
    config: BrokerConfig,
    allow_eth_sign: bool,
) -> TestBroker {
    new_broker_on(
        accounts,
        config,
        allow_eth_sign,
        InMemorySessionPersistence::default(),
    )
}

pub fn new_broker_on(
    accounts: Vec<Account>,
    config: BrokerConfig,
    allow_eth_sign: bool,
    persistence: InMemorySessionPersistence,
) -> TestBroker {
    let signer = KeystoreSigner::new([owner_address()]);
    let (broker, _report) = Broker::new(
        RecordingProtocolClient::default(),
        StaticActiveChains::new(accounts),
        Eip155ActionTranslator::new(allow_eth_sign),
        signer,
        RecordingNotifier::default(),
        ManualClock::at(NOW_MS),
        persistence,
        config,
    )
    .expect("broker");
    broker
}

pub fn proposal(id: u64, chains: &[&str]) -> SessionProposal {
    serde_json::from_value(json!({
        "id": id,
        "proposer": {
            "name": format!("dApp {id}"),
            "url": format!("https://dapp{id}.example"),
            "icons": []
        },
        "requiredNamespaces": {
            "eip155": {
                "chains": chains,
                "methods": [
                    "eth_sendTransaction",
                    "eth_sign",
                    "personal_sign",
                    "eth_signTypedData_v4"
                ],
                "events": ["chainChanged", "accountsChanged"]
            }
        }
    }))
    .expect("valid proposal")
}

/// Proposes, approves and settles a session the way the peer would, using
/// the namespaces the broker actually granted.
pub fn establish_session(broker: &mut TestBroker, proposal_id: u64, topic: &str, chains: &[&str]) {
    let proposal = proposal(proposal_id, chains);
    broker
        .handle_event(ProtocolEvent::SessionProposal(proposal.clone()))
        .expect("proposal accepted");
    broker
        .on_user_decision(proposal_id, true)
        .expect("approve proposal");

    let namespaces = broker
        .protocol
        .sent()
        .expect("sent commands")
        .into_iter()
        .rev()
        .find_map(|c| match c {
            ProtocolCommand::Approve {
                proposal_id: id,
                namespaces,
            } if id == proposal_id => Some(namespaces),
            _ => None,
        })
        .expect("approve command sent");

    broker
        .handle_event(ProtocolEvent::SessionSettled {
            proposal_id: Some(proposal_id),
            session: Session {
                topic: topic.to_owned(),
                peer: proposal.proposer,
                namespaces,
                required_namespaces: proposal.required_namespaces,
                expires_at_ms: TimestampMs(NOW_MS + SESSION_TTL_MS),
            },
        })
        .expect("session settled");
    broker.protocol.take().expect("clear protocol log");
    broker.notifier.take();
}

pub fn request(id: u64, topic: &str, chain: &str, method: &str, params: serde_json::Value) -> SessionRequest {
    SessionRequest {
        id,
        topic: topic.to_owned(),
        chain_id: chain.to_owned(),
        method: method.to_owned(),
        params,
    }
}

pub fn responses(broker: &TestBroker) -> Vec<(String, rusty_wc_core::JsonRpcResponse)> {
    broker
        .protocol
        .sent()
        .expect("sent commands")
        .into_iter()
        .filter_map(|c| match c {
            ProtocolCommand::Respond { topic, response } => Some((topic, response)),
            _ => None,
        })
        .collect()
}

pub fn rejections(broker: &TestBroker) -> Vec<(u64, i64)> {
    broker
        .protocol
        .sent()
        .expect("sent commands")
        .into_iter()
        .filter_map(|c| match c {
            ProtocolCommand::Reject {
                proposal_id,
                reason,
            } => Some((proposal_id, reason.code)),
            _ => None,
        })
        .collect()
}

pub fn awaiting_decision(broker: &TestBroker) -> Vec<u64> {
    broker
        .notifier
        .notifications()
        .into_iter()
        .filter_map(|n| match n {
            BrokerNotification::ProposalAwaitingDecision { proposal } => Some(proposal.id),
            _ => None,
        })
        .collect()
}
