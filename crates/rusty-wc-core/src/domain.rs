use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use alloy::primitives::{Address, Bytes};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::codec::RpcServer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimestampMs(pub u64);

impl TimestampMs {
    pub fn saturating_add_ms(self, ms: u64) -> Self {
        Self(self.0.saturating_add(ms))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainIdError {
    #[error("malformed chain id: {0}")]
    Malformed(String),
    #[error("invalid chain namespace: {0}")]
    InvalidNamespace(String),
    #[error("invalid chain reference: {0}")]
    InvalidReference(String),
}

/// CAIP-2 chain identifier restricted to numeric references, e.g. `eip155:1`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChainId {
    namespace: String,
    reference: u64,
}

impl ChainId {
    pub const EIP155: &'static str = "eip155";

    pub fn new(namespace: impl Into<String>, reference: u64) -> Result<Self, ChainIdError> {
        let namespace = namespace.into();
        if !is_valid_namespace(&namespace) {
            return Err(ChainIdError::InvalidNamespace(namespace));
        }
        Ok(Self {
            namespace,
            reference,
        })
    }

    pub fn eip155(reference: u64) -> Self {
        Self {
            namespace: Self::EIP155.to_owned(),
            reference,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn reference(&self) -> u64 {
        self.reference
    }
}

fn is_valid_namespace(namespace: &str) -> bool {
    (3..=8).contains(&namespace.len())
        && namespace
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.reference)
    }
}

impl FromStr for ChainId {
    type Err = ChainIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (namespace, reference) = s
            .split_once(':')
            .ok_or_else(|| ChainIdError::Malformed(s.to_owned()))?;
        if !is_valid_namespace(namespace) {
            return Err(ChainIdError::InvalidNamespace(namespace.to_owned()));
        }
        // Canonical decimal only, so that decode(encode(x)) == x holds both ways.
        let canonical = !reference.is_empty()
            && reference.len() <= 20
            && reference.bytes().all(|b| b.is_ascii_digit())
            && (reference == "0" || !reference.starts_with('0'));
        if !canonical {
            return Err(ChainIdError::InvalidReference(reference.to_owned()));
        }
        let reference = reference
            .parse::<u64>()
            .map_err(|_| ChainIdError::InvalidReference(reference.to_owned()))?;
        Ok(Self {
            namespace: namespace.to_owned(),
            reference,
        })
    }
}

impl TryFrom<String> for ChainId {
    type Error = ChainIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ChainId> for String {
    fn from(value: ChainId) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccountError {
    #[error("malformed account: {0}")]
    Malformed(String),
    #[error(transparent)]
    Chain(#[from] ChainIdError),
    #[error("unsupported account namespace: {0}")]
    UnsupportedNamespace(String),
    #[error("invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },
}

/// CAIP-10 account: an address scoped to exactly one chain.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Account {
    chain: ChainId,
    address: Address,
}

impl Account {
    pub fn new(chain: ChainId, address: Address) -> Result<Self, AccountError> {
        if chain.namespace() != ChainId::EIP155 {
            return Err(AccountError::UnsupportedNamespace(
                chain.namespace().to_owned(),
            ));
        }
        if address == Address::ZERO {
            return Err(AccountError::InvalidAddress {
                address: address.to_string(),
                reason: "zero address".to_owned(),
            });
        }
        Ok(Self { chain, address })
    }

    pub fn chain(&self) -> &ChainId {
        &self.chain
    }

    pub fn address(&self) -> Address {
        self.address
    }
}

pub fn parse_eip155_address(raw: &str) -> Result<Address, AccountError> {
    let invalid = |reason: &str| AccountError::InvalidAddress {
        address: raw.to_owned(),
        reason: reason.to_owned(),
    };
    let hex = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .ok_or_else(|| invalid("missing 0x prefix"))?;
    if hex.len() != 40 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(invalid("expected 20 hex-encoded bytes"));
    }
    let has_upper = hex.bytes().any(|b| b.is_ascii_uppercase());
    let has_lower = hex.bytes().any(|b| b.is_ascii_lowercase());
    let address = if has_upper && has_lower {
        Address::parse_checksummed(format!("0x{hex}"), None)
            .map_err(|e| invalid(&format!("checksum mismatch: {e}")))?
    } else {
        Address::from_str(hex).map_err(|e| invalid(&e.to_string()))?
    };
    Ok(address)
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chain, self.address)
    }
}

impl FromStr for Account {
    type Err = AccountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (chain, address) = s
            .rsplit_once(':')
            .ok_or_else(|| AccountError::Malformed(s.to_owned()))?;
        let chain: ChainId = chain.parse()?;
        if chain.namespace() != ChainId::EIP155 {
            return Err(AccountError::UnsupportedNamespace(
                chain.namespace().to_owned(),
            ));
        }
        let address = parse_eip155_address(address)?;
        Self::new(chain, address)
    }
}

impl TryFrom<String> for Account {
    type Error = AccountError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Account> for String {
    fn from(value: Account) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DappMetadata {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub url: String,
    #[serde(default)]
    pub icons: Vec<String>,
}

/// Capability set requested by a dApp under one namespace key.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProposalNamespace {
    #[serde(default, deserialize_with = "crate::codec::lenient_chain_ids")]
    pub chains: Vec<ChainId>,
    #[serde(default)]
    pub methods: BTreeSet<String>,
    #[serde(default)]
    pub events: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<ProposalNamespace>,
}

impl ProposalNamespace {
    /// Chains of this namespace and its extensions, first occurrence wins.
    pub fn all_chains(&self) -> Vec<ChainId> {
        let mut out: Vec<ChainId> = Vec::new();
        for chain in self
            .chains
            .iter()
            .chain(self.extensions.iter().flat_map(|x| x.chains.iter()))
        {
            if !out.contains(chain) {
                out.push(chain.clone());
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionProposal {
    pub id: u64,
    pub proposer: DappMetadata,
    pub required_namespaces: BTreeMap<String, ProposalNamespace>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at_ms: Option<TimestampMs>,
}

/// Granted counterpart of [`ProposalNamespace`]. Chains are derived from
/// the accounts, so a granted chain can never lack an account.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionNamespace {
    pub accounts: Vec<Account>,
    #[serde(default)]
    pub methods: BTreeSet<String>,
    #[serde(default)]
    pub events: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<SessionNamespace>,
}

impl SessionNamespace {
    pub fn chains(&self) -> Vec<ChainId> {
        let mut out: Vec<ChainId> = Vec::new();
        for account in self.all_accounts() {
            if !out.contains(account.chain()) {
                out.push(account.chain().clone());
            }
        }
        out
    }

    pub fn all_accounts(&self) -> impl Iterator<Item = &Account> {
        self.accounts
            .iter()
            .chain(self.extensions.iter().flat_map(|x| x.accounts.iter()))
    }

    pub fn is_empty(&self) -> bool {
        self.all_accounts().next().is_none()
    }
}

pub type SessionNamespaces = BTreeMap<String, SessionNamespace>;
pub type ProposalNamespaces = BTreeMap<String, ProposalNamespace>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub topic: String,
    pub peer: DappMetadata,
    pub namespaces: SessionNamespaces,
    #[serde(default)]
    pub required_namespaces: ProposalNamespaces,
    pub expires_at_ms: TimestampMs,
}

impl Session {
    pub fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.namespaces.values().flat_map(|ns| ns.all_accounts())
    }

    pub fn accounts_on<'a>(&'a self, chain: &'a ChainId) -> impl Iterator<Item = &'a Account> {
        self.accounts().filter(move |a| a.chain() == chain)
    }

    pub fn grants_chain(&self, chain: &ChainId) -> bool {
        self.accounts_on(chain).next().is_some()
    }

    pub fn is_expired(&self, now: TimestampMs) -> bool {
        self.expires_at_ms <= now
    }
}

/// Inbound method call against a settled session. `chain_id` is kept in
/// wire form; decoding it is part of routing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    pub id: u64,
    pub topic: String,
    pub chain_id: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WcMethod {
    EthSendTransaction,
    EthSignTransaction,
    PersonalSign,
    EthSign,
    EthSignTypedData,
    EthSignTypedDataV4,
    WalletSwitchEthereumChain,
}

impl WcMethod {
    pub const ALL: [WcMethod; 7] = [
        WcMethod::EthSendTransaction,
        WcMethod::EthSignTransaction,
        WcMethod::PersonalSign,
        WcMethod::EthSign,
        WcMethod::EthSignTypedData,
        WcMethod::EthSignTypedDataV4,
        WcMethod::WalletSwitchEthereumChain,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            WcMethod::EthSendTransaction => "eth_sendTransaction",
            WcMethod::EthSignTransaction => "eth_signTransaction",
            WcMethod::PersonalSign => "personal_sign",
            WcMethod::EthSign => "eth_sign",
            WcMethod::EthSignTypedData => "eth_signTypedData",
            WcMethod::EthSignTypedDataV4 => "eth_signTypedData_v4",
            WcMethod::WalletSwitchEthereumChain => "wallet_switchEthereumChain",
        }
    }

    pub fn from_method(method: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == method)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureMethod {
    PersonalSign,
    EthSign,
    EthSignTypedData,
    EthSignTypedDataV4,
}

/// Wallet-level action derived from a session request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WalletAction {
    SignMessage {
        method: SignatureMethod,
        signer: Address,
        message: Bytes,
    },
    SignTypedData {
        method: SignatureMethod,
        signer: Address,
        typed_data: Value,
    },
    SendTransaction {
        from: Address,
        transaction: Value,
    },
    SignTransaction {
        from: Address,
        transaction: Value,
    },
    SwitchChain {
        server: RpcServer,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletActionRequest {
    pub request_id: u64,
    pub topic: String,
    pub server: RpcServer,
    pub peer: DappMetadata,
    pub action: WalletAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    pub const INVALID_JSON: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
    pub const REQUEST_REJECTED: i64 = -32050;
    pub const USER_REJECTED: i64 = 4001;
    pub const UNSUPPORTED_CHAIN: i64 = 4902;

    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn unsupported_chain(chain: &str) -> Self {
        Self::new(Self::UNSUPPORTED_CHAIN, format!("Unsupported chain: {chain}"))
    }

    pub fn request_rejected(message: impl Into<String>) -> Self {
        Self::new(Self::REQUEST_REJECTED, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(Self::INTERNAL_ERROR, message)
    }

    pub fn user_rejected() -> Self {
        Self::new(Self::USER_REJECTED, "User rejected the request")
    }
}

/// Outcome of a wallet action, handed back exactly once per request id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestOutcome {
    Success(Value),
    Error(RpcError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JsonRpcPayload {
    Result(Value),
    Error(RpcError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub id: u64,
    pub jsonrpc: String,
    #[serde(flatten)]
    pub payload: JsonRpcPayload,
}

impl JsonRpcResponse {
    pub fn from_outcome(id: u64, outcome: RequestOutcome) -> Self {
        let payload = match outcome {
            RequestOutcome::Success(value) => JsonRpcPayload::Result(value),
            RequestOutcome::Error(err) => JsonRpcPayload::Error(err),
        };
        Self {
            id,
            jsonrpc: "2.0".to_owned(),
            payload,
        }
    }

    pub fn error(id: u64, err: RpcError) -> Self {
        Self::from_outcome(id, RequestOutcome::Error(err))
    }

    pub fn is_error(&self) -> bool {
        matches!(self.payload, JsonRpcPayload::Error(_))
    }
}

/// Reason attached to proposal rejections and disconnects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolReason {
    pub code: i64,
    pub message: String,
}

impl ProtocolReason {
    pub const USER_REJECTED: i64 = 5000;
    pub const UNSUPPORTED_CHAINS: i64 = 5100;
    pub const UNSUPPORTED_ACCOUNTS: i64 = 5103;
    pub const USER_DISCONNECTED: i64 = 6000;

    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn user_rejected() -> Self {
        Self::new(Self::USER_REJECTED, "User rejected.")
    }

    pub fn unsupported_chains() -> Self {
        Self::new(Self::UNSUPPORTED_CHAINS, "Unsupported chains.")
    }

    pub fn mixed_network_kind(namespace: &str) -> Self {
        Self::new(
            Self::UNSUPPORTED_CHAINS,
            format!("Mixed network kind in namespace {namespace}: mainnet and testnet chains cannot be combined."),
        )
    }

    pub fn unsupported_accounts() -> Self {
        Self::new(Self::UNSUPPORTED_ACCOUNTS, "Unsupported accounts.")
    }

    pub fn proposal_expired() -> Self {
        Self::new(Self::USER_REJECTED, "Proposal expired before a decision was made.")
    }

    pub fn user_disconnected() -> Self {
        Self::new(Self::USER_DISCONNECTED, "User disconnected.")
    }
}
