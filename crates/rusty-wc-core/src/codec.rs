//! Conversion between the wallet's enabled networks ([`RpcServer`]) and
//! CAIP-2 chain identifier strings.
//!
//! Decoding never fails loudly: wire input is attacker-controlled, so an
//! unparseable or non-EVM identifier is reported as "unsupported" (`None`)
//! and callers decide how to answer.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::{ChainId, ChainIdError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NetworkKind {
    Mainnet,
    Testnet,
}

/// EVM network as the wallet knows it. Unknown chain ids map to `Custom`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "ChainId", try_from = "ChainId")]
pub enum RpcServer {
    Main,
    Classic,
    Optimism,
    Cronos,
    Binance,
    Gnosis,
    Polygon,
    Fantom,
    Base,
    Klaytn,
    Arbitrum,
    Avalanche,
    Goerli,
    Sepolia,
    Holesky,
    BinanceTestnet,
    CronosTestnet,
    KlaytnBaobab,
    FantomTestnet,
    AvalancheFuji,
    Mumbai,
    Amoy,
    BaseSepolia,
    ArbitrumSepolia,
    OptimismSepolia,
    Custom(u64),
}

impl RpcServer {
    pub fn from_chain_id(chain_id: u64) -> Self {
        match chain_id {
            1 => Self::Main,
            61 => Self::Classic,
            10 => Self::Optimism,
            25 => Self::Cronos,
            56 => Self::Binance,
            100 => Self::Gnosis,
            137 => Self::Polygon,
            250 => Self::Fantom,
            8453 => Self::Base,
            8217 => Self::Klaytn,
            42161 => Self::Arbitrum,
            43114 => Self::Avalanche,
            5 => Self::Goerli,
            11155111 => Self::Sepolia,
            17000 => Self::Holesky,
            97 => Self::BinanceTestnet,
            338 => Self::CronosTestnet,
            1001 => Self::KlaytnBaobab,
            4002 => Self::FantomTestnet,
            43113 => Self::AvalancheFuji,
            80001 => Self::Mumbai,
            80002 => Self::Amoy,
            84532 => Self::BaseSepolia,
            421614 => Self::ArbitrumSepolia,
            11155420 => Self::OptimismSepolia,
            other => Self::Custom(other),
        }
    }

    pub fn chain_id(self) -> u64 {
        match self {
            Self::Main => 1,
            Self::Classic => 61,
            Self::Optimism => 10,
            Self::Cronos => 25,
            Self::Binance => 56,
            Self::Gnosis => 100,
            Self::Polygon => 137,
            Self::Fantom => 250,
            Self::Base => 8453,
            Self::Klaytn => 8217,
            Self::Arbitrum => 42161,
            Self::Avalanche => 43114,
            Self::Goerli => 5,
            Self::Sepolia => 11155111,
            Self::Holesky => 17000,
            Self::BinanceTestnet => 97,
            Self::CronosTestnet => 338,
            Self::KlaytnBaobab => 1001,
            Self::FantomTestnet => 4002,
            Self::AvalancheFuji => 43113,
            Self::Mumbai => 80001,
            Self::Amoy => 80002,
            Self::BaseSepolia => 84532,
            Self::ArbitrumSepolia => 421614,
            Self::OptimismSepolia => 11155420,
            Self::Custom(id) => id,
        }
    }

    /// Custom networks are treated as mainnets.
    pub fn network_kind(self) -> NetworkKind {
        match self {
            Self::Goerli
            | Self::Sepolia
            | Self::Holesky
            | Self::BinanceTestnet
            | Self::CronosTestnet
            | Self::KlaytnBaobab
            | Self::FantomTestnet
            | Self::AvalancheFuji
            | Self::Mumbai
            | Self::Amoy
            | Self::BaseSepolia
            | Self::ArbitrumSepolia
            | Self::OptimismSepolia => NetworkKind::Testnet,
            _ => NetworkKind::Mainnet,
        }
    }

    pub fn is_testnet(self) -> bool {
        self.network_kind() == NetworkKind::Testnet
    }

    pub fn to_chain_id(self) -> ChainId {
        ChainId::eip155(self.chain_id())
    }

    /// Only the `eip155` namespace maps onto wallet networks.
    pub fn from_caip2(chain: &ChainId) -> Option<Self> {
        (chain.namespace() == ChainId::EIP155).then(|| Self::from_chain_id(chain.reference()))
    }
}

impl fmt::Display for RpcServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode(*self))
    }
}

impl From<RpcServer> for ChainId {
    fn from(value: RpcServer) -> Self {
        value.to_chain_id()
    }
}

impl TryFrom<ChainId> for RpcServer {
    type Error = ChainIdError;

    fn try_from(value: ChainId) -> Result<Self, Self::Error> {
        Self::from_caip2(&value)
            .ok_or_else(|| ChainIdError::InvalidNamespace(value.namespace().to_owned()))
    }
}

pub fn encode(server: RpcServer) -> String {
    server.to_chain_id().to_string()
}

pub fn decode(raw: &str) -> Option<RpcServer> {
    raw.parse::<ChainId>()
        .ok()
        .and_then(|chain| RpcServer::from_caip2(&chain))
}

/// Decodes every entry it can; malformed or non-EVM entries are dropped.
pub fn decode_many<I, S>(raw: I) -> BTreeSet<RpcServer>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    raw.into_iter()
        .filter_map(|entry| {
            let decoded = decode(entry.as_ref());
            if decoded.is_none() {
                tracing::debug!(chain = entry.as_ref(), "dropping undecodable chain id");
            }
            decoded
        })
        .collect()
}

/// Deserializer for proposal chain lists: keeps wire order, drops malformed
/// entries and duplicates instead of failing the whole proposal.
pub(crate) fn lenient_chain_ids<'de, D>(deserializer: D) -> Result<Vec<ChainId>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default();
    let mut out: Vec<ChainId> = Vec::with_capacity(raw.len());
    for entry in raw {
        match entry.parse::<ChainId>() {
            Ok(chain) if !out.contains(&chain) => out.push(chain),
            Ok(_) => {}
            Err(e) => tracing::debug!(chain = %entry, error = %e, "dropping malformed chain id"),
        }
    }
    Ok(out)
}
