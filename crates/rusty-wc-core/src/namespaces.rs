//! Building the namespaces granted to a dApp from what it requested and
//! what the wallet has enabled. Everything here is pure.

use thiserror::Error;

use crate::codec::{NetworkKind, RpcServer};
use crate::domain::{
    Account, ChainId, ProposalNamespace, ProposalNamespaces, Session, SessionNamespace,
    SessionNamespaces,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NamespaceError {
    #[error("namespace {namespace} mixes mainnet and testnet chains")]
    MixedNetworkKind { namespace: String },
    #[error("none of the requested chains is enabled in the wallet")]
    NoSupportedChains,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkMix {
    /// No chain with a known network kind was requested.
    Unknown,
    Uniform(NetworkKind),
    Mixed,
}

/// Chains requested under `key`, including extensions. A chain-scoped key
/// such as `eip155:1` with no chain list requests that chain.
pub fn requested_chains(key: &str, namespace: &ProposalNamespace) -> Vec<ChainId> {
    let mut chains = namespace.all_chains();
    if chains.is_empty() {
        if let Ok(chain) = key.parse::<ChainId>() {
            chains.push(chain);
        }
    }
    chains
}

fn main_chains(key: &str, namespace: &ProposalNamespace) -> Vec<ChainId> {
    if namespace.chains.is_empty() && namespace.extensions.is_empty() {
        return requested_chains(key, namespace);
    }
    namespace.chains.clone()
}

pub fn classify(chains: &[ChainId]) -> NetworkMix {
    let mut seen: Option<NetworkKind> = None;
    for kind in chains
        .iter()
        .filter_map(RpcServer::from_caip2)
        .map(RpcServer::network_kind)
    {
        match seen {
            None => seen = Some(kind),
            Some(prev) if prev != kind => return NetworkMix::Mixed,
            Some(_) => {}
        }
    }
    seen.map_or(NetworkMix::Unknown, NetworkMix::Uniform)
}

/// Rejects any namespace key whose chains span mainnet and testnet.
pub fn validate_network_kinds(required: &ProposalNamespaces) -> Result<(), NamespaceError> {
    for (key, namespace) in required {
        if classify(&requested_chains(key, namespace)) == NetworkMix::Mixed {
            return Err(NamespaceError::MixedNetworkKind {
                namespace: key.clone(),
            });
        }
    }
    Ok(())
}

/// Active accounts for `chains`, in chain order. Chains without an active
/// account contribute nothing.
pub fn accounts_for(chains: &[ChainId], active: &[Account]) -> Vec<Account> {
    let mut out: Vec<Account> = Vec::new();
    for chain in chains {
        for account in active.iter().filter(|a| a.chain() == chain) {
            if !out.contains(account) {
                out.push(account.clone());
            }
        }
    }
    out
}

fn grant_extension(extension: &ProposalNamespace, active: &[Account]) -> Option<SessionNamespace> {
    let accounts = accounts_for(&extension.chains, active);
    if accounts.is_empty() {
        return None;
    }
    Some(SessionNamespace {
        accounts,
        methods: extension.methods.clone(),
        events: extension.events.clone(),
        extensions: Vec::new(),
    })
}

fn grant_namespace(
    key: &str,
    requested: &ProposalNamespace,
    active: &[Account],
) -> Option<SessionNamespace> {
    let granted = SessionNamespace {
        accounts: accounts_for(&main_chains(key, requested), active),
        methods: requested.methods.clone(),
        events: requested.events.clone(),
        extensions: requested
            .extensions
            .iter()
            .filter_map(|ext| grant_extension(ext, active))
            .collect(),
    };
    (!granted.is_empty()).then_some(granted)
}

/// Namespaces to grant for a proposal. Mixed network kinds fail the whole
/// proposal; keys without a grantable account are dropped; nothing
/// grantable at all is `NoSupportedChains`.
pub fn build_session_namespaces(
    required: &ProposalNamespaces,
    active: &[Account],
) -> Result<SessionNamespaces, NamespaceError> {
    validate_network_kinds(required)?;

    let granted: SessionNamespaces = required
        .iter()
        .filter_map(|(key, requested)| {
            grant_namespace(key, requested, active).map(|ns| (key.clone(), ns))
        })
        .collect();

    if granted.is_empty() {
        return Err(NamespaceError::NoSupportedChains);
    }
    Ok(granted)
}

fn merge_chains(first: Vec<ChainId>, second: impl IntoIterator<Item = ChainId>) -> Vec<ChainId> {
    let mut out = first;
    for chain in second {
        if !out.contains(&chain) {
            out.push(chain);
        }
    }
    out
}

/// Re-runs account filtering for a settled session against a new set of
/// active accounts. Network kinds are not re-validated. Keys left without
/// accounts are dropped, so the result may be empty.
pub fn recompute_session_namespaces(session: &Session, active: &[Account]) -> SessionNamespaces {
    let mut out = SessionNamespaces::new();
    for (key, granted) in &session.namespaces {
        let granted_main = granted.accounts.iter().map(|a| a.chain().clone());
        let rebuilt = match session.required_namespaces.get(key) {
            Some(requested) => SessionNamespace {
                accounts: accounts_for(
                    &merge_chains(main_chains(key, requested), granted_main),
                    active,
                ),
                methods: granted.methods.clone(),
                events: granted.events.clone(),
                extensions: requested
                    .extensions
                    .iter()
                    .filter_map(|ext| grant_extension(ext, active))
                    .collect(),
            },
            None => SessionNamespace {
                accounts: accounts_for(&merge_chains(Vec::new(), granted_main), active),
                methods: granted.methods.clone(),
                events: granted.events.clone(),
                extensions: granted
                    .extensions
                    .iter()
                    .filter_map(|ext| {
                        let accounts = accounts_for(&ext.chains(), active);
                        (!accounts.is_empty()).then(|| SessionNamespace {
                            accounts,
                            methods: ext.methods.clone(),
                            events: ext.events.clone(),
                            extensions: Vec::new(),
                        })
                    })
                    .collect(),
            },
        };
        if !rebuilt.is_empty() {
            out.insert(key.clone(), rebuilt);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(chain: u64) -> Account {
        format!("eip155:{chain}:0x1000000000000000000000000000000000000001")
            .parse()
            .expect("valid account")
    }

    #[test]
    fn chain_scoped_key_requests_its_own_chain() {
        let chains = requested_chains("eip155:137", &ProposalNamespace::default());
        assert_eq!(chains, vec![ChainId::eip155(137)]);
    }

    #[test]
    fn unknown_namespaces_do_not_affect_network_mix() {
        let chains = vec![
            ChainId::new("cosmos", 4).expect("chain"),
            ChainId::eip155(5),
        ];
        assert_eq!(classify(&chains), NetworkMix::Uniform(NetworkKind::Testnet));
        assert_eq!(classify(&[]), NetworkMix::Unknown);
    }

    #[test]
    fn accounts_follow_requested_chain_order() {
        let active = vec![account(1), account(137)];
        let got = accounts_for(&[ChainId::eip155(137), ChainId::eip155(1)], &active);
        assert_eq!(got, vec![account(137), account(1)]);
    }
}
