use std::collections::BTreeSet;

use rusty_wc_core::domain::{ProposalNamespaces, Session};
use rusty_wc_core::{
    build_session_namespaces, recompute_session_namespaces, Account, ChainId, DappMetadata,
    NamespaceError, ProposalNamespace, TimestampMs,
};

const OWNER: &str = "0x1000000000000000000000000000000000000001";

fn account(chain: u64) -> Account {
    format!("eip155:{chain}:{OWNER}")
        .parse()
        .expect("valid account")
}

fn requested(chains: &[u64]) -> ProposalNamespace {
    ProposalNamespace {
        chains: chains.iter().copied().map(ChainId::eip155).collect(),
        methods: BTreeSet::from(["eth_sendTransaction".to_owned(), "personal_sign".to_owned()]),
        events: BTreeSet::from(["chainChanged".to_owned()]),
        extensions: Vec::new(),
    }
}

fn required(ns: ProposalNamespace) -> ProposalNamespaces {
    ProposalNamespaces::from([("eip155".to_owned(), ns)])
}

#[test]
fn grants_only_chains_with_active_accounts() {
    let active = vec![account(1)];
    let granted = build_session_namespaces(&required(requested(&[1, 137])), &active)
        .expect("mainnet is grantable");
    let ns = &granted["eip155"];
    assert_eq!(ns.accounts, vec![account(1)]);
    assert_eq!(ns.chains(), vec![ChainId::eip155(1)]);
    assert!(ns.methods.contains("personal_sign"));
}

#[test]
fn mixed_mainnet_and_testnet_fails_whole_proposal() {
    let active = vec![account(1), account(11155111)];
    let err = build_session_namespaces(&required(requested(&[1, 11155111])), &active)
        .expect_err("mixed kinds");
    assert_eq!(
        err,
        NamespaceError::MixedNetworkKind {
            namespace: "eip155".to_owned()
        }
    );
}

#[test]
fn nothing_grantable_is_no_supported_chains() {
    let active = vec![account(1)];
    let err = build_session_namespaces(&required(requested(&[10, 8453])), &active)
        .expect_err("no overlap");
    assert_eq!(err, NamespaceError::NoSupportedChains);
}

#[test]
fn extensions_are_granted_independently() {
    let mut ns = requested(&[1]);
    ns.extensions.push(ProposalNamespace {
        chains: vec![ChainId::eip155(137), ChainId::eip155(10)],
        methods: BTreeSet::from(["eth_signTypedData_v4".to_owned()]),
        events: BTreeSet::new(),
        extensions: Vec::new(),
    });
    let active = vec![account(1), account(137)];
    let granted = build_session_namespaces(&required(ns), &active).expect("grant");
    let ns = &granted["eip155"];
    assert_eq!(ns.extensions.len(), 1);
    assert_eq!(ns.extensions[0].accounts, vec![account(137)]);
    assert_eq!(ns.chains(), vec![ChainId::eip155(1), ChainId::eip155(137)]);
}

#[test]
fn recompute_follows_active_accounts() {
    let required = required(requested(&[1, 137]));
    let session = Session {
        topic: "t".to_owned(),
        peer: DappMetadata::default(),
        namespaces: build_session_namespaces(&required, &[account(1)]).expect("grant"),
        required_namespaces: required,
        expires_at_ms: TimestampMs(u64::MAX),
    };

    let widened = recompute_session_namespaces(&session, &[account(1), account(137)]);
    assert_eq!(widened["eip155"].accounts, vec![account(1), account(137)]);

    let emptied = recompute_session_namespaces(&session, &[account(10)]);
    assert!(emptied.is_empty());
}
