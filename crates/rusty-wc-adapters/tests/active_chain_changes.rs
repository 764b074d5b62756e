mod common;

use rusty_wc_core::{
    BrokerCommand, BrokerConfig, BrokerNotification, EmptySessionPolicy, ProtocolCommand,
    ProtocolReason,
};

use common::{account, establish_session, new_broker, new_broker_with};

#[test]
fn emptied_session_is_kept_by_default() {
    let mut broker = new_broker(vec![account(1)]);
    establish_session(&mut broker, 1, "topic-a", &["eip155:1"]);
    let before = broker.session("topic-a").expect("settled");

    broker
        .chains
        .set_accounts(vec![account(137)])
        .expect("set accounts");
    broker
        .handle(BrokerCommand::ActiveAccountsChanged)
        .expect("accounts changed");

    assert_eq!(broker.session("topic-a"), Some(before));
    assert!(broker.protocol.sent().expect("sent").is_empty());
}

#[test]
fn emptied_session_is_disconnected_when_configured() {
    let config = BrokerConfig {
        empty_session_policy: EmptySessionPolicy::Disconnect,
        ..Default::default()
    };
    let mut broker = new_broker_with(vec![account(1)], config, false);
    establish_session(&mut broker, 1, "topic-a", &["eip155:1"]);

    broker.chains.set_accounts(Vec::new()).expect("set accounts");
    broker
        .handle(BrokerCommand::ActiveAccountsChanged)
        .expect("accounts changed");

    assert!(broker.session("topic-a").is_none());
    let sent = broker.protocol.sent().expect("sent");
    assert!(matches!(
        sent.as_slice(),
        [ProtocolCommand::Disconnect { topic, reason }]
            if topic == "topic-a" && reason.code == ProtocolReason::USER_DISCONNECTED
    ));
    assert!(broker
        .notifier
        .notifications()
        .iter()
        .any(|n| matches!(n, BrokerNotification::SessionsChanged { sessions } if sessions.is_empty())));
}

#[test]
fn newly_enabled_requested_chain_is_pushed_to_the_peer() {
    let mut broker = new_broker(vec![account(1)]);
    establish_session(&mut broker, 1, "topic-a", &["eip155:1", "eip155:137"]);

    broker
        .chains
        .set_accounts(vec![account(1), account(137)])
        .expect("set accounts");
    broker
        .handle(BrokerCommand::ActiveAccountsChanged)
        .expect("accounts changed");

    let sent = broker.protocol.sent().expect("sent");
    let [ProtocolCommand::Update { topic, namespaces }] = sent.as_slice() else {
        panic!("expected one update, got {sent:?}");
    };
    assert_eq!(topic, "topic-a");
    assert_eq!(namespaces["eip155"].accounts, vec![account(1), account(137)]);
    assert_eq!(
        broker.session("topic-a").map(|s| s.namespaces),
        Some(namespaces.clone())
    );
}

#[test]
fn unchanged_accounts_send_nothing() {
    let mut broker = new_broker(vec![account(1)]);
    establish_session(&mut broker, 1, "topic-a", &["eip155:1"]);

    broker
        .handle(BrokerCommand::ActiveAccountsChanged)
        .expect("accounts changed");
    assert!(broker.protocol.sent().expect("sent").is_empty());
    assert!(broker.notifier.notifications().is_empty());
}

#[test]
fn unrequested_chain_is_never_added() {
    let mut broker = new_broker(vec![account(1)]);
    establish_session(&mut broker, 1, "topic-a", &["eip155:1"]);

    broker
        .chains
        .set_accounts(vec![account(1), account(10)])
        .expect("set accounts");
    broker
        .handle(BrokerCommand::ActiveAccountsChanged)
        .expect("accounts changed");
    assert!(broker.protocol.sent().expect("sent").is_empty());
}
