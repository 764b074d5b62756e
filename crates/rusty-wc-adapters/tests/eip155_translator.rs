mod common;

use serde_json::json;

use rusty_wc_adapters::Eip155ActionTranslator;
use rusty_wc_core::{
    ActionTranslatorPort, DappMetadata, PortError, RpcServer, Session, SessionNamespace,
    SessionNamespaces, SignatureMethod, TimestampMs, WalletAction,
};

use common::{account, owner_address, request, NOW_MS};

fn session(chains: &[u64]) -> Session {
    Session {
        topic: "topic-a".to_owned(),
        peer: DappMetadata::default(),
        namespaces: SessionNamespaces::from([(
            "eip155".to_owned(),
            SessionNamespace {
                accounts: chains.iter().copied().map(account).collect(),
                ..Default::default()
            },
        )]),
        required_namespaces: Default::default(),
        expires_at_ms: TimestampMs(NOW_MS),
    }
}

fn owner() -> String {
    owner_address().to_string()
}

#[test]
fn personal_sign_accepts_both_param_orders() {
    let translator = Eip155ActionTranslator::default();
    let session = session(&[1]);

    for params in [json!(["0x68656c6c6f", owner()]), json!([owner(), "0x68656c6c6f"])] {
        let action = translator
            .translate(
                &request(1, "topic-a", "eip155:1", "personal_sign", params),
                RpcServer::Main,
                &session,
            )
            .expect("translate");
        assert_eq!(
            action,
            WalletAction::SignMessage {
                method: SignatureMethod::PersonalSign,
                signer: owner_address(),
                message: b"hello".to_vec().into(),
            }
        );
    }
}

#[test]
fn plain_text_messages_are_signed_as_utf8() {
    let translator = Eip155ActionTranslator::default();
    let action = translator
        .translate(
            &request(2, "topic-a", "eip155:1", "personal_sign", json!(["gm", owner()])),
            RpcServer::Main,
            &session(&[1]),
        )
        .expect("translate");
    assert!(matches!(
        action,
        WalletAction::SignMessage { message, .. } if message.to_vec() == b"gm".to_vec()
    ));
}

#[test]
fn signer_must_be_a_session_account_on_the_request_chain() {
    let translator = Eip155ActionTranslator::default();
    let stranger = "0x3000000000000000000000000000000000000003";
    let err = translator
        .translate(
            &request(3, "topic-a", "eip155:1", "personal_sign", json!(["0x00", stranger])),
            RpcServer::Main,
            &session(&[1]),
        )
        .expect_err("stranger");
    assert!(matches!(err, PortError::Policy(_)));

    let err = translator
        .translate(
            &request(4, "topic-a", "eip155:137", "personal_sign", json!(["0x00", owner()])),
            RpcServer::Polygon,
            &session(&[1]),
        )
        .expect_err("owner only granted on mainnet");
    assert!(matches!(err, PortError::Policy(_)));
}

#[test]
fn typed_data_may_arrive_as_a_json_string() {
    let translator = Eip155ActionTranslator::default();
    let typed = json!({"types": {}, "primaryType": "Mail", "domain": {}, "message": {}});
    let action = translator
        .translate(
            &request(
                5,
                "topic-a",
                "eip155:1",
                "eth_signTypedData_v4",
                json!([owner(), typed.to_string()]),
            ),
            RpcServer::Main,
            &session(&[1]),
        )
        .expect("translate");
    assert_eq!(
        action,
        WalletAction::SignTypedData {
            method: SignatureMethod::EthSignTypedDataV4,
            signer: owner_address(),
            typed_data: typed,
        }
    );
}

#[test]
fn transactions_need_a_session_sender() {
    let translator = Eip155ActionTranslator::default();
    let tx = json!({"from": owner(), "to": owner(), "value": "0x0"});
    let action = translator
        .translate(
            &request(6, "topic-a", "eip155:1", "eth_sendTransaction", json!([tx.clone()])),
            RpcServer::Main,
            &session(&[1]),
        )
        .expect("translate");
    assert_eq!(
        action,
        WalletAction::SendTransaction {
            from: owner_address(),
            transaction: tx,
        }
    );

    let err = translator
        .translate(
            &request(7, "topic-a", "eip155:1", "eth_signTransaction", json!([{"to": owner()}])),
            RpcServer::Main,
            &session(&[1]),
        )
        .expect_err("missing from");
    assert!(matches!(err, PortError::Validation(_)));
}

#[test]
fn switch_chain_is_limited_to_session_chains() {
    let translator = Eip155ActionTranslator::default();
    let action = translator
        .translate(
            &request(
                8,
                "topic-a",
                "eip155:1",
                "wallet_switchEthereumChain",
                json!([{"chainId": "0x89"}]),
            ),
            RpcServer::Main,
            &session(&[1, 137]),
        )
        .expect("translate");
    assert_eq!(
        action,
        WalletAction::SwitchChain {
            server: RpcServer::Polygon
        }
    );

    translator
        .translate(
            &request(
                9,
                "topic-a",
                "eip155:1",
                "wallet_switchEthereumChain",
                json!([{"chainId": "0xa"}]),
            ),
            RpcServer::Main,
            &session(&[1, 137]),
        )
        .expect_err("optimism not in session");
}

#[test]
fn unknown_methods_and_disabled_eth_sign_fail() {
    let translator = Eip155ActionTranslator::default();
    let err = translator
        .translate(
            &request(10, "topic-a", "eip155:1", "eth_accounts", json!([])),
            RpcServer::Main,
            &session(&[1]),
        )
        .expect_err("unknown method");
    assert!(matches!(err, PortError::Validation(_)));

    let err = translator
        .translate(
            &request(11, "topic-a", "eip155:1", "eth_sign", json!([owner(), "0x00"])),
            RpcServer::Main,
            &session(&[1]),
        )
        .expect_err("eth_sign disabled");
    assert!(matches!(err, PortError::Policy(_)));
}
