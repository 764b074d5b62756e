//! Wire shapes of the stdio bridge and the channel-backed ports that feed
//! the outbound stream.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc::UnboundedSender;
use tracing::warn;

use rusty_wc_adapters::{FileSessionPersistence, InMemorySessionPersistence};
use rusty_wc_core::{
    Account, BrokerCommand, BrokerNotification, JsonRpcResponse, NotificationPort, PortError,
    ProtocolClientPort, ProtocolCommand, ProtocolEvent, ProtocolReason, Session,
    SessionNamespaces, SessionPersistencePort,
};

/// One line read from stdin.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Inbound {
    Event(ProtocolEvent),
    Command(BrokerCommand),
    Wallet(WalletInput),
}

/// Wallet-side state changes that are not broker commands themselves.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "wallet", rename_all = "snake_case")]
pub enum WalletInput {
    SetAccounts { accounts: Vec<Account> },
}

/// One line written to stdout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Outbound {
    Protocol(ProtocolCommand),
    Notification(BrokerNotification),
}

/// Reads newline-delimited input until EOF. Lines that are not UTF-8 or
/// not a known shape are reported as `Error` notifications and skipped;
/// only an I/O failure of the reader itself ends the loop early.
pub async fn read_inbound<R>(
    mut reader: R,
    inbound: &UnboundedSender<Inbound>,
    outbound: &UnboundedSender<Outbound>,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let reject = |message: String| {
        let _ = outbound.send(Outbound::Notification(BrokerNotification::error(
            "input", message,
        )));
    };

    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            return Ok(());
        }
        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line.trim(),
            Err(e) => {
                warn!(error = %e, "ignoring input line that is not valid UTF-8");
                reject(format!("input line is not valid UTF-8: {e}"));
                continue;
            }
        };
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Inbound>(line) {
            Ok(input) => {
                if inbound.send(input).is_err() {
                    warn!("broker stopped; no longer reading input");
                    return Ok(());
                }
            }
            Err(e) => {
                warn!(error = %e, "ignoring unparseable input line");
                reject(e.to_string());
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChannelProtocolClient {
    tx: UnboundedSender<Outbound>,
}

impl ChannelProtocolClient {
    pub fn new(tx: UnboundedSender<Outbound>) -> Self {
        Self { tx }
    }

    fn send(&self, command: ProtocolCommand) -> Result<(), PortError> {
        self.tx
            .send(Outbound::Protocol(command))
            .map_err(|_| PortError::Transport("outbound channel closed".to_owned()))
    }
}

impl ProtocolClientPort for ChannelProtocolClient {
    fn connect(&self, uri: &str) -> Result<(), PortError> {
        self.send(ProtocolCommand::Connect {
            uri: uri.to_owned(),
        })
    }

    fn approve(&self, proposal_id: u64, namespaces: &SessionNamespaces) -> Result<(), PortError> {
        self.send(ProtocolCommand::Approve {
            proposal_id,
            namespaces: namespaces.clone(),
        })
    }

    fn reject(&self, proposal_id: u64, reason: &ProtocolReason) -> Result<(), PortError> {
        self.send(ProtocolCommand::Reject {
            proposal_id,
            reason: reason.clone(),
        })
    }

    fn respond(&self, topic: &str, response: &JsonRpcResponse) -> Result<(), PortError> {
        self.send(ProtocolCommand::Respond {
            topic: topic.to_owned(),
            response: response.clone(),
        })
    }

    fn update(&self, topic: &str, namespaces: &SessionNamespaces) -> Result<(), PortError> {
        self.send(ProtocolCommand::Update {
            topic: topic.to_owned(),
            namespaces: namespaces.clone(),
        })
    }

    fn disconnect(&self, topic: &str, reason: &ProtocolReason) -> Result<(), PortError> {
        self.send(ProtocolCommand::Disconnect {
            topic: topic.to_owned(),
            reason: reason.clone(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: UnboundedSender<Outbound>,
}

impl ChannelNotifier {
    pub fn new(tx: UnboundedSender<Outbound>) -> Self {
        Self { tx }
    }
}

impl NotificationPort for ChannelNotifier {
    fn notify(&self, notification: BrokerNotification) {
        if self.tx.send(Outbound::Notification(notification)).is_err() {
            warn!("outbound channel closed; dropping notification");
        }
    }
}

/// Persistence picked at startup from `RUSTY_WC_STORE_PATH`.
#[derive(Debug, Clone)]
pub enum SessionBackend {
    File(FileSessionPersistence),
    Memory(InMemorySessionPersistence),
}

impl SessionPersistencePort for SessionBackend {
    fn load_sessions(&self) -> Result<Vec<Value>, PortError> {
        match self {
            SessionBackend::File(file) => file.load_sessions(),
            SessionBackend::Memory(memory) => memory.load_sessions(),
        }
    }

    fn save_sessions(&self, sessions: &[Session]) -> Result<(), PortError> {
        match self {
            SessionBackend::File(file) => file.save_sessions(sessions),
            SessionBackend::Memory(memory) => memory.save_sessions(sessions),
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;

    #[tokio::test]
    async fn bad_input_lines_do_not_stop_the_reader() {
        let (in_tx, mut in_rx) = mpsc::unbounded_channel();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let input: &[u8] = b"\xff\xfe garbage\n\n{not json}\n{\"type\":\"session_deleted\",\"topic\":\"t\"}";

        read_inbound(input, &in_tx, &out_tx).await.expect("read input");

        assert!(matches!(
            in_rx.try_recv().expect("event after bad lines"),
            Inbound::Event(ProtocolEvent::SessionDeleted { topic, .. }) if topic == "t"
        ));
        assert!(in_rx.try_recv().is_err());

        for _ in 0..2 {
            assert!(matches!(
                out_rx.try_recv().expect("error notification"),
                Outbound::Notification(BrokerNotification::Error { context, .. }) if context == "input"
            ));
        }
        assert!(out_rx.try_recv().is_err());
    }

    #[test]
    fn inbound_lines_pick_the_right_variant() {
        let event: Inbound = serde_json::from_str(r#"{"type":"session_deleted","topic":"t"}"#)
            .expect("event line");
        assert!(matches!(event, Inbound::Event(ProtocolEvent::SessionDeleted { .. })));

        let command: Inbound =
            serde_json::from_str(r#"{"command":"disconnect","topic":"t"}"#).expect("command line");
        assert!(matches!(
            command,
            Inbound::Command(BrokerCommand::Disconnect { .. })
        ));

        let wallet: Inbound = serde_json::from_str(
            r#"{"wallet":"set_accounts","accounts":["eip155:1:0x1000000000000000000000000000000000000001"]}"#,
        )
        .expect("wallet line");
        assert!(matches!(wallet, Inbound::Wallet(WalletInput::SetAccounts { .. })));
    }

    #[test]
    fn outbound_keeps_inner_tags() {
        let line = serde_json::to_value(Outbound::Protocol(ProtocolCommand::Connect {
            uri: "wc:x@2".to_owned(),
        }))
        .expect("serialize");
        assert_eq!(line["command"], "connect");
    }
}
