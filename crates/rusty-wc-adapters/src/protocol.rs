use std::sync::{Arc, Mutex};

use rusty_wc_core::{
    BrokerNotification, JsonRpcResponse, NotificationPort, PortError, ProtocolClientPort,
    ProtocolCommand, ProtocolReason, SessionNamespaces,
};
use tracing::warn;

/// Protocol client that records every command instead of sending it.
/// Clones share the same log, so a test can keep a handle while the broker
/// owns another.
#[derive(Debug, Clone, Default)]
pub struct RecordingProtocolClient {
    inner: Arc<Mutex<RecordingState>>,
}

#[derive(Debug, Default)]
struct RecordingState {
    sent: Vec<ProtocolCommand>,
    fail_with: Option<String>,
}

impl RecordingProtocolClient {
    /// Every later command is still recorded but reported as a transport
    /// failure.
    pub fn fail_all(&self, message: impl Into<String>) -> Result<(), PortError> {
        let mut g = self.lock()?;
        g.fail_with = Some(message.into());
        Ok(())
    }

    pub fn sent(&self) -> Result<Vec<ProtocolCommand>, PortError> {
        Ok(self.lock()?.sent.clone())
    }

    pub fn take(&self) -> Result<Vec<ProtocolCommand>, PortError> {
        Ok(std::mem::take(&mut self.lock()?.sent))
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, RecordingState>, PortError> {
        self.inner
            .lock()
            .map_err(|e| PortError::Transport(format!("protocol client lock poisoned: {e}")))
    }

    fn record(&self, command: ProtocolCommand) -> Result<(), PortError> {
        let mut g = self.lock()?;
        g.sent.push(command);
        match &g.fail_with {
            Some(message) => Err(PortError::Transport(message.clone())),
            None => Ok(()),
        }
    }
}

impl ProtocolClientPort for RecordingProtocolClient {
    fn connect(&self, uri: &str) -> Result<(), PortError> {
        self.record(ProtocolCommand::Connect {
            uri: uri.to_owned(),
        })
    }

    fn approve(&self, proposal_id: u64, namespaces: &SessionNamespaces) -> Result<(), PortError> {
        self.record(ProtocolCommand::Approve {
            proposal_id,
            namespaces: namespaces.clone(),
        })
    }

    fn reject(&self, proposal_id: u64, reason: &ProtocolReason) -> Result<(), PortError> {
        self.record(ProtocolCommand::Reject {
            proposal_id,
            reason: reason.clone(),
        })
    }

    fn respond(&self, topic: &str, response: &JsonRpcResponse) -> Result<(), PortError> {
        self.record(ProtocolCommand::Respond {
            topic: topic.to_owned(),
            response: response.clone(),
        })
    }

    fn update(&self, topic: &str, namespaces: &SessionNamespaces) -> Result<(), PortError> {
        self.record(ProtocolCommand::Update {
            topic: topic.to_owned(),
            namespaces: namespaces.clone(),
        })
    }

    fn disconnect(&self, topic: &str, reason: &ProtocolReason) -> Result<(), PortError> {
        self.record(ProtocolCommand::Disconnect {
            topic: topic.to_owned(),
            reason: reason.clone(),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    inner: Arc<Mutex<Vec<BrokerNotification>>>,
}

impl RecordingNotifier {
    pub fn notifications(&self) -> Vec<BrokerNotification> {
        match self.inner.lock() {
            Ok(g) => g.clone(),
            Err(e) => {
                warn!(error = %e, "notifier lock poisoned");
                Vec::new()
            }
        }
    }

    pub fn take(&self) -> Vec<BrokerNotification> {
        match self.inner.lock() {
            Ok(mut g) => std::mem::take(&mut *g),
            Err(e) => {
                warn!(error = %e, "notifier lock poisoned");
                Vec::new()
            }
        }
    }
}

impl NotificationPort for RecordingNotifier {
    fn notify(&self, notification: BrokerNotification) {
        match self.inner.lock() {
            Ok(mut g) => g.push(notification),
            Err(e) => warn!(error = %e, "notifier lock poisoned; dropping notification"),
        }
    }
}
