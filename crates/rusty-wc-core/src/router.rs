//! Inbound request validation and dispatch, and exactly-once responses.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::{debug, error, info};

use crate::broker::Broker;
use crate::codec;
use crate::domain::{
    JsonRpcResponse, RequestOutcome, RpcError, SessionRequest, WalletActionRequest,
};
use crate::events::BrokerNotification;
use crate::ports::{
    ActionTranslatorPort, ActiveChainsPort, ClockPort, NotificationPort, PortError,
    ProtocolClientPort, SessionPersistencePort, SignerPort,
};
use crate::state_machine::{request_transition, RequestAction, RequestStatus};

#[derive(Debug, Clone)]
struct PendingRequest {
    topic: String,
    status: RequestStatus,
}

/// Tracks in-flight requests and remembers answered ids so that a second
/// response for the same id is never sent.
#[derive(Debug)]
pub struct RequestLedger {
    pending: HashMap<u64, PendingRequest>,
    responded: HashSet<u64>,
    responded_order: VecDeque<u64>,
    history_limit: usize,
}

impl RequestLedger {
    pub fn new(history_limit: usize) -> Self {
        Self {
            pending: HashMap::new(),
            responded: HashSet::new(),
            responded_order: VecDeque::new(),
            history_limit: history_limit.max(1),
        }
    }

    pub fn status(&self, request_id: u64) -> Option<RequestStatus> {
        if self.responded.contains(&request_id) {
            return Some(RequestStatus::Responded);
        }
        self.pending.get(&request_id).map(|p| p.status)
    }

    pub fn is_known(&self, request_id: u64) -> bool {
        self.responded.contains(&request_id) || self.pending.contains_key(&request_id)
    }

    fn begin(&mut self, request_id: u64, topic: &str) {
        self.pending.insert(
            request_id,
            PendingRequest {
                topic: topic.to_owned(),
                status: RequestStatus::Received,
            },
        );
    }

    fn advance(&mut self, request_id: u64, action: RequestAction) -> Result<RequestStatus, PortError> {
        let pending = self
            .pending
            .get_mut(&request_id)
            .ok_or_else(|| PortError::NotFound(format!("wc request not found: {request_id}")))?;
        let (to, transition) = request_transition(pending.status, action)?;
        debug!(request_id, from = transition.from, to = transition.to, "request transition");
        pending.status = to;
        Ok(to)
    }

    fn complete(&mut self, request_id: u64) {
        self.pending.remove(&request_id);
        if self.responded.insert(request_id) {
            self.responded_order.push_back(request_id);
        }
        while self.responded_order.len() > self.history_limit {
            if let Some(oldest) = self.responded_order.pop_front() {
                self.responded.remove(&oldest);
            }
        }
    }

    /// Forgets pending requests of a session that no longer exists.
    pub fn drop_topic(&mut self, topic: &str) -> usize {
        let before = self.pending.len();
        self.pending.retain(|_, p| p.topic != topic);
        before - self.pending.len()
    }
}

impl<P, A, T, G, N, C, S> Broker<P, A, T, G, N, C, S>
where
    P: ProtocolClientPort,
    A: ActiveChainsPort,
    T: ActionTranslatorPort,
    G: SignerPort,
    N: NotificationPort,
    C: ClockPort,
    S: SessionPersistencePort,
{
    /// Every failure below answers the request immediately; nothing is
    /// retried and nothing is dropped silently.
    pub fn on_request_received(&mut self, request: SessionRequest) -> Result<(), PortError> {
        let request_id = request.id;
        if self.requests.is_known(request_id) {
            error!(request_id, topic = %request.topic, "duplicate request id from peer; ignoring");
            return Err(PortError::Conflict(format!(
                "WC_REQUEST_DUPLICATE: {request_id}"
            )));
        }
        self.requests.begin(request_id, &request.topic);

        let Some(server) = codec::decode(&request.chain_id) else {
            return self.fail_request(&request, RpcError::unsupported_chain(&request.chain_id));
        };
        let enabled = match self.chains.enabled_servers() {
            Ok(enabled) => enabled,
            Err(e) => {
                self.report_error("session_request", format!("active chains unavailable: {e}"));
                return self.fail_request(&request, RpcError::internal("Wallet chains unavailable"));
            }
        };
        if !enabled.contains(&server) {
            return self.fail_request(&request, RpcError::unsupported_chain(&request.chain_id));
        }

        let Some(session) = self.store.get(&request.topic) else {
            return self.fail_request(
                &request,
                RpcError::request_rejected(format!("No session for topic {}", request.topic)),
            );
        };
        if !session.grants_chain(&server.to_chain_id()) {
            return self.fail_request(&request, RpcError::unsupported_chain(&request.chain_id));
        }
        self.requests.advance(request_id, RequestAction::Route)?;

        let action = match self.translator.translate(&request, server, &session) {
            Ok(action) => action,
            Err(e) => {
                self.report_error(
                    "session_request",
                    format!("cannot translate {} request {request_id}: {e}", request.method),
                );
                return self.fail_request(&request, RpcError::request_rejected(e.to_string()));
            }
        };

        self.requests
            .advance(request_id, RequestAction::SurfaceToWallet)?;
        info!(request_id, topic = %request.topic, method = %request.method, %server, "wallet action required");
        self.notifier.notify(BrokerNotification::WalletActionRequired {
            request: WalletActionRequest {
                request_id,
                topic: request.topic,
                server,
                peer: session.peer,
                action,
            },
        });
        Ok(())
    }

    /// Sends the single response for `request_id`. A second call for the
    /// same id is refused without touching the wire.
    pub fn respond(&mut self, request_id: u64, outcome: RequestOutcome) -> Result<(), PortError> {
        if self.requests.status(request_id) == Some(RequestStatus::Responded) {
            error!(request_id, "request already responded; dropping duplicate response");
            return Err(PortError::Conflict(format!(
                "WC_REQUEST_ALREADY_RESPONDED: {request_id}"
            )));
        }
        let Some(topic) = self
            .requests
            .pending
            .get(&request_id)
            .map(|p| p.topic.clone())
        else {
            error!(request_id, "response for unknown request");
            return Err(PortError::NotFound(format!(
                "wc request not found: {request_id}"
            )));
        };
        self.send_response(&topic, JsonRpcResponse::from_outcome(request_id, outcome))
    }

    fn fail_request(&mut self, request: &SessionRequest, err: RpcError) -> Result<(), PortError> {
        info!(
            request_id = request.id,
            topic = %request.topic,
            method = %request.method,
            code = err.code,
            message = %err.message,
            "answering request with error"
        );
        self.send_response(&request.topic, JsonRpcResponse::error(request.id, err))
    }

    fn send_response(&mut self, topic: &str, response: JsonRpcResponse) -> Result<(), PortError> {
        let request_id = response.id;
        self.requests.advance(request_id, RequestAction::Respond)?;
        self.dispatch("respond", self.protocol.respond(topic, &response));
        self.requests.complete(request_id);
        debug!(request_id, topic, error = response.is_error(), "request answered");
        Ok(())
    }
}
