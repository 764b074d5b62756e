//! Proposal lifecycle: queueing, pre-validation, user decision, approval
//! and settlement, plus the session-level events that follow.

use std::collections::{HashMap, VecDeque};

use tracing::{debug, info, warn};

use crate::broker::Broker;
use crate::config::EmptySessionPolicy;
use crate::domain::{
    Account, ProtocolReason, Session, SessionNamespaces, SessionProposal, TimestampMs,
};
use crate::events::BrokerNotification;
use crate::namespaces::{
    build_session_namespaces, recompute_session_namespaces, validate_network_kinds,
    NamespaceError,
};
use crate::pairing::PairingUri;
use crate::ports::{
    ActionTranslatorPort, ActiveChainsPort, ClockPort, NotificationPort, PortError,
    ProtocolClientPort, SessionPersistencePort, SignerPort,
};
use crate::state_machine::{proposal_transition, ProposalAction, ProposalStatus};

/// Status of every proposal still in flight, plus a bounded memory of
/// finished ones so a replayed proposal id is not surfaced twice.
#[derive(Debug)]
pub struct ProposalLedger {
    live: HashMap<u64, ProposalStatus>,
    finished: HashMap<u64, ProposalStatus>,
    finished_order: VecDeque<u64>,
    history_limit: usize,
}

impl ProposalLedger {
    pub fn new(history_limit: usize) -> Self {
        Self {
            live: HashMap::new(),
            finished: HashMap::new(),
            finished_order: VecDeque::new(),
            history_limit: history_limit.max(1),
        }
    }

    pub fn status(&self, proposal_id: u64) -> Option<ProposalStatus> {
        self.live
            .get(&proposal_id)
            .or_else(|| self.finished.get(&proposal_id))
            .copied()
    }

    pub fn is_known(&self, proposal_id: u64) -> bool {
        self.live.contains_key(&proposal_id) || self.finished.contains_key(&proposal_id)
    }

    /// Proposals held in memory, in flight or finished.
    pub fn tracked(&self) -> usize {
        self.live.len() + self.finished.len()
    }

    fn record(&mut self, proposal_id: u64, status: ProposalStatus) {
        if !status.is_terminal() {
            self.live.insert(proposal_id, status);
            return;
        }
        self.live.remove(&proposal_id);
        if self.finished.insert(proposal_id, status).is_none() {
            self.finished_order.push_back(proposal_id);
        }
        while self.finished_order.len() > self.history_limit {
            if let Some(oldest) = self.finished_order.pop_front() {
                self.finished.remove(&oldest);
            }
        }
    }
}

fn rejection_for(err: &NamespaceError) -> ProtocolReason {
    match err {
        NamespaceError::MixedNetworkKind { namespace } => {
            ProtocolReason::mixed_network_kind(namespace)
        }
        NamespaceError::NoSupportedChains => ProtocolReason::unsupported_chains(),
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
    pub fn on_proposal_received(&mut self, proposal: SessionProposal) -> Result<(), PortError> {
        if self.proposal_ledger.is_known(proposal.id) {
            info!(proposal_id = proposal.id, "duplicate session proposal ignored");
            return Ok(());
        }
        self.proposal_ledger
            .record(proposal.id, ProposalStatus::Received);

        let now = self.now()?;
        let proposal_id = proposal.id;
        let surfaced = self.proposals.enqueue(proposal, now);
        if surfaced.is_none() {
            info!(
                proposal_id,
                backlog = self.proposals.backlog_len(),
                "session proposal queued behind current decision"
            );
        }
        self.present(surfaced, now)
    }

    pub fn on_user_decision(&mut self, proposal_id: u64, approve: bool) -> Result<(), PortError> {
        let current = match self.proposals.current() {
            Some(p) if p.id == proposal_id => p.clone(),
            _ => {
                info!(proposal_id, "decision for a proposal that is not current");
                return Err(PortError::NotFound(format!(
                    "proposal {proposal_id} is not awaiting a decision"
                )));
            }
        };

        if !approve {
            self.reject_proposal(&current, ProtocolReason::user_rejected())?;
        } else {
            match self.grant(&current) {
                Ok(namespaces) => {
                    self.advance_proposal(current.id, ProposalAction::Approve)?;
                    info!(proposal_id, namespaces = namespaces.len(), "approving session proposal");
                    self.dispatch("approve", self.protocol.approve(current.id, &namespaces));
                }
                Err(reason) => self.reject_proposal(&current, reason)?,
            }
        }

        let now = self.now()?;
        let next = self.proposals.resolve_current(now);
        self.present(next, now)
    }

    /// The only path by which the store gains a session.
    pub fn on_session_settled(
        &mut self,
        proposal_id: Option<u64>,
        session: Session,
    ) -> Result<(), PortError> {
        if let Some(id) = proposal_id {
            match self.proposal_status(id) {
                Some(ProposalStatus::Approved) => {
                    self.advance_proposal(id, ProposalAction::Settle)?;
                }
                status => info!(proposal_id = id, ?status, "settlement for a proposal we did not approve"),
            }
        }

        let topic = session.topic.clone();
        if let Err(e) = self.store.upsert(session) {
            self.report_error("session_settled", format!("failed to persist session {topic}: {e}"));
            return Err(e);
        }
        info!(topic = %topic, "session settled");
        self.notify_sessions_changed();
        Ok(())
    }

    /// Remote deletes are authoritative and idempotent.
    pub fn on_session_deleted(
        &mut self,
        topic: &str,
        reason: Option<&ProtocolReason>,
    ) -> Result<(), PortError> {
        let removed = match self.store.remove(topic) {
            Ok(removed) => removed,
            Err(e) => {
                self.report_error("session_deleted", format!("failed to persist delete of {topic}: {e}"));
                return Err(e);
            }
        };
        let dropped = self.requests.drop_topic(topic);
        match removed {
            Some(_) => {
                info!(topic, reason = ?reason, dropped_requests = dropped, "session deleted by peer");
                self.notify_sessions_changed();
            }
            None => info!(topic, "delete for unknown session; nothing to do"),
        }
        Ok(())
    }

    pub fn on_namespaces_updated_externally(
        &mut self,
        topic: &str,
        namespaces: SessionNamespaces,
    ) -> Result<(), PortError> {
        if self.store.update_namespaces(topic, namespaces)? {
            info!(topic, "session namespaces updated by peer");
            self.notify_sessions_changed();
        } else {
            info!(topic, "namespace update for unknown session ignored");
        }
        Ok(())
    }

    pub fn on_session_extended(
        &mut self,
        topic: &str,
        expires_at_ms: TimestampMs,
    ) -> Result<(), PortError> {
        if self.store.update_expiry(topic, expires_at_ms)? {
            debug!(topic, expires_at_ms = expires_at_ms.0, "session extended");
            self.notify_sessions_changed();
        } else {
            info!(topic, "extension for unknown session ignored");
        }
        Ok(())
    }

    /// Re-filters every stored session against the wallet's current
    /// accounts and pushes the changes to the peer.
    pub fn on_active_accounts_changed(&mut self) -> Result<(), PortError> {
        let active = match self.chains.active_accounts() {
            Ok(active) => active,
            Err(e) => {
                self.report_error("active_accounts_changed", e.to_string());
                return Err(e);
            }
        };

        let mut changed = false;
        for session in self.store.sessions() {
            let topic = session.topic.as_str();
            let rebuilt = recompute_session_namespaces(&session, &active);

            if rebuilt.is_empty() {
                match self.config.empty_session_policy {
                    EmptySessionPolicy::KeepSession => {
                        info!(topic, "no active accounts left for session; keeping it");
                    }
                    EmptySessionPolicy::Disconnect => {
                        info!(topic, "no active accounts left for session; disconnecting");
                        self.dispatch(
                            "disconnect",
                            self.protocol
                                .disconnect(topic, &ProtocolReason::user_disconnected()),
                        );
                        self.store.remove(topic)?;
                        self.requests.drop_topic(topic);
                        changed = true;
                    }
                }
                continue;
            }

            if rebuilt == session.namespaces {
                continue;
            }
            if self.store.update_namespaces(topic, rebuilt.clone())? {
                self.dispatch("update", self.protocol.update(topic, &rebuilt));
                changed = true;
            }
        }

        if changed {
            self.notify_sessions_changed();
        }
        Ok(())
    }

    /// Wallet-initiated disconnect; the wallet is authoritative for its own
    /// side, so the record is removed without waiting for an echo.
    pub fn disconnect(&mut self, topic: &str) -> Result<(), PortError> {
        if !self.store.contains(topic) {
            info!(topic, "disconnect for unknown session");
            return Err(PortError::NotFound(format!("session not found: {topic}")));
        }
        self.dispatch(
            "disconnect",
            self.protocol
                .disconnect(topic, &ProtocolReason::user_disconnected()),
        );
        self.store.remove(topic)?;
        self.requests.drop_topic(topic);
        self.notify_sessions_changed();
        Ok(())
    }

    pub fn pair(&mut self, uri: &str) -> Result<(), PortError> {
        let pairing = PairingUri::parse(uri).map_err(|e| {
            info!(error = %e, "rejecting malformed pairing uri");
            PortError::Validation(e.to_string())
        })?;
        debug!(pairing_topic = %pairing.topic, "pairing");
        self.dispatch("connect", self.protocol.connect(uri));
        Ok(())
    }

    pub fn expire_stale_proposal(&mut self) -> Result<(), PortError> {
        let Some(timeout_ms) = self.config.proposal_decision_timeout_ms else {
            return Ok(());
        };
        let (Some(current), Some(surfaced_at)) =
            (self.proposals.current().cloned(), self.proposals.surfaced_at())
        else {
            return Ok(());
        };
        let now = self.now()?;
        if surfaced_at.saturating_add_ms(timeout_ms) > now {
            return Ok(());
        }

        info!(proposal_id = current.id, timeout_ms, "proposal decision timed out");
        self.reject_proposal(&current, ProtocolReason::proposal_expired())?;
        let next = self.proposals.resolve_current(now);
        self.present(next, now)
    }

    pub fn prune_expired_sessions(&mut self) -> Result<(), PortError> {
        let now = self.now()?;
        let expired = self.store.prune_expired(now)?;
        if expired.is_empty() {
            return Ok(());
        }
        for topic in &expired {
            self.requests.drop_topic(topic);
        }
        info!(count = expired.len(), "pruned expired sessions");
        self.notify_sessions_changed();
        Ok(())
    }

    /// Surfaces `next` to the user, auto-rejecting and moving on while the
    /// front of the queue is unsatisfiable.
    fn present(
        &mut self,
        mut next: Option<SessionProposal>,
        now: TimestampMs,
    ) -> Result<(), PortError> {
        while let Some(proposal) = next.take() {
            self.advance_proposal(proposal.id, ProposalAction::Validate)?;
            match self.prevalidate(&proposal, now) {
                Ok(()) => {
                    self.advance_proposal(proposal.id, ProposalAction::AwaitUser)?;
                    self.notifier
                        .notify(BrokerNotification::ProposalAwaitingDecision { proposal });
                }
                Err(reason) => {
                    self.reject_proposal(&proposal, reason)?;
                    next = self.proposals.resolve_current(now);
                }
            }
        }
        Ok(())
    }

    /// Checks that need no user input. A failing account lookup does not
    /// auto-reject; the decision path re-checks with fresh accounts.
    fn prevalidate(&self, proposal: &SessionProposal, now: TimestampMs) -> Result<(), ProtocolReason> {
        if proposal.expires_at_ms.is_some_and(|exp| exp <= now) {
            info!(proposal_id = proposal.id, "proposal already expired");
            return Err(ProtocolReason::proposal_expired());
        }
        if let Err(e) = validate_network_kinds(&proposal.required_namespaces) {
            self.report_error("session_proposal", e.to_string());
            return Err(rejection_for(&e));
        }
        match self.chains.active_accounts() {
            Ok(active) => {
                if let Err(e) = build_session_namespaces(&proposal.required_namespaces, &active) {
                    self.report_error("session_proposal", e.to_string());
                    return Err(rejection_for(&e));
                }
            }
            Err(e) => warn!(proposal_id = proposal.id, error = %e, "active accounts unavailable"),
        }
        Ok(())
    }

    fn grant(&self, proposal: &SessionProposal) -> Result<SessionNamespaces, ProtocolReason> {
        let active = self.chains.active_accounts().map_err(|e| {
            self.report_error("session_proposal", format!("active accounts unavailable: {e}"));
            ProtocolReason::unsupported_chains()
        })?;
        let namespaces =
            build_session_namespaces(&proposal.required_namespaces, &active).map_err(|e| {
                self.report_error("session_proposal", e.to_string());
                rejection_for(&e)
            })?;
        let accounts: Vec<Account> = namespaces
            .values()
            .flat_map(|ns| ns.all_accounts())
            .cloned()
            .collect();
        self.signer
            .authorize_approval(proposal, &accounts)
            .map_err(|e| {
                self.report_error("session_proposal", format!("signer refused approval: {e}"));
                ProtocolReason::unsupported_accounts()
            })?;
        Ok(namespaces)
    }

    /// Terminal rejection of the current proposal. Does not advance the
    /// queue.
    fn reject_proposal(
        &mut self,
        proposal: &SessionProposal,
        reason: ProtocolReason,
    ) -> Result<(), PortError> {
        self.advance_proposal(proposal.id, ProposalAction::Reject)?;
        info!(proposal_id = proposal.id, code = reason.code, message = %reason.message, "rejecting session proposal");
        self.dispatch("reject", self.protocol.reject(proposal.id, &reason));
        Ok(())
    }

    fn advance_proposal(
        &mut self,
        proposal_id: u64,
        action: ProposalAction,
    ) -> Result<ProposalStatus, PortError> {
        let from = self
            .proposal_status(proposal_id)
            .unwrap_or(ProposalStatus::Received);
        let (to, transition) = proposal_transition(from, action)?;
        debug!(proposal_id, from = transition.from, to = transition.to, "proposal transition");
        self.proposal_ledger.record(proposal_id, to);
        Ok(to)
    }
}
