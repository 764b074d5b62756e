use tracing::{debug, warn};

use crate::config::BrokerConfig;
use crate::domain::{Session, SessionProposal, TimestampMs};
use crate::events::{BrokerCommand, BrokerNotification, ProtocolEvent};
use crate::ports::{
    ActionTranslatorPort, ActiveChainsPort, ClockPort, NotificationPort, PortError,
    ProtocolClientPort, SessionPersistencePort, SignerPort,
};
use crate::negotiator::ProposalLedger;
use crate::proposal_queue::ProposalQueue;
use crate::router::RequestLedger;
use crate::state_machine::{ProposalStatus, RequestStatus};
use crate::store::{LoadReport, SessionStore};

/// Session negotiator and request router behind one sequential entry point.
///
/// Events and commands must be fed from a single execution context; the
/// broker takes `&mut self` and assumes nobody else touches its store or
/// proposal queue meanwhile.
pub struct Broker<P, A, T, G, N, C, S>
where
    P: ProtocolClientPort,
    A: ActiveChainsPort,
    T: ActionTranslatorPort,
    G: SignerPort,
    N: NotificationPort,
    C: ClockPort,
    S: SessionPersistencePort,
{
    pub protocol: P,
    pub chains: A,
    pub translator: T,
    pub signer: G,
    pub notifier: N,
    pub clock: C,
    pub(crate) config: BrokerConfig,
    pub(crate) store: SessionStore<S>,
    pub(crate) proposals: ProposalQueue,
    pub(crate) proposal_ledger: ProposalLedger,
    pub(crate) requests: RequestLedger,
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
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        protocol: P,
        chains: A,
        translator: T,
        signer: G,
        notifier: N,
        clock: C,
        persistence: S,
        config: BrokerConfig,
    ) -> Result<(Self, LoadReport), PortError> {
        let now = TimestampMs(clock.now_ms()?);
        let (store, report) = SessionStore::open(persistence, now)?;
        let broker = Self {
            protocol,
            chains,
            translator,
            signer,
            notifier,
            clock,
            proposals: ProposalQueue::new(config.backlog_order),
            requests: RequestLedger::new(config.responded_history_limit),
            proposal_ledger: ProposalLedger::new(config.responded_history_limit),
            store,
            config,
        };
        Ok((broker, report))
    }

    pub fn handle_event(&mut self, event: ProtocolEvent) -> Result<(), PortError> {
        debug!(kind = event.kind(), topic = event.topic().unwrap_or("-"), "protocol event");
        match event {
            ProtocolEvent::SessionProposal(proposal) => self.on_proposal_received(proposal),
            ProtocolEvent::SessionRequest(request) => self.on_request_received(request),
            ProtocolEvent::SessionSettled {
                proposal_id,
                session,
            } => self.on_session_settled(proposal_id, session),
            ProtocolEvent::SessionDeleted { topic, reason } => {
                self.on_session_deleted(&topic, reason.as_ref())
            }
            ProtocolEvent::SessionUpdated { topic, namespaces } => {
                self.on_namespaces_updated_externally(&topic, namespaces)
            }
            ProtocolEvent::SessionExtended {
                topic,
                expires_at_ms,
            } => self.on_session_extended(&topic, expires_at_ms),
        }
    }

    pub fn handle(&mut self, command: BrokerCommand) -> Result<(), PortError> {
        debug!(kind = command.kind(), "broker command");
        match command {
            BrokerCommand::Pair { uri } => self.pair(&uri),
            BrokerCommand::DecideProposal {
                proposal_id,
                approve,
            } => self.on_user_decision(proposal_id, approve),
            BrokerCommand::Respond {
                request_id,
                outcome,
            } => self.respond(request_id, outcome),
            BrokerCommand::Disconnect { topic } => self.disconnect(&topic),
            BrokerCommand::ActiveAccountsChanged => self.on_active_accounts_changed(),
            BrokerCommand::ExpireStaleProposal => self.expire_stale_proposal(),
            BrokerCommand::PruneExpiredSessions => self.prune_expired_sessions(),
        }
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    pub fn store(&self) -> &SessionStore<S> {
        &self.store
    }

    pub fn sessions(&self) -> Vec<Session> {
        self.store.sessions()
    }

    pub fn session(&self, topic: &str) -> Option<Session> {
        self.store.get(topic)
    }

    pub fn current_proposal(&self) -> Option<&SessionProposal> {
        self.proposals.current()
    }

    pub fn queued_proposals(&self) -> usize {
        self.proposals.backlog_len()
    }

    pub fn proposal_status(&self, proposal_id: u64) -> Option<ProposalStatus> {
        self.proposal_ledger.status(proposal_id)
    }

    pub fn tracked_proposals(&self) -> usize {
        self.proposal_ledger.tracked()
    }

    pub fn request_status(&self, request_id: u64) -> Option<RequestStatus> {
        self.requests.status(request_id)
    }

    pub(crate) fn now(&self) -> Result<TimestampMs, PortError> {
        Ok(TimestampMs(self.clock.now_ms()?))
    }

    /// Outbound commands are fire-and-forget: a failure is logged and no
    /// local state is rolled back.
    pub(crate) fn dispatch(&self, command: &'static str, result: Result<(), PortError>) {
        if let Err(e) = result {
            warn!(command, error = %e, "protocol command failed");
        }
    }

    pub(crate) fn report_error(&self, context: &str, message: impl Into<String>) {
        let message = message.into();
        warn!(context, %message, "broker error");
        self.notifier
            .notify(BrokerNotification::error(context, message));
    }

    pub(crate) fn notify_sessions_changed(&self) {
        self.notifier.notify(BrokerNotification::SessionsChanged {
            sessions: self.store.sessions(),
        });
    }
}
