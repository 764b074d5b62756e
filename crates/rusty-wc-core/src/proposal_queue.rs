//! Serializes incoming session proposals into one user-facing decision at
//! a time. The approval UI is a singleton, so there is exactly one
//! `current` proposal globally and everything else waits in the backlog.

use std::collections::VecDeque;

use crate::config::BacklogOrder;
use crate::domain::{SessionProposal, TimestampMs};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueState {
    Idle,
    AwaitingDecision {
        current: SessionProposal,
        surfaced_at_ms: TimestampMs,
    },
}

#[derive(Debug, Clone)]
pub struct ProposalQueue {
    state: QueueState,
    backlog: VecDeque<SessionProposal>,
    order: BacklogOrder,
}

impl ProposalQueue {
    pub fn new(order: BacklogOrder) -> Self {
        Self {
            state: QueueState::Idle,
            backlog: VecDeque::new(),
            order,
        }
    }

    pub fn state(&self) -> &QueueState {
        &self.state
    }

    pub fn current(&self) -> Option<&SessionProposal> {
        match &self.state {
            QueueState::Idle => None,
            QueueState::AwaitingDecision { current, .. } => Some(current),
        }
    }

    pub fn surfaced_at(&self) -> Option<TimestampMs> {
        match &self.state {
            QueueState::Idle => None,
            QueueState::AwaitingDecision { surfaced_at_ms, .. } => Some(*surfaced_at_ms),
        }
    }

    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, QueueState::Idle)
    }

    pub fn contains(&self, proposal_id: u64) -> bool {
        self.current().is_some_and(|p| p.id == proposal_id)
            || self.backlog.iter().any(|p| p.id == proposal_id)
    }

    /// Returns the proposal if it became current, `None` if it was queued.
    pub fn enqueue(&mut self, proposal: SessionProposal, now: TimestampMs) -> Option<SessionProposal> {
        match self.state {
            QueueState::Idle => {
                self.state = QueueState::AwaitingDecision {
                    current: proposal.clone(),
                    surfaced_at_ms: now,
                };
                Some(proposal)
            }
            QueueState::AwaitingDecision { .. } => {
                self.backlog.push_back(proposal);
                None
            }
        }
    }

    /// Clears the current proposal and promotes the next backlog entry.
    /// The caller must have sent a terminal outcome for the resolved one.
    pub fn resolve_current(&mut self, now: TimestampMs) -> Option<SessionProposal> {
        self.state = QueueState::Idle;
        let next = match self.order {
            BacklogOrder::Lifo => self.backlog.pop_back(),
            BacklogOrder::Fifo => self.backlog.pop_front(),
        }?;
        self.state = QueueState::AwaitingDecision {
            current: next.clone(),
            surfaced_at_ms: now,
        };
        Some(next)
    }
}
