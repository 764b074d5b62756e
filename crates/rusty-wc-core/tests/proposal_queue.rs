use rusty_wc_core::{
    BacklogOrder, DappMetadata, ProposalQueue, QueueState, SessionProposal, TimestampMs,
};

fn proposal(id: u64) -> SessionProposal {
    SessionProposal {
        id,
        proposer: DappMetadata {
            name: format!("dApp {id}"),
            url: format!("https://dapp{id}.example"),
            ..Default::default()
        },
        required_namespaces: Default::default(),
        expires_at_ms: None,
    }
}

fn drain(mut q: ProposalQueue) -> Vec<u64> {
    let mut order = Vec::new();
    while let Some(current) = q.current() {
        order.push(current.id);
        q.resolve_current(TimestampMs(0));
    }
    order
}

#[test]
fn only_first_proposal_is_surfaced() {
    let mut q = ProposalQueue::new(BacklogOrder::Lifo);
    assert!(q.enqueue(proposal(1), TimestampMs(1)).is_some());
    assert!(q.enqueue(proposal(2), TimestampMs(2)).is_none());
    assert!(q.enqueue(proposal(3), TimestampMs(3)).is_none());
    assert_eq!(q.current().map(|p| p.id), Some(1));
    assert_eq!(q.backlog_len(), 2);
    assert!(matches!(q.state(), QueueState::AwaitingDecision { .. }));
}

#[test]
fn lifo_backlog_surfaces_newest_next() {
    let mut q = ProposalQueue::new(BacklogOrder::Lifo);
    for id in 1..=4 {
        q.enqueue(proposal(id), TimestampMs(id));
    }
    assert_eq!(drain(q), vec![1, 4, 3, 2]);
}

#[test]
fn fifo_backlog_surfaces_oldest_next() {
    let mut q = ProposalQueue::new(BacklogOrder::Fifo);
    for id in 1..=4 {
        q.enqueue(proposal(id), TimestampMs(id));
    }
    assert_eq!(drain(q), vec![1, 2, 3, 4]);
}
