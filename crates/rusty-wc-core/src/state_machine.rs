use crate::ports::PortError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProposalStatus {
    Received,
    Validating,
    AwaitingUserDecision,
    Approved,
    Settled,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProposalAction {
    Validate,
    AwaitUser,
    Approve,
    Settle,
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    Received,
    Routed,
    AwaitingWallet,
    Responded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestAction {
    Route,
    SurfaceToWallet,
    Respond,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTransition {
    pub from: &'static str,
    pub to: &'static str,
}

impl ProposalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ProposalStatus::Received => "Received",
            ProposalStatus::Validating => "Validating",
            ProposalStatus::AwaitingUserDecision => "AwaitingUserDecision",
            ProposalStatus::Approved => "Approved",
            ProposalStatus::Settled => "Settled",
            ProposalStatus::Rejected => "Rejected",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ProposalStatus::Settled | ProposalStatus::Rejected)
    }
}

impl RequestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Received => "Received",
            RequestStatus::Routed => "Routed",
            RequestStatus::AwaitingWallet => "AwaitingWallet",
            RequestStatus::Responded => "Responded",
        }
    }
}

pub fn proposal_transition(
    from: ProposalStatus,
    action: ProposalAction,
) -> Result<(ProposalStatus, StateTransition), PortError> {
    use ProposalAction as A;
    use ProposalStatus as S;

    let to = match (from, action) {
        (S::Received, A::Validate) => S::Validating,
        (S::Validating, A::AwaitUser) => S::AwaitingUserDecision,
        (S::Validating, A::Reject) => S::Rejected,
        (S::AwaitingUserDecision, A::Approve) => S::Approved,
        (S::AwaitingUserDecision, A::Reject) => S::Rejected,
        (S::Approved, A::Settle) => S::Settled,
        _ => {
            return Err(PortError::Validation(format!(
                "illegal proposal transition: {from:?} --{action:?}-->"
            )))
        }
    };
    Ok((
        to,
        StateTransition {
            from: from.as_str(),
            to: to.as_str(),
        },
    ))
}

pub fn request_transition(
    from: RequestStatus,
    action: RequestAction,
) -> Result<(RequestStatus, StateTransition), PortError> {
    use RequestAction as A;
    use RequestStatus as S;

    let to = match (from, action) {
        (S::Received, A::Route) => S::Routed,
        // Early failures answer straight from Received or Routed.
        (S::Received, A::Respond) | (S::Routed, A::Respond) => S::Responded,
        (S::Routed, A::SurfaceToWallet) => S::AwaitingWallet,
        (S::AwaitingWallet, A::Respond) => S::Responded,
        _ => {
            return Err(PortError::Validation(format!(
                "illegal request transition: {from:?} --{action:?}-->"
            )))
        }
    };
    Ok((
        to,
        StateTransition {
            from: from.as_str(),
            to: to.as_str(),
        },
    ))
}
