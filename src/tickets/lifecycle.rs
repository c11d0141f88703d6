use time::OffsetDateTime;
use uuid::Uuid;

use crate::tickets::repo::{TicketRecord, TicketStatus};

/// The mutable slice of a ticket the lifecycle engine operates on.
///
/// Invariant maintained by both transitions: `closed_at`/`closed_by` are set
/// if and only if `status == Closed`. Reopening a ticket clears the stamp;
/// the previous closure is not kept as history.
#[derive(Debug, Clone, PartialEq)]
pub struct TicketState {
    pub status: TicketStatus,
    pub assigned_to: Option<Uuid>,
    pub closed_at: Option<OffsetDateTime>,
    pub closed_by: Option<Uuid>,
}

impl From<&TicketRecord> for TicketState {
    fn from(t: &TicketRecord) -> Self {
        Self {
            status: t.status,
            assigned_to: t.assigned_to,
            closed_at: t.closed_at,
            closed_by: t.closed_by,
        }
    }
}

impl TicketState {
    /// New tickets always start out open and unassigned, whatever else was
    /// supplied at creation.
    pub fn initial() -> Self {
        Self {
            status: TicketStatus::Open,
            assigned_to: None,
            closed_at: None,
            closed_by: None,
        }
    }

    pub fn closure_stamp_consistent(&self) -> bool {
        (self.status == TicketStatus::Closed)
            == (self.closed_at.is_some() && self.closed_by.is_some())
    }
}

/// Set or clear the assignee. A non-null assignee always forces `Assigned`,
/// even on a ticket that was in progress or closed (an assignment to a
/// closed ticket reopens it). Clearing the assignee demotes to `Open`.
pub fn apply_assignment(state: &mut TicketState, assignee: Option<Uuid>) {
    match assignee {
        Some(user) => {
            state.assigned_to = Some(user);
            state.status = TicketStatus::Assigned;
        }
        None => {
            state.assigned_to = None;
            state.status = TicketStatus::Open;
        }
    }
    state.closed_at = None;
    state.closed_by = None;
}

/// Set the status directly. Any of the four values is reachable from any
/// other; there is no forward-only ordering and no terminal state. Entering
/// `Closed` stamps the closure; every other target clears it.
pub fn apply_status(
    state: &mut TicketState,
    status: TicketStatus,
    actor: Uuid,
    now: OffsetDateTime,
) {
    state.status = status;
    if status == TicketStatus::Closed {
        state.closed_at = Some(now);
        state.closed_by = Some(actor);
    } else {
        state.closed_at = None;
        state.closed_by = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }

    fn closed_state(actor: Uuid) -> TicketState {
        let mut state = TicketState::initial();
        apply_status(&mut state, TicketStatus::Closed, actor, now());
        state
    }

    #[test]
    fn initial_state_is_open_and_consistent() {
        let state = TicketState::initial();
        assert_eq!(state.status, TicketStatus::Open);
        assert!(state.assigned_to.is_none());
        assert!(state.closure_stamp_consistent());
    }

    #[test]
    fn assigning_forces_assigned_from_every_status() {
        let agent = Uuid::new_v4();
        for status in [
            TicketStatus::Open,
            TicketStatus::Assigned,
            TicketStatus::InProgress,
            TicketStatus::Closed,
        ] {
            let mut state = TicketState::initial();
            apply_status(&mut state, status, agent, now());
            apply_assignment(&mut state, Some(agent));
            assert_eq!(state.status, TicketStatus::Assigned, "from {status:?}");
            assert_eq!(state.assigned_to, Some(agent));
            assert!(state.closure_stamp_consistent());
        }
    }

    #[test]
    fn unassigning_forces_open_from_every_status() {
        let agent = Uuid::new_v4();
        for status in [
            TicketStatus::Open,
            TicketStatus::Assigned,
            TicketStatus::InProgress,
            TicketStatus::Closed,
        ] {
            let mut state = TicketState::initial();
            apply_assignment(&mut state, Some(agent));
            apply_status(&mut state, status, agent, now());
            apply_assignment(&mut state, None);
            assert_eq!(state.status, TicketStatus::Open, "from {status:?}");
            assert!(state.assigned_to.is_none());
            assert!(state.closure_stamp_consistent());
        }
    }

    #[test]
    fn closing_stamps_actor_and_time() {
        let agent = Uuid::new_v4();
        let at = now();
        let mut state = TicketState::initial();
        apply_status(&mut state, TicketStatus::Closed, agent, at);
        assert_eq!(state.status, TicketStatus::Closed);
        assert_eq!(state.closed_at, Some(at));
        assert_eq!(state.closed_by, Some(agent));
        assert!(state.closure_stamp_consistent());
    }

    #[test]
    fn reopening_clears_the_closure_stamp() {
        let agent = Uuid::new_v4();
        let mut state = closed_state(agent);
        apply_status(&mut state, TicketStatus::Open, agent, now());
        assert_eq!(state.status, TicketStatus::Open);
        assert!(state.closed_at.is_none());
        assert!(state.closed_by.is_none());
        assert!(state.closure_stamp_consistent());
    }

    #[test]
    fn reclosing_overwrites_the_previous_stamp() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let mut state = closed_state(first);
        let first_at = state.closed_at;

        apply_status(&mut state, TicketStatus::InProgress, second, now());
        let later = now();
        apply_status(&mut state, TicketStatus::Closed, second, later);
        assert_eq!(state.closed_by, Some(second));
        assert_eq!(state.closed_at, Some(later));
        assert_ne!(state.closed_at, None);
        assert!(first_at.is_some());
    }

    #[test]
    fn assigning_a_closed_ticket_reopens_it_as_assigned() {
        let agent = Uuid::new_v4();
        let mut state = closed_state(agent);
        apply_assignment(&mut state, Some(agent));
        assert_eq!(state.status, TicketStatus::Assigned);
        assert!(state.closed_at.is_none());
        assert!(state.closed_by.is_none());
    }

    #[test]
    fn direct_open_to_closed_is_permitted() {
        let agent = Uuid::new_v4();
        let mut state = TicketState::initial();
        apply_status(&mut state, TicketStatus::Closed, agent, now());
        assert_eq!(state.status, TicketStatus::Closed);
        assert!(state.closure_stamp_consistent());
    }

    #[test]
    fn closure_stamp_holds_after_every_transition_pair() {
        let agent = Uuid::new_v4();
        let statuses = [
            TicketStatus::Open,
            TicketStatus::Assigned,
            TicketStatus::InProgress,
            TicketStatus::Closed,
        ];
        for from in statuses {
            for to in statuses {
                let mut state = TicketState::initial();
                apply_status(&mut state, from, agent, now());
                apply_status(&mut state, to, agent, now());
                assert!(
                    state.closure_stamp_consistent(),
                    "stamp inconsistent after {from:?} -> {to:?}"
                );
            }
        }
    }
}
