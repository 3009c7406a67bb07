use crate::fsm::{funding_transition_allowed, status_transition_allowed, tranche_transition_allowed};
use crate::types::{FundingStatus, TrancheStatus, WorkplanStatus};

#[test]
fn test_funding_forward_path() {
    use FundingStatus::*;
    assert!(funding_transition_allowed(Unassigned, Allocated));
    assert!(funding_transition_allowed(Allocated, Committed));
}

#[test]
fn test_funding_reassignment_keeps_allocated() {
    use FundingStatus::*;
    assert!(funding_transition_allowed(Allocated, Allocated));
}

#[test]
fn test_funding_committed_is_terminal() {
    use FundingStatus::*;
    for to in [Unassigned, Allocated, Committed] {
        assert!(!funding_transition_allowed(Committed, to));
    }
}

#[test]
fn test_funding_no_skipping_allocation() {
    use FundingStatus::*;
    assert!(!funding_transition_allowed(Unassigned, Committed));
}

#[test]
fn test_status_send_back_paths() {
    use WorkplanStatus::*;
    assert!(status_transition_allowed(Pending, Pending));
    assert!(status_transition_allowed(Approved, Pending));
}

#[test]
fn test_status_declined_is_terminal() {
    use WorkplanStatus::*;
    for to in [Pending, Approved, Declined] {
        assert!(!status_transition_allowed(Declined, to));
    }
}

#[test]
fn test_status_approval_only_from_pending() {
    use WorkplanStatus::*;
    assert!(status_transition_allowed(Pending, Approved));
    assert!(!status_transition_allowed(Approved, Approved));
}

#[test]
fn test_tranche_forward_only() {
    use TrancheStatus::*;
    assert!(tranche_transition_allowed(Planned, Open));
    assert!(tranche_transition_allowed(Open, Closed));
    assert!(!tranche_transition_allowed(Closed, Open));
    assert!(!tranche_transition_allowed(Planned, Closed));
}
