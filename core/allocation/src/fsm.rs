//! Transition whitelists for the workplan state machines.
//!
//! The portal consults these before any status write; everything not
//! listed is rejected. Matches the lifecycle in the data model:
//!
//! ```text
//! funding: unassigned ──► allocated ──► committed
//!                         (reassign keeps allocated)
//!
//! status:  pending ◄──► approved
//!          pending ──► declined (terminal)
//! ```

use crate::types::{FundingStatus, TrancheStatus, WorkplanStatus};

/// Is `from → to` a legal funding-status transition?
///
/// `allocated → allocated` covers reassignment to a different grant
/// call. Nothing leaves `committed`; deletion reverses the ledger and
/// removes the row instead.
pub fn funding_transition_allowed(from: FundingStatus, to: FundingStatus) -> bool {
    use FundingStatus::*;
    matches!(
        (from, to),
        (Unassigned, Allocated) | (Allocated, Allocated) | (Allocated, Committed)
    )
}

/// Is `from → to` a legal content-status transition?
///
/// Send-back may return any non-declined workplan to `pending`;
/// `declined` is terminal.
pub fn status_transition_allowed(from: WorkplanStatus, to: WorkplanStatus) -> bool {
    use WorkplanStatus::*;
    matches!(
        (from, to),
        (Pending, Approved) | (Pending, Declined) | (Pending, Pending) | (Approved, Pending)
    )
}

/// Is `from → to` a legal tranche transition?
pub fn tranche_transition_allowed(from: TrancheStatus, to: TrancheStatus) -> bool {
    use TrancheStatus::*;
    matches!((from, to), (Planned, Open) | (Open, Closed))
}
