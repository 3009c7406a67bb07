//! Stored-row records and the derived-aggregate shapes the managers
//! return.
//!
//! Records mirror the tables one-to-one (`sqlx::FromRow`); the summary
//! structs carry live sums that are never persisted anywhere.

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────
// Stored rows
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct GrantCall {
    pub id: i64,
    pub donor: String,
    pub name: String,
    pub amount: i64,
    pub status: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct FundingCycle {
    pub id: i64,
    pub name: String,
    pub year: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CycleInclusion {
    pub id: i64,
    pub cycle_id: i64,
    pub grant_call_id: i64,
    pub amount_included: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tranche {
    pub id: i64,
    pub cycle_id: i64,
    pub tranche_number: i64,
    pub planned_cap: i64,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct StateAllocation {
    pub id: i64,
    pub tranche_id: i64,
    pub state_name: String,
    pub amount: i64,
    pub created_at: i64,
}

/// One per-state slice of a grant call's award decision. The highest
/// `decision_no` for a (grant_call, state) pair is the current one.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AwardDecision {
    pub id: i64,
    pub grant_call_id: i64,
    pub state_name: String,
    pub decision_no: i64,
    pub base_serial: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Workplan {
    pub id: i64,
    pub state_name: String,
    pub title: String,
    pub status: String,
    pub funding_status: String,
    pub grant_call_id: Option<i64>,
    pub grant_call_state_allocation_id: Option<i64>,
    pub cycle_state_allocation_id: Option<i64>,
    pub base_serial: Option<String>,
    pub sequence_suffix: Option<i64>,
    pub mou_id: Option<i64>,
    pub locked_amount: Option<i64>,
    pub created_by: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ExpenseLine {
    pub id: i64,
    pub workplan_id: i64,
    pub description: String,
    pub amount: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LedgerEntry {
    pub id: i64,
    pub workplan_id: i64,
    pub grant_call_id: i64,
    pub grant_call_state_allocation_id: Option<i64>,
    pub grant_serial: Option<String>,
    pub delta_amount: i64,
    pub reason: String,
    pub created_by: String,
    pub funding_cycle_id: Option<i64>,
    pub cycle_state_allocation_id: Option<i64>,
    pub created_at: i64,
}

/// A ledger row about to be appended. `id`/`created_at` are assigned at
/// insert time.
#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub workplan_id: i64,
    pub grant_call_id: i64,
    pub grant_call_state_allocation_id: Option<i64>,
    pub grant_serial: Option<String>,
    pub delta_amount: i64,
    pub reason: String,
    pub created_by: String,
    pub funding_cycle_id: Option<i64>,
    pub cycle_state_allocation_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct FeedbackRecord {
    pub id: i64,
    pub workplan_id: i64,
    pub iteration_number: i64,
    pub message: String,
    pub created_by: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Mou {
    pub id: i64,
    pub partner_name: String,
    pub state_name: String,
    pub total_amount: i64,
    pub created_by: String,
    pub created_at: i64,
}

// ─────────────────────────────────────────────────────────
// Derived aggregates (computed on read, never stored)
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct GrantCallSummary {
    pub grant_call: GrantCall,
    pub included: i64,
    pub committed: i64,
    pub pending: i64,
    pub remaining: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrancheSummary {
    pub tranche: Tranche,
    pub effective_cap: i64,
    pub allocated: i64,
    pub remaining: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AllocationSummary {
    pub allocation: StateAllocation,
    pub committed: i64,
    pub pending: i64,
    pub remaining: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkplanDetail {
    pub workplan: Workplan,
    pub expenses: Vec<ExpenseLine>,
    /// Live expense sum until committed, then the locked amount.
    pub requested_amount: i64,
    /// Rendered `{base}-{suffix:03}` identifier, when minted.
    pub grant_serial: Option<String>,
}

/// Per-workplan result of a batch approval; a failed workplan does not
/// abort the rest of the batch.
#[derive(Debug, Clone, Serialize)]
pub struct ApprovalOutcome {
    pub workplan_id: i64,
    pub approved: bool,
    pub grant_serial: Option<String>,
    pub error: Option<String>,
}
