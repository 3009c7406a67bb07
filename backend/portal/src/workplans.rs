//! Workplan funding state machine.
//!
//! `unassigned → allocated → committed` on the funding side, with the
//! content side (`pending ↔ approved`, `declined`) moving independently
//! through send-back feedback iterations. Every budget-consuming
//! transition re-validates the relevant ceilings inside the same
//! transaction that appends the ledger entry and flips the status; a
//! ledger entry without its status flip (or vice versa) cannot exist.

use allocation_core::{fsm, FundingStatus, GrantSerial, WorkplanStatus};
use sqlx::{SqliteExecutor, SqlitePool};
use tracing::info;

use crate::allocations;
use crate::db;
use crate::errors::{PortalError, Result};
use crate::grants;
use crate::ledger::{self, LedgerFilter};
use crate::models::{
    ApprovalOutcome, ExpenseLine, FeedbackRecord, NewLedgerEntry, Workplan, WorkplanDetail,
};
use crate::serials;

const WORKPLAN_COLUMNS: &str = "id, state_name, title, status, funding_status, grant_call_id, \
     grant_call_state_allocation_id, cycle_state_allocation_id, base_serial, sequence_suffix, \
     mou_id, locked_amount, created_by, created_at";

/// A requested expense line on a new or edited workplan.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ExpenseInput {
    pub description: String,
    pub amount: i64,
}

// ─────────────────────────────────────────────────────────
// Reads
// ─────────────────────────────────────────────────────────

pub async fn get_workplan(ex: impl SqliteExecutor<'_>, id: i64) -> Result<Workplan> {
    sqlx::query_as::<_, Workplan>(&format!(
        "SELECT {WORKPLAN_COLUMNS} FROM workplans WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(ex)
    .await?
    .ok_or_else(|| PortalError::NotFound(format!("workplan {id}")))
}

/// Live expense sum, the workplan's requested amount until it is
/// committed and the amount locks.
pub(crate) async fn requested_amount(ex: impl SqliteExecutor<'_>, workplan_id: i64) -> Result<i64> {
    let row: (i64,) = sqlx::query_as(
        "SELECT COALESCE(SUM(amount), 0) FROM workplan_expenses WHERE workplan_id = ?1",
    )
    .bind(workplan_id)
    .fetch_one(ex)
    .await?;
    Ok(row.0)
}

fn rendered_serial(wp: &Workplan) -> Option<String> {
    let base = wp.base_serial.as_ref()?;
    match wp.sequence_suffix {
        Some(n) => GrantSerial::with_suffix(base, n).ok().map(|s| s.to_string()),
        None => Some(GrantSerial::base(base).to_string()),
    }
}

pub async fn workplan_detail(pool: &SqlitePool, id: i64) -> Result<WorkplanDetail> {
    let workplan = get_workplan(pool, id).await?;
    let expenses = sqlx::query_as::<_, ExpenseLine>(
        "SELECT id, workplan_id, description, amount FROM workplan_expenses \
         WHERE workplan_id = ?1 ORDER BY id ASC",
    )
    .bind(id)
    .fetch_all(pool)
    .await?;
    let requested_amount = match workplan.locked_amount {
        Some(locked) => locked,
        None => expenses.iter().map(|e| e.amount).sum(),
    };
    Ok(WorkplanDetail {
        grant_serial: rendered_serial(&workplan),
        workplan,
        expenses,
        requested_amount,
    })
}

fn parse_funding(wp: &Workplan) -> Result<FundingStatus> {
    FundingStatus::parse(&wp.funding_status).ok_or_else(|| {
        PortalError::InvalidState(format!(
            "workplan {} has unknown funding status {:?}",
            wp.id, wp.funding_status
        ))
    })
}

fn parse_status(wp: &Workplan) -> Result<WorkplanStatus> {
    WorkplanStatus::parse(&wp.status).ok_or_else(|| {
        PortalError::InvalidState(format!(
            "workplan {} has unknown status {:?}",
            wp.id, wp.status
        ))
    })
}

// ─────────────────────────────────────────────────────────
// Creation and content edits
// ─────────────────────────────────────────────────────────

pub async fn create_workplan(
    pool: &SqlitePool,
    state_name: &str,
    title: &str,
    created_by: &str,
    expenses: &[ExpenseInput],
) -> Result<WorkplanDetail> {
    let mut tx = pool.begin().await?;
    let workplan = sqlx::query_as::<_, Workplan>(&format!(
        "INSERT INTO workplans (state_name, title, created_by) VALUES (?1, ?2, ?3) \
         RETURNING {WORKPLAN_COLUMNS}"
    ))
    .bind(state_name)
    .bind(title)
    .bind(created_by)
    .fetch_one(&mut *tx)
    .await?;
    insert_expenses(&mut tx, workplan.id, expenses).await?;
    tx.commit().await?;
    workplan_detail(pool, workplan.id).await
}

/// Replace the expense lines. Adjusting a committed workplan's budget
/// goes through the ledger, not through its expenses. On an allocated
/// workplan the new total is re-checked against the same ceilings the
/// assignment reserved under, so an edit cannot inflate the pending
/// reservation past the grant call's (or cycle allocation's) remaining.
pub async fn update_expenses(
    pool: &SqlitePool,
    workplan_id: i64,
    expenses: &[ExpenseInput],
) -> Result<WorkplanDetail> {
    let mut tx = pool.begin().await?;
    let wp = get_workplan(&mut *tx, workplan_id).await?;
    if parse_funding(&wp)? == FundingStatus::Committed {
        return Err(PortalError::InvalidState(format!(
            "workplan {workplan_id} is committed; its request amount is locked"
        )));
    }
    sqlx::query("DELETE FROM workplan_expenses WHERE workplan_id = ?1")
        .bind(workplan_id)
        .execute(&mut *tx)
        .await?;
    insert_expenses(&mut tx, workplan_id, expenses).await?;
    if parse_funding(&wp)? == FundingStatus::Allocated {
        check_reservation_headroom(&mut tx, &wp).await?;
    }
    tx.commit().await?;
    workplan_detail(pool, workplan_id).await
}

/// Re-run the remaining checks an assignment performs, against the
/// workplan's current expense total. Call after the expense rows are in
/// place, on the same transaction.
async fn check_reservation_headroom(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    wp: &Workplan,
) -> Result<()> {
    let grant_call_id = wp.grant_call_id.ok_or_else(|| {
        PortalError::MissingPrerequisite(format!(
            "workplan {} is allocated but has no grant call",
            wp.id
        ))
    })?;
    let requested = requested_amount(&mut **tx, wp.id).await?;

    let call = grants::get_grant_call(&mut **tx, grant_call_id).await?;
    let committed = ledger::sum_by(
        &mut **tx,
        &LedgerFilter {
            grant_call_id: Some(grant_call_id),
            ..Default::default()
        },
    )
    .await?;
    let pending = grants::pending_for_call(&mut **tx, grant_call_id, Some(wp.id)).await?;
    let remaining = call.amount - committed - pending;
    if requested > remaining {
        return Err(PortalError::CapacityExceeded(format!(
            "workplan requests {requested} but grant call {grant_call_id} has {remaining} remaining"
        )));
    }

    if let Some(csa_id) = wp.cycle_state_allocation_id {
        let allocation = allocations::get_allocation(&mut **tx, csa_id).await?;
        let sa_committed = allocations::committed_for_allocation(&mut **tx, csa_id).await?;
        let sa_pending =
            allocations::pending_for_allocation(&mut **tx, csa_id, Some(wp.id)).await?;
        let sa_remaining = allocation.amount - sa_committed - sa_pending;
        if requested > sa_remaining {
            return Err(PortalError::CapacityExceeded(format!(
                "workplan requests {requested} but state allocation {csa_id} has {sa_remaining} remaining"
            )));
        }
    }
    Ok(())
}

async fn insert_expenses(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    workplan_id: i64,
    expenses: &[ExpenseInput],
) -> Result<()> {
    for line in expenses {
        if line.amount < 0 {
            return Err(PortalError::InvalidState(
                "expense amounts must be non-negative".to_string(),
            ));
        }
        sqlx::query(
            "INSERT INTO workplan_expenses (workplan_id, description, amount) VALUES (?1, ?2, ?3)",
        )
        .bind(workplan_id)
        .bind(&line.description)
        .bind(line.amount)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

/// Register a stored attachment's object key, so deletion can hand the
/// keys to the file-storage collaborator.
pub async fn attach_file(pool: &SqlitePool, workplan_id: i64, object_key: &str) -> Result<()> {
    get_workplan(pool, workplan_id).await?;
    sqlx::query("INSERT INTO workplan_files (workplan_id, object_key) VALUES (?1, ?2)")
        .bind(workplan_id)
        .bind(object_key)
        .execute(pool)
        .await?;
    Ok(())
}

// ─────────────────────────────────────────────────────────
// Assignment
// ─────────────────────────────────────────────────────────

/// Assign a workplan to a grant call (and optionally a cycle state
/// allocation), reserving budget as "pending".
///
/// The remaining checks and the write share one transaction; two
/// concurrent assignments that together overshoot are serialized by the
/// store and the loser re-reads the shrunken remaining on retry.
pub async fn assign_to_grant_call(
    pool: &SqlitePool,
    workplan_id: i64,
    grant_call_id: i64,
    cycle_state_allocation_id: Option<i64>,
    _actor: &str,
) -> Result<Workplan> {
    let mut tx = pool.begin().await?;
    let wp = get_workplan(&mut *tx, workplan_id).await?;
    let funding = parse_funding(&wp)?;
    if !fsm::funding_transition_allowed(funding, FundingStatus::Allocated) {
        return Err(PortalError::InvalidState(format!(
            "workplan {workplan_id} cannot be assigned while {}",
            wp.funding_status
        )));
    }

    let call = grants::get_grant_call(&mut *tx, grant_call_id).await?;
    let decision = grants::current_decision(&mut *tx, grant_call_id, &wp.state_name)
        .await?
        .ok_or_else(|| {
            PortalError::MissingPrerequisite(format!(
                "no award decision for grant call {grant_call_id} and state {:?}",
                wp.state_name
            ))
        })?;

    let requested = requested_amount(&mut *tx, workplan_id).await?;
    if requested <= 0 {
        return Err(PortalError::MissingPrerequisite(format!(
            "workplan {workplan_id} has no expenses"
        )));
    }

    let committed = ledger::sum_by(
        &mut *tx,
        &LedgerFilter {
            grant_call_id: Some(grant_call_id),
            ..Default::default()
        },
    )
    .await?;
    let pending = grants::pending_for_call(&mut *tx, grant_call_id, Some(workplan_id)).await?;
    let remaining = call.amount - committed - pending;
    if requested > remaining {
        return Err(PortalError::CapacityExceeded(format!(
            "workplan requests {requested} but grant call {grant_call_id} has {remaining} remaining"
        )));
    }

    if let Some(csa_id) = cycle_state_allocation_id {
        let allocation = allocations::get_allocation(&mut *tx, csa_id).await?;
        if allocation.state_name != wp.state_name {
            return Err(PortalError::InvalidState(format!(
                "state allocation {csa_id} belongs to {:?}, not {:?}",
                allocation.state_name, wp.state_name
            )));
        }
        let sa_committed = allocations::committed_for_allocation(&mut *tx, csa_id).await?;
        let sa_pending =
            allocations::pending_for_allocation(&mut *tx, csa_id, Some(workplan_id)).await?;
        let sa_remaining = allocation.amount - sa_committed - sa_pending;
        if requested > sa_remaining {
            return Err(PortalError::CapacityExceeded(format!(
                "workplan requests {requested} but state allocation {csa_id} has {sa_remaining} remaining"
            )));
        }
    }

    let wp = sqlx::query_as::<_, Workplan>(&format!(
        "UPDATE workplans SET funding_status = 'allocated', grant_call_id = ?2, \
             grant_call_state_allocation_id = ?3, cycle_state_allocation_id = ?4, \
             base_serial = ?5, sequence_suffix = NULL \
         WHERE id = ?1 RETURNING {WORKPLAN_COLUMNS}"
    ))
    .bind(workplan_id)
    .bind(grant_call_id)
    .bind(decision.id)
    .bind(cycle_state_allocation_id)
    .bind(&decision.base_serial)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(wp)
}

/// Move an uncommitted workplan to a different grant call, on record:
/// a zero-delta ledger entry documents the move.
pub async fn reassign(
    pool: &SqlitePool,
    workplan_id: i64,
    new_grant_call_id: i64,
    reason: &str,
    actor: &str,
) -> Result<Workplan> {
    let mut tx = pool.begin().await?;
    let wp = get_workplan(&mut *tx, workplan_id).await?;
    if parse_funding(&wp)? != FundingStatus::Allocated {
        return Err(PortalError::InvalidState(format!(
            "workplan {workplan_id} is {}; only allocated workplans can be reassigned",
            wp.funding_status
        )));
    }
    let old_call_id = wp
        .grant_call_id
        .ok_or_else(|| PortalError::MissingPrerequisite(format!("workplan {workplan_id} has no grant call")))?;

    let call = grants::get_grant_call(&mut *tx, new_grant_call_id).await?;
    let decision = grants::current_decision(&mut *tx, new_grant_call_id, &wp.state_name)
        .await?
        .ok_or_else(|| {
            PortalError::MissingPrerequisite(format!(
                "no award decision for grant call {new_grant_call_id} and state {:?}",
                wp.state_name
            ))
        })?;

    let requested = requested_amount(&mut *tx, workplan_id).await?;
    let committed = ledger::sum_by(
        &mut *tx,
        &LedgerFilter {
            grant_call_id: Some(new_grant_call_id),
            ..Default::default()
        },
    )
    .await?;
    let pending = grants::pending_for_call(&mut *tx, new_grant_call_id, Some(workplan_id)).await?;
    let remaining = call.amount - committed - pending;
    if requested > remaining {
        return Err(PortalError::CapacityExceeded(format!(
            "workplan requests {requested} but grant call {new_grant_call_id} has {remaining} remaining"
        )));
    }

    ledger::append(
        &mut *tx,
        &NewLedgerEntry {
            workplan_id,
            grant_call_id: new_grant_call_id,
            grant_call_state_allocation_id: Some(decision.id),
            grant_serial: None,
            delta_amount: 0,
            reason: format!(
                "Reassigned from grant call {old_call_id} to {new_grant_call_id}: {reason}"
            ),
            created_by: actor.to_string(),
            funding_cycle_id: None,
            cycle_state_allocation_id: wp.cycle_state_allocation_id,
        },
    )
    .await?;

    // The base serial follows the new call's decision; any minted
    // suffix is cleared and re-minted on the next approval.
    let wp = sqlx::query_as::<_, Workplan>(&format!(
        "UPDATE workplans SET grant_call_id = ?2, grant_call_state_allocation_id = ?3, \
             base_serial = ?4, sequence_suffix = NULL \
         WHERE id = ?1 RETURNING {WORKPLAN_COLUMNS}"
    ))
    .bind(workplan_id)
    .bind(new_grant_call_id)
    .bind(decision.id)
    .bind(&decision.base_serial)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(wp)
}

// ─────────────────────────────────────────────────────────
// Approval
// ─────────────────────────────────────────────────────────

/// Approve a batch. Each workplan commits (or fails) independently;
/// one workplan's missing assignment rejects that workplan only, and
/// its ledger entry + status flip are atomic.
pub async fn approve_batch(
    pool: &SqlitePool,
    workplan_ids: &[i64],
    actor: &str,
) -> Result<Vec<ApprovalOutcome>> {
    let mut outcomes = Vec::with_capacity(workplan_ids.len());
    for &id in workplan_ids {
        let result = db::retry_conflict(|| approve_one(pool, id, actor)).await;
        outcomes.push(match result {
            Ok(wp) => {
                info!("Workplan {id} approved and committed");
                ApprovalOutcome {
                    workplan_id: id,
                    approved: true,
                    grant_serial: rendered_serial(&wp),
                    error: None,
                }
            }
            Err(e) => ApprovalOutcome {
                workplan_id: id,
                approved: false,
                grant_serial: None,
                error: Some(e.to_string()),
            },
        });
    }
    Ok(outcomes)
}

async fn approve_one(pool: &SqlitePool, workplan_id: i64, actor: &str) -> Result<Workplan> {
    let mut tx = pool.begin().await?;
    let wp = get_workplan(&mut *tx, workplan_id).await?;

    if parse_funding(&wp)? != FundingStatus::Allocated {
        return Err(PortalError::MissingPrerequisite(format!(
            "workplan {workplan_id} is {}; only allocated workplans are eligible",
            wp.funding_status
        )));
    }
    let grant_call_id = wp.grant_call_id.ok_or_else(|| {
        PortalError::MissingPrerequisite(format!(
            "workplan {workplan_id} has no grant call assignment"
        ))
    })?;
    let status = parse_status(&wp)?;
    if !fsm::status_transition_allowed(status, WorkplanStatus::Approved) {
        return Err(PortalError::InvalidState(format!(
            "workplan {workplan_id} cannot be approved from status {}",
            wp.status
        )));
    }

    let requested = requested_amount(&mut *tx, workplan_id).await?;

    // Re-validate every ceiling against the live ledger, inside the
    // transaction that will write it.
    let call = grants::get_grant_call(&mut *tx, grant_call_id).await?;
    let committed = ledger::sum_by(
        &mut *tx,
        &LedgerFilter {
            grant_call_id: Some(grant_call_id),
            ..Default::default()
        },
    )
    .await?;
    let pending = grants::pending_for_call(&mut *tx, grant_call_id, Some(workplan_id)).await?;
    if committed + pending + requested > call.amount {
        return Err(PortalError::CapacityExceeded(format!(
            "committing {requested} would put grant call {grant_call_id} at {} of {}",
            committed + pending + requested,
            call.amount
        )));
    }

    let mut funding_cycle_id = None;
    if let Some(csa_id) = wp.cycle_state_allocation_id {
        let allocation = allocations::get_allocation(&mut *tx, csa_id).await?;
        let sa_committed = allocations::committed_for_allocation(&mut *tx, csa_id).await?;
        let sa_pending =
            allocations::pending_for_allocation(&mut *tx, csa_id, Some(workplan_id)).await?;
        if sa_committed + sa_pending + requested > allocation.amount {
            return Err(PortalError::CapacityExceeded(format!(
                "committing {requested} would put state allocation {csa_id} at {} of {}",
                sa_committed + sa_pending + requested,
                allocation.amount
            )));
        }
        let (cycle_id,): (i64,) =
            sqlx::query_as("SELECT cycle_id FROM tranches WHERE id = ?1")
                .bind(allocation.tranche_id)
                .fetch_one(&mut *tx)
                .await?;
        funding_cycle_id = Some(cycle_id);
    }

    let serial = resolve_serial(&mut tx, &wp, grant_call_id).await?;

    ledger::append(
        &mut *tx,
        &NewLedgerEntry {
            workplan_id,
            grant_call_id,
            grant_call_state_allocation_id: wp.grant_call_state_allocation_id,
            grant_serial: Some(serial.to_string()),
            delta_amount: requested,
            reason: "Initial approval".to_string(),
            created_by: actor.to_string(),
            funding_cycle_id,
            cycle_state_allocation_id: wp.cycle_state_allocation_id,
        },
    )
    .await?;

    let wp = sqlx::query_as::<_, Workplan>(&format!(
        "UPDATE workplans SET status = 'approved', funding_status = 'committed', \
             locked_amount = ?2, base_serial = ?3, sequence_suffix = ?4 \
         WHERE id = ?1 RETURNING {WORKPLAN_COLUMNS}"
    ))
    .bind(workplan_id)
    .bind(requested)
    .bind(&serial.base)
    .bind(serial.suffix.map(|n| n as i64))
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(wp)
}

/// Resolve the workplan's full serial, minting a suffix on first
/// approval. A placeholder or missing base resolves through the
/// current award decision.
async fn resolve_serial(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    wp: &Workplan,
    grant_call_id: i64,
) -> Result<GrantSerial> {
    let base = match wp.base_serial.as_deref() {
        Some(base) if base != "new" => base.to_string(),
        _ => {
            let decision = grants::current_decision(&mut **tx, grant_call_id, &wp.state_name)
                .await?
                .ok_or_else(|| {
                    PortalError::MissingPrerequisite(format!(
                        "no award decision for grant call {grant_call_id} and state {:?}",
                        wp.state_name
                    ))
                })?;
            decision.base_serial
        }
    };
    let suffix = match wp.sequence_suffix {
        Some(n) => n,
        None => serials::commit_next(&mut **tx, &base).await?,
    };
    // A base pattern carries at most 999 workplans; the 1,000th mint is
    // a capacity problem, not a malformed serial.
    GrantSerial::with_suffix(&base, suffix).map_err(|_| {
        PortalError::CapacityExceeded(format!(
            "suffix {suffix} out of range; base serial {base} carries at most 999 workplans"
        ))
    })
}

// ─────────────────────────────────────────────────────────
// Send back / decline
// ─────────────────────────────────────────────────────────

/// Return a workplan to the submitter for revision. Writes a feedback
/// record with the next iteration number; the ledger is untouched.
pub async fn send_back(
    pool: &SqlitePool,
    workplan_id: i64,
    message: &str,
    actor: &str,
) -> Result<FeedbackRecord> {
    let mut tx = pool.begin().await?;
    let wp = get_workplan(&mut *tx, workplan_id).await?;
    let status = parse_status(&wp)?;
    if !fsm::status_transition_allowed(status, WorkplanStatus::Pending) {
        return Err(PortalError::InvalidState(format!(
            "workplan {workplan_id} cannot be sent back from status {}",
            wp.status
        )));
    }

    let (iterations,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM workplan_feedback WHERE workplan_id = ?1")
            .bind(workplan_id)
            .fetch_one(&mut *tx)
            .await?;

    let feedback = sqlx::query_as::<_, FeedbackRecord>(
        "INSERT INTO workplan_feedback (workplan_id, iteration_number, message, created_by) \
         VALUES (?1, ?2, ?3, ?4) \
         RETURNING id, workplan_id, iteration_number, message, created_by, created_at",
    )
    .bind(workplan_id)
    .bind(iterations + 1)
    .bind(message)
    .bind(actor)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("UPDATE workplans SET status = 'pending' WHERE id = ?1")
        .bind(workplan_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(feedback)
}

/// Terminal content rejection. Committed workplans cannot be declined;
/// their money moves only through ledger reversal on deletion.
pub async fn decline(pool: &SqlitePool, workplan_id: i64, _actor: &str) -> Result<Workplan> {
    let mut tx = pool.begin().await?;
    let wp = get_workplan(&mut *tx, workplan_id).await?;
    if parse_funding(&wp)? == FundingStatus::Committed {
        return Err(PortalError::InvalidState(format!(
            "workplan {workplan_id} is committed and cannot be declined"
        )));
    }
    let status = parse_status(&wp)?;
    if !fsm::status_transition_allowed(status, WorkplanStatus::Declined) {
        return Err(PortalError::InvalidState(format!(
            "workplan {workplan_id} cannot be declined from status {}",
            wp.status
        )));
    }
    let wp = sqlx::query_as::<_, Workplan>(&format!(
        "UPDATE workplans SET status = 'declined' WHERE id = ?1 RETURNING {WORKPLAN_COLUMNS}"
    ))
    .bind(workplan_id)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(wp)
}

// ─────────────────────────────────────────────────────────
// Deletion
// ─────────────────────────────────────────────────────────

/// Delete a workplan. A committed workplan's ledger entries are fully
/// reversed first, in the same transaction that removes the row.
/// Returns the stored object keys for the file-storage collaborator;
/// this core does not delete the files itself.
pub async fn delete_workplan(pool: &SqlitePool, workplan_id: i64, actor: &str) -> Result<Vec<String>> {
    let mut tx = pool.begin().await?;
    let wp = get_workplan(&mut *tx, workplan_id).await?;
    if wp.mou_id.is_some() {
        return Err(PortalError::InvalidState(format!(
            "workplan {workplan_id} is bundled into an MOU"
        )));
    }

    let keys: Vec<(String,)> =
        sqlx::query_as("SELECT object_key FROM workplan_files WHERE workplan_id = ?1")
            .bind(workplan_id)
            .fetch_all(&mut *tx)
            .await?;

    if parse_funding(&wp)? == FundingStatus::Committed {
        let reversed = ledger::reverse_workplan_entries(&mut tx, workplan_id, actor).await?;
        info!("Reversed {reversed} ledger entries for deleted workplan {workplan_id}");
    }

    // Expenses, feedback, and file rows cascade.
    sqlx::query("DELETE FROM workplans WHERE id = ?1")
        .bind(workplan_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(keys.into_iter().map(|(k,)| k).collect())
}
