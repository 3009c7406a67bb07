//! Grant call registry and cycle pool.
//!
//! The root of the budget hierarchy: donor grant calls with a fixed
//! total, drawn into funding-cycle pools via inclusions. The pool total
//! is always a live sum over inclusions, never cached.

use allocation_core::GrantCallStatus;
use sqlx::{SqliteExecutor, SqlitePool};

use crate::errors::{PortalError, Result};
use crate::ledger::{self, LedgerFilter};
use crate::models::{AwardDecision, CycleInclusion, FundingCycle, GrantCall, GrantCallSummary};

const CALL_COLUMNS: &str = "id, donor, name, amount, status, created_at";

// ─────────────────────────────────────────────────────────
// Grant call registry
// ─────────────────────────────────────────────────────────

pub async fn create_grant_call(
    pool: &SqlitePool,
    donor: &str,
    name: &str,
    amount: i64,
) -> Result<GrantCall> {
    if amount <= 0 {
        return Err(PortalError::InvalidState(
            "grant call amount must be positive".to_string(),
        ));
    }
    let call = sqlx::query_as::<_, GrantCall>(&format!(
        "INSERT INTO grant_calls (donor, name, amount, status) VALUES (?1, ?2, ?3, 'open') \
         RETURNING {CALL_COLUMNS}"
    ))
    .bind(donor)
    .bind(name)
    .bind(amount)
    .fetch_one(pool)
    .await?;
    Ok(call)
}

pub async fn get_grant_call(ex: impl SqliteExecutor<'_>, id: i64) -> Result<GrantCall> {
    sqlx::query_as::<_, GrantCall>(&format!(
        "SELECT {CALL_COLUMNS} FROM grant_calls WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(ex)
    .await?
    .ok_or_else(|| PortalError::NotFound(format!("grant call {id}")))
}

pub async fn list_grant_calls(pool: &SqlitePool) -> Result<Vec<GrantCall>> {
    let calls = sqlx::query_as::<_, GrantCall>(&format!(
        "SELECT {CALL_COLUMNS} FROM grant_calls ORDER BY id ASC"
    ))
    .fetch_all(pool)
    .await?;
    Ok(calls)
}

/// `open → closed`, once, when the donor funding period ends.
pub async fn close_grant_call(pool: &SqlitePool, id: i64) -> Result<GrantCall> {
    let mut tx = pool.begin().await?;
    let call = get_grant_call(&mut *tx, id).await?;
    if GrantCallStatus::parse(&call.status) != Some(GrantCallStatus::Open) {
        return Err(PortalError::InvalidState(format!(
            "grant call {id} is already {}",
            call.status
        )));
    }
    let call = sqlx::query_as::<_, GrantCall>(&format!(
        "UPDATE grant_calls SET status = 'closed' WHERE id = ?1 RETURNING {CALL_COLUMNS}"
    ))
    .bind(id)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(call)
}

// ─────────────────────────────────────────────────────────
// Funding cycles and pool inclusions
// ─────────────────────────────────────────────────────────

pub async fn create_cycle(pool: &SqlitePool, name: &str, year: i64) -> Result<FundingCycle> {
    let cycle = sqlx::query_as::<_, FundingCycle>(
        "INSERT INTO funding_cycles (name, year) VALUES (?1, ?2) \
         RETURNING id, name, year, created_at",
    )
    .bind(name)
    .bind(year)
    .fetch_one(pool)
    .await?;
    Ok(cycle)
}

pub async fn get_cycle(ex: impl SqliteExecutor<'_>, id: i64) -> Result<FundingCycle> {
    sqlx::query_as::<_, FundingCycle>(
        "SELECT id, name, year, created_at FROM funding_cycles WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(ex)
    .await?
    .ok_or_else(|| PortalError::NotFound(format!("funding cycle {id}")))
}

/// The cycle's spendable total: Σ amount_included, live.
pub async fn pool_total(ex: impl SqliteExecutor<'_>, cycle_id: i64) -> Result<i64> {
    let row: (i64,) = sqlx::query_as(
        "SELECT COALESCE(SUM(amount_included), 0) FROM cycle_inclusions WHERE cycle_id = ?1",
    )
    .bind(cycle_id)
    .fetch_one(ex)
    .await?;
    Ok(row.0)
}

/// Draw `amount` from a grant call into a cycle's pool.
///
/// The capacity check sums the call's inclusions across *all* cycles
/// inside the same transaction as the insert.
pub async fn include_grant(
    pool: &SqlitePool,
    cycle_id: i64,
    grant_call_id: i64,
    amount: i64,
) -> Result<CycleInclusion> {
    if amount <= 0 {
        return Err(PortalError::InvalidState(
            "inclusion amount must be positive".to_string(),
        ));
    }
    let mut tx = pool.begin().await?;
    get_cycle(&mut *tx, cycle_id).await?;
    let call = get_grant_call(&mut *tx, grant_call_id).await?;
    if GrantCallStatus::parse(&call.status) != Some(GrantCallStatus::Open) {
        return Err(PortalError::InvalidState(format!(
            "grant call {grant_call_id} is closed"
        )));
    }

    let existing: Option<(i64,)> = sqlx::query_as(
        "SELECT id FROM cycle_inclusions WHERE cycle_id = ?1 AND grant_call_id = ?2",
    )
    .bind(cycle_id)
    .bind(grant_call_id)
    .fetch_optional(&mut *tx)
    .await?;
    if existing.is_some() {
        return Err(PortalError::InvalidState(format!(
            "grant call {grant_call_id} is already included in cycle {cycle_id}"
        )));
    }

    let (drawn,): (i64,) = sqlx::query_as(
        "SELECT COALESCE(SUM(amount_included), 0) FROM cycle_inclusions WHERE grant_call_id = ?1",
    )
    .bind(grant_call_id)
    .fetch_one(&mut *tx)
    .await?;
    if drawn + amount > call.amount {
        return Err(PortalError::CapacityExceeded(format!(
            "inclusion of {amount} would draw {} from grant call {grant_call_id} of {}",
            drawn + amount,
            call.amount
        )));
    }

    let inclusion = sqlx::query_as::<_, CycleInclusion>(
        "INSERT INTO cycle_inclusions (cycle_id, grant_call_id, amount_included) \
         VALUES (?1, ?2, ?3) \
         RETURNING id, cycle_id, grant_call_id, amount_included, created_at",
    )
    .bind(cycle_id)
    .bind(grant_call_id)
    .bind(amount)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(inclusion)
}

/// Remove a grant call's inclusion from a cycle. Fails while any
/// workplan in that cycle is still assigned to the call.
pub async fn remove_inclusion(pool: &SqlitePool, cycle_id: i64, grant_call_id: i64) -> Result<()> {
    let mut tx = pool.begin().await?;
    let (dependents,): (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*)
        FROM   workplans w
        JOIN   state_allocations sa ON sa.id = w.cycle_state_allocation_id
        JOIN   tranches t ON t.id = sa.tranche_id
        WHERE  w.grant_call_id = ?1 AND t.cycle_id = ?2
        "#,
    )
    .bind(grant_call_id)
    .bind(cycle_id)
    .fetch_one(&mut *tx)
    .await?;
    if dependents > 0 {
        return Err(PortalError::InvalidState(format!(
            "{dependents} workplan(s) in cycle {cycle_id} are still assigned to grant call {grant_call_id}"
        )));
    }

    let result = sqlx::query("DELETE FROM cycle_inclusions WHERE cycle_id = ?1 AND grant_call_id = ?2")
        .bind(cycle_id)
        .bind(grant_call_id)
        .execute(&mut *tx)
        .await?;
    if result.rows_affected() == 0 {
        return Err(PortalError::NotFound(format!(
            "inclusion of grant call {grant_call_id} in cycle {cycle_id}"
        )));
    }
    tx.commit().await?;
    Ok(())
}

// ─────────────────────────────────────────────────────────
// Award decisions
// ─────────────────────────────────────────────────────────

/// Record the next award decision for (grant call, state). Workplan
/// assignment resolves the highest decision_no.
pub async fn record_award_decision(
    pool: &SqlitePool,
    grant_call_id: i64,
    state_name: &str,
    base_serial: &str,
) -> Result<AwardDecision> {
    let mut tx = pool.begin().await?;
    get_grant_call(&mut *tx, grant_call_id).await?;
    let (last_no,): (i64,) = sqlx::query_as(
        "SELECT COALESCE(MAX(decision_no), 0) FROM grant_call_state_allocations \
         WHERE grant_call_id = ?1 AND state_name = ?2",
    )
    .bind(grant_call_id)
    .bind(state_name)
    .fetch_one(&mut *tx)
    .await?;

    let decision = sqlx::query_as::<_, AwardDecision>(
        "INSERT INTO grant_call_state_allocations \
             (grant_call_id, state_name, decision_no, base_serial) \
         VALUES (?1, ?2, ?3, ?4) \
         RETURNING id, grant_call_id, state_name, decision_no, base_serial, created_at",
    )
    .bind(grant_call_id)
    .bind(state_name)
    .bind(last_no + 1)
    .bind(base_serial)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(decision)
}

/// The current (highest decision_no) award decision for a pair, if any.
pub async fn current_decision(
    ex: impl SqliteExecutor<'_>,
    grant_call_id: i64,
    state_name: &str,
) -> Result<Option<AwardDecision>> {
    let decision = sqlx::query_as::<_, AwardDecision>(
        "SELECT id, grant_call_id, state_name, decision_no, base_serial, created_at \
         FROM grant_call_state_allocations \
         WHERE grant_call_id = ?1 AND state_name = ?2 \
         ORDER BY decision_no DESC LIMIT 1",
    )
    .bind(grant_call_id)
    .bind(state_name)
    .fetch_optional(ex)
    .await?;
    Ok(decision)
}

// ─────────────────────────────────────────────────────────
// Derived aggregates
// ─────────────────────────────────────────────────────────

/// Σ requested amount of allocated-but-uncommitted workplans assigned
/// to the call, the "pending" reservation against its budget.
/// `exclude_workplan` keeps a workplan's own request out of its
/// re-check when it is being (re)assigned or approved.
pub(crate) async fn pending_for_call(
    ex: impl SqliteExecutor<'_>,
    grant_call_id: i64,
    exclude_workplan: Option<i64>,
) -> Result<i64> {
    let row: (i64,) = sqlx::query_as(
        r#"
        SELECT COALESCE(SUM(e.amount), 0)
        FROM   workplans w
        JOIN   workplan_expenses e ON e.workplan_id = w.id
        WHERE  w.grant_call_id = ?1
          AND  w.funding_status = 'allocated'
          AND  w.id != ?2
        "#,
    )
    .bind(grant_call_id)
    .bind(exclude_workplan.unwrap_or(-1))
    .fetch_one(ex)
    .await?;
    Ok(row.0)
}

/// amount − committed − pending, all live.
pub async fn grant_call_summary(pool: &SqlitePool, id: i64) -> Result<GrantCallSummary> {
    let call = get_grant_call(pool, id).await?;
    let (included,): (i64,) = sqlx::query_as(
        "SELECT COALESCE(SUM(amount_included), 0) FROM cycle_inclusions WHERE grant_call_id = ?1",
    )
    .bind(id)
    .fetch_one(pool)
    .await?;
    let committed = ledger::sum_by(
        pool,
        &LedgerFilter {
            grant_call_id: Some(id),
            ..Default::default()
        },
    )
    .await?;
    let pending = pending_for_call(pool, id, None).await?;
    let remaining = call.amount - committed - pending;
    Ok(GrantCallSummary {
        grant_call: call,
        included,
        committed,
        pending,
        remaining,
    })
}
