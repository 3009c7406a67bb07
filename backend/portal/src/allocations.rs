//! State allocation manager: dividing an open tranche's effective cap
//! among states.
//!
//! committed/pending/remaining for an allocation are derived:
//! committed from the ledger, pending from allocated-but-uncommitted
//! workplans linked to it. Amounts are only edited while the tranche is
//! open, and never below what is already committed.

use allocation_core::TrancheStatus;
use sqlx::{SqliteExecutor, SqlitePool};

use crate::errors::{PortalError, Result};
use crate::ledger::{self, LedgerFilter};
use crate::models::{AllocationSummary, StateAllocation, Tranche};
use crate::tranches;

const ALLOCATION_COLUMNS: &str = "id, tranche_id, state_name, amount, created_at";

pub async fn get_allocation(ex: impl SqliteExecutor<'_>, id: i64) -> Result<StateAllocation> {
    sqlx::query_as::<_, StateAllocation>(&format!(
        "SELECT {ALLOCATION_COLUMNS} FROM state_allocations WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(ex)
    .await?
    .ok_or_else(|| PortalError::NotFound(format!("state allocation {id}")))
}

async fn open_tranche_of(
    conn: &mut sqlx::SqliteConnection,
    tranche_id: i64,
) -> Result<Tranche> {
    let tranche = tranches::get_tranche(&mut *conn, tranche_id).await?;
    if TrancheStatus::parse(&tranche.status) != Some(TrancheStatus::Open) {
        return Err(PortalError::InvalidState(format!(
            "tranche {tranche_id} is not open"
        )));
    }
    Ok(tranche)
}

/// Give `state_name` a slice of an open tranche. The effective cap is
/// recomputed inside this transaction; it depends on prior-tranche
/// carryover, so a cached value would race with history edits.
pub async fn allocate(
    pool: &SqlitePool,
    tranche_id: i64,
    state_name: &str,
    amount: i64,
) -> Result<StateAllocation> {
    if amount < 0 {
        return Err(PortalError::InvalidState(
            "allocation amount must be non-negative".to_string(),
        ));
    }
    let mut tx = pool.begin().await?;
    let tranche = open_tranche_of(&mut tx, tranche_id).await?;

    let existing: Option<(i64,)> = sqlx::query_as(
        "SELECT id FROM state_allocations WHERE tranche_id = ?1 AND state_name = ?2",
    )
    .bind(tranche_id)
    .bind(state_name)
    .fetch_optional(&mut *tx)
    .await?;
    if existing.is_some() {
        return Err(PortalError::InvalidState(format!(
            "state {state_name:?} already has an allocation in tranche {tranche_id}"
        )));
    }

    let cap = tranches::effective_cap_for(&mut tx, tranche.cycle_id, tranche.tranche_number).await?;
    let allocated = tranches::allocated_total(&mut *tx, tranche_id).await?;
    if allocated + amount > cap {
        return Err(PortalError::CapacityExceeded(format!(
            "allocating {amount} would total {} against an effective cap of {cap}",
            allocated + amount
        )));
    }

    let allocation = sqlx::query_as::<_, StateAllocation>(&format!(
        "INSERT INTO state_allocations (tranche_id, state_name, amount) \
         VALUES (?1, ?2, ?3) RETURNING {ALLOCATION_COLUMNS}"
    ))
    .bind(tranche_id)
    .bind(state_name)
    .bind(amount)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(allocation)
}

/// Σ requested amount of allocated-but-uncommitted workplans linked to
/// this cycle allocation.
pub(crate) async fn pending_for_allocation(
    ex: impl SqliteExecutor<'_>,
    allocation_id: i64,
    exclude_workplan: Option<i64>,
) -> Result<i64> {
    let row: (i64,) = sqlx::query_as(
        r#"
        SELECT COALESCE(SUM(e.amount), 0)
        FROM   workplans w
        JOIN   workplan_expenses e ON e.workplan_id = w.id
        WHERE  w.cycle_state_allocation_id = ?1
          AND  w.funding_status = 'allocated'
          AND  w.id != ?2
        "#,
    )
    .bind(allocation_id)
    .bind(exclude_workplan.unwrap_or(-1))
    .fetch_one(ex)
    .await?;
    Ok(row.0)
}

pub(crate) async fn committed_for_allocation(
    ex: impl SqliteExecutor<'_>,
    allocation_id: i64,
) -> Result<i64> {
    ledger::sum_by(
        ex,
        &LedgerFilter {
            cycle_state_allocation_id: Some(allocation_id),
            ..Default::default()
        },
    )
    .await
}

/// Change an allocation's amount while its tranche is open. Never below
/// the committed total, and the increase must still fit the tranche's
/// effective cap.
pub async fn edit_allocation(pool: &SqlitePool, id: i64, new_amount: i64) -> Result<StateAllocation> {
    if new_amount < 0 {
        return Err(PortalError::InvalidState(
            "allocation amount must be non-negative".to_string(),
        ));
    }
    let mut tx = pool.begin().await?;
    let allocation = get_allocation(&mut *tx, id).await?;
    let tranche = open_tranche_of(&mut tx, allocation.tranche_id).await?;

    let committed = committed_for_allocation(&mut *tx, id).await?;
    if new_amount < committed {
        return Err(PortalError::CapacityExceeded(format!(
            "amount {new_amount} is below the {committed} already committed"
        )));
    }

    let cap = tranches::effective_cap_for(&mut tx, tranche.cycle_id, tranche.tranche_number).await?;
    let allocated_others =
        tranches::allocated_total(&mut *tx, allocation.tranche_id).await? - allocation.amount;
    if allocated_others + new_amount > cap {
        return Err(PortalError::CapacityExceeded(format!(
            "amount {new_amount} would total {} against an effective cap of {cap}",
            allocated_others + new_amount
        )));
    }

    let allocation = sqlx::query_as::<_, StateAllocation>(&format!(
        "UPDATE state_allocations SET amount = ?2 WHERE id = ?1 RETURNING {ALLOCATION_COLUMNS}"
    ))
    .bind(id)
    .bind(new_amount)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(allocation)
}

/// Delete an allocation with no commitments. Uncommitted workplans
/// still pointing at it are unlinked, not deleted.
pub async fn delete_allocation(pool: &SqlitePool, id: i64) -> Result<()> {
    let mut tx = pool.begin().await?;
    let allocation = get_allocation(&mut *tx, id).await?;
    open_tranche_of(&mut tx, allocation.tranche_id).await?;

    let committed = committed_for_allocation(&mut *tx, id).await?;
    if committed > 0 {
        return Err(PortalError::InvalidState(format!(
            "state allocation {id} has {committed} committed against it"
        )));
    }

    sqlx::query("UPDATE workplans SET cycle_state_allocation_id = NULL WHERE cycle_state_allocation_id = ?1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM state_allocations WHERE id = ?1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(())
}

pub async fn allocation_summary(pool: &SqlitePool, id: i64) -> Result<AllocationSummary> {
    let allocation = get_allocation(pool, id).await?;
    let committed = committed_for_allocation(pool, id).await?;
    let pending = pending_for_allocation(pool, id, None).await?;
    let remaining = allocation.amount - committed - pending;
    Ok(AllocationSummary {
        allocation,
        committed,
        pending,
        remaining,
    })
}

pub async fn list_allocations(pool: &SqlitePool, tranche_id: i64) -> Result<Vec<StateAllocation>> {
    let allocations = sqlx::query_as::<_, StateAllocation>(&format!(
        "SELECT {ALLOCATION_COLUMNS} FROM state_allocations WHERE tranche_id = ?1 ORDER BY id ASC"
    ))
    .bind(tranche_id)
    .fetch_all(pool)
    .await?;
    Ok(allocations)
}
