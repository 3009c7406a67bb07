//! Tranche planner: sequential slices of a cycle's pool.
//!
//! `planned → open → closed`, forward only. The effective cap of
//! tranche N carries forward whatever tranches 1..N−1 planned but never
//! allocated; it is recomputed live inside the same transaction as any
//! write that depends on it.

use allocation_core::{fsm, split, TrancheStatus};
use sqlx::{SqliteExecutor, SqlitePool};

use crate::errors::{PortalError, Result};
use crate::grants;
use crate::models::{Tranche, TrancheSummary};

const TRANCHE_COLUMNS: &str = "id, cycle_id, tranche_number, planned_cap, status";

pub async fn get_tranche(ex: impl SqliteExecutor<'_>, id: i64) -> Result<Tranche> {
    sqlx::query_as::<_, Tranche>(&format!(
        "SELECT {TRANCHE_COLUMNS} FROM tranches WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(ex)
    .await?
    .ok_or_else(|| PortalError::NotFound(format!("tranche {id}")))
}

fn parse_status(tranche: &Tranche) -> Result<TrancheStatus> {
    TrancheStatus::parse(&tranche.status).ok_or_else(|| {
        PortalError::InvalidState(format!(
            "tranche {} has unknown status {:?}",
            tranche.id, tranche.status
        ))
    })
}

/// Effective cap for tranche `tranche_number` of a cycle:
/// Σ planned_cap of tranches 1..=N − Σ allocations against 1..N−1.
/// Must be read inside the transaction that acts on it.
pub(crate) async fn effective_cap_for(
    conn: &mut sqlx::SqliteConnection,
    cycle_id: i64,
    tranche_number: i64,
) -> Result<i64> {
    let (planned_through,): (i64,) = sqlx::query_as(
        "SELECT COALESCE(SUM(planned_cap), 0) FROM tranches \
         WHERE cycle_id = ?1 AND tranche_number <= ?2",
    )
    .bind(cycle_id)
    .bind(tranche_number)
    .fetch_one(&mut *conn)
    .await?;
    let (allocated_prior,): (i64,) = sqlx::query_as(
        r#"
        SELECT COALESCE(SUM(sa.amount), 0)
        FROM   state_allocations sa
        JOIN   tranches t ON t.id = sa.tranche_id
        WHERE  t.cycle_id = ?1 AND t.tranche_number < ?2
        "#,
    )
    .bind(cycle_id)
    .bind(tranche_number)
    .fetch_one(&mut *conn)
    .await?;
    Ok(split::carryover_cap(planned_through, allocated_prior))
}

/// Σ state-allocation amounts recorded against one tranche.
pub(crate) async fn allocated_total(
    ex: impl SqliteExecutor<'_>,
    tranche_id: i64,
) -> Result<i64> {
    let row: (i64,) = sqlx::query_as(
        "SELECT COALESCE(SUM(amount), 0) FROM state_allocations WHERE tranche_id = ?1",
    )
    .bind(tranche_id)
    .fetch_one(ex)
    .await?;
    Ok(row.0)
}

/// Append the next tranche to a cycle. `planned_cap` defaults to the
/// pool's unplanned remainder. Tranche 1 opens automatically.
pub async fn add_tranche(
    pool: &SqlitePool,
    cycle_id: i64,
    planned_cap: Option<i64>,
) -> Result<Tranche> {
    let mut tx = pool.begin().await?;
    grants::get_cycle(&mut *tx, cycle_id).await?;
    let total = grants::pool_total(&mut *tx, cycle_id).await?;
    let (planned_sum, last_no): (i64, i64) = sqlx::query_as(
        "SELECT COALESCE(SUM(planned_cap), 0), COALESCE(MAX(tranche_number), 0) \
         FROM tranches WHERE cycle_id = ?1",
    )
    .bind(cycle_id)
    .fetch_one(&mut *tx)
    .await?;

    let cap = planned_cap.unwrap_or(total - planned_sum);
    if cap < 0 {
        return Err(PortalError::InvalidState(
            "planned cap must be non-negative".to_string(),
        ));
    }
    if planned_sum + cap > total {
        return Err(PortalError::CapacityExceeded(format!(
            "planning {cap} on top of {planned_sum} would exceed the pool total {total}"
        )));
    }

    let number = last_no + 1;
    let status = if number == 1 {
        TrancheStatus::Open
    } else {
        TrancheStatus::Planned
    };
    let tranche = sqlx::query_as::<_, Tranche>(&format!(
        "INSERT INTO tranches (cycle_id, tranche_number, planned_cap, status) \
         VALUES (?1, ?2, ?3, ?4) RETURNING {TRANCHE_COLUMNS}"
    ))
    .bind(cycle_id)
    .bind(number)
    .bind(cap)
    .bind(status.as_str())
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(tranche)
}

/// Plan a whole cycle in one go: `count` tranches with equal caps, the
/// remainder on the last one. Only on a cycle with no tranches yet.
pub async fn plan_equal_split(pool: &SqlitePool, cycle_id: i64, count: u32) -> Result<Vec<Tranche>> {
    if count == 0 {
        return Err(PortalError::InvalidState(
            "tranche count must be at least 1".to_string(),
        ));
    }
    let mut tx = pool.begin().await?;
    grants::get_cycle(&mut *tx, cycle_id).await?;
    let (existing,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM tranches WHERE cycle_id = ?1")
            .bind(cycle_id)
            .fetch_one(&mut *tx)
            .await?;
    if existing > 0 {
        return Err(PortalError::InvalidState(format!(
            "cycle {cycle_id} already has {existing} tranche(s)"
        )));
    }
    let total = grants::pool_total(&mut *tx, cycle_id).await?;

    let mut tranches = Vec::with_capacity(count as usize);
    for (i, cap) in split::equal_split(total, count).into_iter().enumerate() {
        let number = i as i64 + 1;
        let status = if number == 1 {
            TrancheStatus::Open
        } else {
            TrancheStatus::Planned
        };
        let tranche = sqlx::query_as::<_, Tranche>(&format!(
            "INSERT INTO tranches (cycle_id, tranche_number, planned_cap, status) \
             VALUES (?1, ?2, ?3, ?4) RETURNING {TRANCHE_COLUMNS}"
        ))
        .bind(cycle_id)
        .bind(number)
        .bind(cap)
        .bind(status.as_str())
        .fetch_one(&mut *tx)
        .await?;
        tranches.push(tranche);
    }
    tx.commit().await?;
    Ok(tranches)
}

/// `planned → open`, explicitly.
pub async fn open_tranche(pool: &SqlitePool, id: i64) -> Result<Tranche> {
    let mut tx = pool.begin().await?;
    let tranche = get_tranche(&mut *tx, id).await?;
    let status = parse_status(&tranche)?;
    if !fsm::tranche_transition_allowed(status, TrancheStatus::Open) {
        return Err(PortalError::InvalidState(format!(
            "tranche {id} cannot open from {}",
            tranche.status
        )));
    }
    let tranche = set_status(&mut tx, id, TrancheStatus::Open).await?;
    tx.commit().await?;
    Ok(tranche)
}

/// Close a tranche. By policy a tranche closes only once fully
/// allocated; `force` is the administrative override. Closing N
/// auto-opens tranche N+1 when it exists and is still planned.
pub async fn close_tranche(pool: &SqlitePool, id: i64, force: bool) -> Result<Tranche> {
    let mut tx = pool.begin().await?;
    let tranche = get_tranche(&mut *tx, id).await?;
    let status = parse_status(&tranche)?;
    if !fsm::tranche_transition_allowed(status, TrancheStatus::Closed) {
        return Err(PortalError::InvalidState(format!(
            "tranche {id} cannot close from {}",
            tranche.status
        )));
    }

    if !force {
        let cap = effective_cap_for(&mut tx, tranche.cycle_id, tranche.tranche_number).await?;
        let allocated = allocated_total(&mut *tx, id).await?;
        if allocated < cap {
            return Err(PortalError::InvalidState(format!(
                "tranche {id} is not fully allocated ({allocated} of {cap}); close with force to override"
            )));
        }
    }

    let closed = set_status(&mut tx, id, TrancheStatus::Closed).await?;

    // Auto-open the successor if it is already planned.
    let next: Option<Tranche> = sqlx::query_as::<_, Tranche>(&format!(
        "SELECT {TRANCHE_COLUMNS} FROM tranches \
         WHERE cycle_id = ?1 AND tranche_number = ?2"
    ))
    .bind(tranche.cycle_id)
    .bind(tranche.tranche_number + 1)
    .fetch_optional(&mut *tx)
    .await?;
    if let Some(next) = next {
        if parse_status(&next)? == TrancheStatus::Planned {
            set_status(&mut tx, next.id, TrancheStatus::Open).await?;
        }
    }

    tx.commit().await?;
    Ok(closed)
}

/// Adjust a tranche's planned cap. Only while not closed; the new cap
/// may not push the effective cap below what is already allocated, nor
/// the cycle's planning beyond its pool.
pub async fn set_planned_cap(pool: &SqlitePool, id: i64, new_cap: i64) -> Result<Tranche> {
    if new_cap < 0 {
        return Err(PortalError::InvalidState(
            "planned cap must be non-negative".to_string(),
        ));
    }
    let mut tx = pool.begin().await?;
    let tranche = get_tranche(&mut *tx, id).await?;
    if parse_status(&tranche)? == TrancheStatus::Closed {
        return Err(PortalError::InvalidState(format!(
            "tranche {id} is closed"
        )));
    }

    let total = grants::pool_total(&mut *tx, tranche.cycle_id).await?;
    let (planned_sum,): (i64,) =
        sqlx::query_as("SELECT COALESCE(SUM(planned_cap), 0) FROM tranches WHERE cycle_id = ?1")
            .bind(tranche.cycle_id)
            .fetch_one(&mut *tx)
            .await?;
    if planned_sum - tranche.planned_cap + new_cap > total {
        return Err(PortalError::CapacityExceeded(format!(
            "cap {new_cap} would plan beyond the pool total {total}"
        )));
    }

    let old_eff = effective_cap_for(&mut tx, tranche.cycle_id, tranche.tranche_number).await?;
    let new_eff = old_eff - tranche.planned_cap + new_cap;
    let allocated = allocated_total(&mut *tx, id).await?;
    if new_eff < allocated {
        return Err(PortalError::CapacityExceeded(format!(
            "cap {new_cap} would drop the effective cap to {new_eff}, below the {allocated} already allocated"
        )));
    }

    let tranche = sqlx::query_as::<_, Tranche>(&format!(
        "UPDATE tranches SET planned_cap = ?2 WHERE id = ?1 RETURNING {TRANCHE_COLUMNS}"
    ))
    .bind(id)
    .bind(new_cap)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(tranche)
}

pub async fn tranche_summary(pool: &SqlitePool, id: i64) -> Result<TrancheSummary> {
    let mut tx = pool.begin().await?;
    let tranche = get_tranche(&mut *tx, id).await?;
    let effective_cap =
        effective_cap_for(&mut tx, tranche.cycle_id, tranche.tranche_number).await?;
    let allocated = allocated_total(&mut *tx, id).await?;
    tx.commit().await?;
    Ok(TrancheSummary {
        remaining: effective_cap - allocated,
        tranche,
        effective_cap,
        allocated,
    })
}

pub async fn list_tranches(pool: &SqlitePool, cycle_id: i64) -> Result<Vec<Tranche>> {
    let tranches = sqlx::query_as::<_, Tranche>(&format!(
        "SELECT {TRANCHE_COLUMNS} FROM tranches WHERE cycle_id = ?1 ORDER BY tranche_number ASC"
    ))
    .bind(cycle_id)
    .fetch_all(pool)
    .await?;
    Ok(tranches)
}

async fn set_status(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    id: i64,
    status: TrancheStatus,
) -> Result<Tranche> {
    let tranche = sqlx::query_as::<_, Tranche>(&format!(
        "UPDATE tranches SET status = ?2 WHERE id = ?1 RETURNING {TRANCHE_COLUMNS}"
    ))
    .bind(id)
    .bind(status.as_str())
    .fetch_one(&mut **tx)
    .await?;
    Ok(tranche)
}
