//! Commitment ledger: pure append/query.
//!
//! The sole source of truth for "committed" anywhere in the system.
//! Rows are never updated or deleted; a reversal is a new row with a
//! negated delta whose reason names the original entry. Budget ceilings
//! are validated by the calling component inside the same transaction
//! that appends here; the ledger itself trusts its callers.

use serde::Deserialize;
use sqlx::{QueryBuilder, SqliteConnection, SqliteExecutor};

use crate::db::now_ts;
use crate::errors::Result;
use crate::models::{LedgerEntry, NewLedgerEntry};

const ENTRY_COLUMNS: &str = "id, workplan_id, grant_call_id, grant_call_state_allocation_id, \
     grant_serial, delta_amount, reason, created_by, funding_cycle_id, \
     cycle_state_allocation_id, created_at";

/// Append one entry. Returns the new row id.
pub async fn append(ex: impl SqliteExecutor<'_>, entry: &NewLedgerEntry) -> Result<i64> {
    let row: (i64,) = sqlx::query_as(
        r#"
        INSERT INTO ledger_entries
            (workplan_id, grant_call_id, grant_call_state_allocation_id, grant_serial,
             delta_amount, reason, created_by, funding_cycle_id, cycle_state_allocation_id,
             created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        RETURNING id
        "#,
    )
    .bind(entry.workplan_id)
    .bind(entry.grant_call_id)
    .bind(entry.grant_call_state_allocation_id)
    .bind(&entry.grant_serial)
    .bind(entry.delta_amount)
    .bind(&entry.reason)
    .bind(&entry.created_by)
    .bind(entry.funding_cycle_id)
    .bind(entry.cycle_state_allocation_id)
    .bind(now_ts())
    .fetch_one(ex)
    .await?;
    Ok(row.0)
}

/// Key subset a `sum_by` aggregates over. All fields optional; an empty
/// filter sums the whole ledger.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LedgerFilter {
    pub workplan_id: Option<i64>,
    pub grant_call_id: Option<i64>,
    pub grant_call_state_allocation_id: Option<i64>,
    pub cycle_state_allocation_id: Option<i64>,
    pub funding_cycle_id: Option<i64>,
}

/// Σ delta_amount over entries matching `filter`. A pure function of
/// the stored rows; summing twice with the same filter always yields
/// the same total.
pub async fn sum_by(ex: impl SqliteExecutor<'_>, filter: &LedgerFilter) -> Result<i64> {
    let mut qb =
        QueryBuilder::new("SELECT COALESCE(SUM(delta_amount), 0) FROM ledger_entries WHERE 1=1");
    push_filter(&mut qb, filter);
    let row: (i64,) = qb.build_query_as().fetch_one(ex).await?;
    Ok(row.0)
}

/// Entries matching `filter`, oldest first.
pub async fn list_entries(
    ex: impl SqliteExecutor<'_>,
    filter: &LedgerFilter,
) -> Result<Vec<LedgerEntry>> {
    let mut qb = QueryBuilder::new(format!(
        "SELECT {ENTRY_COLUMNS} FROM ledger_entries WHERE 1=1"
    ));
    push_filter(&mut qb, filter);
    qb.push(" ORDER BY id ASC");
    let rows = qb.build_query_as::<LedgerEntry>().fetch_all(ex).await?;
    Ok(rows)
}

fn push_filter(qb: &mut QueryBuilder<'_, sqlx::Sqlite>, filter: &LedgerFilter) {
    if let Some(id) = filter.workplan_id {
        qb.push(" AND workplan_id = ").push_bind(id);
    }
    if let Some(id) = filter.grant_call_id {
        qb.push(" AND grant_call_id = ").push_bind(id);
    }
    if let Some(id) = filter.grant_call_state_allocation_id {
        qb.push(" AND grant_call_state_allocation_id = ").push_bind(id);
    }
    if let Some(id) = filter.cycle_state_allocation_id {
        qb.push(" AND cycle_state_allocation_id = ").push_bind(id);
    }
    if let Some(id) = filter.funding_cycle_id {
        qb.push(" AND funding_cycle_id = ").push_bind(id);
    }
}

/// Append one negating row per existing entry of `workplan_id`, so
/// every aggregate the workplan touched returns exactly to its
/// pre-commitment value. Runs on the caller's transaction.
pub async fn reverse_workplan_entries(
    conn: &mut SqliteConnection,
    workplan_id: i64,
    created_by: &str,
) -> Result<usize> {
    let entries = list_entries(
        &mut *conn,
        &LedgerFilter {
            workplan_id: Some(workplan_id),
            ..Default::default()
        },
    )
    .await?;

    let mut reversed = 0usize;
    for entry in &entries {
        if entry.delta_amount == 0 {
            continue; // informational rows (reassignments) carry no money
        }
        append(
            &mut *conn,
            &NewLedgerEntry {
                workplan_id: entry.workplan_id,
                grant_call_id: entry.grant_call_id,
                grant_call_state_allocation_id: entry.grant_call_state_allocation_id,
                grant_serial: entry.grant_serial.clone(),
                delta_amount: -entry.delta_amount,
                reason: format!("Reversal of entry #{}", entry.id),
                created_by: created_by.to_string(),
                funding_cycle_id: entry.funding_cycle_id,
                cycle_state_allocation_id: entry.cycle_state_allocation_id,
            },
        )
        .await?;
        reversed += 1;
    }
    Ok(reversed)
}
