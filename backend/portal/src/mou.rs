//! MOU bundler: grouping committed, approved workplans into a
//! partnership agreement exactly once.

use allocation_core::{FundingStatus, WorkplanStatus};
use sqlx::SqlitePool;

use crate::errors::{PortalError, Result};
use crate::models::Mou;
use crate::workplans;

/// Bundle `workplan_ids` into a new MOU. Every workplan must be listed
/// once, committed, approved, and unlinked; the MOU insert and all the
/// `mou_id` links commit or roll back together; partial linkage
/// cannot occur.
pub async fn create_mou(
    pool: &SqlitePool,
    workplan_ids: &[i64],
    partner_name: &str,
    state_name: &str,
    actor: &str,
) -> Result<Mou> {
    if workplan_ids.is_empty() {
        return Err(PortalError::MissingPrerequisite(
            "an MOU needs at least one workplan".to_string(),
        ));
    }
    let mut seen = std::collections::HashSet::new();
    for &id in workplan_ids {
        if !seen.insert(id) {
            return Err(PortalError::InvalidState(format!(
                "workplan {id} appears more than once in the bundle"
            )));
        }
    }

    let mut tx = pool.begin().await?;
    let mut total = 0i64;
    for &id in workplan_ids {
        let wp = workplans::get_workplan(&mut *tx, id).await?;
        if let Some(mou_id) = wp.mou_id {
            return Err(PortalError::InvalidState(format!(
                "workplan {id} is already linked to MOU {mou_id}"
            )));
        }
        let committed = FundingStatus::parse(&wp.funding_status) == Some(FundingStatus::Committed);
        let approved = WorkplanStatus::parse(&wp.status) == Some(WorkplanStatus::Approved);
        if !committed || !approved {
            return Err(PortalError::InvalidState(format!(
                "workplan {id} is {}/{}; only committed, approved workplans can be bundled",
                wp.funding_status, wp.status
            )));
        }
        total += workplans::requested_amount(&mut *tx, id).await?;
    }

    let mou = sqlx::query_as::<_, Mou>(
        "INSERT INTO mous (partner_name, state_name, total_amount, created_by) \
         VALUES (?1, ?2, ?3, ?4) \
         RETURNING id, partner_name, state_name, total_amount, created_by, created_at",
    )
    .bind(partner_name)
    .bind(state_name)
    .bind(total)
    .bind(actor)
    .fetch_one(&mut *tx)
    .await?;

    for &id in workplan_ids {
        sqlx::query("UPDATE workplans SET mou_id = ?2 WHERE id = ?1")
            .bind(id)
            .bind(mou.id)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;
    Ok(mou)
}

pub async fn get_mou(pool: &SqlitePool, id: i64) -> Result<Mou> {
    sqlx::query_as::<_, Mou>(
        "SELECT id, partner_name, state_name, total_amount, created_by, created_at \
         FROM mous WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| PortalError::NotFound(format!("MOU {id}")))
}
