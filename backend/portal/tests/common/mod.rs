#![allow(dead_code)]

use portal::db;
use portal::grants;
use portal::models::{FundingCycle, GrantCall, Tranche, WorkplanDetail};
use portal::tranches;
use portal::workplans::{self, ExpenseInput};
use sqlx::SqlitePool;

/// Shared-cache in-memory database, one per test. The `name` must be
/// unique per test so fixtures never bleed between tests.
pub async fn test_pool(name: &str) -> SqlitePool {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    db::init_pool(&url).await.expect("pool setup")
}

pub struct Fixture {
    pub pool: SqlitePool,
    pub call: GrantCall,
    pub cycle: FundingCycle,
    pub tranche: Tranche,
}

/// One grant call fully drawn into one cycle, with a single open
/// tranche covering the whole pool.
pub async fn funded_cycle(name: &str, amount: i64) -> Fixture {
    let pool = test_pool(name).await;
    let call = grants::create_grant_call(&pool, "ECHO", "Standard allocation", amount)
        .await
        .expect("grant call");
    let cycle = grants::create_cycle(&pool, "First standard allocation", 2025)
        .await
        .expect("cycle");
    grants::include_grant(&pool, cycle.id, call.id, amount)
        .await
        .expect("inclusion");
    let tranche = tranches::add_tranche(&pool, cycle.id, Some(amount))
        .await
        .expect("tranche");
    Fixture {
        pool,
        call,
        cycle,
        tranche,
    }
}

pub const BASE_SERIAL: &str = "LCC-ABC-KA-0125-0001";

/// Award decision for (call, state) carrying the canonical base serial.
pub async fn award(pool: &SqlitePool, grant_call_id: i64, state: &str) {
    grants::record_award_decision(pool, grant_call_id, state, BASE_SERIAL)
        .await
        .expect("award decision");
}

/// A pending workplan with a single expense line of `amount`.
pub async fn workplan(pool: &SqlitePool, state: &str, amount: i64) -> WorkplanDetail {
    workplans::create_workplan(
        pool,
        state,
        "Community water project",
        "submitter@lcc.example",
        &[ExpenseInput {
            description: "Supplies".to_string(),
            amount,
        }],
    )
    .await
    .expect("workplan")
}

/// Assign and approve a workplan against `grant_call_id`, returning its
/// minted grant serial.
pub async fn commit_workplan(
    pool: &SqlitePool,
    workplan_id: i64,
    grant_call_id: i64,
) -> Option<String> {
    workplans::assign_to_grant_call(pool, workplan_id, grant_call_id, None, "coordinator")
        .await
        .expect("assign");
    let outcomes = workplans::approve_batch(pool, &[workplan_id], "hop-chair")
        .await
        .expect("approve batch");
    assert!(outcomes[0].approved, "approval failed: {:?}", outcomes[0].error);
    outcomes[0].grant_serial.clone()
}
