//! Pool, tranche, and state-allocation budget scenarios.

mod common;

use common::funded_cycle;
use portal::allocations;
use portal::errors::PortalError;
use portal::grants;
use portal::tranches;

#[tokio::test]
async fn test_state_allocations_cannot_exceed_tranche_cap() {
    // Grant call 10,000 → pool 10,000 → tranche 1 cap 10,000.
    let fx = funded_cycle("scenario_a", 10_000).await;

    let khartoum = allocations::allocate(&fx.pool, fx.tranche.id, "Khartoum", 6_000)
        .await
        .expect("first allocation fits");
    assert_eq!(khartoum.amount, 6_000);

    // 6,000 + 5,000 = 11,000 > 10,000.
    let err = allocations::allocate(&fx.pool, fx.tranche.id, "Kassala", 5_000)
        .await
        .unwrap_err();
    assert!(matches!(err, PortalError::CapacityExceeded(_)), "{err}");

    // The remaining 4,000 still fits exactly.
    allocations::allocate(&fx.pool, fx.tranche.id, "Kassala", 4_000)
        .await
        .expect("exact fit");
}

#[tokio::test]
async fn test_underallocated_closed_tranche_rolls_balance_forward() {
    // Pool 15,000; tranche 1 planned 10,000 but only 6,000 allocated.
    let fx = funded_cycle("scenario_b", 15_000).await;
    allocations::allocate(&fx.pool, fx.tranche.id, "Khartoum", 6_000)
        .await
        .unwrap();
    // Tranche 1 planned 15,000 by the fixture; trim it to 10,000 first.
    tranches::set_planned_cap(&fx.pool, fx.tranche.id, 10_000)
        .await
        .unwrap();
    tranches::close_tranche(&fx.pool, fx.tranche.id, true)
        .await
        .expect("administrative close");

    let tranche2 = tranches::add_tranche(&fx.pool, fx.cycle.id, Some(5_000))
        .await
        .unwrap();
    let summary = tranches::tranche_summary(&fx.pool, tranche2.id).await.unwrap();
    // (10,000 + 5,000) − 6,000 = 9,000.
    assert_eq!(summary.effective_cap, 9_000);
    assert_eq!(summary.remaining, 9_000);
}

#[tokio::test]
async fn test_inclusions_cannot_overdraw_a_grant_call() {
    let pool = common::test_pool("overdraw_call").await;
    let call = grants::create_grant_call(&pool, "ECHO", "Standard", 10_000)
        .await
        .unwrap();
    let cycle1 = grants::create_cycle(&pool, "First", 2025).await.unwrap();
    let cycle2 = grants::create_cycle(&pool, "Second", 2025).await.unwrap();

    grants::include_grant(&pool, cycle1.id, call.id, 8_000).await.unwrap();
    // 8,000 drawn across all cycles; only 2,000 left to draw.
    let err = grants::include_grant(&pool, cycle2.id, call.id, 3_000)
        .await
        .unwrap_err();
    assert!(matches!(err, PortalError::CapacityExceeded(_)), "{err}");

    grants::include_grant(&pool, cycle2.id, call.id, 2_000).await.unwrap();
    assert_eq!(grants::pool_total(&pool, cycle1.id).await.unwrap(), 8_000);
    assert_eq!(grants::pool_total(&pool, cycle2.id).await.unwrap(), 2_000);
}

#[tokio::test]
async fn test_equal_split_plans_whole_pool_without_losing_cents() {
    let pool = common::test_pool("equal_split").await;
    let call = grants::create_grant_call(&pool, "FCDO", "Pooled", 10_000)
        .await
        .unwrap();
    let cycle = grants::create_cycle(&pool, "Split", 2025).await.unwrap();
    grants::include_grant(&pool, cycle.id, call.id, 10_000).await.unwrap();

    let planned = tranches::plan_equal_split(&pool, cycle.id, 3).await.unwrap();
    let caps: Vec<i64> = planned.iter().map(|t| t.planned_cap).collect();
    assert_eq!(caps, vec![3_333, 3_333, 3_334]);
    assert_eq!(planned[0].status, "open");
    assert_eq!(planned[1].status, "planned");

    // Re-planning an already-planned cycle is rejected.
    let err = tranches::plan_equal_split(&pool, cycle.id, 2).await.unwrap_err();
    assert!(matches!(err, PortalError::InvalidState(_)), "{err}");
}

#[tokio::test]
async fn test_closing_a_tranche_requires_full_allocation_unless_forced() {
    let fx = funded_cycle("close_policy", 10_000).await;
    allocations::allocate(&fx.pool, fx.tranche.id, "Khartoum", 4_000)
        .await
        .unwrap();

    let err = tranches::close_tranche(&fx.pool, fx.tranche.id, false)
        .await
        .unwrap_err();
    assert!(matches!(err, PortalError::InvalidState(_)), "{err}");

    tranches::close_tranche(&fx.pool, fx.tranche.id, true)
        .await
        .expect("forced close");
}

#[tokio::test]
async fn test_closing_a_tranche_auto_opens_its_successor() {
    let pool = common::test_pool("auto_open").await;
    let call = grants::create_grant_call(&pool, "ECHO", "Standard", 9_000)
        .await
        .unwrap();
    let cycle = grants::create_cycle(&pool, "Rolling", 2025).await.unwrap();
    grants::include_grant(&pool, cycle.id, call.id, 9_000).await.unwrap();
    let planned = tranches::plan_equal_split(&pool, cycle.id, 3).await.unwrap();

    tranches::close_tranche(&pool, planned[0].id, true).await.unwrap();
    let second = tranches::tranche_summary(&pool, planned[1].id).await.unwrap();
    assert_eq!(second.tranche.status, "open");
    let third = tranches::tranche_summary(&pool, planned[2].id).await.unwrap();
    assert_eq!(third.tranche.status, "planned");
}

#[tokio::test]
async fn test_allocation_rejected_on_closed_tranche() {
    let fx = funded_cycle("closed_tranche", 10_000).await;
    tranches::close_tranche(&fx.pool, fx.tranche.id, true).await.unwrap();

    let err = allocations::allocate(&fx.pool, fx.tranche.id, "Kassala", 1_000)
        .await
        .unwrap_err();
    assert!(matches!(err, PortalError::InvalidState(_)), "{err}");
}

#[tokio::test]
async fn test_planned_cap_cannot_drop_below_allocated() {
    let fx = funded_cycle("cap_floor", 10_000).await;
    allocations::allocate(&fx.pool, fx.tranche.id, "Khartoum", 6_000)
        .await
        .unwrap();

    let err = tranches::set_planned_cap(&fx.pool, fx.tranche.id, 5_000)
        .await
        .unwrap_err();
    assert!(matches!(err, PortalError::CapacityExceeded(_)), "{err}");

    tranches::set_planned_cap(&fx.pool, fx.tranche.id, 6_000)
        .await
        .expect("cap equal to allocated is fine");
}

#[tokio::test]
async fn test_tranches_cannot_plan_beyond_the_pool() {
    let fx = funded_cycle("overplan", 10_000).await;
    // The fixture's tranche 1 already plans the whole pool.
    let err = tranches::add_tranche(&fx.pool, fx.cycle.id, Some(1))
        .await
        .unwrap_err();
    assert!(matches!(err, PortalError::CapacityExceeded(_)), "{err}");

    // The default cap is the unplanned remainder: zero here.
    let tranche2 = tranches::add_tranche(&fx.pool, fx.cycle.id, None).await.unwrap();
    assert_eq!(tranche2.planned_cap, 0);
}

#[tokio::test]
async fn test_allocation_edits_recheck_the_effective_cap() {
    let fx = funded_cycle("edit_cap", 10_000).await;
    let khartoum = allocations::allocate(&fx.pool, fx.tranche.id, "Khartoum", 6_000)
        .await
        .unwrap();
    allocations::allocate(&fx.pool, fx.tranche.id, "Kassala", 4_000)
        .await
        .unwrap();

    // 7,000 + 4,000 would exceed the 10,000 cap.
    let err = allocations::edit_allocation(&fx.pool, khartoum.id, 7_000)
        .await
        .unwrap_err();
    assert!(matches!(err, PortalError::CapacityExceeded(_)), "{err}");

    let shrunk = allocations::edit_allocation(&fx.pool, khartoum.id, 2_000)
        .await
        .unwrap();
    assert_eq!(shrunk.amount, 2_000);
}

#[tokio::test]
async fn test_uncommitted_allocation_can_be_deleted() {
    let fx = funded_cycle("delete_alloc", 10_000).await;
    let allocation = allocations::allocate(&fx.pool, fx.tranche.id, "Gedaref", 3_000)
        .await
        .unwrap();
    allocations::delete_allocation(&fx.pool, allocation.id)
        .await
        .expect("no commitments, deletable");

    let err = allocations::get_allocation(&fx.pool, allocation.id)
        .await
        .unwrap_err();
    assert!(matches!(err, PortalError::NotFound(_)), "{err}");
}

#[tokio::test]
async fn test_inclusion_removal_blocked_by_dependent_workplans() {
    let fx = funded_cycle("remove_inclusion", 10_000).await;
    common::award(&fx.pool, fx.call.id, "Khartoum").await;
    let allocation = allocations::allocate(&fx.pool, fx.tranche.id, "Khartoum", 6_000)
        .await
        .unwrap();

    let wp = common::workplan(&fx.pool, "Khartoum", 2_000).await;
    portal::workplans::assign_to_grant_call(
        &fx.pool,
        wp.workplan.id,
        fx.call.id,
        Some(allocation.id),
        "coordinator",
    )
    .await
    .unwrap();

    let err = grants::remove_inclusion(&fx.pool, fx.cycle.id, fx.call.id)
        .await
        .unwrap_err();
    assert!(matches!(err, PortalError::InvalidState(_)), "{err}");
}
