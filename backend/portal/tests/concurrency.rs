//! Two-writer races over a shared budget. Checks and writes share one
//! transaction, so a losing writer either re-reads the winner's rows
//! on retry (capacity error) or surfaces a conflict.

mod common;

use common::{award, funded_cycle, workplan, BASE_SERIAL};
use portal::db;
use portal::errors::PortalError;
use portal::grants;
use portal::workplans;

#[tokio::test]
async fn test_concurrent_assignments_admit_exactly_one() {
    // Room for one of the two: each fits alone, together they overshoot.
    let fx = funded_cycle("race_assign", 3_000).await;
    award(&fx.pool, fx.call.id, "Khartoum").await;
    let wp_a = workplan(&fx.pool, "Khartoum", 2_000).await;
    let wp_b = workplan(&fx.pool, "Khartoum", 2_000).await;

    let assign = |id: i64| {
        let pool = fx.pool.clone();
        async move {
            db::retry_conflict(|| {
                workplans::assign_to_grant_call(&pool, id, fx.call.id, None, "coord")
            })
            .await
        }
    };
    let (ra, rb) = tokio::join!(assign(wp_a.workplan.id), assign(wp_b.workplan.id));

    let winners = [&ra, &rb].iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1, "a: {ra:?}, b: {rb:?}");
    let loser = if ra.is_err() { ra } else { rb };
    let err = loser.unwrap_err();
    assert!(
        matches!(
            err,
            PortalError::CapacityExceeded(_) | PortalError::Conflict(_)
        ),
        "{err}"
    );

    // The reservation never overshoots the grant call amount.
    let summary = grants::grant_call_summary(&fx.pool, fx.call.id).await.unwrap();
    assert_eq!(summary.pending, 2_000);
    assert!(summary.committed + summary.pending <= fx.call.amount);
}

#[tokio::test]
async fn test_concurrent_approvals_mint_distinct_suffixes() {
    let fx = funded_cycle("race_serial", 10_000).await;
    award(&fx.pool, fx.call.id, "Kassala").await;
    let wp_a = workplan(&fx.pool, "Kassala", 2_000).await;
    let wp_b = workplan(&fx.pool, "Kassala", 2_000).await;
    for id in [wp_a.workplan.id, wp_b.workplan.id] {
        workplans::assign_to_grant_call(&fx.pool, id, fx.call.id, None, "coord")
            .await
            .unwrap();
    }

    let approve = |id: i64| {
        let pool = fx.pool.clone();
        async move { workplans::approve_batch(&pool, &[id], "hop-chair").await }
    };
    let (ra, rb) = tokio::join!(approve(wp_a.workplan.id), approve(wp_b.workplan.id));
    let oa = &ra.unwrap()[0];
    let ob = &rb.unwrap()[0];
    assert!(oa.approved, "{:?}", oa.error);
    assert!(ob.approved, "{:?}", ob.error);

    let mut serials = vec![oa.grant_serial.clone().unwrap(), ob.grant_serial.clone().unwrap()];
    serials.sort();
    assert_eq!(
        serials,
        vec![
            format!("{BASE_SERIAL}-001"),
            format!("{BASE_SERIAL}-002"),
        ]
    );
}
