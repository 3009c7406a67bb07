//! Grant allocation portal entry point.
//!
//! Wires the SQLite pool and the Axum REST API exposing the budget
//! hierarchy: grant calls, cycle pools, tranches, state allocations,
//! workplans, the commitment ledger, serials, and MOUs.

use std::sync::Arc;

use axum::{
    routing::{delete, get, patch, post, put},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use portal::api::{self, ApiState};
use portal::config::Config;
use portal::db;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Load optional .env file (ignored if missing).
    let _ = dotenvy::dotenv();

    // Load config from environment.
    let config = Config::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;

    // Set up the SQLite connection pool and run migrations.
    let pool = db::init_pool(&config.database_url).await?;

    let state = Arc::new(ApiState { pool });

    let app = Router::new()
        .route("/health", get(api::health))
        // Grant call registry
        .route("/grant-calls", post(api::create_grant_call).get(api::list_grant_calls))
        .route("/grant-calls/:id", get(api::grant_call_summary))
        .route("/grant-calls/:id/close", post(api::close_grant_call))
        .route("/grant-calls/:id/decisions", post(api::record_award_decision))
        // Funding cycles and pool inclusions
        .route("/cycles", post(api::create_cycle))
        .route("/cycles/:id/pool", get(api::cycle_pool))
        .route("/cycles/:id/inclusions", post(api::include_grant))
        .route(
            "/cycles/:id/inclusions/:grant_call_id",
            delete(api::remove_inclusion),
        )
        // Tranche planner
        .route("/cycles/:id/tranches", post(api::add_tranche).get(api::list_tranches))
        .route("/cycles/:id/tranches/equal-split", post(api::plan_equal_split))
        .route("/tranches/:id", get(api::tranche_summary))
        .route("/tranches/:id/open", post(api::open_tranche))
        .route("/tranches/:id/close", post(api::close_tranche))
        .route("/tranches/:id/cap", patch(api::set_planned_cap))
        // State allocations
        .route(
            "/tranches/:id/allocations",
            post(api::allocate).get(api::list_allocations),
        )
        .route(
            "/allocations/:id",
            get(api::allocation_summary)
                .patch(api::edit_allocation)
                .delete(api::delete_allocation),
        )
        // Workplans
        .route("/workplans", post(api::create_workplan))
        .route(
            "/workplans/:id",
            get(api::workplan_detail).delete(api::delete_workplan),
        )
        .route("/workplans/:id/expenses", put(api::update_expenses))
        .route("/workplans/:id/files", post(api::attach_file))
        .route("/workplans/:id/assign", post(api::assign_workplan))
        .route("/workplans/:id/reassign", post(api::reassign_workplan))
        .route("/workplans/:id/send-back", post(api::send_back))
        .route("/workplans/:id/decline", post(api::decline_workplan))
        .route("/workplans/approve", post(api::approve_batch))
        // Serials, MOUs, ledger
        .route("/serials/:base/preview", get(api::preview_serial))
        .route("/mous", post(api::create_mou))
        .route("/mous/:id", get(api::get_mou))
        .route("/ledger", get(api::ledger_entries))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.api_port);
    info!("API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
