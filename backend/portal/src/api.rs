//! Axum REST API handlers.
//!
//! Thin layer over the managers: each handler extracts the acting user
//! from the `X-Actor` header where the operation persists one, calls
//! the manager, and lets [`PortalError`] map to a status code.
//! Conflict-prone budget writes are wrapped in the retry helper so a
//! lost write race is re-run against fresh aggregates.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::db::retry_conflict;
use crate::errors::{PortalError, Result};
use crate::ledger::{self, LedgerFilter};
use crate::models::{
    AllocationSummary, ApprovalOutcome, AwardDecision, CycleInclusion, FeedbackRecord,
    FundingCycle, GrantCall, GrantCallSummary, LedgerEntry, Mou, StateAllocation, Tranche,
    TrancheSummary, Workplan, WorkplanDetail,
};
use crate::workplans::ExpenseInput;
use crate::{allocations, grants, mou, serials, tranches, workplans};

#[derive(Clone)]
pub struct ApiState {
    pub pool: SqlitePool,
}

// ─────────────────────────────────────────────────────────
// Response shapes
// ─────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct PoolResponse {
    pub cycle_id: i64,
    pub pool_total: i64,
}

#[derive(Serialize)]
pub struct SerialPreviewResponse {
    pub base_pattern: String,
    pub next_sequence: i64,
}

#[derive(Serialize)]
pub struct DeletedWorkplanResponse {
    pub workplan_id: i64,
    /// Stored object keys for the file-storage collaborator to remove.
    pub object_keys: Vec<String>,
}

#[derive(Serialize)]
pub struct LedgerResponse {
    pub count: usize,
    pub total: i64,
    pub entries: Vec<LedgerEntry>,
}

impl IntoResponse for PortalError {
    fn into_response(self) -> Response {
        let status = match &self {
            PortalError::NotFound(_) => StatusCode::NOT_FOUND,
            PortalError::CapacityExceeded(_)
            | PortalError::InvalidState(_)
            | PortalError::Conflict(_) => StatusCode::CONFLICT,
            PortalError::MissingPrerequisite(_) => StatusCode::UNPROCESSABLE_ENTITY,
            PortalError::Database(_) | PortalError::Migrate(_) | PortalError::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

/// Acting-user identifier, persisted on ledger and feedback rows.
/// Authorization itself lives with the identity collaborator; this core
/// only records who acted.
fn actor(headers: &HeaderMap) -> Result<String> {
    headers
        .get("x-actor")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| PortalError::MissingPrerequisite("X-Actor header is required".to_string()))
}

// ─────────────────────────────────────────────────────────
// Health
// ─────────────────────────────────────────────────────────

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ─────────────────────────────────────────────────────────
// Grant calls
// ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CreateGrantCallRequest {
    pub donor: String,
    pub name: String,
    pub amount: i64,
}

pub async fn create_grant_call(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<CreateGrantCallRequest>,
) -> Result<Json<GrantCall>> {
    let call = grants::create_grant_call(&state.pool, &req.donor, &req.name, req.amount).await?;
    Ok(Json(call))
}

pub async fn list_grant_calls(State(state): State<Arc<ApiState>>) -> Result<Json<Vec<GrantCall>>> {
    Ok(Json(grants::list_grant_calls(&state.pool).await?))
}

pub async fn grant_call_summary(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
) -> Result<Json<GrantCallSummary>> {
    Ok(Json(grants::grant_call_summary(&state.pool, id).await?))
}

pub async fn close_grant_call(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
) -> Result<Json<GrantCall>> {
    Ok(Json(grants::close_grant_call(&state.pool, id).await?))
}

#[derive(Deserialize)]
pub struct AwardDecisionRequest {
    pub state_name: String,
    pub base_serial: String,
}

pub async fn record_award_decision(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
    Json(req): Json<AwardDecisionRequest>,
) -> Result<Json<AwardDecision>> {
    let decision =
        grants::record_award_decision(&state.pool, id, &req.state_name, &req.base_serial).await?;
    Ok(Json(decision))
}

// ─────────────────────────────────────────────────────────
// Cycles and inclusions
// ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CreateCycleRequest {
    pub name: String,
    pub year: i64,
}

pub async fn create_cycle(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<CreateCycleRequest>,
) -> Result<Json<FundingCycle>> {
    Ok(Json(grants::create_cycle(&state.pool, &req.name, req.year).await?))
}

pub async fn cycle_pool(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
) -> Result<Json<PoolResponse>> {
    grants::get_cycle(&state.pool, id).await?;
    let pool_total = grants::pool_total(&state.pool, id).await?;
    Ok(Json(PoolResponse {
        cycle_id: id,
        pool_total,
    }))
}

#[derive(Deserialize)]
pub struct IncludeGrantRequest {
    pub grant_call_id: i64,
    pub amount: i64,
}

pub async fn include_grant(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
    Json(req): Json<IncludeGrantRequest>,
) -> Result<Json<CycleInclusion>> {
    let inclusion = retry_conflict(|| {
        grants::include_grant(&state.pool, id, req.grant_call_id, req.amount)
    })
    .await?;
    Ok(Json(inclusion))
}

pub async fn remove_inclusion(
    State(state): State<Arc<ApiState>>,
    Path((id, grant_call_id)): Path<(i64, i64)>,
) -> Result<StatusCode> {
    grants::remove_inclusion(&state.pool, id, grant_call_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ─────────────────────────────────────────────────────────
// Tranches
// ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct AddTrancheRequest {
    pub planned_cap: Option<i64>,
}

pub async fn add_tranche(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
    Json(req): Json<AddTrancheRequest>,
) -> Result<Json<Tranche>> {
    Ok(Json(tranches::add_tranche(&state.pool, id, req.planned_cap).await?))
}

#[derive(Deserialize)]
pub struct EqualSplitRequest {
    pub count: u32,
}

pub async fn plan_equal_split(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
    Json(req): Json<EqualSplitRequest>,
) -> Result<Json<Vec<Tranche>>> {
    Ok(Json(tranches::plan_equal_split(&state.pool, id, req.count).await?))
}

pub async fn list_tranches(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<Tranche>>> {
    Ok(Json(tranches::list_tranches(&state.pool, id).await?))
}

pub async fn tranche_summary(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
) -> Result<Json<TrancheSummary>> {
    Ok(Json(tranches::tranche_summary(&state.pool, id).await?))
}

pub async fn open_tranche(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
) -> Result<Json<Tranche>> {
    Ok(Json(tranches::open_tranche(&state.pool, id).await?))
}

#[derive(Deserialize, Default)]
pub struct CloseTrancheRequest {
    #[serde(default)]
    pub force: bool,
}

pub async fn close_tranche(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
    Json(req): Json<CloseTrancheRequest>,
) -> Result<Json<Tranche>> {
    Ok(Json(tranches::close_tranche(&state.pool, id, req.force).await?))
}

#[derive(Deserialize)]
pub struct SetCapRequest {
    pub planned_cap: i64,
}

pub async fn set_planned_cap(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
    Json(req): Json<SetCapRequest>,
) -> Result<Json<Tranche>> {
    let tranche =
        retry_conflict(|| tranches::set_planned_cap(&state.pool, id, req.planned_cap)).await?;
    Ok(Json(tranche))
}

// ─────────────────────────────────────────────────────────
// State allocations
// ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct AllocateRequest {
    pub state_name: String,
    pub amount: i64,
}

pub async fn allocate(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
    Json(req): Json<AllocateRequest>,
) -> Result<Json<StateAllocation>> {
    let allocation =
        retry_conflict(|| allocations::allocate(&state.pool, id, &req.state_name, req.amount))
            .await?;
    Ok(Json(allocation))
}

pub async fn list_allocations(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<StateAllocation>>> {
    Ok(Json(allocations::list_allocations(&state.pool, id).await?))
}

pub async fn allocation_summary(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
) -> Result<Json<AllocationSummary>> {
    Ok(Json(allocations::allocation_summary(&state.pool, id).await?))
}

#[derive(Deserialize)]
pub struct EditAllocationRequest {
    pub amount: i64,
}

pub async fn edit_allocation(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
    Json(req): Json<EditAllocationRequest>,
) -> Result<Json<StateAllocation>> {
    let allocation =
        retry_conflict(|| allocations::edit_allocation(&state.pool, id, req.amount)).await?;
    Ok(Json(allocation))
}

pub async fn delete_allocation(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    allocations::delete_allocation(&state.pool, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ─────────────────────────────────────────────────────────
// Workplans
// ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CreateWorkplanRequest {
    pub state_name: String,
    pub title: String,
    #[serde(default)]
    pub expenses: Vec<ExpenseInput>,
}

pub async fn create_workplan(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Json(req): Json<CreateWorkplanRequest>,
) -> Result<Json<WorkplanDetail>> {
    let actor = actor(&headers)?;
    let detail = workplans::create_workplan(
        &state.pool,
        &req.state_name,
        &req.title,
        &actor,
        &req.expenses,
    )
    .await?;
    Ok(Json(detail))
}

pub async fn workplan_detail(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
) -> Result<Json<WorkplanDetail>> {
    Ok(Json(workplans::workplan_detail(&state.pool, id).await?))
}

#[derive(Deserialize)]
pub struct UpdateExpensesRequest {
    pub expenses: Vec<ExpenseInput>,
}

pub async fn update_expenses(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateExpensesRequest>,
) -> Result<Json<WorkplanDetail>> {
    Ok(Json(workplans::update_expenses(&state.pool, id, &req.expenses).await?))
}

#[derive(Deserialize)]
pub struct AttachFileRequest {
    pub object_key: String,
}

pub async fn attach_file(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
    Json(req): Json<AttachFileRequest>,
) -> Result<StatusCode> {
    workplans::attach_file(&state.pool, id, &req.object_key).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct AssignRequest {
    pub grant_call_id: i64,
    pub cycle_state_allocation_id: Option<i64>,
}

pub async fn assign_workplan(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(req): Json<AssignRequest>,
) -> Result<Json<Workplan>> {
    let actor = actor(&headers)?;
    let wp = retry_conflict(|| {
        workplans::assign_to_grant_call(
            &state.pool,
            id,
            req.grant_call_id,
            req.cycle_state_allocation_id,
            &actor,
        )
    })
    .await?;
    Ok(Json(wp))
}

#[derive(Deserialize)]
pub struct ReassignRequest {
    pub grant_call_id: i64,
    pub reason: String,
}

pub async fn reassign_workplan(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(req): Json<ReassignRequest>,
) -> Result<Json<Workplan>> {
    let actor = actor(&headers)?;
    let wp = retry_conflict(|| {
        workplans::reassign(&state.pool, id, req.grant_call_id, &req.reason, &actor)
    })
    .await?;
    Ok(Json(wp))
}

#[derive(Deserialize)]
pub struct ApproveBatchRequest {
    pub workplan_ids: Vec<i64>,
}

pub async fn approve_batch(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Json(req): Json<ApproveBatchRequest>,
) -> Result<Json<Vec<ApprovalOutcome>>> {
    let actor = actor(&headers)?;
    let outcomes = workplans::approve_batch(&state.pool, &req.workplan_ids, &actor).await?;
    Ok(Json(outcomes))
}

#[derive(Deserialize)]
pub struct SendBackRequest {
    pub message: String,
}

pub async fn send_back(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(req): Json<SendBackRequest>,
) -> Result<Json<FeedbackRecord>> {
    let actor = actor(&headers)?;
    Ok(Json(workplans::send_back(&state.pool, id, &req.message, &actor).await?))
}

pub async fn decline_workplan(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<Workplan>> {
    let actor = actor(&headers)?;
    Ok(Json(workplans::decline(&state.pool, id, &actor).await?))
}

pub async fn delete_workplan(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<DeletedWorkplanResponse>> {
    let actor = actor(&headers)?;
    let object_keys =
        retry_conflict(|| workplans::delete_workplan(&state.pool, id, &actor)).await?;
    Ok(Json(DeletedWorkplanResponse {
        workplan_id: id,
        object_keys,
    }))
}

// ─────────────────────────────────────────────────────────
// Serials, MOUs, ledger
// ─────────────────────────────────────────────────────────

/// `GET /serials/:base/preview`. Advisory only; reserves nothing.
pub async fn preview_serial(
    State(state): State<Arc<ApiState>>,
    Path(base): Path<String>,
) -> Result<Json<SerialPreviewResponse>> {
    let next_sequence = serials::preview_next(&state.pool, &base).await?;
    Ok(Json(SerialPreviewResponse {
        base_pattern: base,
        next_sequence,
    }))
}

#[derive(Deserialize)]
pub struct CreateMouRequest {
    pub workplan_ids: Vec<i64>,
    pub partner_name: String,
    pub state_name: String,
}

pub async fn create_mou(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Json(req): Json<CreateMouRequest>,
) -> Result<Json<Mou>> {
    let actor = actor(&headers)?;
    let mou = retry_conflict(|| {
        mou::create_mou(
            &state.pool,
            &req.workplan_ids,
            &req.partner_name,
            &req.state_name,
            &actor,
        )
    })
    .await?;
    Ok(Json(mou))
}

pub async fn get_mou(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
) -> Result<Json<Mou>> {
    Ok(Json(mou::get_mou(&state.pool, id).await?))
}

/// `GET /ledger`. Entries and their sum under any key-subset filter.
pub async fn ledger_entries(
    State(state): State<Arc<ApiState>>,
    Query(filter): Query<LedgerFilter>,
) -> Result<Json<LedgerResponse>> {
    let entries = ledger::list_entries(&state.pool, &filter).await?;
    let total = ledger::sum_by(&state.pool, &filter).await?;
    Ok(Json(LedgerResponse {
        count: entries.len(),
        total,
        entries,
    }))
}
