use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use claim_flow::{
    AgentDecision, ApprovalRequest, Claim, ClaimDesk, ClaimError, ClaimIntake, PhotoUpload,
    Vehicle,
    import::ImportReport,
    vehicle::{PlateExtraction, VinExtraction},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<Value>)>;
type ApiError = (StatusCode, Json<Value>);

fn not_found_error(message: &str, id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": message,
            "claim_id": id
        })),
    )
}

fn internal_error(message: &str, details: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": message,
            "details": details
        })),
    )
}

/// Maps desk failures onto responses. Guardrail and lookup failures carry
/// text meant for the agent.
fn claim_error(err: ClaimError) -> ApiError {
    match err {
        ClaimError::ClaimNotFound(id) => not_found_error("Claim not found", &id),
        ClaimError::PhotoNotFound { claim_id, photo_id } => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": "Photo not found",
                "claim_id": claim_id,
                "photo_id": photo_id
            })),
        ),
        ClaimError::Guardrail(guardrail) => (
            StatusCode::CONFLICT,
            Json(json!({
                "error": "Action not allowed",
                "advisory": guardrail.to_string()
            })),
        ),
        ClaimError::Lookup(lookup) => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": lookup.to_string(),
                "advisory": lookup.user_message(),
                "retryable": true
            })),
        ),
        ClaimError::Superseded { slot } => (
            StatusCode::CONFLICT,
            Json(json!({
                "error": "Superseded by a newer request",
                "slot": slot
            })),
        ),
        other => {
            error!(error = %other, "Claim desk failure");
            internal_error("Claim processing failed", &other.to_string())
        }
    }
}

fn default_actor() -> String {
    "agent".to_string()
}

#[derive(Debug, Deserialize)]
pub struct ActorRequest {
    #[serde(default = "default_actor")]
    pub actor: String,
}

#[derive(Debug, Deserialize)]
pub struct DraftRequest {
    #[serde(default = "default_actor")]
    pub actor: String,
    pub decision: AgentDecision,
}

#[derive(Debug, Deserialize)]
pub struct MorePhotosRequest {
    #[serde(default = "default_actor")]
    pub actor: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct AddPhotosRequest {
    #[serde(default = "default_actor")]
    pub actor: String,
    pub photos: Vec<PhotoUpload>,
}

#[derive(Debug, Deserialize)]
pub struct NotesRequest {
    #[serde(default = "default_actor")]
    pub actor: String,
    pub notes: String,
}

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    #[serde(default = "default_actor")]
    pub actor: String,
    pub assignee: String,
}

#[derive(Debug, Deserialize)]
pub struct LookupRequest {
    pub identifier: String,
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Clone)]
pub struct AppState {
    pub desk: ClaimDesk,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/claims", get(list_claims).post(create_claim))
        .route("/claims/import", post(import_claims))
        .route("/claims/{id}", get(get_claim))
        .route("/claims/{id}/assessment", post(run_assessment))
        .route("/claims/{id}/draft", post(save_draft))
        .route("/claims/{id}/submit", post(submit_for_approval))
        .route("/claims/{id}/approve", post(approve))
        .route("/claims/{id}/more-photos", post(request_more_photos))
        .route("/claims/{id}/photos", post(add_photos))
        .route("/claims/{id}/notes", post(update_notes))
        .route("/claims/{id}/assign", post(assign))
        .route("/claims/{id}/photos/{photo_id}/plate", post(extract_plate))
        .route("/claims/{id}/photos/{photo_id}/vin", post(extract_vin))
        .route("/vehicles/lookup", post(lookup_vehicle))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

async fn list_claims(State(state): State<AppState>) -> Json<Vec<Claim>> {
    Json(state.desk.list_claims().await)
}

async fn create_claim(
    State(state): State<AppState>,
    Json(intake): Json<ClaimIntake>,
) -> Result<(StatusCode, Json<Claim>), ApiError> {
    let claim = state.desk.intake(intake).await.map_err(claim_error)?;
    info!(claim_id = %claim.id, "Claim created");
    Ok((StatusCode::CREATED, Json(claim)))
}

async fn get_claim(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Claim> {
    state
        .desk
        .get_claim(&id)
        .await
        .map(Json)
        .map_err(claim_error)
}

async fn run_assessment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<ActorRequest>,
) -> ApiResult<Claim> {
    info!(claim_id = %id, "Running assessment");
    state
        .desk
        .run_assessment(&id, &request.actor)
        .await
        .map(Json)
        .map_err(claim_error)
}

async fn save_draft(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<DraftRequest>,
) -> ApiResult<Claim> {
    state
        .desk
        .save_draft(&id, request.decision, &request.actor)
        .await
        .map(Json)
        .map_err(claim_error)
}

async fn submit_for_approval(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<ActorRequest>,
) -> ApiResult<Claim> {
    state
        .desk
        .submit_for_approval(&id, &request.actor)
        .await
        .map(Json)
        .map_err(claim_error)
}

async fn approve(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<ApprovalRequest>,
) -> ApiResult<Claim> {
    state
        .desk
        .approve(&id, request)
        .await
        .map(Json)
        .map_err(claim_error)
}

async fn request_more_photos(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<MorePhotosRequest>,
) -> ApiResult<Claim> {
    state
        .desk
        .request_more_photos(&id, &request.reason, &request.actor)
        .await
        .map(Json)
        .map_err(claim_error)
}

async fn add_photos(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<AddPhotosRequest>,
) -> ApiResult<Claim> {
    state
        .desk
        .add_photos(&id, request.photos, &request.actor)
        .await
        .map(Json)
        .map_err(claim_error)
}

async fn update_notes(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<NotesRequest>,
) -> ApiResult<Claim> {
    state
        .desk
        .update_notes(&id, &request.notes, &request.actor)
        .await
        .map(Json)
        .map_err(claim_error)
}

async fn assign(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<AssignRequest>,
) -> ApiResult<Claim> {
    state
        .desk
        .assign(&id, &request.assignee, &request.actor)
        .await
        .map(Json)
        .map_err(claim_error)
}

/// Accepts an exported claim array; invalid and already-known records come
/// back under `dropped`.
async fn import_claims(
    State(state): State<AppState>,
    Json(snapshot): Json<Value>,
) -> ApiResult<ImportReport> {
    let report = state
        .desk
        .import_snapshot(&snapshot.to_string())
        .await
        .map_err(claim_error)?;
    info!(
        imported = report.imported.len(),
        dropped = report.dropped.len(),
        "Snapshot imported"
    );
    Ok(Json(report))
}

async fn extract_plate(
    State(state): State<AppState>,
    Path((id, photo_id)): Path<(String, String)>,
) -> ApiResult<PlateExtraction> {
    state
        .desk
        .extract_plate(&id, &photo_id)
        .await
        .map(Json)
        .map_err(claim_error)
}

async fn extract_vin(
    State(state): State<AppState>,
    Path((id, photo_id)): Path<(String, String)>,
) -> ApiResult<VinExtraction> {
    state
        .desk
        .extract_vin(&id, &photo_id)
        .await
        .map(Json)
        .map_err(claim_error)
}

async fn lookup_vehicle(
    State(state): State<AppState>,
    Json(request): Json<LookupRequest>,
) -> ApiResult<Vehicle> {
    state
        .desk
        .lookup_vehicle(&request.identifier, request.state.as_deref())
        .await
        .map(Json)
        .map_err(claim_error)
}
