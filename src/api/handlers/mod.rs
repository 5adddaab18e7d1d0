use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::doc::SectionedDocument;
use crate::engine::Engine;
use crate::error::EngineError;
use crate::models::*;

// ============================================================
// Error Handling
// ============================================================

/// Map an engine error to a status code and body.
///
/// Caller errors and conflicts carry their full message: they name the
/// entity (session, branch, section) the caller must act on. Backend and
/// corruption failures are logged server-side and surfaced sanitized.
fn error_response(e: EngineError) -> (StatusCode, String) {
    use EngineError::*;
    match &e {
        RepositoryNotFound(_) | SessionNotFound(_) | BranchNotFound(_) => {
            tracing::warn!("Not found: {}", e);
            (StatusCode::NOT_FOUND, e.to_string())
        }
        InvalidInput(_) | ProtectedBranchViolation(_) | DuplicateHeading(_)
        | AmbiguousTrunk(_) => {
            tracing::warn!("Caller error: {}", e);
            (StatusCode::BAD_REQUEST, e.to_string())
        }
        SessionConflict { .. } | SessionBusy(_) | NothingToCommit(_) => {
            tracing::warn!("State conflict: {}", e);
            (StatusCode::CONFLICT, e.to_string())
        }
        MalformedMarker { .. } => {
            tracing::warn!("Corrupt document: {}", e);
            (StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
        }
        VcsTimeout { .. } => {
            tracing::error!("Backend timeout: {}", e);
            (StatusCode::GATEWAY_TIMEOUT, e.to_string())
        }
        Vcs(_) => {
            tracing::error!("Backend failure: {}", e);
            (StatusCode::BAD_GATEWAY, "Version-control backend failed".to_string())
        }
        RoundTripMismatch(_) => {
            tracing::error!("Internal error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    }
}

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================
// Sessions
// ============================================================

pub async fn start_session(
    State(engine): State<Engine>,
    Json(input): Json<StartSessionInput>,
) -> Result<(StatusCode, Json<DocumentationSession>), (StatusCode, String)> {
    engine
        .start_session(input)
        .await
        .map(|s| (StatusCode::CREATED, Json(s)))
        .map_err(error_response)
}

pub async fn get_session(
    State(engine): State<Engine>,
    Path(id): Path<Uuid>,
) -> Result<Json<DocumentationSession>, (StatusCode, String)> {
    engine.get_session(id).map(Json).map_err(error_response)
}

pub async fn end_session(
    State(engine): State<Engine>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    engine
        .end_session(id)
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(error_response)
}

pub async fn select_branch(
    State(engine): State<Engine>,
    Path(id): Path<Uuid>,
    Json(input): Json<SelectBranchInput>,
) -> Result<Json<BranchSelection>, (StatusCode, String)> {
    engine
        .select_branch(id, input.name, input.create)
        .await
        .map(Json)
        .map_err(error_response)
}

// ============================================================
// Documents
// ============================================================

pub async fn write_document(
    State(engine): State<Engine>,
    Path(id): Path<Uuid>,
    Json(input): Json<WriteDocumentInput>,
) -> Result<Json<WriteOutcome>, (StatusCode, String)> {
    let sections = input
        .sections
        .into_iter()
        .map(|s| (s.heading, s.content))
        .collect();
    engine
        .write_document(
            id,
            &input.file_path,
            input.title.as_deref(),
            sections,
            input.message,
        )
        .await
        .map(Json)
        .map_err(error_response)
}

#[derive(Debug, Deserialize)]
pub struct ReadDocumentQuery {
    pub path: std::path::PathBuf,
}

pub async fn read_document(
    State(engine): State<Engine>,
    Path(id): Path<Uuid>,
    Query(query): Query<ReadDocumentQuery>,
) -> Result<Json<SectionedDocument>, (StatusCode, String)> {
    engine
        .read_document(id, &query.path)
        .await
        .map(Json)
        .map_err(error_response)
}

pub async fn analyze_impact(
    State(engine): State<Engine>,
    Path(id): Path<Uuid>,
    Json(input): Json<AnalyzeImpactInput>,
) -> Result<Json<ImpactReport>, (StatusCode, String)> {
    let descriptor = ChangeDescriptor {
        changes: input.changes,
    };
    engine
        .analyze_impact(id, &input.file_path, &descriptor)
        .await
        .map(Json)
        .map_err(error_response)
}

pub async fn update_sections(
    State(engine): State<Engine>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateSectionsInput>,
) -> Result<Json<WriteOutcome>, (StatusCode, String)> {
    engine
        .update_sections(id, &input.file_path, input.updates, input.message)
        .await
        .map(Json)
        .map_err(error_response)
}

// ============================================================
// Review
// ============================================================

pub async fn open_review(
    State(engine): State<Engine>,
    Path(id): Path<Uuid>,
    Json(input): Json<OpenReviewInput>,
) -> Result<Json<ReviewHandle>, (StatusCode, String)> {
    engine
        .open_review(id, &input.title, &input.body)
        .await
        .map(Json)
        .map_err(error_response)
}
