use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};

use memberd_core::{Envelope, Outcome, ServiceError};

use crate::model::{
    ExportReport, ExportRequest, ImportReport, ImportRequest, MemberListQuery, SendReport,
    SendRequest,
};
use crate::service::MemberService;

type ServiceState = Arc<MemberService>;

/// Build the member router.
///
/// Routes:
/// - `GET    /members`            list with filters, sort and paging
/// - `GET    /members/{id}`       get one member
/// - `DELETE /members/{id}`       soft-delete
/// - `POST   /members/@import`    all-or-nothing import
/// - `POST   /members/@send`      best-effort notification
/// - `POST   /members/@export`    best-effort export
pub fn router(service: Arc<MemberService>) -> Router {
    Router::new()
        .route("/members", get(list_members))
        .route("/members/@import", post(import_members))
        .route("/members/@send", post(send_members))
        .route("/members/@export", post(export_members))
        .route("/members/{id}", get(get_member).delete(delete_member))
        .with_state(service)
}

/// GET /members: `{"data": [...], "meta": {...}}`.
async fn list_members(
    State(service): State<ServiceState>,
    Query(query): Query<MemberListQuery>,
) -> Response {
    let envelope = service.list_members(&query).wait().await;
    let status = envelope.status;
    match envelope.outcome {
        Outcome::Success(page) => (
            status,
            Json(serde_json::json!({ "data": page.items, "meta": page.meta })),
        )
            .into_response(),
        outcome => Envelope {
            outcome,
            status,
            total: envelope.total,
        }
        .into_response(),
    }
}

/// GET /members/{id}. A missing member is answered as unauthorized so
/// callers cannot tell which ids exist.
async fn get_member(State(service): State<ServiceState>, Path(id): Path<String>) -> Response {
    let envelope = service.get_member(&id).wait().await;
    match envelope.error() {
        Some(ServiceError::NotFound(_)) => {
            ServiceError::Unauthorized("member is not accessible".into()).into_response()
        }
        _ => envelope.into_response(),
    }
}

async fn delete_member(
    State(service): State<ServiceState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    service.delete_member(&id).wait().await.into_payload()?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

async fn import_members(
    State(service): State<ServiceState>,
    Json(req): Json<ImportRequest>,
) -> Envelope<ImportReport> {
    service.import_members(req.members).wait().await
}

async fn send_members(
    State(service): State<ServiceState>,
    Json(req): Json<SendRequest>,
) -> Envelope<SendReport> {
    service.send_members(req.ids, req.notice).wait().await
}

async fn export_members(
    State(service): State<ServiceState>,
    Json(req): Json<ExportRequest>,
) -> Envelope<ExportReport> {
    service.export_members(req.ids).wait().await
}
