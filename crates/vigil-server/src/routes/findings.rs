use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use vigil_core::entities::AuditFinding;
use vigil_core::responses::FindingCreateResponse;

use crate::dto::{CreateFindingBody, FindingListParams, OrgScope, UpdateFindingBody};
use crate::error::ApiError;
use crate::extract::Caller;
use crate::state::AppState;

pub async fn list(
    Caller(identity): Caller,
    State(state): State<AppState>,
    params: Result<Query<FindingListParams>, QueryRejection>,
) -> Result<Json<Vec<AuditFinding>>, ApiError> {
    let Query(params) = params?;
    let (org_id, query) = params.split();
    let findings = state.svc.list_findings(&identity, &org_id, &query).await?;
    Ok(Json(findings))
}

pub async fn create(
    Caller(identity): Caller,
    State(state): State<AppState>,
    body: Result<Json<CreateFindingBody>, JsonRejection>,
) -> Result<(StatusCode, Json<FindingCreateResponse>), ApiError> {
    let Json(body) = body?;
    let response = state.svc.create_finding(&identity, body.into()).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn get_one(
    Caller(identity): Caller,
    State(state): State<AppState>,
    Path(id): Path<String>,
    scope: Result<Query<OrgScope>, QueryRejection>,
) -> Result<Json<AuditFinding>, ApiError> {
    let Query(scope) = scope?;
    let finding = state
        .svc
        .get_finding(&identity, &scope.organization_id, &id)
        .await?;
    Ok(Json(finding))
}

pub async fn update(
    Caller(identity): Caller,
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<UpdateFindingBody>, JsonRejection>,
) -> Result<Json<AuditFinding>, ApiError> {
    let Json(body) = body?;
    let (org_id, update) = body.split();
    let finding = state
        .svc
        .update_finding(&identity, &org_id, &id, update)
        .await?;
    Ok(Json(finding))
}
