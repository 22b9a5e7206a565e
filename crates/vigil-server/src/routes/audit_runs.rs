use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use vigil_core::entities::{AuditControl, AuditRun};
use vigil_core::responses::{ActivityPage, AddControlsResponse, AuditRunDetail};

use crate::dto::{
    ActivityParams, AddControlsBody, AuditRunListParams, CreateAuditRunBody, OrgScope,
    UpdateAuditControlBody, UpdateAuditRunBody,
};
use crate::error::ApiError;
use crate::extract::Caller;
use crate::state::AppState;

pub async fn list(
    Caller(identity): Caller,
    State(state): State<AppState>,
    params: Result<Query<AuditRunListParams>, QueryRejection>,
) -> Result<Json<Vec<AuditRun>>, ApiError> {
    let Query(params) = params?;
    let (org_id, query) = params.split();
    let runs = state.svc.list_audit_runs(&identity, &org_id, &query).await?;
    Ok(Json(runs))
}

pub async fn create(
    Caller(identity): Caller,
    State(state): State<AppState>,
    body: Result<Json<CreateAuditRunBody>, JsonRejection>,
) -> Result<(StatusCode, Json<AuditRun>), ApiError> {
    let Json(body) = body?;
    let run = state.svc.create_audit_run(&identity, body.into()).await?;
    Ok((StatusCode::CREATED, Json(run)))
}

pub async fn get_one(
    Caller(identity): Caller,
    State(state): State<AppState>,
    Path(id): Path<String>,
    scope: Result<Query<OrgScope>, QueryRejection>,
) -> Result<Json<AuditRunDetail>, ApiError> {
    let Query(scope) = scope?;
    let detail = state
        .svc
        .get_audit_run(&identity, &scope.organization_id, &id)
        .await?;
    Ok(Json(detail))
}

pub async fn update(
    Caller(identity): Caller,
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<UpdateAuditRunBody>, JsonRejection>,
) -> Result<Json<AuditRun>, ApiError> {
    let Json(body) = body?;
    let (org_id, update) = body.split();
    let run = state
        .svc
        .update_audit_run(&identity, &org_id, &id, update)
        .await?;
    Ok(Json(run))
}

pub async fn delete(
    Caller(identity): Caller,
    State(state): State<AppState>,
    Path(id): Path<String>,
    scope: Result<Query<OrgScope>, QueryRejection>,
) -> Result<Json<AuditRun>, ApiError> {
    let Query(scope) = scope?;
    let run = state
        .svc
        .delete_audit_run(&identity, &scope.organization_id, &id)
        .await
        .map_err(ApiError::for_delete)?;
    Ok(Json(run))
}

pub async fn lock(
    Caller(identity): Caller,
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<OrgScope>, JsonRejection>,
) -> Result<Json<AuditRun>, ApiError> {
    let Json(scope) = body?;
    let run = state
        .svc
        .lock_audit_run(&identity, &scope.organization_id, &id)
        .await?;
    Ok(Json(run))
}

pub async fn list_controls(
    Caller(identity): Caller,
    State(state): State<AppState>,
    Path(id): Path<String>,
    scope: Result<Query<OrgScope>, QueryRejection>,
) -> Result<Json<Vec<AuditControl>>, ApiError> {
    let Query(scope) = scope?;
    let controls = state
        .svc
        .list_audit_controls(&identity, &scope.organization_id, &id)
        .await?;
    Ok(Json(controls))
}

pub async fn add_controls(
    Caller(identity): Caller,
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<AddControlsBody>, JsonRejection>,
) -> Result<(StatusCode, Json<AddControlsResponse>), ApiError> {
    let Json(body) = body?;
    let (org_id, request) = body.split();
    let response = state
        .svc
        .add_controls(&identity, &org_id, &id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn update_control(
    Caller(identity): Caller,
    State(state): State<AppState>,
    Path((id, audit_control_id)): Path<(String, String)>,
    body: Result<Json<UpdateAuditControlBody>, JsonRejection>,
) -> Result<Json<AuditControl>, ApiError> {
    let Json(body) = body?;
    let (org_id, update) = body.split();
    let control = state
        .svc
        .update_audit_control(&identity, &org_id, &id, &audit_control_id, update)
        .await?;
    Ok(Json(control))
}

pub async fn remove_control(
    Caller(identity): Caller,
    State(state): State<AppState>,
    Path((id, audit_control_id)): Path<(String, String)>,
    scope: Result<Query<OrgScope>, QueryRejection>,
) -> Result<Json<AuditControl>, ApiError> {
    let Query(scope) = scope?;
    let removed = state
        .svc
        .remove_audit_control(&identity, &scope.organization_id, &id, &audit_control_id)
        .await
        .map_err(ApiError::for_delete)?;
    Ok(Json(removed))
}

pub async fn activity(
    Caller(identity): Caller,
    State(state): State<AppState>,
    Path(id): Path<String>,
    params: Result<Query<ActivityParams>, QueryRejection>,
) -> Result<Json<ActivityPage>, ApiError> {
    let Query(params) = params?;
    let (org_id, query) = params.split();
    let page = state
        .svc
        .list_activity(&identity, &org_id, &id, &query)
        .await?;
    Ok(Json(page))
}
