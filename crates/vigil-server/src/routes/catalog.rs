use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use vigil_core::entities::{Control, Framework};

use crate::dto::{ControlListParams, CreateControlBody, CreateFrameworkBody, OrgScope};
use crate::error::ApiError;
use crate::extract::Caller;
use crate::state::AppState;

pub async fn list_frameworks(
    Caller(identity): Caller,
    State(state): State<AppState>,
    scope: Result<Query<OrgScope>, QueryRejection>,
) -> Result<Json<Vec<Framework>>, ApiError> {
    let Query(scope) = scope?;
    let frameworks = state
        .svc
        .list_frameworks(&identity, &scope.organization_id)
        .await?;
    Ok(Json(frameworks))
}

pub async fn create_framework(
    Caller(identity): Caller,
    State(state): State<AppState>,
    body: Result<Json<CreateFrameworkBody>, JsonRejection>,
) -> Result<(StatusCode, Json<Framework>), ApiError> {
    let Json(body) = body?;
    let framework = state
        .svc
        .create_framework(
            &identity,
            &body.organization_id,
            &body.name,
            body.version.as_deref(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(framework)))
}

pub async fn list_controls(
    Caller(identity): Caller,
    State(state): State<AppState>,
    params: Result<Query<ControlListParams>, QueryRejection>,
) -> Result<Json<Vec<Control>>, ApiError> {
    let Query(params) = params?;
    let controls = state
        .svc
        .list_controls(
            &identity,
            &params.organization_id,
            params.framework_id.as_deref(),
        )
        .await?;
    Ok(Json(controls))
}

pub async fn create_control(
    Caller(identity): Caller,
    State(state): State<AppState>,
    body: Result<Json<CreateControlBody>, JsonRejection>,
) -> Result<(StatusCode, Json<Control>), ApiError> {
    let Json(body) = body?;
    let control = state.svc.create_control(&identity, body.into()).await?;
    Ok((StatusCode::CREATED, Json(control)))
}
