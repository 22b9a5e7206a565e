use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use vigil_core::entities::Task;

use crate::dto::{OrgScope, TaskListParams, UpdateTaskBody};
use crate::error::ApiError;
use crate::extract::Caller;
use crate::state::AppState;

pub async fn list(
    Caller(identity): Caller,
    State(state): State<AppState>,
    params: Result<Query<TaskListParams>, QueryRejection>,
) -> Result<Json<Vec<Task>>, ApiError> {
    let Query(params) = params?;
    let (org_id, query) = params.split();
    let tasks = state.svc.list_tasks(&identity, &org_id, &query).await?;
    Ok(Json(tasks))
}

pub async fn get_one(
    Caller(identity): Caller,
    State(state): State<AppState>,
    Path(id): Path<String>,
    scope: Result<Query<OrgScope>, QueryRejection>,
) -> Result<Json<Task>, ApiError> {
    let Query(scope) = scope?;
    let task = state
        .svc
        .get_task(&identity, &scope.organization_id, &id)
        .await?;
    Ok(Json(task))
}

pub async fn update(
    Caller(identity): Caller,
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<UpdateTaskBody>, JsonRejection>,
) -> Result<Json<Task>, ApiError> {
    let Json(body) = body?;
    let (org_id, update) = body.split();
    let task = state
        .svc
        .update_task(&identity, &org_id, &id, update)
        .await?;
    Ok(Json(task))
}
