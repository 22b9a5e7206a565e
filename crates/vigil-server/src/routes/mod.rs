//! HTTP routes under `/api/admin`.

use axum::Router;
use axum::routing::{get, post, put};

use crate::state::AppState;

mod audit_runs;
mod catalog;
mod findings;
mod tasks;


pub fn router(state: AppState) -> Router {
    let admin = Router::new()
        .route(
            "/audit-runs",
            get(audit_runs::list).post(audit_runs::create),
        )
        .route(
            "/audit-runs/{id}",
            get(audit_runs::get_one)
                .put(audit_runs::update)
                .delete(audit_runs::delete),
        )
        .route("/audit-runs/{id}/lock", post(audit_runs::lock))
        .route(
            "/audit-runs/{id}/controls",
            get(audit_runs::list_controls).post(audit_runs::add_controls),
        )
        .route(
            "/audit-runs/{id}/controls/{audit_control_id}",
            put(audit_runs::update_control).delete(audit_runs::remove_control),
        )
        .route("/audit-runs/{id}/activity", get(audit_runs::activity))
        .route(
            "/audit-findings",
            get(findings::list).post(findings::create),
        )
        .route(
            "/audit-findings/{id}",
            get(findings::get_one).put(findings::update),
        )
        .route("/tasks", get(tasks::list))
        .route("/tasks/{id}", get(tasks::get_one).put(tasks::update))
        .route(
            "/frameworks",
            get(catalog::list_frameworks).post(catalog::create_framework),
        )
        .route(
            "/controls",
            get(catalog::list_controls).post(catalog::create_control),
        );

    Router::new()
        .route("/healthz", get(healthz))
        .nest("/api/admin", admin)
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}
