pub mod dto;
pub mod errors;
pub mod handlers;

use axum::{routing::get, Router};
use sqlx::PgPool;
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;

use crate::records::{LocalZone, RecordService};
use handlers::ApiDoc;

/// Shared handler state, built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub records: RecordService,
}

impl AppState {
    /// `zone` defines the local calendar day used for one-record-per-day.
    pub fn new(pool: PgPool, zone: LocalZone) -> Self {
        Self {
            records: RecordService::new(pool.clone(), zone),
            pool,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .route("/fridges", get(handlers::list_fridges))
        .route(
            "/records",
            get(handlers::list_records)
                .post(handlers::create_record)
                .put(handlers::update_record),
        )
        .with_state(state)
        .split_for_parts();

    router
        .route("/health", get(handlers::health))
        .route(
            "/api-docs/openapi.json",
            get(move || async move { axum::Json(api) }),
        )
}
