use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use utoipa::OpenApi;

use super::{
    dto::{
        CreateRecordRequest, CreatedRecordDto, DuplicateDayDto, ErrorDto, FridgeDto,
        FridgeTemperatureInput, ReadingDto, RecordDto, UpdateRecordRequest, UserDto,
        INVALID_CREATE, INVALID_UPDATE,
    },
    errors::{AppError, RecordResultExt},
    AppState,
};
use crate::db::{self, records::RecordFilter};

// ---------------------------------------------------------------------------
// Query parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordsQuery {
    pub user_id: Option<i32>,
    pub limit: Option<i64>,
}

impl RecordsQuery {
    fn into_filter(self) -> Result<RecordFilter, AppError> {
        if self.limit.is_some_and(|limit| limit < 1) {
            return Err(AppError::InvalidInput("limit must be a positive integer"));
        }
        Ok(RecordFilter {
            user_id: self.user_id,
            limit: self.limit,
        })
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// List every fridge.
#[utoipa::path(
    get,
    path = "/fridges",
    responses(
        (status = 200, description = "All fridges, by id", body = Vec<FridgeDto>),
        (status = 500, description = "Internal server error", body = ErrorDto),
    ),
    tag = "fridges"
)]
pub async fn list_fridges(State(state): State<AppState>) -> Result<Json<Vec<FridgeDto>>, AppError> {
    let fridges = db::fridges::list(&state.pool)
        .await
        .map_err(|e| AppError::internal("Failed to fetch fridges", e))?;

    Ok(Json(fridges.into_iter().map(Into::into).collect()))
}

/// List records newest first, each with its user and readings.
#[utoipa::path(
    get,
    path = "/records",
    params(
        ("userId" = Option<i32>, Query, description = "Only records of this user"),
        ("limit"  = Option<i64>, Query, description = "Maximum number of records (>= 1)"),
    ),
    responses(
        (status = 200, description = "Records ordered by recordedAt descending", body = Vec<RecordDto>),
        (status = 400, description = "Malformed query parameters", body = ErrorDto),
        (status = 500, description = "Internal server error", body = ErrorDto),
    ),
    tag = "records"
)]
pub async fn list_records(
    State(state): State<AppState>,
    query: Result<Query<RecordsQuery>, QueryRejection>,
) -> Result<Json<Vec<RecordDto>>, AppError> {
    let Query(query) =
        query.map_err(|_| AppError::InvalidInput("userId and limit must be integers"))?;
    let filter = query.into_filter()?;

    let records = state
        .records
        .list(filter)
        .await
        .or_internal("Failed to fetch records")?;

    Ok(Json(records.into_iter().map(Into::into).collect()))
}

/// Create today's record for a user, with one reading per fridge.
#[utoipa::path(
    post,
    path = "/records",
    request_body = CreateRecordRequest,
    responses(
        (status = 201, description = "Record created", body = CreatedRecordDto),
        (status = 400, description = "Invalid input or unknown user/fridge", body = ErrorDto),
        (status = 409, description = "The user already has a record on this day", body = DuplicateDayDto),
        (status = 500, description = "Internal server error", body = ErrorDto),
    ),
    tag = "records"
)]
pub async fn create_record(
    State(state): State<AppState>,
    payload: Result<Json<CreateRecordRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatedRecordDto>), AppError> {
    let Json(request) = payload.map_err(|_| AppError::InvalidInput(INVALID_CREATE))?;
    let new = request.validate(state.records.zone())?;

    let record = state
        .records
        .create(new)
        .await
        .or_internal("Internal Server Error")?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedRecordDto {
            new_record: record.into(),
        }),
    ))
}

/// Replace a record's user, date and readings.
#[utoipa::path(
    put,
    path = "/records",
    request_body = UpdateRecordRequest,
    responses(
        (status = 200, description = "Updated record", body = RecordDto),
        (status = 400, description = "Invalid input or unknown user/fridge", body = ErrorDto),
        (status = 404, description = "No record with this recordId", body = ErrorDto),
        (status = 409, description = "The user already has another record on this day", body = DuplicateDayDto),
        (status = 500, description = "Internal server error", body = ErrorDto),
    ),
    tag = "records"
)]
pub async fn update_record(
    State(state): State<AppState>,
    payload: Result<Json<UpdateRecordRequest>, JsonRejection>,
) -> Result<Json<RecordDto>, AppError> {
    let Json(request) = payload.map_err(|_| AppError::InvalidInput(INVALID_UPDATE))?;
    let update = request.validate(state.records.zone())?;

    let record = state
        .records
        .update(update)
        .await
        .or_internal("Failed to update the record")?;

    Ok(Json(record.into()))
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Returns `200 OK` with `{"status":"ok"}` when the server is running.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
    ),
    tag = "system"
)]
pub async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}

// ---------------------------------------------------------------------------
// OpenAPI document
// ---------------------------------------------------------------------------

#[derive(OpenApi)]
#[openapi(
    paths(list_fridges, list_records, create_record, update_record, health),
    components(schemas(
        FridgeDto,
        UserDto,
        ReadingDto,
        RecordDto,
        CreatedRecordDto,
        CreateRecordRequest,
        UpdateRecordRequest,
        FridgeTemperatureInput,
        ErrorDto,
        DuplicateDayDto,
    )),
    tags(
        (name = "fridges", description = "Monitored fridges"),
        (name = "records", description = "Daily temperature records"),
        (name = "system",  description = "System endpoints"),
    ),
    info(
        title = "Fridge Temperature Log API",
        version = "0.1.0",
        description = "REST API for daily fridge temperature records"
    )
)]
pub struct ApiDoc;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use chrono::FixedOffset;
    use serde_json::{json, Value};
    use sqlx::PgPool;

    use crate::api::{router, AppState};
    use crate::db::fixtures;
    use crate::records::LocalZone;

    fn test_server(pool: PgPool) -> TestServer {
        let zone = LocalZone::Fixed(FixedOffset::east_opt(0).unwrap());
        TestServer::new(router(AppState::new(pool, zone))).unwrap()
    }

    struct Seed {
        user: i32,
        fridge_a: i32,
        fridge_b: i32,
    }

    async fn seed(pool: &PgPool) -> Seed {
        Seed {
            user: fixtures::insert_user(pool, "George").await,
            fridge_a: fixtures::insert_fridge(pool, "Fridge A").await,
            fridge_b: fixtures::insert_fridge(pool, "Fridge B").await,
        }
    }

    fn create_body(seed: &Seed, recorded_at: &str) -> Value {
        json!({
            "userId": seed.user,
            "recordedAt": recorded_at,
            "fridgeTemperatures": [
                { "fridgeId": seed.fridge_a, "temperature": 4.0 },
                { "fridgeId": seed.fridge_b, "temperature": 4.5 }
            ]
        })
    }

    // -----------------------------------------------------------------------
    // GET /fridges
    // -----------------------------------------------------------------------

    #[sqlx::test(migrations = "./migrations")]
    async fn fridges_lists_id_and_name(pool: PgPool) {
        let seed = seed(&pool).await;
        let server = test_server(pool);

        let resp = server.get("/fridges").await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(
            body,
            json!([
                { "id": seed.fridge_a, "name": "Fridge A" },
                { "id": seed.fridge_b, "name": "Fridge B" }
            ])
        );
    }

    // -----------------------------------------------------------------------
    // GET /records
    // -----------------------------------------------------------------------

    #[sqlx::test(migrations = "./migrations")]
    async fn records_empty_returns_empty_array(pool: PgPool) {
        let server = test_server(pool);
        let resp = server.get("/records").await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(body, json!([]));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn records_are_newest_first_and_expanded(pool: PgPool) {
        let seed = seed(&pool).await;
        let server = test_server(pool);

        for day in ["2024-01-02", "2024-01-03", "2024-01-01"] {
            server
                .post("/records")
                .json(&create_body(&seed, day))
                .await
                .assert_status(StatusCode::CREATED);
        }

        let resp = server.get("/records").await;
        resp.assert_status_ok();
        let body: Vec<Value> = resp.json();
        assert_eq!(body.len(), 3);

        let dates: Vec<&str> = body.iter().map(|r| r["recordedAt"].as_str().unwrap()).collect();
        assert_eq!(
            dates,
            vec!["2024-01-03T00:00:00Z", "2024-01-02T00:00:00Z", "2024-01-01T00:00:00Z"]
        );

        assert_eq!(body[0]["user"]["name"], "George");
        assert_eq!(body[0]["readings"][0]["fridge"]["name"], "Fridge A");
        assert_eq!(body[0]["readings"][1]["temperature"], 4.5);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn records_honour_user_and_limit(pool: PgPool) {
        let seed = seed(&pool).await;
        let other = fixtures::insert_user(&pool, "Mary").await;
        let server = test_server(pool);

        server.post("/records").json(&create_body(&seed, "2024-01-01")).await;
        server.post("/records").json(&create_body(&seed, "2024-01-02")).await;
        let mut mary = create_body(&seed, "2024-01-05");
        mary["userId"] = json!(other);
        server.post("/records").json(&mary).await;

        let resp = server
            .get("/records")
            .add_query_param("userId", seed.user)
            .add_query_param("limit", 1)
            .await;
        resp.assert_status_ok();
        let body: Vec<Value> = resp.json();
        assert_eq!(body.len(), 1);
        assert_eq!(body[0]["userId"], seed.user);
        assert_eq!(body[0]["recordedAt"], "2024-01-02T00:00:00Z");
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn records_reject_bad_limit(pool: PgPool) {
        let server = test_server(pool);

        server
            .get("/records")
            .add_query_param("limit", 0)
            .await
            .assert_status(StatusCode::BAD_REQUEST);
        server
            .get("/records")
            .add_query_param("limit", "many")
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    // -----------------------------------------------------------------------
    // POST /records
    // -----------------------------------------------------------------------

    #[sqlx::test(migrations = "./migrations")]
    async fn create_returns_new_record_with_readings(pool: PgPool) {
        let seed = seed(&pool).await;
        let server = test_server(pool.clone());

        let resp = server.post("/records").json(&create_body(&seed, "2024-01-01")).await;
        resp.assert_status(StatusCode::CREATED);

        let body: Value = resp.json();
        let record = &body["newRecord"];
        assert_eq!(record["userId"], seed.user);
        assert_eq!(record["readings"].as_array().unwrap().len(), 2);
        assert_eq!(fixtures::count(&pool, "records").await, 1);
        assert_eq!(fixtures::count(&pool, "fridge_temperatures").await, 2);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn create_same_local_day_conflicts(pool: PgPool) {
        let seed = seed(&pool).await;
        let server = test_server(pool.clone());

        let first: Value = server
            .post("/records")
            .json(&create_body(&seed, "2024-01-01"))
            .await
            .json();

        let resp = server
            .post("/records")
            .json(&create_body(&seed, "2024-01-01T23:00:00"))
            .await;
        resp.assert_status(StatusCode::CONFLICT);

        let body: Value = resp.json();
        assert_eq!(body["recordedAt"], first["newRecord"]["recordedAt"]);
        assert_eq!(body["error"], "You have already submitted a record on this date.");
        assert_eq!(fixtures::count(&pool, "records").await, 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn create_rejects_invalid_input(pool: PgPool) {
        let seed = seed(&pool).await;
        let server = test_server(pool.clone());

        let bodies = [
            json!({ "recordedAt": "2024-01-01", "fridgeTemperatures": [{ "fridgeId": seed.fridge_a, "temperature": 4.0 }] }),
            json!({ "userId": seed.user, "fridgeTemperatures": [{ "fridgeId": seed.fridge_a, "temperature": 4.0 }] }),
            json!({ "userId": seed.user, "recordedAt": "2024-01-01", "fridgeTemperatures": [] }),
            json!({ "userId": seed.user, "recordedAt": "2024-01-01", "fridgeTemperatures": "4.0" }),
        ];

        for body in bodies {
            let resp = server.post("/records").json(&body).await;
            resp.assert_status(StatusCode::BAD_REQUEST);
            let err: Value = resp.json();
            assert_eq!(err["error"], "Invalid input");
        }

        let resp = server.post("/records").text("not json").await;
        resp.assert_status(StatusCode::BAD_REQUEST);

        assert_eq!(fixtures::count(&pool, "records").await, 0);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn create_with_unknown_fridge_persists_nothing(pool: PgPool) {
        let seed = seed(&pool).await;
        let server = test_server(pool.clone());

        let mut body = create_body(&seed, "2024-01-01");
        body["fridgeTemperatures"][1]["fridgeId"] = json!(seed.fridge_b + 1000);

        let resp = server.post("/records").json(&body).await;
        resp.assert_status(StatusCode::BAD_REQUEST);
        let err: Value = resp.json();
        assert_eq!(err["error"], "Unknown user or fridge");
        assert_eq!(fixtures::count(&pool, "records").await, 0);
        assert_eq!(fixtures::count(&pool, "fridge_temperatures").await, 0);
    }

    // -----------------------------------------------------------------------
    // PUT /records
    // -----------------------------------------------------------------------

    #[sqlx::test(migrations = "./migrations")]
    async fn update_replaces_readings(pool: PgPool) {
        let seed = seed(&pool).await;
        let server = test_server(pool.clone());

        let created: Value = server
            .post("/records")
            .json(&create_body(&seed, "2024-01-01"))
            .await
            .json();
        let record_id = created["newRecord"]["id"].clone();

        let resp = server
            .put("/records")
            .json(&json!({
                "recordId": record_id,
                "userId": seed.user,
                "recordedAt": "2024-01-01",
                "fridgeTemperatures": [{ "fridgeId": seed.fridge_a, "temperature": 5.0 }]
            }))
            .await;
        resp.assert_status_ok();

        let body: Value = resp.json();
        assert_eq!(body["id"], record_id);
        let readings = body["readings"].as_array().unwrap();
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0]["fridgeId"], seed.fridge_a);
        assert_eq!(readings[0]["temperature"], 5.0);
        assert_eq!(fixtures::count(&pool, "fridge_temperatures").await, 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn update_missing_record_is_404(pool: PgPool) {
        let seed = seed(&pool).await;
        let server = test_server(pool);

        let resp = server
            .put("/records")
            .json(&json!({
                "recordId": 4242,
                "userId": seed.user,
                "recordedAt": "2024-01-01",
                "fridgeTemperatures": [{ "fridgeId": seed.fridge_a, "temperature": 5.0 }]
            }))
            .await;
        resp.assert_status(StatusCode::NOT_FOUND);
        let body: Value = resp.json();
        assert_eq!(body["error"], "Record not found");
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn update_onto_occupied_day_conflicts(pool: PgPool) {
        let seed = seed(&pool).await;
        let server = test_server(pool);

        let first: Value = server
            .post("/records")
            .json(&create_body(&seed, "2024-01-01"))
            .await
            .json();
        let second: Value = server
            .post("/records")
            .json(&create_body(&seed, "2024-01-02"))
            .await
            .json();

        let resp = server
            .put("/records")
            .json(&json!({
                "recordId": second["newRecord"]["id"],
                "userId": seed.user,
                "recordedAt": "2024-01-01T12:00:00",
                "fridgeTemperatures": [{ "fridgeId": seed.fridge_a, "temperature": 5.0 }]
            }))
            .await;
        resp.assert_status(StatusCode::CONFLICT);
        let body: Value = resp.json();
        assert_eq!(body["recordedAt"], first["newRecord"]["recordedAt"]);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn update_requires_every_field(pool: PgPool) {
        let seed = seed(&pool).await;
        let server = test_server(pool);

        let resp = server
            .put("/records")
            .json(&json!({
                "userId": seed.user,
                "recordedAt": "2024-01-01",
                "fridgeTemperatures": [{ "fridgeId": seed.fridge_a, "temperature": 5.0 }]
            }))
            .await;
        resp.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = resp.json();
        assert_eq!(body["error"], "Invalid input. Missing required fields.");
    }

    // -----------------------------------------------------------------------
    // GET /health
    // -----------------------------------------------------------------------

    #[sqlx::test(migrations = "./migrations")]
    async fn health_returns_ok(pool: PgPool) {
        let server = test_server(pool);
        let resp = server.get("/health").await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(body["status"], "ok");
    }

    // -----------------------------------------------------------------------
    // GET /api-docs/openapi.json
    // -----------------------------------------------------------------------

    #[sqlx::test(migrations = "./migrations")]
    async fn openapi_spec_is_served(pool: PgPool) {
        let server = test_server(pool);
        let resp = server.get("/api-docs/openapi.json").await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(body["info"]["title"], "Fridge Temperature Log API");
        assert!(body["paths"]["/records"]["put"].is_object());
    }
}
