//! HTTP route handlers.

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::{HeaderName, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::store::{NewReview, StoreError};
use crate::timetable::{DataSource, Sourced};

use super::dto::*;
use super::state::AppState;

/// Header naming where the response data came from.
pub const DATA_SOURCE_HEADER: HeaderName = HeaderName::from_static("x-data-source");

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/stasiun", get(all_stations))
        .route("/api/schedules", get(all_schedules))
        .route("/api/schedules/:id", get(schedules_by_station))
        .route("/api/schedules/:id/:arah", get(schedules_by_station_and_direction))
        .route("/api/v1/reviews", get(all_reviews).post(create_review))
        .route("/api/refresh/status", get(refresh_status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// JSON body tagged with its `X-Data-Source`.
fn sourced<T: Serialize>(source: DataSource, body: T) -> Response {
    (
        [(DATA_SOURCE_HEADER, source.header_value())],
        Json(body),
    )
        .into_response()
}

fn parse_station_id(raw: &str) -> Result<u32, AppError> {
    raw.trim().parse().map_err(|_| AppError::BadRequest {
        message: format!("Invalid station id: {raw}"),
    })
}

async fn all_stations(State(state): State<AppState>) -> Result<Response, AppError> {
    let Sourced { data, source } = state.timetable.get_all_stations().await?;
    let stations: Vec<StationResult> = data.iter().map(StationResult::from).collect();
    Ok(sourced(source, stations))
}

async fn all_schedules(State(state): State<AppState>) -> Result<Response, AppError> {
    let Sourced { data, source } = state.timetable.get_all_schedules().await?;
    let schedules: Vec<ScheduleResult> = data.iter().map(ScheduleResult::from).collect();
    Ok(sourced(source, schedules))
}

async fn schedules_by_station(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let station_id = parse_station_id(&id)?;
    let Sourced { data, source } = state.timetable.get_schedules_by_station(station_id).await?;
    let schedules: Vec<ScheduleResult> = data.iter().map(ScheduleResult::from).collect();
    Ok(sourced(source, schedules))
}

async fn schedules_by_station_and_direction(
    State(state): State<AppState>,
    Path((id, arah)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let station_id = parse_station_id(&id)?;
    let Sourced { data, source } = state
        .timetable
        .get_schedules_by_station_and_direction(station_id, &arah)
        .await?;
    let schedules: Vec<ScheduleResult> = data.iter().map(ScheduleResult::from).collect();
    Ok(sourced(source, schedules))
}

async fn all_reviews(State(state): State<AppState>) -> Result<Json<Vec<ReviewResult>>, AppError> {
    let reviews = state.store.all_reviews().await?;
    Ok(Json(reviews.iter().map(ReviewResult::from).collect()))
}

async fn create_review(
    State(state): State<AppState>,
    body: Result<Json<NewReview>, JsonRejection>,
) -> Result<(StatusCode, Json<ReviewResult>), AppError> {
    let Json(review) = body.map_err(|e| AppError::BadRequest {
        message: e.body_text(),
    })?;

    let created = state
        .store
        .create_review(&review, state.clock.now())
        .await?;
    Ok((StatusCode::CREATED, Json(ReviewResult::from(&created))))
}

async fn refresh_status(State(state): State<AppState>) -> Json<RefreshStatusResponse> {
    let last = state.refresher.last_run();
    Json(RefreshStatusResponse::new(
        state.refresher.current_stage(),
        last.as_ref(),
    ))
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    BadRequest { message: String },
    ServiceUnavailable { message: String },
    Internal { message: String },
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Unavailable(_) => AppError::ServiceUnavailable {
                message: e.to_string(),
            },
            StoreError::UserNotFound(_) => AppError::BadRequest {
                message: e.to_string(),
            },
            _ => AppError::Internal {
                message: e.to_string(),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest { message } => (StatusCode::BAD_REQUEST, message),
            AppError::ServiceUnavailable { message } => (StatusCode::SERVICE_UNAVAILABLE, message),
            AppError::Internal { message } => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };

        if status.is_server_error() {
            error!(%status, %message, "Request failed");
        } else {
            warn!(%status, %message, "Request rejected");
        }

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use chrono::{TimeZone, Utc};
    use tower::ServiceExt;

    use super::*;
    use crate::cache::{CacheConfig, QueryCache};
    use crate::domain::{Clock, DepartureTime, LoadedSchedule, ManualClock, Station};
    use crate::refresh::{RefreshConfig, Refresher};
    use crate::scrape::PageSource;
    use crate::staging::Staging;
    use crate::store::Store;
    use crate::timetable::CachedTimetable;

    async fn app(dir: &std::path::Path) -> (Router, Store) {
        let store = Store::in_memory().await.unwrap();
        store.init_schema().await.unwrap();
        store.insert_stations(&[Station::new(1, "Lebak Bulus")]).await.unwrap();
        store
            .insert_schedules(&[LoadedSchedule {
                station_id: 1,
                station_name: "Lebak Bulus".into(),
                direction: "Bundaran HI".into(),
                departure: DepartureTime::parse_hhmm("05:00").unwrap(),
            }])
            .await
            .unwrap();

        // Monday morning in Jakarta
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 6, 2, 2, 0, 0).unwrap(),
        ));
        let cache = QueryCache::new(&CacheConfig::default(), clock.clone());
        let timetable = CachedTimetable::new(
            store.clone(),
            cache.clone(),
            clock.clone(),
            chrono_tz::Asia::Jakarta,
        );
        let refresher = Refresher::new(
            PageSource::from_html(""),
            Staging::new(dir),
            store.clone(),
            RefreshConfig::default(),
            clock.clone(),
        )
        .with_cache(cache);

        let state = AppState::new(
            Arc::new(timetable),
            Arc::new(refresher),
            store.clone(),
            clock,
        );
        (create_router(state), store)
    }

    async fn get(app: &Router, uri: &str) -> Response {
        app.clone()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn stations_carry_data_source() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = app(dir.path()).await;

        let first = get(&app, "/api/stasiun").await;
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(first.headers()[&DATA_SOURCE_HEADER], "API");
        assert_eq!(
            json(first).await,
            serde_json::json!([{"id": 1, "stasiun_name": "Lebak Bulus"}])
        );

        let second = get(&app, "/api/stasiun").await;
        assert_eq!(second.headers()[&DATA_SOURCE_HEADER], "Cache");
    }

    #[tokio::test]
    async fn direction_path_is_decoded() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = app(dir.path()).await;

        let response = get(&app, "/api/schedules/1/Bundaran%20HI").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        assert_eq!(body[0]["jadwal"], "05:00");
        assert_eq!(body[0]["arah"], "Bundaran HI");
    }

    #[tokio::test]
    async fn unknown_station_is_empty_list() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = app(dir.path()).await;

        let response = get(&app, "/api/schedules/99").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await, serde_json::json!([]));
    }

    #[tokio::test]
    async fn bad_station_id_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = app(dir.path()).await;

        let response = get(&app, "/api/schedules/abc").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn closed_store_is_service_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let (app, store) = app(dir.path()).await;
        store.pool().close().await;

        let response = get(&app, "/api/schedules").await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn review_for_unknown_user_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let (app, store) = app(dir.path()).await;

        let request = |user_id: i64| {
            Request::post("/api/v1/reviews")
                .header("content-type", "application/json")
                .body(Body::from(
                    serde_json::json!({"user_id": user_id, "rating": 5.0, "comment": "tepat waktu"})
                        .to_string(),
                ))
                .unwrap()
        };

        let response = app.clone().oneshot(request(42)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let user = store.insert_user("sari", "hash", "user").await.unwrap();
        let response = app.clone().oneshot(request(user)).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let listed = json(get(&app, "/api/v1/reviews").await).await;
        assert_eq!(listed[0]["comment"], "tepat waktu");
    }

    #[tokio::test]
    async fn refresh_status_before_first_run() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = app(dir.path()).await;

        let body = json(get(&app, "/api/refresh/status").await).await;
        assert_eq!(body["running"], false);
        assert_eq!(body["last_run"], serde_json::Value::Null);
    }
}
