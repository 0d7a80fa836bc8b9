//! HTTP plant server.
//!
//! Exposes a `PlantRepository` over the JSON API consumed by
//! `HttpPlantApi`.
//!
//! # Endpoints
//!
//! - `GET /health`: Health check (no auth required)
//! - `GET /plants`: All plants, in insertion order
//! - `GET /plants/{guid}`: A single plant
//! - `POST /plants`: Create a plant
//! - `PUT /plants/{guid}`: Replace (or create) a plant
//! - `POST /plants/delete`: Delete a batch, body `{"guids": [...]}`
//!
//! When an API key is configured every `/plants` route requires
//! `Authorization: Bearer <key>`.

use axum::{
    extract::{DefaultBodyLimit, Path, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::api::DeleteRequest;
use crate::db::PlantRepository;
use crate::error::SyncError;
use crate::models::PlantDescriptor;

/// Largest accepted request body. Plant photos arrive base64 encoded inside
/// the JSON body.
pub const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    repo: PlantRepository,
    api_key: Option<Arc<str>>,
}

impl AppState {
    pub fn new(repo: PlantRepository, api_key: Option<String>) -> Self {
        Self {
            repo,
            api_key: api_key.map(Arc::from),
        }
    }
}

/// Builds the plant server router.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new().route("/health", get(health));

    let plant_routes = Router::new()
        .route("/plants", get(list_plants).post(create_plant))
        .route("/plants/delete", post(delete_plants))
        .route("/plants/{guid}", get(get_plant).put(update_plant))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(plant_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

// ============================================================================
// Errors
// ============================================================================

/// Error response body
#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

struct ApiFailure {
    status: StatusCode,
    error: &'static str,
    message: String,
}

impl ApiFailure {
    fn new(status: StatusCode, error: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            error,
            message: message.into(),
        }
    }
}

impl From<SyncError> for ApiFailure {
    fn from(err: SyncError) -> Self {
        match &err {
            SyncError::Database(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                ApiFailure::new(StatusCode::CONFLICT, "duplicate_guid", err.to_string())
            }
            _ => {
                tracing::error!("Plant request failed: {}", err);
                ApiFailure::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal",
                    err.to_string(),
                )
            }
        }
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.error,
                message: self.message,
            }),
        )
            .into_response()
    }
}

// ============================================================================
// Authentication
// ============================================================================

async fn auth_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let expected = match &state.api_key {
        Some(key) => key,
        None => return next.run(request).await,
    };

    let key_matches = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|key| key == &**expected);

    match key_matches {
        Some(true) => next.run(request).await,
        Some(false) => {
            ApiFailure::new(StatusCode::UNAUTHORIZED, "invalid_key", "Invalid API key")
                .into_response()
        }
        None => ApiFailure::new(
            StatusCode::UNAUTHORIZED,
            "missing_auth",
            "Authorization header with Bearer scheme required",
        )
        .into_response(),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn list_plants(
    State(state): State<AppState>,
) -> Result<Json<Vec<PlantDescriptor>>, ApiFailure> {
    Ok(Json(state.repo.list().await?))
}

async fn get_plant(
    State(state): State<AppState>,
    Path(guid): Path<String>,
) -> Result<Json<PlantDescriptor>, ApiFailure> {
    match state.repo.get(&guid).await? {
        Some(plant) => Ok(Json(plant)),
        None => Err(ApiFailure::new(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("Plant not found: {}", guid),
        )),
    }
}

async fn create_plant(
    State(state): State<AppState>,
    Json(plant): Json<PlantDescriptor>,
) -> Result<StatusCode, ApiFailure> {
    state.repo.insert(&plant).await?;
    tracing::info!("Created plant {}", plant.guid);
    Ok(StatusCode::CREATED)
}

async fn update_plant(
    State(state): State<AppState>,
    Path(guid): Path<String>,
    Json(plant): Json<PlantDescriptor>,
) -> Result<StatusCode, ApiFailure> {
    if plant.guid != guid {
        return Err(ApiFailure::new(
            StatusCode::BAD_REQUEST,
            "guid_mismatch",
            format!("Body guid {} does not match path {}", plant.guid, guid),
        ));
    }
    state.repo.upsert(&plant).await?;
    tracing::info!("Updated plant {}", guid);
    Ok(StatusCode::NO_CONTENT)
}

/// Batch delete response
#[derive(Serialize)]
struct DeleteResponse {
    removed: u64,
}

async fn delete_plants(
    State(state): State<AppState>,
    Json(request): Json<DeleteRequest>,
) -> Result<Json<DeleteResponse>, ApiFailure> {
    let removed = state.repo.delete_many(&request.guids).await?;
    tracing::info!(
        "Deleted {} plant(s) of {} requested",
        removed,
        request.guids.len()
    );
    Ok(Json(DeleteResponse { removed }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{LoadOptions, PlantSyncActions};
    use crate::api::{check_server, HttpPlantApi, PlantApi};
    use crate::db::init_db;
    use crate::encoding::TextEncodedStorage;
    use crate::models::{NewPlant, PlantPatch, StoredImage};
    use crate::orientation::Passthrough;
    use crate::store::PlantStore;
    use serde_json::json;
    use tempfile::TempDir;

    struct TestServer {
        url: String,
        repo: PlantRepository,
        _temp_dir: TempDir, // Keep alive for duration of test
    }

    async fn spawn_server(api_key: Option<&str>) -> TestServer {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_db(&temp_dir.path().join("server.db")).await.unwrap();
        let repo = PlantRepository::new(pool);
        let app = router(AppState::new(repo.clone(), api_key.map(String::from)));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        TestServer {
            url: format!("http://{}", addr),
            repo,
            _temp_dir: temp_dir,
        }
    }

    fn descriptor(guid: &str) -> PlantDescriptor {
        serde_json::from_value(json!({
            "guid": guid,
            "created": 1,
            "modified": 2,
            "name": format!("plant {}", guid)
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let server = spawn_server(Some("key")).await;
        assert!(check_server(&server.url).await);
    }

    #[tokio::test]
    async fn test_http_api_crud() {
        let server = spawn_server(None).await;
        let api = HttpPlantApi::new(&server.url, None);

        api.add_plant(&descriptor("a")).await.unwrap();
        api.add_plant(&descriptor("b")).await.unwrap();

        let mut updated = descriptor("a");
        updated.blob = Some(StoredImage::Base64("AQID".to_string()));
        api.update_plant(&updated).await.unwrap();

        api.delete_plants(&["b".to_string(), "zzz".to_string()])
            .await
            .unwrap();

        let plants = api.fetch_plants().await.unwrap();
        assert_eq!(plants, vec![updated]);
    }

    #[tokio::test]
    async fn test_update_guid_with_reserved_url_characters() {
        let server = spawn_server(None).await;
        let api = HttpPlantApi::new(&server.url, None);

        let guid = "shelf/2?pot#1";
        api.add_plant(&descriptor(guid)).await.unwrap();

        let mut updated = descriptor(guid);
        updated.fields.insert("location".into(), json!("hallway"));
        api.update_plant(&updated).await.unwrap();

        assert_eq!(server.repo.get(guid).await.unwrap(), Some(updated));
        assert_eq!(server.repo.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_add_is_conflict() {
        let server = spawn_server(None).await;
        let api = HttpPlantApi::new(&server.url, None);

        api.add_plant(&descriptor("a")).await.unwrap();
        let err = api.add_plant(&descriptor("a")).await.unwrap_err();
        assert_eq!(err.status(), Some(409));
    }

    #[tokio::test]
    async fn test_guid_mismatch_is_bad_request() {
        let server = spawn_server(None).await;
        let response = reqwest::Client::new()
            .put(format!("{}/plants/other", server.url))
            .json(&descriptor("a"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 400);
    }

    #[tokio::test]
    async fn test_get_missing_plant_is_not_found() {
        let server = spawn_server(None).await;
        let response = reqwest::get(format!("{}/plants/missing", server.url))
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 404);
    }

    #[tokio::test]
    async fn test_api_key_required_when_configured() {
        let server = spawn_server(Some("secret")).await;

        let anonymous = HttpPlantApi::new(&server.url, None);
        let err = anonymous.fetch_plants().await.unwrap_err();
        assert_eq!(err.status(), Some(401));

        let wrong = HttpPlantApi::new(&server.url, Some("nope".to_string()));
        let err = wrong.fetch_plants().await.unwrap_err();
        assert!(err.to_string().contains("Invalid API key"));

        let authorized = HttpPlantApi::new(&server.url, Some("secret".to_string()));
        assert!(authorized.fetch_plants().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_large_photo_over_http() {
        let server = spawn_server(None).await;
        let actions = PlantSyncActions::new(
            Arc::new(HttpPlantApi::new(&server.url, None)),
            Arc::new(PlantStore::new()),
        )
        .with_normalizer(Box::new(Passthrough));

        let photo: Vec<u8> = (0..4 * 1024 * 1024).map(|i| (i % 251) as u8).collect();
        let guid = actions
            .add_plant(NewPlant::new().with_blob(photo.clone()))
            .await
            .unwrap();

        let stored = server.repo.get(&guid).await.unwrap().unwrap();
        assert_eq!(stored.blob, Some(StoredImage::Binary(photo)));
    }

    #[tokio::test]
    async fn test_actions_over_http_with_text_storage() {
        let server = spawn_server(None).await;
        let api = Arc::new(HttpPlantApi::new(&server.url, None));
        let store = Arc::new(PlantStore::new());
        let actions = PlantSyncActions::new(api, store.clone())
            .with_encoding(Box::new(TextEncodedStorage))
            .with_normalizer(Box::new(Passthrough));

        let guid = actions
            .add_plant(
                NewPlant::new()
                    .with_field("name", "Monstera")
                    .with_blob(vec![1, 2, 3]),
            )
            .await
            .unwrap();
        actions
            .update_plant(PlantPatch::new(&guid).set("location", "office"))
            .await
            .unwrap();

        // The server holds base64 text
        let stored = server.repo.get(&guid).await.unwrap().unwrap();
        assert_eq!(stored.blob, Some(StoredImage::Base64("AQID".to_string())));
        assert_eq!(stored.fields.get("location"), Some(&json!("office")));

        // A fresh client sees binary again
        let other = PlantSyncActions::new(
            Arc::new(HttpPlantApi::new(&server.url, None)),
            Arc::new(PlantStore::new()),
        );
        other.load_plants(LoadOptions::default()).await.unwrap();
        let loaded = other.store().find(&guid).await.unwrap();
        assert_eq!(loaded.blob, Some(vec![1, 2, 3]));
        assert_eq!(loaded, store.find(&guid).await.unwrap());
    }
}
