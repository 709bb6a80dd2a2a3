use axum::{
    extract::State,
    http::{HeaderValue, StatusCode},
    response::Html,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::{collections::HashSet, sync::Arc};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    config::{AdminConfig, Config},
    error::{ApiError, ConfigError, StoreError},
    extract::{JsonBody, Year},
    scores::{parse_external_scores, to_json_map},
    store::{DocumentKind, DocumentStore},
    types::{FantasyScoreDocument, LoginRequest, LoginResponse},
};

const DEFAULT_INDEX: &str = include_str!("../templates/index.html");

// ---------- Server state ----------

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<DocumentStore>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            store: Arc::new(DocumentStore::new(&config.data_dir)),
            config: Arc::new(config),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "ignoring unparsable CORS origin");
                None
            }
        })
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/login", post(login))
        .route(
            "/team_mapping/:year",
            get(get_team_mapping).post(post_team_mapping).delete(delete_team_mapping),
        )
        .route(
            "/driver_mapping/:year",
            get(get_driver_mapping).post(post_driver_mapping).delete(delete_driver_mapping),
        )
        .route(
            "/schedule/:year",
            get(get_schedule).post(post_schedule).delete(delete_schedule),
        )
        .route(
            "/fantasy_scores/:year",
            get(get_fantasy_scores).post(post_fantasy_scores).delete(delete_fantasy_scores),
        )
        .route("/fantasy_scores/:year/external", post(import_external_scores))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Runs a store operation on the blocking pool, keeping file I/O and the
/// writer lock off the async workers.
async fn with_store<T, F>(state: &AppState, op: F) -> Result<T, ApiError>
where
    F: FnOnce(&DocumentStore) -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    let store = Arc::clone(&state.store);
    Ok(tokio::task::spawn_blocking(move || op(&store)).await??)
}

// ---------- Pages ----------

async fn index(State(state): State<AppState>) -> Result<Html<String>, ApiError> {
    let Some(path) = state.config.index_template.as_ref() else {
        return Ok(Html(DEFAULT_INDEX.to_string()));
    };
    let page = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Read { path: path.clone(), source })?;
    Ok(Html(page))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn login(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<(StatusCode, Json<LoginResponse>), ApiError> {
    let path = state.config.admin_config.clone();
    let Some(admin) = tokio::task::spawn_blocking(move || AdminConfig::load(&path)).await?? else {
        return Ok(denied(Some("No config file found")));
    };
    let Some(expected_pass) = admin.admin_pass.as_deref() else {
        return Ok(denied(Some("No password set in config")));
    };

    let user_ok = req.username.as_deref() == Some(admin.admin_user.as_str());
    let pass_ok = req.password.as_deref() == Some(expected_pass);
    if user_ok && pass_ok {
        tracing::info!(user = %admin.admin_user, "admin login");
        Ok((StatusCode::OK, Json(LoginResponse { success: true, error: None })))
    } else {
        tracing::warn!(user = ?req.username, "rejected login");
        Ok(denied(None))
    }
}

fn denied(error: Option<&'static str>) -> (StatusCode, Json<LoginResponse>) {
    (StatusCode::UNAUTHORIZED, Json(LoginResponse { success: false, error }))
}

// ---------- Team mapping ----------

async fn get_team_mapping(
    State(state): State<AppState>,
    Year(year): Year,
) -> Result<Json<Value>, ApiError> {
    Ok(Json(with_store(&state, move |store| store.team_mapping(year)).await?))
}

async fn post_team_mapping(
    State(state): State<AppState>,
    Year(year): Year,
    JsonBody(body): JsonBody<Value>,
) -> Result<StatusCode, ApiError> {
    validate_team_mapping(&body)?;
    with_store(&state, move |store| store.save(DocumentKind::TeamMapping, year, &body)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_team_mapping(
    State(state): State<AppState>,
    Year(year): Year,
) -> Result<StatusCode, ApiError> {
    with_store(&state, move |store| store.delete(DocumentKind::TeamMapping, year)).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn validate_team_mapping(body: &Value) -> Result<(), ApiError> {
    let teams = body
        .as_array()
        .ok_or_else(|| ApiError::bad_request("Teams must be a JSON list of objects"))?;
    let mut seen = HashSet::new();
    for team in teams {
        let (Some(_), Some(id)) = (team.get("name"), team.get("id")) else {
            return Err(ApiError::bad_request(
                "Each team must be an object with 'name' and 'id' keys",
            ));
        };
        if !seen.insert(id.to_string()) {
            return Err(ApiError::bad_request(format!("Duplicate team id {id}")));
        }
    }
    Ok(())
}

// ---------- Driver mapping ----------

async fn get_driver_mapping(
    State(state): State<AppState>,
    Year(year): Year,
) -> Result<Json<Value>, ApiError> {
    Ok(Json(with_store(&state, move |store| store.driver_mapping(year)).await?))
}

async fn post_driver_mapping(
    State(state): State<AppState>,
    Year(year): Year,
    JsonBody(body): JsonBody<Value>,
) -> Result<StatusCode, ApiError> {
    validate_driver_mapping(&body)?;
    with_store(&state, move |store| store.save(DocumentKind::DriverMapping, year, &body)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_driver_mapping(
    State(state): State<AppState>,
    Year(year): Year,
) -> Result<StatusCode, ApiError> {
    with_store(&state, move |store| store.delete(DocumentKind::DriverMapping, year)).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn validate_driver_mapping(body: &Value) -> Result<(), ApiError> {
    let drivers = body
        .as_object()
        .ok_or_else(|| ApiError::bad_request("Mapping must be a JSON object"))?;
    let well_formed = drivers
        .values()
        .all(|d| d.get("name").is_some() && d.get("team_id").is_some());
    if !well_formed {
        return Err(ApiError::bad_request(
            "Each driver must be an object with 'name' and 'team_id' keys",
        ));
    }
    Ok(())
}

// ---------- Schedule ----------

async fn get_schedule(
    State(state): State<AppState>,
    Year(year): Year,
) -> Result<Json<Value>, ApiError> {
    Ok(Json(with_store(&state, move |store| store.load(DocumentKind::Schedule, year)).await?))
}

async fn post_schedule(
    State(state): State<AppState>,
    Year(year): Year,
    JsonBody(body): JsonBody<Value>,
) -> Result<StatusCode, ApiError> {
    with_store(&state, move |store| store.save(DocumentKind::Schedule, year, &body)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_schedule(
    State(state): State<AppState>,
    Year(year): Year,
) -> Result<StatusCode, ApiError> {
    with_store(&state, move |store| store.delete(DocumentKind::Schedule, year)).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------- Fantasy scores ----------

async fn get_fantasy_scores(
    State(state): State<AppState>,
    Year(year): Year,
) -> Result<Json<Value>, ApiError> {
    Ok(Json(with_store(&state, move |store| store.load(DocumentKind::FantasyScores, year)).await?))
}

async fn post_fantasy_scores(
    State(state): State<AppState>,
    Year(year): Year,
    JsonBody(body): JsonBody<Value>,
) -> Result<StatusCode, ApiError> {
    let Value::Object(partial) = body else {
        return Err(ApiError::bad_request("Fantasy scores must be a JSON object"));
    };
    with_store(&state, move |store| store.merge(DocumentKind::FantasyScores, year, partial)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_fantasy_scores(
    State(state): State<AppState>,
    Year(year): Year,
) -> Result<StatusCode, ApiError> {
    with_store(&state, move |store| store.delete(DocumentKind::FantasyScores, year)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Converts an external statistics export and merges the result into the
/// season's scores. Responds with the converted races.
async fn import_external_scores(
    State(state): State<AppState>,
    Year(year): Year,
    JsonBody(body): JsonBody<Value>,
) -> Result<Json<FantasyScoreDocument>, ApiError> {
    let parsed = parse_external_scores(&body)?;
    if parsed.is_empty() {
        return Err(ApiError::EmptyScores);
    }
    let patch = to_json_map(&parsed);
    with_store(&state, move |store| store.merge(DocumentKind::FantasyScores, year, patch)).await?;
    tracing::info!(year, races = parsed.len(), "imported external scores");
    Ok(Json(parsed))
}
