use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use fleeting_common::{
    Availability, ClockOverride, CreatePaste, CreatedPaste, ErrorBody, Health, PasteId, PasteView,
    Unavailability, UnavailableBody, Url, HEALTH_PATH, PASTES_PATH, SHARE_PATH,
};
use headers::HeaderMapExt;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::clock::Clock;
use crate::engine::{self, Engine};
use crate::error::{CreateError, StoreError, ValidationError};

#[derive(Clone)]
pub struct AppState {
    pub engine: Engine,
    pub clock: Arc<dyn Clock>,
    pub public_url: Url,
    /// Honour [`ClockOverride`] headers. Test deployments only.
    pub allow_clock_override: bool,
}

impl AppState {
    fn now(&self, headers: &HeaderMap) -> DateTime<Utc> {
        if self.allow_clock_override {
            if let Some(ClockOverride(now)) = headers.typed_get::<ClockOverride>() {
                return now;
            }
        }

        self.clock.now()
    }

    fn share_url(&self, id: PasteId) -> String {
        format!(
            "{}{}/{}",
            self.public_url.as_str().trim_end_matches('/'),
            SHARE_PATH,
            id
        )
    }
}

pub fn router(state: AppState) -> Router {
    // JSON escaping can blow a string up to six times its size.
    let body_limit = state
        .engine
        .max_content_bytes()
        .saturating_mul(6)
        .saturating_add(4096);

    Router::new()
        .route(PASTES_PATH, post(create))
        .route(&format!("{PASTES_PATH}/:id"), get(view))
        .route(&format!("{PASTES_PATH}/:id/availability"), get(availability))
        .route(HEALTH_PATH, get(health))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("{0}")]
    Unavailable(Unavailability),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<CreateError> for ApiError {
    fn from(e: CreateError) -> Self {
        match e {
            CreateError::Invalid(e) => Self::Invalid(e),
            CreateError::Store(e) => Self::Store(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Invalid(e) => {
                let status = match e {
                    ValidationError::ContentTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                    _ => StatusCode::BAD_REQUEST,
                };
                let body = ErrorBody {
                    error: "Invalid request".to_string(),
                    message: e.to_string(),
                };
                (status, Json(body)).into_response()
            }
            Self::Unavailable(reason) => {
                (StatusCode::NOT_FOUND, Json(UnavailableBody::from(reason))).into_response()
            }
            Self::Store(e) => {
                error!("Paste store failed: {}", e);
                let body = ErrorBody {
                    error: "Internal server error".to_string(),
                    message: "The paste store could not handle this request.".to_string(),
                };
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
        }
    }
}

fn parse_id(raw: &str) -> Result<PasteId, ApiError> {
    raw.parse().map_err(|e| ValidationError::from(e).into())
}

#[instrument(skip(state, headers, body), err)]
async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<CreatePaste>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatedPaste>), ApiError> {
    let Json(req) = body.map_err(|e| ValidationError::MalformedBody(e.body_text()))?;
    let now = state.now(&headers);

    let paste = state
        .engine
        .create(req.content, req.ttl_seconds, req.max_views, now)
        .await?;

    info!(id = %paste.id, ttl = ?paste.ttl_seconds, max_views = ?paste.max_views, "paste created");

    let created = CreatedPaste {
        url: state.share_url(paste.id),
        id: paste.id,
    };
    Ok((StatusCode::CREATED, Json(created)))
}

#[instrument(skip(state, headers))]
async fn view(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    let now = state.now(&headers);

    if let Some(paste) = state.engine.try_consume(id, now).await? {
        debug!(%id, views = paste.view_count, "paste viewed");
        let view = PasteView {
            remaining_views: engine::remaining_views(&paste),
            expires_at: paste.expires_at,
            content: paste.content,
        };
        return Ok(([(header::CACHE_CONTROL, "no-store")], Json(view)).into_response());
    }

    let reason = state.engine.diagnose_unavailability(id, now).await?;
    debug!(%id, ?reason, "paste unavailable");
    Err(ApiError::Unavailable(reason))
}

/// Reports whether a view would currently succeed, without consuming one.
#[instrument(skip(state, headers))]
async fn availability(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Availability>, ApiError> {
    let id = parse_id(&id)?;
    let now = state.now(&headers);
    let paste = state.engine.find(id).await?;

    Ok(Json(Availability {
        available: engine::is_available(paste.as_ref(), now),
        remaining_views: paste.as_ref().and_then(engine::remaining_views),
        expires_at: paste.and_then(|paste| paste.expires_at),
    }))
}

async fn health(State(state): State<AppState>) -> (StatusCode, Json<Health>) {
    match state.engine.ping().await {
        Ok(()) => (StatusCode::OK, Json(Health { ok: true })),
        Err(e) => {
            warn!("Health check failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, Json(Health { ok: false }))
        }
    }
}
