use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, HeaderMap, StatusCode},
    Json,
};
use chrono::{DateTime, TimeDelta, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

use crate::app::AppState;
use crate::models::{
    CreateShortUrlRequest, CreateShortUrlResponse, ShortUrl, UpdateShortUrlRequest,
    UrlStatsResponse,
};
use crate::shortcode::{self, ShortcodeError};
use crate::storage::StorageError;

use super::error::ApiError;

pub async fn create_url(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<CreateShortUrlRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateShortUrlResponse>), ApiError> {
    let Json(payload) =
        payload.map_err(|e| ApiError::bad_request("Invalid request body", e.body_text()))?;

    validate_target_url(&payload.url)?;

    let validity_minutes = match payload.validity {
        Some(minutes) if minutes > 0 => minutes,
        _ => state.config.default_validity_minutes,
    };
    let validity = TimeDelta::try_minutes(validity_minutes).ok_or_else(|| {
        ApiError::bad_request("Invalid validity", format!("{validity_minutes} minutes"))
    })?;
    let now = state.clock.now();

    let (short_code, expires_at) = match payload.shortcode.filter(|c| !c.is_empty()) {
        Some(custom) => insert_custom(&state, custom, &payload.url, now, validity)?,
        None => insert_generated(&state, &payload.url, now, validity)?,
    };

    info!(
        short_code = %short_code,
        url = %payload.url,
        validity_minutes,
        "Created short URL"
    );

    let short_link = format!("{}/{}", link_base(&state, &headers), short_code);
    Ok((
        StatusCode::CREATED,
        Json(CreateShortUrlResponse {
            short_link,
            expiry: expires_at,
        }),
    ))
}

pub async fn get_url_stats(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<UrlStatsResponse>, ApiError> {
    let url = state.store.get(&code)?;
    info!(short_code = %code, clicks = url.clicks, "Retrieved URL stats");
    Ok(Json(UrlStatsResponse::from(url)))
}

/// Replace the target and/or expiry of an existing record.
///
/// Expired records can still be edited, which is how an expired link is
/// brought back to life.
pub async fn update_url(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    payload: Result<Json<UpdateShortUrlRequest>, JsonRejection>,
) -> Result<Json<UrlStatsResponse>, ApiError> {
    let Json(payload) =
        payload.map_err(|e| ApiError::bad_request("Invalid request body", e.body_text()))?;

    let mut url = state.store.peek(&code)?;

    if let Some(original_url) = payload.url {
        validate_target_url(&original_url)?;
        url.original_url = original_url;
    }
    if let Some(expires_at) = payload.expires_at {
        if expires_at <= url.created_at {
            return Err(ApiError::bad_request(
                "Invalid expiry",
                "expiresAt must be after createdAt",
            ));
        }
        url.expires_at = expires_at;
    }

    state.store.update(url)?;
    info!(short_code = %code, "Updated short URL");
    Ok(Json(UrlStatsResponse::from(state.store.peek(&code)?)))
}

pub async fn delete_url(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.store.delete(&code)?;
    info!(short_code = %code, "Deleted short URL");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "OK" }))
}

/// Accept only absolute http(s) URLs with a host.
fn validate_target_url(raw: &str) -> Result<(), ApiError> {
    if raw.is_empty() {
        return Err(ApiError::bad_request("Invalid URL format", "url is required"));
    }

    let parsed =
        Url::parse(raw).map_err(|e| ApiError::bad_request("Invalid URL format", e.to_string()))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ApiError::bad_request(
            "Invalid URL format",
            format!("unsupported scheme: {}", parsed.scheme()),
        ));
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(ApiError::bad_request("Invalid URL format", "missing host"));
    }

    Ok(())
}

fn new_record(
    code: String,
    original_url: &str,
    now: DateTime<Utc>,
    validity: TimeDelta,
) -> Result<ShortUrl, ApiError> {
    ShortUrl::new(code, original_url.to_string(), now, validity)
        .ok_or_else(|| ApiError::bad_request("Invalid validity", "expiry out of range"))
}

fn insert_custom(
    state: &AppState,
    code: String,
    original_url: &str,
    now: DateTime<Utc>,
    validity: TimeDelta,
) -> Result<(String, DateTime<Utc>), ApiError> {
    if !shortcode::validate(&code) {
        return Err(ShortcodeError::InvalidInput(format!(
            "shortcode must be 1-{} characters of [A-Za-z0-9_-]",
            shortcode::MAX_LENGTH
        ))
        .into());
    }
    // Fast path; the create below is still the authority when two requests race.
    if state.store.exists(&code) {
        return Err(StorageError::AlreadyExists(code).into());
    }

    let record = new_record(code.clone(), original_url, now, validity)?;
    let expires_at = record.expires_at;
    state.store.create(record)?;
    Ok((code, expires_at))
}

fn insert_generated(
    state: &AppState,
    original_url: &str,
    now: DateTime<Utc>,
    validity: TimeDelta,
) -> Result<(String, DateTime<Utc>), ApiError> {
    let max_attempts = state.config.shortcode.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        let code = state.generator.generate()?;
        let record = new_record(code.clone(), original_url, now, validity)?;
        let expires_at = record.expires_at;

        match state.store.create(record) {
            Ok(()) => return Ok((code, expires_at)),
            Err(StorageError::AlreadyExists(_)) => {
                debug!(attempt, short_code = %code, "Generated shortcode collided");
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(ApiError::internal(
        "Failed to generate unique shortcode",
        format!("no free shortcode after {max_attempts} attempts"),
    ))
}

fn link_base(state: &AppState, headers: &HeaderMap) -> String {
    if let Some(base) = &state.config.base_url {
        return base.trim_end_matches('/').to_string();
    }

    match headers.get(header::HOST).and_then(|v| v.to_str().ok()) {
        Some(host) if !host.is_empty() => format!("http://{host}"),
        _ => format!("http://localhost:{}", state.config.server.port),
    }
}
