use axum::{
    extract::{ConnectInfo, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use std::sync::Arc;

use super::client_ip::{coarse_location, extract_client_ip};
use crate::api::ApiError;
use crate::app::AppState;
use crate::models::Click;

/// Redirect to the original URL and record the access.
///
/// The click is written by a detached task; the redirect never waits on it
/// and a failed write is only logged.
pub async fn redirect_url(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let url = state.store.get(&code)?;

    let client_ip = extract_client_ip(&headers, addr.ip(), &state.config.client_ip);
    let click = Click {
        timestamp: state.clock.now(),
        referrer: header_value(&headers, header::REFERER),
        location: coarse_location(client_ip),
        user_agent: header_value(&headers, header::USER_AGENT),
    };

    let store = Arc::clone(&state.store);
    let short_code = code.clone();
    tokio::spawn(async move {
        if let Err(err) = store.record_click(&short_code, click) {
            tracing::warn!(short_code = %short_code, error = %err, "failed to record click");
        }
    });

    tracing::info!(short_code = %code, url = %url.original_url, "Redirecting to original URL");

    Ok((StatusCode::FOUND, [(header::LOCATION, url.original_url)]).into_response())
}

fn header_value(headers: &HeaderMap, name: header::HeaderName) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}
