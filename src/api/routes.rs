use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::app::AppState;

use super::handlers::{create_url, delete_url, get_url_stats, health_check, update_url};

pub fn create_api_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/shorturls", post(create_url))
        .route(
            "/shorturls/{code}",
            get(get_url_stats).put(update_url).delete(delete_url),
        )
        .with_state(state)
}
