use axum::{middleware, Router};
use std::path::Path;
use std::sync::Arc;
use tower_http::services::{ServeDir, ServeFile};

use crate::api;
use crate::clock::Clock;
use crate::config::Config;
use crate::middleware::log_request;
use crate::redirect;
use crate::shortcode::Generator;
use crate::storage::UrlStore;

/// State shared by every handler.
pub struct AppState {
    pub store: Arc<dyn UrlStore>,
    pub generator: Arc<dyn Generator>,
    pub clock: Arc<dyn Clock>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn UrlStore>,
        generator: Arc<dyn Generator>,
        clock: Arc<dyn Clock>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            store,
            generator,
            clock,
            config,
        }
    }
}

/// Assemble the full service: JSON API, redirects and static assets.
pub fn create_app(state: Arc<AppState>) -> Router {
    let static_dir = Path::new(&state.config.frontend.static_dir);
    let static_router = Router::new()
        .route_service("/", ServeFile::new(static_dir.join("index.html")))
        .nest_service("/static", ServeDir::new(static_dir));

    Router::new()
        .merge(api::routes::create_api_router(Arc::clone(&state)))
        .merge(redirect::routes::create_redirect_router(Arc::clone(&state)))
        .merge(static_router)
        .layer(middleware::from_fn(log_request))
}
