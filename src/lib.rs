pub mod api;
pub mod app;
pub mod clock;
pub mod config;
pub mod logging;
pub mod middleware;
pub mod models;
pub mod redirect;
pub mod shortcode;
pub mod storage;

pub use app::{create_app, AppState};
