//! HTTP inbound adapter.
//!
//! Clients submit a multipart upload, poll the returned ticket and download
//! the encoded mp4 exactly once.

mod error;
mod form;
mod handlers;
mod upload;


pub use error::ApiError;

use crate::application::jobs::JobService;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Build the application router. `upload_form` adds a browser form at `/`.
pub fn router(jobs: Arc<JobService>, upload_form: bool) -> Router {
    let mut router = Router::new()
        .route("/encode/start", post(handlers::start))
        .route("/encode/status/:ticket_id", get(handlers::status))
        .route("/encode/result/:ticket_id", get(handlers::result));

    if upload_form {
        router = router.route("/", get(form::upload_form));
    }

    router
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http())
        .with_state(jobs)
}
