use crate::application::jobs::SubmitError;
use crate::domain::jobs::JobError;
use crate::ports::queue::QueueError;
use crate::ports::storage::StorageError;
use axum::extract::multipart::MultipartError;
use axum::http::header::InvalidHeaderValue;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Everything a handler can fail with. Rendered as `{"error": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Job(#[from] JobError),
    #[error(transparent)]
    Submit(#[from] SubmitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Multipart(#[from] MultipartError),
    #[error("options field is larger than {limit} bytes")]
    OptionsTooLarge { limit: usize },
    #[error("upload interrupted: {0}")]
    Interrupted(String),
    #[error(transparent)]
    Header(#[from] InvalidHeaderValue),
}

impl ApiError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            ApiError::Job(JobError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, String::from("Invalid ticket"))
            }
            ApiError::Job(JobError::NotReady { .. }) => {
                (StatusCode::BAD_REQUEST, String::from("Job not completed"))
            }
            ApiError::Submit(SubmitError::MissingInput) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            ApiError::Submit(SubmitError::Queue(QueueError::Full { .. })) => {
                (StatusCode::SERVICE_UNAVAILABLE, self.to_string())
            }
            ApiError::Submit(SubmitError::Queue(QueueError::Closed)) => (
                StatusCode::SERVICE_UNAVAILABLE,
                String::from("Server is shutting down"),
            ),
            ApiError::Multipart(e) => (e.status(), e.body_text()),
            ApiError::Interrupted(_) | ApiError::OptionsTooLarge { .. } => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            _ => {
                error!("Request failed: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    String::from("Internal server error"),
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::jobs::{JobStatus, Ticket};

    #[test]
    fn lookup_errors_use_client_facing_messages() {
        let (status, message) =
            ApiError::from(JobError::NotFound(Ticket::from("x"))).status_and_message();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(message, "Invalid ticket");

        let (status, message) = ApiError::from(JobError::NotReady {
            ticket: Ticket::from("x"),
            status: JobStatus::Processing,
        })
        .status_and_message();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(message, "Job not completed");
    }

    #[test]
    fn full_queue_is_unavailable() {
        let (status, _) = ApiError::from(SubmitError::Queue(QueueError::Full { capacity: 4 }))
            .status_and_message();
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn oversized_options_are_a_client_error() {
        let (status, message) = ApiError::OptionsTooLarge { limit: 65536 }.status_and_message();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(message, "options field is larger than 65536 bytes");
    }

    #[test]
    fn storage_failures_are_not_leaked() {
        let err = StorageError::from(std::io::Error::other("disk on fire"));
        let (status, message) = ApiError::from(err).status_and_message();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(message, "Internal server error");
    }
}
