use super::{upload, ApiError};
use crate::application::jobs::JobService;
use crate::domain::jobs::{JobRecord, JobStatus, Ticket, WorkerId};
use crate::ports::storage::StorageError;
use axum::{
    body::{Body, Bytes},
    extract::{Multipart, Path, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use futures::{future, stream, StreamExt};
use serde::Serialize;
use std::io;
use std::sync::Arc;
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::warn;

#[derive(Debug, Serialize)]
pub struct Submitted {
    pub ticket_id: Ticket,
    pub status: JobStatus,
}

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub ticket_id: Ticket,
    pub status: JobStatus,
    pub worker: Option<WorkerId>,
    pub error: Option<String>,
}

impl From<&JobRecord> for StatusReport {
    fn from(record: &JobRecord) -> Self {
        Self {
            ticket_id: record.ticket().clone(),
            status: record.status(),
            worker: record.assigned_worker().cloned(),
            error: record.error_detail().map(str::to_owned),
        }
    }
}

// POST /encode/start
pub async fn start(
    State(jobs): State<Arc<JobService>>,
    multipart: Multipart,
) -> Result<Json<Submitted>, ApiError> {
    let staged = upload::receive(&jobs, multipart).await?;
    let record = jobs.submit(staged).await?;

    Ok(Json(Submitted {
        ticket_id: record.ticket().clone(),
        status: record.status(),
    }))
}

// GET /encode/status/:ticket_id
pub async fn status(
    State(jobs): State<Arc<JobService>>,
    Path(ticket_id): Path<String>,
) -> Result<Json<StatusReport>, ApiError> {
    let record = jobs.status(&Ticket::from(ticket_id)).await?;
    Ok(Json(StatusReport::from(&record)))
}

// GET /encode/result/:ticket_id
//
// The ticket is only spent once the body has been streamed to the end; a
// dropped connection puts the output back up for grabs.
pub async fn result(
    State(jobs): State<Arc<JobService>>,
    Path(ticket_id): Path<String>,
) -> Result<Response, ApiError> {
    let delivery = jobs.begin_delivery(&Ticket::from(ticket_id)).await?;

    let file = File::open(delivery.output())
        .await
        .map_err(StorageError::from)?;
    let disposition =
        HeaderValue::from_str(&format!("attachment; filename=\"{}.mp4\"", delivery.ticket()))?;

    // No Content-Length: hyper stops polling a sized body once the last byte
    // is out, and the trailing stream item has to run.
    let settle = stream::once(async move {
        let ticket = delivery.ticket().clone();
        if let Err(e) = delivery.finish().await {
            warn!("Could not mark {} as collected: {}", ticket, e);
        }
        None::<io::Result<Bytes>>
    })
    .filter_map(future::ready);

    let body = Body::from_stream(ReaderStream::new(file).chain(settle));

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("video/mp4")),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}
