use super::ApiError;
use crate::application::jobs::JobService;
use crate::domain::options::normalize_document;
use crate::ports::storage::{StagedUpload, StorageError};
use axum::{
    body::Bytes,
    extract::{
        multipart::{Field, MultipartError},
        Multipart,
    },
    BoxError,
};
use futures::{Stream, TryStreamExt};
use std::io;
use std::path::Path;
use tokio::{
    fs::File,
    io::{AsyncWriteExt, BufWriter},
};
use tokio_util::io::StreamReader;
use tracing::debug;

pub const INPUT_FIELD: &str = "input_file";
pub const SUBTITLE_FIELD: &str = "srt_file";
pub const OPTIONS_FIELD: &str = "options";

/// Largest `options` part accepted; it is buffered in memory.
pub const MAX_OPTIONS_BYTES: usize = 64 * 1024;

/// Receive the whole form into a staging directory.
///
/// A file part with no filename and no content (what browsers send for an
/// untouched file input) counts as absent.
pub async fn receive(jobs: &JobService, mut multipart: Multipart) -> Result<StagedUpload, ApiError> {
    let mut staged = jobs.stage_upload().await?;
    let layout = staged.layout();
    let mut options = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_owned();
        match name.as_str() {
            INPUT_FIELD => {
                let named = field.file_name().is_some_and(|n| !n.is_empty());
                let written = stream_to_file(&layout.input_path(), field).await?;
                if named || written > 0 {
                    staged.mark_input();
                }
            }
            SUBTITLE_FIELD => {
                let named = field.file_name().is_some_and(|n| !n.is_empty());
                let path = layout.subtitle_path();
                let written = stream_to_file(&path, field).await?;
                if named || written > 0 {
                    staged.mark_subtitles();
                } else {
                    // workers look for the file itself
                    tokio::fs::remove_file(&path)
                        .await
                        .map_err(StorageError::from)?;
                }
            }
            OPTIONS_FIELD => options = Some(read_options(field).await?),
            _ => debug!("Ignoring form field {:?}", name),
        }
    }

    let document = normalize_document(options.as_deref().unwrap_or("{}"));
    tokio::fs::write(layout.options_path(), document.to_string())
        .await
        .map_err(StorageError::from)?;

    Ok(staged)
}

async fn read_options(mut field: Field<'_>) -> Result<String, ApiError> {
    let mut document = Vec::new();
    while let Some(chunk) = field.chunk().await? {
        if document.len() + chunk.len() > MAX_OPTIONS_BYTES {
            return Err(ApiError::OptionsTooLarge {
                limit: MAX_OPTIONS_BYTES,
            });
        }
        document.extend_from_slice(&chunk);
    }
    Ok(String::from_utf8_lossy(&document).into_owned())
}

// Save a `Stream` to a file, returning the number of bytes written
pub async fn stream_to_file<S, E>(path: &Path, stream: S) -> Result<u64, ApiError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Into<BoxError>,
{
    let body_with_io_error = stream.map_err(|err| io::Error::new(io::ErrorKind::Other, err));
    let body_reader = StreamReader::new(body_with_io_error);
    futures::pin_mut!(body_reader);

    let mut file = BufWriter::new(File::create(path).await.map_err(StorageError::from)?);
    let written = tokio::io::copy(&mut body_reader, &mut file)
        .await
        .map_err(copy_error)?;
    file.flush().await.map_err(StorageError::from)?;

    Ok(written)
}

/// A broken request body is the client's fault; anything else is ours.
fn copy_error(err: io::Error) -> ApiError {
    let from_body = err
        .get_ref()
        .is_some_and(|inner| inner.is::<MultipartError>());
    if from_body {
        ApiError::Interrupted(err.to_string())
    } else {
        ApiError::Storage(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures::stream;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_stream_to_file() {
        let temp_dir = tempdir().unwrap();
        let file_path = temp_dir.path().join("input_file");

        type E = std::io::Error;
        let chunks = vec![
            Ok::<Bytes, E>(Bytes::from("Hello, ")),
            Ok::<Bytes, E>(Bytes::from("world!")),
        ];

        let written = stream_to_file(&file_path, stream::iter(chunks)).await.unwrap();

        assert_eq!(written, 13);
        assert_eq!(fs::read_to_string(file_path).unwrap(), "Hello, world!");
    }

    #[tokio::test]
    async fn test_stream_to_file_empty() {
        let temp_dir = tempdir().unwrap();
        let file_path = temp_dir.path().join("input_file");

        let empty = stream::iter(Vec::<Result<Bytes, std::io::Error>>::new());
        assert_eq!(stream_to_file(&file_path, empty).await.unwrap(), 0);
        assert!(file_path.exists());
    }

    #[tokio::test]
    async fn test_stream_to_file_error() {
        let temp_dir = tempdir().unwrap();
        let file_path = temp_dir.path().join("input_file");

        let failing = stream::iter(vec![Err("Test error")]);
        let result = stream_to_file(&file_path, failing).await;

        assert!(matches!(result, Err(ApiError::Storage(_))));
    }
}
