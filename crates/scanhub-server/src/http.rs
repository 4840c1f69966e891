//! HTTP endpoints for the demo-directory file store.

use axum::body::Body;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{error, info, warn};

use crate::files::FileStoreError;
use crate::server::AppState;

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// POST `/api/upload-file` — multipart form field `file`.
pub async fn upload_file(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    loop {
        let mut field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return error_response(StatusCode::BAD_REQUEST, "No file uploaded"),
            Err(e) => {
                warn!(error = %e, "malformed multipart upload");
                return error_response(StatusCode::BAD_REQUEST, "No file uploaded");
            }
        };
        if field.name() != Some("file") {
            continue;
        }

        let Some(filename) = field.file_name().map(str::to_owned).filter(|n| !n.is_empty())
        else {
            return error_response(StatusCode::BAD_REQUEST, "No file uploaded");
        };

        let mut file = match state.files.create(&filename).await {
            Ok(file) => file,
            Err(FileStoreError::InvalidName(_)) => {
                return error_response(StatusCode::BAD_REQUEST, "Invalid filename");
            }
            Err(e) => {
                error!(error = %e, filename, "failed to create uploaded file");
                return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to save file");
            }
        };

        // Stream the field to disk chunk by chunk
        loop {
            match field.chunk().await {
                Ok(Some(chunk)) => {
                    if let Err(e) = file.write_all(&chunk).await {
                        error!(error = %e, filename, "failed to write uploaded file");
                        return error_response(
                            StatusCode::INTERNAL_SERVER_ERROR,
                            "Failed to save file",
                        );
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, filename, "upload stream aborted");
                    return error_response(StatusCode::BAD_REQUEST, "No file uploaded");
                }
            }
        }
        if let Err(e) = file.flush().await {
            error!(error = %e, filename, "failed to flush uploaded file");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to save file");
        }

        info!(filename, "file uploaded");
        return Json(json!({
            "message": "File uploaded successfully",
            "filename": filename,
        }))
        .into_response();
    }
}

/// GET `/api/files` — file names in the demo directory.
pub async fn list_files(State(state): State<AppState>) -> Response {
    match state.files.list().await {
        Ok(names) => Json(names).into_response(),
        Err(e) => {
            error!(error = %e, "failed to list demo files");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to list files")
        }
    }
}

/// GET `/api/files/{filename}` — stream file bytes.
pub async fn download_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Response {
    match state.files.open(&filename).await {
        Ok(file) => {
            let body = Body::from_stream(ReaderStream::new(file));
            ([(header::CONTENT_TYPE, "application/octet-stream")], body).into_response()
        }
        Err(FileStoreError::InvalidName(_)) => {
            warn!(filename, "rejected file name outside demo directory");
            error_response(StatusCode::BAD_REQUEST, "Invalid filename")
        }
        Err(FileStoreError::NotFound(_)) => {
            error_response(StatusCode::NOT_FOUND, "File not found")
        }
        Err(e) => {
            error!(error = %e, filename, "failed to open demo file");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to read file")
        }
    }
}

/// POST `/api/create-demo-files` — (re)write the fixed demo set.
pub async fn create_demo_files(State(state): State<AppState>) -> Response {
    match state.files.generate_samples().await {
        Ok(files) => {
            info!(count = files.len(), "demo files created");
            Json(json!({ "message": "Demo files created", "files": files })).into_response()
        }
        Err(e) => {
            error!(error = %e, "failed to create demo files");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create demo files")
        }
    }
}
