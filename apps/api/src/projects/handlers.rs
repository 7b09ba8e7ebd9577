//! Project file uploads, upload history and downloads.
//!
//! Files live in a per-user folder under the upload root; downloads only ever
//! read from the requesting user's own folder.

use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use tracing::info;

use crate::auth::session::CurrentSession;
use crate::errors::AppError;
use crate::models::upload::UploadRecord;
use crate::state::AppState;
use crate::store::StoreError;
use crate::uploads::{save_uploads, secure_filename, user_upload_dir, MultipartForm};

/// POST /api/v1/upload_project
pub async fn handle_upload_project(
    State(state): State<AppState>,
    session: CurrentSession,
    multipart: Multipart,
) -> Result<(StatusCode, Json<UploadRecord>), AppError> {
    let form = MultipartForm::read(multipart).await?;
    let files = form.files("project_files");
    if files.is_empty() {
        return Err(AppError::Validation("No files uploaded!".to_string()));
    }

    let dir = user_upload_dir(&state.config.upload_dir, session.username());
    let saved = save_uploads(&dir, &files).await?;

    let user = session.username().to_string();
    let record = state
        .stores
        .uploads
        .update(move |uploads| {
            // Count-based id; duplicates are possible if records are ever removed.
            let record = UploadRecord {
                id: uploads.len() as u64 + 1,
                user,
                files: saved,
                created_at: Utc::now(),
            };
            uploads.push(record.clone());
            Ok::<_, StoreError>(record)
        })
        .await?;

    info!("Upload batch {} stored {} files", record.id, record.files.len());
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /api/v1/project_history
pub async fn handle_project_history(
    State(state): State<AppState>,
    _session: CurrentSession,
) -> Result<Json<Vec<UploadRecord>>, AppError> {
    Ok(Json(state.stores.uploads.load().await?))
}

/// GET /api/v1/download/:filename
pub async fn handle_download(
    State(state): State<AppState>,
    session: CurrentSession,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let filename = secure_filename(&filename);
    if filename.is_empty() {
        return Err(AppError::NotFound("File not found.".to_string()));
    }

    let path = user_upload_dir(&state.config.upload_dir, session.username()).join(&filename);
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AppError::NotFound(format!("File '{filename}' not found.")))
        }
        Err(e) => {
            return Err(AppError::Internal(
                anyhow::Error::new(e).context(format!("failed to read {}", path.display())),
            ))
        }
    };

    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        bytes,
    ))
}
