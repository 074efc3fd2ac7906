//! REST endpoints for file upload, download, listing and deletion.
//!
//! POST   /upload           multipart form, field `file` (filename required)
//! GET    /download/{name}  raw bytes as an attachment
//! GET    /list             JSON list of stored file names
//! DELETE /delete/{name}    remove a stored file

use axum::{
    extract::{Multipart, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::state::AppState;
use crate::storage::gateway::GatewayError;

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub name: String,
    pub size: u64,
    pub encrypted: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListResponse {
    pub files: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub name: String,
    pub success: bool,
}

/// Map a gateway failure to an HTTP status and client-facing message.
///
/// Server-side failures are logged in full; the client only sees a summary.
fn error_response(err: GatewayError) -> (StatusCode, String) {
    match err {
        GatewayError::InvalidName(e) => (StatusCode::BAD_REQUEST, format!("Invalid file name: {}", e)),
        GatewayError::NotFound(_) => (StatusCode::NOT_FOUND, "File not found".to_string()),
        GatewayError::CodecFailure(e) => {
            tracing::error!("Stored file failed to decrypt: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to decrypt file".to_string(),
            )
        }
        err @ GatewayError::IoFailure { .. } => {
            tracing::error!("Storage I/O failure: {}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Storage failure".to_string(),
            )
        }
    }
}

fn join_error(e: tokio::task::JoinError) -> (StatusCode, String) {
    tracing::error!("Storage task join error: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Storage failure".to_string(),
    )
}

/// `attachment; filename="<name>"`, with quotes in the name escaped.
fn content_disposition(name: &str) -> Result<HeaderValue, (StatusCode, String)> {
    let escaped = name.replace('"', "\\\"");
    HeaderValue::from_bytes(format!("attachment; filename=\"{}\"", escaped).as_bytes()).map_err(
        |_| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "File name cannot be sent as a header".to_string(),
            )
        },
    )
}

/// POST /upload
///
/// Reads the `file` field of a multipart form and stores it under the
/// field's filename, replacing any existing file of that name.
pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), (StatusCode, String)> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (e.status(), format!("Invalid multipart body: {}", e.body_text())))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let name = field
            .file_name()
            .map(str::to_string)
            .ok_or((StatusCode::BAD_REQUEST, "Upload has no filename".to_string()))?;
        let data = field
            .bytes()
            .await
            .map_err(|e| (e.status(), format!("Failed to read upload: {}", e.body_text())))?;
        upload = Some((name, data));
        break;
    }

    let (name, data) = upload.ok_or((
        StatusCode::BAD_REQUEST,
        "Missing multipart field 'file'".to_string(),
    ))?;
    let size = data.len() as u64;

    let gateway = state.gateway.clone();
    let name_for_store = name.clone();
    tokio::task::spawn_blocking(move || gateway.put(&name_for_store, &data))
        .await
        .map_err(join_error)?
        .map_err(error_response)?;

    tracing::info!("Stored {} ({} bytes)", name, size);

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            name,
            size,
            encrypted: state.gateway.is_encrypted(),
        }),
    ))
}

/// GET /download/{name}
///
/// Returns the recovered plaintext with `Content-Type: application/octet-stream`.
/// Returns 404 if not found, 500 if the stored file fails authentication.
pub async fn download_file(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<(StatusCode, HeaderMap, Vec<u8>), (StatusCode, String)> {
    let gateway = state.gateway.clone();
    let name_for_read = name.clone();
    let data = tokio::task::spawn_blocking(move || gateway.get(&name_for_read))
        .await
        .map_err(join_error)?
        .map_err(error_response)?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    headers.insert(header::CONTENT_DISPOSITION, content_disposition(&name)?);

    Ok((StatusCode::OK, headers, data))
}

/// GET /list
pub async fn list_files(
    State(state): State<AppState>,
) -> Result<Json<ListResponse>, (StatusCode, String)> {
    let gateway = state.gateway.clone();
    let files = tokio::task::spawn_blocking(move || gateway.list())
        .await
        .map_err(join_error)?
        .map_err(error_response)?;

    Ok(Json(ListResponse { files }))
}

/// DELETE /delete/{name}
pub async fn delete_file(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<DeleteResponse>, (StatusCode, String)> {
    let gateway = state.gateway.clone();
    let name_for_delete = name.clone();
    tokio::task::spawn_blocking(move || gateway.delete(&name_for_delete))
        .await
        .map_err(join_error)?
        .map_err(error_response)?;

    tracing::info!("Deleted {}", name);

    Ok(Json(DeleteResponse {
        name,
        success: true,
    }))
}
