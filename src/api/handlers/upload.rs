use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
};
use futures::TryStreamExt;
use serde::Serialize;
use tokio_util::io::StreamReader;
use utoipa::ToSchema;

use crate::AppState;
use crate::api::error::AppError;
use crate::services::upload_session::{PartMetadata, UploadError, UploadSession};
use crate::utils::validation::{ValidationRules, sanitize_pad_id};

#[derive(Serialize, ToSchema)]
pub struct UploadResponse {
    /// Caller-resolvable reference to the stored file.
    pub location: String,
    /// Storage key the file lives under.
    pub key: String,
    /// Bytes received.
    pub size: u64,
    pub pad_id: String,
}

#[utoipa::path(
    post,
    path = "/p/{pad_id}/upload",
    params(
        ("pad_id" = String, Path, description = "Pad the upload belongs to")
    ),
    request_body(content = String, content_type = "multipart/form-data", description = "Multipart body with one 'file' part"),
    responses(
        (status = 201, description = "File stored", body = UploadResponse),
        (status = 400, description = "Rejected extension, malformed body or bad pad id"),
        (status = 413, description = "File exceeds the configured size ceiling"),
        (status = 500, description = "Storage backend failure")
    ),
    tag = "upload"
)]
pub async fn upload_file(
    State(state): State<AppState>,
    Path(pad_id): Path<String>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), AppError> {
    let pad_id = sanitize_pad_id(&pad_id)
        .map_err(AppError::BadRequest)?
        .to_string();

    // Policy is read once per request; later config changes never affect an
    // attempt already in flight.
    let rules = ValidationRules::from_config(&state.config);
    let mut session = UploadSession::new(pad_id.clone(), rules, state.storage.clone());
    let mut saw_file = false;

    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                let name = field.name().unwrap_or_default().to_string();

                if name == "file" && !saw_file {
                    saw_file = true;
                    let metadata = PartMetadata {
                        file_name: field.file_name().unwrap_or("unnamed").to_string(),
                        content_type: field.content_type().map(|s| s.to_string()),
                        field_name: name,
                    };

                    let reader = StreamReader::new(field.map_err(std::io::Error::other));
                    if session.run(metadata, reader, None).await.is_err() {
                        break;
                    }
                } else {
                    // Other parts are ignored but must still be consumed.
                    let mut field = field;
                    while let Ok(Some(_)) = field.chunk().await {}
                }
            }
            Ok(None) => break,
            Err(e) => {
                // Framing-level damage is a distinguishable failure, never a
                // silent truncation. If the session already finished, the
                // once-guard keeps its result.
                session.complete(Err(UploadError::Malformed(e.to_string())));
                break;
            }
        }
    }

    // The inbound stream is fully drained before any response is sent, so
    // the connection cannot hang or reset mid-response.
    drain(&mut multipart).await;

    if !saw_file {
        session.complete(Err(UploadError::Malformed(
            "no file part in request".to_string(),
        )));
    }

    match session.into_outcome() {
        Ok(stored) => {
            tracing::info!(
                pad_id = %pad_id,
                key = %stored.key,
                size = stored.size,
                "Upload stored"
            );
            Ok((
                StatusCode::CREATED,
                Json(UploadResponse {
                    location: stored.location,
                    key: stored.key,
                    size: stored.size,
                    pad_id,
                }),
            ))
        }
        Err(e) => {
            tracing::warn!(pad_id = %pad_id, "Upload failed: {}", e);
            Err(AppError::from(e))
        }
    }
}

async fn drain(multipart: &mut Multipart) {
    while let Ok(Some(mut field)) = multipart.next_field().await {
        while let Ok(Some(_)) = field.chunk().await {}
    }
}
