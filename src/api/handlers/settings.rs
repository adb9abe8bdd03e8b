use axum::{Json, extract::State};
use serde::Serialize;
use utoipa::ToSchema;

use crate::AppState;

/// Client-safe view of the upload policy. Storage settings are deliberately
/// withheld; the editor client only needs to know what it may send.
#[derive(Serialize, ToSchema)]
pub struct ClientSettings {
    pub file_types: Vec<String>,
    pub max_file_size: u64,
}

#[utoipa::path(
    get,
    path = "/upload/settings",
    responses(
        (status = 200, description = "Upload policy for clients", body = ClientSettings)
    ),
    tag = "upload"
)]
pub async fn client_settings(State(state): State<AppState>) -> Json<ClientSettings> {
    Json(ClientSettings {
        file_types: state.config.allowed_file_types.clone(),
        max_file_size: state.config.max_file_size,
    })
}
