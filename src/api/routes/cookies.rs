//! Cookie file handlers.

use crate::api::AppState;
use crate::error::Error;
use crate::types::CredentialUpload;
use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
};

/// POST /api/upload-cookie - Upload a cookie file
///
/// Expects a multipart form with the Netscape cookie file in the `file` field.
#[utoipa::path(
    post,
    path = "/api/upload-cookie",
    tag = "cookies",
    request_body(content = String, description = "Multipart form with a `file` field", content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Cookie stored; pass cookie_id with the next download", body = CredentialUpload),
        (status = 400, description = "Missing, empty or non-text file", body = crate::error::ApiError)
    )
)]
pub async fn upload_cookie(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<CredentialUpload>, Error> {
    let mut content: Option<Vec<u8>> = None;

    loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|e| Error::InvalidInput(format!("invalid multipart body: {}", e)))?;
        let Some(field) = field else { break };

        if field.name() == Some("file") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| Error::InvalidInput(format!("failed to read file: {}", e)))?;
            content = Some(bytes.to_vec());
        }
    }

    let content =
        content.ok_or_else(|| Error::InvalidInput("missing 'file' field in multipart form".into()))?;
    let upload = state.downloader.upload_credential(&content).await?;

    tracing::info!(cookie_id = %upload.cookie_id, "cookie uploaded");
    Ok(Json(upload))
}

/// DELETE /api/cookie/:cookie_id - Delete an unused cookie file
#[utoipa::path(
    delete,
    path = "/api/cookie/{cookie_id}",
    tag = "cookies",
    params(
        ("cookie_id" = String, Path, description = "Handle returned by the upload")
    ),
    responses(
        (status = 204, description = "Cookie deleted"),
        (status = 404, description = "Unknown or already consumed cookie", body = crate::error::ApiError)
    )
)]
pub async fn delete_cookie(
    State(state): State<AppState>,
    Path(cookie_id): Path<String>,
) -> Result<StatusCode, Error> {
    state.downloader.delete_credential(&cookie_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
