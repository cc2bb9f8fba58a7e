//! Download submission, status and artifact handlers.

use crate::api::AppState;
use crate::error::Error;
use crate::types::{DownloadRequest, TaskId, TaskInfo};
use axum::{
    Json,
    body::Body,
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use tokio_util::io::ReaderStream;

/// POST /api/download - Submit a download
#[utoipa::path(
    post,
    path = "/api/download",
    tag = "downloads",
    request_body = DownloadRequest,
    responses(
        (status = 200, description = "Task accepted and running in the background", body = TaskInfo),
        (status = 400, description = "Invalid URL, format or cookie id", body = crate::error::ApiError),
        (status = 422, description = "Body is not a download request (e.g. missing url or format)"),
        (status = 409, description = "Target is live or has not started yet", body = crate::error::ApiError),
        (status = 503, description = "All download slots busy or server shutting down", body = crate::error::ApiError)
    )
)]
pub async fn submit_download(
    State(state): State<AppState>,
    Json(request): Json<DownloadRequest>,
) -> Result<Json<TaskInfo>, Error> {
    let info = state.downloader.submit(request).await?;
    Ok(Json(info))
}

/// GET /api/status/:task_id - Poll a task
#[utoipa::path(
    get,
    path = "/api/status/{task_id}",
    tag = "downloads",
    params(
        ("task_id" = String, Path, description = "Task ID returned on submission")
    ),
    responses(
        (status = 200, description = "Current task state", body = TaskInfo),
        (status = 404, description = "Unknown or expired task", body = crate::error::ApiError)
    )
)]
pub async fn get_status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<TaskInfo>, Error> {
    let info = state.downloader.status(&TaskId::from(task_id)).await?;
    Ok(Json(info))
}

/// GET /api/download/:filename - Fetch a finished artifact
#[utoipa::path(
    get,
    path = "/api/download/{filename}",
    tag = "downloads",
    params(
        ("filename" = String, Path, description = "File name reported on the completed task")
    ),
    responses(
        (status = 200, description = "Artifact content (audio/mp4 or video/mp4)", content_type = "application/octet-stream"),
        (status = 400, description = "Invalid file name", body = crate::error::ApiError),
        (status = 404, description = "File not found or already swept", body = crate::error::ApiError)
    )
)]
pub async fn download_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, Error> {
    let (path, format) = state.downloader.artifact(&filename).await?;

    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        // Swept between the lookup and the open
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::NotFound(format!("file {}", filename)));
        }
        Err(e) => return Err(Error::Io(e)),
    };
    let length = file.metadata().await.map_err(Error::Io)?.len();

    let disposition = format!(
        "attachment; filename*=UTF-8''{}",
        urlencoding::encode(&filename)
    );

    let body = Body::from_stream(ReaderStream::new(file));
    let mut response = (StatusCode::OK, body).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(format.mime_type()),
    );
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    Ok(response)
}
