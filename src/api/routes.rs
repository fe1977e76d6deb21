//! HTTP routes: health, format listing and downloads.

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures_util::StreamExt;
use serde::Deserialize;
use tokio_util::io::ReaderStream;

use crate::api::error::{ApiError, ApiResult};
use crate::api::server::AppState;
use crate::config::DeliveryMode;
use crate::downloader::utils::{attachment_disposition, sanitize_filename};
use crate::downloader::{DownloadError, FetchedArtifact, FormatListing, MediaRequest, TierSelector};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/formats", get(formats))
        .route("/download", get(download))
}

#[derive(Debug, Deserialize)]
pub struct FormatsQuery {
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub url: Option<String>,
    pub format_id: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Health check; also answers HEAD.
async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "message": "Kaneki Downloader",
    }))
}

async fn formats(
    State(state): State<AppState>,
    Query(query): Query<FormatsQuery>,
) -> ApiResult<Json<FormatListing>> {
    let url = non_blank(query.url).ok_or_else(|| ApiError::bad_request("URL is required"))?;
    let listing = state.downloader.list_formats(&url).await?;
    Ok(Json(listing))
}

async fn download(
    State(state): State<AppState>,
    Query(query): Query<DownloadQuery>,
) -> ApiResult<Response> {
    let (Some(url), Some(format_id)) = (non_blank(query.url), non_blank(query.format_id)) else {
        return Err(ApiError::bad_request("Missing parameters"));
    };
    let request = MediaRequest::new(url, TierSelector::from_format_id(&format_id));

    match state.delivery {
        DeliveryMode::Redirect => {
            let location = state.downloader.resolve_stream(&request).await?;
            tracing::info!("redirecting to stream URL");
            Ok((StatusCode::FOUND, [(header::LOCATION, location)]).into_response())
        }
        DeliveryMode::Stream => {
            let fetched = state.downloader.clone().fetch_detached(request).await?;
            stream_artifact(fetched).await
        }
        DeliveryMode::Link => {
            let fetched = state.downloader.clone().fetch_detached(request).await?;
            let FetchedArtifact {
                title,
                artifact,
                guard,
            } = fetched;
            guard.release_after(state.link_retention);
            Ok(Json(serde_json::json!({
                "title": title,
                "filename": format!("{}.{}", sanitize_filename(&title), artifact.extension),
                "url": format!("/files/{}", artifact.file_name()),
            }))
            .into_response())
        }
    }
}

/// Inline transfer. The cleanup guard rides along with the body stream, so
/// the job's files are removed only once the body is finished or dropped.
async fn stream_artifact(fetched: FetchedArtifact) -> ApiResult<Response> {
    let FetchedArtifact {
        title,
        artifact,
        guard,
    } = fetched;

    let file = tokio::fs::File::open(&artifact.path).await.map_err(|e| {
        DownloadError::ArtifactMissing(format!("{}: {}", artifact.path.display(), e))
    })?;

    let disposition = attachment_disposition(&sanitize_filename(&title), &artifact.extension);
    let mime = mime_guess::from_path(&artifact.path).first_or_octet_stream();

    let body = ReaderStream::new(file).map(move |chunk| {
        let _held = &guard;
        chunk
    });

    Ok((
        [
            (header::CONTENT_TYPE, mime.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
            (header::CONTENT_LENGTH, artifact.size.to_string()),
        ],
        Body::from_stream(body),
    )
        .into_response())
}
