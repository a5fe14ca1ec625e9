/**
 * Upload Routes
 * Editor image upload. Content is sniffed before storage; the returned
 * reference is what post HTML embeds as an <img> source.
 */
use axum::{extract::Multipart, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::error::{ApiError, ApiResult};
use crate::routes::auth::Viewer;
use crate::storage::BlobStore;

const MAX_FILE_SIZE: usize = 5 * 1024 * 1024; // 5MB

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub url: String,
    pub size: usize,
    pub mime_type: String,
}

/// POST /api/upload - Store an image for embedding in post content
pub async fn upload_image(
    _viewer: Viewer,
    mut multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let field = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::Validation("malformed multipart body".to_string()))?
        .ok_or_else(|| ApiError::Validation("no file provided".to_string()))?;

    let bytes = field
        .bytes()
        .await
        .map_err(|_| ApiError::Validation("failed to read file".to_string()))?;

    if bytes.is_empty() {
        return Err(ApiError::Validation("empty file".to_string()));
    }
    if bytes.len() > MAX_FILE_SIZE {
        return Err(ApiError::Validation("file exceeds the 5MB limit".to_string()));
    }

    let (url, mime) = BlobStore::from_env().put(&bytes).await?;

    tracing::debug!(url = %url, size = bytes.len(), "image uploaded");

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            url,
            size: bytes.len(),
            mime_type: mime.to_string(),
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::post;
    use axum::Router;
    use tower::ServiceExt;

    fn test_router() -> Router {
        Router::new().route("/api/upload", post(upload_image))
    }

    #[tokio::test]
    async fn test_upload_requires_auth() {
        let req = Request::post("/api/upload")
            .header("content-type", "multipart/form-data; boundary=xyz")
            .body(Body::empty())
            .unwrap();
        let res = test_router().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }
}
