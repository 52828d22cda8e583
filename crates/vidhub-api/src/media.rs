use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::IntoResponse,
};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use tracing::debug;

use vidhub_media::MediaStore;

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};

/// Parse `Range: bytes=N-` and return N. Other range forms are ignored.
fn parse_range_start(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::RANGE)?
        .to_str()
        .ok()?
        .strip_prefix("bytes=")?
        .strip_suffix('-')?
        .parse()
        .ok()
}

/// GET /media/{storageId}: stream a stored asset, with `bytes=N-` resume.
pub async fn serve_media(
    State(state): State<AppState>,
    Path(storage_id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    let path = state
        .media
        .resolve(&storage_id)
        .ok_or_else(|| ApiError::not_found("Media does not exist"))?;

    let mut file = match tokio::fs::File::open(&path).await {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::not_found("Media does not exist"));
        }
        Err(e) => return Err(anyhow::Error::from(e).into()),
    };
    let size = file
        .metadata()
        .await
        .map_err(anyhow::Error::from)?
        .len();

    let start = parse_range_start(&headers).unwrap_or(0);
    if start > 0 && start >= size {
        return Ok((
            StatusCode::RANGE_NOT_SATISFIABLE,
            HeaderMap::new(),
            Body::empty(),
        ));
    }
    if start > 0 {
        file.seek(std::io::SeekFrom::Start(start))
            .await
            .map_err(anyhow::Error::from)?;
    }

    let length = size - start;
    debug!("Serving {} ({} of {} bytes)", storage_id, length, size);
    let body = Body::from_stream(ReaderStream::new(file.take(length)));

    let mut response_headers = HeaderMap::new();
    let content_type = MediaStore::content_type(&storage_id);
    response_headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&content_type)
            .unwrap_or(HeaderValue::from_static("application/octet-stream")),
    );
    response_headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    response_headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));

    if start > 0 {
        let range = format!("bytes {}-{}/{}", start, size - 1, size);
        if let Ok(value) = HeaderValue::from_str(&range) {
            response_headers.insert(header::CONTENT_RANGE, value);
        }
        Ok((StatusCode::PARTIAL_CONTENT, response_headers, body))
    } else {
        Ok((StatusCode::OK, response_headers, body))
    }
}
