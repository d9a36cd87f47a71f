use std::io::SeekFrom;

use axum::{
    body::Body,
    extract::{Path as AxumPath, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

use crate::range::{parse_range_header, RangeError};
use crate::state::AppState;
use crate::utils::json_error_response;

use super::run_blocking;

pub async fn play(
    State(state): State<AppState>,
    AxumPath(relpath): AxumPath<String>,
    headers: HeaderMap,
) -> Response {
    let library = state.library.clone();
    let lookup = relpath.clone();
    let path = match run_blocking(move || library.file_path(&lookup)).await {
        Ok(Some(path)) => path,
        Ok(None) => return json_error_response(StatusCode::NOT_FOUND, "file not found"),
        Err(err) => return err.into_response(),
    };

    let mut file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(err) => {
            warn!("Failed to open {}: {}", relpath, err);
            return json_error_response(StatusCode::NOT_FOUND, err.to_string());
        }
    };
    let size = match file.metadata().await {
        Ok(meta) => meta.len(),
        Err(err) => return json_error_response(StatusCode::NOT_FOUND, err.to_string()),
    };
    let mime = mime_guess::from_path(&path).first_or_octet_stream();

    let requested = headers
        .get(header::RANGE)
        .and_then(|value| value.to_str().ok())
        .map(|value| parse_range_header(value, size));

    let mut response = match requested {
        Some(Ok(range)) => {
            if let Err(err) = file.seek(SeekFrom::Start(range.start)).await {
                return json_error_response(StatusCode::NOT_FOUND, err.to_string());
            }
            debug!("Serving {} bytes {}-{}", relpath, range.start, range.end);
            let stream = ReaderStream::new(file.take(range.byte_count()));
            let mut response = Response::new(Body::from_stream(stream));
            *response.status_mut() = StatusCode::PARTIAL_CONTENT;
            insert_header(&mut response, header::CONTENT_RANGE, &range.content_range(size));
            insert_header(&mut response, header::CONTENT_LENGTH, &range.byte_count().to_string());
            response
        }
        Some(Err(RangeError::Unsatisfiable)) => {
            let mut response = Response::new(Body::empty());
            *response.status_mut() = StatusCode::RANGE_NOT_SATISFIABLE;
            insert_header(&mut response, header::CONTENT_RANGE, &format!("bytes */{}", size));
            return response;
        }
        Some(Err(RangeError::Invalid)) | None => {
            let mut response = Response::new(Body::from_stream(ReaderStream::new(file)));
            insert_header(&mut response, header::CONTENT_LENGTH, &size.to_string());
            response
        }
    };

    insert_header(&mut response, header::CONTENT_TYPE, mime.as_ref());
    response
        .headers_mut()
        .insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    response
}

fn insert_header(response: &mut Response, name: header::HeaderName, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        response.headers_mut().insert(name, value);
    }
}
