//! Streaming gateway: serves file bytes with HTTP range support.
//!
//! Every response body holds a [`StreamLease`](seedstream_core::StreamLease),
//! so the resource counts as watched exactly as long as the client keeps the
//! connection. Dropping the body, on completion, error or disconnect, closes
//! the stream once.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use seedstream_core::streams::streaming_mime_type;
use seedstream_core::{ByteRange, EngineError, ResourceError};
use tokio_util::io::ReaderStream;
use tracing::{error, info};

use super::handlers::ErrorResponse;
use crate::state::AppState;

/// Outcome of matching a `Range` header against a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeRequest {
    /// No usable header: serve the whole file.
    Full,
    Partial(ByteRange),
    Unsatisfiable,
}

/// Parse a `Range` header for a file of `size` bytes.
///
/// Only the first range of a multi-range request is honoured and an end past
/// the file is clamped. Headers for units other than bytes are ignored.
pub fn parse_range(header: Option<&str>, size: u64) -> RangeRequest {
    let Some(ranges) = header.and_then(|h| h.trim().strip_prefix("bytes=")) else {
        return RangeRequest::Full;
    };
    let first = ranges.split(',').next().unwrap_or_default().trim();
    let Some((start, end)) = first.split_once('-') else {
        return RangeRequest::Unsatisfiable;
    };
    let (start, end) = (start.trim(), end.trim());
    let last = match size.checked_sub(1) {
        Some(last) => last,
        None => return RangeRequest::Unsatisfiable,
    };

    if start.is_empty() {
        // Suffix form: the last N bytes
        return match end.parse::<u64>() {
            Ok(n) if n > 0 => RangeRequest::Partial(ByteRange {
                start: size.saturating_sub(n),
                end: last,
            }),
            _ => RangeRequest::Unsatisfiable,
        };
    }

    let Ok(start) = start.parse::<u64>() else {
        return RangeRequest::Unsatisfiable;
    };
    let end = if end.is_empty() {
        last
    } else {
        match end.parse::<u64>() {
            Ok(end) => end.min(last),
            Err(_) => return RangeRequest::Unsatisfiable,
        }
    };

    if start > end {
        return RangeRequest::Unsatisfiable;
    }
    RangeRequest::Partial(ByteRange { start, end })
}

fn internal_error(e: impl ToString) -> Response {
    ErrorResponse::with_status(StatusCode::INTERNAL_SERVER_ERROR, e).into_response()
}

fn not_found(file_path: &str) -> Response {
    ErrorResponse::with_status(
        StatusCode::NOT_FOUND,
        format!("File not found: {}", file_path),
    )
    .into_response()
}

/// GET /stream/{uri}/{*file_path}
pub async fn stream_file(
    State(state): State<Arc<AppState>>,
    Path((uri, file_path)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    let manager = state.manager();

    let (acquired, lease) = match manager.acquire_with_lease(&uri).await {
        Ok(acquired) => acquired,
        Err(e) => {
            error!(uri = %uri, error = %e, "Failed to acquire resource for streaming");
            return internal_error(e);
        }
    };

    let Some(file) = acquired.metadata.file(&file_path) else {
        return not_found(&file_path);
    };
    let size = file.size_bytes;
    let mime = streaming_mime_type(&file.name);

    let range_header = headers.get(header::RANGE).and_then(|v| v.to_str().ok());
    let (status, range) = match parse_range(range_header, size) {
        RangeRequest::Full => (StatusCode::OK, ByteRange::full(size)),
        RangeRequest::Partial(range) => (StatusCode::PARTIAL_CONTENT, Some(range)),
        RangeRequest::Unsatisfiable => {
            return (
                StatusCode::RANGE_NOT_SATISFIABLE,
                [(header::CONTENT_RANGE, format!("bytes */{}", size))],
            )
                .into_response();
        }
    };

    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, mime)
        .header(header::ACCEPT_RANGES, "bytes");

    let Some(range) = range else {
        // Empty file
        return builder
            .header(header::CONTENT_LENGTH, 0)
            .body(Body::empty())
            .unwrap_or_else(internal_error);
    };
    if status == StatusCode::PARTIAL_CONTENT {
        builder = builder.header(
            header::CONTENT_RANGE,
            format!("bytes {}-{}/{}", range.start, range.end, size),
        );
    }

    let reader = match manager
        .open_byte_range(&acquired.info_hash, &file_path, range)
        .await
    {
        Ok(reader) => reader,
        Err(ResourceError::Engine(EngineError::NotFound(_))) => return not_found(&file_path),
        Err(e) => {
            error!(uri = %uri, file = %file_path, error = %e, "Failed to open byte range");
            return internal_error(e);
        }
    };

    let log_key = format!("{}/{}", acquired.info_hash, file_path);
    if state.gateway_log().should_log(&log_key) {
        info!(
            name = %acquired.metadata.name,
            file = %file_path,
            start = range.start,
            end = range.end,
            size = size,
            "Streaming file"
        );
    }

    let body = ReaderStream::new(reader).map(move |chunk| {
        // the lease lives exactly as long as the body
        let _ = &lease;
        chunk
    });

    builder
        .header(header::CONTENT_LENGTH, range.len())
        .body(Body::from_stream(body))
        .unwrap_or_else(internal_error)
}
