//! Handlers mapping HTTP requests onto the content server.

use std::sync::Arc;

use {
    axum::{
        body::Body,
        extract::{Path, State},
        http::{StatusCode, Uri, header},
        response::{IntoResponse, Redirect, Response},
    },
    tokio_util::io::ReaderStream,
    toolbay_sandbox::{ContentBody, ContentResponse, Error, VirtualContentServer},
    tracing::debug,
};

/// `/{toolId}` → `/{toolId}/` so relative asset links resolve inside the tool.
pub async fn tool_redirect_handler(Path(tool_id): Path<String>) -> Redirect {
    Redirect::permanent(&format!("/{tool_id}/"))
}

/// `/{toolId}/` and `/{toolId}/{*path}`.
///
/// The path is taken from the raw request URI: the content server decodes it
/// exactly once, and decoding here as well would let `%252e%252e` through as
/// `..`.
pub async fn tool_content_handler(
    State(content): State<Arc<VirtualContentServer>>,
    uri: Uri,
) -> Response {
    let Some((tool_id, raw_path)) = split_tool_path(uri.path()) else {
        return error_response(&Error::NotFound);
    };
    match content.serve(tool_id, raw_path).await {
        Ok(response) => content_response(response),
        Err(e) => {
            debug!(tool_id, path = raw_path, error = %e, "content request rejected");
            error_response(&e)
        },
    }
}

fn split_tool_path(path: &str) -> Option<(&str, &str)> {
    let rest = path.strip_prefix('/')?;
    let (tool_id, raw_path) = rest.split_once('/').unwrap_or((rest, ""));
    (!tool_id.is_empty()).then_some((tool_id, raw_path))
}

fn content_response(response: ContentResponse) -> Response {
    let headers = [
        (header::CONTENT_TYPE, response.mime),
        (header::CACHE_CONTROL, "no-cache"),
        (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
    ];
    match response.body {
        ContentBody::Html(html) => (StatusCode::OK, headers, html).into_response(),
        ContentBody::Stream { file, len } => {
            let mut response =
                (StatusCode::OK, headers, Body::from_stream(ReaderStream::new(file)))
                    .into_response();
            response
                .headers_mut()
                .insert(header::CONTENT_LENGTH, header::HeaderValue::from(len));
            response
        },
    }
}

fn error_response(error: &Error) -> Response {
    let status = match error {
        Error::NotFound => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let body = match error {
        Error::NotFound => "not found",
        _ => "failed to load content",
    };
    (
        status,
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
        ],
        body,
    )
        .into_response()
}
