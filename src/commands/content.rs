use axum::extract::State;
use axum::http::{header, StatusCode, Uri};
use axum::response::{Html, IntoResponse, Response};

use crate::error::NotesError;
use crate::navigation;
use crate::server::SharedState;

/// Document served for every route that is not a file, like a static host
/// serving a single page application.
pub const FALLBACK_DOCUMENT: &str = r#"<!doctype html>
<html lang="en">
  <head>
    <meta charset="UTF-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1.0" />
    <title>Notes</title>
  </head>
  <body>
    <div id="root"></div>
  </body>
</html>
"#;

/// Content type of a served file, by extension.
pub fn content_type_for(path: &str) -> &'static str {
    match path.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()).as_deref() {
        Some("md" | "markdown") => "text/markdown; charset=utf-8",
        Some("json") => "application/json",
        Some("txt") => "text/plain; charset=utf-8",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        _ => "application/octet-stream",
    }
}

fn fallback_document() -> Response {
    Html(FALLBACK_DOCUMENT).into_response()
}

/// Serves files of the content root under the mount point.
///
/// Anything that does not resolve to a file gets the fallback document.
pub async fn serve_content(State(state): State<SharedState>, uri: Uri) -> Response {
    let Some(rest) = navigation::strip_mount(&state.config.base_path, uri.path()) else {
        return fallback_document();
    };
    let relative = navigation::relative_path(rest);
    if relative.is_empty() {
        return fallback_document();
    }

    let content = state.content.clone();
    let lookup = relative.clone();
    let result = match tokio::task::spawn_blocking(move || content.read_content(&lookup)).await {
        Ok(result) => result,
        Err(e) => {
            log::error!("Content task failed for {}: {}", relative, e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    match result {
        Ok(bytes) => {
            let no_store = relative == state.config.index_file;
            let cache_control = if no_store { "no-store" } else { "no-cache" };
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, content_type_for(&relative)),
                    (header::CACHE_CONTROL, cache_control),
                ],
                bytes,
            )
                .into_response()
        }
        Err(NotesError::NotFound(_)) | Err(NotesError::InvalidPath(_)) => {
            log::debug!("No content at {}, serving fallback document", relative);
            fallback_document()
        }
        Err(e) => {
            log::error!("Failed to serve {}: {}", relative, e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
