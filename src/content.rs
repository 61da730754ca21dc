//! Resolution of navigation paths to note content.
//!
//! Every navigation refetches. Responses are tagged with a sequence number so
//! that a slow response for an older navigation never replaces the state of
//! a newer one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::NotesError;
use crate::navigation;

/// Content shown when nothing is selected
pub const PLACEHOLDER_CONTENT: &str = "# Select a note from the sidebar";

/// Opening token of the document a static host serves for unmatched routes
pub const FALLBACK_SIGNATURE: &str = "<!doctype html";

/// Raw answer of a content source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub status_text: String,
    pub content_type: Option<String>,
    pub body: String,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    fn is_markup(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.to_ascii_lowercase().contains("text/html"))
            .unwrap_or(false)
    }
}

/// Where note content comes from.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Fetches a content-root relative path. `Err` means the request never
    /// produced a response.
    async fn fetch(&self, relative_path: &str) -> Result<FetchResponse, String>;
}

/// Fetches notes over HTTP from the content base URL.
#[derive(Debug, Clone)]
pub struct HttpContentSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpContentSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self { client, base_url }
    }

    /// URL of a relative path: `{base}{path}`, each segment percent-encoded.
    pub fn url_for(&self, relative_path: &str) -> String {
        let encoded: Vec<_> = relative_path
            .trim_start_matches('/')
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!("{}{}", self.base_url, encoded.join("/"))
    }
}

#[async_trait]
impl ContentSource for HttpContentSource {
    async fn fetch(&self, relative_path: &str) -> Result<FetchResponse, String> {
        let url = self.url_for(relative_path);
        log::debug!("Fetching {}", url);

        let response = self.client.get(&url).send().await.map_err(|e| e.to_string())?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.map_err(|e| e.to_string())?;

        Ok(FetchResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("").to_string(),
            content_type,
            body,
        })
    }
}

/// What the note pane shows.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ContentState {
    #[default]
    Idle,
    Loading {
        path: String,
    },
    Loaded {
        path: String,
        content: String,
    },
    NotFound {
        path: String,
    },
    NetworkError {
        path: String,
        message: String,
    },
}

impl ContentState {
    pub fn is_loading(&self) -> bool {
        matches!(self, ContentState::Loading { .. })
    }

    /// Error to display, if the state is a failure.
    pub fn error(&self) -> Option<NotesError> {
        match self {
            ContentState::NotFound { path } => Some(NotesError::NotFound(path.clone())),
            ContentState::NetworkError { message, .. } => Some(NotesError::Network(message.clone())),
            _ => None,
        }
    }
}

/// Turns a fetch outcome into the state to display.
///
/// The host answers unknown routes with its fallback HTML document, so HTML
/// in place of markdown means "not found". This is detected from the content
/// type on both failed and successful responses, and from the body signature
/// on successful ones.
pub fn classify(path: &str, outcome: Result<FetchResponse, String>) -> ContentState {
    let path = path.to_string();
    let response = match outcome {
        Ok(response) => response,
        Err(message) => return ContentState::NetworkError { path, message },
    };

    if !response.is_success() {
        if response.is_markup() {
            return ContentState::NotFound { path };
        }
        let message = if response.status_text.is_empty() {
            format!("HTTP {}", response.status)
        } else {
            format!("HTTP {} {}", response.status, response.status_text)
        };
        return ContentState::NetworkError { path, message };
    }

    let signature = response
        .body
        .trim_start()
        .get(..FALLBACK_SIGNATURE.len())
        .map(|head| head.eq_ignore_ascii_case(FALLBACK_SIGNATURE))
        .unwrap_or(false);
    if signature || response.is_markup() {
        return ContentState::NotFound { path };
    }

    ContentState::Loaded {
        path,
        content: response.body,
    }
}

/// Drives the note pane from the current navigation path.
///
/// Cloning shares the same state and sequence counter.
#[derive(Clone)]
pub struct ContentResolver {
    source: Arc<dyn ContentSource>,
    state: Arc<Mutex<ContentState>>,
    latest: Arc<AtomicU64>,
}

impl ContentResolver {
    pub fn new(source: Arc<dyn ContentSource>) -> Self {
        Self {
            source,
            state: Arc::new(Mutex::new(ContentState::Idle)),
            latest: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> ContentState {
        self.state.lock().unwrap().clone()
    }

    /// Resolves `current_path` and updates the state.
    ///
    /// Returns `false` when a newer navigation started before this one
    /// finished; its result is then dropped.
    pub async fn navigate(&self, current_path: &str) -> bool {
        let seq = self.latest.fetch_add(1, Ordering::SeqCst) + 1;

        if navigation::is_root(current_path) {
            return self.apply(
                seq,
                ContentState::Loaded {
                    path: "/".to_string(),
                    content: PLACEHOLDER_CONTENT.to_string(),
                },
            );
        }

        self.apply(
            seq,
            ContentState::Loading {
                path: current_path.to_string(),
            },
        );

        let relative = navigation::relative_path(current_path);
        let outcome = self.source.fetch(&relative).await;
        let next = classify(current_path, outcome);
        if let ContentState::NetworkError { message, .. } = &next {
            log::error!("Failed to load note {}: {}", current_path, message);
        }
        self.apply(seq, next)
    }

    fn apply(&self, seq: u64, next: ContentState) -> bool {
        let mut state = self.state.lock().unwrap();
        if self.latest.load(Ordering::SeqCst) != seq {
            log::debug!("Discarding stale content result #{}", seq);
            return false;
        }
        *state = next;
        true
    }
}
