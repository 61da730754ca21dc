use std::io;

use chrono::Utc;
use serde::Serialize;

use crate::error::{NotesError, Result};
use crate::models::{count_files, ApiResult, MkdirRequest, TreeNode, WriteRequest};
use crate::tree_state::TreeState;

/// Client side of the local authoring endpoints.
///
/// Mutations and index regeneration are separate calls so several writes
/// can be followed by a single regeneration.
#[derive(Debug, Clone)]
pub struct AuthoringClient {
    client: reqwest::Client,
    /// Application URL including the mount point, e.g. `http://localhost:5173/notes/`
    base_url: String,
    index_file: String,
}

impl AuthoringClient {
    pub fn new(base_url: impl Into<String>, index_file: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self {
            client: reqwest::Client::new(),
            base_url,
            index_file: index_file.into(),
        }
    }

    pub(crate) fn control_url(&self, operation: &str) -> String {
        format!("{}__notes/{}", self.base_url, operation)
    }

    /// Creates `folder_name` inside `folder_path` on the server.
    pub async fn create_directory(&self, folder_path: &str, folder_name: &str) -> Result<()> {
        let request = MkdirRequest {
            folder_path: folder_path.to_string(),
            folder_name: folder_name.to_string(),
        };
        self.post("mkdir", &request).await
    }

    /// Creates or overwrites `folder_path/file_name`.
    pub async fn write_file(&self, folder_path: &str, file_name: &str, content: &str) -> Result<()> {
        let request = WriteRequest {
            folder_path: folder_path.to_string(),
            file_name: file_name.to_string(),
            content: content.to_string(),
        };
        self.post("write", &request).await
    }

    /// Asks the server to rebuild the notes index.
    pub async fn regenerate_index(&self) -> Result<()> {
        let response = self
            .client
            .post(self.control_url("refresh"))
            .send()
            .await
            .map_err(|e| NotesError::Network(e.to_string()))?;
        Self::check(response).await
    }

    /// Fetches the current index, bypassing caches.
    pub async fn fetch_index(&self) -> Result<Vec<TreeNode>> {
        let url = format!(
            "{}{}?ts={}",
            self.base_url,
            self.index_file,
            Utc::now().timestamp_millis()
        );
        let response = self
            .client
            .get(&url)
            .header(reqwest::header::CACHE_CONTROL, "no-store")
            .send()
            .await
            .map_err(|e| NotesError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(NotesError::Network(format!(
                "Failed to load notes index: HTTP {}",
                response.status()
            )));
        }
        response
            .json()
            .await
            .map_err(|e| NotesError::Network(format!("Failed to load notes index: {}", e)))
    }

    /// Regenerates the index, re-fetches it and installs it in `state`.
    ///
    /// Returns the number of notes in the new tree. On failure `state` is
    /// left untouched.
    pub async fn refresh(&self, state: &mut TreeState) -> Result<usize> {
        self.regenerate_index().await?;
        let tree = self.fetch_index().await?;
        let notes = count_files(&tree);
        state.set_tree(tree);
        Ok(notes)
    }

    async fn post<T: Serialize>(&self, operation: &str, body: &T) -> Result<()> {
        let response = self
            .client
            .post(self.control_url(operation))
            .json(body)
            .send()
            .await
            .map_err(|e| NotesError::Network(e.to_string()))?;
        Self::check(response).await
    }

    /// Maps an endpoint response back onto the error taxonomy.
    async fn check(response: reqwest::Response) -> Result<()> {
        let status = response.status();
        let result: ApiResult = match response.json().await {
            Ok(result) => result,
            Err(e) => {
                return Err(NotesError::Network(format!(
                    "Unexpected response (HTTP {}): {}",
                    status, e
                )))
            }
        };
        if result.ok {
            return Ok(());
        }

        let message = result.error.unwrap_or_else(|| format!("HTTP {}", status));
        Err(match status.as_u16() {
            400 => NotesError::InvalidPath(message),
            403 => NotesError::Forbidden(message),
            _ => NotesError::io("Authoring request failed", io::Error::other(message)),
        })
    }
}
