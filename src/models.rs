use std::cmp::Ordering;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A node of the notes index.
///
/// Serialized with a `type` tag so the generated index reads as
/// `{"type": "file", "name": ..., "path": ..., "title": ...}` or
/// `{"type": "directory", "name": ..., "path": ..., "children": [...]}`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TreeNode {
    File {
        name: String,
        /// Slash-joined path relative to the content root, no leading slash
        path: String,
        title: String,
    },
    Directory {
        name: String,
        path: String,
        children: Vec<TreeNode>,
    },
}

impl TreeNode {
    pub fn file(name: impl Into<String>, path: impl Into<String>, title: impl Into<String>) -> Self {
        TreeNode::File {
            name: name.into(),
            path: path.into(),
            title: title.into(),
        }
    }

    pub fn directory(
        name: impl Into<String>,
        path: impl Into<String>,
        children: Vec<TreeNode>,
    ) -> Self {
        TreeNode::Directory {
            name: name.into(),
            path: path.into(),
            children,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            TreeNode::File { name, .. } | TreeNode::Directory { name, .. } => name,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            TreeNode::File { path, .. } | TreeNode::Directory { path, .. } => path,
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, TreeNode::Directory { .. })
    }

    /// Children if this is a directory.
    pub fn children(&self) -> Option<&[TreeNode]> {
        match self {
            TreeNode::Directory { children, .. } => Some(children),
            TreeNode::File { .. } => None,
        }
    }

    /// Label shown in the tree view: the title for files, the name for folders.
    pub fn display_label(&self) -> &str {
        match self {
            TreeNode::File { title, name, .. } if title.is_empty() => name,
            TreeNode::File { title, .. } => title,
            TreeNode::Directory { name, .. } => name,
        }
    }

    /// Index ordering: directories first, then case-insensitive by name.
    /// The exact name breaks ties so the output is deterministic.
    pub fn index_order(a: &TreeNode, b: &TreeNode) -> Ordering {
        match (a.is_directory(), b.is_directory()) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => a
                .name()
                .to_lowercase()
                .cmp(&b.name().to_lowercase())
                .then_with(|| a.name().cmp(b.name())),
        }
    }
}

/// Counts the file nodes of a tree.
pub fn count_files(nodes: &[TreeNode]) -> usize {
    nodes
        .iter()
        .map(|node| match node {
            TreeNode::File { .. } => 1,
            TreeNode::Directory { children, .. } => count_files(children),
        })
        .sum()
}

/// Response envelope of the control endpoints: `{"ok": true}` or
/// `{"ok": false, "error": "..."}`.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ApiResult {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiResult {
    /// Create a successful result
    pub fn success() -> Self {
        Self {
            ok: true,
            error: None,
        }
    }

    /// Create an error result
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(message.into()),
        }
    }
}

/// Body of `POST /__notes/mkdir`
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MkdirRequest {
    #[serde(default)]
    pub folder_path: String,
    pub folder_name: String,
}

/// Body of `POST /__notes/write`
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WriteRequest {
    #[serde(default)]
    pub folder_path: String,
    pub file_name: String,
    #[serde(default)]
    pub content: String,
}

/// A mutation of the content root requested by the author.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthoringRequest {
    CreateDirectory {
        parent_path: String,
        name: String,
    },
    CreateFile {
        parent_path: String,
        name: String,
        content: String,
    },
}

impl From<MkdirRequest> for AuthoringRequest {
    fn from(req: MkdirRequest) -> Self {
        AuthoringRequest::CreateDirectory {
            parent_path: req.folder_path,
            name: req.folder_name,
        }
    }
}

impl From<WriteRequest> for AuthoringRequest {
    fn from(req: WriteRequest) -> Self {
        AuthoringRequest::CreateFile {
            parent_path: req.folder_path,
            name: req.file_name,
            content: req.content,
        }
    }
}

/// Entry of the folder picker offered when creating notes or folders.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct FolderOption {
    pub label: String,
    pub path: String,
}

/// Color theme of the browser.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn opposite(self) -> Theme {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(format!("Unknown theme '{}'", other)),
        }
    }
}

/// Current theme plus whether the user chose it explicitly.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct ThemeState {
    pub theme: Theme,
    pub explicit: bool,
}

/// Application configuration
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Config {
    /// Directory of markdown files served to the browser
    pub content_root: PathBuf,
    pub host: String,
    pub port: u16,
    /// Mount point of the application, e.g. `/notes/`
    pub base_path: String,
    /// Name of the generated index inside the content root
    pub index_file: String,
    /// Whether the local authoring endpoints are exposed at all
    pub authoring_enabled: bool,
    /// Where the content resolver fetches notes from
    pub content_base_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            content_root: PathBuf::from("public"),
            host: "127.0.0.1".to_string(),
            port: 5173,
            base_path: "/notes/".to_string(),
            index_file: "notes-index.json".to_string(),
            authoring_enabled: true,
            content_base_url: "http://localhost:5173/notes/".to_string(),
        }
    }
}
