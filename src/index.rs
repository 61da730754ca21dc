//! Notes index generation.
//!
//! Scans the content root and produces the ordered tree of markdown files
//! that the browser renders in its sidebar.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{NotesError, Result};
use crate::filesystem::atomic_write;
use crate::models::{count_files, TreeNode};

/// Files that live in the content root but are never notes
pub const RESERVED_FILES: [&str; 4] = [
    "notes-index.json",
    "vite.svg",
    "index.json",
    "mockServiceWorker.js",
];

/// Directories holding non-content assets
pub const RESERVED_DIRS: [&str; 1] = ["assets"];

const MARKDOWN_EXTENSION: &str = ".md";

/// Builds the notes index for one content root.
///
/// The builder holds no state between runs: the same directory contents
/// always produce the same tree.
#[derive(Debug, Clone)]
pub struct IndexBuilder {
    root_dir: PathBuf,
    index_file: PathBuf,
    index_file_name: String,
}

impl IndexBuilder {
    pub fn new(root_dir: &Path, index_file_name: &str) -> Self {
        Self {
            root_dir: root_dir.to_path_buf(),
            index_file: root_dir.join(index_file_name),
            index_file_name: index_file_name.to_string(),
        }
    }

    /// Path the index is written to.
    pub fn index_file(&self) -> &Path {
        &self.index_file
    }

    /// Scans the content root into a sorted tree.
    pub fn build(&self) -> Result<Vec<TreeNode>> {
        self.scan_directory(&self.root_dir, "")
    }

    /// Builds the tree and writes it to the index file.
    ///
    /// The file is replaced atomically; if scanning or serializing fails the
    /// previous index is left as it was.
    ///
    /// # Returns
    /// * `Ok(usize)` - Number of notes in the new index
    /// * `Err(NotesError)` - If the scan or the write failed
    pub fn regenerate(&self) -> Result<usize> {
        log::info!("Scanning {} for notes...", self.root_dir.display());
        let tree = self.build()?;
        let json = serde_json::to_string_pretty(&tree)?;
        atomic_write(&self.index_file, json.as_bytes())
            .map_err(|e| NotesError::io("Failed to write notes index", e))?;

        let notes = count_files(&tree);
        log::info!(
            "Generated notes index at {} ({} notes)",
            self.index_file.display(),
            notes
        );
        Ok(notes)
    }

    fn is_ignored_file(&self, name: &str) -> bool {
        name == self.index_file_name || RESERVED_FILES.contains(&name)
    }

    fn scan_directory(&self, dir: &Path, relative_path: &str) -> Result<Vec<TreeNode>> {
        let entries = fs::read_dir(dir).map_err(|e| {
            NotesError::io(format!("Failed to read directory {}", dir.display()), e)
        })?;

        let mut result = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| NotesError::io("Failed to read directory entry", e))?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                log::warn!("Skipping non UTF-8 entry in {}", dir.display());
                continue;
            };
            if name.starts_with('.') || self.is_ignored_file(&name) {
                continue;
            }

            let full_path = entry.path();
            let item_path = if relative_path.is_empty() {
                name.clone()
            } else {
                format!("{}/{}", relative_path, name)
            };

            // Follows symlinks, like a plain stat would
            let metadata = fs::metadata(&full_path)
                .map_err(|e| NotesError::io(format!("Failed to stat {}", full_path.display()), e))?;

            if metadata.is_dir() {
                if RESERVED_DIRS.contains(&name.as_str()) {
                    continue;
                }
                let children = self.scan_directory(&full_path, &item_path)?;
                if !children.is_empty() {
                    result.push(TreeNode::directory(name, item_path, children));
                }
            } else if name.ends_with(MARKDOWN_EXTENSION) {
                let title = extract_title(&full_path, &name);
                result.push(TreeNode::file(name, item_path, title));
            }
        }

        result.sort_by(TreeNode::index_order);
        Ok(result)
    }
}

/// Title of a note: the text of a level-1 heading on the first line, or the
/// file name without `.md`.
///
/// Read failures fall back to the file name silently.
pub fn extract_title(path: &Path, file_name: &str) -> String {
    let fallback = file_name
        .strip_suffix(MARKDOWN_EXTENSION)
        .unwrap_or(file_name)
        .to_string();

    match fs::read_to_string(path) {
        Ok(content) => title_from_content(&content).unwrap_or(fallback),
        Err(e) => {
            log::debug!("Could not read {} for its title: {}", path.display(), e);
            fallback
        }
    }
}

/// Heading text of the first line when it is `# ` followed by at least one
/// character. The text is trimmed and may end up empty (`#    `).
pub fn title_from_content(content: &str) -> Option<String> {
    let first_line = content.split('\n').next().unwrap_or("");
    let first_line = first_line.strip_suffix('\r').unwrap_or(first_line);
    let heading = first_line.strip_prefix("# ")?;
    if heading.is_empty() {
        return None;
    }
    Some(heading.trim().to_string())
}
