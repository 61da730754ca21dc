use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::{NotesError, Result};

/// Splits a user supplied relative path into plain segments.
///
/// Backslashes are treated as separators, empty and `.` segments are dropped
/// (which strips leading, trailing and repeated slashes). A `..` segment or a
/// segment that is not a plain file name (drive prefix, root marker) is
/// rejected.
pub fn normalize_segments(raw: &str) -> Result<Vec<String>> {
    let normalized = raw.trim().replace('\\', "/");
    let mut segments = Vec::new();

    for segment in normalized.split('/') {
        if segment.is_empty() || segment == "." {
            continue;
        }
        if segment == ".." {
            return Err(NotesError::invalid_path(
                "Path contains invalid traversal pattern '..'",
            ));
        }

        let mut components = Path::new(segment).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => segments.push(segment.to_string()),
            _ => {
                return Err(NotesError::invalid_path(format!(
                    "Path segment '{}' is not a plain name",
                    segment
                )))
            }
        }
    }

    Ok(segments)
}

/// Validates `parent_path` + `name` against the content root.
///
/// `name` must be exactly one segment. After joining, the path must stay under
/// `base_dir` both lexically and once the deepest existing ancestor is
/// canonicalized, so a symlink inside the root cannot lead outside of it.
/// Nothing is created or modified here.
///
/// # Arguments
/// * `base_dir` - The content root that the path must stay within
/// * `parent_path` - Folder relative to the root, may be empty
/// * `name` - File or folder name to create inside `parent_path`
///
/// # Returns
/// * `Ok(PathBuf)` - The resolved absolute path if validation passes
/// * `Err(NotesError::InvalidPath)` - If validation fails
pub fn validate_path(base_dir: &Path, parent_path: &str, name: &str) -> Result<PathBuf> {
    let mut segments = normalize_segments(parent_path)?;
    let name_segments = normalize_segments(name)?;
    if name_segments.len() != 1 {
        return Err(NotesError::invalid_path(format!(
            "Name '{}' must be a single path segment",
            name.trim()
        )));
    }
    segments.extend(name_segments);

    resolve_within(base_dir, &segments)
}

/// Resolves an already split relative path under `base_dir`.
fn resolve_within(base_dir: &Path, segments: &[String]) -> Result<PathBuf> {
    let full_path = segments
        .iter()
        .fold(base_dir.to_path_buf(), |path, segment| path.join(segment));

    if !full_path.starts_with(base_dir) {
        return Err(NotesError::invalid_path(
            "Path resolves outside of content root",
        ));
    }

    let canonical_base = base_dir
        .canonicalize()
        .map_err(|e| NotesError::io("Failed to canonicalize content root", e))?;

    let mut existing = full_path.as_path();
    while fs::symlink_metadata(existing).is_err() {
        match existing.parent() {
            Some(parent) => existing = parent,
            None => break,
        }
    }

    let canonical_existing = existing
        .canonicalize()
        .map_err(|e| NotesError::io("Failed to canonicalize path", e))?;
    if !canonical_existing.starts_with(&canonical_base) {
        return Err(NotesError::invalid_path(
            "Path resolves outside of content root",
        ));
    }

    Ok(full_path)
}

/// Distinguishes temp files of concurrent writes within one process
static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Writes `content` to a dot-prefixed sibling and renames it into place, so
/// readers never observe a half written file.
///
/// Every call gets its own temp file; concurrent writes to the same path
/// each land whole and the last rename wins.
pub(crate) fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
    let temp_path = path.with_file_name(format!(
        ".{}.tmp-{}-{}",
        file_name,
        std::process::id(),
        TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));

    fs::write(&temp_path, content)?;
    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }
    Ok(())
}

/// Appends `.md` unless the name already carries it.
pub fn ensure_markdown_extension(name: &str) -> String {
    let name = name.trim();
    if name.ends_with(".md") {
        name.to_string()
    } else {
        format!("{}.md", name)
    }
}

/// Trims whitespace and surrounding slashes from a folder chosen by the author.
pub fn clean_folder_path(folder: &str) -> String {
    folder.trim().trim_matches('/').to_string()
}

/// Timestamped default file name, e.g. `note-2026-01-02T03-04-05-678Z.md`.
pub fn default_note_name(prefix: &str, now: DateTime<Utc>) -> String {
    let stamp = now
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    format!("{}-{}.md", prefix, stamp)
}

/// Content of a freshly created note: a level-1 heading named after the file.
pub fn initial_note_content(file_name: &str) -> String {
    let stem = file_name.strip_suffix(".md").unwrap_or(file_name);
    format!("# {}\n\n", stem)
}

/// ContentRoot manages the directory of markdown notes served to the browser.
///
/// The structure is:
/// - `{root_dir}/**/*.md` - Notes, organized in folders
/// - `{root_dir}/{index_file}` - The generated notes index
#[derive(Debug, Clone)]
pub struct ContentRoot {
    /// Directory holding the notes
    pub root_dir: PathBuf,
    /// Path to the generated index file
    pub index_file: PathBuf,
}

impl ContentRoot {
    /// Creates a new ContentRoot for `root_dir` with the given index file name.
    pub fn new_with_base(root_dir: &Path, index_file_name: &str) -> Self {
        let root_dir = root_dir.to_path_buf();
        let index_file = root_dir.join(index_file_name);
        Self {
            root_dir,
            index_file,
        }
    }

    /// Ensures the content root exists, creating it if necessary.
    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.root_dir)
            .map_err(|e| NotesError::io("Failed to create content root", e))
    }

    /// Creates `name` inside `parent_path`, including any missing
    /// intermediate folders.
    ///
    /// # Returns
    /// * `Ok(PathBuf)` - The created directory
    /// * `Err(NotesError)` - `InvalidPath` before any I/O, or `Io`
    pub fn create_directory(&self, parent_path: &str, name: &str) -> Result<PathBuf> {
        let target = validate_path(&self.root_dir, parent_path, name)?;
        fs::create_dir_all(&target)
            .map_err(|e| NotesError::io("Failed to create directory", e))?;
        log::info!("Created directory {}", target.display());
        Ok(target)
    }

    /// Writes `content` to `parent_path/file_name`, creating parent folders
    /// and overwriting an existing file.
    ///
    /// # Returns
    /// * `Ok(PathBuf)` - The written file
    /// * `Err(NotesError)` - `InvalidPath` before any I/O, or `Io`
    pub fn write_file(&self, parent_path: &str, file_name: &str, content: &str) -> Result<PathBuf> {
        let target = validate_path(&self.root_dir, parent_path, file_name)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| NotesError::io("Failed to create parent directory", e))?;
        }
        atomic_write(&target, content.as_bytes())
            .map_err(|e| NotesError::io("Failed to write file", e))?;
        log::info!("Wrote {} ({} bytes)", target.display(), content.len());
        Ok(target)
    }

    /// Resolves a content-root relative path (as found after the mount point
    /// of a navigation URL) to a file on disk.
    pub fn resolve_content(&self, relative: &str) -> Result<PathBuf> {
        let segments = normalize_segments(relative)?;
        if segments.is_empty() {
            return Err(NotesError::NotFound(relative.to_string()));
        }
        resolve_within(&self.root_dir, &segments)
    }

    /// Reads a served file. Missing paths and directories are `NotFound`.
    pub fn read_content(&self, relative: &str) -> Result<Vec<u8>> {
        let path = self.resolve_content(relative)?;
        if !path.is_file() {
            return Err(NotesError::NotFound(relative.to_string()));
        }
        fs::read(&path).map_err(|e| NotesError::io("Failed to read file", e))
    }
}
