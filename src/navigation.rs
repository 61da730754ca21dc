use std::borrow::Cow;

use crate::models::TreeNode;

/// Decodes percent-encoding in a navigation path.
///
/// Invalid escapes leave the path untouched.
pub fn decode_path(raw: &str) -> Cow<'_, str> {
    urlencoding::decode(raw).unwrap_or(Cow::Borrowed(raw))
}

/// Content-root relative path of a navigation path: decoded, without the
/// leading slash.
pub fn relative_path(current_path: &str) -> String {
    let decoded = decode_path(current_path);
    decoded.trim_start_matches('/').to_string()
}

/// Whether the navigation path is the root, i.e. nothing is selected.
pub fn is_root(current_path: &str) -> bool {
    current_path.trim_start_matches('/').is_empty()
}

/// Strips the application's mount point from a request path.
///
/// `strip_mount("/notes/", "/notes/go/a.md")` is `Some("/go/a.md")`. Paths
/// outside the mount point yield `None`.
pub fn strip_mount<'a>(base_path: &str, request_path: &'a str) -> Option<&'a str> {
    let base = base_path.trim_end_matches('/');
    if base.is_empty() {
        return Some(request_path);
    }
    match request_path.strip_prefix(base) {
        Some("") => Some("/"),
        Some(rest) if rest.starts_with('/') => Some(rest),
        _ => None,
    }
}

/// A file node is active when the navigation path, read the same way as
/// [`relative_path`], equals `node.path` exactly. Directories are never
/// active.
pub fn is_active(current_path: &str, node: &TreeNode) -> bool {
    match node {
        TreeNode::File { path, .. } => relative_path(current_path) == *path,
        TreeNode::Directory { .. } => false,
    }
}

/// The single file node matching the navigation path, if any.
pub fn active_file<'a>(tree: &'a [TreeNode], current_path: &str) -> Option<&'a TreeNode> {
    for node in tree {
        if is_active(current_path, node) {
            return Some(node);
        }
        if let Some(found) = node.children().and_then(|c| active_file(c, current_path)) {
            return Some(found);
        }
    }
    None
}
