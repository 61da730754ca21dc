use std::collections::HashSet;

use crate::models::{FolderOption, TreeNode};
use crate::navigation;

/// A row of the rendered tree view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeRow<'a> {
    pub depth: usize,
    pub node: &'a TreeNode,
    /// Directory rows: whether the folder is expanded
    pub open: bool,
    /// File rows: whether this note is the one being viewed
    pub active: bool,
}

/// Expand/collapse state of the sidebar tree.
///
/// Owns the current index tree and the set of expanded directory paths.
/// Paths that disappear when the tree is replaced stay in the set; they are
/// only ever tested for membership, so they have no effect.
#[derive(Debug, Clone, Default)]
pub struct TreeState {
    tree: Vec<TreeNode>,
    expanded: HashSet<String>,
}

impl TreeState {
    pub fn new(tree: Vec<TreeNode>) -> Self {
        Self {
            tree,
            expanded: HashSet::new(),
        }
    }

    pub fn tree(&self) -> &[TreeNode] {
        &self.tree
    }

    /// Replaces the tree, e.g. after the index was regenerated. The expansion
    /// set is kept.
    pub fn set_tree(&mut self, tree: Vec<TreeNode>) {
        self.tree = tree;
    }

    pub fn expanded_paths(&self) -> &HashSet<String> {
        &self.expanded
    }

    pub fn is_expanded(&self, path: &str) -> bool {
        self.expanded.contains(path)
    }

    /// Every directory path of the tree, in pre-order.
    pub fn all_directory_paths(&self) -> Vec<String> {
        fn walk(nodes: &[TreeNode], dirs: &mut Vec<String>) {
            for node in nodes {
                if let TreeNode::Directory { path, children, .. } = node {
                    dirs.push(path.clone());
                    walk(children, dirs);
                }
            }
        }

        let mut dirs = Vec::new();
        walk(&self.tree, &mut dirs);
        dirs
    }

    /// True iff there is at least one directory and all of them are expanded.
    pub fn is_fully_expanded(&self) -> bool {
        let dirs = self.all_directory_paths();
        !dirs.is_empty() && dirs.iter().all(|path| self.expanded.contains(path))
    }

    /// Flips one directory, leaving every other path alone.
    pub fn toggle(&mut self, path: &str) {
        if !self.expanded.remove(path) {
            self.expanded.insert(path.to_string());
        }
    }

    /// Expands every folder containing the file at `file_path`.
    ///
    /// Nothing is collapsed. Root-level files and the root path are no-ops.
    pub fn expand_ancestors_of(&mut self, file_path: &str) {
        let relative = navigation::relative_path(file_path);
        let segments: Vec<&str> = relative.split('/').filter(|s| !s.is_empty()).collect();
        if segments.len() <= 1 {
            return;
        }

        for depth in 1..segments.len() {
            self.expanded.insert(segments[..depth].join("/"));
        }
    }

    /// Replaces the expansion set with every directory path.
    pub fn expand_all(&mut self) {
        self.expanded = self.all_directory_paths().into_iter().collect();
    }

    /// Replaces the expansion set with the empty set.
    pub fn collapse_all(&mut self) {
        self.expanded = HashSet::new();
    }

    /// Collapses everything when fully expanded, otherwise expands everything.
    pub fn toggle_all(&mut self) {
        if self.is_fully_expanded() {
            self.collapse_all();
        } else {
            self.expand_all();
        }
    }

    /// Target folders offered when creating a note or folder: the root
    /// first, then every directory indented by depth.
    pub fn folder_options(&self) -> Vec<FolderOption> {
        fn walk(nodes: &[TreeNode], depth: usize, options: &mut Vec<FolderOption>) {
            for node in nodes {
                if let TreeNode::Directory { path, children, .. } = node {
                    let indent = if depth > 0 {
                        format!("{}- ", "  ".repeat(depth))
                    } else {
                        String::new()
                    };
                    options.push(FolderOption {
                        label: format!("{}{}", indent, path),
                        path: path.clone(),
                    });
                    walk(children, depth + 1, options);
                }
            }
        }

        let mut options = vec![FolderOption {
            label: "/".to_string(),
            path: String::new(),
        }];
        walk(&self.tree, 0, &mut options);
        options
    }

    /// Rows currently visible in the tree view; children of collapsed
    /// directories are skipped.
    pub fn visible_rows(&self, current_path: &str) -> Vec<TreeRow<'_>> {
        let mut rows = Vec::new();
        self.collect_rows(&self.tree, 0, current_path, &mut rows);
        rows
    }

    fn collect_rows<'a>(
        &'a self,
        nodes: &'a [TreeNode],
        depth: usize,
        current_path: &str,
        rows: &mut Vec<TreeRow<'a>>,
    ) {
        for node in nodes {
            match node {
                TreeNode::Directory { path, children, .. } => {
                    let open = self.expanded.contains(path);
                    rows.push(TreeRow {
                        depth,
                        node,
                        open,
                        active: false,
                    });
                    if open {
                        self.collect_rows(children, depth + 1, current_path, rows);
                    }
                }
                TreeNode::File { .. } => rows.push(TreeRow {
                    depth,
                    node,
                    open: false,
                    active: navigation::is_active(current_path, node),
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_tree() -> Vec<TreeNode> {
        vec![
            TreeNode::directory(
                "a",
                "a",
                vec![
                    TreeNode::directory(
                        "b",
                        "a/b",
                        vec![TreeNode::file("c.md", "a/b/c.md", "C")],
                    ),
                    TreeNode::file("x.md", "a/x.md", "X"),
                ],
            ),
            TreeNode::directory("d", "d", vec![TreeNode::file("e.md", "d/e.md", "E")]),
            TreeNode::file("root.md", "root.md", "Root"),
        ]
    }

    fn set(paths: &[&str]) -> HashSet<String> {
        paths.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_all_directory_paths_pre_order() {
        let state = TreeState::new(sample_tree());
        assert_eq!(state.all_directory_paths(), vec!["a", "a/b", "d"]);
    }

    #[test]
    fn test_expand_ancestors() {
        let mut state = TreeState::new(sample_tree());
        state.expand_ancestors_of("a/b/c.md");
        assert_eq!(state.expanded_paths(), &set(&["a", "a/b"]));

        // Leading slash and root-level files
        let mut state = TreeState::new(sample_tree());
        state.expand_ancestors_of("/a/b/c.md");
        assert_eq!(state.expanded_paths(), &set(&["a", "a/b"]));

        let mut state = TreeState::new(sample_tree());
        state.expand_ancestors_of("root.md");
        state.expand_ancestors_of("/");
        assert!(state.expanded_paths().is_empty());
    }

    #[test]
    fn test_expand_ancestors_keeps_other_folders() {
        let mut state = TreeState::new(sample_tree());
        state.toggle("d");
        state.expand_ancestors_of("/a/x.md");
        assert_eq!(state.expanded_paths(), &set(&["a", "d"]));
    }

    #[test]
    fn test_toggle_flips_one_path() {
        let mut state = TreeState::new(sample_tree());
        state.toggle("a");
        state.toggle("d");
        state.toggle("a");
        assert_eq!(state.expanded_paths(), &set(&["d"]));
    }

    #[test]
    fn test_expand_collapse_all() {
        let mut state = TreeState::new(sample_tree());
        assert!(!state.is_fully_expanded());

        state.expand_all();
        assert!(state.is_fully_expanded());

        state.collapse_all();
        assert!(!state.is_fully_expanded());
        assert!(state.expanded_paths().is_empty());

        state.toggle_all();
        assert!(state.is_fully_expanded());
        state.toggle_all();
        assert!(state.expanded_paths().is_empty());
    }

    #[test]
    fn test_no_directories_is_never_fully_expanded() {
        let mut state = TreeState::new(vec![TreeNode::file("a.md", "a.md", "A")]);
        state.expand_all();
        assert!(!state.is_fully_expanded());

        let mut state = TreeState::default();
        state.toggle_all();
        assert!(!state.is_fully_expanded());
    }

    #[test]
    fn test_stale_paths_are_harmless() {
        let mut state = TreeState::new(sample_tree());
        state.expand_all();
        state.toggle("gone/away");
        state.set_tree(vec![TreeNode::directory(
            "d",
            "d",
            vec![TreeNode::file("e.md", "d/e.md", "E")],
        )]);

        assert!(state.is_fully_expanded());
        assert!(state.is_expanded("a"));
    }

    #[test]
    fn test_folder_options() {
        let state = TreeState::new(sample_tree());
        let labels: Vec<_> = state
            .folder_options()
            .into_iter()
            .map(|o| (o.label, o.path))
            .collect();
        assert_eq!(
            labels,
            vec![
                ("/".to_string(), String::new()),
                ("a".to_string(), "a".to_string()),
                ("  - a/b".to_string(), "a/b".to_string()),
                ("d".to_string(), "d".to_string()),
            ]
        );
    }

    #[test]
    fn test_visible_rows() {
        let mut state = TreeState::new(sample_tree());
        state.expand_ancestors_of("/a/b/c.md");

        let rows = state.visible_rows("/a/b/c.md");
        let paths: Vec<_> = rows.iter().map(|r| (r.depth, r.node.path())).collect();
        assert_eq!(
            paths,
            vec![
                (0, "a"),
                (1, "a/b"),
                (2, "a/b/c.md"),
                (1, "a/x.md"),
                (0, "d"),
                (0, "root.md"),
            ]
        );
        assert_eq!(rows.iter().filter(|r| r.active).count(), 1);
        assert!(rows[2].active);
        assert!(rows[0].open && !rows[4].open);
    }

    #[test]
    fn test_visible_rows_for_path_without_leading_slash() {
        let mut state = TreeState::new(sample_tree());
        state.expand_ancestors_of("a/b/c.md");

        let rows = state.visible_rows("a/b/c.md");
        let active: Vec<_> = rows.iter().filter(|r| r.active).map(|r| r.node.path()).collect();
        assert_eq!(active, vec!["a/b/c.md"]);
    }

    fn path_strategy() -> impl Strategy<Value = String> {
        proptest::collection::vec("[a-z]{1,4}", 1..5).prop_map(|parts| parts.join("/"))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Every proper prefix of the path ends up expanded, nothing else is
        /// added.
        #[test]
        fn prop_expand_ancestors_adds_exactly_prefixes(path in path_strategy()) {
            let mut state = TreeState::default();
            state.expand_ancestors_of(&path);

            let segments: Vec<&str> = path.split('/').collect();
            prop_assert_eq!(state.expanded_paths().len(), {
                let prefixes: HashSet<String> = (1..segments.len()).map(|i| segments[..i].join("/")).collect();
                prefixes.len()
            });
            for i in 1..segments.len() {
                prop_assert!(state.is_expanded(&segments[..i].join("/")));
            }
            prop_assert!(!state.is_expanded(&path));
        }

        /// Toggling twice restores the previous set.
        #[test]
        fn prop_double_toggle_is_identity(initial in proptest::collection::hash_set("[a-z]{1,3}", 0..6), path in "[a-z]{1,3}") {
            let mut state = TreeState::default();
            for p in &initial {
                state.toggle(p);
            }
            let before = state.expanded_paths().clone();
            state.toggle(&path);
            state.toggle(&path);
            prop_assert_eq!(state.expanded_paths(), &before);
        }
    }
}
