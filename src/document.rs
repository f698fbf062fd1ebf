//! The remote document hierarchy: nodes, remote paths, pre-order traversal.

use std::path::{Path, PathBuf};

/// One entry in the tablet's document hierarchy.
///
/// Nodes are immutable for the duration of a run. The remote path is
/// assigned when the tree is built and is the slash-separated,
/// case-preserving location of the node, unique within its tree.
#[derive(Debug, Clone)]
pub struct DocumentNode {
    /// Device-assigned identifier (a GUID on real hardware).
    pub id: String,
    /// Display name, including any extension the user typed.
    pub name: String,
    pub is_folder: bool,
    pub is_notebook: bool,
    pub is_bookmarked: bool,
    /// Last modification on the device clock, whole seconds since the Unix
    /// epoch, UTC.
    pub modified_timestamp: i64,
    path: String,
    children: Vec<DocumentNode>,
}

impl DocumentNode {
    /// A folder. Folders carry no exportable content of their own.
    pub fn folder(
        id: impl Into<String>,
        name: impl Into<String>,
        children: Vec<DocumentNode>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_folder: true,
            is_notebook: false,
            is_bookmarked: false,
            modified_timestamp: 0,
            path: String::new(),
            children,
        }
    }

    /// A document leaf.
    pub fn document(
        id: impl Into<String>,
        name: impl Into<String>,
        modified_timestamp: i64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_folder: false,
            is_notebook: false,
            is_bookmarked: false,
            modified_timestamp,
            path: String::new(),
            children: Vec::new(),
        }
    }

    pub fn with_notebook(mut self, is_notebook: bool) -> Self {
        self.is_notebook = is_notebook;
        self
    }

    pub fn with_bookmarked(mut self, is_bookmarked: bool) -> Self {
        self.is_bookmarked = is_bookmarked;
        self
    }

    /// Full remote path, e.g. `Work/Projects/Roadmap`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Remote path of the containing folder; `None` for entries that sit
    /// directly in the device root.
    pub fn parent_folder(&self) -> Option<&str> {
        self.path.rsplit_once('/').map(|(parent, _)| parent)
    }

    /// Where the node lives under a local root, using platform separators.
    pub fn local_path(&self, root: &Path) -> PathBuf {
        let mut out = root.to_path_buf();
        for component in self.path.split('/') {
            out.push(component);
        }
        out
    }

    pub fn children(&self) -> &[DocumentNode] {
        &self.children
    }
}

/// The device's document hierarchy, fetched once per run and read-only
/// afterwards.
#[derive(Debug, Clone, Default)]
pub struct DocumentTree {
    roots: Vec<DocumentNode>,
}

impl DocumentTree {
    /// Builds a tree and assigns every node its full remote path.
    pub fn new(mut roots: Vec<DocumentNode>) -> Self {
        assign_paths(&mut roots, "");
        Self { roots }
    }

    pub fn roots(&self) -> &[DocumentNode] {
        &self.roots
    }

    /// Lazy pre-order (depth-first) traversal. Each call restarts from the
    /// first root, so the tree can be walked any number of times.
    pub fn iter(&self) -> PreOrder<'_> {
        PreOrder {
            stack: vec![self.roots.iter()],
        }
    }
}

impl<'a> IntoIterator for &'a DocumentTree {
    type Item = &'a DocumentNode;
    type IntoIter = PreOrder<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

fn assign_paths(nodes: &mut [DocumentNode], prefix: &str) {
    for node in nodes {
        node.path = if prefix.is_empty() {
            node.name.clone()
        } else {
            format!("{prefix}/{}", node.name)
        };
        assign_paths(&mut node.children, &node.path);
    }
}

/// Iterator over a [`DocumentTree`] in pre-order: each folder before its
/// contents, siblings in tree order.
pub struct PreOrder<'a> {
    stack: Vec<std::slice::Iter<'a, DocumentNode>>,
}

impl<'a> Iterator for PreOrder<'a> {
    type Item = &'a DocumentNode;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let top = self.stack.last_mut()?;
            match top.next() {
                Some(node) => {
                    self.stack.push(node.children.iter());
                    return Some(node);
                }
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> DocumentTree {
        DocumentTree::new(vec![
            DocumentNode::folder(
                "f-work",
                "Work",
                vec![
                    DocumentNode::document("d-plan", "Plan", 100),
                    DocumentNode::folder(
                        "f-projects",
                        "Projects",
                        vec![DocumentNode::document("d-roadmap", "Roadmap", 200)],
                    ),
                ],
            ),
            DocumentNode::document("d-inbox", "Inbox", 300),
        ])
    }

    #[test]
    fn preorder_visits_folders_before_their_contents() {
        let tree = sample_tree();
        let names: Vec<_> = tree.iter().map(|node| node.name.as_str()).collect();
        assert_eq!(names, ["Work", "Plan", "Projects", "Roadmap", "Inbox"]);
    }

    #[test]
    fn iteration_can_restart() {
        let tree = sample_tree();
        let first: Vec<_> = tree.iter().map(|node| node.id.clone()).collect();
        let second: Vec<_> = tree.iter().map(|node| node.id.clone()).collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 5);
    }

    #[test]
    fn paths_cover_the_full_hierarchy() {
        let tree = sample_tree();
        let paths: Vec<_> = tree.iter().map(|node| node.path().to_owned()).collect();
        assert_eq!(
            paths,
            [
                "Work",
                "Work/Plan",
                "Work/Projects",
                "Work/Projects/Roadmap",
                "Inbox"
            ]
        );
    }

    #[test]
    fn parent_folder_is_none_at_the_root() {
        let tree = sample_tree();
        let inbox = tree.iter().find(|node| node.id == "d-inbox").unwrap();
        assert_eq!(inbox.parent_folder(), None);

        let roadmap = tree.iter().find(|node| node.id == "d-roadmap").unwrap();
        assert_eq!(roadmap.parent_folder(), Some("Work/Projects"));
    }

    #[test]
    fn local_path_joins_components_under_the_root() {
        let tree = sample_tree();
        let roadmap = tree.iter().find(|node| node.id == "d-roadmap").unwrap();
        let expected: PathBuf = ["/tmp/out", "Work", "Projects", "Roadmap"].iter().collect();
        assert_eq!(roadmap.local_path(Path::new("/tmp/out")), expected);
    }

    #[test]
    fn empty_tree_yields_nothing() {
        let tree = DocumentTree::default();
        assert_eq!(tree.iter().count(), 0);
    }
}
