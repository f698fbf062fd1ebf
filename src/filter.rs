//! Narrows the document tree down to the leaves one run should export.

use crate::document::{DocumentNode, DocumentTree};

/// Which documents a run exports. Built once from the invocation arguments
/// and immutable afterwards.
#[derive(Debug, Clone, Default)]
pub struct FilterCriteria {
    pub only_notebooks: bool,
    pub only_bookmarked: bool,
    path_prefix: Option<String>,
}

impl FilterCriteria {
    /// Normalizes the prefix once: at most one leading `/` stripped,
    /// lower-cased, and an empty result disables the prefix filter
    /// entirely.
    pub fn new(only_notebooks: bool, only_bookmarked: bool, path_prefix: Option<&str>) -> Self {
        let path_prefix = path_prefix.and_then(|raw| {
            let normalized = raw.strip_prefix('/').unwrap_or(raw).to_lowercase();
            (!normalized.is_empty()).then_some(normalized)
        });
        Self {
            only_notebooks,
            only_bookmarked,
            path_prefix,
        }
    }

    /// The normalized prefix, if the filter is active.
    pub fn path_prefix(&self) -> Option<&str> {
        self.path_prefix.as_deref()
    }

    fn matches_prefix(&self, path: &str) -> bool {
        match &self.path_prefix {
            Some(prefix) => path.to_lowercase().starts_with(prefix),
            None => true,
        }
    }
}

/// All non-folder nodes that survive the criteria, in the tree's pre-order.
///
/// The predicates are independent conjunctions; folders are dropped up
/// front and never exported, even when their path matches.
pub fn exportable_leaves<'a>(
    tree: &'a DocumentTree,
    criteria: &FilterCriteria,
) -> Vec<&'a DocumentNode> {
    tree.iter()
        .filter(|doc| !doc.is_folder)
        .filter(|doc| criteria.matches_prefix(doc.path()))
        .filter(|doc| !criteria.only_notebooks || doc.is_notebook)
        .filter(|doc| !criteria.only_bookmarked || doc.is_bookmarked)
        .collect()
}
