//! Content-type heads
//!
//! O(1) access to the latest committed revision for each content type of a
//! resource. Rebuilt from the changelog; never persisted on its own.

use crate::changelog::Commit;
use crate::types::RevisionId;
use std::collections::HashMap;

/// Head index: content type -> RevisionId
#[derive(Debug, Clone, Default)]
pub struct HeadIndex {
    pub(crate) heads: HashMap<String, RevisionId>,
}

impl HeadIndex {
    pub fn new() -> Self {
        HeadIndex {
            heads: HashMap::new(),
        }
    }

    /// Index every typed commit; later commits win.
    pub fn from_commits<'a, I>(commits: I) -> Self
    where
        I: IntoIterator<Item = &'a Commit>,
    {
        let mut index = Self::new();
        for commit in commits {
            index.record(commit);
        }
        index
    }

    pub fn record(&mut self, commit: &Commit) {
        if let Some(content_type) = &commit.content_type {
            self.update_head(content_type, &commit.revision);
        }
    }

    pub fn get_head(&self, content_type: &str) -> Option<RevisionId> {
        self.heads.get(content_type).copied()
    }

    pub fn update_head(&mut self, content_type: &str, revision: &RevisionId) {
        self.heads.insert(content_type.to_string(), *revision);
    }

    /// Content types that have at least one commit, sorted.
    pub fn content_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.heads.keys().cloned().collect();
        types.sort();
        types
    }
}
