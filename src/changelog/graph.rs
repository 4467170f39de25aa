//! Supplant graph
//!
//! Revisions are nodes; a commit adds an edge from every revision it
//! supplants to the committed revision. Leaves are nodes without an outgoing
//! "supplanted-by" edge. Built purely from commits, no storage involved.

use super::Commit;
use crate::types::RevisionId;
use std::collections::{HashMap, HashSet, VecDeque};

/// Why a proposed commit does not fit the current frontier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// History is non-empty but the commit names nothing to supplant.
    NothingSupplanted { leaves: Vec<RevisionId> },
    /// Some supplanted revisions are not current leaves.
    StaleSupplants { stale: Vec<RevisionId> },
    /// The revision already appears in the history.
    AlreadyCommitted(RevisionId),
}

impl Rejection {
    pub fn rejected(&self) -> Vec<RevisionId> {
        match self {
            Rejection::NothingSupplanted { .. } => Vec::new(),
            Rejection::StaleSupplants { stale } => stale.clone(),
            Rejection::AlreadyCommitted(rev) => vec![*rev],
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Rejection::NothingSupplanted { leaves } => format!(
                "commit supplants nothing but {} leaf revision(s) exist",
                leaves.len()
            ),
            Rejection::StaleSupplants { stale } => {
                let ids: Vec<String> = stale.iter().map(|id| id.to_string()).collect();
                format!("not current leaves: {}", ids.join(", "))
            }
            Rejection::AlreadyCommitted(rev) => format!("revision {} already committed", rev),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SupplantGraph {
    /// Committed revisions in commit order
    order: Vec<RevisionId>,
    supplants: HashMap<RevisionId, Vec<RevisionId>>,
    /// First commit that supplanted each revision
    supplanted_by: HashMap<RevisionId, RevisionId>,
    default_type: Option<String>,
}

impl SupplantGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_commits<'a, I>(commits: I) -> Self
    where
        I: IntoIterator<Item = &'a Commit>,
    {
        let mut graph = Self::new();
        for commit in commits {
            graph.push(commit);
        }
        graph
    }

    /// Record an already accepted commit. A revision never supplants itself,
    /// so the head always stays a leaf.
    pub fn push(&mut self, commit: &Commit) {
        for old in commit.supplants.iter().filter(|old| **old != commit.revision) {
            self.supplanted_by.entry(*old).or_insert(commit.revision);
        }
        self.supplants
            .insert(commit.revision, commit.supplants.clone());
        self.order.push(commit.revision);
        if self.default_type.is_none() {
            self.default_type = commit.content_type.clone();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn contains(&self, rev: &RevisionId) -> bool {
        self.supplants.contains_key(rev)
    }

    /// Revision of the latest commit.
    pub fn head(&self) -> Option<RevisionId> {
        self.order.last().copied()
    }

    /// First content type any commit declared.
    pub fn default_type(&self) -> Option<&str> {
        self.default_type.as_deref()
    }

    pub fn is_leaf(&self, rev: &RevisionId) -> bool {
        self.contains(rev) && !self.supplanted_by.contains_key(rev)
    }

    /// Committed revisions that nothing has supplanted, in commit order.
    pub fn leaves(&self) -> Vec<RevisionId> {
        self.order
            .iter()
            .filter(|rev| !self.supplanted_by.contains_key(*rev))
            .copied()
            .collect()
    }

    pub fn supplanted_by(&self, rev: &RevisionId) -> Option<RevisionId> {
        self.supplanted_by.get(rev).copied()
    }

    /// Every revision transitively supplanted by `rev`, nearest first.
    pub fn ancestors(&self, rev: &RevisionId) -> Vec<RevisionId> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let mut queue: VecDeque<RevisionId> = self
            .supplants
            .get(rev)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default();
        while let Some(next) = queue.pop_front() {
            if !seen.insert(next) {
                continue;
            }
            out.push(next);
            if let Some(parents) = self.supplants.get(&next) {
                queue.extend(parents.iter().copied());
            }
        }
        out
    }

    /// Decide whether committing `revision` supplanting `supplants` is allowed.
    ///
    /// The first commit is always accepted. After that the commit must name at
    /// least one revision, and every named revision must be a current leaf.
    pub fn check(&self, revision: &RevisionId, supplants: &[RevisionId]) -> Result<(), Rejection> {
        if self.is_empty() {
            return Ok(());
        }
        if self.contains(revision) {
            return Err(Rejection::AlreadyCommitted(*revision));
        }
        if supplants.is_empty() {
            return Err(Rejection::NothingSupplanted {
                leaves: self.leaves(),
            });
        }
        let stale: Vec<RevisionId> = supplants
            .iter()
            .filter(|rev| !self.is_leaf(rev))
            .copied()
            .collect();
        if !stale.is_empty() {
            return Err(Rejection::StaleSupplants { stale });
        }
        Ok(())
    }
}

/// Remove duplicates, keeping first occurrences in order.
pub fn dedup_supplants(supplants: &[RevisionId]) -> Vec<RevisionId> {
    let mut seen = HashSet::new();
    supplants.iter().filter(|id| seen.insert(**id)).copied().collect()
}
