//! Per-run trace record for debug-compiled matchers.
//!
//! A `Trace` is scoped to exactly one matcher execution: created fresh
//! before a run, consumed after it. Entries are keyed by `PatternId`, the
//! compile-time identity of a pattern position. The trace also keeps a
//! correlation store mapping analyzed-tree node identities to the pattern
//! position that examined them, which is what lets the visualizer color the
//! analyzed source rather than the pattern source.

use std::collections::HashMap;

use crate::tree::NodeId;

/// Identity of one pattern position.
///
/// Assigned during debug compilation in pre-order encounter order, starting
/// at 0. Stable across recompilations of the same pattern tree; meaningless
/// across different patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PatternId(pub u32);

/// Three-way visit status of a pattern position within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitStatus {
    /// Never entered this run.
    NotVisited,
    /// Entered, and the fragment did not report success.
    Failed,
    /// Entered and succeeded.
    Matched,
}

#[derive(Debug, Default)]
pub struct Trace {
    /// pattern position -> succeeded? (present = entered)
    entries: HashMap<PatternId, bool>,
    /// analyzed node -> the pattern position that governs it.
    ///
    /// First writer wins: matching descends pattern and tree in lockstep,
    /// so the first position to examine a node is the one structurally
    /// paired with it; positions entered later against the same node
    /// (a sequence head, a conjunction branch) are components of that
    /// pairing, not replacements for it.
    sites: HashMap<NodeId, PatternId>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `id` as entered, not yet matched. Unconditional: re-entering a
    /// position (rest, descend, a second alternation branch visit) resets
    /// it to pending until its fragment succeeds again.
    pub fn enter(&mut self, id: PatternId) {
        self.entries.insert(id, false);
    }

    /// Mark `id` as succeeded. Only meaningful after `enter`; a later call
    /// simply overwrites.
    pub fn success(&mut self, id: PatternId) {
        self.entries.insert(id, true);
    }

    /// Record that pattern position `pattern` examined analyzed node `node`.
    pub fn record_site(&mut self, node: NodeId, pattern: PatternId) {
        self.sites.entry(node).or_insert(pattern);
    }

    /// Visit status of a pattern position. Looking up an id that was never
    /// entered is not an error; it is the `NotVisited` state.
    pub fn matched(&self, id: PatternId) -> VisitStatus {
        match self.entries.get(&id) {
            None => VisitStatus::NotVisited,
            Some(false) => VisitStatus::Failed,
            Some(true) => VisitStatus::Matched,
        }
    }

    /// The pattern position governing an analyzed node, if any was recorded.
    pub fn site(&self, node: NodeId) -> Option<PatternId> {
        self.sites.get(&node).copied()
    }

    /// Resolved status for an analyzed node: `None` when no pattern position
    /// ever corresponded to it (the "not visitable" case).
    pub fn node_status(&self, node: NodeId) -> Option<VisitStatus> {
        self.site(node).map(|pattern| self.matched(pattern))
    }

    /// Number of pattern positions entered this run.
    pub fn entered_count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.sites.is_empty()
    }
}
