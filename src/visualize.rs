//! Post-hoc match visualization.
//!
//! Maps a run's trace back onto the analyzed source text: every byte of the
//! source gets one of four display attributes. The core only classifies;
//! mapping attributes to colors is the `render` module's job.

use crate::trace::{Trace, VisitStatus};
use crate::tree::TreeNode;

/// Display classification for one source byte.
///
/// The four-way table is fixed: a byte either belongs to no examinable node,
/// to a node whose pattern position was never reached, or to one whose
/// position failed or succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    NotVisitable,
    NotVisited,
    Failed,
    Matched,
}

impl Attribute {
    pub fn label(&self) -> &'static str {
        match self {
            Attribute::NotVisitable => "not_visitable",
            Attribute::NotVisited => "not_visited",
            Attribute::Failed => "not_matched",
            Attribute::Matched => "matched",
        }
    }
}

/// Per-byte classification of the analyzed source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Visualization {
    attrs: Vec<Attribute>,
}

/// A maximal run of consecutive bytes sharing one attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Run {
    pub start: usize,
    pub end: usize,
    pub attr: Attribute,
}

/// Classify every byte of the analyzed source.
///
/// Enumeration order is the tree's pre-order walk, self first; when source
/// ranges overlap, the last writer in enumeration order wins, so inner
/// (more deeply nested) nodes override their ancestors. Nodes without a
/// source range are skipped; bytes covered by no node stay not-visitable.
pub fn visualize(root: &TreeNode, trace: &Trace, source_len: usize) -> Visualization {
    let mut attrs = vec![Attribute::NotVisitable; source_len];

    for node in root.walk() {
        let Some(span) = node.span else { continue };
        let attr = match trace.node_status(node.id) {
            None => Attribute::NotVisitable,
            Some(VisitStatus::NotVisited) => Attribute::NotVisited,
            Some(VisitStatus::Failed) => Attribute::Failed,
            Some(VisitStatus::Matched) => Attribute::Matched,
        };
        let end = span.end.min(source_len);
        for slot in attrs.iter_mut().take(end).skip(span.start) {
            *slot = attr;
        }
    }

    Visualization { attrs }
}

impl Visualization {
    pub fn attrs(&self) -> &[Attribute] {
        &self.attrs
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    /// Attribute at a byte offset; out-of-range offsets are not visitable.
    pub fn get(&self, offset: usize) -> Attribute {
        self.attrs
            .get(offset)
            .copied()
            .unwrap_or(Attribute::NotVisitable)
    }

    /// (byte offset, attribute) pairs covering the full source extent.
    pub fn iter(&self) -> impl Iterator<Item = (usize, Attribute)> + '_ {
        self.attrs.iter().copied().enumerate()
    }

    /// Coalesced runs of equal attributes, in source order.
    pub fn runs(&self) -> Vec<Run> {
        let mut runs: Vec<Run> = Vec::new();
        for (i, attr) in self.iter() {
            match runs.last_mut() {
                Some(last) if last.attr == attr && last.end == i => last.end = i + 1,
                _ => runs.push(Run {
                    start: i,
                    end: i + 1,
                    attr,
                }),
            }
        }
        runs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::DebugCompiler;
    use crate::pattern::parse_pattern;
    use crate::trace::Trace;
    use crate::tree::{SourceSpan, TreeBuilder, TreeChild};

    /// `1.abs` — (send (int 1) :abs), spans into "1.abs".
    fn int_call_tree() -> TreeNode {
        let mut b = TreeBuilder::new();
        let recv = b.value_node("int", "1", Some(SourceSpan::new(0, 1)));
        b.node(
            "send",
            Some(SourceSpan::new(0, 5)),
            vec![
                TreeChild::Node(recv),
                TreeChild::Name("abs".to_string()),
            ],
        )
    }

    fn run_debug(pattern: &str, tree: &TreeNode) -> Trace {
        let ast = parse_pattern(pattern).unwrap();
        let compiled = DebugCompiler::new().compile(&ast).unwrap();
        let mut trace = Trace::new();
        compiled.run_traced(tree, &mut trace).unwrap();
        trace
    }

    #[test]
    fn all_matched_when_pattern_matches() {
        let tree = int_call_tree();
        let trace = run_debug("(send (int 1) :abs)", &tree);
        let viz = visualize(&tree, &trace, 5);
        assert!(viz.iter().all(|(_, a)| a == Attribute::Matched));
    }

    #[test]
    fn inner_node_overrides_outer() {
        let tree = int_call_tree();
        // Fails on the method name; the receiver wildcard still matched.
        let trace = run_debug("(send _ :foo)", &tree);
        let viz = visualize(&tree, &trace, 5);
        assert_eq!(viz.get(0), Attribute::Matched); // "1" — inner wins
        for i in 1..5 {
            assert_eq!(viz.get(i), Attribute::Failed, "byte {i}");
        }
    }

    #[test]
    fn failed_inner_test_shows_on_receiver() {
        let tree = int_call_tree();
        let trace = run_debug("(send nil? :abs)", &tree);
        let viz = visualize(&tree, &trace, 5);
        // nil? was entered against the receiver node and failed.
        assert_eq!(viz.get(0), Attribute::Failed);
        assert_eq!(viz.get(2), Attribute::Failed);
    }

    #[test]
    fn uncovered_bytes_stay_not_visitable() {
        let tree = int_call_tree();
        let trace = run_debug("(send (int 1) :abs)", &tree);
        // Source longer than any node range: "1.abs  \n"
        let viz = visualize(&tree, &trace, 8);
        assert_eq!(viz.get(5), Attribute::NotVisitable);
        assert_eq!(viz.get(7), Attribute::NotVisitable);
        // Out of range too.
        assert_eq!(viz.get(100), Attribute::NotVisitable);
    }

    #[test]
    fn unreached_slot_renders_not_visited() {
        // foo(1) with pattern failing before the argument slot.
        let mut b = TreeBuilder::new();
        let arg = b.value_node("int", "1", Some(SourceSpan::new(4, 5)));
        let tree = b.node(
            "send",
            Some(SourceSpan::new(0, 6)),
            vec![
                TreeChild::Absent,
                TreeChild::Name("foo".to_string()),
                TreeChild::Node(arg),
            ],
        );
        let trace = run_debug("(send nil? :bar (int 1))", &tree);
        let viz = visualize(&tree, &trace, 6);
        assert_eq!(viz.get(0), Attribute::Failed); // call itself failed
        assert_eq!(viz.get(4), Attribute::NotVisited); // argument never tried
    }

    #[test]
    fn spanless_nodes_are_skipped() {
        let mut b = TreeBuilder::new();
        let recv = b.value_node("int", "1", None); // no span
        let tree = b.node(
            "send",
            Some(SourceSpan::new(0, 5)),
            vec![
                TreeChild::Node(recv),
                TreeChild::Name("abs".to_string()),
            ],
        );
        let trace = run_debug("(send _ :abs)", &tree);
        let viz = visualize(&tree, &trace, 5);
        // The whole range keeps the outer node's attribute.
        assert!(viz.iter().all(|(_, a)| a == Attribute::Matched));
    }

    #[test]
    fn untraced_tree_is_all_not_visitable() {
        let tree = int_call_tree();
        let trace = Trace::new();
        let viz = visualize(&tree, &trace, 5);
        assert!(viz.iter().all(|(_, a)| a == Attribute::NotVisitable));
    }

    #[test]
    fn runs_coalesce() {
        let tree = int_call_tree();
        let trace = run_debug("(send _ :foo)", &tree);
        let viz = visualize(&tree, &trace, 5);
        let runs = viz.runs();
        assert_eq!(runs.len(), 2);
        assert_eq!(
            runs[0],
            Run {
                start: 0,
                end: 1,
                attr: Attribute::Matched
            }
        );
        assert_eq!(
            runs[1],
            Run {
                start: 1,
                end: 5,
                attr: Attribute::Failed
            }
        );
    }

    #[test]
    fn attribute_labels() {
        assert_eq!(Attribute::Matched.label(), "matched");
        assert_eq!(Attribute::Failed.label(), "not_matched");
        assert_eq!(Attribute::NotVisited.label(), "not_visited");
        assert_eq!(Attribute::NotVisitable.label(), "not_visitable");
    }
}
