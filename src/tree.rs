//! Analyzed-tree representation.
//!
//! Compiled matchers run against this tree, not against Prism nodes directly:
//! trace correlation needs owned nodes with stable identities and source
//! ranges, which borrowed parser nodes cannot provide. The `ruby` module
//! builds these trees from Prism parse results; tests build them by hand
//! through `TreeBuilder`.

/// Identity of a node within one analyzed tree.
///
/// Assigned by `TreeBuilder`, unique within a single tree only. Two
/// structurally identical nodes in different trees (or different positions
/// of the same tree) have different identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// Half-open byte range into a source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceSpan {
    pub start: usize,
    pub end: usize,
}

impl SourceSpan {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Smallest span covering both `self` and `other`.
    pub fn join(&self, other: SourceSpan) -> SourceSpan {
        SourceSpan {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// One node of the analyzed tree.
#[derive(Debug, Clone)]
pub struct TreeNode {
    pub id: NodeId,
    /// Parser-gem-style type tag: "send", "block", "int", ...
    pub tag: String,
    pub children: Vec<TreeChild>,
    /// Byte range in the analyzed source. Nodes synthesized without a
    /// source position carry `None` and are skipped by the visualizer.
    pub span: Option<SourceSpan>,
}

/// A child slot of a tree node.
///
/// Child slots are heterogeneous: some are nested nodes, some are absent
/// optional slots (a call with no receiver), and some are bare names or
/// literal values (a method name, a symbol's text).
#[derive(Debug, Clone)]
pub enum TreeChild {
    Node(TreeNode),
    Absent,
    Name(String),
}

impl TreeNode {
    /// Pre-order walk over this node and all descendant nodes, self first.
    pub fn walk(&self) -> Walk<'_> {
        Walk { stack: vec![self] }
    }

    /// The value text of a value-only node (first `Name` child), if any.
    pub fn value(&self) -> Option<&str> {
        self.children.iter().find_map(|c| match c {
            TreeChild::Name(s) => Some(s.as_str()),
            _ => None,
        })
    }

    /// Number of descendant nodes including self.
    pub fn node_count(&self) -> usize {
        self.walk().count()
    }
}

pub struct Walk<'t> {
    stack: Vec<&'t TreeNode>,
}

impl<'t> Iterator for Walk<'t> {
    type Item = &'t TreeNode;

    fn next(&mut self) -> Option<&'t TreeNode> {
        let node = self.stack.pop()?;
        // Push in reverse so children come off the stack left to right.
        for child in node.children.iter().rev() {
            if let TreeChild::Node(n) = child {
                self.stack.push(n);
            }
        }
        Some(node)
    }
}

/// Assigns node identities while a tree is being constructed.
///
/// One builder per tree; reusing a builder across trees would make
/// identities collide.
#[derive(Debug, Default)]
pub struct TreeBuilder {
    next: u32,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(
        &mut self,
        tag: &str,
        span: Option<SourceSpan>,
        children: Vec<TreeChild>,
    ) -> TreeNode {
        let id = NodeId(self.next);
        self.next += 1;
        TreeNode {
            id,
            tag: tag.to_string(),
            children,
            span,
        }
    }

    /// Leaf node with no children.
    pub fn leaf(&mut self, tag: &str, span: Option<SourceSpan>) -> TreeNode {
        self.node(tag, span, Vec::new())
    }

    /// Value-only node: tag plus a single `Name` child holding its text.
    pub fn value_node(&mut self, tag: &str, value: &str, span: Option<SourceSpan>) -> TreeNode {
        self.node(tag, span, vec![TreeChild::Name(value.to_string())])
    }
}
