//! Tag → handler dispatch table.

use std::collections::HashMap;

use super::compiler::Session;
use super::{CompileError, Fragment};
use crate::pattern::PatternAst;

/// Compiles one pattern construct into a matcher fragment.
///
/// Handlers recurse through `Session::compile_child`, so nested constructs
/// go back through dispatch (and through instrumentation in debug mode)
/// without the handler being aware of either.
pub type Handler = fn(&mut Session<'_>, &PatternAst) -> Result<Fragment, CompileError>;

/// The dispatch table owned by a compiler definition.
///
/// `derive()` takes a full snapshot: the derived registry is independently
/// mutable, so registering a handler on it never affects the registry it was
/// derived from or any sibling. Tags with no registered handler resolve to
/// the unknown-construct handler, which fails compilation naming the tag and
/// its position.
#[derive(Clone)]
pub struct Registry {
    handlers: HashMap<&'static str, Handler>,
    unknown: Handler,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            unknown: reject_unknown,
        }
    }

    /// Insert or overwrite the handler for `tag`.
    pub fn register(&mut self, tag: &'static str, handler: Handler) {
        self.handlers.insert(tag, handler);
    }

    /// Full snapshot of this registry, independently mutable afterward.
    pub fn derive(&self) -> Registry {
        self.clone()
    }

    /// Resolve a tag to its handler, or to the unknown-construct handler.
    pub fn resolve(&self, tag: &str) -> Handler {
        self.handlers.get(tag).copied().unwrap_or(self.unknown)
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.handlers.contains_key(tag)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Registered tags, sorted for stable output.
    pub fn tags(&self) -> Vec<&'static str> {
        let mut tags: Vec<&'static str> = self.handlers.keys().copied().collect();
        tags.sort_unstable();
        tags
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// The distinguished unknown-construct handler: compilation fails
/// identifying the unsupported construct and its position.
fn reject_unknown(
    _session: &mut Session<'_>,
    node: &PatternAst,
) -> Result<Fragment, CompileError> {
    Err(CompileError::UnsupportedConstruct {
        tag: node.tag(),
        summary: node.summary(),
        span: node.span,
    })
}
