//! Pattern compilation — registry dispatch, base compiler, debug overlay.
//!
//! A parsed `PatternAst` is compiled top-down into a tree of `Fragment`
//! closures; the composed root fragment plus its declared call parameters
//! form a `CompiledPattern`. The base compiler (`compiler::Compiler`)
//! produces plain matchers; `debug::DebugCompiler` produces matchers whose
//! every fragment additionally records enter/success events into a `Trace`.

pub mod compiler;
pub mod debug;
pub mod registry;

use std::error::Error;
use std::fmt;

pub use compiler::{default_registry, Compiler, CurrentNode, Session};
pub use debug::DebugCompiler;
pub use registry::{Handler, Registry};

use crate::trace::{PatternId, Trace};
use crate::tree::{NodeId, SourceSpan, TreeChild, TreeNode};

/// What a fragment is matched against at run time.
///
/// Mirrors the three shapes a child slot can take in the analyzed tree.
#[derive(Debug, Clone, Copy)]
pub enum Target<'t> {
    Node(&'t TreeNode),
    Absent,
    Name(&'t str),
}

impl<'t> Target<'t> {
    pub fn from_child(child: &'t TreeChild) -> Target<'t> {
        match child {
            TreeChild::Node(n) => Target::Node(n),
            TreeChild::Absent => Target::Absent,
            TreeChild::Name(s) => Target::Name(s),
        }
    }
}

/// Owned value captured by a `$` position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Captured {
    Node {
        id: NodeId,
        tag: String,
        span: Option<SourceSpan>,
    },
    Name(String),
    Absent,
}

impl Captured {
    pub fn of_target(target: &Target<'_>) -> Captured {
        match target {
            Target::Node(n) => Captured::Node {
                id: n.id,
                tag: n.tag.clone(),
                span: n.span,
            },
            Target::Absent => Captured::Absent,
            Target::Name(s) => Captured::Name((*s).to_string()),
        }
    }
}

/// Mutable per-run state threaded through fragment execution.
///
/// Trace operations are no-ops when no trace is attached (plain matchers)
/// and never fail: instrumentation must not introduce new failure modes.
pub struct RunState<'r> {
    captures: Vec<Captured>,
    trace: Option<&'r mut Trace>,
}

impl<'r> RunState<'r> {
    pub(crate) fn new(trace: Option<&'r mut Trace>) -> Self {
        Self {
            captures: Vec::new(),
            trace,
        }
    }

    pub fn captures(&self) -> &[Captured] {
        &self.captures
    }

    /// Current capture count, used as a rollback mark.
    pub fn capture_mark(&self) -> usize {
        self.captures.len()
    }

    /// Reserve a capture slot, keeping captures in pattern position order
    /// even when inner captures complete before outer ones.
    pub fn reserve_capture(&mut self) -> usize {
        self.captures.push(Captured::Absent);
        self.captures.len() - 1
    }

    pub fn set_capture(&mut self, slot: usize, value: Captured) {
        if let Some(entry) = self.captures.get_mut(slot) {
            *entry = value;
        }
    }

    /// Discard captures made after `mark` (failed branch rollback).
    pub fn truncate_captures(&mut self, mark: usize) {
        self.captures.truncate(mark);
    }

    pub fn trace_enter(&mut self, id: PatternId, target: &Target<'_>) {
        if let Some(trace) = self.trace.as_deref_mut() {
            trace.enter(id);
            if let Target::Node(node) = target {
                trace.record_site(node.id, id);
            }
        }
    }

    pub fn trace_success(&mut self, id: PatternId) {
        if let Some(trace) = self.trace.as_deref_mut() {
            trace.success(id);
        }
    }

    /// Pre-register the pairing of an analyzed node with the pattern
    /// position planned to examine it (sequence slot alignment).
    pub fn trace_site(&mut self, node: NodeId, pattern: PatternId) {
        if let Some(trace) = self.trace.as_deref_mut() {
            trace.record_site(node, pattern);
        }
    }
}

/// One compiled matcher fragment.
///
/// Fragments compose: container handlers hold their children's fragments and
/// invoke them against sub-targets. In debug mode a fragment knows its own
/// pattern-position identity so sequences can pre-register slot pairings.
pub struct Fragment {
    id: Option<PatternId>,
    matcher: Box<dyn Fn(&Target<'_>, &mut RunState<'_>) -> bool + Send + Sync>,
}

impl Fragment {
    pub fn new(
        matcher: impl Fn(&Target<'_>, &mut RunState<'_>) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: None,
            matcher: Box::new(matcher),
        }
    }

    pub(crate) fn with_id(
        id: PatternId,
        matcher: impl Fn(&Target<'_>, &mut RunState<'_>) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: Some(id),
            matcher: Box::new(matcher),
        }
    }

    pub fn matches(&self, target: &Target<'_>, state: &mut RunState<'_>) -> bool {
        (self.matcher)(target, state)
    }

    /// Pattern-position identity, present only under debug compilation.
    pub fn id(&self) -> Option<PatternId> {
        self.id
    }
}

/// Named parameters a compiled matcher requires at call time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Param {
    /// The analyzed-tree root to match against.
    Root,
    /// A fresh trace record (debug-compiled matchers only).
    Trace,
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::Root => write!(f, "root"),
            Param::Trace => write!(f, "trace"),
        }
    }
}

/// Result of one matcher execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchOutcome {
    pub matched: bool,
    /// Capture values in pattern position order; empty unless matched.
    pub captures: Vec<Captured>,
}

/// One instrumented pattern position (debug compilation artifact).
#[derive(Debug, Clone)]
pub struct PositionInfo {
    pub id: PatternId,
    /// DSL rendering of the construct at this position.
    pub summary: String,
    /// Byte range of the construct in the pattern source.
    pub span: SourceSpan,
}

/// A pattern compiled to executable matcher logic.
pub struct CompiledPattern {
    pub(crate) fragment: Fragment,
    pub(crate) params: Vec<Param>,
    pub(crate) positions: Vec<PositionInfo>,
}

impl CompiledPattern {
    /// The declared, enumerable set of parameters this matcher requires.
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Pattern-position table; empty for plain (non-debug) compilations.
    pub fn positions(&self) -> &[PositionInfo] {
        &self.positions
    }

    /// Run a plain-compiled matcher against an analyzed tree.
    pub fn run(&self, root: &TreeNode) -> Result<MatchOutcome, CallError> {
        if self.params.contains(&Param::Trace) {
            return Err(CallError::MissingTrace);
        }
        Ok(self.execute(root, None))
    }

    /// Run a debug-compiled matcher, recording into `trace`.
    ///
    /// The trace must be fresh: traces are scoped to a single execution.
    pub fn run_traced(&self, root: &TreeNode, trace: &mut Trace) -> Result<MatchOutcome, CallError> {
        if !self.params.contains(&Param::Trace) {
            return Err(CallError::UnexpectedTrace);
        }
        Ok(self.execute(root, Some(trace)))
    }

    fn execute(&self, root: &TreeNode, trace: Option<&mut Trace>) -> MatchOutcome {
        let mut state = RunState::new(trace);
        let matched = self.fragment.matches(&Target::Node(root), &mut state);
        let captures = if matched { state.captures } else { Vec::new() };
        MatchOutcome { matched, captures }
    }
}

/// Contract violation at matcher call time: the supplied parameter set does
/// not equal the matcher's declared parameter set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallError {
    /// A debug-compiled matcher was invoked without a trace record.
    MissingTrace,
    /// A plain-compiled matcher was invoked with a trace it never writes.
    UnexpectedTrace,
}

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallError::MissingTrace => {
                write!(f, "debug-compiled matcher requires a trace parameter")
            }
            CallError::UnexpectedTrace => {
                write!(f, "plain-compiled matcher does not accept a trace parameter")
            }
        }
    }
}

impl Error for CallError {}

/// Fatal compile-time failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// The construct's type tag has no registered handler.
    UnsupportedConstruct {
        tag: &'static str,
        summary: String,
        span: SourceSpan,
    },
    /// `...` may only appear as a direct child of a sequence.
    RestOutsideSequence { span: SourceSpan },
    /// At most one `...` per sequence.
    DuplicateRest { span: SourceSpan },
    /// A handler was dispatched a construct of a different kind than the
    /// tag it was registered under (misconfigured registry).
    HandlerMismatch {
        tag: &'static str,
        span: SourceSpan,
    },
}

impl CompileError {
    pub fn span(&self) -> SourceSpan {
        match self {
            CompileError::UnsupportedConstruct { span, .. }
            | CompileError::RestOutsideSequence { span }
            | CompileError::DuplicateRest { span }
            | CompileError::HandlerMismatch { span, .. } => *span,
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::UnsupportedConstruct { tag, summary, span } => write!(
                f,
                "unsupported pattern construct `{summary}` (tag `{tag}`) at bytes {}..{}",
                span.start, span.end
            ),
            CompileError::RestOutsideSequence { span } => write!(
                f,
                "`...` outside a sequence at bytes {}..{}",
                span.start, span.end
            ),
            CompileError::DuplicateRest { span } => write!(
                f,
                "multiple `...` in one sequence at bytes {}..{}",
                span.start, span.end
            ),
            CompileError::HandlerMismatch { tag, span } => write!(
                f,
                "handler for tag `{tag}` received a different construct at bytes {}..{}",
                span.start, span.end
            ),
        }
    }
}

impl Error for CompileError {}
