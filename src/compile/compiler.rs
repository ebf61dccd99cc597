//! Base pattern compiler.
//!
//! A single top-down pass: `Session::compile` looks the construct's tag up
//! in the registry and invokes the resolved handler with the session
//! pointing at that construct. Handlers emit `Fragment` closures and recurse
//! through the session for child constructs, so derived compilers and the
//! debug overlay both act purely through dispatch.
//!
//! Matching semantics (wildcard/absent/name behavior, permissive `#helper`
//! and `%param` refs, `...` alignment) follow the NodePattern runtime rules;
//! `^parent` refs compile permissively because the analyzed tree carries no
//! parent links.

use super::debug::Instrument;
use super::registry::Registry;
use super::{
    Captured, CompileError, CompiledPattern, Fragment, Param, RunState, Target,
};
use crate::pattern::{PatternAst, PatternKind};
use crate::tree::{SourceSpan, TreeChild, TreeNode};

/// The pattern construct a session is currently compiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentNode {
    pub tag: &'static str,
    pub span: SourceSpan,
}

/// Per-compilation mutable context, threaded through handler recursion.
///
/// Lifetime: one top-level `Compiler::compile` call and every nested compile
/// it triggers. The current-construct slot and the in-sequence flag follow
/// stack discipline: both are restored when a nested compile returns,
/// including on error paths, so enclosing handlers and subsequent
/// compilations observe consistent state.
pub struct Session<'c> {
    registry: &'c Registry,
    current: Option<CurrentNode>,
    in_sequence: bool,
    params: Vec<Param>,
    instrument: Option<Instrument>,
}

impl<'c> Session<'c> {
    pub(crate) fn new(registry: &'c Registry, instrument: Option<Instrument>) -> Self {
        Self {
            registry,
            current: None,
            in_sequence: false,
            params: vec![Param::Root],
            instrument,
        }
    }

    /// The construct currently being compiled (error/context reporting).
    pub fn current(&self) -> Option<CurrentNode> {
        self.current
    }

    /// Whether the construct being compiled sits in a sequence position.
    pub fn in_sequence(&self) -> bool {
        self.in_sequence
    }

    /// Declare a call parameter the generated matcher must receive.
    pub fn require_param(&mut self, param: Param) {
        if !self.params.contains(&param) {
            self.params.push(param);
        }
    }

    /// Dispatch one construct through the registry.
    pub fn compile(&mut self, node: &PatternAst) -> Result<Fragment, CompileError> {
        let handler = self.registry.resolve(node.tag());
        let id = self.instrument.as_mut().map(|inst| inst.assign(node));
        let saved = self.current.replace(CurrentNode {
            tag: node.tag(),
            span: node.span,
        });
        let result = handler(self, node);
        self.current = saved;
        let fragment = result?;
        Ok(match id {
            Some(id) => super::debug::instrument_fragment(id, fragment),
            None => fragment,
        })
    }

    /// Compile a child construct with the sequence-position flag forced to
    /// `in_sequence`; the caller's flag is restored on exit, error or not.
    pub fn compile_child(
        &mut self,
        node: &PatternAst,
        in_sequence: bool,
    ) -> Result<Fragment, CompileError> {
        let saved = std::mem::replace(&mut self.in_sequence, in_sequence);
        let result = self.compile(node);
        self.in_sequence = saved;
        result
    }

    pub(crate) fn into_artifact(self, fragment: Fragment) -> CompiledPattern {
        let positions = self
            .instrument
            .map(|inst| inst.into_positions())
            .unwrap_or_default();
        CompiledPattern {
            fragment,
            params: self.params,
            positions,
        }
    }
}

/// The plain (non-instrumenting) compiler.
pub struct Compiler {
    registry: Registry,
}

impl Compiler {
    pub fn new() -> Self {
        Self::with_registry(default_registry())
    }

    pub fn with_registry(registry: Registry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn compile(&self, pattern: &PatternAst) -> Result<CompiledPattern, CompileError> {
        let mut session = Session::new(&self.registry, None);
        let fragment = session.compile(pattern)?;
        Ok(session.into_artifact(fragment))
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry with handlers for every construct the parser produces.
pub fn default_registry() -> Registry {
    let mut registry = Registry::new();
    registry.register("sequence", compile_sequence);
    registry.register("alternatives", compile_alternatives);
    registry.register("conjunction", compile_conjunction);
    registry.register("capture", compile_capture);
    registry.register("wildcard", compile_wildcard);
    registry.register("rest", compile_rest);
    registry.register("negation", compile_negation);
    registry.register("helper", compile_helper);
    registry.register("symbol", compile_symbol);
    registry.register("int", compile_int);
    registry.register("float", compile_float);
    registry.register("str", compile_str);
    registry.register("nil_predicate", compile_nil_predicate);
    registry.register("true", compile_true);
    registry.register("false", compile_false);
    registry.register("nil", compile_nil);
    registry.register("param", compile_param);
    registry.register("type_predicate", compile_type_predicate);
    registry.register("node_type", compile_node_type);
    registry.register("parent", compile_parent);
    registry.register("descend", compile_descend);
    registry
}

fn mismatch(node: &PatternAst) -> CompileError {
    CompileError::HandlerMismatch {
        tag: node.tag(),
        span: node.span,
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

pub fn compile_sequence(
    session: &mut Session<'_>,
    node: &PatternAst,
) -> Result<Fragment, CompileError> {
    let PatternKind::Sequence { head, children } = &node.kind else {
        return Err(mismatch(node));
    };

    let head_fragment = session.compile_child(head, false)?;

    let mut rest_index = None;
    for (i, child) in children.iter().enumerate() {
        if matches!(child.kind, PatternKind::Rest) {
            if rest_index.is_some() {
                return Err(CompileError::DuplicateRest { span: child.span });
            }
            rest_index = Some(i);
        }
    }

    let mut child_fragments = Vec::with_capacity(children.len());
    for child in children {
        child_fragments.push(session.compile_child(child, true)?);
    }

    Ok(Fragment::new(move |target, state| {
        let Target::Node(node) = *target else {
            return false;
        };
        if !head_fragment.matches(target, state) {
            return false;
        }
        match_children(&child_fragments, rest_index, node, state)
    }))
}

/// Positional child matching.
///
/// Without `...`: every pattern slot must match the corresponding child;
/// trailing extra children are tolerated. With `...`: slots before it align
/// from the front, slots after it from the back, and `...` consumes the
/// middle. Slot pairings are pre-registered in the trace before matching so
/// unreached slots classify as planned-but-not-visited.
fn match_children(
    fragments: &[Fragment],
    rest_index: Option<usize>,
    node: &TreeNode,
    state: &mut RunState<'_>,
) -> bool {
    let actual = &node.children;
    match rest_index {
        None => {
            if actual.len() < fragments.len() {
                return false;
            }
            register_sites(fragments, &actual[..fragments.len()], state);
            fragments
                .iter()
                .zip(actual)
                .all(|(fragment, child)| fragment.matches(&Target::from_child(child), state))
        }
        Some(rest) => {
            let before = &fragments[..rest];
            let after = &fragments[rest + 1..];
            if actual.len() < before.len() + after.len() {
                return false;
            }
            let tail_start = actual.len() - after.len();
            register_sites(before, &actual[..before.len()], state);
            register_sites(after, &actual[tail_start..], state);
            if let Some(id) = fragments[rest].id() {
                for child in &actual[before.len()..tail_start] {
                    if let TreeChild::Node(n) = child {
                        state.trace_site(n.id, id);
                    }
                }
            }
            for (fragment, child) in before.iter().zip(&actual[..before.len()]) {
                if !fragment.matches(&Target::from_child(child), state) {
                    return false;
                }
            }
            for (fragment, child) in after.iter().zip(&actual[tail_start..]) {
                if !fragment.matches(&Target::from_child(child), state) {
                    return false;
                }
            }
            // The rest slot itself always matches; run it so its position
            // records enter/success.
            fragments[rest].matches(&Target::Absent, state)
        }
    }
}

fn register_sites(fragments: &[Fragment], children: &[TreeChild], state: &mut RunState<'_>) {
    for (fragment, child) in fragments.iter().zip(children) {
        if let (Some(id), TreeChild::Node(n)) = (fragment.id(), child) {
            state.trace_site(n.id, id);
        }
    }
}

pub fn compile_alternatives(
    session: &mut Session<'_>,
    node: &PatternAst,
) -> Result<Fragment, CompileError> {
    let PatternKind::Alternatives(alternatives) = &node.kind else {
        return Err(mismatch(node));
    };
    let mut fragments = Vec::with_capacity(alternatives.len());
    for alternative in alternatives {
        fragments.push(session.compile_child(alternative, false)?);
    }
    Ok(Fragment::new(move |target, state| {
        fragments.iter().any(|fragment| {
            let mark = state.capture_mark();
            if fragment.matches(target, state) {
                true
            } else {
                state.truncate_captures(mark);
                false
            }
        })
    }))
}

pub fn compile_conjunction(
    session: &mut Session<'_>,
    node: &PatternAst,
) -> Result<Fragment, CompileError> {
    let PatternKind::Conjunction(items) = &node.kind else {
        return Err(mismatch(node));
    };
    let mut fragments = Vec::with_capacity(items.len());
    for item in items {
        fragments.push(session.compile_child(item, false)?);
    }
    Ok(Fragment::new(move |target, state| {
        fragments.iter().all(|fragment| fragment.matches(target, state))
    }))
}

pub fn compile_capture(
    session: &mut Session<'_>,
    node: &PatternAst,
) -> Result<Fragment, CompileError> {
    let PatternKind::Capture(inner) = &node.kind else {
        return Err(mismatch(node));
    };
    let inner = session.compile_child(inner, false)?;
    Ok(Fragment::new(move |target, state| {
        let slot = state.reserve_capture();
        if inner.matches(target, state) {
            state.set_capture(slot, Captured::of_target(target));
            true
        } else {
            state.truncate_captures(slot);
            false
        }
    }))
}

pub fn compile_wildcard(
    _session: &mut Session<'_>,
    _node: &PatternAst,
) -> Result<Fragment, CompileError> {
    Ok(Fragment::new(|_, _| true))
}

pub fn compile_rest(
    session: &mut Session<'_>,
    node: &PatternAst,
) -> Result<Fragment, CompileError> {
    if !session.in_sequence() {
        return Err(CompileError::RestOutsideSequence { span: node.span });
    }
    Ok(Fragment::new(|_, _| true))
}

pub fn compile_negation(
    session: &mut Session<'_>,
    node: &PatternAst,
) -> Result<Fragment, CompileError> {
    let PatternKind::Negation(inner) = &node.kind else {
        return Err(mismatch(node));
    };
    let inner = session.compile_child(inner, false)?;
    Ok(Fragment::new(move |target, state| {
        let mark = state.capture_mark();
        let matched = !inner.matches(target, state);
        // Captures never escape a negation.
        state.truncate_captures(mark);
        matched
    }))
}

/// `#helper` — names a caller-supplied predicate; compiled optimistically
/// (always matches).
pub fn compile_helper(
    _session: &mut Session<'_>,
    node: &PatternAst,
) -> Result<Fragment, CompileError> {
    let PatternKind::Helper(_) = &node.kind else {
        return Err(mismatch(node));
    };
    Ok(Fragment::new(|_, _| true))
}

/// `%param` — caller-supplied comparison value; compiled optimistically.
pub fn compile_param(
    _session: &mut Session<'_>,
    node: &PatternAst,
) -> Result<Fragment, CompileError> {
    let PatternKind::Param(_) = &node.kind else {
        return Err(mismatch(node));
    };
    Ok(Fragment::new(|_, _| true))
}

pub fn compile_symbol(
    _session: &mut Session<'_>,
    node: &PatternAst,
) -> Result<Fragment, CompileError> {
    let PatternKind::Symbol(name) = &node.kind else {
        return Err(mismatch(node));
    };
    let name = name.clone();
    Ok(Fragment::new(move |target, _| match target {
        Target::Name(s) => *s == name,
        Target::Node(n) => n.tag == "sym" && n.value() == Some(name.as_str()),
        Target::Absent => false,
    }))
}

pub fn compile_int(
    _session: &mut Session<'_>,
    node: &PatternAst,
) -> Result<Fragment, CompileError> {
    let PatternKind::Int(expected) = node.kind else {
        return Err(mismatch(node));
    };
    Ok(Fragment::new(move |target, _| match target {
        Target::Name(s) => s.parse::<i64>().ok() == Some(expected),
        Target::Node(n) => {
            n.tag == "int" && n.value().and_then(|v| v.parse::<i64>().ok()) == Some(expected)
        }
        Target::Absent => false,
    }))
}

/// Floats compare by source text, matching the DSL's literal semantics.
pub fn compile_float(
    _session: &mut Session<'_>,
    node: &PatternAst,
) -> Result<Fragment, CompileError> {
    let PatternKind::Float(text) = &node.kind else {
        return Err(mismatch(node));
    };
    let text = text.clone();
    Ok(Fragment::new(move |target, _| match target {
        Target::Name(s) => *s == text,
        Target::Node(n) => n.tag == "float" && n.value() == Some(text.as_str()),
        Target::Absent => false,
    }))
}

pub fn compile_str(
    _session: &mut Session<'_>,
    node: &PatternAst,
) -> Result<Fragment, CompileError> {
    let PatternKind::Str(expected) = &node.kind else {
        return Err(mismatch(node));
    };
    let expected = expected.clone();
    Ok(Fragment::new(move |target, _| match target {
        Target::Name(s) => *s == expected,
        Target::Node(n) => n.tag == "str" && n.value() == Some(expected.as_str()),
        Target::Absent => false,
    }))
}

/// `nil?` — the child slot is absent (a call with no receiver).
pub fn compile_nil_predicate(
    _session: &mut Session<'_>,
    _node: &PatternAst,
) -> Result<Fragment, CompileError> {
    Ok(Fragment::new(|target, _| matches!(target, Target::Absent)))
}

fn literal_fragment(tag: &'static str) -> Fragment {
    Fragment::new(move |target, _| matches!(target, Target::Node(n) if n.tag == tag))
}

pub fn compile_true(
    _session: &mut Session<'_>,
    _node: &PatternAst,
) -> Result<Fragment, CompileError> {
    Ok(literal_fragment("true"))
}

pub fn compile_false(
    _session: &mut Session<'_>,
    _node: &PatternAst,
) -> Result<Fragment, CompileError> {
    Ok(literal_fragment("false"))
}

pub fn compile_nil(
    _session: &mut Session<'_>,
    _node: &PatternAst,
) -> Result<Fragment, CompileError> {
    Ok(literal_fragment("nil"))
}

pub fn compile_type_predicate(
    _session: &mut Session<'_>,
    node: &PatternAst,
) -> Result<Fragment, CompileError> {
    let PatternKind::TypePredicate(tag) = &node.kind else {
        return Err(mismatch(node));
    };
    let tag = tag.clone();
    Ok(Fragment::new(move |target, _| {
        matches!(target, Target::Node(n) if n.tag == tag)
    }))
}

pub fn compile_node_type(
    _session: &mut Session<'_>,
    node: &PatternAst,
) -> Result<Fragment, CompileError> {
    let PatternKind::NodeType(tag) = &node.kind else {
        return Err(mismatch(node));
    };
    let tag = tag.clone();
    Ok(Fragment::new(move |target, _| {
        matches!(target, Target::Node(n) if n.tag == tag)
    }))
}

/// `^pattern` — needs parent links the analyzed tree does not carry. The
/// operand is compiled (validated, instrumented) but the match is
/// optimistic.
pub fn compile_parent(
    session: &mut Session<'_>,
    node: &PatternAst,
) -> Result<Fragment, CompileError> {
    let PatternKind::Parent(inner) = &node.kind else {
        return Err(mismatch(node));
    };
    let _inner = session.compile_child(inner, false)?;
    Ok(Fragment::new(|_, _| true))
}

/// `` `pattern `` — matches the target or any descendant of it.
pub fn compile_descend(
    session: &mut Session<'_>,
    node: &PatternAst,
) -> Result<Fragment, CompileError> {
    let PatternKind::Descend(inner) = &node.kind else {
        return Err(mismatch(node));
    };
    let inner = session.compile_child(inner, false)?;
    Ok(Fragment::new(move |target, state| match target {
        Target::Node(n) => descend_matches(&inner, n, state),
        other => inner.matches(other, state),
    }))
}

fn descend_matches(inner: &Fragment, node: &TreeNode, state: &mut RunState<'_>) -> bool {
    if inner.matches(&Target::Node(node), state) {
        return true;
    }
    node.children.iter().any(|child| match child {
        TreeChild::Node(n) => descend_matches(inner, n, state),
        TreeChild::Name(s) => inner.matches(&Target::Name(s), state),
        TreeChild::Absent => false,
    })
}
