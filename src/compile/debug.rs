//! Debug compilation — the trace instrumentation overlay.
//!
//! `DebugCompiler` produces matchers with the same semantics as the base
//! compiler, plus enter/success trace recording around every compiled
//! fragment. Handlers never see the instrumentation: `Session::compile`
//! assigns the pattern-position identity before dispatch and wraps the
//! handler's fragment after it returns.
//!
//! Identities are assigned by object identity (pointer), not structural
//! equality, in pre-order encounter order starting at 0. That order equals
//! the compiler's own traversal order, which is what makes identities stable
//! across repeated compilations of the same pattern tree.

use std::collections::HashMap;

use super::compiler::Session;
use super::registry::Registry;
use super::{CompileError, CompiledPattern, Fragment, Param, PositionInfo};
use crate::pattern::PatternAst;
use crate::trace::PatternId;

/// The instrumenting compiler.
///
/// Its output declares an extra `Param::Trace` call parameter, so a
/// debug-compiled matcher cannot be invoked with an ordinary call.
pub struct DebugCompiler {
    registry: Registry,
}

impl DebugCompiler {
    pub fn new() -> Self {
        Self::with_registry(super::compiler::default_registry())
    }

    pub fn with_registry(registry: Registry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn compile(&self, pattern: &PatternAst) -> Result<CompiledPattern, CompileError> {
        let mut session = Session::new(&self.registry, Some(Instrument::new()));
        session.require_param(Param::Trace);
        let fragment = session.compile(pattern)?;
        Ok(session.into_artifact(fragment))
    }
}

impl Default for DebugCompiler {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-compilation identity assignment state.
pub(crate) struct Instrument {
    /// Object identity (address) of a pattern node -> its position id.
    ids: HashMap<*const PatternAst, PatternId>,
    positions: Vec<PositionInfo>,
    next: u32,
}

impl Instrument {
    pub(crate) fn new() -> Self {
        Self {
            ids: HashMap::new(),
            positions: Vec::new(),
            next: 0,
        }
    }

    /// First encounter assigns the next sequential id; later encounters of
    /// the same node (by address) return the existing one.
    pub(crate) fn assign(&mut self, node: &PatternAst) -> PatternId {
        let key: *const PatternAst = node;
        if let Some(&id) = self.ids.get(&key) {
            return id;
        }
        let id = PatternId(self.next);
        self.next += 1;
        self.ids.insert(key, id);
        self.positions.push(PositionInfo {
            id,
            summary: node.summary(),
            span: node.span,
        });
        id
    }

    pub(crate) fn into_positions(self) -> Vec<PositionInfo> {
        self.positions
    }
}

/// Wrap a compiled fragment with trace recording.
///
/// Composition preserves short-circuit semantics: enter is recorded before
/// the fragment runs; success is recorded only if the fragment succeeds; the
/// composed result always equals the fragment's own result. Trace recording
/// itself cannot fail.
pub(crate) fn instrument_fragment(id: PatternId, inner: Fragment) -> Fragment {
    Fragment::with_id(id, move |target, state| {
        state.trace_enter(id, target);
        let matched = inner.matches(target, state);
        if matched {
            state.trace_success(id);
        }
        matched
    })
}
