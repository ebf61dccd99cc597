//! Ruby source → analyzed tree, via Prism.
//!
//! Builds an owned `TreeNode` tree with Parser-gem-style type tags and child
//! layouts from a Prism parse. Prism and the Parser gem disagree on shape in
//! a few places; this adapter rebuilds the Parser-gem shape where patterns
//! depend on it:
//!
//! - a call with a block becomes `(block (send ...) args body)` with the
//!   block as the outer node;
//! - a multi-statement body becomes a `begin` node, a single-statement body
//!   collapses to the statement itself;
//! - value nodes (`int`, `str`, `sym`, `float`, variables) carry their
//!   canonical text as a `Name` child.
//!
//! Prism node kinds without a mapping become opaque `unknown` leaves: they
//! keep their source range (so the visualizer accounts for their bytes) but
//! expose no children.

use anyhow::{bail, Result};

use crate::tree::{SourceSpan, TreeBuilder, TreeChild, TreeNode};

/// A parsed Ruby input: the source bytes plus the analyzed tree built from
/// them. Node spans index into `source`.
#[derive(Debug)]
pub struct Analysis {
    pub source: Vec<u8>,
    pub root: TreeNode,
}

/// Parse Ruby source and build the analyzed tree.
///
/// Fails on syntax errors; pattern debugging against a tree Prism had to
/// guess about would attribute match failures to the wrong nodes.
pub fn analyze(source: &[u8]) -> Result<Analysis> {
    let result = ruby_prism::parse(source);
    let error_count = result.errors().count();
    if error_count > 0 {
        bail!("Ruby source failed to parse ({error_count} syntax error(s))");
    }

    let root_node = result.node();
    let Some(program) = root_node.as_program_node() else {
        bail!("Prism returned a non-program root node");
    };

    let mut builder = RubyTreeBuilder {
        ids: TreeBuilder::new(),
    };
    let statements: Vec<ruby_prism::Node<'_>> = program.statements().body().iter().collect();
    let root = match statements.len() {
        1 => builder.build(&statements[0]),
        _ => builder.begin_of(&statements),
    };

    Ok(Analysis {
        source: source.to_vec(),
        root,
    })
}

fn span_of(loc: &ruby_prism::Location<'_>) -> Option<SourceSpan> {
    Some(SourceSpan::new(loc.start_offset(), loc.end_offset()))
}

fn name_child(bytes: &[u8]) -> TreeChild {
    TreeChild::Name(String::from_utf8_lossy(bytes).into_owned())
}

struct RubyTreeBuilder {
    ids: TreeBuilder,
}

impl RubyTreeBuilder {
    fn node(
        &mut self,
        tag: &str,
        span: Option<SourceSpan>,
        children: Vec<TreeChild>,
    ) -> TreeNode {
        self.ids.node(tag, span, children)
    }

    fn child_of(&mut self, node: Option<ruby_prism::Node<'_>>) -> TreeChild {
        match node {
            Some(n) => TreeChild::Node(self.build(&n)),
            None => TreeChild::Absent,
        }
    }

    /// Parser-gem body shape: absent, a single statement, or `(begin ...)`.
    fn body_of(&mut self, statements: Option<ruby_prism::StatementsNode<'_>>) -> TreeChild {
        let Some(stmts) = statements else {
            return TreeChild::Absent;
        };
        let nodes: Vec<ruby_prism::Node<'_>> = stmts.body().iter().collect();
        match nodes.len() {
            0 => TreeChild::Absent,
            1 => TreeChild::Node(self.build(&nodes[0])),
            _ => TreeChild::Node(self.begin_of(&nodes)),
        }
    }

    /// A node's body slot, which Prism types as a generic node.
    fn generic_body_of(&mut self, body: Option<ruby_prism::Node<'_>>) -> TreeChild {
        match body {
            Some(b) => match b.as_statements_node() {
                Some(stmts) => {
                    let nodes: Vec<ruby_prism::Node<'_>> = stmts.body().iter().collect();
                    match nodes.len() {
                        0 => TreeChild::Absent,
                        1 => TreeChild::Node(self.build(&nodes[0])),
                        _ => TreeChild::Node(self.begin_of(&nodes)),
                    }
                }
                None => TreeChild::Node(self.build(&b)),
            },
            None => TreeChild::Absent,
        }
    }

    /// `(begin stmt1 stmt2 ...)` — span covers first through last statement.
    fn begin_of(&mut self, statements: &[ruby_prism::Node<'_>]) -> TreeNode {
        let children: Vec<TreeChild> = statements
            .iter()
            .map(|s| TreeChild::Node(self.build(s)))
            .collect();
        let span = children
            .iter()
            .filter_map(|c| match c {
                TreeChild::Node(n) => n.span,
                _ => None,
            })
            .reduce(|a, b| a.join(b));
        self.node("begin", span, children)
    }

    fn args_of(
        &mut self,
        arguments: Option<ruby_prism::ArgumentsNode<'_>>,
        children: &mut Vec<TreeChild>,
    ) {
        if let Some(args) = arguments {
            for arg in args.arguments().iter() {
                children.push(TreeChild::Node(self.build(&arg)));
            }
        }
    }

    /// `send`/`csend` node for a call, ignoring any attached block.
    fn build_send(&mut self, call: &ruby_prism::CallNode<'_>, span: Option<SourceSpan>) -> TreeNode {
        let tag = if call
            .call_operator_loc()
            .is_some_and(|loc| loc.as_slice() == b"&.")
        {
            "csend"
        } else {
            "send"
        };
        let mut children = vec![
            self.child_of(call.receiver()),
            name_child(call.name().as_slice()),
        ];
        self.args_of(call.arguments(), &mut children);
        self.node(tag, span, children)
    }

    /// `(block (send ...) args body)` — Prism hangs the block off the call;
    /// the Parser gem nests the call inside the block.
    fn build_block_call(
        &mut self,
        call: &ruby_prism::CallNode<'_>,
        block: &ruby_prism::BlockNode<'_>,
    ) -> TreeNode {
        let full_span = span_of(&call.location());
        // The inner send ends where its arguments (or message) end; the
        // block braces belong to the block node.
        let inner_end = call
            .arguments()
            .map(|a| a.location().end_offset())
            .or_else(|| call.message_loc().map(|l| l.end_offset()))
            .unwrap_or_else(|| call.location().end_offset());
        let inner_span = Some(SourceSpan::new(call.location().start_offset(), inner_end));
        let send = self.build_send(call, inner_span);

        let params = self.child_of(block.parameters());
        let body = self.generic_body_of(block.body());
        self.node(
            "block",
            full_span,
            vec![TreeChild::Node(send), params, body],
        )
    }

    fn build(&mut self, node: &ruby_prism::Node<'_>) -> TreeNode {
        let span = span_of(&node.location());

        if let Some(call) = node.as_call_node() {
            if let Some(block) = call.block() {
                if let Some(block_node) = block.as_block_node() {
                    return self.build_block_call(&call, &block_node);
                }
            }
            return self.build_send(&call, span);
        }

        if let Some(def) = node.as_def_node() {
            let mut children = Vec::new();
            // def vs defs: defs has a receiver slot first.
            let tag = if def.receiver().is_some() { "defs" } else { "def" };
            if tag == "defs" {
                children.push(self.child_of(def.receiver()));
            }
            children.push(name_child(def.name().as_slice()));
            children.push(self.child_of(def.parameters().map(|p| p.as_node())));
            children.push(self.generic_body_of(def.body()));
            return self.node(tag, span, children);
        }

        if let Some(c) = node.as_constant_read_node() {
            return self.node(
                "const",
                span,
                vec![TreeChild::Absent, name_child(c.name().as_slice())],
            );
        }
        if let Some(cp) = node.as_constant_path_node() {
            let parent = self.child_of(cp.parent());
            let name = match cp.name() {
                Some(n) => name_child(n.as_slice()),
                None => TreeChild::Absent,
            };
            return self.node("const", span, vec![parent, name]);
        }

        if let Some(b) = node.as_begin_node() {
            let body = self.body_of(b.statements());
            return self.node("begin", span, vec![body]);
        }

        if let Some(assoc) = node.as_assoc_node() {
            let key = TreeChild::Node(self.build(&assoc.key()));
            let value = TreeChild::Node(self.build(&assoc.value()));
            return self.node("pair", span, vec![key, value]);
        }
        if let Some(hash) = node.as_hash_node() {
            let children = hash
                .elements()
                .iter()
                .map(|e| TreeChild::Node(self.build(&e)))
                .collect();
            return self.node("hash", span, children);
        }
        if let Some(arr) = node.as_array_node() {
            let children = arr
                .elements()
                .iter()
                .map(|e| TreeChild::Node(self.build(&e)))
                .collect();
            return self.node("array", span, children);
        }

        if let Some(lv) = node.as_local_variable_read_node() {
            return self.value_leaf("lvar", lv.name().as_slice(), span);
        }
        if let Some(iv) = node.as_instance_variable_read_node() {
            return self.value_leaf("ivar", iv.name().as_slice(), span);
        }
        if let Some(cv) = node.as_class_variable_read_node() {
            return self.value_leaf("cvar", cv.name().as_slice(), span);
        }
        if let Some(gv) = node.as_global_variable_read_node() {
            return self.value_leaf("gvar", gv.name().as_slice(), span);
        }

        if let Some(sym) = node.as_symbol_node() {
            return self.value_leaf("sym", sym.unescaped(), span);
        }
        if let Some(s) = node.as_string_node() {
            return self.value_leaf("str", s.unescaped(), span);
        }
        if let Some(int) = node.as_integer_node() {
            // Canonical decimal text: underscores stripped.
            let text: String = String::from_utf8_lossy(int.location().as_slice())
                .chars()
                .filter(|c| *c != '_')
                .collect();
            return self.node("int", span, vec![TreeChild::Name(text)]);
        }
        if let Some(float) = node.as_float_node() {
            return self.value_leaf("float", float.location().as_slice(), span);
        }

        if node.as_true_node().is_some() {
            return self.node("true", span, vec![]);
        }
        if node.as_false_node().is_some() {
            return self.node("false", span, vec![]);
        }
        if node.as_nil_node().is_some() {
            return self.node("nil", span, vec![]);
        }
        if node.as_self_node().is_some() {
            return self.node("self", span, vec![]);
        }
        if node.as_forwarding_super_node().is_some() {
            return self.node("zsuper", span, vec![]);
        }

        if let Some(if_node) = node.as_if_node() {
            let predicate = TreeChild::Node(self.build(&if_node.predicate()));
            let then_branch = self.body_of(if_node.statements());
            let else_branch = match if_node.subsequent() {
                Some(subsequent) => match subsequent.as_else_node() {
                    Some(else_node) => self.body_of(else_node.statements()),
                    // elsif — a nested if node
                    None => TreeChild::Node(self.build(&subsequent)),
                },
                None => TreeChild::Absent,
            };
            return self.node("if", span, vec![predicate, then_branch, else_branch]);
        }

        if let Some(case) = node.as_case_node() {
            let mut children = vec![self.child_of(case.predicate())];
            for condition in case.conditions().iter() {
                children.push(TreeChild::Node(self.build(&condition)));
            }
            match case.else_clause() {
                Some(e) => children.push(self.body_of(e.statements())),
                None => children.push(TreeChild::Absent),
            }
            return self.node("case", span, children);
        }
        if let Some(when) = node.as_when_node() {
            let mut children: Vec<TreeChild> = when
                .conditions()
                .iter()
                .map(|c| TreeChild::Node(self.build(&c)))
                .collect();
            children.push(self.body_of(when.statements()));
            return self.node("when", span, children);
        }

        if let Some(w) = node.as_while_node() {
            let predicate = TreeChild::Node(self.build(&w.predicate()));
            let body = self.body_of(w.statements());
            return self.node("while", span, vec![predicate, body]);
        }
        if let Some(u) = node.as_until_node() {
            let predicate = TreeChild::Node(self.build(&u.predicate()));
            let body = self.body_of(u.statements());
            return self.node("until", span, vec![predicate, body]);
        }
        if let Some(f) = node.as_for_node() {
            let index = TreeChild::Node(self.build(&f.index()));
            let collection = TreeChild::Node(self.build(&f.collection()));
            let body = self.body_of(f.statements());
            return self.node("for", span, vec![index, collection, body]);
        }

        if let Some(r) = node.as_return_node() {
            let mut children = Vec::new();
            self.args_of(r.arguments(), &mut children);
            return self.node("return", span, children);
        }
        if let Some(y) = node.as_yield_node() {
            let mut children = Vec::new();
            self.args_of(y.arguments(), &mut children);
            return self.node("yield", span, children);
        }
        if let Some(s) = node.as_super_node() {
            let mut children = Vec::new();
            self.args_of(s.arguments(), &mut children);
            return self.node("super", span, children);
        }

        if let Some(a) = node.as_and_node() {
            let left = TreeChild::Node(self.build(&a.left()));
            let right = TreeChild::Node(self.build(&a.right()));
            return self.node("and", span, vec![left, right]);
        }
        if let Some(o) = node.as_or_node() {
            let left = TreeChild::Node(self.build(&o.left()));
            let right = TreeChild::Node(self.build(&o.right()));
            return self.node("or", span, vec![left, right]);
        }

        if let Some(c) = node.as_class_node() {
            let path = TreeChild::Node(self.build(&c.constant_path()));
            let superclass = self.child_of(c.superclass());
            let body = self.generic_body_of(c.body());
            return self.node("class", span, vec![path, superclass, body]);
        }
        if let Some(m) = node.as_module_node() {
            let path = TreeChild::Node(self.build(&m.constant_path()));
            let body = self.generic_body_of(m.body());
            return self.node("module", span, vec![path, body]);
        }

        if let Some(lv) = node.as_local_variable_write_node() {
            let value = TreeChild::Node(self.build(&lv.value()));
            return self.node(
                "lvasgn",
                span,
                vec![name_child(lv.name().as_slice()), value],
            );
        }
        if let Some(iv) = node.as_instance_variable_write_node() {
            let value = TreeChild::Node(self.build(&iv.value()));
            return self.node(
                "ivasgn",
                span,
                vec![name_child(iv.name().as_slice()), value],
            );
        }
        if let Some(cw) = node.as_constant_write_node() {
            let value = TreeChild::Node(self.build(&cw.value()));
            return self.node(
                "casgn",
                span,
                vec![name_child(cw.name().as_slice()), value],
            );
        }

        if let Some(s) = node.as_splat_node() {
            let expression = self.child_of(s.expression());
            return self.node("splat", span, vec![expression]);
        }

        if let Some(l) = node.as_lambda_node() {
            let params = self.child_of(l.parameters());
            let body = self.generic_body_of(l.body());
            return self.node("lambda", span, vec![params, body]);
        }

        if let Some(isn) = node.as_interpolated_string_node() {
            let children = isn
                .parts()
                .iter()
                .map(|p| TreeChild::Node(self.build(&p)))
                .collect();
            return self.node("dstr", span, children);
        }
        if let Some(isn) = node.as_interpolated_symbol_node() {
            let children = isn
                .parts()
                .iter()
                .map(|p| TreeChild::Node(self.build(&p)))
                .collect();
            return self.node("dsym", span, children);
        }

        let tag = match node {
            ruby_prism::Node::RegularExpressionNode { .. } => "regexp",
            ruby_prism::Node::ParametersNode { .. }
            | ruby_prism::Node::BlockParametersNode { .. } => "args",
            _ => "unknown",
        };
        self.node(tag, span, vec![])
    }

    fn value_leaf(&mut self, tag: &str, value: &[u8], span: Option<SourceSpan>) -> TreeNode {
        let value = String::from_utf8_lossy(value).into_owned();
        self.node(tag, span, vec![TreeChild::Name(value)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::Compiler;
    use crate::pattern::parse_pattern;

    fn tree_for(source: &str) -> Analysis {
        analyze(source.as_bytes()).unwrap()
    }

    fn matches(pattern: &str, source: &str) -> bool {
        let analysis = tree_for(source);
        let ast = parse_pattern(pattern).unwrap();
        let compiled = Compiler::new().compile(&ast).unwrap();
        compiled.run(&analysis.root).unwrap().matched
    }

    #[test]
    fn receiverless_call() {
        let analysis = tree_for("foo");
        assert_eq!(analysis.root.tag, "send");
        assert_eq!(analysis.root.span, Some(SourceSpan::new(0, 3)));
        assert!(matches!(analysis.root.children[0], TreeChild::Absent));
        assert!(matches!(&analysis.root.children[1], TreeChild::Name(n) if n == "foo"));
    }

    #[test]
    fn require_call_matches_pattern() {
        assert!(matches("(send nil? :require ...)", "require 'foo'"));
        assert!(!matches("(send nil? :include ...)", "require 'foo'"));
        assert!(matches("(send nil? :require (str 'foo'))", "require 'foo'"));
    }

    #[test]
    fn call_with_receiver() {
        assert!(matches("(send _ :foo)", "obj.foo"));
        assert!(!matches("(send nil? :foo)", "obj.foo"));
        assert!(matches("(send (send nil? :obj) :foo)", "obj.foo"));
    }

    #[test]
    fn csend_is_distinct() {
        assert!(matches("(csend _ :foo)", "obj&.foo"));
        assert!(!matches("(send _ :foo)", "obj&.foo"));
    }

    #[test]
    fn nested_calls() {
        assert!(matches("(send (send _ :where ...) :first)", "obj.where.first"));
    }

    #[test]
    fn integer_receiver_spans() {
        let analysis = tree_for("1.abs");
        let TreeChild::Node(recv) = &analysis.root.children[0] else {
            panic!("expected receiver node");
        };
        assert_eq!(recv.tag, "int");
        assert_eq!(recv.value(), Some("1"));
        assert_eq!(recv.span, Some(SourceSpan::new(0, 1)));
    }

    #[test]
    fn integer_underscores_are_canonicalized() {
        assert!(matches("(int 1000)", "1_000"));
    }

    #[test]
    fn block_call_is_rebuilt_parser_gem_style() {
        let analysis = tree_for("items.each { |x| x }");
        assert_eq!(analysis.root.tag, "block");
        let TreeChild::Node(send) = &analysis.root.children[0] else {
            panic!("expected inner send node");
        };
        assert_eq!(send.tag, "send");
        // The inner send span stops before the block braces.
        assert_eq!(send.span, Some(SourceSpan::new(0, 10)));
        assert!(matches("(block (send _ :each) _ _)", "items.each { |x| x }"));
    }

    #[test]
    fn if_without_else() {
        assert!(matches("(if _ _ nil?)", "if x; y; end"));
        assert!(matches("(if _ _ _)", "if x; y; end"));
    }

    #[test]
    fn and_or_nodes() {
        assert!(matches("(and _ _)", "a && b"));
        assert!(matches("(or _ _)", "a || b"));
    }

    #[test]
    fn assignment_nodes() {
        assert!(matches("(lvasgn :x _)", "x = 1"));
        assert!(!matches("(lvasgn :y _)", "x = 1"));
        assert!(matches("(ivasgn :@x (int 1))", "@x = 1"));
    }

    #[test]
    fn multi_statement_program_becomes_begin() {
        let analysis = tree_for("x = 1\ny = 2");
        assert_eq!(analysis.root.tag, "begin");
        assert_eq!(analysis.root.children.len(), 2);
        // Span covers first through last statement.
        assert_eq!(analysis.root.span, Some(SourceSpan::new(0, 11)));
    }

    #[test]
    fn def_and_defs() {
        assert!(matches("(def :initialize ...)", "def initialize; end"));
        assert!(!matches("(def :other ...)", "def initialize; end"));
        assert!(matches("(defs _ :build ...)", "def self.build; end"));
    }

    #[test]
    fn class_and_module() {
        assert!(matches("(class (const nil? :Foo) _ _)", "class Foo < Bar; end"));
        assert!(matches("(module (const nil? :Foo) _)", "module Foo; end"));
    }

    #[test]
    fn cbase_constant_has_absent_parent() {
        assert!(matches("(const nil? :Foo)", "::Foo"));
    }

    #[test]
    fn literals() {
        assert!(matches("true", "true"));
        assert!(matches("nil", "nil"));
        assert!(matches("(sym :foo)", ":foo"));
        assert!(matches("(str 'hello')", "'hello'"));
        assert!(matches("str?", "'hello'"));
        assert!(!matches("int?", "'hello'"));
    }

    #[test]
    fn array_and_hash() {
        assert!(matches("(array _ _ _)", "[1, 2, 3]"));
        assert!(matches("(array ...)", "[1, 2, 3]"));
        assert!(matches("(hash (pair (sym :a) (int 1)))", "{ a: 1 }"));
    }

    #[test]
    fn unique_ids_across_tree() {
        let analysis = tree_for("foo(1, 2, bar(3))");
        let mut ids: Vec<u32> = analysis.root.walk().map(|n| n.id.0).collect();
        let before = ids.len();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), before);
    }

    #[test]
    fn syntax_error_fails() {
        assert!(analyze(b"def").is_err());
    }

    #[test]
    fn empty_source_builds_empty_begin() {
        let analysis = tree_for("");
        assert_eq!(analysis.root.tag, "begin");
        assert!(analysis.root.children.is_empty());
    }
}
