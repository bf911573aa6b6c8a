//! Pass 1: the scope analyzer.
//!
//! Walks the AST depth-first in source order, building the block tree, the
//! bindings, and the function records, and enqueueing every piece of
//! deferred pass-2 work. The tree itself is never mutated here; the only
//! outputs are the stores, the job queue, and (for constructs whose rewrite
//! shape is already fully known, like object literals capturing `super`)
//! entries on the mutation list.
//!
//! Identifiers are classified by the context their parent visits them in:
//! expression positions are reads, assignment targets are writes, and
//! declaration patterns create bindings. Identifier *resolution* is always
//! deferred: pass 1 cannot know whether a name binds locally or globally
//! until every declaration in every enclosing block has been seen.

use serde_json::Value;

use crate::{
    ast::{self, NodeKind},
    blocks::{BindingProps, BlockId, COMMONJS_VAR_NAMES},
    error::{AnalysisError, CodeLoc},
    functions::{AmendmentKind, FnIndex, FnType},
    state::{Job, Mutation, ReplaceKind, SloppyFnDecl, State},
    trail::{Trail, TrailKey},
};

type AResult = Result<(), AnalysisError>;

/// How a pattern position introduces or targets names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeclKind {
    Var,
    Let,
    Const,
    Param,
    CatchParam,
    /// Assignment-target pattern: identifiers are writes to existing
    /// bindings, not declarations.
    Assign,
}

/// Runs pass 1 over the program body. The driver has already created the
/// file and program blocks and seeded `state`.
pub(crate) fn analyze(st: &mut State<'_>, program: &Value) -> AResult {
    let mut analyzer = Analyzer { st };
    analyzer.visit_program(program)
}

struct Analyzer<'a, 'o> {
    st: &'a mut State<'o>,
}

impl Analyzer<'_, '_> {
    // -- traversal kernel ---------------------------------------------------
    //
    // Pops are success-only: when a visitor fails, the trail is left as it
    // stood so the driver can derive the error position from the deepest
    // located node on it. Nothing resumes after a failure, so the imbalance
    // is harmless.

    /// Visits the child at `key`, if present and non-null.
    fn visit_child(&mut self, node: &Value, key: &'static str) -> AResult {
        match node.get(key) {
            Some(child) if !child.is_null() => {
                self.st.trail.push(TrailKey::key(key));
                self.visit_node(child)?;
                self.st.trail.pop();
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Visits every node in the array at `key`, skipping null members
    /// (elision in sparse arrays).
    fn visit_children(&mut self, node: &Value, key: &'static str) -> AResult {
        let Some(children) = node.get(key).and_then(Value::as_array) else {
            return Ok(());
        };
        self.st.trail.push(TrailKey::key(key));
        self.visit_indexed(children)?;
        self.st.trail.pop();
        Ok(())
    }

    fn visit_indexed(&mut self, children: &[Value]) -> AResult {
        for (index, child) in children.iter().enumerate() {
            if child.is_null() {
                continue;
            }
            self.st.trail.push(TrailKey::Index(index));
            self.visit_node(child)?;
            self.st.trail.pop();
        }
        Ok(())
    }

    /// Structural fallback for node kinds with no scope or binding effects:
    /// every node-valued field is visited as an expression, in key order.
    fn visit_structurally(&mut self, node: &Value) -> AResult {
        const SKIPPED: [&str; 10] = [
            "type",
            "loc",
            "start",
            "end",
            "range",
            "leadingComments",
            "trailingComments",
            "innerComments",
            "extra",
            "directives",
        ];
        let Some(object) = node.as_object() else {
            return Ok(());
        };
        for (key, child) in object {
            if SKIPPED.contains(&key.as_str()) {
                continue;
            }
            if ast::is_node(child) {
                self.st.trail.push(TrailKey::key_owned(key.clone()));
                self.visit_node(child)?;
                self.st.trail.pop();
            } else if let Some(children) = child.as_array() {
                self.st.trail.push(TrailKey::key_owned(key.clone()));
                self.visit_indexed(children)?;
                self.st.trail.pop();
            }
        }
        Ok(())
    }

    // -- dispatch -----------------------------------------------------------

    fn visit_node(&mut self, node: &Value) -> AResult {
        match ast::kind_of(node) {
            Some(NodeKind::Identifier) => self.visit_identifier_read(node),
            Some(NodeKind::ThisExpression) => self.visit_this(),
            Some(NodeKind::MetaProperty) => self.visit_meta_property(node),
            Some(NodeKind::PrivateName) => Ok(()),

            Some(NodeKind::FunctionDeclaration) => self.visit_function_declaration(node),
            Some(NodeKind::FunctionExpression) => {
                let name = node.get("id").and_then(ast::identifier_name).map(str::to_owned);
                self.visit_function(node, fn_type_of(node), name.as_deref(), FunctionForm::Plain)
            }
            Some(NodeKind::ArrowFunctionExpression) => {
                self.visit_function(node, fn_type_of(node), None, FunctionForm::Arrow)
            }
            Some(NodeKind::ClassDeclaration) => self.visit_class(node, true),
            Some(NodeKind::ClassExpression) => self.visit_class(node, false),
            Some(NodeKind::ObjectExpression) => self.visit_object_expression(node),

            Some(NodeKind::VariableDeclaration) => self.visit_variable_declaration(node),
            Some(NodeKind::BlockStatement) => self.visit_block_statement(node),
            Some(NodeKind::ExpressionStatement) => self.visit_child(node, "expression"),
            Some(NodeKind::AssignmentExpression) => self.visit_assignment(node),
            Some(NodeKind::UpdateExpression) => self.visit_update(node),
            Some(NodeKind::CallExpression) => self.visit_call(node),
            Some(NodeKind::MemberExpression | NodeKind::OptionalMemberExpression) => self.visit_member(node),
            Some(NodeKind::Import) => {
                self.mark_contains_import();
                Ok(())
            }

            Some(NodeKind::ForStatement) => self.visit_for(node),
            Some(NodeKind::ForInStatement | NodeKind::ForOfStatement) => self.visit_for_in_of(node),
            Some(NodeKind::WhileStatement | NodeKind::DoWhileStatement) => self.visit_loop(node),
            Some(NodeKind::SwitchStatement) => self.visit_switch(node),
            Some(NodeKind::CatchClause) => self.visit_catch(node),
            Some(NodeKind::WithStatement) => self.visit_with(node),
            Some(NodeKind::LabeledStatement) => self.visit_child(node, "body"),
            Some(NodeKind::BreakStatement | NodeKind::ContinueStatement) => Ok(()),

            Some(NodeKind::ImportDeclaration) => self.visit_import_declaration(node),
            Some(NodeKind::ExportNamedDeclaration) => self.visit_export_named(node),
            Some(NodeKind::ExportDefaultDeclaration) => self.visit_child(node, "declaration"),
            Some(NodeKind::ExportAllDeclaration) => Ok(()),

            // `super` only occurs as a callee or member object; those arms
            // route it through `visit_super_use` before descending.
            Some(NodeKind::Super) => Err(AnalysisError::syntax(
                "'super' outside of a method or constructor",
                CodeLoc::from_node(node),
            )),

            Some(
                NodeKind::File
                | NodeKind::Program
                | NodeKind::ObjectMethod
                | NodeKind::ClassMethod
                | NodeKind::ClassPrivateMethod
                | NodeKind::ClassBody
                | NodeKind::ClassProperty
                | NodeKind::ClassPrivateProperty
                | NodeKind::StaticBlock
                | NodeKind::ObjectProperty
                | NodeKind::ObjectPattern
                | NodeKind::ArrayPattern
                | NodeKind::AssignmentPattern
                | NodeKind::RestElement
                | NodeKind::VariableDeclarator
                | NodeKind::ImportSpecifier
                | NodeKind::ImportDefaultSpecifier
                | NodeKind::ImportNamespaceSpecifier
                | NodeKind::ExportSpecifier,
            ) => Err(AnalysisError::unexpected_node(
                ast::type_str(node).unwrap_or("<unknown>"),
                CodeLoc::from_node(node),
            )),

            // Everything else (literals, operators, sequences, templates,
            // optional calls, switch cases reached via their array, …) has
            // no scope effect and is traversed structurally.
            _ => self.visit_structurally(node),
        }
    }

    // -- program ------------------------------------------------------------

    fn visit_program(&mut self, program: &Value) -> AResult {
        let Some(body) = program.get("body").and_then(Value::as_array) else {
            return Err(AnalysisError::unexpected_node(
                ast::type_str(program).unwrap_or("<unknown>"),
                CodeLoc::from_node(program),
            ));
        };
        self.st.trail.push(TrailKey::key("body"));
        self.visit_indexed(body)?;
        self.st.trail.pop();
        Ok(())
    }

    // -- identifiers --------------------------------------------------------

    fn visit_identifier_read(&mut self, node: &Value) -> AResult {
        let Some(name) = ast::identifier_name(node) else {
            return Ok(());
        };
        self.enqueue_identifier_use(name, true, false);
        Ok(())
    }

    /// Enqueues a resolution (or bare-eval rewrite) job for a use of `name`
    /// at the current trail.
    fn enqueue_identifier_use(&mut self, name: &str, is_read: bool, is_assign: bool) {
        let block = self.st.current_block;
        let fn_idx = self.st.current_function;
        let trail = self.st.trail_snapshot();
        if name == "eval" {
            self.st.file_contains_eval = true;
            self.st.jobs.push(Job::RewriteBareEval {
                block,
                fn_idx,
                trail,
                is_read,
                is_assign,
            });
        } else {
            self.st.jobs.push(Job::ResolveIdentifier {
                block,
                fn_idx,
                name: name.to_owned(),
                trail,
                is_read,
                is_assign,
            });
        }
    }

    fn visit_this(&mut self) -> AResult {
        self.record_lexical_use("this");
        Ok(())
    }

    fn visit_meta_property(&mut self, node: &Value) -> AResult {
        let meta = node.get("meta").and_then(ast::identifier_name);
        if meta == Some("new") {
            self.record_lexical_use("new.target");
        }
        Ok(())
    }

    /// Resolves `this`/`new.target` eagerly: both are lexical, so the
    /// defining block is simply the current `this` block. The use is
    /// recorded as an external var when that block belongs to an enclosing
    /// function (i.e. the current function is an arrow).
    fn record_lexical_use(&mut self, name: &str) {
        let Some(this_block) = self.st.current_this_block else {
            return;
        };
        let Some(fn_idx) = self.st.current_function else {
            return;
        };
        let fn_id = self.st.functions.get(fn_idx).id;
        if this_block >= fn_id {
            return;
        }
        let activation = self.st.blocks.activate(this_block, &self.st.alloc);
        self.st.register_block_decls(activation.vars_block);
        self.st.blocks.activate_binding(this_block, name);
        let var_node = lexical_var_node(name);
        let trail = self.st.trail_snapshot();
        let relative = self.relative_trail(fn_idx, &trail);
        let var = self.st.functions.record_external_var(fn_idx, this_block, name, var_node);
        var.is_read_from = true;
        var.trails.push(relative);
    }

    /// Function-relative form of an absolute trail.
    fn relative_trail(&self, fn_idx: FnIndex, trail: &Trail) -> Trail {
        let prefix = &self.st.functions.get(fn_idx).trail;
        crate::trail::strip_prefix(trail, prefix)
            .expect("use site lies within its function")
            .iter()
            .cloned()
            .collect()
    }

    // -- patterns and declarations ------------------------------------------

    fn visit_pattern(&mut self, node: &Value, kind: DeclKind) -> AResult {
        match ast::kind_of(node) {
            Some(NodeKind::Identifier) => {
                let Some(name) = ast::identifier_name(node) else {
                    return Ok(());
                };
                if kind == DeclKind::Assign {
                    self.enqueue_identifier_use(name, false, true);
                } else {
                    self.declare(name, kind, CodeLoc::from_node(node))?;
                    self.enqueue_identifier_use(name, false, false);
                }
                Ok(())
            }
            Some(NodeKind::ObjectPattern) => {
                let Some(props) = node.get("properties").and_then(Value::as_array) else {
                    return Ok(());
                };
                self.st.trail.push(TrailKey::key("properties"));
                for (index, prop) in props.iter().enumerate() {
                    self.st.trail.push(TrailKey::Index(index));
                    self.visit_pattern_property(prop, kind)?;
                    self.st.trail.pop();
                }
                self.st.trail.pop();
                Ok(())
            }
            Some(NodeKind::ArrayPattern) => {
                let Some(elements) = node.get("elements").and_then(Value::as_array) else {
                    return Ok(());
                };
                self.st.trail.push(TrailKey::key("elements"));
                for (index, element) in elements.iter().enumerate() {
                    if element.is_null() {
                        continue;
                    }
                    self.st.trail.push(TrailKey::Index(index));
                    self.visit_pattern(element, kind)?;
                    self.st.trail.pop();
                }
                self.st.trail.pop();
                Ok(())
            }
            Some(NodeKind::AssignmentPattern) => {
                self.with_pattern_child(node, "left", kind)?;
                self.visit_child(node, "right")
            }
            Some(NodeKind::RestElement) => self.with_pattern_child(node, "argument", kind),
            // `[a.b] = …` — a member target is an expression, not a binding.
            Some(NodeKind::MemberExpression | NodeKind::OptionalMemberExpression) if kind == DeclKind::Assign => {
                self.visit_member(node)
            }
            _ => Err(AnalysisError::unexpected_node(
                ast::type_str(node).unwrap_or("<unknown>"),
                CodeLoc::from_node(node),
            )),
        }
    }

    fn with_pattern_child(&mut self, node: &Value, key: &'static str, kind: DeclKind) -> AResult {
        match node.get(key) {
            Some(child) if !child.is_null() => {
                self.st.trail.push(TrailKey::key(key));
                self.visit_pattern(child, kind)?;
                self.st.trail.pop();
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn visit_pattern_property(&mut self, prop: &Value, kind: DeclKind) -> AResult {
        match ast::kind_of(prop) {
            Some(NodeKind::ObjectProperty) => {
                if ast::flag(prop, "computed") {
                    self.visit_child(prop, "key")?;
                }
                self.with_pattern_child(prop, "value", kind)
            }
            Some(NodeKind::RestElement) => self.with_pattern_child(prop, "argument", kind),
            _ => Err(AnalysisError::unexpected_node(
                ast::type_str(prop).unwrap_or("<unknown>"),
                CodeLoc::from_node(prop),
            )),
        }
    }

    /// Creates the binding for a declared name in the block its declaration
    /// kind targets.
    fn declare(&mut self, name: &str, kind: DeclKind, loc: Option<CodeLoc>) -> AResult {
        let (block, props) = match kind {
            DeclKind::Var => {
                let Some(hoist) = self.st.current_hoist_block else {
                    // Sloppy indirect-eval context: `var` escapes to the
                    // caller's environment, which is not statically known.
                    // The name resolves as a global.
                    self.st.alloc.check_user_name(name);
                    return Ok(());
                };
                (
                    hoist,
                    BindingProps {
                        is_var: true,
                        ..BindingProps::default()
                    },
                )
            }
            DeclKind::Let => {
                self.check_commonjs_shadow(name, loc)?;
                (self.st.current_block, BindingProps::default())
            }
            DeclKind::Const => {
                self.check_commonjs_shadow(name, loc)?;
                (
                    self.st.current_block,
                    BindingProps {
                        is_const: true,
                        ..BindingProps::default()
                    },
                )
            }
            DeclKind::Param => (self.st.current_block, BindingProps::default()),
            DeclKind::CatchParam => (
                self.st.current_block,
                BindingProps {
                    is_silent_const: true,
                    ..BindingProps::default()
                },
            ),
            DeclKind::Assign => unreachable!("assignment targets do not declare"),
        };
        self.st.blocks.create_binding(block, name, props, &mut self.st.alloc);
        Ok(())
    }

    /// Rejects program-level lexical declarations shadowing CommonJS vars.
    fn check_commonjs_shadow(&self, name: &str, loc: Option<CodeLoc>) -> AResult {
        if self.st.options.is_commonjs()
            && self.st.current_block == self.st.program_block
            && COMMONJS_VAR_NAMES.contains(&name)
        {
            return Err(AnalysisError::syntax(
                format!("Cannot redeclare CommonJS variable '{name}' at top level"),
                loc,
            ));
        }
        Ok(())
    }

    fn visit_variable_declaration(&mut self, node: &Value) -> AResult {
        let kind = match node.get("kind").and_then(Value::as_str) {
            Some("var") => DeclKind::Var,
            Some("let") => DeclKind::Let,
            _ => DeclKind::Const,
        };
        let Some(declarations) = node.get("declarations").and_then(Value::as_array) else {
            return Ok(());
        };
        self.st.trail.push(TrailKey::key("declarations"));
        for (index, declarator) in declarations.iter().enumerate() {
            self.st.trail.push(TrailKey::Index(index));
            self.with_pattern_child(declarator, "id", kind)?;
            self.visit_child(declarator, "init")?;
            self.st.trail.pop();
        }
        self.st.trail.pop();
        Ok(())
    }

    // -- simple scoped statements -------------------------------------------

    fn visit_block_statement(&mut self, node: &Value) -> AResult {
        let parent = self.st.current_block;
        let block = self.st.blocks.create_block(None, false, Some(parent));
        self.st.current_block = block;
        let result = self.visit_children(node, "body");
        self.st.current_block = parent;
        result
    }

    fn visit_switch(&mut self, node: &Value) -> AResult {
        self.visit_child(node, "discriminant")?;
        // All cases share one lexical scope.
        let parent = self.st.current_block;
        let block = self.st.blocks.create_block(None, false, Some(parent));
        self.st.current_block = block;
        let result = self.visit_children(node, "cases");
        self.st.current_block = parent;
        result
    }

    fn visit_catch(&mut self, node: &Value) -> AResult {
        let parent = self.st.current_block;
        let block = self.st.blocks.create_block(None, false, Some(parent));
        self.st.current_block = block;
        let result = (|| {
            self.with_pattern_child(node, "param", DeclKind::CatchParam)?;
            self.visit_child(node, "body")
        })();
        self.st.current_block = parent;
        result
    }

    fn visit_with(&mut self, node: &Value) -> AResult {
        self.visit_child(node, "object")?;
        self.st.jobs.push(Job::RewriteWith {
            block: self.st.current_block,
            trail: self.st.trail_snapshot(),
        });
        // The with block carries a synthetic binding so resolution inside
        // the body cannot cross it silently: any name could be shadowed by
        // the with object at runtime.
        let parent = self.st.current_block;
        let block = self.st.blocks.create_block(Some("with".to_owned()), false, Some(parent));
        self.st
            .blocks
            .create_binding_without_name_check(block, "with", BindingProps::default());
        self.st.current_block = block;
        let result = self.visit_child(node, "body");
        self.st.current_block = parent;
        result
    }

    // -- loops --------------------------------------------------------------

    /// Creates the init+body block pair every loop form gets: bindings in
    /// the head live in the init block, whose vars materialize in the body
    /// block (one activation per iteration).
    fn create_loop_blocks(&mut self, body: Option<&Value>) -> (BlockId, BlockId) {
        let parent = self.st.current_block;
        let init_block = self.st.blocks.create_block(None, false, Some(parent));
        let body_block = self.st.blocks.create_block(None, true, Some(init_block));
        self.st.blocks.get_mut(init_block).vars_block = body_block;
        let mut body_trail = self.st.trail_snapshot();
        body_trail.push(TrailKey::key("body"));
        if body.is_some_and(|b| ast::kind_of(b) == Some(NodeKind::BlockStatement)) {
            body_trail.push(TrailKey::key("body"));
        }
        let owner = self.st.current_function;
        let block = self.st.blocks.get_mut(body_block);
        block.body_trail = Some(body_trail);
        block.owner_fn = owner;
        (init_block, body_block)
    }

    fn visit_loop_body(&mut self, node: &Value, body_block: BlockId) -> AResult {
        let saved = self.st.current_block;
        self.st.current_block = body_block;
        let result = match node.get("body") {
            // A block-statement body shares the loop's body block rather
            // than nesting a second one; declarations insert at its top.
            Some(body) if ast::kind_of(body) == Some(NodeKind::BlockStatement) => {
                self.st.trail.push(TrailKey::key("body"));
                let r = self.visit_children(body, "body");
                if r.is_ok() {
                    self.st.trail.pop();
                }
                r
            }
            Some(body) if !body.is_null() => {
                self.st.trail.push(TrailKey::key("body"));
                let r = self.visit_node(body);
                if r.is_ok() {
                    self.st.trail.pop();
                }
                r
            }
            _ => Ok(()),
        };
        self.st.current_block = saved;
        result
    }

    fn visit_for(&mut self, node: &Value) -> AResult {
        let (init_block, body_block) = self.create_loop_blocks(node.get("body"));
        // Captures from a `for (let …)` head must survive the head's TDZ;
        // temps under the body block are kept as objects.
        self.st.blocks.get_mut(body_block).temp_vars_as_objects = true;
        let saved = self.st.current_block;
        self.st.current_block = init_block;
        let result = (|| {
            self.visit_child(node, "init")?;
            self.visit_child(node, "test")?;
            self.visit_child(node, "update")?;
            self.visit_loop_body(node, body_block)
        })();
        self.st.current_block = saved;
        result
    }

    fn visit_for_in_of(&mut self, node: &Value) -> AResult {
        if ast::flag(node, "await") {
            return Err(AnalysisError::unsupported(
                "'for await' statements are not supported",
                CodeLoc::from_node(node),
            ));
        }
        let (init_block, body_block) = self.create_loop_blocks(node.get("body"));
        let saved = self.st.current_block;
        self.st.current_block = init_block;
        let result = (|| {
            match node.get("left").map(ast::kind_of) {
                Some(Some(NodeKind::VariableDeclaration)) => self.visit_child(node, "left")?,
                Some(_) => {
                    self.st.trail.push(TrailKey::key("left"));
                    self.visit_pattern(node.get("left").expect("left present"), DeclKind::Assign)?;
                    self.st.trail.pop();
                }
                None => {}
            }
            // The right-hand side resolves against clones of the head's
            // bindings: `for (const x of x)` must hit the new `x`, in its
            // dead zone, not an outer one.
            let rhs_parent = self.st.blocks.get(init_block).parent;
            let rhs_block = self.st.blocks.create_block(None, false, rhs_parent);
            let cloned: Vec<(String, BindingProps)> = self
                .st
                .blocks
                .get(init_block)
                .bindings
                .iter()
                .map(|(name, binding)| {
                    (
                        name.clone(),
                        BindingProps {
                            is_const: binding.is_const,
                            is_silent_const: binding.is_silent_const,
                            is_var: binding.is_var,
                            is_function: binding.is_function,
                        },
                    )
                })
                .collect();
            for (name, props) in cloned {
                self.st.blocks.create_binding_without_name_check(rhs_block, &name, props);
            }
            self.st.current_block = rhs_block;
            self.visit_child(node, "right")?;
            self.st.current_block = init_block;
            self.visit_loop_body(node, body_block)
        })();
        self.st.current_block = saved;
        result
    }

    fn visit_loop(&mut self, node: &Value) -> AResult {
        let (init_block, body_block) = self.create_loop_blocks(node.get("body"));
        let saved = self.st.current_block;
        self.st.current_block = init_block;
        let result = (|| {
            self.visit_child(node, "test")?;
            self.visit_loop_body(node, body_block)
        })();
        self.st.current_block = saved;
        result
    }

    // -- expressions with identifier contexts -------------------------------

    fn visit_assignment(&mut self, node: &Value) -> AResult {
        let is_compound = node.get("operator").and_then(Value::as_str) != Some("=");
        if let Some(left) = node.get("left") {
            match ast::kind_of(left) {
                Some(NodeKind::Identifier) => {
                    if let Some(name) = ast::identifier_name(left) {
                        self.st.trail.push(TrailKey::key("left"));
                        self.enqueue_identifier_use(name, is_compound, true);
                        self.st.trail.pop();
                    }
                }
                Some(NodeKind::ObjectPattern | NodeKind::ArrayPattern) => {
                    self.st.trail.push(TrailKey::key("left"));
                    self.visit_pattern(left, DeclKind::Assign)?;
                    self.st.trail.pop();
                }
                _ => self.visit_child(node, "left")?,
            }
        }
        self.visit_child(node, "right")
    }

    fn visit_update(&mut self, node: &Value) -> AResult {
        match node.get("argument").and_then(ast::identifier_name) {
            Some(name) => {
                self.st.trail.push(TrailKey::key("argument"));
                self.enqueue_identifier_use(name, true, true);
                self.st.trail.pop();
                Ok(())
            }
            None => self.visit_child(node, "argument"),
        }
    }

    fn visit_member(&mut self, node: &Value) -> AResult {
        match node.get("object").map(ast::kind_of) {
            Some(Some(NodeKind::Super)) => {
                self.st.trail.push(TrailKey::key("object"));
                self.visit_super_use(AmendmentKind::SuperExpression)?;
                self.st.trail.pop();
            }
            _ => self.visit_child(node, "object")?,
        }
        if ast::flag(node, "computed") {
            self.visit_child(node, "property")?;
        }
        Ok(())
    }

    fn visit_call(&mut self, node: &Value) -> AResult {
        let callee_kind = node.get("callee").map(ast::kind_of);
        match callee_kind {
            Some(Some(NodeKind::Super)) => {
                self.st.trail.push(TrailKey::key("callee"));
                self.visit_super_use(AmendmentKind::SuperCall)?;
                self.st.trail.pop();
                return self.visit_children(node, "arguments");
            }
            Some(Some(NodeKind::Import)) => {
                self.mark_contains_import();
                return self.visit_children(node, "arguments");
            }
            _ => {}
        }
        let is_eval_callee = node.get("callee").and_then(ast::identifier_name) == Some("eval");
        if is_eval_callee {
            let args = node.get("arguments").and_then(Value::as_array);
            let first_is_spread = args
                .and_then(|a| a.first())
                .is_some_and(|a| ast::kind_of(a) == Some(NodeKind::SpreadElement));
            let has_args = args.is_some_and(|a| !a.is_empty());
            if has_args && !first_is_spread {
                // Direct eval: the callee stays in place; the whole call is
                // rewritten in pass 2 around the original `eval` reference.
                self.st.file_contains_eval = true;
                self.mark_contains_eval();
                self.st.jobs.push(Job::RewriteEval {
                    block: self.st.current_block,
                    fn_idx: self.st.current_function,
                    trail: self.st.trail_snapshot(),
                    is_strict: self.st.is_strict,
                    super_block: self.st.current_super_block,
                    hoist_block: self.st.current_hoist_block,
                });
                return self.visit_children(node, "arguments");
            }
            // `eval()` with no argument or a spread first argument is left
            // untouched: there is nothing to capture statically.
            return self.visit_children(node, "arguments");
        }
        self.visit_child(node, "callee")?;
        self.visit_children(node, "arguments")
    }

    fn mark_contains_eval(&mut self) {
        let mut current = self.st.current_function;
        while let Some(idx) = current {
            let function = self.st.functions.get_mut(idx);
            function.contains_eval = true;
            current = function.parent;
        }
    }

    fn mark_contains_import(&mut self) {
        let mut current = self.st.current_function;
        while let Some(idx) = current {
            let function = self.st.functions.get_mut(idx);
            function.contains_import = true;
            current = function.parent;
        }
    }

    // -- super --------------------------------------------------------------

    /// Handles a use of `super`, with the trail positioned at the `Super`
    /// node itself.
    fn visit_super_use(&mut self, kind: AmendmentKind) -> AResult {
        let Some(super_block) = self.st.current_super_block else {
            return Err(AnalysisError::syntax(
                "'super' outside of a method or constructor",
                None,
            ));
        };
        let Some(fn_idx) = self.st.current_function else {
            return Err(AnalysisError::syntax(
                "'super' outside of a method or constructor",
                None,
            ));
        };

        // Activate the lazily-created super binding: `super` is not a value,
        // so its emission name is a temp that the class transformation
        // assigns the super target to.
        if self.st.blocks.binding(super_block, "super").is_none() {
            let temp = self.st.blocks.create_block_temp_var(super_block, &self.st.alloc);
            self.st.register_block_decls(temp.vars_block);
            let binding = self.st.blocks.create_binding_without_name_check(
                super_block,
                "super",
                BindingProps {
                    is_const: true,
                    ..BindingProps::default()
                },
            );
            binding.var_name = Some(temp.name);
        }
        let var_node = self.super_var_node(super_block);

        let trail = self.st.trail_snapshot();
        let relative = self.relative_trail(fn_idx, &trail);
        let activation = self.st.blocks.activate(super_block, &self.st.alloc);
        self.st.register_block_decls(activation.vars_block);
        let var = self
            .st
            .functions
            .record_external_var(fn_idx, super_block, "super", var_node);
        var.is_read_from = true;
        var.trails.push(relative.clone());

        self.st.jobs.push(Job::SuperAmendment {
            fn_idx,
            kind,
            block_id: super_block,
            trail: relative,
        });

        // `super()` marks the statement it occurs in for constructors.
        if kind == AmendmentKind::SuperCall
            && let Some(stmt_index) = self.st.current_ctor_stmt_index
        {
            let function = self.st.functions.get_mut(fn_idx);
            if function.first_super_statement_index.is_none() {
                function.first_super_statement_index = Some(stmt_index);
            }
        }

        // Propagate the proto/static orientation up to every function that
        // closes over this super target.
        let super_is_proto = self.st.super_is_proto;
        let mut current = Some(fn_idx);
        while let Some(idx) = current {
            let function = self.st.functions.get_mut(idx);
            if function.id <= super_block {
                break;
            }
            function.super_is_proto = super_is_proto;
            current = function.parent;
        }

        // An arrow using `super` also needs the method's `this` to rebuild
        // the home-object relationship.
        if self.st.functions.get(fn_idx).is_arrow {
            self.record_lexical_use("this");
        }
        Ok(())
    }

    /// The emission node for the captured super target.
    fn super_var_node(&self, super_block: BlockId) -> Value {
        let binding = self
            .st
            .blocks
            .binding(super_block, "super")
            .expect("super binding activated");
        let name = binding.var_name.as_deref().expect("super binding materialized");
        if self
            .st
            .blocks
            .get(self.st.blocks.get(super_block).vars_block)
            .temp_vars_as_objects
        {
            ast::member(ast::identifier(name), "value")
        } else {
            ast::identifier(name)
        }
    }

    // -- imports / exports --------------------------------------------------

    fn visit_import_declaration(&mut self, node: &Value) -> AResult {
        let Some(specifiers) = node.get("specifiers").and_then(Value::as_array) else {
            return Ok(());
        };
        for specifier in specifiers {
            if let Some(local) = specifier.get("local").and_then(ast::identifier_name) {
                self.st.blocks.create_binding_without_name_check(
                    self.st.current_block,
                    local,
                    BindingProps {
                        is_const: true,
                        ..BindingProps::default()
                    },
                );
            }
        }
        Ok(())
    }

    fn visit_export_named(&mut self, node: &Value) -> AResult {
        if node.get("declaration").is_some_and(|d| !d.is_null()) {
            return self.visit_child(node, "declaration");
        }
        if node.get("source").is_some_and(|s| !s.is_null()) {
            return Ok(());
        }
        let Some(specifiers) = node.get("specifiers").and_then(Value::as_array) else {
            return Ok(());
        };
        self.st.trail.push(TrailKey::key("specifiers"));
        for (index, specifier) in specifiers.iter().enumerate() {
            if let Some(name) = specifier.get("local").and_then(ast::identifier_name) {
                self.st.trail.push(TrailKey::Index(index));
                self.st.trail.push(TrailKey::key("local"));
                self.enqueue_identifier_use(name, true, false);
                self.st.trail.pop();
                self.st.trail.pop();
            }
        }
        self.st.trail.pop();
        Ok(())
    }

    // -- functions ----------------------------------------------------------

    fn visit_function_declaration(&mut self, node: &Value) -> AResult {
        if let Some(name) = node.get("id").and_then(ast::identifier_name) {
            self.st.blocks.create_binding(
                self.st.current_block,
                name,
                BindingProps {
                    is_var: true,
                    is_function: true,
                    ..BindingProps::default()
                },
                &mut self.st.alloc,
            );
            if !self.st.is_strict && Some(self.st.current_block) != self.st.current_hoist_block {
                self.st.sloppy_fn_decls.push(SloppyFnDecl {
                    name: name.to_owned(),
                    block: self.st.current_block,
                    hoist_block: self.st.current_hoist_block,
                    params_block: self.st.current_function.map(|f| self.st.functions.get(f).params_block),
                });
            }
        }
        self.visit_function(node, fn_type_of(node), None, FunctionForm::Plain)
    }

    /// Common walk for functions, arrows and methods.
    ///
    /// `name_for_block` wraps the function in a name block holding its own
    /// (silently const) name binding — function expressions only; declared
    /// names bind in the enclosing scope and are handled by the caller.
    fn visit_function(
        &mut self,
        node: &Value,
        fn_type: FnType,
        name_for_block: Option<&str>,
        form: FunctionForm,
    ) -> AResult {
        self.st.file_contains_functions = true;
        let saved = self.save_context();

        // Name block, when the expression names itself.
        let mut name_block = None;
        if let Some(name) = name_for_block {
            let block = self
                .st
                .blocks
                .create_block(Some(name.to_owned()), false, Some(self.st.current_block));
            self.st.blocks.create_binding(
                block,
                name,
                BindingProps {
                    is_const: true,
                    is_silent_const: true,
                    is_var: false,
                    is_function: true,
                },
                &mut self.st.alloc,
            );
            self.st.current_block = block;
            name_block = Some(block);
        }

        let body = node.get("body");
        let body_is_block = body.is_some_and(|b| ast::kind_of(b) == Some(NodeKind::BlockStatement));
        let is_strict = self.st.is_strict || body.is_some_and(ast::has_use_strict);

        let name_hint = node
            .get("id")
            .and_then(ast::identifier_name)
            .map(str::to_owned)
            .or_else(|| name_for_block.map(str::to_owned));
        let params_block = self
            .st
            .blocks
            .create_block(name_hint, true, Some(self.st.current_block));
        let fn_idx = self
            .st
            .functions
            .create(params_block, self.st.trail_snapshot(), fn_type, self.st.current_function);
        {
            let function = self.st.functions.get_mut(fn_idx);
            function.is_strict = is_strict;
            function.is_arrow = form == FunctionForm::Arrow;
            function.name_block = name_block;
        }
        if let Some(block) = name_block {
            self.st.blocks.get_mut(block).name_block_of = Some(fn_idx);
        }
        self.st.current_function = Some(fn_idx);
        self.st.is_strict = is_strict;
        self.st.current_block = params_block;
        self.st.current_ctor_stmt_index = None;
        self.st.blocks.get_mut(params_block).owner_fn = Some(fn_idx);

        if form != FunctionForm::Arrow {
            self.st
                .blocks
                .create_binding_without_name_check(params_block, "this", BindingProps::default());
            self.st
                .blocks
                .create_binding_without_name_check(params_block, "new.target", BindingProps::default());
            self.st.current_this_block = Some(params_block);
            if form == FunctionForm::Plain {
                // Plain functions cut off `super`; methods keep the caller's
                // super block, arrows inherit everything.
                self.st.current_super_block = None;
            }
        }

        // Body block: statement bodies get their own vars block and the
        // params chain to it.
        let body_block = if body_is_block {
            let block = self.st.blocks.create_block(None, true, Some(params_block));
            self.st.blocks.get_mut(params_block).vars_block = block;
            let mut body_trail = self.st.trail_snapshot();
            body_trail.push(TrailKey::key("body"));
            body_trail.push(TrailKey::key("body"));
            let b = self.st.blocks.get_mut(block);
            b.body_trail = Some(body_trail);
            b.owner_fn = Some(fn_idx);
            Some(block)
        } else {
            None
        };
        self.st.functions.get_mut(fn_idx).body_block = body_block;
        self.st.current_hoist_block = Some(body_block.unwrap_or(params_block));

        // The tracker's placement must be settled before anything inside
        // the function can trigger an activation, so params are pre-scanned
        // for complexity here rather than discovered during the walk.
        let scan = scan_params(node)?;
        if let Some(index) = scan.first_complex_param_index {
            let function = self.st.functions.get_mut(fn_idx);
            function.first_complex_param_index = Some(index);
            // The tracker must live in the params: the params block becomes
            // its own vars block again.
            self.st.blocks.get_mut(params_block).vars_block = params_block;
            self.st.blocks.get_mut(params_block).is_function_scope = true;
        } else {
            let vars_block = body_block.unwrap_or(params_block);
            self.st.blocks.get_mut(vars_block).is_function_scope = true;
        }

        // Params.
        let result = (|| {
            if let Some(params) = node.get("params").and_then(Value::as_array) {
                self.st.trail.push(TrailKey::key("params"));
                for (index, param) in params.iter().enumerate() {
                    self.st.trail.push(TrailKey::Index(index));
                    self.visit_pattern(param, DeclKind::Param)?;
                    self.st.trail.pop();
                }
                self.st.trail.pop();
            }

            // Body.
            if body_is_block {
                let block = body_block.expect("body block exists for block bodies");
                self.st.current_block = block;
                self.st.trail.push(TrailKey::key("body"));
                self.visit_children(body.expect("body present"), "body")?;
                self.st.trail.pop();
            } else if body.is_some() {
                self.visit_child(node, "body")?;
            }

            // `arguments`: created after the walk so a user declaration
            // (a param or a hoisted `var arguments`) wins.
            if form != FunctionForm::Arrow {
                let user_declared = self.st.blocks.binding(params_block, "arguments").is_some()
                    || body_block.is_some_and(|b| self.st.blocks.binding(b, "arguments").is_some());
                if !user_declared {
                    let linked = !is_strict && scan.first_complex_param_index.is_none();
                    let binding = self.st.blocks.create_binding_without_name_check(
                        params_block,
                        "arguments",
                        BindingProps::default(),
                    );
                    binding.is_arguments = true;
                    if linked {
                        binding.arg_names = Some(scan.simple_param_names.clone());
                        self.st.functions.get_mut(fn_idx).arg_names = Some(scan.simple_param_names);
                    }
                }
            }
            Ok(())
        })();

        self.restore_context(saved);
        if result.is_ok() {
            self.st.jobs.push(Job::InstrumentFunction { fn_idx });
        }
        result
    }

    // -- object literals ----------------------------------------------------

    fn visit_object_expression(&mut self, node: &Value) -> AResult {
        let Some(properties) = node.get("properties").and_then(Value::as_array) else {
            return Ok(());
        };

        // Plain properties and spreads first.
        self.st.trail.push(TrailKey::key("properties"));
        for (index, prop) in properties.iter().enumerate() {
            match ast::kind_of(prop) {
                Some(NodeKind::ObjectProperty) => {
                    self.st.trail.push(TrailKey::Index(index));
                    self.visit_child(prop, "value")?;
                    self.st.trail.pop();
                }
                Some(NodeKind::SpreadElement) => {
                    self.st.trail.push(TrailKey::Index(index));
                    self.visit_child(prop, "argument")?;
                    self.st.trail.pop();
                }
                _ => {}
            }
        }

        // Methods inside a fresh super block.
        let has_methods = properties
            .iter()
            .any(|p| ast::kind_of(p) == Some(NodeKind::ObjectMethod));
        if has_methods {
            let saved_block = self.st.current_block;
            let saved_super = self.st.current_super_block;
            let saved_proto = self.st.super_is_proto;
            let super_block = self.st.blocks.create_block(None, false, Some(saved_block));
            self.st.current_block = super_block;
            self.st.current_super_block = Some(super_block);
            self.st.super_is_proto = true;
            for (index, prop) in properties.iter().enumerate() {
                if ast::kind_of(prop) != Some(NodeKind::ObjectMethod) {
                    continue;
                }
                self.st.trail.push(TrailKey::Index(index));
                self.visit_function(prop, fn_type_of(prop), None, FunctionForm::Method)?;
                self.st.trail.pop();
            }
            self.st.current_block = saved_block;
            self.st.current_super_block = saved_super;
            self.st.super_is_proto = saved_proto;

            // A captured super target means the literal itself must be
            // observable: wrap it in an assignment to the capture temp.
            if self.st.blocks.binding(super_block, "super").is_some() {
                let temp_node = self.super_var_node(super_block);
                self.st.trail.pop();
                self.st.mutations.push(Mutation::Replace {
                    trail: self.st.trail_snapshot(),
                    kind: ReplaceKind::WrapObjectSuper { temp_node },
                });
                self.st.trail.push(TrailKey::key("properties"));
            }
        }

        // Computed keys last, in the outer scope.
        for (index, prop) in properties.iter().enumerate() {
            if !ast::flag(prop, "computed") {
                continue;
            }
            self.st.trail.push(TrailKey::Index(index));
            self.visit_child(prop, "key")?;
            self.st.trail.pop();
        }
        self.st.trail.pop();
        Ok(())
    }

    // -- classes ------------------------------------------------------------

    fn visit_class(&mut self, node: &Value, is_declaration: bool) -> AResult {
        self.st.file_contains_functions = true;
        let class_name = node.get("id").and_then(ast::identifier_name).map(str::to_owned);

        if is_declaration
            && let Some(name) = &class_name
        {
            self.check_commonjs_shadow(name, CodeLoc::from_node(node))?;
            self.st.blocks.create_binding(
                self.st.current_block,
                name,
                BindingProps {
                    is_function: true,
                    ..BindingProps::default()
                },
                &mut self.st.alloc,
            );
        }

        let saved = self.save_context();
        self.st.is_strict = true;
        self.st.current_ctor_stmt_index = None;

        // Inner name binding: the class name seen from inside is const.
        let mut name_block = None;
        if let Some(name) = &class_name {
            let block = self
                .st
                .blocks
                .create_block(Some(name.clone()), false, Some(self.st.current_block));
            self.st.blocks.create_binding(
                block,
                name,
                BindingProps {
                    is_const: true,
                    is_function: true,
                    ..BindingProps::default()
                },
                &mut self.st.alloc,
            );
            self.st.current_block = block;
            name_block = Some(block);
        }

        let super_block = self
            .st
            .blocks
            .create_block(class_name.clone(), false, Some(self.st.current_block));
        let params_block = self.st.blocks.create_block(class_name, true, Some(super_block));
        let fn_idx = self
            .st
            .functions
            .create(params_block, self.st.trail_snapshot(), FnType::Class, self.st.current_function);
        {
            let function = self.st.functions.get_mut(fn_idx);
            function.is_strict = true;
            function.has_super_class = node.get("superClass").is_some_and(|s| !s.is_null());
            function.name_block = name_block;
            function.super_block = Some(super_block);
        }
        if let Some(block) = name_block {
            self.st.blocks.get_mut(block).name_block_of = Some(fn_idx);
        }
        self.st.blocks.get_mut(params_block).owner_fn = Some(fn_idx);
        self.st.current_function = Some(fn_idx);

        let result = self.visit_class_inner(node, fn_idx, super_block, params_block);

        self.restore_context(saved);
        if result.is_ok() {
            self.st.jobs.push(Job::InstrumentFunction { fn_idx });
        }
        result
    }

    fn visit_class_inner(
        &mut self,
        node: &Value,
        fn_idx: FnIndex,
        super_block: BlockId,
        params_block: BlockId,
    ) -> AResult {
        // 1. Extends clause, outside the super block.
        self.visit_child(node, "superClass")?;

        let Some(class_body) = node.get("body") else {
            return Ok(());
        };
        let Some(members) = class_body.get("body").and_then(Value::as_array) else {
            return Ok(());
        };
        self.st.current_block = super_block;
        self.st.current_super_block = Some(super_block);
        self.st.trail.push(TrailKey::key("body"));
        self.st.trail.push(TrailKey::key("body"));

        let result = (|| {
            // 2. Constructor.
            for (index, member) in members.iter().enumerate() {
                if !is_constructor(member) {
                    continue;
                }
                self.st.trail.push(TrailKey::Index(index));
                self.visit_constructor(member, fn_idx, params_block)?;
                self.st.trail.pop();
            }
            if self.st.functions.get(fn_idx).body_block.is_none() && self.st.functions.get(fn_idx).has_super_class {
                // No user constructor: the synthesized one forwards to and
                // returns `super(…)`.
                self.st.functions.get_mut(fn_idx).returns_super = true;
            }

            // 3. Prototype properties, in their own `this` block.
            let proto_props: Vec<usize> = members
                .iter()
                .enumerate()
                .filter(|(_, m)| is_property(m) && !ast::flag(m, "static"))
                .map(|(i, _)| i)
                .collect();
            if !proto_props.is_empty() {
                self.visit_property_group(members, &proto_props, true)?;
            }

            // 4. Static properties and static blocks, in their own `this`
            // block bound to the class itself.
            let static_members: Vec<usize> = members
                .iter()
                .enumerate()
                .filter(|(_, m)| {
                    (is_property(m) && ast::flag(m, "static")) || ast::kind_of(m) == Some(NodeKind::StaticBlock)
                })
                .map(|(i, _)| i)
                .collect();
            if !static_members.is_empty() {
                self.visit_static_group(members, &static_members, fn_idx)?;
            }

            // 5. Methods.
            for (index, member) in members.iter().enumerate() {
                let is_method = matches!(
                    ast::kind_of(member),
                    Some(NodeKind::ClassMethod | NodeKind::ClassPrivateMethod)
                ) && !is_constructor(member);
                if !is_method {
                    continue;
                }
                self.st.super_is_proto = !ast::flag(member, "static");
                self.st.trail.push(TrailKey::Index(index));
                self.visit_function(member, fn_type_of(member), None, FunctionForm::Method)?;
                self.st.trail.pop();
            }

            // 6. Computed keys, outside the super block.
            self.st.current_super_block = None;
            for (index, member) in members.iter().enumerate() {
                if !ast::flag(member, "computed") {
                    continue;
                }
                self.st.trail.push(TrailKey::Index(index));
                self.visit_child(member, "key")?;
                self.st.trail.pop();
            }
            Ok(())
        })();

        if result.is_ok() {
            self.st.trail.pop();
            self.st.trail.pop();
        }
        result
    }

    /// Walks the user constructor using the class's own function record:
    /// a class serializes as one unit, so the constructor's params/body
    /// blocks *are* the class's params/body blocks.
    fn visit_constructor(&mut self, member: &Value, fn_idx: FnIndex, params_block: BlockId) -> AResult {
        let saved_block = self.st.current_block;
        let saved_this = self.st.current_this_block;
        let saved_hoist = self.st.current_hoist_block;
        let saved_proto = self.st.super_is_proto;

        self.st.current_block = params_block;
        self.st.current_this_block = Some(params_block);
        self.st.super_is_proto = true;
        self.st
            .blocks
            .create_binding_without_name_check(params_block, "this", BindingProps::default());
        self.st
            .blocks
            .create_binding_without_name_check(params_block, "new.target", BindingProps::default());

        let body = member.get("body");
        let body_is_block = body.is_some_and(|b| ast::kind_of(b) == Some(NodeKind::BlockStatement));
        let body_block = if body_is_block {
            let block = self.st.blocks.create_block(None, true, Some(params_block));
            self.st.blocks.get_mut(params_block).vars_block = block;
            let mut body_trail = self.st.trail_snapshot();
            body_trail.push(TrailKey::key("body"));
            body_trail.push(TrailKey::key("body"));
            let b = self.st.blocks.get_mut(block);
            b.body_trail = Some(body_trail);
            b.owner_fn = Some(fn_idx);
            Some(block)
        } else {
            None
        };
        self.st.functions.get_mut(fn_idx).body_block = body_block;
        self.st.current_hoist_block = body_block.or(Some(params_block));

        let scan = scan_params(member)?;
        if let Some(index) = scan.first_complex_param_index {
            let function = self.st.functions.get_mut(fn_idx);
            function.first_complex_param_index = Some(index);
            self.st.blocks.get_mut(params_block).vars_block = params_block;
            self.st.blocks.get_mut(params_block).is_function_scope = true;
        } else {
            let vars_block = body_block.unwrap_or(params_block);
            self.st.blocks.get_mut(vars_block).is_function_scope = true;
        }

        let result = (|| {
            if let Some(params) = member.get("params").and_then(Value::as_array) {
                self.st.trail.push(TrailKey::key("params"));
                for (index, param) in params.iter().enumerate() {
                    self.st.trail.push(TrailKey::Index(index));
                    self.visit_pattern(param, DeclKind::Param)?;
                    self.st.trail.pop();
                }
                self.st.trail.pop();
            }

            if let Some(block) = body_block {
                self.st.current_block = block;
                let statements = body
                    .and_then(|b| b.get("body"))
                    .and_then(Value::as_array)
                    .map_or(&[][..], Vec::as_slice);
                self.st.trail.push(TrailKey::key("body"));
                self.st.trail.push(TrailKey::key("body"));
                for (index, statement) in statements.iter().enumerate() {
                    self.st.current_ctor_stmt_index = Some(u32::try_from(index).expect("index fits in u32"));
                    if is_return_of_super_call(statement) {
                        self.st.functions.get_mut(fn_idx).returns_super = true;
                    }
                    self.st.trail.push(TrailKey::Index(index));
                    self.visit_node(statement)?;
                    self.st.trail.pop();
                }
                self.st.current_ctor_stmt_index = None;
                self.st.trail.pop();
                self.st.trail.pop();
            }

            // Constructor `arguments`. Class code is always strict, so it
            // never links to the formals.
            let user_declared = self.st.blocks.binding(params_block, "arguments").is_some()
                || body_block.is_some_and(|b| self.st.blocks.binding(b, "arguments").is_some());
            if !user_declared {
                let binding = self.st.blocks.create_binding_without_name_check(
                    params_block,
                    "arguments",
                    BindingProps::default(),
                );
                binding.is_arguments = true;
            }
            Ok(())
        })();

        self.st.current_block = saved_block;
        self.st.current_this_block = saved_this;
        self.st.current_hoist_block = saved_hoist;
        self.st.super_is_proto = saved_proto;
        result
    }

    /// Prototype property values share one `this` block.
    fn visit_property_group(&mut self, members: &[Value], indices: &[usize], is_proto: bool) -> AResult {
        let saved_block = self.st.current_block;
        let saved_this = self.st.current_this_block;
        let saved_proto = self.st.super_is_proto;
        let this_block = self.st.blocks.create_block(None, false, Some(saved_block));
        self.st
            .blocks
            .create_binding_without_name_check(this_block, "this", BindingProps::default());
        self.st
            .blocks
            .create_binding_without_name_check(this_block, "new.target", BindingProps::default());
        self.st.current_block = this_block;
        self.st.current_this_block = Some(this_block);
        self.st.super_is_proto = is_proto;

        let mut result = Ok(());
        for &index in indices {
            self.st.trail.push(TrailKey::Index(index));
            result = self.visit_child(&members[index], "value");
            if result.is_err() {
                break;
            }
            self.st.trail.pop();
        }

        self.st.current_block = saved_block;
        self.st.current_this_block = saved_this;
        self.st.super_is_proto = saved_proto;
        result
    }

    /// Static property values and static block bodies share one `this`
    /// block bound to the class; each static block body is its own vars
    /// block.
    fn visit_static_group(&mut self, members: &[Value], indices: &[usize], fn_idx: FnIndex) -> AResult {
        let saved_block = self.st.current_block;
        let saved_this = self.st.current_this_block;
        let saved_proto = self.st.super_is_proto;
        let this_block = self.st.blocks.create_block(None, false, Some(saved_block));
        self.st
            .blocks
            .create_binding_without_name_check(this_block, "this", BindingProps::default());
        self.st
            .blocks
            .create_binding_without_name_check(this_block, "new.target", BindingProps::default());
        self.st.current_block = this_block;
        self.st.current_this_block = Some(this_block);
        self.st.super_is_proto = false;

        let mut result = Ok(());
        for &index in indices {
            let member = &members[index];
            self.st.trail.push(TrailKey::Index(index));
            if ast::kind_of(member) == Some(NodeKind::StaticBlock) {
                let block = self.st.blocks.create_block(None, true, Some(this_block));
                let mut body_trail = self.st.trail_snapshot();
                body_trail.push(TrailKey::key("body"));
                {
                    let b = self.st.blocks.get_mut(block);
                    b.body_trail = Some(body_trail);
                    b.owner_fn = Some(fn_idx);
                }
                let saved_inner = self.st.current_block;
                let saved_hoist = self.st.current_hoist_block;
                self.st.current_block = block;
                self.st.current_hoist_block = Some(block);
                result = self.visit_children(member, "body");
                self.st.current_block = saved_inner;
                self.st.current_hoist_block = saved_hoist;
            } else {
                result = self.visit_child(member, "value");
            }
            if result.is_err() {
                break;
            }
            self.st.trail.pop();
        }

        self.st.current_block = saved_block;
        self.st.current_this_block = saved_this;
        self.st.super_is_proto = saved_proto;
        result
    }

    // -- context save/restore -----------------------------------------------

    fn save_context(&self) -> SavedContext {
        SavedContext {
            current_block: self.st.current_block,
            current_function: self.st.current_function,
            current_this_block: self.st.current_this_block,
            current_super_block: self.st.current_super_block,
            current_hoist_block: self.st.current_hoist_block,
            is_strict: self.st.is_strict,
            super_is_proto: self.st.super_is_proto,
            current_ctor_stmt_index: self.st.current_ctor_stmt_index,
        }
    }

    fn restore_context(&mut self, saved: SavedContext) {
        self.st.current_block = saved.current_block;
        self.st.current_function = saved.current_function;
        self.st.current_this_block = saved.current_this_block;
        self.st.current_super_block = saved.current_super_block;
        self.st.current_hoist_block = saved.current_hoist_block;
        self.st.is_strict = saved.is_strict;
        self.st.super_is_proto = saved.super_is_proto;
        self.st.current_ctor_stmt_index = saved.current_ctor_stmt_index;
    }
}

struct SavedContext {
    current_block: BlockId,
    current_function: Option<FnIndex>,
    current_this_block: Option<BlockId>,
    current_super_block: Option<BlockId>,
    current_hoist_block: Option<BlockId>,
    is_strict: bool,
    super_is_proto: bool,
    current_ctor_stmt_index: Option<u32>,
}

/// How the function form affects `this`/`super` context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FunctionForm {
    /// Ordinary function: own `this`, cuts off `super`.
    Plain,
    /// Method: own `this`, keeps the enclosing super block.
    Method,
    /// Arrow: inherits everything.
    Arrow,
}

fn fn_type_of(node: &Value) -> FnType {
    FnType::from_flags(ast::flag(node, "async"), ast::flag(node, "generator"))
}

/// Result of the up-front parameter scan.
struct ParamScan {
    first_complex_param_index: Option<u32>,
    /// Names of the formals, populated only while all of them are simple
    /// (the only case `arguments` links).
    simple_param_names: Vec<String>,
}

/// Scans a function's params for the first non-simple one, without
/// descending into defaults or patterns.
fn scan_params(node: &Value) -> Result<ParamScan, AnalysisError> {
    let mut scan = ParamScan {
        first_complex_param_index: None,
        simple_param_names: Vec::new(),
    };
    let Some(params) = node.get("params").and_then(Value::as_array) else {
        return Ok(scan);
    };
    for (index, param) in params.iter().enumerate() {
        if ast::kind_of(param) == Some(NodeKind::Identifier) {
            if let Some(name) = ast::identifier_name(param) {
                scan.simple_param_names.push(name.to_owned());
            }
            continue;
        }
        if scan.first_complex_param_index.is_none() {
            scan.first_complex_param_index = Some(u32::try_from(index).expect("param index fits in u32"));
        }
        // A rest element binding an array pattern gets flattened into the
        // param list by the injector; elisions have no flattened equivalent.
        if ast::kind_of(param) == Some(NodeKind::RestElement)
            && let Some(argument) = param.get("argument")
            && rest_array_has_elisions(argument)
        {
            return Err(AnalysisError::unsupported(
                "elisions in a rest parameter's array pattern are not supported",
                CodeLoc::from_node(param),
            ));
        }
    }
    if scan.first_complex_param_index.is_some() {
        scan.simple_param_names.clear();
    }
    Ok(scan)
}

/// True when the (chained) rest array pattern contains a hole at a position
/// that flattening would surface into the param list.
fn rest_array_has_elisions(pattern: &Value) -> bool {
    if ast::kind_of(pattern) != Some(NodeKind::ArrayPattern) {
        return false;
    }
    let Some(elements) = pattern.get("elements").and_then(Value::as_array) else {
        return false;
    };
    if elements.iter().any(Value::is_null) {
        return true;
    }
    match elements.last() {
        Some(last) if ast::kind_of(last) == Some(NodeKind::RestElement) => last
            .get("argument")
            .is_some_and(rest_array_has_elisions),
        _ => false,
    }
}

fn is_constructor(member: &Value) -> bool {
    ast::kind_of(member) == Some(NodeKind::ClassMethod) && member.get("kind").and_then(Value::as_str) == Some("constructor")
}

fn is_property(member: &Value) -> bool {
    matches!(
        ast::kind_of(member),
        Some(NodeKind::ClassProperty | NodeKind::ClassPrivateProperty)
    )
}

/// `return super(…)` at constructor-statement level.
fn is_return_of_super_call(statement: &Value) -> bool {
    if ast::kind_of(statement) != Some(NodeKind::ReturnStatement) {
        return false;
    }
    let Some(argument) = statement.get("argument") else {
        return false;
    };
    ast::kind_of(argument) == Some(NodeKind::CallExpression)
        && argument.get("callee").map(ast::kind_of) == Some(Some(NodeKind::Super))
}

/// The node emitted for an eagerly-resolved lexical capture.
fn lexical_var_node(name: &str) -> Value {
    match name {
        "this" => ast::this_expression(),
        "new.target" => ast::node(
            NodeKind::MetaProperty,
            vec![
                ("meta", ast::identifier("new")),
                ("property", ast::identifier("target")),
            ],
        ),
        _ => ast::identifier(name),
    }
}
