//! Pass 2: the transformer.
//!
//! Drains the deferred job queue in enqueue order, which is post-order over
//! the tree: every job inside a function runs before that function's own
//! instrumentation job, and an ancestor is never touched before all of its
//! descendants are done. The drain performs resolution and bookkeeping, plus
//! the serialize/detach/reattach protocol that captures each function's
//! pristine AST; the actual tree edits are recorded as mutations and applied
//! afterwards by [`apply_mutations`], deepest anchor first, so every
//! recorded trail stays valid until the moment it is used.

use serde_json::Value;

use crate::{
    ast,
    blocks::BlockId,
    error::AnalysisError,
    fn_info,
    functions::{Amendment, AmendmentKind, FnIndex},
    state::{Job, Mutation, ReplaceKind, State},
    tracking,
    trail::{self, Trail, TrailKey},
};

/// Identifier names that cannot be captured into an eval scope in strict
/// mode (reserved words; `this` is handled separately and stays capturable).
const STRICT_RESERVED: [&str; 9] = [
    "implements",
    "interface",
    "let",
    "package",
    "private",
    "protected",
    "public",
    "static",
    "yield",
];

/// Drains the job queue and reattaches top-level functions afterwards.
pub(crate) fn run_jobs(st: &mut State<'_>, root: &mut Value) -> Result<(), AnalysisError> {
    let jobs = std::mem::take(&mut st.jobs);
    let mut transformer = Transformer { st, root };
    for job in jobs {
        transformer.run_job(job)?;
    }
    transformer.reattach_root_functions();
    Ok(())
}

struct Transformer<'a, 'o> {
    st: &'a mut State<'o>,
    root: &'a mut Value,
}

impl Transformer<'_, '_> {
    fn run_job(&mut self, job: Job) -> Result<(), AnalysisError> {
        match job {
            Job::ResolveIdentifier {
                block,
                fn_idx,
                name,
                trail,
                is_read,
                is_assign,
            } => {
                self.resolve_identifier(block, fn_idx, &name, &trail, is_read, is_assign);
                Ok(())
            }
            Job::RewriteBareEval {
                block,
                fn_idx,
                trail,
                is_read,
                is_assign,
            } => {
                self.rewrite_bare_eval(block, fn_idx, trail, is_read, is_assign);
                Ok(())
            }
            Job::RewriteEval {
                block,
                fn_idx,
                trail,
                is_strict,
                super_block,
                hoist_block,
            } => {
                self.rewrite_eval(block, fn_idx, trail, is_strict, super_block, hoist_block);
                Ok(())
            }
            Job::SuperAmendment {
                fn_idx,
                kind,
                block_id,
                trail,
            } => {
                self.st
                    .functions
                    .get_mut(fn_idx)
                    .amendments
                    .push(Amendment { kind, block_id, trail });
                Ok(())
            }
            Job::RewriteWith { block, trail } => {
                let temp = self.st.blocks.create_block_temp_var(block, &self.st.alloc);
                self.st.register_block_decls(temp.vars_block);
                self.st.mutations.push(Mutation::Replace {
                    trail,
                    kind: ReplaceKind::With { temp_node: temp.node },
                });
                Ok(())
            }
            Job::InstrumentFunction { fn_idx } => self.instrument_function(fn_idx),
        }
    }

    // -- identifier resolution ----------------------------------------------

    /// Walks the block chain for `name` and records the outcome: a global, a
    /// trail on an internal var, or an external-var use (with const
    /// violations diverted into amendments).
    fn resolve_identifier(
        &mut self,
        block: BlockId,
        fn_idx: Option<FnIndex>,
        name: &str,
        trail: &Trail,
        is_read: bool,
        mut is_assign: bool,
    ) {
        let Some(def_block) = self.st.blocks.resolve(block, name) else {
            if let Some(f) = fn_idx {
                self.st.functions.get_mut(f).global_var_names.insert(name.to_owned());
            }
            return;
        };
        let Some(f) = fn_idx else {
            // Top-level code is not serialized; a resolved use needs no
            // record.
            return;
        };
        let relative = relative_trail(self.st, f, trail);
        let fn_id = self.st.functions.get(f).id;

        if def_block >= fn_id {
            let binding = self.st.blocks.binding(def_block, name).expect("resolved binding exists");
            // Function names are not renameable and the `arguments` pseudo-
            // binding is reconstructed, not renamed; neither records trails.
            if binding.is_function || binding.is_arguments {
                return;
            }
            self.st
                .functions
                .get_mut(f)
                .internal_vars
                .entry(name.to_owned())
                .or_default()
                .push(relative);
            return;
        }

        let (is_const, is_silent_const, arg_names) = {
            let binding = self.st.blocks.binding(def_block, name).expect("resolved binding exists");
            (binding.is_const, binding.is_silent_const, binding.arg_names.clone())
        };
        if is_assign && is_const {
            let kind = if is_silent_const {
                AmendmentKind::ConstViolationSilent
            } else if is_read {
                AmendmentKind::ConstViolationNeedsVar
            } else {
                AmendmentKind::ConstViolationNeedsNoVar
            };
            self.st.functions.get_mut(f).amendments.push(Amendment {
                kind,
                block_id: def_block,
                trail: relative.clone(),
            });
            if !is_read {
                return;
            }
            is_assign = false;
        }

        let activation = self.st.blocks.activate(def_block, &self.st.alloc);
        self.st.register_block_decls(activation.vars_block);
        self.st.blocks.activate_binding(def_block, name);
        let var = self
            .st
            .functions
            .record_external_var(f, def_block, name, ast::identifier(name));
        var.is_read_from |= is_read;
        var.is_assigned_to |= is_assign;
        if let Some(names) = arg_names {
            var.arg_names = Some(names);
        }
        var.trails.push(relative);
    }

    // -- eval ---------------------------------------------------------------

    fn rewrite_bare_eval(
        &mut self,
        block: BlockId,
        fn_idx: Option<FnIndex>,
        trail: Trail,
        is_read: bool,
        is_assign: bool,
    ) {
        if self.st.blocks.resolve(block, "eval").is_some() {
            // A user binding shadows the real eval; this is an ordinary
            // identifier use.
            self.resolve_identifier(block, fn_idx, "eval", &trail, is_read, is_assign);
            return;
        }
        if is_assign {
            if let Some(f) = fn_idx {
                self.st.functions.get_mut(f).global_var_names.insert("eval".to_owned());
            }
            return;
        }
        self.st.uses_local_eval = true;
        self.st.mutations.push(Mutation::Replace {
            trail,
            kind: ReplaceKind::BareEval {
                name: self.st.alloc.local_eval_name(),
            },
        });
    }

    /// Builds the scope-capture list for a direct `eval()` call and records
    /// the rewrite.
    ///
    /// The list is built walking the block chain outward and then reversed,
    /// so the runtime receives outermost-first. A block contributes an entry
    /// when it is the file block, the hoist block, or has any capturable
    /// binding.
    fn rewrite_eval(
        &mut self,
        block: BlockId,
        fn_idx: Option<FnIndex>,
        trail: Trail,
        is_strict: bool,
        super_block: Option<BlockId>,
        hoist_block: Option<BlockId>,
    ) {
        if self.st.blocks.resolve(block, "eval").is_some() {
            let mut callee_trail = trail.clone();
            callee_trail.push(TrailKey::key("callee"));
            self.resolve_identifier(block, fn_idx, "eval", &callee_trail, true, false);
            return;
        }

        let mut entries: Vec<Value> = Vec::new();
        let mut current = Some(block);
        while let Some(id) = current {
            let parent = self.st.blocks.get(id).parent;
            let is_file = id == self.st.file_block;
            let is_hoist = Some(id) == hoist_block;

            let names: Vec<String> = self.st.blocks.get(id).bindings.keys().cloned().collect();
            let mut var_tuples: Vec<(String, Value)> = Vec::new();
            for name in names {
                if !self.eval_capturable(id, &name, is_file, is_strict, super_block) {
                    continue;
                }
                let binding = self.st.blocks.binding(id, &name).expect("binding exists");
                // `[name, isConst?, isSilentConst?, argNames?]`, with the
                // trailing falsy elements omitted.
                let mut tuple = vec![ast::string_literal(&name)];
                let width = if binding.arg_names.is_some() {
                    4
                } else if binding.is_silent_const {
                    3
                } else if binding.is_const {
                    2
                } else {
                    1
                };
                if width >= 2 {
                    tuple.push(ast::boolean_literal(binding.is_const));
                }
                if width >= 3 {
                    tuple.push(ast::boolean_literal(binding.is_silent_const));
                }
                if width >= 4 {
                    let linked = binding
                        .arg_names
                        .clone()
                        .expect("width four implies linked arg names")
                        .iter()
                        .map(|n| ast::string_literal(n))
                        .collect();
                    tuple.push(ast::array_expression(linked));
                }
                var_tuples.push((name, ast::array_expression(tuple)));
            }

            if is_file || is_hoist || !var_tuples.is_empty() {
                // Capturing a function's own name block promotes the
                // function's id so the name travels with it.
                if let Some(owner) = self.st.blocks.get(id).name_block_of {
                    let function = self.st.functions.get_mut(owner);
                    if function.id > id {
                        function.id = id;
                    }
                }

                let activation = self.st.blocks.activate(id, &self.st.alloc);
                self.st.register_block_decls(activation.vars_block);

                for (name, _) in &var_tuples {
                    self.st.blocks.activate_binding(id, name);
                    if let Some(f) = fn_idx {
                        let fn_id = self.st.functions.get(f).id;
                        if id < fn_id {
                            let (is_const, arg_names) = {
                                let b = self.st.blocks.binding(id, name).expect("binding exists");
                                (b.is_const, b.arg_names.clone())
                            };
                            let node = emission_node(self.st, id, name);
                            let var = self.st.functions.record_external_var(f, id, name, node);
                            var.is_read_from = true;
                            if !is_const {
                                var.is_assigned_to = true;
                            }
                            if let Some(names) = arg_names {
                                var.arg_names = Some(names);
                            }
                        }
                    }
                }

                let block_record = self.st.blocks.get(id);
                let mut entry = vec![
                    ast::numeric_literal(u64::from(id.as_u32())),
                    block_record
                        .name
                        .as_deref()
                        .map_or_else(ast::null_literal, ast::string_literal),
                    ast::identifier(&activation.scope_id_name),
                ];
                entry.extend(var_tuples.into_iter().map(|(_, tuple)| tuple));
                entries.push(ast::array_expression(entry));
            }
            current = parent;
        }
        entries.reverse();

        let temp = self.st.blocks.create_block_temp_var(block, &self.st.alloc);
        self.st.register_block_decls(temp.vars_block);
        self.st.mutations.push(Mutation::Replace {
            trail,
            kind: ReplaceKind::EvalCall {
                scopes: ast::array_expression(entries),
                temp_node: temp.node,
                is_strict,
                // The callee resolved past every user binding. In code that
                // is itself direct-eval'd, that environment `eval` is the
                // runtime's proxy.
                proxied: self.st.options.eval_is_proxied(),
                hoist_block_id: if is_strict { None } else { hoist_block.map(BlockId::as_u32) },
            },
        });
    }

    /// The exclusion filter for eval scope capture: `new.target`, the
    /// synthetic `with` binding, `require` and the CommonJS `arguments`
    /// (they would make the produced function unserializable), strict-mode
    /// reserved words, and `super` outside its accessible block.
    fn eval_capturable(
        &self,
        block: BlockId,
        name: &str,
        is_file: bool,
        is_strict: bool,
        super_block: Option<BlockId>,
    ) -> bool {
        if name == "new.target" || name == "with" {
            return false;
        }
        if is_file && self.st.options.is_commonjs() && (name == "require" || name == "arguments") {
            return false;
        }
        if is_strict && STRICT_RESERVED.contains(&name) {
            return false;
        }
        if name == "super" && Some(block) != super_block {
            return false;
        }
        true
    }

    // -- function instrumentation -------------------------------------------

    /// The per-function pass-2 step. By the time it runs, every job inside
    /// the function has run: resolution results are final and child
    /// subtrees are already detached (their slots read as null).
    fn instrument_function(&mut self, fn_idx: FnIndex) -> Result<(), AnalysisError> {
        self.copy_external_vars_up(fn_idx);
        self.st.functions.get_mut(fn_idx).external_vars.sort_keys();

        // Serialize with children detached, then put them back (now fully
        // instrumented) before recording this function's own edits.
        let declaration = fn_info::build_fn_info_declaration(self.st, self.root, fn_idx)?;
        self.st.fn_info_decls.push(declaration);

        let children = self.st.functions.get(fn_idx).children.clone();
        for child in children {
            let (child_trail, node) = {
                let c = self.st.functions.get_mut(child);
                (c.trail.clone(), c.detached_node.take())
            };
            if let Some(node) = node {
                assert!(
                    trail::set(self.root, &child_trail, node),
                    "child reattachment position exists"
                );
            }
        }

        let to_declare = std::mem::take(&mut self.st.functions.get_mut(fn_idx).blocks_to_declare);
        for block_id in to_declare {
            let stmts = block_decl_statements(self.st, block_id);
            let array_trail = self
                .st
                .blocks
                .get(block_id)
                .body_trail
                .clone()
                .expect("registered vars block has an insertion point");
            self.st.mutations.push(Mutation::InsertBlockDecls { array_trail, stmts });
        }

        tracking::build_injection(self.st, self.root, fn_idx);

        let fn_trail = self.st.functions.get(fn_idx).trail.clone();
        let node = trail::take(self.root, &fn_trail).expect("function node attached");
        self.st.functions.get_mut(fn_idx).detached_node = Some(node);
        Ok(())
    }

    /// Propagates this function's reportable scopes to the parent: the
    /// parent's tracker is what supplies values for the scopes its
    /// descendants capture. Entries internal to the parent stop there;
    /// entries external to it flow further up when the parent is
    /// instrumented.
    fn copy_external_vars_up(&mut self, fn_idx: FnIndex) {
        let Some(parent) = self.st.functions.get(fn_idx).parent else {
            return;
        };
        let mut to_copy = Vec::new();
        for (&block, vars) in &self.st.functions.get(fn_idx).external_vars {
            for (name, var) in vars {
                to_copy.push((
                    block,
                    name.clone(),
                    var.var_node.clone(),
                    var.is_read_from,
                    var.is_assigned_to,
                    var.arg_names.clone(),
                ));
            }
        }
        for (block, name, node, is_read_from, is_assigned_to, arg_names) in to_copy {
            let var = self.st.functions.record_external_var(parent, block, &name, node);
            var.is_read_from |= is_read_from;
            var.is_assigned_to |= is_assigned_to;
            if let Some(names) = arg_names {
                var.arg_names = Some(names);
            }
        }
    }

    fn reattach_root_functions(&mut self) {
        for idx in self.st.functions.indices().collect::<Vec<_>>() {
            if self.st.functions.get(idx).parent.is_some() {
                continue;
            }
            let (fn_trail, node) = {
                let f = self.st.functions.get_mut(idx);
                (f.trail.clone(), f.detached_node.take())
            };
            if let Some(node) = node {
                assert!(
                    trail::set(self.root, &fn_trail, node),
                    "root function reattachment position exists"
                );
            }
        }
    }
}

/// Function-relative form of an absolute trail.
pub(crate) fn relative_trail(st: &State<'_>, fn_idx: FnIndex, trail: &Trail) -> Trail {
    let prefix = &st.functions.get(fn_idx).trail;
    trail::strip_prefix(trail, prefix)
        .expect("use site lies within its function")
        .iter()
        .cloned()
        .collect()
}

/// The node a captured binding is read through in instrumentation output.
pub(crate) fn emission_node(st: &State<'_>, block: BlockId, name: &str) -> Value {
    if name == "this" {
        return ast::this_expression();
    }
    let binding = st.blocks.binding(block, name).expect("binding exists");
    let var_name = binding.var_name.as_deref().unwrap_or(name);
    if name == "super" {
        let vars_block = st.blocks.get(block).vars_block;
        if st.blocks.get(vars_block).temp_vars_as_objects {
            return ast::member(ast::identifier(var_name), "value");
        }
    }
    ast::identifier(var_name)
}

/// The scope-id and temp declarations inserted at the top of a vars block.
pub(crate) fn block_decl_statements(st: &State<'_>, block_id: BlockId) -> Vec<Value> {
    let block = st.blocks.get(block_id);
    let mut stmts = Vec::new();
    if let Some(scope_id) = &block.scope_id_var {
        stmts.push(ast::variable_declaration(
            "const",
            vec![ast::variable_declarator(
                ast::identifier(scope_id),
                Some(ast::call(ast::identifier(&st.alloc.get_scope_id_name()), vec![])),
            )],
        ));
    }
    if !block.temp_var_names.is_empty() {
        let declarators = block
            .temp_var_names
            .iter()
            .map(|name| {
                let init = block.temp_vars_as_objects.then(|| ast::object_expression(vec![]));
                ast::variable_declarator(ast::identifier(name), init)
            })
            .collect();
        stmts.push(ast::variable_declaration("let", declarators));
    }
    stmts
}

// ---------------------------------------------------------------------------
// Mutation application.
// ---------------------------------------------------------------------------

/// Applies all recorded mutations, deepest anchor first. Depth ordering is
/// what keeps trails valid: an edit never reshapes anything above a pending
/// edit's anchor, and replacements that relocate subtrees always run after
/// every mutation inside those subtrees.
pub(crate) fn apply_mutations(st: &mut State<'_>, root: &mut Value) -> Result<(), AnalysisError> {
    let mut mutations = std::mem::take(&mut st.mutations);
    mutations.sort_by_key(|b| std::cmp::Reverse(b.depth()));
    for mutation in mutations {
        apply_mutation(st, root, mutation);
    }
    Ok(())
}

fn apply_mutation(st: &State<'_>, root: &mut Value, mutation: Mutation) {
    match mutation {
        Mutation::InjectBody { fn_trail, stmts } => {
            let node = trail::get_mut(root, &fn_trail).expect("injection target attached");
            inject_body(node, stmts);
        }
        Mutation::InjectParams {
            fn_trail,
            tracker_call,
            scope_id_name,
            get_scope_id_name,
            temp_names,
            rest_fixer,
        } => {
            let node = trail::get_mut(root, &fn_trail).expect("injection target attached");
            inject_params(
                node,
                tracker_call,
                &scope_id_name,
                &get_scope_id_name,
                &temp_names,
                rest_fixer.as_ref(),
            );
        }
        Mutation::InsertBlockDecls { array_trail, stmts } => {
            let target = trail::get_mut(root, &array_trail).expect("insertion target attached");
            match target {
                Value::Array(statements) => {
                    statements.splice(0..0, stmts);
                }
                // Single-statement loop body: blockify around the
                // declarations.
                other => {
                    let original = std::mem::take(other);
                    let mut body = stmts;
                    body.push(original);
                    *other = ast::block_statement(body);
                }
            }
        }
        Mutation::Replace { trail, kind } => apply_replace(st, root, &trail, kind),
        Mutation::ClassTransform {
            class_trail,
            super_capture,
            synthesized_ctor,
        } => {
            let class_node = trail::get_mut(root, &class_trail).expect("class node attached");
            let members = class_node
                .get_mut("body")
                .and_then(|b| b.get_mut("body"))
                .and_then(Value::as_array_mut)
                .expect("class body members");
            if let Some(ctor) = synthesized_ctor {
                members.push(ctor);
            }
            if let Some(capture) = super_capture {
                members.insert(0, capture);
            }
        }
    }
}

/// Prepends statements to a function body, blockifying an expression body
/// (arrow shorthand) into `{ …stmts; return <expr>; }` first.
fn inject_body(node: &mut Value, stmts: Vec<Value>) {
    let body = node.get_mut("body").expect("function has a body");
    if ast::kind_of(body) == Some(ast::NodeKind::BlockStatement) {
        let statements = body
            .get_mut("body")
            .and_then(Value::as_array_mut)
            .expect("block body is an array");
        statements.splice(0..0, stmts);
    } else {
        let expression = std::mem::take(body);
        let mut statements = stmts;
        statements.push(ast::return_statement(expression));
        *body = ast::block_statement(statements);
    }
}

/// Appends the tracker-carrying rest element:
///
/// ```text
/// ...{ [tracker(…)]: [scopeId = getScopeId(), temps…, fix = () => r = getScopeId.toRest(r)] = [], ...r }
/// ```
///
/// A pre-existing rest param is merged in: a trailing rest array pattern is
/// first flattened into the param list, an object-pattern rest contributes
/// its properties, and an identifier rest moves into the object pattern with
/// the fixer arrow reifying it back into an array on entry.
fn inject_params(
    node: &mut Value,
    tracker_call: Value,
    scope_id_name: &str,
    get_scope_id_name: &str,
    temp_names: &[String],
    rest_fixer: Option<&(String, String)>,
) {
    let params = node
        .get_mut("params")
        .and_then(Value::as_array_mut)
        .expect("function has params");

    // `...[a, {b}, ...c]` is equivalent to `a, {b}, ...c`.
    loop {
        let flattenable = params.last().is_some_and(|last| {
            ast::kind_of(last) == Some(ast::NodeKind::RestElement)
                && last
                    .get("argument")
                    .is_some_and(|a| ast::kind_of(a) == Some(ast::NodeKind::ArrayPattern))
        });
        if !flattenable {
            break;
        }
        let rest = params.pop().expect("last param exists");
        if let Some(Value::Array(elements)) = rest
            .get("argument")
            .and_then(|a| a.get("elements"))
            .map(Clone::clone)
        {
            params.extend(elements);
        }
    }

    let mut tail_props = Vec::new();
    let has_rest = params
        .last()
        .is_some_and(|last| ast::kind_of(last) == Some(ast::NodeKind::RestElement));
    if has_rest {
        let rest = params.pop().expect("last param exists");
        let argument = rest.get("argument").cloned().unwrap_or(Value::Null);
        match ast::kind_of(&argument) {
            Some(ast::NodeKind::Identifier) => {
                tail_props.push(ast::rest_element(argument));
            }
            Some(ast::NodeKind::ObjectPattern) => {
                if let Some(props) = argument.get("properties").and_then(Value::as_array) {
                    tail_props.extend(props.iter().cloned());
                }
            }
            _ => {
                // Array patterns were flattened above; anything else is put
                // back untouched and the tracker rest goes after it.
                params.push(rest);
            }
        }
    }

    let mut elements = vec![ast::assignment_pattern(
        ast::identifier(scope_id_name),
        ast::call(ast::identifier(get_scope_id_name), vec![]),
    )];
    for name in temp_names {
        elements.push(ast::identifier(name));
    }
    if let Some((fixer, rest_name)) = rest_fixer {
        elements.push(ast::assignment_pattern(
            ast::identifier(fixer),
            ast::arrow(
                vec![],
                ast::assignment(
                    ast::identifier(rest_name),
                    ast::call(
                        ast::member(ast::identifier(get_scope_id_name), "toRest"),
                        vec![ast::identifier(rest_name)],
                    ),
                ),
            ),
        ));
    }

    let mut props = vec![ast::object_property(
        tracker_call,
        ast::assignment_pattern(ast::array_pattern(elements), ast::array_expression(vec![])),
        true,
    )];
    props.append(&mut tail_props);
    params.push(ast::rest_element(ast::object_pattern(props)));

    // The fixer runs exactly once, before any user statement can observe
    // the rest variable.
    if let Some((fixer, _)) = rest_fixer {
        inject_body(
            node,
            vec![ast::expression_statement(ast::call(ast::identifier(fixer), vec![]))],
        );
    }
}

fn apply_replace(st: &State<'_>, root: &mut Value, trail: &Trail, kind: ReplaceKind) {
    match kind {
        ReplaceKind::BareEval { name } => {
            assert!(
                trail::set(root, trail, ast::identifier(&name)),
                "bare eval position exists"
            );
        }
        ReplaceKind::WrapObjectSuper { temp_node } => {
            let node = trail::take(root, trail).expect("object literal attached");
            assert!(
                trail::set(root, trail, ast::assignment(temp_node, node)),
                "object literal position exists"
            );
        }
        ReplaceKind::With { temp_node } => {
            let mut node = trail::take(root, trail).expect("with statement attached");
            let object = node.get_mut("object").map(std::mem::take).unwrap_or(Value::Null);
            let body = node.get_mut("body").map(std::mem::take).unwrap_or(Value::Null);
            let tracker = ast::identifier(&st.alloc.tracker_name());
            // The inner `with ({}.__defineSetter__())` forces `eval` inside
            // the body through the runtime's capture hook.
            let inner = ast::with_statement(
                ast::call(ast::member(ast::object_expression(vec![]), "__defineSetter__"), vec![]),
                body,
            );
            let wrapped = ast::call(
                ast::member(tracker, "wrapWith"),
                vec![
                    ast::assignment(temp_node, object),
                    ast::arrow(
                        vec![ast::identifier("eval"), ast::identifier("t")],
                        ast::call(ast::identifier("eval"), vec![ast::identifier("t")]),
                    ),
                    ast::arrow(vec![], ast::identifier("eval")),
                ],
            );
            assert!(
                trail::set(root, trail, ast::with_statement(wrapped, inner)),
                "with statement position exists"
            );
        }
        ReplaceKind::EvalCall {
            scopes,
            temp_node,
            is_strict,
            proxied,
            hoist_block_id,
        } => {
            let mut node = trail::take(root, trail).expect("eval call attached");
            let callee = node.get_mut("callee").map(std::mem::take).unwrap_or(Value::Null);
            let arguments = node
                .get_mut("arguments")
                .and_then(Value::as_array_mut)
                .map(std::mem::take)
                .unwrap_or_default();

            let mut eval_args = vec![
                callee,
                ast::array_expression(arguments),
                scopes,
                ast::boolean_literal(is_strict),
                ast::boolean_literal(proxied),
            ];
            if let Some(hoist) = hoist_block_id {
                eval_args.push(ast::numeric_literal(u64::from(hoist)));
            }
            let tracked = ast::call(
                ast::member(ast::identifier(&st.alloc.tracker_name()), "evalDirect"),
                eval_args,
            );
            // (temp = evalDirect(…))[0] ? eval(temp[1]) : (0, temp[1])(...temp[2])
            let replacement = ast::conditional(
                ast::member_index(ast::assignment(temp_node.clone(), tracked), 0),
                ast::call(
                    ast::identifier("eval"),
                    vec![ast::member_index(temp_node.clone(), 1)],
                ),
                ast::call(
                    ast::sequence(vec![ast::numeric_literal(0), ast::member_index(temp_node.clone(), 1)]),
                    vec![ast::spread_element(ast::member_index(temp_node, 2))],
                ),
            );
            assert!(
                trail::set(root, trail, replacement),
                "eval call position exists"
            );
        }
    }
}
