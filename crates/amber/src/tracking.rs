//! Tracking injection: the code planted inside every function so the
//! runtime sees each activation.
//!
//! Two placements exist. Functions whose params are all simple identifiers
//! get the statements prepended to their body. Functions with any complex
//! parameter (default, pattern, rest) instead get a rest element appended to
//! their params whose object-pattern computed key *is* the tracker call:
//! that is the only placement that runs the tracker exactly once, before any
//! parameter side effect, without moving the params into the body — which
//! would change generator param-evaluation timing, `Function.prototype
//! .length`, and sloppy hoisting.

use serde_json::Value;

use crate::{
    ast::{self, NodeKind},
    blocks::BlockId,
    functions::{FnIndex, FnType},
    internal_vars::TRACKER_COMMENT_PREFIX,
    state::{Mutation, State},
    trail::TrailKey,
    transform::{block_decl_statements, emission_node},
};

/// Builds and records the injection mutations for one function or class.
/// Runs inside the function's pass-2 step, after its external vars are
/// final and sorted.
pub(crate) fn build_injection(st: &mut State<'_>, root: &Value, fn_idx: FnIndex) {
    if st.functions.get(fn_idx).fn_type == FnType::Class {
        build_class_injection(st, root, fn_idx);
        return;
    }

    let (fn_trail, params_block, body_block, complex) = {
        let f = st.functions.get(fn_idx);
        (
            f.trail.clone(),
            f.params_block,
            f.body_block,
            f.first_complex_param_index.is_some(),
        )
    };
    let vars_block = if complex {
        params_block
    } else {
        body_block.unwrap_or(params_block)
    };
    st.blocks.activate(vars_block, &st.alloc);
    let comment = comment_text(st, fn_idx);

    if complex {
        // Snapshot before the fixer temp so it is not double-declared.
        let temp_names = st.blocks.get(params_block).temp_var_names.clone();
        let node = crate::trail::get(root, &fn_trail).expect("function node attached");
        let rest_fixer = build_rest_fixer(st, node, params_block);
        let scope_id_name = scope_id_of(st, vars_block);
        let mut tracker_call = build_tracker_call(st, fn_idx);
        ast::add_leading_comment(&mut tracker_call, &comment);
        st.mutations.push(Mutation::InjectParams {
            fn_trail,
            tracker_call,
            scope_id_name,
            get_scope_id_name: st.alloc.get_scope_id_name(),
            temp_names,
            rest_fixer,
        });
    } else {
        let stmts = body_statements(st, fn_idx, vars_block, &comment);
        st.mutations.push(Mutation::InjectBody { fn_trail, stmts });
    }
}

/// The body-path statement sequence: scope-id const, temp lets, tracker
/// call.
fn body_statements(st: &mut State<'_>, fn_idx: FnIndex, vars_block: BlockId, comment: &str) -> Vec<Value> {
    let mut stmts = block_decl_statements(st, vars_block);
    let tracker_call = build_tracker_call(st, fn_idx);
    let mut tracker_stmt = ast::expression_statement(tracker_call);
    ast::add_leading_comment(&mut tracker_stmt, comment);
    stmts.push(tracker_stmt);
    stmts
}

/// `tracker(<fnInfo>, () => [[<scopeIdVar>, <var>…], …])`
///
/// One entry per reportable scope, ascending block id. The values closure
/// is only invoked by the runtime when an instance of this function needs
/// serializing.
fn build_tracker_call(st: &mut State<'_>, fn_idx: FnIndex) -> Value {
    let blocks: Vec<BlockId> = st.functions.get(fn_idx).external_vars.keys().copied().collect();
    let mut entries = Vec::with_capacity(blocks.len());
    for block in blocks {
        let activation = st.blocks.activate(block, &st.alloc);
        let mut entry = vec![ast::identifier(&activation.scope_id_name)];
        for var in st.functions.get(fn_idx).external_vars[&block].values() {
            entry.push(var.var_node.clone());
        }
        entries.push(ast::array_expression(entry));
    }
    let fn_info_name = st.alloc.fn_info_name(st.functions.get(fn_idx).id.as_u32());
    ast::call(
        ast::identifier(&st.alloc.tracker_name()),
        vec![
            ast::identifier(&fn_info_name),
            ast::arrow(vec![], ast::array_expression(entries)),
        ],
    )
}

fn build_class_injection(st: &mut State<'_>, root: &Value, fn_idx: FnIndex) {
    let (class_trail, params_block, body_block, complex, has_super_class) = {
        let f = st.functions.get(fn_idx);
        (
            f.trail.clone(),
            f.params_block,
            f.body_block,
            f.first_complex_param_index.is_some(),
            f.has_super_class,
        )
    };

    // Capture the super target: `static { <temp> = this; }` prepended to
    // the class body, run the moment the class is created.
    let super_capture = st.functions.get(fn_idx).super_block.and_then(|super_block| {
        st.blocks.binding(super_block, "super").is_some().then(|| {
            let target = emission_node(st, super_block, "super");
            ast::static_block(vec![ast::expression_statement(ast::assignment(
                target,
                ast::this_expression(),
            ))])
        })
    });

    let vars_block = if complex {
        params_block
    } else {
        body_block.unwrap_or(params_block)
    };
    st.blocks.activate(vars_block, &st.alloc);
    let comment = comment_text(st, fn_idx);

    let class_node = crate::trail::get(root, &class_trail).expect("class node attached");
    let members = class_node
        .get("body")
        .and_then(|b| b.get("body"))
        .and_then(Value::as_array);
    let ctor_index = members.and_then(|m| {
        m.iter().position(|member| {
            ast::kind_of(member) == Some(NodeKind::ClassMethod)
                && member.get("kind").and_then(Value::as_str) == Some("constructor")
        })
    });

    if let Some(index) = ctor_index {
        let mut ctor_trail = class_trail.clone();
        ctor_trail.push(TrailKey::key("body"));
        ctor_trail.push(TrailKey::key("body"));
        ctor_trail.push(TrailKey::Index(index));
        if complex {
            let temp_names = st.blocks.get(params_block).temp_var_names.clone();
            let ctor_node = crate::trail::get(root, &ctor_trail).expect("constructor attached");
            let rest_fixer = build_rest_fixer(st, ctor_node, params_block);
            let scope_id_name = scope_id_of(st, vars_block);
            let mut tracker_call = build_tracker_call(st, fn_idx);
            ast::add_leading_comment(&mut tracker_call, &comment);
            st.mutations.push(Mutation::InjectParams {
                fn_trail: ctor_trail,
                tracker_call,
                scope_id_name,
                get_scope_id_name: st.alloc.get_scope_id_name(),
                temp_names,
                rest_fixer,
            });
        } else {
            let stmts = body_statements(st, fn_idx, vars_block, &comment);
            st.mutations.push(Mutation::InjectBody {
                fn_trail: ctor_trail,
                stmts,
            });
        }
        st.mutations.push(Mutation::ClassTransform {
            class_trail,
            super_capture,
            synthesized_ctor: None,
        });
    } else {
        // Synthesize a constructor to carry the tracker. A derived class
        // forwards its arguments: `constructor(...t) { …; super(...t); }`.
        let mut stmts = body_statements(st, fn_idx, vars_block, &comment);
        let ctor = if has_super_class {
            let temp = st.blocks.create_block_temp_var(params_block, &st.alloc);
            stmts.push(ast::expression_statement(ast::call(
                ast::node(NodeKind::Super, vec![]),
                vec![ast::spread_element(ast::identifier(&temp.name))],
            )));
            ast::class_constructor(vec![ast::rest_element(ast::identifier(&temp.name))], stmts)
        } else {
            ast::class_constructor(vec![], stmts)
        };
        st.mutations.push(Mutation::ClassTransform {
            class_trail,
            super_capture,
            synthesized_ctor: Some(ctor),
        });
    }
}

/// Finds the effective rest target after flattening, and allocates the
/// fixer temp when it is a plain identifier: the identifier will receive an
/// object at runtime and `<fixer> = () => r = getScopeId.toRest(r)` (called
/// once at the top of the body) reifies it back into an array. The fixer
/// lives in the params so a same-named function declaration in the body
/// cannot clobber it before it runs.
fn build_rest_fixer(st: &mut State<'_>, node: &Value, params_block: BlockId) -> Option<(String, String)> {
    let params = node.get("params").and_then(Value::as_array)?;
    let mut last = params.last()?;
    loop {
        if ast::kind_of(last) != Some(NodeKind::RestElement) {
            return None;
        }
        let argument = last.get("argument")?;
        match ast::kind_of(argument) {
            Some(NodeKind::ArrayPattern) => {
                last = argument.get("elements").and_then(Value::as_array)?.last()?;
            }
            Some(NodeKind::Identifier) => {
                let name = ast::identifier_name(argument)?.to_owned();
                let temp = st.blocks.create_block_temp_var(params_block, &st.alloc);
                return Some((temp.name, name));
            }
            _ => return None,
        }
    }
}

fn scope_id_of(st: &State<'_>, vars_block: BlockId) -> String {
    st.blocks
        .get(vars_block)
        .scope_id_var
        .clone()
        .expect("vars block activated before injection")
}

/// `amber_track:<fnId>;<fnType>;<filenameEscaped>`
fn comment_text(st: &State<'_>, fn_idx: FnIndex) -> String {
    let f = st.functions.get(fn_idx);
    let escaped = st.options.filename.replace('\\', "\\\\").replace(';', "\\;");
    format!("{TRACKER_COMMENT_PREFIX}{};{};{escaped}", f.id.as_u32(), f.fn_type.code())
}
