//! Emission of per-function info declarations.
//!
//! Every function gets a trailing declaration
//! `function amber_fnInfo_<id>() { return [<json>, [<childFnInfos>…], <getSources>]; }`
//! whose JSON payload carries everything the downstream serializer needs to
//! rebuild the function from a live instance: its scope shape, var usage
//! trails, special-usage amendments, and its own pristine AST. Optional
//! fields are omitted when falsy or empty to keep the emitted string small.

use serde_json::{Map, Value};

use crate::{
    ast,
    error::AnalysisError,
    functions::FnIndex,
    state::State,
    trail,
};

/// Builds the function-info declaration for `fn_idx`. Called from the
/// function's own pass-2 step, while its node is still attached and its
/// child subtrees are detached (their slots serialize as null).
pub(crate) fn build_fn_info_declaration(
    st: &State<'_>,
    root: &Value,
    fn_idx: FnIndex,
) -> Result<Value, AnalysisError> {
    let payload = build_payload(st, root, fn_idx);
    let json_string = serde_json::to_string(&payload).expect("payload is valid JSON");
    // `*/` must not appear verbatim: the emitted source can end up embedded
    // inside a block comment. `*\/` decodes to the same JSON string.
    let escaped = json_string.replace("*/", "*\\/");

    let function = st.functions.get(fn_idx);
    let name = st.alloc.fn_info_name(function.id.as_u32());
    let child_infos = function
        .children
        .iter()
        .map(|&child| {
            let child_id = st.functions.get(child).id.as_u32();
            ast::identifier(&st.alloc.fn_info_name(child_id))
        })
        .collect();

    Ok(ast::function_declaration(
        &name,
        vec![],
        vec![ast::return_statement(ast::array_expression(vec![
            ast::string_literal(&escaped),
            ast::array_expression(child_infos),
            ast::identifier(&st.alloc.get_sources_name()),
        ]))],
    ))
}

fn build_payload(st: &State<'_>, root: &Value, fn_idx: FnIndex) -> Value {
    let function = st.functions.get(fn_idx);
    let mut payload = Map::new();

    // Scopes, ascending block id (the map was sorted before emission).
    let mut scopes = Vec::with_capacity(function.external_vars.len());
    for (&block_id, vars) in &function.external_vars {
        let block = st.blocks.get(block_id);
        let mut scope = Map::new();
        scope.insert("blockId".to_owned(), Value::from(block_id.as_u32()));
        if let Some(name) = &block.name {
            scope.insert("blockName".to_owned(), Value::String(name.clone()));
        }
        let mut var_records = Map::new();
        for (name, var) in vars {
            let mut record = Map::new();
            if var.is_read_from {
                record.insert("isReadFrom".to_owned(), Value::Bool(true));
            }
            if var.is_assigned_to {
                record.insert("isAssignedTo".to_owned(), Value::Bool(true));
            }
            record.insert(
                "trails".to_owned(),
                Value::Array(var.trails.iter().map(|t| trail::to_json(t)).collect()),
            );
            var_records.insert(name.clone(), Value::Object(record));
        }
        scope.insert("vars".to_owned(), Value::Object(var_records));
        scopes.push(Value::Object(scope));
    }
    payload.insert("scopes".to_owned(), Value::Array(scopes));

    if function.is_strict {
        payload.insert("isStrict".to_owned(), Value::Bool(true));
    }
    if function.super_is_proto {
        payload.insert("superIsProto".to_owned(), Value::Bool(true));
    }
    if function.contains_eval {
        payload.insert("containsEval".to_owned(), Value::Bool(true));
    }
    if function.contains_import {
        payload.insert("containsImport".to_owned(), Value::Bool(true));
    }
    if let Some(arg_names) = &function.arg_names {
        payload.insert(
            "argNames".to_owned(),
            Value::Array(arg_names.iter().map(|n| Value::String(n.clone())).collect()),
        );
    }
    if !function.internal_vars.is_empty() {
        let mut internal = Map::new();
        for (name, trails) in &function.internal_vars {
            internal.insert(
                name.clone(),
                Value::Array(trails.iter().map(|t| trail::to_json(t)).collect()),
            );
        }
        payload.insert("internalVars".to_owned(), Value::Object(internal));
    }
    if !function.global_var_names.is_empty() {
        payload.insert(
            "globalVarNames".to_owned(),
            Value::Array(
                function
                    .global_var_names
                    .iter()
                    .map(|n| Value::String(n.clone()))
                    .collect(),
            ),
        );
    }
    if !function.amendments.is_empty() {
        // Reversed: deepest (latest-recorded) first.
        let amendments = function
            .amendments
            .iter()
            .rev()
            .map(|amendment| {
                let mut tuple = vec![
                    Value::from(amendment.kind.code()),
                    Value::from(amendment.block_id.as_u32()),
                ];
                if let Value::Array(steps) = trail::to_json(&amendment.trail) {
                    tuple.extend(steps);
                }
                Value::Array(tuple)
            })
            .collect();
        payload.insert("amendments".to_owned(), Value::Array(amendments));
    }
    if function.has_super_class {
        payload.insert("hasSuperClass".to_owned(), Value::Bool(true));
    }
    if let Some(index) = function.first_super_statement_index {
        payload.insert("firstSuperStatementIndex".to_owned(), Value::from(index));
    }
    if function.returns_super {
        payload.insert("returnsSuper".to_owned(), Value::Bool(true));
    }
    if !function.children.is_empty() {
        let child_trails = function
            .children
            .iter()
            .map(|&child| {
                let child_trail = &st.functions.get(child).trail;
                let relative = trail::strip_prefix(child_trail, &function.trail)
                    .expect("child function lies within its parent");
                trail::to_json(relative)
            })
            .collect();
        payload.insert("childFns".to_owned(), Value::Array(child_trails));
    }

    // The function's own AST, children nulled, strictness directive
    // normalized away (the `isStrict` flag carries it).
    let node = trail::get(root, &function.trail).expect("function node attached");
    let mut ast_clone = node.clone();
    if let Some(body) = ast_clone.get_mut("body") {
        ast::strip_use_strict(body);
    }
    payload.insert("ast".to_owned(), ast_clone);

    Value::Object(payload)
}
