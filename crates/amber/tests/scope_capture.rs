//! Closure capture: tracker calls, scope-id declarations, and the emitted
//! per-function records.

mod common;

use common::*;
use pretty_assertions::assert_eq;
use serde_json::json;

/// `function f(x) { return () => x + 1; }`
fn capture_program() -> serde_json::Value {
    program(vec![fn_decl(
        "f",
        vec![ident("x")],
        vec![ret(arrow_expr(vec![], binary(ident("x"), "+", num(1))))],
    )])
}

#[test]
fn function_body_gains_scope_id_and_tracker() {
    let instrumented = instrument_cjs(capture_program());
    let f = &body_of(&instrumented)[1];
    let statements = f["body"]["body"].as_array().unwrap();
    assert_eq!(statements.len(), 3, "scope-id const, tracker call, original return");

    // const amber_scopeId_4 = amber_getScopeId();
    let scope_decl = &statements[0];
    assert_eq!(scope_decl["kind"], "const");
    assert_eq!(scope_decl["declarations"][0]["id"]["name"], "amber_scopeId_4");
    assert_eq!(
        scope_decl["declarations"][0]["init"]["callee"]["name"],
        "amber_getScopeId"
    );

    // amber_tracker(amber_fnInfo_3, () => [[amber_scopeId_4, x]]);
    let tracker = &statements[1]["expression"];
    assert_eq!(tracker["callee"]["name"], "amber_tracker");
    assert_eq!(tracker["arguments"][0]["name"], "amber_fnInfo_3");
    let scopes = &tracker["arguments"][1]["body"];
    assert_eq!(scopes["type"], "ArrayExpression");
    let entry = &scopes["elements"][0]["elements"];
    assert_eq!(entry[0]["name"], "amber_scopeId_4");
    assert_eq!(entry[1]["name"], "x");

    assert_eq!(statements[2]["type"], "ReturnStatement");
}

#[test]
fn tracker_carries_the_marker_comment() {
    let instrumented = instrument_cjs(capture_program());
    let f = &body_of(&instrumented)[1];
    let tracker_stmt = &f["body"]["body"][1];
    let comment = &tracker_stmt["leadingComments"][0];
    assert_eq!(comment["type"], "CommentBlock");
    assert_eq!(comment["value"], "amber_track:3;f;test.js");
}

#[test]
fn inner_arrow_records_the_captured_var() {
    let instrumented = instrument_cjs(capture_program());
    let arrow_info = fn_info(&instrumented, "amber_fnInfo_5");
    let scope = &arrow_info["scopes"][0];
    assert_eq!(scope["blockId"], 3);
    assert_eq!(scope["blockName"], "f");
    assert_eq!(scope["vars"]["x"]["isReadFrom"], true);
    assert_eq!(scope["vars"]["x"]["trails"], json!([["body", "left"]]));
}

#[test]
fn arrow_body_is_blockified_around_its_tracker() {
    let instrumented = instrument_cjs(capture_program());
    let f = &body_of(&instrumented)[1];
    let arrow = &f["body"]["body"][2]["argument"];
    assert_eq!(arrow["body"]["type"], "BlockStatement");
    let statements = arrow["body"]["body"].as_array().unwrap();
    assert_eq!(statements[0]["declarations"][0]["id"]["name"], "amber_scopeId_5");
    assert_eq!(statements[1]["expression"]["callee"]["name"], "amber_tracker");
    assert_eq!(statements[2]["type"], "ReturnStatement");
    assert_eq!(statements[2]["argument"]["operator"], "+");
}

#[test]
fn parent_record_nulls_the_child_and_trails_locate_it() {
    let instrumented = instrument_cjs(capture_program());
    let f_info = fn_info(&instrumented, "amber_fnInfo_3");

    // The child slot in the serialized AST is null; its own record carries
    // the subtree.
    assert_eq!(f_info["childFns"], json!([["body", "body", 0, "argument"]]));
    assert_eq!(f_info["ast"]["type"], "FunctionDeclaration");
    assert!(f_info["ast"]["body"]["body"][0]["argument"].is_null());

    // Internal var: the declaration site of `x`.
    assert_eq!(f_info["internalVars"]["x"], json!([["params", 0]]));

    // The copied-up scope entry carries the flags but no use-site trails.
    let scope = &f_info["scopes"][0];
    assert_eq!(scope["blockId"], 3);
    assert_eq!(scope["vars"]["x"]["isReadFrom"], true);
    assert_eq!(scope["vars"]["x"]["trails"], json!([]));
}

#[test]
fn child_info_declarations_reference_their_parents_list() {
    let instrumented = instrument_cjs(capture_program());
    let body = body_of(&instrumented);
    let f_decl = body
        .iter()
        .find(|stmt| stmt["id"]["name"] == "amber_fnInfo_3")
        .expect("f info emitted");
    let children = &f_decl["body"]["body"][0]["argument"]["elements"][1];
    assert_eq!(children["elements"][0]["name"], "amber_fnInfo_5");
}

#[test]
fn sloppy_simple_params_link_arguments() {
    let instrumented = instrument_cjs(program(vec![fn_decl(
        "f",
        vec![ident("a"), ident("b")],
        vec![ret(ident("arguments"))],
    )]));
    let info = fn_info(&instrumented, "amber_fnInfo_3");
    assert_eq!(info["argNames"], json!(["a", "b"]));
    // The pseudo-binding itself is not a renameable internal var.
    assert!(info["internalVars"].get("arguments").is_none());
}

#[test]
fn strict_functions_do_not_link_arguments() {
    let instrumented = instrument_cjs(program_strict(vec![fn_decl(
        "f",
        vec![ident("a")],
        vec![ret(ident("arguments"))],
    )]));
    let info = fn_info(&instrumented, "amber_fnInfo_3");
    assert!(info.get("argNames").is_none());
    assert_eq!(info["isStrict"], true);
}

#[test]
fn globals_are_recorded_per_function() {
    let instrumented = instrument_cjs(program(vec![fn_decl(
        "f",
        vec![],
        vec![ret(call(ident("parseInt"), vec![str_lit("42")]))],
    )]));
    let info = fn_info(&instrumented, "amber_fnInfo_3");
    assert_eq!(info["globalVarNames"], json!(["parseInt"]));
}
