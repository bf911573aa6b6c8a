//! Sloppy-mode function hoisting and internal-name prefix escalation.

mod common;

use common::*;
use serde_json::json;

/// `{ function foo() {} } const g = () => foo;`
fn hoist_program() -> serde_json::Value {
    program(vec![
        block(vec![fn_decl("foo", vec![], vec![])]),
        var_decl("const", "g", Some(arrow_expr(vec![], ident("foo")))),
    ])
}

#[test]
fn sloppy_block_function_hoists_to_the_program_block() {
    let instrumented = instrument_cjs(hoist_program());
    // The arrow resolves `foo` against the hoisted program-block binding
    // (block 2), not a global.
    let payloads = fn_info_payloads(&instrumented);
    let (_, arrow_info) = payloads
        .iter()
        .find(|(_, payload)| payload["scopes"][0]["vars"].get("foo").is_some())
        .expect("arrow captures foo");
    assert_eq!(arrow_info["scopes"][0]["blockId"], 2);
    assert!(arrow_info.get("globalVarNames").is_none());
}

#[test]
fn strict_block_function_stays_block_scoped() {
    let instrumented = instrument_cjs(program_strict(vec![
        block(vec![fn_decl("foo", vec![], vec![])]),
        var_decl("const", "g", Some(arrow_expr(vec![], ident("foo")))),
    ]));
    let payloads = fn_info_payloads(&instrumented);
    let (_, arrow_info) = payloads
        .iter()
        .find(|(_, payload)| payload["globalVarNames"].as_array().is_some())
        .expect("arrow records foo as unresolved");
    assert_eq!(arrow_info["globalVarNames"], json!(["foo"]));
}

#[test]
fn intermediate_binding_blocks_hoisting() {
    // { let foo; { function foo() {} } } const g = () => foo;
    let instrumented = instrument_cjs(program(vec![
        block(vec![
            var_decl("let", "foo", None),
            block(vec![fn_decl("foo", vec![], vec![])]),
        ]),
        var_decl("const", "g", Some(arrow_expr(vec![], ident("foo")))),
    ]));
    let payloads = fn_info_payloads(&instrumented);
    let (_, arrow_info) = payloads
        .iter()
        .find(|(_, payload)| payload["globalVarNames"].as_array().is_some())
        .expect("foo did not hoist past the let binding");
    assert_eq!(arrow_info["globalVarNames"], json!(["foo"]));
}

#[test]
fn user_names_matching_the_reserved_pattern_escalate_the_prefix() {
    let instrumented = instrument_cjs(program(vec![
        var_decl("var", "amber_tracker", Some(num(1))),
        fn_decl("f", vec![], vec![]),
    ]));
    assert_eq!(instrumented.info.prefix_num, 1);
    assert!(instrumented.info.prefix_changed);

    let body = body_of(&instrumented);
    // Init statement binds the escalated names.
    let init_pattern = &body[0]["declarations"][0]["id"]["elements"];
    assert_eq!(init_pattern[0]["name"], "amber1_tracker");
    assert_eq!(init_pattern[1]["name"], "amber1_getScopeId");
    // The init call reports the new prefix to the runtime.
    assert_eq!(body[0]["declarations"][0]["init"]["arguments"][4]["value"], 1);

    // The user's declaration is untouched.
    let user = body
        .iter()
        .find(|stmt| stmt["kind"] == "var")
        .expect("user var survives");
    assert_eq!(user["declarations"][0]["id"]["name"], "amber_tracker");

    // Injected names inside f use the escalated prefix.
    let f = body.iter().find(|stmt| stmt["id"]["name"] == "f").unwrap();
    let tracker = &f["body"]["body"][1]["expression"];
    assert_eq!(tracker["callee"]["name"], "amber1_tracker");
}

#[test]
fn numbered_clashes_escalate_past_their_number() {
    let instrumented = instrument_cjs(program(vec![var_decl("var", "amber7_x", None)]));
    assert_eq!(instrumented.info.prefix_num, 8);
}

#[test]
fn loop_bodies_get_per_iteration_scope_ids() {
    // for (let i = 0; ; ) { fns.push(() => i); }
    let push = expr_stmt(call(
        member(ident("fns"), "push"),
        vec![arrow_expr(vec![], ident("i"))],
    ));
    let loop_stmt = json!({
        "type": "ForStatement",
        "init": var_decl("let", "i", Some(num(0))),
        "test": null,
        "update": null,
        "body": block(vec![push]),
    });
    let instrumented = instrument_cjs(program(vec![loop_stmt]));
    let body = body_of(&instrumented);
    let for_stmt = body
        .iter()
        .find(|stmt| stmt["type"] == "ForStatement")
        .expect("loop survives");
    // The loop body starts with its own scope-id declaration, so each
    // iteration is a distinct activation.
    let first = &for_stmt["body"]["body"][0];
    assert_eq!(first["kind"], "const");
    let name = first["declarations"][0]["id"]["name"].as_str().unwrap();
    assert!(name.starts_with("amber_scopeId_"), "got: {name}");
    assert_eq!(first["declarations"][0]["init"]["callee"]["name"], "amber_getScopeId");

    // The arrow captured `i` from the loop's head scope.
    let payloads = fn_info_payloads(&instrumented);
    let (_, arrow_info) = payloads
        .iter()
        .find(|(_, payload)| payload["scopes"][0]["vars"].get("i").is_some())
        .expect("arrow captures i");
    assert_eq!(arrow_info["scopes"][0]["vars"]["i"]["isReadFrom"], true);
}
