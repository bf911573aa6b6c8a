//! Class transformation: super-target capture, synthesized constructors,
//! and `super` amendments.

mod common;

use common::*;
use serde_json::json;

/// `class C extends S { meth() { return super.meth(); } }`
fn class_program() -> serde_json::Value {
    program(vec![class_decl(
        "C",
        Some(ident("S")),
        vec![class_method(
            "meth",
            vec![],
            vec![ret(call(
                member(json!({"type": "Super"}), "meth"),
                vec![],
            ))],
        )],
    )])
}

#[test]
fn super_target_is_captured_in_a_static_block() {
    let instrumented = instrument_cjs(class_program());
    let class = &body_of(&instrumented)[1];
    let members = class["body"]["body"].as_array().unwrap();

    // static { amber_temp_2 = this; } prepended.
    let capture = &members[0];
    assert_eq!(capture["type"], "StaticBlock");
    let assignment = &capture["body"][0]["expression"];
    assert_eq!(assignment["left"]["name"], "amber_temp_2");
    assert_eq!(assignment["right"]["type"], "ThisExpression");

    // The temp is declared at program level.
    let body = body_of(&instrumented);
    assert!(
        body.iter().any(|stmt| {
            stmt["kind"] == "let" && stmt["declarations"][0]["id"]["name"] == "amber_temp_2"
        }),
        "capture temp declared in the enclosing vars block"
    );
}

#[test]
fn missing_constructor_is_synthesized_forwarding_super() {
    let instrumented = instrument_cjs(class_program());
    let class = &body_of(&instrumented)[1];
    let members = class["body"]["body"].as_array().unwrap();

    let ctor = members
        .iter()
        .find(|m| m["kind"] == "constructor")
        .expect("constructor synthesized");
    // constructor(...amber_temp_5) { const scopeId…; tracker(…); super(...amber_temp_5); }
    assert_eq!(ctor["params"][0]["type"], "RestElement");
    let forwarded = ctor["params"][0]["argument"]["name"].as_str().unwrap();
    let statements = ctor["body"]["body"].as_array().unwrap();
    let last = statements.last().unwrap();
    assert_eq!(last["expression"]["callee"]["type"], "Super");
    assert_eq!(
        last["expression"]["arguments"][0]["argument"]["name"],
        forwarded
    );
    assert!(
        statements
            .iter()
            .any(|s| s["expression"]["callee"]["name"] == "amber_tracker"),
        "synthesized constructor carries the tracker"
    );
}

#[test]
fn method_records_the_super_amendment() {
    let instrumented = instrument_cjs(class_program());
    // meth: name block 3, super block 4, class params 5, meth params 6.
    let info = fn_info(&instrumented, "amber_fnInfo_6");
    assert_eq!(info["superIsProto"], true);
    // [kind, blockId, …trail] — kind 1 is a super expression.
    assert_eq!(
        info["amendments"],
        json!([[1, 4, "body", "body", 0, "argument", "callee", "object"]])
    );
    // The captured super target is an external var of the method.
    let scope = &info["scopes"][0];
    assert_eq!(scope["blockId"], 4);
    assert!(scope["vars"]["super"]["isReadFrom"] == true);
}

#[test]
fn class_record_carries_the_super_shape() {
    let instrumented = instrument_cjs(class_program());
    let info = fn_info(&instrumented, "amber_fnInfo_5");
    assert_eq!(info["hasSuperClass"], true);
    assert_eq!(info["returnsSuper"], true, "synthesized constructor returns super(…)");
    assert_eq!(info["globalVarNames"], json!(["S"]));
    assert_eq!(info["childFns"], json!([["body", "body", 0]]));
}

#[test]
fn user_constructor_tracks_the_first_super_statement() {
    // class C extends S { constructor() { 0; super(); } }
    let ctor = json!({
        "type": "ClassMethod",
        "kind": "constructor",
        "key": ident("constructor"),
        "params": [],
        "body": block(vec![
            expr_stmt(num(0)),
            expr_stmt(call(json!({"type": "Super"}), vec![])),
        ]),
        "computed": false,
        "static": false,
        "async": false,
        "generator": false,
    });
    let instrumented = instrument_cjs(program(vec![class_decl("C", Some(ident("S")), vec![ctor])]));
    let info = fn_info(&instrumented, "amber_fnInfo_5");
    assert_eq!(info["firstSuperStatementIndex"], 1);
    // Amendment kind 0 is a super call, recorded against the super block.
    assert_eq!(info["amendments"][0][0], 0);

    // The tracker is injected into the user constructor's body.
    let class = &body_of(&instrumented)[1];
    let members = class["body"]["body"].as_array().unwrap();
    let user_ctor = members.iter().find(|m| m["kind"] == "constructor").unwrap();
    let statements = user_ctor["body"]["body"].as_array().unwrap();
    assert_eq!(statements[0]["declarations"][0]["id"]["name"], "amber_scopeId_6");
    assert_eq!(statements[1]["expression"]["callee"]["name"], "amber_tracker");
}

#[test]
fn object_literal_methods_capture_super_through_a_wrap() {
    // const o = { m() { return super.m(); } };
    let method = json!({
        "type": "ObjectMethod",
        "kind": "method",
        "key": ident("m"),
        "params": [],
        "body": block(vec![ret(call(member(json!({"type": "Super"}), "m"), vec![]))]),
        "computed": false,
        "async": false,
        "generator": false,
    });
    let literal = json!({"type": "ObjectExpression", "properties": [method]});
    let instrumented = instrument_cjs(program(vec![var_decl("const", "o", Some(literal))]));
    let declarator = &body_of(&instrumented)
        .iter()
        .find(|stmt| {
            stmt["kind"] == "const" && stmt["declarations"][0]["id"]["name"] == "o"
        })
        .expect("o declaration present")["declarations"][0];
    // The literal is wrapped: const o = (temp = { m() {…} });
    let init = &declarator["init"];
    assert_eq!(init["type"], "AssignmentExpression");
    assert_eq!(init["left"]["name"], "amber_temp_2");
    assert_eq!(init["right"]["type"], "ObjectExpression");
}
