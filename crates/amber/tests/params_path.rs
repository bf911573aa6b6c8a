//! Params-path tracking injection for functions with complex parameters.

mod common;

use common::*;
use serde_json::{Value, json};

/// `function g(a, b = 1) { return b; }`
fn default_param_program() -> Value {
    program(vec![fn_decl(
        "g",
        vec![ident("a"), assignment_pattern(ident("b"), num(1))],
        vec![ret(ident("b"))],
    )])
}

#[test]
fn complex_params_get_the_rest_element_injection() {
    let instrumented = instrument_cjs(default_param_program());
    let g = &body_of(&instrumented)[1];
    let params = g["params"].as_array().unwrap();
    assert_eq!(params.len(), 3, "both user params plus the appended rest");

    // User params are untouched, so `g.length` is still 1.
    assert_eq!(params[0]["name"], "a");
    assert_eq!(params[1]["type"], "AssignmentPattern");

    let rest = &params[2];
    assert_eq!(rest["type"], "RestElement");
    let pattern = &rest["argument"];
    assert_eq!(pattern["type"], "ObjectPattern");
    let property = &pattern["properties"][0];
    assert_eq!(property["computed"], true);
    // The computed key is the tracker call itself.
    assert_eq!(property["key"]["callee"]["name"], "amber_tracker");
    assert_eq!(property["key"]["arguments"][0]["name"], "amber_fnInfo_3");
    // The value destructures `[scopeId = getScopeId()] = []`.
    let value = &property["value"];
    assert_eq!(value["type"], "AssignmentPattern");
    assert_eq!(value["right"]["type"], "ArrayExpression");
    let first = &value["left"]["elements"][0];
    assert_eq!(first["left"]["name"], "amber_scopeId_3");
    assert_eq!(first["right"]["callee"]["name"], "amber_getScopeId");

    // No scope-id statement in the body: the params carry it.
    let body = g["body"]["body"].as_array().unwrap();
    assert_eq!(body.len(), 1);
    assert_eq!(body[0]["type"], "ReturnStatement");
}

#[test]
fn default_initializer_still_precedes_the_first_read() {
    let instrumented = instrument_cjs(default_param_program());
    let info = fn_info(&instrumented, "amber_fnInfo_3");
    // `b` is internal: declaration site and the read in the body.
    assert_eq!(
        info["internalVars"]["b"],
        json!([["params", 1, "left"], ["body", "body", 0, "argument"]])
    );
    assert!(info.get("argNames").is_none(), "complex params never link arguments");
}

#[test]
fn identifier_rest_gains_the_to_rest_fixer() {
    // function h(...r) { return r; }
    let instrumented = instrument_cjs(program(vec![fn_decl(
        "h",
        vec![rest_param(ident("r"))],
        vec![ret(ident("r"))],
    )]));
    let h = &body_of(&instrumented)[1];
    let params = h["params"].as_array().unwrap();
    assert_eq!(params.len(), 1, "user rest merged into the injected rest");

    let pattern = &params[0]["argument"];
    let props = pattern["properties"].as_array().unwrap();
    assert_eq!(props.len(), 2);
    // The fixer arrow sits in the destructured array:
    // amber_temp_3 = () => r = amber_getScopeId.toRest(r)
    let elements = props[0]["value"]["left"]["elements"].as_array().unwrap();
    let fixer = &elements[1];
    assert_eq!(fixer["left"]["name"], "amber_temp_3");
    let reify = &fixer["right"]["body"];
    assert_eq!(reify["left"]["name"], "r");
    assert_eq!(reify["right"]["callee"]["property"]["name"], "toRest");
    // The user's rest target follows as an object rest.
    assert_eq!(props[1]["type"], "RestElement");
    assert_eq!(props[1]["argument"]["name"], "r");

    // The fixer runs first in the body.
    let body = h["body"]["body"].as_array().unwrap();
    assert_eq!(body[0]["expression"]["callee"]["name"], "amber_temp_3");
    assert_eq!(body[1]["type"], "ReturnStatement");
}

#[test]
fn rest_array_patterns_are_flattened() {
    // function f(...[a, b]) {}
    let instrumented = instrument_cjs(program(vec![fn_decl(
        "f",
        vec![rest_param(json!({
            "type": "ArrayPattern",
            "elements": [ident("a"), ident("b")],
        }))],
        vec![],
    )]));
    let f = &body_of(&instrumented)[1];
    let params = f["params"].as_array().unwrap();
    // Flattened to `a, b, ...{…}`.
    assert_eq!(params[0]["name"], "a");
    assert_eq!(params[1]["name"], "b");
    assert_eq!(params[2]["type"], "RestElement");
    assert_eq!(params[2]["argument"]["type"], "ObjectPattern");
}

#[test]
fn rest_array_elisions_are_rejected() {
    let result = amber::instrument(
        program(vec![fn_decl(
            "f",
            vec![rest_param(json!({
                "type": "ArrayPattern",
                "elements": [ident("a"), null_elision(), ident("b")],
            }))],
            vec![],
        )]),
        &amber::Options::new("test.js"),
    );
    let err = result.expect_err("elisions in a rest array are unsupported");
    assert!(err.message().contains("elisions"), "got: {err}");
}

fn null_elision() -> Value {
    Value::Null
}
