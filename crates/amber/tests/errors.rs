//! Error surfacing: message shape, positions, and rejected constructs.

mod common;

use common::*;
use serde_json::{Value, json};

fn instrument_err(program: Value) -> amber::InstrumentError {
    amber::instrument(program, &amber::Options::new("test.js")).expect_err("instrumentation should fail")
}

/// An identifier carrying a source position.
fn ident_at(name: &str, line: u32, column: u32) -> Value {
    json!({
        "type": "Identifier",
        "name": name,
        "loc": {"start": {"line": line, "column": column}, "end": {"line": line, "column": column + 1}},
    })
}

#[test]
fn commonjs_shadow_is_rejected_with_location() {
    let declaration = json!({
        "type": "VariableDeclaration",
        "kind": "const",
        "declarations": [
            {"type": "VariableDeclarator", "id": ident_at("module", 1, 6), "init": num(1)},
        ],
    });
    let err = instrument_err(program(vec![declaration]));
    assert_eq!(
        err.to_string(),
        "Error instrumenting: test.js:1:6\nCannot redeclare CommonJS variable 'module' at top level"
    );
}

#[test]
fn shadowing_require_is_rejected_but_var_is_not() {
    let err = instrument_err(program(vec![var_decl("let", "require", None)]));
    assert!(err.message().contains("require"), "got: {err}");

    // `var` re-declaration of a wrapper variable is idempotent, not fatal.
    let ok = amber::instrument(
        program(vec![var_decl("var", "module", None)]),
        &amber::Options::new("test.js"),
    );
    assert!(ok.is_ok());
}

#[test]
fn shadowing_arguments_is_rejected_in_commonjs_only() {
    // The program body is really the wrapper function's body, where a
    // lexical `arguments` redeclaration is illegal.
    let err = instrument_err(program(vec![var_decl("const", "arguments", Some(num(1)))]));
    assert!(err.message().contains("arguments"), "got: {err}");

    // A plain script has no wrapper; top-level `arguments` is an ordinary
    // binding there.
    let mut options = amber::Options::new("test.js");
    options.context = amber::CodeContext::Script;
    let ok = amber::instrument(
        program(vec![var_decl("const", "arguments", Some(num(1)))]),
        &options,
    );
    assert!(ok.is_ok());
}

#[test]
fn shadowing_in_a_nested_block_is_allowed() {
    let ok = amber::instrument(
        program(vec![block(vec![var_decl("const", "module", Some(num(1)))])]),
        &amber::Options::new("test.js"),
    );
    assert!(ok.is_ok(), "only program-level shadows are illegal");
}

#[test]
fn for_await_is_unsupported() {
    let loop_stmt = json!({
        "type": "ForOfStatement",
        "await": true,
        "left": var_decl("const", "x", None),
        "right": ident("it"),
        "body": block(vec![]),
    });
    let err = instrument_err(program(vec![loop_stmt]));
    assert!(err.message().contains("for await"), "got: {err}");
}

#[test]
fn non_program_input_is_rejected() {
    let err = instrument_err(json!({"type": "BinaryExpression"}));
    assert!(err.message().contains("BinaryExpression"), "got: {err}");
    assert!(err.to_string().starts_with("Error instrumenting: test.js"));
}

#[test]
fn super_outside_a_method_is_rejected() {
    let err = instrument_err(program(vec![expr_stmt(call(
        member(json!({"type": "Super"}), "x"),
        vec![],
    ))]));
    assert!(err.message().contains("super"), "got: {err}");
}

#[test]
fn error_location_falls_back_to_the_deepest_located_ancestor() {
    // The offending `super` has no loc, but the enclosing statement does.
    let statement = json!({
        "type": "ExpressionStatement",
        "expression": member(json!({"type": "Super"}), "x"),
        "loc": {"start": {"line": 3, "column": 2}, "end": {"line": 3, "column": 10}},
    });
    let err = instrument_err(program(vec![statement]));
    let loc = err.loc().expect("fallback location found");
    assert_eq!((loc.line, loc.column), (3, 2));
}
