#![allow(dead_code, reason = "shared helpers; each test binary uses a subset")]

//! Babel-AST builders and output inspection helpers shared by the
//! integration tests. Tests construct input ASTs directly as JSON — the
//! parser is an external collaborator, so its output shape is the natural
//! fixture format.

use amber::{Instrumented, Options, instrument};
use serde_json::{Value, json};

pub fn instrument_cjs(program: Value) -> Instrumented {
    instrument(program, &Options::new("test.js")).expect("instrumentation should succeed")
}

pub fn program(body: Vec<Value>) -> Value {
    json!({"type": "Program", "body": body, "directives": []})
}

pub fn program_strict(body: Vec<Value>) -> Value {
    json!({
        "type": "Program",
        "body": body,
        "directives": [
            {"type": "Directive", "value": {"type": "DirectiveLiteral", "value": "use strict"}},
        ],
    })
}

pub fn ident(name: &str) -> Value {
    json!({"type": "Identifier", "name": name})
}

pub fn num(value: u64) -> Value {
    json!({"type": "NumericLiteral", "value": value})
}

pub fn str_lit(value: &str) -> Value {
    json!({"type": "StringLiteral", "value": value})
}

pub fn expr_stmt(expression: Value) -> Value {
    json!({"type": "ExpressionStatement", "expression": expression})
}

pub fn ret(argument: Value) -> Value {
    json!({"type": "ReturnStatement", "argument": argument})
}

pub fn block(body: Vec<Value>) -> Value {
    json!({"type": "BlockStatement", "body": body, "directives": []})
}

/// `kind name = init;` with a single declarator.
pub fn var_decl(kind: &str, name: &str, init: Option<Value>) -> Value {
    json!({
        "type": "VariableDeclaration",
        "kind": kind,
        "declarations": [
            {"type": "VariableDeclarator", "id": ident(name), "init": init.unwrap_or(Value::Null)},
        ],
    })
}

pub fn fn_decl(name: &str, params: Vec<Value>, body: Vec<Value>) -> Value {
    json!({
        "type": "FunctionDeclaration",
        "id": ident(name),
        "params": params,
        "body": block(body),
        "async": false,
        "generator": false,
    })
}

/// Arrow with an expression body.
pub fn arrow_expr(params: Vec<Value>, body: Value) -> Value {
    json!({
        "type": "ArrowFunctionExpression",
        "params": params,
        "body": body,
        "async": false,
        "generator": false,
    })
}

pub fn call(callee: Value, args: Vec<Value>) -> Value {
    json!({"type": "CallExpression", "callee": callee, "arguments": args})
}

pub fn member(object: Value, property: &str) -> Value {
    json!({"type": "MemberExpression", "object": object, "property": ident(property), "computed": false})
}

pub fn binary(left: Value, op: &str, right: Value) -> Value {
    json!({"type": "BinaryExpression", "operator": op, "left": left, "right": right})
}

pub fn assign(left: Value, right: Value) -> Value {
    json!({"type": "AssignmentExpression", "operator": "=", "left": left, "right": right})
}

/// `left = right` as a parameter default.
pub fn assignment_pattern(left: Value, right: Value) -> Value {
    json!({"type": "AssignmentPattern", "left": left, "right": right})
}

pub fn rest_param(argument: Value) -> Value {
    json!({"type": "RestElement", "argument": argument})
}

/// `meth(params…) { body }` as a class-body member.
pub fn class_method(name: &str, params: Vec<Value>, body: Vec<Value>) -> Value {
    json!({
        "type": "ClassMethod",
        "kind": "method",
        "key": ident(name),
        "params": params,
        "body": block(body),
        "computed": false,
        "static": false,
        "async": false,
        "generator": false,
    })
}

pub fn class_decl(name: &str, super_class: Option<Value>, members: Vec<Value>) -> Value {
    json!({
        "type": "ClassDeclaration",
        "id": ident(name),
        "superClass": super_class.unwrap_or(Value::Null),
        "body": {"type": "ClassBody", "body": members},
    })
}

// -- output inspection ------------------------------------------------------

pub fn body_of(instrumented: &Instrumented) -> &Vec<Value> {
    instrumented.ast["body"].as_array().expect("program body")
}

/// Parses the JSON payload out of an emitted info declaration.
fn payload_of(declaration: &Value) -> Value {
    let payload = &declaration["body"]["body"][0]["argument"]["elements"][0]["value"];
    serde_json::from_str(payload.as_str().expect("payload is a string literal")).expect("payload parses as JSON")
}

/// All emitted function-info payloads, keyed by declaration name, in
/// emission order.
pub fn fn_info_payloads(instrumented: &Instrumented) -> Vec<(String, Value)> {
    body_of(instrumented)
        .iter()
        .filter(|stmt| {
            stmt["type"] == "FunctionDeclaration"
                && stmt["id"]["name"].as_str().is_some_and(|n| n.contains("_fnInfo_"))
        })
        .map(|decl| (decl["id"]["name"].as_str().expect("named").to_owned(), payload_of(decl)))
        .collect()
}

/// The payload of the info declaration with the given name.
pub fn fn_info(instrumented: &Instrumented, name: &str) -> Value {
    fn_info_payloads(instrumented)
        .into_iter()
        .find(|(n, _)| n == name)
        .unwrap_or_else(|| panic!("no info declaration named {name}"))
        .1
}
