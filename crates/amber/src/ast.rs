//! The AST node model: a typed kind enum over the parser's Babel-shape JSON,
//! plus builders for the synthetic nodes the transformer injects.
//!
//! The external parser hands the engine a Babel-compatible JSON tree and the
//! downstream code generator consumes the same shape, so the tree itself is
//! kept as `serde_json::Value` (with key order preserved) and never copied
//! into an internal representation. [`NodeKind`] is the dispatch layer: it
//! parses the `"type"` tag once per node so the visitors can match on an
//! enum instead of strings. Kinds the engine has no special handling for are
//! simply absent from the enum and fall through to structural traversal.

use serde_json::{Map, Value, json};
use strum::{EnumString, IntoStaticStr};

/// Node kinds the visitors dispatch on.
///
/// Variant names are exactly the Babel `type` strings. Anything that fails
/// to parse into this enum is trivia as far as scope analysis is concerned
/// and is traversed structurally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, IntoStaticStr)]
pub enum NodeKind {
    File,
    Program,
    Identifier,
    PrivateName,
    ThisExpression,
    Super,
    MetaProperty,
    // Functions and classes
    FunctionDeclaration,
    FunctionExpression,
    ArrowFunctionExpression,
    ObjectMethod,
    ClassMethod,
    ClassPrivateMethod,
    ClassDeclaration,
    ClassExpression,
    ClassBody,
    ClassProperty,
    ClassPrivateProperty,
    StaticBlock,
    // Object literals
    ObjectExpression,
    ObjectProperty,
    SpreadElement,
    RestElement,
    // Declarations and patterns
    VariableDeclaration,
    VariableDeclarator,
    ObjectPattern,
    ArrayPattern,
    AssignmentPattern,
    // Expressions
    AssignmentExpression,
    UpdateExpression,
    UnaryExpression,
    CallExpression,
    OptionalCallExpression,
    NewExpression,
    MemberExpression,
    OptionalMemberExpression,
    ArrayExpression,
    SequenceExpression,
    ConditionalExpression,
    TaggedTemplateExpression,
    TemplateLiteral,
    AwaitExpression,
    YieldExpression,
    Import,
    // Statements
    BlockStatement,
    ExpressionStatement,
    LabeledStatement,
    BreakStatement,
    ContinueStatement,
    ReturnStatement,
    IfStatement,
    ForStatement,
    ForInStatement,
    ForOfStatement,
    WhileStatement,
    DoWhileStatement,
    SwitchStatement,
    SwitchCase,
    TryStatement,
    CatchClause,
    WithStatement,
    // Modules
    ImportDeclaration,
    ImportSpecifier,
    ImportDefaultSpecifier,
    ImportNamespaceSpecifier,
    ExportNamedDeclaration,
    ExportDefaultDeclaration,
    ExportAllDeclaration,
    ExportSpecifier,
}

/// Reads a node's `"type"` tag without parsing it.
pub(crate) fn type_str(node: &Value) -> Option<&str> {
    node.get("type")?.as_str()
}

/// Parses a node's kind. `None` for non-nodes and for kinds the visitors
/// have no dedicated handling for.
pub(crate) fn kind_of(node: &Value) -> Option<NodeKind> {
    type_str(node)?.parse().ok()
}

/// True when the value is an AST node (an object carrying a `"type"` tag).
pub(crate) fn is_node(value: &Value) -> bool {
    value.get("type").is_some_and(Value::is_string)
}

/// Reads an `Identifier` node's name.
pub(crate) fn identifier_name(node: &Value) -> Option<&str> {
    node.get("name")?.as_str()
}

/// True when the node is a boolean-flagged field, defaulting to false when
/// the field is absent (Babel omits false flags on some paths).
pub(crate) fn flag(node: &Value, name: &str) -> bool {
    node.get(name).is_some_and(|v| v.as_bool() == Some(true))
}

/// Returns the directives of a `Program` or function-body `BlockStatement`.
fn directives(node: &Value) -> &[Value] {
    node.get("directives").and_then(Value::as_array).map_or(&[], Vec::as_slice)
}

/// True when the node's directive prologue contains `"use strict"`.
pub(crate) fn has_use_strict(node: &Value) -> bool {
    directives(node).iter().any(|d| {
        d.get("value")
            .and_then(|v| v.get("value"))
            .and_then(Value::as_str)
            == Some("use strict")
    })
}

/// Removes `"use strict"` directives in place.
///
/// Serialized function ASTs carry strictness in the `isStrict` flag instead,
/// so the directive is normalized away before stringification.
pub(crate) fn strip_use_strict(node: &mut Value) {
    let Some(dirs) = node.get_mut("directives").and_then(Value::as_array_mut) else {
        return;
    };
    dirs.retain(|d| {
        d.get("value")
            .and_then(|v| v.get("value"))
            .and_then(Value::as_str)
            != Some("use strict")
    });
}

// ---------------------------------------------------------------------------
// Synthetic node builders.
//
// Injected nodes carry no `loc`; the code generator treats them as synthetic.
// ---------------------------------------------------------------------------

pub(crate) fn identifier(name: &str) -> Value {
    json!({"type": "Identifier", "name": name})
}

pub(crate) fn string_literal(value: &str) -> Value {
    json!({"type": "StringLiteral", "value": value})
}

pub(crate) fn numeric_literal(value: u64) -> Value {
    json!({"type": "NumericLiteral", "value": value})
}

pub(crate) fn boolean_literal(value: bool) -> Value {
    json!({"type": "BooleanLiteral", "value": value})
}

pub(crate) fn null_literal() -> Value {
    json!({"type": "NullLiteral"})
}

pub(crate) fn this_expression() -> Value {
    json!({"type": "ThisExpression"})
}

pub(crate) fn array_expression(elements: Vec<Value>) -> Value {
    json!({"type": "ArrayExpression", "elements": elements})
}

pub(crate) fn object_expression(properties: Vec<Value>) -> Value {
    json!({"type": "ObjectExpression", "properties": properties})
}

pub(crate) fn object_property(key: Value, value: Value, computed: bool) -> Value {
    json!({
        "type": "ObjectProperty",
        "key": key,
        "value": value,
        "computed": computed,
        "shorthand": false,
    })
}

/// `callee(args…)`
pub(crate) fn call(callee: Value, args: Vec<Value>) -> Value {
    json!({"type": "CallExpression", "callee": callee, "arguments": args})
}

/// `object.property` (non-computed).
pub(crate) fn member(object: Value, property: &str) -> Value {
    json!({
        "type": "MemberExpression",
        "object": object,
        "property": identifier(property),
        "computed": false,
    })
}

/// `object[index]` for a literal index.
pub(crate) fn member_index(object: Value, index: u64) -> Value {
    json!({
        "type": "MemberExpression",
        "object": object,
        "property": numeric_literal(index),
        "computed": true,
    })
}

/// `left = right`
pub(crate) fn assignment(left: Value, right: Value) -> Value {
    json!({
        "type": "AssignmentExpression",
        "operator": "=",
        "left": left,
        "right": right,
    })
}

/// `test ? consequent : alternate`
pub(crate) fn conditional(test: Value, consequent: Value, alternate: Value) -> Value {
    json!({
        "type": "ConditionalExpression",
        "test": test,
        "consequent": consequent,
        "alternate": alternate,
    })
}

/// `(exprs[0], exprs[1], …)`
pub(crate) fn sequence(expressions: Vec<Value>) -> Value {
    json!({"type": "SequenceExpression", "expressions": expressions})
}

pub(crate) fn expression_statement(expression: Value) -> Value {
    json!({"type": "ExpressionStatement", "expression": expression})
}

/// `kind declarators…;` where `kind` is `"const"`, `"let"` or `"var"`.
pub(crate) fn variable_declaration(kind: &str, declarations: Vec<Value>) -> Value {
    json!({"type": "VariableDeclaration", "kind": kind, "declarations": declarations})
}

pub(crate) fn variable_declarator(id: Value, init: Option<Value>) -> Value {
    json!({
        "type": "VariableDeclarator",
        "id": id,
        "init": init.unwrap_or(Value::Null),
    })
}

pub(crate) fn block_statement(body: Vec<Value>) -> Value {
    json!({"type": "BlockStatement", "body": body, "directives": []})
}

pub(crate) fn return_statement(argument: Value) -> Value {
    json!({"type": "ReturnStatement", "argument": argument})
}

/// `(params…) => body` where `body` is an expression or a block statement.
pub(crate) fn arrow(params: Vec<Value>, body: Value) -> Value {
    json!({
        "type": "ArrowFunctionExpression",
        "params": params,
        "body": body,
        "async": false,
        "generator": false,
    })
}

/// `function name() { body }` — used for the emitted info declarations.
pub(crate) fn function_declaration(name: &str, params: Vec<Value>, body: Vec<Value>) -> Value {
    json!({
        "type": "FunctionDeclaration",
        "id": identifier(name),
        "params": params,
        "body": block_statement(body),
        "async": false,
        "generator": false,
    })
}

pub(crate) fn rest_element(argument: Value) -> Value {
    json!({"type": "RestElement", "argument": argument})
}

pub(crate) fn spread_element(argument: Value) -> Value {
    json!({"type": "SpreadElement", "argument": argument})
}

pub(crate) fn object_pattern(properties: Vec<Value>) -> Value {
    json!({"type": "ObjectPattern", "properties": properties})
}

pub(crate) fn array_pattern(elements: Vec<Value>) -> Value {
    json!({"type": "ArrayPattern", "elements": elements})
}

/// `left = right` in pattern position (a default value).
pub(crate) fn assignment_pattern(left: Value, right: Value) -> Value {
    json!({"type": "AssignmentPattern", "left": left, "right": right})
}

/// `static { body }` inside a class body.
pub(crate) fn static_block(body: Vec<Value>) -> Value {
    json!({"type": "StaticBlock", "body": body})
}

/// `constructor(params…) { body }` as a class-body member.
pub(crate) fn class_constructor(params: Vec<Value>, body: Vec<Value>) -> Value {
    json!({
        "type": "ClassMethod",
        "kind": "constructor",
        "key": identifier("constructor"),
        "params": params,
        "body": block_statement(body),
        "computed": false,
        "static": false,
        "async": false,
        "generator": false,
    })
}

/// `with (object) body`
pub(crate) fn with_statement(object: Value, body: Value) -> Value {
    json!({"type": "WithStatement", "object": object, "body": body})
}

/// Attaches a leading block comment to a node.
///
/// The tracker comment must survive `Function.prototype.toString`, so it is
/// attached to a node that sits inside the function's own source text.
pub(crate) fn add_leading_comment(node: &mut Value, text: &str) {
    let comment = json!({"type": "CommentBlock", "value": text});
    match node.get_mut("leadingComments").and_then(Value::as_array_mut) {
        Some(comments) => comments.push(comment),
        None => {
            if let Some(obj) = node.as_object_mut() {
                obj.insert("leadingComments".to_owned(), Value::Array(vec![comment]));
            }
        }
    }
}

/// Builds an object node field-by-field when `json!` would be unwieldy.
pub(crate) fn node(kind: NodeKind, fields: Vec<(&'static str, Value)>) -> Value {
    let mut map = Map::new();
    let kind_str: &'static str = kind.into();
    map.insert("type".to_owned(), Value::String(kind_str.to_owned()));
    for (key, value) in fields {
        map.insert(key.to_owned(), value);
    }
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn kind_parses_babel_type_tags() {
        assert_eq!(kind_of(&json!({"type": "Identifier", "name": "x"})), Some(NodeKind::Identifier));
        assert_eq!(kind_of(&json!({"type": "BinaryExpression"})), None);
        assert_eq!(kind_of(&json!(42)), None);
    }

    #[test]
    fn use_strict_detection_and_stripping() {
        let mut program = json!({
            "type": "Program",
            "body": [],
            "directives": [
                {"type": "Directive", "value": {"type": "DirectiveLiteral", "value": "use strict"}},
                {"type": "Directive", "value": {"type": "DirectiveLiteral", "value": "use asm"}},
            ],
        });
        assert!(has_use_strict(&program));
        strip_use_strict(&mut program);
        assert!(!has_use_strict(&program));
        assert_eq!(program["directives"].as_array().unwrap().len(), 1);
    }
}
