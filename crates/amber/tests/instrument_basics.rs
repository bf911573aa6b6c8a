//! File-level scaffolding: the init statement, info declarations and
//! `getSources`.

mod common;

use common::*;
use serde_json::json;

#[test]
fn empty_program_gets_init_and_sources() {
    let instrumented = instrument_cjs(program(vec![]));
    let body = body_of(&instrumented);
    assert_eq!(body.len(), 2, "init statement and getSources, nothing else");

    let init = &body[0];
    assert_eq!(init["type"], "VariableDeclaration");
    assert_eq!(init["kind"], "const");
    let declarator = &init["declarations"][0];
    assert_eq!(declarator["id"]["type"], "ArrayPattern");
    assert_eq!(declarator["id"]["elements"][0]["name"], "amber_tracker");
    assert_eq!(declarator["id"]["elements"][1]["name"], "amber_getScopeId");

    // require('amber/init')('test.js', module, require, <nextBlockId>, 0)
    let init_call = &declarator["init"];
    assert_eq!(init_call["callee"]["callee"]["name"], "require");
    assert_eq!(init_call["callee"]["arguments"][0]["value"], "amber/init");
    assert_eq!(init_call["arguments"][0]["value"], "test.js");
    assert_eq!(init_call["arguments"][1]["name"], "module");
    assert_eq!(init_call["arguments"][2]["name"], "require");
    // File block and program block were allocated.
    assert_eq!(init_call["arguments"][3]["value"], 3);
    assert_eq!(init_call["arguments"][4]["value"], 0);

    let sources = &body[1];
    assert_eq!(sources["type"], "FunctionDeclaration");
    assert_eq!(sources["id"]["name"], "amber_getSources");
    assert_eq!(sources["body"]["body"][0]["argument"]["type"], "ObjectExpression");

    assert_eq!(instrumented.info.next_block_id, 3);
    assert_eq!(instrumented.info.prefix_num, 0);
    assert!(!instrumented.info.contains_functions);
    assert!(!instrumented.info.contains_eval);
}

#[test]
fn file_wrapper_is_preserved() {
    let file = json!({"type": "File", "program": program(vec![])});
    let instrumented = amber::instrument(file, &amber::Options::new("test.js")).unwrap();
    assert_eq!(instrumented.ast["type"], "File");
    let body = instrumented.ast["program"]["body"].as_array().unwrap();
    assert_eq!(body[0]["type"], "VariableDeclaration");
}

#[test]
fn info_declarations_follow_user_code() {
    let instrumented = instrument_cjs(program(vec![fn_decl("f", vec![], vec![])]));
    let body = body_of(&instrumented);
    // [init, f, fnInfo_f, getSources]
    assert_eq!(body.len(), 4);
    assert_eq!(body[1]["id"]["name"], "f");
    assert!(
        body[2]["id"]["name"].as_str().unwrap().contains("_fnInfo_"),
        "info declaration appended after user code"
    );
    assert_eq!(body[3]["id"]["name"], "amber_getSources");
    assert!(instrumented.info.contains_functions);
    assert_eq!(instrumented.info.function_count, 1);
}

#[test]
fn source_map_contents_are_embedded_when_enabled() {
    let mut options = amber::Options::new("test.js");
    options.source_maps = true;
    options.source = Some("function f() {}".to_owned());
    let instrumented = amber::instrument(program(vec![]), &options).unwrap();
    let sources = &body_of(&instrumented)[1];
    let returned = &sources["body"]["body"][0]["argument"];
    assert_eq!(returned["properties"][0]["key"]["value"], "test.js");
    assert_eq!(returned["properties"][0]["value"]["value"], "function f() {}");
}

#[test]
fn eval_context_prepends_const_bound_infos_and_no_init() {
    let mut options = amber::Options::new("test.js");
    options.context = amber::CodeContext::DirectEval;
    let instrumented = amber::instrument(program(vec![fn_decl("f", vec![], vec![])]), &options).unwrap();
    let body = body_of(&instrumented);
    // [const getSources, const fnInfo, f] — no require statement anywhere.
    assert_eq!(body[0]["type"], "VariableDeclaration");
    assert!(
        body[0]["declarations"][0]["id"]["name"]
            .as_str()
            .unwrap()
            .starts_with("amber_getSources")
    );
    assert_eq!(body[1]["type"], "VariableDeclaration");
    assert!(
        body[1]["declarations"][0]["id"]["name"]
            .as_str()
            .unwrap()
            .contains("_fnInfo_")
    );
    assert_eq!(
        body[1]["declarations"][0]["init"]["type"],
        "FunctionExpression"
    );
    let serialized = serde_json::to_string(&instrumented.ast).unwrap();
    assert!(!serialized.contains("amber/init"), "no init require inside eval code");
}
