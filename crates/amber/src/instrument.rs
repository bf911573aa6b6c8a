//! The driver: orchestrates the passes and emits the file-level scaffolding.
//!
//! Order of operations, which the rest of the crate is built around:
//! set up the file and program blocks, run pass 1, resolve sloppy-mode
//! function hoisting, drain the pass-2 job queue, apply the recorded tree
//! mutations (deepest first), insert the program-level scope-id/temp
//! declarations, append the function-info and `getSources` declarations,
//! and finally prepend the init `require` statement.

use serde_json::Value;

use crate::{
    analyze,
    ast::{self, NodeKind},
    blocks::{BindingProps, Blocks, COMMONJS_VAR_NAMES},
    error::{AnalysisError, InstrumentError},
    hoist,
    state::{Mutation, State, loc_at},
    trail::TrailKey,
    transform,
};

/// What kind of code unit is being instrumented.
///
/// The context decides the file block's pre-seeded bindings, the hoist
/// block, and the file-level emission shape: eval contexts get their
/// function-info declarations prepended as `const`-bound expressions and no
/// init statement, since the init module handle already exists in the
/// calling code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CodeContext {
    /// A CommonJS module: `module`/`exports`/`require` and the wrapper's
    /// `this`/`arguments` are in scope, and the program block is the hoist
    /// block.
    #[default]
    CommonJs,
    /// A plain script.
    Script,
    /// Code passed to a direct `eval()` call, re-instrumented at runtime.
    DirectEval,
    /// Code passed to an indirect eval. In sloppy mode there is no hoist
    /// block: `var` escapes to an environment that is not statically known.
    IndirectEval,
}

/// Configuration for one instrumentation run.
#[derive(Debug, Clone)]
pub struct Options {
    /// Filename baked into the init statement, tracker comments and error
    /// messages.
    pub filename: String,
    /// Module path of the runtime init, as it appears in the prepended
    /// `require(…)`.
    pub init_path: String,
    pub context: CodeContext,
    /// Treat the code as strict regardless of directives (module code,
    /// eval code from a strict caller).
    pub strict: bool,
    /// Emit the file's source text from `getSources`, for source maps.
    pub source_maps: bool,
    /// The source text, when `source_maps` is on.
    pub source: Option<String>,
    /// Internal-name prefix counter to resume from. Zero for a fresh file;
    /// eval-context code continues from the counter of the code that
    /// created it.
    pub prefix_num: u32,
}

impl Options {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            init_path: "amber/init".to_owned(),
            context: CodeContext::CommonJs,
            strict: false,
            source_maps: false,
            source: None,
            prefix_num: 0,
        }
    }

    pub(crate) fn is_commonjs(&self) -> bool {
        self.context == CodeContext::CommonJs
    }

    pub(crate) fn is_eval_code(&self) -> bool {
        matches!(self.context, CodeContext::DirectEval | CodeContext::IndirectEval)
    }

    /// Whether an unresolved `eval` reference in this code is the runtime's
    /// proxy rather than the real eval. True for direct-eval code: its whole
    /// environment, `eval` included, is reconstructed by the runtime, which
    /// supplies a proxy so nested direct calls keep direct-eval semantics.
    /// Indirect-eval code runs at global scope and sees the real eval.
    pub(crate) fn eval_is_proxied(&self) -> bool {
        self.context == CodeContext::DirectEval
    }
}

/// Summary of one instrumentation run, for the caller/loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// First block id the runtime may allocate (baked into the init
    /// statement).
    pub next_block_id: u32,
    /// Final internal-name prefix counter.
    pub prefix_num: u32,
    /// Whether the counter moved during this run. Relevant when
    /// re-instrumenting eval code: emitted names no longer match the outer
    /// instrumentation's.
    pub prefix_changed: bool,
    pub function_count: usize,
    pub contains_eval: bool,
    pub contains_functions: bool,
}

/// The transformed AST plus the run summary.
#[derive(Debug)]
pub struct Instrumented {
    pub ast: Value,
    pub info: FileInfo,
}

/// Instruments a parsed program.
///
/// Accepts a Babel-shape `File` or bare `Program` node and returns the same
/// shape, transformed. The input AST is consumed; nodes are reused in the
/// output wherever the transformation leaves them intact.
pub fn instrument(ast_root: Value, options: &Options) -> Result<Instrumented, InstrumentError> {
    let is_file = ast::kind_of(&ast_root) == Some(NodeKind::File);
    let (file_node, mut program) = if is_file {
        let mut file_node = ast_root;
        let program = file_node
            .get_mut("program")
            .map(std::mem::take)
            .unwrap_or(Value::Null);
        (Some(file_node), program)
    } else {
        (None, ast_root)
    };
    if ast::kind_of(&program) != Some(NodeKind::Program) {
        let err = AnalysisError::unexpected_node(ast::type_str(&program).unwrap_or("<unknown>"), None);
        return Err(err.into_instrument_error(&options.filename));
    }

    let is_strict = options.strict || ast::has_use_strict(&program);

    // The file block models the scope wrapping the program: the CommonJS
    // wrapper function, or the global/eval environment.
    let mut blocks = Blocks::new();
    let file_block = blocks.create_block(None, true, None);
    blocks.get_mut(file_block).body_trail = Some([TrailKey::key("body")].into_iter().collect());
    if options.is_commonjs() {
        for name in COMMONJS_VAR_NAMES {
            let binding = blocks.create_binding_without_name_check(file_block, name, BindingProps::default());
            binding.is_arguments = name == "arguments";
        }
        blocks.create_binding_without_name_check(file_block, "this", BindingProps::default());
        blocks.create_binding_without_name_check(file_block, "new.target", BindingProps::default());
    } else {
        blocks.create_binding_without_name_check(file_block, "this", BindingProps::default());
    }
    let program_block = blocks.create_block(None, true, Some(file_block));
    blocks.get_mut(program_block).body_trail = Some([TrailKey::key("body")].into_iter().collect());

    let mut st = State::new(options, blocks, file_block, program_block);
    st.is_strict = is_strict;
    st.current_hoist_block = match options.context {
        CodeContext::CommonJs | CodeContext::Script => Some(program_block),
        CodeContext::DirectEval | CodeContext::IndirectEval => is_strict.then_some(program_block),
    };

    // Pass 1.
    if let Err(err) = analyze::analyze(&mut st, &program) {
        let fallback = loc_at(&program, &st.trail);
        return Err(err.or_loc(fallback).into_instrument_error(&options.filename));
    }

    hoist::resolve_sloppy_hoists(&mut st);

    // Pass 2: job drain, then the deferred tree edits.
    if let Err(err) = transform::run_jobs(&mut st, &mut program) {
        return Err(err.into_instrument_error(&options.filename));
    }

    let to_declare = std::mem::take(&mut st.program_blocks_to_declare);
    for block_id in to_declare {
        let stmts = transform::block_decl_statements(&st, block_id);
        let array_trail = st
            .blocks
            .get(block_id)
            .body_trail
            .clone()
            .expect("program-level vars block has an insertion point");
        st.mutations.push(Mutation::InsertBlockDecls { array_trail, stmts });
    }
    if let Err(err) = transform::apply_mutations(&mut st, &mut program) {
        return Err(err.into_instrument_error(&options.filename));
    }

    emit_file_scaffolding(&mut st, &mut program);

    let info = FileInfo {
        next_block_id: st.blocks.next_block_id(),
        prefix_num: st.alloc.prefix_num(),
        prefix_changed: st.alloc.prefix_changed(),
        function_count: st.functions.len(),
        contains_eval: st.file_contains_eval,
        contains_functions: st.file_contains_functions,
    };

    let ast_root = match file_node {
        Some(mut file_node) => {
            if let Some(slot) = file_node.get_mut("program") {
                *slot = program;
            }
            file_node
        }
        None => program,
    };
    Ok(Instrumented { ast: ast_root, info })
}

/// The file-level emissions: function-info declarations, `getSources`, the
/// local-eval accessor, and the init `require` statement.
fn emit_file_scaffolding(st: &mut State<'_>, program: &mut Value) {
    let Some(body) = program.get_mut("body").and_then(Value::as_array_mut) else {
        return;
    };

    let fn_infos = std::mem::take(&mut st.fn_info_decls);
    let get_sources = build_get_sources(st);

    if st.options.is_eval_code() {
        // Inside eval there is no file end to speak of: the declarations go
        // first, const-bound so re-instrumented code cannot redeclare them.
        let mut prefix: Vec<Value> = Vec::with_capacity(fn_infos.len() + 1);
        prefix.push(declaration_to_const(get_sources));
        prefix.extend(fn_infos.into_iter().map(declaration_to_const));
        body.splice(0..0, prefix);
        return;
    }

    body.extend(fn_infos);
    body.push(get_sources);

    if st.uses_local_eval {
        let accessor = ast::variable_declaration(
            "const",
            vec![ast::variable_declarator(
                ast::identifier(&st.alloc.local_eval_name()),
                Some(ast::member(ast::identifier(&st.alloc.tracker_name()), "localEval")),
            )],
        );
        body.insert(0, accessor);
    }

    // const [tracker, getScopeId] =
    //     require('<initPath>')('<filename>', module, require, <nextBlockId>, <prefixNum>);
    let init = ast::variable_declaration(
        "const",
        vec![ast::variable_declarator(
            ast::array_pattern(vec![
                ast::identifier(&st.alloc.tracker_name()),
                ast::identifier(&st.alloc.get_scope_id_name()),
            ]),
            Some(ast::call(
                ast::call(
                    ast::identifier("require"),
                    vec![ast::string_literal(&st.options.init_path)],
                ),
                vec![
                    ast::string_literal(&st.options.filename),
                    ast::identifier("module"),
                    ast::identifier("require"),
                    ast::numeric_literal(u64::from(st.blocks.next_block_id())),
                    ast::numeric_literal(u64::from(st.alloc.prefix_num())),
                ],
            )),
        )],
    );
    body.insert(0, init);
}

/// `function <getSources>() { return {…}; }` — the source map of the file,
/// or an empty object when source maps are off.
fn build_get_sources(st: &State<'_>) -> Value {
    let sources = match (&st.options.source, st.options.source_maps) {
        (Some(source), true) => ast::object_expression(vec![ast::object_property(
            ast::string_literal(&st.options.filename),
            ast::string_literal(source),
            false,
        )]),
        _ => ast::object_expression(vec![]),
    };
    ast::function_declaration(
        &st.alloc.get_sources_name(),
        vec![],
        vec![ast::return_statement(sources)],
    )
}

/// Rewrites `function name() {…}` into `const name = function() {…};`.
fn declaration_to_const(mut declaration: Value) -> Value {
    let name = declaration
        .get("id")
        .and_then(ast::identifier_name)
        .expect("info declarations are named")
        .to_owned();
    if let Some(obj) = declaration.as_object_mut() {
        obj.insert("type".to_owned(), Value::String("FunctionExpression".to_owned()));
        obj.insert("id".to_owned(), Value::Null);
    }
    ast::variable_declaration(
        "const",
        vec![ast::variable_declarator(ast::identifier(&name), Some(declaration))],
    )
}
