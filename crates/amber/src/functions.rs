//! Per-function records built up across both passes.
//!
//! One [`Function`] exists for every function, arrow, method and class in
//! the source. Pass 1 creates it and fills in the scope-shape facts; pass 2
//! accumulates resolution results (external/internal/global vars, const and
//! `super` amendments) and finally turns the record into the emitted
//! function-info declaration.

use indexmap::{IndexMap, IndexSet};
use serde_json::Value;

use crate::{blocks::BlockId, trail::Trail};

/// Index of a function in the [`Functions`] arena.
///
/// Distinct from the function's *id*: the id is a [`BlockId`] (the params
/// block's id) and is what the runtime sees; the index is just the arena
/// slot, used for parent/child links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct FnIndex(u32);

impl FnIndex {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// The kind of function, as encoded in tracker comments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FnType {
    Function,
    AsyncFunction,
    GeneratorFunction,
    AsyncGeneratorFunction,
    Class,
}

impl FnType {
    /// Short code used in the tracker comment.
    pub fn code(self) -> &'static str {
        match self {
            Self::Function => "f",
            Self::AsyncFunction => "a",
            Self::GeneratorFunction => "g",
            Self::AsyncGeneratorFunction => "ag",
            Self::Class => "c",
        }
    }

    pub fn from_flags(is_async: bool, is_generator: bool) -> Self {
        match (is_async, is_generator) {
            (false, false) => Self::Function,
            (true, false) => Self::AsyncFunction,
            (false, true) => Self::GeneratorFunction,
            (true, true) => Self::AsyncGeneratorFunction,
        }
    }
}

/// Special-usage record attached to a function, emitted (reversed) in its
/// function-info JSON as `[kind, blockId, …trail]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AmendmentKind {
    SuperCall,
    SuperExpression,
    /// Assignment to an external const that must be replayed as a `var`
    /// write (the violating reference also reads the variable).
    ConstViolationNeedsVar,
    /// Assignment to an external const replayed as a bare write.
    ConstViolationNeedsNoVar,
    /// Assignment to a silent const (function-expression name, class name);
    /// fails without throwing in sloppy mode.
    ConstViolationSilent,
}

impl AmendmentKind {
    /// Numeric code used in the emitted JSON.
    pub fn code(self) -> u8 {
        match self {
            Self::SuperCall => 0,
            Self::SuperExpression => 1,
            Self::ConstViolationNeedsVar => 2,
            Self::ConstViolationNeedsNoVar => 3,
            Self::ConstViolationSilent => 4,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Amendment {
    pub kind: AmendmentKind,
    pub block_id: BlockId,
    /// Function-relative trail of the use site.
    pub trail: Trail,
}

/// A variable the function reads or writes that is bound outside it.
#[derive(Debug)]
pub(crate) struct ExternalVar {
    /// Node emitted for this var in the tracker call (an identifier, a
    /// `this` expression, or the temp holding a captured `super` target).
    pub var_node: Value,
    pub is_read_from: bool,
    pub is_assigned_to: bool,
    /// Linked formal parameter names, for a captured `arguments` object.
    pub arg_names: Option<Vec<String>>,
    /// Function-relative trails of the use sites.
    pub trails: Vec<Trail>,
}

/// One function, arrow, method or class.
#[derive(Debug)]
pub(crate) struct Function {
    /// Scope identity at runtime: the params block's id at creation. May be
    /// promoted to the enclosing name block's id when the function's own
    /// name is captured by an inner `eval()`.
    pub id: BlockId,
    pub params_block: BlockId,
    /// The body's own block, when the body is a statement block.
    pub body_block: Option<BlockId>,
    /// Absolute trail of the function's AST node.
    pub trail: Trail,
    pub fn_type: FnType,
    /// Arrows share the enclosing `this`/`super`/`arguments` context.
    pub is_arrow: bool,
    /// The name block wrapping a named function/class expression. When an
    /// inner `eval()` captures the name, the function's id is promoted to
    /// this block's id.
    pub name_block: Option<BlockId>,
    /// For classes: the block the super target binds in.
    pub super_block: Option<BlockId>,
    pub parent: Option<FnIndex>,
    pub children: Vec<FnIndex>,
    pub is_strict: bool,
    pub contains_eval: bool,
    pub contains_import: bool,
    pub has_super_class: bool,
    /// Whether `super` inside this function targets the prototype (method
    /// form) rather than the constructor (static/constructor form).
    pub super_is_proto: bool,
    /// Whether the constructor's completion value is a `super(…)` call
    /// (synthesized derived constructors, `return super(…)`).
    pub returns_super: bool,
    /// Index of the first constructor body statement containing `super()`.
    pub first_super_statement_index: Option<u32>,
    /// Index of the first non-simple parameter, when there is one. Selects
    /// the params-path tracking injection.
    pub first_complex_param_index: Option<u32>,
    /// Formal parameter names linked to `arguments`, when they alias.
    pub arg_names: Option<Vec<String>>,
    /// Internal var uses: name to function-relative use-site trails.
    pub internal_vars: IndexMap<String, Vec<Trail>>,
    /// External var uses, grouped by defining block.
    pub external_vars: IndexMap<BlockId, IndexMap<String, ExternalVar>>,
    /// Names that resolved to globals.
    pub global_var_names: IndexSet<String>,
    pub amendments: Vec<Amendment>,
    /// Holds the subtree between its detachment (after this function's AST
    /// is serialized) and its reinsertion by the parent's instrumentation.
    pub detached_node: Option<Value>,
    /// Activated non-function vars blocks whose scope-id/temp declarations
    /// this function's instrumentation step inserts.
    pub blocks_to_declare: Vec<BlockId>,
}

/// Arena of all functions found in one file, in pass-1 creation order.
#[derive(Debug, Default)]
pub(crate) struct Functions {
    fns: Vec<Function>,
}

impl Functions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(
        &mut self,
        params_block: BlockId,
        trail: Trail,
        fn_type: FnType,
        parent: Option<FnIndex>,
    ) -> FnIndex {
        let index = FnIndex(u32::try_from(self.fns.len()).expect("function count fits in u32"));
        self.fns.push(Function {
            id: params_block,
            params_block,
            body_block: None,
            trail,
            fn_type,
            is_arrow: false,
            name_block: None,
            super_block: None,
            parent,
            children: Vec::new(),
            is_strict: false,
            contains_eval: false,
            contains_import: false,
            has_super_class: false,
            super_is_proto: false,
            returns_super: false,
            first_super_statement_index: None,
            first_complex_param_index: None,
            arg_names: None,
            internal_vars: IndexMap::new(),
            external_vars: IndexMap::new(),
            global_var_names: IndexSet::new(),
            amendments: Vec::new(),
            detached_node: None,
            blocks_to_declare: Vec::new(),
        });
        if let Some(parent) = parent {
            self.fns[parent.index()].children.push(index);
        }
        index
    }

    pub fn get(&self, index: FnIndex) -> &Function {
        &self.fns[index.index()]
    }

    pub fn get_mut(&mut self, index: FnIndex) -> &mut Function {
        &mut self.fns[index.index()]
    }

    pub fn len(&self) -> usize {
        self.fns.len()
    }

    /// All function indices, in creation order.
    pub fn indices(&self) -> impl Iterator<Item = FnIndex> {
        (0..self.fns.len()).map(|i| FnIndex(u32::try_from(i).expect("function count fits in u32")))
    }

    /// Registers a use of an external var, creating the record on first use.
    ///
    /// `var_node` is only stored on creation; flags and trails accumulate.
    pub fn record_external_var(
        &mut self,
        index: FnIndex,
        block: BlockId,
        name: &str,
        var_node: Value,
    ) -> &mut ExternalVar {
        self.fns[index.index()]
            .external_vars
            .entry(block)
            .or_default()
            .entry(name.to_owned())
            .or_insert_with(|| ExternalVar {
                var_node,
                is_read_from: false,
                is_assigned_to: false,
                arg_names: None,
                trails: Vec::new(),
            })
    }
}
