//! The block tree and its bindings.
//!
//! A [`Block`] is a lexical scope region discovered in pass 1. Blocks form a
//! tree (parent back-pointers only, ids instead of references) and each block
//! owns the bindings declared directly in it. Pass 1 creates and populates
//! blocks; pass 2 only reads them, aside from the lazy activation that
//! materializes scope-id and temp variables on first capture.

use indexmap::IndexMap;

use crate::{
    ast,
    functions::FnIndex,
    internal_vars::InternalVarAllocator,
    trail::Trail,
};

/// Variables the CommonJS module wrapper provides to every file.
///
/// These are pre-bound in the file block, and a program-level `const`/`let`/
/// `class` declaration shadowing one of them is rejected: the program body
/// really is the wrapper function's body, where a lexical redeclaration of
/// a wrapper binding (including `arguments`) is a syntax error, and the
/// serialized form of any closure in the file could no longer distinguish
/// the shadow from the wrapper variable.
pub(crate) const COMMONJS_VAR_NAMES: [&str; 4] = ["module", "exports", "require", "arguments"];

/// Identifier of a block, unique within one instrumentation run and used as
/// the scope's identity at runtime. Ids are assigned monotonically starting
/// at 1, strictly before any binding in the block exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub(crate) struct BlockId(u32);

impl BlockId {
    /// Returns the raw id, as emitted into the instrumented output.
    #[inline]
    pub fn as_u32(self) -> u32 {
        self.0
    }

    fn index(self) -> usize {
        (self.0 - 1) as usize
    }
}

/// Creation-time properties of a binding.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct BindingProps {
    pub is_const: bool,
    /// Const whose violation fails silently in sloppy mode: a function
    /// expression's own name, or a class name seen from inside the class.
    pub is_silent_const: bool,
    /// `var` or function-declaration binding (hoistable, re-declarable).
    pub is_var: bool,
    /// Function or class binding. Not renameable by the serializer.
    pub is_function: bool,
}

/// One declared name in a block.
#[derive(Debug, Clone)]
pub(crate) struct Binding {
    /// The name emitted when the binding is referenced from instrumentation
    /// output (tracker calls, eval scope lists). `None` until the binding is
    /// activated by a first capture. Usually the binding's own name; the
    /// `super` pseudo-binding materializes as a temp var instead, since
    /// `super` is not a value that can be read directly.
    pub var_name: Option<String>,
    pub is_const: bool,
    pub is_silent_const: bool,
    pub is_var: bool,
    pub is_function: bool,
    /// For the `arguments` pseudo-binding: names of the formal parameters it
    /// aliases, when the function is sloppy and all formals are simple.
    pub arg_names: Option<Vec<String>>,
    /// The implicitly-created `arguments` pseudo-binding (as opposed to a
    /// user binding that happens to use the name).
    pub is_arguments: bool,
}

impl Binding {
    fn new(props: BindingProps) -> Self {
        Self {
            var_name: None,
            is_const: props.is_const,
            is_silent_const: props.is_silent_const,
            is_var: props.is_var,
            is_function: props.is_function,
            arg_names: None,
            is_arguments: false,
        }
    }
}

/// A lexical scope region.
#[derive(Debug)]
pub(crate) struct Block {
    pub id: BlockId,
    /// Optional label used as a naming hint in emitted scope records.
    pub name: Option<String>,
    pub parent: Option<BlockId>,
    /// The block where this block's scope-id and temp vars materialize.
    /// Self for vars blocks (file, program, function params or body, loop
    /// body, static init); a descendant for chained params+body blocks.
    pub vars_block: BlockId,
    /// Bindings keyed by name, in declaration order. Order is meaningful:
    /// it is the order vars appear in emitted scope records.
    pub bindings: IndexMap<String, Binding>,
    /// Name of the scope-id variable, set lazily on first activation.
    pub scope_id_var: Option<String>,
    /// Names of temp vars allocated under this block, in allocation order.
    pub temp_var_names: Vec<String>,
    /// When set, temps are objects accessed as `<temp>.value`, so a capture
    /// in a `for` loop head survives the per-iteration TDZ.
    pub temp_vars_as_objects: bool,
    /// Trail to the statements array where this block's scope-id and temp
    /// declarations are inserted. `None` for blocks with no insertable body
    /// (e.g. params blocks), whose vars chain to a block that has one.
    pub body_trail: Option<Trail>,
    /// The function whose instrumentation step inserts this block's
    /// declarations; `None` for program-level blocks (the driver's job).
    pub owner_fn: Option<FnIndex>,
    /// Set on the block that a function's tracking injection covers; such
    /// blocks are skipped by the activation bookkeeping since the injector
    /// always emits their scope-id declaration.
    pub is_function_scope: bool,
    /// Set on name blocks: the function whose own name this block binds.
    /// Used for id promotion when an inner `eval()` captures the name.
    pub name_block_of: Option<FnIndex>,
    /// Whether this vars block is already on an insertion list for its
    /// scope-id/temp declarations.
    pub decls_registered: bool,
}

/// Arena of all blocks created for one file.
#[derive(Debug, Default)]
pub(crate) struct Blocks {
    blocks: Vec<Block>,
}

/// Result of [`Blocks::activate`]: the scope-id var and the vars block it
/// lives on.
pub(crate) struct Activation {
    pub scope_id_name: String,
    pub vars_block: BlockId,
}

impl Blocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a block with a fresh id.
    ///
    /// `vars_block` is self for vars blocks, otherwise inherited from the
    /// parent; the scope analyzer overrides it for chained params+body
    /// blocks and complex-parameter functions.
    pub fn create_block(&mut self, name: Option<String>, is_vars_block: bool, parent: Option<BlockId>) -> BlockId {
        let id = BlockId(u32::try_from(self.blocks.len() + 1).expect("block count fits in u32"));
        let vars_block = if is_vars_block {
            id
        } else {
            let parent = parent.expect("non-vars block must have a parent");
            self.get(parent).vars_block
        };
        self.blocks.push(Block {
            id,
            name,
            parent,
            vars_block,
            bindings: IndexMap::new(),
            scope_id_var: None,
            temp_var_names: Vec::new(),
            temp_vars_as_objects: false,
            body_trail: None,
            owner_fn: None,
            is_function_scope: false,
            name_block_of: None,
            decls_registered: false,
        });
        id
    }

    /// The id the next created block will get. Emitted in the init statement
    /// so the runtime continues the sequence for code eval'd later.
    pub fn next_block_id(&self) -> u32 {
        u32::try_from(self.blocks.len() + 1).expect("block count fits in u32")
    }

    pub fn get(&self, id: BlockId) -> &Block {
        &self.blocks[id.index()]
    }

    pub fn get_mut(&mut self, id: BlockId) -> &mut Block {
        &mut self.blocks[id.index()]
    }

    /// Creates a binding for `name`, routing the name through the allocator's
    /// internal-name clash check.
    ///
    /// Re-declarations follow `var` semantics: `var` after `var`/function is
    /// idempotent, a function declaration over an existing `var` upgrades
    /// `is_function`. Lexical re-declaration is the parser's problem, not
    /// ours; the store keeps the first binding's properties.
    pub fn create_binding(
        &mut self,
        block: BlockId,
        name: &str,
        props: BindingProps,
        alloc: &mut InternalVarAllocator,
    ) -> &mut Binding {
        alloc.check_user_name(name);
        self.create_binding_without_name_check(block, name, props)
    }

    /// Creates a binding without the clash check. Used for names the user
    /// cannot spell as plain identifiers (`this`, `new.target`, `super`) and
    /// for pre-seeded bindings (`arguments`, imports, CommonJS vars).
    pub fn create_binding_without_name_check(
        &mut self,
        block: BlockId,
        name: &str,
        props: BindingProps,
    ) -> &mut Binding {
        let bindings = &mut self.blocks[block.index()].bindings;
        if let Some(existing_index) = bindings.get_index_of(name) {
            let existing = &mut bindings[existing_index];
            if props.is_function {
                existing.is_function = true;
            }
            existing
        } else {
            bindings.entry(name.to_owned()).or_insert(Binding::new(props))
        }
    }

    pub fn binding(&self, block: BlockId, name: &str) -> Option<&Binding> {
        self.get(block).bindings.get(name)
    }

    /// Looks `name` up through the block chain starting at `block`.
    pub fn resolve(&self, block: BlockId, name: &str) -> Option<BlockId> {
        let mut current = Some(block);
        while let Some(id) = current {
            if self.get(id).bindings.contains_key(name) {
                return Some(id);
            }
            current = self.get(id).parent;
        }
        None
    }

    /// Allocates the scope-id var on the block's vars block, if not already
    /// present.
    pub fn activate(&mut self, block: BlockId, alloc: &InternalVarAllocator) -> Activation {
        let vars_block = self.get(block).vars_block;
        let vars = self.get_mut(vars_block);
        if let Some(name) = &vars.scope_id_var {
            Activation {
                scope_id_name: name.clone(),
                vars_block,
            }
        } else {
            let name = alloc.scope_id_name(vars_block.as_u32());
            vars.scope_id_var = Some(name.clone());
            Activation {
                scope_id_name: name,
                vars_block,
            }
        }
    }

    /// Materializes a binding's emission name on first capture.
    pub fn activate_binding(&mut self, block: BlockId, name: &str) {
        let binding = self.blocks[block.index()]
            .bindings
            .get_mut(name)
            .expect("activated binding exists");
        if binding.var_name.is_none() {
            binding.var_name = Some(name.to_owned());
        }
    }

    /// Allocates a new temp var under the block's vars block and returns its
    /// name together with the node to use at the access site (`<temp>` or
    /// `<temp>.value` when the vars block keeps temps as objects).
    pub fn create_block_temp_var(&mut self, block: BlockId, alloc: &InternalVarAllocator) -> TempVar {
        let vars_block = self.get(block).vars_block;
        let vars = self.get_mut(vars_block);
        let ordinal = vars.temp_var_names.len();
        let name = alloc.temp_name(vars_block.as_u32(), ordinal);
        vars.temp_var_names.push(name.clone());
        let node = if vars.temp_vars_as_objects {
            ast::member(ast::identifier(&name), "value")
        } else {
            ast::identifier(&name)
        };
        TempVar { name, node, vars_block }
    }
}

/// A freshly allocated temp var.
pub(crate) struct TempVar {
    pub name: String,
    /// Node to splice in at the use site.
    pub node: serde_json::Value,
    pub vars_block: BlockId,
}
