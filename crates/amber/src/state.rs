//! Shared mutable state threaded through both passes, the deferred job
//! queue, and the mutation list.
//!
//! Pass 1 walks the tree and never mutates it; everything it decides is
//! recorded either in the block/function stores or as a [`Job`]. Pass 2
//! drains the jobs in enqueue order (post-order, leaves before parents) and
//! still does not edit the tree beyond the serialize/detach/reattach
//! protocol — tree edits are recorded as [`Mutation`]s with trails in
//! original coordinates and applied in one final phase, deepest first, so no
//! edit ever invalidates another's coordinates.

use serde_json::Value;

use crate::{
    blocks::{BlockId, Blocks},
    error::CodeLoc,
    functions::{AmendmentKind, FnIndex, Functions},
    instrument::Options,
    internal_vars::InternalVarAllocator,
    trail::{Trail, TrailKey},
};

/// A unit of deferred pass-2 work, enqueued on exit from a node in pass 1.
#[derive(Debug)]
pub(crate) enum Job {
    /// Resolve an identifier use to a binding and record the outcome.
    ResolveIdentifier {
        block: BlockId,
        fn_idx: Option<FnIndex>,
        name: String,
        trail: Trail,
        is_read: bool,
        is_assign: bool,
    },
    /// Rewrite a direct `eval(…)` call into the tracker-mediated form.
    RewriteEval {
        block: BlockId,
        fn_idx: Option<FnIndex>,
        trail: Trail,
        is_strict: bool,
        super_block: Option<BlockId>,
        /// Hoist block in effect at the call site (the enclosing function's,
        /// not the file's).
        hoist_block: Option<BlockId>,
    },
    /// Rewrite a bare `eval` reference to the local-eval accessor, unless
    /// `eval` turns out to be a user binding.
    RewriteBareEval {
        block: BlockId,
        fn_idx: Option<FnIndex>,
        trail: Trail,
        is_read: bool,
        is_assign: bool,
    },
    /// Append a `super`-use amendment to a function.
    SuperAmendment {
        fn_idx: FnIndex,
        kind: AmendmentKind,
        block_id: BlockId,
        trail: Trail,
    },
    /// Rewrite `with (x) body` so `eval` inside the body flows through the
    /// runtime's capture hook.
    RewriteWith { block: BlockId, trail: Trail },
    /// Serialize, instrument and detach one function (or class).
    InstrumentFunction { fn_idx: FnIndex },
}

/// How a [`Mutation::Replace`] rebuilds the node at its trail.
#[derive(Debug)]
pub(crate) enum ReplaceKind {
    /// `eval(args…)` becomes the tracked conditional form. The scopes array
    /// was built during the job drain; the original arguments are lifted out
    /// of the node at apply time.
    EvalCall {
        scopes: Value,
        temp_node: Value,
        is_strict: bool,
        /// The callee is the runtime's eval proxy, not the real eval
        /// (direct-eval code re-instrumented at runtime).
        proxied: bool,
        hoist_block_id: Option<u32>,
    },
    /// A bare `eval` identifier becomes the named local-eval accessor.
    BareEval { name: String },
    /// `with (x) body` becomes the double-`with` capture form.
    With { temp_node: Value },
    /// An object literal whose methods captured `super` is wrapped in an
    /// assignment to the temp holding the super target.
    WrapObjectSuper { temp_node: Value },
}

/// One deferred tree edit, anchored at original coordinates.
#[derive(Debug)]
pub(crate) enum Mutation {
    /// Prepend statements to a function's body (body-path injection),
    /// blockifying an arrow's expression body first when needed.
    InjectBody { fn_trail: Trail, stmts: Vec<Value> },
    /// Append the tracker-carrying rest element to a function's params
    /// (params-path injection).
    InjectParams {
        fn_trail: Trail,
        tracker_call: Value,
        scope_id_name: String,
        get_scope_id_name: String,
        temp_names: Vec<String>,
        /// `(fixer temp, rest name)` when the user's rest target is a plain
        /// identifier that must be reified back into an array.
        rest_fixer: Option<(String, String)>,
    },
    /// Insert scope-id/temp declarations at the top of a statements array.
    InsertBlockDecls { array_trail: Trail, stmts: Vec<Value> },
    /// Replace the node at `trail`.
    Replace { trail: Trail, kind: ReplaceKind },
    /// Class-body edits: prepend the super-target capture and append a
    /// synthesized constructor. Tracker injection into a user constructor
    /// goes through `InjectBody`/`InjectParams` anchored at the constructor
    /// member, which is deeper and therefore applies first.
    ClassTransform {
        class_trail: Trail,
        super_capture: Option<Value>,
        synthesized_ctor: Option<Value>,
    },
}

impl Mutation {
    /// Depth of the anchor node; the apply phase runs deepest first.
    pub fn depth(&self) -> usize {
        match self {
            Self::InjectBody { fn_trail, .. } | Self::InjectParams { fn_trail, .. } => fn_trail.len(),
            Self::InsertBlockDecls { array_trail, .. } => array_trail.len(),
            Self::Replace { trail, .. } => trail.len(),
            Self::ClassTransform { class_trail, .. } => class_trail.len(),
        }
    }
}

/// A sloppy-mode function declaration at a non-hoist block, recorded for the
/// post-pass-1 hoist analysis.
#[derive(Debug)]
pub(crate) struct SloppyFnDecl {
    pub name: String,
    /// The block the declaration syntactically lives in.
    pub block: BlockId,
    /// The hoist block in effect at the declaration site.
    pub hoist_block: Option<BlockId>,
    /// Params block of the enclosing function, for the formal-clash check.
    pub params_block: Option<BlockId>,
}

/// The shared context threaded through pass 1 and pass 2.
pub(crate) struct State<'o> {
    pub options: &'o Options,
    pub blocks: Blocks,
    pub functions: Functions,
    pub alloc: InternalVarAllocator,
    pub jobs: Vec<Job>,
    pub mutations: Vec<Mutation>,
    pub file_block: BlockId,
    pub program_block: BlockId,
    pub current_block: BlockId,
    pub current_function: Option<FnIndex>,
    pub current_this_block: Option<BlockId>,
    pub current_super_block: Option<BlockId>,
    pub current_hoist_block: Option<BlockId>,
    /// Absolute trail of the node currently being visited.
    pub trail: Trail,
    pub is_strict: bool,
    /// Whether `super` in the enclosing method form targets the prototype.
    pub super_is_proto: bool,
    /// Statement index while walking a constructor's top-level body,
    /// for `first_super_statement_index`.
    pub current_ctor_stmt_index: Option<u32>,
    pub sloppy_fn_decls: Vec<SloppyFnDecl>,
    /// Activated program-level vars blocks; the driver inserts their
    /// declarations.
    pub program_blocks_to_declare: Vec<BlockId>,
    /// Emitted function-info declarations, in job order.
    pub fn_info_decls: Vec<Value>,
    pub uses_local_eval: bool,
    pub file_contains_eval: bool,
    pub file_contains_functions: bool,
}

impl<'o> State<'o> {
    pub fn new(options: &'o Options, blocks: Blocks, file_block: BlockId, program_block: BlockId) -> Self {
        Self {
            options,
            blocks,
            functions: Functions::new(),
            alloc: InternalVarAllocator::new(options.prefix_num),
            jobs: Vec::new(),
            mutations: Vec::new(),
            file_block,
            program_block,
            current_block: program_block,
            current_function: None,
            current_this_block: Some(file_block),
            current_super_block: None,
            current_hoist_block: None,
            trail: Trail::new(),
            is_strict: false,
            super_is_proto: false,
            current_ctor_stmt_index: None,
            sloppy_fn_decls: Vec::new(),
            program_blocks_to_declare: Vec::new(),
            fn_info_decls: Vec::new(),
            uses_local_eval: false,
            file_contains_eval: false,
            file_contains_functions: false,
        }
    }

    /// Snapshot of the current trail. Jobs must never share the live stack.
    pub fn trail_snapshot(&self) -> Trail {
        self.trail.clone()
    }

    /// Registers a vars block on whichever instrumentation step will insert
    /// its scope-id/temp declarations: the owning function's, or the
    /// driver's for program-level blocks. Idempotent. Function scopes are
    /// skipped; the tracking injector always declares those.
    pub fn register_block_decls(&mut self, vars_block: BlockId) {
        let block = self.blocks.get_mut(vars_block);
        if block.is_function_scope || block.decls_registered {
            return;
        }
        block.decls_registered = true;
        match block.owner_fn {
            Some(owner) => self.functions.get_mut(owner).blocks_to_declare.push(vars_block),
            None => self.program_blocks_to_declare.push(vars_block),
        }
    }

}

/// Source location of the deepest located node at the current trail, for
/// error augmentation.
pub(crate) fn loc_at(root: &Value, trail: &[TrailKey]) -> Option<CodeLoc> {
    let mut best = CodeLoc::from_node(root);
    let mut node = root;
    for step in trail {
        let next = match step {
            TrailKey::Key(k) => node.get(k.as_ref()),
            TrailKey::Index(i) => node.get(*i),
        };
        let Some(next) = next else { break };
        node = next;
        if let Some(loc) = CodeLoc::from_node(node) {
            best = Some(loc);
        }
    }
    best
}
