//! Resolution of sloppy-mode function-declaration hoisting.
//!
//! In sloppy mode, a function declaration inside a block may additionally
//! bind its name in the enclosing hoist block (Annex B semantics), but only
//! when nothing else claims the name on the way up. Pass 1 records every
//! candidate; this resolver runs between the passes, once all declarations
//! in the file are known.

use crate::{blocks::BindingProps, state::State};

/// Decides hoistability for every recorded sloppy function declaration and
/// creates (or upgrades) the hoist-block bindings of the hoistable ones.
///
/// A declaration is hoistable iff:
/// 1. the hoist block has no `const`/`let`/class binding of the name,
/// 2. no formal parameter of the enclosing function has the name,
/// 3. no block between the declaration and the hoist block binds the name.
pub(crate) fn resolve_sloppy_hoists(st: &mut State<'_>) {
    let decls = std::mem::take(&mut st.sloppy_fn_decls);
    for decl in decls {
        let Some(hoist_block) = decl.hoist_block else {
            continue;
        };

        if let Some(existing) = st.blocks.binding(hoist_block, &decl.name)
            && !existing.is_var
        {
            continue;
        }

        if let Some(params_block) = decl.params_block
            && st.blocks.binding(params_block, &decl.name).is_some()
        {
            continue;
        }

        let mut blocked = false;
        let mut current = st.blocks.get(decl.block).parent;
        while let Some(id) = current {
            if id == hoist_block {
                break;
            }
            if st.blocks.binding(id, &decl.name).is_some() {
                blocked = true;
                break;
            }
            current = st.blocks.get(id).parent;
        }
        if blocked {
            continue;
        }

        st.blocks.create_binding_without_name_check(
            hoist_block,
            &decl.name,
            BindingProps {
                is_var: true,
                is_function: true,
                ..BindingProps::default()
            },
        );
    }
}
