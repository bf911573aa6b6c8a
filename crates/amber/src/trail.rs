//! Trails: the coordinate system for AST positions.
//!
//! A trail is the path of object keys and array indices leading from a root
//! node to a descendant. Trails recorded during pass 1 are *absolute* (from
//! the file's program node); the serialized per-function records use
//! *function-relative* trails, produced by stripping the owning function's
//! own trail prefix. Because trails address positions rather than nodes,
//! they survive the node being detached and reattached, and they are the
//! only way pass 2 reaches back into the tree.

use std::borrow::Cow;

use serde::{Serialize, Serializer};
use serde_json::Value;
use smallvec::SmallVec;

/// One step of a trail: an object key or an array index.
///
/// Keys are almost always `&'static str` literals pushed by the visitors;
/// the `Cow` covers the generic traversal fallback, which walks keys read
/// from the tree itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrailKey {
    Key(Cow<'static, str>),
    Index(usize),
}

impl TrailKey {
    pub(crate) fn key(k: &'static str) -> Self {
        Self::Key(Cow::Borrowed(k))
    }

    pub(crate) fn key_owned(k: String) -> Self {
        Self::Key(Cow::Owned(k))
    }
}

impl Serialize for TrailKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Key(k) => serializer.serialize_str(k),
            Self::Index(i) => serializer.serialize_u64(*i as u64),
        }
    }
}

/// A path of [`TrailKey`]s. Most trails are short; eight inline slots cover
/// typical nesting without heap allocation.
pub type Trail = SmallVec<[TrailKey; 8]>;

/// Follows `trail` downward from `root`, immutably.
pub(crate) fn get<'a>(root: &'a Value, trail: &[TrailKey]) -> Option<&'a Value> {
    let mut node = root;
    for step in trail {
        node = match step {
            TrailKey::Key(k) => node.get(k.as_ref())?,
            TrailKey::Index(i) => node.get(*i)?,
        };
    }
    Some(node)
}

/// Follows `trail` downward from `root`, mutably.
pub(crate) fn get_mut<'a>(root: &'a mut Value, trail: &[TrailKey]) -> Option<&'a mut Value> {
    let mut node = root;
    for step in trail {
        node = match step {
            TrailKey::Key(k) => node.get_mut(k.as_ref())?,
            TrailKey::Index(i) => node.get_mut(*i)?,
        };
    }
    Some(node)
}

/// Removes the subtree at `trail`, leaving `Value::Null` in its place.
///
/// This is the detachment primitive: a detached function's slot reads as
/// `null` while its parent is serialized, and the subtree is reinserted at
/// the same trail afterwards.
pub(crate) fn take(root: &mut Value, trail: &[TrailKey]) -> Option<Value> {
    get_mut(root, trail).map(std::mem::take)
}

/// Reinserts `value` at `trail`. Returns false when the position no longer
/// exists, which indicates a trail-discipline bug in the caller.
#[must_use]
pub(crate) fn set(root: &mut Value, trail: &[TrailKey], value: Value) -> bool {
    match get_mut(root, trail) {
        Some(slot) => {
            *slot = value;
            true
        }
        None => false,
    }
}

/// Strips `prefix` from `trail`, yielding the function-relative remainder.
///
/// Returns `None` when `trail` does not lie under `prefix`; resolution never
/// records a use site outside the function that owns it, so callers treat
/// that as a bug.
pub(crate) fn strip_prefix<'a>(trail: &'a [TrailKey], prefix: &[TrailKey]) -> Option<&'a [TrailKey]> {
    if trail.len() < prefix.len() || &trail[..prefix.len()] != prefix {
        return None;
    }
    Some(&trail[prefix.len()..])
}

/// Serializes a relative trail as the mixed string/index array used in the
/// emitted function-info JSON, e.g. `["body", 0, "declarations", 0, "init"]`.
pub(crate) fn to_json(trail: &[TrailKey]) -> Value {
    Value::Array(
        trail
            .iter()
            .map(|step| match step {
                TrailKey::Key(k) => Value::String(k.clone().into_owned()),
                TrailKey::Index(i) => Value::from(*i),
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn trail(steps: &[&str]) -> Trail {
        steps
            .iter()
            .map(|s| match s.parse::<usize>() {
                Ok(i) => TrailKey::Index(i),
                Err(_) => TrailKey::key_owned((*s).to_owned()),
            })
            .collect()
    }

    #[test]
    fn get_follows_keys_and_indices() {
        let tree = json!({"body": [{"init": {"name": "x"}}]});
        let t = trail(&["body", "0", "init", "name"]);
        assert_eq!(get(&tree, &t), Some(&json!("x")));
    }

    #[test]
    fn take_leaves_null_and_set_restores() {
        let mut tree = json!({"body": [{"name": "x"}]});
        let t = trail(&["body", "0"]);
        let taken = take(&mut tree, &t).unwrap();
        assert_eq!(tree, json!({"body": [null]}));
        assert!(set(&mut tree, &t, taken));
        assert_eq!(tree, json!({"body": [{"name": "x"}]}));
    }

    #[test]
    fn strip_prefix_requires_containment() {
        let outer = trail(&["body", "0"]);
        let inner = trail(&["body", "0", "init"]);
        assert_eq!(strip_prefix(&inner, &outer), Some(&inner[2..]));
        assert_eq!(strip_prefix(&outer, &inner), None);
        let sibling = trail(&["body", "1", "init"]);
        assert_eq!(strip_prefix(&sibling, &outer), None);
    }
}
