//! Process-wide operand cache.
//!
//! Maps the [`CacheKey`] of every live node to a weak handle on it. Lookups
//! upgrade the handle, so a node is shared for as long as someone holds it and
//! its entry disappears when the last strong handle is dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock, Weak};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::trace;

use crate::ast::{Arg, Ast, CacheKey, Node};
use crate::op::{Op, Sort};

static NODES: LazyLock<DashMap<CacheKey, Weak<Node>>> = LazyLock::new(DashMap::new);
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Return the live node for `(op, sort, args)`, creating it if needed.
///
/// Concurrent callers racing on the same key all receive the node of the
/// first writer; losing candidates are discarded.
pub(crate) fn intern(op: Op, sort: Sort, args: Vec<Arg>) -> Ast {
    let key = CacheKey::new(op, sort, &args);

    if let Some(node) = NODES.get(&key).and_then(|entry| entry.upgrade()) {
        trace!("intern: hit {} #{}", op, node.id());
        return Ast::from_node(node);
    }

    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    let candidate = Arc::new(Node::new(id, op, sort, args, key.clone()));

    // The shard lock is held only inside this match; the losing candidate is
    // dropped after it is released.
    let winner = match NODES.entry(key) {
        Entry::Occupied(mut entry) => match entry.get().upgrade() {
            Some(existing) => existing,
            None => {
                entry.insert(Arc::downgrade(&candidate));
                candidate.clone()
            }
        },
        Entry::Vacant(entry) => {
            entry.insert(Arc::downgrade(&candidate));
            candidate.clone()
        }
    };

    trace!("intern: {} #{}", op, winner.id());
    drop(candidate);
    Ast::from_node(winner)
}

/// Drop the entry for `key` unless it has been re-registered by a live node.
pub(crate) fn release(key: &CacheKey) {
    NODES.remove_if(key, |_, weak| weak.strong_count() == 0);
}

/// Number of entries currently registered in the operand cache.
pub fn cached_nodes() -> usize {
    NODES.len()
}

/// Allocate a fresh process-unique number (used for auto-generated names and leaf ids).
pub(crate) fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}
