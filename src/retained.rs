//! Retained sizes from the dominator tree.
//!
//! The retained size of an object is the memory that becomes collectable
//! if the object goes away: its own size plus the retained sizes of
//! everything it immediately dominates.

use std::collections::HashMap;

use crate::dominators::dominators;
use crate::domtree::dominator_tree;
use crate::graph::{Graph, ObjId, SUPER_ROOT};

fn self_size(g: &Graph, id: ObjId) -> u64 {
    if id == SUPER_ROOT {
        return 0;
    }
    g.get(id).map(|o| o.size).unwrap_or(0)
}

/// Post-order subtree sum with memoization. Iterative: the dominator
/// tree of a deep linked list is itself deep.
fn subtree_sum(
    g: &Graph,
    tree: &HashMap<ObjId, Vec<ObjId>>,
    memo: &mut HashMap<ObjId, u64>,
    start: ObjId,
) -> u64 {
    if let Some(&size) = memo.get(&start) {
        return size;
    }
    let mut stack = vec![(start, false)];
    while let Some((node, expanded)) = stack.pop() {
        if memo.contains_key(&node) {
            continue;
        }
        let children = tree.get(&node).map(Vec::as_slice).unwrap_or(&[]);
        if expanded {
            let mut total = self_size(g, node);
            for child in children {
                total += memo.get(child).copied().unwrap_or(0);
            }
            memo.insert(node, total);
        } else {
            stack.push((node, true));
            for &child in children {
                if !memo.contains_key(&child) {
                    stack.push((child, false));
                }
            }
        }
    }
    memo.get(&start).copied().unwrap_or(0)
}

/// Retained size of every reachable object. Unreachable objects are
/// absent; the super-root is stripped from the result.
pub fn retained_sizes(g: &Graph) -> HashMap<ObjId, u64> {
    let idom = dominators(g);
    let tree = dominator_tree(&idom);
    let mut memo = HashMap::with_capacity(tree.len());
    subtree_sum(g, &tree, &mut memo, SUPER_ROOT);
    memo.remove(&SUPER_ROOT);
    memo
}

/// Retained sizes for just the requested objects, sharing one memo
/// across the batch. Ids that are unknown or unreachable are omitted.
pub fn retained_size_subset(g: &Graph, targets: &[ObjId]) -> HashMap<ObjId, u64> {
    if targets.is_empty() {
        return HashMap::new();
    }
    let idom = dominators(g);
    let tree = dominator_tree(&idom);
    let mut memo = HashMap::new();
    let mut result = HashMap::with_capacity(targets.len());
    for &target in targets {
        if target == SUPER_ROOT || !idom.contains_key(&target) {
            continue;
        }
        result.insert(target, subtree_sum(g, &tree, &mut memo, target));
    }
    result
}
