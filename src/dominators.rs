//! Immediate dominators via Lengauer-Tarjan.
//!
//! The graph is augmented with a synthetic super-root that has an edge to
//! every GC root, so multiple roots share a single apex. The returned map
//! holds every object reachable from a root; roots themselves map to
//! [`SUPER_ROOT`]. Unreachable objects are absent.

use std::collections::HashMap;

use crate::graph::{Graph, ObjId, SUPER_ROOT};

const UNDEF: usize = usize::MAX;

/// Compute immediate dominators for every reachable object.
///
/// Runs the Lengauer-Tarjan algorithm with a path-compressing link-eval
/// forest: a DFS from the super-root numbers the reachable vertices,
/// semidominators are computed in reverse DFS order, and deferred
/// (`samedom`) entries are settled in a final forward pass.
pub fn dominators(g: &Graph) -> HashMap<ObjId, ObjId> {
    let n = g.len();
    if n == 0 || g.roots().is_empty() {
        return HashMap::new();
    }

    // Vertex universe: arena slots 0..n for objects, slot n for the
    // super-root. Forward and reverse adjacency in slot space.
    let super_slot = n;
    let mut succ: Vec<Vec<usize>> = vec![Vec::new(); n + 1];
    let mut pred: Vec<Vec<usize>> = vec![Vec::new(); n + 1];
    for (slot, obj) in g.iter().enumerate() {
        for &target in &obj.ptrs {
            if let Some(t) = g.slot(target) {
                succ[slot].push(t);
                pred[t].push(slot);
            }
        }
    }
    for &root in g.roots() {
        if let Some(r) = g.slot(root) {
            succ[super_slot].push(r);
            pred[r].push(super_slot);
        }
    }

    // DFS preorder from the super-root.
    let mut dfnum = vec![UNDEF; n + 1];
    let mut vertex = Vec::with_capacity(n + 1); // preorder number -> slot
    let mut parent = vec![UNDEF; n + 1]; // slot -> spanning-tree parent slot
    let mut stack: Vec<(usize, usize)> = Vec::new();
    dfnum[super_slot] = 0;
    vertex.push(super_slot);
    stack.push((super_slot, 0));
    while let Some(&(v, edge)) = stack.last() {
        if edge == succ[v].len() {
            stack.pop();
            continue;
        }
        if let Some(top) = stack.last_mut() {
            top.1 += 1;
        }
        let w = succ[v][edge];
        if dfnum[w] == UNDEF {
            dfnum[w] = vertex.len();
            vertex.push(w);
            parent[w] = v;
            stack.push((w, 0));
        }
    }
    let count = vertex.len();

    // Link-eval forest state, all indexed by slot.
    let mut semi = vec![UNDEF; n + 1]; // slot -> semidominator slot
    let mut ancestor = vec![UNDEF; n + 1];
    let mut best: Vec<usize> = (0..=n).collect();
    let mut samedom = vec![UNDEF; n + 1];
    let mut idom = vec![UNDEF; n + 1];
    let mut bucket: Vec<Vec<usize>> = vec![Vec::new(); n + 1];

    // Path compression: walk the ancestor chain once, then fold the best
    // semidominator back down. Iterative so deep spanning trees cannot
    // overflow the call stack.
    fn eval(
        v: usize,
        ancestor: &mut [usize],
        best: &mut [usize],
        semi: &[usize],
        dfnum: &[usize],
    ) -> usize {
        if ancestor[v] == UNDEF {
            return v;
        }
        let mut chain = Vec::new();
        let mut x = v;
        while ancestor[ancestor[x]] != UNDEF {
            chain.push(x);
            x = ancestor[x];
        }
        for &y in chain.iter().rev() {
            let a = ancestor[y];
            if dfnum[semi[best[a]]] < dfnum[semi[best[y]]] {
                best[y] = best[a];
            }
            ancestor[y] = ancestor[a];
        }
        best[v]
    }

    // Semidominators, processed in reverse preorder.
    for i in (1..count).rev() {
        let w = vertex[i];
        let p = parent[w];
        let mut s = p;
        for &v in &pred[w] {
            if dfnum[v] == UNDEF {
                continue; // predecessor not reachable from any root
            }
            let candidate = if dfnum[v] <= dfnum[w] {
                v
            } else {
                semi[eval(v, &mut ancestor, &mut best, &semi, &dfnum)]
            };
            if dfnum[candidate] < dfnum[s] {
                s = candidate;
            }
        }
        semi[w] = s;
        bucket[s].push(w);
        ancestor[w] = p; // link w into the forest under its parent

        for v in std::mem::take(&mut bucket[p]) {
            let y = eval(v, &mut ancestor, &mut best, &semi, &dfnum);
            if semi[y] == semi[v] {
                idom[v] = p;
            } else {
                samedom[v] = y;
            }
        }
    }

    // Settle deferred vertices in preorder.
    for i in 1..count {
        let w = vertex[i];
        if samedom[w] != UNDEF {
            idom[w] = idom[samedom[w]];
        }
    }

    let mut result = HashMap::with_capacity(count - 1);
    for &w in vertex.iter().skip(1) {
        let d = idom[w];
        let dom_id = if d == super_slot {
            SUPER_ROOT
        } else {
            g.by_slot(d).id
        };
        result.insert(g.by_slot(w).id, dom_id);
    }
    result
}
