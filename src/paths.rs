//! K shortest paths from an object back to the GC roots.

use std::collections::{HashSet, VecDeque};

use crate::graph::{Graph, ObjId};

/// Find up to `max_paths` shortest paths from `from` to any root,
/// walking reverse edges breadth-first.
///
/// Each returned path runs `[from, ..., root]`: every adjacent pair
/// `(a, b)` has `b` pointing at `a`, and the last element is a root.
/// FIFO expansion makes the first paths emitted the shortest ones. A
/// predecessor already on the partial path is skipped, so no path
/// repeats an id and cycles terminate.
///
/// A `from` that is itself a root yields the single path `[from]`. An
/// unknown or unreachable `from` yields nothing.
pub fn paths_to_roots(g: &Graph, from: ObjId, max_paths: usize) -> Vec<Vec<ObjId>> {
    if max_paths == 0 || !g.contains(from) {
        return Vec::new();
    }

    let root_set: HashSet<ObjId> = g.roots().iter().copied().collect();
    if root_set.contains(&from) {
        return vec![vec![from]];
    }

    let mut result = Vec::new();
    let mut queue: VecDeque<Vec<ObjId>> = VecDeque::new();
    queue.push_back(vec![from]);

    while let Some(path) = queue.pop_front() {
        if result.len() >= max_paths {
            break;
        }
        let tail = *path.last().expect("paths are never empty");
        for &referrer in g.referrers(tail) {
            if path.contains(&referrer) {
                continue;
            }
            let mut extended = Vec::with_capacity(path.len() + 1);
            extended.extend_from_slice(&path);
            extended.push(referrer);
            if root_set.contains(&referrer) {
                result.push(extended);
                if result.len() >= max_paths {
                    break;
                }
            } else {
                queue.push_back(extended);
            }
        }
    }

    result
}
