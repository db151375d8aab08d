//! End-to-end algorithm scenarios over fixture graphs.

use std::collections::HashSet;

use heaplens::{
    dominator_tree, dominators, paths_to_roots, retained_size_subset, retained_sizes, Graph,
    ObjId, Registry, SUPER_ROOT,
};

fn open_json(doc: &str) -> Graph {
    let registry = Registry::with_defaults();
    let (graph, name) = registry.open(doc.as_bytes()).unwrap();
    assert_eq!(name, "json-stub");
    graph
}

/// Assert the structural path invariants: starts at the target, ends at
/// a root, every hop is a real reverse edge, no id repeats.
fn check_paths(g: &Graph, from: ObjId, paths: &[Vec<ObjId>]) {
    let roots: HashSet<ObjId> = g.roots().iter().copied().collect();
    for path in paths {
        assert_eq!(path[0], from);
        assert!(roots.contains(path.last().unwrap()));
        let unique: HashSet<_> = path.iter().collect();
        assert_eq!(unique.len(), path.len(), "path repeats an id: {:?}", path);
        for pair in path.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            assert!(
                g.get(b).unwrap().ptrs.contains(&a),
                "{} does not point at {}",
                b,
                a
            );
        }
    }
}

#[test]
fn linear_chain_scenario() {
    let g = open_json(
        r#"{
            "objects": [
                {"id": 1, "type": "root", "size": 100, "ptrs": [2]},
                {"id": 2, "type": "mid", "size": 50, "ptrs": [3]},
                {"id": 3, "type": "leaf", "size": 25, "ptrs": []}
            ],
            "roots": [1]
        }"#,
    );

    let idom = dominators(&g);
    assert_eq!(idom[&1], SUPER_ROOT);
    assert_eq!(idom[&2], 1);
    assert_eq!(idom[&3], 2);

    let retained = retained_sizes(&g);
    assert_eq!(retained[&1], 175);
    assert_eq!(retained[&2], 75);
    assert_eq!(retained[&3], 25);

    let paths = paths_to_roots(&g, 3, 5);
    assert_eq!(paths, vec![vec![3, 2, 1]]);
    check_paths(&g, 3, &paths);
}

#[test]
fn diamond_scenario() {
    let g = open_json(
        r#"{
            "objects": [
                {"id": 1, "type": "root", "size": 100, "ptrs": [2, 3]},
                {"id": 2, "type": "left", "size": 30, "ptrs": [4]},
                {"id": 3, "type": "right", "size": 40, "ptrs": [4]},
                {"id": 4, "type": "join", "size": 20, "ptrs": []}
            ],
            "roots": [1]
        }"#,
    );

    let idom = dominators(&g);
    assert_eq!(idom[&1], SUPER_ROOT);
    assert_eq!(idom[&2], 1);
    assert_eq!(idom[&3], 1);
    assert_eq!(idom[&4], 1, "join node is dominated by the fork, not a branch");

    let retained = retained_sizes(&g);
    assert_eq!(retained[&1], 190);
    assert_eq!(retained[&2], 30);
    assert_eq!(retained[&3], 40);
    assert_eq!(retained[&4], 20);

    let mut paths = paths_to_roots(&g, 4, 5);
    paths.sort();
    assert_eq!(paths, vec![vec![4, 2, 1], vec![4, 3, 1]]);
    check_paths(&g, 4, &paths);
}

#[test]
fn cycle_scenario() {
    let g = open_json(
        r#"{
            "objects": [
                {"id": 1, "type": "root", "size": 10, "ptrs": [2]},
                {"id": 2, "type": "a", "size": 20, "ptrs": [3]},
                {"id": 3, "type": "b", "size": 30, "ptrs": [2, 4]},
                {"id": 4, "type": "leaf", "size": 40, "ptrs": []}
            ],
            "roots": [1]
        }"#,
    );

    let idom = dominators(&g);
    for id in 1..=4 {
        assert!(idom.contains_key(&id), "node {} missing from idom", id);
    }

    let paths = paths_to_roots(&g, 4, 5);
    assert_eq!(paths, vec![vec![4, 3, 2, 1]]);
    check_paths(&g, 4, &paths);

    let retained = retained_sizes(&g);
    assert_eq!(retained[&1], 100);
}

#[test]
fn shared_under_super_root_scenario() {
    let g = open_json(
        r#"{
            "objects": [
                {"id": 1, "type": "r1", "size": 100, "ptrs": [3]},
                {"id": 2, "type": "r2", "size": 200, "ptrs": [3]},
                {"id": 3, "type": "shared", "size": 50, "ptrs": []}
            ],
            "roots": [1, 2]
        }"#,
    );

    let idom = dominators(&g);
    assert_eq!(idom[&3], SUPER_ROOT, "shared node escapes both roots");

    let retained = retained_sizes(&g);
    assert_eq!(retained[&1], 100);
    assert_eq!(retained[&2], 200);
    assert_eq!(retained[&3], 50);

    let mut paths = paths_to_roots(&g, 3, 5);
    paths.sort();
    assert_eq!(paths, vec![vec![3, 1], vec![3, 2]]);
}

#[test]
fn unreachable_node_scenario() {
    let g = open_json(
        r#"{
            "objects": [
                {"id": 1, "type": "root", "size": 100, "ptrs": [2]},
                {"id": 2, "type": "kept", "size": 50, "ptrs": []},
                {"id": 3, "type": "orphan", "size": 75, "ptrs": []}
            ],
            "roots": [1]
        }"#,
    );

    let idom = dominators(&g);
    assert!(!idom.contains_key(&3));
    let retained = retained_sizes(&g);
    assert!(!retained.contains_key(&3));
    assert!(paths_to_roots(&g, 3, 5).is_empty());
}

#[test]
fn self_loop_does_not_hang() {
    let g = open_json(
        r#"{
            "objects": [
                {"id": 1, "type": "root", "size": 10, "ptrs": [2]},
                {"id": 2, "type": "selfy", "size": 20, "ptrs": [2]}
            ],
            "roots": [1]
        }"#,
    );

    let paths = paths_to_roots(&g, 2, 5);
    assert_eq!(paths, vec![vec![2, 1]]);
    let retained = retained_sizes(&g);
    assert_eq!(retained[&2], 20);
    assert_eq!(retained[&1], 30);
}

#[test]
fn object_with_no_pointers_retains_itself() {
    let g = open_json(
        r#"{"objects": [{"id": 5, "type": "lone", "size": 64}], "roots": [5]}"#,
    );
    assert_eq!(retained_sizes(&g)[&5], 64);
}

#[test]
fn paths_cap_bounds_output() {
    // many distinct routes from 9 up to the root
    let g = open_json(
        r#"{
            "objects": [
                {"id": 1, "type": "root", "size": 1, "ptrs": [2, 3, 4, 5]},
                {"id": 2, "type": "", "size": 1, "ptrs": [9]},
                {"id": 3, "type": "", "size": 1, "ptrs": [9]},
                {"id": 4, "type": "", "size": 1, "ptrs": [9]},
                {"id": 5, "type": "", "size": 1, "ptrs": [9]},
                {"id": 9, "type": "", "size": 1, "ptrs": []}
            ],
            "roots": [1]
        }"#,
    );
    for cap in 1..=5 {
        let paths = paths_to_roots(&g, 9, cap);
        assert!(paths.len() <= cap);
        assert_eq!(paths.len(), cap.min(4));
        check_paths(&g, 9, &paths);
    }
}

#[test]
fn dominator_tree_children_are_sorted() {
    let g = open_json(
        r#"{
            "objects": [
                {"id": 1, "type": "root", "size": 1, "ptrs": [4, 2, 3]},
                {"id": 2, "type": "", "size": 1, "ptrs": []},
                {"id": 3, "type": "", "size": 1, "ptrs": []},
                {"id": 4, "type": "", "size": 1, "ptrs": []}
            ],
            "roots": [1]
        }"#,
    );
    let tree = dominator_tree(&dominators(&g));
    assert_eq!(tree[&SUPER_ROOT], vec![1]);
    assert_eq!(tree[&1], vec![2, 3, 4]);
}

#[test]
fn subset_matches_full_computation() {
    let g = open_json(
        r#"{
            "objects": [
                {"id": 1, "type": "root", "size": 100, "ptrs": [2, 3]},
                {"id": 2, "type": "", "size": 30, "ptrs": [4]},
                {"id": 3, "type": "", "size": 40, "ptrs": [4]},
                {"id": 4, "type": "", "size": 20, "ptrs": []}
            ],
            "roots": [1]
        }"#,
    );
    let full = retained_sizes(&g);
    let subset = retained_size_subset(&g, &[2, 4, 777]);
    assert_eq!(subset.len(), 2);
    assert_eq!(subset[&2], full[&2]);
    assert_eq!(subset[&4], full[&4]);
}
