//! In-memory heap object graph.
//!
//! The graph owns an arena of objects plus the root multiset and the
//! type table. Edges are object ids, not references, so cyclic heaps
//! need no special ownership treatment. Once constructed the graph is
//! immutable; the reverse-edge index is built lazily on first use and
//! shared by every reader.

use std::collections::HashMap;
use std::sync::OnceLock;

/// Identifier of a heap object. The binary parser assigns ids densely in
/// first-seen order starting at 0; fixture adapters may supply sparse ids.
pub type ObjId = u64;

/// Synthetic super-root id used by the dominator computation. Disjoint
/// from every real object id.
pub const SUPER_ROOT: ObjId = u64::MAX;

/// A single heap object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Object {
    pub id: ObjId,
    /// Interned type name; empty when the dump had no type for it.
    pub type_name: String,
    /// Self size in bytes.
    pub size: u64,
    /// Outgoing pointers. Duplicates and self-references are allowed;
    /// every entry resolves to an object in the same graph.
    pub ptrs: Vec<ObjId>,
}

/// Type record carried through from the dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInfo {
    /// Address of the type descriptor in the source dump.
    pub address: u64,
    pub size: u64,
    pub name: String,
    /// Indirect flag from the dump; stored but not interpreted.
    pub indirect: bool,
}

/// Immutable heap object graph.
#[derive(Debug, Default)]
pub struct Graph {
    objects: Vec<Object>,
    by_id: HashMap<ObjId, u32>,
    roots: Vec<ObjId>,
    types: HashMap<u64, TypeInfo>,
    reverse: OnceLock<Vec<Vec<ObjId>>>,
}

impl Graph {
    /// Build a graph from parsed parts.
    ///
    /// Pointers and roots that name an id with no backing object are
    /// dropped here, silently; afterwards every id in the graph resolves.
    /// The first object wins when two share an id.
    pub fn new(objects: Vec<Object>, roots: Vec<ObjId>, types: HashMap<u64, TypeInfo>) -> Self {
        let mut arena: Vec<Object> = Vec::with_capacity(objects.len());
        let mut by_id: HashMap<ObjId, u32> = HashMap::with_capacity(objects.len());
        for obj in objects {
            if by_id.contains_key(&obj.id) {
                continue;
            }
            by_id.insert(obj.id, arena.len() as u32);
            arena.push(obj);
        }
        for obj in &mut arena {
            obj.ptrs.retain(|p| by_id.contains_key(p));
        }
        let roots = roots
            .into_iter()
            .filter(|r| by_id.contains_key(r))
            .collect();
        Self {
            objects: arena,
            by_id,
            roots,
            types,
            reverse: OnceLock::new(),
        }
    }

    /// Number of objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Look up an object by id.
    pub fn get(&self, id: ObjId) -> Option<&Object> {
        self.by_id
            .get(&id)
            .map(|&slot| &self.objects[slot as usize])
    }

    pub fn contains(&self, id: ObjId) -> bool {
        self.by_id.contains_key(&id)
    }

    /// Iterate objects in insertion order (id order for parsed dumps).
    pub fn iter(&self) -> impl Iterator<Item = &Object> {
        self.objects.iter()
    }

    /// Root ids. A multiset: duplicates are retained.
    pub fn roots(&self) -> &[ObjId] {
        &self.roots
    }

    /// Type table keyed by descriptor address.
    pub fn types(&self) -> &HashMap<u64, TypeInfo> {
        &self.types
    }

    /// Arena slot for an id. Slots are dense even when ids are not,
    /// which is what the graph algorithms index by.
    pub(crate) fn slot(&self, id: ObjId) -> Option<usize> {
        self.by_id.get(&id).map(|&s| s as usize)
    }

    pub(crate) fn by_slot(&self, slot: usize) -> &Object {
        &self.objects[slot]
    }

    /// Objects pointing at `id`. Builds the reverse index on first call;
    /// concurrent first callers race to build but all observe one result.
    pub fn referrers(&self, id: ObjId) -> &[ObjId] {
        match self.slot(id) {
            Some(slot) => &self.reverse_index()[slot],
            None => &[],
        }
    }

    /// Reverse adjacency indexed by arena slot.
    pub(crate) fn reverse_index(&self) -> &Vec<Vec<ObjId>> {
        self.reverse.get_or_init(|| {
            let mut reverse = vec![Vec::new(); self.objects.len()];
            for obj in &self.objects {
                for &target in &obj.ptrs {
                    if let Some(slot) = self.slot(target) {
                        reverse[slot].push(obj.id);
                    }
                }
            }
            reverse
        })
    }
}
