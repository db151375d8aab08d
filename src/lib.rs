//! Post-mortem analysis of Go runtime heap dumps.
//!
//! `heaplens` ingests the binary dumps written by the runtime's
//! `WriteHeapDump` and answers the questions that matter after the fact:
//! which types hold the live bytes, what keeps an object alive, and what
//! each object retains. The crate is split into a streaming decoder for
//! the tagged-record dump format, a graph-building parser behind a small
//! format registry, and a set of pure graph algorithms (reverse edges,
//! paths to roots, Lengauer-Tarjan dominators, retained sizes, type
//! aggregation) that only ever see the finished [`Graph`].

mod aggregate;
mod codec;
mod dominators;
mod domtree;
mod error;
mod graph;
mod json_stub;
mod parser;
mod paths;
mod records;
mod registry;
mod retained;
mod streaming;

pub use aggregate::{top_types, SortBy, TypeStat};
pub use codec::{
    read_bytes, read_string, read_varint, write_bytes, write_string, write_varint,
    CountingReader, MAX_BYTES_LEN, MAX_STRING_LEN,
};
pub use dominators::dominators;
pub use domtree::{dominator_depth, dominator_path, dominator_tree, is_dominated};
pub use error::{HeapLensError, Result};
pub use graph::{Graph, ObjId, Object, TypeInfo, SUPER_ROOT};
pub use json_stub::JsonParser;
pub use parser::GoHeapParser;
pub use paths::paths_to_roots;
pub use records::{
    AllocSample, DeferRecord, DumpParams, Finalizer, Goroutine, Itab, MemProf, MemProfFrame,
    OsThread, PanicRecord, Record, StackFrame, FIELD_KIND_EFACE, FIELD_KIND_EOL,
    FIELD_KIND_IFACE, FIELD_KIND_PTR, MAX_TAG, TAG_ALLOC_SAMPLE, TAG_BSS, TAG_DATA, TAG_DEFER,
    TAG_EOF, TAG_FINALIZER, TAG_GOROUTINE, TAG_ITAB, TAG_MEM_PROF, TAG_MEM_STATS, TAG_OBJECT,
    TAG_OS_THREAD, TAG_OTHER_ROOT, TAG_PANIC, TAG_PARAMS, TAG_QUEUED_FINALIZER,
    TAG_STACK_FRAME, TAG_TYPE,
};
pub use registry::{DumpFormat, DumpParser, Registry, PREVIEW_LEN};
pub use retained::{retained_size_subset, retained_sizes};
pub use streaming::{
    DumpStream, NullObserver, ParseObserver, RecoveryPolicy, DUMP_HEADER, MIN_READ_BUFFER_SIZE,
    READ_BUFFER_SIZE,
};
