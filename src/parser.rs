//! Graph-building adapter for Go heap dumps.
//!
//! Sits on top of [`DumpStream`] and materializes a [`Graph`]: dense ids
//! in first-seen order, type names stamped from the type table, roots
//! gathered from every root-bearing record kind. Pointers stay raw
//! addresses during the pass because objects may refer forward; the
//! finalization step rewrites them to ids and drops the ones that never
//! resolved.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read};

use crate::error::Result;
use crate::graph::{Graph, ObjId, Object, TypeInfo};
use crate::records::Record;
use crate::registry::DumpParser;
use crate::streaming::{
    DumpStream, NullObserver, ParseObserver, RecoveryPolicy, DUMP_HEADER, READ_BUFFER_SIZE,
};

/// Parser for the `go1.7 heap dump` binary format.
#[derive(Debug, Default)]
pub struct GoHeapParser;

impl GoHeapParser {
    /// Parse a dump with default recovery and no observer.
    pub fn parse<R: BufRead>(&self, reader: R) -> Result<Graph> {
        let mut observer = NullObserver;
        self.parse_with(reader, RecoveryPolicy::default(), &mut observer)
    }

    /// Parse a dump with an explicit recovery policy and observer.
    pub fn parse_with<R: BufRead>(
        &self,
        reader: R,
        policy: RecoveryPolicy,
        observer: &mut dyn ParseObserver,
    ) -> Result<Graph> {
        let mut builder = GraphBuilder::default();
        let stream = DumpStream::new(reader, policy, observer)?;
        for record in stream {
            match record? {
                Record::Eof => break,
                rec => builder.absorb(rec),
            }
        }
        Ok(builder.finish())
    }
}

impl DumpParser for GoHeapParser {
    fn name(&self) -> &str {
        "goheap"
    }

    fn can_parse(&self, preview: &[u8]) -> bool {
        preview.len() >= DUMP_HEADER.len() && &preview[..DUMP_HEADER.len()] == DUMP_HEADER
    }

    fn parse(&self, reader: &mut dyn Read) -> Result<Graph> {
        GoHeapParser::parse(self, BufReader::with_capacity(READ_BUFFER_SIZE, reader))
    }
}

/// Accumulates records, then resolves addresses to ids.
#[derive(Default)]
struct GraphBuilder {
    addr_to_id: HashMap<u64, ObjId>,
    /// Per object: (self size, type address, raw pointer addresses).
    objects: Vec<(u64, Option<u64>, Vec<u64>)>,
    types: HashMap<u64, TypeInfo>,
    root_addrs: Vec<u64>,
}

impl GraphBuilder {
    fn absorb(&mut self, record: Record) {
        match record {
            Record::Object {
                addr,
                type_addr,
                contents,
                ptrs,
            } => {
                // duplicate addresses: first record wins
                if self.addr_to_id.contains_key(&addr) {
                    return;
                }
                self.addr_to_id.insert(addr, self.objects.len() as ObjId);
                self.objects.push((contents.len() as u64, type_addr, ptrs));
            }
            Record::Type {
                addr,
                size,
                name,
                indirect,
            } => {
                self.types.insert(
                    addr,
                    TypeInfo {
                        address: addr,
                        size,
                        name,
                        indirect,
                    },
                );
            }
            Record::Root { pointer, .. } => self.root_addrs.push(pointer),
            Record::Segment { ptrs, .. } => self.root_addrs.extend(ptrs),
            Record::StackFrame(frame) => self.root_addrs.extend(frame.ptrs),
            // goroutine state, finalizers, profiling data, and the rest
            // of the runtime records carry nothing the graph needs
            _ => {}
        }
    }

    /// Rewrite addresses to ids and freeze the graph. Pointers and roots
    /// whose address never appeared as an object are dropped.
    fn finish(self) -> Graph {
        let GraphBuilder {
            addr_to_id,
            objects,
            types,
            root_addrs,
        } = self;

        let resolved: Vec<Object> = objects
            .into_iter()
            .enumerate()
            .map(|(id, (size, type_addr, raw_ptrs))| {
                let type_name = type_addr
                    .and_then(|a| types.get(&a))
                    .map(|t| t.name.clone())
                    .unwrap_or_default();
                let ptrs = raw_ptrs
                    .into_iter()
                    .filter_map(|a| addr_to_id.get(&a).copied())
                    .collect();
                Object {
                    id: id as ObjId,
                    type_name,
                    size,
                    ptrs,
                }
            })
            .collect();

        let roots = root_addrs
            .into_iter()
            .filter_map(|a| addr_to_id.get(&a).copied())
            .collect();

        Graph::new(resolved, roots, types)
    }
}
