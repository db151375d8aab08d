//! Shared fixtures: a binary dump writer and small graph builders.

#![allow(dead_code)]

use std::collections::HashMap;

use heaplens::{
    write_bytes, write_string, write_varint, Graph, ObjId, Object, DUMP_HEADER,
    FIELD_KIND_EOL, FIELD_KIND_PTR, TAG_ALLOC_SAMPLE, TAG_BSS, TAG_DATA, TAG_DEFER, TAG_EOF,
    TAG_FINALIZER, TAG_GOROUTINE, TAG_ITAB, TAG_MEM_PROF, TAG_MEM_STATS, TAG_OBJECT,
    TAG_OS_THREAD, TAG_OTHER_ROOT, TAG_PANIC, TAG_PARAMS, TAG_QUEUED_FINALIZER,
    TAG_STACK_FRAME, TAG_TYPE,
};

/// Emits dumps that follow the `go1.7 heap dump` wire format, record by
/// record. Pointer width and endianness default to amd64 until a params
/// record says otherwise.
pub struct DumpWriter {
    buf: Vec<u8>,
    big_endian: bool,
    ptr_size: u64,
}

impl DumpWriter {
    pub fn new() -> Self {
        Self {
            buf: DUMP_HEADER.to_vec(),
            big_endian: false,
            ptr_size: 8,
        }
    }

    /// A writer that skips the header, for corruption tests.
    pub fn headerless() -> Self {
        Self {
            buf: Vec::new(),
            big_endian: false,
            ptr_size: 8,
        }
    }

    pub fn varint(&mut self, v: u64) -> &mut Self {
        write_varint(&mut self.buf, v);
        self
    }

    pub fn string(&mut self, s: &str) -> &mut Self {
        write_string(&mut self.buf, s);
        self
    }

    pub fn bytes(&mut self, data: &[u8]) -> &mut Self {
        write_bytes(&mut self.buf, data);
        self
    }

    pub fn raw(&mut self, data: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(data);
        self
    }

    pub fn params(&mut self, big_endian: bool, ptr_size: u64) -> &mut Self {
        self.big_endian = big_endian;
        self.ptr_size = ptr_size;
        self.varint(TAG_PARAMS)
            .varint(big_endian as u64)
            .varint(ptr_size)
            .varint(0x1000)
            .varint(0x100000)
            .string("amd64")
            .string("go1.20.0")
            .varint(4)
    }

    pub fn type_record(&mut self, addr: u64, size: u64, name: &str, indirect: bool) -> &mut Self {
        self.varint(TAG_TYPE)
            .varint(addr)
            .varint(size)
            .string(name)
            .varint(indirect as u64)
    }

    /// Encode a pointer-sized word with the current endianness.
    pub fn word(&self, value: u64) -> Vec<u8> {
        match (self.ptr_size, self.big_endian) {
            (8, false) => value.to_le_bytes().to_vec(),
            (8, true) => value.to_be_bytes().to_vec(),
            (4, false) => (value as u32).to_le_bytes().to_vec(),
            (4, true) => (value as u32).to_be_bytes().to_vec(),
            (w, _) => panic!("unsupported pointer width {}", w),
        }
    }

    /// Object contents: type address in word 0, then one word per target.
    pub fn contents(&self, type_addr: u64, targets: &[u64]) -> Vec<u8> {
        let mut data = self.word(type_addr);
        for &t in targets {
            data.extend(self.word(t));
        }
        data
    }

    /// Object record with pointer fields at the given byte offsets.
    pub fn object(&mut self, addr: u64, contents: &[u8], ptr_offsets: &[u64]) -> &mut Self {
        self.varint(TAG_OBJECT).varint(addr).bytes(contents);
        for &off in ptr_offsets {
            self.varint(FIELD_KIND_PTR).varint(off);
        }
        self.varint(FIELD_KIND_EOL)
    }

    /// Object whose contents carry `type_addr` then pointers to
    /// `targets`, each declared as a field.
    pub fn linked_object(&mut self, addr: u64, type_addr: u64, targets: &[u64]) -> &mut Self {
        let contents = self.contents(type_addr, targets);
        let offsets: Vec<u64> = (0..targets.len() as u64).map(|i| (i + 1) * self.ptr_size).collect();
        self.object(addr, &contents, &offsets)
    }

    pub fn other_root(&mut self, description: &str, pointer: u64) -> &mut Self {
        self.varint(TAG_OTHER_ROOT).string(description).varint(pointer)
    }

    pub fn goroutine(&mut self, id: u64, status: u64, wait_reason: &str) -> &mut Self {
        self.varint(TAG_GOROUTINE)
            .varint(0x8000)
            .varint(0xc000)
            .varint(id)
            .varint(status)
            .varint(0)
            .varint(0)
            .varint(0);
        self.string(wait_reason);
        for _ in 0..4 {
            self.varint(0);
        }
        self
    }

    pub fn stack_frame(&mut self, name: &str, data: &[u8], ptr_offsets: &[u64]) -> &mut Self {
        self.varint(TAG_STACK_FRAME)
            .varint(0xc000)
            .varint(0)
            .varint(0xc100)
            .bytes(data)
            .varint(0x4000)
            .varint(0x4010)
            .varint(0)
            .string(name);
        for &off in ptr_offsets {
            self.varint(FIELD_KIND_PTR).varint(off);
        }
        self.varint(FIELD_KIND_EOL)
    }

    pub fn segment(&mut self, tag: u64, addr: u64, data: &[u8], ptr_offsets: &[u64]) -> &mut Self {
        assert!(tag == TAG_DATA || tag == TAG_BSS);
        self.varint(tag).varint(addr).bytes(data);
        for &off in ptr_offsets {
            self.varint(FIELD_KIND_PTR).varint(off);
        }
        self.varint(FIELD_KIND_EOL)
    }

    pub fn finalizer(&mut self, queued: bool) -> &mut Self {
        self.varint(if queued { TAG_QUEUED_FINALIZER } else { TAG_FINALIZER });
        for _ in 0..5 {
            self.varint(0x10);
        }
        self
    }

    pub fn itab(&mut self) -> &mut Self {
        self.varint(TAG_ITAB).varint(0x20).varint(0x30)
    }

    pub fn os_thread(&mut self) -> &mut Self {
        self.varint(TAG_OS_THREAD).varint(1).varint(2).varint(3)
    }

    pub fn mem_stats(&mut self) -> &mut Self {
        self.varint(TAG_MEM_STATS);
        for i in 0..61u64 {
            self.varint(i);
        }
        self
    }

    pub fn defer_record(&mut self) -> &mut Self {
        self.varint(TAG_DEFER);
        for _ in 0..7 {
            self.varint(0x40);
        }
        self
    }

    pub fn panic_record(&mut self) -> &mut Self {
        self.varint(TAG_PANIC);
        for _ in 0..6 {
            self.varint(0x50);
        }
        self
    }

    pub fn mem_prof(&mut self, frames: &[(&str, &str, u64)]) -> &mut Self {
        self.varint(TAG_MEM_PROF)
            .varint(1)
            .varint(64)
            .varint(frames.len() as u64);
        for &(function, file, line) in frames {
            self.string(function).string(file).varint(line);
        }
        self.varint(10).varint(2)
    }

    pub fn alloc_sample(&mut self) -> &mut Self {
        self.varint(TAG_ALLOC_SAMPLE);
        for _ in 0..5 {
            self.varint(0x60);
        }
        self
    }

    /// Terminate with the EOF record and hand back the bytes.
    pub fn eof(&mut self) -> Vec<u8> {
        self.varint(TAG_EOF);
        std::mem::take(&mut self.buf)
    }

    /// The bytes written so far, without an EOF record.
    pub fn into_bytes(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buf)
    }
}

/// Graph literal: `(id, size, ptrs)` triples plus roots.
pub fn mk_graph(objects: &[(ObjId, u64, &[ObjId])], roots: &[ObjId]) -> Graph {
    let objs = objects
        .iter()
        .map(|&(id, size, ptrs)| Object {
            id,
            type_name: String::new(),
            size,
            ptrs: ptrs.to_vec(),
        })
        .collect();
    Graph::new(objs, roots.to_vec(), HashMap::new())
}

/// Address used for object `i` in generated dumps.
pub fn obj_addr(i: usize) -> u64 {
    0x10000 + (i as u64) * 0x100
}

/// Write a whole dump from an adjacency description: object `i` points
/// at the listed object indices, roots are object indices too.
pub fn build_dump(type_name: &str, edges: &[&[usize]], roots: &[usize]) -> Vec<u8> {
    let mut w = DumpWriter::new();
    w.params(false, 8);
    w.type_record(0x1000, 16, type_name, false);
    for (i, targets) in edges.iter().enumerate() {
        let addrs: Vec<u64> = targets.iter().map(|&t| obj_addr(t)).collect();
        w.linked_object(obj_addr(i), 0x1000, &addrs);
    }
    for &r in roots {
        w.other_root("root", obj_addr(r));
    }
    w.eof()
}
