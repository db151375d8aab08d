//! Tagged-record schemas for the `go1.7 heap dump` format.
//!
//! Every record starts with a varint tag. The schemas below follow
//! `runtime/heapdump.go`. All record kinds decode into typed values;
//! the graph-building layer only consumes objects, types, and the
//! root-bearing records, but consumers of the raw stream get the rest
//! (finalizers, profiling buckets, goroutine state) as well. MemStats
//! is the one exception: its 61 counters are read to keep the stream
//! aligned and then discarded.

use std::io::BufRead;

use crate::codec::{read_bytes, read_string, read_varint};
use crate::error::{HeapLensError, Result};

pub const TAG_EOF: u64 = 0;
pub const TAG_OBJECT: u64 = 1;
pub const TAG_OTHER_ROOT: u64 = 2;
pub const TAG_TYPE: u64 = 3;
pub const TAG_GOROUTINE: u64 = 4;
pub const TAG_STACK_FRAME: u64 = 5;
pub const TAG_PARAMS: u64 = 6;
pub const TAG_FINALIZER: u64 = 7;
pub const TAG_ITAB: u64 = 8;
pub const TAG_OS_THREAD: u64 = 9;
pub const TAG_MEM_STATS: u64 = 10;
pub const TAG_QUEUED_FINALIZER: u64 = 11;
pub const TAG_DATA: u64 = 12;
pub const TAG_BSS: u64 = 13;
pub const TAG_DEFER: u64 = 14;
pub const TAG_PANIC: u64 = 15;
pub const TAG_MEM_PROF: u64 = 16;
pub const TAG_ALLOC_SAMPLE: u64 = 17;

/// Highest tag value the decoder recognizes.
pub const MAX_TAG: u64 = TAG_ALLOC_SAMPLE;

pub const FIELD_KIND_EOL: u64 = 0;
pub const FIELD_KIND_PTR: u64 = 1;
pub const FIELD_KIND_IFACE: u64 = 2;
pub const FIELD_KIND_EFACE: u64 = 3;

const MEM_STATS_FIELDS: usize = 61;

/// Dump-wide parameters from the Params record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpParams {
    pub big_endian: bool,
    pub ptr_size: u64,
    pub heap_start: u64,
    pub heap_end: u64,
    pub arch: String,
    pub go_version: String,
    pub ncpu: u64,
}

/// Goroutine state carried by a goroutine record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Goroutine {
    pub addr: u64,
    pub sp: u64,
    pub id: u64,
    pub status: u64,
    pub is_system: bool,
    pub is_background: bool,
    pub wait_since: u64,
    pub wait_reason: String,
    pub ctxt: u64,
    pub m: u64,
    pub defer: u64,
    pub panic: u64,
}

/// One frame of a goroutine stack, pointer fields already resolved
/// against the frame data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    pub sp: u64,
    pub depth: u64,
    pub child_sp: u64,
    pub data: Vec<u8>,
    pub entry_pc: u64,
    pub pc: u64,
    pub cont_pc: u64,
    pub name: String,
    pub ptrs: Vec<u64>,
}

/// Registered or queued finalizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finalizer {
    /// True for the queued-finalizer record kind.
    pub queued: bool,
    pub object: u64,
    pub function: u64,
    pub func_val: u64,
    pub func_type: u64,
    pub obj_type: u64,
}

/// Interface table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Itab {
    pub interface: u64,
    pub typ: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OsThread {
    pub id: u64,
    pub os_thread_id: u64,
    pub go_id: u64,
}

/// One frame of a memory-profile stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemProfFrame {
    pub function: String,
    pub file: String,
    pub line: u64,
}

/// Memory-profile bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemProf {
    pub bucket_id: u64,
    pub size: u64,
    pub stack: Vec<MemProfFrame>,
    pub allocs: u64,
    pub frees: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocSample {
    pub address: u64,
    pub profile: u64,
    pub size: u64,
    pub num_alloc: u64,
    pub num_free: u64,
}

/// Deferred call record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeferRecord {
    pub addr: u64,
    pub gp: u64,
    pub argp: u64,
    pub pc: u64,
    pub func: u64,
    pub func_entry: u64,
    pub link: u64,
}

/// In-flight panic record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanicRecord {
    pub addr: u64,
    pub gp: u64,
    pub typ: u64,
    pub data: u64,
    pub defer: u64,
    pub link: u64,
}

/// One decoded record, with pointer fields already resolved to the
/// pointer values stored in the payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Params(DumpParams),
    Type {
        addr: u64,
        size: u64,
        name: String,
        indirect: bool,
    },
    /// A heap object. `type_addr` is the pointer value stored in the
    /// first `ptr_size` bytes of the contents; `ptrs` holds the non-null
    /// pointer values loaded from each declared pointer field.
    Object {
        addr: u64,
        type_addr: Option<u64>,
        contents: Vec<u8>,
        ptrs: Vec<u64>,
    },
    /// A non-goroutine GC root.
    Root { description: String, pointer: u64 },
    Goroutine(Goroutine),
    StackFrame(StackFrame),
    /// A data or BSS segment; `ptrs` are resolved the same way as for
    /// objects.
    Segment { addr: u64, ptrs: Vec<u64> },
    Finalizer(Finalizer),
    Itab(Itab),
    OsThread(OsThread),
    MemProf(MemProf),
    AllocSample(AllocSample),
    Defer(DeferRecord),
    Panic(PanicRecord),
    Eof,
}

/// Load the pointer value stored at `offset` in `data`, honoring the
/// dump's endianness and pointer width. Returns `None` when the field
/// lies outside the payload or the width is unsupported.
pub fn load_pointer(data: &[u8], offset: u64, params: &DumpParams) -> Option<u64> {
    let start = usize::try_from(offset).ok()?;
    let end = start.checked_add(usize::try_from(params.ptr_size).ok()?)?;
    let raw = data.get(start..end)?;
    match params.ptr_size {
        8 => {
            let bytes: [u8; 8] = raw.try_into().ok()?;
            Some(if params.big_endian {
                u64::from_be_bytes(bytes)
            } else {
                u64::from_le_bytes(bytes)
            })
        }
        4 => {
            let bytes: [u8; 4] = raw.try_into().ok()?;
            Some(u64::from(if params.big_endian {
                u32::from_be_bytes(bytes)
            } else {
                u32::from_le_bytes(bytes)
            }))
        }
        _ => None,
    }
}

/// Read a `{kind, offset}` field list and resolve the pointer fields
/// against `data`. Interface and empty-interface markers (and any other
/// nonzero kind) consume their offset and contribute nothing.
fn read_pointer_fields<R: BufRead>(
    r: &mut R,
    data: &[u8],
    params: Option<&DumpParams>,
) -> Result<Vec<u64>> {
    let mut ptrs = Vec::new();
    loop {
        let kind = read_varint(r)?;
        if kind == FIELD_KIND_EOL {
            return Ok(ptrs);
        }
        let offset = read_varint(r)?;
        if kind != FIELD_KIND_PTR {
            continue;
        }
        if let Some(params) = params {
            if let Some(ptr) = load_pointer(data, offset, params) {
                if ptr != 0 {
                    ptrs.push(ptr);
                }
            }
        }
    }
}

pub fn decode_params<R: BufRead>(r: &mut R) -> Result<DumpParams> {
    let big_endian = read_varint(r)? != 0;
    let ptr_size = read_varint(r)?;
    let heap_start = read_varint(r)?;
    let heap_end = read_varint(r)?;
    let arch = read_string(r)?;
    let go_version = read_string(r)?;
    let ncpu = read_varint(r)?;
    Ok(DumpParams {
        big_endian,
        ptr_size,
        heap_start,
        heap_end,
        arch,
        go_version,
        ncpu,
    })
}

fn decode_type<R: BufRead>(r: &mut R) -> Result<Record> {
    let addr = read_varint(r)?;
    let size = read_varint(r)?;
    let name = read_string(r)?;
    let indirect = read_varint(r)? != 0;
    Ok(Record::Type {
        addr,
        size,
        name,
        indirect,
    })
}

fn decode_object<R: BufRead>(r: &mut R, params: Option<&DumpParams>) -> Result<Record> {
    let addr = read_varint(r)?;
    let contents = read_bytes(r)?;
    let type_addr = params
        .and_then(|p| load_pointer(&contents, 0, p))
        .filter(|&a| a != 0);
    let ptrs = read_pointer_fields(r, &contents, params)?;
    Ok(Record::Object {
        addr,
        type_addr,
        contents,
        ptrs,
    })
}

fn decode_root<R: BufRead>(r: &mut R) -> Result<Record> {
    let description = read_string(r)?;
    let pointer = read_varint(r)?;
    Ok(Record::Root {
        description,
        pointer,
    })
}

fn decode_goroutine<R: BufRead>(r: &mut R) -> Result<Record> {
    let addr = read_varint(r)?;
    let sp = read_varint(r)?;
    let id = read_varint(r)?;
    let status = read_varint(r)?;
    let is_system = read_varint(r)? != 0;
    let is_background = read_varint(r)? != 0;
    let wait_since = read_varint(r)?;
    let wait_reason = read_string(r)?;
    let ctxt = read_varint(r)?;
    let m = read_varint(r)?;
    let defer = read_varint(r)?;
    let panic = read_varint(r)?;
    Ok(Record::Goroutine(Goroutine {
        addr,
        sp,
        id,
        status,
        is_system,
        is_background,
        wait_since,
        wait_reason,
        ctxt,
        m,
        defer,
        panic,
    }))
}

fn decode_stack_frame<R: BufRead>(r: &mut R, params: Option<&DumpParams>) -> Result<Record> {
    let sp = read_varint(r)?;
    let depth = read_varint(r)?;
    let child_sp = read_varint(r)?;
    let data = read_bytes(r)?;
    let entry_pc = read_varint(r)?;
    let pc = read_varint(r)?;
    let cont_pc = read_varint(r)?;
    let name = read_string(r)?;
    let ptrs = read_pointer_fields(r, &data, params)?;
    Ok(Record::StackFrame(StackFrame {
        sp,
        depth,
        child_sp,
        data,
        entry_pc,
        pc,
        cont_pc,
        name,
        ptrs,
    }))
}

fn decode_segment<R: BufRead>(r: &mut R, params: Option<&DumpParams>) -> Result<Record> {
    let addr = read_varint(r)?;
    let data = read_bytes(r)?;
    let ptrs = read_pointer_fields(r, &data, params)?;
    Ok(Record::Segment { addr, ptrs })
}

fn decode_finalizer<R: BufRead>(r: &mut R, queued: bool) -> Result<Record> {
    let object = read_varint(r)?;
    let function = read_varint(r)?;
    let func_val = read_varint(r)?;
    let func_type = read_varint(r)?;
    let obj_type = read_varint(r)?;
    Ok(Record::Finalizer(Finalizer {
        queued,
        object,
        function,
        func_val,
        func_type,
        obj_type,
    }))
}

fn decode_itab<R: BufRead>(r: &mut R) -> Result<Record> {
    let interface = read_varint(r)?;
    let typ = read_varint(r)?;
    Ok(Record::Itab(Itab { interface, typ }))
}

fn decode_os_thread<R: BufRead>(r: &mut R) -> Result<Record> {
    let id = read_varint(r)?;
    let os_thread_id = read_varint(r)?;
    let go_id = read_varint(r)?;
    Ok(Record::OsThread(OsThread {
        id,
        os_thread_id,
        go_id,
    }))
}

fn decode_mem_prof<R: BufRead>(r: &mut R) -> Result<Record> {
    let bucket_id = read_varint(r)?;
    let size = read_varint(r)?;
    let nstk = read_varint(r)?;
    let mut stack = Vec::new();
    for _ in 0..nstk {
        let function = read_string(r)?;
        let file = read_string(r)?;
        let line = read_varint(r)?;
        stack.push(MemProfFrame {
            function,
            file,
            line,
        });
    }
    let allocs = read_varint(r)?;
    let frees = read_varint(r)?;
    Ok(Record::MemProf(MemProf {
        bucket_id,
        size,
        stack,
        allocs,
        frees,
    }))
}

fn decode_alloc_sample<R: BufRead>(r: &mut R) -> Result<Record> {
    let address = read_varint(r)?;
    let profile = read_varint(r)?;
    let size = read_varint(r)?;
    let num_alloc = read_varint(r)?;
    let num_free = read_varint(r)?;
    Ok(Record::AllocSample(AllocSample {
        address,
        profile,
        size,
        num_alloc,
        num_free,
    }))
}

fn decode_defer<R: BufRead>(r: &mut R) -> Result<Record> {
    let addr = read_varint(r)?;
    let gp = read_varint(r)?;
    let argp = read_varint(r)?;
    let pc = read_varint(r)?;
    let func = read_varint(r)?;
    let func_entry = read_varint(r)?;
    let link = read_varint(r)?;
    Ok(Record::Defer(DeferRecord {
        addr,
        gp,
        argp,
        pc,
        func,
        func_entry,
        link,
    }))
}

fn decode_panic<R: BufRead>(r: &mut R) -> Result<Record> {
    let addr = read_varint(r)?;
    let gp = read_varint(r)?;
    let typ = read_varint(r)?;
    let data = read_varint(r)?;
    let defer = read_varint(r)?;
    let link = read_varint(r)?;
    Ok(Record::Panic(PanicRecord {
        addr,
        gp,
        typ,
        data,
        defer,
        link,
    }))
}

fn skip_mem_stats<R: BufRead>(r: &mut R) -> Result<()> {
    for _ in 0..MEM_STATS_FIELDS {
        read_varint(r)?;
    }
    Ok(())
}

/// Decode the record for `tag`, which must already have been read.
///
/// Returns `Ok(None)` for MemStats, which is recognized and discarded.
/// `tag` must be in the recognized range; unknown tags are the stream
/// driver's problem.
pub fn decode_record<R: BufRead>(
    r: &mut R,
    tag: u64,
    params: Option<&DumpParams>,
) -> Result<Option<Record>> {
    match tag {
        TAG_EOF => Ok(Some(Record::Eof)),
        TAG_OBJECT => decode_object(r, params).map(Some),
        TAG_OTHER_ROOT => decode_root(r).map(Some),
        TAG_TYPE => decode_type(r).map(Some),
        TAG_GOROUTINE => decode_goroutine(r).map(Some),
        TAG_STACK_FRAME => decode_stack_frame(r, params).map(Some),
        TAG_PARAMS => decode_params(r).map(|p| Some(Record::Params(p))),
        TAG_FINALIZER => decode_finalizer(r, false).map(Some),
        TAG_QUEUED_FINALIZER => decode_finalizer(r, true).map(Some),
        TAG_ITAB => decode_itab(r).map(Some),
        TAG_OS_THREAD => decode_os_thread(r).map(Some),
        TAG_MEM_STATS => skip_mem_stats(r).map(|_| None),
        TAG_DATA | TAG_BSS => decode_segment(r, params).map(Some),
        TAG_DEFER => decode_defer(r).map(Some),
        TAG_PANIC => decode_panic(r).map(Some),
        TAG_MEM_PROF => decode_mem_prof(r).map(Some),
        TAG_ALLOC_SAMPLE => decode_alloc_sample(r).map(Some),
        _ => Err(HeapLensError::UnknownTag(tag)),
    }
}
