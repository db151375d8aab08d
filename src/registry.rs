//! Format detection and adapter registry.
//!
//! A [`Registry`] is an explicit value, not a process-global: build one at
//! start-up (usually [`Registry::with_defaults`]) and pass it wherever
//! dumps get opened. The built-in adapter set is a closed enum so format
//! dispatch is static; out-of-tree adapters ride along in the `External`
//! variant.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::RwLock;

use memmap2::Mmap;

use crate::error::{HeapLensError, Result};
use crate::graph::Graph;
use crate::json_stub::JsonParser;
use crate::parser::GoHeapParser;

/// Bytes buffered from the front of a dump for format detection.
pub const PREVIEW_LEN: usize = 4096;

/// One registered dump format adapter.
pub trait DumpParser: Send + Sync {
    /// Short stable name, reported back from [`Registry::open`].
    fn name(&self) -> &str;

    /// Whether this adapter claims a dump starting with `preview`.
    fn can_parse(&self, preview: &[u8]) -> bool;

    /// Parse the full dump (preview bytes included) into a graph.
    fn parse(&self, reader: &mut dyn Read) -> Result<Graph>;
}

/// The closed set of built-in adapters, plus an escape hatch.
pub enum DumpFormat {
    GoHeap(GoHeapParser),
    Json(JsonParser),
    External(Box<dyn DumpParser>),
}

impl DumpFormat {
    fn as_parser(&self) -> &dyn DumpParser {
        match self {
            DumpFormat::GoHeap(p) => p,
            DumpFormat::Json(p) => p,
            DumpFormat::External(p) => p.as_ref(),
        }
    }
}

/// Ordered adapter list. Registration appends; `open` asks each adapter
/// in order and the first claimant parses the dump.
pub struct Registry {
    formats: RwLock<Vec<DumpFormat>>,
}

impl Registry {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            formats: RwLock::new(Vec::new()),
        }
    }

    /// Registry holding the binary Go heap adapter and the JSON fixture
    /// adapter, in that order.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.register(DumpFormat::GoHeap(GoHeapParser));
        registry.register(DumpFormat::Json(JsonParser));
        registry
    }

    /// Append an adapter. Expected at process start-up; safe to call
    /// concurrently with `open`.
    pub fn register(&self, format: DumpFormat) {
        self.formats
            .write()
            .expect("registry lock poisoned")
            .push(format);
    }

    /// Open a dump: buffer a preview, pick the first adapter that claims
    /// it, and parse the whole stream. Returns the graph and the name of
    /// the adapter that produced it.
    pub fn open<R: Read>(&self, mut reader: R) -> Result<(Graph, String)> {
        let mut preview = vec![0u8; PREVIEW_LEN];
        let mut filled = 0;
        while filled < preview.len() {
            let n = reader.read(&mut preview[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        preview.truncate(filled);

        let formats = self.formats.read().expect("registry lock poisoned");
        for format in formats.iter() {
            let parser = format.as_parser();
            if parser.can_parse(&preview) {
                log::debug!("adapter {} claimed the dump", parser.name());
                let mut full = preview.as_slice().chain(reader);
                let graph = parser.parse(&mut full)?;
                return Ok((graph, parser.name().to_string()));
            }
        }
        Err(HeapLensError::NoParserForFormat)
    }

    /// Open a dump file by memory-mapping it.
    pub fn open_path<P: AsRef<Path>>(&self, path: P) -> Result<(Graph, String)> {
        let file = File::open(path)?;
        // Safety: the mapping is read-only and dropped before return.
        let mmap = unsafe { Mmap::map(&file)? };
        self.open(&mmap[..])
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
