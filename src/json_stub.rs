//! JSON fixture adapter.
//!
//! Reads `{ "objects": [{"id", "type", "size", "ptrs"}], "roots": [...] }`
//! straight into a graph. Exists so tests and tooling can feed the
//! analysis algorithms hand-written heaps without encoding binary dumps.

use std::collections::HashMap;
use std::io::Read;

use serde::Deserialize;

use crate::error::{HeapLensError, Result};
use crate::graph::{Graph, ObjId, Object, SUPER_ROOT};
use crate::registry::DumpParser;

#[derive(Debug, Deserialize)]
struct JsonDump {
    objects: Vec<JsonObject>,
    #[serde(default)]
    roots: Vec<ObjId>,
}

#[derive(Debug, Deserialize)]
struct JsonObject {
    id: ObjId,
    #[serde(rename = "type", default)]
    type_name: String,
    size: u64,
    #[serde(default)]
    ptrs: Vec<ObjId>,
}

/// Adapter for the JSON test-dump format.
#[derive(Debug, Default)]
pub struct JsonParser;

impl DumpParser for JsonParser {
    fn name(&self) -> &str {
        "json-stub"
    }

    /// The preview may cut the document mid-token, so detection is
    /// structural only: a JSON object opener with an `"objects"` key.
    fn can_parse(&self, preview: &[u8]) -> bool {
        let text = String::from_utf8_lossy(preview);
        let trimmed = text.trim_start();
        trimmed.starts_with('{') && trimmed.contains("\"objects\"")
    }

    fn parse(&self, reader: &mut dyn Read) -> Result<Graph> {
        let dump: JsonDump =
            serde_json::from_reader(reader).map_err(|e| HeapLensError::Json(e.to_string()))?;
        for obj in &dump.objects {
            if obj.id == SUPER_ROOT {
                return Err(HeapLensError::Json(format!(
                    "object id {} is reserved",
                    SUPER_ROOT
                )));
            }
        }
        let objects = dump
            .objects
            .into_iter()
            .map(|o| Object {
                id: o.id,
                type_name: o.type_name,
                size: o.size,
                ptrs: o.ptrs,
            })
            .collect();
        Ok(Graph::new(objects, dump.roots, HashMap::new()))
    }
}
