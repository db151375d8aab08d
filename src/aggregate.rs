//! Per-type aggregation for "top types" reports.

use std::cmp::Reverse;
use std::collections::HashMap;

use serde::Serialize;

use crate::graph::Graph;

/// Aggregated footprint of one type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeStat {
    pub name: String,
    pub count: u64,
    pub total_bytes: u64,
}

/// Metric the aggregation is ranked by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortBy {
    Bytes,
    Count,
}

/// Sum object counts and bytes per type name, sorted descending by the
/// chosen metric. Ties break on lexical type name so output is stable.
pub fn top_types(g: &Graph, sort: SortBy, limit: usize) -> Vec<TypeStat> {
    let mut by_type: HashMap<&str, (u64, u64)> = HashMap::new();
    for obj in g.iter() {
        let entry = by_type.entry(obj.type_name.as_str()).or_insert((0, 0));
        entry.0 += 1;
        entry.1 += obj.size;
    }

    let mut stats: Vec<TypeStat> = by_type
        .into_iter()
        .map(|(name, (count, total_bytes))| TypeStat {
            name: name.to_string(),
            count,
            total_bytes,
        })
        .collect();

    match sort {
        SortBy::Bytes => stats.sort_by(|a, b| {
            (Reverse(a.total_bytes), &a.name).cmp(&(Reverse(b.total_bytes), &b.name))
        }),
        SortBy::Count => {
            stats.sort_by(|a, b| (Reverse(a.count), &a.name).cmp(&(Reverse(b.count), &b.name)))
        }
    }
    stats.truncate(limit);
    stats
}
