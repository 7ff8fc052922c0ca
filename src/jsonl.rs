// JSONL encoding of whole collections

use eyre::{Context, Result};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::record::Record;

/// Serialize a collection as one JSON object per line
pub fn encode_collection<T: Serialize>(records: &[T]) -> Result<String> {
    let mut out = String::new();
    for record in records {
        let json = serde_json::to_string(record).context("Failed to serialize record")?;
        out.push_str(&json);
        out.push('\n');
    }
    Ok(out)
}

/// Read a collection stored under `key`, preserving order.
///
/// Malformed lines, or malformed elements of an array value, are skipped with
/// a warning. A repeated id keeps its first
/// occurrence. A value holding a single JSON array is accepted as well.
pub fn decode_collection<T: Record>(key: &str, raw: &str) -> Vec<T> {
    let trimmed = raw.trim_start();
    let candidates: Vec<T> = if trimmed.starts_with('[') {
        match serde_json::from_str::<Vec<serde_json::Value>>(trimmed) {
            Ok(values) => values
                .into_iter()
                .enumerate()
                .filter_map(|(index, value)| match serde_json::from_value::<T>(value) {
                    Ok(record) => Some(record),
                    Err(e) => {
                        warn!(key, index, error = ?e, "Failed to parse array element, skipping");
                        None
                    }
                })
                .collect(),
            Err(e) => {
                warn!(key, error = ?e, "Failed to parse JSON array, ignoring value");
                Vec::new()
            }
        }
    } else {
        raw.lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .filter_map(|(line_num, line)| match serde_json::from_str::<T>(line) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(
                        key,
                        line = line_num + 1,
                        error = ?e,
                        "Failed to parse JSON, skipping"
                    );
                    None
                }
            })
            .collect()
    };

    let mut seen = HashSet::new();
    let records: Vec<T> = candidates
        .into_iter()
        .filter(|record| {
            let fresh = seen.insert(record.id().to_string());
            if !fresh {
                warn!(key, id = record.id(), "Duplicate id, keeping first occurrence");
            }
            fresh
        })
        .collect();

    debug!(key, count = records.len(), "Decoded collection");
    records
}
