use std::ops::Range;
use std::sync::Arc;

use serde_json::Value;

/// Names of array-valued payload fields that are partitioned across pool members.
pub type BalancedFields = Arc<[String]>;

/// Bounds of shard `index` out of `count` for an array of `len` elements.
///
/// Shards are contiguous, `ceil(len / count)` long, and only the last non-empty one may be
/// shorter. Shards past the end are empty.
pub fn shard_bounds(len: usize, index: usize, count: usize) -> Range<usize> {
    if count == 0 {
        return 0..0;
    }
    let chunk = len.div_ceil(count);
    let start = index.saturating_mul(chunk).min(len);
    let end = start.saturating_add(chunk).min(len);
    start..end
}

/// Slice `items` down to shard `index` of `count`.
pub fn chunk<T>(items: &[T], index: usize, count: usize) -> &[T] {
    &items[shard_bounds(items.len(), index, count)]
}

/// Maps a full payload onto one pool member's share of it.
///
/// Balanced array fields are cut to the member's shard; every other field is replicated.
#[derive(Clone, Debug, PartialEq)]
pub struct ShardSelector {
    index: usize,
    count: usize,
    fields: BalancedFields,
}

impl ShardSelector {
    /// Selector for member `index` of a pool of `count`.
    pub fn new(index: usize, count: usize, fields: BalancedFields) -> Self {
        Self {
            index,
            count,
            fields,
        }
    }

    /// Member position this selector serves.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Pool size this selector was generated for.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Return `true` when `path` is a balanced field.
    pub fn is_balanced(&self, path: &str) -> bool {
        self.fields.iter().any(|f| f == path)
    }

    /// Produce this member's payload. Non-object payloads and non-array fields pass through.
    pub fn select(&self, payload: &Value) -> Value {
        let Some(obj) = payload.as_object() else {
            return payload.clone();
        };
        let mut out = obj.clone();
        for field in self.fields.iter() {
            if let Some(Value::Array(items)) = obj.get(field) {
                out.insert(
                    field.clone(),
                    Value::Array(chunk(items, self.index, self.count).to_vec()),
                );
            }
        }
        Value::Object(out)
    }
}

/// One selector per member for a pool of `count`.
pub fn shard_selectors(count: usize, fields: &BalancedFields) -> Vec<ShardSelector> {
    (0..count)
        .map(|index| ShardSelector::new(index, count, fields.clone()))
        .collect()
}

#[cfg(test)]
#[path = "../../tests/unit/payload/shard.rs"]
mod tests;
