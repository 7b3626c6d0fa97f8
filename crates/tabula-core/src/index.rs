//! Nested lookup indices over generated tables.
//!
//! An index for a key chain `[k1, k2, .., kn]` is a map nested `n` levels
//! deep: every level but the last maps a key value to the next level, and the
//! terminal level maps the last key value to exactly one record. Generated
//! code builds these maps in one pass over a table, using
//! [`insert_terminal`] for the innermost insert.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt::Debug;
use std::hash::Hash;

// ===========================================================================
// Errors
// ===========================================================================

/// Two rows of one table share the same full key tuple.
///
/// Duplicate keys are an authoring bug; the index is not built rather than
/// silently keeping either row.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error(
    "duplicate key ({}) in table '{table}': first row {first}, conflicting row {second}",
    key.join(", ")
)]
pub struct DuplicateKeyError {
    pub table: String,
    /// The full key tuple, outermost key first.
    pub key: Vec<String>,
    /// Debug rendering of the row already in the index.
    pub first: String,
    /// Debug rendering of the row that collided with it.
    pub second: String,
}

// ===========================================================================
// Index trait
// ===========================================================================

/// A lookup structure derived from a container.
///
/// Implemented by generated index types; the runtime store calls
/// [`ConfigIndex::build`] at most once per store.
pub trait ConfigIndex<C>: Sized + Send + Sync + 'static {
    fn build(container: &C) -> Result<Self, DuplicateKeyError>;
}

// ===========================================================================
// Construction helpers
// ===========================================================================

/// Insert `record` into a terminal map under `key`.
///
/// `key_path` renders the full key tuple and is only evaluated when the key
/// is already taken.
pub fn insert_terminal<K, R, F>(
    map: &mut HashMap<K, R>,
    key: K,
    record: &R,
    table: &str,
    key_path: F,
) -> Result<(), DuplicateKeyError>
where
    K: Hash + Eq,
    R: Clone + Debug,
    F: FnOnce() -> Vec<String>,
{
    match map.entry(key) {
        Entry::Occupied(existing) => Err(DuplicateKeyError {
            table: table.to_string(),
            key: key_path(),
            first: format!("{:?}", existing.get()),
            second: format!("{record:?}"),
        }),
        Entry::Vacant(slot) => {
            slot.insert(record.clone());
            Ok(())
        }
    }
}

/// Build a single-level index: `key -> record`.
pub fn build_flat<K, R>(
    records: &[R],
    table: &str,
    key: impl Fn(&R) -> K,
) -> Result<HashMap<K, R>, DuplicateKeyError>
where
    K: Hash + Eq + ToString,
    R: Clone + Debug,
{
    let mut map = HashMap::with_capacity(records.len());
    for record in records {
        let k = key(record);
        let rendered = k.to_string();
        insert_terminal(&mut map, k, record, table, || vec![rendered])?;
    }
    Ok(map)
}

/// Build a two-level index: `outer -> inner -> record`.
pub fn build_nested<K1, K2, R>(
    records: &[R],
    table: &str,
    outer: impl Fn(&R) -> K1,
    inner: impl Fn(&R) -> K2,
) -> Result<HashMap<K1, HashMap<K2, R>>, DuplicateKeyError>
where
    K1: Hash + Eq + ToString,
    K2: Hash + Eq + ToString,
    R: Clone + Debug,
{
    let mut map: HashMap<K1, HashMap<K2, R>> = HashMap::new();
    for record in records {
        let k1 = outer(record);
        let k2 = inner(record);
        let path = [k1.to_string(), k2.to_string()];
        let level = map.entry(k1).or_default();
        insert_terminal(level, k2, record, table, || path.to_vec())?;
    }
    Ok(map)
}

// ===========================================================================
// Tests
// ===========================================================================
