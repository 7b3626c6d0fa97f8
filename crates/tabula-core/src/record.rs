//! Traits implemented by generated configuration code.
//!
//! The table compiler emits one record struct per table and one container
//! struct aggregating them. These traits are the seam between that generated
//! code and the runtime: they replace any by-name type lookup with an explicit
//! table identifier -> converter mapping that is checked by the compiler.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::store::IndexRegistry;
use crate::value::{Row, RowSet};

/// Builds a typed record from an imported row.
///
/// Generated implementations read each field by its column position, so no
/// name lookup happens on the import path.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> Self;
}

/// The aggregate of all generated tables.
pub trait ConfigContainer: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Content hash of the schemas this container was generated from.
    ///
    /// A snapshot or pending import is only accepted by a container whose
    /// tag matches, which is how a rebuilt host proves it compiled the code
    /// emitted for that generation pass.
    const SESSION_TAG: &'static str;

    /// Names of every table held by the container, in generation order.
    const TABLES: &'static [&'static str];

    /// Assemble the container from imported rows.
    fn from_rows(rows: &RowSet) -> Self;

    /// Register every generated index type with the runtime store.
    fn register_indices(registry: &mut IndexRegistry<Self>);
}
