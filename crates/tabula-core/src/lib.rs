//! Tabula Core -- the runtime half of the configuration-table pipeline.
//!
//! Game code links only this crate. It provides the traits generated table
//! code implements, the binary snapshot codec, and the [`store::ConfigStore`]
//! that serves lazily built lookup indices.
//!
//! # Runtime surface
//!
//! ```rust,ignore
//! let store = ConfigStore::<ConfigTables>::init("assets/config.bin")?;
//! let items = store.get_config::<ItemIndex>()?;
//! assert_eq!(items[&1001].name, "Potion");
//! ```
//!
//! # Key Types
//!
//! - [`value::Row`] / [`value::RowSet`] -- imported cell values handed to
//!   generated converters.
//! - [`record::ConfigContainer`] -- implemented by the generated container;
//!   acts as the compile-time table registry.
//! - [`index::ConfigIndex`] -- implemented by generated nested-map indices.
//! - [`codec`] -- versioned snapshot envelope over bitcode.
//! - [`store::ConfigStore`] -- decoded container plus type-keyed index cache.

pub mod codec;
pub mod index;
pub mod record;
pub mod store;
pub mod value;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use codec::{DeserializeError, SerializeError, SnapshotHeader};
pub use index::{ConfigIndex, DuplicateKeyError};
pub use record::{ConfigContainer, FromRow};
pub use store::{ConfigStore, IndexRegistry, StoreBuilder, StoreError};
pub use value::{FieldKind, Row, RowSet, Value};
