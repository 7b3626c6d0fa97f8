//! Shared test helpers for unit tests, integration tests, and property tests.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]`. The sample
//! container below is written the way the table compiler emits code, so the
//! runtime can be exercised without a generation pass.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::Deref;
use std::path::{Path, PathBuf};

use crate::index::{self, ConfigIndex, DuplicateKeyError};
use crate::record::{ConfigContainer, FromRow};
use crate::store::IndexRegistry;
use crate::value::{Row, RowSet};

pub const SAMPLE_SESSION_TAG: &str = "sample-0001";

// ===========================================================================
// Records
// ===========================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleItem {
    pub id: i32,
    pub name: String,
    pub price: f32,
    pub tags: Vec<i32>,
}

impl FromRow for SampleItem {
    fn from_row(row: &Row) -> Self {
        Self {
            id: row.int(0),
            name: row.text(1),
            price: row.float(2),
            tags: row.int_list(3),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleReward {
    pub monster: i32,
    pub stage: i32,
    pub item: i64,
    pub rate: f64,
    pub rare: bool,
}

impl FromRow for SampleReward {
    fn from_row(row: &Row) -> Self {
        Self {
            monster: row.int(0),
            stage: row.int(1),
            item: row.long(2),
            rate: row.double(3),
            rare: row.bool(4),
        }
    }
}

// ===========================================================================
// Indices
// ===========================================================================

/// `Item` keyed by `id`.
#[derive(Debug, Clone, Default)]
pub struct SampleItemIndex(pub HashMap<i32, SampleItem>);

impl Deref for SampleItemIndex {
    type Target = HashMap<i32, SampleItem>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl ConfigIndex<SampleTables> for SampleItemIndex {
    fn build(tables: &SampleTables) -> Result<Self, DuplicateKeyError> {
        index::build_flat(&tables.item, "Item", |r| r.id).map(Self)
    }
}

/// `Reward` keyed by `monster`, then `stage`.
#[derive(Debug, Clone, Default)]
pub struct SampleRewardIndex(pub HashMap<i32, HashMap<i32, SampleReward>>);

impl Deref for SampleRewardIndex {
    type Target = HashMap<i32, HashMap<i32, SampleReward>>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl ConfigIndex<SampleTables> for SampleRewardIndex {
    fn build(tables: &SampleTables) -> Result<Self, DuplicateKeyError> {
        index::build_nested(&tables.reward, "Reward", |r| r.monster, |r| r.stage).map(Self)
    }
}

// ===========================================================================
// Container
// ===========================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleTables {
    pub item: Vec<SampleItem>,
    pub reward: Vec<SampleReward>,
}

impl ConfigContainer for SampleTables {
    const SESSION_TAG: &'static str = SAMPLE_SESSION_TAG;
    const TABLES: &'static [&'static str] = &["Item", "Reward"];

    fn from_rows(rows: &RowSet) -> Self {
        Self {
            item: rows.convert("Item"),
            reward: rows.convert("Reward"),
        }
    }

    fn register_indices(registry: &mut IndexRegistry<Self>) {
        registry.register::<SampleItemIndex>();
        registry.register::<SampleRewardIndex>();
    }
}

/// Two items and three rewards spread over two monsters.
pub fn sample_tables() -> SampleTables {
    SampleTables {
        item: vec![
            SampleItem {
                id: 1001,
                name: "Potion".to_string(),
                price: 12.5,
                tags: vec![1, 2],
            },
            SampleItem {
                id: 1002,
                name: "Ether".to_string(),
                price: 30.0,
                tags: Vec::new(),
            },
        ],
        reward: vec![
            SampleReward {
                monster: 1,
                stage: 1,
                item: 1001,
                rate: 0.25,
                rare: false,
            },
            SampleReward {
                monster: 1,
                stage: 2,
                item: 1002,
                rate: 0.05,
                rare: true,
            },
            SampleReward {
                monster: 2,
                stage: 1,
                item: 1001,
                rate: 1.0,
                rare: false,
            },
        ],
    }
}

// ===========================================================================
// Filesystem
// ===========================================================================

/// Create a temporary directory with a unique name for test isolation.
pub fn make_test_dir(suffix: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "tabula_test_{suffix}_{}",
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Clean up a test directory.
pub fn cleanup(dir: &Path) {
    let _ = std::fs::remove_dir_all(dir);
}
