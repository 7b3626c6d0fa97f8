// @generated by tabula. Do not edit by hand.
// session: fixture-0001
#![allow(non_snake_case)]

use std::collections::HashMap;
use std::ops::Deref;

use serde::{Deserialize, Serialize};
use tabula_core::index::insert_terminal;
use tabula_core::{ConfigIndex, DuplicateKeyError};
use tabula_core::{ConfigContainer, FromRow, IndexRegistry, Row, RowSet};

/// Record of table `Item`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: i32,
    pub name: String,
    pub price: f32,
    pub tags: Vec<i32>,
    pub stackable: bool,
}

impl FromRow for Item {
    fn from_row(row: &Row) -> Self {
        Self {
            id: row.int(0),
            name: row.text(1),
            price: row.float(2),
            tags: row.int_list(3),
            stackable: row.bool(4),
        }
    }
}

/// Lookup index for table `Item`, keyed by `id`.
#[derive(Debug, Clone, Default)]
pub struct ItemIndex(pub HashMap<i32, Item>);

impl Deref for ItemIndex {
    type Target = HashMap<i32, Item>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl ConfigIndex<ConfigTables> for ItemIndex {
    fn build(tables: &ConfigTables) -> Result<Self, DuplicateKeyError> {
        let mut map: HashMap<i32, Item> = HashMap::new();
        for record in &tables.item {
            insert_terminal(&mut map, record.id, record, "Item", || vec![record.id.to_string()])?;
        }
        Ok(Self(map))
    }
}

/// Record of table `Note`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub text: String,
    /// Declared as `Vector3`.
    pub weight: String,
}

impl FromRow for Note {
    fn from_row(row: &Row) -> Self {
        Self {
            text: row.text(0),
            weight: row.text(1),
        }
    }
}

// Table `Note` declares no key columns; no index is generated.

/// Record of table `monster_reward`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonsterReward {
    pub monster: i32,
    pub stage: i32,
    pub itemId: i64,
    pub rate: f64,
    pub rare: bool,
}

impl FromRow for MonsterReward {
    fn from_row(row: &Row) -> Self {
        Self {
            monster: row.int(0),
            stage: row.int(1),
            itemId: row.long(2),
            rate: row.double(3),
            rare: row.bool(4),
        }
    }
}

/// Lookup index for table `monster_reward`, keyed by `monster`, then `stage`.
#[derive(Debug, Clone, Default)]
pub struct MonsterRewardIndex(pub HashMap<i32, HashMap<i32, MonsterReward>>);

impl Deref for MonsterRewardIndex {
    type Target = HashMap<i32, HashMap<i32, MonsterReward>>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl ConfigIndex<ConfigTables> for MonsterRewardIndex {
    fn build(tables: &ConfigTables) -> Result<Self, DuplicateKeyError> {
        let mut map: HashMap<i32, HashMap<i32, MonsterReward>> = HashMap::new();
        for record in &tables.monsterReward {
            let level = map.entry(record.monster).or_default();
            insert_terminal(level, record.stage, record, "monster_reward", || vec![record.monster.to_string(), record.stage.to_string()])?;
        }
        Ok(Self(map))
    }
}

/// Every configuration table, as stored in the snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigTables {
    pub item: Vec<Item>,
    pub note: Vec<Note>,
    pub monsterReward: Vec<MonsterReward>,
}

impl ConfigContainer for ConfigTables {
    const SESSION_TAG: &'static str = "fixture-0001";
    const TABLES: &'static [&'static str] = &["Item", "Note", "monster_reward"];

    fn from_rows(rows: &RowSet) -> Self {
        Self {
            item: rows.convert("Item"),
            note: rows.convert("Note"),
            monsterReward: rows.convert("monster_reward"),
        }
    }

    fn register_indices(registry: &mut IndexRegistry<Self>) {
        registry.register::<ItemIndex>();
        registry.register::<MonsterRewardIndex>();
    }
}
