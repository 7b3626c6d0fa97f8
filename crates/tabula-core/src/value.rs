//! Typed cell values produced by the importer and consumed by generated
//! converters.
//!
//! A [`Row`] holds one [`Value`] per declared column, in declaration order.
//! Accessors never fail: a missing or mismatched cell yields the zero value of
//! the requested type, which is the same policy the importer applies to cells
//! it cannot parse.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::record::FromRow;

// ===========================================================================
// Field kinds
// ===========================================================================

/// The closed set of host field types a column can map to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    Int,
    Long,
    Float,
    Double,
    Bool,
    Text,
    IntList,
}

impl FieldKind {
    /// The Rust type a generated record field of this kind is declared with.
    pub fn rust_type(self) -> &'static str {
        match self {
            FieldKind::Int => "i32",
            FieldKind::Long => "i64",
            FieldKind::Float => "f32",
            FieldKind::Double => "f64",
            FieldKind::Bool => "bool",
            FieldKind::Text => "String",
            FieldKind::IntList => "Vec<i32>",
        }
    }

    /// The [`Row`] accessor a generated converter calls for this kind.
    pub fn row_accessor(self) -> &'static str {
        match self {
            FieldKind::Int => "int",
            FieldKind::Long => "long",
            FieldKind::Float => "float",
            FieldKind::Double => "double",
            FieldKind::Bool => "bool",
            FieldKind::Text => "text",
            FieldKind::IntList => "int_list",
        }
    }

    /// Whether values of this kind can be used as an index key.
    ///
    /// Floating point values have no total equality and lists are not
    /// scalar, so neither can key a map.
    pub fn is_hashable(self) -> bool {
        matches!(
            self,
            FieldKind::Int | FieldKind::Long | FieldKind::Bool | FieldKind::Text
        )
    }

    /// The zero value for this kind.
    pub fn zero(self) -> Value {
        match self {
            FieldKind::Int => Value::Int(0),
            FieldKind::Long => Value::Long(0),
            FieldKind::Float => Value::Float(0.0),
            FieldKind::Double => Value::Double(0.0),
            FieldKind::Bool => Value::Bool(false),
            FieldKind::Text => Value::Text(String::new()),
            FieldKind::IntList => Value::IntList(Vec::new()),
        }
    }
}

// ===========================================================================
// Values
// ===========================================================================

/// A single converted cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Bool(bool),
    Text(String),
    IntList(Vec<i32>),
}

impl Value {
    pub fn kind(&self) -> FieldKind {
        match self {
            Value::Int(_) => FieldKind::Int,
            Value::Long(_) => FieldKind::Long,
            Value::Float(_) => FieldKind::Float,
            Value::Double(_) => FieldKind::Double,
            Value::Bool(_) => FieldKind::Bool,
            Value::Text(_) => FieldKind::Text,
            Value::IntList(_) => FieldKind::IntList,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Long(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Text(v) => f.write_str(v),
            Value::IntList(v) => {
                f.write_str("[")?;
                for (i, n) in v.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{n}")?;
                }
                f.write_str("]")
            }
        }
    }
}

// ===========================================================================
// Rows
// ===========================================================================

/// One imported data row, values in declared-column order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn get(&self, column: usize) -> Option<&Value> {
        self.values.get(column)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn int(&self, column: usize) -> i32 {
        match self.get(column) {
            Some(Value::Int(v)) => *v,
            _ => 0,
        }
    }

    pub fn long(&self, column: usize) -> i64 {
        match self.get(column) {
            Some(Value::Long(v)) => *v,
            Some(Value::Int(v)) => i64::from(*v),
            _ => 0,
        }
    }

    pub fn float(&self, column: usize) -> f32 {
        match self.get(column) {
            Some(Value::Float(v)) => *v,
            _ => 0.0,
        }
    }

    pub fn double(&self, column: usize) -> f64 {
        match self.get(column) {
            Some(Value::Double(v)) => *v,
            Some(Value::Float(v)) => f64::from(*v),
            _ => 0.0,
        }
    }

    pub fn bool(&self, column: usize) -> bool {
        matches!(self.get(column), Some(Value::Bool(true)))
    }

    pub fn text(&self, column: usize) -> String {
        match self.get(column) {
            Some(Value::Text(v)) => v.clone(),
            _ => String::new(),
        }
    }

    pub fn int_list(&self, column: usize) -> Vec<i32> {
        match self.get(column) {
            Some(Value::IntList(v)) => v.clone(),
            _ => Vec::new(),
        }
    }
}

// ===========================================================================
// Row sets
// ===========================================================================

/// Imported rows for every table of a generation pass, keyed by table name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    tables: BTreeMap<String, Vec<Row>>,
}

impl RowSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or replace) the rows of a table.
    pub fn insert(&mut self, table: impl Into<String>, rows: Vec<Row>) {
        self.tables.insert(table.into(), rows);
    }

    /// Rows for a table. A table that was skipped during import has no rows.
    pub fn rows(&self, table: &str) -> &[Row] {
        self.tables.get(table).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Convert every row of `table` into a typed record.
    pub fn convert<R: FromRow>(&self, table: &str) -> Vec<R> {
        self.rows(table).iter().map(R::from_row).collect()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
