//! Table schemas extracted from the header rows of a sheet.
//!
//! Every sheet follows the same layout:
//!
//! | row | content |
//! |-----|---------|
//! | 1   | column names |
//! | 2   | key priority per column (blank or <= 0: not a key) |
//! | 3   | declared type token per column |
//! | 4.. | data, read by the importer |

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use tabula_core::FieldKind;

use crate::diag::{Diagnostic, DiagnosticSink};
use crate::source::{Sheet, SourceLocator, TabularSource};

/// Index of the first data row within a sheet.
pub const DATA_ROW_OFFSET: usize = 3;

const NAME_ROW: usize = 0;
const PRIORITY_ROW: usize = 1;
const TYPE_ROW: usize = 2;

// ===========================================================================
// Errors
// ===========================================================================

/// A sheet whose header rows do not describe a valid table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("table '{table}' has no column-name row")]
    MissingHeaderRow { table: String },

    #[error("table '{table}' has no type row")]
    MissingTypeRow { table: String },

    #[error("table '{table}' declares {names} column names but {types} types")]
    ColumnCountMismatch {
        table: String,
        names: usize,
        types: usize,
    },

    #[error("table '{table}' column {column} has an empty name")]
    EmptyColumnName { table: String, column: usize },

    #[error("table '{table}' declares column '{name}' more than once")]
    DuplicateColumn { table: String, name: String },

    #[error("table '{table}' column '{column}' has key priority '{value}', expected an integer")]
    InvalidKeyPriority {
        table: String,
        column: String,
        value: String,
    },

    #[error("table '{table}' is defined by more than one source")]
    DuplicateTable { table: String },

    #[error("table '{table}' would generate identifier '{ident}', which is already taken")]
    NameCollision { table: String, ident: String },
}

// ===========================================================================
// Type tokens
// ===========================================================================

/// A declared column type as written by the designer.
///
/// Unrecognized tokens fall back to text, and the importer passes their raw
/// cell text through unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct TypeToken {
    raw: String,
    kind: FieldKind,
    recognized: bool,
}

impl TypeToken {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let kind = match raw.to_ascii_lowercase().as_str() {
            "int" => Some(FieldKind::Int),
            "long" => Some(FieldKind::Long),
            "string" => Some(FieldKind::Text),
            "float" => Some(FieldKind::Float),
            "double" => Some(FieldKind::Double),
            "bool" => Some(FieldKind::Bool),
            "int[]" | "list<int>" => Some(FieldKind::IntList),
            _ => None,
        };
        Self {
            raw: raw.to_string(),
            kind: kind.unwrap_or(FieldKind::Text),
            recognized: kind.is_some(),
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn is_recognized(&self) -> bool {
        self.recognized
    }
}

impl From<String> for TypeToken {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<TypeToken> for String {
    fn from(token: TypeToken) -> Self {
        token.raw
    }
}

// ===========================================================================
// Schema types
// ===========================================================================

/// One declared column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub declared_type: TypeToken,
    /// Position in the key chain. `None` when the column is not a key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_priority: Option<u32>,
}

/// The declared shape of one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub table_name: String,
    pub columns: Vec<ColumnSpec>,
    pub source: SourceLocator,
}

impl TableSchema {
    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn has_keys(&self) -> bool {
        self.columns.iter().any(|c| c.key_priority.is_some())
    }
}

// ===========================================================================
// Reading
// ===========================================================================

fn trimmed_row(sheet: &Sheet, index: usize) -> Option<Vec<String>> {
    let mut row: Vec<String> = sheet
        .rows
        .get(index)?
        .iter()
        .map(|c| c.trim().to_string())
        .collect();
    while row.last().is_some_and(|c| c.is_empty()) {
        row.pop();
    }
    if row.is_empty() { None } else { Some(row) }
}

fn parse_priority(table: &str, column: &str, raw: &str) -> Result<Option<u32>, SchemaError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let invalid = || SchemaError::InvalidKeyPriority {
        table: table.to_string(),
        column: column.to_string(),
        value: raw.to_string(),
    };
    let value: i64 = raw.parse().map_err(|_| invalid())?;
    if value <= 0 {
        return Ok(None);
    }
    u32::try_from(value).map(Some).map_err(|_| invalid())
}

/// Extract the schema of one sheet.
pub fn read_schema(sheet: &Sheet, source: SourceLocator) -> Result<TableSchema, SchemaError> {
    let table = sheet.name.trim().to_string();

    let names = trimmed_row(sheet, NAME_ROW).ok_or_else(|| SchemaError::MissingHeaderRow {
        table: table.clone(),
    })?;
    let types = trimmed_row(sheet, TYPE_ROW).ok_or_else(|| SchemaError::MissingTypeRow {
        table: table.clone(),
    })?;
    if names.len() != types.len() {
        return Err(SchemaError::ColumnCountMismatch {
            table,
            names: names.len(),
            types: types.len(),
        });
    }
    let priorities = sheet.rows.get(PRIORITY_ROW).cloned().unwrap_or_default();

    let mut seen = HashSet::new();
    let mut columns = Vec::with_capacity(names.len());
    for (i, (name, token)) in names.iter().zip(&types).enumerate() {
        if name.is_empty() {
            return Err(SchemaError::EmptyColumnName { table, column: i + 1 });
        }
        if !seen.insert(name.as_str()) {
            return Err(SchemaError::DuplicateColumn {
                table,
                name: name.clone(),
            });
        }
        let raw_priority = priorities.get(i).map(String::as_str).unwrap_or("");
        columns.push(ColumnSpec {
            name: name.clone(),
            declared_type: TypeToken::parse(token),
            key_priority: parse_priority(&table, name, raw_priority)?,
        });
    }

    Ok(TableSchema {
        table_name: table,
        columns,
        source,
    })
}

/// Extract the schemas of every sheet in a source.
///
/// A sheet with malformed headers is reported and skipped; the remaining
/// sheets are still read.
pub fn read_source(source: &dyn TabularSource, sink: &dyn DiagnosticSink) -> Vec<TableSchema> {
    let sheets = match source.sheets() {
        Ok(sheets) => sheets,
        Err(e) => {
            sink.report(Diagnostic::SourceUnavailable {
                locator: source.path().display().to_string(),
                reason: e.to_string(),
            });
            return Vec::new();
        }
    };

    let mut schemas = Vec::with_capacity(sheets.len());
    for sheet in &sheets {
        let locator = source.locator(&sheet.name);
        match read_schema(sheet, locator.clone()) {
            Ok(schema) => {
                tracing::debug!(
                    table = %schema.table_name,
                    columns = schema.columns.len(),
                    "read table schema"
                );
                schemas.push(schema);
            }
            Err(error) => sink.report(Diagnostic::TableSkipped {
                locator: locator.to_string(),
                error,
            }),
        }
    }
    schemas
}

/// Extract the schemas of every source. A table name defined twice keeps its
/// first definition.
pub fn read_all(sources: &[&dyn TabularSource], sink: &dyn DiagnosticSink) -> Vec<TableSchema> {
    let mut names = HashSet::new();
    let mut schemas = Vec::new();
    for source in sources {
        for schema in read_source(*source, sink) {
            if names.insert(schema.table_name.clone()) {
                schemas.push(schema);
            } else {
                sink.report(Diagnostic::TableSkipped {
                    locator: schema.source.to_string(),
                    error: SchemaError::DuplicateTable {
                        table: schema.table_name,
                    },
                });
            }
        }
    }
    schemas
}

// ===========================================================================
// Tests
// ===========================================================================
