//! Row import: source cells -> typed values, one row array per table.
//!
//! Declared columns are matched to source columns by header name, so a sheet
//! whose columns were reordered after generation still imports correctly. A
//! declared column that the sheet no longer has imports as the zero value of
//! its kind.
//!
//! Conversion policy:
//!
//! | kind | accepted | blank | unparseable |
//! |------|----------|-------|-------------|
//! | int, long, float, double | finite decimal text | zero, silent | zero, reported |
//! | bool | `true` / `false`, any case | `false`, silent | `false`, reported |
//! | int list | `1,2,3`, optional `[` / `]` | empty list | bad element -> 0, reported |
//! | text and unrecognized | anything, unchanged | `""` | n/a |

use tabula_core::{FieldKind, Row, RowSet, Value};

use crate::diag::{Diagnostic, DiagnosticSink};
use crate::plan;
use crate::schema::{DATA_ROW_OFFSET, TableSchema};
use crate::source::{Sheet, SourceError, SourceResolver};

// ===========================================================================
// Errors
// ===========================================================================

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("cannot open source of table '{table}': {source}")]
    Source {
        table: String,
        #[source]
        source: SourceError,
    },
}

// ===========================================================================
// Cell conversion
// ===========================================================================

/// The outcome of converting one cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// The text was valid for the declared kind, or blank.
    Parsed(Value),
    /// The text was invalid; the value holds the fallback.
    Fallback(Value),
}

impl Cell {
    pub fn into_value(self) -> Value {
        match self {
            Cell::Parsed(v) | Cell::Fallback(v) => v,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Cell::Fallback(_))
    }
}

fn numeric<T: std::str::FromStr>(raw: &str, wrap: fn(T) -> Value, zero: Value) -> Cell {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Cell::Parsed(zero);
    }
    match trimmed.parse::<T>().map(wrap) {
        Ok(Value::Float(v)) if !v.is_finite() => Cell::Fallback(zero),
        Ok(Value::Double(v)) if !v.is_finite() => Cell::Fallback(zero),
        Ok(value) => Cell::Parsed(value),
        Err(_) => Cell::Fallback(zero),
    }
}

fn int_list(raw: &str) -> Cell {
    let trimmed = raw.trim();
    let inner = trimmed.strip_prefix('[').unwrap_or(trimmed);
    let inner = inner.strip_suffix(']').unwrap_or(inner).trim();
    if inner.is_empty() {
        return Cell::Parsed(Value::IntList(Vec::new()));
    }
    let mut fell_back = false;
    let values = inner
        .split(',')
        .map(|element| {
            element.trim().parse::<i32>().unwrap_or_else(|_| {
                fell_back = true;
                0
            })
        })
        .collect();
    if fell_back {
        Cell::Fallback(Value::IntList(values))
    } else {
        Cell::Parsed(Value::IntList(values))
    }
}

/// Convert the text of one cell to a value of `kind`.
pub fn convert_cell(kind: FieldKind, raw: &str) -> Cell {
    match kind {
        FieldKind::Int => numeric::<i32>(raw, Value::Int, kind.zero()),
        FieldKind::Long => numeric::<i64>(raw, Value::Long, kind.zero()),
        FieldKind::Float => numeric::<f32>(raw, Value::Float, kind.zero()),
        FieldKind::Double => numeric::<f64>(raw, Value::Double, kind.zero()),
        FieldKind::Bool => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                Cell::Parsed(Value::Bool(false))
            } else if trimmed.eq_ignore_ascii_case("true") {
                Cell::Parsed(Value::Bool(true))
            } else if trimmed.eq_ignore_ascii_case("false") {
                Cell::Parsed(Value::Bool(false))
            } else {
                Cell::Fallback(Value::Bool(false))
            }
        }
        FieldKind::IntList => int_list(raw),
        FieldKind::Text => Cell::Parsed(Value::Text(raw.to_string())),
    }
}

// ===========================================================================
// Importer
// ===========================================================================

/// Reads the data rows of known tables.
pub struct DataImporter<'a> {
    resolver: &'a dyn SourceResolver,
    sink: &'a dyn DiagnosticSink,
}

impl<'a> DataImporter<'a> {
    pub fn new(resolver: &'a dyn SourceResolver, sink: &'a dyn DiagnosticSink) -> Self {
        Self { resolver, sink }
    }

    /// Convert the data rows of an already opened sheet.
    pub fn convert_sheet(&self, schema: &TableSchema, sheet: &Sheet) -> Vec<Row> {
        let header: Vec<&str> = sheet
            .rows
            .first()
            .map(|row| row.iter().map(|c| c.trim()).collect())
            .unwrap_or_default();
        let positions: Vec<Option<usize>> = schema
            .columns
            .iter()
            .map(|c| header.iter().position(|h| *h == c.name))
            .collect();

        let mut rows = Vec::new();
        for (offset, cells) in sheet.rows.iter().enumerate().skip(DATA_ROW_OFFSET) {
            if cells.iter().all(|c| c.trim().is_empty()) {
                continue;
            }
            let values = schema
                .columns
                .iter()
                .zip(&positions)
                .map(|(column, position)| {
                    let kind = column.declared_type.kind();
                    let Some(raw) = position.and_then(|p| cells.get(p)) else {
                        return kind.zero();
                    };
                    let cell = convert_cell(kind, raw);
                    if cell.is_fallback() {
                        self.sink.report(Diagnostic::ConversionFallback {
                            table: schema.table_name.clone(),
                            row: offset + 1,
                            column: column.name.clone(),
                            declared: column.declared_type.raw().to_string(),
                            raw: raw.clone(),
                        });
                    }
                    cell.into_value()
                })
                .collect();
            rows.push(Row::new(values));
        }
        rows
    }

    /// Reopen the source of `schema` and convert its rows.
    pub fn import_table(&self, schema: &TableSchema) -> Result<Vec<Row>, ImportError> {
        let sheet = self
            .resolver
            .open_sheet(&schema.source)
            .map_err(|source| ImportError::Source {
                table: schema.table_name.clone(),
                source,
            })?;
        let rows = self.convert_sheet(schema, &sheet);
        tracing::debug!(table = %schema.table_name, rows = rows.len(), "imported table");
        Ok(rows)
    }

    /// Import every table. Tables whose source cannot be opened are reported
    /// and left out of the result.
    pub fn import_all(&self, schemas: &[TableSchema]) -> RowSet {
        let mut set = RowSet::new();
        for schema in schemas {
            match self.import_table(schema) {
                Ok(rows) => set.insert(schema.table_name.clone(), rows),
                Err(e) => self.sink.report(Diagnostic::SourceUnavailable {
                    locator: schema.source.to_string(),
                    reason: e.to_string(),
                }),
            }
        }
        set
    }

    /// Build every planned index over the imported rows and report duplicate
    /// keys. Returns the number of tables whose index would fail to build.
    pub fn validate_indices(&self, schemas: &[TableSchema], rows: &RowSet) -> usize {
        let mut failed = 0;
        for schema in schemas {
            let Ok(Some(plan)) = plan::plan_index(schema) else {
                continue;
            };
            if let Err(e) = plan::build_index(&plan, rows.rows(&schema.table_name)) {
                failed += 1;
                self.sink.report(Diagnostic::DuplicateKey(e));
            }
        }
        failed
    }
}

// ===========================================================================
// Tests
// ===========================================================================
