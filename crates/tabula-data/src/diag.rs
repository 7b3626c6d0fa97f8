//! Diagnostic reporting for non-fatal pipeline conditions.
//!
//! Skipped tables, cell conversion fallbacks and duplicate index keys do not
//! stop a generation pass. They are reported to a [`DiagnosticSink`] instead.
//! [`TracingSink`] forwards them to `tracing`; [`CollectingSink`] keeps them
//! for inspection.

use std::sync::Mutex;

use tabula_core::DuplicateKeyError;

use crate::schema::SchemaError;

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A non-fatal condition raised during generation or import.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// A table was dropped because its header rows are malformed.
    TableSkipped { locator: String, error: SchemaError },
    /// A source could not be opened or read.
    SourceUnavailable { locator: String, reason: String },
    /// A cell did not parse as its declared type and was replaced by zero.
    ConversionFallback {
        table: String,
        row: usize,
        column: String,
        declared: String,
        raw: String,
    },
    /// A key column cannot key a map, so the table gets no index.
    IndexSkipped { table: String, reason: String },
    /// Two rows share a full key tuple.
    DuplicateKey(DuplicateKeyError),
    /// A coordinator phase failed.
    PipelineFailed { phase: String, reason: String },
}

impl Diagnostic {
    pub fn severity(&self) -> Severity {
        match self {
            Diagnostic::ConversionFallback { .. } => Severity::Info,
            Diagnostic::TableSkipped { .. }
            | Diagnostic::IndexSkipped { .. }
            | Diagnostic::SourceUnavailable { .. } => Severity::Warning,
            Diagnostic::DuplicateKey(_) | Diagnostic::PipelineFailed { .. } => Severity::Error,
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::TableSkipped { locator, error } => {
                write!(f, "skipped table at {locator}: {error}")
            }
            Diagnostic::SourceUnavailable { locator, reason } => {
                write!(f, "source {locator} unavailable: {reason}")
            }
            Diagnostic::ConversionFallback {
                table,
                row,
                column,
                declared,
                raw,
            } => write!(
                f,
                "{table} row {row} column '{column}': '{raw}' is not a valid {declared}, using zero"
            ),
            Diagnostic::IndexSkipped { table, reason } => {
                write!(f, "no index for {table}: {reason}")
            }
            Diagnostic::DuplicateKey(e) => write!(f, "{e}"),
            Diagnostic::PipelineFailed { phase, reason } => {
                write!(f, "{phase} failed: {reason}")
            }
        }
    }
}

/// Receives pipeline diagnostics.
pub trait DiagnosticSink {
    fn report(&self, diagnostic: Diagnostic);
}

/// Forwards diagnostics to `tracing` at a level matching their severity.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, diagnostic: Diagnostic) {
        match diagnostic.severity() {
            Severity::Info => tracing::info!(target: "tabula::diag", "{diagnostic}"),
            Severity::Warning => tracing::warn!(target: "tabula::diag", "{diagnostic}"),
            Severity::Error => tracing::error!(target: "tabula::diag", "{diagnostic}"),
        }
    }
}

/// Stores every diagnostic it receives.
#[derive(Debug, Default)]
pub struct CollectingSink {
    entries: Mutex<Vec<Diagnostic>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.lock())
    }

    pub fn snapshot(&self) -> Vec<Diagnostic> {
        self.lock().clone()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.lock().iter().filter(|d| d.severity() == severity).count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Diagnostic>> {
        // A panic while holding the lock cannot leave the Vec half-written.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl DiagnosticSink for CollectingSink {
    fn report(&self, diagnostic: Diagnostic) {
        self.lock().push(diagnostic);
    }
}
