//! Tabula Data -- the build-time half of the configuration-table pipeline.
//!
//! Reads designer-authored tables, emits typed Rust code for them, and once
//! the host has been rebuilt against that code, imports the rows and writes
//! the binary snapshot that [`tabula_core::ConfigStore`] loads at runtime.
//!
//! # Pipeline
//!
//! 1. [`schema::read_all`] extracts a [`schema::TableSchema`] from the header
//!    rows of every sheet.
//! 2. [`emit::TypeModelEmitter`] writes record, index and container types,
//!    using [`plan`] for the key-priority chains.
//! 3. [`coordinator::RecompileCoordinator::generate`] saves a
//!    [`continuation::PendingContinuation`] and waits for the
//!    [`rebuild::RebuildTrigger`].
//! 4. The rebuilt host calls
//!    [`coordinator::RecompileCoordinator::resume`], which runs the
//!    [`import::DataImporter`] and writes the snapshot.
//!
//! Non-fatal problems (skipped tables, conversion fallbacks, duplicate keys)
//! go to a [`diag::DiagnosticSink`].

/// Append one formatted line of generated code to a `String`.
macro_rules! emit_line {
    ($out:expr) => {
        $out.push('\n')
    };
    ($out:expr, $($arg:tt)*) => {{
        $out.push_str(&format!($($arg)*));
        $out.push('\n');
    }};
}

pub mod config;
pub mod continuation;
pub mod coordinator;
pub mod diag;
pub mod emit;
pub mod import;
pub mod naming;
pub mod plan;
pub mod rebuild;
pub mod schema;
pub mod source;

pub use config::{ConfigError, ProjectConfig};
pub use continuation::{ContinuationStore, FileContinuationStore, PendingContinuation};
pub use coordinator::{CoordinatorError, CoordinatorSettings, Phase, RecompileCoordinator};
pub use diag::{CollectingSink, Diagnostic, DiagnosticSink, Severity, TracingSink};
pub use emit::{EmitOptions, EmittedModule, TypeModelEmitter};
pub use import::{DataImporter, ImportError};
pub use naming::Naming;
pub use plan::{IndexPlan, PlanError};
pub use rebuild::{CommandRebuild, NoRebuild, RebuildStatus, RebuildTrigger};
pub use schema::{ColumnSpec, SchemaError, TableSchema, TypeToken};
pub use source::{CsvSource, FsResolver, MemorySource, Sheet, SourceLocator, TabularSource};
