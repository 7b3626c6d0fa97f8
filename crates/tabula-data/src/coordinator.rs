//! The generate -> rebuild -> resume pipeline as an explicit state machine.
//!
//! ```text
//! Idle -> Generating -> AwaitingRebuild -> Resuming -> Done
//!             |               |               |
//!             +---------------+---------------+-> Failed
//! ```
//!
//! Generation runs in the current host. The rebuilt host, which may be a
//! different process, finishes the job by calling
//! [`RecompileCoordinator::resume`] with its compiled container type. The only
//! state that crosses the rebuild is the [`PendingContinuation`]; every
//! failure clears it and leaves the previous snapshot in place.

use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use tabula_core::codec::{self, SerializeError};
use tabula_core::ConfigContainer;

use crate::continuation::{ContinuationError, ContinuationStore, PendingContinuation};
use crate::diag::{Diagnostic, DiagnosticSink};
use crate::emit::{EmitOptions, TypeModelEmitter};
use crate::import::DataImporter;
use crate::rebuild::{RebuildError, RebuildStatus, RebuildTrigger};
use crate::schema;
use crate::source::{SourceResolver, TabularSource};

// ===========================================================================
// Phases
// ===========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Generating,
    AwaitingRebuild,
    Resuming,
    Done,
    Failed,
}

impl Phase {
    /// Whether a new generation pass may start from this phase.
    pub fn can_generate(self) -> bool {
        matches!(self, Phase::Idle | Phase::Done | Phase::Failed)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Generating => "generating",
            Phase::AwaitingRebuild => "awaiting rebuild",
            Phase::Resuming => "resuming",
            Phase::Done => "done",
            Phase::Failed => "failed",
        };
        f.write_str(name)
    }
}

// ===========================================================================
// Errors
// ===========================================================================

#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("cannot {operation} while {phase}")]
    InvalidPhase {
        phase: Phase,
        operation: &'static str,
    },

    #[error("failed to write generated code to {path}: {source}")]
    Emit {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Continuation(#[from] ContinuationError),

    #[error(transparent)]
    Rebuild(#[from] RebuildError),

    #[error("rebuild failed: {0}")]
    RebuildFailed(String),

    #[error("rebuild did not finish within {waited:?}")]
    RebuildTimeout { waited: Duration },

    #[error("no generation is pending")]
    NothingPending,

    /// The running host was not compiled from the pending generation.
    #[error("pending session is '{pending}' but the host was compiled for '{compiled}'")]
    SessionMismatch { pending: String, compiled: String },

    #[error(transparent)]
    Snapshot(#[from] SerializeError),
}

// ===========================================================================
// Settings and reports
// ===========================================================================

#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    pub generated_path: PathBuf,
    pub snapshot_path: PathBuf,
    pub emit: EmitOptions,
    pub poll_interval: Duration,
    pub rebuild_timeout: Duration,
}

impl CoordinatorSettings {
    pub fn new(generated_path: impl Into<PathBuf>, snapshot_path: impl Into<PathBuf>) -> Self {
        Self {
            generated_path: generated_path.into(),
            snapshot_path: snapshot_path.into(),
            emit: EmitOptions::default(),
            poll_interval: Duration::from_millis(500),
            rebuild_timeout: Duration::from_secs(600),
        }
    }
}

/// Summary of a generation pass that reached `AwaitingRebuild`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateReport {
    pub session_tag: String,
    pub tables: Vec<String>,
    pub index_types: Vec<String>,
    /// Whether the generated file's contents changed.
    pub code_changed: bool,
}

/// Summary of a completed resume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeReport {
    pub session_tag: String,
    pub snapshot_path: PathBuf,
    /// Imported row count per table, in generation order.
    pub rows: Vec<(String, usize)>,
    /// Tables whose index will fail to build because of duplicate keys.
    pub duplicate_key_tables: usize,
}

// ===========================================================================
// Coordinator
// ===========================================================================

/// Drives one generate/rebuild/resume cycle.
pub struct RecompileCoordinator<'a> {
    settings: CoordinatorSettings,
    continuations: &'a dyn ContinuationStore,
    sink: &'a dyn DiagnosticSink,
    phase: Phase,
}

impl<'a> RecompileCoordinator<'a> {
    pub fn new(
        settings: CoordinatorSettings,
        continuations: &'a dyn ContinuationStore,
        sink: &'a dyn DiagnosticSink,
    ) -> Self {
        Self {
            settings,
            continuations,
            sink,
            phase: Phase::Idle,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn settings(&self) -> &CoordinatorSettings {
        &self.settings
    }

    /// Derive the phase from durable state. A fresh coordinator in a rebuilt
    /// host uses this to learn that a resume is due.
    pub fn restore(&mut self) -> Result<Phase, CoordinatorError> {
        self.phase = match self.continuations.load() {
            Ok(Some(pending)) => {
                tracing::info!(session = %pending.session_tag, "found pending generation");
                Phase::AwaitingRebuild
            }
            Ok(None) => Phase::Idle,
            Err(e) => return Err(self.fail("restore", e.into())),
        };
        Ok(self.phase)
    }

    /// Read schemas, emit code, save the continuation, then request a rebuild
    /// and wait for it.
    ///
    /// On success the coordinator is left in `AwaitingRebuild`; the rebuilt
    /// host completes the cycle with [`resume`](Self::resume).
    pub fn generate(
        &mut self,
        sources: &[&dyn TabularSource],
        trigger: &mut dyn RebuildTrigger,
    ) -> Result<GenerateReport, CoordinatorError> {
        if !self.phase.can_generate() {
            return Err(CoordinatorError::InvalidPhase {
                phase: self.phase,
                operation: "generate",
            });
        }
        self.phase = Phase::Generating;

        let schemas = schema::read_all(sources, self.sink);
        let emitter = TypeModelEmitter::new(self.settings.emit.clone());
        let module = emitter.emit(schemas, self.sink);
        let code_changed = match module.write_to(&self.settings.generated_path) {
            Ok(changed) => changed,
            Err(source) => {
                let err = CoordinatorError::Emit {
                    path: self.settings.generated_path.clone(),
                    source,
                };
                return Err(self.fail("generate", err));
            }
        };
        tracing::info!(
            path = %self.settings.generated_path.display(),
            tables = module.tables.len(),
            session = %module.session_tag,
            changed = code_changed,
            "generated config module"
        );

        let report = GenerateReport {
            session_tag: module.session_tag.clone(),
            tables: module.tables.iter().map(|t| t.table_name.clone()).collect(),
            index_types: module.index_types(&self.settings.emit.naming),
            code_changed,
        };
        let pending = PendingContinuation::new(
            module.session_tag,
            module.tables,
            self.settings.generated_path.clone(),
            self.settings.snapshot_path.clone(),
        );
        if let Err(e) = self.continuations.save(&pending) {
            return Err(self.fail("generate", e.into()));
        }

        self.phase = Phase::AwaitingRebuild;
        if let Err(e) = trigger.request(&pending.session_tag) {
            return Err(self.fail("rebuild", e.into()));
        }
        self.wait_for_rebuild(trigger)?;
        Ok(report)
    }

    fn wait_for_rebuild(&mut self, trigger: &mut dyn RebuildTrigger) -> Result<(), CoordinatorError> {
        let started = Instant::now();
        loop {
            match trigger.poll() {
                RebuildStatus::Succeeded => {
                    tracing::info!(elapsed = ?started.elapsed(), "rebuild finished");
                    return Ok(());
                }
                RebuildStatus::Failed(reason) => {
                    return Err(self.fail("rebuild", CoordinatorError::RebuildFailed(reason)));
                }
                RebuildStatus::Pending => {
                    let waited = started.elapsed();
                    if waited >= self.settings.rebuild_timeout {
                        return Err(self.fail("rebuild", CoordinatorError::RebuildTimeout { waited }));
                    }
                    std::thread::sleep(self.settings.poll_interval);
                }
            }
        }
    }

    /// Import the pending tables into `C` and write the snapshot.
    ///
    /// `C` must be the container compiled from the pending generation; the
    /// session tags are compared before anything is imported.
    pub fn resume<C: ConfigContainer>(
        &mut self,
        resolver: &dyn SourceResolver,
    ) -> Result<ResumeReport, CoordinatorError> {
        if matches!(self.phase, Phase::Generating | Phase::Resuming) {
            return Err(CoordinatorError::InvalidPhase {
                phase: self.phase,
                operation: "resume",
            });
        }
        self.phase = Phase::Resuming;

        let pending = match self.continuations.load() {
            Ok(Some(pending)) => pending,
            Ok(None) => return Err(self.fail("resume", CoordinatorError::NothingPending)),
            Err(e) => return Err(self.fail("resume", e.into())),
        };
        if pending.session_tag != C::SESSION_TAG {
            let err = CoordinatorError::SessionMismatch {
                pending: pending.session_tag,
                compiled: C::SESSION_TAG.to_string(),
            };
            return Err(self.fail("resume", err));
        }

        let importer = DataImporter::new(resolver, self.sink);
        let rows = importer.import_all(&pending.tables);
        let duplicate_key_tables = importer.validate_indices(&pending.tables, &rows);
        let container = C::from_rows(&rows);

        if let Err(e) = codec::write_snapshot(&pending.snapshot_path, &container) {
            return Err(self.fail("resume", e.into()));
        }
        if let Err(e) = self.continuations.clear() {
            return Err(self.fail("resume", e.into()));
        }

        self.phase = Phase::Done;
        let report = ResumeReport {
            session_tag: pending.session_tag,
            snapshot_path: pending.snapshot_path,
            rows: pending
                .tables
                .iter()
                .map(|t| (t.table_name.clone(), rows.rows(&t.table_name).len()))
                .collect(),
            duplicate_key_tables,
        };
        tracing::info!(
            path = %report.snapshot_path.display(),
            tables = report.rows.len(),
            "wrote config snapshot"
        );
        Ok(report)
    }

    /// Enter `Failed`: clear the continuation and report.
    fn fail(&mut self, phase: &str, err: CoordinatorError) -> CoordinatorError {
        if let Err(clear) = self.continuations.clear() {
            tracing::warn!(error = %clear, "failed to clear continuation");
        }
        self.sink.report(Diagnostic::PipelineFailed {
            phase: phase.to_string(),
            reason: err.to_string(),
        });
        self.phase = Phase::Failed;
        err
    }
}

// ===========================================================================
// Tests
// ===========================================================================
