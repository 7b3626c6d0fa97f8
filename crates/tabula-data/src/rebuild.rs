//! Host rebuild triggers.
//!
//! After the generated module is written the host program must be rebuilt
//! before the new types exist. A [`RebuildTrigger`] starts that rebuild and
//! reports its progress when polled; the coordinator owns the waiting.

use std::process::{Child, Command};

#[derive(Debug, thiserror::Error)]
pub enum RebuildError {
    #[error("rebuild command is empty")]
    EmptyCommand,

    #[error("failed to start rebuild command '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("a rebuild is already running")]
    AlreadyRunning,
}

/// Progress of a requested rebuild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebuildStatus {
    Pending,
    Succeeded,
    Failed(String),
}

/// Starts a host rebuild and reports on it.
pub trait RebuildTrigger {
    /// Start a rebuild for the given generation session.
    fn request(&mut self, session_tag: &str) -> Result<(), RebuildError>;

    /// Non-blocking status check.
    fn poll(&mut self) -> RebuildStatus;
}

// ===========================================================================
// Command
// ===========================================================================

/// Runs an external command, e.g. `cargo build`, as the rebuild.
///
/// The session tag is passed to the child in `TABULA_SESSION`.
#[derive(Debug)]
pub struct CommandRebuild {
    program: String,
    args: Vec<String>,
    child: Option<Child>,
}

impl CommandRebuild {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            child: None,
        }
    }

    /// Build from a command line such as `["cargo", "build", "--release"]`.
    pub fn from_argv(argv: &[String]) -> Result<Self, RebuildError> {
        let (program, args) = argv.split_first().ok_or(RebuildError::EmptyCommand)?;
        Ok(Self::new(program.clone(), args.to_vec()))
    }
}

impl RebuildTrigger for CommandRebuild {
    fn request(&mut self, session_tag: &str) -> Result<(), RebuildError> {
        if self.child.is_some() {
            return Err(RebuildError::AlreadyRunning);
        }
        if self.program.trim().is_empty() {
            return Err(RebuildError::EmptyCommand);
        }
        let child = Command::new(&self.program)
            .args(&self.args)
            .env("TABULA_SESSION", session_tag)
            .spawn()
            .map_err(|source| RebuildError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        tracing::info!(program = %self.program, pid = child.id(), "rebuild started");
        self.child = Some(child);
        Ok(())
    }

    fn poll(&mut self) -> RebuildStatus {
        let Some(child) = self.child.as_mut() else {
            return RebuildStatus::Failed("no rebuild was requested".to_string());
        };
        let status = match child.try_wait() {
            Ok(None) => return RebuildStatus::Pending,
            Ok(Some(exit)) if exit.success() => RebuildStatus::Succeeded,
            Ok(Some(exit)) => RebuildStatus::Failed(format!("rebuild exited with {exit}")),
            Err(e) => RebuildStatus::Failed(format!("cannot query rebuild: {e}")),
        };
        self.child = None;
        status
    }
}

impl Drop for CommandRebuild {
    fn drop(&mut self) {
        // An abandoned rebuild (timeout) must not outlive the coordinator.
        if let Some(child) = self.child.as_mut() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

// ===========================================================================
// Fixed outcome
// ===========================================================================

/// A trigger that performs no work and reports a fixed outcome.
///
/// `succeeded()` suits hosts that are rebuilt out of band, for example by a
/// file watcher; the coordinator then treats the rebuild as finished at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoRebuild {
    outcome: RebuildStatus,
    requested: Vec<String>,
}

impl NoRebuild {
    pub fn succeeded() -> Self {
        Self::with_outcome(RebuildStatus::Succeeded)
    }

    pub fn with_outcome(outcome: RebuildStatus) -> Self {
        Self {
            outcome,
            requested: Vec::new(),
        }
    }

    /// Session tags passed to `request`, oldest first.
    pub fn requested(&self) -> &[String] {
        &self.requested
    }
}

impl RebuildTrigger for NoRebuild {
    fn request(&mut self, session_tag: &str) -> Result<(), RebuildError> {
        self.requested.push(session_tag.to_string());
        Ok(())
    }

    fn poll(&mut self) -> RebuildStatus {
        self.outcome.clone()
    }
}
