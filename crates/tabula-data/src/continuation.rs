//! Durable state that crosses a host rebuild.
//!
//! Generating code invalidates the running host, so nothing the compiler
//! holds in memory survives to the import step. Before a rebuild is
//! requested the coordinator saves a [`PendingContinuation`]; the rebuilt
//! host loads it to learn which tables to import and where to write the
//! snapshot, then clears it.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::schema::TableSchema;

/// Current continuation format version.
pub const CONTINUATION_VERSION: u32 = 1;

// ===========================================================================
// Errors
// ===========================================================================

#[derive(Debug, thiserror::Error)]
pub enum ContinuationError {
    #[error("continuation I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed continuation at {path}: {detail}")]
    Malformed { path: PathBuf, detail: String },

    /// Written by a newer or older tool; the schema layout may differ.
    #[error("continuation version {found} is not supported (expected {CONTINUATION_VERSION})")]
    UnsupportedVersion { found: u32 },
}

// ===========================================================================
// Record
// ===========================================================================

/// Everything the resume step needs, recorded before the rebuild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingContinuation {
    pub version: u32,
    /// Session tag compiled into the generated container.
    pub session_tag: String,
    /// Schemas of the tables emitted in this session.
    pub tables: Vec<TableSchema>,
    pub generated_path: PathBuf,
    pub snapshot_path: PathBuf,
}

impl PendingContinuation {
    pub fn new(
        session_tag: impl Into<String>,
        tables: Vec<TableSchema>,
        generated_path: impl Into<PathBuf>,
        snapshot_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            version: CONTINUATION_VERSION,
            session_tag: session_tag.into(),
            tables,
            generated_path: generated_path.into(),
            snapshot_path: snapshot_path.into(),
        }
    }
}

// ===========================================================================
// Stores
// ===========================================================================

/// Persists at most one pending continuation.
pub trait ContinuationStore {
    fn save(&self, continuation: &PendingContinuation) -> Result<(), ContinuationError>;

    /// The saved continuation, or `None` when nothing is pending.
    fn load(&self) -> Result<Option<PendingContinuation>, ContinuationError>;

    /// Remove the saved continuation. Clearing an empty store succeeds.
    fn clear(&self) -> Result<(), ContinuationError>;
}

/// Stores the continuation as a JSON file.
#[derive(Debug, Clone)]
pub struct FileContinuationStore {
    path: PathBuf,
}

impl FileContinuationStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> ContinuationError {
        ContinuationError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl ContinuationStore for FileContinuationStore {
    fn save(&self, continuation: &PendingContinuation) -> Result<(), ContinuationError> {
        let json = serde_json::to_string_pretty(continuation).map_err(|e| {
            ContinuationError::Malformed {
                path: self.path.clone(),
                detail: e.to_string(),
            }
        })?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| self.io_err(e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| self.io_err(e))?;
        tracing::debug!(path = %self.path.display(), session = %continuation.session_tag, "saved continuation");
        Ok(())
    }

    fn load(&self) -> Result<Option<PendingContinuation>, ContinuationError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_err(e)),
        };

        // Check the version before the full shape so an incompatible file
        // is reported as such rather than as malformed.
        #[derive(Deserialize)]
        struct Versioned {
            version: u32,
        }
        let malformed = |e: serde_json::Error| ContinuationError::Malformed {
            path: self.path.clone(),
            detail: e.to_string(),
        };
        let Versioned { version } = serde_json::from_str(&text).map_err(malformed)?;
        if version != CONTINUATION_VERSION {
            return Err(ContinuationError::UnsupportedVersion { found: version });
        }
        serde_json::from_str(&text).map(Some).map_err(malformed)
    }

    fn clear(&self) -> Result<(), ContinuationError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_err(e)),
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::read_schema;
    use crate::source::{Sheet, SourceLocator};
    use tabula_core::test_utils::{cleanup, make_test_dir};

    fn continuation() -> PendingContinuation {
        let sheet = Sheet::from_rows(
            "Reward",
            &[
                &["monster", "stage", "item"],
                &["1", "2", ""],
                &["int", "int", "long"],
            ],
        );
        let schema = read_schema(&sheet, SourceLocator::new("tables/Reward.csv", "Reward")).unwrap();
        PendingContinuation::new(
            "0123456789abcdef",
            vec![schema],
            "src/config_tables.rs",
            "assets/config.bin",
        )
    }

    #[test]
    fn save_load_round_trip() {
        let dir = make_test_dir("cont_round_trip");
        let store = FileContinuationStore::new(dir.join("state").join("pending.json"));

        store.save(&continuation()).unwrap();
        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded, continuation());
        assert_eq!(loaded.tables[0].columns[1].key_priority, Some(2));
        assert!(!store.path().with_extension("json.tmp").exists());

        cleanup(&dir);
    }

    #[test]
    fn missing_file_is_nothing_pending() {
        let dir = make_test_dir("cont_missing");
        let store = FileContinuationStore::new(dir.join("pending.json"));
        assert_eq!(store.load().unwrap(), None);
        cleanup(&dir);
    }

    #[test]
    fn clear_removes_and_is_idempotent() {
        let dir = make_test_dir("cont_clear");
        let store = FileContinuationStore::new(dir.join("pending.json"));

        store.save(&continuation()).unwrap();
        store.clear().unwrap();
        assert!(!store.path().exists());
        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);

        cleanup(&dir);
    }

    #[test]
    fn other_version_is_rejected() {
        let dir = make_test_dir("cont_version");
        let store = FileContinuationStore::new(dir.join("pending.json"));
        std::fs::write(store.path(), r#"{"version": 99, "whatever": true}"#).unwrap();

        assert!(matches!(
            store.load(),
            Err(ContinuationError::UnsupportedVersion { found: 99 })
        ));

        cleanup(&dir);
    }

    #[test]
    fn garbage_is_malformed() {
        let dir = make_test_dir("cont_garbage");
        let store = FileContinuationStore::new(dir.join("pending.json"));
        std::fs::write(store.path(), "not json").unwrap();

        assert!(matches!(store.load(), Err(ContinuationError::Malformed { .. })));

        cleanup(&dir);
    }
}
