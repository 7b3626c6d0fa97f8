//! Binary snapshot codec for generated containers.
//!
//! A snapshot is a bitcode-encoded envelope: a [`SnapshotHeader`] followed by
//! the bitcode payload of the container. Keeping the payload as opaque bytes
//! lets tools read the header without knowing the container type, and lets
//! [`decode`] reject a snapshot produced for different generated code before
//! touching the payload.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::record::ConfigContainer;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic number identifying a Tabula configuration snapshot.
pub const SNAPSHOT_MAGIC: u32 = 0x7AB1_0001;

/// Current format version. Increment when breaking the envelope format.
pub const FORMAT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur while encoding or writing a snapshot.
#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error("bitcode encoding failed: {0}")]
    Encode(String),
    #[error("failed to write snapshot {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Errors that can occur while reading or decoding a snapshot.
#[derive(Debug, thiserror::Error)]
pub enum DeserializeError {
    #[error("invalid magic number: expected 0x{:08X}, got 0x{:08X}", SNAPSHOT_MAGIC, .0)]
    InvalidMagic(u32),
    #[error("unsupported format version: expected {}, got {}", FORMAT_VERSION, .0)]
    UnsupportedVersion(u32),
    #[error("snapshot from future version {0} (this build supports up to {FORMAT_VERSION})")]
    FutureVersion(u32),
    #[error("snapshot was generated for session {found}, container expects {expected}")]
    SessionMismatch { expected: String, found: String },
    #[error("bitcode decoding failed: {0}")]
    Decode(String),
    #[error("failed to read snapshot {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Snapshot header
// ---------------------------------------------------------------------------

/// Header prepended to every snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotHeader {
    /// Magic number for format detection.
    pub magic: u32,
    /// Envelope format version.
    pub version: u32,
    /// Session tag of the generated container that produced the payload.
    pub session_tag: String,
    /// Number of tables in the container.
    pub table_count: u32,
}

impl SnapshotHeader {
    /// Create a header for the current format version.
    pub fn new(session_tag: &str, table_count: usize) -> Self {
        Self {
            magic: SNAPSHOT_MAGIC,
            version: FORMAT_VERSION,
            session_tag: session_tag.to_string(),
            table_count: table_count as u32,
        }
    }

    /// Check magic and version. The session tag is checked by [`decode`].
    pub fn validate(&self) -> Result<(), DeserializeError> {
        if self.magic != SNAPSHOT_MAGIC {
            return Err(DeserializeError::InvalidMagic(self.magic));
        }
        if self.version > FORMAT_VERSION {
            return Err(DeserializeError::FutureVersion(self.version));
        }
        if self.version < FORMAT_VERSION {
            return Err(DeserializeError::UnsupportedVersion(self.version));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    header: SnapshotHeader,
    payload: Vec<u8>,
}

fn open_envelope(data: &[u8]) -> Result<Envelope, DeserializeError> {
    let envelope: Envelope =
        bitcode::deserialize(data).map_err(|e| DeserializeError::Decode(e.to_string()))?;
    envelope.header.validate()?;
    Ok(envelope)
}

// ---------------------------------------------------------------------------
// Encode / decode
// ---------------------------------------------------------------------------

/// Encode a container into snapshot bytes.
pub fn encode<C: ConfigContainer>(container: &C) -> Result<Vec<u8>, SerializeError> {
    let payload =
        bitcode::serialize(container).map_err(|e| SerializeError::Encode(e.to_string()))?;
    let envelope = Envelope {
        header: SnapshotHeader::new(C::SESSION_TAG, C::TABLES.len()),
        payload,
    };
    bitcode::serialize(&envelope).map_err(|e| SerializeError::Encode(e.to_string()))
}

/// Decode snapshot bytes into a container.
///
/// Fails without decoding the payload when the header is invalid or was
/// written for a different session.
pub fn decode<C: ConfigContainer>(data: &[u8]) -> Result<C, DeserializeError> {
    let envelope = open_envelope(data)?;
    if envelope.header.session_tag != C::SESSION_TAG {
        return Err(DeserializeError::SessionMismatch {
            expected: C::SESSION_TAG.to_string(),
            found: envelope.header.session_tag,
        });
    }
    bitcode::deserialize(&envelope.payload).map_err(|e| DeserializeError::Decode(e.to_string()))
}

/// Read only the header of a snapshot.
pub fn read_header(data: &[u8]) -> Result<SnapshotHeader, DeserializeError> {
    open_envelope(data).map(|envelope| envelope.header)
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

/// Encode `container` and write it to `path`.
///
/// The bytes are written to a sibling temporary file and renamed into place,
/// so a failure never leaves a truncated snapshot where the previous one was.
pub fn write_snapshot<C: ConfigContainer>(path: &Path, container: &C) -> Result<(), SerializeError> {
    let bytes = encode(container)?;
    let write_err = |source| SerializeError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    fs::write(&tmp, &bytes).map_err(write_err)?;
    fs::rename(&tmp, path).map_err(write_err)?;
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "wrote snapshot");
    Ok(())
}

/// Read and decode the snapshot at `path`.
pub fn read_snapshot<C: ConfigContainer>(path: &Path) -> Result<C, DeserializeError> {
    let bytes = fs::read(path).map_err(|source| DeserializeError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    decode(&bytes)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn round_trip_sample_tables() {
        let tables = sample_tables();
        let bytes = encode(&tables).unwrap();
        let decoded: SampleTables = decode(&bytes).unwrap();
        assert_eq!(decoded, tables);
    }

    #[test]
    fn round_trip_empty_tables() {
        let tables = SampleTables::default();
        let decoded: SampleTables = decode(&encode(&tables).unwrap()).unwrap();
        assert_eq!(decoded, tables);
    }

    #[test]
    fn header_is_readable_without_container_type() {
        let bytes = encode(&sample_tables()).unwrap();
        let header = read_header(&bytes).unwrap();
        assert_eq!(header.magic, SNAPSHOT_MAGIC);
        assert_eq!(header.version, FORMAT_VERSION);
        assert_eq!(header.session_tag, SAMPLE_SESSION_TAG);
        assert_eq!(header.table_count, 2);
    }

    #[test]
    fn garbage_fails_to_decode() {
        let result: Result<SampleTables, _> = decode(&[1, 2, 3]);
        assert!(matches!(result, Err(DeserializeError::Decode(_))));
    }

    #[test]
    fn header_validation() {
        let mut header = SnapshotHeader::new("abc", 1);
        assert!(header.validate().is_ok());

        header.magic = 0xDEAD_BEEF;
        assert!(matches!(
            header.validate(),
            Err(DeserializeError::InvalidMagic(0xDEAD_BEEF))
        ));

        header.magic = SNAPSHOT_MAGIC;
        header.version = FORMAT_VERSION + 1;
        assert!(matches!(
            header.validate(),
            Err(DeserializeError::FutureVersion(_))
        ));

        header.version = 0;
        assert!(matches!(
            header.validate(),
            Err(DeserializeError::UnsupportedVersion(0))
        ));
    }

    #[test]
    fn session_mismatch_is_rejected() {
        let envelope = Envelope {
            header: SnapshotHeader::new("someone-else", 2),
            payload: bitcode::serialize(&sample_tables()).unwrap(),
        };
        let bytes = bitcode::serialize(&envelope).unwrap();
        let result: Result<SampleTables, _> = decode(&bytes);
        assert!(matches!(
            result,
            Err(DeserializeError::SessionMismatch { ref found, .. }) if found == "someone-else"
        ));
    }

    #[test]
    fn write_then_read_file() {
        let dir = make_test_dir("codec_file");
        let path = dir.join("nested").join("config.bin");

        write_snapshot(&path, &sample_tables()).unwrap();
        let loaded: SampleTables = read_snapshot(&path).unwrap();
        assert_eq!(loaded, sample_tables());
        assert!(!dir.join("nested").join("config.bin.tmp").exists());

        cleanup(&dir);
    }

    #[test]
    fn read_missing_file() {
        let result: Result<SampleTables, _> =
            read_snapshot(Path::new("/definitely/not/here/config.bin"));
        assert!(matches!(result, Err(DeserializeError::Read { .. })));
    }
}
