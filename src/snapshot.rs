//! Persisted aggregate snapshots
//!
//! A snapshot is a single fixed-width binary record of an [`Aggregate`],
//! written on every publish cycle and loaded once at startup when restore is
//! enabled. The record is bincode with its legacy options: little-endian,
//! fixed-size integers, fields in declaration order, 100 bytes total:
//!
//! | field               | type | bytes |
//! |---------------------|------|-------|
//! | timestamp_reference | u32  | 4     |
//! | argmin              | i64  | 8     |
//! | argmax              | i64  | 8     |
//! | count               | u64  | 8     |
//! | duration            | u64  | 8     |
//! | duration_squared    | u64  | 8     |
//! | c2                  | f64  | 8     |
//! | max                 | f64  | 8     |
//! | min                 | f64  | 8     |
//! | m2                  | f64  | 8     |
//! | mean                | f64  | 8     |
//! | timestamp_m2        | f64  | 8     |
//! | timestamp_mean      | f64  | 8     |
//!
//! Records are keyed by an FNV-1 hash of the statistic's configuration
//! identity, so renaming a statistic (or changing its `config_id`) orphans
//! the old record rather than restoring a mismatched aggregate.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::aggregate::Aggregate;
use crate::error::{SnapshotError, SnapshotResult};

/// Exact size of an encoded snapshot record in bytes
pub const SNAPSHOT_RECORD_LEN: usize = 100;

/// Serialized form of an [`Aggregate`] with explicit fixed-width fields
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct AggregateSnapshot {
    timestamp_reference: u32,
    argmin: i64,
    argmax: i64,
    count: u64,
    duration: u64,
    duration_squared: u64,
    c2: f64,
    max: f64,
    min: f64,
    m2: f64,
    mean: f64,
    timestamp_m2: f64,
    timestamp_mean: f64,
}

impl From<&Aggregate> for AggregateSnapshot {
    fn from(aggregate: &Aggregate) -> Self {
        Self {
            timestamp_reference: aggregate.timestamp_reference,
            argmin: aggregate.argmin,
            argmax: aggregate.argmax,
            count: aggregate.count as u64,
            duration: aggregate.duration,
            duration_squared: aggregate.duration_squared,
            c2: aggregate.c2,
            max: aggregate.max,
            min: aggregate.min,
            m2: aggregate.m2,
            mean: aggregate.mean,
            timestamp_m2: aggregate.timestamp_m2,
            timestamp_mean: aggregate.timestamp_mean,
        }
    }
}

impl From<AggregateSnapshot> for Aggregate {
    fn from(snapshot: AggregateSnapshot) -> Self {
        Self {
            timestamp_reference: snapshot.timestamp_reference,
            argmin: snapshot.argmin,
            argmax: snapshot.argmax,
            count: snapshot.count as usize,
            duration: snapshot.duration,
            duration_squared: snapshot.duration_squared,
            c2: snapshot.c2,
            max: snapshot.max,
            min: snapshot.min,
            m2: snapshot.m2,
            mean: snapshot.mean,
            timestamp_m2: snapshot.timestamp_m2,
            timestamp_mean: snapshot.timestamp_mean,
        }
    }
}

/// Encode an aggregate into the fixed-width snapshot record
pub fn encode_aggregate(aggregate: &Aggregate) -> SnapshotResult<Vec<u8>> {
    bincode::serialize(&AggregateSnapshot::from(aggregate))
        .map_err(|err| SnapshotError::Encode(err.to_string()))
}

/// Decode a snapshot record back into an aggregate.
///
/// The record length is checked first: bincode tolerates trailing bytes, and
/// a record of the wrong size means the store holds something that was never
/// a valid snapshot.
pub fn decode_aggregate(bytes: &[u8]) -> SnapshotResult<Aggregate> {
    if bytes.len() != SNAPSHOT_RECORD_LEN {
        return Err(SnapshotError::Decode(format!(
            "expected a {SNAPSHOT_RECORD_LEN} byte record, got {} bytes",
            bytes.len()
        )));
    }
    let snapshot: AggregateSnapshot =
        bincode::deserialize(bytes).map_err(|err| SnapshotError::Decode(err.to_string()))?;
    Ok(snapshot.into())
}

/// Storage key for a statistic's snapshot, derived from its configuration
/// identity with a 32-bit FNV-1 hash
pub fn snapshot_key(config_id: &str) -> u32 {
    fnv1_hash(&format!("statistics_component_{config_id}"))
}

fn fnv1_hash(input: &str) -> u32 {
    let mut hash: u32 = 2166136261;
    for byte in input.bytes() {
        hash = hash.wrapping_mul(16777619);
        hash ^= byte as u32;
    }
    hash
}

/// Key-value store holding one snapshot record per statistic
pub trait SnapshotStore {
    /// Persist `bytes` under `key`, replacing any previous record
    fn save(&mut self, key: u32, bytes: &[u8]) -> SnapshotResult<()>;

    /// Load the record stored under `key`, if any
    fn load(&self, key: u32) -> SnapshotResult<Option<Vec<u8>>>;
}

/// In-memory snapshot store; state does not survive restarts.
///
/// Useful for tests and for deployments that only want the publish-cycle
/// write path without durability.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    entries: HashMap<u32, Vec<u8>>,
}

impl MemorySnapshotStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn save(&mut self, key: u32, bytes: &[u8]) -> SnapshotResult<()> {
        trace!(key, len = bytes.len(), "saving snapshot to memory");
        self.entries.insert(key, bytes.to_vec());
        Ok(())
    }

    fn load(&self, key: u32) -> SnapshotResult<Option<Vec<u8>>> {
        Ok(self.entries.get(&key).cloned())
    }
}

/// File-backed snapshot store: one `<key>.bin` file per statistic under a
/// directory
#[derive(Debug)]
pub struct FileSnapshotStore {
    directory: PathBuf,
}

impl FileSnapshotStore {
    /// Open (creating if needed) a store rooted at `directory`
    pub fn new(directory: impl Into<PathBuf>) -> SnapshotResult<Self> {
        let directory = directory.into();
        fs::create_dir_all(&directory)?;
        Ok(Self { directory })
    }

    fn path_for(&self, key: u32) -> PathBuf {
        self.directory.join(format!("{key:08x}.bin"))
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn save(&mut self, key: u32, bytes: &[u8]) -> SnapshotResult<()> {
        let path = self.path_for(key);
        trace!(key, path = %path.display(), "saving snapshot to file");
        fs::write(path, bytes)?;
        Ok(())
    }

    fn load(&self, key: u32) -> SnapshotResult<Option<Vec<u8>>> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(SnapshotError::Io(err)),
        }
    }
}
