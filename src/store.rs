//! Durable, append-only prime ledger.
//!
//! The ledger is persisted as comma-separated decimal text.  Appends rewrite
//! the file through a temporary sibling that is synced and atomically renamed
//! into place while the write lock is held; the in-memory sequence only
//! advances once that rename has succeeded, so readers never observe an entry
//! that is not already on disk.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};

const SEPARATOR: char = ',';

/// Counts and tip observed under a single lock acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerStatus {
    /// Number of primes held.
    pub count: u64,
    /// Largest prime held, if any.
    pub most_recent: Option<u64>,
}

/// Owned copy of a ledger prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerSnapshot {
    primes: Vec<u64>,
}

impl LedgerSnapshot {
    /// Number of entries in the snapshot.
    pub fn count(&self) -> u64 {
        self.primes.len() as u64
    }

    /// Last entry of the snapshot.
    pub fn last(&self) -> Option<u64> {
        self.primes.last().copied()
    }

    /// Entries in ledger order.
    pub fn primes(&self) -> &[u64] {
        &self.primes
    }

    /// Returns `true` when the snapshot holds no entries.
    pub fn is_empty(&self) -> bool {
        self.primes.is_empty()
    }

    /// Consumes the snapshot and returns its entries.
    pub fn into_primes(self) -> Vec<u64> {
        self.primes
    }
}

#[derive(Debug, Default)]
struct LedgerState {
    primes: Vec<u64>,
    /// Mirror of the file contents.
    encoded: String,
}

/// Thread-safe handle over the persisted ledger.
#[derive(Debug)]
pub struct LedgerStore {
    path: PathBuf,
    state: RwLock<LedgerState>,
}

impl LedgerStore {
    /// Opens the ledger at `path`.  A missing or blank file yields an empty ledger.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let primes = load_ledger(&path)?;
        let encoded = encode_ledger(&primes);
        tracing::info!(path = %path.display(), count = primes.len(), "ledger loaded");
        Ok(Self {
            path,
            state: RwLock::new(LedgerState { primes, encoded }),
        })
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends `batch`, persisting it before it becomes visible.  Returns the
    /// ledger length after the append.
    ///
    /// An empty batch is accepted without touching the file.  A batch that is
    /// not strictly increasing past the current tip is rejected before any
    /// I/O; a failed write leaves both the file and the in-memory ledger as
    /// they were.
    pub fn append(&self, batch: &[u64]) -> Result<u64> {
        let mut state = self.state.write();
        check_extends(state.primes.last().copied(), batch)?;
        if batch.is_empty() {
            return Ok(state.primes.len() as u64);
        }

        let mut tail = String::new();
        for (idx, prime) in batch.iter().enumerate() {
            if idx > 0 || !state.encoded.is_empty() {
                tail.push(SEPARATOR);
            }
            tail.push_str(&prime.to_string());
        }
        write_durably(&self.path, &state.encoded, &tail).map_err(|err| {
            tracing::error!(path = %self.path.display(), %err, "ledger write failed");
            LedgerError::Io(err)
        })?;

        state.encoded.push_str(&tail);
        state.primes.extend_from_slice(batch);
        let count = state.primes.len() as u64;
        tracing::debug!(appended = batch.len(), count, "ledger extended");
        Ok(count)
    }

    /// Number of primes durably held.
    pub fn count(&self) -> u64 {
        self.state.read().primes.len() as u64
    }

    /// Largest prime durably held.
    pub fn most_recent(&self) -> Option<u64> {
        self.state.read().primes.last().copied()
    }

    /// Count and tip read together.
    pub fn status(&self) -> LedgerStatus {
        let state = self.state.read();
        LedgerStatus {
            count: state.primes.len() as u64,
            most_recent: state.primes.last().copied(),
        }
    }

    /// Copy of the first `n` entries.
    pub fn snapshot(&self, n: u64) -> Result<LedgerSnapshot> {
        let state = self.state.read();
        let available = state.primes.len() as u64;
        if n == 0 || n > available {
            return Err(LedgerError::OutOfRange {
                requested: n,
                available,
            });
        }
        Ok(LedgerSnapshot {
            primes: state.primes[..n as usize].to_vec(),
        })
    }

    /// Copy of the whole ledger, possibly empty.
    pub fn latest(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            primes: self.state.read().primes.clone(),
        }
    }

    /// Runs `f` over the ledger while holding the read lock.
    pub fn with_primes<R>(&self, f: impl FnOnce(&[u64]) -> R) -> R {
        let state = self.state.read();
        f(&state.primes)
    }
}

/// Reads and parses the ledger file.  A missing file is an empty ledger.
pub fn load_ledger(path: &Path) -> Result<Vec<u64>> {
    match fs::read_to_string(path) {
        Ok(text) => parse_ledger(&text),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(err) => Err(err.into()),
    }
}

/// Parses comma-separated decimal text into a strictly increasing sequence of
/// positive integers.
pub fn parse_ledger(text: &str) -> Result<Vec<u64>> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(Vec::new());
    }
    let mut primes: Vec<u64> = Vec::new();
    for (position, token) in text.split(SEPARATOR).enumerate() {
        let corrupt = || LedgerError::CorruptLedger {
            position,
            token: token.to_string(),
        };
        let value = token.trim().parse::<u64>().map_err(|_| corrupt())?;
        if value == 0 || primes.last().is_some_and(|last| *last >= value) {
            return Err(corrupt());
        }
        primes.push(value);
    }
    Ok(primes)
}

/// Canonical text form of a ledger.
pub fn encode_ledger(primes: &[u64]) -> String {
    primes
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn check_extends(tip: Option<u64>, batch: &[u64]) -> Result<()> {
    let mut previous = tip;
    for &next in batch {
        if next == 0 || previous.is_some_and(|prev| prev >= next) {
            return Err(LedgerError::NonMonotonic {
                tip: previous,
                next,
            });
        }
        previous = Some(next);
    }
    Ok(())
}

fn write_durably(path: &Path, head: &str, tail: &str) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = staging_path(path);
    let written = (|| {
        let mut file = File::create(&tmp_path)?;
        file.write_all(head.as_bytes())?;
        file.write_all(tail.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)?;
        sync_parent(path)
    })();
    if written.is_err() && tmp_path.is_file() {
        if let Err(err) = fs::remove_file(&tmp_path) {
            tracing::warn!(path = %tmp_path.display(), %err, "could not remove staging file");
        }
    }
    written
}

/// Flushes the directory entry so the rename itself survives a crash.
#[cfg(unix)]
fn sync_parent(path: &Path) -> io::Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    File::open(parent)?.sync_all()
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> io::Result<()> {
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| "ledger".into());
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_and_blank_files_are_empty() {
        let dir = tempdir().unwrap();
        let store = LedgerStore::open(dir.path().join("primes.csv")).unwrap();
        assert_eq!(store.count(), 0);
        assert_eq!(store.most_recent(), None);

        let blank = dir.path().join("blank.csv");
        fs::write(&blank, "  \n").unwrap();
        assert_eq!(LedgerStore::open(&blank).unwrap().count(), 0);
    }

    #[test]
    fn appends_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("primes.csv");
        let store = LedgerStore::open(&path).unwrap();
        assert_eq!(store.append(&[2, 3, 5]).unwrap(), 3);
        assert_eq!(store.append(&[7, 11]).unwrap(), 5);
        assert_eq!(fs::read_to_string(&path).unwrap(), "2,3,5,7,11");

        let reopened = LedgerStore::open(&path).unwrap();
        assert_eq!(reopened.latest().primes(), &[2, 3, 5, 7, 11]);
        assert_eq!(reopened.most_recent(), Some(11));
    }

    #[test]
    fn empty_batch_is_a_noop() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("primes.csv");
        let store = LedgerStore::open(&path).unwrap();
        assert_eq!(store.append(&[]).unwrap(), 0);
        assert!(!path.exists());
    }

    #[test]
    fn corrupt_tokens_are_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("primes.csv");
        fs::write(&path, "2,3,x5,7").unwrap();
        match LedgerStore::open(&path) {
            Err(LedgerError::CorruptLedger { position, token }) => {
                assert_eq!(position, 2);
                assert_eq!(token, "x5");
            }
            other => panic!("expected corrupt ledger, got {other:?}"),
        }
        assert!(parse_ledger("2,3,3").is_err());
        assert!(parse_ledger("2,,3").is_err());
        assert_eq!(parse_ledger("2, 3,5\n").unwrap(), vec![2, 3, 5]);
    }

    #[test]
    fn zero_is_never_a_ledger_entry() {
        assert!(matches!(
            parse_ledger("0,1,4"),
            Err(LedgerError::CorruptLedger { position: 0, .. })
        ));

        let dir = tempdir().unwrap();
        let path = dir.path().join("primes.csv");
        fs::write(&path, "0,2,3").unwrap();
        assert!(LedgerStore::open(&path).is_err());

        let store = LedgerStore::open(dir.path().join("fresh.csv")).unwrap();
        assert!(matches!(
            store.append(&[0, 2]),
            Err(LedgerError::NonMonotonic { tip: None, next: 0 })
        ));
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn appends_into_a_new_directory_are_synced() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("primes.csv");
        let store = LedgerStore::open(&path).unwrap();
        store.append(&[2, 3, 5]).unwrap();
        assert!(!staging_path(&path).exists());
        assert_eq!(load_ledger(&path).unwrap(), vec![2, 3, 5]);
        sync_parent(&path).unwrap();
        sync_parent(Path::new("primes.csv")).unwrap();
    }

    #[test]
    fn non_monotonic_batches_are_rejected() {
        let dir = tempdir().unwrap();
        let store = LedgerStore::open(dir.path().join("primes.csv")).unwrap();
        store.append(&[2, 3, 5]).unwrap();
        assert!(matches!(
            store.append(&[5, 7]),
            Err(LedgerError::NonMonotonic { tip: Some(5), next: 5 })
        ));
        assert!(store.append(&[11, 7]).is_err());
        assert_eq!(store.count(), 3);
    }

    #[test]
    fn failed_write_leaves_ledger_unchanged() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("primes.csv");
        let store = LedgerStore::open(&path).unwrap();
        store.append(&[2, 3]).unwrap();

        // A directory squatting on the staging path makes the write fail.
        fs::create_dir(staging_path(&path)).unwrap();
        assert!(matches!(store.append(&[5]), Err(LedgerError::Io(_))));
        assert_eq!(store.count(), 2);
        assert_eq!(store.most_recent(), Some(3));
        assert_eq!(fs::read_to_string(&path).unwrap(), "2,3");

        fs::remove_dir(staging_path(&path)).unwrap();
        assert_eq!(store.append(&[5]).unwrap(), 3);
        assert_eq!(fs::read_to_string(&path).unwrap(), "2,3,5");
    }

    #[test]
    fn snapshot_bounds() {
        let dir = tempdir().unwrap();
        let store = LedgerStore::open(dir.path().join("primes.csv")).unwrap();
        assert!(matches!(
            store.snapshot(1),
            Err(LedgerError::OutOfRange { requested: 1, available: 0 })
        ));
        store.append(&[2, 3, 5, 7]).unwrap();
        let prefix = store.snapshot(3).unwrap();
        assert_eq!(prefix.primes(), &[2, 3, 5]);
        assert_eq!(prefix.last(), Some(5));
        assert!(store.snapshot(0).is_err());
        assert!(store.snapshot(5).is_err());
        assert_eq!(
            store.status(),
            LedgerStatus {
                count: 4,
                most_recent: Some(7)
            }
        );
    }
}
