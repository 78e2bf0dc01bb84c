//! Persistent per-user authentication records.
//!
//! The key file holds one text line per user, `username seed count
//! key-hex`, whitespace-delimited, count decimal, key as sixteen hex
//! digits. [`FileKeyStore`] reproduces that format; [`MemoryKeyStore`]
//! offers the same contract over a map for embedders and tests.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::{debug, warn};

use crate::error::StoreError;
use crate::key::Key;

/// One user's entry in the key store.
///
/// `key` is the key at iteration `count`: the last value the user
/// proved, not the next expected one. The challenge issued from this
/// record targets `count - 1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    /// Login name, unique per store.
    pub username: String,
    /// Public seed, lowercase alphanumeric.
    pub seed: String,
    /// Iteration of the last accepted password.
    pub count: u32,
    /// Key at iteration `count`.
    pub key: Key,
}

/// Per-user record persistence.
///
/// `commit` is atomic with respect to concurrent lookups and commits for
/// the same username: no reader observes a count without its matching
/// key, once `commit` returns the new state is what every subsequent
/// `lookup` sees, and a failed commit leaves the prior record intact.
/// Commits for different usernames do not serialize on each other.
pub trait KeyStore: Send + Sync {
    /// Fetches the record for `username`.
    fn lookup(&self, username: &str) -> Result<UserRecord, StoreError>;

    /// Replaces `username`'s count and key, all-or-nothing.
    fn commit(&self, username: &str, new_count: u32, new_key: Key) -> Result<(), StoreError>;

    /// Creates or replaces a record (provisioning).
    fn register(&self, record: &UserRecord) -> Result<(), StoreError>;
}

/// Formats a record line, without the trailing newline.
///
/// The count is zero-padded so that normal chain consumption (count only
/// ever decreases) never changes the line length, which is what lets
/// `commit` rewrite a record in place.
fn format_record(record: &UserRecord) -> String {
    format!("{} {} {:05} {}", record.username, record.seed, record.count, record.key.to_hex())
}

/// Parses a record line. `None` means the line does not parse at all.
fn parse_record(line: &str) -> Option<UserRecord> {
    let mut fields = line.split_ascii_whitespace();
    let username = fields.next()?;
    let seed = fields.next()?;
    let count = fields.next()?.parse::<u32>().ok()?;
    let key = Key::from_hex(fields.next()?).ok()?;
    Some(UserRecord { username: username.to_string(), seed: seed.to_string(), count, key })
}

/// A located record: where its line starts and how many bytes it spans
/// (newline excluded).
struct Located {
    offset: u64,
    line_len: usize,
    record: UserRecord,
}

/// Key file on disk.
///
/// Same-user operations serialize on a per-user lock; commits that keep
/// the line width (the normal case, thanks to the padded count) overwrite
/// the record's own bytes in place, so users on different lines proceed
/// in parallel. Width-changing updates (re-registration, or records
/// written by other tools with a different count width) fall back to an
/// exclusive whole-file rewrite through a temp file in the same
/// directory, renamed over the original.
pub struct FileKeyStore {
    path: PathBuf,
    /// Per-user serialization of lookups and commits.
    user_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    /// Held shared by record ops, exclusively by whole-file rewrites.
    file_lock: RwLock<()>,
    /// Record-start offsets from earlier scans, so re-reads within a
    /// session skip the scan. Verified before trust, rebuilt on miss.
    offsets: Mutex<HashMap<String, u64>>,
}

impl FileKeyStore {
    /// Opens a store over `path`. The file need not exist yet; `register`
    /// creates it.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            user_locks: Mutex::new(HashMap::new()),
            file_lock: RwLock::new(()),
            offsets: Mutex::new(HashMap::new()),
        }
    }

    /// The key file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn user_lock(&self, username: &str) -> Arc<Mutex<()>> {
        let mut locks = self.user_locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(username.to_string()).or_default())
    }

    /// Reads the record at a remembered offset, if it is still there.
    fn read_at(&self, username: &str, offset: u64) -> Option<Located> {
        let file = File::open(&self.path).ok()?;
        let mut reader = BufReader::new(file);
        reader.seek(SeekFrom::Start(offset)).ok()?;
        let mut line = String::new();
        reader.read_line(&mut line).ok()?;
        let trimmed = line.trim_end_matches(['\r', '\n']);
        let record = parse_record(trimmed)?;
        (record.username == username).then(|| Located { offset, line_len: trimmed.len(), record })
    }

    /// Scans the file for `username`, refreshing the offset cache.
    fn scan(&self, username: &str) -> Result<Located, StoreError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound { username: username.to_string() });
            }
            Err(err) => return Err(err.into()),
        };
        let mut reader = BufReader::new(file);
        let mut offset = 0u64;
        let mut line = String::new();
        loop {
            line.clear();
            let read = reader.read_line(&mut line)?;
            if read == 0 {
                return Err(StoreError::NotFound { username: username.to_string() });
            }
            let trimmed = line.trim_end_matches(['\r', '\n']);
            if trimmed.split_ascii_whitespace().next() == Some(username) {
                let record = parse_record(trimmed).ok_or_else(|| {
                    warn!(user = username, "unparsable key file record");
                    StoreError::CorruptRecord { username: username.to_string() }
                })?;
                self.offsets
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(username.to_string(), offset);
                return Ok(Located { offset, line_len: trimmed.len(), record });
            }
            offset += read as u64;
        }
    }

    /// Finds `username`'s record, via the offset cache when possible.
    fn locate(&self, username: &str) -> Result<Located, StoreError> {
        let cached = self.offsets.lock().unwrap_or_else(PoisonError::into_inner).get(username).copied();
        if let Some(offset) = cached {
            if let Some(found) = self.read_at(username, offset) {
                return Ok(found);
            }
        }
        self.scan(username)
    }

    /// Replaces or appends `username`'s line under the exclusive lock,
    /// writing a fresh file beside the old one and renaming over it.
    fn rewrite(&self, username: &str, new_line: &str) -> Result<(), StoreError> {
        let _exclusive = self.file_lock.write().unwrap_or_else(PoisonError::into_inner);
        let dir = self.path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
        let mut replaced = false;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        match File::open(&self.path) {
            Ok(file) => {
                for line in BufReader::new(file).lines() {
                    let line = line?;
                    if line.split_ascii_whitespace().next() == Some(username) {
                        writeln!(tmp, "{new_line}")?;
                        replaced = true;
                    } else {
                        writeln!(tmp, "{line}")?;
                    }
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        if !replaced {
            writeln!(tmp, "{new_line}")?;
        }
        tmp.as_file().sync_data()?;
        tmp.persist(&self.path).map_err(|err| StoreError::Io(err.error))?;
        // Every offset may have moved.
        self.offsets.lock().unwrap_or_else(PoisonError::into_inner).clear();
        Ok(())
    }
}

impl KeyStore for FileKeyStore {
    fn lookup(&self, username: &str) -> Result<UserRecord, StoreError> {
        let lock = self.user_lock(username);
        let _user = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let _shared = self.file_lock.read().unwrap_or_else(PoisonError::into_inner);
        Ok(self.locate(username)?.record)
    }

    fn commit(&self, username: &str, new_count: u32, new_key: Key) -> Result<(), StoreError> {
        let lock = self.user_lock(username);
        let _user = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let new_line = {
            // The shared lock spans locate and write so a concurrent
            // whole-file rewrite cannot move the record in between.
            let _shared = self.file_lock.read().unwrap_or_else(PoisonError::into_inner);
            let located = self.locate(username)?;
            let record = UserRecord { count: new_count, key: new_key, ..located.record };
            let new_line = format_record(&record);
            if new_line.len() == located.line_len {
                let mut file = OpenOptions::new().write(true).open(&self.path)?;
                file.seek(SeekFrom::Start(located.offset))?;
                file.write_all(new_line.as_bytes())?;
                file.sync_data()?;
                debug!(user = username, count = new_count, "record committed in place");
                return Ok(());
            }
            new_line
        };
        // Width changed (a foreign record with a different count width):
        // replace the line wholesale. The user lock is still held, so the
        // line content computed above cannot go stale.
        self.rewrite(username, &new_line)?;
        debug!(user = username, count = new_count, "record committed");
        Ok(())
    }

    fn register(&self, record: &UserRecord) -> Result<(), StoreError> {
        let lock = self.user_lock(&record.username);
        let _user = lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.rewrite(&record.username, &format_record(record))?;
        debug!(user = record.username, count = record.count, "record registered");
        Ok(())
    }
}

/// In-memory store with the same atomicity contract.
#[derive(Default)]
pub struct MemoryKeyStore {
    records: RwLock<HashMap<String, UserRecord>>,
}

impl MemoryKeyStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyStore for MemoryKeyStore {
    fn lookup(&self, username: &str) -> Result<UserRecord, StoreError> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(username)
            .cloned()
            .ok_or_else(|| StoreError::NotFound { username: username.to_string() })
    }

    fn commit(&self, username: &str, new_count: u32, new_key: Key) -> Result<(), StoreError> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let record = records
            .get_mut(username)
            .ok_or_else(|| StoreError::NotFound { username: username.to_string() })?;
        record.count = new_count;
        record.key = new_key;
        Ok(())
    }

    fn register(&self, record: &UserRecord) -> Result<(), StoreError> {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(record.username.clone(), record.clone());
        Ok(())
    }
}
