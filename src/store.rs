//! SQLite-backed record of every hashed file.
//!
//! One row per absolute path. A row is replaced wholesale whenever the file
//! is re-hashed, and it is reused as a cache hit while the file's size and
//! modification time stay the same. Paths that are valid UTF-8 are stored as
//! TEXT; any other path is stored as a BLOB of its raw bytes.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, Value, ValueRef};
use rusqlite::{Connection, OptionalExtension, params};

use crate::error::StoreError;
use crate::hasher::{Digest, Fingerprint};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS files (
    path  TEXT PRIMARY KEY,
    hash  TEXT NOT NULL,
    size  INTEGER NOT NULL,
    mtime REAL NOT NULL
);
CREATE INDEX IF NOT EXISTS files_hash ON files (hash);";

/// Stored hash of one file
#[derive(Debug, Clone, PartialEq)]
pub struct FileRecord {
    pub path: PathBuf,
    pub digest: Digest,
    pub fingerprint: Fingerprint,
}

impl FileRecord {
    /// Whether this record still describes a file with the given fingerprint
    pub fn is_fresh(&self, current: &Fingerprint) -> bool {
        self.fingerprint == *current
    }
}

/// Paths in the store that share one digest
#[derive(Debug, Clone, PartialEq)]
pub struct StoredGroup {
    pub digest: Digest,
    pub paths: Vec<PathBuf>,
}

/// Handle to the hash database.
///
/// All access goes through one connection behind a mutex, so writes from
/// the hashing workers are applied one at a time.
pub struct HashStore {
    conn: Mutex<Connection>,
}

impl HashStore {
    /// Opens the database at `path`, creating the file and schema if absent.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(mut conn: Connection) -> Result<Self, StoreError> {
        let columns = table_columns(&conn)?;
        let has = |name: &str| columns.iter().any(|c| c == name);
        if !columns.is_empty() && !["path", "hash", "size", "mtime"].iter().all(|c| has(c)) {
            if has("path") && has("sha256") {
                import_legacy(&mut conn)?;
            } else {
                return Err(StoreError::UnknownSchema {
                    columns: columns.join(", "),
                });
            }
        }
        conn.execute_batch(SCHEMA)?;
        log::debug!("hash store schema ready");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Inserts or replaces the record for `record.path`. Committed immediately.
    pub fn upsert(&self, record: &FileRecord) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO files (path, hash, size, mtime) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(path) DO UPDATE SET
                hash = excluded.hash, size = excluded.size, mtime = excluded.mtime",
            params![
                path_key(&record.path),
                record.digest.to_string(),
                record.fingerprint.size as i64,
                record.fingerprint.mtime,
            ],
        )?;
        Ok(())
    }

    pub fn get(&self, path: &Path) -> Result<Option<FileRecord>, StoreError> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT hash, size, mtime FROM files WHERE path = ?1",
                params![path_key(path)],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, f64>(2)?,
                    ))
                },
            )
            .optional()?;

        let Some((hash, size, mtime)) = row else {
            return Ok(None);
        };
        let digest = parse_digest(path, &hash)?;
        Ok(Some(FileRecord {
            path: path.to_path_buf(),
            digest,
            fingerprint: Fingerprint {
                size: size as u64,
                mtime,
            },
        }))
    }

    /// Digests shared by more than one record, with their paths.
    ///
    /// Paths whose directory entry no longer exists are left out, and a group
    /// left with a single path is dropped. Paths are in key order; the caller
    /// decides which one is kept.
    pub fn duplicate_groups(&self) -> Result<Vec<StoredGroup>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT hash, path FROM files
             WHERE hash IN (SELECT hash FROM files GROUP BY hash HAVING COUNT(*) > 1)
             ORDER BY hash, path",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, StoredPath>(1)?))
        })?;

        let mut groups: Vec<StoredGroup> = Vec::new();
        let mut current: Option<(String, Vec<PathBuf>)> = None;
        for row in rows {
            let (hash, StoredPath(path)) = row?;
            if path.symlink_metadata().is_err() {
                log::debug!("ignoring stale record {}", path.display());
                continue;
            }
            match current.as_mut() {
                Some((h, paths)) if *h == hash => paths.push(path),
                _ => {
                    if let Some(done) = current.take() {
                        push_group(&mut groups, done)?;
                    }
                    current = Some((hash, vec![path]));
                }
            }
        }
        if let Some(done) = current.take() {
            push_group(&mut groups, done)?;
        }
        Ok(groups)
    }

    /// Number of records
    pub fn len(&self) -> Result<usize, StoreError> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn table_columns(conn: &Connection) -> Result<Vec<String>, StoreError> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info('files')")?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names)
}

/// Converts a `files(id, filename, path, sha256)` table written by the older
/// dupe-linker. Imported rows get size and mtime of -1, which no file on disk
/// matches, so each one is rehashed before it is trusted.
fn import_legacy(conn: &mut Connection) -> Result<(), StoreError> {
    let tx = conn.transaction()?;
    tx.execute_batch("ALTER TABLE files RENAME TO files_legacy;")?;
    tx.execute_batch(SCHEMA)?;
    let imported = tx.execute(
        "INSERT OR IGNORE INTO files (path, hash, size, mtime)
         SELECT path, 'sha256:' || lower(sha256), -1, -1.0 FROM files_legacy
         WHERE length(sha256) = 64 AND sha256 NOT GLOB '*[^0-9a-fA-F]*'",
        [],
    )?;
    tx.execute_batch("DROP TABLE files_legacy;")?;
    tx.commit()?;
    log::info!("imported {imported} records from an older hash database");
    Ok(())
}

fn push_group(
    groups: &mut Vec<StoredGroup>,
    (hash, paths): (String, Vec<PathBuf>),
) -> Result<(), StoreError> {
    if paths.len() < 2 {
        return Ok(());
    }
    let digest = parse_digest(&paths[0], &hash)?;
    groups.push(StoredGroup { digest, paths });
    Ok(())
}

fn parse_digest(path: &Path, hash: &str) -> Result<Digest, StoreError> {
    hash.parse().map_err(|message| StoreError::InvalidRecord {
        path: path.display().to_string(),
        message,
    })
}

fn path_key(path: &Path) -> Value {
    match path.to_str() {
        Some(text) => Value::Text(text.to_owned()),
        None => Value::Blob(path_bytes(path)),
    }
}

/// A `path` column read back as either TEXT or raw BLOB bytes
struct StoredPath(PathBuf);

impl FromSql for StoredPath {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Text(_) => String::column_result(value).map(|s| StoredPath(s.into())),
            ValueRef::Blob(bytes) => Ok(StoredPath(path_from_bytes(bytes))),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}

#[cfg(unix)]
fn path_bytes(path: &Path) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    path.as_os_str().as_bytes().to_vec()
}

#[cfg(unix)]
fn path_from_bytes(bytes: &[u8]) -> PathBuf {
    use std::os::unix::ffi::OsStrExt;
    PathBuf::from(std::ffi::OsStr::from_bytes(bytes))
}

// Windows paths that are not valid Unicode are rare; they keep the lossy form.
#[cfg(not(unix))]
fn path_bytes(path: &Path) -> Vec<u8> {
    path.to_string_lossy().into_owned().into_bytes()
}

#[cfg(not(unix))]
fn path_from_bytes(bytes: &[u8]) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(bytes).into_owned())
}
