// # File Store
//
// File-based implementation of LedgerStore and CacheStore with crash recovery.
//
// ## Durability
//
// - Ledger mutations are applied to a copy of the tables, written to disk, and
//   only then swapped into memory. A failed write leaves both disk and memory
//   at the previous state.
// - Cache rows are marked dirty and written with the next ledger mutation or
//   on `flush`.
//
// ## Crash Recovery
//
// - Atomic writes: write-then-rename
// - Backup: the previous good file is kept as `.backup`
// - Recovery: a corrupted main file is restored from the backup
// - A corrupted main file without a usable backup is an error; the store never
//   silently starts from an empty ledger
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "picks": [
//     { "user": "alice", "round": 1, "driver": "VER", "points": 25 }
//   ],
//   "usage": [
//     { "user": "alice", "driver": "VER", "count": 1 }
//   ],
//   "cache": [
//     {
//       "kind": "results",
//       "key": "2025/1",
//       "payload": [],
//       "last_updated": "2025-03-16T12:00:00Z"
//     }
//   ]
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::Error;
use crate::config::StoreConfig;
use crate::state::tables::{LedgerTables, TableRows};
use crate::traits::{
    CacheEntry, CacheKind, CacheStore, LedgerStore, Pick, StateStore, StateStoreFactory,
    UsageCounter, UsageSnapshot,
};

/// Ledger file format version
const LEDGER_FILE_VERSION: &str = "1.0";

/// File-based ledger store with crash recovery
///
/// # Example
///
/// ```rust,no_run
/// use gridpick_core::state::FileStore;
/// use gridpick_core::traits::LedgerStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileStore::new("/var/lib/gridpick/ledger.json").await?;
///
///     // Atomically written to disk before returning
///     store.commit_selection("alice", 1, "VER").await?;
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    state: Arc<RwLock<FileState>>,
}

#[derive(Debug)]
struct FileState {
    tables: LedgerTables,
    dirty: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct LedgerFileFormat {
    version: String,
    #[serde(flatten)]
    rows: TableRows,
}

/// Why a ledger file could not be loaded
enum LoadError {
    /// The file exists but does not hold a valid ledger
    Corrupt(Error),
    /// The file could not be read
    Unreadable(Error),
}

impl FileStore {
    /// Create or load a file store
    ///
    /// Creates parent directories as needed. A missing file means an empty
    /// ledger; a corrupted one is recovered from its backup.
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::config(format!(
                    "Failed to create ledger directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let tables = Self::load_with_recovery(&path).await?;

        Ok(Self {
            path,
            state: Arc::new(RwLock::new(FileState {
                tables,
                dirty: false,
            })),
        })
    }

    async fn load_with_recovery(path: &Path) -> Result<LedgerTables, Error> {
        let err = match Self::load(path).await {
            Ok(tables) => {
                tracing::debug!("Loaded ledger from file: {} picks", tables.pick_count());
                return Ok(tables);
            }
            Err(LoadError::Unreadable(e)) => return Err(e),
            Err(LoadError::Corrupt(e)) => e,
        };

        tracing::warn!(
            "Ledger file appears corrupted: {}. Attempting recovery from backup.",
            err
        );

        let backup_path = Self::backup_path(path);
        if !backup_path.exists() {
            return Err(Error::store(format!(
                "Ledger file {} is corrupted and no backup exists",
                path.display()
            )));
        }

        match Self::load(&backup_path).await {
            Ok(tables) => {
                tracing::info!("Recovered ledger from backup: {} picks", tables.pick_count());
                if let Err(restore_err) = Self::restore_from_backup(path, &backup_path).await {
                    tracing::error!("Failed to restore ledger file from backup: {}", restore_err);
                }
                Ok(tables)
            }
            Err(LoadError::Corrupt(backup_err) | LoadError::Unreadable(backup_err)) => {
                Err(Error::store(format!(
                    "Ledger file {} and its backup are unusable: {}",
                    path.display(),
                    backup_err
                )))
            }
        }
    }

    async fn load(path: &Path) -> Result<LedgerTables, LoadError> {
        if !path.exists() {
            tracing::debug!("Ledger file does not exist: {}", path.display());
            return Ok(LedgerTables::default());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            LoadError::Unreadable(Error::store(format!(
                "Failed to read ledger file {}: {}",
                path.display(),
                e
            )))
        })?;

        let file: LedgerFileFormat = serde_json::from_str(&content).map_err(|e| {
            LoadError::Corrupt(Error::store(format!(
                "Failed to parse ledger file {}: {}",
                path.display(),
                e
            )))
        })?;

        if file.version != LEDGER_FILE_VERSION {
            tracing::warn!(
                "Ledger file version mismatch: expected {}, got {}. Attempting to load anyway.",
                LEDGER_FILE_VERSION,
                file.version
            );
        }

        LedgerTables::from_rows(file.rows).map_err(LoadError::Corrupt)
    }

    /// Write tables to the ledger file atomically
    async fn write_tables(&self, tables: &LedgerTables) -> Result<(), Error> {
        let file = LedgerFileFormat {
            version: LEDGER_FILE_VERSION.to_string(),
            rows: tables.to_rows(),
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| Error::store(format!("Failed to serialize ledger: {}", e)))?;

        let temp_path = self.temp_path();
        {
            let mut out = fs::File::create(&temp_path).await.map_err(|e| {
                Error::store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            out.write_all(json.as_bytes()).await.map_err(|e| {
                Error::store(format!(
                    "Failed to write temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            out.sync_all().await.map_err(|e| {
                Error::store(format!(
                    "Failed to sync temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        if self.path.exists() {
            let backup_path = Self::backup_path(&self.path);
            if let Err(e) = fs::copy(&self.path, &backup_path).await {
                tracing::warn!("Failed to create ledger backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::trace!("Ledger written to file: {}", self.path.display());
        Ok(())
    }

    /// Apply a ledger mutation, persisting before it becomes visible
    ///
    /// `op` works on a copy of the tables. When it fails or returns `None`
    /// (nothing changed) the copy is dropped without touching the file.
    async fn try_apply<R>(
        &self,
        op: impl FnOnce(&mut LedgerTables) -> Result<Option<R>, Error>,
    ) -> Result<Option<R>, Error> {
        let mut guard = self.state.write().await;
        let mut next = guard.tables.clone();
        let Some(out) = op(&mut next)? else {
            return Ok(None);
        };
        self.write_tables(&next).await?;
        guard.tables = next;
        guard.dirty = false;
        Ok(Some(out))
    }

    async fn restore_from_backup(path: &Path, backup_path: &Path) -> Result<(), Error> {
        fs::copy(backup_path, path).await.map_err(|e| {
            Error::store(format!(
                "Failed to restore from backup {} to {}: {}",
                backup_path.display(),
                path.display(),
                e
            ))
        })?;
        tracing::info!("Restored ledger file from backup");
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }

    /// Path of the ledger file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Force an immediate write to disk
    pub async fn sync(&self) -> Result<(), Error> {
        let mut guard = self.state.write().await;
        self.write_tables(&guard.tables).await?;
        guard.dirty = false;
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for FileStore {
    async fn get_pick(&self, user: &str, round: u32) -> Result<Option<Pick>, Error> {
        Ok(self.state.read().await.tables.get_pick(user, round))
    }

    async fn picks_for_round(&self, round: u32) -> Result<Vec<Pick>, Error> {
        Ok(self.state.read().await.tables.picks_for_round(round))
    }

    async fn picks_for_user(&self, user: &str) -> Result<Vec<Pick>, Error> {
        Ok(self.state.read().await.tables.picks_for_user(user))
    }

    async fn all_picks(&self) -> Result<Vec<Pick>, Error> {
        Ok(self.state.read().await.tables.all_picks())
    }

    async fn usage(&self, user: &str) -> Result<UsageSnapshot, Error> {
        Ok(self.state.read().await.tables.usage(user))
    }

    async fn usage_counters(&self) -> Result<Vec<UsageCounter>, Error> {
        Ok(self.state.read().await.tables.usage_counters())
    }

    async fn commit_selection(
        &self,
        user: &str,
        round: u32,
        driver: &str,
    ) -> Result<Option<String>, Error> {
        let committed = self
            .try_apply(|tables| tables.commit_selection(user, round, driver).map(Some))
            .await?;
        Ok(committed.flatten())
    }

    async fn resolve_points(
        &self,
        user: &str,
        round: u32,
        driver: &str,
        points: u32,
    ) -> Result<bool, Error> {
        let resolved = self
            .try_apply(|tables| Ok(tables.resolve_points(user, round, driver, points).then_some(())))
            .await?;
        Ok(resolved.is_some())
    }

    async fn reset(&self, users: &[String], rounds: &[u32]) -> Result<(), Error> {
        self.try_apply(|tables| {
            tables.reset(users, rounds);
            Ok(Some(()))
        })
        .await?;
        Ok(())
    }

    async fn flush(&self) -> Result<(), Error> {
        let dirty = self.state.read().await.dirty;
        if dirty { self.sync().await } else { Ok(()) }
    }
}

#[async_trait]
impl CacheStore for FileStore {
    async fn get_entry(&self, kind: CacheKind, key: &str) -> Result<Option<CacheEntry>, Error> {
        Ok(self.state.read().await.tables.get_cache(kind, key))
    }

    async fn put_entry(&self, kind: CacheKind, key: &str, entry: CacheEntry) -> Result<(), Error> {
        let mut guard = self.state.write().await;
        guard.tables.put_cache(kind, key, entry);
        guard.dirty = true;
        Ok(())
    }

    async fn purge(&self, kind: Option<CacheKind>) -> Result<usize, Error> {
        let mut guard = self.state.write().await;
        let removed = guard.tables.purge_cache(kind);
        if removed > 0 {
            guard.dirty = true;
        }
        Ok(removed)
    }
}

/// Factory for [`FileStore`]
#[derive(Debug, Default)]
pub struct FileStoreFactory;

#[async_trait]
impl StateStoreFactory for FileStoreFactory {
    async fn create(&self, config: &StoreConfig) -> Result<Arc<dyn StateStore>, Error> {
        match config {
            StoreConfig::File { path } => Ok(Arc::new(FileStore::new(path).await?)),
            other => Err(Error::config(format!(
                "File store factory cannot build a '{}' store",
                other.type_name()
            ))),
        }
    }
}
