//! Credential persistence over a synchronous key-value byte store.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use landreg_auth::{Session, UserProfile};
use landreg_core::StoreError;

pub const ACCESS_TOKEN_KEY: &str = "token";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
pub const USER_KEY: &str = "user";

/// Synchronous key-value byte store (the browser's `localStorage`, a file, ...).
///
/// Implementations must:
/// - return `Ok(None)` for a missing key (never an error)
/// - treat `delete` of a missing key as a no-op
/// - apply `set_many` / `delete_many` all-or-nothing
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Write several entries at once.
    ///
    /// The default writes one key at a time and, if a write fails, puts the
    /// earlier keys back to their previous values.
    fn set_many(&self, entries: &[(&str, &[u8])]) -> Result<(), StoreError> {
        let previous = entries
            .iter()
            .map(|(key, _)| self.get(key))
            .collect::<Result<Vec<_>, _>>()?;

        for (written, (key, value)) in entries.iter().enumerate() {
            if let Err(err) = self.set(key, value) {
                roll_back(self, &entries[..written], &previous);
                return Err(err);
            }
        }
        Ok(())
    }

    /// Remove several entries at once.
    fn delete_many(&self, keys: &[&str]) -> Result<(), StoreError> {
        keys.iter().try_for_each(|key| self.delete(key))
    }
}

/// Undo a partially applied `set_many`. If that fails too, drop every key
/// touched so readers see an incomplete record instead of a mixed one.
fn roll_back<S>(store: &S, written: &[(&str, &[u8])], previous: &[Option<Vec<u8>>])
where
    S: KeyValueStore + ?Sized,
{
    let restored = written
        .iter()
        .zip(previous)
        .try_for_each(|((key, _), old)| match old {
            Some(value) => store.set(key, value),
            None => store.delete(key),
        });

    if let Err(err) = restored {
        tracing::error!(error = %err, "failed to restore entries after a partial write");
        for (key, _) in written {
            if let Err(err) = store.delete(key) {
                tracing::error!(key, error = %err, "failed to drop partially written entry");
            }
        }
    }
}

impl<S> KeyValueStore for Arc<S>
where
    S: KeyValueStore + ?Sized,
{
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        (**self).delete(key)
    }

    fn set_many(&self, entries: &[(&str, &[u8])]) -> Result<(), StoreError> {
        (**self).set_many(entries)
    }

    fn delete_many(&self, keys: &[&str]) -> Result<(), StoreError> {
        (**self).delete_many(keys)
    }
}

/// In-memory key-value store.
///
/// Intended for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryKeyValueStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for InMemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| StoreError::backend("lock poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| StoreError::backend("lock poisoned"))?;
        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| StoreError::backend("lock poisoned"))?;
        entries.remove(key);
        Ok(())
    }

    fn set_many(&self, batch: &[(&str, &[u8])]) -> Result<(), StoreError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| StoreError::backend("lock poisoned"))?;
        for (key, value) in batch {
            entries.insert(key.to_string(), value.to_vec());
        }
        Ok(())
    }

    fn delete_many(&self, keys: &[&str]) -> Result<(), StoreError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| StoreError::backend("lock poisoned"))?;
        for key in keys {
            entries.remove(*key);
        }
        Ok(())
    }
}

/// Key-value store persisted as one JSON object on disk.
///
/// Every write rewrites the file through a temp file + rename, so a crash
/// leaves either the old or the new file. The cached copy changes only once
/// the rename succeeded. On unix the file is created owner-only (0600).
/// Values must be UTF-8.
#[derive(Debug)]
pub struct FileKeyValueStore {
    path: PathBuf,
    entries: Mutex<Option<BTreeMap<String, String>>>,
}

impl FileKeyValueStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_file(&self) -> Result<BTreeMap<String, String>, StoreError> {
        match std::fs::read(&self.path) {
            Ok(bytes) if bytes.is_empty() => Ok(BTreeMap::new()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                StoreError::corrupt(format!("{}: {e}", self.path.display()))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(StoreError::backend(format!(
                "failed to read {}: {e}",
                self.path.display()
            ))),
        }
    }

    fn write_file(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::backend(format!("failed to create {}: {e}", parent.display()))
            })?;
        }

        let payload = serde_json::to_vec_pretty(entries)
            .map_err(|e| StoreError::backend(format!("failed to encode store: {e}")))?;

        let tmp = self.path.with_extension("tmp");
        write_private(&tmp, &payload)
            .map_err(|e| StoreError::backend(format!("failed to write {}: {e}", tmp.display())))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| {
            StoreError::backend(format!("failed to replace {}: {e}", self.path.display()))
        })
    }

    /// Apply `change` to a copy of the entries, persist it, then swap it in.
    fn update(
        &self,
        change: impl FnOnce(&mut BTreeMap<String, String>) -> bool,
    ) -> Result<(), StoreError> {
        self.with_entries(|entries| {
            let mut next = entries.clone();
            if !change(&mut next) {
                return Ok(());
            }
            self.write_file(&next)?;
            *entries = next;
            Ok(())
        })
    }

    fn with_entries<T>(
        &self,
        f: impl FnOnce(&mut BTreeMap<String, String>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|_| StoreError::backend("lock poisoned"))?;
        if guard.is_none() {
            *guard = Some(self.read_file()?);
        }
        match guard.as_mut() {
            Some(entries) => f(entries),
            None => Err(StoreError::backend("store not loaded")),
        }
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.with_entries(|entries| Ok(entries.get(key).map(|v| v.clone().into_bytes())))
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.set_many(&[(key, value)])
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.delete_many(&[key])
    }

    fn set_many(&self, batch: &[(&str, &[u8])]) -> Result<(), StoreError> {
        let batch = batch
            .iter()
            .map(|(key, value)| {
                String::from_utf8(value.to_vec())
                    .map(|value| (key.to_string(), value))
                    .map_err(|_| StoreError::backend(format!("value for '{key}' is not UTF-8")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.update(|entries| {
            entries.extend(batch);
            true
        })
    }

    fn delete_many(&self, keys: &[&str]) -> Result<(), StoreError> {
        self.update(|entries| {
            keys.iter()
                .fold(false, |changed, key| entries.remove(*key).is_some() || changed)
        })
    }
}

#[cfg(unix)]
fn write_private(path: &Path, payload: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // `mode` only applies on creation; tighten a leftover temp file too.
    file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    file.write_all(payload)?;
    file.sync_all()
}

#[cfg(not(unix))]
fn write_private(path: &Path, payload: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, payload)
}

/// Owner of the persisted credential record.
///
/// All three entries are read under one lock and written through one
/// all-or-nothing batch, so no caller ever observes a record with only some
/// fields updated.
pub struct CredentialStore {
    backend: Mutex<Box<dyn KeyValueStore>>,
}

impl CredentialStore {
    pub fn new(backend: impl KeyValueStore + 'static) -> Self {
        Self {
            backend: Mutex::new(Box::new(backend)),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(InMemoryKeyValueStore::new())
    }

    pub fn save(&self, session: &Session) -> Result<(), StoreError> {
        let user = serde_json::to_vec(&session.user)
            .map_err(|e| StoreError::backend(format!("failed to encode user profile: {e}")))?;

        self.lock()?.set_many(&[
            (ACCESS_TOKEN_KEY, session.access_token.as_bytes()),
            (REFRESH_TOKEN_KEY, session.refresh_token.as_bytes()),
            (USER_KEY, user.as_slice()),
        ])
    }

    /// Load the stored session.
    ///
    /// Returns `Ok(None)` when nothing is stored, and also when the record is
    /// incomplete (an interrupted write); the latter is logged.
    pub fn load(&self) -> Result<Option<Session>, StoreError> {
        let (access, refresh, user) = {
            let backend = self.lock()?;
            (
                backend.get(ACCESS_TOKEN_KEY)?,
                backend.get(REFRESH_TOKEN_KEY)?,
                backend.get(USER_KEY)?,
            )
        };

        match (access, refresh, user) {
            (Some(access), Some(refresh), Some(user)) => {
                let user: UserProfile = serde_json::from_slice(&user)
                    .map_err(|e| StoreError::corrupt(format!("user profile: {e}")))?;
                Ok(Some(Session {
                    access_token: utf8(ACCESS_TOKEN_KEY, access)?,
                    refresh_token: utf8(REFRESH_TOKEN_KEY, refresh)?,
                    user,
                }))
            }
            (None, None, None) => Ok(None),
            (access, refresh, user) => {
                tracing::warn!(
                    has_access = access.is_some(),
                    has_refresh = refresh.is_some(),
                    has_user = user.is_some(),
                    "ignoring incomplete credential record"
                );
                Ok(None)
            }
        }
    }

    /// Remove all three entries. Clearing an empty store is not an error.
    pub fn clear(&self) -> Result<(), StoreError> {
        self.lock()?
            .delete_many(&[ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY])
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Box<dyn KeyValueStore>>, StoreError> {
        self.backend
            .lock()
            .map_err(|_| StoreError::backend("lock poisoned"))
    }
}

impl core::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CredentialStore").finish_non_exhaustive()
    }
}

fn utf8(key: &str, bytes: Vec<u8>) -> Result<String, StoreError> {
    String::from_utf8(bytes).map_err(|_| StoreError::corrupt(format!("'{key}' is not UTF-8")))
}
