use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::error::AuthError;
use super::token::TokenRecord;

const TOKEN_FILE_VERSION: u32 = 1;
const DEFAULT_TOKEN_FILE: &str = "whoopTokens.json";
#[cfg(unix)]
const FILE_MODE: u32 = 0o600;

/// Durable holder for the single live token record.
///
/// Loaded once at start, overwritten whole on every change. `Ok(None)` means the user has
/// never authenticated.
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Result<Option<TokenRecord>, AuthError> {
        Ok(self.load_with_timestamp()?.map(|(record, _)| record))
    }

    /// Like [`CredentialStore::load`], also returning when the record was written, if known.
    fn load_with_timestamp(
        &self,
    ) -> Result<Option<(TokenRecord, Option<DateTime<Utc>>)>, AuthError>;

    fn save(&self, record: &TokenRecord) -> Result<(), AuthError>;
}

/// JSON file store.
///
/// # Example
/// ```no_run
/// use whoop_coach::auth::{CredentialStore, FileCredentialStore, TokenRecord};
///
/// let store = FileCredentialStore::new("whoopTokens.json");
/// store.save(&TokenRecord::new("access", Some("refresh".to_string())))?;
/// assert!(store.load()?.is_some());
/// # Ok::<(), whoop_coach::auth::AuthError>(())
/// ```
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `~/.whoop-coach/whoopTokens.json`, or `whoopTokens.json` in the working directory when
    /// no home directory can be resolved.
    pub fn default_path() -> PathBuf {
        directories::UserDirs::new()
            .map(|dirs| dirs.home_dir().join(".whoop-coach").join(DEFAULT_TOKEN_FILE))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_TOKEN_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_parent(path: &Path) -> Result<(), AuthError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    fn load_with_timestamp(
        &self,
    ) -> Result<Option<(TokenRecord, Option<DateTime<Utc>>)>, AuthError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(AuthError::Storage(err.to_string())),
        };
        let loaded = match serde_json::from_str::<StoredFile>(&raw)? {
            StoredFile::Envelope(file) => (file.token, Some(file.saved_at)),
            StoredFile::Bare(token) => (token, None),
        };
        info!(path = %self.path.display(), "Tokens loaded from file");
        Ok(Some(loaded))
    }

    fn save(&self, record: &TokenRecord) -> Result<(), AuthError> {
        Self::ensure_parent(&self.path)?;
        let file = TokenFile {
            version: TOKEN_FILE_VERSION,
            saved_at: Utc::now(),
            token: record.clone(),
        };
        let serialized = serde_json::to_string_pretty(&file)?;

        // Readers see either the previous file or the new one, never a partial write.
        let temp_path = self.path.with_extension("tmp");
        write_private(&temp_path, serialized.as_bytes())?;
        fs::rename(&temp_path, &self.path).map_err(|err| {
            let _ = fs::remove_file(&temp_path);
            AuthError::Storage(format!("Failed to replace {}: {err}", self.path.display()))
        })?;
        info!(path = %self.path.display(), "Tokens saved to file");
        Ok(())
    }
}

#[cfg(unix)]
fn write_private(path: &Path, contents: &[u8]) -> Result<(), AuthError> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(FILE_MODE)
        .open(path)?;
    // `mode` only applies on creation; a leftover temp file keeps its old bits.
    file.set_permissions(fs::Permissions::from_mode(FILE_MODE))?;
    file.write_all(contents)?;
    file.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn write_private(path: &Path, contents: &[u8]) -> Result<(), AuthError> {
    fs::write(path, contents)?;
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TokenFile {
    version: u32,
    saved_at: DateTime<Utc>,
    token: TokenRecord,
}

// Files written before the envelope existed hold the provider response as-is.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoredFile {
    Envelope(TokenFile),
    Bare(TokenRecord),
}

/// In-process store; contents are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    slot: Mutex<Option<(TokenRecord, DateTime<Utc>)>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(record: TokenRecord) -> Self {
        Self {
            slot: Mutex::new(Some((record, Utc::now()))),
        }
    }

    /// Last saved record, bypassing the trait.
    pub fn get(&self) -> Option<TokenRecord> {
        self.slot
            .lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|(record, _)| record.clone()))
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load_with_timestamp(
        &self,
    ) -> Result<Option<(TokenRecord, Option<DateTime<Utc>>)>, AuthError> {
        let guard = self
            .slot
            .lock()
            .map_err(|_| AuthError::Storage("credential store lock poisoned".to_string()))?;
        Ok(guard
            .as_ref()
            .map(|(record, saved_at)| (record.clone(), Some(*saved_at))))
    }

    fn save(&self, record: &TokenRecord) -> Result<(), AuthError> {
        let mut guard = self
            .slot
            .lock()
            .map_err(|_| AuthError::Storage("credential store lock poisoned".to_string()))?;
        *guard = Some((record.clone(), Utc::now()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_store() -> (TempDir, FileCredentialStore) {
        let dir = TempDir::new().unwrap();
        let store = FileCredentialStore::new(dir.path().join("nested").join("tokens.json"));
        (dir, store)
    }

    #[test]
    fn missing_file_loads_as_none() {
        let (_dir, store) = temp_store();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn save_creates_parent_and_round_trips() {
        let (_dir, store) = temp_store();
        let record = TokenRecord::new("access", Some("refresh".to_string())).with_expires_in(3600);
        store.save(&record).unwrap();

        let (loaded, saved_at) = store.load_with_timestamp().unwrap().unwrap();
        assert_eq!(loaded, record);
        assert!(saved_at.is_some());
    }

    #[test]
    fn save_overwrites_previous_record() {
        let (_dir, store) = temp_store();
        store
            .save(&TokenRecord::new("first", Some("r1".to_string())))
            .unwrap();
        store
            .save(&TokenRecord::new("second", Some("r2".to_string())))
            .unwrap();
        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.access_token, "second");
        assert_eq!(loaded.refresh_token.as_deref(), Some("r2"));
    }

    #[test]
    fn save_replaces_file_without_leaving_temp_behind() {
        let (_dir, store) = temp_store();
        let temp_path = store.path().with_extension("tmp");
        FileCredentialStore::ensure_parent(store.path()).unwrap();
        // Leftover from an interrupted write.
        fs::write(&temp_path, "{ partial").unwrap();
        fs::write(store.path(), "{ also partial").unwrap();

        store
            .save(&TokenRecord::new("whole", Some("r".to_string())))
            .unwrap();

        assert!(!temp_path.exists());
        assert_eq!(store.load().unwrap().unwrap().access_token, "whole");
    }

    #[test]
    fn bare_provider_payload_is_accepted() {
        let (_dir, store) = temp_store();
        FileCredentialStore::ensure_parent(store.path()).unwrap();
        fs::write(
            store.path(),
            r#"{"access_token":"legacy","refresh_token":"old","expires_in":3600,"token_type":"bearer"}"#,
        )
        .unwrap();

        let (loaded, saved_at) = store.load_with_timestamp().unwrap().unwrap();
        assert_eq!(loaded.access_token, "legacy");
        assert!(saved_at.is_none());
    }

    #[test]
    fn corrupt_file_is_a_serialization_error() {
        let (_dir, store) = temp_store();
        FileCredentialStore::ensure_parent(store.path()).unwrap();
        fs::write(store.path(), "{not-json").unwrap();
        assert!(matches!(store.load(), Err(AuthError::Serialization(_))));
    }

    #[cfg(unix)]
    #[test]
    fn saved_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let (_dir, store) = temp_store();
        store.save(&TokenRecord::new("access", None)).unwrap();
        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryCredentialStore::new();
        assert!(store.load().unwrap().is_none());
        store.save(&TokenRecord::new("mem", None)).unwrap();
        assert_eq!(store.get().unwrap().access_token, "mem");
    }
}
