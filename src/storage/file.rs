//! JSON-file-based storage backend.
//!
//! Persists the settings as a single JSON file under a configurable
//! directory (default: `$XDG_DATA_HOME/xiaofubao-rs/`).

use core::future::{self, Future};
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::error::{Result, XfbError};
use crate::models::TransactionSerial;

/// Application name used for the XDG data directory.
const APP_NAME: &str = "xiaofubao-rs";

/// Settings file name.
const SETTINGS_FILE: &str = "settings.json";

/// Temporary file name used for atomic replacement.
const SETTINGS_TMP_FILE: &str = "settings.json.tmp";

/// The persisted settings document.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Settings {
    /// Persisted session token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    session_token: Option<String>,
    /// Highest observed transaction serial.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    high_water_mark: Option<TransactionSerial>,
    /// Whether periodic transaction notifications are enabled.
    #[serde(default)]
    notifications_enabled: bool,
}

/// File-backed settings storage.
///
/// The whole document is rewritten on every update via a temporary file
/// and an atomic rename, so a crash mid-write never leaves a torn
/// settings file. In-process access is serialized by a [`Mutex`].
#[derive(Debug)]
pub struct FileStorage {
    /// Directory containing the settings file.
    dir: PathBuf,
    /// Mutex serializing concurrent in-process access.
    lock: Mutex<()>,
}

impl FileStorage {
    /// Creates a file storage rooted at the given directory.
    ///
    /// Creates the directory (and parents) if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    #[inline]
    pub fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).map_err(storage_io_error)?;
        Ok(Self {
            dir,
            lock: Mutex::new(()),
        })
    }

    /// Returns the default XDG-compliant data directory for this
    /// application.
    ///
    /// On Linux: `$XDG_DATA_HOME/xiaofubao-rs/` (typically
    /// `~/.local/share/xiaofubao-rs/`).
    ///
    /// # Errors
    ///
    /// Returns an error if the platform data directory cannot be
    /// determined.
    #[inline]
    pub fn default_dir() -> Result<PathBuf> {
        dirs::data_dir()
            .map(|data_path| data_path.join(APP_NAME))
            .ok_or_else(|| {
                XfbError::Storage("could not determine platform data directory".into())
            })
    }

    // ── Private helpers ─────────────────────────────────────────────

    /// Reads the settings under the lock and applies a closure.
    fn read<R>(&self, f: impl FnOnce(&Settings) -> R) -> Result<R> {
        let _guard: MutexGuard<'_, ()> = self.lock.lock().map_err(|err| lock_error(&err))?;
        let settings = self.load()?;
        Ok(f(&settings))
    }

    /// Mutates the settings under the lock and persists the result.
    fn update(&self, f: impl FnOnce(&mut Settings)) -> Result<()> {
        let _guard: MutexGuard<'_, ()> = self.lock.lock().map_err(|err| lock_error(&err))?;
        let mut settings = self.load()?;
        f(&mut settings);
        self.store(&settings)
    }

    /// Loads the settings document; a missing file yields defaults.
    fn load(&self) -> Result<Settings> {
        let path = self.dir.join(SETTINGS_FILE);
        match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|err| {
                XfbError::Storage(format!("corrupt settings file {}: {err}", path.display()).into())
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Settings::default()),
            Err(err) => Err(storage_io_error(err)),
        }
    }

    /// Writes the settings document atomically (temp file + rename).
    fn store(&self, settings: &Settings) -> Result<()> {
        let tmp = self.dir.join(SETTINGS_TMP_FILE);
        let bytes = serde_json::to_vec_pretty(settings)
            .map_err(|err| XfbError::Storage(Box::new(err)))?;
        fs::write(&tmp, bytes).map_err(storage_io_error)?;
        fs::rename(&tmp, self.dir.join(SETTINGS_FILE)).map_err(storage_io_error)
    }
}

/// Wraps an I/O error into a storage error.
fn storage_io_error(err: std::io::Error) -> XfbError {
    XfbError::Storage(Box::new(err))
}

/// Wraps a mutex poison error.
fn lock_error<T>(err: &PoisonError<T>) -> XfbError {
    XfbError::Storage(err.to_string().into())
}

impl super::Storage for FileStorage {
    #[inline]
    fn session_token(&self) -> impl Future<Output = Result<Option<String>>> + Send {
        future::ready(self.read(|settings| settings.session_token.clone()))
    }

    #[inline]
    fn set_session_token(&self, token: String) -> impl Future<Output = Result<()>> + Send {
        future::ready(self.update(|settings| settings.session_token = Some(token)))
    }

    #[inline]
    fn high_water_mark(&self) -> impl Future<Output = Result<Option<TransactionSerial>>> + Send {
        future::ready(self.read(|settings| settings.high_water_mark))
    }

    #[inline]
    fn set_high_water_mark(
        &self,
        serial: TransactionSerial,
    ) -> impl Future<Output = Result<()>> + Send {
        future::ready(self.update(|settings| {
            settings.high_water_mark =
                Some(settings.high_water_mark.map_or(serial, |m| m.max(serial)));
        }))
    }

    #[inline]
    fn notifications_enabled(&self) -> impl Future<Output = Result<bool>> + Send {
        future::ready(self.read(|settings| settings.notifications_enabled))
    }

    #[inline]
    fn set_notifications_enabled(&self, enabled: bool) -> impl Future<Output = Result<()>> + Send {
        future::ready(self.update(|settings| settings.notifications_enabled = enabled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Storage as _;

    #[tokio::test]
    async fn settings_survive_reopening() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_path_buf();

        {
            let storage = FileStorage::new(path.clone()).unwrap();
            storage.set_session_token("tok-1".to_owned()).await.unwrap();
            storage
                .set_high_water_mark(TransactionSerial::new(103))
                .await
                .unwrap();
            storage.set_notifications_enabled(true).await.unwrap();
        }

        let reopened = FileStorage::new(path).unwrap();
        assert_eq!(
            reopened.session_token().await.unwrap(),
            Some("tok-1".to_owned())
        );
        assert_eq!(
            reopened.high_water_mark().await.unwrap(),
            Some(TransactionSerial::new(103))
        );
        assert!(reopened.notifications_enabled().await.unwrap());
    }

    #[tokio::test]
    async fn missing_file_reads_as_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().to_path_buf()).unwrap();
        assert_eq!(storage.session_token().await.unwrap(), None);
        assert_eq!(storage.high_water_mark().await.unwrap(), None);
        assert!(!storage.notifications_enabled().await.unwrap());
    }

    #[tokio::test]
    async fn mark_stays_monotonic_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().to_path_buf()).unwrap();
        storage
            .set_high_water_mark(TransactionSerial::new(100))
            .await
            .unwrap();
        storage
            .set_high_water_mark(TransactionSerial::new(42))
            .await
            .unwrap();
        assert_eq!(
            storage.high_water_mark().await.unwrap(),
            Some(TransactionSerial::new(100))
        );
    }

    #[tokio::test]
    async fn corrupt_file_is_a_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SETTINGS_FILE), b"{ not json").unwrap();
        let storage = FileStorage::new(dir.path().to_path_buf()).unwrap();
        assert!(matches!(
            storage.session_token().await,
            Err(XfbError::Storage(_))
        ));
    }
}
