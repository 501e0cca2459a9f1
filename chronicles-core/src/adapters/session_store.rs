//! On-disk session record for the Firebase adapter
//!
//! Plays the role of the web SDK's local persistence: the signed-in identity
//! and its tokens survive process restarts so the next run can report the
//! user straight away. Writes go through a temp file and rename under an
//! exclusive lock so two processes never interleave.

use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::domain::result::{Error, Result};
use crate::domain::Identity;

const SESSION_FILE: &str = "session.json";
const LOCK_FILE: &str = "session.lock";

/// Persisted session tokens
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSession {
    pub identity: Identity,
    pub id_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl StoredSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

impl std::fmt::Debug for StoredSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredSession")
            .field("identity", &self.identity)
            .field("id_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// File-backed store for a single [`StoredSession`]
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(SESSION_FILE)
    }

    fn lock(&self) -> Result<File> {
        std::fs::create_dir_all(&self.dir)?;
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.dir.join(LOCK_FILE))?;
        lock.lock_exclusive()
            .map_err(|e| Error::session_store(format!("failed to lock session file: {e}")))?;
        Ok(lock)
    }

    /// Read the stored session. A missing or unreadable file means no session.
    pub fn load(&self) -> Result<Option<StoredSession>> {
        if !self.path().exists() {
            return Ok(None);
        }

        let lock = self.lock()?;
        let content = match std::fs::read_to_string(self.path()) {
            Ok(content) => content,
            // Cleared by another process since the existence check
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let _ = lock.unlock();

        Ok(serde_json::from_str(&content).ok())
    }

    pub fn save(&self, session: &StoredSession) -> Result<()> {
        let lock = self.lock()?;

        let tmp = self.dir.join(format!("{SESSION_FILE}.tmp"));
        std::fs::write(&tmp, serde_json::to_vec_pretty(session)?)?;
        restrict_permissions(&tmp)?;
        std::fs::rename(&tmp, self.path())?;

        let _ = lock.unlock();
        Ok(())
    }

    /// Remove the stored session; succeeds when there was none
    pub fn clear(&self) -> Result<()> {
        if !self.path().exists() {
            return Ok(());
        }

        let lock = self.lock()?;
        match std::fs::remove_file(self.path()) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        let _ = lock.unlock();
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::tempdir;

    fn sample_session() -> StoredSession {
        StoredSession {
            identity: Identity::new("uid-1", "user@example.com", "firebase"),
            id_token: "id-token".to_string(),
            refresh_token: "refresh-token".to_string(),
            expires_at: Utc::now() + Duration::hours(1),
        }
    }

    #[test]
    fn test_load_missing_is_none() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let session = sample_session();

        store.save(&session).unwrap();
        assert_eq!(store.load().unwrap(), Some(session));
    }

    #[test]
    fn test_clear_removes_file() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        store.save(&sample_session()).unwrap();

        store.clear().unwrap();
        assert!(!store.path().exists());
        store.clear().unwrap();
    }

    #[test]
    fn test_corrupt_file_is_no_session() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        std::fs::write(store.path(), "{not json").unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_is_expired() {
        let session = sample_session();
        assert!(!session.is_expired(Utc::now()));
        assert!(session.is_expired(session.expires_at));
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let rendered = format!("{:?}", sample_session());
        assert!(!rendered.contains("refresh-token"));
        assert!(rendered.contains("<redacted>"));
    }

    #[cfg(unix)]
    #[test]
    fn test_session_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        store.save(&sample_session()).unwrap();

        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
