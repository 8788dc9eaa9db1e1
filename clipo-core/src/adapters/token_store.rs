//! Token storage adapters
//!
//! - `FileTokenStorage`: `session.json` in the Clipo directory, guarded by an
//!   advisory lock so two CLI processes never interleave writes
//! - `MemoryTokenStorage`: process-local, for tests and embedding

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::result::{Error, Result};
use crate::ports::TokenStorage;

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

/// Key the raw token is stored under
pub const TOKEN_KEY: &str = "JWT_TOKEN";

const SESSION_FILE: &str = "session.json";
const LOCK_FILE: &str = "session.lock";

#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionFile {
    #[serde(rename = "JWT_TOKEN", default, skip_serializing_if = "Option::is_none")]
    jwt_token: Option<String>,
}

/// File-backed token storage
#[derive(Debug, Clone)]
pub struct FileTokenStorage {
    dir: PathBuf,
}

impl FileTokenStorage {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(SESSION_FILE)
    }

    /// Hold an exclusive lock on `session.lock` for the duration of `f`
    fn with_lock<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        fs::create_dir_all(&self.dir)?;
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.dir.join(LOCK_FILE))?;
        lock.lock_exclusive()
            .map_err(|e| Error::storage(format!("Failed to lock session file: {}", e)))?;
        let result = f();
        let _ = FileExt::unlock(&lock);
        result
    }

    fn write_private(path: &Path, content: &str) -> Result<()> {
        let mut options = OpenOptions::new();
        options.create(true).write(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);
        let mut file: File = options.open(path)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        Ok(())
    }
}

impl TokenStorage for FileTokenStorage {
    fn load(&self) -> Result<Option<String>> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        match serde_json::from_str::<SessionFile>(&content) {
            Ok(file) => Ok(file.jwt_token.filter(|t| !t.is_empty())),
            Err(e) => {
                // Unreadable session is treated as logged out
                warn!(path = %path.display(), error = %e, "ignoring malformed session file");
                Ok(None)
            }
        }
    }

    fn save(&self, token: &str) -> Result<()> {
        self.with_lock(|| {
            let content = serde_json::to_string_pretty(&SessionFile {
                jwt_token: Some(token.to_string()),
            })?;
            let tmp = self.dir.join(format!("{}.tmp", SESSION_FILE));
            Self::write_private(&tmp, &content)?;
            fs::rename(&tmp, self.path())?;
            Ok(())
        })
    }

    fn clear(&self) -> Result<()> {
        self.with_lock(|| match fs::remove_file(self.path()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        })
    }
}

/// In-memory token storage
#[derive(Debug, Default)]
pub struct MemoryTokenStorage {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a token already persisted
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }

    fn slot(&self) -> Result<std::sync::MutexGuard<'_, Option<String>>> {
        self.token
            .lock()
            .map_err(|e| Error::storage(format!("Lock poisoned: {}", e)))
    }
}

impl TokenStorage for MemoryTokenStorage {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.slot()?.clone())
    }

    fn save(&self, token: &str) -> Result<()> {
        *self.slot()? = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.slot()? = None;
        Ok(())
    }
}
