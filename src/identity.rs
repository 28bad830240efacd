//! User identity: email capture, normalization, and the durable session file.
//!
//! The identity is only a storage key. It is never authenticated.
//! - non-empty local part and domain, separated by `@`
//! - the domain contains a dot
//! - no whitespace anywhere once the input is trimmed

use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::DashboardError;

/// Key under which the identity is kept in the session file.
pub const EMAIL_STORAGE_KEY: &str = "wfg_analytics_email";

const SESSION_FILE: &str = "session.json";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("Please enter your email address")]
    Empty,
    #[error("Please enter a valid email address")]
    Malformed,
}

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap())
}

/// Trim surrounding whitespace and lower-case.
pub fn normalize(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// A validated, normalized email used as the remote store key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn parse(raw: &str) -> Result<Identity, IdentityError> {
        let candidate = raw.trim();
        if candidate.is_empty() {
            return Err(IdentityError::Empty);
        }
        if !email_re().is_match(candidate) {
            return Err(IdentityError::Malformed);
        }
        Ok(Identity(normalize(candidate)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Identity {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Identity::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Durable client-side key-value file holding the session identity.
///
/// Read once at startup and written once per successful identity capture.
#[derive(Debug, Clone)]
pub struct IdentityStore {
    path: PathBuf,
}

impl IdentityStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Session file inside a state directory.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(SESSION_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored identity. A value that no longer validates is ignored.
    pub fn load(&self) -> Result<Option<Identity>, DashboardError> {
        let entries = self.read_entries()?;
        let Some(raw) = entries.get(EMAIL_STORAGE_KEY) else {
            return Ok(None);
        };
        match Identity::parse(raw) {
            Ok(identity) => Ok(Some(identity)),
            Err(e) => {
                log::warn!(
                    "Ignoring stored identity in {}: {}",
                    self.path.display(),
                    e
                );
                Ok(None)
            }
        }
    }

    pub fn save(&self, identity: &Identity) -> Result<(), DashboardError> {
        let mut entries = self.entries_or_empty();
        entries.insert(EMAIL_STORAGE_KEY.to_string(), identity.as_str().to_string());
        self.write_entries(&entries)
    }

    /// Forget the stored identity, keeping any other keys in the file.
    pub fn clear(&self) -> Result<(), DashboardError> {
        let mut entries = self.entries_or_empty();
        if entries.remove(EMAIL_STORAGE_KEY).is_none() {
            return Ok(());
        }
        self.write_entries(&entries)
    }

    /// Entries to rewrite. An unreadable file is replaced rather than blocking the write.
    fn entries_or_empty(&self) -> BTreeMap<String, String> {
        self.read_entries().unwrap_or_else(|e| {
            log::warn!(
                "Discarding unreadable session file {}: {}",
                self.path.display(),
                e
            );
            BTreeMap::new()
        })
    }

    fn read_entries(&self) -> Result<BTreeMap<String, String>, DashboardError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        serde_json::from_str(&content).map_err(|e| {
            DashboardError::Io(format!(
                "Failed to parse {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    fn write_entries(&self, entries: &BTreeMap<String, String>) -> Result<(), DashboardError> {
        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        if !parent.exists() {
            std::fs::create_dir_all(parent)?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                std::fs::set_permissions(parent, std::fs::Permissions::from_mode(0o700))?;
            }
        }

        let content = serde_json::to_string_pretty(entries)
            .map_err(|e| DashboardError::Io(format!("Serialize error: {}", e)))?;

        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| DashboardError::Io(e.to_string()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }
}
