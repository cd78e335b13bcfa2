use crate::types::Credentials;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const CREDENTIALS_FILE: &str = "credentials.json";
pub const SESSIONS_FILE: &str = "sessions.json";

#[derive(Debug, thiserror::Error)]
pub enum KeyringError {
    #[error("no credentials stored for {0}")]
    NotFound(String),
    #[error("keyring io error: {0}")]
    Io(#[from] io::Error),
    #[error("keyring serialization failed: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("keyring file {} is corrupt, run `clear` or fix it by hand: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Secret storage keyed by profile name.
pub trait Keyring {
    fn has(&self, name: &str) -> Result<bool, KeyringError>;
    fn get(&self, name: &str) -> Result<Credentials, KeyringError>;
    fn set(&self, name: &str, credentials: &Credentials) -> Result<(), KeyringError>;
    fn remove(&self, name: &str) -> Result<(), KeyringError>;
    fn keys(&self) -> Result<Vec<String>, KeyringError>;
    /// Drops every entry, returning how many were readable.
    fn clear(&self) -> Result<usize, KeyringError>;
}

/// Keyring persisted as a single JSON object. The file is re-read on every
/// call so separate invocations see each other's writes.
#[derive(Debug)]
pub struct JsonKeyring {
    file_path: PathBuf,
}

impl JsonKeyring {
    pub fn new(file_path: PathBuf) -> Self {
        JsonKeyring { file_path }
    }

    fn load(&self) -> Result<BTreeMap<String, Credentials>, KeyringError> {
        if !self.file_path.exists() {
            return Ok(BTreeMap::new());
        }
        let reader = io::BufReader::new(File::open(&self.file_path)?);
        serde_json::from_reader(reader).map_err(|source| KeyringError::Corrupt {
            path: self.file_path.clone(),
            source,
        })
    }

    fn save(&self, entries: &BTreeMap<String, Credentials>) -> Result<(), KeyringError> {
        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = open_private(&self.file_path)?;
        serde_json::to_writer_pretty(file, entries)?;
        Ok(())
    }
}

#[cfg(unix)]
fn open_private(path: &Path) -> io::Result<File> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // mode() only applies on creation
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    Ok(file)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}

impl Keyring for JsonKeyring {
    fn has(&self, name: &str) -> Result<bool, KeyringError> {
        Ok(self.load()?.contains_key(name))
    }

    fn get(&self, name: &str) -> Result<Credentials, KeyringError> {
        self.load()?
            .remove(name)
            .ok_or_else(|| KeyringError::NotFound(name.to_string()))
    }

    fn set(&self, name: &str, credentials: &Credentials) -> Result<(), KeyringError> {
        let mut entries = self.load()?;
        entries.insert(name.to_string(), credentials.clone());
        self.save(&entries)
    }

    fn remove(&self, name: &str) -> Result<(), KeyringError> {
        let mut entries = self.load()?;
        if entries.remove(name).is_none() {
            return Err(KeyringError::NotFound(name.to_string()));
        }
        self.save(&entries)
    }

    fn keys(&self) -> Result<Vec<String>, KeyringError> {
        Ok(self.load()?.into_keys().collect())
    }

    /// A corrupt file is replaced rather than reported.
    fn clear(&self) -> Result<usize, KeyringError> {
        let removed = match self.load() {
            Ok(entries) => entries.len(),
            Err(KeyringError::Corrupt { path, source }) => {
                warn!("discarding corrupt keyring file {}: {}", path.display(), source);
                0
            }
            Err(err) => return Err(err),
        };
        self.save(&BTreeMap::new())?;
        Ok(removed)
    }
}

/// Master credentials and cached session tokens share profile names as keys,
/// so they are kept in separate files.
pub fn build_keyrings(config_dir: &Path) -> (JsonKeyring, JsonKeyring) {
    (
        JsonKeyring::new(config_dir.join(CREDENTIALS_FILE)),
        JsonKeyring::new(config_dir.join(SESSIONS_FILE)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_keyring_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let keyring = JsonKeyring::new(dir.path().join(CREDENTIALS_FILE));

        assert!(!keyring.has("work").unwrap());
        assert!(matches!(
            keyring.get("work"),
            Err(KeyringError::NotFound(name)) if name == "work"
        ));

        let creds = Credentials::new("AKIAEXAMPLE", "secret");
        keyring.set("work", &creds).unwrap();
        keyring.set("home", &creds).unwrap();
        assert!(keyring.has("work").unwrap());
        assert_eq!(keyring.get("work").unwrap(), creds);
        assert_eq!(keyring.keys().unwrap(), vec!["home", "work"]);

        keyring.remove("work").unwrap();
        assert!(!keyring.has("work").unwrap());
        assert!(matches!(
            keyring.remove("work"),
            Err(KeyringError::NotFound(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_json_keyring_file_is_private() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(SESSIONS_FILE);
        let keyring = JsonKeyring::new(path.clone());
        keyring
            .set("work", &Credentials::new("id", "secret"))
            .unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_json_keyring_reports_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CREDENTIALS_FILE);
        fs::write(&path, "not json").unwrap();
        let keyring = JsonKeyring::new(path.clone());

        let err = keyring.has("work").unwrap_err();
        assert!(err.to_string().contains(&path.display().to_string()));
        assert!(matches!(
            keyring.set("work", &Credentials::new("id", "secret")),
            Err(KeyringError::Corrupt { .. })
        ));

        assert_eq!(keyring.clear().unwrap(), 0);
        assert!(keyring.keys().unwrap().is_empty());
        keyring
            .set("work", &Credentials::new("id", "secret"))
            .unwrap();
        assert!(keyring.has("work").unwrap());
    }

    #[test]
    fn test_json_keyring_clear() {
        let dir = tempfile::tempdir().unwrap();
        let keyring = JsonKeyring::new(dir.path().join(SESSIONS_FILE));
        assert_eq!(keyring.clear().unwrap(), 0);

        let creds = Credentials::new("id", "secret");
        keyring.set("dev", &creds).unwrap();
        keyring.set("prod", &creds).unwrap();
        assert_eq!(keyring.clear().unwrap(), 2);
        assert!(!keyring.has("dev").unwrap());
    }
}
