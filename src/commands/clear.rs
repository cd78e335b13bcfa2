use super::remove::remove_session;
use super::Result;
use crate::keyring::{build_keyrings, Keyring};
use std::path::Path;

/// Removes the cached session of `profile`, or every cached session. Clearing
/// every session also resets an unreadable session file.
pub fn clear_sessions<K: Keyring>(sessions: &K, profile: Option<&str>) -> Result<usize> {
    match profile {
        Some(name) => Ok(usize::from(remove_session(sessions, name)?)),
        None => Ok(sessions.clear()?),
    }
}

pub fn exec_clear(config_dir: &Path, profile: Option<&str>) -> Result<()> {
    let (_, sessions) = build_keyrings(config_dir);
    let removed = clear_sessions(&sessions, profile)?;
    println!("Cleared {removed} session(s)");
    Ok(())
}
