use super::Result;
use crate::keyring::{build_keyrings, Keyring, KeyringError};
use std::path::Path;

/// Removes the cached session of `profile`, returning whether one existed.
pub fn remove_session<K: Keyring>(sessions: &K, profile: &str) -> Result<bool> {
    match sessions.remove(profile) {
        Ok(()) => Ok(true),
        Err(KeyringError::NotFound(_)) => Ok(false),
        Err(err) => Err(err.into()),
    }
}

/// Removes the master credentials of `profile` and any session issued from
/// them. Missing master credentials are an error.
pub fn remove_profile<K: Keyring>(
    credentials: &K,
    sessions: &K,
    profile: &str,
    sessions_only: bool,
) -> Result<bool> {
    if !sessions_only {
        credentials.remove(profile)?;
    }
    remove_session(sessions, profile)
}

pub fn exec_remove(config_dir: &Path, profile: &str, sessions_only: bool) -> Result<()> {
    let (credentials, sessions) = build_keyrings(config_dir);
    let had_session = remove_profile(&credentials, &sessions, profile, sessions_only)?;

    if !sessions_only {
        println!("Deleted credentials for profile {profile}");
    }
    if had_session {
        println!("Deleted cached session for profile {profile}");
    }
    Ok(())
}
