use super::{Error, Result};
use crate::keyring::{build_keyrings, Keyring, KeyringError};
use crate::types::{format_key_for_display, Credentials};
use std::env;
use std::io::{self, BufRead, Write};
use std::path::Path;
use tracing::debug;

fn read_env(name: &str) -> Result<String> {
    env::var(name)
        .ok()
        .filter(|value| !value.is_empty())
        .ok_or_else(|| Error::InvalidCommand(format!("missing {name} in environment")))
}

fn read_line(message: &str) -> io::Result<String> {
    let mut stderr = io::stderr();
    write!(stderr, "{message}")?;
    stderr.flush()?;
    let mut input = String::new();
    io::stdin().lock().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

fn credentials_from_env() -> Result<Credentials> {
    Ok(Credentials::new(
        read_env("AWS_ACCESS_KEY_ID")?,
        read_env("AWS_SECRET_ACCESS_KEY")?,
    ))
}

fn credentials_from_prompt() -> Result<Credentials> {
    let access_key_id = read_line("Enter Access Key ID: ").map_err(Error::Input)?;
    let secret_access_key =
        rpassword::prompt_password("Enter Secret Access Key: ").map_err(Error::Input)?;
    let secret_access_key = secret_access_key.trim();
    if access_key_id.is_empty() || secret_access_key.is_empty() {
        return Err(Error::InvalidCommand(
            "access key id and secret access key must not be empty".to_string(),
        ));
    }
    Ok(Credentials::new(access_key_id, secret_access_key))
}

/// Stores `credentials` as the master credentials of `profile` and drops any
/// session cached from the previous ones.
pub fn add_credentials<K: Keyring>(
    credentials_keyring: &K,
    sessions: &K,
    profile: &str,
    credentials: &Credentials,
) -> Result<()> {
    credentials_keyring.set(profile, credentials)?;
    match sessions.remove(profile) {
        Ok(()) => debug!("profile {}: removed cached session", profile),
        Err(KeyringError::NotFound(_)) => {}
        Err(err) => return Err(err.into()),
    }
    Ok(())
}

pub fn exec_add(config_dir: &Path, profile: &str, from_env: bool) -> Result<()> {
    let credentials = if from_env {
        credentials_from_env()?
    } else {
        credentials_from_prompt()?
    };

    let (credentials_keyring, sessions) = build_keyrings(config_dir);
    add_credentials(&credentials_keyring, &sessions, profile, &credentials)?;
    println!(
        "Added credentials to profile {} ({})",
        profile,
        format_key_for_display(&credentials.access_key_id)
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryKeyring;
    use chrono::{Duration, Utc};

    #[test]
    fn test_add_replaces_credentials_and_drops_session() {
        let credentials = MemoryKeyring::with(&[("work", Credentials::new("AKIAOLD", "old"))]);
        let sessions = MemoryKeyring::with(&[(
            "work",
            Credentials::new("ASIA", "tmp").with_session("token", Utc::now() + Duration::hours(1)),
        )]);

        let new = Credentials::new("AKIANEW", "new");
        add_credentials(&credentials, &sessions, "work", &new).unwrap();

        assert_eq!(credentials.entry("work"), Some(new));
        assert_eq!(sessions.entry("work"), None);
    }

    #[test]
    fn test_add_without_cached_session() {
        let credentials = MemoryKeyring::default();
        let sessions = MemoryKeyring::default();
        add_credentials(
            &credentials,
            &sessions,
            "fresh",
            &Credentials::new("AKIA", "secret"),
        )
        .unwrap();
        assert!(credentials.entry("fresh").is_some());
    }
}
