use super::{Error, Result};
use crate::cmd::{FormatCommonArgs, OutputFormat};
use crate::config::{ProfileFile, CONFIG_FILE};
use crate::keyring::{build_keyrings, Keyring, KeyringError};
use crate::types::{format_key_for_display, DEFAULT_EXPIRY_WINDOW};
use crate::utils::formatters::json::JsonFormatter;
use crate::utils::formatters::text::TextFormatter;
use crate::utils::formatters::{TabularFormatter, Table};
use std::collections::BTreeSet;
use std::path::Path;

const JSON_HEADERS: [&str; 5] = ["profile", "credentials", "sourceProfile", "roleArn", "session"];
const TEXT_HEADERS: [&str; 5] = ["Profile", "Credentials", "Source Profile", "Role", "Session"];
const NONE: &str = "-";

/// One row per profile found in the config file or either keyring.
pub fn profile_rows<K: Keyring>(
    profiles: &ProfileFile,
    credentials: &K,
    sessions: &K,
) -> std::result::Result<Vec<Vec<String>>, KeyringError> {
    let stored = credentials.keys()?;
    let cached = sessions.keys()?;
    let names: BTreeSet<&str> = profiles
        .profile_names()
        .into_iter()
        .chain(stored.iter().map(String::as_str))
        .chain(cached.iter().map(String::as_str))
        .collect();

    names
        .into_iter()
        .map(|name| -> std::result::Result<Vec<String>, KeyringError> {
            let section = profiles.section(name);
            let credential = if stored.iter().any(|stored| stored == name) {
                format_key_for_display(&credentials.get(name)?.access_key_id)
            } else {
                NONE.to_string()
            };
            let session = if cached.iter().any(|cached| cached == name) {
                let session = sessions.get(name)?;
                match session.expiration {
                    Some(expiration) if session.is_fresh(DEFAULT_EXPIRY_WINDOW) => format!(
                        "valid until {}",
                        expiration.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
                    ),
                    _ => "expired".to_string(),
                }
            } else {
                NONE.to_string()
            };
            let field = |value: Option<&String>| value.map_or(NONE.to_string(), String::clone);

            Ok(vec![
                name.to_string(),
                credential,
                field(section.and_then(|s| s.source_profile.as_ref())),
                field(section.and_then(|s| s.role_arn.as_ref())),
                session,
            ])
        })
        .collect()
}

pub fn exec_list(config_dir: &Path, formatting: &FormatCommonArgs) -> Result<()> {
    let profiles = ProfileFile::load(&config_dir.join(CONFIG_FILE))?;
    let (credentials, sessions) = build_keyrings(config_dir);
    let rows = profile_rows(&profiles, &credentials, &sessions)?;
    let omit_fields: Vec<&str> = formatting.omit_fields.iter().map(|v| v.as_str()).collect();

    let output = match formatting.output {
        OutputFormat::Json => JsonFormatter::new(omit_fields, formatting.no_headers)
            .format(&Table::new(&JSON_HEADERS, rows))
            .map_err(Error::JsonFormatter)?,
        OutputFormat::Text => TextFormatter::new(omit_fields, formatting.no_headers, " | ")
            .format(&Table::new(&TEXT_HEADERS, rows))
            .unwrap_or_else(|never| match never {}),
    };
    println!("{output}");
    Ok(())
}
