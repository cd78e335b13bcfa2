use super::exec::credential_envs;
use crate::types::Credentials;

/// Shell `export` lines for `credentials`, one per variable.
pub fn format_exports(credentials: &Credentials, profile: &str, region: Option<&str>) -> String {
    credential_envs(credentials, profile, region)
        .into_iter()
        .map(|(name, value)| format!("export {}='{}'\n", name, value.replace('\'', r"'\''")))
        .collect()
}
