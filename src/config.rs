use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE: &str = "config.json";

pub const DEFAULT_SESSION_TOKEN_DURATION: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_CHAINED_SESSION_TOKEN_DURATION: Duration = Duration::from_secs(8 * 60 * 60);
pub const DEFAULT_ASSUME_ROLE_DURATION: Duration = Duration::from_secs(15 * 60);
pub const DEFAULT_FEDERATION_TOKEN_DURATION: Duration = Duration::from_secs(12 * 60 * 60);

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid config due to missing fields or invalid syntax: {0}")]
    InvalidConfig(#[from] serde_json::Error),
    #[error("config file could not be read at {0:?}: {1}")]
    ConfigNotReadable(PathBuf, std::io::Error),
    #[error("cyclic profile chain: {}", .0.join(" -> "))]
    CyclicProfileChain(Vec<String>),
}

pub type Result<T> = std::result::Result<T, Error>;

/// One `profiles` entry of the config file.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct ProfileSection {
    pub region: Option<String>,
    #[serde(alias = "sourceProfile")]
    pub source_profile: Option<String>,
    #[serde(alias = "roleArn")]
    pub role_arn: Option<String>,
    #[serde(alias = "roleSessionName")]
    pub role_session_name: Option<String>,
    #[serde(alias = "externalId")]
    pub external_id: Option<String>,
    #[serde(alias = "mfaSerial")]
    pub mfa_serial: Option<String>,
    #[serde(alias = "assumeRoleDurationSeconds")]
    pub assume_role_duration_seconds: Option<u64>,
    #[serde(alias = "sessionTokenDurationSeconds")]
    pub session_token_duration_seconds: Option<u64>,
    #[serde(alias = "federationTokenDurationSeconds")]
    pub federation_token_duration_seconds: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ProfileFile {
    #[serde(default)]
    pub profiles: HashMap<String, ProfileSection>,
}

impl ProfileFile {
    fn load_from_reader<R: Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader::<R, ProfileFile>(reader)?)
    }

    /// A missing config file is an empty profile set: profiles can exist
    /// purely as keyring entries.
    pub fn load(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(ProfileFile::default());
        }
        let file = File::open(config_path)
            .map_err(|err| Error::ConfigNotReadable(config_path.to_path_buf(), err))?;
        ProfileFile::load_from_reader(std::io::BufReader::new(file))
    }

    pub fn section(&self, profile_name: &str) -> Option<&ProfileSection> {
        self.profiles.get(profile_name)
    }

    pub fn source_profile_name(&self, profile_name: &str) -> Option<&str> {
        self.section(profile_name)?
            .source_profile
            .as_deref()
            .filter(|name| !name.is_empty())
    }

    pub fn profile_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.profiles.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Resolution parameters for a single profile, with its source chain
/// materialized below it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub profile_name: String,
    pub role_arn: Option<String>,
    pub role_session_name: Option<String>,
    pub external_id: Option<String>,
    pub assume_role_duration: Duration,
    pub session_token_duration: Duration,
    pub federation_token_duration: Duration,
    pub mfa_serial: Option<String>,
    pub mfa_token: Option<String>,
    pub mfa_prompt: Option<String>,
    pub region: Option<String>,
    pub source_profile_name: Option<String>,
    pub source_profile: Option<Box<Config>>,
    /// Session token duration used by a source profile when it issues a
    /// session token on behalf of this profile.
    pub chained_session_token_duration: Duration,
}

impl Config {
    pub fn new(profile_name: impl Into<String>) -> Self {
        Self {
            profile_name: profile_name.into(),
            role_arn: None,
            role_session_name: None,
            external_id: None,
            assume_role_duration: DEFAULT_ASSUME_ROLE_DURATION,
            session_token_duration: DEFAULT_SESSION_TOKEN_DURATION,
            federation_token_duration: DEFAULT_FEDERATION_TOKEN_DURATION,
            mfa_serial: None,
            mfa_token: None,
            mfa_prompt: None,
            region: None,
            source_profile_name: None,
            source_profile: None,
            chained_session_token_duration: DEFAULT_CHAINED_SESSION_TOKEN_DURATION,
        }
    }

    pub fn with_source(mut self, source: Config) -> Self {
        self.source_profile_name = Some(source.profile_name.clone());
        self.source_profile = Some(Box::new(source));
        self
    }

    pub fn has_mfa_serial(&self) -> bool {
        self.mfa_serial.is_some()
    }
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.filter(|v| !v.is_empty()).cloned()
}

/// Values applied to every profile of a chain, typically from the command
/// line. Set fields win over the profile file.
#[derive(Debug, Default, Clone)]
pub struct BaseConfig {
    pub region: Option<String>,
    pub mfa_token: Option<String>,
    pub mfa_prompt: Option<String>,
    pub session_token_duration: Option<Duration>,
    pub chained_session_token_duration: Option<Duration>,
    pub assume_role_duration: Option<Duration>,
    pub federation_token_duration: Option<Duration>,
}

pub struct ConfigLoader<'a> {
    file: &'a ProfileFile,
    base: BaseConfig,
}

impl<'a> ConfigLoader<'a> {
    pub fn new(file: &'a ProfileFile, base: BaseConfig) -> Self {
        Self { file, base }
    }

    pub fn load(&self, profile_name: &str) -> Result<Config> {
        let mut visited = Vec::new();
        self.load_chain(profile_name, &mut visited)
    }

    fn load_chain(&self, profile_name: &str, visited: &mut Vec<String>) -> Result<Config> {
        if visited.iter().any(|name| name == profile_name) {
            visited.push(profile_name.to_string());
            return Err(Error::CyclicProfileChain(visited.clone()));
        }
        visited.push(profile_name.to_string());

        let mut config = self.profile_config(profile_name);
        if let Some(source_name) = self.file.source_profile_name(profile_name) {
            let source = self.load_chain(source_name, visited)?;
            config = config.with_source(source);
        }
        Ok(config)
    }

    fn profile_config(&self, profile_name: &str) -> Config {
        let section = self.file.section(profile_name).cloned().unwrap_or_default();
        let seconds = |value: Option<u64>| value.map(Duration::from_secs);
        let base = &self.base;

        let mut config = Config::new(profile_name);
        config.role_arn = non_empty(section.role_arn.as_ref());
        config.role_session_name = non_empty(section.role_session_name.as_ref());
        config.external_id = non_empty(section.external_id.as_ref());
        config.mfa_serial = non_empty(section.mfa_serial.as_ref());
        config.mfa_token = base.mfa_token.clone();
        config.mfa_prompt = base.mfa_prompt.clone();
        config.region = base.region.clone().or(non_empty(section.region.as_ref()));
        config.assume_role_duration = base
            .assume_role_duration
            .or(seconds(section.assume_role_duration_seconds))
            .unwrap_or(DEFAULT_ASSUME_ROLE_DURATION);
        config.session_token_duration = base
            .session_token_duration
            .or(seconds(section.session_token_duration_seconds))
            .unwrap_or(DEFAULT_SESSION_TOKEN_DURATION);
        config.federation_token_duration = base
            .federation_token_duration
            .or(seconds(section.federation_token_duration_seconds))
            .unwrap_or(DEFAULT_FEDERATION_TOKEN_DURATION);
        config.chained_session_token_duration = base
            .chained_session_token_duration
            .unwrap_or(DEFAULT_CHAINED_SESSION_TOKEN_DURATION);
        config
    }
}
