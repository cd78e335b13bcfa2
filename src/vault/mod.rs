//! Credential resolution.
//!
//! A profile's credentials come from one of two sources: master credentials
//! stored in the keyring under the profile's own name, or the resolved
//! credentials of its source profile. On top of that source the engine
//! layers at most one issuance call per profile (GetSessionToken or
//! AssumeRole), walking the whole source chain recursively.

pub mod mfa;
pub mod providers;

use crate::config::{Config, ProfileFile};
use crate::keyring::{Keyring, KeyringError};
use crate::prompt::{PromptError, PromptMfa};
use crate::sts::{Caller, IdentityService, ServiceError};
use mfa::Mfa;
use providers::{
    AssumeRoleParams, AssumeRoleProvider, CachedSessionTokenProvider, FederationTokenProvider,
    KeyringProvider, Provider, SessionTokenProvider,
};
use regex::Regex;
use std::sync::LazyLock;
use tracing::info;

static IAM_USER_ARN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^arn:[^:]+:iam::\d{12}:user/(?:[^/]+/)*([^/]+)$")
        .expect("IAM user ARN pattern should be valid")
});

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("profile {profile}: credentials missing")]
    CredentialsMissing { profile: String },
    #[error("cyclic profile chain: {}", .0.join(" -> "))]
    CyclicProfileChain(Vec<String>),
    #[error("profile {profile}: no MFA prompt available, set a prompt method or pass an MFA token")]
    NoMfaPrompt { profile: String },
    #[error("profile {profile}: {source}")]
    Prompt {
        profile: String,
        source: PromptError,
    },
    #[error("profile {profile}: {source}")]
    Keyring {
        profile: String,
        source: KeyringError,
    },
    #[error("profile {profile}: {source}")]
    Service {
        profile: String,
        source: ServiceError,
    },
    #[error("GetFederationToken requires IAM user credentials, got {0}")]
    NotAnIamUser(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// The collaborators every provider talks to.
pub struct Backends<'a, K, S, P> {
    pub credentials: &'a K,
    pub sessions: &'a K,
    pub service: &'a S,
    pub prompt: &'a P,
}

impl<K, S, P> Clone for Backends<'_, K, S, P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, S, P> Copy for Backends<'_, K, S, P> {}

impl<'a, K, S, P> Backends<'a, K, S, P> {
    pub fn new(credentials: &'a K, sessions: &'a K, service: &'a S, prompt: &'a P) -> Self {
        Self {
            credentials,
            sessions,
            service,
            prompt,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct VaultOptions {
    /// Issue GetSessionToken for profiles that do not assume a role.
    pub use_session: bool,
    /// Cache issued session tokens in the session keyring.
    pub use_session_cache: bool,
}

impl Default for VaultOptions {
    fn default() -> Self {
        Self {
            use_session: true,
            use_session_cache: true,
        }
    }
}

struct Resolution<'a, K, S, P> {
    provider: Provider<'a, K, S, P>,
    /// MFA serial this profile hands to the profile chained from it, `None`
    /// once session tokens are disabled.
    mfa_serial: Option<String>,
}

pub struct Vault<'a, K, S, P> {
    backends: Backends<'a, K, S, P>,
    options: VaultOptions,
}

impl<'a, K, S, P> Vault<'a, K, S, P>
where
    K: Keyring,
    S: IdentityService,
    P: PromptMfa,
{
    pub fn new(backends: Backends<'a, K, S, P>, options: VaultOptions) -> Self {
        Self { backends, options }
    }

    /// Builds the provider chain for `config`.
    pub fn temp_credentials_provider(&self, config: &Config) -> Result<Provider<'a, K, S, P>> {
        let mut visited = Vec::new();
        self.resolve(config, None, &mut visited)
            .map(|resolution| resolution.provider)
    }

    fn resolve(
        &self,
        config: &Config,
        chained_from: Option<&Config>,
        visited: &mut Vec<String>,
    ) -> Result<Resolution<'a, K, S, P>> {
        if visited.contains(&config.profile_name) {
            visited.push(config.profile_name.clone());
            return Err(Error::CyclicProfileChain(visited.clone()));
        }
        visited.push(config.profile_name.clone());

        let has_stored_credentials = self
            .backends
            .credentials
            .has(&config.profile_name)
            .map_err(|source| Error::Keyring {
                profile: config.profile_name.clone(),
                source,
            })?;

        let (source, source_mfa_serial) = if has_stored_credentials {
            info!(
                "profile {}: using stored credentials{}",
                config.profile_name,
                if config.source_profile.is_some() {
                    " (ignoring source_profile)"
                } else {
                    ""
                }
            );
            let provider =
                KeyringProvider::new(self.backends.credentials, config.profile_name.clone());
            (Provider::Keyring(provider), None)
        } else if let Some(source_config) = config.source_profile.as_deref() {
            let resolution = self.resolve(source_config, Some(config), visited)?;
            (resolution.provider, resolution.mfa_serial)
        } else {
            return Err(Error::CredentialsMissing {
                profile: config.profile_name.clone(),
            });
        };

        let mfa_chained = source_mfa_serial.is_some() && source_mfa_serial == config.mfa_serial;

        let Some(role_arn) = config.role_arn.clone() else {
            if !self.options.use_session {
                return Ok(Resolution {
                    provider: source,
                    mfa_serial: None,
                });
            }

            let mut duration = config.session_token_duration;
            if let Some(parent) = chained_from {
                if !parent.has_mfa_serial() {
                    info!(
                        "profile {}: not using GetSessionToken because profile '{}' has no MFA serial defined",
                        config.profile_name, parent.profile_name
                    );
                    return Ok(passthrough(source, config));
                }

                if parent.mfa_serial != config.mfa_serial {
                    info!(
                        "profile {}: not using GetSessionToken because MFA serial doesn't match with profile '{}'",
                        config.profile_name, parent.profile_name
                    );
                    return Ok(passthrough(source, config));
                }

                duration = parent.chained_session_token_duration;
            }

            info!(
                "profile {}: using GetSessionToken {}",
                config.profile_name,
                mfa_details(false, config)
            );
            return Ok(Resolution {
                provider: self.session_token_provider(source, config, duration),
                mfa_serial: config.mfa_serial.clone(),
            });
        };

        info!(
            "profile {}: using AssumeRole {}",
            config.profile_name,
            mfa_details(mfa_chained, config)
        );
        let mut mfa = Mfa::from_config(config);
        if mfa_chained {
            mfa = mfa.without_serial();
        }
        let params = AssumeRoleParams {
            role_arn,
            role_session_name: config.role_session_name.clone(),
            external_id: config.external_id.clone(),
            duration: config.assume_role_duration,
            mfa,
        };
        Ok(Resolution {
            provider: Provider::AssumeRole(AssumeRoleProvider::new(
                self.backends,
                source,
                config.profile_name.clone(),
                config.region.clone(),
                params,
            )),
            mfa_serial: config.mfa_serial.clone(),
        })
    }

    fn session_token_provider(
        &self,
        source: Provider<'a, K, S, P>,
        config: &Config,
        duration: std::time::Duration,
    ) -> Provider<'a, K, S, P> {
        let provider = SessionTokenProvider::new(
            self.backends,
            source,
            config.profile_name.clone(),
            config.region.clone(),
            duration,
            Mfa::from_config(config),
        );

        if self.options.use_session_cache {
            return Provider::CachedSessionToken(CachedSessionTokenProvider::new(
                self.backends.sessions,
                config.profile_name.clone(),
                provider,
            ));
        }

        Provider::SessionToken(provider)
    }

    /// Builds a GetFederationToken provider backed by the nearest master
    /// credentials up the chain of `profile_name`.
    pub async fn federation_token_provider(
        &self,
        profile_name: &str,
        config: &Config,
        profiles: &ProfileFile,
    ) -> Result<Provider<'a, K, S, P>> {
        let credentials_name =
            master_credentials_for(profile_name, self.backends.credentials, profiles)?;
        let master = KeyringProvider::new(self.backends.credentials, credentials_name.clone());
        let caller = Caller {
            credentials: master.retrieve()?,
            region: config.region.clone(),
        };
        let arn = self
            .backends
            .service
            .get_caller_identity(&caller)
            .await
            .map_err(|source| Error::Service {
                profile: credentials_name,
                source,
            })?;
        let username = username_from_arn(&arn)?;

        info!("profile {}: using GetFederationToken for {}", profile_name, username);
        Ok(Provider::FederationToken(FederationTokenProvider::new(
            self.backends.service,
            master,
            config.region.clone(),
            username,
            config.federation_token_duration,
        )))
    }
}

fn passthrough<'a, K, S, P>(
    source: Provider<'a, K, S, P>,
    config: &Config,
) -> Resolution<'a, K, S, P> {
    Resolution {
        provider: source,
        mfa_serial: config.mfa_serial.clone(),
    }
}

fn mfa_details(mfa_chained: bool, config: &Config) -> &'static str {
    if mfa_chained {
        return "(chained MFA)";
    }
    if config.has_mfa_serial() {
        return "(using MFA)";
    }
    ""
}

/// Name of the first profile, starting at `profile_name` and following
/// source profile names, that has master credentials in `keyring`.
pub fn master_credentials_for<K: Keyring>(
    profile_name: &str,
    keyring: &K,
    profiles: &ProfileFile,
) -> Result<String> {
    let mut visited: Vec<String> = Vec::new();
    let mut current = profile_name.to_string();
    loop {
        if visited.contains(&current) {
            visited.push(current);
            return Err(Error::CyclicProfileChain(visited));
        }

        let has_master_credentials = keyring.has(&current).map_err(|source| Error::Keyring {
            profile: current.clone(),
            source,
        })?;
        if has_master_credentials {
            return Ok(current);
        }

        let Some(source_name) = profiles.source_profile_name(&current) else {
            return Err(Error::CredentialsMissing { profile: current });
        };
        let next = source_name.to_string();
        visited.push(std::mem::replace(&mut current, next));
    }
}

pub fn username_from_arn(arn: &str) -> Result<String> {
    IAM_USER_ARN
        .captures(arn)
        .and_then(|captures| captures.get(1))
        .map(|name| name.as_str().to_string())
        .ok_or_else(|| Error::NotAnIamUser(arn.to_string()))
}
