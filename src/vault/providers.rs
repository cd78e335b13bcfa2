use super::mfa::Mfa;
use super::{Backends, Error, Result};
use crate::keyring::Keyring;
use crate::prompt::PromptMfa;
use crate::sts::{
    AssumeRoleInput, Caller, FederationTokenInput, IdentityService, SessionTokenInput,
};
use crate::types::{format_key_for_display, Credentials, DEFAULT_EXPIRY_WINDOW};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

const SESSION_NAME_PREFIX: &str = "aws-broker";

/// Expiration of the most recently retrieved credentials.
#[derive(Debug)]
pub struct Expiry {
    window: ChronoDuration,
    expiration: Mutex<Option<DateTime<Utc>>>,
}

impl Default for Expiry {
    fn default() -> Self {
        Self {
            window: DEFAULT_EXPIRY_WINDOW,
            expiration: Mutex::new(None),
        }
    }
}

impl Expiry {
    fn record(&self, credentials: &Credentials) {
        *self
            .expiration
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = credentials.expiration;
    }

    pub fn is_expired(&self) -> bool {
        match *self
            .expiration
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
        {
            Some(expiration) => Utc::now() + self.window >= expiration,
            None => true,
        }
    }
}

/// Returns the master credentials stored for a profile.
pub struct KeyringProvider<'a, K> {
    keyring: &'a K,
    profile_name: String,
}

impl<'a, K: Keyring> KeyringProvider<'a, K> {
    pub fn new(keyring: &'a K, profile_name: impl Into<String>) -> Self {
        Self {
            keyring,
            profile_name: profile_name.into(),
        }
    }

    pub fn retrieve(&self) -> Result<Credentials> {
        let credentials = self
            .keyring
            .get(&self.profile_name)
            .map_err(|source| Error::Keyring {
                profile: self.profile_name.clone(),
                source,
            })?;
        debug!(
            profile = %self.profile_name,
            access_key_id = %format_key_for_display(&credentials.access_key_id),
            "looked up master credentials"
        );
        Ok(credentials)
    }
}

pub struct SessionTokenProvider<'a, K, S, P> {
    backends: Backends<'a, K, S, P>,
    source: Box<Provider<'a, K, S, P>>,
    profile_name: String,
    region: Option<String>,
    duration: Duration,
    mfa: Mfa,
    expiry: Expiry,
}

impl<'a, K, S, P> SessionTokenProvider<'a, K, S, P>
where
    K: Keyring,
    S: IdentityService,
    P: PromptMfa,
{
    pub fn new(
        backends: Backends<'a, K, S, P>,
        source: Provider<'a, K, S, P>,
        profile_name: impl Into<String>,
        region: Option<String>,
        duration: Duration,
        mfa: Mfa,
    ) -> Self {
        Self {
            backends,
            source: Box::new(source),
            profile_name: profile_name.into(),
            region,
            duration,
            mfa,
            expiry: Expiry::default(),
        }
    }

    #[cfg(test)]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub async fn retrieve(&self) -> Result<Credentials> {
        let source = Box::pin(self.source.retrieve()).await?;
        let (mfa_serial, mfa_token) = self.mfa.resolve(self.backends.prompt)?;
        let caller = Caller {
            credentials: source,
            region: self.region.clone(),
        };
        let input = SessionTokenInput {
            duration: self.duration,
            mfa_serial,
            mfa_token,
        };
        let credentials = self
            .backends
            .service
            .get_session_token(&caller, &input)
            .await
            .map_err(|source| Error::Service {
                profile: self.profile_name.clone(),
                source,
            })?;
        self.expiry.record(&credentials);
        Ok(credentials)
    }
}

/// Serves session tokens from the session keyring until they come within
/// the expiry window of their expiration.
pub struct CachedSessionTokenProvider<'a, K, S, P> {
    sessions: &'a K,
    profile_name: String,
    window: ChronoDuration,
    provider: SessionTokenProvider<'a, K, S, P>,
    expiry: Expiry,
}

impl<'a, K, S, P> CachedSessionTokenProvider<'a, K, S, P>
where
    K: Keyring,
    S: IdentityService,
    P: PromptMfa,
{
    pub fn new(
        sessions: &'a K,
        profile_name: impl Into<String>,
        provider: SessionTokenProvider<'a, K, S, P>,
    ) -> Self {
        Self {
            sessions,
            profile_name: profile_name.into(),
            window: DEFAULT_EXPIRY_WINDOW,
            provider,
            expiry: Expiry::default(),
        }
    }

    #[cfg(test)]
    pub fn inner(&self) -> &SessionTokenProvider<'a, K, S, P> {
        &self.provider
    }

    pub async fn retrieve(&self) -> Result<Credentials> {
        match self.sessions.get(&self.profile_name) {
            Ok(cached) if cached.is_fresh(self.window) => {
                debug!(profile = %self.profile_name, expiration = ?cached.expiration, "using cached session token");
                self.expiry.record(&cached);
                return Ok(cached);
            }
            Ok(_) => debug!(profile = %self.profile_name, "cached session token expired"),
            Err(err) => debug!(profile = %self.profile_name, "session cache miss: {}", err),
        }

        let credentials = self.provider.retrieve().await?;
        self.sessions
            .set(&self.profile_name, &credentials)
            .map_err(|source| Error::Keyring {
                profile: self.profile_name.clone(),
                source,
            })?;
        self.expiry.record(&credentials);
        Ok(credentials)
    }
}

pub struct AssumeRoleProvider<'a, K, S, P> {
    backends: Backends<'a, K, S, P>,
    source: Box<Provider<'a, K, S, P>>,
    profile_name: String,
    region: Option<String>,
    role_arn: String,
    role_session_name: Option<String>,
    external_id: Option<String>,
    duration: Duration,
    mfa: Mfa,
    expiry: Expiry,
}

pub struct AssumeRoleParams {
    pub role_arn: String,
    pub role_session_name: Option<String>,
    pub external_id: Option<String>,
    pub duration: Duration,
    pub mfa: Mfa,
}

impl<'a, K, S, P> AssumeRoleProvider<'a, K, S, P>
where
    K: Keyring,
    S: IdentityService,
    P: PromptMfa,
{
    pub fn new(
        backends: Backends<'a, K, S, P>,
        source: Provider<'a, K, S, P>,
        profile_name: impl Into<String>,
        region: Option<String>,
        params: AssumeRoleParams,
    ) -> Self {
        Self {
            backends,
            source: Box::new(source),
            profile_name: profile_name.into(),
            region,
            role_arn: params.role_arn,
            role_session_name: params.role_session_name,
            external_id: params.external_id,
            duration: params.duration,
            mfa: params.mfa,
            expiry: Expiry::default(),
        }
    }

    #[cfg(test)]
    pub fn mfa_serial(&self) -> Option<&str> {
        self.mfa.serial.as_deref()
    }

    fn session_name(&self) -> String {
        self.role_session_name.clone().unwrap_or_else(|| {
            format!("{SESSION_NAME_PREFIX}-{}", Utc::now().timestamp_millis())
        })
    }

    pub async fn retrieve(&self) -> Result<Credentials> {
        let source = Box::pin(self.source.retrieve()).await?;
        let (mfa_serial, mfa_token) = self.mfa.resolve(self.backends.prompt)?;
        let caller = Caller {
            credentials: source,
            region: self.region.clone(),
        };
        let input = AssumeRoleInput {
            role_arn: self.role_arn.clone(),
            role_session_name: self.session_name(),
            external_id: self.external_id.clone(),
            duration: self.duration,
            mfa_serial,
            mfa_token,
        };
        let credentials = self
            .backends
            .service
            .assume_role(&caller, &input)
            .await
            .map_err(|source| Error::Service {
                profile: self.profile_name.clone(),
                source,
            })?;
        self.expiry.record(&credentials);
        Ok(credentials)
    }
}

/// Issues federation tokens for an IAM user from its master credentials.
pub struct FederationTokenProvider<'a, K, S> {
    service: &'a S,
    source: KeyringProvider<'a, K>,
    region: Option<String>,
    name: String,
    duration: Duration,
    expiry: Expiry,
}

impl<'a, K: Keyring, S: IdentityService> FederationTokenProvider<'a, K, S> {
    pub fn new(
        service: &'a S,
        source: KeyringProvider<'a, K>,
        region: Option<String>,
        name: impl Into<String>,
        duration: Duration,
    ) -> Self {
        Self {
            service,
            source,
            region,
            name: name.into(),
            duration,
            expiry: Expiry::default(),
        }
    }

    #[cfg(test)]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn retrieve(&self) -> Result<Credentials> {
        let caller = Caller {
            credentials: self.source.retrieve()?,
            region: self.region.clone(),
        };
        let input = FederationTokenInput {
            name: self.name.clone(),
            duration: self.duration,
        };
        let credentials = self
            .service
            .get_federation_token(&caller, &input)
            .await
            .map_err(|source| Error::Service {
                profile: self.source.profile_name.clone(),
                source,
            })?;
        self.expiry.record(&credentials);
        Ok(credentials)
    }
}

/// The issuance strategies the resolution engine can select.
pub enum Provider<'a, K, S, P> {
    Keyring(KeyringProvider<'a, K>),
    SessionToken(SessionTokenProvider<'a, K, S, P>),
    CachedSessionToken(CachedSessionTokenProvider<'a, K, S, P>),
    AssumeRole(AssumeRoleProvider<'a, K, S, P>),
    FederationToken(FederationTokenProvider<'a, K, S>),
}

impl<K, S, P> Provider<'_, K, S, P>
where
    K: Keyring,
    S: IdentityService,
    P: PromptMfa,
{
    pub async fn retrieve(&self) -> Result<Credentials> {
        match self {
            Provider::Keyring(provider) => provider.retrieve(),
            Provider::SessionToken(provider) => provider.retrieve().await,
            Provider::CachedSessionToken(provider) => provider.retrieve().await,
            Provider::AssumeRole(provider) => provider.retrieve().await,
            Provider::FederationToken(provider) => provider.retrieve().await,
        }
    }

    /// Master credentials never expire.
    pub fn is_expired(&self) -> bool {
        match self {
            Provider::Keyring(_) => false,
            Provider::SessionToken(provider) => provider.expiry.is_expired(),
            Provider::CachedSessionToken(provider) => provider.expiry.is_expired(),
            Provider::AssumeRole(provider) => provider.expiry.is_expired(),
            Provider::FederationToken(provider) => provider.expiry.is_expired(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Provider::Keyring(_) => "Keyring",
            Provider::SessionToken(_) => "GetSessionToken",
            Provider::CachedSessionToken(_) => "CachedGetSessionToken",
            Provider::AssumeRole(_) => "AssumeRole",
            Provider::FederationToken(_) => "GetFederationToken",
        }
    }
}
