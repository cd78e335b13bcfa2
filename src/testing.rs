//! In-memory doubles for the keyring, STS and MFA prompt collaborators.

use crate::keyring::{Keyring, KeyringError};
use crate::prompt::{PromptError, PromptMfa};
use crate::sts::{
    AssumeRoleInput, Caller, FederationTokenInput, IdentityService, ServiceError,
    SessionTokenInput,
};
use crate::types::Credentials;
use chrono::{Duration, Utc};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct MemoryKeyring {
    entries: Mutex<BTreeMap<String, Credentials>>,
    has_calls: AtomicUsize,
    set_calls: AtomicUsize,
}

impl MemoryKeyring {
    pub fn with(entries: &[(&str, Credentials)]) -> Self {
        let keyring = Self::default();
        for (name, creds) in entries {
            keyring
                .entries
                .lock()
                .unwrap()
                .insert(name.to_string(), creds.clone());
        }
        keyring
    }

    pub fn has_calls(&self) -> usize {
        self.has_calls.load(Ordering::SeqCst)
    }

    pub fn set_calls(&self) -> usize {
        self.set_calls.load(Ordering::SeqCst)
    }

    pub fn entry(&self, name: &str) -> Option<Credentials> {
        self.entries.lock().unwrap().get(name).cloned()
    }
}

impl Keyring for MemoryKeyring {
    fn has(&self, name: &str) -> Result<bool, KeyringError> {
        self.has_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.entries.lock().unwrap().contains_key(name))
    }

    fn get(&self, name: &str) -> Result<Credentials, KeyringError> {
        self.entry(name)
            .ok_or_else(|| KeyringError::NotFound(name.to_string()))
    }

    fn set(&self, name: &str, credentials: &Credentials) -> Result<(), KeyringError> {
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        self.entries
            .lock()
            .unwrap()
            .insert(name.to_string(), credentials.clone());
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<(), KeyringError> {
        self.entries
            .lock()
            .unwrap()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| KeyringError::NotFound(name.to_string()))
    }

    fn keys(&self) -> Result<Vec<String>, KeyringError> {
        Ok(self.entries.lock().unwrap().keys().cloned().collect())
    }

    fn clear(&self) -> Result<usize, KeyringError> {
        let mut entries = self.entries.lock().unwrap();
        let removed = entries.len();
        entries.clear();
        Ok(removed)
    }
}

/// Keyring whose every call fails.
#[derive(Debug, Default)]
pub struct BrokenKeyring;

impl Keyring for BrokenKeyring {
    fn has(&self, _: &str) -> Result<bool, KeyringError> {
        Err(broken())
    }
    fn get(&self, _: &str) -> Result<Credentials, KeyringError> {
        Err(broken())
    }
    fn set(&self, _: &str, _: &Credentials) -> Result<(), KeyringError> {
        Err(broken())
    }
    fn remove(&self, _: &str) -> Result<(), KeyringError> {
        Err(broken())
    }
    fn keys(&self) -> Result<Vec<String>, KeyringError> {
        Err(broken())
    }
    fn clear(&self) -> Result<usize, KeyringError> {
        Err(broken())
    }
}

fn broken() -> KeyringError {
    KeyringError::Io(std::io::Error::new(
        std::io::ErrorKind::PermissionDenied,
        "keyring locked",
    ))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    SessionToken {
        caller_key: String,
        input: SessionTokenInput,
    },
    AssumeRole {
        caller_key: String,
        input: AssumeRoleInput,
    },
    FederationToken {
        caller_key: String,
        input: FederationTokenInput,
    },
    CallerIdentity {
        caller_key: String,
    },
}

/// Issues credentials named after the call count and records every request.
#[derive(Debug)]
pub struct RecordingService {
    calls: Mutex<Vec<Call>>,
    caller_arn: String,
    fail: bool,
}

impl Default for RecordingService {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            caller_arn: "arn:aws:iam::111111111111:user/alice".to_string(),
            fail: false,
        }
    }
}

impl RecordingService {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn with_caller_arn(arn: &str) -> Self {
        Self {
            caller_arn: arn.to_string(),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn issue(&self, call: Call, operation: &'static str) -> Result<Credentials, ServiceError> {
        let mut calls = self.calls.lock().unwrap();
        calls.push(call);
        if self.fail {
            return Err(ServiceError::Sdk {
                operation,
                message: "AccessDenied".to_string(),
            });
        }
        Ok(Credentials::new(format!("ASIA{}", calls.len()), "temporary-secret")
            .with_session(format!("token-{}", calls.len()), Utc::now() + Duration::hours(1)))
    }
}

impl IdentityService for RecordingService {
    async fn get_session_token(
        &self,
        caller: &Caller,
        input: &SessionTokenInput,
    ) -> Result<Credentials, ServiceError> {
        self.issue(
            Call::SessionToken {
                caller_key: caller.credentials.access_key_id.clone(),
                input: input.clone(),
            },
            "GetSessionToken",
        )
    }

    async fn assume_role(
        &self,
        caller: &Caller,
        input: &AssumeRoleInput,
    ) -> Result<Credentials, ServiceError> {
        self.issue(
            Call::AssumeRole {
                caller_key: caller.credentials.access_key_id.clone(),
                input: input.clone(),
            },
            "AssumeRole",
        )
    }

    async fn get_federation_token(
        &self,
        caller: &Caller,
        input: &FederationTokenInput,
    ) -> Result<Credentials, ServiceError> {
        self.issue(
            Call::FederationToken {
                caller_key: caller.credentials.access_key_id.clone(),
                input: input.clone(),
            },
            "GetFederationToken",
        )
    }

    async fn get_caller_identity(&self, caller: &Caller) -> Result<String, ServiceError> {
        self.calls.lock().unwrap().push(Call::CallerIdentity {
            caller_key: caller.credentials.access_key_id.clone(),
        });
        Ok(self.caller_arn.clone())
    }
}

/// Answers every prompt with the same token, or cancels it, and records the
/// messages shown.
#[derive(Debug)]
pub struct ScriptedPrompt {
    token: Option<String>,
    messages: Mutex<Vec<(String, String)>>,
}

impl ScriptedPrompt {
    pub fn new(token: &str) -> Self {
        Self {
            token: Some(token.to_string()),
            messages: Mutex::new(Vec::new()),
        }
    }

    pub fn cancelled() -> Self {
        Self {
            token: None,
            messages: Mutex::new(Vec::new()),
        }
    }

    pub fn messages(&self) -> Vec<(String, String)> {
        self.messages.lock().unwrap().clone()
    }
}

impl PromptMfa for ScriptedPrompt {
    fn prompt(&self, method: &str, message: &str) -> Result<String, PromptError> {
        self.messages
            .lock()
            .unwrap()
            .push((method.to_string(), message.to_string()));
        self.token.clone().ok_or_else(|| PromptError::Cancelled {
            method: method.to_string(),
            stderr: "dialog closed".to_string(),
        })
    }
}
