use super::{Error, Result};
use crate::config::Config;
use crate::prompt::PromptMfa;

/// MFA options for a single issuance call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mfa {
    /// Profile named in prompt errors.
    pub profile_name: String,
    pub token: Option<String>,
    pub prompt_method: Option<String>,
    /// `None` means the call is made without MFA.
    pub serial: Option<String>,
}

impl Mfa {
    pub fn from_config(config: &Config) -> Self {
        Self {
            profile_name: config.profile_name.clone(),
            token: config.mfa_token.clone(),
            prompt_method: config.mfa_prompt.clone(),
            serial: config.mfa_serial.clone(),
        }
    }

    pub fn without_serial(mut self) -> Self {
        self.serial = None;
        self
    }

    /// A static token wins over prompting.
    pub fn get_token<P: PromptMfa>(&self, prompt: &P) -> Result<String> {
        if let Some(token) = &self.token {
            return Ok(token.clone());
        }

        if let Some(method) = &self.prompt_method {
            let message = format!(
                "Enter token for {}: ",
                self.serial.as_deref().unwrap_or_default()
            );
            return prompt
                .prompt(method, &message)
                .map_err(|source| Error::Prompt {
                    profile: self.profile_name.clone(),
                    source,
                });
        }

        Err(Error::NoMfaPrompt {
            profile: self.profile_name.clone(),
        })
    }

    /// Serial number and token code to send, both `None` when no serial is set.
    pub(crate) fn resolve<P: PromptMfa>(
        &self,
        prompt: &P,
    ) -> Result<(Option<String>, Option<String>)> {
        match &self.serial {
            Some(serial) => Ok((Some(serial.clone()), Some(self.get_token(prompt)?))),
            None => Ok((None, None)),
        }
    }
}
