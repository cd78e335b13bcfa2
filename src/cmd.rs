use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::BaseConfig;
use crate::prompt;
use crate::vault::VaultOptions;

/// Broker for temporary AWS credentials built from stored master credentials
#[derive(Parser)]
#[command(about, version)]
pub struct Cli {
    /// Optional config dir holding config.json and the keyring files.
    /// If not provided, `$HOME/.aws-broker` will be used
    #[arg(short = ARG_SHORT_CONFIG_DIR, long, global = true, env = "AWS_BROKER_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    /// Increase logging verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

const ARG_SHORT_CONFIG_DIR: char = 'C';
const ARG_SHORT_REGION: char = 'R';
const ARG_SHORT_MFA_TOKEN: char = 't';
const ARG_SHORT_PROMPT: char = 'p';
const ARG_SHORT_FEDERATION_TOKEN: char = 'f';

/// Output format for command results
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum OutputFormat {
    /// JSON formatted output
    Json,
    /// Plain text formatted output
    Text,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Text => write!(f, "text"),
        }
    }
}

fn parse_prompt_method(s: &str) -> Result<String, String> {
    if prompt::AVAILABLE_METHODS.contains(&s) {
        return Ok(s.to_string());
    }
    Err(format!(
        "unknown prompt method, expected one of: {}",
        prompt::AVAILABLE_METHODS.join(", ")
    ))
}

/// Accepts plain seconds or a number suffixed with `s`, `m` or `h`.
fn parse_duration(s: &str) -> Result<Duration, String> {
    let (digits, unit) = match s.char_indices().last() {
        Some((i, c)) if c.is_ascii_alphabetic() => (&s[..i], c),
        _ => (s, 's'),
    };
    let value: u64 = digits
        .parse()
        .map_err(|_| format!("invalid duration {s:?}, expected e.g. 900, 15m or 1h"))?;
    let multiplier: u64 = match unit {
        's' => 1,
        'm' => 60,
        'h' => 60 * 60,
        _ => return Err(format!("invalid duration unit {unit:?}, expected s, m or h")),
    };
    let seconds = value
        .checked_mul(multiplier)
        .ok_or_else(|| format!("duration {s:?} is too large"))?;
    if seconds == 0 {
        return Err("duration must be greater than zero".to_string());
    }
    Ok(Duration::from_secs(seconds))
}

/// Arguments shared by the commands that resolve credentials
#[derive(Args)]
pub struct CredentialArgs {
    /// Profile to resolve credentials for
    pub profile: String,

    /// MFA token code to use instead of prompting
    #[arg(short = ARG_SHORT_MFA_TOKEN, long)]
    pub mfa_token: Option<String>,

    /// Prompt method used to ask for MFA token codes
    #[arg(short = ARG_SHORT_PROMPT, long, default_value = prompt::TERMINAL, value_parser = parse_prompt_method)]
    pub prompt: String,

    /// Region for STS calls and the exported environment
    #[arg(short = ARG_SHORT_REGION, long)]
    pub region: Option<String>,

    /// Duration of session and federation tokens, overriding the profile value
    #[arg(long, value_parser = parse_duration)]
    pub session_ttl: Option<Duration>,

    /// Duration of assumed roles, overriding the profile value
    #[arg(long, value_parser = parse_duration)]
    pub assume_role_ttl: Option<Duration>,

    /// Do not call GetSessionToken for profiles without a role
    #[arg(long, default_value_t = false)]
    pub no_session: bool,

    /// Do not read or write cached session tokens
    #[arg(long, default_value_t = false)]
    pub no_session_cache: bool,

    /// Use GetFederationToken with the master credentials of the profile chain
    #[arg(short = ARG_SHORT_FEDERATION_TOKEN, long, default_value_t = false)]
    pub federation_token: bool,
}

impl CredentialArgs {
    pub fn base_config(&self) -> BaseConfig {
        BaseConfig {
            region: self.region.clone(),
            mfa_token: self.mfa_token.clone(),
            mfa_prompt: Some(self.prompt.clone()),
            session_token_duration: self.session_ttl,
            chained_session_token_duration: self.session_ttl,
            assume_role_duration: self.assume_role_ttl,
            federation_token_duration: self.session_ttl,
        }
    }

    pub fn vault_options(&self) -> VaultOptions {
        VaultOptions {
            use_session: !self.no_session,
            use_session_cache: !self.no_session_cache,
        }
    }
}

#[derive(Args)]
pub struct FormatCommonArgs {
    /// Format for the output list
    #[arg(short = 'F', long, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,
    /// Flag to omit headers in the output
    #[arg(short = 'H', long, default_value_t = false)]
    pub no_headers: bool,
    /// Fields to omit from the output
    #[arg(short = 'O', long, value_delimiter = ',')]
    pub omit_fields: Vec<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// The `Add` subcommand stores master credentials for a profile.
    /// Credentials are prompted for, or read from `AWS_ACCESS_KEY_ID` and
    /// `AWS_SECRET_ACCESS_KEY` when `--env` is set.
    Add {
        /// Profile to store the credentials under
        profile: String,
        /// Read the credentials from the environment
        #[arg(long, default_value_t = false)]
        env: bool,
    },

    /// The `Remove` subcommand deletes the master credentials and cached
    /// session of a profile.
    Remove {
        /// Profile to remove
        profile: String,
        /// Only remove the cached session, keep the master credentials
        #[arg(short = 's', long, default_value_t = false)]
        sessions_only: bool,
    },

    /// The `List` subcommand lists known profiles with the state of their
    /// stored credentials and cached sessions.
    List {
        #[clap(flatten)]
        formatting: FormatCommonArgs,
    },

    /// The `Clear` subcommand removes cached sessions, for one profile or all.
    Clear {
        /// Profile whose cached session should be removed
        profile: Option<String>,
    },

    /// The `Exec` subcommand is used to execute the provided command
    /// with temporary credentials for a profile.
    /// You must provide the command after `--`.
    Exec {
        #[clap(flatten)]
        credential: CredentialArgs,

        /// The command and its arguments to be executed with the credentials.
        #[arg(trailing_var_arg = true)]
        arguments: Vec<String>,
    },

    /// The `Export` subcommand is used to print environment variables for
    /// a profile, for use in shell `eval` commands.
    Export {
        #[clap(flatten)]
        credential: CredentialArgs,
    },
}
