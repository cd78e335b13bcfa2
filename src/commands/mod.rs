pub mod add;
pub mod clear;
pub mod exec;
pub mod export;
pub mod list;
pub mod remove;

use crate::cmd::{Cli, Commands, CredentialArgs};
use crate::config::{self, Config, ConfigLoader, ProfileFile, CONFIG_FILE};
use crate::keyring::{build_keyrings, KeyringError};
use crate::prompt::PromptMethods;
use crate::sts::StsService;
use crate::types::{format_key_for_display, Credentials};
use crate::utils;
use crate::vault::{self, Backends, Vault};
use std::io;
use std::path::Path;
use std::process::ExitCode;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] config::Error),
    #[error(transparent)]
    Vault(#[from] vault::Error),
    #[error(transparent)]
    Keyring(#[from] KeyringError),
    #[error("invalid command: {0}")]
    InvalidCommand(String),
    #[error("failed to start program: {0}")]
    ProgramSpawnFailed(io::Error),
    #[error("program failed during execution: {0}")]
    ProgramExecFailed(io::Error),
    #[error("failed to read input: {0}")]
    Input(io::Error),
    #[error("error formatting profile list using json output: {0}")]
    JsonFormatter(serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

pub async fn run(cli: Cli) -> Result<ExitCode> {
    let config_dir = utils::resolve_config_dir(cli.config_dir.as_deref());
    debug!("using config dir {}", config_dir.display());

    match cli.command {
        Commands::Add { profile, env } => add::exec_add(&config_dir, &profile, env)?,
        Commands::Remove {
            profile,
            sessions_only,
        } => remove::exec_remove(&config_dir, &profile, sessions_only)?,
        Commands::List { formatting } => list::exec_list(&config_dir, &formatting)?,
        Commands::Clear { profile } => clear::exec_clear(&config_dir, profile.as_deref())?,
        Commands::Exec {
            credential,
            arguments,
        } => {
            let (credentials, config) = resolve_credentials(&config_dir, &credential).await?;
            return exec::exec_exec(
                &credentials,
                exec::ExecExecInputs {
                    profile: &credential.profile,
                    region: config.region.as_deref(),
                    arguments,
                },
            );
        }
        Commands::Export { credential } => {
            let (credentials, config) = resolve_credentials(&config_dir, &credential).await?;
            print!(
                "{}",
                export::format_exports(&credentials, &credential.profile, config.region.as_deref())
            );
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Loads the profile chain named by `args` and retrieves its credentials
/// through the file keyrings and STS.
async fn resolve_credentials(
    config_dir: &Path,
    args: &CredentialArgs,
) -> Result<(Credentials, Config)> {
    let profiles = ProfileFile::load(&config_dir.join(CONFIG_FILE))?;
    let config = ConfigLoader::new(&profiles, args.base_config()).load(&args.profile)?;

    let (credentials, sessions) = build_keyrings(config_dir);
    let service = StsService;
    let prompt = PromptMethods;
    let vault = Vault::new(
        Backends::new(&credentials, &sessions, &service, &prompt),
        args.vault_options(),
    );

    let provider = if args.federation_token {
        vault
            .federation_token_provider(&args.profile, &config, &profiles)
            .await?
    } else {
        vault.temp_credentials_provider(&config)?
    };
    debug!("profile {}: retrieving via {}", args.profile, provider.kind());

    let resolved = provider.retrieve().await?;
    if provider.is_expired() {
        warn!(
            "profile {}: credentials from {} are about to expire",
            args.profile,
            provider.kind()
        );
    }
    debug!(
        "profile {}: resolved access key {}",
        args.profile,
        format_key_for_display(&resolved.access_key_id)
    );
    Ok((resolved, config))
}
