use super::{Error, Result};
use crate::types::Credentials;
use std::env;
use std::io;
use std::process::{Command, ExitCode, Stdio};
use tracing::info;

/// Set in the environment of every program started by `exec`.
pub const BROKER_ENV: &str = "AWS_VAULT";

/// Variables that would shadow the injected credentials.
const CLEARED_ENVS: [&str; 3] = ["AWS_PROFILE", "AWS_DEFAULT_PROFILE", "AWS_CREDENTIAL_FILE"];

pub struct ExecExecInputs<'a> {
    pub profile: &'a str,
    pub region: Option<&'a str>,
    pub arguments: Vec<String>,
}

/// Environment variables describing `credentials` for `profile`.
pub fn credential_envs(
    credentials: &Credentials,
    profile: &str,
    region: Option<&str>,
) -> Vec<(&'static str, String)> {
    let mut envs = vec![
        (BROKER_ENV, profile.to_string()),
        ("AWS_ACCESS_KEY_ID", credentials.access_key_id.clone()),
        ("AWS_SECRET_ACCESS_KEY", credentials.secret_access_key.clone()),
    ];
    if let Some(token) = &credentials.session_token {
        envs.push(("AWS_SESSION_TOKEN", token.clone()));
        envs.push(("AWS_SECURITY_TOKEN", token.clone()));
    }
    if let Some(region) = region {
        envs.push(("AWS_REGION", region.to_string()));
        envs.push(("AWS_DEFAULT_REGION", region.to_string()));
    }
    if let Some(expiration) = credentials.expiration {
        envs.push((
            "AWS_SESSION_EXPIRATION",
            expiration.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        ));
    }
    envs
}

pub fn exec_exec(credentials: &Credentials, exec_inputs: ExecExecInputs) -> Result<ExitCode> {
    if let Ok(active) = env::var(BROKER_ENV) {
        return Err(Error::InvalidCommand(format!(
            "already running with credentials for profile {active}, unset {BROKER_ENV} to nest sessions"
        )));
    }

    let program = exec_inputs
        .arguments
        .first()
        .ok_or(Error::InvalidCommand("Missing Program".to_string()))?;
    let args = &(exec_inputs.arguments)[1..];

    let mut command = Command::new(program);
    for name in CLEARED_ENVS {
        command.env_remove(name);
    }
    if credentials.session_token.is_none() {
        command.env_remove("AWS_SESSION_TOKEN");
        command.env_remove("AWS_SECURITY_TOKEN");
    }

    info!("profile {}: running {}", exec_inputs.profile, program);
    let status = command
        .args(args)
        .envs(credential_envs(
            credentials,
            exec_inputs.profile,
            exec_inputs.region,
        ))
        .stdin(Stdio::inherit())
        .stderr(io::stderr())
        .stdout(io::stdout())
        .spawn()
        .map_err(Error::ProgramSpawnFailed)?
        .wait()
        .map_err(Error::ProgramExecFailed)?;

    Ok(status
        .code()
        .and_then(|code| u8::try_from(code).ok())
        .map_or(ExitCode::FAILURE, ExitCode::from))
}
