use std::io::{self, BufRead, Write};
use std::process::Command;

pub const TERMINAL: &str = "terminal";
pub const ZENITY: &str = "zenity";
pub const KDIALOG: &str = "kdialog";
pub const OSASCRIPT: &str = "osascript";

pub const AVAILABLE_METHODS: [&str; 4] = [TERMINAL, ZENITY, KDIALOG, OSASCRIPT];

#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("unknown prompt method {0:?}, available: {methods}", methods = AVAILABLE_METHODS.join(", "))]
    UnknownMethod(String),
    #[error("failed to read MFA token: {0}")]
    Io(#[from] io::Error),
    #[error("prompt {method} exited unsuccessfully: {stderr}")]
    Cancelled { method: String, stderr: String },
}

/// Interactive MFA token entry, selected by method name.
pub trait PromptMfa {
    fn prompt(&self, method: &str, message: &str) -> Result<String, PromptError>;
}

#[derive(Debug, Default)]
pub struct PromptMethods;

impl PromptMethods {
    fn terminal(message: &str) -> Result<String, PromptError> {
        let mut stderr = io::stderr();
        write!(stderr, "{message}")?;
        stderr.flush()?;
        let mut input = String::new();
        io::stdin().lock().read_line(&mut input)?;
        Ok(input.trim().to_string())
    }

    fn dialog(method: &str, mut command: Command) -> Result<String, PromptError> {
        let output = command.output()?;
        if !output.status.success() {
            return Err(PromptError::Cancelled {
                method: method.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl PromptMfa for PromptMethods {
    fn prompt(&self, method: &str, message: &str) -> Result<String, PromptError> {
        match method {
            TERMINAL => Self::terminal(message),
            ZENITY => {
                let mut cmd = Command::new("zenity");
                cmd.args(["--entry", "--title", "aws-broker", "--text", message]);
                Self::dialog(method, cmd)
            }
            KDIALOG => {
                let mut cmd = Command::new("kdialog");
                cmd.args(["--inputbox", message, "--title", "aws-broker"]);
                Self::dialog(method, cmd)
            }
            OSASCRIPT => {
                let script = format!(
                    "text returned of (display dialog {message:?} default answer \"\" \
                     buttons {{\"OK\", \"Cancel\"}} default button 1 with title \"aws-broker\")"
                );
                let mut cmd = Command::new("osascript");
                cmd.args(["-e", &script]);
                Self::dialog(method, cmd)
            }
            other => Err(PromptError::UnknownMethod(other.to_string())),
        }
    }
}
