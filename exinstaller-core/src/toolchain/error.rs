//! Failure taxonomy for toolchain operations.
//!
//! None of these cross a thread boundary as values: workers turn them into
//! messages on the invocation's queue.

use std::path::PathBuf;
use thiserror::Error;

use super::message::Status;

#[derive(Debug, Error)]
pub enum ToolchainError {
    /// The tool is missing; raised synchronously by the query family.
    #[error("arduino-cli is not installed at {}", .0.display())]
    NotInstalled(PathBuf),

    /// The OS could not start the executable.
    #[error("Failed to launch {}: {source}", .path.display())]
    ProcessLaunch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The process ran but reported failure.
    #[error("{}", describe_exit(.code, .stderr))]
    NonZeroExit { code: Option<i32>, stderr: String },

    /// An output line was not a recognised record. Tolerated.
    #[error("Unrecognised output: {0}")]
    OutputParse(String),

    /// No release artifact exists for this host.
    #[error("Unsupported platform: {os} ({pointer_width}-bit)")]
    UnsupportedPlatform { os: String, pointer_width: u32 },

    #[error("Download failed: {0:#}")]
    Download(anyhow::Error),

    #[error("Installation failed: {0:#}")]
    Extraction(anyhow::Error),
}

impl ToolchainError {
    /// Status of the message this error becomes.
    pub fn status(&self) -> Status {
        match self {
            Self::OutputParse(_) => Status::Warning,
            _ => Status::Error,
        }
    }
}

fn describe_exit(code: &Option<i32>, stderr: &str) -> String {
    let stderr = stderr.trim();
    match (*code, stderr.is_empty()) {
        (Some(code), true) => format!("arduino-cli exited with code {}", code),
        (None, true) => "arduino-cli was terminated by a signal".to_string(),
        (_, false) => stderr.to_string(),
    }
}
