//! arduino-cli orchestration.
//!
//! This module manages the arduino-cli executable on behalf of the
//! installer: locating it, running it on background threads, and
//! downloading it when absent. Results flow back through a per-invocation
//! message queue.
//!
//! # Architecture
//!
//! - `cli`: The facade ([`ArduinoCli`]) the front end calls
//! - `commands`: Argument vectors per operation
//! - `runner`: Runs one process and translates its output into messages
//! - `downloader`: Fetches, extracts and installs a release archive
//! - `launcher`: Starts runners and downloaders on their own threads
//! - `message`: The queue protocol between workers and the caller
//! - `paths`: Installation layout
//! - `types`: Host platforms and release artifacts

pub mod cli;
pub mod commands;
pub mod downloader;
pub mod error;
pub mod extractor;
pub mod launcher;
pub mod message;
pub mod output;
pub mod paths;
pub mod runner;
pub mod types;

pub use cli::{ArduinoCli, ARDUINO_CLI_VERSION};
pub use downloader::DownloadJob;
pub use error::ToolchainError;
pub use launcher::{Launcher, ThreadLauncher};
pub use message::{message_channel, Message, MessageReceiver, MessageSender, Status};
pub use runner::RunJob;
pub use types::{ArchiveFormat, HostPlatform, ReleaseArtifact};
