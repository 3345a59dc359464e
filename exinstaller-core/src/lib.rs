//! EX-Installer Core Library
//!
//! Toolchain orchestration for the DCC-EX installer. It includes:
//!
//! - A static catalog of supported boards, platforms, libraries and products
//! - The arduino-cli facade: queries, compile, upload, platform installs
//! - Background runners and downloaders reporting over a message queue
//! - Installer settings

pub mod boards;
pub mod config;
pub mod toolchain;

// Re-export the board catalog
pub use boards::{BoardRegistry, DeviceEntry, LibraryEntry, PlatformEntry, ProductDetails};

// Re-export configuration
pub use config::Settings;

// Re-export the toolchain facade and protocol
pub use toolchain::{
    message_channel, ArduinoCli, HostPlatform, Launcher, Message, MessageReceiver,
    MessageSender, ReleaseArtifact, Status, ThreadLauncher, ToolchainError,
    ARDUINO_CLI_VERSION,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
