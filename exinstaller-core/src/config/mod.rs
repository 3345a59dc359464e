//! Configuration module for the installer core.
//!
//! Manages settings stored as JSON under the application directory.

mod settings;

pub use settings::{Settings, DEFAULT_DOWNLOAD_BASE_URL, DEFAULT_PROGRESS_STEP_PERCENT};
