//! Host platform detection and the arduino-cli release artifacts.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Release Artifacts
// ============================================================================

/// A published arduino-cli build for one OS/architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReleaseArtifact {
    Linux32,
    Linux64,
    LinuxArmV7,
    LinuxArm64,
    MacosX64,
    MacosArm64,
    Windows32,
    Windows64,
}

impl ReleaseArtifact {
    /// The OS/architecture tag used in release file names.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Linux32 => "Linux_32bit",
            Self::Linux64 => "Linux_64bit",
            Self::LinuxArmV7 => "Linux_ARMv7",
            Self::LinuxArm64 => "Linux_ARM64",
            Self::MacosX64 => "macOS_64bit",
            Self::MacosArm64 => "macOS_ARM64",
            Self::Windows32 => "Windows_32bit",
            Self::Windows64 => "Windows_64bit",
        }
    }

    pub fn archive_format(&self) -> ArchiveFormat {
        match self {
            Self::Windows32 | Self::Windows64 => ArchiveFormat::Zip,
            _ => ArchiveFormat::TarGz,
        }
    }

    /// Release file name for `version`, e.g. `arduino-cli_0.35.3_Linux_64bit.tar.gz`.
    pub fn file_name(&self, version: &str) -> String {
        format!(
            "arduino-cli_{}_{}.{}",
            version,
            self.tag(),
            self.archive_format().extension()
        )
    }
}

impl fmt::Display for ReleaseArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// Archive format of a release download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArchiveFormat {
    /// Gzip-compressed tar archive (.tar.gz)
    TarGz,
    /// ZIP archive (.zip)
    Zip,
}

impl ArchiveFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::TarGz => "tar.gz",
            Self::Zip => "zip",
        }
    }
}

// ============================================================================
// Host Platform
// ============================================================================

/// The operating system and word size the installer is running on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPlatform {
    /// OS name. Accepts Rust (`linux`, `macos`, `windows`) and uname-style
    /// (`Linux`, `Darwin`, `Windows`) spellings.
    pub os: String,
    /// CPU architecture, when known. Only used to pick ARM builds.
    pub arch: Option<String>,
    pub pointer_width: u32,
}

impl HostPlatform {
    pub fn new(os: impl Into<String>, pointer_width: u32) -> Self {
        Self {
            os: os.into(),
            arch: None,
            pointer_width,
        }
    }

    pub fn with_arch(mut self, arch: impl Into<String>) -> Self {
        self.arch = Some(arch.into());
        self
    }

    /// Detects the platform this binary was built for.
    pub fn detect() -> Self {
        Self::new(std::env::consts::OS, usize::BITS).with_arch(std::env::consts::ARCH)
    }

    /// Maps this host to a release artifact, or `None` if arduino-cli does
    /// not publish a build for it.
    pub fn artifact(&self) -> Option<ReleaseArtifact> {
        let os = self.os.to_ascii_lowercase();
        let arch = self.arch.as_deref().unwrap_or("");
        let is_arm = arch.starts_with("arm") || arch == "aarch64";

        match (os.as_str(), self.pointer_width, is_arm) {
            ("linux", 64, true) => Some(ReleaseArtifact::LinuxArm64),
            ("linux", 32, true) => Some(ReleaseArtifact::LinuxArmV7),
            ("linux", 64, false) => Some(ReleaseArtifact::Linux64),
            ("linux", 32, false) => Some(ReleaseArtifact::Linux32),
            ("macos" | "darwin", 64, true) => Some(ReleaseArtifact::MacosArm64),
            ("macos" | "darwin", 64, false) => Some(ReleaseArtifact::MacosX64),
            ("windows", 64, false) => Some(ReleaseArtifact::Windows64),
            ("windows", 32, false) => Some(ReleaseArtifact::Windows32),
            _ => None,
        }
    }
}

impl fmt::Display for HostPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.arch {
            Some(arch) => write!(f, "{} {} ({}-bit)", self.os, arch, self.pointer_width),
            None => write!(f, "{} ({}-bit)", self.os, self.pointer_width),
        }
    }
}
