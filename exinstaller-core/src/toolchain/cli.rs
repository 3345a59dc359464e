//! The toolchain facade.
//!
//! [`ArduinoCli`] is the single entry point for everything the installer
//! asks of arduino-cli. Each operation takes the resolved tool path and a
//! fresh [`MessageSender`], and either reports synchronously on that queue or
//! hands it to a background worker. Operations never return results or
//! errors directly.
//!
//! The query and install families are gated on [`ArduinoCli::is_installed`]:
//! without the tool they report "not installed" and start nothing. Compile
//! and upload always start a runner, so a missing tool surfaces as a launch
//! failure like any other.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::commands::{self, Query};
use super::downloader::{DownloadJob, DOWNLOAD_TOPIC};
use super::error::ToolchainError;
use super::launcher::{Launcher, ThreadLauncher};
use super::message::MessageSender;
use super::paths;
use super::runner::RunJob;
use super::types::{HostPlatform, ReleaseArtifact};
use crate::boards::{BoardRegistry, LibraryEntry, PlatformEntry};
use crate::config::Settings;

/// arduino-cli release the installer is validated against.
pub const ARDUINO_CLI_VERSION: &str = "0.35.3";

/// Facade over arduino-cli.
pub struct ArduinoCli<L: Launcher = ThreadLauncher> {
    settings: Settings,
    registry: &'static BoardRegistry,
    launcher: L,
}

impl ArduinoCli {
    /// Creates a facade that runs every job on its own thread.
    pub fn new(settings: Settings) -> Self {
        Self::with_launcher(settings, ThreadLauncher)
    }
}

impl<L: Launcher> ArduinoCli<L> {
    pub fn with_launcher(settings: Settings, launcher: L) -> Self {
        Self {
            settings,
            registry: BoardRegistry::builtin(),
            launcher,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn registry(&self) -> &'static BoardRegistry {
        self.registry
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    // =========================================================================
    // Installation State
    // =========================================================================

    /// Where the executable lives (or will live once downloaded).
    pub fn installed_path(&self) -> PathBuf {
        paths::cli_file_path(&self.settings.install_root())
    }

    /// True iff `path` is an existing, executable regular file.
    pub fn is_installed(&self, path: &Path) -> bool {
        paths::is_executable_file(path)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn get_version(&self, path: &Path, queue: MessageSender) {
        self.query(path, Query::Version, queue);
    }

    pub fn get_platforms(&self, path: &Path, queue: MessageSender) {
        self.query(path, Query::Platforms, queue);
    }

    pub fn get_libraries(&self, path: &Path, queue: MessageSender) {
        self.query(path, Query::Libraries, queue);
    }

    fn query(&self, path: &Path, query: Query, queue: MessageSender) {
        self.run_if_installed(path, query.topic(), query.args(), queue);
    }

    // =========================================================================
    // Firmware
    // =========================================================================

    /// Compiles the sketch in `sketch_dir` for `fqbn`. Not gated.
    pub fn compile_sketch(&self, path: &Path, fqbn: &str, sketch_dir: &Path, queue: MessageSender) {
        let args = commands::compile_args(fqbn, &sketch_dir.to_string_lossy());
        self.launch(path, "compile", args, queue);
    }

    /// Uploads the compiled sketch to the board on `port`. Not gated.
    pub fn upload_sketch(
        &self,
        path: &Path,
        fqbn: &str,
        port: &str,
        sketch_dir: &Path,
        queue: MessageSender,
    ) {
        let args = commands::upload_args(fqbn, port, &sketch_dir.to_string_lossy());
        self.launch(path, "upload", args, queue);
    }

    // =========================================================================
    // Platform and Library Installation
    // =========================================================================

    /// Writes a fresh arduino-cli configuration file.
    pub fn init_config(&self, path: &Path, queue: MessageSender) {
        self.run_if_installed(path, "config", commands::init_config_args(), queue);
    }

    pub fn add_board_manager_url(&self, path: &Path, url: &str, queue: MessageSender) {
        let args = commands::add_board_manager_url_args(url);
        self.run_if_installed(path, "config", args, queue);
    }

    pub fn update_index(&self, path: &Path, queue: MessageSender) {
        self.run_if_installed(path, "update-index", commands::update_index_args(), queue);
    }

    /// Installs `platform` at its pinned version.
    pub fn install_platform(&self, path: &Path, platform: &PlatformEntry, queue: MessageSender) {
        let args = commands::install_platform_args(platform);
        self.run_if_installed(path, "install-platform", args, queue);
    }

    /// Installs `library` at its pinned version.
    pub fn install_library(&self, path: &Path, library: &LibraryEntry, queue: MessageSender) {
        let args = commands::install_library_args(library);
        self.run_if_installed(path, "install-library", args, queue);
    }

    // =========================================================================
    // Tool Download
    // =========================================================================

    /// Downloads and installs arduino-cli for the running host.
    pub fn download_cli(&self, queue: MessageSender) {
        self.download_cli_for(&HostPlatform::detect(), queue);
    }

    /// Downloads and installs the arduino-cli build for `host`.
    ///
    /// An unsupported host is reported synchronously and nothing is started.
    pub fn download_cli_for(&self, host: &HostPlatform, queue: MessageSender) {
        let artifact = match host.artifact() {
            Some(artifact) => artifact,
            None => {
                let err = ToolchainError::UnsupportedPlatform {
                    os: host.os.clone(),
                    pointer_width: host.pointer_width,
                };
                warn!(%host, "{}", err);
                queue.finish_error(DOWNLOAD_TOPIC, err.to_string());
                return;
            }
        };

        let install_root = self.settings.install_root();
        let job = DownloadJob {
            url: self.download_url(artifact),
            staging_dir: paths::download_dir(),
            archive_name: artifact.file_name(ARDUINO_CLI_VERSION),
            install_dir: paths::tool_dir(&install_root),
            executable: paths::cli_file_path(&install_root),
            format: artifact.archive_format(),
            progress_step: self.settings.progress_step_percent,
        };

        info!(%host, url = %job.url, "Downloading arduino-cli");
        queue.info(DOWNLOAD_TOPIC, format!("Downloading {}", job.url));
        self.launcher.launch_downloader(job, queue);
    }

    /// Release URL of `artifact` at the pinned version.
    pub fn download_url(&self, artifact: ReleaseArtifact) -> String {
        format!(
            "{}/{}",
            self.settings.download_base_url.trim_end_matches('/'),
            artifact.file_name(ARDUINO_CLI_VERSION)
        )
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn run_if_installed(&self, path: &Path, topic: &str, args: Vec<String>, queue: MessageSender) {
        if !self.is_installed(path) {
            let err = ToolchainError::NotInstalled(path.to_path_buf());
            warn!(topic, "{}", err);
            queue.finish_error(topic, err.to_string());
            return;
        }
        self.launch(path, topic, args, queue);
    }

    fn launch(&self, path: &Path, topic: &str, args: Vec<String>, queue: MessageSender) {
        self.launcher
            .launch_runner(RunJob::new(topic, path, args), queue);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolchain::message::{message_channel, Message};
    use crate::toolchain::types::ArchiveFormat;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Records jobs instead of running them.
    #[derive(Default)]
    struct RecordingLauncher {
        runs: Mutex<Vec<RunJob>>,
        downloads: Mutex<Vec<DownloadJob>>,
    }

    impl Launcher for RecordingLauncher {
        fn launch_runner(&self, job: RunJob, queue: MessageSender) {
            let topic = job.topic.clone();
            self.runs.lock().unwrap().push(job);
            queue.finish_success(&topic, "recorded");
        }

        fn launch_downloader(&self, job: DownloadJob, queue: MessageSender) {
            self.downloads.lock().unwrap().push(job);
            queue.finish_success(DOWNLOAD_TOPIC, "recorded");
        }
    }

    impl RecordingLauncher {
        fn runs(&self) -> Vec<RunJob> {
            self.runs.lock().unwrap().clone()
        }

        fn downloads(&self) -> Vec<DownloadJob> {
            self.downloads.lock().unwrap().clone()
        }
    }

    fn recording_cli(root: &Path) -> ArduinoCli<RecordingLauncher> {
        let settings = Settings {
            install_root: Some(root.to_path_buf()),
            ..Settings::default()
        };
        ArduinoCli::with_launcher(settings, RecordingLauncher::default())
    }

    fn messages(invoke: impl FnOnce(MessageSender)) -> Vec<Message> {
        let (tx, mut rx) = message_channel();
        invoke(tx);
        rx.drain_until_terminal()
    }

    fn assert_single_not_installed(messages: &[Message]) {
        assert_eq!(messages.len(), 1);
        assert!(messages[0].is_terminal());
        assert!(messages[0].is_error());
        assert!(messages[0].data.contains("not installed"));
    }

    /// Creates an executable stand-in for arduino-cli at the installed path.
    fn install_fake_tool(cli: &ArduinoCli<RecordingLauncher>) -> PathBuf {
        let path = cli.installed_path();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "#!/bin/sh\n").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        }
        path
    }

    #[test]
    fn test_installed_path_under_install_root() {
        let temp_dir = TempDir::new().unwrap();
        let cli = recording_cli(temp_dir.path());
        let path = cli.installed_path();
        assert!(path.starts_with(temp_dir.path()));
        assert_eq!(path, paths::cli_file_path(temp_dir.path()));
        assert!(!cli.is_installed(&path));
    }

    #[test]
    fn test_get_version_missing_tool() {
        let cli = ArduinoCli::new(Settings::default());
        let messages = messages(|q| cli.get_version(Path::new("/missing/tool"), q));
        assert_single_not_installed(&messages);
        assert_eq!(messages[0].topic, "version");
    }

    #[test]
    fn test_queries_never_spawn_without_tool() {
        let temp_dir = TempDir::new().unwrap();
        let cli = recording_cli(temp_dir.path());
        let path = cli.installed_path();

        assert_single_not_installed(&messages(|q| cli.get_version(&path, q)));
        assert_single_not_installed(&messages(|q| cli.get_platforms(&path, q)));
        assert_single_not_installed(&messages(|q| cli.get_libraries(&path, q)));
        assert!(cli.launcher().runs().is_empty());
    }

    #[test]
    fn test_queries_spawn_with_tool() {
        let temp_dir = TempDir::new().unwrap();
        let cli = recording_cli(temp_dir.path());
        let path = install_fake_tool(&cli);
        assert!(cli.is_installed(&path));

        messages(|q| cli.get_version(&path, q));
        messages(|q| cli.get_platforms(&path, q));
        messages(|q| cli.get_libraries(&path, q));

        let runs = cli.launcher().runs();
        assert_eq!(runs.len(), 3);
        assert_eq!(runs[0].program, path);
        assert_eq!(runs[0].args, vec!["version", "--format", "json"]);
        assert_eq!(runs[1].topic, "platforms");
        assert_eq!(runs[1].args, vec!["core", "list", "--format", "json"]);
        assert_eq!(runs[2].topic, "libraries");
        assert_eq!(runs[2].args, vec!["lib", "list", "--format", "json"]);
    }

    #[test]
    fn test_compile_spawns_without_tool() {
        let temp_dir = TempDir::new().unwrap();
        let cli = recording_cli(temp_dir.path());
        let path = cli.installed_path();

        messages(|q| cli.compile_sketch(&path, "arduino:avr:mega", Path::new("/sketch"), q));

        let runs = cli.launcher().runs();
        assert_eq!(runs.len(), 1);
        assert_eq!(
            runs[0].args,
            vec!["compile", "-b", "arduino:avr:mega", "/sketch", "--format", "jsonmini"]
        );
    }

    #[test]
    fn test_upload_spawns_without_tool() {
        let temp_dir = TempDir::new().unwrap();
        let cli = recording_cli(temp_dir.path());
        let path = cli.installed_path();

        messages(|q| {
            cli.upload_sketch(
                &path,
                "esp32:esp32:esp32s3",
                "/dev/ttyUSB0",
                Path::new("/sketch"),
                q,
            )
        });

        let runs = cli.launcher().runs();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].topic, "upload");
        assert_eq!(
            runs[0].args,
            vec![
                "upload",
                "-b",
                "esp32:esp32:esp32s3",
                "-p",
                "/dev/ttyUSB0",
                "/sketch",
                "--format",
                "jsonmini",
                "--board-options",
                "UploadSpeed=115200",
            ]
        );
    }

    #[test]
    fn test_install_family_is_gated() {
        let temp_dir = TempDir::new().unwrap();
        let cli = recording_cli(temp_dir.path());
        let path = cli.installed_path();
        let registry = cli.registry();
        let esp32 = registry.platform("Espressif ESP32").unwrap();
        let ethernet = registry.library("Ethernet").unwrap();

        assert_single_not_installed(&messages(|q| cli.init_config(&path, q)));
        assert_single_not_installed(&messages(|q| {
            cli.add_board_manager_url(&path, esp32.index_url.unwrap(), q)
        }));
        assert_single_not_installed(&messages(|q| cli.update_index(&path, q)));
        assert_single_not_installed(&messages(|q| cli.install_platform(&path, esp32, q)));
        assert_single_not_installed(&messages(|q| cli.install_library(&path, ethernet, q)));
        assert!(cli.launcher().runs().is_empty());

        let path = install_fake_tool(&cli);
        messages(|q| cli.update_index(&path, q));
        messages(|q| cli.install_platform(&path, esp32, q));
        messages(|q| cli.install_library(&path, ethernet, q));

        let runs = cli.launcher().runs();
        assert_eq!(runs.len(), 3);
        assert_eq!(runs[0].args[..2], ["core", "update-index"]);
        assert_eq!(runs[1].args[..3], ["core", "install", "esp32:esp32@2.0.17"]);
        assert_eq!(runs[2].args[..3], ["lib", "install", "Ethernet@2.0.2"]);
    }

    #[test]
    fn test_download_linux_64bit() {
        let temp_dir = TempDir::new().unwrap();
        let cli = recording_cli(temp_dir.path());

        let messages = messages(|q| cli.download_cli_for(&HostPlatform::new("Linux", 64), q));
        assert!(messages.last().unwrap().is_success());

        let downloads = cli.launcher().downloads();
        assert_eq!(downloads.len(), 1);
        let job = &downloads[0];
        assert!(job.url.contains("Linux_64bit"));
        assert_eq!(
            job.url,
            "https://downloads.arduino.cc/arduino-cli/arduino-cli_0.35.3_Linux_64bit.tar.gz"
        );
        assert_eq!(job.format, ArchiveFormat::TarGz);
        assert_eq!(job.install_dir, paths::tool_dir(temp_dir.path()));
        assert_eq!(job.executable, cli.installed_path());
        assert_eq!(job.progress_step, 5);
        assert_eq!(job.archive_name, "arduino-cli_0.35.3_Linux_64bit.tar.gz");
        assert_eq!(job.staging_dir, paths::download_dir());
    }

    #[test]
    fn test_download_windows_uses_zip() {
        let temp_dir = TempDir::new().unwrap();
        let cli = recording_cli(temp_dir.path());

        messages(|q| cli.download_cli_for(&HostPlatform::new("Windows", 32), q));

        let downloads = cli.launcher().downloads();
        assert!(downloads[0].url.ends_with("arduino-cli_0.35.3_Windows_32bit.zip"));
        assert_eq!(downloads[0].format, ArchiveFormat::Zip);
    }

    #[test]
    fn test_download_unknown_os() {
        let temp_dir = TempDir::new().unwrap();
        let cli = recording_cli(temp_dir.path());

        let messages = messages(|q| cli.download_cli_for(&HostPlatform::new("Plan9", 64), q));
        assert_eq!(messages.len(), 1);
        assert!(messages[0].is_terminal());
        assert!(messages[0].is_error());
        assert!(messages[0].data.contains("Plan9"));
        assert!(cli.launcher().downloads().is_empty());
    }

    #[test]
    fn test_download_url_uses_configured_base() {
        let settings = Settings {
            download_base_url: "https://github.com/arduino/arduino-cli/releases/download/v0.35.3/"
                .to_string(),
            ..Settings::default()
        };
        let cli = ArduinoCli::new(settings);
        assert_eq!(
            cli.download_url(ReleaseArtifact::MacosArm64),
            "https://github.com/arduino/arduino-cli/releases/download/v0.35.3/arduino-cli_0.35.3_macOS_ARM64.tar.gz"
        );
    }
}
