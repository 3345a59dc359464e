//! Argument vectors for arduino-cli.
//!
//! Order matters: the subcommand always comes first, then positional
//! arguments, then `--format`, then device-specific extras.

use crate::boards::{LibraryEntry, PlatformEntry};

/// FQBN prefix of boards whose bootloader needs a fixed upload baud rate.
pub const ESP32_FQBN_PREFIX: &str = "esp32:esp32";

/// Board option forced on every ESP32 upload.
pub const ESP32_UPLOAD_SPEED: &str = "UploadSpeed=115200";

/// Output format for queries: one JSON document.
const FORMAT_JSON: &str = "json";

/// Output format for long-running operations: one compact JSON object per line.
const FORMAT_JSONMINI: &str = "jsonmini";

// =============================================================================
// Queries
// =============================================================================

/// Read-only inventory queries. All of them require the tool to be present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Query {
    Version,
    Platforms,
    Libraries,
}

impl Query {
    pub fn subcommand(&self) -> &'static [&'static str] {
        match self {
            Self::Version => &["version"],
            Self::Platforms => &["core", "list"],
            Self::Libraries => &["lib", "list"],
        }
    }

    /// Topic used on the message queue.
    pub fn topic(&self) -> &'static str {
        match self {
            Self::Version => "version",
            Self::Platforms => "platforms",
            Self::Libraries => "libraries",
        }
    }

    pub fn args(&self) -> Vec<String> {
        let mut args = owned(self.subcommand());
        push_format(&mut args, FORMAT_JSON);
        args
    }
}

// =============================================================================
// Firmware Operations
// =============================================================================

/// `compile -b <fqbn> <sketch_dir> --format jsonmini`
pub fn compile_args(fqbn: &str, sketch_dir: &str) -> Vec<String> {
    let mut args = owned(&["compile", "-b", fqbn, sketch_dir]);
    push_format(&mut args, FORMAT_JSONMINI);
    args
}

/// `upload -b <fqbn> -p <port> <sketch_dir> --format jsonmini`, plus a fixed
/// upload speed for ESP32 boards.
pub fn upload_args(fqbn: &str, port: &str, sketch_dir: &str) -> Vec<String> {
    let mut args = owned(&["upload", "-b", fqbn, "-p", port, sketch_dir]);
    push_format(&mut args, FORMAT_JSONMINI);
    if needs_fixed_upload_speed(fqbn) {
        args.push("--board-options".to_string());
        args.push(ESP32_UPLOAD_SPEED.to_string());
    }
    args
}

/// ESP32 bootloaders do not autodetect the baud rate.
pub fn needs_fixed_upload_speed(fqbn: &str) -> bool {
    fqbn.starts_with(ESP32_FQBN_PREFIX)
}

// =============================================================================
// Installation
// =============================================================================

/// `config init --overwrite --format jsonmini`
pub fn init_config_args() -> Vec<String> {
    let mut args = owned(&["config", "init", "--overwrite"]);
    push_format(&mut args, FORMAT_JSONMINI);
    args
}

/// `config add board_manager.additional_urls <url> --format jsonmini`
pub fn add_board_manager_url_args(url: &str) -> Vec<String> {
    let mut args = owned(&["config", "add", "board_manager.additional_urls", url]);
    push_format(&mut args, FORMAT_JSONMINI);
    args
}

/// `core update-index --format jsonmini`
pub fn update_index_args() -> Vec<String> {
    let mut args = owned(&["core", "update-index"]);
    push_format(&mut args, FORMAT_JSONMINI);
    args
}

/// `core install <id>@<version> --format jsonmini [--additional-urls <url>]`
pub fn install_platform_args(platform: &PlatformEntry) -> Vec<String> {
    let spec = platform.install_spec();
    let mut args = owned(&["core", "install", &spec]);
    push_format(&mut args, FORMAT_JSONMINI);
    if let Some(url) = platform.index_url {
        args.push("--additional-urls".to_string());
        args.push(url.to_string());
    }
    args
}

/// `lib install <name>@<version> --format jsonmini`
pub fn install_library_args(library: &LibraryEntry) -> Vec<String> {
    let spec = library.install_spec();
    let mut args = owned(&["lib", "install", &spec]);
    push_format(&mut args, FORMAT_JSONMINI);
    args
}

fn owned(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

fn push_format(args: &mut Vec<String>, format: &str) {
    args.push("--format".to_string());
    args.push(format.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boards::BoardRegistry;

    fn position(args: &[String], flag: &str) -> Option<usize> {
        args.iter().position(|a| a == flag)
    }

    #[test]
    fn test_query_args() {
        assert_eq!(Query::Version.args(), vec!["version", "--format", "json"]);
        assert_eq!(
            Query::Platforms.args(),
            vec!["core", "list", "--format", "json"]
        );
        assert_eq!(
            Query::Libraries.args(),
            vec!["lib", "list", "--format", "json"]
        );
    }

    #[test]
    fn test_compile_mega() {
        assert_eq!(
            compile_args("arduino:avr:mega", "/sketch"),
            vec!["compile", "-b", "arduino:avr:mega", "/sketch", "--format", "jsonmini"]
        );
    }

    #[test]
    fn test_upload_esp32s3() {
        assert_eq!(
            upload_args("esp32:esp32:esp32s3", "/dev/ttyUSB0", "/sketch"),
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
    fn test_upload_speed_only_for_esp32() {
        let registry = BoardRegistry::builtin();
        for device in registry
            .supported_devices()
            .iter()
            .chain(registry.dccex_devices())
        {
            let args = upload_args(device.fqbn, "/dev/ttyACM0", "/sketch");
            assert_eq!(args[0], "upload");
            match position(&args, "--board-options") {
                Some(idx) => {
                    assert!(device.fqbn.starts_with(ESP32_FQBN_PREFIX), "{}", device.fqbn);
                    assert_eq!(args[idx + 1], ESP32_UPLOAD_SPEED);
                }
                None => assert!(!device.fqbn.starts_with(ESP32_FQBN_PREFIX), "{}", device.fqbn),
            }
        }
    }

    #[test]
    fn test_upload_flag_values() {
        let args = upload_args("arduino:avr:mega", "/dev/ttyUSB0", "/my/sketch");
        assert_eq!(args[position(&args, "-b").unwrap() + 1], "arduino:avr:mega");
        assert_eq!(args[position(&args, "-p").unwrap() + 1], "/dev/ttyUSB0");
        assert_eq!(args[position(&args, "--format").unwrap() + 1], "jsonmini");
        assert!(args.contains(&"/my/sketch".to_string()));
        assert!(position(&args, "--board-options").is_none());
    }

    #[test]
    fn test_install_platform_with_index_url() {
        let esp32 = BoardRegistry::builtin().platform("Espressif ESP32").unwrap();
        let args = install_platform_args(esp32);
        assert_eq!(&args[..3], &["core", "install", "esp32:esp32@2.0.17"]);
        let idx = position(&args, "--additional-urls").unwrap();
        assert_eq!(Some(args[idx + 1].as_str()), esp32.index_url);
    }

    #[test]
    fn test_install_base_platform_has_no_index_url() {
        let avr = BoardRegistry::builtin().platform("Arduino AVR").unwrap();
        let args = install_platform_args(avr);
        assert_eq!(
            args,
            vec!["core", "install", "arduino:avr@1.8.6", "--format", "jsonmini"]
        );
    }

    #[test]
    fn test_install_library() {
        let ethernet = BoardRegistry::builtin().library("Ethernet").unwrap();
        assert_eq!(
            install_library_args(ethernet),
            vec!["lib", "install", "Ethernet@2.0.2", "--format", "jsonmini"]
        );
    }

    #[test]
    fn test_config_and_index_args() {
        assert_eq!(
            init_config_args(),
            vec!["config", "init", "--overwrite", "--format", "jsonmini"]
        );
        assert_eq!(
            add_board_manager_url_args("https://example.com/index.json")[..4],
            ["config", "add", "board_manager.additional_urls", "https://example.com/index.json"]
        );
        assert_eq!(
            update_index_args(),
            vec!["core", "update-index", "--format", "jsonmini"]
        );
    }
}
