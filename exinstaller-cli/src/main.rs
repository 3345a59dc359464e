//! EX-Installer command-line front end.
//!
//! Drives the toolchain facade the way the installer wizard does: start an
//! operation, then poll its queue on a timer until the terminal message.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use exinstaller_core::{
    message_channel, ArduinoCli, BoardRegistry, MessageReceiver, MessageSender, Settings,
    Status,
};
use tracing_subscriber::EnvFilter;

/// How often the queue is polled.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// EX-Installer: manage arduino-cli and build DCC-EX firmware.
#[derive(Parser)]
#[command(name = "exinstaller", version, about)]
struct Cli {
    /// Path to the settings file (default: ~/ex-installer/settings.json).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Override the installation root from the settings file.
    #[arg(long, global = true)]
    install_root: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Print where arduino-cli is (or will be) installed.
    Path,

    /// Report whether arduino-cli is installed.
    Status,

    /// Query the arduino-cli version.
    Version,

    /// List installed platforms.
    Platforms,

    /// List installed libraries.
    Libraries,

    /// Compile a sketch.
    Compile {
        /// Device name from `boards`, or an FQBN.
        #[arg(short, long)]
        board: String,

        /// Sketch directory.
        sketch_dir: PathBuf,
    },

    /// Upload a compiled sketch.
    Upload {
        /// Device name from `boards`, or an FQBN.
        #[arg(short, long)]
        board: String,

        /// Serial port, e.g. /dev/ttyUSB0 or COM3.
        #[arg(short, long)]
        port: String,

        /// Sketch directory.
        sketch_dir: PathBuf,
    },

    /// Download and install arduino-cli for this machine.
    Download,

    /// Write a fresh arduino-cli configuration.
    InitConfig,

    /// Refresh the board-manager index.
    UpdateIndex,

    /// Install a platform package at its pinned version.
    InstallPlatform {
        /// Platform name or `vendor:architecture` id.
        platform: String,
    },

    /// Install a library at its pinned version.
    InstallLibrary {
        /// Library name.
        library: String,
    },

    /// List supported devices.
    Boards,

    /// List firmware products and the platforms each needs.
    Products,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let directive = if cli.verbose {
        "exinstaller=debug"
    } else {
        "exinstaller=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(directive.parse()?)
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("Starting EX-Installer v{}", exinstaller_core::VERSION);

    let mut settings = match &cli.settings {
        Some(path) => Settings::load(path),
        None => Settings::load_default(),
    };
    if let Some(root) = cli.install_root {
        settings.install_root = Some(root);
    }

    let toolchain = ArduinoCli::new(settings);
    let path = toolchain.installed_path();
    let registry = toolchain.registry();

    let success = match cli.command {
        Command::Path => {
            println!("{}", path.display());
            true
        }
        Command::Status => {
            let installed = toolchain.is_installed(&path);
            println!(
                "arduino-cli {} at {}",
                if installed { "installed" } else { "not installed" },
                path.display()
            );
            installed
        }
        Command::Boards => {
            print_boards(registry);
            true
        }
        Command::Products => {
            print_products(registry);
            true
        }
        Command::Version => run(|q| toolchain.get_version(&path, q)).await,
        Command::Platforms => run(|q| toolchain.get_platforms(&path, q)).await,
        Command::Libraries => run(|q| toolchain.get_libraries(&path, q)).await,
        Command::Compile { board, sketch_dir } => {
            let fqbn = resolve_fqbn(registry, &board);
            run(|q| toolchain.compile_sketch(&path, fqbn, &sketch_dir, q)).await
        }
        Command::Upload {
            board,
            port,
            sketch_dir,
        } => {
            let fqbn = resolve_fqbn(registry, &board);
            run(|q| toolchain.upload_sketch(&path, fqbn, &port, &sketch_dir, q)).await
        }
        Command::Download => run(|q| toolchain.download_cli(q)).await,
        Command::InitConfig => run(|q| toolchain.init_config(&path, q)).await,
        Command::UpdateIndex => run(|q| toolchain.update_index(&path, q)).await,
        Command::InstallPlatform { platform } => {
            let entry = registry
                .platform(&platform)
                .or_else(|| registry.platform_by_id(&platform));
            match entry {
                Some(entry) => run(|q| toolchain.install_platform(&path, entry, q)).await,
                None => {
                    eprintln!("Unknown platform: {}", platform);
                    false
                }
            }
        }
        Command::InstallLibrary { library } => match registry.library(&library) {
            Some(entry) => run(|q| toolchain.install_library(&path, entry, q)).await,
            None => {
                eprintln!("Unknown library: {}", library);
                false
            }
        },
    };

    Ok(exit_code(success))
}

/// Starts one operation on a fresh queue and waits for its result.
async fn run(start: impl FnOnce(MessageSender)) -> bool {
    let (tx, rx) = message_channel();
    start(tx);
    wait_for_result(rx).await
}

/// Polls `rx` until the terminal message, printing each message as it
/// arrives. Returns whether the operation succeeded.
async fn wait_for_result(mut rx: MessageReceiver) -> bool {
    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    loop {
        ticker.tick().await;
        while let Some(message) = rx.try_next() {
            match message.status {
                Status::Error | Status::Warning => eprintln!("{}", message),
                Status::Info | Status::Success => println!("{}", message),
            }
            if message.is_terminal() {
                return message.is_success();
            }
        }
    }
}

/// Accepts a device display name or a raw FQBN.
fn resolve_fqbn<'a>(registry: &'static BoardRegistry, board: &'a str) -> &'a str {
    registry.device_identifier(board).unwrap_or(board)
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn print_boards(registry: &BoardRegistry) {
    println!("Supported devices:");
    for device in registry.supported_devices() {
        let products: Vec<&str> = registry
            .products_for_device(device.fqbn)
            .iter()
            .map(|p| p.key)
            .collect();
        println!(
            "  {:<36} {:<40} {}",
            device.name,
            device.fqbn,
            products.join(", ")
        );
    }

    println!("\nDCC-EX devices:");
    for device in registry.dccex_devices() {
        println!("  {:<36} {}", device.name, device.fqbn);
    }

    println!("\nPlatforms:");
    for platform in registry.platforms() {
        println!("  {:<36} {}", platform.name, platform.install_spec());
    }

    println!("\nLibraries:");
    for library in registry.libraries_available() {
        println!("  {:<36} {}", library.name, library.install_spec());
    }
}

fn print_products(registry: &BoardRegistry) {
    for product in registry.products() {
        println!("{} ({})", product.product_name, product.key);
        println!("  repository: {} [{}]", product.repo_url, product.default_branch);
        let platforms: Vec<String> = registry
            .platforms_for_product(product.key)
            .iter()
            .map(|p| p.install_spec())
            .collect();
        println!("  platforms:  {}", platforms.join(", "));
        println!("  config:     {}", product.minimum_config_files.join(", "));
    }
}
