//! groupctl - Entry Point
//!
//! Polls the control server for health, keeps the session valid and
//! dispatches tasks to groups of devices.

use groupctl::app::options::AppOptions;
use groupctl::app::run::run;
use groupctl::cli::args::{Action, CliArgs};
use groupctl::cli::commands;
use groupctl::logs::{init_logging, LogLevel, LogOptions};
use groupctl::storage::layout::StorageLayout;
use groupctl::storage::settings::Settings;
use groupctl::utils::version_info;

use tracing::{error, info};

#[tokio::main]
async fn main() {
    let cli_args = CliArgs::from_env();
    let action = cli_args.action();

    // Print version and exit
    if action == Action::Version {
        let version = version_info();
        match serde_json::to_string_pretty(&version) {
            Ok(json) => println!("{}", json),
            Err(_) => println!("{} {}", version.name, version.version),
        }
        return;
    }

    // Retrieve the settings file
    let layout = StorageLayout::default();
    let settings = match layout.settings_file().read_or_default::<Settings>().await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Unable to read settings file: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging. One-shot actions only log warnings to stdout.
    let log_options = if action == Action::Run {
        LogOptions {
            log_level: settings.log_level.clone(),
            log_dir: settings.log_to_file.then(|| layout.logs_dir()),
            json_format: settings.json_logs,
            ..Default::default()
        }
    } else {
        LogOptions {
            log_level: LogLevel::Warn,
            ..Default::default()
        }
    };
    let _log_guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            println!("Failed to initialize logging: {e}");
            None
        }
    };

    let options = AppOptions::from_settings(&settings, layout);

    if action != Action::Run {
        commands::execute(action, &cli_args, &options).await;
        return;
    }

    info!("Running groupctl with options: {:?}", options);
    if let Err(e) = run(options, await_shutdown_signal()).await {
        error!("Failed to run the service: {e}");
        std::process::exit(1);
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
                _ => {
                    error!("Unable to install signal handlers, waiting for Ctrl+C only");
                    wait_for_ctrl_c().await;
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl+C received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    wait_for_ctrl_c().await;
}

async fn wait_for_ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Ctrl+C received, shutting down..."),
        Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
    }
}
