//! opensong-obs-bridge
//!
//! Follows the slide OpenSong is presenting and mirrors its title and verse
//! text into two files that OBS text sources display.

mod config;
mod logging;
mod opensong;
mod output;
mod slide;
mod sync;

use anyhow::Result;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

use config::{Config, ConfigError};
use sync::{create_engine_channels, ConnectionManager, EngineCommand};

fn main() -> Result<ExitCode> {
    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(ExitCode::SUCCESS);
    }

    let explicit_config = match config_arg(&args) {
        Ok(path) => path,
        Err(message) => {
            eprintln!("{}", message);
            print_help();
            return Ok(ExitCode::from(2));
        }
    };

    // Config is read first so its logging section applies; problems are logged below
    let loaded = Config::locate(explicit_config).and_then(|path| Config::load(&path));
    let logging_config = loaded
        .as_ref()
        .map(|config| config.logging.clone())
        .unwrap_or_default();
    let _log_guard = logging::init_logging(&logging_config)?;

    info!("opensong-obs-bridge starting...");

    let config = match loaded {
        Ok(config) => config,
        Err(ConfigError::Invalid { path, problems }) => {
            for problem in &problems {
                error!("{}", problem);
            }
            error!("Exiting due to invalid config file values in {:?}", path);
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => {
            error!("{}", e);
            error!("Exiting due to invalid config file values");
            return Ok(ExitCode::FAILURE);
        }
    };
    info!("Configuration loaded from {:?}", config.config_path());
    info!(
        "Writing title to {:?} and verses to {:?}",
        config.output.title_file, config.output.verse_file
    );

    let runtime = tokio::runtime::Runtime::new()?;

    let (cmd_tx, cmd_rx, status_tx, _status_rx) = create_engine_channels();
    let mut manager = ConnectionManager::new(&config, cmd_rx, status_tx);

    // Set up Ctrl+C handler that sends shutdown command
    let ctrl_c_tx = cmd_tx.clone();
    ctrlc::set_handler(move || {
        info!("Ctrl+C received, shutting down...");
        let _ = ctrl_c_tx.try_send(EngineCommand::Shutdown);
    })?;

    if let Err(e) = runtime.block_on(manager.run()) {
        error!("Connection manager error: {}", e);
        return Ok(ExitCode::FAILURE);
    }

    info!("Exiting ...");
    Ok(ExitCode::SUCCESS)
}

/// Value of `-c/--config`, if given
fn config_arg(args: &[String]) -> Result<Option<PathBuf>, String> {
    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        if arg == "-c" || arg == "--config" {
            return iter
                .next()
                .map(|path| Some(PathBuf::from(path)))
                .ok_or_else(|| format!("{} requires a path", arg));
        }
        if let Some(path) = arg.strip_prefix("--config=") {
            return Ok(Some(PathBuf::from(path)));
        }
    }
    Ok(None)
}

fn print_help() {
    println!("opensong-obs-bridge - OpenSong slide text for OBS");
    println!();
    println!("USAGE:");
    println!("    opensong-obs-bridge [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help            Print this help message");
    println!("    -c, --config <PATH>   Use this config file");
    println!();
    println!("ENVIRONMENT:");
    println!("    OPENSONG_OBS_CONFIG     Config file path (when --config is not given)");
    println!("    OPENSONG_OBS_LOG_PATH   Log directory for file logging");
    println!("    RUST_LOG                Set log level (e.g., debug, info, warn)");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("opensong-obs-bridge")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_config_arg_forms() {
        assert_eq!(config_arg(&args(&[])).unwrap(), None);
        assert_eq!(
            config_arg(&args(&["-c", "a.toml"])).unwrap(),
            Some(PathBuf::from("a.toml"))
        );
        assert_eq!(
            config_arg(&args(&["--config", "b.toml"])).unwrap(),
            Some(PathBuf::from("b.toml"))
        );
        assert_eq!(
            config_arg(&args(&["--config=c.toml"])).unwrap(),
            Some(PathBuf::from("c.toml"))
        );
    }

    #[test]
    fn test_config_arg_requires_value() {
        assert!(config_arg(&args(&["--config"])).is_err());
    }
}
