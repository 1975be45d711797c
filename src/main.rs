//! # stream-probe
//!
//! Command-line entry point: loads `.env`, sets up logging and runs one probe
//! session against the configured endpoint.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use stream_probe::{run_probe, ProbeOptions, ProcessEnv};
use tracing::{error, info};

/// Probe settings come from the environment (`OPENAI_*`); these flags only
/// control how the binary runs.
#[derive(Parser, Debug)]
#[command(name = "stream-probe", version, about)]
struct Cli {
    /// Load settings from this .env file instead of ./.env
    #[arg(long, value_name = "PATH")]
    env_file: Option<PathBuf>,

    /// Log filter, e.g. "info" or "stream_probe=debug"
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    log_level: String,

    /// Do not echo streamed tokens to stdout
    #[arg(long, short)]
    quiet: bool,
}

fn setup_logging(filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Load settings from `env_file`, or from `./.env` when none is given.
///
/// Variables already present in the process environment are never
/// overridden. Returns the file that was loaded, if any; a missing `./.env`
/// is not an error, a missing `env_file` is.
fn load_env(env_file: Option<&Path>) -> Result<Option<PathBuf>, dotenv::Error> {
    match env_file {
        Some(path) => dotenv::from_path(path).map(|()| Some(path.to_path_buf())),
        None => Ok(dotenv::dotenv().ok()),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(&cli.log_level);

    match load_env(cli.env_file.as_deref()) {
        Ok(Some(path)) => info!(path = %path.display(), "Loaded settings file"),
        Ok(None) => {}
        Err(err) => {
            error!("Failed to load env file: {}", err);
            return ExitCode::from(2);
        }
    }

    let report = run_probe(&ProcessEnv, ProbeOptions { echo_tokens: !cli.quiet }).await;
    let code = report.exit_code();
    info!(run_id = %report.run_id, status = %report.outcome.status, exit_code = code, "Done");

    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_env_file_is_the_only_file_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("probe.env");
        std::fs::write(&path, "STREAM_PROBE_ENV_FILE_TEST=from-explicit-file\n").unwrap();

        let loaded = load_env(Some(&path)).unwrap();
        assert_eq!(loaded, Some(path.clone()));
        assert_eq!(
            std::env::var("STREAM_PROBE_ENV_FILE_TEST").as_deref(),
            Ok("from-explicit-file")
        );
    }

    #[test]
    fn test_missing_explicit_env_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_env(Some(&dir.path().join("absent.env"))).is_err());
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::parse_from(["stream-probe", "--env-file", "ci.env", "--quiet", "--log-level", "debug"]);
        assert_eq!(cli.env_file, Some(PathBuf::from("ci.env")));
        assert!(cli.quiet);
        assert_eq!(cli.log_level, "debug");
    }
}
