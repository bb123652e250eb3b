//! Scriber Screenshots
//!
//! Reads the elapsed-time overlay burned into recorded session videos, then
//! exports per-action screenshots, per-frame timing reports and an augmented
//! action log for each session.

mod config;
mod decode;
mod export;
mod ocr;
mod paths;
mod session;
mod style;
mod timeline;
mod video;

use anyhow::{Result, bail};
use chrono::Local;
use clap::Parser;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use config::{AnalyticsConfig, CheckInterval, ConfidenceColumns, DecoderKind};

const LOG_FILE_NAME: &str = "scriber_screenshots.log";

/// Logs a message to both console and log file with timestamp.
pub fn log(msg: &str) {
    let timestamp = Local::now().format("%H:%M:%S%.3f");
    let line = format!("[{}] {}\n", timestamp, msg);
    print!("{}", line);
    let log_path = paths::get_logs_dir().join(LOG_FILE_NAME);
    if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(&log_path) {
        let _ = file.write_all(line.as_bytes());
    }
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Create analytics outputs and screenshots from Scriber sessions.",
    long_about = None
)]
struct Cli {
    /// A single session folder (containing 01_scriber) or a parent directory
    /// containing session folders
    #[arg(default_value = "sessions")]
    input_dir: PathBuf,

    /// Minimum aggregate confidence required for a frame's value
    #[arg(long, alias = "min-score")]
    min_template_score: Option<f32>,

    /// Recorder source file the overlay style is read from
    #[arg(long)]
    recorder_ts_path: Option<PathBuf>,

    /// Overlay decoding strategy
    #[arg(long, value_enum)]
    decoder: Option<DecoderKind>,

    /// Sampling of the check export
    #[arg(long, value_enum)]
    check_interval: Option<CheckInterval>,

    /// Confidence columns written to the CSV tables
    #[arg(long, value_enum)]
    confidence_columns: Option<ConfidenceColumns>,

    /// Configuration file (defaults to config.json next to the executable)
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Cli {
    /// Applies command line overrides on top of the loaded configuration.
    fn apply_overrides(&self, config: &mut AnalyticsConfig) {
        if let Some(min_score) = self.min_template_score {
            config.min_score = min_score;
        }
        if let Some(decoder) = self.decoder {
            config.decoder = decoder;
        }
        if let Some(check_interval) = self.check_interval {
            config.report.check_interval = check_interval;
        }
        if let Some(confidence_columns) = self.confidence_columns {
            config.report.confidence_columns = confidence_columns;
        }
    }
}

fn install_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        let msg = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        let location = if let Some(loc) = panic_info.location() {
            format!(" at {}:{}:{}", loc.file(), loc.line(), loc.column())
        } else {
            String::new()
        };
        let log_msg = format!("[PANIC]{} {}\n", location, msg);
        eprintln!("{}", log_msg);
        let log_path = paths::get_logs_dir().join(LOG_FILE_NAME);
        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(&log_path) {
            let _ = file.write_all(log_msg.as_bytes());
        }
    }));
}

fn main() -> Result<()> {
    install_panic_hook();
    let cli = Cli::parse();

    // Ensure output directories exist
    paths::ensure_directories()?;

    let config_path = cli.config.clone().unwrap_or_else(paths::get_config_path);
    let mut config = AnalyticsConfig::load(&config_path);
    cli.apply_overrides(&mut config);
    log(&format!(
        "Decoder: {}, min score: {:.2}",
        config.decoder.label(),
        config.min_score
    ));

    let input_dir = &cli.input_dir;
    if !input_dir.exists() {
        bail!("Input directory does not exist: {}", input_dir.display());
    }
    if !input_dir.is_dir() {
        bail!("Input path is not a directory: {}", input_dir.display());
    }

    for session_dir in session::resolve_session_dirs(input_dir)? {
        let name = session_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| session_dir.display().to_string());
        log(&format!("Session directory: {}", name));
        session::process_session(&session_dir, &config, cli.recorder_ts_path.as_deref())?;
    }

    log("Done");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["scriber-screenshots"]).unwrap();
        assert_eq!(cli.input_dir, PathBuf::from("sessions"));
        assert!(cli.min_template_score.is_none());

        let mut config = AnalyticsConfig::default();
        cli.apply_overrides(&mut config);
        assert_eq!(config.decoder, DecoderKind::BitGrid);
        assert_eq!(config.min_score, 0.43);
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::try_parse_from([
            "scriber-screenshots",
            "data",
            "--min-score",
            "0.8",
            "--decoder",
            "synthetic-template",
            "--check-interval",
            "decoded-millis",
            "--confidence-columns",
            "aggregate",
            "--recorder-ts-path",
            "recorder.ts",
        ])
        .unwrap();
        assert_eq!(cli.input_dir, PathBuf::from("data"));
        assert_eq!(cli.recorder_ts_path, Some(PathBuf::from("recorder.ts")));

        let mut config = AnalyticsConfig::default();
        cli.apply_overrides(&mut config);
        assert_eq!(config.min_score, 0.8);
        assert_eq!(config.decoder, DecoderKind::SyntheticTemplate);
        assert_eq!(config.report.check_interval, CheckInterval::DecodedMillis);
        assert_eq!(config.report.confidence_columns, ConfidenceColumns::Aggregate);
    }

    #[test]
    fn test_cli_rejects_unknown_decoder() {
        assert!(Cli::try_parse_from(["scriber-screenshots", "--decoder", "magic"]).is_err());
    }
}
