//! Logging setup on top of `log4rs`, plus a thread-local diagnostic sink for tests.

pub mod sink;

use std::path::Path;

use log::LevelFilter;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::rolling_file::policy::compound::{
    CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
};
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;

use crate::config::LoggingConfig;

/// Target for mutation audit lines (create/update/delete/transaction outcomes).
pub const AUDIT_TARGET: &str = "odmkit::audit";

const DEFAULT_CONFIG_FILE: &str = "odmkit-log.yaml";
const ENCODER_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}";
const ROLL_SIZE_BYTES: u64 = 10 * 1024 * 1024;

/// Initializes logging from `odmkit-log.yaml` in the working directory, if present.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    if Path::new(DEFAULT_CONFIG_FILE).exists() {
        init_path(Path::new(DEFAULT_CONFIG_FILE))?;
    }
    Ok(())
}

/// Initializes logging from a log4rs YAML file.
pub fn init_path(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    log4rs::init_file(path, log4rs::config::Deserializers::default())?;
    Ok(())
}

fn parse_level(level: &str) -> LevelFilter {
    match level.to_ascii_lowercase().as_str() {
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        "off" => LevelFilter::Off,
        _ => LevelFilter::Info,
    }
}

fn rolling_appender(
    dir: &Path,
    stem: &str,
    keep: u32,
) -> Result<RollingFileAppender, Box<dyn std::error::Error>> {
    let roller = FixedWindowRoller::builder()
        .build(&format!("{}", dir.join(format!("{stem}.{{}}.log")).display()), keep)?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(ROLL_SIZE_BYTES)), Box::new(roller));
    let appender = RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(ENCODER_PATTERN)))
        .build(dir.join(format!("{stem}.log")), Box::new(policy))?;
    Ok(appender)
}

/// Builds the rolling-file configuration: `app.log` for everything and `audit.log` for
/// the audit target. Creates the directory when missing.
///
/// # Errors
/// Returns an error if the directory cannot be created or an appender fails to build.
pub fn build_config(cfg: &LoggingConfig) -> Result<Config, Box<dyn std::error::Error>> {
    let base = match &cfg.dir {
        Some(d) => d.clone(),
        None => std::env::current_dir()?,
    };
    std::fs::create_dir_all(&base)?;
    let keep = cfg.retention.max(1);
    let lvl = parse_level(&cfg.level);

    let app = rolling_appender(&base, "app", keep)?;
    let audit = rolling_appender(&base, "audit", keep)?;
    let config = Config::builder()
        .appender(Appender::builder().build("app", Box::new(app)))
        .appender(Appender::builder().build("audit", Box::new(audit)))
        .logger(Logger::builder().appender("audit").additive(false).build(AUDIT_TARGET, lvl))
        .build(Root::builder().appender("app").build(lvl))?;
    Ok(config)
}

/// Installs the process-wide logger described by `cfg`.
///
/// # Errors
/// Returns an error if the config cannot be built or a logger is already installed.
pub fn configure_logging(cfg: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let config = build_config(cfg)?;
    log4rs::init_config(config)?;
    Ok(())
}
