use crate::error::AnalysisError;
use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_WINDOW_DAYS: u32 = 30;
pub const DEFAULT_MAX_COMMITS: usize = 100;
const DEFAULT_CLONE_TIMEOUT_SECS: u64 = 60;

/// Bounds for one analytics call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisOptions {
    pub window_days: u32,
    pub max_commits: usize,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            window_days: DEFAULT_WINDOW_DAYS,
            max_commits: DEFAULT_MAX_COMMITS,
        }
    }
}

impl AnalysisOptions {
    /// Validate caller-supplied bounds, falling back to `defaults` for
    /// anything left unset.
    pub fn resolve(
        window_days: Option<i64>,
        max_commits: Option<i64>,
        defaults: AnalysisOptions,
    ) -> Result<Self, AnalysisError> {
        let window_days = match window_days {
            None => defaults.window_days,
            Some(v) => positive("window_days", v)?,
        };
        let max_commits = match max_commits {
            None => defaults.max_commits,
            Some(v) => positive("max_commits", v)?,
        };
        Ok(Self { window_days, max_commits })
    }
}

fn positive<T: TryFrom<i64>>(name: &'static str, value: i64) -> Result<T, AnalysisError> {
    if value <= 0 {
        return Err(AnalysisError::InvalidParameter { name, value });
    }
    T::try_from(value).map_err(|_| AnalysisError::ParameterOutOfRange { name, value })
}

/// Settings for the analytics engine itself
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub workspace_root: PathBuf,
    pub clone_timeout: Duration,
    pub defaults: AnalysisOptions,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workspace_root: env::temp_dir(),
            clone_timeout: Duration::from_secs(DEFAULT_CLONE_TIMEOUT_SECS),
            defaults: AnalysisOptions::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub cors_origin: String,
    pub engine: EngineConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let defaults = AnalysisOptions {
            window_days: parse_var("ANALYTICS_WINDOW_DAYS", DEFAULT_WINDOW_DAYS)?,
            max_commits: parse_var("ANALYTICS_MAX_COMMITS", DEFAULT_MAX_COMMITS)?,
        };
        if defaults.window_days == 0 || defaults.max_commits == 0 {
            anyhow::bail!("ANALYTICS_WINDOW_DAYS and ANALYTICS_MAX_COMMITS must be greater than zero");
        }

        Ok(Config {
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string()),
            cors_origin: env::var("CORS_ORIGIN").unwrap_or_else(|_| "http://localhost:3000".to_string()),
            engine: EngineConfig {
                workspace_root: env::var("ANALYTICS_WORKSPACE_ROOT")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| env::temp_dir()),
                clone_timeout: Duration::from_secs(parse_var(
                    "ANALYTICS_CLONE_TIMEOUT_SECS",
                    DEFAULT_CLONE_TIMEOUT_SECS,
                )?),
                defaults,
            },
        })
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {}: {:?}", name, raw)),
        Err(_) => Ok(default),
    }
}
