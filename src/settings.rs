use crate::guard::RetryPolicy;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use log::LevelFilter;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_FILE: &str = "pronostico";

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Settings {
    pub port: u16,
    pub db: String,
    pub log_level: String,
    pub vote: VoteSettings,
}
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct VoteSettings {
    pub read_attempts: u32,
    pub backoff_base_ms: u64,
}

impl Settings {
    /// Defaults, then `pronostico.toml` (or `path`, which must exist), then
    /// `PRONOSTICO_*` environment variables such as `PRONOSTICO_VOTE__READ_ATTEMPTS`.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let settings = Config::builder()
            .set_default("port", 8081_i64)?
            .set_default("db", "sqlite::memory:")?
            .set_default("log_level", "debug")?
            .set_default("vote.read_attempts", 3_i64)?
            .set_default("vote.backoff_base_ms", 20_i64)?
            .add_source(File::with_name(path.unwrap_or(DEFAULT_FILE)).required(path.is_some()))
            .add_source(
                Environment::with_prefix("PRONOSTICO")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("couldn't load settings")?;
        settings
            .try_deserialize()
            .context("settings are invalid")
    }
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            read_attempts: self.vote.read_attempts.max(1),
            backoff_base: Duration::from_millis(self.vote.backoff_base_ms),
        }
    }
    pub fn level_filter(&self) -> LevelFilter {
        LevelFilter::from_str(&self.log_level).unwrap_or(LevelFilter::Debug)
    }
}
