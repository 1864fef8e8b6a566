//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{num::NonZeroUsize, path::PathBuf, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

mod cli;

pub use cli::{
    AdvanceArgs, AnswerArgs, CliArgs, Command, GlobalOverrides, LoginArgs, OpenArgs, VoteArgs,
    VoteChoice,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "finquiz";
const DEFAULT_API_BASE_URL: &str = "http://localhost:3000/";
const DEFAULT_API_TIMEOUT_SECS: u64 = 15;
const DEFAULT_SESSION_PATH: &str = ".finquiz/session.json";
const DEFAULT_EXPIRY_CHECK_SECS: u64 = 60;
const DEFAULT_COURSE_ID: &str = "1";
const DEFAULT_GC_GRACE_SECS: u64 = 60;
const DEFAULT_GC_INTERVAL_SECS: u64 = 30;
const DEFAULT_CONSUME_BATCH_LIMIT: u64 = 100;

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub api: ApiSettings,
    pub logging: LoggingSettings,
    pub session: SessionSettings,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone)]
pub struct ApiSettings {
    /// Always ends with `/` so relative endpoint paths join beneath it.
    pub base_url: Url,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub storage_path: PathBuf,
    pub expiry_check_interval: Duration,
    /// Course used for the home path when the session names none.
    pub default_course_id: String,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub gc_grace: Duration,
    pub gc_interval: Duration,
    pub consume_batch_limit: NonZeroUsize,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("FINQUIZ").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(&cli.overrides);

    Settings::from_raw(raw)
}

/// Resolve configuration using the process arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    api: RawApiSettings,
    logging: RawLoggingSettings,
    session: RawSessionSettings,
    cache: RawCacheSettings,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &GlobalOverrides) {
        if let Some(url) = overrides.api_base_url.as_ref() {
            self.api.base_url = Some(url.clone());
        }
        if let Some(seconds) = overrides.api_timeout_seconds {
            self.api.timeout_seconds = Some(seconds);
        }
        if let Some(path) = overrides.session_file.as_ref() {
            self.session.storage_path = Some(path.clone());
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            api,
            logging,
            session,
            cache,
        } = raw;

        Ok(Self {
            api: build_api_settings(api)?,
            logging: build_logging_settings(logging)?,
            session: build_session_settings(session)?,
            cache: build_cache_settings(cache)?,
        })
    }
}

fn build_api_settings(api: RawApiSettings) -> Result<ApiSettings, LoadError> {
    let raw_url = api
        .base_url
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
    let base_url = parse_base_url(&raw_url)?;

    let timeout_secs = api.timeout_seconds.unwrap_or(DEFAULT_API_TIMEOUT_SECS);

    Ok(ApiSettings {
        base_url,
        timeout: positive_seconds(timeout_secs, "api.timeout_seconds")?,
    })
}

fn parse_base_url(raw: &str) -> Result<Url, LoadError> {
    let mut url = Url::parse(raw)
        .map_err(|err| LoadError::invalid("api.base_url", format!("failed to parse: {err}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(LoadError::invalid(
            "api.base_url",
            format!("unsupported scheme `{}`", url.scheme()),
        ));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::WARN,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_session_settings(session: RawSessionSettings) -> Result<SessionSettings, LoadError> {
    let storage_path = session
        .storage_path
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SESSION_PATH));
    if storage_path.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "session.storage_path",
            "path must not be empty",
        ));
    }

    let check_secs = session
        .expiry_check_seconds
        .unwrap_or(DEFAULT_EXPIRY_CHECK_SECS);

    let default_course_id = session
        .default_course_id
        .map(|value| value.trim().to_string())
        .unwrap_or_else(|| DEFAULT_COURSE_ID.to_string());
    if default_course_id.is_empty() || default_course_id.contains('/') {
        return Err(LoadError::invalid(
            "session.default_course_id",
            "must be a non-empty path segment",
        ));
    }

    Ok(SessionSettings {
        storage_path,
        expiry_check_interval: positive_seconds(check_secs, "session.expiry_check_seconds")?,
        default_course_id,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let grace_secs = cache.gc_grace_seconds.unwrap_or(DEFAULT_GC_GRACE_SECS);
    let interval_secs = cache
        .gc_interval_seconds
        .unwrap_or(DEFAULT_GC_INTERVAL_SECS);
    let batch_limit = cache
        .consume_batch_limit
        .unwrap_or(DEFAULT_CONSUME_BATCH_LIMIT);

    let batch_limit: usize = batch_limit.try_into().map_err(|_| {
        LoadError::invalid(
            "cache.consume_batch_limit",
            "value exceeds supported range for usize",
        )
    })?;
    let consume_batch_limit = NonZeroUsize::new(batch_limit).ok_or_else(|| {
        LoadError::invalid("cache.consume_batch_limit", "must be greater than zero")
    })?;

    Ok(CacheSettings {
        gc_grace: Duration::from_secs(grace_secs),
        gc_interval: positive_seconds(interval_secs, "cache.gc_interval_seconds")?,
        consume_batch_limit,
    })
}

fn positive_seconds(value: u64, key: &'static str) -> Result<Duration, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_secs(value))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawApiSettings {
    base_url: Option<String>,
    timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSessionSettings {
    storage_path: Option<PathBuf>,
    expiry_check_seconds: Option<u64>,
    default_course_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    gc_grace_seconds: Option<u64>,
    gc_interval_seconds: Option<u64>,
    consume_batch_limit: Option<u64>,
}

#[cfg(test)]
mod tests;
