//! Service configuration
//!
//! Everything is read from environment variables. Twilio settings use the
//! names Twilio documents; the rest are prefixed with `METROBOT_`.

use crate::engine::DEFAULT_CONFIDENCE_THRESHOLD;
use crate::error::{BotError, Result};
use crate::nlu::rasa::DEFAULT_RASA_URL;
use crate::payment::DEFAULT_SUCCESS_RATE;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Log level for the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive usable in a tracing `EnvFilter`
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = BotError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(BotError::Configuration(format!(
                "unknown log level: {}",
                other
            ))),
        }
    }
}

/// Twilio account used to send replies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    /// Sender address including channel prefix, e.g. `whatsapp:+14155238886`
    pub phone_number: String,
}

/// Bot configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Externally reachable base URL, used to build ticket media links
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    #[serde(default = "default_rasa_url")]
    pub rasa_url: String,

    pub twilio: TwilioConfig,

    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,

    #[serde(default = "default_payment_success_rate")]
    pub payment_success_rate: f64,

    #[serde(
        default = "default_timeout",
        serialize_with = "serialize_duration",
        deserialize_with = "deserialize_duration"
    )]
    pub nlu_timeout: Duration,

    #[serde(
        default = "default_timeout",
        serialize_with = "serialize_duration",
        deserialize_with = "deserialize_duration"
    )]
    pub payment_timeout: Duration,

    #[serde(
        default = "default_timeout",
        serialize_with = "serialize_duration",
        deserialize_with = "deserialize_duration"
    )]
    pub render_timeout: Duration,

    #[serde(
        default = "default_timeout",
        serialize_with = "serialize_duration",
        deserialize_with = "deserialize_duration"
    )]
    pub transport_timeout: Duration,

    /// Redis URL; the in-memory cache is used when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redis_url: Option<String>,

    /// Number of rendered tickets kept for download
    #[serde(default = "default_media_capacity")]
    pub media_capacity: usize,

    #[serde(default)]
    pub log_level: LogLevel,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_public_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_rasa_url() -> String {
    DEFAULT_RASA_URL.to_string()
}

fn default_confidence_threshold() -> f64 {
    DEFAULT_CONFIDENCE_THRESHOLD
}

fn default_payment_success_rate() -> f64 {
    DEFAULT_SUCCESS_RATE
}

fn default_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_media_capacity() -> usize {
    1024
}

fn serialize_duration<S>(duration: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_u64(duration.as_secs())
}

fn deserialize_duration<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let secs = u64::deserialize(deserializer)?;
    Ok(Duration::from_secs(secs))
}

impl BotConfig {
    /// Configuration with defaults for everything but the Twilio account
    pub fn new(twilio: TwilioConfig) -> Self {
        Self {
            bind_addr: default_bind_addr(),
            public_base_url: default_public_base_url(),
            rasa_url: default_rasa_url(),
            twilio,
            confidence_threshold: default_confidence_threshold(),
            payment_success_rate: default_payment_success_rate(),
            nlu_timeout: default_timeout(),
            payment_timeout: default_timeout(),
            render_timeout: default_timeout(),
            transport_timeout: default_timeout(),
            redis_url: None,
            media_capacity: default_media_capacity(),
            log_level: LogLevel::default(),
        }
    }

    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from the process environment and `./.env`
    pub fn load() -> Result<Self> {
        Self::from_env_file(".env")
    }

    /// Load configuration from the process environment, falling back to a
    /// dotenv file for keys the environment does not set
    ///
    /// A missing file is the same as an empty one.
    pub fn from_env_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file: HashMap<String, String> = match dotenvy::from_path_iter(path) {
            Ok(entries) => entries.collect::<std::result::Result<_, _>>().map_err(|e| {
                BotError::Configuration(format!("invalid {}: {}", path.display(), e))
            })?,
            Err(e) if e.not_found() => HashMap::new(),
            Err(e) => {
                return Err(BotError::Configuration(format!(
                    "cannot read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        Self::from_lookup(|key| std::env::var(key).ok().or_else(|| file.get(key).cloned()))
    }

    /// Load configuration from an arbitrary key lookup
    ///
    /// Recognized keys: `TWILIO_ACCOUNT_SID`, `TWILIO_AUTH_TOKEN`,
    /// `TWILIO_PHONE_NUMBER` (required), `RASA_API_URL`, and
    /// `METROBOT_BIND_ADDR`, `METROBOT_PUBLIC_BASE_URL`,
    /// `METROBOT_CONFIDENCE_THRESHOLD`, `METROBOT_PAYMENT_SUCCESS_RATE`,
    /// `METROBOT_NLU_TIMEOUT_SECS`, `METROBOT_PAYMENT_TIMEOUT_SECS`,
    /// `METROBOT_RENDER_TIMEOUT_SECS`, `METROBOT_TRANSPORT_TIMEOUT_SECS`,
    /// `METROBOT_REDIS_URL`, `METROBOT_MEDIA_CAPACITY`, `METROBOT_LOG_LEVEL`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| {
                    BotError::Configuration(format!("{} environment variable not set", key))
                })
        };

        let mut config = Self::new(TwilioConfig {
            account_sid: required("TWILIO_ACCOUNT_SID")?,
            auth_token: required("TWILIO_AUTH_TOKEN")?,
            phone_number: required("TWILIO_PHONE_NUMBER")?,
        });

        if let Some(v) = lookup("RASA_API_URL") {
            config.rasa_url = v;
        }
        if let Some(v) = lookup("METROBOT_BIND_ADDR") {
            config.bind_addr = v;
        }
        if let Some(v) = lookup("METROBOT_PUBLIC_BASE_URL") {
            config.public_base_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = lookup("METROBOT_CONFIDENCE_THRESHOLD") {
            config.confidence_threshold = parse_ratio("METROBOT_CONFIDENCE_THRESHOLD", &v)?;
        }
        if let Some(v) = lookup("METROBOT_PAYMENT_SUCCESS_RATE") {
            config.payment_success_rate = parse_ratio("METROBOT_PAYMENT_SUCCESS_RATE", &v)?;
        }
        if let Some(v) = lookup("METROBOT_NLU_TIMEOUT_SECS") {
            config.nlu_timeout = Duration::from_secs(parse("METROBOT_NLU_TIMEOUT_SECS", &v)?);
        }
        if let Some(v) = lookup("METROBOT_PAYMENT_TIMEOUT_SECS") {
            config.payment_timeout =
                Duration::from_secs(parse("METROBOT_PAYMENT_TIMEOUT_SECS", &v)?);
        }
        if let Some(v) = lookup("METROBOT_RENDER_TIMEOUT_SECS") {
            config.render_timeout =
                Duration::from_secs(parse("METROBOT_RENDER_TIMEOUT_SECS", &v)?);
        }
        if let Some(v) = lookup("METROBOT_TRANSPORT_TIMEOUT_SECS") {
            config.transport_timeout =
                Duration::from_secs(parse("METROBOT_TRANSPORT_TIMEOUT_SECS", &v)?);
        }
        if let Some(v) = lookup("METROBOT_REDIS_URL") {
            config.redis_url = Some(v);
        }
        if let Some(v) = lookup("METROBOT_MEDIA_CAPACITY") {
            config.media_capacity = parse("METROBOT_MEDIA_CAPACITY", &v)?;
        }
        if let Some(v) = lookup("METROBOT_LOG_LEVEL") {
            config.log_level = v.parse()?;
        }

        Ok(config)
    }
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| BotError::Configuration(format!("invalid value for {}: {:?}", key, value)))
}

/// Parse a finite number in [0, 1]
fn parse_ratio(key: &str, value: &str) -> Result<f64> {
    let ratio: f64 = parse(key, value)?;
    if !ratio.is_finite() || !(0.0..=1.0).contains(&ratio) {
        return Err(BotError::Configuration(format!(
            "{} must be between 0 and 1, got {:?}",
            key, value
        )));
    }
    Ok(ratio)
}
