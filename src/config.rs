use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Nightly rates and the per-stay cap for free bookings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingConfig {
    pub rate_friend: u64,
    pub rate_guest: u64,
    pub max_personal_nights: u32,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            rate_friend: 50,
            rate_guest: 100,
            max_personal_nights: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyConfig {
    pub pricing: PricingConfig,
    /// Free nights an owner may use per quarter when the counter is enforced.
    pub quota_nights_per_period: u32,
    /// New bookings are written `confirmed` instead of `pending`.
    pub auto_confirm: bool,
    /// Read, check and charge the owner's quota counter on personal bookings.
    pub enforce_quota_counter: bool,
    pub store_timeout: Duration,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            pricing: PricingConfig::default(),
            quota_nights_per_period: 3,
            auto_confirm: true,
            enforce_quota_counter: false,
            store_timeout: Duration::from_millis(5_000),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub metrics_port: Option<u16>,
    pub compact_threshold: u64,
    pub policy: PolicyConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Missing keys fall back to defaults,
    /// present-but-unparseable keys are errors.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = PolicyConfig::default();
        let store_timeout_ms: u64 = parse_or(&lookup, "CALLABO_STORE_TIMEOUT_MS", 5_000)?;

        let policy = PolicyConfig {
            pricing: PricingConfig {
                rate_friend: parse_or(&lookup, "CALLABO_RATE_FRIEND", defaults.pricing.rate_friend)?,
                rate_guest: parse_or(&lookup, "CALLABO_RATE_GUEST", defaults.pricing.rate_guest)?,
                max_personal_nights: parse_or(
                    &lookup,
                    "CALLABO_MAX_PERSONAL_NIGHTS",
                    defaults.pricing.max_personal_nights,
                )?,
            },
            quota_nights_per_period: parse_or(
                &lookup,
                "CALLABO_QUOTA_NIGHTS",
                defaults.quota_nights_per_period,
            )?,
            auto_confirm: parse_bool_or(&lookup, "CALLABO_AUTO_CONFIRM", defaults.auto_confirm)?,
            enforce_quota_counter: parse_bool_or(
                &lookup,
                "CALLABO_ENFORCE_QUOTA",
                defaults.enforce_quota_counter,
            )?,
            store_timeout: Duration::from_millis(store_timeout_ms),
        };

        Ok(Self {
            bind: lookup("CALLABO_BIND").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(&lookup, "CALLABO_PORT", 8080)?,
            data_dir: PathBuf::from(lookup("CALLABO_DATA_DIR").unwrap_or_else(|| "./data".into())),
            metrics_port: lookup("CALLABO_METRICS_PORT")
                .map(|v| parse_value("CALLABO_METRICS_PORT", v))
                .transpose()?,
            compact_threshold: parse_or(&lookup, "CALLABO_COMPACT_THRESHOLD", 1000)?,
            policy,
        })
    }
}

fn parse_value<T: FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { key, value })
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(v) => parse_value(key, v),
        None => Ok(default),
    }
}

fn parse_bool_or(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: bool,
) -> Result<bool, ConfigError> {
    let Some(value) = lookup(key) else {
        return Ok(default);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid { key, value }),
    }
}
