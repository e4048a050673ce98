use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use crate::error::ConfigError;
use crate::poller::BaselinePolicy;

pub const DEFAULT_STREAM_URL: &str = "https://play.radioking.io/radio-monash";
pub const DEFAULT_API_BASE_URL: &str = "https://api.radioking.io/widget/radio/radio-monash";
pub const DEFAULT_LOG_FILE: &str = "radio_monash_bot.log";

#[derive(Clone)]
pub struct Config {
    /// Discord bot token.
    pub token: String,
    /// Audio stream relayed into every voice session.
    pub stream_url: String,
    /// Base url of the metadata API, `/track/current` is appended.
    pub api_base_url: String,
    pub station_name: String,
    pub station_footer: String,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    /// Volume new sessions start at, in `[0, 1]`.
    pub default_volume: f32,
    pub baseline_policy: BaselinePolicy,
    /// File every log line is mirrored to. `RADIO_LOG_FILE=none` turns it off.
    pub log_file: Option<String>
}

impl Default for Config {
    fn default() -> Self {
        Self {
            token: String::new(),
            stream_url: DEFAULT_STREAM_URL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            station_name: "Radio Monash".to_string(),
            station_footer: "Tune in radiomonash.online".to_string(),
            poll_interval: Duration::from_secs(60),
            request_timeout: Duration::from_secs(5),
            default_volume: 0.5,
            baseline_policy: BaselinePolicy::Overwrite,
            log_file: Some(DEFAULT_LOG_FILE.to_string())
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("token", &"<redacted>")
            .field("stream_url", &self.stream_url)
            .field("api_base_url", &self.api_base_url)
            .field("station_name", &self.station_name)
            .field("station_footer", &self.station_footer)
            .field("poll_interval", &self.poll_interval)
            .field("request_timeout", &self.request_timeout)
            .field("default_volume", &self.default_volume)
            .field("baseline_policy", &self.baseline_policy)
            .field("log_file", &self.log_file)
            .finish()
    }
}

impl Config {
    /// Reads the configuration from the process environment. `DISCORD_TOKEN`
    /// is required, everything else falls back to the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Config::default();

        config.token = get("DISCORD_TOKEN").ok_or(ConfigError::Missing("DISCORD_TOKEN"))?;

        if let Some(url) = get("RADIO_STREAM_URL") {
            config.stream_url = url;
        }
        if let Some(url) = get("RADIO_API_BASE_URL") {
            config.api_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(name) = get("RADIO_STATION_NAME") {
            config.station_name = name;
        }
        if let Some(footer) = get("RADIO_STATION_FOOTER") {
            config.station_footer = footer;
        }
        if let Some(secs) = parse::<u64>(&get, "RADIO_POLL_INTERVAL_SECS")? {
            if secs == 0 {
                return Err(invalid("RADIO_POLL_INTERVAL_SECS", secs));
            }
            config.poll_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = parse::<u64>(&get, "RADIO_REQUEST_TIMEOUT_SECS")? {
            if secs == 0 {
                return Err(invalid("RADIO_REQUEST_TIMEOUT_SECS", secs));
            }
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(level) = parse::<u8>(&get, "RADIO_DEFAULT_VOLUME")? {
            if level > 100 {
                return Err(invalid("RADIO_DEFAULT_VOLUME", level));
            }
            config.default_volume = f32::from(level) / 100.0;
        }
        if let Some(policy) = parse::<BaselinePolicy>(&get, "RADIO_BASELINE_POLICY")? {
            config.baseline_policy = policy;
        }
        if let Some(path) = get("RADIO_LOG_FILE") {
            config.log_file = match path.trim().to_ascii_lowercase().as_str() {
                "none" | "off" => None,
                _ => Some(path)
            };
        }

        Ok(config)
    }
}

fn parse<T: FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    name: &'static str
) -> Result<Option<T>, ConfigError> {
    get(name)
        .map(|raw| raw.trim().parse::<T>().map_err(|_| ConfigError::Invalid { name, value: raw }))
        .transpose()
}

fn invalid(name: &'static str, value: impl ToString) -> ConfigError {
    ConfigError::Invalid { name, value: value.to_string() }
}
