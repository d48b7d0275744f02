//! Configuration loader for the DayPack service.
//!
//! All runtime settings come from environment variables (with optional
//! `.env` support provided by the caller). Nothing else in the library reads
//! the environment. Every capability key is optional: a missing key turns
//! that source off rather than failing startup.
use std::env;
use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono_tz::Tz;

use crate::sources::{fcm::FCM_URL, swpc::NOAA_KP_1M, worldtides::WORLDTIDES_URL};

/// Parse an optional numeric variable with a default value.
macro_rules! parse_var {
    ($lookup:expr, $var_name:expr, $ty:ty, $default:expr) => {
        $lookup($var_name)
            .map(|v| v.trim().parse::<$ty>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Read an optional string variable, treating empty values as unset.
macro_rules! optional_var {
    ($lookup:expr, $var_name:expr) => {
        $lookup($var_name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };
}

/// Strongly typed application configuration.
///
/// Immutable after loading; cloned into the request state.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// HTTP listen port.
    pub port: u16,

    /// Zone used when a request omits `tzname`.
    pub default_tz: Tz,

    /// WorldTides API key. `None` disables tides.
    pub worldtides_api_key: Option<String>,

    /// WorldTides v3 endpoint.
    pub worldtides_url: String,

    /// Planetary K-index JSON feed.
    pub kp_feed_url: String,

    /// Base URL of the ephemeris sidecar. `None` leaves sun and moon
    /// sources unavailable.
    pub ephemeris_url: Option<String>,

    /// FCM API root.
    pub fcm_url: String,

    /// Inline service-account JSON key. Tokens are minted from it.
    pub firebase_credentials_json: Option<String>,

    /// Firebase project id. Overrides the key's own; required with
    /// `fcm_access_token`.
    pub fcm_project_id: Option<String>,

    /// Fixed OAuth bearer for FCM HTTP v1 (emulators, stubs).
    pub fcm_access_token: Option<String>,

    pub kp_watch_interval: Duration,
    pub http_connect_timeout: Duration,
    pub tide_timeout: Duration,
    pub kp_timeout: Duration,
    pub ephemeris_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            default_tz: chrono_tz::Australia::Brisbane,
            worldtides_api_key: None,
            worldtides_url: WORLDTIDES_URL.to_string(),
            kp_feed_url: NOAA_KP_1M.to_string(),
            ephemeris_url: None,
            fcm_url: FCM_URL.to_string(),
            firebase_credentials_json: None,
            fcm_project_id: None,
            fcm_access_token: None,
            kp_watch_interval: Duration::from_secs(300),
            http_connect_timeout: Duration::from_secs(5),
            tide_timeout: Duration::from_secs(10),
            kp_timeout: Duration::from_secs(20),
            ephemeris_timeout: Duration::from_secs(10),
        }
    }
}

/// Load configuration from the process environment.
///
/// Optional (defaults in brackets):
/// - `PORT` [8080]
/// - `DEFAULT_TZ` [Australia/Brisbane]
/// - `WORLDTIDES_API_KEY` [unset: tides disabled], `WORLDTIDES_URL`
/// - `KP_FEED_URL` [NOAA SWPC 1-minute planetary K-index]
/// - `EPHEMERIS_URL` [unset]
/// - `FIREBASE_CREDENTIALS_JSON` [unset], or `FCM_PROJECT_ID` +
///   `FCM_ACCESS_TOKEN` [unset: alerts are only logged], `FCM_URL`
/// - `KP_WATCH_INTERVAL_SECS` [300], `HTTP_CONNECT_TIMEOUT_SECS` [5],
///   `TIDE_TIMEOUT_SECS` [10], `KP_TIMEOUT_SECS` [20],
///   `EPHEMERIS_TIMEOUT_SECS` [10]
///
/// Returns an error for unparseable values, an unknown `DEFAULT_TZ`, or an
/// `FCM_ACCESS_TOKEN` without `FCM_PROJECT_ID`.
pub fn load_from_env() -> Result<Config> {
    load_from(|name| env::var(name).ok())
}

/// Load configuration through an arbitrary variable lookup.
pub fn load_from<F>(lookup: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    // ---
    let defaults = Config::default();

    let default_tz = match optional_var!(lookup, "DEFAULT_TZ") {
        Some(name) => match name.parse::<Tz>() {
            Ok(tz) => tz,
            Err(_) => return Err(anyhow!("Invalid DEFAULT_TZ: '{}' is not an IANA zone", name)),
        },
        None => defaults.default_tz,
    };

    let fcm_project_id = optional_var!(lookup, "FCM_PROJECT_ID");
    let fcm_access_token = optional_var!(lookup, "FCM_ACCESS_TOKEN");
    if fcm_access_token.is_some() && fcm_project_id.is_none() {
        return Err(anyhow!("FCM_ACCESS_TOKEN requires FCM_PROJECT_ID"));
    }

    let secs = |name: &str, default: Duration| -> Result<Duration> {
        let value = parse_var!(lookup, name, u64, default.as_secs());
        if value == 0 {
            return Err(anyhow!("Invalid {}: must be greater than zero", name));
        }
        Ok(Duration::from_secs(value))
    };

    Ok(Config {
        port: parse_var!(lookup, "PORT", u16, defaults.port),
        default_tz,
        worldtides_api_key: optional_var!(lookup, "WORLDTIDES_API_KEY"),
        worldtides_url: optional_var!(lookup, "WORLDTIDES_URL")
            .unwrap_or(defaults.worldtides_url),
        kp_feed_url: optional_var!(lookup, "KP_FEED_URL")
            .unwrap_or(defaults.kp_feed_url),
        ephemeris_url: optional_var!(lookup, "EPHEMERIS_URL"),
        fcm_url: optional_var!(lookup, "FCM_URL").unwrap_or(defaults.fcm_url),
        firebase_credentials_json: optional_var!(lookup, "FIREBASE_CREDENTIALS_JSON"),
        fcm_project_id,
        fcm_access_token,
        kp_watch_interval: secs("KP_WATCH_INTERVAL_SECS", defaults.kp_watch_interval)?,
        http_connect_timeout: secs("HTTP_CONNECT_TIMEOUT_SECS", defaults.http_connect_timeout)?,
        tide_timeout: secs("TIDE_TIMEOUT_SECS", defaults.tide_timeout)?,
        kp_timeout: secs("KP_TIMEOUT_SECS", defaults.kp_timeout)?,
        ephemeris_timeout: secs("EPHEMERIS_TIMEOUT_SECS", defaults.ephemeris_timeout)?,
    })
}

impl Config {
    /// Log the loaded configuration, masking credentials.
    pub fn log_config(&self) {
        // ---
        let mask = |v: &Option<String>| match v {
            Some(s) if s.chars().count() > 4 => {
                let head: String = s.chars().take(4).collect();
                format!("{head}****")
            }
            Some(_) => "****".to_string(),
            None => "(unset)".to_string(),
        };
        let presence = |v: &Option<String>| if v.is_some() { "(set)" } else { "(unset)" };

        tracing::info!("Configuration loaded:");
        tracing::info!("  PORT               : {}", self.port);
        tracing::info!("  DEFAULT_TZ         : {}", self.default_tz.name());
        tracing::info!("  WORLDTIDES_API_KEY : {}", mask(&self.worldtides_api_key));
        tracing::info!("  WORLDTIDES_URL     : {}", self.worldtides_url);
        tracing::info!("  KP_FEED_URL        : {}", self.kp_feed_url);
        tracing::info!(
            "  EPHEMERIS_URL      : {}",
            self.ephemeris_url.as_deref().unwrap_or("(unset)")
        );
        tracing::info!(
            "  FCM_PROJECT_ID     : {}",
            self.fcm_project_id.as_deref().unwrap_or("(unset)")
        );
        tracing::info!(
            "  FIREBASE_CREDENTIALS_JSON : {}",
            presence(&self.firebase_credentials_json)
        );
        tracing::info!("  FCM_ACCESS_TOKEN   : {}", mask(&self.fcm_access_token));
        tracing::info!("  KP_WATCH_INTERVAL  : {:?}", self.kp_watch_interval);
        tracing::info!(
            "  HTTP timeouts      : connect {:?}, tides {:?}, kp {:?}, ephemeris {:?}",
            self.http_connect_timeout,
            self.tide_timeout,
            self.kp_timeout,
            self.ephemeris_timeout
        );
    }

    /// A service-account key, or a fixed bearer with its project id.
    pub fn push_enabled(&self) -> bool {
        self.firebase_credentials_json.is_some()
            || (self.fcm_project_id.is_some() && self.fcm_access_token.is_some())
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        load_from(|name| map.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        // ---
        let cfg = load(&[]).unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.default_tz, chrono_tz::Australia::Brisbane);
        assert_eq!(cfg.kp_feed_url, NOAA_KP_1M);
        assert_eq!(cfg.kp_watch_interval, Duration::from_secs(300));
        assert_eq!(cfg.tide_timeout, Duration::from_secs(10));
        assert!(cfg.worldtides_api_key.is_none());
        assert!(!cfg.push_enabled());
        assert!(cfg.ephemeris_url.is_none());
    }

    #[test]
    fn test_overrides() {
        // ---
        let cfg = load(&[
            ("PORT", "9090"),
            ("DEFAULT_TZ", "Europe/Oslo"),
            ("WORLDTIDES_API_KEY", "abcdef"),
            ("EPHEMERIS_URL", "http://ephemeris:8000"),
            ("FCM_PROJECT_ID", "daypack"),
            ("FCM_ACCESS_TOKEN", "ya29.token"),
            ("KP_WATCH_INTERVAL_SECS", "60"),
        ])
        .unwrap();
        assert_eq!(cfg.port, 9090);
        assert_eq!(cfg.default_tz, chrono_tz::Europe::Oslo);
        assert_eq!(cfg.worldtides_api_key.as_deref(), Some("abcdef"));
        assert!(cfg.push_enabled());
        assert_eq!(cfg.ephemeris_url.as_deref(), Some("http://ephemeris:8000"));
        assert_eq!(cfg.kp_watch_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_empty_key_counts_as_unset() {
        // ---
        let cfg = load(&[("WORLDTIDES_API_KEY", "  ")]).unwrap();
        assert!(cfg.worldtides_api_key.is_none());
    }

    #[test]
    fn test_invalid_values_are_fatal() {
        // ---
        assert!(load(&[("PORT", "eighty")]).is_err());
        assert!(load(&[("DEFAULT_TZ", "Atlantis/Capital")]).is_err());
        assert!(load(&[("KP_WATCH_INTERVAL_SECS", "0")]).is_err());
        assert!(load(&[("FCM_ACCESS_TOKEN", "ya29.token")]).is_err());
    }

    #[test]
    fn test_service_account_key_enables_push() {
        // ---
        let key = r#"{"type": "service_account", "project_id": "daypack"}"#;
        let cfg = load(&[("FIREBASE_CREDENTIALS_JSON", key)]).unwrap();
        assert!(cfg.push_enabled());
        assert!(cfg.fcm_project_id.is_none());

        // A project id alone is only an override and enables nothing
        let cfg = load(&[("FCM_PROJECT_ID", "daypack")]).unwrap();
        assert!(!cfg.push_enabled());
    }
}
