//! Listener configuration loaded from environment variables.

use std::time::Duration;

use chrono_tz::Tz;
use stockroom_core::operation_mode::OperationMode;

/// Default debounce window for a zone's batch.
const DEFAULT_BATCH_WINDOW_MS: u64 = 3000;

/// Default scheduler tick.
const DEFAULT_SWEEP_INTERVAL_MS: u64 = 250;

/// Default TTL for last-reading cache entries.
const DEFAULT_CACHE_TTL_SECS: u64 = 35;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("{var}={value:?} is invalid: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error(
        "Sweep interval ({sweep_ms} ms) must be strictly shorter than the batch window ({window_ms} ms)"
    )]
    SweepNotShorterThanWindow { sweep_ms: u128, window_ms: u128 },
}

/// Broker connection and topic settings.
#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id: String,
    /// Topic filter readers publish to.
    pub topic: String,
    /// Display alerts go to `{alert_topic_prefix}/{zone_id}`.
    pub alert_topic_prefix: String,
}

/// Everything the listener process needs at startup.
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    pub database_url: String,
    pub mqtt: MqttConfig,
    /// Quiet period after a zone's last read before its batch is drained.
    pub batch_window: Duration,
    /// How often the scheduler sweeps for expired batches.
    pub sweep_interval: Duration,
    /// Mode for zones that carry no `operation_mode` of their own.
    pub default_mode: OperationMode,
    /// Timezone applied to offset-naive reader timestamps.
    pub local_tz: Tz,
    /// Last-reading cache; `None` disables it.
    pub redis_url: Option<String>,
    pub cache_ttl: Duration,
}

impl ListenerConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                  | Default                        |
    /// |--------------------------|--------------------------------|
    /// | `DATABASE_URL`           | required                       |
    /// | `MQTT_HOST`              | `localhost`                    |
    /// | `MQTT_PORT`              | `1883`                         |
    /// | `MQTT_USERNAME`          | unset                          |
    /// | `MQTT_PASSWORD`          | unset                          |
    /// | `MQTT_CLIENT_ID`         | `stockroom-listener-<uuid>`    |
    /// | `MQTT_TOPIC`             | `rfid/lectura/#`               |
    /// | `ALERT_TOPIC_PREFIX`     | `rfid/pantalla`                |
    /// | `BATCH_WINDOW_MS`        | `3000`                         |
    /// | `SWEEP_INTERVAL_MS`      | `250`                          |
    /// | `DEFAULT_OPERATION_MODE` | `REQUIRE_PERSON`               |
    /// | `LOCAL_TIMEZONE`         | `UTC`                          |
    /// | `REDIS_URL`              | unset (cache disabled)         |
    /// | `CACHE_TTL_SECS`         | `35`                           |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Blank values count as unset.
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let database_url = get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let mqtt = MqttConfig {
            host: get("MQTT_HOST").unwrap_or_else(|| "localhost".into()),
            port: parse_or(get("MQTT_PORT"), "MQTT_PORT", 1883)?,
            username: get("MQTT_USERNAME"),
            password: get("MQTT_PASSWORD"),
            client_id: get("MQTT_CLIENT_ID")
                .unwrap_or_else(|| format!("stockroom-listener-{}", uuid::Uuid::new_v4().simple())),
            topic: get("MQTT_TOPIC").unwrap_or_else(|| "rfid/lectura/#".into()),
            alert_topic_prefix: get("ALERT_TOPIC_PREFIX")
                .map(|p| p.trim_end_matches('/').to_string())
                .unwrap_or_else(|| "rfid/pantalla".into()),
        };

        let batch_window = Duration::from_millis(parse_or(
            get("BATCH_WINDOW_MS"),
            "BATCH_WINDOW_MS",
            DEFAULT_BATCH_WINDOW_MS,
        )?);
        let sweep_interval = Duration::from_millis(parse_or(
            get("SWEEP_INTERVAL_MS"),
            "SWEEP_INTERVAL_MS",
            DEFAULT_SWEEP_INTERVAL_MS,
        )?);

        let default_mode = match get("DEFAULT_OPERATION_MODE") {
            Some(raw) => raw
                .parse::<OperationMode>()
                .map_err(|e| ConfigError::Invalid {
                    var: "DEFAULT_OPERATION_MODE",
                    value: raw.clone(),
                    reason: e.to_string(),
                })?,
            None => OperationMode::default(),
        };

        let local_tz = match get("LOCAL_TIMEZONE") {
            Some(raw) => raw.parse::<Tz>().map_err(|e| ConfigError::Invalid {
                var: "LOCAL_TIMEZONE",
                value: raw.clone(),
                reason: e.to_string(),
            })?,
            None => chrono_tz::UTC,
        };

        let cache_ttl = Duration::from_secs(parse_or(
            get("CACHE_TTL_SECS"),
            "CACHE_TTL_SECS",
            DEFAULT_CACHE_TTL_SECS,
        )?);

        let config = Self {
            database_url,
            mqtt,
            batch_window,
            sweep_interval,
            default_mode,
            local_tz,
            redis_url: get("REDIS_URL"),
            cache_ttl,
        };
        config.validate()?;
        Ok(config)
    }

    /// Apply command-line overrides for the timing knobs and re-validate.
    pub fn with_overrides(
        mut self,
        batch_time_secs: Option<f64>,
        sweep_interval_ms: Option<u64>,
    ) -> Result<Self, ConfigError> {
        if let Some(secs) = batch_time_secs {
            self.batch_window =
                Duration::try_from_secs_f64(secs).map_err(|e| ConfigError::Invalid {
                    var: "--batch-time",
                    value: secs.to_string(),
                    reason: e.to_string(),
                })?;
        }
        if let Some(ms) = sweep_interval_ms {
            self.sweep_interval = Duration::from_millis(ms);
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.sweep_interval.is_zero() {
            return Err(ConfigError::Invalid {
                var: "SWEEP_INTERVAL_MS",
                value: "0".into(),
                reason: "must be greater than zero".into(),
            });
        }
        if self.cache_ttl.is_zero() {
            return Err(ConfigError::Invalid {
                var: "CACHE_TTL_SECS",
                value: "0".into(),
                reason: "must be greater than zero".into(),
            });
        }
        if self.sweep_interval >= self.batch_window {
            return Err(ConfigError::SweepNotShorterThanWindow {
                sweep_ms: self.sweep_interval.as_millis(),
                window_ms: self.batch_window.as_millis(),
            });
        }
        Ok(())
    }
}

fn parse_or<T>(raw: Option<String>, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
            value,
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn load(pairs: &[(&str, &str)]) -> Result<ListenerConfig, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ListenerConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_database_is_set() {
        let config = load(&[("DATABASE_URL", "postgres://localhost/stockroom")]).unwrap();
        assert_eq!(config.mqtt.host, "localhost");
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.mqtt.topic, "rfid/lectura/#");
        assert_eq!(config.mqtt.alert_topic_prefix, "rfid/pantalla");
        assert!(config.mqtt.client_id.starts_with("stockroom-listener-"));
        assert_eq!(config.batch_window, Duration::from_secs(3));
        assert_eq!(config.sweep_interval, Duration::from_millis(250));
        assert_eq!(config.default_mode, OperationMode::RequirePerson);
        assert_eq!(config.local_tz, chrono_tz::UTC);
        assert!(config.redis_url.is_none());
        assert_eq!(config.cache_ttl, Duration::from_secs(35));
    }

    #[test]
    fn database_url_is_required() {
        assert_matches!(load(&[]), Err(ConfigError::Missing("DATABASE_URL")));
        assert_matches!(
            load(&[("DATABASE_URL", "   ")]),
            Err(ConfigError::Missing("DATABASE_URL"))
        );
    }

    #[test]
    fn explicit_values_are_parsed() {
        let config = load(&[
            ("DATABASE_URL", "postgres://db/stockroom"),
            ("MQTT_PORT", "8883"),
            ("DEFAULT_OPERATION_MODE", "allow_anonymous"),
            ("LOCAL_TIMEZONE", "Europe/Madrid"),
            ("ALERT_TOPIC_PREFIX", "displays/"),
            ("REDIS_URL", "redis://cache:6379"),
        ])
        .unwrap();
        assert_eq!(config.mqtt.port, 8883);
        assert_eq!(config.default_mode, OperationMode::AllowAnonymous);
        assert_eq!(config.local_tz, chrono_tz::Europe::Madrid);
        assert_eq!(config.mqtt.alert_topic_prefix, "displays");
        assert_eq!(config.redis_url.as_deref(), Some("redis://cache:6379"));
    }

    #[test]
    fn invalid_values_are_reported_with_their_variable() {
        assert_matches!(
            load(&[("DATABASE_URL", "x"), ("MQTT_PORT", "seventy")]),
            Err(ConfigError::Invalid { var: "MQTT_PORT", .. })
        );
        assert_matches!(
            load(&[("DATABASE_URL", "x"), ("LOCAL_TIMEZONE", "Mars/Olympus")]),
            Err(ConfigError::Invalid { var: "LOCAL_TIMEZONE", .. })
        );
        assert_matches!(
            load(&[("DATABASE_URL", "x"), ("DEFAULT_OPERATION_MODE", "SOMETIMES")]),
            Err(ConfigError::Invalid { var: "DEFAULT_OPERATION_MODE", .. })
        );
    }

    #[test]
    fn sweep_must_be_shorter_than_window() {
        assert_matches!(
            load(&[
                ("DATABASE_URL", "x"),
                ("BATCH_WINDOW_MS", "500"),
                ("SWEEP_INTERVAL_MS", "500"),
            ]),
            Err(ConfigError::SweepNotShorterThanWindow { .. })
        );
    }

    #[test]
    fn zero_durations_are_rejected() {
        assert_matches!(
            load(&[("DATABASE_URL", "x"), ("CACHE_TTL_SECS", "0")]),
            Err(ConfigError::Invalid { var: "CACHE_TTL_SECS", .. })
        );
        assert_matches!(
            load(&[("DATABASE_URL", "x"), ("SWEEP_INTERVAL_MS", "0")]),
            Err(ConfigError::Invalid { var: "SWEEP_INTERVAL_MS", .. })
        );
    }

    #[test]
    fn cli_overrides_replace_timing_and_revalidate() {
        let config = load(&[("DATABASE_URL", "x")]).unwrap();
        let config = config.with_overrides(Some(5.0), Some(100)).unwrap();
        assert_eq!(config.batch_window, Duration::from_secs(5));
        assert_eq!(config.sweep_interval, Duration::from_millis(100));

        assert_matches!(
            config.clone().with_overrides(Some(0.05), None),
            Err(ConfigError::SweepNotShorterThanWindow { .. })
        );
        assert_matches!(
            config.with_overrides(Some(-1.0), None),
            Err(ConfigError::Invalid { var: "--batch-time", .. })
        );
    }
}
