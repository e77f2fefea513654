//! Application-level configuration loading: sync timings, clock cadence,
//! cache location and the template for new tournaments.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::state::tournament::{Economics, ScheduleEntry, TournamentTemplate};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "POKER_CLOCK_BACK_CONFIG_PATH";

/// Timings of the synchronization controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    /// Quiet period before a local mutation is written.
    pub debounce: Duration,
    /// How long the "saved" status stays up before reverting to idle.
    pub saved_status: Duration,
    /// Delay before the single retry of a failed write.
    pub retry_backoff: Duration,
    /// Upper bound for a manual sync.
    pub sync_timeout: Duration,
    /// Upper bound for reading the active document at startup.
    pub read_timeout: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(300),
            saved_status: Duration::from_millis(2_000),
            retry_backoff: Duration::from_millis(5_000),
            sync_timeout: Duration::from_millis(15_000),
            read_timeout: Duration::from_millis(15_000),
        }
    }
}

/// Cadence of the clock ticker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockSettings {
    /// Wake-up interval of the ticker. Elapsed time is measured, so this only
    /// bounds display latency.
    pub tick_interval: Duration,
}

impl Default for ClockSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(250),
        }
    }
}

#[derive(Debug, Clone, Default)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    pub sync: SyncSettings,
    pub clock: ClockSettings,
    /// Directory of the local snapshot cache; in-memory when unset.
    pub cache_dir: Option<PathBuf>,
    /// Template used for every new tournament.
    pub template: TournamentTemplate,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(app_config) => {
                    info!(
                        path = %path.display(),
                        levels = app_config.template.schedule.len(),
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse a configuration document; absent keys keep their defaults.
    pub fn from_json(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<RawConfig>(contents).map(Into::into)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    sync: RawSync,
    clock: RawClock,
    cache: RawCache,
    template: RawTemplate,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawSync {
    debounce_ms: Option<u64>,
    saved_status_ms: Option<u64>,
    retry_backoff_ms: Option<u64>,
    sync_timeout_ms: Option<u64>,
    read_timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawClock {
    tick_interval_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawCache {
    dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawTemplate {
    name: Option<String>,
    schedule: Option<Vec<ScheduleEntry>>,
    economics: Option<Economics>,
}

fn millis_or(value: Option<u64>, fallback: Duration) -> Duration {
    value.map(Duration::from_millis).unwrap_or(fallback)
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let sync_defaults = SyncSettings::default();
        let clock_defaults = ClockSettings::default();
        let template_defaults = TournamentTemplate::default();

        let schedule = value
            .template
            .schedule
            .filter(|schedule| !schedule.is_empty())
            .unwrap_or(template_defaults.schedule);

        Self {
            sync: SyncSettings {
                debounce: millis_or(value.sync.debounce_ms, sync_defaults.debounce),
                saved_status: millis_or(value.sync.saved_status_ms, sync_defaults.saved_status),
                retry_backoff: millis_or(value.sync.retry_backoff_ms, sync_defaults.retry_backoff),
                sync_timeout: millis_or(value.sync.sync_timeout_ms, sync_defaults.sync_timeout),
                read_timeout: millis_or(value.sync.read_timeout_ms, sync_defaults.read_timeout),
            },
            clock: ClockSettings {
                tick_interval: millis_or(
                    value.clock.tick_interval_ms.filter(|ms| *ms > 0),
                    clock_defaults.tick_interval,
                ),
            },
            cache_dir: value.cache.dir,
            template: TournamentTemplate {
                name: value
                    .template
                    .name
                    .filter(|name| !name.trim().is_empty())
                    .unwrap_or(template_defaults.name),
                schedule,
                economics: value.template.economics.unwrap_or(template_defaults.economics),
            },
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = AppConfig::from_json("{}").unwrap();
        assert_eq!(config.sync, SyncSettings::default());
        assert_eq!(config.clock, ClockSettings::default());
        assert_eq!(config.template, TournamentTemplate::default());
        assert!(config.cache_dir.is_none());
    }

    #[test]
    fn partial_overrides_keep_other_defaults() {
        let config = AppConfig::from_json(
            r#"{
                "sync": { "debounceMs": 50 },
                "cache": { "dir": "/tmp/poker" },
                "template": {
                    "name": "Home game",
                    "schedule": [
                        { "id": 1, "type": "level", "smallBlind": 5, "bigBlind": 10, "ante": 0, "durationMinutes": 20 },
                        { "id": 2, "type": "pause", "label": "Pizza", "durationMinutes": 10 }
                    ]
                }
            }"#,
        )
        .unwrap();

        assert_eq!(config.sync.debounce, Duration::from_millis(50));
        assert_eq!(config.sync.retry_backoff, Duration::from_secs(5));
        assert_eq!(config.cache_dir, Some(PathBuf::from("/tmp/poker")));
        assert_eq!(config.template.name, "Home game");
        assert_eq!(config.template.schedule[1], ScheduleEntry::pause(2, "Pizza", 10));
        assert_eq!(config.template.economics, Economics::default());
    }
}
