use std::path::PathBuf;
use std::time::Duration;

use engine::{AppPaths, LoopConfig};
use tracing::warn;

pub(crate) const SAVE_FILE_ENV_VAR: &str = "TRAIL_SAVE_FILE";
pub(crate) const MAPS_DIR_ENV_VAR: &str = "TRAIL_MAPS_DIR";
pub(crate) const ONLINE_URL_ENV_VAR: &str = "TRAIL_ONLINE_URL";
pub(crate) const MAX_TICKS_ENV_VAR: &str = "TRAIL_MAX_TICKS";
pub(crate) const NAVIGATE_TO_ENV_VAR: &str = "TRAIL_NAVIGATE_TO";

const DEFAULT_SAVE_FILE_NAME: &str = "game0.json";
const DEFAULT_MAX_TICKS: u64 = 600;
const DEFAULT_TARGET_TPS: u32 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct GameSettings {
    pub(crate) save_file: PathBuf,
    pub(crate) maps_dir: PathBuf,
    /// Presence service base URL; online mode is on iff this is set.
    pub(crate) online_url: Option<String>,
    pub(crate) max_ticks: u64,
    pub(crate) navigate_to: Option<String>,
    pub(crate) target_tps: u32,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            save_file: PathBuf::from("saves").join(DEFAULT_SAVE_FILE_NAME),
            maps_dir: PathBuf::from("assets").join("maps"),
            online_url: None,
            max_ticks: DEFAULT_MAX_TICKS,
            navigate_to: None,
            target_tps: DEFAULT_TARGET_TPS,
        }
    }
}

impl GameSettings {
    pub(crate) fn for_paths(paths: &AppPaths) -> Self {
        Self {
            save_file: paths.saves_dir.join(DEFAULT_SAVE_FILE_NAME),
            maps_dir: paths.maps_dir.clone(),
            ..Self::default()
        }
    }

    pub(crate) fn from_env(paths: &AppPaths) -> Self {
        Self::from_lookup(paths, |key| std::env::var(key).ok())
    }

    /// Builds settings from a variable lookup. Blank values count as unset;
    /// values that fail to parse are reported and replaced by the default.
    pub(crate) fn from_lookup(paths: &AppPaths, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mut settings = Self::for_paths(paths);
        if let Some(path) = read(SAVE_FILE_ENV_VAR) {
            settings.save_file = PathBuf::from(path);
        }
        if let Some(path) = read(MAPS_DIR_ENV_VAR) {
            settings.maps_dir = PathBuf::from(path);
        }
        settings.online_url = read(ONLINE_URL_ENV_VAR);
        settings.navigate_to = read(NAVIGATE_TO_ENV_VAR);
        if let Some(raw) = read(MAX_TICKS_ENV_VAR) {
            match raw.parse::<u64>() {
                Ok(value) if value > 0 => settings.max_ticks = value,
                _ => warn!(
                    var = MAX_TICKS_ENV_VAR,
                    value = raw.as_str(),
                    fallback = DEFAULT_MAX_TICKS,
                    "invalid_setting"
                ),
            }
        }
        settings
    }

    pub(crate) fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            target_tps: self.target_tps,
            metrics_log_interval: Duration::from_secs(5),
            max_ticks: Some(self.max_ticks),
            ..LoopConfig::default()
        }
    }
}
