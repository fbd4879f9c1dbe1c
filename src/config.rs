//! Application-level configuration loading, including the gameplay tuning set.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "CUBE_TAG_BACK_CONFIG_PATH";

/// Side of the square avatar, in pixels. Tag impact coordinates are offset by
/// half of this so the effect lands on the avatar center.
const DEFAULT_AVATAR_SIZE_PX: f64 = 50.0;
/// Per-axis reach of a tag: avatar size plus a lag margin. The check is
/// axis-aligned (|dx| and |dy| each under this), not Euclidean.
const DEFAULT_TAG_TOLERANCE_PX: f64 = 90.0;
/// Process-wide delay between two successful tags.
const DEFAULT_TAG_COOLDOWN_MS: u64 = 1_000;
/// How long the wolf may stand still before being sent back to the lobby.
const DEFAULT_AFK_THRESHOLD_MS: u64 = 15_000;
/// Period of the AFK sweep.
const DEFAULT_AFK_SWEEP_INTERVAL_MS: u64 = 1_000;
/// Period of the pending-distance reconciliation sweep.
const DEFAULT_STAT_FLUSH_INTERVAL_MS: u64 = 3_600_000;
/// Cooldown applied after an accepted background upload.
const DEFAULT_UPLOAD_COOLDOWN_MS: u64 = 60_000;
/// Punitive cooldown applied after a moderation-flagged upload.
const DEFAULT_UPLOAD_PENALTY_COOLDOWN_MS: u64 = 600_000;
/// Moderation score at or above which an upload counts as flagged.
const DEFAULT_MODERATION_FLAG_THRESHOLD: f32 = 0.7;

/// Rectangle players spawn into when joining.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnArea {
    /// Inclusive lower bound on x.
    pub x_min: f64,
    /// Exclusive upper bound on x.
    pub x_max: f64,
    /// Inclusive lower bound on y.
    pub y_min: f64,
    /// Exclusive upper bound on y.
    pub y_max: f64,
}

impl Default for SpawnArea {
    fn default() -> Self {
        Self {
            x_min: 50.0,
            x_max: 550.0,
            y_min: 50.0,
            y_max: 450.0,
        }
    }
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Rectangle players spawn into.
    pub spawn_area: SpawnArea,
    /// Side of the square avatar, in pixels.
    pub avatar_size_px: f64,
    /// Per-axis tag reach, in pixels.
    pub tag_tolerance_px: f64,
    /// Process-wide delay between successful tags.
    pub tag_cooldown: Duration,
    /// Wolf inactivity limit before eviction.
    pub afk_threshold: Duration,
    /// Period of the AFK sweep.
    pub afk_sweep_interval: Duration,
    /// Period of the distance reconciliation sweep.
    pub stat_flush_interval: Duration,
    /// Cooldown after an accepted background upload.
    pub upload_cooldown: Duration,
    /// Cooldown after a flagged background upload.
    pub upload_penalty_cooldown: Duration,
    /// Moderation score threshold for flagging an upload.
    pub moderation_flag_threshold: f32,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to the baked-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(path = %path.display(), "loaded gameplay tuning from config");
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
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            spawn_area: SpawnArea::default(),
            avatar_size_px: DEFAULT_AVATAR_SIZE_PX,
            tag_tolerance_px: DEFAULT_TAG_TOLERANCE_PX,
            tag_cooldown: Duration::from_millis(DEFAULT_TAG_COOLDOWN_MS),
            afk_threshold: Duration::from_millis(DEFAULT_AFK_THRESHOLD_MS),
            afk_sweep_interval: Duration::from_millis(DEFAULT_AFK_SWEEP_INTERVAL_MS),
            stat_flush_interval: Duration::from_millis(DEFAULT_STAT_FLUSH_INTERVAL_MS),
            upload_cooldown: Duration::from_millis(DEFAULT_UPLOAD_COOLDOWN_MS),
            upload_penalty_cooldown: Duration::from_millis(DEFAULT_UPLOAD_PENALTY_COOLDOWN_MS),
            moderation_flag_threshold: DEFAULT_MODERATION_FLAG_THRESHOLD,
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    spawn_area: Option<RawSpawnArea>,
    avatar_size_px: Option<f64>,
    tag_tolerance_px: Option<f64>,
    tag_cooldown_ms: Option<u64>,
    afk_threshold_ms: Option<u64>,
    afk_sweep_interval_ms: Option<u64>,
    stat_flush_interval_ms: Option<u64>,
    upload_cooldown_ms: Option<u64>,
    upload_penalty_cooldown_ms: Option<u64>,
    moderation_flag_threshold: Option<f32>,
}

#[derive(Debug, Deserialize)]
/// JSON representation of the spawn rectangle.
struct RawSpawnArea {
    x_min: f64,
    x_max: f64,
    y_min: f64,
    y_max: f64,
}

impl From<RawSpawnArea> for SpawnArea {
    fn from(value: RawSpawnArea) -> Self {
        Self {
            x_min: value.x_min,
            x_max: value.x_max,
            y_min: value.y_min,
            y_max: value.y_max,
        }
    }
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = Self::default();
        Self {
            spawn_area: value
                .spawn_area
                .map(Into::into)
                .unwrap_or(defaults.spawn_area),
            avatar_size_px: value.avatar_size_px.unwrap_or(defaults.avatar_size_px),
            tag_tolerance_px: value.tag_tolerance_px.unwrap_or(defaults.tag_tolerance_px),
            tag_cooldown: value
                .tag_cooldown_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.tag_cooldown),
            afk_threshold: value
                .afk_threshold_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.afk_threshold),
            afk_sweep_interval: value
                .afk_sweep_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.afk_sweep_interval),
            stat_flush_interval: value
                .stat_flush_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.stat_flush_interval),
            upload_cooldown: value
                .upload_cooldown_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.upload_cooldown),
            upload_penalty_cooldown: value
                .upload_penalty_cooldown_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.upload_penalty_cooldown),
            moderation_flag_threshold: value
                .moderation_flag_threshold
                .unwrap_or(defaults.moderation_flag_threshold),
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
    fn defaults_match_documented_constants() {
        let config = AppConfig::default();
        assert_eq!(config.tag_tolerance_px, 90.0);
        assert_eq!(config.tag_cooldown, Duration::from_millis(1_000));
        assert_eq!(config.afk_threshold, Duration::from_secs(15));
        assert_eq!(config.stat_flush_interval, Duration::from_secs(3_600));
        assert_eq!(config.spawn_area, SpawnArea::default());
    }

    #[test]
    fn partial_raw_config_keeps_defaults_for_missing_fields() {
        let raw: RawConfig =
            serde_json::from_str(r#"{ "tag_cooldown_ms": 2500, "avatar_size_px": 32.0 }"#)
                .expect("valid raw config");
        let config: AppConfig = raw.into();

        assert_eq!(config.tag_cooldown, Duration::from_millis(2_500));
        assert_eq!(config.avatar_size_px, 32.0);
        assert_eq!(config.tag_tolerance_px, 90.0);
        assert_eq!(config.afk_sweep_interval, Duration::from_secs(1));
    }

    #[test]
    fn spawn_area_override_applies() {
        let raw: RawConfig = serde_json::from_str(
            r#"{ "spawn_area": { "x_min": 0.0, "x_max": 100.0, "y_min": 0.0, "y_max": 80.0 } }"#,
        )
        .expect("valid raw config");
        let config: AppConfig = raw.into();

        assert_eq!(config.spawn_area.x_max, 100.0);
        assert_eq!(config.spawn_area.y_max, 80.0);
    }
}
