use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{LazyLock, RwLock};

use crate::extract::ZoomLimits;
use crate::render::{RunGranularity, ServiceConfig};

pub const CURRENT_VERSION: u32 = 1;
const SETTINGS_FILENAME: &str = "config.yaml";
const APP_NAME: &str = "involens";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    /// Scale a document opens at
    #[serde(default = "default_scale")]
    pub default_scale: f64,

    #[serde(default = "default_zoom_in_rate")]
    pub zoom_in_rate: f64,

    #[serde(default = "default_zoom_out_rate")]
    pub zoom_out_rate: f64,

    #[serde(default = "default_min_scale")]
    pub min_scale: f64,

    #[serde(default = "default_max_scale")]
    pub max_scale: f64,

    #[serde(default = "default_render_workers")]
    pub render_workers: usize,

    /// Rendered pages kept in memory
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,

    /// Pages rendered ahead of and behind the current one
    #[serde(default = "default_prefetch_radius")]
    pub prefetch_radius: usize,

    #[serde(default)]
    pub run_granularity: RunGranularity,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

fn default_scale() -> f64 {
    1.0
}

fn default_zoom_in_rate() -> f64 {
    1.1
}

fn default_zoom_out_rate() -> f64 {
    1.05
}

fn default_min_scale() -> f64 {
    0.1
}

fn default_max_scale() -> f64 {
    8.0
}

fn default_render_workers() -> usize {
    2
}

fn default_cache_size() -> usize {
    16
}

fn default_prefetch_radius() -> usize {
    1
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            default_scale: default_scale(),
            zoom_in_rate: default_zoom_in_rate(),
            zoom_out_rate: default_zoom_out_rate(),
            min_scale: default_min_scale(),
            max_scale: default_max_scale(),
            render_workers: default_render_workers(),
            cache_size: default_cache_size(),
            prefetch_radius: default_prefetch_radius(),
            run_granularity: RunGranularity::default(),
            log_level: default_log_level(),
        }
    }
}

impl Settings {
    /// Replace values the engine cannot work with by their defaults
    fn sanitize(&mut self) {
        let positive = |v: f64| v.is_finite() && v > 0.0;

        if !positive(self.min_scale) || !positive(self.max_scale) || self.min_scale > self.max_scale
        {
            warn!(
                "Invalid scale bounds [{}, {}], using defaults",
                self.min_scale, self.max_scale
            );
            self.min_scale = default_min_scale();
            self.max_scale = default_max_scale();
        }
        if !positive(self.zoom_in_rate) || self.zoom_in_rate <= 1.0 {
            warn!("Invalid zoom_in_rate {}, using default", self.zoom_in_rate);
            self.zoom_in_rate = default_zoom_in_rate();
        }
        if !positive(self.zoom_out_rate) || self.zoom_out_rate <= 1.0 {
            warn!("Invalid zoom_out_rate {}, using default", self.zoom_out_rate);
            self.zoom_out_rate = default_zoom_out_rate();
        }
        if !positive(self.default_scale) {
            warn!("Invalid default_scale {}, using default", self.default_scale);
            self.default_scale = default_scale();
        }
        if self.render_workers == 0 {
            self.render_workers = 1;
        }
        if log::LevelFilter::from_str(&self.log_level).is_err() {
            warn!("Unknown log_level {:?}, using info", self.log_level);
            self.log_level = default_log_level();
        }
    }
}

static SETTINGS: LazyLock<RwLock<Settings>> = LazyLock::new(|| RwLock::new(Settings::default()));

#[must_use]
pub fn preferred_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|config| config.join(APP_NAME).join(SETTINGS_FILENAME))
}

/// Load settings from the user config directory, writing defaults there on
/// first run
pub fn load_settings() {
    let Some(path) = preferred_config_path() else {
        warn!("Could not determine config directory, using default settings");
        return;
    };
    if path.exists() {
        load_settings_from_path(&path);
    } else {
        info!("Settings file not found, creating with defaults at {path:?}");
        if let Ok(settings) = SETTINGS.read() {
            save_settings_to_file(&settings, &path);
        }
    }
}

/// Load settings from an explicit file. Unreadable or unparsable files
/// are logged and leave the current settings untouched.
pub fn load_settings_from_path(path: &Path) {
    match fs::read_to_string(path) {
        Ok(content) => match serde_yaml::from_str::<Settings>(&content) {
            Ok(mut settings) => {
                debug!("Loaded settings from {path:?}");

                if settings.version < CURRENT_VERSION {
                    migrate_settings(&mut settings);
                    save_settings_to_file(&settings, path);
                }
                settings.sanitize();

                if let Ok(mut global) = SETTINGS.write() {
                    *global = settings;
                }
            }
            Err(e) => {
                error!("Failed to parse settings file {path:?}: {e}");
            }
        },
        Err(e) => {
            error!("Failed to read settings file {path:?}: {e}");
        }
    }
}

fn migrate_settings(settings: &mut Settings) {
    info!(
        "Migrating settings from v{} to v{}",
        settings.version, CURRENT_VERSION
    );

    // Version 0 files predate run granularity; serde already filled the
    // default, so only the stamp changes.
    settings.version = CURRENT_VERSION;
}

fn save_settings_to_file(settings: &Settings, path: &Path) {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            if let Err(e) = fs::create_dir_all(parent) {
                error!("Failed to create config directory {parent:?}: {e}");
                return;
            }
        }
    }

    let content = generate_settings_yaml(settings);

    match fs::write(path, content) {
        Ok(()) => debug!("Saved settings to {path:?}"),
        Err(e) => error!("Failed to save settings to {path:?}: {e}"),
    }
}

fn generate_settings_yaml(settings: &Settings) -> String {
    let mut content = String::new();

    content.push_str(&format!("version: {}\n", settings.version));
    content.push('\n');
    content.push_str("# Zoom\n");
    content.push_str(&format!("default_scale: {:?}\n", settings.default_scale));
    content.push_str(&format!("zoom_in_rate: {:?}\n", settings.zoom_in_rate));
    content.push_str(&format!("zoom_out_rate: {:?}\n", settings.zoom_out_rate));
    content.push_str(&format!("min_scale: {:?}\n", settings.min_scale));
    content.push_str(&format!("max_scale: {:?}\n", settings.max_scale));
    content.push('\n');
    content.push_str("# Rendering\n");
    content.push_str(&format!("render_workers: {}\n", settings.render_workers));
    content.push_str(&format!("cache_size: {}\n", settings.cache_size));
    content.push_str(&format!("prefetch_radius: {}\n", settings.prefetch_radius));
    content.push('\n');
    content.push_str("# Text runs: \"line\" or \"word\"\n");
    content.push_str(&format!(
        "run_granularity: {}\n",
        settings.run_granularity.as_str()
    ));
    content.push_str(&format!("log_level: {}\n", settings.log_level));

    content
}

// Public API for accessing settings

#[must_use]
pub fn get_settings() -> Settings {
    SETTINGS
        .read()
        .map(|s| s.clone())
        .unwrap_or_default()
}

#[must_use]
pub fn get_default_scale() -> f64 {
    SETTINGS
        .read()
        .map(|s| s.default_scale)
        .unwrap_or_else(|_| default_scale())
}

#[must_use]
pub fn get_run_granularity() -> RunGranularity {
    SETTINGS
        .read()
        .map(|s| s.run_granularity)
        .unwrap_or_default()
}

#[must_use]
pub fn get_log_level() -> log::LevelFilter {
    SETTINGS
        .read()
        .ok()
        .and_then(|s| log::LevelFilter::from_str(&s.log_level).ok())
        .unwrap_or(log::LevelFilter::Info)
}

#[must_use]
pub fn zoom_limits() -> ZoomLimits {
    SETTINGS
        .read()
        .map(|s| ZoomLimits {
            zoom_in_rate: s.zoom_in_rate,
            zoom_out_rate: s.zoom_out_rate,
            min_scale: s.min_scale,
            max_scale: s.max_scale,
        })
        .unwrap_or_default()
}

#[must_use]
pub fn service_config() -> ServiceConfig {
    SETTINGS
        .read()
        .map(|s| ServiceConfig {
            workers: s.render_workers,
            cache_size: s.cache_size,
            prefetch_radius: s.prefetch_radius,
        })
        .unwrap_or_default()
}
