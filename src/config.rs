use crate::events::AppEvent;
use crate::gesture::Thresholds;
use crate::scene::morph::Timing;
use async_channel::Sender;
use derive_more::{AsRef, Deref, Display, From, Into};
use directories::ProjectDirs;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, Deref, From, Into, AsRef,
)]
#[serde(transparent)]
pub struct PhotoUrl(String);

crate::impl_string_newtype!(PhotoUrl);

#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, Deref, From, Into, AsRef,
)]
#[serde(transparent)]
pub struct ModelAsset(String);

crate::impl_string_newtype!(ModelAsset);

pub const DEFAULT_MODEL: &str = "https://storage.googleapis.com/mediapipe-models/hand_landmarker/hand_landmarker/float16/1/hand_landmarker.task";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MotionConfig {
    pub timing: Timing,
    pub particle_rate: f32,
    pub ornament_rate: f32,
    pub emblem_rate: f32,
    pub card_rate: f32,
    pub card_turn_rate: f32,
    pub tree_return_rate: f32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            timing: Timing::default(),
            particle_rate: 2.5,
            ornament_rate: 2.5,
            emblem_rate: 2.0,
            card_rate: 5.0,
            card_turn_rate: 4.0,
            tree_return_rate: 1.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CarouselConfig {
    /// Velocity multiplier applied once per 60 Hz frame.
    pub friction: f32,
    pub swipe_gain: f32,
    pub drift_threshold: f32,
    pub drift_speed: f32,
    pub radius: f32,
}

impl Default for CarouselConfig {
    fn default() -> Self {
        Self {
            friction: 0.92,
            swipe_gain: 40.0,
            drift_threshold: 0.001,
            drift_speed: 0.05,
            radius: 7.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub width: u32,
    pub height: u32,
    pub model: ModelAsset,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            model: ModelAsset::new(DEFAULT_MODEL),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub render_hz: u32,
    pub detect_hz: u32,
    pub socket: PathBuf,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            render_hz: 60,
            detect_hz: 30,
            socket: PathBuf::from("/tmp/tinsel.sock"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub gesture: Thresholds,
    pub motion: MotionConfig,
    pub carousel: CarouselConfig,
    pub capture: CaptureConfig,
    pub runtime: RuntimeConfig,
    /// Fixed seed for the particle layout; random when unset.
    pub seed: Option<u64>,
    pub cards: Vec<PhotoUrl>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gesture: Thresholds::default(),
            motion: MotionConfig::default(),
            carousel: CarouselConfig::default(),
            capture: CaptureConfig::default(),
            runtime: RuntimeConfig::default(),
            seed: None,
            cards: default_cards(),
        }
    }
}

pub fn default_cards() -> Vec<PhotoUrl> {
    [10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 28]
        .iter()
        .map(|id| PhotoUrl::new(format!("https://picsum.photos/id/{id}/500/500")))
        .collect()
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to determine config directory")]
    ConfigDirNotFound,
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
}

pub fn get_config_path() -> Result<PathBuf, ConfigError> {
    let proj_dirs =
        ProjectDirs::from("org", "tinsel", "tinsel").ok_or(ConfigError::ConfigDirNotFound)?;
    Ok(proj_dirs.config_dir().join("config.toml"))
}

pub fn load_config() -> Result<Config, ConfigError> {
    let config_path = get_config_path()?;
    load_from(config_path)
}

pub fn load_from(path: PathBuf) -> Result<Config, ConfigError> {
    let s = config::Config::builder()
        .add_source(config::File::from(path).required(false))
        .add_source(
            config::Environment::with_prefix("TINSEL")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    let mut config: Config = s.try_deserialize()?;
    if config.cards.is_empty() {
        config.cards = default_cards();
    }
    Ok(config)
}

pub fn load_or_default() -> Config {
    match load_config() {
        Ok(c) => c,
        Err(e) => {
            log::error!("Failed to load config, using defaults: {}", e);
            Config::default()
        }
    }
}

pub fn write_default_config() -> std::io::Result<PathBuf> {
    let path =
        get_config_path().map_err(|e| std::io::Error::new(std::io::ErrorKind::NotFound, e))?;
    if let Some(parent) = path.parent() {
        fs_err::create_dir_all(parent)?;
    }
    if path.exists() {
        log::debug!("Keeping existing config at {}", path.display());
    } else {
        fs_err::write(&path, DEFAULT_CONFIG)?;
        log::info!("Wrote default tinsel config to {}", path.display());
    }
    Ok(path)
}

const DEFAULT_CONFIG: &str = include_str!("default_config.toml");

/// Whether a watcher event touches the config file itself rather than a sibling.
fn touches_config(event: &Event, config_path: &Path) -> bool {
    matches!(
        event.kind,
        EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
    ) && event.paths.iter().any(|p| p == config_path)
}

pub async fn run_async_watcher(tx: Sender<AppEvent>) {
    let config_path = match get_config_path() {
        Ok(p) => p,
        Err(e) => {
            log::error!("Config watcher error: {}", e);
            return;
        }
    };
    let config_dir = match config_path.parent() {
        Some(p) => p.to_path_buf(),
        None => return,
    };

    if let Err(e) = fs_err::create_dir_all(&config_dir) {
        log::error!("Failed to create config directory for watching: {}", e);
        return;
    }

    let (bridge_tx, bridge_rx) = async_channel::unbounded();

    let mut watcher = match RecommendedWatcher::new(
        move |res| {
            let _ = bridge_tx.send_blocking(res);
        },
        notify::Config::default(),
    ) {
        Ok(w) => w,
        Err(e) => {
            log::error!("Failed to create watcher: {}", e);
            return;
        }
    };

    if let Err(e) = watcher.watch(&config_dir, RecursiveMode::NonRecursive) {
        log::error!("Failed to watch config directory: {}", e);
        return;
    }
    log::debug!("Watching {} for tunable changes", config_path.display());

    while let Ok(res) = bridge_rx.recv().await {
        match res {
            Ok(event) => {
                if !touches_config(&event, &config_path) {
                    continue;
                }

                log::debug!("Config {} changed ({:?})", config_path.display(), event.kind);
                if tx.send(AppEvent::ConfigReload).await.is_err() {
                    break;
                }
            }
            Err(e) => log::error!("Watch error: {}", e),
        }
    }
}
