//! Configuration for the study companion.
//!
//! Two layers: the application [`Config`] lives in a TOML file next to other
//! user configuration, and the per-user [`StudyConfig`] lives in the store
//! alongside the rest of the study state.

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::chunker::TextChunkMode;
use crate::storage::{self, KeyValueStore, StoreKind, STUDY_CONFIG_KEY};

/// Application configuration that persists between sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// The currently selected theme name.
    #[serde(default = "default_theme")]
    pub theme: String,

    #[serde(default)]
    pub store: StoreKind,

    /// Overrides the platform data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Start a break automatically after a full study session.
    #[serde(default = "default_true")]
    pub auto_break: bool,

    #[serde(default = "default_break_minutes")]
    pub break_minutes: u32,

    #[serde(default = "default_weekly_goal")]
    pub weekly_goal_minutes: u32,
}

fn default_theme() -> String {
    "default".to_string()
}

fn default_true() -> bool {
    true
}

fn default_break_minutes() -> u32 {
    5
}

fn default_weekly_goal() -> u32 {
    300
}

impl Default for Config {
    fn default() -> Self {
        Self {
            theme: default_theme(),
            store: StoreKind::default(),
            data_dir: None,
            auto_break: true,
            break_minutes: default_break_minutes(),
            weekly_goal_minutes: default_weekly_goal(),
        }
    }
}

impl Config {
    /// Get the default config file path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("studious")
            .join("config.toml")
    }

    /// Load config from disk, returning default if file doesn't exist.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| "Failed to parse config file")?;

        Ok(config)
    }

    /// Save config to disk.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self)
            .with_context(|| "Failed to serialize config")?;

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(storage::default_data_dir)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum VideoChunkMode {
    #[default]
    Equal,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRange {
    pub start: u32,
    /// Last page; `None` means the end of the document.
    pub end: Option<u32>,
}

impl Default for PageRange {
    fn default() -> Self {
        Self { start: 1, end: None }
    }
}

/// Study preferences kept in the store under `studyConfig`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StudyConfig {
    pub version: u32,
    pub study_goal: String,
    /// Advisory only.
    pub study_mode: String,
    /// Advisory only.
    pub difficulty: String,
    pub page_range: PageRange,
    pub chunk_count: usize,
    pub video_chunk_mode: VideoChunkMode,
    pub manual_timestamps: String,
    pub text_chunk_mode: TextChunkMode,
    /// Words per minute.
    pub reading_speed: u32,
    pub break_reminders: bool,
    pub progress_notifications: bool,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            version: 1,
            study_goal: String::new(),
            study_mode: "focus".to_string(),
            difficulty: "easy".to_string(),
            page_range: PageRange::default(),
            chunk_count: 4,
            video_chunk_mode: VideoChunkMode::Equal,
            manual_timestamps: String::new(),
            text_chunk_mode: TextChunkMode::Paragraph,
            reading_speed: 250,
            break_reminders: true,
            progress_notifications: true,
        }
    }
}

impl StudyConfig {
    pub fn load(store: &dyn KeyValueStore) -> Self {
        let mut config: Self = storage::load(store, STUDY_CONFIG_KEY).unwrap_or_default();
        config.chunk_count = config.chunk_count.max(1);
        config
    }

    pub fn save(&self, store: &dyn KeyValueStore) {
        storage::save(store, STUDY_CONFIG_KEY, self);
    }

    /// Resolve the configured page range against a document's page count.
    pub fn pages_for(&self, total_pages: u32) -> (u32, u32) {
        let start = self.page_range.start.max(1);
        let end = self.page_range.end.unwrap_or(total_pages).min(total_pages);
        (start, end)
    }
}
