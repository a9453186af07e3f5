use crate::display::{parse_hex_color, Palette, TableStyle};
use crate::ticker::DEFAULT_INTERVAL_MS;
use anyhow::{Context, Result};
use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A validation error in the configuration
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]: {}", self.field, self.message)
    }
}

/// Refresh cadence
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct TickConfig {
    #[serde(default)]
    pub interval_ms: Option<u64>,
}

/// Per-state background colors as `#RRGGBB`
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ColorsConfig {
    #[serde(default)]
    pub waiting: Option<String>,
    #[serde(default)]
    pub active: Option<String>,
    #[serde(default)]
    pub expired: Option<String>,
    #[serde(default)]
    pub free: Option<String>,
}

impl ColorsConfig {
    fn entries(&self) -> [(&'static str, &Option<String>); 4] {
        [
            ("waiting", &self.waiting),
            ("active", &self.active),
            ("expired", &self.expired),
            ("free", &self.free),
        ]
    }
}

/// Table rendering options
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct DisplayConfig {
    #[serde(default)]
    pub color: Option<bool>,
    #[serde(default)]
    pub timestamp_format: Option<String>,
    #[serde(default)]
    pub title_format: Option<String>,
    #[serde(default)]
    pub colors: ColorsConfig,
}

/// JSONL event log
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct EventsConfig {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub records_file: Option<PathBuf>,
    #[serde(default)]
    pub tick: TickConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub events: EventsConfig,
}

impl Config {
    /// Load configuration from default paths
    /// Priority: local (.countboard/config.local.toml) > project
    /// (.countboard/config.toml) > user (~/.countboard/config.toml)
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".countboard").join("config.toml");
            if user_config.exists() {
                config.merge(Self::load_from(&user_config)?);
            }
        }

        let project_config = Path::new(".countboard").join("config.toml");
        if project_config.exists() {
            config.merge(Self::load_from(&project_config)?);
        }

        // Should be gitignored
        let local_config = Path::new(".countboard").join("config.local.toml");
        if local_config.exists() {
            config.merge(Self::load_from(&local_config)?);
        }

        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        Ok(config)
    }

    /// Merge another config into this one; values set in `other` win
    pub fn merge(&mut self, other: Config) {
        fn take<T>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }

        take(&mut self.records_file, other.records_file);
        take(&mut self.tick.interval_ms, other.tick.interval_ms);
        take(&mut self.display.color, other.display.color);
        take(
            &mut self.display.timestamp_format,
            other.display.timestamp_format,
        );
        take(&mut self.display.title_format, other.display.title_format);

        let colors = other.display.colors;
        take(&mut self.display.colors.waiting, colors.waiting);
        take(&mut self.display.colors.active, colors.active);
        take(&mut self.display.colors.expired, colors.expired);
        take(&mut self.display.colors.free, colors.free);

        take(&mut self.events.enabled, other.events.enabled);
        take(&mut self.events.dir, other.events.dir);
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick.interval_ms.unwrap_or(DEFAULT_INTERVAL_MS))
    }

    pub fn color_enabled(&self) -> bool {
        self.display.color.unwrap_or(true)
    }

    pub fn table_style(&self) -> TableStyle {
        let mut style = TableStyle::default();
        if let Some(fmt) = &self.display.timestamp_format {
            style.timestamp_format = fmt.clone();
        }
        if let Some(fmt) = &self.display.title_format {
            style.title_format = fmt.clone();
        }
        style
    }

    /// Palette with configured overrides; `None` when color is off.
    /// Unparseable colors keep the default (`validate` reports them).
    pub fn palette(&self) -> Option<Palette> {
        if !self.color_enabled() {
            return None;
        }
        let mut palette = Palette::default();
        let colors = &self.display.colors;
        let slots = [
            (&mut palette.waiting, &colors.waiting),
            (&mut palette.active, &colors.active),
            (&mut palette.expired, &colors.expired),
            (&mut palette.free, &colors.free),
        ];
        for (slot, value) in slots {
            if let Some(color) = value.as_deref().and_then(|v| parse_hex_color(v).ok()) {
                *slot = color;
            }
        }
        Some(palette)
    }

    pub fn events_enabled(&self) -> bool {
        self.events.enabled.unwrap_or(false)
    }

    pub fn events_dir(&self) -> PathBuf {
        self.events
            .dir
            .clone()
            .unwrap_or_else(|| Path::new(".countboard").join("events"))
    }

    /// Validate configuration and return any errors found
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.tick.interval_ms == Some(0) {
            errors.push(ValidationError {
                field: "tick.interval_ms".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }

        let formats = [
            ("display.timestamp_format", &self.display.timestamp_format),
            ("display.title_format", &self.display.title_format),
        ];
        for (field, fmt) in formats {
            if let Some(fmt) = fmt {
                if !is_valid_strftime(fmt) {
                    errors.push(ValidationError {
                        field: field.to_string(),
                        message: format!("Invalid strftime format '{}'", fmt),
                    });
                }
            }
        }

        for (name, value) in self.display.colors.entries() {
            if let Some(value) = value {
                if let Err(e) = parse_hex_color(value) {
                    errors.push(ValidationError {
                        field: format!("display.colors.{}", name),
                        message: e.to_string(),
                    });
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn is_valid_strftime(fmt: &str) -> bool {
    !StrftimeItems::new(fmt).any(|item| matches!(item, Item::Error))
}
