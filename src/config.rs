use crate::layout::{FocusSide, LayoutOptions};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub layout: LayoutSection,
    #[serde(default)]
    pub panel: PanelSection,
}

/// [layout] section configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutSection {
    /// Which comparison surface takes focus after a selection: "left" or
    /// "right"
    #[serde(default = "default_focus")]
    pub focus: String,
    /// Upper bound on the blocking content fetch in `set_current_file`
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
}

/// [panel] section configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelSection {
    #[serde(default = "default_panel_width")]
    pub width: u16,
}

fn default_focus() -> String {
    "right".to_string()
}

fn default_fetch_timeout_ms() -> u64 {
    1500
}

fn default_panel_width() -> u16 {
    40
}

impl Default for LayoutSection {
    fn default() -> Self {
        Self {
            focus: default_focus(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
        }
    }
}

impl Default for PanelSection {
    fn default() -> Self {
        Self {
            width: default_panel_width(),
        }
    }
}

impl SessionConfig {
    /// Translate the file-level settings into layout knobs. An unrecognized
    /// focus value falls back to the default rather than failing the load.
    pub fn layout_options(&self) -> LayoutOptions {
        let focus = match self.layout.focus.as_str() {
            "left" => FocusSide::Left,
            _ => FocusSide::Right,
        };
        LayoutOptions {
            focus,
            panel_width: self.panel.width,
            fetch_timeout: Duration::from_millis(self.layout.fetch_timeout_ms),
        }
    }
}

/// Load config by merging global defaults with per-repo overrides.
/// Priority: per-repo `.prsession.toml` > global `~/.config/prsession/config.toml` > built-in defaults.
/// Merging is deep: individual fields within sections (e.g. `[layout]`) override independently.
pub fn load_config(repo_root: &str) -> SessionConfig {
    let global_path = dirs::config_dir().map(|d| d.join("prsession/config.toml"));
    let local_path = Path::new(repo_root).join(".prsession.toml");
    load_from(global_path.as_deref(), &local_path)
}

fn load_from(global_path: Option<&Path>, local_path: &Path) -> SessionConfig {
    let global_table = global_path
        .and_then(|p| std::fs::read_to_string(p).ok())
        .and_then(|c| c.parse::<toml::Value>().ok())
        .and_then(|v| match v {
            toml::Value::Table(t) => Some(t),
            _ => None,
        });

    let local_table = std::fs::read_to_string(local_path)
        .ok()
        .and_then(|c| c.parse::<toml::Value>().ok())
        .and_then(|v| match v {
            toml::Value::Table(t) => Some(t),
            _ => None,
        });

    let merged = match (global_table, local_table) {
        (Some(mut global), Some(local)) => {
            deep_merge(&mut global, local);
            toml::Value::Table(global)
        }
        (Some(global), None) => toml::Value::Table(global),
        (None, Some(local)) => toml::Value::Table(local),
        (None, None) => return SessionConfig::default(),
    };

    merged.try_into().unwrap_or_default()
}

/// Recursively merge `overlay` into `base`. Overlay values win; nested tables are merged recursively.
fn deep_merge(
    base: &mut toml::map::Map<String, toml::Value>,
    overlay: toml::map::Map<String, toml::Value>,
) {
    for (key, value) in overlay {
        match (base.get_mut(&key), &value) {
            (Some(toml::Value::Table(base_table)), toml::Value::Table(overlay_table)) => {
                deep_merge(base_table, overlay_table.clone());
            }
            _ => {
                base.insert(key, value);
            }
        }
    }
}
