use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use directories::ProjectDirs;
use std::fs;
use tiny_skia::Color;
use crate::error::Result;

pub const APP_NAME: &str = "quickrun";

#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub list: ListConfig,
    #[serde(default)]
    pub activation: ActivationConfig,
    #[serde(default)]
    pub theme: ThemeConfig,
    #[serde(default = "default_modules")]
    pub modules: Vec<ModuleConfig>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct GeneralConfig {
    #[serde(default)]
    pub terminal: Option<String>,
    /// Keep the window open after every activation.
    #[serde(default)]
    pub keep_open: bool,
    #[serde(default)]
    pub ignore_mouse: bool,
    #[serde(default)]
    pub placeholder: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct SearchConfig {
    /// Characters required after a module prefix before that module runs.
    #[serde(default = "default_min_prefix_len")]
    pub min_prefix_len: usize,
    #[serde(default)]
    pub max_results: Option<usize>,
}

fn default_min_prefix_len() -> usize { 2 }

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            min_prefix_len: default_min_prefix_len(),
            max_results: None,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ListConfig {
    /// Render the list area even when there is nothing to show.
    #[serde(default)]
    pub always_show: bool,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ActivationConfig {
    #[serde(default)]
    pub disabled: bool,
    #[serde(default = "default_activation_keys")]
    pub keys: Vec<String>,
}

fn default_activation_keys() -> Vec<String> {
    ["j", "k", "l", ";", "a", "s", "d", "f"].iter().map(|k| k.to_string()).collect()
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self {
            disabled: false,
            keys: default_activation_keys(),
        }
    }
}

impl ActivationConfig {
    /// Key labels in effect; empty when quick activation is turned off.
    pub fn effective_keys(&self) -> Vec<String> {
        if self.disabled { Vec::new() } else { self.keys.clone() }
    }
}

/// One `[[modules]]` block.
///
/// Everything besides the shared keys lands in `options` and is decoded by
/// the module that owns the block.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct ModuleConfig {
    pub name: String,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub switcher_exclusive: bool,
    #[serde(default)]
    pub disabled: bool,
    #[serde(flatten)]
    pub options: toml::Table,
}

impl ModuleConfig {
    pub fn new(name: &str, prefix: &str) -> Self {
        Self {
            name: name.to_string(),
            prefix: prefix.to_string(),
            ..Default::default()
        }
    }

    /// Decodes the provider-specific keys, falling back to defaults when they
    /// do not fit `T`.
    pub fn options<T>(&self) -> T
    where
        T: for<'de> Deserialize<'de> + Default,
    {
        match toml::Value::Table(self.options.clone()).try_into() {
            Ok(options) => options,
            Err(e) => {
                log::warn!("Module '{}': ignoring invalid options: {}", self.name, e);
                T::default()
            }
        }
    }
}

fn default_modules() -> Vec<ModuleConfig> {
    vec![
        ModuleConfig::new("applications", ""),
        ModuleConfig::new("runner", "!"),
        ModuleConfig::new("finder", "~"),
        ModuleConfig::new("websearch", "?"),
        ModuleConfig::new("switcher", "/"),
    ]
}

/// Per-class styling, the stand-in for stylesheet rules keyed by class.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct ClassStyle {
    pub accent: Option<String>,
    pub background: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ThemeConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_padding")]
    pub padding: f32,
    #[serde(default = "default_spacing")]
    pub spacing: f32,
    #[serde(default = "default_border_radius")]
    pub border_radius: f32,
    #[serde(default = "default_icon_size")]
    pub icon_size: u32,
    #[serde(default = "default_background")]
    pub background: String,
    #[serde(default = "default_border_color")]
    pub border_color: String,
    #[serde(default = "default_text")]
    pub text: String,
    #[serde(default = "default_sub_text")]
    pub sub_text: String,
    #[serde(default = "default_selection_background")]
    pub selection_background: String,
    #[serde(default = "default_selection_text")]
    pub selection_text: String,
    #[serde(default = "default_label_color")]
    pub label_color: String,
    #[serde(default)]
    pub classes: HashMap<String, ClassStyle>,
}

fn default_width() -> u32 { 600 }
fn default_height() -> u32 { 420 }
fn default_padding() -> f32 { 20.0 }
fn default_spacing() -> f32 { 10.0 }
fn default_border_radius() -> f32 { 12.0 }
fn default_icon_size() -> u32 { 24 }
fn default_background() -> String { "1e1e1eff".to_string() }
fn default_border_color() -> String { "3c3c50ff".to_string() }
fn default_text() -> String { "c8c8c8ff".to_string() }
fn default_sub_text() -> String { "8a8a8aff".to_string() }
fn default_selection_background() -> String { "3c3c50ff".to_string() }
fn default_selection_text() -> String { "ffffffff".to_string() }
fn default_label_color() -> String { "646464ff".to_string() }

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            padding: default_padding(),
            spacing: default_spacing(),
            border_radius: default_border_radius(),
            icon_size: default_icon_size(),
            background: default_background(),
            border_color: default_border_color(),
            text: default_text(),
            sub_text: default_sub_text(),
            selection_background: default_selection_background(),
            selection_text: default_selection_text(),
            label_color: default_label_color(),
            classes: HashMap::new(),
        }
    }
}

impl ThemeConfig {
    pub fn parse_color(hex: &str) -> Color {
        let hex = hex.trim_start_matches('#');
        if hex.len() != 8 || !hex.is_ascii() {
            return Color::BLACK;
        }
        let r = u8::from_str_radix(&hex[0..2], 16).unwrap_or(0);
        let g = u8::from_str_radix(&hex[2..4], 16).unwrap_or(0);
        let b = u8::from_str_radix(&hex[4..6], 16).unwrap_or(0);
        let a = u8::from_str_radix(&hex[6..8], 16).unwrap_or(255);

        Color::from_rgba8(r, g, b, a)
    }

    /// Style registered for `class`, if any.
    pub fn class_style(&self, class: &str) -> Option<&ClassStyle> {
        self.classes.get(class)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            search: SearchConfig::default(),
            list: ListConfig::default(),
            activation: ActivationConfig::default(),
            theme: ThemeConfig::default(),
            modules: default_modules(),
        }
    }
}

impl Config {
    /// Configuration block for `name`.
    ///
    /// `None` means the block is absent; a present block may still be marked
    /// `disabled`, which callers must check separately.
    pub fn module(&self, name: &str) -> Option<&ModuleConfig> {
        self.modules.iter().find(|m| m.name == name)
    }

    /// Names of the enabled module blocks, in configured order.
    pub fn enabled_modules(&self) -> impl Iterator<Item = &str> {
        self.modules.iter().filter(|m| !m.disabled).map(|m| m.name.as_str())
    }
}

pub fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", APP_NAME, APP_NAME)
}

pub fn default_config_path() -> PathBuf {
    match project_dirs() {
        Some(dirs) => dirs.config_dir().join("config.toml"),
        None => PathBuf::from("config.toml"),
    }
}

pub fn parse_config(content: &str) -> Result<Config> {
    Ok(toml::from_str(content)?)
}

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let config_path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);

    if !config_path.exists() {
        log::debug!("No config at {:?}, using defaults", config_path);
        return Ok(Config::default());
    }

    let content = fs::read_to_string(&config_path)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.search.min_prefix_len, 2);
        assert_eq!(config.activation.keys.len(), 8);
        assert!(!config.list.always_show);
        let names: Vec<_> = config.enabled_modules().collect();
        assert_eq!(names, ["applications", "runner", "finder", "websearch", "switcher"]);
    }

    #[test]
    fn module_blocks_keep_order_and_collect_options() {
        let config = parse_config(
            r#"
            [[modules]]
            name = "websearch"
            prefix = "g "
            engine = "https://duckduckgo.com/?q="

            [[modules]]
            name = "finder"
            disabled = true
            "#,
        )
        .unwrap();

        let names: Vec<_> = config.modules.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["websearch", "finder"]);

        let web = config.module("websearch").unwrap();
        assert_eq!(web.prefix, "g ");
        assert_eq!(
            web.options.get("engine").and_then(|v| v.as_str()),
            Some("https://duckduckgo.com/?q=")
        );

        assert!(config.module("finder").unwrap().disabled);
        assert!(config.module("applications").is_none());
        assert_eq!(config.enabled_modules().collect::<Vec<_>>(), ["websearch"]);
    }

    #[test]
    fn disabled_activation_has_no_keys() {
        let config = parse_config("[activation]\ndisabled = true\n").unwrap();
        assert!(config.activation.effective_keys().is_empty());
    }

    #[test]
    fn parse_color_handles_hash_and_bad_input() {
        assert_eq!(ThemeConfig::parse_color("#ff000080"), Color::from_rgba8(255, 0, 0, 128));
        assert_eq!(ThemeConfig::parse_color("fff"), Color::BLACK);
    }

    #[test]
    fn parse_color_rejects_multibyte_text() {
        assert_eq!("aébbccd".len(), 8);
        assert_eq!(ThemeConfig::parse_color("#aébbccd"), Color::BLACK);
        assert_eq!(ThemeConfig::parse_color("éééé"), Color::BLACK);
    }

    #[test]
    fn load_config_reads_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[list]\nalways_show = true\n").unwrap();
        assert!(load_config(Some(&path)).unwrap().list.always_show);

        let missing = dir.path().join("nope.toml");
        assert!(!load_config(Some(&missing)).unwrap().list.always_show);
    }
}
