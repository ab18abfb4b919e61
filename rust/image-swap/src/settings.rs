//! The user configuration snapshot and its stored representation.
//!
//! Settings are persisted as loosely typed JSON values (see
//! [`crate::SettingsStore`]). Reading is lenient: missing keys take their
//! defaults, values of the wrong shape are replaced by defaults, and legacy
//! flat-string URL patterns are read as `{ pattern, mode: "default" }`.
//! Nothing read from a store is ever rejected outright.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::DEFAULT_CUSTOM_CSS;

/// The keys a [`Settings`] snapshot is spread across in a settings store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingsKey {
    /// Global on/off switch
    Enabled,
    /// CSS selectors exempt from replacement
    Whitelist,
    /// Per-site activation patterns
    UrlPatterns,
    /// Global replacement trigger
    ReplacementMode,
    /// Stylesheet injected into every page
    CustomCss,
}

impl SettingsKey {
    /// Every key, in the order they are read.
    pub const ALL: [SettingsKey; 5] = [
        SettingsKey::Enabled,
        SettingsKey::Whitelist,
        SettingsKey::UrlPatterns,
        SettingsKey::ReplacementMode,
        SettingsKey::CustomCss,
    ];

    /// The name the value is stored under.
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingsKey::Enabled => "enabled",
            SettingsKey::Whitelist => "whitelist",
            SettingsKey::UrlPatterns => "urlPatterns",
            SettingsKey::ReplacementMode => "replacementMode",
            SettingsKey::CustomCss => "customCss",
        }
    }
}

impl std::fmt::Display for SettingsKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// When an image is replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplacementMode {
    /// Replace every image immediately
    #[default]
    All,
    /// Replace an image only once it has failed to load
    Failed,
}

impl ReplacementMode {
    fn from_stored(value: Option<&Value>) -> Self {
        match value.and_then(Value::as_str) {
            Some("failed") => ReplacementMode::Failed,
            Some("all") | None => ReplacementMode::All,
            Some(other) => {
                tracing::warn!(mode = other, "Unknown replacement mode, using 'all'");
                ReplacementMode::All
            }
        }
    }
}

/// The replacement trigger a URL pattern imposes on the sites it matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternMode {
    /// Defer to the global [`ReplacementMode`]
    #[default]
    Default,
    /// Force [`ReplacementMode::All`]
    All,
    /// Force [`ReplacementMode::Failed`]
    Failed,
}

impl PatternMode {
    /// The mode this pattern forces, if any.
    pub fn replacement_mode(&self) -> Option<ReplacementMode> {
        match self {
            PatternMode::Default => None,
            PatternMode::All => Some(ReplacementMode::All),
            PatternMode::Failed => Some(ReplacementMode::Failed),
        }
    }

    fn parse(value: Option<&str>) -> Self {
        match value {
            Some("all") => PatternMode::All,
            Some("failed") => PatternMode::Failed,
            _ => PatternMode::Default,
        }
    }
}

/// A single per-site URL pattern.
///
/// Two entries are duplicates when their `pattern` strings are equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredPatternEntry")]
pub struct PatternEntry {
    /// Glob over the full page URL; `*` matches anything, `.` is literal
    pub pattern: String,
    /// Replacement trigger override for matching pages
    pub mode: PatternMode,
    /// Disabled entries never activate a page
    pub enabled: bool,
}

impl PatternEntry {
    /// A new enabled entry that defers to the global mode.
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            mode: PatternMode::Default,
            enabled: true,
        }
    }

    /// Returns this entry with the given mode.
    pub fn with_mode(mut self, mode: PatternMode) -> Self {
        self.mode = mode;
        self
    }

    /// Returns this entry with the given enabled flag.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredPatternEntry {
    Legacy(String),
    Entry {
        pattern: String,
        #[serde(default)]
        mode: Option<String>,
        #[serde(default)]
        enabled: Option<bool>,
    },
}

impl From<StoredPatternEntry> for PatternEntry {
    fn from(value: StoredPatternEntry) -> Self {
        match value {
            StoredPatternEntry::Legacy(pattern) => PatternEntry::new(pattern),
            StoredPatternEntry::Entry {
                pattern,
                mode,
                enabled,
            } => PatternEntry {
                pattern,
                mode: PatternMode::parse(mode.as_deref()),
                enabled: enabled.unwrap_or(true),
            },
        }
    }
}

/// An immutable snapshot of the user configuration.
///
/// The engine never reads a store directly; it is handed a snapshot and
/// keeps using it until a new one is applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Global on/off switch
    pub enabled: bool,
    /// CSS selectors whose matching images are never replaced
    pub whitelist: Vec<String>,
    /// Per-site patterns, in stored order
    pub url_patterns: Vec<PatternEntry>,
    /// Replacement trigger for pages no pattern overrides
    pub replacement_mode: ReplacementMode,
    /// Stylesheet injected into each page
    pub custom_css: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            whitelist: Vec::new(),
            url_patterns: Vec::new(),
            replacement_mode: ReplacementMode::All,
            custom_css: DEFAULT_CUSTOM_CSS.to_owned(),
        }
    }
}

impl Settings {
    /// Build a snapshot from raw stored values, normalizing anything that is
    /// missing, malformed or in a legacy shape.
    pub fn from_stored(values: &Map<String, Value>) -> Self {
        let enabled = match values.get(SettingsKey::Enabled.as_str()) {
            Some(Value::Bool(enabled)) => *enabled,
            None | Some(Value::Null) => true,
            Some(other) => {
                tracing::warn!(value = %other, "Ignoring non-boolean 'enabled' setting");
                true
            }
        };

        let whitelist = match values.get(SettingsKey::Whitelist.as_str()) {
            Some(Value::Array(entries)) => entries
                .iter()
                .filter_map(|entry| match entry {
                    Value::String(selector) => Some(selector.clone()),
                    other => {
                        tracing::warn!(value = %other, "Dropping non-string whitelist entry");
                        None
                    }
                })
                .collect(),
            _ => Vec::new(),
        };

        let url_patterns = match values.get(SettingsKey::UrlPatterns.as_str()) {
            Some(Value::Array(entries)) => entries
                .iter()
                .filter_map(
                    |entry| match serde_json::from_value::<PatternEntry>(entry.clone()) {
                        Ok(entry) => Some(entry),
                        Err(error) => {
                            tracing::warn!(value = %entry, %error, "Dropping malformed URL pattern");
                            None
                        }
                    },
                )
                .collect(),
            _ => Vec::new(),
        };

        let replacement_mode =
            ReplacementMode::from_stored(values.get(SettingsKey::ReplacementMode.as_str()));

        let custom_css = match values.get(SettingsKey::CustomCss.as_str()) {
            Some(Value::String(css)) if !css.is_empty() => css.clone(),
            _ => DEFAULT_CUSTOM_CSS.to_owned(),
        };

        Self {
            enabled,
            whitelist,
            url_patterns,
            replacement_mode,
            custom_css,
        }
    }

    /// The stored representation of this snapshot, one value per key.
    pub fn to_stored(&self) -> Map<String, Value> {
        let mut values = Map::new();
        values.insert(SettingsKey::Enabled.to_string(), Value::Bool(self.enabled));
        values.insert(
            SettingsKey::Whitelist.to_string(),
            Value::from(self.whitelist.clone()),
        );
        values.insert(
            SettingsKey::UrlPatterns.to_string(),
            serde_json::to_value(&self.url_patterns).unwrap_or_else(|_| Value::Array(Vec::new())),
        );
        values.insert(
            SettingsKey::ReplacementMode.to_string(),
            serde_json::to_value(self.replacement_mode)
                .unwrap_or_else(|_| Value::String("all".into())),
        );
        values.insert(
            SettingsKey::CustomCss.to_string(),
            Value::String(self.custom_css.clone()),
        );
        values
    }

    /// Add a whitelist selector. Blank and duplicate selectors are ignored.
    ///
    /// Returns `true` if the whitelist changed.
    pub fn add_whitelist_entry(&mut self, selector: &str) -> bool {
        let selector = selector.trim();
        if selector.is_empty() || self.whitelist.iter().any(|entry| entry == selector) {
            return false;
        }
        self.whitelist.push(selector.to_owned());
        true
    }

    /// Remove the whitelist selector at `index`, if there is one.
    pub fn remove_whitelist_entry(&mut self, index: usize) -> Option<String> {
        (index < self.whitelist.len()).then(|| self.whitelist.remove(index))
    }

    /// Append a URL pattern that defers to the global mode. Blank patterns
    /// and patterns already present are ignored.
    ///
    /// Returns `true` if the pattern list changed.
    pub fn add_url_pattern(&mut self, pattern: &str) -> bool {
        let pattern = pattern.trim();
        if pattern.is_empty()
            || self
                .url_patterns
                .iter()
                .any(|entry| entry.pattern == pattern)
        {
            return false;
        }
        self.url_patterns.push(PatternEntry::new(pattern));
        true
    }

    /// Remove the URL pattern at `index`, if there is one.
    pub fn remove_url_pattern(&mut self, index: usize) -> Option<PatternEntry> {
        (index < self.url_patterns.len()).then(|| self.url_patterns.remove(index))
    }

    /// Change the mode of the URL pattern at `index`.
    pub fn set_pattern_mode(&mut self, index: usize, mode: PatternMode) -> bool {
        match self.url_patterns.get_mut(index) {
            Some(entry) => {
                entry.mode = mode;
                true
            }
            None => false,
        }
    }

    /// Enable or disable the URL pattern at `index`.
    pub fn set_pattern_enabled(&mut self, index: usize, enabled: bool) -> bool {
        match self.url_patterns.get_mut(index) {
            Some(entry) => {
                entry.enabled = enabled;
                true
            }
            None => false,
        }
    }
}
