//! Configuration system: TOML file + env var overrides + tuned defaults.
//!
//! Every detector threshold and score weight lives here as a default. The
//! values were tuned by hand against real pages and have no derivation beyond
//! that; change them through config, not in code.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, SmartNavError};
use crate::core::paths;
use crate::detector::candidate::{SyntheticAction, SyntheticEntry};
use crate::dom::NodeQuery;

/// Full smartnav configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub detector: DetectorConfig,
    pub scoring: ScoringConfig,
    pub navigator: NavigatorConfig,
    pub stats: StatsConfig,
    pub keys: KeyBindingsConfig,
    pub paths: PathsConfig,
}

/// Candidate collection and filtering.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DetectorConfig {
    pub max_candidates: usize,
    /// Both box dimensions must reach this size.
    pub min_size_px: f64,
    pub native_selector: String,
    pub native_cap: usize,
    pub role_selector: String,
    pub role_cap: usize,
    /// Class/id heuristics for the third collection tier.
    pub tag_selectors: Vec<String>,
    /// Cap applied per heuristic selector.
    pub heuristic_cap: usize,
    /// Class/id substrings that mark a heuristic match as button-like.
    pub button_markers: Vec<String>,
    /// Action verbs that mark a heuristic match as button-like.
    pub text_hint_keywords: Vec<String>,
    pub synthetic_tail: Vec<SyntheticEntry>,
}

/// Prominence score weights.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScoringConfig {
    pub area_divisor: f64,
    pub position_bonus: f64,
    /// Top edge must be strictly greater than this (px).
    pub position_min_top_px: f64,
    /// Top edge must be strictly less than this fraction of viewport height.
    pub position_max_viewport_fraction: f64,
    pub accent_bonus: f64,
    pub accent_keywords: Vec<String>,
    pub button_bonus: f64,
    pub button_keywords: Vec<String>,
    pub tabindex_primary_bonus: f64,
    pub tabindex_bonus: f64,
    /// Style refinement (z-index, opacity) runs only above this running total.
    pub refinement_gate: f64,
    pub z_index_divisor: f64,
}

/// Selection state machine timing and overlay identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NavigatorConfig {
    /// Quiet period after the last relevant mutation before re-detecting.
    pub refresh_debounce_ms: u64,
    /// Delay before re-detecting after landing on a real candidate.
    pub post_select_refresh_ms: u64,
    /// Delay before the first detection pass after start.
    pub initial_detect_delay_ms: u64,
    /// Periodic re-detection while active; disabled when absent.
    pub periodic_refresh_ms: Option<u64>,
    /// Close an idle interaction after this long; disabled when absent.
    pub auto_close_ms: Option<u64>,
    /// Elements whose id starts with this prefix belong to the overlay.
    pub overlay_id_prefix: String,
}

/// Usage statistics persistence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StatsConfig {
    pub flush_debounce_ms: u64,
    pub storage_key: String,
    pub color_key: String,
    pub element_key_max_chars: usize,
}

/// Logical key bindings. Entries use `KeyboardEvent.key` names; a `Shift+`
/// prefix requires the shift modifier, `Space` matches the space bar.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct KeyBindingsConfig {
    pub forward: Vec<String>,
    pub backward: Vec<String>,
    pub confirm: Vec<String>,
    pub click_confirm: Vec<String>,
    pub cancel: Vec<String>,
}

/// Filesystem paths used by the CLI host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
    pub storage_file: PathBuf,
    pub activity_log: PathBuf,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            max_candidates: 15,
            min_size_px: 20.0,
            native_selector: "button".to_string(),
            native_cap: 100,
            role_selector: r#"[role="button"]"#.to_string(),
            role_cap: 200,
            tag_selectors: [
                r#"a[role="button"]"#,
                r#"[class*="T-I"]"#,
                r#"[class*="button"]"#,
                r#"[class*="Button"]"#,
                r#"[id*="button"]"#,
                r#"[id*="Button"]"#,
            ]
            .map(String::from)
            .to_vec(),
            heuristic_cap: 50,
            button_markers: ["button", "btn", "t-i"].map(String::from).to_vec(),
            text_hint_keywords: [
                "send", "submit", "save", "cancel", "delete", "edit", "add", "create", "update",
                "confirm", "ok", "close", "next", "previous", "back", "forward",
            ]
            .map(String::from)
            .to_vec(),
            synthetic_tail: vec![SyntheticEntry::other()],
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            area_divisor: 100.0,
            position_bonus: 50.0,
            position_min_top_px: 50.0,
            position_max_viewport_fraction: 0.7,
            accent_bonus: 150.0,
            accent_keywords: ["t-i-atl", "accent", "primary", "highlight"]
                .map(String::from)
                .to_vec(),
            button_bonus: 30.0,
            button_keywords: ["t-i", "button"].map(String::from).to_vec(),
            tabindex_primary_bonus: 50.0,
            tabindex_bonus: 20.0,
            refinement_gate: 50.0,
            z_index_divisor: 10.0,
        }
    }
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self {
            refresh_debounce_ms: 500,
            post_select_refresh_ms: 300,
            initial_detect_delay_ms: 1_000,
            periodic_refresh_ms: None,
            auto_close_ms: None,
            overlay_id_prefix: "smartnav-".to_string(),
        }
    }
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            flush_debounce_ms: 500,
            storage_key: "tabtabgo_stats".to_string(),
            color_key: "smarttabColor".to_string(),
            element_key_max_chars: 100,
        }
    }
}

impl Default for KeyBindingsConfig {
    fn default() -> Self {
        // Cyrillic entries are the same physical keys on a ЙЦУКЕН layout.
        Self {
            forward: ["Tab", "d", "в"].map(String::from).to_vec(),
            backward: ["Shift+Tab", "s", "ы"].map(String::from).to_vec(),
            confirm: ["Enter", "Space"].map(String::from).to_vec(),
            click_confirm: ["w", "ц"].map(String::from).to_vec(),
            cancel: ["Escape", "a", "ф"].map(String::from).to_vec(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let data = paths::data_dir();
        Self {
            config_file: paths::config_dir().join("config.toml"),
            storage_file: data.join("storage.json"),
            activity_log: data.join("activity.jsonl"),
        }
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathsConfig::default().config_file
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| SmartNavError::Io {
                path: path_buf.clone(),
                source,
            })?;
            let parsed: Self = toml::from_str(&raw)?;
            parsed
        } else if is_explicit_path {
            return Err(SmartNavError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides_from(env_var)?;
        cfg.normalize();
        cfg.paths.storage_file = paths::resolve_absolute_path(&cfg.paths.storage_file);
        cfg.paths.activity_log = paths::resolve_absolute_path(&cfg.paths.activity_log);
        cfg.validate()?;
        Ok(cfg)
    }

    /// Deterministic hash of the effective config for logging.
    ///
    /// FNV-1a over the canonical JSON form, stable across processes.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    /// Render the effective config as TOML.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut get = |name: &str| lookup(name);

        // detector
        set_usize(&mut get, "SMARTNAV_DETECTOR_MAX_CANDIDATES", &mut self.detector.max_candidates)?;
        set_f64(&mut get, "SMARTNAV_DETECTOR_MIN_SIZE_PX", &mut self.detector.min_size_px)?;
        set_usize(&mut get, "SMARTNAV_DETECTOR_NATIVE_CAP", &mut self.detector.native_cap)?;
        set_usize(&mut get, "SMARTNAV_DETECTOR_ROLE_CAP", &mut self.detector.role_cap)?;
        set_usize(&mut get, "SMARTNAV_DETECTOR_HEURISTIC_CAP", &mut self.detector.heuristic_cap)?;

        // scoring
        set_f64(&mut get, "SMARTNAV_SCORING_AREA_DIVISOR", &mut self.scoring.area_divisor)?;
        set_f64(&mut get, "SMARTNAV_SCORING_POSITION_BONUS", &mut self.scoring.position_bonus)?;
        set_f64(&mut get, "SMARTNAV_SCORING_ACCENT_BONUS", &mut self.scoring.accent_bonus)?;
        set_f64(&mut get, "SMARTNAV_SCORING_BUTTON_BONUS", &mut self.scoring.button_bonus)?;
        set_f64(
            &mut get,
            "SMARTNAV_SCORING_REFINEMENT_GATE",
            &mut self.scoring.refinement_gate,
        )?;

        // navigator
        set_u64(
            &mut get,
            "SMARTNAV_NAVIGATOR_REFRESH_DEBOUNCE_MS",
            &mut self.navigator.refresh_debounce_ms,
        )?;
        set_u64(
            &mut get,
            "SMARTNAV_NAVIGATOR_POST_SELECT_REFRESH_MS",
            &mut self.navigator.post_select_refresh_ms,
        )?;
        set_optional_ms(
            &mut get,
            "SMARTNAV_NAVIGATOR_PERIODIC_REFRESH_MS",
            &mut self.navigator.periodic_refresh_ms,
        )?;
        set_optional_ms(
            &mut get,
            "SMARTNAV_NAVIGATOR_AUTO_CLOSE_MS",
            &mut self.navigator.auto_close_ms,
        )?;

        // stats
        set_u64(
            &mut get,
            "SMARTNAV_STATS_FLUSH_DEBOUNCE_MS",
            &mut self.stats.flush_debounce_ms,
        )?;
        if let Some(raw) = get("SMARTNAV_STATS_STORAGE_KEY") {
            self.stats.storage_key = raw;
        }

        // paths
        if let Some(raw) = get("SMARTNAV_STORAGE_FILE") {
            self.paths.storage_file = PathBuf::from(raw);
        }
        if let Some(raw) = get("SMARTNAV_ACTIVITY_LOG") {
            self.paths.activity_log = PathBuf::from(raw);
        }

        Ok(())
    }

    /// Lowercase keyword lists so matching is case-insensitive.
    fn normalize(&mut self) {
        for list in [
            &mut self.detector.button_markers,
            &mut self.detector.text_hint_keywords,
            &mut self.scoring.accent_keywords,
            &mut self.scoring.button_keywords,
        ] {
            for keyword in list.iter_mut() {
                *keyword = keyword.trim().to_lowercase();
            }
            list.retain(|k| !k.is_empty());
        }
    }

    pub fn validate(&self) -> Result<()> {
        let d = &self.detector;
        if d.max_candidates == 0 {
            return invalid("detector.max_candidates must be >= 1".to_string());
        }
        if !(d.min_size_px >= 0.0) {
            return invalid(format!(
                "detector.min_size_px must be >= 0, got {}",
                d.min_size_px
            ));
        }
        if d.native_cap == 0 || d.role_cap == 0 || d.heuristic_cap == 0 {
            return invalid("detector tier caps must be >= 1".to_string());
        }
        NodeQuery::parse(&d.native_selector)?;
        NodeQuery::parse(&d.role_selector)?;
        for selector in &d.tag_selectors {
            NodeQuery::parse(selector)?;
        }
        if d.synthetic_tail.is_empty() {
            return invalid("detector.synthetic_tail must contain at least one entry".to_string());
        }
        if d.synthetic_tail.iter().any(|e| e.label.trim().is_empty()) {
            return invalid("detector.synthetic_tail labels must not be empty".to_string());
        }
        for entry in &d.synthetic_tail {
            if let SyntheticAction::OpenUrl { url } = &entry.action {
                url::Url::parse(url).map_err(|e| SmartNavError::InvalidUrl {
                    url: url.clone(),
                    details: e.to_string(),
                })?;
            }
        }

        let s = &self.scoring;
        if !(s.area_divisor > 0.0) || !(s.z_index_divisor > 0.0) {
            return invalid("scoring divisors must be > 0".to_string());
        }
        if !(s.position_max_viewport_fraction > 0.0 && s.position_max_viewport_fraction <= 1.0) {
            return invalid(format!(
                "scoring.position_max_viewport_fraction must be in (0, 1], got {}",
                s.position_max_viewport_fraction
            ));
        }
        for (name, value) in [
            ("position_bonus", s.position_bonus),
            ("accent_bonus", s.accent_bonus),
            ("button_bonus", s.button_bonus),
            ("tabindex_primary_bonus", s.tabindex_primary_bonus),
            ("tabindex_bonus", s.tabindex_bonus),
        ] {
            if !(value >= 0.0) {
                return invalid(format!("scoring.{name} must be >= 0, got {value}"));
            }
        }

        if self.stats.storage_key.trim().is_empty() || self.stats.color_key.trim().is_empty() {
            return invalid("stats storage keys must not be empty".to_string());
        }
        if self.stats.storage_key == self.stats.color_key {
            return invalid("stats.storage_key and stats.color_key must differ".to_string());
        }
        if self.stats.element_key_max_chars == 0 {
            return invalid("stats.element_key_max_chars must be >= 1".to_string());
        }
        if self.navigator.overlay_id_prefix.is_empty() {
            return invalid("navigator.overlay_id_prefix must not be empty".to_string());
        }

        self.validate_bindings()
    }

    fn validate_bindings(&self) -> Result<()> {
        let k = &self.keys;
        let mut seen: Vec<(&str, String)> = Vec::new();
        for (action, list) in [
            ("forward", &k.forward),
            ("backward", &k.backward),
            ("confirm", &k.confirm),
            ("click_confirm", &k.click_confirm),
            ("cancel", &k.cancel),
        ] {
            for binding in list {
                let normalized = binding.trim().to_lowercase();
                if normalized.is_empty() {
                    return invalid(format!("keys.{action} contains an empty binding"));
                }
                if let Some((other, _)) = seen.iter().find(|(_, b)| *b == normalized) {
                    return invalid(format!(
                        "key binding {binding:?} is bound to both {other} and {action}"
                    ));
                }
                seen.push((action, normalized));
            }
        }
        Ok(())
    }
}

fn invalid(details: String) -> Result<()> {
    Err(SmartNavError::InvalidConfig { details })
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env<T>(name: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|error| SmartNavError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}

fn set_f64(get: &mut impl FnMut(&str) -> Option<String>, name: &str, slot: &mut f64) -> Result<()> {
    if let Some(raw) = get(name) {
        *slot = parse_env(name, &raw)?;
    }
    Ok(())
}

fn set_u64(get: &mut impl FnMut(&str) -> Option<String>, name: &str, slot: &mut u64) -> Result<()> {
    if let Some(raw) = get(name) {
        *slot = parse_env(name, &raw)?;
    }
    Ok(())
}

fn set_usize(
    get: &mut impl FnMut(&str) -> Option<String>,
    name: &str,
    slot: &mut usize,
) -> Result<()> {
    if let Some(raw) = get(name) {
        *slot = parse_env(name, &raw)?;
    }
    Ok(())
}

/// `0` disables an optional interval.
fn set_optional_ms(
    get: &mut impl FnMut(&str) -> Option<String>,
    name: &str,
    slot: &mut Option<u64>,
) -> Result<()> {
    if let Some(raw) = get(name) {
        let ms: u64 = parse_env(name, &raw)?;
        *slot = (ms > 0).then_some(ms);
    }
    Ok(())
}
