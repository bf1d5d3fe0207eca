//! Highlight color: palette, validation, and the persisted preference.

#![allow(missing_docs)]

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::errors::{Result, SmartNavError};
use crate::stats::backend::KeyValueStore;

/// Colors offered by the picker.
pub const PALETTE: [&str; 9] = [
    "#f472b6", "#10b981", "#e8b4a5", "#d7a7b8", "#e4c28d", "#c9d6a3", "#ec4899", "#fda4af",
    "#fb7185",
];

pub const DEFAULT_COLOR: &str = "#10b981";

/// Validated `#rrggbb` color, stored lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ColorToken(String);

impl ColorToken {
    #[must_use]
    pub fn rgb(&self) -> (u8, u8, u8) {
        let channel = |i: usize| u8::from_str_radix(&self.0[i..i + 2], 16).unwrap_or(0);
        (channel(1), channel(3), channel(5))
    }

    /// CSS `rgba(...)` form, for glows drawn at partial opacity.
    #[must_use]
    pub fn rgba(&self, alpha: f64) -> String {
        let (r, g, b) = self.rgb();
        format!("rgba({r}, {g}, {b}, {})", alpha.clamp(0.0, 1.0))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn in_palette(&self) -> bool {
        PALETTE.contains(&self.0.as_str())
    }
}

impl Default for ColorToken {
    fn default() -> Self {
        Self(DEFAULT_COLOR.to_string())
    }
}

impl FromStr for ColorToken {
    type Err = SmartNavError;

    fn from_str(raw: &str) -> Result<Self> {
        let s = raw.trim();
        let valid = s.len() == 7
            && s.starts_with('#')
            && s[1..].chars().all(|c| c.is_ascii_hexdigit());
        if valid {
            Ok(Self(s.to_ascii_lowercase()))
        } else {
            Err(SmartNavError::InvalidConfig {
                details: format!("color {raw:?} is not a #rrggbb hex value"),
            })
        }
    }
}

impl TryFrom<String> for ColorToken {
    type Error = SmartNavError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ColorToken> for String {
    fn from(value: ColorToken) -> Self {
        value.0
    }
}

impl fmt::Display for ColorToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The user's color choice under its own storage key.
#[derive(Debug, Clone)]
pub struct ColorPreference {
    key: String,
}

impl ColorPreference {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    /// Saved color, or the default when missing, invalid, or unreadable.
    pub fn load(&self, store: &dyn KeyValueStore) -> ColorToken {
        match store.get(&self.key) {
            Ok(Some(Value::String(raw))) => raw.parse().unwrap_or_default(),
            _ => ColorToken::default(),
        }
    }

    pub fn save(&self, store: &dyn KeyValueStore, color: &ColorToken) -> Result<()> {
        store.set(&self.key, Value::String(color.to_string()))
    }
}
