//! Binding strings to logical actions.
//!
//! A binding is a `KeyboardEvent.key` name (`Tab`, `Enter`, `Escape`), a
//! single character (matched case-insensitively, so Caps Lock does not
//! matter), or `Space`. A `Shift+` prefix requires the shift modifier;
//! without it the modifier is ignored.

#![allow(missing_docs)]

use std::fmt;

use crate::core::config::KeyBindingsConfig;

/// Physical key event as a host reports it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyEvent {
    /// `KeyboardEvent.key`.
    pub key: String,
    /// `KeyboardEvent.code`, when known.
    pub code: Option<String>,
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl KeyEvent {
    #[must_use]
    pub fn key(key: &str) -> Self {
        Self {
            key: key.to_string(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn shifted(key: &str) -> Self {
        Self {
            shift: true,
            ..Self::key(key)
        }
    }

    /// Parse the CLI notation: `Tab`, `Shift+Tab`, `Ctrl+d`, `Space`.
    #[must_use]
    pub fn parse(spec: &str) -> Self {
        let mut event = Self::default();
        let mut rest = spec.trim();
        while let Some((modifier, tail)) = rest.split_once('+') {
            if tail.is_empty() {
                break;
            }
            match modifier.to_ascii_lowercase().as_str() {
                "shift" => event.shift = true,
                "ctrl" | "control" => event.ctrl = true,
                "alt" => event.alt = true,
                "meta" | "cmd" => event.meta = true,
                _ => break,
            }
            rest = tail;
        }
        if rest.eq_ignore_ascii_case("space") {
            event.key = " ".to_string();
            event.code = Some("Space".to_string());
        } else {
            event.key = rest.to_string();
        }
        event
    }

    /// Ctrl, Alt or Meta held: browser and OS shortcuts, never routed.
    #[must_use]
    pub const fn has_command_modifier(&self) -> bool {
        self.ctrl || self.alt || self.meta
    }
}

impl fmt::Display for KeyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (held, name) in [
            (self.ctrl, "Ctrl+"),
            (self.alt, "Alt+"),
            (self.meta, "Meta+"),
            (self.shift, "Shift+"),
        ] {
            if held {
                f.write_str(name)?;
            }
        }
        if self.key == " " {
            f.write_str("Space")
        } else {
            f.write_str(&self.key)
        }
    }
}

/// Logical actions a key can map to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Forward,
    Backward,
    /// Enter/Space on the focused candidate: accept, let the browser activate it.
    Confirm,
    /// Click the selected candidate programmatically.
    ClickConfirm,
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum KeyName {
    Space,
    Char(String),
    Named(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBinding {
    name: KeyName,
    shift: bool,
}

impl KeyBinding {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let (shift, key) = match trimmed.split_once('+') {
            Some((modifier, key)) if modifier.eq_ignore_ascii_case("shift") && !key.is_empty() => {
                (true, key)
            }
            _ => (false, trimmed),
        };
        let name = if key == " " || key.eq_ignore_ascii_case("space") {
            KeyName::Space
        } else if key.chars().count() == 1 {
            KeyName::Char(key.to_lowercase())
        } else {
            KeyName::Named(key.to_ascii_lowercase())
        };
        Self { name, shift }
    }

    #[must_use]
    pub fn matches(&self, event: &KeyEvent) -> bool {
        if self.shift && !event.shift {
            return false;
        }
        match &self.name {
            KeyName::Space => {
                event.key == " " || event.key == "Spacebar" || event.code.as_deref() == Some("Space")
            }
            KeyName::Char(c) => event.key.chars().count() == 1 && event.key.to_lowercase() == *c,
            KeyName::Named(name) => event.key.eq_ignore_ascii_case(name),
        }
    }
}

/// Parsed binding table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBindings {
    forward: Vec<KeyBinding>,
    backward: Vec<KeyBinding>,
    confirm: Vec<KeyBinding>,
    click_confirm: Vec<KeyBinding>,
    cancel: Vec<KeyBinding>,
}

impl KeyBindings {
    #[must_use]
    pub fn from_config(config: &KeyBindingsConfig) -> Self {
        let parse = |list: &[String]| list.iter().map(|b| KeyBinding::parse(b)).collect();
        Self {
            forward: parse(&config.forward),
            backward: parse(&config.backward),
            confirm: parse(&config.confirm),
            click_confirm: parse(&config.click_confirm),
            cancel: parse(&config.cancel),
        }
    }

    /// Logical action for `event`. Backward is tried before forward so that
    /// `Shift+Tab` wins over a plain `Tab` binding.
    #[must_use]
    pub fn classify(&self, event: &KeyEvent) -> Option<KeyAction> {
        if event.has_command_modifier() {
            return None;
        }
        [
            (&self.backward, KeyAction::Backward),
            (&self.forward, KeyAction::Forward),
            (&self.confirm, KeyAction::Confirm),
            (&self.click_confirm, KeyAction::ClickConfirm),
            (&self.cancel, KeyAction::Cancel),
        ]
        .into_iter()
        .find(|(bindings, _)| bindings.iter().any(|b| b.matches(event)))
        .map(|(_, action)| action)
    }
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self::from_config(&KeyBindingsConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table() {
        let k = KeyBindings::default();
        assert_eq!(k.classify(&KeyEvent::key("Tab")), Some(KeyAction::Forward));
        assert_eq!(k.classify(&KeyEvent::shifted("Tab")), Some(KeyAction::Backward));
        assert_eq!(k.classify(&KeyEvent::key("d")), Some(KeyAction::Forward));
        assert_eq!(k.classify(&KeyEvent::key("S")), Some(KeyAction::Backward));
        assert_eq!(k.classify(&KeyEvent::key("Enter")), Some(KeyAction::Confirm));
        assert_eq!(k.classify(&KeyEvent::key(" ")), Some(KeyAction::Confirm));
        assert_eq!(k.classify(&KeyEvent::key("Spacebar")), Some(KeyAction::Confirm));
        assert_eq!(k.classify(&KeyEvent::key("W")), Some(KeyAction::ClickConfirm));
        assert_eq!(k.classify(&KeyEvent::key("Escape")), Some(KeyAction::Cancel));
        assert_eq!(k.classify(&KeyEvent::key("a")), Some(KeyAction::Cancel));
        assert_eq!(k.classify(&KeyEvent::key("x")), None);
    }

    #[test]
    fn second_layout_characters() {
        let k = KeyBindings::default();
        assert_eq!(k.classify(&KeyEvent::key("в")), Some(KeyAction::Forward));
        assert_eq!(k.classify(&KeyEvent::key("Ы")), Some(KeyAction::Backward));
        assert_eq!(k.classify(&KeyEvent::key("ц")), Some(KeyAction::ClickConfirm));
        assert_eq!(k.classify(&KeyEvent::key("Ф")), Some(KeyAction::Cancel));
    }

    #[test]
    fn command_modifiers_are_never_routed() {
        let k = KeyBindings::default();
        let mut ctrl_d = KeyEvent::key("d");
        ctrl_d.ctrl = true;
        assert_eq!(k.classify(&ctrl_d), None);
        let mut meta_tab = KeyEvent::key("Tab");
        meta_tab.meta = true;
        assert_eq!(k.classify(&meta_tab), None);
    }

    #[test]
    fn space_matches_by_code() {
        let binding = KeyBinding::parse("Space");
        let event = KeyEvent {
            key: "Unidentified".to_string(),
            code: Some("Space".to_string()),
            ..KeyEvent::default()
        };
        assert!(binding.matches(&event));
    }

    #[test]
    fn parse_cli_notation() {
        let e = KeyEvent::parse("Shift+Tab");
        assert!(e.shift);
        assert_eq!(e.key, "Tab");
        let e = KeyEvent::parse("Ctrl+Alt+d");
        assert!(e.ctrl && e.alt);
        assert_eq!(e.key, "d");
        let e = KeyEvent::parse("space");
        assert_eq!(e.key, " ");
        assert_eq!(e.to_string(), "Space");
        let e = KeyEvent::parse("+");
        assert_eq!(e.key, "+");
    }
}
