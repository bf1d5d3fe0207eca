//! Minimal selector language for element collection.
//!
//! Grammar (a strict subset of CSS):
//!
//! ```text
//! selector  := tag? ( '[' name ( op value )? ']' )?
//! op        := '=' | '*='
//! value     := '"' chars '"' | '\'' chars '\'' | bare
//! ```
//!
//! At least one of the tag or the attribute clause must be present. Tag
//! matching is case-insensitive; attribute values match case-sensitively, as
//! CSS does.

#![allow(missing_docs)]

use std::fmt;
use std::str::FromStr;

use crate::core::errors::{Result, SmartNavError};

/// How an attribute clause matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrMatch {
    /// `[name]`
    Present,
    /// `[name="value"]`
    Equals(String),
    /// `[name*="value"]`
    Contains(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrClause {
    pub name: String,
    pub matcher: AttrMatch,
}

impl AttrClause {
    /// Test an attribute value (None when the attribute is absent).
    #[must_use]
    pub fn matches(&self, value: Option<&str>) -> bool {
        match (&self.matcher, value) {
            (_, None) => false,
            (AttrMatch::Present, Some(_)) => true,
            (AttrMatch::Equals(expected), Some(actual)) => actual == expected,
            (AttrMatch::Contains(needle), Some(actual)) => actual.contains(needle.as_str()),
        }
    }
}

/// A parsed element query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeQuery {
    /// Lowercase tag name, if constrained.
    pub tag: Option<String>,
    pub attribute: Option<AttrClause>,
}

impl NodeQuery {
    #[must_use]
    pub fn tag(tag: &str) -> Self {
        Self {
            tag: Some(tag.to_ascii_lowercase()),
            attribute: None,
        }
    }

    #[must_use]
    pub fn attribute_equals(name: &str, value: &str) -> Self {
        Self {
            tag: None,
            attribute: Some(AttrClause {
                name: name.to_string(),
                matcher: AttrMatch::Equals(value.to_string()),
            }),
        }
    }

    /// Match against an element's tag and an attribute lookup.
    pub fn matches<'a>(&self, tag: &str, attr: impl Fn(&str) -> Option<&'a str>) -> bool {
        if let Some(expected) = &self.tag
            && !tag.eq_ignore_ascii_case(expected)
        {
            return false;
        }
        match &self.attribute {
            Some(clause) => clause.matches(attr(&clause.name)),
            None => true,
        }
    }

    /// Parse a selector string.
    pub fn parse(input: &str) -> Result<Self> {
        let source = input.trim();
        let fail = |details: &str| SmartNavError::InvalidSelector {
            selector: input.to_string(),
            details: details.to_string(),
        };

        let (tag_part, attr_part) = match source.find('[') {
            Some(idx) => (&source[..idx], Some(&source[idx..])),
            None => (source, None),
        };

        let tag = if tag_part.is_empty() {
            None
        } else if tag_part.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            Some(tag_part.to_ascii_lowercase())
        } else {
            return Err(fail("tag names may only contain letters, digits and '-'"));
        };

        let attribute = match attr_part {
            None => None,
            Some(raw) => {
                let inner = raw
                    .strip_prefix('[')
                    .and_then(|rest| rest.strip_suffix(']'))
                    .ok_or_else(|| fail("attribute clause must be closed with ']'"))?;
                Some(parse_clause(inner).map_err(|details| fail(&details))?)
            }
        };

        if tag.is_none() && attribute.is_none() {
            return Err(fail("empty selector"));
        }
        Ok(Self { tag, attribute })
    }
}

fn parse_clause(inner: &str) -> std::result::Result<AttrClause, String> {
    let (name, matcher) = if let Some(idx) = inner.find("*=") {
        let value = unquote(&inner[idx + 2..])?;
        (&inner[..idx], AttrMatch::Contains(value))
    } else if let Some(idx) = inner.find('=') {
        let value = unquote(&inner[idx + 1..])?;
        (&inner[..idx], AttrMatch::Equals(value))
    } else {
        (inner, AttrMatch::Present)
    };

    let name = name.trim();
    if name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(format!("invalid attribute name {name:?}"));
    }
    Ok(AttrClause {
        name: name.to_ascii_lowercase(),
        matcher,
    })
}

fn unquote(raw: &str) -> std::result::Result<String, String> {
    let raw = raw.trim();
    for quote in ['"', '\''] {
        if let Some(rest) = raw.strip_prefix(quote) {
            return rest
                .strip_suffix(quote)
                .map(str::to_string)
                .ok_or_else(|| "unterminated quoted value".to_string());
        }
    }
    if raw.is_empty() || raw.contains(['"', '\'', ' ', ']']) {
        return Err(format!("invalid unquoted value {raw:?}"));
    }
    Ok(raw.to_string())
}

impl FromStr for NodeQuery {
    type Err = SmartNavError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for NodeQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(tag) = &self.tag {
            write!(f, "{tag}")?;
        }
        if let Some(clause) = &self.attribute {
            match &clause.matcher {
                AttrMatch::Present => write!(f, "[{}]", clause.name)?,
                AttrMatch::Equals(v) => write!(f, "[{}=\"{v}\"]", clause.name)?,
                AttrMatch::Contains(v) => write!(f, "[{}*=\"{v}\"]", clause.name)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_tag() {
        let q = NodeQuery::parse("BUTTON").unwrap();
        assert_eq!(q.tag.as_deref(), Some("button"));
        assert!(q.attribute.is_none());
    }

    #[test]
    fn parses_role_equality() {
        let q = NodeQuery::parse(r#"[role="button"]"#).unwrap();
        assert_eq!(q.tag, None);
        assert_eq!(
            q.attribute,
            Some(AttrClause {
                name: "role".to_string(),
                matcher: AttrMatch::Equals("button".to_string()),
            })
        );
    }

    #[test]
    fn parses_tag_with_substring_clause() {
        let q = NodeQuery::parse("a[class*='Button']").unwrap();
        assert_eq!(q.tag.as_deref(), Some("a"));
        assert_eq!(
            q.attribute.unwrap().matcher,
            AttrMatch::Contains("Button".to_string())
        );
    }

    #[test]
    fn parses_presence_clause() {
        let q = NodeQuery::parse("[tabindex]").unwrap();
        assert_eq!(q.attribute.unwrap().matcher, AttrMatch::Present);
    }

    #[test]
    fn rejects_malformed_selectors() {
        for bad in ["", "[role=\"button\"", "div.primary", "[=x]", "[role=\"x]"] {
            let err = NodeQuery::parse(bad).unwrap_err();
            assert_eq!(err.code(), "SNV-1101", "{bad:?} should be rejected");
        }
    }

    #[test]
    fn substring_match_is_case_sensitive() {
        let q = NodeQuery::parse(r#"[class*="button"]"#).unwrap();
        assert!(q.matches("div", |_| Some("primary-button")));
        assert!(!q.matches("div", |_| Some("PrimaryButton")));
        assert!(!q.matches("div", |_| None));
    }

    #[test]
    fn tag_match_is_case_insensitive() {
        let q = NodeQuery::tag("button");
        assert!(q.matches("BUTTON", |_| None));
        assert!(!q.matches("div", |_| None));
    }

    #[test]
    fn display_is_reparseable() {
        for src in ["button", r#"a[role="button"]"#, r#"[id*="btn"]"#, "[tabindex]"] {
            let q = NodeQuery::parse(src).unwrap();
            assert_eq!(NodeQuery::parse(&q.to_string()).unwrap(), q);
        }
    }
}
