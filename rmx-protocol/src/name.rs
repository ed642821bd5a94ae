//! Object names and name patterns
//!
//! An object name addresses one management object as
//! `domain:key1=value1,key2=value2`. The domain and the property values may
//! carry `*` and `?` wildcards, and a trailing `,*` turns the key property
//! list into a pattern that tolerates additional keys. Quoted values
//! (`key="a,b:c"`) may contain the separators.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use glob::Pattern;
use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, ProtocolResult};

/// Characters a key may never contain
const ILLEGAL_KEY_CHARS: &[char] = &[':', ',', '=', '*', '?', '"', '\n'];

/// Characters an unquoted value may never contain
const ILLEGAL_VALUE_CHARS: &[char] = &['=', ':', '"', '\n'];

/// Identifier of a management object, or a pattern over such identifiers
///
/// Equality, ordering and hashing are structural: the key properties are
/// kept sorted by key, so `a:x=1,y=2` and `a:y=2,x=1` are the same name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectName {
    domain: String,
    properties: BTreeMap<String, String>,
    property_list_pattern: bool,
}

impl ObjectName {
    /// Parse a name from its string form
    ///
    /// The empty string is accepted and means "every name" (`*:*`).
    pub fn parse(name: &str) -> ProtocolResult<Self> {
        if name.is_empty() {
            return Ok(Self::wildcard());
        }

        let (domain, list) = name
            .split_once(':')
            .ok_or_else(|| ProtocolError::malformed(name, "missing ':' after the domain"))?;

        if domain.is_empty() {
            return Err(ProtocolError::malformed(name, "domain must not be empty"));
        }
        if domain.contains('\n') {
            return Err(ProtocolError::malformed(name, "domain contains a newline"));
        }
        if list.is_empty() {
            return Err(ProtocolError::malformed(name, "key property list must not be empty"));
        }

        let (properties, property_list_pattern) = parse_key_properties(name, list)?;

        Ok(Self {
            domain: domain.to_string(),
            properties,
            property_list_pattern,
        })
    }

    /// Build a name from a domain and explicit key properties
    pub fn new<I, K, V>(domain: &str, properties: I) -> ProtocolResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let list: Vec<String> = properties
            .into_iter()
            .map(|(k, v)| format!("{}={}", k.as_ref(), v.as_ref()))
            .collect();
        Self::parse(&format!("{}:{}", domain, list.join(",")))
    }

    /// The pattern matching every name (`*:*`)
    pub fn wildcard() -> Self {
        Self {
            domain: "*".to_string(),
            properties: BTreeMap::new(),
            property_list_pattern: true,
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Key properties, sorted by key. Values keep their written form
    /// (quoted values include the quotes).
    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    pub fn key_property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn is_domain_pattern(&self) -> bool {
        self.domain.contains(['*', '?'])
    }

    pub fn is_property_list_pattern(&self) -> bool {
        self.property_list_pattern
    }

    pub fn is_property_value_pattern(&self) -> bool {
        self.properties.values().any(|v| is_value_pattern(v))
    }

    pub fn is_pattern(&self) -> bool {
        self.is_domain_pattern() || self.property_list_pattern || self.is_property_value_pattern()
    }

    /// Key properties in canonical (key-sorted) order, without the `,*` marker
    pub fn canonical_key_property_list(&self) -> String {
        self.properties
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Deterministic string form that parses back to an equal name
    pub fn canonical_string(&self) -> String {
        let props = self.canonical_key_property_list();
        let mut out = String::with_capacity(self.domain.len() + props.len() + 3);
        out.push_str(&self.domain);
        out.push(':');
        out.push_str(&props);
        if self.property_list_pattern {
            if props.is_empty() {
                out.push('*');
            } else {
                out.push_str(",*");
            }
        }
        out
    }

    /// Test whether `name` is selected by this name used as a pattern
    ///
    /// A pattern never matches another pattern. Without `,*` the key sets
    /// must be identical; with it the name may carry extra keys.
    pub fn apply(&self, name: &ObjectName) -> bool {
        if name.is_pattern() {
            return false;
        }

        let domain_matches = if self.is_domain_pattern() {
            glob_match(&self.domain, &name.domain)
        } else {
            self.domain == name.domain
        };
        if !domain_matches {
            return false;
        }

        if !self.property_list_pattern && self.properties.len() != name.properties.len() {
            return false;
        }

        self.properties.iter().all(|(key, expected)| {
            match name.properties.get(key) {
                Some(actual) if is_value_pattern(expected) => glob_match(expected, actual),
                Some(actual) => expected == actual,
                None => false,
            }
        })
    }

    /// Test whether this name is selected by `pattern`
    pub fn matches(&self, pattern: &ObjectName) -> bool {
        pattern.apply(self)
    }
}

impl Default for ObjectName {
    fn default() -> Self {
        Self::wildcard()
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical_string())
    }
}

impl FromStr for ObjectName {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ObjectName {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for ObjectName {
    type Error = ProtocolError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<ObjectName> for String {
    fn from(name: ObjectName) -> Self {
        name.canonical_string()
    }
}

fn parse_key_properties(
    name: &str,
    list: &str,
) -> ProtocolResult<(BTreeMap<String, String>, bool)> {
    let chars: Vec<char> = list.chars().collect();
    let len = chars.len();
    let mut pos = 0;
    let mut properties = BTreeMap::new();
    let mut list_pattern = false;

    loop {
        if chars[pos] == '*' && (pos + 1 == len || chars[pos + 1] == ',') {
            if list_pattern {
                return Err(ProtocolError::malformed(name, "'*' appears more than once"));
            }
            list_pattern = true;
            pos += 1;
        } else {
            let key_start = pos;
            while pos < len && chars[pos] != '=' && chars[pos] != ',' {
                pos += 1;
            }
            let key: String = chars[key_start..pos].iter().collect();
            if pos >= len || chars[pos] != '=' {
                return Err(ProtocolError::malformed(
                    name,
                    format!("key '{}' has no value", key),
                ));
            }
            if key.is_empty() {
                return Err(ProtocolError::malformed(name, "empty key"));
            }
            if key.contains(ILLEGAL_KEY_CHARS) {
                return Err(ProtocolError::malformed(
                    name,
                    format!("invalid character in key '{}'", key),
                ));
            }
            pos += 1;

            let value = if pos < len && chars[pos] == '"' {
                read_quoted(name, &chars, &mut pos)?
            } else {
                read_unquoted(name, &chars, &mut pos)?
            };

            if properties.insert(key.clone(), value).is_some() {
                return Err(ProtocolError::malformed(
                    name,
                    format!("duplicate key '{}'", key),
                ));
            }
        }

        if pos == len {
            break;
        }
        if chars[pos] != ',' {
            return Err(ProtocolError::malformed(
                name,
                format!("unexpected '{}' after a key property", chars[pos]),
            ));
        }
        pos += 1;
        if pos == len {
            return Err(ProtocolError::malformed(name, "trailing ','"));
        }
    }

    Ok((properties, list_pattern))
}

fn read_quoted(name: &str, chars: &[char], pos: &mut usize) -> ProtocolResult<String> {
    let mut value = String::from('"');
    *pos += 1;
    loop {
        let Some(&c) = chars.get(*pos) else {
            return Err(ProtocolError::malformed(name, "unterminated quoted value"));
        };
        match c {
            '\\' => {
                let Some(&next) = chars.get(*pos + 1) else {
                    return Err(ProtocolError::malformed(name, "unterminated quoted value"));
                };
                if !matches!(next, '"' | '\\' | '*' | '?' | 'n') {
                    return Err(ProtocolError::malformed(
                        name,
                        format!("invalid escape '\\{}' in quoted value", next),
                    ));
                }
                value.push(c);
                value.push(next);
                *pos += 2;
            }
            '"' => {
                value.push(c);
                *pos += 1;
                return Ok(value);
            }
            '\n' => {
                return Err(ProtocolError::malformed(name, "newline in quoted value"));
            }
            _ => {
                value.push(c);
                *pos += 1;
            }
        }
    }
}

fn read_unquoted(name: &str, chars: &[char], pos: &mut usize) -> ProtocolResult<String> {
    let mut value = String::new();
    while *pos < chars.len() && chars[*pos] != ',' {
        let c = chars[*pos];
        if ILLEGAL_VALUE_CHARS.contains(&c) {
            return Err(ProtocolError::malformed(
                name,
                format!("invalid character '{}' in unquoted value", c),
            ));
        }
        value.push(c);
        *pos += 1;
    }
    if value.is_empty() {
        return Err(ProtocolError::malformed(name, "empty value"));
    }
    Ok(value)
}

/// A value is a pattern if it holds an unescaped `*` or `?`
fn is_value_pattern(value: &str) -> bool {
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '*' | '?' => return true,
            _ => {}
        }
    }
    false
}

/// Glob match with `*` and `?` as the only wildcards
///
/// Backslash escapes stay literal on both sides, since quoted values keep
/// their written form.
fn glob_match(pattern: &str, text: &str) -> bool {
    let mut translated = String::with_capacity(pattern.len() * 2);
    let mut buf = [0u8; 4];
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                // glob rejects `**` outside a path component
                while chars.peek() == Some(&'*') {
                    chars.next();
                }
                translated.push('*');
            }
            '?' => translated.push('?'),
            '\\' => {
                translated.push('\\');
                if let Some(next) = chars.next() {
                    translated.push_str(&Pattern::escape(next.encode_utf8(&mut buf)));
                }
            }
            other => translated.push_str(&Pattern::escape(other.encode_utf8(&mut buf))),
        }
    }

    match Pattern::new(&translated) {
        Ok(compiled) => compiled.matches(text),
        Err(e) => {
            tracing::trace!(pattern = %pattern, error = %e, "unusable name pattern");
            false
        }
    }
}
