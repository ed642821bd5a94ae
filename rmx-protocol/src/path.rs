//! Attribute paths
//!
//! A path drills into a composite attribute value. On the wire it is a single
//! string with `/` separating segments; `!/` stands for a literal slash and
//! `!!` for a literal `!`.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::error::{ProtocolError, ProtocolResult};

/// Ordered selector into a nested attribute value
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct AttributePath {
    segments: Vec<String>,
}

impl AttributePath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse the escaped wire form. The empty string is the empty path.
    pub fn parse(path: &str) -> ProtocolResult<Self> {
        if path.is_empty() {
            return Ok(Self::new());
        }

        let mut segments = Vec::new();
        let mut current = String::new();
        let mut chars = path.chars();
        while let Some(c) = chars.next() {
            match c {
                '!' => match chars.next() {
                    Some(escaped @ ('/' | '!')) => current.push(escaped),
                    Some(other) => {
                        return Err(ProtocolError::decode(
                            format!("path with invalid escape '!{}'", other),
                            &Value::String(path.to_string()),
                        ))
                    }
                    None => {
                        return Err(ProtocolError::decode(
                            "path with a dangling '!'",
                            &Value::String(path.to_string()),
                        ))
                    }
                },
                '/' => segments.push(std::mem::take(&mut current)),
                other => current.push(other),
            }
        }
        segments.push(current);

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Select the sub-value this path addresses
    ///
    /// Object segments are keys, array segments must be indices. Returns
    /// `None` when a segment does not resolve.
    pub fn project(&self, value: &Value) -> Option<Value> {
        let mut current = value;
        for segment in &self.segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current.clone())
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let escaped: Vec<String> = self
            .segments
            .iter()
            .map(|s| s.replace('!', "!!").replace('/', "!/"))
            .collect();
        f.write_str(&escaped.join("/"))
    }
}

impl FromStr for AttributePath {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
