//! Group-name extraction.

use crate::error::{SyncError, SyncResult};
use regex::Regex;

/// A rule turning a raw directory group name into a catalog group name.
///
/// The pattern must match the whole raw name; the first capture group is
/// the extracted name. `cn=(\w+),.*` turns `cn=Editors,ou=groups` into
/// `Editors`.
#[derive(Debug, Clone)]
pub struct GroupNamePattern {
    source: String,
    regex: Regex,
}

impl GroupNamePattern {
    /// Compiles a pattern.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the pattern does not compile or has no
    /// capture group.
    pub fn new(pattern: &str) -> SyncResult<Self> {
        let regex = Regex::new(&format!("^(?:{pattern})$")).map_err(|e| {
            SyncError::configuration(format!("invalid group name pattern {pattern:?}: {e}"))
        })?;
        // captures_len counts the implicit whole-match group
        if regex.captures_len() < 2 {
            return Err(SyncError::configuration(format!(
                "group name pattern {pattern:?} has no capture group"
            )));
        }
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    /// Compiles an optional pattern; `None` and the empty string mean no
    /// pattern.
    pub fn parse_optional(pattern: Option<&str>) -> SyncResult<Option<Self>> {
        match pattern {
            Some(p) if !p.is_empty() => Self::new(p).map(Some),
            _ => Ok(None),
        }
    }

    /// Returns the pattern as configured.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Extracts the group name from a raw name.
    ///
    /// Returns `None` when the pattern does not match, or when the first
    /// capture group did not participate or captured only whitespace.
    pub fn extract(&self, raw: &str) -> Option<String> {
        let captures = self.regex.captures(raw)?;
        captures
            .get(1)
            .map(|m| m.as_str())
            .filter(|name| !is_blank(name))
            .map(str::to_string)
    }
}

/// Resolves the catalog name for a raw directory group name.
///
/// With no pattern the raw name is used verbatim; with a pattern the
/// extracted name is used, and a non-matching raw name yields `None`. A
/// blank name is no name either way.
pub fn resolve_group_name(pattern: Option<&GroupNamePattern>, raw: &str) -> Option<String> {
    match pattern {
        Some(pattern) => pattern.extract(raw),
        None if is_blank(raw) => None,
        None => Some(raw.to_string()),
    }
}

fn is_blank(name: &str) -> bool {
    name.trim().is_empty()
}
