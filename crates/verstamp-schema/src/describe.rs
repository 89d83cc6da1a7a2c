//! Structured view of a `git describe --tags --long --dirty --always` line.
//!
//! A reachable tag gives `TAG-COUNT-gHASH[-dirty]`. With no tag at all, git
//! falls back to a bare `HASH[-dirty]`. Only the tag (less its non-numeric
//! prefix) and the commit count matter here: they become the major and
//! minor components.

use crate::{DESCRIBE_DELIMITER, DIRTY_MARKER, DIRTY_SUFFIX};

/// Version fields recovered from a tag description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagDescription {
    /// Major component; `None` renders a minor-only version.
    pub major: Option<String>,
    /// Minor component (commits since the tag, or an explicit count).
    pub minor: String,
    /// Whether the working tree had local changes.
    pub dirty: bool,
}

impl TagDescription {
    /// Build fields directly, e.g. from a commit count.
    pub fn new(major: Option<String>, minor: impl Into<String>, dirty: bool) -> Self {
        Self {
            major,
            minor: minor.into(),
            dirty,
        }
    }

    /// Parse a describe line.
    ///
    /// `v1-12-gabc123` gives major `1`, minor `12`; a trailing `-dirty`
    /// sets the dirty flag. The count is always read from the field before
    /// the hash, so a tag containing the delimiter does not shift it. A lone
    /// field is the bare hash of an untagged repository and yields `0.0`,
    /// whatever characters the hash starts with.
    pub fn parse(description: &str) -> Self {
        let mut parts: Vec<&str> = description.trim().split(DESCRIBE_DELIMITER).collect();

        let dirty = parts.last() == Some(&DIRTY_MARKER);
        if dirty {
            parts.pop();
        }

        let (tag, minor) = match parts.as_slice() {
            [] | [_] => (None, "0"),
            [tag @ .., count, hash] if !tag.is_empty() && hash.starts_with('g') => {
                (Some(tag.join("-")), *count)
            }
            [tag, count, ..] => (Some((*tag).to_string()), *count),
        };

        let major = tag
            .as_deref()
            .map(|t| t.trim_start_matches(|c: char| !c.is_ascii_digit()))
            .filter(|t| !t.is_empty())
            .unwrap_or("0");

        Self {
            major: Some(major.to_string()),
            minor: minor.to_string(),
            dirty,
        }
    }

    /// Compose `major.minor`, with the dirty suffix on the minor component.
    pub fn render(&self) -> String {
        let suffix = if self.dirty { DIRTY_SUFFIX } else { "" };
        match &self.major {
            Some(major) => format!("{major}.{}{suffix}", self.minor),
            None => format!("{}{suffix}", self.minor),
        }
    }
}

impl std::fmt::Display for TagDescription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}
