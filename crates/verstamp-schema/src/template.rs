//! Version templates.
//!
//! A template is literal text with `{name}` placeholders drawn from a fixed
//! vocabulary. `{{` and `}}` stand for literal braces. Parsing validates the
//! whole template up front so that a typo is reported before any
//! repository query runs.

use std::fmt;
use std::str::FromStr;

/// Named values a template may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placeholder {
    /// CI build number read from the environment.
    Jenkins,
    /// `major.minor[dev]` derived from the nearest tag description.
    Tag,
    /// Commit count for the path scope, with `dev` when the scope is dirty.
    Commits,
}

impl Placeholder {
    /// Every placeholder, in dispatch-table order.
    pub const ALL: [Placeholder; 3] = [Self::Jenkins, Self::Tag, Self::Commits];

    /// Name used inside braces.
    pub fn name(self) -> &'static str {
        match self {
            Self::Jenkins => "jenkins",
            Self::Tag => "tag",
            Self::Commits => "commits",
        }
    }

    fn index(self) -> usize {
        match self {
            Self::Jenkins => 0,
            Self::Tag => 1,
            Self::Commits => 2,
        }
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Placeholder {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| TemplateError::UnknownPlaceholder(s.to_string()))
    }
}

/// Errors raised while parsing a template.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// A `{name}` whose name is not in the vocabulary.
    #[error("unknown placeholder '{{{0}}}' (expected one of: {{jenkins}}, {{tag}}, {{commits}})")]
    UnknownPlaceholder(String),

    /// A `{` without its `}`, or a lone `}`.
    #[error("unbalanced '{brace}' at byte {position} in version template '{template}'")]
    Unbalanced {
        /// The offending brace character.
        brace: char,
        /// Byte offset of the brace.
        position: usize,
        /// The full template text.
        template: String,
    },
}

/// One parsed piece of a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Text copied verbatim (escaped braces already collapsed).
    Literal(String),
    /// A value computed on demand.
    Placeholder(Placeholder),
}

/// A parsed version template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl VersionTemplate {
    /// Parse a template string.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::UnknownPlaceholder`] for a name outside the
    /// vocabulary and [`TemplateError::Unbalanced`] for stray braces.
    pub fn parse(raw: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = raw.char_indices().peekable();

        while let Some((pos, c)) = chars.next() {
            match c {
                '{' if chars.peek().map(|&(_, n)| n) == Some('{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek().map(|&(_, n)| n) == Some('}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for (_, n) in chars.by_ref() {
                        if n == '}' {
                            closed = true;
                            break;
                        }
                        name.push(n);
                    }
                    if !closed {
                        return Err(TemplateError::Unbalanced {
                            brace: '{',
                            position: pos,
                            template: raw.to_string(),
                        });
                    }
                    let placeholder = name.trim().parse::<Placeholder>()?;
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder(placeholder));
                }
                '}' => {
                    return Err(TemplateError::Unbalanced {
                        brace: '}',
                        position: pos,
                        template: raw.to_string(),
                    });
                }
                _ => literal.push(c),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// The template text as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Parsed segments in order.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Whether the template mentions `placeholder` anywhere.
    pub fn references(&self, placeholder: Placeholder) -> bool {
        self.segments
            .iter()
            .any(|s| *s == Segment::Placeholder(placeholder))
    }

    /// Render the template, calling `eval` only for referenced placeholders.
    ///
    /// A placeholder that appears more than once is evaluated once per call.
    ///
    /// # Errors
    ///
    /// Returns the first error produced by `eval`; rendering stops there.
    pub fn render<E>(
        &self,
        mut eval: impl FnMut(Placeholder) -> Result<String, E>,
    ) -> Result<String, E> {
        let mut memo: [Option<String>; 3] = Default::default();
        let mut out = String::with_capacity(self.raw.len());

        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(p) => {
                    let slot = &mut memo[p.index()];
                    if slot.is_none() {
                        *slot = Some(eval(*p)?);
                    }
                    if let Some(value) = slot {
                        out.push_str(value);
                    }
                }
            }
        }

        Ok(out)
    }
}

impl FromStr for VersionTemplate {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for VersionTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_literal() {
        let t = VersionTemplate::parse("1.0.0").unwrap();
        assert_eq!(t.segments(), &[Segment::Literal("1.0.0".to_string())]);
        for p in Placeholder::ALL {
            assert!(!t.references(p));
        }
    }

    #[test]
    fn test_parse_mixed() {
        let t = VersionTemplate::parse("{tag}.{jenkins}").unwrap();
        assert_eq!(
            t.segments(),
            &[
                Segment::Placeholder(Placeholder::Tag),
                Segment::Literal(".".to_string()),
                Segment::Placeholder(Placeholder::Jenkins),
            ]
        );
        assert!(t.references(Placeholder::Tag));
        assert!(t.references(Placeholder::Jenkins));
        assert!(!t.references(Placeholder::Commits));
    }

    #[test]
    fn test_escaped_braces() {
        let t = VersionTemplate::parse("{{literal}}-{commits}").unwrap();
        let out: Result<String, ()> = t.render(|_| Ok("7".to_string()));
        assert_eq!(out.unwrap(), "{literal}-7");
    }

    #[test]
    fn test_unknown_placeholder() {
        let err = VersionTemplate::parse("{build}").unwrap_err();
        assert_eq!(err, TemplateError::UnknownPlaceholder("build".to_string()));
        assert!(err.to_string().contains("{build}"));
    }

    #[test]
    fn test_empty_placeholder_rejected() {
        let err = VersionTemplate::parse("1.{}").unwrap_err();
        assert_eq!(err, TemplateError::UnknownPlaceholder(String::new()));
    }

    #[test]
    fn test_unbalanced_open() {
        let err = VersionTemplate::parse("1.{tag").unwrap_err();
        assert!(matches!(
            err,
            TemplateError::Unbalanced {
                brace: '{',
                position: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_unbalanced_close() {
        let err = VersionTemplate::parse("1.tag}").unwrap_err();
        assert!(matches!(err, TemplateError::Unbalanced { brace: '}', .. }));
    }

    #[test]
    fn test_render_skips_unreferenced() {
        let t = VersionTemplate::parse("{tag}").unwrap();
        let mut called = Vec::new();
        let out: Result<String, String> = t.render(|p| {
            called.push(p);
            match p {
                Placeholder::Tag => Ok("1.2".to_string()),
                other => Err(format!("{other} must not be evaluated")),
            }
        });
        assert_eq!(out.unwrap(), "1.2");
        assert_eq!(called, vec![Placeholder::Tag]);
    }

    #[test]
    fn test_render_memoizes_within_call() {
        let t = VersionTemplate::parse("{commits}+{commits}").unwrap();
        let mut calls = 0;
        let out: Result<String, ()> = t.render(|_| {
            calls += 1;
            Ok("3".to_string())
        });
        assert_eq!(out.unwrap(), "3+3");
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_render_propagates_first_error() {
        let t = VersionTemplate::parse("{jenkins}{tag}").unwrap();
        let mut called = Vec::new();
        let out: Result<String, &str> = t.render(|p| {
            called.push(p);
            Err("boom")
        });
        assert_eq!(out.unwrap_err(), "boom");
        assert_eq!(called, vec![Placeholder::Jenkins]);
    }
}
