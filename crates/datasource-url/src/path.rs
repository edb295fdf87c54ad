//! Path templates with `:name` placeholders
//!
//! Provides [`PathTemplate`] for endpoint paths such as
//! `/namespaces/:namespace/:entityType/:entityId/metadata`.

use crate::error::UrlError;
use crate::query::QueryParams;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// One piece of a parsed template
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Copied verbatim
    Literal(String),
    /// Substituted from the parameter map
    Param(String),
}

/// Endpoint path with named placeholders
///
/// A placeholder is a path segment starting with `:`. Colons elsewhere
/// (`host:port`) are literal text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl PathTemplate {
    /// Parse a template
    ///
    /// # Errors
    /// Returns `UrlError::EmptyPlaceholder` for a bare `:` segment
    pub fn parse(raw: impl Into<String>) -> Result<Self, UrlError> {
        let raw = raw.into();
        let mut segments = Vec::new();
        let mut literal = String::new();

        for (idx, piece) in raw.split('/').enumerate() {
            if idx > 0 {
                literal.push('/');
            }
            if let Some(name) = piece.strip_prefix(':') {
                if name.is_empty() {
                    return Err(UrlError::EmptyPlaceholder(raw));
                }
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Param(name.to_string()));
            } else {
                literal.push_str(piece);
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self { raw, segments })
    }

    /// Original template text
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Parsed segments in order
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Placeholder names in order of appearance
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Check if the template has no placeholders
    #[inline]
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.placeholders().next().is_none()
    }

    /// Substitute placeholders from `params`
    ///
    /// Returns the concrete path and the parameters that were not consumed by
    /// the path; those are meant for the query string. Path values are
    /// percent-encoded.
    ///
    /// # Errors
    /// Returns `UrlError::UnresolvedPlaceholder` if a placeholder has no
    /// value or its value is null
    pub fn interpolate(&self, params: &QueryParams) -> Result<(String, QueryParams), UrlError> {
        let mut path = String::with_capacity(self.raw.len());
        let mut remaining = params.clone();

        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => path.push_str(text),
                Segment::Param(name) => match remaining.remove(name) {
                    Some(value) if !value.is_null() => {
                        path.push_str(&urlencoding::encode(&value.render()));
                    }
                    _ => {
                        return Err(UrlError::UnresolvedPlaceholder {
                            name: name.clone(),
                            template: self.raw.clone(),
                        })
                    }
                },
            }
        }

        Ok((path, remaining))
    }

    /// Substitute placeholders, ignoring leftover parameters
    ///
    /// # Errors
    /// Same as [`PathTemplate::interpolate`]
    pub fn render(&self, params: &QueryParams) -> Result<String, UrlError> {
        self.interpolate(params).map(|(path, _)| path)
    }

    /// Append a static suffix, returning a new template
    ///
    /// # Errors
    /// Returns an error if the suffix contains a bare `:` segment
    pub fn join(&self, suffix: &str) -> Result<Self, UrlError> {
        Self::parse(format!("{}{suffix}", self.raw))
    }
}

impl Display for PathTemplate {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for PathTemplate {
    type Err = UrlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
