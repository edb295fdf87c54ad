//! Error types for URL construction

/// Errors raised while resolving path templates
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UrlError {
    /// A `:name` placeholder had no value supplied
    #[error("unresolved path placeholder ':{name}' in '{template}'")]
    UnresolvedPlaceholder { name: String, template: String },

    /// A `:` segment with no name after it
    #[error("empty placeholder name in '{0}'")]
    EmptyPlaceholder(String),
}

impl UrlError {
    /// Name of the offending placeholder, if any
    #[inline]
    #[must_use]
    pub fn placeholder(&self) -> Option<&str> {
        match self {
            Self::UnresolvedPlaceholder { name, .. } => Some(name),
            Self::EmptyPlaceholder(_) => None,
        }
    }
}
