//! Search filter combinators
//!
//! A small predicate algebra rendered to RFC 4515 filter strings. Values
//! are escaped at render time, so attribute values may safely contain
//! filter metacharacters. There is deliberately no parser here; filters
//! are built programmatically.

use std::fmt;

/// A boolean predicate over directory attribute values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Attribute has at least one value.
    Present { attribute: String },
    /// Attribute equals value.
    Equals { attribute: String, value: String },
    /// Attribute is greater than or equal to value.
    GreaterOrEqual { attribute: String, value: String },
    /// Attribute is less than or equal to value.
    LessOrEqual { attribute: String, value: String },
    /// All inner filters match.
    And { filters: Vec<Filter> },
    /// Any inner filter matches.
    Or { filters: Vec<Filter> },
    /// The inner filter does not match.
    Not { filter: Box<Filter> },
}

impl Filter {
    /// Presence filter: `(attribute=*)`.
    pub fn present(attribute: impl Into<String>) -> Self {
        Filter::Present {
            attribute: attribute.into(),
        }
    }

    /// Equality filter: `(attribute=value)`.
    pub fn eq(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::Equals {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Ordering filter: `(attribute>=value)`.
    pub fn ge(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::GreaterOrEqual {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Ordering filter: `(attribute<=value)`.
    pub fn le(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::LessOrEqual {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Combine with another filter under AND, flattening nested ANDs.
    #[must_use]
    pub fn and(self, other: Filter) -> Self {
        match self {
            Filter::And { mut filters } => {
                filters.push(other);
                Filter::And { filters }
            }
            first => Filter::And {
                filters: vec![first, other],
            },
        }
    }

    /// Combine with another filter under OR, flattening nested ORs.
    #[must_use]
    pub fn or(self, other: Filter) -> Self {
        match self {
            Filter::Or { mut filters } => {
                filters.push(other);
                Filter::Or { filters }
            }
            first => Filter::Or {
                filters: vec![first, other],
            },
        }
    }

    /// Negate this filter.
    #[must_use]
    pub fn negate(self) -> Self {
        Filter::Not {
            filter: Box::new(self),
        }
    }

    /// Render to an RFC 4515 filter string.
    pub fn render(&self) -> String {
        match self {
            Filter::Present { attribute } => format!("({attribute}=*)"),
            Filter::Equals { attribute, value } => {
                format!("({attribute}={})", escape_value(value))
            }
            Filter::GreaterOrEqual { attribute, value } => {
                format!("({attribute}>={})", escape_value(value))
            }
            Filter::LessOrEqual { attribute, value } => {
                format!("({attribute}<={})", escape_value(value))
            }
            Filter::And { filters } => {
                let inner: Vec<String> = filters.iter().map(Filter::render).collect();
                format!("(&{})", inner.join(""))
            }
            Filter::Or { filters } => {
                let inner: Vec<String> = filters.iter().map(Filter::render).collect();
                format!("(|{})", inner.join(""))
            }
            Filter::Not { filter } => format!("(!{})", filter.render()),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Escape special characters in filter values (RFC 4515).
pub fn escape_value(value: &str) -> String {
    value
        .replace('\\', "\\5c")
        .replace('*', "\\2a")
        .replace('(', "\\28")
        .replace(')', "\\29")
        .replace('\0', "\\00")
}
