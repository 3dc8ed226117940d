use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::params::QueryParams;
use crate::resource::descriptor::AttributeKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub column: String,
    pub sort: SortDirection,
}

impl SortSpec {
    pub fn new(column: impl Into<String>, sort: SortDirection) -> Self {
        Self { column: column.into(), sort }
    }
}

/// A filterable attribute, either on the resource itself or on one declared relation
/// (`relation.column`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttributePath {
    pub relation: Option<String>,
    pub column: String,
}

impl AttributePath {
    pub fn local(column: impl Into<String>) -> Self {
        Self { relation: None, column: column.into() }
    }

    pub fn related(relation: impl Into<String>, column: impl Into<String>) -> Self {
        Self { relation: Some(relation.into()), column: column.into() }
    }

    /// Parse a parameter key. Only one level of nesting is meaningful; anything deeper
    /// or with empty segments is not an attribute path.
    pub fn parse(key: &str) -> Option<Self> {
        let mut parts = key.split('.');
        let first = parts.next().filter(|s| !s.is_empty())?;
        match (parts.next(), parts.next()) {
            (None, _) => Some(Self::local(first)),
            (Some(column), None) if !column.is_empty() => Some(Self::related(first, column)),
            _ => None,
        }
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.relation {
            Some(relation) => write!(f, "{}.{}", relation, self.column),
            None => write!(f, "{}", self.column),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterOp {
    /// Exact equality
    Eq(Value),
    /// Equality against any of the values
    In(Vec<Value>),
    /// Substring containment
    Contains(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub path: AttributePath,
    pub kind: AttributeKind,
    pub op: FilterOp,
}

impl Predicate {
    /// Equality over one or many already-coerced values.
    pub fn equality(path: AttributePath, kind: AttributeKind, mut values: Vec<Value>) -> Self {
        let op = if values.len() == 1 {
            FilterOp::Eq(values.remove(0))
        } else {
            FilterOp::In(values)
        };
        Self { path, kind, op }
    }

    pub fn contains(path: AttributePath, needle: impl Into<String>) -> Self {
        Self { path, kind: AttributeKind::Text, op: FilterOp::Contains(needle.into()) }
    }
}

/// Page size and 1-based page number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageRequest {
    pub size: u32,
    pub number: u32,
}

impl PageRequest {
    pub fn offset(&self) -> u64 {
        u64::from(self.number.saturating_sub(1)) * u64::from(self.size)
    }

    pub fn page_count(&self, total: u64) -> u64 {
        if self.size == 0 {
            return 0;
        }
        total.div_ceil(u64::from(self.size))
    }

    /// A page past the end of the result set becomes the last page.
    pub fn clamp_to(&self, total: u64) -> Self {
        let last = self.page_count(total).max(1);
        let number = u64::from(self.number).min(last);
        Self { size: self.size, number: u32::try_from(number).unwrap_or(self.number) }
    }
}

/// Everything compiled from one list request, before owner scoping.
#[derive(Debug, Clone)]
pub struct FilterRequest {
    pub params: QueryParams,
    pub predicates: Vec<Predicate>,
    pub sort: Vec<SortSpec>,
    pub page: PageRequest,
}

#[derive(Debug, Clone)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_attribute_paths() {
        assert_eq!(AttributePath::parse("name"), Some(AttributePath::local("name")));
        assert_eq!(AttributePath::parse("account.name"), Some(AttributePath::related("account", "name")));
        assert_eq!(AttributePath::parse("a.b.c"), None);
        assert_eq!(AttributePath::parse(".name"), None);
        assert_eq!(AttributePath::parse("account."), None);
        assert_eq!(AttributePath::related("account", "name").to_string(), "account.name");
    }

    #[test]
    fn page_offsets_and_clamping() {
        let page = PageRequest { size: 20, number: 3 };
        assert_eq!(page.offset(), 40);
        assert_eq!(page.page_count(41), 3);
        assert_eq!(page.clamp_to(41).number, 3);
        assert_eq!(page.clamp_to(25).number, 2);
        assert_eq!(page.clamp_to(0).number, 1);
    }
}
