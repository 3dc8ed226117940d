use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use super::access::Action;
use crate::filter::pagination::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::filter::types::{AttributePath, SortDirection, SortSpec};

pub const DEFAULT_COLLECTION_ENVELOPE: &str = "items";

/// Storage kind of a filterable attribute; query-string values are coerced to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeKind {
    Text,
    Integer,
    Boolean,
    Uuid,
    Timestamp,
}

impl AttributeKind {
    pub fn coerce(&self, raw: &str) -> Option<Value> {
        let raw = raw.trim();
        match self {
            AttributeKind::Text => Some(Value::String(raw.to_string())),
            AttributeKind::Integer => raw.parse::<i64>().ok().map(Value::from),
            AttributeKind::Boolean => match raw.to_ascii_lowercase().as_str() {
                "1" | "true" => Some(Value::Bool(true)),
                "0" | "false" => Some(Value::Bool(false)),
                _ => None,
            },
            AttributeKind::Uuid => Uuid::parse_str(raw).ok().map(|u| Value::String(u.to_string())),
            AttributeKind::Timestamp => DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|t| Value::String(t.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::AutoSi, true))),
        }
    }

    /// Postgres cast applied to bound parameters that travel as text
    pub fn sql_cast(&self) -> Option<&'static str> {
        match self {
            AttributeKind::Uuid => Some("uuid"),
            AttributeKind::Timestamp => Some("timestamptz"),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttributeKind::Text => "text",
            AttributeKind::Integer => "integer",
            AttributeKind::Boolean => "boolean",
            AttributeKind::Uuid => "uuid",
            AttributeKind::Timestamp => "RFC 3339 timestamp",
        };
        f.write_str(name)
    }
}

/// Named string-token → integer-code table used to coerce enum-like filter values.
#[derive(Debug)]
pub struct EnumTable {
    name: &'static str,
    variants: &'static [(&'static str, i64)],
}

impl EnumTable {
    pub const fn new(name: &'static str, variants: &'static [(&'static str, i64)]) -> Self {
        Self { name, variants }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Case-insensitive token lookup
    pub fn resolve(&self, token: &str) -> Option<i64> {
        let token = token.trim();
        self.variants
            .iter()
            .find(|(t, _)| t.eq_ignore_ascii_case(token))
            .map(|(_, code)| *code)
    }

    pub fn token(&self, code: i64) -> Option<&'static str> {
        self.variants.iter().find(|(_, c)| *c == code).map(|(t, _)| *t)
    }

    pub fn contains_code(&self, code: i64) -> bool {
        self.token(code).is_some()
    }

    pub fn tokens(&self) -> Vec<&'static str> {
        self.variants.iter().map(|(t, _)| *t).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }
}

/// A joinable related table. Joined as `LEFT JOIN table AS name ON name.remote_key = resource.local_key`,
/// plus `AND name.owner_key = caller` when the related table is itself owner-scoped.
#[derive(Debug, Clone)]
pub struct Relation {
    pub name: String,
    pub table: String,
    pub local_key: String,
    pub remote_key: String,
    pub owner_key: Option<String>,
    pub attributes: BTreeMap<String, AttributeKind>,
}

impl Relation {
    pub fn new(name: impl Into<String>, table: impl Into<String>, local_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            local_key: local_key.into(),
            remote_key: "id".to_string(),
            owner_key: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn remote_key(mut self, column: impl Into<String>) -> Self {
        self.remote_key = column.into();
        self
    }

    /// Owner column of the related table. Joins and written keys are then restricted to
    /// the caller's own related rows.
    pub fn owned_by(mut self, column: impl Into<String>) -> Self {
        self.owner_key = Some(column.into());
        self
    }

    pub fn attribute(mut self, column: impl Into<String>, kind: AttributeKind) -> Self {
        self.attributes.insert(column.into(), kind);
        self
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DescriptorError {
    #[error("Invalid identifier in resource '{resource}': '{identifier}'")]
    InvalidIdentifier { resource: String, identifier: String },

    #[error("Resource '{resource}' references undeclared attribute '{attribute}' in {context}")]
    UnknownAttribute {
        resource: String,
        attribute: String,
        context: &'static str,
    },

    #[error("Resource '{resource}': attribute '{attribute}' must be {expected}, declared as {found}")]
    KindMismatch {
        resource: String,
        attribute: String,
        expected: AttributeKind,
        found: AttributeKind,
    },

    #[error("Resource '{resource}': enum table '{table}' has no variants")]
    EmptyEnumTable { resource: String, table: &'static str },

    #[error("Resource '{resource}': relation '{relation}' must not share the resource table name")]
    RelationAlias { resource: String, relation: String },

    #[error("Resource '{resource}': page sizes must satisfy 0 < default ({default}) <= max ({max})")]
    PageSizes { resource: String, default: u32, max: u32 },
}

/// Per-resource configuration. Built and validated once at registration, then shared
/// read-only by every request.
#[derive(Debug, Clone)]
pub struct ResourceDescriptor {
    name: String,
    table: String,
    id_field: String,
    owner_field: String,
    attributes: BTreeMap<String, AttributeKind>,
    default_sort: Vec<SortSpec>,
    partial_match: BTreeSet<AttributePath>,
    string_to_int: BTreeMap<AttributePath, &'static EnumTable>,
    relations: BTreeMap<String, Relation>,
    default_page_size: u32,
    max_page_size: u32,
    no_auth_actions: BTreeSet<Action>,
    collection_envelope: String,
}

impl ResourceDescriptor {
    pub fn builder(name: impl Into<String>) -> ResourceDescriptorBuilder {
        ResourceDescriptorBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    pub fn owner_field(&self) -> &str {
        &self.owner_field
    }

    pub fn default_sort(&self) -> &[SortSpec] {
        &self.default_sort
    }

    pub fn default_page_size(&self) -> u32 {
        self.default_page_size
    }

    pub fn max_page_size(&self) -> u32 {
        self.max_page_size
    }

    pub fn collection_envelope(&self) -> &str {
        &self.collection_envelope
    }

    pub fn relation(&self, name: &str) -> Option<&Relation> {
        self.relations.get(name)
    }

    /// Relations whose related rows carry their own owner column
    pub fn owned_relations(&self) -> impl Iterator<Item = &Relation> {
        self.relations.values().filter(|r| r.owner_key.is_some())
    }

    pub fn allows_anonymous(&self, action: Action) -> bool {
        self.no_auth_actions.contains(&action)
    }

    pub fn no_auth_actions(&self) -> &BTreeSet<Action> {
        &self.no_auth_actions
    }

    /// Declared kind of a local or relation attribute. Undeclared relations resolve to nothing.
    pub fn attribute_kind(&self, path: &AttributePath) -> Option<AttributeKind> {
        match &path.relation {
            None => self.attributes.get(&path.column).copied(),
            Some(relation) => self
                .relations
                .get(relation)
                .and_then(|r| r.attributes.get(&path.column).copied()),
        }
    }

    pub fn is_partial_match(&self, path: &AttributePath) -> bool {
        self.partial_match.contains(path)
    }

    pub fn enum_table(&self, path: &AttributePath) -> Option<&'static EnumTable> {
        self.string_to_int.get(path).copied()
    }

    pub fn string_to_int(&self) -> impl Iterator<Item = (&AttributePath, &'static EnumTable)> {
        self.string_to_int.iter().map(|(path, table)| (path, *table))
    }
}

pub struct ResourceDescriptorBuilder {
    name: String,
    table: Option<String>,
    id_field: String,
    owner_field: String,
    attributes: BTreeMap<String, AttributeKind>,
    default_sort: Vec<SortSpec>,
    partial_match: Vec<String>,
    string_to_int: Vec<(String, &'static EnumTable)>,
    relations: BTreeMap<String, Relation>,
    default_page_size: u32,
    max_page_size: u32,
    no_auth_actions: BTreeSet<Action>,
    collection_envelope: String,
}

impl ResourceDescriptorBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: None,
            id_field: "id".to_string(),
            owner_field: "user_id".to_string(),
            attributes: BTreeMap::new(),
            default_sort: Vec::new(),
            partial_match: Vec::new(),
            string_to_int: Vec::new(),
            relations: BTreeMap::new(),
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
            no_auth_actions: BTreeSet::new(),
            collection_envelope: DEFAULT_COLLECTION_ENVELOPE.to_string(),
        }
    }

    /// Defaults to the resource name
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn id_field(mut self, column: impl Into<String>) -> Self {
        self.id_field = column.into();
        self
    }

    pub fn owner_field(mut self, column: impl Into<String>) -> Self {
        self.owner_field = column.into();
        self
    }

    pub fn attribute(mut self, column: impl Into<String>, kind: AttributeKind) -> Self {
        self.attributes.insert(column.into(), kind);
        self
    }

    pub fn default_sort(mut self, column: impl Into<String>, sort: SortDirection) -> Self {
        self.default_sort.push(SortSpec::new(column, sort));
        self
    }

    pub fn partial_match(mut self, path: impl Into<String>) -> Self {
        self.partial_match.push(path.into());
        self
    }

    pub fn string_to_int(mut self, path: impl Into<String>, table: &'static EnumTable) -> Self {
        self.string_to_int.push((path.into(), table));
        self
    }

    pub fn relation(mut self, relation: Relation) -> Self {
        self.relations.insert(relation.name.clone(), relation);
        self
    }

    pub fn page_sizes(mut self, default_size: u32, max_size: u32) -> Self {
        self.default_page_size = default_size;
        self.max_page_size = max_size;
        self
    }

    pub fn no_auth_action(mut self, action: Action) -> Self {
        self.no_auth_actions.insert(action);
        self
    }

    pub fn collection_envelope(mut self, key: impl Into<String>) -> Self {
        self.collection_envelope = key.into();
        self
    }

    pub fn build(self) -> Result<ResourceDescriptor, DescriptorError> {
        let resource = self.name.clone();
        let table = self.table.clone().unwrap_or_else(|| self.name.clone());

        let identifier = |identifier: &str| -> Result<(), DescriptorError> {
            if is_identifier(identifier) {
                Ok(())
            } else {
                Err(DescriptorError::InvalidIdentifier {
                    resource: resource.clone(),
                    identifier: identifier.to_string(),
                })
            }
        };

        identifier(&self.name)?;
        identifier(&table)?;
        for column in self.attributes.keys() {
            identifier(column)?;
        }
        for relation in self.relations.values() {
            identifier(&relation.name)?;
            identifier(&relation.table)?;
            identifier(&relation.remote_key)?;
            if let Some(owner_key) = &relation.owner_key {
                identifier(owner_key)?;
            }
            for column in relation.attributes.keys() {
                identifier(column)?;
            }
            if relation.name == table {
                return Err(DescriptorError::RelationAlias {
                    resource: resource.clone(),
                    relation: relation.name.clone(),
                });
            }
        }

        let mut descriptor = ResourceDescriptor {
            name: self.name,
            table,
            id_field: self.id_field,
            owner_field: self.owner_field,
            attributes: self.attributes,
            default_sort: self.default_sort,
            partial_match: BTreeSet::new(),
            string_to_int: BTreeMap::new(),
            relations: self.relations,
            default_page_size: self.default_page_size,
            max_page_size: self.max_page_size,
            no_auth_actions: self.no_auth_actions,
            collection_envelope: self.collection_envelope,
        };

        let expect_kind = |descriptor: &ResourceDescriptor,
                           path: &AttributePath,
                           expected: AttributeKind,
                           context: &'static str|
         -> Result<(), DescriptorError> {
            let found = descriptor.attribute_kind(path).ok_or_else(|| DescriptorError::UnknownAttribute {
                resource: resource.clone(),
                attribute: path.to_string(),
                context,
            })?;
            if found != expected {
                return Err(DescriptorError::KindMismatch {
                    resource: resource.clone(),
                    attribute: path.to_string(),
                    expected,
                    found,
                });
            }
            Ok(())
        };

        let id = AttributePath::local(descriptor.id_field.clone());
        expect_kind(&descriptor, &id, AttributeKind::Uuid, "id_field")?;
        let owner = AttributePath::local(descriptor.owner_field.clone());
        expect_kind(&descriptor, &owner, AttributeKind::Uuid, "owner_field")?;

        for relation in descriptor.relations.values() {
            if !descriptor.attributes.contains_key(&relation.local_key) {
                return Err(DescriptorError::UnknownAttribute {
                    resource: resource.clone(),
                    attribute: relation.local_key.clone(),
                    context: "relation key",
                });
            }
        }

        if descriptor.default_sort.is_empty() {
            descriptor.default_sort.push(SortSpec::new(descriptor.id_field.clone(), SortDirection::Desc));
        }
        for spec in &descriptor.default_sort {
            if !descriptor.attributes.contains_key(&spec.column) {
                return Err(DescriptorError::UnknownAttribute {
                    resource: resource.clone(),
                    attribute: spec.column.clone(),
                    context: "default_sort",
                });
            }
        }

        for raw in &self.partial_match {
            let path = parse_path(&resource, raw, "partial_match")?;
            expect_kind(&descriptor, &path, AttributeKind::Text, "partial_match")?;
            descriptor.partial_match.insert(path);
        }

        for (raw, enum_table) in &self.string_to_int {
            let path = parse_path(&resource, raw, "string_to_int")?;
            expect_kind(&descriptor, &path, AttributeKind::Integer, "string_to_int")?;
            if enum_table.is_empty() {
                return Err(DescriptorError::EmptyEnumTable {
                    resource: resource.clone(),
                    table: enum_table.name(),
                });
            }
            descriptor.string_to_int.insert(path, *enum_table);
        }

        if descriptor.default_page_size == 0 || descriptor.default_page_size > descriptor.max_page_size {
            return Err(DescriptorError::PageSizes {
                resource,
                default: descriptor.default_page_size,
                max: descriptor.max_page_size,
            });
        }

        tracing::debug!(
            "Registered resource '{}' (table {}, {} attributes, {} relations)",
            descriptor.name,
            descriptor.table,
            descriptor.attributes.len(),
            descriptor.relations.len()
        );
        Ok(descriptor)
    }
}

fn parse_path(resource: &str, raw: &str, context: &'static str) -> Result<AttributePath, DescriptorError> {
    AttributePath::parse(raw).ok_or_else(|| DescriptorError::UnknownAttribute {
        resource: resource.to_string(),
        attribute: raw.to_string(),
        context,
    })
}

/// `[A-Za-z_][A-Za-z0-9_]*`
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => chars.all(|c| c.is_ascii_alphanumeric() || c == '_'),
        _ => false,
    }
}
