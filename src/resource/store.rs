use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use super::descriptor::{AttributeKind, Relation};
use crate::auth::CallerIdentity;
use crate::database::manager::DatabaseError;
use crate::filter::{PageRequest, ScopedQuery};

/// One page of a scoped listing
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: u64,
    pub page: PageRequest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub total_count: u64,
    pub page_count: u64,
    pub current_page: u32,
    pub per_page: u32,
}

impl<T> Page<T> {
    pub fn meta(&self) -> PageMeta {
        PageMeta {
            total_count: self.total_count,
            page_count: self.page.page_count(self.total_count),
            current_page: self.page.number,
            per_page: self.page.size,
        }
    }
}

/// Persistence collaborator for one resource type.
#[async_trait]
pub trait Store<R>: Send + Sync + 'static {
    /// Run a scoped query. A page past the end is served as the last page.
    async fn find_page(&self, query: &ScopedQuery) -> Result<Page<R>, DatabaseError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<R>, DatabaseError>;

    async fn insert(&self, record: &R) -> Result<R, DatabaseError>;

    async fn update(&self, record: &R) -> Result<R, DatabaseError>;

    async fn delete(&self, id: Uuid) -> Result<(), DatabaseError>;

    /// Whether the row of an owned relation keyed by `key` exists and belongs to `owner`.
    /// `kind` is the declared kind of the local key column.
    async fn owns_related(
        &self,
        relation: &Relation,
        key: &Value,
        kind: AttributeKind,
        owner: &CallerIdentity,
    ) -> Result<bool, DatabaseError>;
}
