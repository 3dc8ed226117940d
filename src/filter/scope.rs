use super::types::{FilterRequest, PageRequest, Predicate, SortSpec};
use crate::auth::CallerIdentity;
use crate::resource::descriptor::{Relation, ResourceDescriptor};

/// `column = caller` on the resource table. Always the last predicate of a scoped query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerPredicate {
    pub column: String,
    pub owner: CallerIdentity,
}

/// A join required by at least one predicate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    pub alias: String,
    pub table: String,
    pub local_key: String,
    pub remote_key: String,
    /// Related rows are joined only when this column matches the caller
    pub owner_key: Option<String>,
}

impl From<&Relation> for Join {
    fn from(relation: &Relation) -> Self {
        Self {
            alias: relation.name.clone(),
            table: relation.table.clone(),
            local_key: relation.local_key.clone(),
            remote_key: relation.remote_key.clone(),
            owner_key: relation.owner_key.clone(),
        }
    }
}

/// A compiled list query restricted to one caller's records.
#[derive(Debug, Clone)]
pub struct ScopedQuery {
    table: String,
    joins: Vec<Join>,
    predicates: Vec<Predicate>,
    owner: OwnerPredicate,
    sort: Vec<SortSpec>,
    page: PageRequest,
}

impl ScopedQuery {
    /// Client predicates on the owner column are dropped; the owner predicate built from
    /// the trusted identity is the only one that reaches the store.
    pub fn build(filter: FilterRequest, descriptor: &ResourceDescriptor, caller: &CallerIdentity) -> Self {
        let owner_field = descriptor.owner_field();
        let FilterRequest { predicates, sort, page, .. } = filter;

        let (shadowing, predicates): (Vec<Predicate>, Vec<Predicate>) = predicates
            .into_iter()
            .partition(|p| p.path.relation.is_none() && p.path.column == owner_field);
        if !shadowing.is_empty() {
            tracing::warn!(
                "Discarded client filter on owner column '{}' of '{}' for caller {}",
                owner_field,
                descriptor.name(),
                caller.user_id()
            );
        }

        let mut joins: Vec<Join> = Vec::new();
        for predicate in &predicates {
            let Some(name) = &predicate.path.relation else {
                continue;
            };
            if joins.iter().any(|j| &j.alias == name) {
                continue;
            }
            if let Some(relation) = descriptor.relation(name) {
                joins.push(Join::from(relation));
            }
        }

        Self {
            table: descriptor.table().to_string(),
            joins,
            predicates,
            owner: OwnerPredicate {
                column: owner_field.to_string(),
                owner: *caller,
            },
            sort,
            page,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    /// Client-derived predicates, without the owner predicate
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn owner(&self) -> &OwnerPredicate {
        &self.owner
    }

    pub fn sort(&self) -> &[SortSpec] {
        &self.sort
    }

    pub fn page(&self) -> PageRequest {
        self.page
    }

    pub fn with_page(mut self, page: PageRequest) -> Self {
        self.page = page;
        self
    }
}
