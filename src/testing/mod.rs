//! In-memory `Store` and fixtures for exercising controllers and routers without Postgres.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::{generate_jwt, CallerIdentity, Claims};
use crate::database::manager::DatabaseError;
use crate::filter::{FilterOp, Predicate, ScopedQuery, SortDirection};
use crate::resource::{AttributeKind, Page, Relation, Resource, Store};
use crate::resources::enums::DIRECTION_OUT;
use crate::resources::{Account, Transaction};

pub const TEST_JWT_SECRET: &str = "test-secret";

/// Evaluates scoped queries against serialized records the way the SQL renderer's output
/// would against Postgres.
pub struct MemoryStore<R> {
    records: Arc<RwLock<Vec<R>>>,
    related: Arc<RwLock<HashMap<String, Vec<Value>>>>,
}

impl<R> Clone for MemoryStore<R> {
    fn clone(&self) -> Self {
        Self {
            records: Arc::clone(&self.records),
            related: Arc::clone(&self.related),
        }
    }
}

impl<R: Resource> Default for MemoryStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Resource> MemoryStore<R> {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(Vec::new())),
            related: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn seed(&self, records: Vec<R>) {
        self.records.write().await.extend(records);
    }

    /// Rows of a related table, reachable through the resource's declared relations.
    pub async fn with_related<T: serde::Serialize>(&self, table: &str, rows: &[T]) {
        let rows: Vec<Value> = rows.iter().filter_map(|r| serde_json::to_value(r).ok()).collect();
        self.related.write().await.entry(table.to_string()).or_default().extend(rows);
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    fn matches(query: &ScopedQuery, row: &Value, related: &HashMap<String, Vec<Value>>) -> bool {
        let owner = query.owner();
        if row.get(&owner.column) != Some(&Value::String(owner.owner.user_id().to_string())) {
            return false;
        }
        query
            .predicates()
            .iter()
            .all(|p| Self::field(query, row, p, related).is_some_and(|v| test_predicate(p, &v)))
    }

    fn field(query: &ScopedQuery, row: &Value, predicate: &Predicate, related: &HashMap<String, Vec<Value>>) -> Option<Value> {
        let Some(alias) = &predicate.path.relation else {
            return row.get(&predicate.path.column).cloned();
        };
        let join = query.joins().iter().find(|j| &j.alias == alias)?;
        let key = row.get(&join.local_key).filter(|v| !v.is_null())?;
        let owner = Value::String(query.owner().owner.user_id().to_string());
        related
            .get(&join.table)?
            .iter()
            .filter(|r| join.owner_key.as_ref().map_or(true, |column| r.get(column) == Some(&owner)))
            .find(|r| r.get(&join.remote_key) == Some(key))
            .and_then(|r| r.get(&predicate.path.column).cloned())
    }
}

fn test_predicate(predicate: &Predicate, value: &Value) -> bool {
    match &predicate.op {
        FilterOp::Eq(expected) => same(predicate.kind, value, expected),
        FilterOp::In(expected) => expected.iter().any(|e| same(predicate.kind, value, e)),
        FilterOp::Contains(needle) => value.as_str().is_some_and(|s| s.contains(needle.as_str())),
    }
}

fn same(kind: AttributeKind, value: &Value, expected: &Value) -> bool {
    match kind {
        AttributeKind::Timestamp => timestamp(value).is_some() && timestamp(value) == timestamp(expected),
        _ => value == expected,
    }
}

fn timestamp(value: &Value) -> Option<DateTime<Utc>> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
}

/// Postgres ordering: NULL sorts after every value ascending.
fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .zip(y.as_f64())
            .and_then(|(x, y)| x.partial_cmp(&y))
            .unwrap_or(Ordering::Equal),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::String(x), Value::String(y)) => match (timestamp(a), timestamp(b)) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => x.cmp(y),
        },
        _ => a.to_string().cmp(&b.to_string()),
    }
}

#[async_trait]
impl<R: Resource> Store<R> for MemoryStore<R> {
    async fn find_page(&self, query: &ScopedQuery) -> Result<Page<R>, DatabaseError> {
        let records = self.records.read().await;
        let related = self.related.read().await;

        let mut rows: Vec<Value> = Vec::new();
        for record in records.iter() {
            let row = serde_json::to_value(record).map_err(DatabaseError::Decode)?;
            if Self::matches(query, &row, &related) {
                rows.push(row);
            }
        }

        rows.sort_by(|a, b| {
            query
                .sort()
                .iter()
                .map(|spec| {
                    let ord = compare(
                        a.get(&spec.column).unwrap_or(&Value::Null),
                        b.get(&spec.column).unwrap_or(&Value::Null),
                    );
                    match spec.sort {
                        SortDirection::Asc => ord,
                        SortDirection::Desc => ord.reverse(),
                    }
                })
                .find(|o| *o != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });

        let total_count = rows.len() as u64;
        let page = query.page().clamp_to(total_count);
        let items = rows
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.size as usize)
            .map(serde_json::from_value)
            .collect::<Result<Vec<R>, _>>()
            .map_err(DatabaseError::Decode)?;

        Ok(Page { items, total_count, page })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<R>, DatabaseError> {
        Ok(self.records.read().await.iter().find(|r| r.id() == id).cloned())
    }

    async fn insert(&self, record: &R) -> Result<R, DatabaseError> {
        let mut records = self.records.write().await;
        if records.iter().any(|r| r.id() == record.id()) {
            return Err(DatabaseError::Conflict(format!("Duplicate id: {}", record.id())));
        }
        records.push(record.clone());
        Ok(record.clone())
    }

    async fn update(&self, record: &R) -> Result<R, DatabaseError> {
        let mut records = self.records.write().await;
        let slot = records
            .iter_mut()
            .find(|r| r.id() == record.id())
            .ok_or_else(|| DatabaseError::NotFound(format!("Object not found: {}", record.id())))?;
        *slot = record.clone();
        Ok(record.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<(), DatabaseError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|r| r.id() != id);
        if records.len() == before {
            return Err(DatabaseError::NotFound(format!("Object not found: {}", id)));
        }
        Ok(())
    }

    async fn owns_related(
        &self,
        relation: &Relation,
        key: &Value,
        kind: AttributeKind,
        owner: &CallerIdentity,
    ) -> Result<bool, DatabaseError> {
        let Some(owner_key) = &relation.owner_key else {
            return Ok(true);
        };
        let owner = Value::String(owner.user_id().to_string());
        let related = self.related.read().await;
        Ok(related.get(&relation.table).is_some_and(|rows| {
            rows.iter().any(|r| {
                r.get(owner_key) == Some(&owner)
                    && r.get(&relation.remote_key).is_some_and(|v| same(kind, v, key))
            })
        }))
    }
}

pub fn account(owner: &CallerIdentity, name: &str, account_type: i64) -> Account {
    Account {
        id: Uuid::new_v4(),
        user_id: owner.user_id(),
        name: name.to_string(),
        account_type,
        ..Account::default()
    }
}

pub fn transaction(owner: &CallerIdentity, account: &Account, description: &str, amount_cents: i64) -> Transaction {
    Transaction {
        id: Uuid::new_v4(),
        user_id: owner.user_id(),
        account_id: Some(account.id),
        description: description.to_string(),
        direction: DIRECTION_OUT,
        amount_cents,
        occurred_at: Some(Utc::now()),
    }
}

/// `Authorization` header value for `caller`, signed with `TEST_JWT_SECRET`.
pub fn bearer(caller: &CallerIdentity) -> String {
    let token = Claims::new(caller.user_id(), 1)
        .and_then(|claims| generate_jwt(&claims, TEST_JWT_SECRET))
        .unwrap_or_default();
    format!("Bearer {}", token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::QueryParams;
    use crate::resource::ResourceController;
    use crate::resources::enums::{ACCOUNT_TYPE_CASH, ACCOUNT_TYPE_CREDIT_CARD};

    #[tokio::test]
    async fn test_relation_filter_uses_related_rows() {
        let me = CallerIdentity::new(Uuid::new_v4());
        let cash = account(&me, "Wallet", ACCOUNT_TYPE_CASH);
        let card = account(&me, "Visa", ACCOUNT_TYPE_CREDIT_CARD);

        let store = MemoryStore::<Transaction>::new();
        store.with_related("accounts", &[cash.clone(), card.clone()]).await;
        store
            .seed(vec![
                transaction(&me, &cash, "Coffee", 350),
                transaction(&me, &card, "Flights", 42000),
            ])
            .await;
        let ctl = ResourceController::<Transaction, _>::register(store).unwrap();

        let page = ctl
            .index(&me, QueryParams::from_pairs(vec![("account.type", "credit_card")]))
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].description, "Flights");

        let page = ctl
            .index(&me, QueryParams::from_pairs(vec![("account.name", "Wal")]))
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].description, "Coffee");
    }

    #[tokio::test]
    async fn test_related_rows_of_other_owners_never_match() {
        let me = CallerIdentity::new(Uuid::new_v4());
        let other = CallerIdentity::new(Uuid::new_v4());
        let theirs = account(&other, "Savings", ACCOUNT_TYPE_CASH);

        let store = MemoryStore::<Transaction>::new();
        store.with_related("accounts", &[theirs.clone()]).await;
        store.seed(vec![transaction(&me, &theirs, "Linked", 100)]).await;
        let ctl = ResourceController::<Transaction, _>::register(store).unwrap();

        let page = ctl
            .index(&me, QueryParams::from_pairs(vec![("account.name", "Sav")]))
            .await
            .unwrap();
        assert!(page.items.is_empty());
    }

    #[tokio::test]
    async fn test_page_past_the_end_is_last_page() {
        let me = CallerIdentity::new(Uuid::new_v4());
        let store = MemoryStore::<Account>::new();
        store
            .seed((0..5).map(|i| account(&me, &format!("Account {}", i), ACCOUNT_TYPE_CASH)).collect())
            .await;
        let ctl = ResourceController::<Account, _>::register(store).unwrap();

        let page = ctl
            .index(&me, QueryParams::from_pairs(vec![("pageSize", "2"), ("page", "9")]))
            .await
            .unwrap();
        let meta = page.meta();
        assert_eq!(meta.total_count, 5);
        assert_eq!(meta.page_count, 3);
        assert_eq!(meta.current_page, 3);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].name, "Account 4");
    }
}
