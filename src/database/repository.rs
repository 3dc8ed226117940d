use std::marker::PhantomData;

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::CallerIdentity;
use crate::database::manager::DatabaseError;
use crate::database::query_builder::{execute, fetch_count, fetch_optional_row, fetch_rows};
use crate::filter::sql::quote_identifier;
use crate::filter::{ScopedQuery, SqlResult};
use crate::resource::descriptor::is_identifier;
use crate::resource::{AttributeKind, Page, Relation, Resource, ResourceDescriptor, Store};

/// Postgres `Store` for one resource table. Records cross the wire as JSON: reads go
/// through `row_to_json`, writes through `jsonb_populate_record`.
pub struct PgStore<R> {
    pool: PgPool,
    table: String,
    id_field: String,
    _resource: PhantomData<fn() -> R>,
}

impl<R: Resource> PgStore<R> {
    pub fn new(pool: PgPool, descriptor: &ResourceDescriptor) -> Self {
        Self {
            pool,
            table: descriptor.table().to_string(),
            id_field: descriptor.id_field().to_string(),
            _resource: PhantomData,
        }
    }

    fn select_by_id_sql(&self, id: Uuid) -> SqlResult {
        SqlResult {
            query: format!(
                "SELECT row_to_json(t) AS row FROM (SELECT * FROM {} WHERE {} = CAST($1 AS uuid)) t",
                quote_identifier(&self.table),
                quote_identifier(&self.id_field)
            ),
            params: vec![Value::String(id.to_string())],
        }
    }

    fn insert_sql(&self, record: Value) -> SqlResult {
        let table = quote_identifier(&self.table);
        SqlResult {
            query: format!(
                "WITH inserted AS (INSERT INTO {table} SELECT * FROM jsonb_populate_record(NULL::{table}, $1) RETURNING *) \
                 SELECT row_to_json(inserted) AS row FROM inserted"
            ),
            params: vec![record],
        }
    }

    fn update_sql(&self, id: Uuid, record: Map<String, Value>) -> Result<SqlResult, DatabaseError> {
        let table = quote_identifier(&self.table);
        let mut columns = Vec::new();
        for key in record.keys().filter(|k| *k != &self.id_field) {
            if !is_identifier(key) {
                return Err(DatabaseError::QueryError(format!("invalid column name: {}", key)));
            }
            columns.push(quote_identifier(key));
        }
        if columns.is_empty() {
            return Err(DatabaseError::QueryError("nothing to update".to_string()));
        }
        let columns = columns.join(", ");

        Ok(SqlResult {
            query: format!(
                "WITH updated AS (UPDATE {table} SET ({columns}) = (SELECT {columns} FROM jsonb_populate_record(NULL::{table}, $1)) \
                 WHERE {id} = CAST($2 AS uuid) RETURNING *) \
                 SELECT row_to_json(updated) AS row FROM updated",
                id = quote_identifier(&self.id_field),
            ),
            params: vec![Value::Object(record), Value::String(id.to_string())],
        })
    }

    fn delete_sql(&self, id: Uuid) -> SqlResult {
        SqlResult {
            query: format!(
                "DELETE FROM {} WHERE {} = CAST($1 AS uuid)",
                quote_identifier(&self.table),
                quote_identifier(&self.id_field)
            ),
            params: vec![Value::String(id.to_string())],
        }
    }

    fn related_owner_sql(relation: &Relation, key: &Value, kind: AttributeKind, owner: &CallerIdentity) -> Option<SqlResult> {
        let owner_key = relation.owner_key.as_ref()?;
        let key_param = match kind.sql_cast() {
            Some(cast) => format!("CAST($1 AS {})", cast),
            None => "$1".to_string(),
        };
        Some(SqlResult {
            query: format!(
                "SELECT COUNT(*) AS count FROM {} WHERE {} = {} AND {} = CAST($2 AS uuid)",
                quote_identifier(&relation.table),
                quote_identifier(&relation.remote_key),
                key_param,
                quote_identifier(owner_key)
            ),
            params: vec![key.clone(), Value::String(owner.user_id().to_string())],
        })
    }

    fn decode(row: Value) -> Result<R, DatabaseError> {
        serde_json::from_value(row).map_err(DatabaseError::Decode)
    }

    fn encode(record: &R) -> Result<Map<String, Value>, DatabaseError> {
        match serde_json::to_value(record).map_err(DatabaseError::Decode)? {
            Value::Object(map) => Ok(map),
            other => Err(DatabaseError::QueryError(format!("record must serialize to an object, got {}", other))),
        }
    }
}

#[async_trait]
impl<R: Resource> Store<R> for PgStore<R> {
    async fn find_page(&self, query: &ScopedQuery) -> Result<Page<R>, DatabaseError> {
        let total_count = fetch_count(&self.pool, &query.to_count_sql()).await?.max(0) as u64;
        let page = query.page().clamp_to(total_count);

        let sql = query.clone().with_page(page).to_sql();
        tracing::debug!("Select page from '{}': {}", self.table, sql.query);

        let items = fetch_rows(&self.pool, &sql)
            .await?
            .into_iter()
            .map(Self::decode)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page { items, total_count, page })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<R>, DatabaseError> {
        fetch_optional_row(&self.pool, &self.select_by_id_sql(id))
            .await?
            .map(Self::decode)
            .transpose()
    }

    async fn insert(&self, record: &R) -> Result<R, DatabaseError> {
        let sql = self.insert_sql(Value::Object(Self::encode(record)?));
        let row = match fetch_optional_row(&self.pool, &sql).await {
            Ok(row) => row,
            Err(DatabaseError::Sqlx(e)) => return Err(DatabaseError::from_write(e, "Record")),
            Err(e) => return Err(e),
        };
        let row = row.ok_or_else(|| DatabaseError::QueryError(format!("insert into '{}' returned no row", self.table)))?;
        Self::decode(row)
    }

    async fn update(&self, record: &R) -> Result<R, DatabaseError> {
        let id = record.id();
        let sql = self.update_sql(id, Self::encode(record)?)?;
        let row = match fetch_optional_row(&self.pool, &sql).await {
            Ok(row) => row,
            Err(DatabaseError::Sqlx(e)) => return Err(DatabaseError::from_write(e, "Record")),
            Err(e) => return Err(e),
        };
        let row = row.ok_or_else(|| DatabaseError::NotFound(format!("Object not found: {}", id)))?;
        Self::decode(row)
    }

    async fn delete(&self, id: Uuid) -> Result<(), DatabaseError> {
        if execute(&self.pool, &self.delete_sql(id)).await? == 0 {
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
        // Relations without an owner column are shared
        let Some(sql) = Self::related_owner_sql(relation, key, kind, owner) else {
            return Ok(true);
        };
        Ok(fetch_count(&self.pool, &sql).await? > 0)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use sqlx::postgres::PgPoolOptions;

    use super::*;
    use crate::resources::Account;

    fn store() -> PgStore<Account> {
        // Never connects; only the SQL builders are exercised
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        PgStore::new(pool, &Account::descriptor().unwrap())
    }

    #[tokio::test]
    async fn test_select_by_id_casts_uuid() {
        let id = Uuid::new_v4();
        let sql = store().select_by_id_sql(id);
        assert_eq!(
            sql.query,
            "SELECT row_to_json(t) AS row FROM (SELECT * FROM \"accounts\" WHERE \"id\" = CAST($1 AS uuid)) t"
        );
        assert_eq!(sql.params, vec![Value::String(id.to_string())]);
    }

    #[tokio::test]
    async fn test_update_sets_every_column_but_id() {
        let id = Uuid::new_v4();
        let record = json!({"id": id, "name": "Wallet", "status": 1});
        let sql = store()
            .update_sql(id, record.as_object().cloned().unwrap_or_default())
            .unwrap();
        assert!(sql
            .query
            .contains("SET (\"name\", \"status\") = (SELECT \"name\", \"status\" FROM jsonb_populate_record(NULL::\"accounts\", $1))"));
        assert!(sql.query.contains("WHERE \"id\" = CAST($2 AS uuid) RETURNING *"));
    }

    #[test]
    fn test_related_owner_check_matches_key_and_owner() {
        let owner = CallerIdentity::new(Uuid::new_v4());
        let account_id = Value::String(Uuid::new_v4().to_string());
        let relation = Relation::new("account", "accounts", "account_id").owned_by("user_id");

        let sql = PgStore::<Account>::related_owner_sql(&relation, &account_id, AttributeKind::Uuid, &owner).unwrap();
        assert_eq!(
            sql.query,
            "SELECT COUNT(*) AS count FROM \"accounts\" WHERE \"id\" = CAST($1 AS uuid) AND \"user_id\" = CAST($2 AS uuid)"
        );
        assert_eq!(sql.params, vec![account_id.clone(), Value::String(owner.user_id().to_string())]);

        let shared = Relation::new("account", "accounts", "account_id");
        assert!(PgStore::<Account>::related_owner_sql(&shared, &account_id, AttributeKind::Uuid, &owner).is_none());
    }

    #[tokio::test]
    async fn test_update_rejects_unsafe_column_names() {
        let record = json!({"name\" = 1; --": "x"});
        let err = store()
            .update_sql(Uuid::new_v4(), record.as_object().cloned().unwrap_or_default())
            .unwrap_err();
        assert!(matches!(err, DatabaseError::QueryError(_)));
    }
}
