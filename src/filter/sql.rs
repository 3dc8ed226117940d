use serde_json::Value;

use super::scope::ScopedQuery;
use super::types::{FilterOp, Predicate, SqlResult};
use crate::resource::descriptor::AttributeKind;

/// Collects bound parameters and hands out `$n` placeholders.
struct SqlWriter {
    params: Vec<Value>,
}

impl SqlWriter {
    fn new() -> Self {
        Self { params: vec![] }
    }

    fn param(&mut self, value: Value, kind: AttributeKind) -> String {
        self.params.push(value);
        let placeholder = format!("${}", self.params.len());
        match kind.sql_cast() {
            Some(cast) => format!("CAST({} AS {})", placeholder, cast),
            None => placeholder,
        }
    }
}

pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Escape LIKE wildcards so the needle matches literally
pub fn escape_like(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len());
    for c in needle.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

impl ScopedQuery {
    /// One page of rows, each as a JSON object in the `row` column.
    pub fn to_sql(&self) -> SqlResult {
        let mut writer = SqlWriter::new();
        let from_clause = self.build_from_clause(&mut writer);
        let where_clause = self.build_where_clause(&mut writer);
        let page = self.page();

        let inner = [
            format!("SELECT {}.*", quote_identifier(self.table())),
            from_clause,
            format!("WHERE {}", where_clause),
            self.build_order_clause(),
            format!("LIMIT {} OFFSET {}", page.size, page.offset()),
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

        SqlResult {
            query: format!("SELECT row_to_json(t) AS row FROM ({}) t", inner),
            params: writer.params,
        }
    }

    pub fn to_count_sql(&self) -> SqlResult {
        let mut writer = SqlWriter::new();
        let from_clause = self.build_from_clause(&mut writer);
        let where_clause = self.build_where_clause(&mut writer);
        SqlResult {
            query: format!("SELECT COUNT(*) AS count {} WHERE {}", from_clause, where_clause),
            params: writer.params,
        }
    }

    fn build_from_clause(&self, writer: &mut SqlWriter) -> String {
        let table = quote_identifier(self.table());
        let mut clause = format!("FROM {}", table);
        for join in self.joins() {
            let alias = quote_identifier(&join.alias);
            clause.push_str(&format!(
                " LEFT JOIN {} AS {} ON {}.{} = {}.{}",
                quote_identifier(&join.table),
                alias,
                alias,
                quote_identifier(&join.remote_key),
                table,
                quote_identifier(&join.local_key),
            ));
            // Another owner's related row never joins, so its columns stay NULL
            if let Some(owner_key) = &join.owner_key {
                clause.push_str(&format!(
                    " AND {}.{} = {}",
                    alias,
                    quote_identifier(owner_key),
                    writer.param(Value::String(self.owner().owner.user_id().to_string()), AttributeKind::Uuid)
                ));
            }
        }
        clause
    }

    fn build_where_clause(&self, writer: &mut SqlWriter) -> String {
        let mut conditions: Vec<String> = self
            .predicates()
            .iter()
            .map(|p| self.build_condition(p, writer))
            .collect();

        let owner = self.owner();
        conditions.push(format!(
            "{}.{} = {}",
            quote_identifier(self.table()),
            quote_identifier(&owner.column),
            writer.param(Value::String(owner.owner.user_id().to_string()), AttributeKind::Uuid)
        ));

        conditions.join(" AND ")
    }

    fn build_condition(&self, predicate: &Predicate, writer: &mut SqlWriter) -> String {
        let scope = predicate.path.relation.as_deref().unwrap_or(self.table());
        let column = format!("{}.{}", quote_identifier(scope), quote_identifier(&predicate.path.column));

        match &predicate.op {
            FilterOp::Eq(value) => format!("{} = {}", column, writer.param(value.clone(), predicate.kind)),
            FilterOp::In(values) => {
                if values.is_empty() {
                    return "1=0".to_string();
                }
                let params: Vec<String> = values.iter().map(|v| writer.param(v.clone(), predicate.kind)).collect();
                format!("{} IN ({})", column, params.join(", "))
            }
            FilterOp::Contains(needle) => format!(
                "{} LIKE {}",
                column,
                writer.param(Value::String(format!("%{}%", escape_like(needle))), AttributeKind::Text)
            ),
        }
    }

    fn build_order_clause(&self) -> String {
        if self.sort().is_empty() {
            return String::new();
        }
        let table = quote_identifier(self.table());
        let parts: Vec<String> = self
            .sort()
            .iter()
            .map(|s| format!("{}.{} {}", table, quote_identifier(&s.column), s.sort.to_sql()))
            .collect();
        format!("ORDER BY {}", parts.join(", "))
    }
}
