//! SQL generation for entity queries and staged writes.
//!
//! Table and column names are quoted but not validated here; the session
//! checks them before building a statement.

use rusqlite::types::Value as SqlValue;
use serde_json::Value;

use crate::orm::{EntityMetadata, EntityQuery};
use crate::types::FieldMap;

use super::values::to_sql;

/// A SQL statement with bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlFragment {
    /// The SQL text.
    pub sql: String,
    /// Bound parameter values.
    pub params: Vec<SqlValue>,
}

impl SqlFragment {
    /// Creates a fragment without parameters.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Adds a parameter and returns its placeholder.
    pub fn add_param(&mut self, param: SqlValue) -> String {
        self.params.push(param);
        format!("?{}", self.params.len())
    }
}

fn quote(name: &str) -> String {
    format!("\"{}\"", name)
}

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// `SELECT` of one row by primary key.
pub fn select_by_id(metadata: &EntityMetadata, identifier: i64) -> SqlFragment {
    let mut fragment = SqlFragment::new("");
    let placeholder = fragment.add_param(SqlValue::Integer(identifier));
    fragment.sql = format!(
        "SELECT * FROM {} WHERE {} = {}",
        quote(&metadata.table),
        quote(&metadata.identifier),
        placeholder
    );
    fragment
}

/// `SELECT` of every row, in primary key order.
pub fn select_all(metadata: &EntityMetadata) -> SqlFragment {
    SqlFragment::new(format!(
        "SELECT * FROM {} ORDER BY {}",
        quote(&metadata.table),
        quote(&metadata.identifier)
    ))
}

/// `SELECT` for a translated query.
///
/// Without explicit order, rows come back in primary key order.
pub fn select_query(metadata: &EntityMetadata, query: &EntityQuery) -> SqlFragment {
    let mut fragment = SqlFragment::new("");
    let mut sql = format!("SELECT * FROM {}", quote(&metadata.table));
    push_filters(&mut fragment, &mut sql, &query.filters);

    let order: Vec<String> = if query.order.is_empty() {
        vec![quote(&metadata.identifier)]
    } else {
        query
            .order
            .iter()
            .map(|key| format!("{} {}", quote(&key.field), key.direction.as_sql()))
            .collect()
    };
    sql.push_str(" ORDER BY ");
    sql.push_str(&order.join(", "));

    match (query.limit, query.offset) {
        (None, None) => {}
        (limit, offset) => {
            let limit = limit.map(saturating_i64).unwrap_or(-1);
            let placeholder = fragment.add_param(SqlValue::Integer(limit));
            sql.push_str(&format!(" LIMIT {}", placeholder));
            if let Some(offset) = offset {
                let placeholder = fragment.add_param(SqlValue::Integer(saturating_i64(offset)));
                sql.push_str(&format!(" OFFSET {}", placeholder));
            }
        }
    }

    fragment.sql = sql;
    fragment
}

/// `SELECT COUNT(*)` for a translated query's filters.
pub fn count_query(metadata: &EntityMetadata, query: &EntityQuery) -> SqlFragment {
    let mut fragment = SqlFragment::new("");
    let mut sql = format!("SELECT COUNT(*) FROM {}", quote(&metadata.table));
    push_filters(&mut fragment, &mut sql, &query.filters);
    fragment.sql = sql;
    fragment
}

fn push_filters(fragment: &mut SqlFragment, sql: &mut String, filters: &[(String, Value)]) {
    let clauses: Vec<String> = filters
        .iter()
        .map(|(field, value)| match value {
            Value::Null => format!("{} IS NULL", quote(field)),
            other => {
                let placeholder = fragment.add_param(to_sql(other));
                format!("{} = {}", quote(field), placeholder)
            }
        })
        .collect();

    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
}

/// `INSERT` of a new row. A null identifier is left for SQLite to assign.
pub fn insert(metadata: &EntityMetadata, fields: &FieldMap) -> SqlFragment {
    let mut fragment = SqlFragment::new("");
    let mut columns = Vec::new();
    let mut placeholders = Vec::new();

    for (column, value) in fields {
        if column == &metadata.identifier && value.is_null() {
            continue;
        }
        columns.push(quote(column));
        placeholders.push(fragment.add_param(to_sql(value)));
    }

    fragment.sql = if columns.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES", quote(&metadata.table))
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote(&metadata.table),
            columns.join(", "),
            placeholders.join(", ")
        )
    };
    fragment
}

/// `UPDATE` of one row by primary key. The identifier column is never set.
pub fn update(metadata: &EntityMetadata, identifier: i64, fields: &FieldMap) -> SqlFragment {
    let mut fragment = SqlFragment::new("");
    let mut assignments: Vec<String> = fields
        .iter()
        .filter(|(column, _)| *column != &metadata.identifier)
        .map(|(column, value)| {
            let placeholder = fragment.add_param(to_sql(value));
            format!("{} = {}", quote(column), placeholder)
        })
        .collect();

    // Nothing to change still has to match the row, so the caller sees a
    // missing row as zero changes.
    if assignments.is_empty() {
        let id = quote(&metadata.identifier);
        assignments.push(format!("{} = {}", id, id));
    }

    let placeholder = fragment.add_param(SqlValue::Integer(identifier));
    fragment.sql = format!(
        "UPDATE {} SET {} WHERE {} = {}",
        quote(&metadata.table),
        assignments.join(", "),
        quote(&metadata.identifier),
        placeholder
    );
    fragment
}

/// `DELETE` of one row by primary key.
pub fn delete(metadata: &EntityMetadata, identifier: i64) -> SqlFragment {
    let mut fragment = SqlFragment::new("");
    let placeholder = fragment.add_param(SqlValue::Integer(identifier));
    fragment.sql = format!(
        "DELETE FROM {} WHERE {} = {}",
        quote(&metadata.table),
        quote(&metadata.identifier),
        placeholder
    );
    fragment
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::types::{OrderBy, SortDirection};

    use super::*;

    fn users() -> EntityMetadata {
        let mut metadata = EntityMetadata::inferred("User");
        metadata.table = "users".to_string();
        metadata
    }

    fn fields(value: Value) -> FieldMap {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_select_query_with_filters_and_paging() {
        let mut query = EntityQuery::all("User");
        query.filters = vec![
            ("status".to_string(), json!("active")),
            ("deleted_at".to_string(), Value::Null),
        ];
        query.order = vec![OrderBy {
            field: "name".to_string(),
            direction: SortDirection::Desc,
        }];
        query.limit = Some(10);
        query.offset = Some(5);

        let fragment = select_query(&users(), &query);

        assert_eq!(
            fragment.sql,
            r#"SELECT * FROM "users" WHERE "status" = ?1 AND "deleted_at" IS NULL ORDER BY "name" DESC LIMIT ?2 OFFSET ?3"#
        );
        assert_eq!(
            fragment.params,
            vec![
                SqlValue::Text("active".to_string()),
                SqlValue::Integer(10),
                SqlValue::Integer(5)
            ]
        );
    }

    #[test]
    fn test_offset_without_limit() {
        let mut query = EntityQuery::all("User");
        query.offset = Some(2);

        let fragment = select_query(&users(), &query);
        assert!(fragment.sql.ends_with(r#"ORDER BY "id" LIMIT ?1 OFFSET ?2"#));
        assert_eq!(fragment.params[0], SqlValue::Integer(-1));
    }

    #[test]
    fn test_count_ignores_paging() {
        let mut query = EntityQuery::all("User");
        query.filters = vec![("age".to_string(), json!(30))];
        query.limit = Some(1);

        let fragment = count_query(&users(), &query);
        assert_eq!(fragment.sql, r#"SELECT COUNT(*) FROM "users" WHERE "age" = ?1"#);
    }

    #[test]
    fn test_insert_skips_null_identifier() {
        let fragment = insert(&users(), &fields(json!({"id": null, "name": "Ann"})));
        assert_eq!(fragment.sql, r#"INSERT INTO "users" ("name") VALUES (?1)"#);

        let fragment = insert(&users(), &FieldMap::new());
        assert_eq!(fragment.sql, r#"INSERT INTO "users" DEFAULT VALUES"#);
    }

    #[test]
    fn test_update_never_sets_identifier() {
        let fragment = update(&users(), 7, &fields(json!({"id": 9, "name": "Bo"})));
        assert_eq!(fragment.sql, r#"UPDATE "users" SET "name" = ?1 WHERE "id" = ?2"#);
        assert_eq!(fragment.params[1], SqlValue::Integer(7));

        let fragment = update(&users(), 7, &fields(json!({"id": 7})));
        assert_eq!(fragment.sql, r#"UPDATE "users" SET "id" = "id" WHERE "id" = ?1"#);
    }

    #[test]
    fn test_delete() {
        let fragment = delete(&users(), 3);
        assert_eq!(fragment.sql, r#"DELETE FROM "users" WHERE "id" = ?1"#);
    }
}
