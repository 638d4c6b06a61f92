//! Schema-driven statement builders and paging.
//!
//! Insert, update, and delete statements are generated from introspected
//! table metadata (column names, key membership, auto-increment), fetched
//! once per table and cached process-wide. [`paged_queries`] turns one
//! SQL-writing closure into a data/count query pair.

use std::collections::HashMap;
use std::future::Future;
use std::panic::Location;
use std::sync::{Arc, LazyLock, Mutex};

use tokio_postgres::Client;

use crate::command::{BindParams, Command};
use crate::error::{LiftError, LiftResult};
use crate::exec::{open, resolve_connection_string};
use crate::query::{NonQuery, Query};
use crate::row::RowShape;

/// Introspected metadata for one table column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableColumn {
    pub name: String,
    pub is_key: bool,
    pub is_auto_increment: bool,
}

static TABLE_COLUMNS: LazyLock<Mutex<HashMap<String, Arc<Vec<TableColumn>>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

async fn fetch_table_columns(client: &Client, table: &str) -> LiftResult<Vec<TableColumn>> {
    const SQL: &str = "SELECT a.attname AS name, \
                COALESCE(i.indisprimary, false) AS is_key, \
                (a.attidentity <> '' OR COALESCE(pg_get_expr(d.adbin, d.adrelid), '') LIKE 'nextval(%') AS is_auto \
         FROM pg_catalog.pg_attribute a \
         LEFT JOIN pg_catalog.pg_index i \
                ON i.indrelid = a.attrelid AND i.indisprimary AND a.attnum = ANY(i.indkey) \
         LEFT JOIN pg_catalog.pg_attrdef d \
                ON d.adrelid = a.attrelid AND d.adnum = a.attnum \
         WHERE a.attrelid = $1::regclass AND a.attnum > 0 AND NOT a.attisdropped \
         ORDER BY a.attnum";
    let rows = client.query(SQL, &[&table]).await?;
    rows.iter()
        .map(|row| {
            Ok(TableColumn {
                name: row
                    .try_get("name")
                    .map_err(|e| LiftError::decode("name", e.to_string()))?,
                is_key: row
                    .try_get("is_key")
                    .map_err(|e| LiftError::decode("is_key", e.to_string()))?,
                is_auto_increment: row
                    .try_get("is_auto")
                    .map_err(|e| LiftError::decode("is_auto", e.to_string()))?,
            })
        })
        .collect()
}

/// The column metadata for a table, introspected once and cached.
pub async fn table_columns(client: &Client, table: &str) -> LiftResult<Arc<Vec<TableColumn>>> {
    if let Some(columns) = TABLE_COLUMNS.lock().unwrap().get(table) {
        return Ok(Arc::clone(columns));
    }
    let columns = fetch_table_columns(client, table).await?;
    if columns.is_empty() {
        return Err(LiftError::config(format!("table '{table}' has no columns")));
    }
    let columns = Arc::new(columns);
    let mut cache = TABLE_COLUMNS.lock().unwrap();
    Ok(Arc::clone(
        cache.entry(table.to_string()).or_insert(columns),
    ))
}

fn check_bound_columns(
    table: &str,
    columns: &[TableColumn],
    bound: &[&str],
) -> LiftResult<()> {
    for name in bound {
        if !columns.iter().any(|c| c.name == *name) {
            return Err(LiftError::config(format!(
                "parameter '{name}' does not match a column of '{table}'"
            )));
        }
    }
    Ok(())
}

/// The INSERT text for a table: every non-auto-increment column bound by
/// name, returning the single key column.
pub fn insert_sql(table: &str, columns: &[TableColumn], bound: &[&str]) -> LiftResult<String> {
    check_bound_columns(table, columns, bound)?;
    let keys: Vec<&TableColumn> = columns.iter().filter(|c| c.is_key).collect();
    let [key] = keys[..] else {
        return Err(LiftError::config(format!(
            "insert requires exactly one key column on '{table}', found {}",
            keys.len()
        )));
    };
    for column in columns.iter().filter(|c| c.is_auto_increment) {
        if bound.contains(&column.name.as_str()) {
            return Err(LiftError::config(format!(
                "insert into '{table}' binds auto-increment column '{}'",
                column.name
            )));
        }
    }
    let mut names = Vec::new();
    for column in columns.iter().filter(|c| !c.is_auto_increment) {
        if !bound.contains(&column.name.as_str()) {
            return Err(LiftError::config(format!(
                "no bound parameter for column '{}' of '{table}'",
                column.name
            )));
        }
        names.push(column.name.as_str());
    }
    let placeholders: Vec<String> = names.iter().map(|n| format!("@{n}")).collect();
    Ok(format!(
        "INSERT INTO {table} ({}) VALUES ({}) RETURNING {}",
        names.join(", "),
        placeholders.join(", "),
        key.name
    ))
}

fn key_predicate(table: &str, columns: &[TableColumn], bound: &[&str]) -> LiftResult<String> {
    let keys: Vec<&TableColumn> = columns.iter().filter(|c| c.is_key).collect();
    if keys.is_empty() {
        return Err(LiftError::config(format!("'{table}' has no key columns")));
    }
    let mut predicates = Vec::new();
    for key in &keys {
        if !bound.contains(&key.name.as_str()) {
            return Err(LiftError::config(format!(
                "no bound parameter for key column '{}' of '{table}'",
                key.name
            )));
        }
        predicates.push(format!("{} = @{}", key.name, key.name));
    }
    Ok(predicates.join(" AND "))
}

/// The UPDATE text for a table: bound non-key columns in the SET clause,
/// keyed by the full primary key.
pub fn update_sql(table: &str, columns: &[TableColumn], bound: &[&str]) -> LiftResult<String> {
    check_bound_columns(table, columns, bound)?;
    let predicate = key_predicate(table, columns, bound)?;
    let assignments: Vec<String> = columns
        .iter()
        .filter(|c| !c.is_key && bound.contains(&c.name.as_str()))
        .map(|c| format!("{} = @{}", c.name, c.name))
        .collect();
    if assignments.is_empty() {
        return Err(LiftError::config(format!(
            "update of '{table}' binds no non-key columns"
        )));
    }
    Ok(format!(
        "UPDATE {table} SET {} WHERE {predicate}",
        assignments.join(", ")
    ))
}

/// The DELETE text for a table, keyed by the full primary key.
pub fn delete_sql(table: &str, columns: &[TableColumn], bound: &[&str]) -> LiftResult<String> {
    check_bound_columns(table, columns, bound)?;
    for name in bound {
        if columns.iter().any(|c| c.name == *name && !c.is_key) {
            return Err(LiftError::config(format!(
                "delete from '{table}' binds non-key column '{name}'"
            )));
        }
    }
    let predicate = key_predicate(table, columns, bound)?;
    Ok(format!("DELETE FROM {table} WHERE {predicate}"))
}

fn bound_names(command: &Command) -> Vec<String> {
    command.params().iter().map(|p| p.name.clone()).collect()
}

/// Insert a parameter record into a table, returning the generated key.
#[track_caller]
pub fn insert_returning<K, B>(
    table: impl Into<String>,
    params: B,
    connection_string: Option<String>,
) -> impl Future<Output = LiftResult<Query<K>>>
where
    K: RowShape + 'static,
    B: BindParams,
{
    let location = Location::caller();
    let table = table.into();
    async move {
        let config = resolve_connection_string(connection_string.as_deref())?;
        let client = open(&config).await?;
        let columns = table_columns(&client, &table).await?;
        let mut staged = Command::empty();
        staged.bind(&params);
        let bound = bound_names(&staged);
        let bound: Vec<&str> = bound.iter().map(String::as_str).collect();
        let text = insert_sql(&table, &columns, &bound)?;
        Ok(Query::located(
            staged.with_text(text),
            connection_string,
            location,
        ))
    }
}

/// Update a row identified by its key columns.
#[track_caller]
pub fn update_by_key<B: BindParams>(
    table: impl Into<String>,
    params: B,
    connection_string: Option<String>,
) -> impl Future<Output = LiftResult<NonQuery>> {
    let location = Location::caller();
    let table = table.into();
    async move {
        let config = resolve_connection_string(connection_string.as_deref())?;
        let client = open(&config).await?;
        let columns = table_columns(&client, &table).await?;
        let mut staged = Command::empty();
        staged.bind(&params);
        let bound = bound_names(&staged);
        let bound: Vec<&str> = bound.iter().map(String::as_str).collect();
        let text = update_sql(&table, &columns, &bound)?;
        Ok(NonQuery::located(
            staged.with_text(text),
            connection_string,
            location,
        ))
    }
}

/// Delete a row identified by its key columns.
#[track_caller]
pub fn delete_by_key<B: BindParams>(
    table: impl Into<String>,
    params: B,
    connection_string: Option<String>,
) -> impl Future<Output = LiftResult<NonQuery>> {
    let location = Location::caller();
    let table = table.into();
    async move {
        let config = resolve_connection_string(connection_string.as_deref())?;
        let client = open(&config).await?;
        let columns = table_columns(&client, &table).await?;
        let mut staged = Command::empty();
        staged.bind(&params);
        let bound = bound_names(&staged);
        let bound: Vec<&str> = bound.iter().map(String::as_str).collect();
        let text = delete_sql(&table, &columns, &bound)?;
        Ok(NonQuery::located(
            staged.with_text(text),
            connection_string,
            location,
        ))
    }
}

/// A data query and its companion count query.
pub struct Paging<D, C> {
    pub data: D,
    pub count: C,
}

/// Build a page query and its total-count twin from one SQL-writing closure.
///
/// The closure runs twice, once per command, so each command carries its own
/// copy of the parameters. The count reads as `Option<i64>` because computed
/// columns report unknown nullability.
#[track_caller]
pub fn paged_queries<R: RowShape + 'static>(
    write: impl Fn(&mut Command),
    order_by: &str,
    offset: i64,
    page_size: i64,
    connection_string: Option<String>,
) -> Paging<Query<R>, Query<Option<i64>>> {
    let location = Location::caller();

    let mut data = Command::empty();
    write(&mut data);
    data.push_sql(&format!(
        " ORDER BY {order_by} OFFSET @page_offset LIMIT @page_limit"
    ));
    data.add_param("page_offset", &offset)
        .add_param("page_limit", &page_size);

    let mut count = Command::new("SELECT COUNT(*) FROM (");
    write(&mut count);
    count.push_sql(") AS paged");

    Paging {
        data: Query::located(data, connection_string.clone(), location),
        count: Query::located(count, connection_string, location),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post_columns() -> Vec<TableColumn> {
        vec![
            TableColumn {
                name: "post_id".into(),
                is_key: true,
                is_auto_increment: true,
            },
            TableColumn {
                name: "text".into(),
                is_key: false,
                is_auto_increment: false,
            },
            TableColumn {
                name: "creation_date".into(),
                is_key: false,
                is_auto_increment: false,
            },
        ]
    }

    #[test]
    fn insert_skips_auto_increment_and_returns_the_key() {
        let sql = insert_sql("post", &post_columns(), &["text", "creation_date"]).unwrap();
        assert_eq!(
            sql,
            "INSERT INTO post (text, creation_date) VALUES (@text, @creation_date) RETURNING post_id"
        );
    }

    #[test]
    fn insert_requires_every_column_bound() {
        let err = insert_sql("post", &post_columns(), &["text"]).unwrap_err();
        assert!(err.to_string().contains("creation_date"), "{err}");
    }

    #[test]
    fn insert_rejects_unknown_parameters() {
        let err =
            insert_sql("post", &post_columns(), &["text", "creation_date", "oops"]).unwrap_err();
        assert!(err.to_string().contains("oops"), "{err}");
    }

    #[test]
    fn insert_rejects_a_bound_auto_increment_column() {
        // a generated key must not occupy a parameter position
        let err = insert_sql("post", &post_columns(), &["post_id", "text", "creation_date"])
            .unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("auto-increment column 'post_id'"), "{err}");
    }

    #[test]
    fn insert_requires_a_single_key() {
        let mut columns = post_columns();
        columns[0].is_key = false;
        let err = insert_sql("post", &columns, &["text", "creation_date"]).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn update_sets_bound_non_keys_and_filters_on_the_key() {
        let sql = update_sql("post", &post_columns(), &["text", "post_id"]).unwrap();
        assert_eq!(sql, "UPDATE post SET text = @text WHERE post_id = @post_id");
    }

    #[test]
    fn update_requires_the_key_and_a_set_clause() {
        let err = update_sql("post", &post_columns(), &["text"]).unwrap_err();
        assert!(err.to_string().contains("post_id"), "{err}");

        let err = update_sql("post", &post_columns(), &["post_id"]).unwrap_err();
        assert!(err.to_string().contains("non-key"), "{err}");
    }

    #[test]
    fn delete_filters_on_the_key_only() {
        let sql = delete_sql("post", &post_columns(), &["post_id"]).unwrap();
        assert_eq!(sql, "DELETE FROM post WHERE post_id = @post_id");

        let err = delete_sql("post", &post_columns(), &["post_id", "text"]).unwrap_err();
        assert!(err.to_string().contains("non-key"), "{err}");
    }

    #[test]
    fn paged_queries_share_the_inner_sql() {
        let paging = paged_queries::<i32>(
            |cmd| {
                cmd.push_sql("SELECT post_id FROM post WHERE creation_date > @date");
                cmd.add_param("date", &Option::<chrono::NaiveDateTime>::None);
            },
            "post_id",
            20,
            10,
            None,
        );
        assert_eq!(
            paging.data.command().positional_text().unwrap(),
            "SELECT post_id FROM post WHERE creation_date > $1 ORDER BY post_id OFFSET $2 LIMIT $3"
        );
        assert_eq!(
            paging.count.command().positional_text().unwrap(),
            "SELECT COUNT(*) FROM (SELECT post_id FROM post WHERE creation_date > $1) AS paged"
        );
    }
}
