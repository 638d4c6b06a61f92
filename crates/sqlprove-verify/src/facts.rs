//! Live-schema probes: column nullability and procedure parameters.
//!
//! Statement description gives column names and types but not nullability;
//! that comes from `pg_catalog.pg_attribute`, fetched in one batch for every
//! table-backed column. Expression columns have no backing attribute and are
//! treated as nullable. Procedure parameters come from
//! `information_schema.parameters`.

use std::collections::HashMap;

use sqlprove::{ColumnFact, SqlType};
use tokio_postgres::types::Oid;
use tokio_postgres::{Client, Column};

use crate::error::CheckResult;

/// Gather what the database reports about each result column.
pub async fn column_facts(client: &Client, columns: &[Column]) -> CheckResult<Vec<ColumnFact>> {
    let mut rels: Vec<Oid> = Vec::new();
    let mut nums: Vec<i16> = Vec::new();
    for column in columns {
        if let (Some(rel), Some(num)) = (column.table_oid(), column.column_id())
            && rel != 0
            && num > 0
        {
            rels.push(rel);
            nums.push(num);
        }
    }

    let mut not_null: HashMap<(Oid, i16), bool> = HashMap::new();
    if !rels.is_empty() {
        const SQL: &str = "SELECT attrelid, attnum, attnotnull \
             FROM pg_catalog.pg_attribute \
             WHERE attrelid = ANY($1) AND attnum = ANY($2)";
        let rows = client.query(SQL, &[&rels, &nums]).await?;
        for row in rows {
            let rel: Oid = row.try_get(0)?;
            let num: i16 = row.try_get(1)?;
            let attnotnull: bool = row.try_get(2)?;
            not_null.insert((rel, num), attnotnull);
        }
    }

    Ok(columns
        .iter()
        .map(|column| {
            let nullable = !not_null
                .get(&(
                    column.table_oid().unwrap_or(0),
                    column.column_id().unwrap_or(0),
                ))
                .copied()
                .unwrap_or(false);
            ColumnFact::new(column.name(), column.type_().clone(), nullable)
        })
        .collect())
}

/// A procedure parameter as the database declares it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcParam {
    pub name: String,
    pub data_type: String,
    /// Declared character length; `-1` when unbounded.
    pub size: i32,
}

/// The declared IN/INOUT parameters of a procedure in the current schema.
pub async fn derive_proc_params(client: &Client, procedure: &str) -> CheckResult<Vec<ProcParam>> {
    const SQL: &str = "SELECT COALESCE(p.parameter_name, '')::text AS name, \
                p.data_type::text AS data_type, \
                COALESCE(p.character_maximum_length, -1)::int4 AS size \
         FROM information_schema.parameters p \
         JOIN information_schema.routines r \
                ON r.specific_schema = p.specific_schema \
               AND r.specific_name = p.specific_name \
         WHERE r.routine_schema = current_schema() \
           AND r.routine_name = $1 \
           AND p.parameter_mode IN ('IN', 'INOUT') \
         ORDER BY p.ordinal_position";
    let rows = client.query(SQL, &[&procedure]).await?;
    rows.iter()
        .map(|row| {
            Ok(ProcParam {
                name: row.try_get("name")?,
                data_type: row.try_get("data_type")?,
                size: row.try_get("size")?,
            })
        })
        .collect()
}

/// Map an `information_schema` type name onto the supported primitive set.
pub fn sql_type_from_pg(data_type: &str) -> Option<SqlType> {
    match data_type {
        "integer" => Some(SqlType::Int),
        "bigint" => Some(SqlType::BigInt),
        "numeric" => Some(SqlType::Numeric),
        "uuid" => Some(SqlType::Uuid),
        "timestamp without time zone" => Some(SqlType::Timestamp),
        "text" => Some(SqlType::Text),
        "character varying" => Some(SqlType::Varchar),
        "boolean" => Some(SqlType::Bool),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_type_names_map_onto_the_primitive_set() {
        assert_eq!(sql_type_from_pg("integer"), Some(SqlType::Int));
        assert_eq!(
            sql_type_from_pg("timestamp without time zone"),
            Some(SqlType::Timestamp)
        );
        assert_eq!(sql_type_from_pg("character varying"), Some(SqlType::Varchar));
        assert_eq!(sql_type_from_pg("tsvector"), None);
    }
}
