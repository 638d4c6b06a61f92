//! Ordinal plans: how a shape's fields map onto a statement's columns.
//!
//! A plan is resolved once per (result type, column list) pair and cached
//! process-wide, so repeated executions of the same statement skip the
//! by-name lookups. Losing a cache race just recomputes and discards.

use std::any::TypeId;
use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, LazyLock, Mutex};

use tokio_postgres::{Row, Statement};

use crate::error::{LiftError, LiftResult};
use crate::row::RowShape;

static PLAN_CACHE: LazyLock<Mutex<HashMap<(TypeId, u64), Arc<Vec<usize>>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Resolve each field name to its column position.
pub fn resolve_ordinals(field_names: &[&str], columns: &[&str]) -> LiftResult<Vec<usize>> {
    field_names
        .iter()
        .map(|name| {
            columns
                .iter()
                .position(|c| c == name)
                .ok_or_else(|| LiftError::decode(*name, "column not present in query results"))
        })
        .collect()
}

fn column_key(columns: &[&str]) -> u64 {
    let mut hasher = DefaultHasher::new();
    for column in columns {
        column.hash(&mut hasher);
    }
    hasher.finish()
}

/// The cached ordinal plan for reading `R` out of the given column list.
pub fn plan_for_columns<R: RowShape + 'static>(columns: &[&str]) -> LiftResult<Arc<Vec<usize>>> {
    let key = (TypeId::of::<R>(), column_key(columns));
    if let Some(plan) = PLAN_CACHE.lock().unwrap().get(&key) {
        return Ok(Arc::clone(plan));
    }
    let plan = Arc::new(resolve_ordinals(R::field_names(), columns)?);
    let mut cache = PLAN_CACHE.lock().unwrap();
    Ok(Arc::clone(cache.entry(key).or_insert(plan)))
}

/// The cached ordinal plan for reading `R` out of a prepared statement.
pub fn plan_for<R: RowShape + 'static>(statement: &Statement) -> LiftResult<Arc<Vec<usize>>> {
    let columns: Vec<&str> = statement.columns().iter().map(|c| c.name()).collect();
    plan_for_columns::<R>(&columns)
}

/// Materialize every row through the resolved plan.
pub fn read_rows<R: RowShape>(rows: &[Row], plan: &[usize]) -> LiftResult<Vec<R>> {
    rows.iter().map(|row| R::from_row(row, plan)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::{ColumnFact, ShapeIssue, check_record, FieldShape, ColKind};

    #[test]
    fn ordinals_follow_declaration_order_not_column_order() {
        let plan = resolve_ordinals(&["b", "a"], &["a", "b", "c"]).unwrap();
        assert_eq!(plan, vec![1, 0]);
    }

    #[test]
    fn missing_column_is_a_decode_error() {
        let err = resolve_ordinals(&["missing"], &["a"]).unwrap_err();
        assert!(matches!(err, LiftError::Decode { .. }), "got {err}");
    }

    #[derive(Debug)]
    struct Pair;

    impl RowShape for Pair {
        fn field_names() -> &'static [&'static str] {
            &["x", "y"]
        }

        fn check_columns(cols: &[ColumnFact]) -> Result<(), ShapeIssue> {
            const FIELDS: &[FieldShape] = &[
                FieldShape {
                    name: "x",
                    rust_type: "i32",
                    kind: ColKind::Int4,
                    nullable: false,
                },
                FieldShape {
                    name: "y",
                    rust_type: "i32",
                    kind: ColKind::Int4,
                    nullable: false,
                },
            ];
            check_record(FIELDS, cols)
        }

        fn from_row(_row: &Row, _ordinals: &[usize]) -> LiftResult<Self> {
            Ok(Pair)
        }
    }

    #[test]
    fn plans_are_cached_per_type_and_column_list() {
        let first = plan_for_columns::<Pair>(&["y", "x"]).unwrap();
        let second = plan_for_columns::<Pair>(&["y", "x"]).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(*first, vec![1, 0]);

        let other = plan_for_columns::<Pair>(&["x", "y"]).unwrap();
        assert_eq!(*other, vec![0, 1]);
    }

    #[test]
    fn scalar_plans_are_empty() {
        let plan = plan_for_columns::<i32>(&["n"]).unwrap();
        assert!(plan.is_empty());
    }
}
