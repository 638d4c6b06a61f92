//! Result shapes and their compatibility with observed columns.
//!
//! A [`RowShape`] describes how a result type reads rows: scalars and
//! optional scalars read column 0; records resolve each field's ordinal by
//! column name. The same shape information drives the schema check: every
//! declared field must find a column of a compatible type and nullability,
//! and every returned column must be consumed.

use std::collections::HashSet;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use thiserror::Error;
use tokio_postgres::Row;
use tokio_postgres::types::Type;
use uuid::Uuid;

use crate::error::{LiftError, LiftResult};

/// Width of an int-backed enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntWidth {
    I32,
    I64,
}

/// The declared column kind of a result field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColKind {
    Int4,
    Int8,
    Numeric,
    Uuid,
    Timestamp,
    Text,
    Bool,
    Enum(IntWidth),
}

/// What the database reports about one result column.
#[derive(Debug, Clone)]
pub struct ColumnFact {
    pub name: String,
    pub pg_type: Type,
    pub nullable: bool,
}

impl ColumnFact {
    pub fn new(name: impl Into<String>, pg_type: Type, nullable: bool) -> Self {
        ColumnFact {
            name: name.into(),
            pg_type,
            nullable,
        }
    }
}

/// Static description of one declared result field.
#[derive(Debug, Clone, Copy)]
pub struct FieldShape {
    /// Column name this field reads.
    pub name: &'static str,
    /// Rust type as written, for diagnostics.
    pub rust_type: &'static str,
    pub kind: ColKind,
    pub nullable: bool,
}

/// A mismatch between a declared shape and the observed columns.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ShapeIssue {
    #[error("field '{field}' not found in query results")]
    FieldNotFound { field: String },

    #[error("field '{field}' declared as {declared} does not match column type {column_type}")]
    TypeMismatch {
        field: String,
        declared: &'static str,
        column_type: String,
    },

    #[error("field '{field}' declared as non-optional {declared} but the column is nullable")]
    NullabilityMismatch {
        field: String,
        declared: &'static str,
    },

    #[error("query returns {total} columns but only {consumed} are consumed")]
    FieldCountMismatch { consumed: usize, total: usize },
}

/// Whether a declared kind can read the given column type.
///
/// Int-backed enums read their underlying integer type; `String` reads any
/// of the textual column types.
pub fn compatible(kind: ColKind, ty: &Type) -> bool {
    match kind {
        ColKind::Int4 | ColKind::Enum(IntWidth::I32) => *ty == Type::INT4,
        ColKind::Int8 | ColKind::Enum(IntWidth::I64) => *ty == Type::INT8,
        ColKind::Numeric => *ty == Type::NUMERIC,
        ColKind::Uuid => *ty == Type::UUID,
        ColKind::Timestamp => *ty == Type::TIMESTAMP,
        ColKind::Text => *ty == Type::TEXT || *ty == Type::VARCHAR || *ty == Type::BPCHAR,
        ColKind::Bool => *ty == Type::BOOL,
    }
}

fn check_one(
    field: &str,
    rust_type: &'static str,
    kind: ColKind,
    nullable: bool,
    col: &ColumnFact,
) -> Result<(), ShapeIssue> {
    if !compatible(kind, &col.pg_type) {
        return Err(ShapeIssue::TypeMismatch {
            field: field.to_string(),
            declared: rust_type,
            column_type: col.pg_type.to_string(),
        });
    }
    if col.nullable && !nullable {
        return Err(ShapeIssue::NullabilityMismatch {
            field: field.to_string(),
            declared: rust_type,
        });
    }
    Ok(())
}

/// Check a record shape: every field finds a compatible column by name, and
/// every column is consumed by some field.
pub fn check_record(fields: &[FieldShape], cols: &[ColumnFact]) -> Result<(), ShapeIssue> {
    let mut consumed = HashSet::new();
    for field in fields {
        let Some(ordinal) = cols.iter().position(|c| c.name == field.name) else {
            return Err(ShapeIssue::FieldNotFound {
                field: field.name.to_string(),
            });
        };
        consumed.insert(ordinal);
        check_one(
            field.name,
            field.rust_type,
            field.kind,
            field.nullable,
            &cols[ordinal],
        )?;
    }
    if consumed.len() != cols.len() {
        return Err(ShapeIssue::FieldCountMismatch {
            consumed: consumed.len(),
            total: cols.len(),
        });
    }
    Ok(())
}

/// Check a single-column shape against the observed columns.
pub fn check_single(
    rust_type: &'static str,
    kind: ColKind,
    nullable: bool,
    cols: &[ColumnFact],
) -> Result<(), ShapeIssue> {
    if cols.len() != 1 {
        return Err(ShapeIssue::FieldCountMismatch {
            consumed: cols.len().min(1),
            total: cols.len(),
        });
    }
    check_one(&cols[0].name, rust_type, kind, nullable, &cols[0])
}

/// Declared kind and nullability of a single-column value.
pub trait ColumnShape {
    const KIND: ColKind;
    const NULLABLE: bool = false;
}

impl<T: ColumnShape> ColumnShape for Option<T> {
    const KIND: ColKind = T::KIND;
    const NULLABLE: bool = true;
}

/// Read one column of a row, with the column name for diagnostics.
pub trait FromColumn: Sized {
    fn from_column(row: &Row, ordinal: usize, name: &str) -> LiftResult<Self>;
}

/// How a result type materializes from rows.
///
/// `field_names` is empty for single-column shapes, which always read
/// ordinal 0; record shapes get their resolved ordinals in declaration
/// order.
pub trait RowShape: Sized {
    fn field_names() -> &'static [&'static str] {
        &[]
    }

    fn check_columns(cols: &[ColumnFact]) -> Result<(), ShapeIssue>;

    fn from_row(row: &Row, ordinals: &[usize]) -> LiftResult<Self>;
}

macro_rules! impl_scalar_shapes {
    ($($ty:ty => $kind:expr),+ $(,)?) => {
        $(
            impl ColumnShape for $ty {
                const KIND: ColKind = $kind;
            }

            impl FromColumn for $ty {
                fn from_column(row: &Row, ordinal: usize, name: &str) -> LiftResult<Self> {
                    row.try_get(ordinal)
                        .map_err(|e| LiftError::decode(name, e.to_string()))
                }
            }

            impl FromColumn for Option<$ty> {
                fn from_column(row: &Row, ordinal: usize, name: &str) -> LiftResult<Self> {
                    row.try_get(ordinal)
                        .map_err(|e| LiftError::decode(name, e.to_string()))
                }
            }

            impl RowShape for $ty {
                fn check_columns(cols: &[ColumnFact]) -> Result<(), ShapeIssue> {
                    check_single(stringify!($ty), $kind, false, cols)
                }

                fn from_row(row: &Row, _ordinals: &[usize]) -> LiftResult<Self> {
                    FromColumn::from_column(row, 0, "0")
                }
            }

            impl RowShape for Option<$ty> {
                fn check_columns(cols: &[ColumnFact]) -> Result<(), ShapeIssue> {
                    check_single(concat!("Option<", stringify!($ty), ">"), $kind, true, cols)
                }

                fn from_row(row: &Row, _ordinals: &[usize]) -> LiftResult<Self> {
                    FromColumn::from_column(row, 0, "0")
                }
            }
        )+
    };
}

impl_scalar_shapes! {
    i32 => ColKind::Int4,
    i64 => ColKind::Int8,
    Decimal => ColKind::Numeric,
    Uuid => ColKind::Uuid,
    NaiveDateTime => ColKind::Timestamp,
    String => ColKind::Text,
    bool => ColKind::Bool,
}

/// An enum stored as its underlying integer.
///
/// Implemented by `#[derive(PgEnum)]`, which also wires up binding, shape
/// checking, and test-value synthesis for the enum.
pub trait PgEnum: Sized + Copy + 'static {
    const WIDTH: IntWidth;
    const VARIANTS: &'static [Self];

    fn to_int(self) -> i64;

    fn from_int(value: i64) -> LiftResult<Self>;
}

impl<T: PgEnum> FromColumn for Option<T> {
    fn from_column(row: &Row, ordinal: usize, name: &str) -> LiftResult<Self> {
        let value: Option<i64> = match T::WIDTH {
            IntWidth::I32 => {
                let value: Option<i32> = row
                    .try_get(ordinal)
                    .map_err(|e| LiftError::decode(name, e.to_string()))?;
                value.map(i64::from)
            }
            IntWidth::I64 => row
                .try_get(ordinal)
                .map_err(|e| LiftError::decode(name, e.to_string()))?,
        };
        value.map(T::from_int).transpose()
    }
}

impl<T: PgEnum> RowShape for Option<T> {
    fn check_columns(cols: &[ColumnFact]) -> Result<(), ShapeIssue> {
        check_single(
            std::any::type_name::<Option<T>>(),
            ColKind::Enum(T::WIDTH),
            true,
            cols,
        )
    }

    fn from_row(row: &Row, _ordinals: &[usize]) -> LiftResult<Self> {
        FromColumn::from_column(row, 0, "0")
    }
}
