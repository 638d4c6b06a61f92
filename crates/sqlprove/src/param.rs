//! Parameter values and the wrappers that shape them.
//!
//! Every parameter a command binds is one of a fixed set of primitives,
//! carried as a [`PgValue`]. Each variant holds an `Option` so a NULL still
//! binds with a declared SQL type. Text values carry a size: the default is
//! [`DEFAULT_TEXT_SIZE`], `-1` means unbounded. Anything outside the fixed
//! set is rejected eagerly rather than inferred.

use std::ops::Deref;
use std::sync::Arc;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use tokio_postgres::types::{IsNull, ToSql, Type, to_sql_checked};
use uuid::Uuid;

use crate::row::{IntWidth, PgEnum};

/// Default declared size for text parameters, matching the common
/// declared-width convention for string columns.
pub const DEFAULT_TEXT_SIZE: i32 = 4000;

/// Declared SQL type of a bound parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Int,
    BigInt,
    Numeric,
    Uuid,
    Timestamp,
    Text,
    Varchar,
    Bool,
}

impl SqlType {
    /// Human-readable name used in mismatch messages.
    pub fn name(self) -> &'static str {
        match self {
            SqlType::Int => "integer",
            SqlType::BigInt => "bigint",
            SqlType::Numeric => "numeric",
            SqlType::Uuid => "uuid",
            SqlType::Timestamp => "timestamp",
            SqlType::Text => "text",
            SqlType::Varchar => "character varying",
            SqlType::Bool => "boolean",
        }
    }

    /// Whether parameter sizes apply to this type.
    pub fn is_textual(self) -> bool {
        matches!(self, SqlType::Text | SqlType::Varchar)
    }
}

/// A parameter value with its declared SQL type.
///
/// `Text` binds as unbounded-capable text, `Varchar` as narrow
/// `character varying`; both carry a declared size.
#[derive(Debug, Clone, PartialEq)]
pub enum PgValue {
    Int4(Option<i32>),
    Int8(Option<i64>),
    Numeric(Option<Decimal>),
    Uuid(Option<Uuid>),
    Timestamp(Option<NaiveDateTime>),
    Text { value: Option<String>, size: i32 },
    Varchar { value: Option<String>, size: i32 },
    Bool(Option<bool>),
}

fn text_size(value: &Option<String>) -> i32 {
    match value {
        Some(s) if s.len() > DEFAULT_TEXT_SIZE as usize => s.len() as i32,
        _ => DEFAULT_TEXT_SIZE,
    }
}

impl PgValue {
    /// A text value with the default size rule (at least [`DEFAULT_TEXT_SIZE`],
    /// grown to fit longer values).
    pub fn text(value: Option<String>) -> Self {
        let size = text_size(&value);
        PgValue::Text { value, size }
    }

    /// A text value with an explicit declared size (`-1` = unbounded).
    pub fn text_sized(value: Option<String>, size: i32) -> Self {
        PgValue::Text { value, size }
    }

    /// An unbounded text value.
    pub fn text_unbounded(value: Option<String>) -> Self {
        PgValue::Text { value, size: -1 }
    }

    /// A narrow `character varying` value with the default size rule.
    pub fn varchar(value: Option<String>) -> Self {
        let size = text_size(&value);
        PgValue::Varchar { value, size }
    }

    /// The declared SQL type of this value.
    pub fn sql_type(&self) -> SqlType {
        match self {
            PgValue::Int4(_) => SqlType::Int,
            PgValue::Int8(_) => SqlType::BigInt,
            PgValue::Numeric(_) => SqlType::Numeric,
            PgValue::Uuid(_) => SqlType::Uuid,
            PgValue::Timestamp(_) => SqlType::Timestamp,
            PgValue::Text { .. } => SqlType::Text,
            PgValue::Varchar { .. } => SqlType::Varchar,
            PgValue::Bool(_) => SqlType::Bool,
        }
    }

    /// The declared size, for textual values.
    pub fn size(&self) -> Option<i32> {
        match self {
            PgValue::Text { size, .. } | PgValue::Varchar { size, .. } => Some(*size),
            _ => None,
        }
    }

    /// Whether this value binds as NULL.
    pub fn is_null(&self) -> bool {
        match self {
            PgValue::Int4(v) => v.is_none(),
            PgValue::Int8(v) => v.is_none(),
            PgValue::Numeric(v) => v.is_none(),
            PgValue::Uuid(v) => v.is_none(),
            PgValue::Timestamp(v) => v.is_none(),
            PgValue::Text { value, .. } => value.is_none(),
            PgValue::Varchar { value, .. } => value.is_none(),
            PgValue::Bool(v) => v.is_none(),
        }
    }

    /// Re-declare this value under another SQL type.
    ///
    /// Converts between the textual kinds and widens `integer` to `bigint`.
    /// An incompatible declaration keeps the inferred binding; the schema
    /// checker flags it against the database if it matters.
    pub fn declare(self, sql_type: SqlType) -> PgValue {
        match (self, sql_type) {
            (PgValue::Text { value, size }, SqlType::Varchar) => PgValue::Varchar { value, size },
            (PgValue::Varchar { value, size }, SqlType::Text) => PgValue::Text { value, size },
            (PgValue::Int4(v), SqlType::BigInt) => PgValue::Int8(v.map(i64::from)),
            (value, _) => value,
        }
    }
}

impl ToSql for PgValue {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut bytes::BytesMut,
    ) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            PgValue::Int4(v) => v.to_sql(ty, out),
            PgValue::Int8(v) => v.to_sql(ty, out),
            PgValue::Numeric(v) => v.to_sql(ty, out),
            PgValue::Uuid(v) => v.to_sql(ty, out),
            PgValue::Timestamp(v) => v.to_sql(ty, out),
            PgValue::Text { value, .. } | PgValue::Varchar { value, .. } => value.to_sql(ty, out),
            PgValue::Bool(v) => v.to_sql(ty, out),
        }
    }

    // The wire type is whatever the server inferred for the placeholder;
    // type agreement is the schema checker's job, not the encoder's.
    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

/// Conversion of a Rust value into a bound [`PgValue`].
pub trait ToParam {
    fn to_param(&self) -> PgValue;
}

macro_rules! impl_to_param_copy {
    ($($ty:ty => $variant:ident),+ $(,)?) => {
        $(
            impl ToParam for $ty {
                fn to_param(&self) -> PgValue {
                    PgValue::$variant(Some(*self))
                }
            }

            impl ToParam for Option<$ty> {
                fn to_param(&self) -> PgValue {
                    PgValue::$variant(*self)
                }
            }
        )+
    };
}

impl_to_param_copy! {
    i32 => Int4,
    i64 => Int8,
    Decimal => Numeric,
    Uuid => Uuid,
    NaiveDateTime => Timestamp,
    bool => Bool,
}

impl ToParam for String {
    fn to_param(&self) -> PgValue {
        PgValue::text(Some(self.clone()))
    }
}

impl ToParam for Option<String> {
    fn to_param(&self) -> PgValue {
        PgValue::text(self.clone())
    }
}

impl ToParam for &str {
    fn to_param(&self) -> PgValue {
        PgValue::text(Some((*self).to_string()))
    }
}

impl ToParam for PgValue {
    fn to_param(&self) -> PgValue {
        self.clone()
    }
}

impl<T: PgEnum> ToParam for Option<T> {
    fn to_param(&self) -> PgValue {
        let value = self.map(PgEnum::to_int);
        match T::WIDTH {
            IntWidth::I32 => PgValue::Int4(value.map(|v| v as i32)),
            IntWidth::I64 => PgValue::Int8(value),
        }
    }
}

/// A string bound as narrow `character varying` rather than text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Varchar(pub String);

impl Varchar {
    pub fn new(value: impl Into<String>) -> Self {
        Varchar(value.into())
    }
}

impl ToParam for Varchar {
    fn to_param(&self) -> PgValue {
        PgValue::varchar(Some(self.0.clone()))
    }
}

impl ToParam for Option<Varchar> {
    fn to_param(&self) -> PgValue {
        PgValue::varchar(self.as_ref().map(|v| v.0.clone()))
    }
}

/// A value whose SQL type is declared rather than inferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Typed<T> {
    pub value: T,
    pub sql_type: SqlType,
}

impl<T> Typed<T> {
    pub fn new(value: T, sql_type: SqlType) -> Self {
        Typed { value, sql_type }
    }
}

impl<T: ToParam> ToParam for Typed<T> {
    fn to_param(&self) -> PgValue {
        self.value.to_param().declare(self.sql_type)
    }
}

/// Marks a call-site parameter for the combinator's cluster rule: when any
/// parameter is clustered, each clustered position is varied through its full
/// value list while every other position stays at its first value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Clustered<T>(pub T);

impl<T> Deref for Clustered<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: ToParam> ToParam for Clustered<T> {
    fn to_param(&self) -> PgValue {
        self.0.to_param()
    }
}

/// A record whose fields each bind as one named parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bag<T>(pub T);

impl<T> Deref for Bag<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

/// A deferred parameter value, evaluated at bind time.
pub type Deferred<T> = Arc<dyn Fn() -> T + Send + Sync>;

impl<T: ToParam> ToParam for Deferred<T> {
    fn to_param(&self) -> PgValue {
        (self)().to_param()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_values_keep_their_declared_type() {
        let v: Option<i32> = None;
        assert_eq!(v.to_param().sql_type(), SqlType::Int);
        assert!(v.to_param().is_null());

        let s: Option<String> = None;
        assert_eq!(s.to_param().sql_type(), SqlType::Text);
        assert_eq!(s.to_param().size(), Some(DEFAULT_TEXT_SIZE));
    }

    #[test]
    fn text_size_grows_past_default() {
        let short = "abc".to_string().to_param();
        assert_eq!(short.size(), Some(DEFAULT_TEXT_SIZE));

        let long = "x".repeat(5000).to_param();
        assert_eq!(long.size(), Some(5000));
    }

    #[test]
    fn varchar_binds_narrow() {
        let v = Varchar::new("abc").to_param();
        assert_eq!(v.sql_type(), SqlType::Varchar);
        assert_eq!(v.size(), Some(DEFAULT_TEXT_SIZE));
    }

    #[test]
    fn declare_converts_between_text_kinds() {
        let v = PgValue::text(Some("abc".into())).declare(SqlType::Varchar);
        assert_eq!(v.sql_type(), SqlType::Varchar);

        let widened = 1_i32.to_param().declare(SqlType::BigInt);
        assert_eq!(widened, PgValue::Int8(Some(1)));
    }

    #[test]
    fn declare_keeps_incompatible_inference() {
        let v = true.to_param().declare(SqlType::Uuid);
        assert_eq!(v.sql_type(), SqlType::Bool);
    }

    #[test]
    fn typed_and_clustered_delegate() {
        let t = Typed::new("abc".to_string(), SqlType::Varchar);
        assert_eq!(t.to_param().sql_type(), SqlType::Varchar);

        let c = Clustered(Some(3_i32));
        assert_eq!(c.to_param(), PgValue::Int4(Some(3)));
    }

    #[test]
    fn deferred_evaluates_at_bind() {
        let d: Deferred<i32> = Arc::new(|| 42);
        assert_eq!(d.to_param(), PgValue::Int4(Some(42)));
    }
}
