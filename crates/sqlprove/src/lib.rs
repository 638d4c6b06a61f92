//! # sqlprove
//!
//! A micro data-access layer whose hand-written SQL can be *proven* against a
//! live database schema. Production code builds [`Command`]s with named
//! parameters and promotes them to typed [`Query`]s; a test-path checker (the
//! `sqlprove-verify` crate) intercepts every construction, executes it
//! schema-only, and compares the declared result shape and parameters against
//! what the database reports.
//!
//! - **Fixed primitive set**: `i32`, `i64`, `Decimal`, `Uuid`,
//!   `NaiveDateTime`, `String`, `bool`, int-backed enums, and `Option` of
//!   each; anything else is rejected eagerly.
//! - **Named parameters**: SQL is written with `@name` placeholders and
//!   rewritten to `$n` at execution, so fragments and their parameters
//!   travel together.
//! - **Schema-driven statements**: insert/update/delete text is generated
//!   from introspected table metadata; paged queries come in data/count
//!   pairs.
//! - **Test-value synthesis**: every parameter type enumerates representative
//!   values, so a verification harness can invoke call sites over the full
//!   combination space (or a clustered / first-only subset).

pub mod choice;
pub mod command;
pub mod error;
pub mod exec;
pub mod materialize;
pub mod param;
pub mod query;
pub mod row;
pub mod sql;
pub mod values;

pub use choice::Choice;
pub use command::{BindParams, Command, CommandKind, Param};
pub use error::{LiftError, LiftResult};
pub use exec::{clear_connection_string_fn, open, resolve_connection_string, set_connection_string_fn};
pub use materialize::{plan_for, plan_for_columns, read_rows, resolve_ordinals};
pub use param::{
    Bag, Clustered, DEFAULT_TEXT_SIZE, Deferred, PgValue, SqlType, ToParam, Typed, Varchar,
};
pub use query::{
    HookGuard, NonQuery, NonQueryIntercept, Query, QueryHook, QueryIntercept, ShapeCheck,
    hook_installed, install_hook,
};
pub use row::{
    ColKind, ColumnFact, ColumnShape, FieldShape, FromColumn, IntWidth, PgEnum, RowShape,
    ShapeIssue, check_record, check_single, compatible,
};
pub use sql::{
    Paging, TableColumn, delete_by_key, delete_sql, insert_returning, insert_sql, paged_queries,
    table_columns, update_by_key, update_sql,
};
pub use values::{ArgSet, TestValues, first_only_active, first_value, with_first_only};

#[cfg(feature = "derive")]
pub use sqlprove_derive::{BindParams, PgEnum, RowShape, TestValues};
