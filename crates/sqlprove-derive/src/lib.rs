//! Derive macros for sqlprove
//!
//! Provides `#[derive(RowShape)]`, `#[derive(BindParams)]`,
//! `#[derive(TestValues)]`, and `#[derive(PgEnum)]`.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod attrs;
mod bind_params;
mod pg_enum;
mod row_shape;
mod test_values;

/// Derive `RowShape` for a result struct.
///
/// Each field reads the column of the same name (or the name given with
/// `#[lift(column = "name")]`). Field types must be in the supported
/// primitive set, `Option` of one, or a `#[derive(PgEnum)]` enum.
///
/// # Example
///
/// ```ignore
/// use sqlprove::RowShape;
///
/// #[derive(RowShape)]
/// struct PostRow {
///     post_id: i32,
///     text: Option<String>,
///     creation_date: chrono::NaiveDateTime,
/// }
/// ```
#[proc_macro_derive(RowShape, attributes(lift))]
pub fn derive_row_shape(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    row_shape::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

/// Derive `BindParams` for a parameter record.
///
/// Each field binds as one `@field_name` parameter. `#[lift(column = "name")]`
/// renames the parameter; `#[lift(flatten)]` splices a nested record's
/// parameters in.
#[proc_macro_derive(BindParams, attributes(lift))]
pub fn derive_bind_params(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    bind_params::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

/// Derive `TestValues`.
///
/// For a struct, the value list is the cross product of the fields' lists.
/// For a unit enum, every variant is a value.
#[proc_macro_derive(TestValues, attributes(lift))]
pub fn derive_test_values(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    test_values::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

/// Derive `PgEnum` for a unit enum stored as its underlying integer.
///
/// The enum must also be `Copy`. By default it binds and reads as `integer`;
/// `#[lift(bigint)]` on the enum switches to `bigint`. Binding, shape
/// checking, and test values (every variant) come along.
///
/// # Example
///
/// ```ignore
/// use sqlprove::PgEnum;
///
/// #[derive(Clone, Copy, PgEnum)]
/// enum PostStatus {
///     Draft = 0,
///     Published = 1,
/// }
/// ```
#[proc_macro_derive(PgEnum, attributes(lift))]
pub fn derive_pg_enum(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    pg_enum::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
