//! PgEnum derive macro implementation
//!
//! Emits the full set of impls an int-backed enum needs to participate in
//! queries: `PgEnum`, `ColumnShape`, `ToParam`, `FromColumn`, `RowShape`,
//! and `TestValues`; the `Option<_>` forms come from blanket impls over
//! `PgEnum` in the `sqlprove` crate.

use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, Result};

use crate::attrs::has_flag;

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;

    let Data::Enum(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            &input,
            "PgEnum can only be derived for enums",
        ));
    };
    if data.variants.is_empty() {
        return Err(syn::Error::new_spanned(
            &input,
            "PgEnum requires at least one variant",
        ));
    }
    let variants: Vec<_> = data
        .variants
        .iter()
        .map(|variant| {
            if !matches!(variant.fields, Fields::Unit) {
                return Err(syn::Error::new_spanned(
                    variant,
                    "PgEnum variants cannot carry data",
                ));
            }
            Ok(&variant.ident)
        })
        .collect::<Result<Vec<_>>>()?;

    let bigint = has_flag(&input.attrs, "bigint");
    let (width, int_ty) = if bigint {
        (quote!(sqlprove::IntWidth::I64), quote!(i64))
    } else {
        (quote!(sqlprove::IntWidth::I32), quote!(i32))
    };
    let to_value = if bigint {
        quote! { sqlprove::PgValue::Int8(value) }
    } else {
        quote! { sqlprove::PgValue::Int4(value.map(|v| v as i32)) }
    };
    let type_name = name.to_string();

    Ok(quote! {
        impl sqlprove::PgEnum for #name {
            const WIDTH: sqlprove::IntWidth = #width;
            const VARIANTS: &'static [Self] = &[#(Self::#variants),*];

            fn to_int(self) -> i64 {
                self as i64
            }

            fn from_int(value: i64) -> sqlprove::LiftResult<Self> {
                #(
                    if value == Self::#variants as i64 {
                        return Ok(Self::#variants);
                    }
                )*
                Err(sqlprove::LiftError::unsupported(format!(
                    "invalid discriminant {} for {}",
                    value, #type_name
                )))
            }
        }

        impl sqlprove::ColumnShape for #name {
            const KIND: sqlprove::ColKind = sqlprove::ColKind::Enum(#width);
        }

        impl sqlprove::ToParam for #name {
            fn to_param(&self) -> sqlprove::PgValue {
                let value = Some(sqlprove::PgEnum::to_int(*self));
                #to_value
            }
        }

        impl sqlprove::FromColumn for #name {
            fn from_column(
                row: &tokio_postgres::Row,
                ordinal: usize,
                name: &str,
            ) -> sqlprove::LiftResult<Self> {
                let value: #int_ty = row
                    .try_get(ordinal)
                    .map_err(|e| sqlprove::LiftError::decode(name, e.to_string()))?;
                <#name as sqlprove::PgEnum>::from_int(value as i64)
            }
        }

        impl sqlprove::RowShape for #name {
            fn check_columns(
                cols: &[sqlprove::ColumnFact],
            ) -> ::std::result::Result<(), sqlprove::ShapeIssue> {
                sqlprove::check_single(
                    #type_name,
                    sqlprove::ColKind::Enum(#width),
                    false,
                    cols,
                )
            }

            fn from_row(
                row: &tokio_postgres::Row,
                _ordinals: &[usize],
            ) -> sqlprove::LiftResult<Self> {
                sqlprove::FromColumn::from_column(row, 0, "0")
            }
        }

        impl sqlprove::TestValues for #name {
            fn test_values() -> ::std::vec::Vec<Self> {
                <#name as sqlprove::PgEnum>::VARIANTS.to_vec()
            }
        }
    })
}
