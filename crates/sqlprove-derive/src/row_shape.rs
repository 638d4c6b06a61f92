//! RowShape derive macro implementation

use proc_macro2::TokenStream;
use quote::{ToTokens, quote};
use syn::{Data, DeriveInput, Fields, Result};

use crate::attrs::column_name;

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "RowShape can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "RowShape can only be derived for structs",
            ));
        }
    };

    let columns: Vec<String> = fields.iter().map(column_name).collect();

    let shapes: Vec<_> = fields
        .iter()
        .zip(&columns)
        .map(|(field, column)| {
            let ty = &field.ty;
            let rust_type = field.ty.to_token_stream().to_string().replace(' ', "");
            quote! {
                sqlprove::FieldShape {
                    name: #column,
                    rust_type: #rust_type,
                    kind: <#ty as sqlprove::ColumnShape>::KIND,
                    nullable: <#ty as sqlprove::ColumnShape>::NULLABLE,
                }
            }
        })
        .collect();

    let reads: Vec<_> = fields
        .iter()
        .zip(&columns)
        .enumerate()
        .map(|(index, (field, column))| {
            let field_name = field.ident.as_ref().unwrap();
            let ty = &field.ty;
            quote! {
                #field_name: <#ty as sqlprove::FromColumn>::from_column(row, ordinals[#index], #column)?
            }
        })
        .collect();

    Ok(quote! {
        impl #impl_generics sqlprove::RowShape for #name #ty_generics #where_clause {
            fn field_names() -> &'static [&'static str] {
                &[#(#columns),*]
            }

            fn check_columns(
                cols: &[sqlprove::ColumnFact],
            ) -> ::std::result::Result<(), sqlprove::ShapeIssue> {
                let fields: &[sqlprove::FieldShape] = &[#(#shapes),*];
                sqlprove::check_record(fields, cols)
            }

            fn from_row(
                row: &tokio_postgres::Row,
                ordinals: &[usize],
            ) -> sqlprove::LiftResult<Self> {
                Ok(Self {
                    #(#reads),*
                })
            }
        }
    })
}
