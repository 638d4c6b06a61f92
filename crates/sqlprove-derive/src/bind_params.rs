//! BindParams derive macro implementation

use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, Result};

use crate::attrs::{column_name, has_flag};

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "BindParams can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "BindParams can only be derived for structs",
            ));
        }
    };

    let binds: Vec<_> = fields
        .iter()
        .map(|field| {
            let field_name = field.ident.as_ref().unwrap();
            if has_flag(&field.attrs, "flatten") {
                quote! {
                    sqlprove::BindParams::bind(&self.#field_name, command);
                }
            } else {
                let param = column_name(field);
                quote! {
                    command.add_param(#param, &self.#field_name);
                }
            }
        })
        .collect();

    Ok(quote! {
        impl #impl_generics sqlprove::BindParams for #name #ty_generics #where_clause {
            fn bind(&self, command: &mut sqlprove::Command) {
                #(#binds)*
            }
        }
    })
}
