//! TestValues derive macro implementation

use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, Result};

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let body = match &input.data {
        Data::Struct(data) => {
            let fields = match &data.fields {
                Fields::Named(fields) => &fields.named,
                Fields::Unit => {
                    return Ok(quote! {
                        impl #impl_generics sqlprove::TestValues for #name #ty_generics #where_clause {
                            fn test_values() -> ::std::vec::Vec<Self> {
                                vec![Self]
                            }
                        }
                    });
                }
                Fields::Unnamed(_) => {
                    return Err(syn::Error::new_spanned(
                        &input,
                        "TestValues can only be derived for structs with named fields",
                    ));
                }
            };

            let idents: Vec<_> = fields
                .iter()
                .map(|field| field.ident.as_ref().unwrap())
                .collect();
            let gather: Vec<_> = fields
                .iter()
                .map(|field| {
                    let ident = field.ident.as_ref().unwrap();
                    let ty = &field.ty;
                    quote! {
                        let #ident = <#ty as sqlprove::TestValues>::test_values();
                    }
                })
                .collect();

            // nested loops, one per field, rightmost fastest
            let mut loops = quote! {
                rows.push(Self {
                    #(#idents: #idents.clone(),)*
                });
            };
            for ident in idents.iter().rev() {
                loops = quote! {
                    for #ident in #ident.iter() {
                        #loops
                    }
                };
            }

            quote! {
                #(#gather)*
                let mut rows = ::std::vec::Vec::new();
                #loops
                rows
            }
        }
        Data::Enum(data) => {
            if data.variants.is_empty() {
                return Err(syn::Error::new_spanned(
                    &input,
                    "TestValues cannot be derived for an empty enum",
                ));
            }
            let variants: Vec<_> = data
                .variants
                .iter()
                .map(|variant| {
                    if !matches!(variant.fields, Fields::Unit) {
                        return Err(syn::Error::new_spanned(
                            variant,
                            "TestValues can only be derived for unit enum variants",
                        ));
                    }
                    Ok(&variant.ident)
                })
                .collect::<Result<_>>()?;
            quote! {
                vec![#(Self::#variants),*]
            }
        }
        Data::Union(_) => {
            return Err(syn::Error::new_spanned(
                &input,
                "TestValues cannot be derived for unions",
            ));
        }
    };

    Ok(quote! {
        impl #impl_generics sqlprove::TestValues for #name #ty_generics #where_clause {
            fn test_values() -> ::std::vec::Vec<Self> {
                #body
            }
        }
    })
}
