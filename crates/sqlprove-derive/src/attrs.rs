//! Shared `#[lift(...)]` attribute parsing

/// The column/parameter name a field maps to: the `#[lift(column = "...")]`
/// override or the field name itself.
pub fn column_name(field: &syn::Field) -> String {
    for attr in &field.attrs {
        if attr.path().is_ident("lift") {
            if let Ok(nested) = attr.parse_args::<syn::MetaNameValue>() {
                if nested.path.is_ident("column") {
                    if let syn::Expr::Lit(syn::ExprLit {
                        lit: syn::Lit::Str(lit),
                        ..
                    }) = &nested.value
                    {
                        return lit.value();
                    }
                }
            }
        }
    }
    field.ident.as_ref().unwrap().to_string()
}

/// Whether a `#[lift(flag)]` marker is present.
pub fn has_flag(attrs: &[syn::Attribute], flag: &str) -> bool {
    attrs.iter().any(|attr| {
        attr.path().is_ident("lift")
            && attr
                .parse_args::<syn::Path>()
                .is_ok_and(|path| path.is_ident(flag))
    })
}
