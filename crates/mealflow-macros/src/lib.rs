//! Procedural macros for the mealflow workflow engine.
//!
//! # HasSubjectId Derive Macro
//!
//! Implements `HasSubjectId` for commands that target a single request.
//!
//! ## Usage
//!
//! ```ignore
//! #[derive(HasSubjectId)]
//! #[subject_id(subject_id)] // default field for every variant
//! enum MenuCommand {
//!     Submit { subject_id: SubjectId, actor: Actor },
//!     Cancel { subject_id: SubjectId, dates: Vec<Date> },
//!     #[subject_id(request)] // per-variant override
//!     Repair { request: SubjectId },
//! }
//!
//! #[derive(HasSubjectId)]
//! #[subject_id(id)]
//! struct Reopen {
//!     id: SubjectId,
//! }
//! ```
//!
//! The field must be a `SubjectId` or a `uuid::Uuid`.

use proc_macro::TokenStream;
use quote::quote;
use syn::{
    Attribute, Data, DeriveInput, Fields, FieldsNamed, Ident, Variant, parse_macro_input,
    spanned::Spanned,
};

/// Derives `HasSubjectId` for an enum or a struct with named fields.
#[proc_macro_derive(HasSubjectId, attributes(subject_id))]
pub fn derive_has_subject_id(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match expand(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let default_field = subject_id_attr(&input.attrs)?;

    let body = match &input.data {
        Data::Enum(data) => {
            let mut arms = Vec::with_capacity(data.variants.len());
            for variant in &data.variants {
                let field = variant_field(variant, default_field.as_ref())?;
                arms.push(enum_arm(name, variant, &field)?);
            }
            quote! {
                match self {
                    #(#arms)*
                }
            }
        }
        Data::Struct(data) => {
            let Some(field) = default_field else {
                return Err(syn::Error::new(
                    input.span(),
                    "structs deriving HasSubjectId need #[subject_id(field_name)]",
                ));
            };
            let Fields::Named(named) = &data.fields else {
                return Err(syn::Error::new(
                    input.span(),
                    "HasSubjectId can only be derived for structs with named fields",
                ));
            };
            ensure_field(named, &field, &name.to_string(), input.span())?;
            quote! {
                ::mealflow::SubjectId::from(self.#field)
            }
        }
        Data::Union(_) => {
            return Err(syn::Error::new(
                input.span(),
                "HasSubjectId cannot be derived for unions",
            ));
        }
    };

    Ok(quote! {
        impl ::mealflow::HasSubjectId for #name {
            fn subject_id(&self) -> ::mealflow::SubjectId {
                #body
            }
        }
    })
}

/// Reads the field name out of `#[subject_id(field_name)]`.
fn subject_id_attr(attrs: &[Attribute]) -> syn::Result<Option<Ident>> {
    for attr in attrs {
        if attr.path().is_ident("subject_id") {
            return attr.parse_args().map(Some);
        }
    }
    Ok(None)
}

fn variant_field(variant: &Variant, default_field: Option<&Ident>) -> syn::Result<Ident> {
    if let Some(field) = subject_id_attr(&variant.attrs)? {
        return Ok(field);
    }

    default_field.cloned().ok_or_else(|| {
        syn::Error::new(
            variant.span(),
            format!(
                "variant `{}` has no #[subject_id(field)] attribute and the enum sets no default",
                variant.ident
            ),
        )
    })
}

fn ensure_field(
    fields: &FieldsNamed,
    field: &Ident,
    owner: &str,
    span: proc_macro2::Span,
) -> syn::Result<()> {
    if fields.named.iter().any(|f| f.ident.as_ref() == Some(field)) {
        return Ok(());
    }

    let available = fields
        .named
        .iter()
        .filter_map(|f| f.ident.as_ref())
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(", ");

    Err(syn::Error::new(
        span,
        format!("field `{field}` not found in `{owner}`. Available fields: {available}"),
    ))
}

fn enum_arm(
    enum_name: &Ident,
    variant: &Variant,
    field: &Ident,
) -> syn::Result<proc_macro2::TokenStream> {
    let variant_name = &variant.ident;

    match &variant.fields {
        Fields::Named(named) => {
            ensure_field(named, field, &variant_name.to_string(), variant.span())?;
            Ok(quote! {
                #enum_name::#variant_name { #field, .. } => ::mealflow::SubjectId::from(*#field),
            })
        }
        Fields::Unnamed(_) | Fields::Unit => Err(syn::Error::new(
            variant.span(),
            "HasSubjectId derive requires named fields on every variant",
        )),
    }
}
