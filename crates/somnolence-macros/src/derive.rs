//! `Describe` derive expansion.

use proc_macro2::TokenStream;
use quote::quote;
use syn::{parse_quote, DeriveInput, GenericParam, Generics, Path};

use crate::parse::{DescribeInput, DescribedField, Shape};

/// Expands `#[derive(Describe)]`.
pub fn expand_describe(item: TokenStream) -> syn::Result<TokenStream> {
    let input: DeriveInput = syn::parse2(item)?;
    let parsed = DescribeInput::parse(&input)?;

    let krate = &parsed.krate;
    let ident = &parsed.ident;
    let generics = add_describe_bounds(parsed.generics.clone(), krate);
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let body = match &parsed.shape {
        Shape::Record(fields) => {
            let fields = fields.iter().map(|field| field_tokens(field, krate));
            quote! {
                #krate::TypeDescriptor::record(::std::vec![#(#fields),*])
            }
        }
        Shape::Newtype(ty) => quote! {
            <#ty as #krate::Describe>::describe()
        },
        Shape::Unit => quote! {
            #krate::TypeDescriptor::primitive(#krate::PrimitiveType::Null)
        },
    };

    Ok(quote! {
        impl #impl_generics #krate::Describe for #ident #ty_generics #where_clause {
            fn describe() -> #krate::TypeDescriptor {
                #body
            }
        }
    })
}

fn field_tokens(field: &DescribedField, krate: &Path) -> TokenStream {
    let name = &field.name;
    let ty = &field.ty;

    if field.defaulted {
        quote! {
            #krate::Field::new(#name, <#ty as #krate::Describe>::describe(), false)
        }
    } else {
        quote! {
            #krate::Field::of::<#ty>(#name)
        }
    }
}

/// Requires every type parameter to implement `Describe`.
fn add_describe_bounds(mut generics: Generics, krate: &Path) -> Generics {
    for param in &mut generics.params {
        if let GenericParam::Type(type_param) = param {
            type_param.bounds.push(parse_quote!(#krate::Describe));
        }
    }
    generics
}
