//! Parsing utilities for the derive macro.
//!
//! This module reads the struct shape and the serde and `describe` attributes
//! that influence it.

use syn::{
    meta::ParseNestedMeta, parse_quote, spanned::Spanned, Attribute, Data, DeriveInput, Expr,
    Fields, Generics, Ident, LitStr, Path, Token, Type,
};

/// A parsed `#[derive(Describe)]` input.
#[derive(Debug)]
pub struct DescribeInput {
    /// The type name.
    pub ident: Ident,
    /// The type's generics.
    pub generics: Generics,
    /// What the descriptor looks like.
    pub shape: Shape,
    /// Path to the core crate.
    pub krate: Path,
}

/// The descriptor shape a struct produces.
#[derive(Debug)]
pub enum Shape {
    /// Named fields, in declaration order.
    Record(Vec<DescribedField>),
    /// A transparent wrapper around a single type.
    Newtype(Type),
    /// No data.
    Unit,
}

/// A field that appears in the record descriptor.
#[derive(Debug)]
pub struct DescribedField {
    /// The wire name.
    pub name: String,
    /// The field type.
    pub ty: Type,
    /// Whether deserialization fills in the field when it is absent.
    pub defaulted: bool,
}

/// Struct-level attributes.
#[derive(Debug, Default)]
struct ContainerAttrs {
    rename_all: Option<RenameRule>,
    transparent: bool,
    default: bool,
    krate: Option<Path>,
}

/// Field-level attributes.
#[derive(Debug, Default)]
struct FieldAttrs {
    rename: Option<String>,
    skip: bool,
    defaulted: bool,
    flatten: bool,
}

impl DescribeInput {
    /// Parses a derive input.
    pub fn parse(input: &DeriveInput) -> syn::Result<Self> {
        let container = ContainerAttrs::parse(&input.attrs)?;

        let data = match &input.data {
            Data::Struct(data) => data,
            Data::Enum(data) => {
                return Err(syn::Error::new(
                    data.enum_token.span(),
                    "Describe cannot be derived for an enum",
                ))
            }
            Data::Union(data) => {
                return Err(syn::Error::new(
                    data.union_token.span(),
                    "Describe cannot be derived for a union",
                ))
            }
        };

        let shape = match &data.fields {
            Fields::Unit => Shape::Unit,
            Fields::Unnamed(fields) if fields.unnamed.len() == 1 => {
                Shape::Newtype(fields.unnamed[0].ty.clone())
            }
            Fields::Unnamed(fields) => {
                return Err(syn::Error::new(
                    fields.span(),
                    "Describe supports tuple structs with exactly one field",
                ))
            }
            Fields::Named(fields) => {
                let mut described = Vec::with_capacity(fields.named.len());
                for field in &fields.named {
                    let attrs = FieldAttrs::parse(&field.attrs)?;
                    if attrs.skip {
                        continue;
                    }
                    if attrs.flatten {
                        return Err(syn::Error::new(
                            field.span(),
                            "Describe does not support #[serde(flatten)]",
                        ));
                    }

                    let Some(ident) = &field.ident else {
                        return Err(syn::Error::new(field.span(), "expected a named field"));
                    };
                    let rust_name = ident.to_string();
                    let rust_name = rust_name.trim_start_matches("r#");
                    let name = match (attrs.rename, container.rename_all) {
                        (Some(name), _) => name,
                        (None, Some(rule)) => rule.apply(rust_name),
                        (None, None) => rust_name.to_string(),
                    };

                    described.push(DescribedField {
                        name,
                        ty: field.ty.clone(),
                        defaulted: attrs.defaulted || container.default,
                    });
                }

                if container.transparent {
                    transparent_shape(described, fields.span())?
                } else {
                    Shape::Record(described)
                }
            }
        };

        Ok(Self {
            ident: input.ident.clone(),
            generics: input.generics.clone(),
            shape,
            krate: container
                .krate
                .unwrap_or_else(|| parse_quote!(::somnolence_core)),
        })
    }
}

fn transparent_shape(mut fields: Vec<DescribedField>, span: proc_macro2::Span) -> syn::Result<Shape> {
    match fields.pop() {
        Some(field) if fields.is_empty() => Ok(Shape::Newtype(field.ty)),
        _ => Err(syn::Error::new(
            span,
            "#[serde(transparent)] requires exactly one described field",
        )),
    }
}

impl ContainerAttrs {
    fn parse(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut out = Self::default();

        for attr in attrs {
            if attr.path().is_ident("serde") {
                attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("rename_all") {
                        if meta.input.peek(Token![=]) {
                            let lit: LitStr = meta.value()?.parse()?;
                            out.rename_all = Some(RenameRule::from_lit(&lit)?);
                        } else {
                            // rename_all(serialize = "..", deserialize = "..")
                            skip_meta(&meta)?;
                        }
                    } else if meta.path.is_ident("transparent") {
                        out.transparent = true;
                    } else if meta.path.is_ident("default") {
                        out.default = true;
                        skip_meta(&meta)?;
                    } else {
                        skip_meta(&meta)?;
                    }
                    Ok(())
                })?;
            } else if attr.path().is_ident("describe") {
                attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("crate") {
                        let lit: LitStr = meta.value()?.parse()?;
                        out.krate = Some(lit.parse()?);
                        Ok(())
                    } else {
                        Err(meta.error("unknown describe attribute"))
                    }
                })?;
            }
        }

        Ok(out)
    }
}

impl FieldAttrs {
    fn parse(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut out = Self::default();

        for attr in attrs.iter().filter(|a| a.path().is_ident("serde")) {
            attr.parse_nested_meta(|meta| {
                let path = &meta.path;
                if path.is_ident("rename") && meta.input.peek(Token![=]) {
                    let lit: LitStr = meta.value()?.parse()?;
                    out.rename = Some(lit.value());
                } else if path.is_ident("skip") {
                    out.skip = true;
                } else if path.is_ident("flatten") {
                    out.flatten = true;
                } else if path.is_ident("default") || path.is_ident("skip_deserializing") {
                    // Both leave the field to `Default` on input.
                    out.defaulted = true;
                    skip_meta(&meta)?;
                } else {
                    skip_meta(&meta)?;
                }
                Ok(())
            })?;
        }

        Ok(out)
    }
}

/// Consumes the value of an attribute this crate does not interpret.
fn skip_meta(meta: &ParseNestedMeta<'_>) -> syn::Result<()> {
    if meta.input.peek(Token![=]) {
        let _: Expr = meta.value()?.parse()?;
    } else if meta.input.peek(syn::token::Paren) {
        meta.parse_nested_meta(|inner| skip_meta(&inner))?;
    }
    Ok(())
}

/// A serde `rename_all` rule, applied to snake_case field names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RenameRule {
    Lower,
    Upper,
    Pascal,
    Camel,
    Snake,
    ScreamingSnake,
    Kebab,
    ScreamingKebab,
}

impl RenameRule {
    fn from_lit(lit: &LitStr) -> syn::Result<Self> {
        let rule = match lit.value().as_str() {
            "lowercase" => Self::Lower,
            "UPPERCASE" => Self::Upper,
            "PascalCase" => Self::Pascal,
            "camelCase" => Self::Camel,
            "snake_case" => Self::Snake,
            "SCREAMING_SNAKE_CASE" => Self::ScreamingSnake,
            "kebab-case" => Self::Kebab,
            "SCREAMING-KEBAB-CASE" => Self::ScreamingKebab,
            other => {
                return Err(syn::Error::new(
                    lit.span(),
                    format!("unknown rename rule: {other}"),
                ))
            }
        };
        Ok(rule)
    }

    fn apply(self, field: &str) -> String {
        match self {
            Self::Lower | Self::Snake => field.to_string(),
            Self::Upper | Self::ScreamingSnake => field.to_ascii_uppercase(),
            Self::Kebab => field.replace('_', "-"),
            Self::ScreamingKebab => field.to_ascii_uppercase().replace('_', "-"),
            Self::Pascal => pascal(field),
            Self::Camel => {
                let pascal = pascal(field);
                let mut chars = pascal.chars();
                match chars.next() {
                    Some(first) => first.to_ascii_lowercase().to_string() + chars.as_str(),
                    None => String::new(),
                }
            }
        }
    }
}

fn pascal(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut capitalize = true;
    for ch in field.chars() {
        if ch == '_' {
            capitalize = true;
        } else if capitalize {
            out.push(ch.to_ascii_uppercase());
            capitalize = false;
        } else {
            out.push(ch);
        }
    }
    out
}
