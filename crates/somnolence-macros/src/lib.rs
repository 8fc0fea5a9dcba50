//! Procedural macros for Somnolence.
//!
//! This crate provides `#[derive(Describe)]`, which generates the
//! `somnolence_core::Describe` implementation for a struct so it can be used
//! as a route input or output.
//!
//! # Example
//!
//! ```rust,ignore
//! use serde::{Deserialize, Serialize};
//! use somnolence_core::Describe;
//!
//! #[derive(Deserialize, Describe)]
//! struct HelloInput {
//!     name: String,
//!     shout: Option<bool>,
//! }
//!
//! #[derive(Serialize, Describe)]
//! struct HelloOutput {
//!     message: String,
//! }
//! ```
//!
//! # Macro Expansion
//!
//! For a struct with named fields the derive produces a record descriptor
//! whose fields follow declaration order. Field types contribute their own
//! descriptors, so every field type must implement `Describe` as well.
//!
//! Serde attributes that change the wire shape are honored so the schema
//! matches what is actually sent:
//!
//! - `#[serde(rename = "...")]` on a field
//! - `#[serde(rename_all = "...")]` on the struct
//! - `#[serde(skip)]` drops the field
//! - `#[serde(default)]` on a field or the struct, and
//!   `#[serde(skip_deserializing)]`, mark the field as not required
//! - `#[serde(transparent)]` and single-field tuple structs describe as the
//!   wrapped type
//!
//! The generated code names `::somnolence_core`. Crates that only depend on
//! the `somnolence` facade set the path with `#[describe(crate = "somnolence::core")]`.

mod derive;
mod parse;

use proc_macro::TokenStream;

/// Derives `somnolence_core::Describe` for a struct.
///
/// Supported shapes:
///
/// - structs with named fields become a `record`
/// - single-field tuple structs become the wrapped type's descriptor
/// - unit structs become `null`
///
/// Enums and unions are rejected at compile time.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Deserialize, Describe)]
/// #[serde(rename_all = "camelCase")]
/// struct SearchInput {
///     query_text: String,
///     #[serde(default)]
///     max_results: u32,
/// }
///
/// // SearchInput::describe() ==
/// //   {queryText: string, maxResults?: integer}
/// ```
#[proc_macro_derive(Describe, attributes(describe))]
pub fn derive_describe(item: TokenStream) -> TokenStream {
    derive::expand_describe(item.into())
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
