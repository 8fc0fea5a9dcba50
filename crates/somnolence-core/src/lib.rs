//! # Somnolence Core
//!
//! Core types for the Somnolence typed-route server.
//!
//! This crate provides the pieces shared by every route:
//!
//! - [`TypeDescriptor`] - Structural description of a data shape
//! - [`Describe`] - Trait (and derive) producing a type's descriptor
//! - [`codec`] - Descriptor-driven query decoding and output encoding
//! - [`RequestContext`] - Per-request facts handed to authorizers
//! - Error types for registration, decoding, handlers and encoding
//!
//! # Example
//!
//! ```
//! use somnolence_core::{Describe, PrimitiveType};
//!
//! #[derive(Describe)]
//! struct HelloInput {
//!     name: String,
//!     shout: Option<bool>,
//! }
//!
//! let descriptor = HelloInput::describe();
//! let name = descriptor.field("name").unwrap();
//! assert!(name.is_required());
//! assert_eq!(name.descriptor().as_primitive(), Some(PrimitiveType::String));
//! assert!(!descriptor.field("shout").unwrap().is_required());
//! ```

#![doc(html_root_url = "https://docs.rs/somnolence-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod codec;
mod context;
mod descriptor;
mod error;

pub use context::{RequestContext, RequestId};
pub use descriptor::{Describe, Field, PrimitiveType, TypeDescriptor};
pub use error::{DecodeError, DescriptorError, EncodeError, HandlerError, RegistrationError};

#[cfg(feature = "derive")]
pub use somnolence_macros::Describe;
