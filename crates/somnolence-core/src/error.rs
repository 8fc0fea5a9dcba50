//! Error types for Somnolence.
//!
//! Registration-time errors ([`RegistrationError`], [`DescriptorError`]) halt
//! startup. Per-request errors ([`DecodeError`], [`HandlerError`],
//! [`EncodeError`]) never escape the dispatcher; they are converted into a
//! status code and a short message.

use thiserror::Error;

use crate::descriptor::PrimitiveType;

/// A descriptor violates its structural invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    /// Two fields of the same record share a name.
    #[error("duplicate field `{field}`")]
    DuplicateField {
        /// The repeated field name.
        field: String,
    },

    /// The input type cannot be decoded from flat query parameters.
    #[error("unsupported input shape: {reason}")]
    UnsupportedInput {
        /// Why the shape was rejected.
        reason: String,
    },
}

/// Registering a route failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// A route with this path is already registered.
    #[error("route already registered: {path}")]
    DuplicatePath {
        /// The normalized path.
        path: String,
    },

    /// The path is reserved for schema introspection.
    #[error("path is reserved: {path}")]
    ReservedPath {
        /// The reserved path.
        path: String,
    },

    /// The route's input or output descriptor is malformed.
    #[error("invalid {position} descriptor for {path}: {source}")]
    InvalidDescriptor {
        /// The normalized path.
        path: String,
        /// `input` or `output`.
        position: &'static str,
        /// The underlying descriptor problem.
        #[source]
        source: DescriptorError,
    },
}

/// Query parameters could not be decoded into the route input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// A required field was not supplied.
    #[error("missing required field `{field}`")]
    MissingField {
        /// The field name.
        field: String,
    },

    /// A value did not convert to its declared type.
    #[error("field `{field}` expected {expected}")]
    TypeMismatch {
        /// The field name.
        field: String,
        /// The declared type.
        expected: PrimitiveType,
    },

    /// The decoded value did not fit the Rust input type.
    #[error("invalid input: {reason}")]
    Invalid {
        /// Deserializer message.
        reason: String,
    },
}

impl DecodeError {
    /// Creates a missing field error.
    #[must_use]
    pub fn missing(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Creates a type mismatch error.
    #[must_use]
    pub fn mismatch(field: impl Into<String>, expected: PrimitiveType) -> Self {
        Self::TypeMismatch {
            field: field.into(),
            expected,
        }
    }
}

/// A handler signalled failure.
///
/// The message and source are logged; they are never sent to the client.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Failure described by a message.
    #[error("{0}")]
    Message(String),

    /// Failure wrapping another error.
    #[error(transparent)]
    Custom(Box<dyn std::error::Error + Send + Sync>),
}

impl HandlerError {
    /// Creates a handler error from a message.
    #[must_use]
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    /// Creates a handler error wrapping another error.
    pub fn custom(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Custom(Box::new(err))
    }
}

impl From<anyhow::Error> for HandlerError {
    fn from(err: anyhow::Error) -> Self {
        Self::Custom(err.into())
    }
}

impl From<std::io::Error> for HandlerError {
    fn from(err: std::io::Error) -> Self {
        Self::custom(err)
    }
}

/// A handler output could not be encoded.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// Serialization of the output failed.
    #[error("failed to serialize output: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The output does not conform to the declared descriptor.
    #[error("output does not match declared type at `{at}`: expected {expected}")]
    ShapeMismatch {
        /// Dotted location of the mismatch (`$` is the root).
        at: String,
        /// The expected descriptor, rendered.
        expected: String,
    },
}
