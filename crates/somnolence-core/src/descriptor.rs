//! Type descriptor model.
//!
//! A [`TypeDescriptor`] is a language-neutral description of a data shape.
//! Descriptors are used both to document routes (the schema endpoint) and to
//! drive decoding of query parameters into typed inputs.
//!
//! Descriptors are produced by the [`Describe`] trait, either implemented by
//! hand or derived with `#[derive(Describe)]` from `somnolence-macros`.
//!
//! # Example
//!
//! ```
//! use somnolence_core::{Describe, Field, PrimitiveType, TypeDescriptor};
//!
//! struct Greeting {
//!     message: String,
//!     volume: Option<u8>,
//! }
//!
//! impl Describe for Greeting {
//!     fn describe() -> TypeDescriptor {
//!         TypeDescriptor::record(vec![
//!             Field::of::<String>("message"),
//!             Field::of::<Option<u8>>("volume"),
//!         ])
//!     }
//! }
//!
//! let descriptor = Greeting::describe();
//! let fields = descriptor.fields().unwrap();
//! assert!(fields[0].is_required());
//! assert!(!fields[1].is_required());
//! assert_eq!(
//!     fields[1].descriptor(),
//!     &TypeDescriptor::optional(TypeDescriptor::primitive(PrimitiveType::Integer)),
//! );
//! ```

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DescriptorError;

/// The primitive types a descriptor can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveType {
    /// UTF-8 text.
    String,
    /// `true` or `false`.
    Boolean,
    /// Signed 64-bit integer range.
    Integer,
    /// Finite floating point number.
    Number,
    /// The absence of a value (`()` in Rust).
    Null,
}

impl PrimitiveType {
    /// Returns the wire name of this primitive.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Null => "null",
        }
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Structural description of a data shape.
///
/// The serialized form is tagged by `kind` so a rendered schema can be parsed
/// back without ambiguity:
///
/// ```
/// use somnolence_core::{PrimitiveType, TypeDescriptor};
///
/// let json = serde_json::to_string(&TypeDescriptor::primitive(PrimitiveType::String)).unwrap();
/// assert_eq!(json, r#"{"kind":"primitive","name":"string"}"#);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeDescriptor {
    /// A primitive value.
    Primitive {
        /// Which primitive.
        name: PrimitiveType,
    },
    /// A record with ordered, named fields.
    Record {
        /// Fields in declaration order.
        fields: Vec<Field>,
    },
    /// A value that may be absent.
    Optional {
        /// The type of the value when present.
        inner: Box<TypeDescriptor>,
    },
}

impl TypeDescriptor {
    /// Creates a primitive descriptor.
    #[must_use]
    pub const fn primitive(name: PrimitiveType) -> Self {
        Self::Primitive { name }
    }

    /// Creates a record descriptor from its fields.
    #[must_use]
    pub fn record(fields: Vec<Field>) -> Self {
        Self::Record { fields }
    }

    /// Wraps a descriptor as optional.
    #[must_use]
    pub fn optional(inner: TypeDescriptor) -> Self {
        Self::Optional {
            inner: Box::new(inner),
        }
    }

    /// Returns `true` for [`TypeDescriptor::Optional`].
    #[must_use]
    pub const fn is_optional(&self) -> bool {
        matches!(self, Self::Optional { .. })
    }

    /// Returns the primitive type, if this is a primitive.
    #[must_use]
    pub const fn as_primitive(&self) -> Option<PrimitiveType> {
        match self {
            Self::Primitive { name } => Some(*name),
            _ => None,
        }
    }

    /// Returns the record fields, if this is a record.
    #[must_use]
    pub fn fields(&self) -> Option<&[Field]> {
        match self {
            Self::Record { fields } => Some(fields),
            _ => None,
        }
    }

    /// Looks up a record field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields()?.iter().find(|f| f.name == name)
    }

    /// Checks the structural invariants of this descriptor tree.
    ///
    /// Field names must be unique within every record, at every depth.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError::DuplicateField`] naming the first repeated field.
    pub fn validate(&self) -> Result<(), DescriptorError> {
        match self {
            Self::Primitive { .. } => Ok(()),
            Self::Optional { inner } => inner.validate(),
            Self::Record { fields } => {
                let mut seen = HashSet::with_capacity(fields.len());
                for field in fields {
                    if !seen.insert(field.name.as_str()) {
                        return Err(DescriptorError::DuplicateField {
                            field: field.name.clone(),
                        });
                    }
                    field.descriptor.validate()?;
                }
                Ok(())
            }
        }
    }

    /// Checks that values of this type can be decoded from flat query parameters.
    ///
    /// Accepted shapes are the `null` primitive (no input) and a record whose
    /// fields are primitives or optional primitives.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError::UnsupportedInput`] describing the offending shape.
    pub fn validate_query_input(&self) -> Result<(), DescriptorError> {
        match self {
            Self::Primitive {
                name: PrimitiveType::Null,
            } => Ok(()),
            Self::Primitive { name } => Err(DescriptorError::UnsupportedInput {
                reason: format!("input must be a record or null, found primitive `{name}`"),
            }),
            Self::Optional { .. } => Err(DescriptorError::UnsupportedInput {
                reason: "input must be a record or null, found optional".to_string(),
            }),
            Self::Record { fields } => {
                for field in fields {
                    if field.descriptor.scalar().is_none() {
                        return Err(DescriptorError::UnsupportedInput {
                            reason: format!(
                                "field `{}` is not a primitive; nested input records are not supported",
                                field.name
                            ),
                        });
                    }
                }
                Ok(())
            }
        }
    }

    /// Returns the primitive behind this descriptor, looking through one
    /// level of `Optional`.
    pub(crate) fn scalar(&self) -> Option<PrimitiveType> {
        match self {
            Self::Primitive { name } => Some(*name),
            Self::Optional { inner } => inner.as_primitive(),
            Self::Record { .. } => None,
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive { name } => write!(f, "{name}"),
            Self::Optional { inner } => write!(f, "optional<{inner}>"),
            Self::Record { fields } => {
                f.write_str("{")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    let marker = if field.required { "" } else { "?" };
                    write!(f, "{}{marker}: {}", field.name, field.descriptor)?;
                }
                f.write_str("}")
            }
        }
    }
}

/// A named field of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Field name as it appears on the wire.
    name: String,
    /// Field type.
    #[serde(rename = "type")]
    descriptor: TypeDescriptor,
    /// Whether the field must be present.
    required: bool,
}

impl Field {
    /// Creates a field with an explicit `required` flag.
    #[must_use]
    pub fn new(name: impl Into<String>, descriptor: TypeDescriptor, required: bool) -> Self {
        Self {
            name: name.into(),
            descriptor,
            required,
        }
    }

    /// Creates a field from a Rust type.
    ///
    /// The field is required unless `T` describes itself as optional.
    #[must_use]
    pub fn of<T: Describe + ?Sized>(name: impl Into<String>) -> Self {
        let descriptor = T::describe();
        let required = !descriptor.is_optional();
        Self::new(name, descriptor, required)
    }

    /// Returns the field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the field type.
    #[must_use]
    pub const fn descriptor(&self) -> &TypeDescriptor {
        &self.descriptor
    }

    /// Returns whether the field must be present.
    #[must_use]
    pub const fn is_required(&self) -> bool {
        self.required
    }
}

/// Types that can describe their own shape.
///
/// Implemented for the common primitives, `Option<T>` and `()`. Records
/// implement it by hand or with `#[derive(Describe)]`.
pub trait Describe {
    /// Returns the descriptor for this type.
    fn describe() -> TypeDescriptor;
}

macro_rules! describe_primitive {
    ($kind:ident => $($ty:ty),+ $(,)?) => {
        $(
            impl Describe for $ty {
                fn describe() -> TypeDescriptor {
                    TypeDescriptor::primitive(PrimitiveType::$kind)
                }
            }
        )+
    };
}

describe_primitive!(String => String, str, char);
describe_primitive!(Boolean => bool);
describe_primitive!(Integer => i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);
describe_primitive!(Number => f32, f64);
describe_primitive!(Null => ());

impl<T: Describe> Describe for Option<T> {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::optional(T::describe())
    }
}

impl<T: Describe + ?Sized> Describe for Box<T> {
    fn describe() -> TypeDescriptor {
        T::describe()
    }
}

impl<T: Describe + ?Sized> Describe for std::sync::Arc<T> {
    fn describe() -> TypeDescriptor {
        T::describe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hello_input() -> TypeDescriptor {
        TypeDescriptor::record(vec![Field::of::<String>("name")])
    }

    #[test]
    fn test_primitive_impls() {
        assert_eq!(String::describe().as_primitive(), Some(PrimitiveType::String));
        assert_eq!(bool::describe().as_primitive(), Some(PrimitiveType::Boolean));
        assert_eq!(u16::describe().as_primitive(), Some(PrimitiveType::Integer));
        assert_eq!(f64::describe().as_primitive(), Some(PrimitiveType::Number));
        assert_eq!(<()>::describe().as_primitive(), Some(PrimitiveType::Null));
    }

    #[test]
    fn test_option_is_optional() {
        let descriptor = Option::<String>::describe();
        assert!(descriptor.is_optional());
        assert_eq!(descriptor.scalar(), Some(PrimitiveType::String));
    }

    #[test]
    fn test_field_of_required_flag() {
        assert!(Field::of::<i32>("count").is_required());
        assert!(!Field::of::<Option<i32>>("count").is_required());
    }

    #[test]
    fn test_field_lookup() {
        let descriptor = hello_input();
        assert!(descriptor.field("name").is_some());
        assert!(descriptor.field("other").is_none());
        assert!(TypeDescriptor::primitive(PrimitiveType::String)
            .field("name")
            .is_none());
    }

    #[test]
    fn test_validate_rejects_duplicate_fields() {
        let descriptor = TypeDescriptor::record(vec![
            Field::of::<String>("name"),
            Field::of::<i64>("name"),
        ]);
        match descriptor.validate() {
            Err(DescriptorError::DuplicateField { field }) => assert_eq!(field, "name"),
            other => panic!("Expected DuplicateField, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_nested_duplicates() {
        let inner = TypeDescriptor::record(vec![Field::of::<bool>("a"), Field::of::<bool>("a")]);
        let outer = TypeDescriptor::record(vec![Field::new("inner", inner, true)]);
        assert!(outer.validate().is_err());
    }

    #[test]
    fn test_query_input_accepts_flat_record_and_null() {
        assert!(hello_input().validate_query_input().is_ok());
        assert!(<()>::describe().validate_query_input().is_ok());
        let with_optional = TypeDescriptor::record(vec![Field::of::<Option<u32>>("limit")]);
        assert!(with_optional.validate_query_input().is_ok());
    }

    #[test]
    fn test_query_input_rejects_nested_and_bare_primitives() {
        let nested = TypeDescriptor::record(vec![Field::new("inner", hello_input(), true)]);
        assert!(matches!(
            nested.validate_query_input(),
            Err(DescriptorError::UnsupportedInput { .. })
        ));
        assert!(String::describe().validate_query_input().is_err());
        assert!(Option::<String>::describe().validate_query_input().is_err());
    }

    #[test]
    fn test_serialized_shapes() {
        let json = serde_json::to_value(Field::of::<Option<String>>("nick")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "name": "nick",
                "type": {"kind": "optional", "inner": {"kind": "primitive", "name": "string"}},
                "required": false
            })
        );
    }

    #[test]
    fn test_display() {
        let descriptor = TypeDescriptor::record(vec![
            Field::of::<String>("name"),
            Field::of::<Option<i64>>("age"),
        ]);
        assert_eq!(
            descriptor.to_string(),
            "{name: string, age?: optional<integer>}"
        );
    }
}
