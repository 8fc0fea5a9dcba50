//! Descriptor-driven decoding and encoding.
//!
//! This is the single decode/encode contract shared by every route:
//!
//! - [`decode_query`] turns a flat query string into a JSON value shaped like
//!   the route's input descriptor (primitive conversion, optional presence
//!   check, record field-by-field decode).
//! - [`encode_output`] checks a handler's serialized output against the
//!   route's output descriptor and produces the response body.
//!
//! # Example
//!
//! ```
//! use somnolence_core::codec::decode_query;
//! use somnolence_core::{Field, TypeDescriptor};
//!
//! let input = TypeDescriptor::record(vec![
//!     Field::of::<String>("name"),
//!     Field::of::<Option<i64>>("age"),
//! ]);
//!
//! let value = decode_query(&input, Some("name=World")).unwrap();
//! assert_eq!(value, serde_json::json!({"name": "World"}));
//! ```

use std::collections::HashMap;

use bytes::Bytes;
use serde_json::{Map, Number, Value};

use crate::descriptor::{PrimitiveType, TypeDescriptor};
use crate::error::{DecodeError, EncodeError};

/// Content type for JSON bodies.
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Content type for raw string bodies.
pub const CONTENT_TYPE_TEXT: &str = "text/plain; charset=utf-8";

/// Decodes a query string against an input descriptor.
///
/// The descriptor must have passed
/// [`TypeDescriptor::validate_query_input`]. Decoding stops at the first
/// failing field. Absent optional fields are left out of the result so serde
/// defaults apply. Unknown keys are ignored; when a key repeats the first
/// occurrence wins.
///
/// # Errors
///
/// - [`DecodeError::MissingField`] when a required field is absent.
/// - [`DecodeError::TypeMismatch`] when a value does not convert.
pub fn decode_query(descriptor: &TypeDescriptor, query: Option<&str>) -> Result<Value, DecodeError> {
    let fields = match descriptor {
        TypeDescriptor::Record { fields } => fields,
        TypeDescriptor::Primitive {
            name: PrimitiveType::Null,
        } => return Ok(Value::Null),
        other => {
            return Err(DecodeError::Invalid {
                reason: format!("cannot decode query parameters into {other}"),
            })
        }
    };

    let pairs = parse_pairs(query.unwrap_or(""))?;
    let mut out = Map::with_capacity(fields.len());

    for field in fields {
        let Some(primitive) = field.descriptor().scalar() else {
            return Err(DecodeError::Invalid {
                reason: format!("field `{}` is not a primitive", field.name()),
            });
        };

        match pairs.get(field.name()) {
            Some(raw) => {
                let value = convert(field.name(), primitive, raw)?;
                out.insert(field.name().to_string(), value);
            }
            None if field.is_required() => return Err(DecodeError::missing(field.name())),
            None => {}
        }
    }

    Ok(Value::Object(out))
}

fn parse_pairs(query: &str) -> Result<HashMap<String, String>, DecodeError> {
    let list: Vec<(String, String)> =
        serde_urlencoded::from_str(query).map_err(|e| DecodeError::Invalid {
            reason: e.to_string(),
        })?;

    let mut pairs = HashMap::with_capacity(list.len());
    for (key, value) in list {
        pairs.entry(key).or_insert(value);
    }
    Ok(pairs)
}

/// Converts a raw query value into its declared primitive.
fn convert(field: &str, primitive: PrimitiveType, raw: &str) -> Result<Value, DecodeError> {
    let mismatch = || DecodeError::mismatch(field, primitive);
    match primitive {
        PrimitiveType::String => Ok(Value::String(raw.to_string())),
        PrimitiveType::Boolean => match raw {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(mismatch()),
        },
        PrimitiveType::Integer => raw
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| mismatch()),
        PrimitiveType::Number => raw
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(mismatch),
        PrimitiveType::Null if raw.is_empty() => Ok(Value::Null),
        PrimitiveType::Null => Err(mismatch()),
    }
}

/// An encoded response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    /// MIME type of the body.
    pub content_type: &'static str,
    /// Body bytes.
    pub body: Bytes,
}

/// Encodes a serialized handler output against its descriptor.
///
/// A bare `string` output is sent as plain text. Everything else is sent as
/// JSON.
///
/// # Errors
///
/// Returns [`EncodeError::ShapeMismatch`] if `value` does not conform to
/// `descriptor`.
pub fn encode_output(descriptor: &TypeDescriptor, value: &Value) -> Result<Encoded, EncodeError> {
    conform(descriptor, value, "$")?;

    if let (
        TypeDescriptor::Primitive {
            name: PrimitiveType::String,
        },
        Value::String(text),
    ) = (descriptor, value)
    {
        return Ok(Encoded {
            content_type: CONTENT_TYPE_TEXT,
            body: Bytes::from(text.clone()),
        });
    }

    Ok(Encoded {
        content_type: CONTENT_TYPE_JSON,
        body: Bytes::from(serde_json::to_vec(value)?),
    })
}

/// Checks that `value` has the shape described by `descriptor`.
///
/// Extra object keys are tolerated.
///
/// # Errors
///
/// Returns [`EncodeError::ShapeMismatch`] at the first non-conforming location.
pub fn conform(descriptor: &TypeDescriptor, value: &Value, at: &str) -> Result<(), EncodeError> {
    let mismatch = || EncodeError::ShapeMismatch {
        at: at.to_string(),
        expected: descriptor.to_string(),
    };

    match descriptor {
        TypeDescriptor::Primitive { name } => {
            let ok = match name {
                PrimitiveType::String => value.is_string(),
                PrimitiveType::Boolean => value.is_boolean(),
                PrimitiveType::Integer => value.is_i64() || value.is_u64(),
                PrimitiveType::Number => value.is_number(),
                PrimitiveType::Null => value.is_null(),
            };
            if ok {
                Ok(())
            } else {
                Err(mismatch())
            }
        }
        TypeDescriptor::Optional { inner } => {
            if value.is_null() {
                Ok(())
            } else {
                conform(inner, value, at)
            }
        }
        TypeDescriptor::Record { fields } => {
            let object = value.as_object().ok_or_else(mismatch)?;
            for field in fields {
                let location = format!("{at}.{}", field.name());
                match object.get(field.name()) {
                    Some(v) => conform(field.descriptor(), v, &location)?,
                    None if field.is_required() => {
                        return Err(EncodeError::ShapeMismatch {
                            at: location,
                            expected: field.descriptor().to_string(),
                        })
                    }
                    None => {}
                }
            }
            Ok(())
        }
    }
}
