//! Schema reflection.
//!
//! The schema document maps every registered path to its input and output
//! descriptors. It is derived from the registry on demand and served as
//! pretty-printed JSON at [`SCHEMA_PATH`](crate::SCHEMA_PATH).
//!
//! ```text
//! {
//!   "/hello": {
//!     "input": {
//!       "kind": "record",
//!       "fields": [
//!         { "name": "name", "type": { "kind": "primitive", "name": "string" }, "required": true }
//!       ]
//!     },
//!     "output": { ... }
//!   }
//! }
//! ```

use bytes::Bytes;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use somnolence_core::TypeDescriptor;

use crate::registry::Registry;
use crate::route::RouteDescriptor;

/// Errors raised while rendering or parsing a schema document.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The document could not be serialized.
    #[error("failed to render schema: {0}")]
    Render(#[source] serde_json::Error),

    /// The bytes are not a schema document.
    #[error("failed to parse schema: {0}")]
    Parse(#[source] serde_json::Error),
}

/// The input and output shapes of one route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteSchema {
    /// Input descriptor.
    pub input: TypeDescriptor,
    /// Output descriptor.
    pub output: TypeDescriptor,
}

/// Path to route schema, in registration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaDocument {
    routes: IndexMap<String, RouteSchema>,
}

impl SchemaDocument {
    /// Returns the schema for `path`.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&RouteSchema> {
        self.routes.get(path)
    }

    /// Returns the number of routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns `true` if the document is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Iterates over `(path, schema)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RouteSchema)> {
        self.routes.iter().map(|(path, schema)| (path.as_str(), schema))
    }
}

/// Describes a single route.
#[must_use]
pub fn describe(route: &RouteDescriptor) -> RouteSchema {
    RouteSchema {
        input: route.input().clone(),
        output: route.output().clone(),
    }
}

/// Builds the schema document for every route in the registry.
#[must_use]
pub fn reflect_all(registry: &Registry) -> SchemaDocument {
    SchemaDocument {
        routes: registry
            .routes()
            .map(|route| (route.path().to_string(), describe(route)))
            .collect(),
    }
}

/// Renders a document as pretty JSON with two-space indentation.
pub fn render(document: &SchemaDocument) -> Result<Bytes, SchemaError> {
    serde_json::to_vec_pretty(document)
        .map(Bytes::from)
        .map_err(SchemaError::Render)
}

/// Parses a rendered document.
pub fn parse(bytes: &[u8]) -> Result<SchemaDocument, SchemaError> {
    serde_json::from_slice(bytes).map_err(SchemaError::Parse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RegistryBuilder;
    use crate::route::Route;
    use serde_json::{json, Value};
    use somnolence_core::{Describe, Field, PrimitiveType};

    #[derive(Deserialize)]
    struct Search {
        q: String,
        limit: Option<i64>,
    }

    impl Describe for Search {
        fn describe() -> TypeDescriptor {
            TypeDescriptor::record(vec![
                Field::of::<String>("q"),
                Field::of::<Option<i64>>("limit"),
            ])
        }
    }

    #[derive(Serialize)]
    struct Hit {
        title: String,
        score: Option<f64>,
    }

    impl Describe for Hit {
        fn describe() -> TypeDescriptor {
            TypeDescriptor::record(vec![
                Field::of::<String>("title"),
                Field::of::<Option<f64>>("score"),
            ])
        }
    }

    #[derive(Serialize)]
    struct Page {
        top: Hit,
        total: u64,
    }

    impl Describe for Page {
        fn describe() -> TypeDescriptor {
            TypeDescriptor::record(vec![Field::of::<Hit>("top"), Field::of::<u64>("total")])
        }
    }

    fn registry() -> Registry {
        let mut builder = RegistryBuilder::new();
        builder
            .register(
                "/search",
                Route::new(|s: Search| async move {
                    Ok(Page {
                        top: Hit {
                            title: s.q,
                            score: None,
                        },
                        total: s.limit.map_or(0, |l| l.unsigned_abs()),
                    })
                }),
            )
            .unwrap();
        builder
            .register("/version", Route::new(|(): ()| async { Ok(1_u32) }))
            .unwrap();
        builder.build()
    }

    #[test]
    fn test_reflect_all_keys_are_paths() {
        let document = reflect_all(&registry());
        let paths: Vec<&str> = document.iter().map(|(p, _)| p).collect();
        assert_eq!(paths, vec!["/search", "/version"]);
    }

    #[test]
    fn test_primitive_output_stays_primitive() {
        let document = reflect_all(&registry());
        let version = document.get("/version").unwrap();
        assert_eq!(version.output, TypeDescriptor::primitive(PrimitiveType::Integer));
        assert_eq!(version.input, TypeDescriptor::primitive(PrimitiveType::Null));
    }

    #[test]
    fn test_render_shape() {
        let rendered = render(&reflect_all(&registry())).unwrap();
        let value: Value = serde_json::from_slice(&rendered).unwrap();

        assert_eq!(
            value["/search"]["input"]["fields"][0],
            json!({"name": "q", "type": {"kind": "primitive", "name": "string"}, "required": true})
        );
        assert_eq!(
            value["/search"]["input"]["fields"][1],
            json!({
                "name": "limit",
                "type": {"kind": "optional", "inner": {"kind": "primitive", "name": "integer"}},
                "required": false
            })
        );
        assert_eq!(value["/version"]["output"], json!({"kind": "primitive", "name": "integer"}));

        let text = std::str::from_utf8(&rendered).unwrap();
        assert!(text.contains("\n  \"/search\""));
    }

    #[test]
    fn test_render_parse_round_trip() {
        let document = reflect_all(&registry());
        let parsed = parse(&render(&document).unwrap()).unwrap();
        assert_eq!(parsed, document);

        let top = parsed.get("/search").unwrap().output.field("top").unwrap();
        assert!(top.is_required());
        assert_eq!(top.descriptor().field("score").map(|f| f.is_required()), Some(false));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(parse(b"not json"), Err(SchemaError::Parse(_))));
    }

    #[test]
    fn test_empty_registry() {
        let document = reflect_all(&RegistryBuilder::new().build());
        assert!(document.is_empty());
        assert_eq!(&render(&document).unwrap()[..], b"{}");
    }
}
