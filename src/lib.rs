//! Doc Schema
//!
//! Schema-driven validation and cleaning of documents and MongoDB update
//! modifiers.
//!
//! Declare a document shape once (field types, nesting, array items, bounds,
//! allowed values, custom validators, default and derived values) and then
//! validate plain documents or update modifiers against it, or clean them
//! into shape before writing.
//!
//! # Example
//!
//! ```
//! use doc_schema::{Field, FieldSpec, Schema, TypeTag, ValidateOptions};
//! use serde_json::json;
//!
//! let schema = Schema::new([
//!     ("name", FieldSpec::from(TypeTag::String)),
//!     ("age", Field::new(TypeTag::Integer).min(0).optional(true).into()),
//!     ("tags", FieldSpec::array_of(TypeTag::String)),
//!     ("status", Field::new(TypeTag::String).default_value("new").into()),
//! ])
//! .unwrap();
//!
//! // Cleaning converts, trims, filters and fills in defaults.
//! let doc = schema.clean(&json!({ "name": " Ann ", "age": "41", "tags": [], "x": 1 }));
//! assert_eq!(doc, json!({ "name": "Ann", "age": 41, "tags": [], "status": "new" }));
//! assert!(schema.validate(&doc, &ValidateOptions::new()).is_ok());
//!
//! // Modifiers are validated per operator.
//! let ctx = schema.new_context();
//! let update = json!({ "$set": { "age": -1 }, "$unset": { "name": "" } });
//! assert!(!ctx.validate(&update, &ValidateOptions::new().modifier(true)).unwrap());
//! assert_eq!(ctx.key_error_message("age").as_deref(), Some("Age must be at least 0"));
//! assert_eq!(ctx.key_error_message("name").as_deref(), Some("Name is required"));
//! ```
//!
//! # Keys
//!
//! | form | example | meaning |
//! |------|---------|---------|
//! | specific | `emails.1.address` | one place in one document |
//! | generic | `emails.$.address` | every array item; what definitions are declared under |
//!
//! Dates and binaries travel as Extended JSON wrappers (`{"$date": ...}`,
//! `{"$binary": ...}`) and are treated as scalars.

mod autovalue;
mod checks;
mod clean;
mod config;
mod context;
mod declaration;
mod definition;
pub mod ejson;
mod error;
mod hooks;
pub mod keys;
mod loader;
mod messages;
mod mongo_object;
pub mod patterns;
mod schema;
mod types;
mod validator;

pub use checks::{allowed_values_validator, check_type, required_validator, type_validator};
pub use clean::convert_to_proper_type;
pub use config::{ErrorTransform, NoopObserver, SchemaConfig, SchemaObserver, SchemaOptions};
pub use context::ValidationContext;
pub use declaration::parse_declaration;
pub use definition::{
    Bound, Dynamic, Field, FieldDefinition, FieldSpec, ResolvedAlternative, ResolvedDefinition,
    TypeAlternative, TypeGroup, TypeTag,
};
pub use error::{ErrorDetail, LoadError, SchemaError, ValidateError, ValidationError};
pub use hooks::{
    AutoValue, AutoValueContext, AutoValueFn, DocContext, DocValidatorFn, FieldContext,
    InstanceTest, ValidatorFn, Verdict,
};
pub use loader::{is_url, load_json, load_json_auto, load_json_str};
pub use messages::{MessageBox, MessageContext, MessageRenderer, MessageTemplate, DEFAULT_LANGUAGE};
pub use mongo_object::{looks_like_modifier, FieldInfo, MongoObject, Node, Position, PositionInfo};
pub use schema::{AutoValueEntry, Schema};
pub use types::{json_type_name, CleanOptions, ErrorType, ValidateOptions, MODIFIER_OPERATORS};

#[cfg(feature = "remote")]
pub use loader::load_json_url;
