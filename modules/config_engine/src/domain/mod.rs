//! Domain layer - key paths, schemas, enforcement and the settings store

pub mod color;
pub mod enforcers;
pub mod key_path;
pub mod observers;
pub mod persistence;
pub mod schema;
pub mod store;
pub mod value;

pub use color::Color;
pub use enforcers::{Enforcer, EnforcerFn, EnforcerRegistry};
pub use observers::Disposable;
pub use persistence::{NoOpSaveSink, SaveSink};
pub use schema::{AdditionalProperties, SchemaNode, SchemaType, TypeSpec};
pub use store::ConfigStore;
