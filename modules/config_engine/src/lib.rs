//! Configuration Engine
//!
//! Schema-typed settings store behind a settings editor. Values are
//! addressed by dotted key paths, coerced through per-type enforcers,
//! merged with schema defaults on read and stored as a diff against those
//! defaults.

// Public exports
pub mod contract;
pub use contract::{
    client::ConfigApi, error::ConfigError, GetOptions, SetOptions, ValueChange,
};

pub mod config;
pub use config::StoreConfig;

pub mod domain;
pub use domain::{
    ConfigStore, Disposable, EnforcerRegistry, NoOpSaveSink, SaveSink, SchemaNode, SchemaType,
};

// Runtime glue (save scheduling)
#[doc(hidden)]
pub mod infra;
