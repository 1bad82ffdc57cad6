//! Contract layer - public API for settings consumers
//!
//! Error type, option bags and the native client trait a settings editor
//! talks to.

pub mod client;
pub mod error;
pub mod model;

pub use client::ConfigApi;
pub use error::ConfigError;
pub use model::{GetOptions, SetOptions, ValueChange};
