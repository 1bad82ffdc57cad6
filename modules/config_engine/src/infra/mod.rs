//! Infrastructure layer - runtime glue around the store

pub mod save_scheduler;
