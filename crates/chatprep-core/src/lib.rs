//! # chatprep core
//!
//! Pure, I/O-free logic for chatprep: message models, the grouping and
//! role-alternation transform, the train/validation split rule, and the
//! training output formats.
//!
//! This crate does no filesystem access and carries no CLI or logging
//! dependencies. The `chatprep` binary crate wires it to disk.

pub mod error;
pub mod format;
pub mod group;
pub mod models;
pub mod split;

pub use error::CoreError;
