//! Configuration node trees.
//!
//! This module holds the live side of a configuration: typed nodes built
//! from a schema, their validation, fork sharing and output.
//!
//! ## Architecture
//!
//! - [`arena`] - Node storage addressed by stable ids
//! - [`node`] - Node data and variants
//! - [`value`] - Value types and their checks
//! - [`tags`] - Schema tags and attribute names
//! - [`factory`] - Schema-driven construction
//! - [`fork`] - Fork registry
//! - [`context`] - Editing, validation, fork promotion and cloning
//! - [`events`] - Change notifications

/// Node storage.
pub mod arena;

/// Host-side owner of trees and shared state.
pub mod context;

/// Change notifications.
pub mod events;

/// Schema-driven node construction.
pub mod factory;

/// Fork registry.
pub mod fork;

/// Node data and variants.
pub mod node;

/// Schema tags and attribute names.
pub mod tags;

/// Value types and their checks.
pub mod value;

mod emit;
mod json;

pub use context::{ConfigContext, ForkOutcome};
