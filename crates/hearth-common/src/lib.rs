//! # Hearth Common
//!
//! Common types, utilities, and shared abstractions for Hearth.
//!
//! This crate provides foundational types used across all Hearth subsystems:
//! - Room-graph locations (region, room)
//! - ID types (EntityId)
//! - Version information for persisted schemas
//! - Common error types
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod error;
pub mod ids;
pub mod location;
pub mod version;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::*;
    pub use crate::ids::*;
    pub use crate::location::*;
    pub use crate::version::*;
}

pub use prelude::*;
