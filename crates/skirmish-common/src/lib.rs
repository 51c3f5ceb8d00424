//! # Skirmish Common
//!
//! Common types and shared helpers for Project Skirmish.
//!
//! This crate provides foundational types used by every Skirmish crate:
//! - ID types (EntityId, KindId)
//! - Spatial helpers over `glam::Vec3`
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod ids;
pub mod spatial;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::ids::*;
    pub use crate::spatial::*;
}

pub use glam::Vec3;
pub use prelude::*;
