//! Domain abstractions
//!
//! Repository traits over the persistence engine and interfaces for the
//! external collaborators (download clients, import, metadata).

pub mod collaborators;
pub mod repositories;

pub use collaborators::*;
pub use repositories::*;
