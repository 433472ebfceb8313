//! # Arbor Internal Library
//!
//! Re-exports the Arbor crates for convenience.

/// Entities, components, lifecycle stages, rules and projections.
pub use arbor_model;

/// Tracing, naming and property plugins.
pub use arbor_core_plugins;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use arbor_core_plugins::{
        DefaultPlugins, NamingPlugin, Property, PropertyError, PropertyPlugin, TracingConfig,
        TracingFormat, TracingPlugin,
    };
    pub use arbor_model::prelude::*;
}
