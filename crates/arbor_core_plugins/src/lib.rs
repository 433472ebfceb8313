//! Core infrastructure plugins for Arbor.
//!
//! - [`TracingPlugin`] - Logging via the `tracing` crate, plus a debug-level
//!   mirror of every model event
//! - [`NamingPlugin`] - Qualifying and display names derived from the
//!   entity hierarchy
//! - [`PropertyPlugin`] - Freezes [`Property`] components on finalization
//! - [`DefaultPlugins`] - Tracing and naming together
//!
//! # Example
//!
//! ```
//! use arbor_core_plugins::DefaultPlugins;
//! use arbor_core_plugins::naming::DisplayName;
//! use arbor_model::prelude::*;
//!
//! let mut project = Project::new();
//! project.add_plugins(DefaultPlugins.build());
//! project.finish().unwrap();
//!
//! let app = project.registry_mut().register_root("app").unwrap();
//! project.finalize().unwrap();
//!
//! let name = project.registry().component::<DisplayName>(app).unwrap();
//! assert_eq!(name.0, "'app'");
//! ```

pub mod naming;
pub mod property;
mod tracing_plugin;

pub use naming::NamingPlugin;
pub use property::{Property, PropertyError, PropertyPlugin};
pub use tracing_plugin::{EVENT_OBSERVER, TracingConfig, TracingFormat, TracingPlugin};

use arbor_model::plugin::{PluginGroup, PluginGroupBuilder};

/// Default plugins for most Arbor projects.
///
/// Includes:
/// - [`TracingPlugin`] - Logging and observability
/// - [`NamingPlugin`] - Qualifying and display names
///
/// Use the builder to customize:
///
/// ```
/// use arbor_core_plugins::{DefaultPlugins, TracingPlugin};
/// use arbor_model::plugin::PluginGroup;
///
/// let plugins = DefaultPlugins.build().disable::<TracingPlugin>();
/// assert_eq!(plugins.len(), 1);
/// ```
pub struct DefaultPlugins;

impl PluginGroup for DefaultPlugins {
    fn build(self) -> PluginGroupBuilder {
        PluginGroupBuilder::new()
            .add(TracingPlugin::default())
            .add(NamingPlugin)
    }
}
