//! Plugins that contribute rules, entities and observers to a [`Project`].
//!
//! Language support, naming conventions and diagnostics all arrive as
//! plugins. A plugin never talks to another plugin directly: it registers
//! rules against the shared [`ModelRegistry`](crate::registry::ModelRegistry)
//! and those rules react to whatever components other plugins attach.
//!
//! # Example
//!
//! ```
//! use arbor_model::component::Tag;
//! use arbor_model::error::ModelError;
//! use arbor_model::plugin::{Plugin, PluginId};
//! use arbor_model::project::Project;
//! use arbor_model::rule::Rule;
//! use arbor_model::stage::Stage;
//!
//! struct HasCSources;
//! impl Tag for HasCSources {}
//!
//! struct BasePlugin;
//! impl Plugin for BasePlugin {
//!     fn build(&self, _project: &mut Project) -> Result<(), ModelError> {
//!         Ok(())
//!     }
//! }
//!
//! struct CPlugin;
//! impl Plugin for CPlugin {
//!     fn build(&self, project: &mut Project) -> Result<(), ModelError> {
//!         project.registry_mut().add_rule(
//!             Rule::builder("c-sources")
//!                 .requires::<HasCSources>()
//!                 .at_stage(Stage::Discovered)
//!                 .run(|ctx| {
//!                     ctx.register_child("c")?;
//!                     Ok(())
//!                 }),
//!         )?;
//!         Ok(())
//!     }
//!
//!     fn dependencies(&self) -> Vec<PluginId> {
//!         vec![PluginId::of::<BasePlugin>()]
//!     }
//! }
//!
//! let mut project = Project::new();
//! project.add_plugins(CPlugin).add_plugins(BasePlugin);
//! project.finish().unwrap();
//! assert_eq!(project.registry().rule_count(), 1);
//! ```

use core::any::TypeId;
use core::fmt;

use crate::error::ModelError;
use crate::project::Project;

// ─────────────────────────────────────────────────────────────────────────────
// PluginId
// ─────────────────────────────────────────────────────────────────────────────

/// Identifies a plugin by its concrete type.
#[derive(Clone, Copy)]
pub struct PluginId {
    type_id: TypeId,
    type_name: &'static str,
}

impl PluginId {
    /// Returns the id of plugin type `P`.
    #[must_use]
    pub fn of<P: Plugin>() -> Self {
        Self {
            type_id: TypeId::of::<P>(),
            type_name: core::any::type_name::<P>(),
        }
    }

    /// Returns the underlying [`TypeId`].
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns the full type name.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl PartialEq for PluginId {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for PluginId {}

impl core::hash::Hash for PluginId {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for PluginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PluginId").field(&self.type_name).finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Plugin
// ─────────────────────────────────────────────────────────────────────────────

/// A unit of functionality installed into a [`Project`].
///
/// # Lifecycle
///
/// 1. [`build`](Self::build) runs once, after every plugin it depends on
///    has been built. Register rules, observers and resources here.
/// 2. [`ready`](Self::ready) runs once every plugin has been built.
/// 3. [`cleanup`](Self::cleanup) runs in reverse dependency order when the
///    project shuts down.
pub trait Plugin: Send + Sync + 'static {
    /// Registers the plugin's rules, entities and resources.
    ///
    /// # Errors
    ///
    /// Any registry error aborts [`Project::finish`].
    fn build(&self, project: &mut Project) -> Result<(), ModelError>;

    /// Called after every plugin has been built.
    ///
    /// # Errors
    ///
    /// Any registry error aborts [`Project::finish`].
    fn ready(&self, _project: &mut Project) -> Result<(), ModelError> {
        Ok(())
    }

    /// Called when the project shuts down.
    fn cleanup(&self, _project: &mut Project) {}

    /// Human-readable plugin name, used in diagnostics.
    fn name(&self) -> &str {
        core::any::type_name::<Self>()
    }

    /// Plugins that must be built before this one.
    fn dependencies(&self) -> Vec<PluginId> {
        Vec::new()
    }

    /// Whether adding this plugin twice is an error.
    fn is_unique(&self) -> bool {
        true
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Plugins
// ─────────────────────────────────────────────────────────────────────────────

/// Anything [`Project::add_plugins`] accepts: a single plugin or a group.
pub trait Plugins {
    /// Queues the plugin(s) on `project`.
    fn add_to_project(self, project: &mut Project);
}

impl<P: Plugin> Plugins for P {
    fn add_to_project(self, project: &mut Project) {
        project.queue_plugin(BoxedPlugin::new(self));
    }
}

impl Plugins for PluginGroupBuilder {
    fn add_to_project(self, project: &mut Project) {
        for boxed in self.plugins {
            project.queue_plugin(boxed);
        }
    }
}

/// A named bundle of plugins.
///
/// ```
/// use arbor_model::error::ModelError;
/// use arbor_model::plugin::{Plugin, PluginGroup, PluginGroupBuilder};
/// use arbor_model::project::Project;
///
/// struct CLanguage;
/// impl Plugin for CLanguage {
///     fn build(&self, _project: &mut Project) -> Result<(), ModelError> {
///         Ok(())
///     }
/// }
///
/// struct NativeLanguages;
/// impl PluginGroup for NativeLanguages {
///     fn build(self) -> PluginGroupBuilder {
///         PluginGroupBuilder::new().add(CLanguage)
///     }
/// }
///
/// let mut project = Project::new();
/// project.add_plugins(NativeLanguages.build());
/// assert!(project.has_plugin::<CLanguage>());
/// ```
pub trait PluginGroup {
    /// Assembles the group.
    fn build(self) -> PluginGroupBuilder;
}

/// A plugin boxed together with its id.
pub struct BoxedPlugin {
    pub(crate) id: PluginId,
    pub(crate) plugin: Box<dyn Plugin>,
}

impl BoxedPlugin {
    /// Boxes `plugin`, capturing its concrete type id.
    pub fn new<P: Plugin>(plugin: P) -> Self {
        Self {
            id: PluginId::of::<P>(),
            plugin: Box::new(plugin),
        }
    }

    /// Returns the plugin id.
    #[must_use]
    pub fn id(&self) -> PluginId {
        self.id
    }

    /// Returns the plugin's name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.plugin.name()
    }
}

impl fmt::Debug for BoxedPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoxedPlugin")
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}

/// Ordered list of plugins making up a [`PluginGroup`].
#[derive(Default, Debug)]
pub struct PluginGroupBuilder {
    plugins: Vec<BoxedPlugin>,
}

impl PluginGroupBuilder {
    /// Creates an empty group.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a plugin.
    #[must_use]
    #[expect(
        clippy::should_implement_trait,
        reason = "This is a builder method, not std::ops::Add"
    )]
    pub fn add<P: Plugin>(mut self, plugin: P) -> Self {
        self.plugins.push(BoxedPlugin::new(plugin));
        self
    }

    /// Inserts a plugin before `Target`, or first if `Target` is absent.
    #[must_use]
    pub fn add_before<P: Plugin, Target: Plugin>(mut self, plugin: P) -> Self {
        let position = self.position_of::<Target>().unwrap_or(0);
        self.plugins.insert(position, BoxedPlugin::new(plugin));
        self
    }

    /// Inserts a plugin after `Target`, or last if `Target` is absent.
    #[must_use]
    pub fn add_after<P: Plugin, Target: Plugin>(mut self, plugin: P) -> Self {
        let position = self
            .position_of::<Target>()
            .map_or(self.plugins.len(), |index| index + 1);
        self.plugins.insert(position, BoxedPlugin::new(plugin));
        self
    }

    /// Removes every plugin of type `P`.
    #[must_use]
    pub fn disable<P: Plugin>(mut self) -> Self {
        let id = PluginId::of::<P>();
        self.plugins.retain(|boxed| boxed.id != id);
        self
    }

    /// Returns `true` if the group contains `P`.
    #[must_use]
    pub fn contains<P: Plugin>(&self) -> bool {
        self.position_of::<P>().is_some()
    }

    /// Returns the number of plugins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Returns `true` if the group is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Iterates over the plugin names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.plugins.iter().map(BoxedPlugin::name)
    }

    fn position_of<P: Plugin>(&self) -> Option<usize> {
        let id = PluginId::of::<P>();
        self.plugins.iter().position(|boxed| boxed.id == id)
    }
}
