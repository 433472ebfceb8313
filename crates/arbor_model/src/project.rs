//! The plugin host that owns a [`ModelRegistry`].
//!
//! A bare project does nothing useful: every rule, naming convention and
//! diagnostic comes from a [`Plugin`]. The host only orders plugins by their
//! dependencies and runs their lifecycle.
//!
//! # Lifecycle
//!
//! 1. **Dependency resolution**: validate uniqueness and dependencies, then
//!    topologically sort the queued plugins
//! 2. **Build**: call [`Plugin::build`] in dependency order
//! 3. **Ready**: call [`Plugin::ready`] in dependency order
//! 4. **Use**: register entities, advance them, resolve projections
//! 5. **Cleanup**: call [`Plugin::cleanup`] in reverse order
//!
//! ```
//! use arbor_model::project::Project;
//! use arbor_model::stage::Stage;
//!
//! let mut project = Project::new();
//! project.finish().unwrap();
//!
//! let app = project.registry_mut().register_root("app").unwrap();
//! project.finalize().unwrap();
//! assert_eq!(project.registry().stage(app).unwrap(), Stage::Finalized);
//! ```

use core::any::{Any, TypeId};
use core::fmt;
use std::sync::Arc;

use hashbrown::HashMap;
use indexmap::IndexMap;

use crate::config::RegistryConfig;
use crate::error::{ModelError, ModelResult};
use crate::plugin::{BoxedPlugin, Plugin, PluginId, Plugins};
use crate::registry::ModelRegistry;
use crate::stage::Stage;

type BoxedResource = Box<dyn Any + Send + Sync>;

/// Errors raised while assembling a [`Project`].
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    /// [`Project::finish`] was called twice.
    #[error("the project was already built")]
    AlreadyBuilt,

    /// A unique plugin was added more than once.
    #[error("plugin '{plugin}' is unique and was already added")]
    Duplicate {
        /// The plugin name.
        plugin: String,
    },

    /// A plugin depends on a plugin that was never added.
    #[error("plugin '{plugin}' requires '{dependency}', which was not added")]
    MissingDependency {
        /// The dependent plugin.
        plugin: String,
        /// The missing dependency.
        dependency: &'static str,
    },

    /// Plugin dependencies form a cycle.
    #[error("circular dependency among plugins: {}", plugins.join(", "))]
    CircularDependency {
        /// Every plugin left unsorted.
        plugins: Vec<String>,
    },

    /// A plugin's build or ready phase failed.
    #[error("plugin '{plugin}' failed during {phase}: {source}")]
    Build {
        /// The failing plugin.
        plugin: String,
        /// `"build"` or `"ready"`.
        phase: &'static str,
        /// The registry error.
        #[source]
        source: ModelError,
    },
}

/// Build state, progressing linearly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum BuildState {
    #[default]
    NotStarted,
    Building,
    Built,
}

struct PluginEntry {
    id: PluginId,
    plugin: Arc<dyn Plugin>,
    name: String,
}

/// Owns the model registry and the plugins that populate it.
pub struct Project {
    registry: ModelRegistry,
    resources: IndexMap<TypeId, BoxedResource>,
    pending: Vec<PluginEntry>,
    built: Vec<PluginEntry>,
    state: BuildState,
}

impl Default for Project {
    fn default() -> Self {
        Self::new()
    }
}

impl Project {
    /// Creates an empty project with a default registry.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Creates an empty project whose registry uses `config`.
    #[must_use]
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            registry: ModelRegistry::with_config(config),
            resources: IndexMap::new(),
            pending: Vec::new(),
            built: Vec::new(),
            state: BuildState::NotStarted,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Plugins
    // ─────────────────────────────────────────────────────────────────────────

    /// Queues one plugin or a whole group.
    ///
    /// Plugins added while [`finish`](Self::finish) is running are built in
    /// the same call, after the current batch.
    pub fn add_plugins<P: Plugins>(&mut self, plugins: P) -> &mut Self {
        plugins.add_to_project(self);
        self
    }

    pub(crate) fn queue_plugin(&mut self, boxed: BoxedPlugin) {
        let BoxedPlugin { id, plugin } = boxed;
        let name = plugin.name().to_string();
        tracing::trace!(plugin = %name, "plugin queued");
        self.pending.push(PluginEntry {
            id,
            plugin: Arc::from(plugin),
            name,
        });
    }

    /// Returns `true` if a plugin of type `P` was added.
    #[must_use]
    pub fn has_plugin<P: Plugin>(&self) -> bool {
        let id = PluginId::of::<P>();
        self.pending
            .iter()
            .chain(&self.built)
            .any(|entry| entry.id == id)
    }

    /// Names of the built plugins, in build order.
    pub fn plugin_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.built.iter().map(|entry| entry.name.as_str())
    }

    /// Returns `true` once [`finish`](Self::finish) has completed.
    #[must_use]
    pub fn is_built(&self) -> bool {
        self.state == BuildState::Built
    }

    /// Builds and readies every queued plugin in dependency order.
    ///
    /// # Errors
    ///
    /// - [`PluginError::AlreadyBuilt`] on a second call
    /// - [`PluginError::Duplicate`], [`PluginError::MissingDependency`] or
    ///   [`PluginError::CircularDependency`] if the plugin set is invalid
    /// - [`PluginError::Build`] if a plugin's `build` or `ready` fails
    pub fn finish(&mut self) -> Result<(), PluginError> {
        if self.state != BuildState::NotStarted {
            return Err(PluginError::AlreadyBuilt);
        }
        self.state = BuildState::Building;

        let first_ready = self.built.len();
        while !self.pending.is_empty() {
            let batch = self.sort_pending()?;
            for entry in batch {
                tracing::debug!(plugin = %entry.name, "building plugin");
                let plugin = Arc::clone(&entry.plugin);
                let name = entry.name.clone();
                self.built.push(entry);
                plugin
                    .build(self)
                    .map_err(|source| PluginError::Build {
                        plugin: name,
                        phase: "build",
                        source,
                    })?;
            }
        }

        for index in first_ready..self.built.len() {
            let plugin = Arc::clone(&self.built[index].plugin);
            plugin.ready(self).map_err(|source| PluginError::Build {
                plugin: self.built[index].name.clone(),
                phase: "ready",
                source,
            })?;
        }

        self.state = BuildState::Built;
        tracing::debug!(plugins = self.built.len(), "project built");
        Ok(())
    }

    /// Runs every plugin's cleanup, dependents before their dependencies.
    pub fn cleanup(&mut self) {
        let plugins: Vec<_> = self
            .built
            .iter()
            .rev()
            .map(|entry| Arc::clone(&entry.plugin))
            .collect();
        for plugin in plugins {
            plugin.cleanup(self);
        }
    }

    /// Advances every entity to [`Stage::Finalized`].
    ///
    /// # Errors
    ///
    /// Propagates the first failure from [`ModelRegistry::advance_all`].
    pub fn finalize(&mut self) -> ModelResult<()> {
        self.registry.advance_all(Stage::Finalized)
    }

    /// Validates the pending plugins and drains them in dependency order
    /// (Kahn's algorithm).
    fn sort_pending(&mut self) -> Result<Vec<PluginEntry>, PluginError> {
        let pending = core::mem::take(&mut self.pending);

        let mut index_of: HashMap<PluginId, usize> = HashMap::new();
        for (index, entry) in pending.iter().enumerate() {
            let seen = index_of.contains_key(&entry.id)
                || self.built.iter().any(|built| built.id == entry.id);
            if seen && entry.plugin.is_unique() {
                return Err(PluginError::Duplicate {
                    plugin: entry.name.clone(),
                });
            }
            index_of.entry(entry.id).or_insert(index);
        }

        let count = pending.len();
        let mut in_degree = vec![0usize; count];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); count];
        for (index, entry) in pending.iter().enumerate() {
            for dependency in entry.plugin.dependencies() {
                if let Some(&dep_index) = index_of.get(&dependency) {
                    dependents[dep_index].push(index);
                    in_degree[index] += 1;
                } else if !self.built.iter().any(|built| built.id == dependency) {
                    return Err(PluginError::MissingDependency {
                        plugin: entry.name.clone(),
                        dependency: dependency.type_name(),
                    });
                }
            }
        }

        // Lowest index first keeps insertion order among independent plugins.
        let mut ready: std::collections::BTreeSet<usize> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, degree)| **degree == 0)
            .map(|(index, _)| index)
            .collect();
        let mut order = Vec::with_capacity(count);
        while let Some(index) = ready.pop_first() {
            order.push(index);
            for &dependent in &dependents[index] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        if order.len() != count {
            let plugins = in_degree
                .iter()
                .enumerate()
                .filter(|(_, degree)| **degree > 0)
                .map(|(index, _)| pending[index].name.clone())
                .collect();
            return Err(PluginError::CircularDependency { plugins });
        }

        let mut slots: Vec<Option<PluginEntry>> = pending.into_iter().map(Some).collect();
        Ok(order
            .into_iter()
            .filter_map(|index| slots[index].take())
            .collect())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Registry
    // ─────────────────────────────────────────────────────────────────────────

    /// Returns the registry.
    #[must_use]
    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Returns the registry mutably.
    #[must_use]
    pub fn registry_mut(&mut self) -> &mut ModelRegistry {
        &mut self.registry
    }

    /// Hands the registry off, e.g. to a task-execution engine.
    #[must_use]
    pub fn into_registry(self) -> ModelRegistry {
        self.registry
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Resources
    // ─────────────────────────────────────────────────────────────────────────

    /// Stores a plugin setting, returning the value it replaced.
    pub fn insert_resource<R: Send + Sync + 'static>(&mut self, resource: R) -> Option<R> {
        self.resources
            .insert(TypeId::of::<R>(), Box::new(resource))
            .and_then(|old| old.downcast::<R>().ok())
            .map(|old| *old)
    }

    /// Returns `true` if a resource of type `R` is stored.
    #[must_use]
    pub fn contains_resource<R: Send + Sync + 'static>(&self) -> bool {
        self.resources.contains_key(&TypeId::of::<R>())
    }

    /// Returns a stored resource.
    #[must_use]
    pub fn get_resource<R: Send + Sync + 'static>(&self) -> Option<&R> {
        self.resources
            .get(&TypeId::of::<R>())
            .and_then(|boxed| boxed.downcast_ref::<R>())
    }

    /// Returns a stored resource mutably.
    #[must_use]
    pub fn get_resource_mut<R: Send + Sync + 'static>(&mut self) -> Option<&mut R> {
        self.resources
            .get_mut(&TypeId::of::<R>())
            .and_then(|boxed| boxed.downcast_mut::<R>())
    }

    /// Removes a resource.
    pub fn remove_resource<R: Send + Sync + 'static>(&mut self) -> Option<R> {
        self.resources
            .shift_remove(&TypeId::of::<R>())
            .and_then(|old| old.downcast::<R>().ok())
            .map(|old| *old)
    }
}

impl fmt::Debug for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Project")
            .field("state", &self.state)
            .field(
                "plugins",
                &self
                    .built
                    .iter()
                    .chain(&self.pending)
                    .map(|entry| entry.name.as_str())
                    .collect::<Vec<_>>(),
            )
            .field("resources", &self.resources.len())
            .field("registry", &self.registry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Tag;
    use crate::rule::Rule;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Journal(Mutex<Vec<String>>);

    impl Journal {
        fn push(&self, entry: impl Into<String>) {
            self.0.lock().unwrap().push(entry.into());
        }
    }

    fn journal(project: &Project) -> Vec<String> {
        project
            .get_resource::<Journal>()
            .map(|journal| journal.0.lock().unwrap().clone())
            .unwrap_or_default()
    }

    struct Base;
    impl Plugin for Base {
        fn build(&self, project: &mut Project) -> Result<(), ModelError> {
            project.insert_resource(Journal::default());
            project.get_resource::<Journal>().unwrap().push("build base");
            Ok(())
        }
        fn ready(&self, project: &mut Project) -> Result<(), ModelError> {
            project.get_resource::<Journal>().unwrap().push("ready base");
            Ok(())
        }
        fn cleanup(&self, project: &mut Project) {
            project.get_resource::<Journal>().unwrap().push("cleanup base");
        }
    }

    struct Language;
    impl Plugin for Language {
        fn build(&self, project: &mut Project) -> Result<(), ModelError> {
            project.get_resource::<Journal>().unwrap().push("build language");
            Ok(())
        }
        fn ready(&self, project: &mut Project) -> Result<(), ModelError> {
            project.get_resource::<Journal>().unwrap().push("ready language");
            Ok(())
        }
        fn cleanup(&self, project: &mut Project) {
            project.get_resource::<Journal>().unwrap().push("cleanup language");
        }
        fn dependencies(&self) -> Vec<PluginId> {
            vec![PluginId::of::<Base>()]
        }
    }

    #[test]
    fn plugins_build_in_dependency_order() {
        let mut project = Project::new();
        project.add_plugins(Language).add_plugins(Base);
        project.finish().unwrap();
        project.cleanup();

        assert_eq!(
            journal(&project),
            vec![
                "build base",
                "build language",
                "ready base",
                "ready language",
                "cleanup language",
                "cleanup base",
            ]
        );
    }

    #[test]
    fn finish_twice_fails() {
        let mut project = Project::new();
        project.finish().unwrap();
        assert!(matches!(project.finish(), Err(PluginError::AlreadyBuilt)));
    }

    #[test]
    fn duplicate_unique_plugin_is_rejected() {
        let mut project = Project::new();
        project.add_plugins(Base).add_plugins(Base);
        assert!(matches!(
            project.finish(),
            Err(PluginError::Duplicate { plugin }) if plugin.ends_with("Base")
        ));
    }

    #[test]
    fn missing_dependency_is_reported() {
        let mut project = Project::new();
        project.add_plugins(Language);
        let error = project.finish().unwrap_err();
        assert!(matches!(
            error,
            PluginError::MissingDependency { dependency, .. } if dependency.ends_with("Base")
        ));
    }

    struct Ping;
    struct Pong;
    impl Plugin for Ping {
        fn build(&self, _project: &mut Project) -> Result<(), ModelError> {
            Ok(())
        }
        fn dependencies(&self) -> Vec<PluginId> {
            vec![PluginId::of::<Pong>()]
        }
    }
    impl Plugin for Pong {
        fn build(&self, _project: &mut Project) -> Result<(), ModelError> {
            Ok(())
        }
        fn dependencies(&self) -> Vec<PluginId> {
            vec![PluginId::of::<Ping>()]
        }
    }

    #[test]
    fn circular_dependencies_are_reported() {
        let mut project = Project::new();
        project.add_plugins(Ping).add_plugins(Pong);
        let Err(PluginError::CircularDependency { plugins }) = project.finish() else {
            panic!("expected a circular dependency");
        };
        assert_eq!(plugins.len(), 2);
    }

    struct Marker;
    impl Tag for Marker {}

    struct RulePlugin;
    impl Plugin for RulePlugin {
        fn build(&self, project: &mut Project) -> Result<(), ModelError> {
            project.registry_mut().add_rule(
                Rule::builder("mark")
                    .at_stage(Stage::Discovered)
                    .run(|ctx| {
                        ctx.add_tag(Marker)?;
                        Ok(())
                    }),
            )?;
            // Registering the same name twice surfaces as a build error.
            project
                .registry_mut()
                .add_rule(Rule::builder("mark").run(|_| Ok(())))?;
            Ok(())
        }
    }

    #[test]
    fn build_errors_name_the_plugin() {
        let mut project = Project::new();
        project.add_plugins(RulePlugin);
        let Err(PluginError::Build { plugin, phase, source }) = project.finish() else {
            panic!("expected a build error");
        };
        assert!(plugin.ends_with("RulePlugin"));
        assert_eq!(phase, "build");
        assert!(matches!(source, ModelError::DuplicateRule { .. }));
    }

    struct Spawner;
    impl Plugin for Spawner {
        fn build(&self, project: &mut Project) -> Result<(), ModelError> {
            project.add_plugins(Base);
            Ok(())
        }
    }

    #[test]
    fn plugins_added_during_build_are_built() {
        let mut project = Project::new();
        project.add_plugins(Spawner);
        project.finish().unwrap();
        assert!(project.has_plugin::<Base>());
        assert_eq!(journal(&project), vec!["build base", "ready base"]);
    }

    #[test]
    fn resources_round_trip() {
        let mut project = Project::new();
        assert_eq!(project.insert_resource(3_u32), None);
        assert_eq!(project.insert_resource(4_u32), Some(3));
        *project.get_resource_mut::<u32>().unwrap() += 1;
        assert_eq!(project.get_resource::<u32>(), Some(&5));
        assert_eq!(project.remove_resource::<u32>(), Some(5));
        assert!(!project.contains_resource::<u32>());
    }

    #[test]
    fn finalize_advances_everything() {
        let mut project = Project::new();
        project.finish().unwrap();
        let app = project.registry_mut().register_root("app").unwrap();
        let lib = project.registry_mut().register_child(&"app".parse().unwrap(), "lib").unwrap();

        project.finalize().unwrap();
        let registry = project.into_registry();
        assert_eq!(registry.stage(app).unwrap(), Stage::Finalized);
        assert_eq!(registry.stage(lib).unwrap(), Stage::Finalized);
    }
}
