//! Lazily-finalized configuration values.
//!
//! A [`Property`] holds an explicit value, a fallback convention, or
//! nothing. Once finalized, its value is frozen: the convention (if no
//! explicit value was set) is baked in and further writes fail.
//!
//! Properties are attached to entities as components and shared behind
//! [`Arc`](std::sync::Arc), so they are written through `&self`.
//! [`PropertyPlugin::finalize_on`] installs a rule that freezes every
//! `Property<T>` once its entity reaches [`Stage::Finalized`].
//!
//! ```
//! use arbor_core_plugins::property::{Property, PropertyError};
//!
//! let optimize = Property::<bool>::new();
//! optimize.convention(false).unwrap();
//! assert_eq!(optimize.get(), Ok(false));
//!
//! optimize.set(true).unwrap();
//! optimize.finalize_value();
//! assert_eq!(optimize.get(), Ok(true));
//! assert!(matches!(optimize.set(false), Err(PropertyError::Finalized { .. })));
//! ```

use core::any::type_name;
use core::fmt;

use arbor_model::component::{Component, short_type_name};
use arbor_model::error::ModelError;
use arbor_model::plugin::Plugin;
use arbor_model::project::Project;
use arbor_model::rule::Rule;
use arbor_model::stage::Stage;
use parking_lot::{Mutex, MutexGuard};

/// Errors raised by [`Property`] accessors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PropertyError {
    /// The property was finalized and can no longer change.
    #[error("property of type {ty} is final and cannot be changed")]
    Finalized {
        /// Short name of the value type.
        ty: &'static str,
    },

    /// Neither a value nor a convention is present.
    #[error("property of type {ty} has no value")]
    Missing {
        /// Short name of the value type.
        ty: &'static str,
    },
}

struct PropertyState<T> {
    value: Option<T>,
    convention: Option<T>,
    finalized: bool,
}

/// A configurable value with a convention fallback and a final state.
pub struct Property<T> {
    state: Mutex<PropertyState<T>>,
}

impl<T> Default for Property<T> {
    fn default() -> Self {
        Self {
            state: Mutex::new(PropertyState {
                value: None,
                convention: None,
                finalized: false,
            }),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Component for Property<T> {}

impl<T: Clone> Property<T> {
    /// Creates an empty property.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a property holding `value`.
    #[must_use]
    pub fn with_value(value: T) -> Self {
        let property = Self::default();
        property.state.lock().value = Some(value);
        property
    }

    /// Returns the explicit value, falling back to the convention.
    ///
    /// # Errors
    ///
    /// Returns [`PropertyError::Missing`] if neither is present.
    pub fn get(&self) -> Result<T, PropertyError> {
        self.get_optional().ok_or(PropertyError::Missing {
            ty: Self::value_type(),
        })
    }

    /// Returns the explicit value or the convention, if any.
    #[must_use]
    pub fn get_optional(&self) -> Option<T> {
        let state = self.state.lock();
        state.value.clone().or_else(|| state.convention.clone())
    }

    /// Sets the explicit value.
    ///
    /// # Errors
    ///
    /// Returns [`PropertyError::Finalized`] after [`finalize_value`](Self::finalize_value).
    pub fn set(&self, value: T) -> Result<(), PropertyError> {
        let mut state = self.writable()?;
        state.value = Some(value);
        Ok(())
    }

    /// Sets the value used when no explicit value is present.
    ///
    /// # Errors
    ///
    /// Returns [`PropertyError::Finalized`] after [`finalize_value`](Self::finalize_value).
    pub fn convention(&self, value: T) -> Result<(), PropertyError> {
        let mut state = self.writable()?;
        state.convention = Some(value);
        Ok(())
    }

    /// Freezes the current value. Repeated calls are no-ops.
    pub fn finalize_value(&self) {
        let mut state = self.state.lock();
        if state.finalized {
            return;
        }
        if state.value.is_none() {
            state.value = state.convention.take();
        }
        state.finalized = true;
    }

    /// Returns `true` if a value or a convention is present.
    #[must_use]
    pub fn is_present(&self) -> bool {
        let state = self.state.lock();
        state.value.is_some() || state.convention.is_some()
    }

    /// Returns `true` once the value is frozen.
    #[must_use]
    pub fn is_final(&self) -> bool {
        self.state.lock().finalized
    }

    fn writable(&self) -> Result<MutexGuard<'_, PropertyState<T>>, PropertyError> {
        let state = self.state.lock();
        if state.finalized {
            return Err(PropertyError::Finalized {
                ty: Self::value_type(),
            });
        }
        Ok(state)
    }

    fn value_type() -> &'static str {
        short_type_name(type_name::<T>())
    }
}

impl<T: fmt::Debug> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Property")
            .field("value", &state.value)
            .field("convention", &state.convention)
            .field("finalized", &state.finalized)
            .finish()
    }
}

/// Finalizes selected property types when their entity is finalized.
///
/// Several instances may be added to one project, one per plugin that owns
/// property types. Finalizing the same type twice fails with
/// [`ModelError::DuplicateRule`].
///
/// ```
/// use arbor_core_plugins::property::{Property, PropertyPlugin};
/// use arbor_model::prelude::*;
///
/// let mut project = Project::new();
/// project.add_plugins(PropertyPlugin::new().finalize_on::<String>());
/// project.finish().unwrap();
///
/// let app = project
///     .registry_mut()
///     .register(EntityRegistration::new("app").with_component(Property::with_value("app".to_string())))
///     .unwrap();
/// project.finalize().unwrap();
///
/// let name = project.registry().component::<Property<String>>(app).unwrap();
/// assert!(name.is_final());
/// ```
#[derive(Default)]
pub struct PropertyPlugin {
    finalizers: Vec<fn() -> Rule>,
}

impl PropertyPlugin {
    /// Creates a plugin that finalizes nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Finalizes `Property<T>` components on [`Stage::Finalized`].
    #[must_use]
    pub fn finalize_on<T: Clone + Send + Sync + 'static>(mut self) -> Self {
        self.finalizers.push(finalize_rule::<T>);
        self
    }

    /// Returns the number of finalized property types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.finalizers.len()
    }

    /// Returns `true` if no property type is finalized.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.finalizers.is_empty()
    }
}

/// Builds the rule freezing `Property<T>`.
fn finalize_rule<T: Clone + Send + Sync + 'static>() -> Rule {
    Rule::builder(format!("property.finalize {}", type_name::<T>()))
    .at_stage(Stage::Finalized)
    .continuous()
    .run_with::<(Property<T>,), _>(|ctx, (property,)| {
        property.finalize_value();
        tracing::trace!(path = %ctx.path(), "finalized property");
        Ok(())
    })
}

impl Plugin for PropertyPlugin {
    fn build(&self, project: &mut Project) -> Result<(), ModelError> {
        let registry = project.registry_mut();
        for finalizer in &self.finalizers {
            registry.add_rule(finalizer())?;
        }
        Ok(())
    }

    // Each plugin finalizes its own property types.
    fn is_unique(&self) -> bool {
        false
    }
}
