//! Element, qualifying and display names.
//!
//! An entity's [`ElementName`] is its local name within its owner. Its
//! [`QualifyingName`] joins the element names of every ancestor (outermost
//! first) and its own into a single lower-camel identifier, so that a
//! `test` component of `main` sources qualifies as `mainTest`. Ancestors
//! tagged [`ExcludeFromQualifyingName`], or without an element name, are
//! skipped.
//!
//! [`NamingPlugin`] installs two rules:
//!
//! | Rule | Stage | Effect |
//! |------|-------|--------|
//! | [`QUALIFYING_NAME_RULE`] | discovered | adds [`QualifyingName`] to entities with an [`ElementName`] |
//! | [`DISPLAY_NAME_RULE`] | created | adds a [`DisplayName`] derived from the path when none was given |
//!
//! Ancestors reach a stage before their descendants, so element names added
//! to an owner up to its own discovery are visible to its children.

use core::fmt;

use arbor_model::entity::EntityId;
use arbor_model::error::{ModelError, ModelResult};
use arbor_model::plugin::Plugin;
use arbor_model::project::Project;
use arbor_model::query::EntitySpec;
use arbor_model::registry::ModelRegistry;
use arbor_model::rule::Rule;
use arbor_model::stage::Stage;
use arbor_model::{Component, Tag};

/// Name of the rule deriving [`QualifyingName`].
pub const QUALIFYING_NAME_RULE: &str = "naming.qualifying-name";

/// Name of the rule deriving [`DisplayName`].
pub const DISPLAY_NAME_RULE: &str = "naming.display-name";

/// Local name of an entity within its owner.
#[derive(Component, Debug, Clone, PartialEq, Eq)]
pub struct ElementName(pub String);

impl ElementName {
    /// Creates an element name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl fmt::Display for ElementName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lower-camel concatenation of the element names along an entity's
/// ownership chain.
#[derive(Component, Debug, Clone, PartialEq, Eq)]
pub struct QualifyingName(String);

impl QualifyingName {
    /// Joins `parts`, outermost first.
    ///
    /// ```
    /// use arbor_core_plugins::naming::QualifyingName;
    ///
    /// let name = QualifyingName::from_parts(["Main", "cpp", "headers"]);
    /// assert_eq!(name.as_str(), "mainCppHeaders");
    /// ```
    pub fn from_parts<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut name = String::new();
        for part in parts {
            let part = part.as_ref();
            let mut chars = part.chars();
            let Some(first) = chars.next() else {
                continue;
            };
            if name.is_empty() {
                name.extend(first.to_lowercase());
            } else {
                name.extend(first.to_uppercase());
            }
            name.push_str(chars.as_str());
        }
        Self(name)
    }

    /// Returns the name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QualifyingName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Human-readable description of an entity.
#[derive(Component, Debug, Clone, PartialEq, Eq)]
pub struct DisplayName(pub String);

impl fmt::Display for DisplayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Marks an entity whose element name is left out of its descendants'
/// qualifying names.
#[derive(Tag, Debug)]
pub struct ExcludeFromQualifyingName;

/// Computes the qualifying name of `entity` from the components currently
/// attached to it and its ancestors.
///
/// The entity's own element name is always included, even when it carries
/// [`ExcludeFromQualifyingName`].
///
/// # Errors
///
/// Returns [`ModelError::UnknownEntity`] if `entity` is not registered.
pub fn qualifying_name(registry: &ModelRegistry, entity: EntityId) -> ModelResult<QualifyingName> {
    let target = registry.entity(entity)?;
    let mut parts = Vec::new();
    if let Some(own) = target.get::<ElementName>() {
        parts.push(own.0.clone());
    }

    let mut current = target.parent();
    while let Some(id) = current {
        let ancestor = registry.entity(id)?;
        if !ancestor.has::<ExcludeFromQualifyingName>()
            && let Some(name) = ancestor.get::<ElementName>()
        {
            parts.push(name.0.clone());
        }
        current = ancestor.parent();
    }

    parts.reverse();
    Ok(QualifyingName::from_parts(parts))
}

/// Installs the naming rules.
///
/// # Example
///
/// ```
/// use arbor_core_plugins::naming::{ElementName, NamingPlugin, QualifyingName};
/// use arbor_model::prelude::*;
///
/// let mut project = Project::new();
/// project.add_plugins(NamingPlugin);
/// project.finish().unwrap();
///
/// let registry = project.registry_mut();
/// registry
///     .register(EntityRegistration::new("main").with_component(ElementName::new("main")))
///     .unwrap();
/// let test = registry
///     .register(
///         EntityRegistration::new("test")
///             .parent("main".parse().unwrap())
///             .with_component(ElementName::new("test")),
///     )
///     .unwrap();
/// registry.advance(test, Stage::Discovered).unwrap();
///
/// let name = registry.component::<QualifyingName>(test).unwrap();
/// assert_eq!(name.as_str(), "mainTest");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct NamingPlugin;

impl NamingPlugin {
    fn qualifying_name_rule() -> Rule {
        Rule::builder(QUALIFYING_NAME_RULE)
            .requires::<ElementName>()
            .at_stage(Stage::Discovered)
            .matching(!EntitySpec::with_component::<QualifyingName>())
            .run(|ctx| {
                let name = qualifying_name(ctx.registry(), ctx.entity())?;
                tracing::trace!(path = %ctx.path(), qualifying_name = %name, "derived qualifying name");
                ctx.add_component(name)?;
                Ok(())
            })
    }

    fn display_name_rule() -> Rule {
        Rule::builder(DISPLAY_NAME_RULE)
            .at_stage(Stage::Created)
            .matching(!EntitySpec::with_component::<DisplayName>())
            .run(|ctx| {
                let name = DisplayName(format!("'{}'", ctx.path()));
                ctx.add_component(name)?;
                Ok(())
            })
    }
}

impl Plugin for NamingPlugin {
    fn build(&self, project: &mut Project) -> Result<(), ModelError> {
        let registry = project.registry_mut();
        registry.add_rule(Self::qualifying_name_rule())?;
        registry.add_rule(Self::display_name_rule())?;
        Ok(())
    }
}
