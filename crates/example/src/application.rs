//! Native applications and their executables.

use arbor_core_plugins::naming::{ElementName, QualifyingName};
use arbor_core_plugins::{NamingPlugin, Property, PropertyPlugin};
use arbor_model::error::{BoxError, ModelError, ModelResult};
use arbor_model::known::KnownEntity;
use arbor_model::plugin::{Plugin, PluginId};
use arbor_model::project::Project;
use arbor_model::projection::ProjectionContext;
use arbor_model::query::EntitySpec;
use arbor_model::registration::EntityRegistration;
use arbor_model::registry::ModelRegistry;
use arbor_model::rule::Rule;
use arbor_model::{Component, Tag};

use crate::language::{HasCSources, HasCppSources, Language, NativeLanguagePlugin, SourceSet};

/// Marks an entity as a native application.
#[derive(Tag)]
pub struct NativeApplication;

/// Base file name of the linked binary.
#[derive(Component, Debug, Clone, PartialEq, Eq)]
pub struct BaseName(pub String);

/// Primary projection of a native application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Executable {
    /// Output file, relative to the project.
    pub file: String,
    /// Source directories compiled into the binary, in path order.
    pub sources: Vec<String>,
}

/// Gives every [`NativeApplication`] a base name property and an
/// [`Executable`] primary projection.
///
/// Adds a [`PropertyPlugin`] that freezes the base name on finalization.
#[derive(Debug, Default)]
pub struct NativeApplicationPlugin;

/// Name of the rule configuring applications.
pub const APPLICATION_RULE: &str = "native.application";

fn link_executable(ctx: &mut ProjectionContext<'_>) -> Executable {
    let base_name = ctx
        .component::<Property<BaseName>>()
        .and_then(|property| property.get_optional())
        .map_or_else(|| ctx.path().name().to_string(), |name| name.0);
    let directory = ctx
        .component::<QualifyingName>()
        .map_or_else(|| ctx.path().name().to_string(), |name| name.to_string());

    let registry = ctx.registry();
    let spec = EntitySpec::descendants_of(ctx.path().clone())
        .and(EntitySpec::with_component::<SourceSet>());
    let sources = registry
        .query_sorted(&spec)
        .into_iter()
        .filter_map(|id| registry.find_component::<SourceSet>(id))
        .map(|set| set.directory.clone())
        .collect();

    Executable {
        file: format!("build/exe/{directory}/{base_name}"),
        sources,
    }
}

impl Plugin for NativeApplicationPlugin {
    fn build(&self, project: &mut Project) -> Result<(), ModelError> {
        project.add_plugins(PropertyPlugin::new().finalize_on::<BaseName>());
        project.registry_mut().add_rule(
            Rule::builder(APPLICATION_RULE)
                .requires::<NativeApplication>()
                .run(|ctx| {
                    let base_name = Property::new();
                    base_name.convention(BaseName(ctx.path().name().to_string()))?;
                    ctx.add_component(base_name)?;
                    if !ctx.has::<ElementName>() {
                        ctx.add_component(ElementName::new(ctx.path().name()))?;
                    }
                    ctx.bind_primary_projection(link_executable)?;
                    Ok(())
                }),
        )?;
        Ok(())
    }

    fn dependencies(&self) -> Vec<PluginId> {
        vec![
            PluginId::of::<NamingPlugin>(),
            PluginId::of::<NativeLanguagePlugin>(),
        ]
    }
}

/// Registers a root application with sources in `languages`.
///
/// # Errors
///
/// Fails like [`ModelRegistry::register`], including failures of the rules
/// that run on registration.
pub fn register_application(
    registry: &mut ModelRegistry,
    name: &str,
    languages: &[Language],
) -> ModelResult<KnownEntity<Executable>> {
    let mut registration = EntityRegistration::new(name).with_tag(NativeApplication);
    for language in languages {
        registration = match language {
            Language::C => registration.with_tag(HasCSources),
            Language::Cpp => registration.with_tag(HasCppSources),
        };
    }
    let entity = registry.register(registration)?;
    KnownEntity::new(registry, entity)
}

/// Overrides the base name of an application before it is finalized.
///
/// # Errors
///
/// Returns [`ModelError::MissingComponent`] if the entity is not a native
/// application and an error if its base name is already final.
pub fn set_base_name(
    registry: &ModelRegistry,
    app: &KnownEntity<Executable>,
    base_name: &str,
) -> Result<(), BoxError> {
    let property = registry.component::<Property<BaseName>>(app.entity())?;
    property.set(BaseName(base_name.to_string()))?;
    Ok(())
}
