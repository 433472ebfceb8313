//! Native source languages.

use core::fmt;

use arbor_core_plugins::NamingPlugin;
use arbor_core_plugins::naming::ElementName;
use arbor_model::error::ModelError;
use arbor_model::plugin::{Plugin, PluginId};
use arbor_model::project::Project;
use arbor_model::registration::EntityRegistration;
use arbor_model::rule::Rule;
use arbor_model::stage::Stage;
use arbor_model::{Component, Tag};

/// A supported source language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    /// C.
    C,
    /// C++.
    Cpp,
}

impl Language {
    /// Element name of the language's source set.
    #[must_use]
    pub fn element_name(self) -> &'static str {
        match self {
            Language::C => "c",
            Language::Cpp => "cpp",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Language::C => "C",
            Language::Cpp => "C++",
        })
    }
}

/// The owner has C sources.
#[derive(Tag)]
pub struct HasCSources;

/// The owner has C++ sources.
#[derive(Tag)]
pub struct HasCppSources;

/// Sources of one language, owned by a component.
#[derive(Component, Debug, Clone)]
pub struct SourceSet {
    /// Language of the sources.
    pub language: Language,
    /// Directory holding the sources, relative to the project.
    pub directory: String,
}

/// Registers a source set under every owner tagged with a language tag.
///
/// | Tag | Child |
/// |-----|-------|
/// | [`HasCSources`] | `<owner>.c` |
/// | [`HasCppSources`] | `<owner>.cpp` |
#[derive(Debug, Default)]
pub struct NativeLanguagePlugin;

fn source_set_rule<T: Send + Sync + 'static>(language: Language) -> Rule {
    Rule::builder(format!("native.{}-sources", language.element_name()))
        .requires::<T>()
        .at_stage(Stage::Discovered)
        .run(move |ctx| {
            let name = language.element_name();
            let directory = format!("src/{}/{}", ctx.path().name(), name);
            tracing::debug!(owner = %ctx.path(), %language, "registering source set");
            ctx.register_child_with(
                EntityRegistration::new(name)
                    .with_component(ElementName::new(name))
                    .with_component(SourceSet {
                        language,
                        directory,
                    }),
            )?;
            Ok(())
        })
}

impl Plugin for NativeLanguagePlugin {
    fn build(&self, project: &mut Project) -> Result<(), ModelError> {
        let registry = project.registry_mut();
        registry.add_rule(source_set_rule::<HasCSources>(Language::C))?;
        registry.add_rule(source_set_rule::<HasCppSources>(Language::Cpp))?;
        Ok(())
    }

    fn dependencies(&self) -> Vec<PluginId> {
        vec![PluginId::of::<NamingPlugin>()]
    }
}
