//! Example native application model built with Arbor.
//!
//! Applications are registered as roots tagged with their source languages.
//! Plugins react to the tags:
//!
//! ```text
//! app                     NativeApplication, HasCSources, HasCppSources
//! ├── app.c               SourceSet { C, "src/app/c" }          (discovered)
//! └── app.cpp             SourceSet { C++, "src/app/cpp" }      (discovered)
//!
//! Executable (primary)    resolved before app is realized
//! ```
//!
//! # Example
//!
//! ```
//! use example::{Language, native_project, register_application};
//!
//! let mut project = native_project(false).unwrap();
//! let app = register_application(project.registry_mut(), "app", &[Language::C]).unwrap();
//! project.finalize().unwrap();
//!
//! let executable = app.get(project.registry_mut()).unwrap();
//! assert_eq!(executable.file, "build/exe/app/app");
//! assert_eq!(executable.sources, vec!["src/app/c"]);
//! ```

mod application;
mod language;

pub use application::{
    APPLICATION_RULE, BaseName, Executable, NativeApplication, NativeApplicationPlugin,
    register_application, set_base_name,
};
pub use language::{HasCSources, HasCppSources, Language, NativeLanguagePlugin, SourceSet};

use arbor_core_plugins::{DefaultPlugins, TracingPlugin};
use arbor_model::plugin::PluginGroup;
use arbor_model::project::{PluginError, Project};

/// Builds a project with the default plugins and native support.
///
/// `log` controls whether a global tracing subscriber is installed.
///
/// # Errors
///
/// Propagates [`Project::finish`] failures.
pub fn native_project(log: bool) -> Result<Project, PluginError> {
    let tracing = if log {
        TracingPlugin::default()
    } else {
        TracingPlugin::default().without_subscriber()
    };

    let mut project = Project::new();
    project
        .add_plugins(
            DefaultPlugins
                .build()
                .disable::<TracingPlugin>()
                .add(tracing),
        )
        .add_plugins(NativeApplicationPlugin)
        .add_plugins(NativeLanguagePlugin);
    project.finish()?;
    Ok(project)
}
