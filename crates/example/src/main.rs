//! Example native application CLI.
//!
//! Models one application per argument, finalizes the project and logs the
//! resolved executables.
//!
//! # Usage
//!
//! ```bash
//! native-app [name[=base]]...
//! ```
//!
//! # Example
//!
//! ```bash
//! RUST_LOG=debug native-app app tools=arbor-tools
//! ```

use std::process::ExitCode;

use arbor_model::error::BoxError;
use example::{Language, native_project, register_application, set_base_name};

fn run(arguments: &[String]) -> Result<(), BoxError> {
    let mut project = native_project(true)?;

    let mut applications = Vec::new();
    for argument in arguments {
        let (name, base_name) = match argument.split_once('=') {
            Some((name, base_name)) => (name, Some(base_name)),
            None => (argument.as_str(), None),
        };
        let app = register_application(
            project.registry_mut(),
            name,
            &[Language::C, Language::Cpp],
        )?;
        if let Some(base_name) = base_name {
            set_base_name(project.registry(), &app, base_name)?;
        }
        applications.push(app);
    }

    project.finalize()?;

    for app in &applications {
        let executable = app.get(project.registry_mut())?;
        tracing::info!(
            application = %app.path(),
            file = %executable.file,
            sources = ?executable.sources,
            "resolved executable"
        );
    }
    tracing::info!(entities = project.registry().len(), "model finalized");

    project.cleanup();
    Ok(())
}

fn main() -> ExitCode {
    let mut arguments: Vec<String> = std::env::args().skip(1).collect();
    if arguments.is_empty() {
        arguments.push("app".to_string());
    }

    match run(&arguments) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(%error, "failed to build the model");
            ExitCode::FAILURE
        }
    }
}
