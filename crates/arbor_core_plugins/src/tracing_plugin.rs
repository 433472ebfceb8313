//! Tracing and observability plugin.
//!
//! Provides [`TracingPlugin`], which configures the `tracing` subscriber and
//! mirrors every [`ModelEvent`] into the log at debug level.
//!
//! # Lifecycle
//!
//! - **`build()`** inserts the [`TracingConfig`] resource and subscribes the
//!   event observer, so entities registered by later plugins are logged too.
//! - **`ready()`** installs the subscriber. Installation is deferred so that
//!   other plugins can read the configuration first. An already installed
//!   global subscriber is left in place.
//!
//! # Example
//!
//! ```
//! use arbor_core_plugins::{TracingConfig, TracingFormat, TracingPlugin};
//! use arbor_model::project::Project;
//! use tracing::Level;
//!
//! let mut project = Project::new();
//! project.add_plugins(
//!     TracingPlugin::default()
//!         .with_level(Level::DEBUG)
//!         .with_format(TracingFormat::Compact),
//! );
//! project.finish().unwrap();
//!
//! let config = project.get_resource::<TracingConfig>().unwrap();
//! assert_eq!(config.level, Level::DEBUG);
//! ```

use arbor_model::error::ModelError;
use arbor_model::event::{AllEvents, ModelEvent};
use arbor_model::plugin::Plugin;
use arbor_model::project::Project;
use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Name under which the event observer is subscribed.
pub const EVENT_OBSERVER: &str = "arbor::tracing";

// ─────────────────────────────────────────────────────────────────────────────
// TracingFormat
// ─────────────────────────────────────────────────────────────────────────────

/// Tracing output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TracingFormat {
    /// Human-readable multi-line output (default).
    #[default]
    Pretty,
    /// Compact single-line output.
    Compact,
    /// JSON structured output.
    Json,
}

// ─────────────────────────────────────────────────────────────────────────────
// TracingConfig Resource
// ─────────────────────────────────────────────────────────────────────────────

/// Project resource exposing the tracing configuration.
///
/// Plugins can read it during `ready` to decide how chatty to be:
///
/// ```
/// use arbor_core_plugins::{TracingConfig, TracingPlugin};
/// use arbor_model::project::Project;
/// use tracing::Level;
///
/// let mut project = Project::new();
/// project.add_plugins(TracingPlugin::new().without_subscriber());
/// project.finish().unwrap();
///
/// let verbose = project
///     .get_resource::<TracingConfig>()
///     .is_some_and(|config| config.level >= Level::DEBUG);
/// assert!(!verbose);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct TracingConfig {
    /// The configured log level.
    pub level: Level,
    /// The configured output format.
    pub format: TracingFormat,
    /// Whether model events are logged.
    pub log_events: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// TracingPlugin
// ─────────────────────────────────────────────────────────────────────────────

/// Tracing and logging plugin.
///
/// # Resources Provided
///
/// | Resource | Description |
/// |----------|-------------|
/// | [`TracingConfig`] | Tracing configuration (read-only) |
///
/// # Environment Filter
///
/// Use [`with_env_filter`](Self::with_env_filter) for target-specific
/// levels. An invalid filter falls back to the plain level.
///
/// ```
/// use arbor_core_plugins::TracingPlugin;
///
/// TracingPlugin::default().with_env_filter("arbor_model=trace,arbor::events=debug")
/// # ;
/// ```
#[derive(Clone)]
pub struct TracingPlugin {
    /// Maximum log level.
    level: Level,
    /// Output format.
    format: TracingFormat,
    /// Environment filter (e.g., `arbor_model=debug`).
    env_filter: Option<String>,
    /// Whether to include span events (enter/exit).
    span_events: bool,
    /// Whether model events are mirrored into the log.
    log_events: bool,
    /// Whether `ready` installs a global subscriber.
    install_subscriber: bool,
}

impl Default for TracingPlugin {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: TracingFormat::Pretty,
            env_filter: None,
            span_events: false,
            log_events: true,
            install_subscriber: true,
        }
    }
}

impl TracingPlugin {
    /// Creates a new `TracingPlugin` with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum log level.
    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Sets the output format.
    #[must_use]
    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets a custom environment filter string.
    ///
    /// Format: `target=level,target=level,...`
    #[must_use]
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Enables span enter/exit events in output.
    #[must_use]
    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.span_events = enabled;
        self
    }

    /// Controls whether model events are logged at debug level.
    #[must_use]
    pub fn with_event_logging(mut self, enabled: bool) -> Self {
        self.log_events = enabled;
        self
    }

    /// Leaves subscriber installation to the host application.
    #[must_use]
    pub fn without_subscriber(mut self) -> Self {
        self.install_subscriber = false;
        self
    }

    fn env_filter(&self) -> EnvFilter {
        match &self.env_filter {
            Some(filter) => {
                EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new(self.level.as_str()))
            }
            None => EnvFilter::new(self.level.as_str()),
        }
    }

    fn install(&self) {
        let env_filter = self.env_filter();
        let span_events = if self.span_events {
            FmtSpan::ENTER | FmtSpan::EXIT
        } else {
            FmtSpan::NONE
        };

        // try_init fails when a global subscriber already exists; keep it.
        let installed = match self.format {
            TracingFormat::Pretty => tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .pretty()
                        .with_span_events(span_events),
                )
                .try_init()
                .is_ok(),
            TracingFormat::Compact => tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .compact()
                        .with_span_events(span_events),
                )
                .try_init()
                .is_ok(),
            TracingFormat::Json => tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_span_events(span_events),
                )
                .try_init()
                .is_ok(),
        };

        tracing::info!(
            level = %self.level,
            format = ?self.format,
            installed,
            "TracingPlugin initialized"
        );
    }
}

/// Logs one model event.
fn log_event(event: &ModelEvent) {
    tracing::debug!(target: "arbor::events", path = %event.path(), "{event}");
}

impl Plugin for TracingPlugin {
    fn build(&self, project: &mut Project) -> Result<(), ModelError> {
        project.insert_resource(TracingConfig {
            level: self.level,
            format: self.format,
            log_events: self.log_events,
        });

        if self.log_events {
            project
                .registry_mut()
                .events_mut()
                .subscribe::<AllEvents, _>(EVENT_OBSERVER, log_event)?;
        }
        Ok(())
    }

    fn ready(&self, _project: &mut Project) -> Result<(), ModelError> {
        if self.install_subscriber {
            self.install();
        }
        Ok(())
    }

    fn cleanup(&self, _project: &mut Project) {
        tracing::info!("TracingPlugin shutting down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_model::event::OnStageChanged;

    #[test]
    fn tracing_format_default_is_pretty() {
        assert_eq!(TracingFormat::default(), TracingFormat::Pretty);
    }

    #[test]
    fn builder_options() {
        let plugin = TracingPlugin::new()
            .with_level(Level::TRACE)
            .with_format(TracingFormat::Json)
            .with_env_filter("arbor_model=trace")
            .with_span_events(true)
            .with_event_logging(false)
            .without_subscriber();

        assert_eq!(plugin.level, Level::TRACE);
        assert_eq!(plugin.format, TracingFormat::Json);
        assert_eq!(plugin.env_filter.as_deref(), Some("arbor_model=trace"));
        assert!(plugin.span_events);
        assert!(!plugin.log_events);
        assert!(!plugin.install_subscriber);
    }

    #[test]
    fn build_registers_resource_and_observer() {
        let mut project = Project::new();
        project.add_plugins(TracingPlugin::new().without_subscriber());
        project.finish().unwrap();

        let config = project.get_resource::<TracingConfig>().unwrap();
        assert_eq!(config.level, Level::INFO);
        assert!(config.log_events);
        assert!(
            project
                .registry()
                .events()
                .contains_observer::<OnStageChanged>(EVENT_OBSERVER)
        );
    }

    #[test]
    fn event_logging_can_be_disabled() {
        let mut project = Project::new();
        project.add_plugins(
            TracingPlugin::new()
                .with_event_logging(false)
                .without_subscriber(),
        );
        project.finish().unwrap();
        assert!(project.registry().events().is_empty());
    }
}
