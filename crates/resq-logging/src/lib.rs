//! ---
//! resq_section: "03-logging"
//! resq_subsection: "module"
//! resq_type: "source"
//! resq_scope: "code"
//! resq_description: "Structured logging adapters and sinks."
//! resq_version: "v0.0.0-prealpha"
//! resq_owner: "tbd"
//! ---
#![warn(missing_docs)]

use tracing::Level;
use tracing_subscriber::{fmt as subscriber_fmt, prelude::*, EnvFilter, Registry};

pub mod macros;

/// Initialize a baseline tracing subscriber suitable for development and tests.
pub fn init() {
    let _ = Registry::default()
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(subscriber_fmt::layer())
        .try_init();
}

/// Structured logging context propagated by the convenience macros.
#[derive(Debug, Default, Clone)]
pub struct LogContext<'a> {
    /// Scenario identifier associated with the log event.
    pub scenario: Option<i64>,
    /// Output view being derived (flows, capacities, autarky, ...).
    pub view: Option<&'a str>,
    /// Raw node identifier the event refers to.
    pub component: Option<&'a str>,
}

impl<'a> LogContext<'a> {
    /// Create an empty logging context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a scenario identifier.
    pub fn with_scenario(mut self, scenario: i64) -> Self {
        self.scenario = Some(scenario);
        self
    }

    /// Attach the name of the output view.
    pub fn with_view(mut self, view: &'a str) -> Self {
        self.view = Some(view);
        self
    }

    /// Attach a node identifier.
    pub fn with_component(mut self, component: &'a str) -> Self {
        self.component = Some(component);
        self
    }
}

/// High-level outcome used when emitting pipeline log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// The stage completed successfully.
    Success,
    /// The stage failed.
    Fault,
}

impl PipelineOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            PipelineOutcome::Success => "success",
            PipelineOutcome::Fault => "fault",
        }
    }
}

/// Emit a standardized pipeline event with a success/fault outcome.
pub fn log_pipeline_event(
    context: Option<&LogContext>,
    event: &str,
    message: &str,
    outcome: PipelineOutcome,
) {
    let default_ctx = LogContext::default();
    let ctx = context.unwrap_or(&default_ctx);
    match outcome {
        PipelineOutcome::Success => tracing::event!(
            Level::INFO,
            event,
            outcome = outcome.as_str(),
            scenario = ctx.scenario.unwrap_or_default(),
            view = ctx.view.unwrap_or(""),
            component = ctx.component.unwrap_or(""),
            message = %message
        ),
        PipelineOutcome::Fault => tracing::event!(
            Level::ERROR,
            event,
            outcome = outcome.as_str(),
            scenario = ctx.scenario.unwrap_or_default(),
            view = ctx.view.unwrap_or(""),
            component = ctx.component.unwrap_or(""),
            message = %message
        ),
    }
}
