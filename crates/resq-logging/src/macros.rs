//! ---
//! resq_section: "03-logging"
//! resq_subsection: "module"
//! resq_type: "source"
//! resq_scope: "code"
//! resq_description: "Structured logging adapters and sinks."
//! resq_version: "v0.0.0-prealpha"
//! resq_owner: "tbd"
//! ---
/// Emit an informational log enriched with metrics context.
#[macro_export]
macro_rules! metrics_info {
    (context = $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            tracing::Level::INFO,
            scenario = ctx.scenario.unwrap_or_default(),
            view = ctx.view.unwrap_or(""),
            component = ctx.component.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
    ($($arg:tt)+) => {{
        let ctx = &$crate::LogContext::default();
        tracing::event!(
            tracing::Level::INFO,
            scenario = ctx.scenario.unwrap_or_default(),
            view = ctx.view.unwrap_or(""),
            component = ctx.component.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
}

/// Emit a debug log enriched with metrics context.
#[macro_export]
macro_rules! metrics_debug {
    (context = $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            tracing::Level::DEBUG,
            scenario = ctx.scenario.unwrap_or_default(),
            view = ctx.view.unwrap_or(""),
            component = ctx.component.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
    ($($arg:tt)+) => {{
        let ctx = &$crate::LogContext::default();
        tracing::event!(
            tracing::Level::DEBUG,
            scenario = ctx.scenario.unwrap_or_default(),
            view = ctx.view.unwrap_or(""),
            component = ctx.component.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
}

/// Emit a warning enriched with metrics context. Used for data-quality findings.
#[macro_export]
macro_rules! metrics_warn {
    (context = $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            tracing::Level::WARN,
            scenario = ctx.scenario.unwrap_or_default(),
            view = ctx.view.unwrap_or(""),
            component = ctx.component.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
    ($($arg:tt)+) => {{
        let ctx = &$crate::LogContext::default();
        tracing::event!(
            tracing::Level::WARN,
            scenario = ctx.scenario.unwrap_or_default(),
            view = ctx.view.unwrap_or(""),
            component = ctx.component.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
}
