//! ---
//! resq_section: "01-core-functionality"
//! resq_subsection: "module"
//! resq_type: "source"
//! resq_scope: "code"
//! resq_description: "Shared primitives and utilities for the metrics engine."
//! resq_version: "v0.0.0-prealpha"
//! resq_owner: "tbd"
//! ---
use anyhow::Result;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::{info, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::daily;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::{self, format::FmtSpan, MakeWriter};
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;

const LOG_ENV: &str = "RESQ_LOG";
const FALLBACK_ENV: &str = "RUST_LOG";

static GUARDS: OnceCell<(WorkerGuard, WorkerGuard)> = OnceCell::new();

/// Available log formats.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    #[default]
    StructuredJson,
    Pretty,
}

/// Pick the effective filter directive: `RESQ_LOG`, then `RUST_LOG`, then the
/// configured level. Blank variables count as unset.
pub fn filter_directive(resq_log: Option<&str>, rust_log: Option<&str>, level: &str) -> String {
    [resq_log, rust_log]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|directive| !directive.is_empty())
        .unwrap_or(level)
        .to_owned()
}

fn build_filter(config: &LoggingConfig) -> EnvFilter {
    let resq_log = std::env::var(LOG_ENV).ok();
    let rust_log = std::env::var(FALLBACK_ENV).ok();
    let directive = filter_directive(resq_log.as_deref(), rust_log.as_deref(), &config.level);
    EnvFilter::try_new(&directive).unwrap_or_else(|err| {
        eprintln!(
            "invalid log directive {:?} ({}); using {}",
            directive, err, config.level
        );
        EnvFilter::new(&config.level)
    })
}

fn span_events(config: &LoggingConfig) -> FmtSpan {
    if config.span_timings {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    }
}

/// JSON layer attaching the innermost span as `span` and the whole
/// `metrics_report > scenario > view` chain as `spans` to every event.
fn json_layer<S, W>(
    config: &LoggingConfig,
    writer: W,
    with_target: bool,
) -> Box<dyn Layer<S> + Send + Sync + 'static>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    fmt::layer()
        .with_target(with_target)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_span_events(span_events(config))
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(writer)
        .boxed()
}

/// Install the metrics engine's tracing subscriber.
///
/// JSON output carries the enclosing span fields (`dataset_version`,
/// `scenario_id`, `scenario`, `view`) on every event. A daily rolling JSON file is
/// written to `config.directory` as `<prefix>.log.<date>`.
pub fn init_tracing(service_name: &str, config: &LoggingConfig) -> Result<()> {
    std::fs::create_dir_all(&config.directory)?;
    let prefix = config.file_prefix.as_deref().unwrap_or(service_name);

    let (file_writer, file_guard) =
        tracing_appender::non_blocking(daily(&config.directory, format!("{prefix}.log")));
    let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    let _ = GUARDS.set((file_guard, stdout_guard));

    let stdout_layer = match config.format {
        LogFormat::StructuredJson => json_layer(config, stdout_writer, false),
        LogFormat::Pretty => fmt::layer()
            .with_target(true)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_span_events(span_events(config))
            .with_writer(stdout_writer)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(build_filter(config))
        .with(stdout_layer)
        .with(json_layer(config, file_writer, true))
        .try_init()
        .ok();

    info!(
        service = %service_name,
        log_dir = %config.directory.display(),
        format = ?config.format,
        span_timings = config.span_timings,
        "metrics tracing initialised"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Capture {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Capture {
        type Writer = Capture;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn json_events_carry_scenario_and_view_fields() {
        let capture = Capture::default();
        let config = LoggingConfig {
            span_timings: true,
            ..LoggingConfig::default()
        };
        let subscriber =
            tracing_subscriber::registry().with(json_layer(&config, capture.clone(), false));

        tracing::subscriber::with_default(subscriber, || {
            let _scenario =
                tracing::info_span!("scenario", scenario_id = 3_i64, scenario = "S3").entered();
            let _view = tracing::info_span!("view", view = "autarky").entered();
            info!("autarky derived");
        });

        let output = capture.contents();
        let event = output
            .lines()
            .find(|line| line.contains("autarky derived"))
            .unwrap();
        assert!(event.contains(r#""view":"autarky""#), "{event}");
        assert!(event.contains(r#""scenario":"S3""#), "{event}");
        assert!(event.contains(r#""scenario_id":3"#), "{event}");
        assert!(output.lines().any(|line| line.contains(r#""message":"close""#)));
    }

    #[test]
    fn resq_log_wins_over_rust_log_and_level() {
        assert_eq!(
            filter_directive(Some("resq_metrics=trace"), Some("warn"), "info"),
            "resq_metrics=trace"
        );
        assert_eq!(filter_directive(None, Some("warn"), "info"), "warn");
        assert_eq!(filter_directive(None, None, "debug"), "debug");
    }

    #[test]
    fn blank_overrides_fall_through() {
        assert_eq!(filter_directive(Some("  "), Some(""), "info"), "info");
        assert_eq!(filter_directive(Some(""), Some(" error "), "info"), "error");
    }

    #[test]
    fn span_timings_toggle_close_events() {
        let mut config = LoggingConfig::default();
        assert_eq!(span_events(&config), FmtSpan::NONE);
        config.span_timings = true;
        assert_eq!(span_events(&config), FmtSpan::CLOSE);
    }

    #[test]
    fn init_creates_log_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config = LoggingConfig {
            directory: dir.path().join("logs"),
            format: LogFormat::Pretty,
            file_prefix: Some("test".to_owned()),
            span_timings: true,
            ..LoggingConfig::default()
        };
        init_tracing("resq-metrics", &config).unwrap();
        assert!(config.directory.is_dir());
    }

    #[test]
    fn log_format_uses_kebab_case() {
        #[derive(Deserialize)]
        struct Wrapper {
            format: LogFormat,
        }
        let parsed: Wrapper = toml::from_str("format = \"structured-json\"").unwrap();
        assert_eq!(parsed.format, LogFormat::StructuredJson);
    }
}
