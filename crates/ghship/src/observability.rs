//! Structured JSONL logging.
//!
//! Every record is one JSON object per line with `timestamp`, `level`,
//! `target`, the names of the enclosing spans under `spans`, and the
//! fields of those spans and of the event itself. Records go to a
//! daily-rolling file; stdout is left to command output (including
//! `--json`).
//!
//! The file is chosen in this order:
//!
//! 1. `GHSHIP_LOG_PATH`, an exact file path
//! 2. `GHSHIP_LOG_DIR`, a directory
//! 3. `log_dir` from the config file
//! 4. `logs/` under the platform data directory
//!
//! If the chosen location cannot be written, records go to stderr instead.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id, Record};
use tracing::{Event, Subscriber};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::{Context as LayerContext, Layer, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

use ghship_core::config;

const ENV_LOG_PATH: &str = "GHSHIP_LOG_PATH";
const ENV_LOG_DIR: &str = "GHSHIP_LOG_DIR";

/// Where and under which name log files are written.
#[derive(Clone, Debug)]
pub struct ObservabilityConfig {
    /// Log file stem; records go to `<service>.jsonl`.
    pub service: String,
    /// `log_dir` from the config file.
    pub log_dir: Option<PathBuf>,
}

impl ObservabilityConfig {
    /// Logging for this binary, with `log_dir` from the config file.
    pub fn from_env_with_overrides(log_dir: Option<PathBuf>) -> Self {
        Self {
            service: env!("CARGO_PKG_NAME").to_string(),
            log_dir,
        }
    }

    fn file_name(&self) -> String {
        format!("{}.jsonl", self.service)
    }
}

/// Flushes buffered log records when dropped. Hold it until `main` returns.
pub struct ObservabilityGuard {
    _worker: WorkerGuard,
}

/// Install the global subscriber.
pub fn init_observability(
    cfg: &ObservabilityConfig,
    env_filter: EnvFilter,
) -> anyhow::Result<ObservabilityGuard> {
    let (writer, worker) = match open_log_file(cfg) {
        Ok(pair) => pair,
        Err(err) => {
            eprintln!("warning: {err:#}; logging to stderr");
            tracing_appender::non_blocking(std::io::stderr())
        }
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(JsonLines { writer })
        .try_init()
        .context("a global subscriber is already installed")?;

    tracing::debug!(service = %cfg.service, "logging initialized");
    Ok(ObservabilityGuard { _worker: worker })
}

/// Filter from CLI flags: `-q` wins over `-v`, which wins over `RUST_LOG`,
/// which wins over the configured level.
pub fn env_filter(quiet: bool, verbose: u8, default_level: &str) -> EnvFilter {
    match (quiet, verbose) {
        (true, _) => EnvFilter::new("error"),
        (false, 0) => {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
        }
        (false, 1) => EnvFilter::new("debug"),
        (false, _) => EnvFilter::new("trace"),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// File selection
// ────────────────────────────────────────────────────────────────────────────

/// Directory and file name for the log.
#[derive(Clone, Debug, PartialEq, Eq)]
struct LogFile {
    dir: PathBuf,
    name: String,
}

fn open_log_file(cfg: &ObservabilityConfig) -> anyhow::Result<(NonBlocking, WorkerGuard)> {
    let file = choose_log_file(
        cfg,
        std::env::var_os(ENV_LOG_PATH).map(PathBuf::from),
        std::env::var_os(ENV_LOG_DIR).map(PathBuf::from),
    )?;
    file.touch()?;
    let appender = tracing_appender::rolling::daily(&file.dir, &file.name);
    Ok(tracing_appender::non_blocking(appender))
}

fn choose_log_file(
    cfg: &ObservabilityConfig,
    path_override: Option<PathBuf>,
    dir_override: Option<PathBuf>,
) -> anyhow::Result<LogFile> {
    if let Some(path) = path_override {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            bail!("{ENV_LOG_PATH} must end in a UTF-8 file name");
        };
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        return Ok(LogFile {
            dir: dir.to_path_buf(),
            name: name.to_string(),
        });
    }

    let dir = match dir_override.or_else(|| cfg.log_dir.clone()) {
        Some(dir) => dir,
        None => config::user_data_local_dir()
            .context("no platform data directory for log files")?
            .join("logs")
            .into_std_path_buf(),
    };
    Ok(LogFile {
        dir,
        name: cfg.file_name(),
    })
}

impl LogFile {
    /// Create the directory and file so a bad location fails here rather
    /// than silently inside the appender.
    fn touch(&self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("cannot create log directory {}", self.dir.display()))?;
        let path = self.dir.join(&self.name);
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("cannot open log file {}", path.display()))?;
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// JSON lines layer
// ────────────────────────────────────────────────────────────────────────────

struct JsonLines<W> {
    writer: W,
}

/// Fields recorded on a span, stored in its extensions.
#[derive(Default)]
struct Fields(Map<String, Value>);

impl Fields {
    fn insert(&mut self, field: &Field, value: Value) {
        self.0.insert(field.name().to_string(), value);
    }
}

impl Visit for Fields {
    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, value.into());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, value.into());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, value.into());
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        // NaN and infinities have no JSON form
        if let Some(n) = serde_json::Number::from_f64(value) {
            self.insert(field, Value::Number(n));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, value.into());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.insert(field, value.to_string().into());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.insert(field, format!("{value:?}").into());
    }
}

impl<S, W> Layer<S> for JsonLines<W>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: LayerContext<'_, S>) {
        let Some(span) = ctx.span(id) else { return };
        let mut fields = Fields::default();
        attrs.record(&mut fields);
        span.extensions_mut().insert(fields);
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: LayerContext<'_, S>) {
        let Some(span) = ctx.span(id) else { return };
        let mut extensions = span.extensions_mut();
        if let Some(fields) = extensions.get_mut::<Fields>() {
            values.record(fields);
        } else {
            let mut fields = Fields::default();
            values.record(&mut fields);
            extensions.insert(fields);
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: LayerContext<'_, S>) {
        let meta = event.metadata();
        let mut record = Map::new();
        record.insert("timestamp".into(), timestamp().into());
        record.insert("level".into(), meta.level().as_str().to_lowercase().into());
        record.insert("target".into(), meta.target().into());

        let mut spans = Vec::new();
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope.from_root() {
                spans.push(Value::from(span.name()));
                if let Some(fields) = span.extensions().get::<Fields>() {
                    record.extend(fields.0.clone());
                }
            }
        }
        if !spans.is_empty() {
            record.insert("spans".into(), Value::Array(spans));
        }

        let mut fields = Fields::default();
        event.record(&mut fields);
        record.extend(fields.0);

        let mut line = Value::Object(record).to_string();
        line.push('\n');
        let _ = self.writer.make_writer().write_all(line.as_bytes());
    }
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
