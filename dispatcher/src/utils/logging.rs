use std::collections::HashMap;

use anyhow::anyhow;
use chrono::Utc;
use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_error::ErrorLayer;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::layer::Context;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

const DEFAULT_DIRECTIVES: &str = "dispatcher=info,dispatcher_job_client=info";

/// Span fields copied out at span creation so formatters can read them per event.
#[derive(Debug, Clone, Default)]
pub struct SpanFields {
    pub values: HashMap<String, String>,
}

struct SpanFieldVisitor<'a>(&'a mut SpanFields);

impl Visit for SpanFieldVisitor<'_> {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let value = format!("{:?}", value).trim_matches('"').to_string();
        self.0.values.insert(field.name().to_string(), value);
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.values.insert(field.name().to_string(), value.to_string());
    }
}

/// Keeps [`SpanFields`] in each span's extensions, including fields recorded after creation.
pub struct FieldCollectorLayer;

impl<S> Layer<S> for FieldCollectorLayer
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    fn on_new_span(&self, attrs: &tracing::span::Attributes<'_>, id: &tracing::span::Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else { return };
        let mut fields = SpanFields::default();
        attrs.record(&mut SpanFieldVisitor(&mut fields));
        span.extensions_mut().insert(fields);
    }

    fn on_record(&self, id: &tracing::span::Id, values: &tracing::span::Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else { return };
        let mut extensions = span.extensions_mut();
        let mut fields = extensions.remove::<SpanFields>().unwrap_or_default();
        values.record(&mut SpanFieldVisitor(&mut fields));
        extensions.insert(fields);
    }
}

/// Closest span field named `name`, walking from the current span outwards.
fn span_field<S, N>(ctx: &FmtContext<'_, S, N>, name: &str) -> Option<String>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    let span = ctx.lookup_current()?;
    span.scope().find_map(|span| span.extensions().get::<SpanFields>().and_then(|f| f.values.get(name).cloned()))
}

// Console formatter: timestamp | level | family | queue role | service | message (fields)
pub struct PrettyFormatter;

impl<S, N> FormatEvent<S, N> for PrettyFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(&self, ctx: &FmtContext<'_, S, N>, mut writer: Writer<'_>, event: &Event<'_>) -> std::fmt::Result {
        let meta = event.metadata();
        let now = Utc::now().format("%y-%m-%d %H:%M:%S");

        let level_color = match *meta.level() {
            Level::TRACE => "\x1b[90m",
            Level::DEBUG => "\x1b[34m",
            Level::INFO => "\x1b[32m",
            Level::WARN => "\x1b[33m",
            Level::ERROR => "\x1b[31m",
        };
        let column = "\x1b[92m";
        let dim = "\x1b[90m";
        let reset = "\x1b[0m";

        let (family, role) = span_field(ctx, "queue").map(|q| queue_to_parts(&q)).unwrap_or(("-".into(), "-".into()));

        let mut visitor = FieldExtractor::default();
        event.record(&mut visitor);
        if visitor.job_id.is_none() {
            visitor.job_id = span_field(ctx, "job_id");
        }

        write!(writer, "\x1b[96m{now}{reset} {dim}|{reset} ")?;
        write!(writer, "{level_color}{:<5}{reset} {dim}|{reset} ", *meta.level())?;
        write!(writer, "{column}{:<8}{reset} {dim}|{reset} ", family)?;
        write!(writer, "{column}{:<14}{reset} {dim}|{reset} ", role)?;
        write!(writer, "{column}{:<8}{reset} {dim}|{reset} ", extract_service_name(meta.target()))?;
        write!(writer, "\x1b[97m{}{reset}", visitor.message)?;

        let mut extras = Vec::new();
        if let Some(job_id) = &visitor.job_id {
            extras.push(format!("{dim}job_id={job_id}{reset}"));
        }
        extras.extend(visitor.fields.iter().map(|(k, v)| format!("{dim}{k}={v}{reset}")));
        if !extras.is_empty() {
            write!(writer, " ({})", extras.join(", "))?;
        }
        writeln!(writer)
    }
}

#[derive(Default)]
struct FieldExtractor {
    message: String,
    job_id: Option<String>,
    fields: Vec<(String, String)>,
}

impl Visit for FieldExtractor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let value = format!("{:?}", value).trim_matches('"').to_string();
        match field.name() {
            "message" => self.message = value,
            "job_id" => self.job_id = Some(value),
            // shown in its own column
            "queue" => {}
            name => self.fields.push((name.to_string(), value)),
        }
    }
}

// JSON formatter, one object per line
pub struct JsonEventFormatter;

#[derive(Default)]
struct JsonFieldVisitor {
    message: Option<String>,
    fields: Map<String, Value>,
}

impl Visit for JsonFieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let value = format!("{:?}", value).trim_matches('"').to_string();
        if field.name() == "message" {
            self.message = Some(value);
        } else {
            self.fields.insert(field.name().to_string(), Value::String(value));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.fields.insert(field.name().to_string(), Value::String(value.to_string()));
        }
    }
}

impl<S, N> FormatEvent<S, N> for JsonEventFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(&self, ctx: &FmtContext<'_, S, N>, mut writer: Writer<'_>, event: &Event<'_>) -> std::fmt::Result {
        let meta = event.metadata();
        let mut visitor = JsonFieldVisitor::default();
        event.record(&mut visitor);

        let mut root = Map::new();
        root.insert("timestamp".into(), Value::String(Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)));
        root.insert("level".into(), Value::String(meta.level().to_string()));
        root.insert("target".into(), Value::String(meta.target().to_string()));
        root.insert("service".into(), Value::String(extract_service_name(meta.target()).to_string()));
        if let Some(line) = meta.line() {
            root.insert("line_number".into(), Value::from(line));
        }
        if let Some(message) = visitor.message.take() {
            root.insert("message".into(), Value::String(message));
        }

        // Event fields win over span fields of the same name.
        let mut fields = Map::new();
        if let Some(span) = ctx.lookup_current() {
            fields.insert("span_name".into(), Value::String(span.metadata().name().to_string()));
            for span in span.scope().from_root() {
                if let Some(span_fields) = span.extensions().get::<SpanFields>() {
                    for (key, value) in &span_fields.values {
                        fields.insert(key.clone(), Value::String(value.clone()));
                    }
                }
            }
        }
        fields.extend(visitor.fields);
        if !fields.is_empty() {
            root.insert("fields".into(), Value::Object(fields));
        }

        let line = serde_json::to_string(&Value::Object(root)).map_err(|_| std::fmt::Error)?;
        writeln!(writer, "{}", line)
    }
}

/// Initialize the tracing subscriber with
/// - PrettyFormatter for console readability (when LOG_FORMAT != "json")
/// - JsonEventFormatter for json logging (when LOG_FORMAT = "json")
///
/// This also installs color_eyre so panics print the error chain.
pub fn init_logging() -> anyhow::Result<()> {
    color_eyre::install().map_err(|e| anyhow!("Unable to install color_eyre: {e}"))?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));
    let json = std::env::var("LOG_FORMAT").map(|f| f.eq_ignore_ascii_case("json")).unwrap_or(false);

    let registry = Registry::default().with(env_filter).with(FieldCollectorLayer).with(ErrorLayer::default());
    let result = if json {
        tracing::subscriber::set_global_default(registry.with(fmt::layer().event_format(JsonEventFormatter)))
    } else {
        tracing::subscriber::set_global_default(registry.with(fmt::layer().event_format(PrettyFormatter)))
    };
    result.map_err(|e| anyhow!("Failed to set global default subscriber: {e}"))
}

/// Short name of the crate an event comes from, for the service column.
fn extract_service_name(target: &str) -> &'static str {
    if target.starts_with("dispatcher_job_client") {
        "CLIENT"
    } else if target.starts_with("dispatcher") {
        "-"
    } else if target.starts_with("lapin") || target.starts_with("amq_protocol") {
        "AMQP"
    } else if target.starts_with("mongodb") {
        "MONGODB"
    } else {
        "EXTERNAL"
    }
}

/// `spot-processing-dlq` -> (`SPOT`, `PROCESSING-DLQ`)
pub fn queue_to_parts(queue: &str) -> (String, String) {
    match queue.split_once('-') {
        Some((family, role)) => (family.to_uppercase(), role.to_uppercase()),
        None => (queue.to_uppercase(), "-".into()),
    }
}
