//! Record layouts for the csv, html and console sinks.

use std::fmt::{self, Write as _};

use chrono::{Local, NaiveDateTime};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Metadata, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

use crate::config::LogFormat;

/// Field marking an error event as critical.
pub(crate) const CRITICAL_FIELD: &str = "critical";

/// Field carrying the emitting logger's name.
pub(crate) const LOGGER_FIELD: &str = "logger";

/// Layout of a single log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStyle {
    /// `timestamp,logger,LEVEL,message`
    Csv,
    /// One `<tr>` row per record.
    Html,
    /// `timestamp - logger - [LEVEL] - message`
    Console,
}

impl From<LogFormat> for RecordStyle {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Csv => Self::Csv,
            LogFormat::Html => Self::Html,
        }
    }
}

/// Event formatter producing csv, html or console lines.
#[derive(Debug, Clone, Copy)]
pub struct RecordFormatter {
    style: RecordStyle,
}

impl RecordFormatter {
    pub fn new(style: RecordStyle) -> Self {
        Self { style }
    }
}

impl<S, N> FormatEvent<S, N> for RecordFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut fields = RecordFields::default();
        event.record(&mut fields);

        let meta = event.metadata();
        let logger = fields.logger.as_deref().unwrap_or(meta.target());
        let level = level_name(meta.level(), fields.critical);
        let line = render(
            self.style,
            Local::now().naive_local(),
            logger,
            level,
            &fields.message(),
        )
        .map_err(|_| fmt::Error)?;
        writer.write_str(&line)
    }
}

/// Level name as it appears in a record.
pub fn level_name(level: &Level, critical: bool) -> &'static str {
    match *level {
        Level::ERROR if critical => "CRITICAL",
        Level::ERROR => "ERROR",
        Level::WARN => "WARNING",
        Level::INFO => "INFO",
        Level::DEBUG => "DEBUG",
        Level::TRACE => "TRACE",
    }
}

/// Render one newline-terminated record.
///
/// # Errors
/// Only the csv layout can fail, when the record cannot be encoded.
pub fn render(
    style: RecordStyle,
    timestamp: NaiveDateTime,
    logger: &str,
    level: &str,
    message: &str,
) -> Result<String, csv::Error> {
    let line = match style {
        RecordStyle::Csv => {
            let timestamp = timestamp.format("%Y-%m-%dT%H:%M:%S").to_string();
            return csv_record([timestamp.as_str(), logger, level, message]);
        }
        RecordStyle::Html => format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            timestamp.format("%Y-%m-%dT%H:%M:%S"),
            html_escape(logger),
            level,
            html_escape(message)
        ),
        RecordStyle::Console => format!(
            "{} - {} - [{}] - {}\n",
            timestamp.format("%Y-%m-%d %H:%M:%S"),
            logger,
            level,
            message
        ),
    };
    Ok(line)
}

/// Encode one csv row terminated by `\n`, quoting fields as needed.
pub(crate) fn csv_record<I, T>(fields: I) -> Result<String, csv::Error>
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(fields)?;
    let bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Accept only spans and events carrying the critical marker.
pub(crate) fn is_critical_record(meta: &Metadata<'_>) -> bool {
    !meta.is_event() || meta.fields().field(CRITICAL_FIELD).is_some()
}

fn html_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Fields pulled out of an event.
#[derive(Debug, Default)]
struct RecordFields {
    message: String,
    logger: Option<String>,
    critical: bool,
    extra: Vec<(&'static str, String)>,
}

impl RecordFields {
    /// Message followed by any structured fields as `key=value`.
    fn message(&self) -> String {
        let mut line = self.message.clone();
        for (name, value) in &self.extra {
            if !line.is_empty() {
                line.push(' ');
            }
            let _ = write!(line, "{name}={value}");
        }
        line
    }

    fn store(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = value,
            LOGGER_FIELD => self.logger = Some(value),
            name => self.extra.push((name, value)),
        }
    }
}

impl Visit for RecordFields {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.store(field, value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        if field.name() == CRITICAL_FIELD {
            self.critical = value;
        } else {
            self.store(field, value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.store(field, format!("{value:?}"));
    }
}
