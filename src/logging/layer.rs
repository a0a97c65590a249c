//! `tracing` layer that forwards events to the system log.

use std::fmt::{self, Write as _};
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use super::forwarder::{init_system_log, LogSink, PlatformSink, Severity, SystemLogger};

/// Forwards events at or above `min_level` to a [`SystemLogger`].
///
/// The entry is the event's `message` followed by its other fields as
/// `key=value` pairs.
pub struct SyslogLayer<S: LogSink = PlatformSink> {
    logger: Arc<SystemLogger<S>>,
    min_level: Level,
}

impl SyslogLayer<PlatformSink> {
    /// Layer over the process-wide system logger.
    pub fn platform(ident: &str, min_level: Level) -> Self {
        Self::new(init_system_log(ident), min_level)
    }
}

impl<S: LogSink> SyslogLayer<S> {
    pub fn new(logger: Arc<SystemLogger<S>>, min_level: Level) -> Self {
        Self { logger, min_level }
    }
}

impl<S, Sub> Layer<Sub> for SyslogLayer<S>
where
    S: LogSink + 'static,
    Sub: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, Sub>) {
        let level = *event.metadata().level();
        // More verbose levels compare greater.
        if level > self.min_level {
            return;
        }

        let mut visitor = EntryVisitor::default();
        event.record(&mut visitor);
        self.logger.log(Severity::from(level), &visitor.finish());
    }
}

#[derive(Default)]
struct EntryVisitor {
    message: String,
    fields: String,
}

impl EntryVisitor {
    fn finish(self) -> String {
        match (self.message.is_empty(), self.fields.is_empty()) {
            (_, true) => self.message,
            (true, false) => self.fields,
            (false, false) => format!("{} {}", self.message, self.fields),
        }
    }

    fn push_field(&mut self, name: &str, value: fmt::Arguments<'_>) {
        if !self.fields.is_empty() {
            self.fields.push(' ');
        }
        let _ = write!(self.fields, "{}={}", name, value);
    }
}

impl Visit for EntryVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            self.push_field(field.name(), format_args!("{}", value));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{:?}", value);
        } else {
            self.push_field(field.name(), format_args!("{:?}", value));
        }
    }
}
