use std::fmt::{Debug, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::event::Event;
use tracing::field::{Field, Visit};
use tracing::{span, Id, Level, Metadata, Subscriber};

/// Prints every event at or above `level` to stderr, one line each.
pub struct LevelSubscriber {
    ids: AtomicUsize,
    level: Level,
}

impl LevelSubscriber {
    pub fn new(level: Level) -> Self {
        LevelSubscriber {
            ids: AtomicUsize::new(1),
            level,
        }
    }
}

// https://docs.rs/tracing/0.1/tracing/subscriber/trait.Subscriber.html
impl Subscriber for LevelSubscriber {
    // More verbose levels compare greater
    fn enabled(&self, metadata: &Metadata) -> bool {
        *metadata.level() <= self.level
    }

    // Spans are only numbered, the shell never prints them
    fn new_span(&self, _span: &span::Attributes) -> Id {
        let id = self.ids.fetch_add(1, Ordering::SeqCst);
        Id::from_u64(id as u64)
    }

    fn record(&self, _span: &Id, _values: &span::Record) {}

    fn record_follows_from(&self, _span: &Id, _follows: &Id) {}

    fn event(&self, event: &Event) {
        let mut line = LineVisitor::new();
        event.record(&mut line);

        let metadata = event.metadata();
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        eprintln!(
            "{}.{:03} {:>5} {}: {}{}",
            now.as_secs(),
            now.subsec_millis(),
            metadata.level(),
            metadata.target(),
            line.message,
            line.fields
        );
    }

    fn enter(&self, _span: &Id) {}

    fn exit(&self, _span: &Id) {}
}

/// Collects an event's message and its other fields as ` name=value` pairs.
struct LineVisitor {
    message: String,
    fields: String,
}

impl LineVisitor {
    fn new() -> Self {
        LineVisitor {
            message: String::new(),
            fields: String::new(),
        }
    }
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{:?}", value);
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}
