//! Fire-and-forget product analytics events.
//!
//! Sinks must never block the session and are never retried; the default
//! sink just logs through tracing.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub category: &'static str,
    pub action: &'static str,
    pub label: Option<String>,
}

impl Event {
    pub fn new(category: &'static str, action: &'static str) -> Self {
        Self {
            category,
            action,
            label: None,
        }
    }

    pub fn with_label(category: &'static str, action: &'static str, label: String) -> Self {
        Self {
            category,
            action,
            label: Some(label),
        }
    }
}

pub trait EventSink: Send + Sync {
    /// Record an event. Infallible by contract; sinks swallow their own
    /// errors.
    fn record(&self, event: Event);
}

pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, event: Event) {
        match &event.label {
            Some(label) => tracing::info!(
                category = event.category,
                action = event.action,
                label = %label,
                "analytics event"
            ),
            None => tracing::info!(
                category = event.category,
                action = event.action,
                "analytics event"
            ),
        }
    }
}
