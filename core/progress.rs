//! Per-unit progress events.
//!
//! The extraction pipeline emits exactly one [`ProgressEvent::UnitStarted`]
//! per processing unit it begins, closed by either
//! [`ProgressEvent::UnitCompleted`] or [`ProgressEvent::UnitCancelled`].
//! Front-ends implement [`ProgressSink`] to render them however they like.

use serde::Serialize;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    UnitStarted {
        unit: String,
        /// 1-based position of the unit within the run.
        index: usize,
        total: usize,
    },
    UnitCompleted {
        unit: String,
        index: usize,
        total: usize,
        file_count: usize,
        char_count: usize,
        word_count: usize,
        /// Files dropped at read time (too large, unreadable, not text).
        skipped: usize,
    },
    /// The unit was abandoned; no document is written for it.
    UnitCancelled {
        unit: String,
        index: usize,
        total: usize,
        /// Files read before the cancel flag was seen.
        files_read: usize,
    },
}

impl ProgressEvent {
    pub fn unit(&self) -> &str {
        match self {
            ProgressEvent::UnitStarted { unit, .. }
            | ProgressEvent::UnitCompleted { unit, .. }
            | ProgressEvent::UnitCancelled { unit, .. } => unit,
        }
    }
}

pub trait ProgressSink {
    fn on_event(&self, event: &ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressEvent),
{
    fn on_event(&self, event: &ProgressEvent) {
        self(event)
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_event(&self, _event: &ProgressEvent) {}
}

/// Records events in order; used by tests and by front-ends that render
/// after the fact.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl ProgressSink for RecordingSink {
    fn on_event(&self, event: &ProgressEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn closures_are_sinks() {
        let seen = RefCell::new(Vec::new());
        let sink = |event: &ProgressEvent| seen.borrow_mut().push(event.unit().to_string());
        sink.on_event(&ProgressEvent::UnitStarted {
            unit: "src".to_string(),
            index: 1,
            total: 1,
        });
        assert_eq!(seen.into_inner(), vec!["src".to_string()]);
    }

    #[test]
    fn recording_sink_keeps_order() {
        let sink = RecordingSink::new();
        for unit in ["a", "b"] {
            sink.on_event(&ProgressEvent::UnitStarted {
                unit: unit.to_string(),
                index: 1,
                total: 2,
            });
        }
        let units: Vec<String> = sink.events().iter().map(|e| e.unit().to_string()).collect();
        assert_eq!(units, vec!["a", "b"]);
    }
}
