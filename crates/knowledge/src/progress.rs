//! Structured progress reporting for ingestion.
//!
//! Parsing, decomposition, embedding and indexing each emit events so a
//! front end can show incremental feedback while a rebuild runs.

use std::sync::Arc;
use std::time::Instant;

/// Progress event emitted during ingestion.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    /// One of "parse", "chunk", "embed", "index"
    pub phase: String,

    /// Work done so far (files parsed, fragments decomposed, units embedded)
    pub current: u64,

    /// Total expected work, if known
    pub total: Option<u64>,

    /// Percentage complete (0.0 - 100.0)
    pub percentage: Option<f64>,

    pub message: String,

    /// Seconds since the reporter was created
    pub elapsed_secs: Option<f64>,
}

impl ProgressEvent {
    pub fn new(
        phase: impl Into<String>,
        current: u64,
        total: Option<u64>,
        message: impl Into<String>,
    ) -> Self {
        let percentage = total.map(|t| {
            if t > 0 {
                (current as f64 / t as f64) * 100.0
            } else {
                0.0
            }
        });

        Self {
            phase: phase.into(),
            current,
            total,
            percentage,
            message: message.into(),
            elapsed_secs: None,
        }
    }

    pub fn with_elapsed(mut self, elapsed_secs: f64) -> Self {
        self.elapsed_secs = Some(elapsed_secs);
        self
    }

    /// Format as a single status line.
    pub fn format_simple(&self) -> String {
        let progress = match self.total {
            Some(total) => format!("{}/{}", self.current, total),
            None => self.current.to_string(),
        };

        let pct = self
            .percentage
            .map(|p| format!(" ({:.0}%)", p))
            .unwrap_or_default();

        format!("[{}] {}{} - {}", self.phase, progress, pct, self.message)
    }
}

pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Emits progress events through an optional callback.
#[derive(Clone)]
pub struct ProgressReporter {
    callback: Option<ProgressCallback>,
    start_time: Arc<Instant>,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::noop()
    }
}

impl ProgressReporter {
    pub fn new(callback: ProgressCallback) -> Self {
        Self {
            callback: Some(callback),
            start_time: Arc::new(Instant::now()),
        }
    }

    /// A reporter that drops every event.
    pub fn noop() -> Self {
        Self {
            callback: None,
            start_time: Arc::new(Instant::now()),
        }
    }

    pub fn emit(&self, event: ProgressEvent) {
        if let Some(callback) = &self.callback {
            let elapsed = self.start_time.elapsed().as_secs_f64();
            let event = event.with_elapsed(elapsed);

            tracing::debug!(
                phase = %event.phase,
                current = event.current,
                total = ?event.total,
                message = %event.message,
                elapsed_secs = elapsed,
                "Progress event"
            );

            callback(event);
        }
    }

    pub fn parse(&self, current: u64, total: Option<u64>, file: &str) {
        self.emit(ProgressEvent::new(
            "parse",
            current,
            total,
            format!("parsed {}", file),
        ));
    }

    pub fn chunk(&self, current: u64, total: Option<u64>, units_created: u32) {
        self.emit(ProgressEvent::new(
            "chunk",
            current,
            total,
            format!("{} units created", units_created),
        ));
    }

    pub fn embed(&self, current: u64, total: Option<u64>, model: &str) {
        self.emit(ProgressEvent::new(
            "embed",
            current,
            total,
            format!("model={}", model),
        ));
    }

    pub fn index(&self, current: u64, total: Option<u64>, table: &str) {
        self.emit(ProgressEvent::new(
            "index",
            current,
            total,
            format!("writing to {}", table),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_progress_event_format() {
        let event = ProgressEvent::new("parse", 1, Some(4), "parsed 規章.pdf");
        let formatted = event.format_simple();
        assert!(formatted.starts_with("[parse] 1/4 (25%)"));
        assert!(formatted.ends_with("規章.pdf"));
    }

    #[test]
    fn test_zero_total_is_zero_percent() {
        let event = ProgressEvent::new("embed", 0, Some(0), "model=mock");
        assert_eq!(event.percentage, Some(0.0));
    }

    #[test]
    fn test_reporter_emits_with_elapsed() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);

        let reporter = ProgressReporter::new(Arc::new(move |event| {
            sink.lock().unwrap().push(event);
        }));

        reporter.chunk(3, Some(10), 7);
        reporter.index(7, Some(7), "hr_regulations_1");

        let captured = events.lock().unwrap();
        assert_eq!(captured.len(), 2);
        assert_eq!(captured[0].phase, "chunk");
        assert_eq!(captured[0].message, "7 units created");
        assert!(captured[1].elapsed_secs.is_some());
    }

    #[test]
    fn test_noop_reporter() {
        ProgressReporter::noop().parse(1, None, "a.pdf");
    }
}
