//! Progress reporting for download tasks
//!
//! The downloader talks to a reporter through named tasks. Every task is
//! created with [`ProgressReporter::add_task`], may receive any number of
//! [`ProgressReporter::update_task`] calls and ends with exactly one
//! [`ProgressReporter::done`]. A task only carries a percentage while its kind
//! is [`TaskKind::Percentage`]; [`ProgressReporter::set_task_kind`] announces a
//! switch, e.g. when a verification turns into a redownload. Tasks are keyed by the resolved file name and
//! concurrent downloads update their own keys independently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Progress callback handed to the downloader
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// How a task's progress should be drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// No measurable completion, e.g. integrity verification
    Indefinite,
    /// Completion fraction is reported with updates
    Percentage,
}

/// Rendering hint for task names and bars
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Bold,
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskOptions {
    pub kind: TaskKind,
    pub message: String,
    pub style: Style,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskUpdate {
    /// Completion in `[0, 1]` when the total size is known
    pub percentage: Option<f64>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DoneOptions {
    pub message: String,
    pub style: Style,
}

/// Events emitted during download operations
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    TaskAdded { key: String, options: TaskOptions },
    TaskUpdated { key: String, update: TaskUpdate },
    TaskKindChanged { key: String, kind: TaskKind },
    TaskDone { key: String, options: DoneOptions },
}

impl ProgressEvent {
    pub fn key(&self) -> &str {
        match self {
            ProgressEvent::TaskAdded { key, .. }
            | ProgressEvent::TaskUpdated { key, .. }
            | ProgressEvent::TaskKindChanged { key, .. }
            | ProgressEvent::TaskDone { key, .. } => key,
        }
    }
}

/// Receiver of task lifecycle events
pub trait ProgressReporter: Send + Sync {
    fn add_task(&self, _key: &str, _options: &TaskOptions) {}
    fn update_task(&self, _key: &str, _update: &TaskUpdate) {}
    fn set_task_kind(&self, _key: &str, _kind: TaskKind) {}
    fn done(&self, _key: &str, _options: &DoneOptions) {}
}

/// Extension trait to convert ProgressReporter to ProgressCallback
pub trait IntoProgressCallback {
    fn into_callback(self) -> ProgressCallback;
}

impl<T: ProgressReporter + 'static> IntoProgressCallback for T {
    fn into_callback(self) -> ProgressCallback {
        Arc::new(move |event| match event {
            ProgressEvent::TaskAdded { key, options } => self.add_task(&key, &options),
            ProgressEvent::TaskUpdated { key, update } => self.update_task(&key, &update),
            ProgressEvent::TaskKindChanged { key, kind } => self.set_task_kind(&key, kind),
            ProgressEvent::TaskDone { key, options } => self.done(&key, &options),
        })
    }
}

/// One task's lifecycle on top of an optional callback
///
/// Updates before `add` and anything after `finish` are dropped, so a
/// download can call `finish` from every exit path without breaking the
/// one-`done`-per-key rule. Percentages are dropped while the task is
/// indefinite.
pub(crate) struct ReportedTask {
    callback: Option<ProgressCallback>,
    key: String,
    kind: TaskKind,
    added: bool,
    finished: bool,
}

impl ReportedTask {
    pub(crate) fn new(callback: Option<ProgressCallback>, key: impl Into<String>) -> Self {
        Self {
            callback,
            key: key.into(),
            kind: TaskKind::Indefinite,
            added: false,
            finished: false,
        }
    }

    pub(crate) fn key(&self) -> &str {
        &self.key
    }

    /// Rebind the task to its final key; ignored once the task is visible
    pub(crate) fn set_key(&mut self, key: impl Into<String>) {
        if !self.added {
            self.key = key.into();
        }
    }

    pub(crate) fn add(&mut self, kind: TaskKind, message: impl Into<String>) {
        if self.added {
            return;
        }
        self.added = true;
        self.kind = kind;
        self.emit(ProgressEvent::TaskAdded {
            key: self.key.clone(),
            options: TaskOptions {
                kind,
                message: message.into(),
                style: Style::Bold,
            },
        });
    }

    pub(crate) fn update(&self, percentage: Option<f64>, message: impl Into<String>) {
        if !self.added || self.finished {
            return;
        }
        self.emit(ProgressEvent::TaskUpdated {
            key: self.key.clone(),
            update: TaskUpdate {
                percentage: percentage.filter(|_| self.kind == TaskKind::Percentage),
                message: message.into(),
            },
        });
    }

    pub(crate) fn set_kind(&mut self, kind: TaskKind) {
        if !self.added || self.finished || self.kind == kind {
            return;
        }
        self.kind = kind;
        self.emit(ProgressEvent::TaskKindChanged {
            key: self.key.clone(),
            kind,
        });
    }

    pub(crate) fn finish(&mut self, message: impl Into<String>, style: Style) {
        if !self.added || self.finished {
            return;
        }
        self.finished = true;
        self.emit(ProgressEvent::TaskDone {
            key: self.key.clone(),
            options: DoneOptions {
                message: message.into(),
                style,
            },
        });
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(ref callback) = self.callback {
            callback(event);
        }
    }
}

/// Line-per-event console reporter
///
/// Updates are rate limited per task so several concurrent downloads stay
/// readable on a plain terminal.
#[derive(Debug)]
pub struct ConsoleProgressReporter {
    pub verbose: bool,
    refresh_rate: Duration,
    last_update: Mutex<HashMap<String, Instant>>,
}

impl ConsoleProgressReporter {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            refresh_rate: Duration::from_millis(500),
            last_update: Mutex::new(HashMap::new()),
        }
    }

    /// Set the minimum delay between two printed updates of the same task
    pub fn with_refresh_rate(mut self, rate: Duration) -> Self {
        self.refresh_rate = rate;
        self
    }

    fn should_print(&self, key: &str) -> bool {
        let Ok(mut last_update) = self.last_update.lock() else {
            return true;
        };
        let now = Instant::now();
        match last_update.get(key) {
            Some(last) if now.duration_since(*last) < self.refresh_rate => false,
            _ => {
                last_update.insert(key.to_string(), now);
                true
            }
        }
    }
}

impl Default for ConsoleProgressReporter {
    fn default() -> Self {
        Self::new(false)
    }
}

impl ProgressReporter for ConsoleProgressReporter {
    fn add_task(&self, key: &str, options: &TaskOptions) {
        let icon = match options.kind {
            TaskKind::Indefinite => "🔍",
            TaskKind::Percentage => "📥",
        };
        println!("{} {}: {}", icon, key, options.message);
    }

    fn update_task(&self, key: &str, update: &TaskUpdate) {
        if !self.verbose || !self.should_print(key) {
            return;
        }
        match update.percentage {
            Some(fraction) => println!("⏬ {}: {:5.1}% {}", key, fraction * 100.0, update.message),
            None => println!("⏬ {}: {}", key, update.message),
        }
    }

    fn set_task_kind(&self, key: &str, kind: TaskKind) {
        if self.verbose && kind == TaskKind::Percentage {
            println!("📥 {}: switching to download", key);
        }
    }

    fn done(&self, key: &str, options: &DoneOptions) {
        if let Ok(mut last_update) = self.last_update.lock() {
            last_update.remove(key);
        }
        match options.style {
            Style::Failure => eprintln!("❌ {}: {}", key, options.message),
            _ => println!("✅ {}: {}", key, options.message),
        }
    }
}

/// Null progress reporter that does nothing
#[derive(Debug, Default)]
pub struct NullProgressReporter;

impl ProgressReporter for NullProgressReporter {}

/// Reporter that keeps every event in memory
///
/// Clones share the same event log, so one clone can be turned into a
/// callback while another is inspected afterwards.
#[derive(Debug, Clone, Default)]
pub struct RecordingProgressReporter {
    events: Arc<Mutex<Vec<ProgressEvent>>>,
}

impl RecordingProgressReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Events recorded for one task key, in emission order
    pub fn events_for(&self, key: &str) -> Vec<ProgressEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.key() == key)
            .collect()
    }

    fn push(&self, event: ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl ProgressReporter for RecordingProgressReporter {
    fn add_task(&self, key: &str, options: &TaskOptions) {
        self.push(ProgressEvent::TaskAdded {
            key: key.to_string(),
            options: options.clone(),
        });
    }

    fn update_task(&self, key: &str, update: &TaskUpdate) {
        self.push(ProgressEvent::TaskUpdated {
            key: key.to_string(),
            update: update.clone(),
        });
    }

    fn set_task_kind(&self, key: &str, kind: TaskKind) {
        self.push(ProgressEvent::TaskKindChanged {
            key: key.to_string(),
            kind,
        });
    }

    fn done(&self, key: &str, options: &DoneOptions) {
        self.push(ProgressEvent::TaskDone {
            key: key.to_string(),
            options: options.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reported_task_enforces_lifecycle() {
        let recorder = RecordingProgressReporter::new();
        let mut task = ReportedTask::new(Some(recorder.clone().into_callback()), "file.bin");

        task.update(None, "ignored before add");
        task.finish("ignored before add", Style::Success);
        task.add(TaskKind::Percentage, "Download initialization");
        task.add(TaskKind::Indefinite, "second add ignored");
        task.update(Some(0.5), "half");
        task.finish("Done.", Style::Success);
        task.finish("second done ignored", Style::Failure);
        task.update(Some(1.0), "ignored after done");

        let events = recorder.events();
        assert_eq!(events.len(), 3);
        assert!(matches!(
            &events[0],
            ProgressEvent::TaskAdded { options, .. } if options.kind == TaskKind::Percentage
        ));
        assert!(matches!(
            &events[1],
            ProgressEvent::TaskUpdated { update, .. } if update.percentage == Some(0.5)
        ));
        assert!(matches!(
            &events[2],
            ProgressEvent::TaskDone { options, .. } if options.message == "Done."
        ));
    }

    #[test]
    fn test_indefinite_task_drops_percentages_until_switched() {
        let recorder = RecordingProgressReporter::new();
        let mut task = ReportedTask::new(Some(recorder.clone().into_callback()), "file.bin");

        task.add(TaskKind::Indefinite, "Verifying file integrity");
        task.update(Some(0.3), "hashing");
        task.set_kind(TaskKind::Indefinite);
        task.set_kind(TaskKind::Percentage);
        task.update(Some(0.6), "writing");
        task.finish("Done.", Style::Success);

        let events = recorder.events();
        assert_eq!(events.len(), 5);
        assert!(matches!(
            &events[1],
            ProgressEvent::TaskUpdated { update, .. } if update.percentage.is_none()
        ));
        assert_eq!(
            events[2],
            ProgressEvent::TaskKindChanged {
                key: "file.bin".to_string(),
                kind: TaskKind::Percentage
            }
        );
        assert!(matches!(
            &events[3],
            ProgressEvent::TaskUpdated { update, .. } if update.percentage == Some(0.6)
        ));
    }

    #[test]
    fn test_key_is_fixed_once_added() {
        let mut task = ReportedTask::new(None, "provisional");
        task.set_key("report.pdf");
        task.add(TaskKind::Percentage, "Download initialization");
        task.set_key("other.pdf");
        assert_eq!(task.key(), "report.pdf");
    }

    #[test]
    fn test_reported_task_without_callback_is_silent() {
        let mut task = ReportedTask::new(None, "file.bin");
        task.add(TaskKind::Indefinite, "Verifying file integrity");
        task.update(None, "Corrupted. Redownloading...");
        task.finish("Done.", Style::Success);
        assert!(task.added && task.finished);
    }

    #[test]
    fn test_recording_reporter_filters_by_key() {
        let recorder = RecordingProgressReporter::new();
        let callback = recorder.clone().into_callback();
        for key in ["a.bin", "b.bin", "a.bin"] {
            callback(ProgressEvent::TaskUpdated {
                key: key.to_string(),
                update: TaskUpdate {
                    percentage: None,
                    message: String::new(),
                },
            });
        }
        assert_eq!(recorder.events_for("a.bin").len(), 2);
        assert_eq!(recorder.events_for("b.bin").len(), 1);
    }

    #[test]
    fn test_console_reporter_throttles_updates_per_key() {
        let reporter = ConsoleProgressReporter::new(true).with_refresh_rate(Duration::from_secs(60));
        assert!(reporter.should_print("a.bin"));
        assert!(!reporter.should_print("a.bin"));
        assert!(reporter.should_print("b.bin"));
    }
}
