//! Progress bar for collection runs on an interactive terminal.

use indicatif::{ProgressBar, ProgressStyle};
use multporn_core::Collection;
use multporn_core::download::{ProgressEvent, ProgressReporter, TracingReporter};

/// One bar per collection; page messages go to the bar, skips and the
/// summary to the log.
pub(crate) struct BarReporter {
    bar: ProgressBar,
}

impl BarReporter {
    pub(crate) fn new(collection: &Collection) -> Self {
        let bar = ProgressBar::new(to_u64(collection.len()));
        bar.set_style(
            ProgressStyle::with_template("{prefix} [{bar:30}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        bar.set_prefix(collection.display_name().to_string());
        Self { bar }
    }
}

impl ProgressReporter for BarReporter {
    fn report(&self, collection: &Collection, event: &ProgressEvent) {
        match event {
            ProgressEvent::ExistingRun { first, last, .. } => {
                self.bar.inc(to_u64(last.saturating_sub(*first) + 1));
                self.bar.set_message(event.to_string());
            }
            ProgressEvent::Done { .. } => {
                self.bar.inc(1);
                self.bar.set_message(event.to_string());
            }
            ProgressEvent::Skipped { .. } => {
                self.bar.inc(1);
                self.bar
                    .suspend(|| TracingReporter.report(collection, event));
            }
            ProgressEvent::Summary { .. } => {
                self.bar.finish_and_clear();
                TracingReporter.report(collection, event);
            }
        }
    }
}

impl Drop for BarReporter {
    fn drop(&mut self) {
        if !self.bar.is_finished() {
            self.bar.abandon();
        }
    }
}

fn to_u64(value: usize) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}
