//! Terminal progress for the one-shot `fetch` command.

use std::sync::RwLock;
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;

use super::format::{format_bytes, format_eta};
use super::{read_lock, write_lock, ProgressSink, ProgressState};

const BAR_TEMPLATE: &str = "{bar:40.cyan/blue} {percent:>3}% {wide_msg}";

/// Progress sink that renders to the terminal as updates arrive
pub struct ConsoleProgress {
    state: RwLock<ProgressState>,
    bar: ProgressBar,
    cancel: CancellationToken,
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleProgress {
    /// Draw to stderr
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(BAR_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        Self::with_bar(bar)
    }

    /// Sink that tracks state without drawing anything
    pub fn hidden() -> Self {
        Self::with_bar(ProgressBar::hidden())
    }

    pub fn with_bar(bar: ProgressBar) -> Self {
        Self {
            state: RwLock::new(ProgressState::new()),
            bar,
            cancel: CancellationToken::new(),
        }
    }

    /// Token fired by [`ProgressSink::request_cancel`]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Copy of the current counters
    pub fn snapshot(&self) -> ProgressState {
        read_lock(&self.state).clone()
    }

    /// Leave the last drawn line on screen
    pub fn finish(&self) {
        self.bar.abandon();
    }

    fn redraw(&self, state: &ProgressState) {
        let metrics = state.metrics();
        let Some(total) = metrics.total.filter(|t| *t > 0) else {
            return;
        };

        self.bar.set_length(total);
        self.bar.set_position(metrics.downloaded.min(total));
        self.bar.set_message(format!(
            "({}/{}) ETA: {}",
            format_bytes(metrics.downloaded),
            format_bytes(total),
            format_eta(metrics.eta)
        ));
    }
}

impl ProgressSink for ConsoleProgress {
    fn set_display_name(&self, name: &str) {
        write_lock(&self.state).set_display_name(name);
        self.bar.println(format!("Downloading: {}", name));
    }

    fn set_total_expected(&self, bytes: u64) {
        let mut state = write_lock(&self.state);
        state.set_total_expected(bytes);
        self.redraw(&state);
    }

    fn set_start_time(&self, at: Instant) {
        write_lock(&self.state).start_clock(at);
    }

    fn update_file_progress(&self, file: &str, bytes_so_far: u64) {
        let mut state = write_lock(&self.state);
        state.update_file(file, bytes_so_far);
        self.redraw(&state);
    }

    fn update_transform_progress(&self, fraction: f64) {
        let mut state = write_lock(&self.state);
        state.set_transform_fraction(fraction);
        let percent = state.transform_fraction().unwrap_or_default() * 100.0;
        self.bar.set_message(format!("Transform progress: {:.1}%", percent));
    }

    fn is_cancelled(&self) -> bool {
        read_lock(&self.state).is_cancelled()
    }

    fn request_cancel(&self) {
        write_lock(&self.state).cancel();
        self.cancel.cancel();
    }

    fn reset_counters(&self) {
        write_lock(&self.state).reset();
        self.bar.set_length(0);
        self.bar.set_position(0);
    }

    fn mark_file_complete(&self, file: &str) {
        let mut state = write_lock(&self.state);
        let done = state.mark_file_complete();
        self.bar.println(format!(
            "Completed: {} ({}/{} files)",
            file,
            done,
            state.file_count()
        ));
    }
}
