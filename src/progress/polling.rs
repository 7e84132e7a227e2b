//! Progress sink that writes into a job record for later polling.

use std::sync::{Arc, RwLock};
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use super::{read_lock, write_lock, ProgressSink};
use crate::domain::JobRecord;

/// Mutates the shared job record; performs no I/O
#[derive(Clone)]
pub struct JobProgress {
    record: Arc<RwLock<JobRecord>>,
    cancel: CancellationToken,
}

impl JobProgress {
    pub fn new(record: Arc<RwLock<JobRecord>>, cancel: CancellationToken) -> Self {
        Self { record, cancel }
    }
}

impl ProgressSink for JobProgress {
    fn set_display_name(&self, name: &str) {
        let mut record = write_lock(&self.record);
        record.title_name = name.to_string();
        record.progress.set_display_name(name);
    }

    fn set_total_expected(&self, bytes: u64) {
        write_lock(&self.record).progress.set_total_expected(bytes);
    }

    fn set_start_time(&self, at: Instant) {
        write_lock(&self.record).progress.start_clock(at);
    }

    fn update_file_progress(&self, file: &str, bytes_so_far: u64) {
        write_lock(&self.record)
            .progress
            .update_file(file, bytes_so_far);
    }

    fn update_transform_progress(&self, fraction: f64) {
        write_lock(&self.record)
            .progress
            .set_transform_fraction(fraction);
    }

    fn is_cancelled(&self) -> bool {
        read_lock(&self.record).progress.is_cancelled()
    }

    fn request_cancel(&self) {
        write_lock(&self.record).progress.cancel();
        self.cancel.cancel();
    }

    fn reset_counters(&self) {
        write_lock(&self.record).progress.reset();
    }

    fn mark_file_complete(&self, _file: &str) {
        write_lock(&self.record).progress.mark_file_complete();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_updates_land_in_record() {
        let record = Arc::new(RwLock::new(JobRecord::new("placeholder")));
        let sink = JobProgress::new(record.clone(), CancellationToken::new());

        sink.set_display_name("Super Mario 3D World");
        sink.update_file_progress("a.bin", 500);
        sink.set_total_expected(1000);
        sink.update_file_progress("a.bin", 1000);

        let record = read_lock(&record);
        assert_eq!(record.title_name, "Super Mario 3D World");
        assert_eq!(record.progress.aggregate(), 1000);
        assert_eq!(record.progress.metrics().percent, 100.0);
    }

    #[test]
    fn test_request_cancel_sets_flag_and_token() {
        let record = Arc::new(RwLock::new(JobRecord::new("t")));
        let token = CancellationToken::new();
        let sink = JobProgress::new(record, token.clone());

        sink.request_cancel();
        assert!(sink.is_cancelled());
        assert!(token.is_cancelled());
    }
}
