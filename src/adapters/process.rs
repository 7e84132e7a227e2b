//! Fetcher that delegates to an external download tool.
//!
//! The tool is invoked as
//! `<program> <args..> <TITLE_ID> <DESTINATION> [--transform] [--delete-after]`
//! and reports progress on stdout, one event per line:
//!
//! ```text
//! title <display name>
//! size <total bytes>
//! start
//! file <file name> <bytes so far>
//! done <file name>
//! transform <fraction 0..1>
//! reset
//! ```
//!
//! Unknown lines are ignored. The child is killed when the job is cancelled.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::{ContentFetcher, FetchError, FetchRequest};
use crate::config::FetcherSettings;
use crate::progress::ProgressSink;

/// Longest stderr tail kept for error messages
const STDERR_TAIL: usize = 2048;

/// Fetcher backed by a child process
pub struct ProcessFetcher {
    program: String,
    args: Vec<String>,
}

impl ProcessFetcher {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn from_settings(settings: &FetcherSettings) -> Self {
        Self::new(settings.command.clone()).with_args(settings.args.iter().cloned())
    }

    fn command(&self, request: &FetchRequest) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(&request.title_id)
            .arg(&request.destination);
        if request.transform {
            cmd.arg("--transform");
        }
        if request.delete_after {
            cmd.arg("--delete-after");
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

/// One parsed progress line
#[derive(Debug, Clone, PartialEq)]
enum ProgressLine<'a> {
    Title(&'a str),
    Size(u64),
    Start,
    File { name: &'a str, bytes: u64 },
    Done(&'a str),
    Transform(f64),
    Reset,
}

fn parse_line(line: &str) -> Option<ProgressLine<'_>> {
    let line = line.trim();
    let (keyword, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();

    match keyword {
        "title" if !rest.is_empty() => Some(ProgressLine::Title(rest)),
        "size" => rest.parse().ok().map(ProgressLine::Size),
        "start" => Some(ProgressLine::Start),
        "file" => {
            let (name, bytes) = rest.rsplit_once(' ')?;
            let bytes = bytes.parse().ok()?;
            Some(ProgressLine::File {
                name: name.trim(),
                bytes,
            })
        }
        "done" if !rest.is_empty() => Some(ProgressLine::Done(rest)),
        "transform" => rest.parse().ok().map(ProgressLine::Transform),
        "reset" => Some(ProgressLine::Reset),
        _ => None,
    }
}

fn apply_line(progress: &dyn ProgressSink, line: &str) {
    match parse_line(line) {
        Some(ProgressLine::Title(name)) => progress.set_display_name(name),
        Some(ProgressLine::Size(bytes)) => progress.set_total_expected(bytes),
        Some(ProgressLine::Start) => progress.set_start_time(Instant::now()),
        Some(ProgressLine::File { name, bytes }) => progress.update_file_progress(name, bytes),
        Some(ProgressLine::Done(name)) => progress.mark_file_complete(name),
        Some(ProgressLine::Transform(fraction)) => progress.update_transform_progress(fraction),
        Some(ProgressLine::Reset) => progress.reset_counters(),
        None => debug!(line, "Ignoring unrecognized fetcher output"),
    }
}

fn tail(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut start = text.len() - max;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}

#[async_trait]
impl ContentFetcher for ProcessFetcher {
    fn name(&self) -> &str {
        "process"
    }

    async fn fetch(
        &self,
        request: FetchRequest,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<(), FetchError> {
        info!(program = %self.program, title_id = %request.title_id, "Spawning fetcher");

        let mut child = self
            .command(&request)
            .spawn()
            .map_err(|source| FetchError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let stderr_task = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let _ = stderr.read_to_end(&mut buf).await;
                String::from_utf8_lossy(&buf).into_owned()
            })
        });

        if let Some(stdout) = child.stdout.take() {
            // Lines are decoded lossily. A partial line stays in `buf` across
            // select iterations.
            let mut reader = BufReader::new(stdout);
            let mut buf = Vec::new();
            loop {
                tokio::select! {
                    _ = request.cancel.cancelled() => {
                        warn!(title_id = %request.title_id, "Cancellation requested, stopping fetcher");
                        child.kill().await?;
                        return Err(FetchError::Cancelled);
                    }
                    read = reader.read_until(b'\n', &mut buf) => {
                        if read? == 0 {
                            break;
                        }
                        let line = String::from_utf8_lossy(&buf);
                        apply_line(progress.as_ref(), line.trim_end_matches(['\n', '\r']));
                        buf.clear();
                    }
                }
            }
        }

        let status = child.wait().await?;
        let stderr = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        if progress.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        if !status.success() {
            let exit_code = status.code().unwrap_or(-1);
            return Err(FetchError::Failed(format!(
                "Fetcher exited with code {}: {}",
                exit_code,
                tail(stderr.trim(), STDERR_TAIL)
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ConsoleProgress;

    #[test]
    fn test_parse_line() {
        assert_eq!(parse_line("title Super Mario 3D World"), Some(ProgressLine::Title("Super Mario 3D World")));
        assert_eq!(parse_line("size 1000"), Some(ProgressLine::Size(1000)));
        assert_eq!(
            parse_line("file 00000001.app 512"),
            Some(ProgressLine::File { name: "00000001.app", bytes: 512 })
        );
        assert_eq!(
            parse_line("file name with spaces.bin 7"),
            Some(ProgressLine::File { name: "name with spaces.bin", bytes: 7 })
        );
        assert_eq!(parse_line("transform 0.5"), Some(ProgressLine::Transform(0.5)));
        assert_eq!(parse_line("reset"), Some(ProgressLine::Reset));
        assert_eq!(parse_line("size lots"), None);
        assert_eq!(parse_line("file missing-bytes"), None);
        assert_eq!(parse_line("hello world"), None);
    }

    #[test]
    fn test_tail_respects_char_boundaries() {
        assert_eq!(tail("abc", 10), "abc");
        assert_eq!(tail("abcdef", 3), "def");
        assert_eq!(tail("aé", 1), "");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_fetcher_reports_progress() {
        let script = "echo 'title Test Title'; echo 'size 100'; echo 'file a.app 60'; \
                      echo 'file b.app 40'; echo 'done a.app'; echo 'done b.app'";
        let fetcher = ProcessFetcher::new("sh").with_args(["-c", script]);
        let progress = Arc::new(ConsoleProgress::hidden());
        let request = FetchRequest::new(
            crate::catalog::TitleId::new(0x00050000101C9500),
            std::env::temp_dir(),
            false,
            false,
            progress.cancellation_token(),
        );

        fetcher.fetch(request, progress.clone()).await.unwrap();

        let state = progress.snapshot();
        assert_eq!(state.display_name(), Some("Test Title"));
        assert_eq!(state.aggregate(), 100);
        assert_eq!(state.files_completed(), 2);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_fetcher_nonzero_exit() {
        let fetcher = ProcessFetcher::new("sh").with_args(["-c", "echo boom >&2; exit 3"]);
        let progress = Arc::new(ConsoleProgress::hidden());
        let request = FetchRequest::new(
            crate::catalog::TitleId::new(1),
            std::env::temp_dir(),
            false,
            false,
            progress.cancellation_token(),
        );

        let err = fetcher.fetch(request, progress).await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("code 3"), "{}", message);
        assert!(message.contains("boom"), "{}", message);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_utf8_output_is_decoded_lossily() {
        let script = "printf 'title \\377bad\\nsize 10\\nfile a.app 10\\r\\n'; \
                      printf '\\376oops\\n' >&2";
        let fetcher = ProcessFetcher::new("sh").with_args(["-c", script]);
        let progress = Arc::new(ConsoleProgress::hidden());
        let request = FetchRequest::new(
            crate::catalog::TitleId::new(1),
            std::env::temp_dir(),
            false,
            false,
            progress.cancellation_token(),
        );

        fetcher.fetch(request, progress.clone()).await.unwrap();

        let state = progress.snapshot();
        assert_eq!(state.display_name(), Some("\u{FFFD}bad"));
        assert_eq!(state.total_expected(), Some(10));
        assert_eq!(state.file_bytes("a.app"), Some(10));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_utf8_stderr_still_reported() {
        let fetcher = ProcessFetcher::new("sh").with_args(["-c", "printf 'bad \\377 key\\n' >&2; exit 2"]);
        let progress = Arc::new(ConsoleProgress::hidden());
        let request = FetchRequest::new(
            crate::catalog::TitleId::new(1),
            std::env::temp_dir(),
            false,
            false,
            progress.cancellation_token(),
        );

        let message = fetcher.fetch(request, progress).await.unwrap_err().to_string();
        assert!(message.contains("code 2"), "{}", message);
        assert!(message.contains("key"), "{}", message);
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let fetcher = ProcessFetcher::new("definitely-not-a-real-fetcher-binary");
        let progress = Arc::new(ConsoleProgress::hidden());
        let request = FetchRequest::new(
            crate::catalog::TitleId::new(1),
            std::env::temp_dir(),
            false,
            false,
            progress.cancellation_token(),
        );

        let err = fetcher.fetch(request, progress).await.unwrap_err();
        assert!(matches!(err, FetchError::Spawn { .. }));
    }
}
