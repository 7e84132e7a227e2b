//! Runs one fetch inside its own task so a panic becomes an error value.

use std::any::Any;
use std::sync::Arc;

use tracing::error;

use crate::adapters::{ContentFetcher, FetchError, FetchRequest};
use crate::progress::ProgressSink;

/// Run `fetcher` to completion, converting a panic into [`FetchError::Panicked`]
pub async fn run_fetch(
    fetcher: Arc<dyn ContentFetcher>,
    request: FetchRequest,
    progress: Arc<dyn ProgressSink>,
) -> Result<(), FetchError> {
    let title_id = request.title_id.clone();
    let handle = tokio::spawn(async move { fetcher.fetch(request, progress).await });

    match handle.await {
        Ok(result) => result,
        Err(join_err) if join_err.is_panic() => {
            let message = panic_message(join_err.into_panic());
            error!(%title_id, %message, "Fetcher panicked");
            Err(FetchError::Panicked(message))
        }
        Err(join_err) => Err(FetchError::Aborted(join_err.to_string())),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::catalog::TitleId;
    use crate::progress::ConsoleProgress;

    struct Exploding;

    #[async_trait]
    impl ContentFetcher for Exploding {
        fn name(&self) -> &str {
            "exploding"
        }

        async fn fetch(
            &self,
            _request: FetchRequest,
            _progress: Arc<dyn ProgressSink>,
        ) -> Result<(), FetchError> {
            panic!("disk on fire");
        }
    }

    #[tokio::test]
    async fn test_panic_becomes_error() {
        let progress = Arc::new(ConsoleProgress::hidden());
        let request = FetchRequest::new(
            TitleId::new(1),
            std::env::temp_dir(),
            false,
            false,
            progress.cancellation_token(),
        );

        let err = run_fetch(Arc::new(Exploding), request, progress)
            .await
            .unwrap_err();
        match err {
            FetchError::Panicked(message) => assert_eq!(message, "disk on fire"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_panic_message_payloads() {
        assert_eq!(panic_message(Box::new("static")), "static");
        assert_eq!(panic_message(Box::new(String::from("owned"))), "owned");
        assert_eq!(panic_message(Box::new(42u8)), "unknown panic");
    }
}
