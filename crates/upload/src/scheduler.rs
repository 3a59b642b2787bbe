//! Bounded-concurrency fan-out over files.
//!
//! File tasks are interleaved on the calling task (no spawning), so at
//! most `concurrency` files are in flight and shared state needs no
//! `'static` bounds. A panicking file task becomes a failed result.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures_util::{FutureExt, StreamExt, stream};
use tracing::error;

use crate::types::{FileInfo, UploadResult};

/// Runs one task per file, at most `concurrency` at a time.
#[derive(Debug, Clone, Copy)]
pub struct UploadScheduler {
    concurrency: usize,
}

impl UploadScheduler {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Runs `task` for every file and returns the results in completion
    /// order once every task has settled.
    pub async fn run<F, Fut>(&self, files: Vec<FileInfo>, task: F) -> Vec<UploadResult>
    where
        F: Fn(FileInfo) -> Fut,
        Fut: Future<Output = UploadResult>,
    {
        stream::iter(files)
            .map(|file| {
                let name = file.logical_name.clone();
                AssertUnwindSafe(task(file))
                    .catch_unwind()
                    .map(move |outcome| match outcome {
                        Ok(result) => result,
                        Err(panic) => {
                            let message = panic_message(panic.as_ref());
                            error!(file = %name, panic = %message, "file task panicked");
                            UploadResult::failed(name, format!("task panicked: {message}"))
                        }
                    })
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn files(n: usize) -> Vec<FileInfo> {
        (0..n)
            .map(|i| FileInfo {
                absolute_path: PathBuf::from(format!("/tmp/{i}")),
                logical_name: format!("f{i}"),
                size_bytes: 1,
            })
            .collect()
    }

    fn ok(file: &FileInfo) -> UploadResult {
        UploadResult {
            file_name: file.logical_name.clone(),
            succeeded: true,
            ..UploadResult::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn concurrency_is_bounded() {
        let counters = (AtomicUsize::new(0), AtomicUsize::new(0));
        let (in_flight, peak) = (&counters.0, &counters.1);
        let scheduler = UploadScheduler::new(3);

        let results = scheduler
            .run(files(10), move |file| {
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    ok(&file)
                }
            })
            .await;

        assert_eq!(results.len(), 10);
        assert_eq!(peak.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn panic_is_contained() {
        let scheduler = UploadScheduler::new(4);

        let results = scheduler
            .run(files(5), |file| async move {
                tokio::task::yield_now().await;
                if file.logical_name == "f2" {
                    panic!("boom");
                }
                ok(&file)
            })
            .await;

        assert_eq!(results.len(), 5);
        let failed: Vec<&UploadResult> = results.iter().filter(|r| !r.succeeded).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].file_name, "f2");
        assert_eq!(failed[0].error.as_deref(), Some("task panicked: boom"));
    }

    #[tokio::test]
    async fn zero_concurrency_clamped() {
        let scheduler = UploadScheduler::new(0);
        assert_eq!(scheduler.concurrency(), 1);
        let results = scheduler.run(files(2), |file| async move { ok(&file) }).await;
        assert_eq!(results.len(), 2);
    }
}
