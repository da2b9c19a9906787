use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::{DataSource, SourceQuery};
use report_model::{PipelineError, Table};

/// Puts a deadline on another source's fetch.
///
/// The original dashboards could hang a whole page render on one slow
/// warehouse query; here a fetch that outlives the deadline fails with
/// [`PipelineError::SourceUnavailable`]. The abandoned fetch finishes on its
/// worker thread and is discarded; its result is never cached, so a later
/// retry re-reads the source.
#[derive(Debug)]
pub struct TimeoutSource<S> {
    inner: Arc<S>,
    timeout: Duration,
}

impl<S> TimeoutSource<S> {
    pub fn new(inner: S, timeout: Duration) -> Self {
        Self {
            inner: Arc::new(inner),
            timeout,
        }
    }
}

impl<S: DataSource + Send + Sync + 'static> DataSource for TimeoutSource<S> {
    fn fetch(&self, query: &SourceQuery) -> Result<Table, PipelineError> {
        let (tx, rx) = mpsc::channel();
        let inner = Arc::clone(&self.inner);
        let owned_query = query.clone();
        thread::spawn(move || {
            // The receiver may be gone after a timeout; the send result is
            // deliberately ignored.
            let _ = tx.send(inner.fetch(&owned_query));
        });

        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(_) => {
                log::warn!(
                    "source {}: fetch exceeded {:?}, abandoning",
                    query.source_id,
                    self.timeout
                );
                Err(PipelineError::source_unavailable(
                    &query.source_id,
                    format!("fetch timed out after {:?}", self.timeout),
                ))
            }
        }
    }
}
