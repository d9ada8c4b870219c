// ABOUTME: Poll engine that owns the single in-flight provisioning job
// ABOUTME: Starting a new job cancels the previous loop before anything else happens

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::RequestError;
use crate::remote::{Gateway, JobResult, JobStatus, JobStatusResponse};
use crate::session::SessionStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Delay between status requests.
    pub interval: Duration,
    /// Extra attempts for a status request that failed with a retryable
    /// transport error. Zero makes the first failure fatal.
    pub max_retries: u32,
    /// First retry delay; doubles on each further attempt.
    pub retry_backoff: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_retries: 2,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Done(JobResult),
    Failed(RequestError),
    /// Superseded by a newer job or cancelled by the caller.
    Cancelled,
}

struct ActivePoll {
    job_id: String,
    generation: u64,
    cancel: CancellationToken,
    handle: JoinHandle<PollOutcome>,
}

pub struct PollEngine<G> {
    gateway: Arc<G>,
    store: Arc<SessionStore>,
    settings: PollSettings,
    active: Option<ActivePoll>,
}

impl<G: Gateway + 'static> PollEngine<G> {
    pub fn new(gateway: Arc<G>, store: Arc<SessionStore>, settings: PollSettings) -> Self {
        Self {
            gateway,
            store,
            settings,
            active: None,
        }
    }

    pub fn is_polling(&self) -> bool {
        self.active
            .as_ref()
            .map_or(false, |active| !active.handle.is_finished())
    }

    /// Takes ownership of `job_id`. Any previous loop is cancelled first, so
    /// at most one loop can write to the session at any time.
    pub fn start(&mut self, job_id: &str, download_name: &str) {
        self.cancel();

        let generation = self.store.begin_job(job_id);
        let cancel = CancellationToken::new();
        let run = PollRun {
            gateway: Arc::clone(&self.gateway),
            store: Arc::clone(&self.store),
            settings: self.settings,
            job_id: job_id.to_string(),
            download_name: download_name.to_string(),
            generation,
            cancel: cancel.clone(),
        };

        tracing::info!(job_id, generation, "Polling job");
        let handle = tokio::spawn(run.run());
        self.active = Some(ActivePoll {
            job_id: job_id.to_string(),
            generation,
            cancel,
            handle,
        });
    }

    /// Stops the current loop, if any. Its pending step never fires and the
    /// session returns to idle.
    pub fn cancel(&mut self) {
        if let Some(active) = self.active.take() {
            tracing::debug!(job_id = %active.job_id, "Cancelling job poll");
            active.cancel.cancel();
            self.store.abandon_job(active.generation);
        }
    }

    /// Waits for the current loop to finish.
    pub async fn join(&mut self) -> PollOutcome {
        let Some(active) = self.active.take() else {
            return PollOutcome::Cancelled;
        };
        match active.handle.await {
            Ok(outcome) => outcome,
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(_) => PollOutcome::Cancelled,
        }
    }
}

impl<G> Drop for PollEngine<G> {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.cancel.cancel();
        }
    }
}

struct PollRun<G> {
    gateway: Arc<G>,
    store: Arc<SessionStore>,
    settings: PollSettings,
    job_id: String,
    download_name: String,
    generation: u64,
    cancel: CancellationToken,
}

impl<G: Gateway> PollRun<G> {
    async fn run(self) -> PollOutcome {
        loop {
            let fetched = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return PollOutcome::Cancelled,
                fetched = self.fetch_status() => fetched,
            };

            let payload = match fetched {
                Ok(payload) => payload,
                Err(err) => {
                    tracing::warn!(job_id = %self.job_id, error = %err, "Job status request failed");
                    self.store.fail_job(self.generation, &err);
                    return PollOutcome::Failed(err);
                }
            };

            match self.store.apply_status(self.generation, &payload) {
                None => return PollOutcome::Cancelled,
                Some(JobStatus::Error) => {
                    let message = payload.error.unwrap_or_else(|| "unknown error".to_string());
                    tracing::warn!(job_id = %self.job_id, %message, "Job failed");
                    return PollOutcome::Failed(RequestError::Logical(message));
                }
                Some(JobStatus::Done) => return self.finish().await,
                Some(status) => {
                    tracing::debug!(job_id = %self.job_id, %status, lines = payload.progress.len(), "Job in progress");
                }
            }

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return PollOutcome::Cancelled,
                _ = tokio::time::sleep(self.settings.interval) => {}
            }
        }
    }

    async fn fetch_status(&self) -> Result<JobStatusResponse, RequestError> {
        let mut attempt = 0;
        loop {
            match self.gateway.job_status(&self.job_id).await {
                Ok(payload) => return Ok(payload),
                Err(err) if err.is_retryable() && attempt < self.settings.max_retries => {
                    let delay = self.settings.retry_backoff * 2u32.saturating_pow(attempt);
                    attempt += 1;
                    tracing::warn!(
                        job_id = %self.job_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Retrying job status request"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Fetches the result exactly once. A failure here ends the job like a
    /// failed poll would.
    async fn finish(self) -> PollOutcome {
        let fetched = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return PollOutcome::Cancelled,
            fetched = self.gateway.job_result(&self.job_id) => fetched,
        };

        match fetched {
            Ok(result) => {
                if !self
                    .store
                    .complete_job(self.generation, &result, &self.download_name)
                {
                    return PollOutcome::Cancelled;
                }
                tracing::info!(job_id = %self.job_id, checks = result.checks.len(), "Job finished");
                PollOutcome::Done(result)
            }
            Err(err) => {
                tracing::warn!(job_id = %self.job_id, error = %err, "Job result request failed");
                self.store.fail_job(self.generation, &err);
                PollOutcome::Failed(err)
            }
        }
    }
}
