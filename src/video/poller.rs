//! Drives a video job from submission to downloaded result.

use crate::config::DEFAULT_POLL_INTERVAL;
use crate::credential::CredentialGate;
use crate::error::{Result, StudioError};
use crate::gateway::{classify_generation_error, Gateway};
use crate::video::types::{GeneratedVideo, JobHandle, JobStatus, VideoJob, VideoMetadata};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// MIME type of Veo results.
const VIDEO_MIME_TYPE: &str = "video/mp4";

/// Submits a video job, waits for it, and downloads the result.
///
/// With no timeout and no cancellation token the poller waits as long as the
/// gateway keeps reporting the job as running.
#[derive(Debug, Clone)]
pub struct JobPoller {
    poll_interval: Duration,
    timeout: Option<Duration>,
    cancel: Option<CancellationToken>,
    gate: CredentialGate,
}

impl Default for JobPoller {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl JobPoller {
    /// Creates a poller that waits `poll_interval` between status checks.
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            timeout: None,
            cancel: None,
            gate: CredentialGate::new(true),
        }
    }

    /// Fails with [`StudioError::Timeout`] once `timeout` has elapsed since submission.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Stops between polls once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Credential flag to reset when the provider rejects the key.
    pub fn with_credential_gate(mut self, gate: CredentialGate) -> Self {
        self.gate = gate;
        self
    }

    /// Returns the wait between status checks.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Runs `job` to a terminal state, updating `job.status` along the way.
    pub async fn run(&self, gateway: &dyn Gateway, job: &mut VideoJob) -> Result<GeneratedVideo> {
        let result = self
            .drive(gateway, job)
            .await
            .map_err(|e| classify_generation_error(e, &self.gate));

        match &result {
            Ok(video) => {
                job.status = JobStatus::Done;
                tracing::info!(
                    operation = video.metadata.operation.as_deref().unwrap_or_default(),
                    polls = video.metadata.polls,
                    size_bytes = video.size(),
                    "video generation complete"
                );
            }
            Err(e) => {
                job.status = JobStatus::Failed;
                tracing::warn!("video generation failed: {e}");
            }
        }
        result
    }

    async fn drive(&self, gateway: &dyn Gateway, job: &mut VideoJob) -> Result<GeneratedVideo> {
        job.request.validate()?;
        self.check_cancelled()?;

        let start = Instant::now();
        let mut handle = gateway.submit_video_job(&job.request).await?;
        job.status = JobStatus::Submitted;
        tracing::debug!(operation = %handle.name, "submitted video generation request");

        let mut polls = 0u32;
        while !handle.done {
            if let Some(message) = handle.error.take() {
                return Err(StudioError::GenerationFailed(message));
            }
            job.status = JobStatus::Polling;

            let wait = match self.timeout {
                Some(timeout) => {
                    let elapsed = start.elapsed();
                    if elapsed >= timeout {
                        return Err(StudioError::Timeout(timeout));
                    }
                    self.poll_interval.min(timeout - elapsed)
                }
                None => self.poll_interval,
            };
            self.wait(wait).await?;

            handle = gateway.poll_job(&handle).await?;
            polls += 1;
            tracing::debug!(
                operation = %handle.name,
                elapsed_secs = start.elapsed().as_secs(),
                done = handle.done,
                "polling video generation"
            );
        }

        let uri = Self::result_location(handle.clone())?;
        let data = gateway.fetch_asset(&uri).await?;

        Ok(GeneratedVideo {
            data,
            mime_type: VIDEO_MIME_TYPE.to_string(),
            metadata: VideoMetadata {
                operation: Some(handle.name),
                polls,
                duration_ms: Some(start.elapsed().as_millis() as u64),
            },
        })
    }

    /// Extracts the first result location from a finished job.
    fn result_location(handle: JobHandle) -> Result<String> {
        // Error first, before looking at the result.
        if let Some(message) = handle.error {
            return Err(StudioError::GenerationFailed(message));
        }
        handle.result_uri.ok_or(StudioError::ResultMissing)
    }

    async fn wait(&self, duration: Duration) -> Result<()> {
        match &self.cancel {
            Some(token) => {
                tokio::select! {
                    _ = token.cancelled() => Err(StudioError::Cancelled),
                    _ = tokio::time::sleep(duration) => Ok(()),
                }
            }
            None => {
                tokio::time::sleep(duration).await;
                Ok(())
            }
        }
    }

    fn check_cancelled(&self) -> Result<()> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => Err(StudioError::Cancelled),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::ScriptedGateway;
    use crate::video::types::{AspectRatio, VideoRequest};
    use std::sync::Arc;

    fn job() -> VideoJob {
        VideoJob::new(VideoRequest::new("a cat surfing", AspectRatio::Landscape))
    }

    fn poller() -> JobPoller {
        JobPoller::new(Duration::from_secs(10))
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_waits_before_done() {
        let gw = ScriptedGateway::new();
        gw.set_submit(Ok(JobHandle::pending("operations/1")));
        gw.push_poll(Ok(JobHandle::pending("operations/1")));
        gw.push_poll(Ok(JobHandle::finished(
            "operations/1",
            Some("https://example.com/v.mp4".into()),
        )));
        gw.set_fetch(Ok(vec![1, 2, 3]));

        let start = Instant::now();
        let mut job = job();
        let video = poller().run(&gw, &mut job).await.unwrap();

        assert_eq!(start.elapsed(), Duration::from_secs(20));
        assert_eq!(gw.poll_count(), 2);
        assert_eq!(video.metadata.polls, 2);
        assert_eq!(video.data, vec![1, 2, 3]);
        assert_eq!(video.mime_type, "video/mp4");
        assert_eq!(gw.fetched(), vec!["https://example.com/v.mp4".to_string()]);
        assert_eq!(job.status, JobStatus::Done);
    }

    #[tokio::test(start_paused = true)]
    async fn test_done_on_submit_skips_polling() {
        let gw = ScriptedGateway::new();
        gw.set_submit(Ok(JobHandle::finished("operations/2", Some("u".into()))));
        gw.set_fetch(Ok(vec![9]));

        let start = Instant::now();
        let video = poller().run(&gw, &mut job()).await.unwrap();
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(gw.poll_count(), 0);
        assert_eq!(video.data, vec![9]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_done_without_result_is_result_missing() {
        let gw = ScriptedGateway::new();
        gw.set_submit(Ok(JobHandle::pending("operations/3")));
        gw.push_poll(Ok(JobHandle::finished("operations/3", None)));
        gw.set_fetch(Ok(vec![1]));

        let mut job = job();
        let err = poller().run(&gw, &mut job).await.unwrap_err();
        assert!(matches!(err, StudioError::ResultMissing));
        assert!(gw.fetched().is_empty(), "no download should be attempted");
        assert_eq!(job.status, JobStatus::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_download_failure_carries_status() {
        let gw = ScriptedGateway::new();
        gw.set_submit(Ok(JobHandle::finished("operations/4", Some("u".into()))));
        gw.set_fetch(Err(StudioError::DownloadFailed { status: 403 }));

        let err = poller().run(&gw, &mut job()).await.unwrap_err();
        assert!(matches!(err, StudioError::DownloadFailed { status: 403 }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_provider_failure_is_generation_failed() {
        let gw = ScriptedGateway::new();
        gw.set_submit(Ok(JobHandle::pending("operations/5")));
        gw.push_poll(Ok(JobHandle::failed("operations/5", "quota exceeded")));

        match poller().run(&gw, &mut job()).await {
            Err(StudioError::GenerationFailed(msg)) => assert_eq!(msg, "quota exceeded"),
            other => panic!("Expected GenerationFailed, got: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_credential_resets_gate() {
        let gw = ScriptedGateway::new();
        gw.set_submit(Err(StudioError::Gateway {
            status: 404,
            message: "Requested entity was not found.".into(),
        }));
        let gate = CredentialGate::new(true);

        let err = poller()
            .with_credential_gate(gate.clone())
            .run(&gw, &mut job())
            .await
            .unwrap_err();
        assert!(matches!(err, StudioError::InvalidCredential(_)));
        assert!(!gate.is_selected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_stops_polling() {
        let gw = ScriptedGateway::new();
        gw.set_submit(Ok(JobHandle::pending("operations/6")));

        let start = Instant::now();
        let err = poller()
            .with_timeout(Some(Duration::from_secs(25)))
            .run(&gw, &mut job())
            .await
            .unwrap_err();
        assert!(matches!(err, StudioError::Timeout(t) if t == Duration::from_secs(25)));
        // Polls at 10s, 20s and 25s, then the budget is spent.
        assert_eq!(gw.poll_count(), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(25));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_between_polls() {
        let gw = Arc::new(ScriptedGateway::new());
        gw.set_submit(Ok(JobHandle::pending("operations/7")));
        let token = CancellationToken::new();

        let poller = poller().with_cancellation(token.clone());
        let task_gw = Arc::clone(&gw);
        let task = tokio::spawn(async move {
            let mut job = job();
            let result = poller.run(task_gw.as_ref(), &mut job).await;
            (result, job.status)
        });

        tokio::time::sleep(Duration::from_secs(15)).await;
        token.cancel();
        let (result, status) = task.await.unwrap();

        assert!(matches!(result, Err(StudioError::Cancelled)));
        assert_eq!(status, JobStatus::Failed);
        assert_eq!(gw.poll_count(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_submit() {
        let gw = ScriptedGateway::new();
        gw.set_submit(Ok(JobHandle::pending("operations/8")));
        let token = CancellationToken::new();
        token.cancel();

        let err = poller()
            .with_cancellation(token)
            .run(&gw, &mut job())
            .await
            .unwrap_err();
        assert!(matches!(err, StudioError::Cancelled));
        assert!(gw.submit.lock().unwrap().is_some(), "nothing submitted");
    }

    #[tokio::test]
    async fn test_blank_prompt_never_reaches_gateway() {
        let gw = ScriptedGateway::new();
        let mut job = VideoJob::new(VideoRequest::new("", AspectRatio::Portrait));
        let err = poller().run(&gw, &mut job).await.unwrap_err();
        assert!(matches!(err, StudioError::MissingInput(_)));
    }
}
