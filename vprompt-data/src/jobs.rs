//! Job submission and polling core
//!
//! A job runs through three phases on a single task:
//!
//! 1. submission: local validation, then the per-kind UiLock is taken and the
//!    start request is sent (never retried)
//! 2. polling: one status request per tick until `done` or `error`; any
//!    transport failure ends the loop
//! 3. retrieval (image jobs): the result fragment is fetched with bounded
//!    retries and applied to the view exactly once
//!
//! The lock lives in [`JobSlots`] owned by the [`JobController`]. It is held by
//! a [`SlotGuard`] whose drop cancels the job's [`CancellationToken`] and
//! re-enables the view, so every exit path releases it exactly once.
//! Cancelling a token drops the in-flight request rather than ignoring its
//! late response.

use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::api::{
    result_body_error, AudioFile, JobStatusResponse, StartImageRequest, StartJobResponse,
    StartVoiceRequest,
};
use crate::config::{AppConfig, PollingConfig, StatusEndpoint};
use crate::error::ClientError;
use crate::messages::{self, Notice};
use crate::preferences::VoiceSettings;

// ─── Job model ────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum JobKind {
    Image,
    Voice,
}

impl JobKind {
    pub fn label(&self) -> &'static str {
        match self {
            JobKind::Image => "image",
            JobKind::Voice => "voice",
        }
    }
}

/// Status as reported by the status endpoints
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JobStatus {
    #[default]
    Pending,
    InProgress,
    Done,
    Error,
}

impl JobStatus {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" | "queued" => Self::Pending,
            "done" | "completed" => Self::Done,
            "error" | "failed" => Self::Error,
            // "in-progress", "in_progress", "running" and anything unknown keep polling
            _ => Self::InProgress,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }
}

/// One in-flight backend task
#[derive(Clone, Debug)]
pub struct GenerationJob {
    pub job_id: String,
    pub kind: JobKind,
    pub status: JobStatus,
    /// Advisory only, 0..=100
    pub progress: u8,
    pub started_at: Instant,
    result_fetched: bool,
}

impl GenerationJob {
    pub fn new(job_id: impl Into<String>, kind: JobKind) -> Self {
        Self {
            job_id: job_id.into(),
            kind,
            status: JobStatus::Pending,
            progress: 0,
            started_at: Instant::now(),
            result_fetched: false,
        }
    }

    pub fn set_progress(&mut self, progress: f64) {
        if progress.is_finite() {
            self.progress = progress.round().clamp(0.0, 100.0) as u8;
        }
    }

    /// Returns true only on the first call; the flag is never cleared.
    pub fn mark_result_fetched(&mut self) -> bool {
        !std::mem::replace(&mut self.result_fetched, true)
    }

    pub fn result_fetched(&self) -> bool {
        self.result_fetched
    }
}

/// What a finished job hands to the view
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobResult {
    /// Gallery fragment returned by `/regeneration_result/{id}`
    Html(String),
    Audio(Vec<AudioFile>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobOutcome {
    pub job_id: String,
    pub seed: Option<u32>,
    pub result: JobResult,
}

// ─── Errors ───────────────────────────────────────────────────────────────────

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("seed must be an integer in 0..=4294967295, got {0:?}")]
    InvalidSeed(String),

    #[error("no voice sample selected")]
    MissingVoiceSample,

    #[error("no text to synthesize")]
    MissingText,
}

impl ValidationError {
    pub fn notice(&self) -> Notice {
        match self {
            ValidationError::InvalidJson(_) => messages::invalid_json(),
            ValidationError::InvalidSeed(_) => messages::invalid_seed(),
            ValidationError::MissingVoiceSample => messages::missing_voice_sample(),
            ValidationError::MissingText => messages::missing_voice_text(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JobError {
    #[error("a {} job is already in progress", .0.label())]
    AlreadyInProgress(JobKind),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("failed to start job: {0}")]
    Submission(String),

    #[error("status polling failed: {0}")]
    Polling(String),

    #[error("job failed on the backend: {}", .0.as_deref().unwrap_or("no details"))]
    Backend(Option<String>),

    #[error("result unavailable after {attempts} attempts")]
    ResultUnavailable { attempts: u32 },

    #[error("job finished without audio files")]
    NoAudio,

    #[error("job cancelled")]
    Cancelled,
}

impl JobError {
    pub fn notice(&self, kind: JobKind) -> Notice {
        match self {
            JobError::AlreadyInProgress(kind) => messages::already_in_progress(*kind),
            JobError::Validation(e) => e.notice(),
            JobError::Submission(detail) => messages::submission_failed(kind, detail),
            JobError::Polling(detail) => messages::polling_failed(detail),
            JobError::Backend(detail) => messages::generation_failed(kind, detail.as_deref()),
            JobError::ResultUnavailable { .. } => messages::results_unavailable(),
            JobError::NoAudio => messages::no_audio_produced(),
            JobError::Cancelled => messages::generation_cancelled(),
        }
    }
}

// ─── Requests ─────────────────────────────────────────────────────────────────

/// Raw input of the "generate image" action
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImageJobRequest {
    pub json_text: String,
    /// Seed field contents; blank means a random seed
    pub seed_text: Option<String>,
    pub modified_text: Option<String>,
}

impl ImageJobRequest {
    pub fn new(json_text: impl Into<String>) -> Self {
        Self {
            json_text: json_text.into(),
            ..Default::default()
        }
    }

    pub fn with_seed(mut self, seed: impl Into<String>) -> Self {
        self.seed_text = Some(seed.into());
        self
    }

    pub fn with_modified_text(mut self, text: impl Into<String>) -> Self {
        self.modified_text = Some(text.into());
        self
    }

    pub fn validate(&self) -> Result<StartImageRequest, ValidationError> {
        let value: serde_json::Value = serde_json::from_str(&self.json_text)
            .map_err(|e| ValidationError::InvalidJson(e.to_string()))?;
        let seed = match self.seed_text.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(text) => Some(parse_seed(text)?),
        };
        Ok(StartImageRequest {
            json_data: value.to_string(),
            seed,
            modified_text: self
                .modified_text
                .clone()
                .filter(|t| !t.trim().is_empty()),
        })
    }
}

pub fn parse_seed(text: &str) -> Result<u32, ValidationError> {
    text.trim()
        .parse::<u32>()
        .map_err(|_| ValidationError::InvalidSeed(text.to_string()))
}

/// Raw input of the "generate voice" action
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VoiceJobRequest {
    pub text: String,
    pub settings: VoiceSettings,
}

impl VoiceJobRequest {
    pub fn validate(&self) -> Result<StartVoiceRequest, ValidationError> {
        let voice_sample = self
            .settings
            .sample
            .clone()
            .filter(|s| !s.trim().is_empty())
            .ok_or(ValidationError::MissingVoiceSample)?;
        if self.text.trim().is_empty() {
            return Err(ValidationError::MissingText);
        }
        let e = self.settings.emotions.clamped();
        Ok(StartVoiceRequest {
            text: self.text.clone(),
            voice_sample,
            emotion_description: self.settings.emotion_description.clone(),
            angry: e.angry,
            sad: e.sad,
            happy: e.happy,
            afraid: e.afraid,
            disgust: e.disgust,
            melancholic: e.melancholic,
            surprised: e.surprised,
            calm: e.calm,
        })
    }
}

// ─── Seams ────────────────────────────────────────────────────────────────────

/// The job endpoints, implemented over HTTP by [`crate::VPromptClient`]
pub trait Backend: Send + Sync {
    fn start_generation(
        &self,
        request: &StartImageRequest,
    ) -> impl Future<Output = Result<StartJobResponse, ClientError>> + Send;

    fn start_voice_generation(
        &self,
        request: &StartVoiceRequest,
    ) -> impl Future<Output = Result<StartJobResponse, ClientError>> + Send;

    fn job_status(
        &self,
        endpoint: StatusEndpoint,
        job_id: &str,
    ) -> impl Future<Output = Result<JobStatusResponse, ClientError>> + Send;

    /// Raw body of `/regeneration_result/{id}`; non-2xx is an error
    fn regeneration_result(
        &self,
        job_id: &str,
    ) -> impl Future<Output = Result<String, ClientError>> + Send;
}

/// The UI surface a job reports to
pub trait JobView: Send + Sync {
    /// Disable (busy) or re-enable the controls that start a job of `kind`
    fn set_busy(&self, kind: JobKind, busy: bool);

    fn show_progress(&self, kind: JobKind, progress: u8);

    fn show_seed(&self, _seed: u32) {}

    /// Replace any previous result of this kind with `result`
    fn apply_result(&self, kind: JobKind, result: &JobResult);

    fn notify(&self, notice: Notice);
}

// ─── UiLock ───────────────────────────────────────────────────────────────────

#[derive(Default)]
struct SlotState {
    in_progress: bool,
    token: Option<CancellationToken>,
}

/// Per-kind single-flight state
#[derive(Default)]
pub struct JobSlots {
    image: Mutex<SlotState>,
    voice: Mutex<SlotState>,
}

impl JobSlots {
    fn slot(&self, kind: JobKind) -> MutexGuard<'_, SlotState> {
        let slot = match kind {
            JobKind::Image => &self.image,
            JobKind::Voice => &self.voice,
        };
        slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_locked(&self, kind: JobKind) -> bool {
        self.slot(kind).in_progress
    }

    fn try_acquire<'a>(&'a self, kind: JobKind, view: &'a dyn JobView) -> Option<SlotGuard<'a>> {
        let token = {
            let mut slot = self.slot(kind);
            if slot.in_progress {
                return None;
            }
            let token = CancellationToken::new();
            slot.in_progress = true;
            slot.token = Some(token.clone());
            token
        };
        view.set_busy(kind, true);
        Some(SlotGuard {
            slots: self,
            kind,
            token,
            view,
        })
    }

    /// Cancel the running job of `kind`, if any
    pub fn cancel(&self, kind: JobKind) -> bool {
        match self.slot(kind).token.as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

/// Held for the lifetime of one job
pub struct SlotGuard<'a> {
    slots: &'a JobSlots,
    kind: JobKind,
    token: CancellationToken,
    view: &'a dyn JobView,
}

impl SlotGuard<'_> {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.token.cancel();
        {
            let mut slot = self.slots.slot(self.kind);
            slot.in_progress = false;
            slot.token = None;
        }
        log::debug!("Released {} job lock", self.kind.label());
        self.view.set_busy(self.kind, false);
    }
}

// ─── Controller ───────────────────────────────────────────────────────────────

/// Runs image and voice jobs against a [`Backend`], reporting to a [`JobView`]
pub struct JobController<B, V> {
    backend: B,
    view: V,
    slots: JobSlots,
    config: AppConfig,
}

impl<B: Backend, V: JobView> JobController<B, V> {
    pub fn new(backend: B, view: V, config: AppConfig) -> Self {
        Self {
            backend,
            view,
            slots: JobSlots::default(),
            config,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn is_in_progress(&self, kind: JobKind) -> bool {
        self.slots.is_locked(kind)
    }

    /// Cancel the running job of `kind`. Its in-flight request is dropped.
    pub fn cancel(&self, kind: JobKind) -> bool {
        let cancelled = self.slots.cancel(kind);
        if cancelled {
            log::info!("Cancelling {} job", kind.label());
        }
        cancelled
    }

    /// Regenerate images from prompt JSON
    pub async fn run_image(&self, request: ImageJobRequest) -> Result<JobOutcome, JobError> {
        let kind = JobKind::Image;
        let start = self.preflight(kind, || request.validate())?;
        let Some(guard) = self.slots.try_acquire(kind, &self.view) else {
            return Err(self.reject_in_progress(kind));
        };

        let result = self.drive_image(guard.token(), start).await;
        drop(guard);
        self.report(kind, &result);
        result
    }

    /// Synthesize speech for `request.text`
    pub async fn run_voice(&self, request: VoiceJobRequest) -> Result<JobOutcome, JobError> {
        let kind = JobKind::Voice;
        let start = self.preflight(kind, || request.validate())?;
        let Some(guard) = self.slots.try_acquire(kind, &self.view) else {
            return Err(self.reject_in_progress(kind));
        };

        let result = self.drive_voice(guard.token(), start).await;
        drop(guard);
        self.report(kind, &result);
        result
    }

    fn preflight<T>(
        &self,
        kind: JobKind,
        validate: impl FnOnce() -> Result<T, ValidationError>,
    ) -> Result<T, JobError> {
        if self.slots.is_locked(kind) {
            return Err(self.reject_in_progress(kind));
        }
        validate().map_err(|e| {
            log::warn!("Rejected {} job: {}", kind.label(), e);
            self.view.notify(e.notice());
            JobError::Validation(e)
        })
    }

    fn reject_in_progress(&self, kind: JobKind) -> JobError {
        log::info!("Ignoring {} job request: one is already running", kind.label());
        let err = JobError::AlreadyInProgress(kind);
        self.view.notify(err.notice(kind));
        err
    }

    /// Final notice, emitted after the lock has been released
    fn report(&self, kind: JobKind, result: &Result<JobOutcome, JobError>) {
        match result {
            Ok(outcome) => {
                log::info!("{} job {} completed", kind.label(), outcome.job_id);
                self.view.notify(messages::generation_succeeded(kind));
            }
            Err(e) => {
                log::error!("{} job failed: {}", kind.label(), e);
                self.view.notify(e.notice(kind));
            }
        }
    }

    async fn drive_image(
        &self,
        token: &CancellationToken,
        start: StartImageRequest,
    ) -> Result<JobOutcome, JobError> {
        let kind = JobKind::Image;
        let polling = self.config.polling(kind);

        log::debug!("Starting image job (seed: {:?})", start.seed);
        let response = cancellable(token, self.backend.start_generation(&start)).await?;
        let (job_id, seed) = accept_start(response)?;
        if let Some(seed) = seed {
            self.view.show_seed(seed);
        }

        let mut job = GenerationJob::new(job_id, kind);
        self.poll_until_done(token, &mut job, polling).await?;
        self.hold_progress(token, &job, polling).await?;

        let html = self.fetch_result_with_retry(token, &job, polling).await?;
        let result = JobResult::Html(html);
        if job.mark_result_fetched() {
            self.view.apply_result(kind, &result);
        }

        Ok(JobOutcome {
            job_id: job.job_id,
            seed,
            result,
        })
    }

    async fn drive_voice(
        &self,
        token: &CancellationToken,
        start: StartVoiceRequest,
    ) -> Result<JobOutcome, JobError> {
        let kind = JobKind::Voice;
        let polling = self.config.polling(kind);

        log::debug!("Starting voice job with sample {}", start.voice_sample);
        let response = cancellable(token, self.backend.start_voice_generation(&start)).await?;
        let (job_id, seed) = accept_start(response)?;

        let mut job = GenerationJob::new(job_id, kind);
        let done = self.poll_until_done(token, &mut job, polling).await?;
        self.hold_progress(token, &job, polling).await?;

        let files = done.audio_files.unwrap_or_default();
        if files.is_empty() {
            return Err(JobError::NoAudio);
        }
        let result = JobResult::Audio(files);
        if job.mark_result_fetched() {
            self.view.apply_result(kind, &result);
        }

        Ok(JobOutcome {
            job_id: job.job_id,
            seed,
            result,
        })
    }

    /// Poll until `done`. Ticks are sequential: the next one is not awaited
    /// until the current status request has completed.
    async fn poll_until_done(
        &self,
        token: &CancellationToken,
        job: &mut GenerationJob,
        polling: &PollingConfig,
    ) -> Result<JobStatusResponse, JobError> {
        let period = polling.poll_interval();
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        log::info!(
            "Polling {} job {} every {:?}",
            job.kind.label(),
            job.job_id,
            period
        );

        loop {
            cancellable(token, async {
                ticker.tick().await;
                Ok::<_, JobError>(())
            })
            .await?;

            let endpoint = self.config.status_endpoint;
            let response = match token
                .run_until_cancelled(self.backend.job_status(endpoint, &job.job_id))
                .await
            {
                None => return Err(JobError::Cancelled),
                Some(Ok(response)) => response,
                Some(Err(e)) => {
                    log::error!("Status check for job {} failed: {}", job.job_id, e);
                    return Err(JobError::Polling(e.summary()));
                }
            };

            if let Some(progress) = response.progress {
                job.set_progress(progress);
            }
            if let Some(error) = response.error.clone().filter(|e| !e.is_empty()) {
                job.status = JobStatus::Error;
                log::error!("Job {} reported error: {}", job.job_id, error);
                return Err(JobError::Backend(Some(error)));
            }

            job.status = JobStatus::parse(&response.status);
            match job.status {
                JobStatus::Done => {
                    log::info!("Job {} done", job.job_id);
                    return Ok(response);
                }
                JobStatus::Error => return Err(JobError::Backend(None)),
                JobStatus::Pending | JobStatus::InProgress => {
                    log::debug!("Job {} at {}%", job.job_id, job.progress);
                    self.view.show_progress(job.kind, job.progress);
                }
            }
        }
    }

    /// Keep the progress indicator up for the configured minimum time
    async fn hold_progress(
        &self,
        token: &CancellationToken,
        job: &GenerationJob,
        polling: &PollingConfig,
    ) -> Result<(), JobError> {
        let elapsed = job.started_at.elapsed();
        let min = polling.min_display_time();
        if elapsed < min {
            cancellable(token, async {
                tokio::time::sleep(min - elapsed).await;
                Ok::<_, JobError>(())
            })
            .await?;
        }
        Ok(())
    }

    /// Fetch the result, retrying `max_result_retries` times after the first
    /// attempt. Attempts never overlap.
    async fn fetch_result_with_retry(
        &self,
        token: &CancellationToken,
        job: &GenerationJob,
        polling: &PollingConfig,
    ) -> Result<String, JobError> {
        let attempts = polling.max_result_retries.saturating_add(1);

        for attempt in 1..=attempts {
            log::debug!(
                "Fetching result for job {} (attempt {}/{})",
                job.job_id,
                attempt,
                attempts
            );
            let failure = match token
                .run_until_cancelled(self.backend.regeneration_result(&job.job_id))
                .await
            {
                None => return Err(JobError::Cancelled),
                Some(Ok(body)) => match result_body_error(&body) {
                    None => return Ok(body),
                    Some(error) => error,
                },
                Some(Err(e)) => e.to_string(),
            };
            log::warn!(
                "Result fetch for job {} failed (attempt {}/{}): {}",
                job.job_id,
                attempt,
                attempts,
                failure
            );

            if attempt < attempts {
                cancellable(token, async {
                    tokio::time::sleep(polling.retry_delay()).await;
                    Ok::<_, JobError>(())
                })
                .await?;
            }
        }

        Err(JobError::ResultUnavailable { attempts })
    }
}

/// Race `fut` against cancellation, mapping client errors to submission errors
async fn cancellable<T, E>(
    token: &CancellationToken,
    fut: impl Future<Output = Result<T, E>>,
) -> Result<T, JobError>
where
    E: Into<JobError>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(JobError::Cancelled),
        result = fut => result.map_err(Into::into),
    }
}

impl From<ClientError> for JobError {
    fn from(e: ClientError) -> Self {
        JobError::Submission(e.summary())
    }
}

fn accept_start(response: StartJobResponse) -> Result<(String, Option<u32>), JobError> {
    if let Some(error) = response.error.filter(|e| !e.is_empty()) {
        return Err(JobError::Submission(error));
    }
    let job_id = response
        .job_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| JobError::Submission("response carried no job_id".to_string()))?;
    Ok((job_id, response.seed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{Language, NoticeLevel};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    // ─── Fakes ────────────────────────────────────────────────────────────────

    #[derive(Default)]
    struct ScriptedBackend {
        start: Mutex<Option<Result<StartJobResponse, ClientError>>>,
        statuses: Mutex<VecDeque<Result<JobStatusResponse, ClientError>>>,
        results: Mutex<VecDeque<Result<String, ClientError>>>,
        start_calls: AtomicUsize,
        status_calls: AtomicUsize,
        result_calls: AtomicUsize,
        last_image_request: Mutex<Option<StartImageRequest>>,
        last_status_path: Mutex<Option<String>>,
    }

    impl ScriptedBackend {
        fn started(job_id: &str) -> Self {
            let backend = Self::default();
            *backend.start.lock().unwrap() = Some(Ok(StartJobResponse {
                job_id: Some(job_id.to_string()),
                ..Default::default()
            }));
            backend
        }

        fn status(self, status: &str, progress: Option<f64>) -> Self {
            self.statuses.lock().unwrap().push_back(Ok(JobStatusResponse {
                status: status.to_string(),
                progress,
                ..Default::default()
            }));
            self
        }

        fn status_response(self, response: Result<JobStatusResponse, ClientError>) -> Self {
            self.statuses.lock().unwrap().push_back(response);
            self
        }

        fn result(self, result: Result<String, ClientError>) -> Self {
            self.results.lock().unwrap().push_back(result);
            self
        }

        fn start_calls(&self) -> usize {
            self.start_calls.load(Ordering::SeqCst)
        }

        fn status_calls(&self) -> usize {
            self.status_calls.load(Ordering::SeqCst)
        }

        fn result_calls(&self) -> usize {
            self.result_calls.load(Ordering::SeqCst)
        }

        fn take_start(&self) -> Result<StartJobResponse, ClientError> {
            self.start_calls.fetch_add(1, Ordering::SeqCst);
            self.start
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Err(ClientError::Backend("unscripted start".to_string())))
        }
    }

    fn http_error(code: u16) -> ClientError {
        ClientError::Status {
            url: "http://test".to_string(),
            code,
            body: String::new(),
        }
    }

    impl Backend for ScriptedBackend {
        async fn start_generation(
            &self,
            request: &StartImageRequest,
        ) -> Result<StartJobResponse, ClientError> {
            *self.last_image_request.lock().unwrap() = Some(request.clone());
            self.take_start()
        }

        async fn start_voice_generation(
            &self,
            _request: &StartVoiceRequest,
        ) -> Result<StartJobResponse, ClientError> {
            self.take_start()
        }

        async fn job_status(
            &self,
            endpoint: StatusEndpoint,
            job_id: &str,
        ) -> Result<JobStatusResponse, ClientError> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            *self.last_status_path.lock().unwrap() = Some(endpoint.path(job_id));
            // An exhausted script keeps the job running
            self.statuses.lock().unwrap().pop_front().unwrap_or_else(|| {
                Ok(JobStatusResponse {
                    status: "in-progress".to_string(),
                    ..Default::default()
                })
            })
        }

        async fn regeneration_result(&self, _job_id: &str) -> Result<String, ClientError> {
            self.result_calls.fetch_add(1, Ordering::SeqCst);
            self.results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(http_error(404)))
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Busy(JobKind, bool),
        Progress(JobKind, u8),
        Seed(u32),
        Applied(JobKind, JobResult),
        Notice(NoticeLevel, String),
    }

    #[derive(Default)]
    struct RecordingView {
        events: Mutex<Vec<Event>>,
    }

    impl RecordingView {
        fn events(&self) -> Vec<Event> {
            self.events.lock().unwrap().clone()
        }

        fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
            self.events().iter().filter(|e| pred(e)).count()
        }

        fn notices(&self) -> Vec<(NoticeLevel, String)> {
            self.events()
                .into_iter()
                .filter_map(|e| match e {
                    Event::Notice(level, text) => Some((level, text)),
                    _ => None,
                })
                .collect()
        }

        fn releases(&self, kind: JobKind) -> usize {
            self.count(|e| *e == Event::Busy(kind, false))
        }

        fn applied(&self) -> usize {
            self.count(|e| matches!(e, Event::Applied(..)))
        }
    }

    impl JobView for RecordingView {
        fn set_busy(&self, kind: JobKind, busy: bool) {
            self.events.lock().unwrap().push(Event::Busy(kind, busy));
        }

        fn show_progress(&self, kind: JobKind, progress: u8) {
            self.events.lock().unwrap().push(Event::Progress(kind, progress));
        }

        fn show_seed(&self, seed: u32) {
            self.events.lock().unwrap().push(Event::Seed(seed));
        }

        fn apply_result(&self, kind: JobKind, result: &JobResult) {
            self.events
                .lock()
                .unwrap()
                .push(Event::Applied(kind, result.clone()));
        }

        fn notify(&self, notice: Notice) {
            self.events.lock().unwrap().push(Event::Notice(
                notice.level,
                notice.text.get(Language::En).to_string(),
            ));
        }
    }

    fn controller(backend: ScriptedBackend) -> JobController<ScriptedBackend, RecordingView> {
        JobController::new(backend, RecordingView::default(), AppConfig::default())
    }

    fn assert_elapsed(started: Instant, expected_ms: u64) {
        let elapsed = started.elapsed();
        let expected = Duration::from_millis(expected_ms);
        assert!(
            elapsed >= expected && elapsed < expected + Duration::from_millis(50),
            "elapsed {:?}, expected {:?}",
            elapsed,
            expected
        );
    }

    const FRAGMENT: &str = "<div><h2 data-en=\"Generated Images\">Generated Images</h2></div>";

    // ─── Model ────────────────────────────────────────────────────────────────

    #[test]
    fn test_status_parse() {
        assert_eq!(JobStatus::parse("pending"), JobStatus::Pending);
        assert_eq!(JobStatus::parse("in-progress"), JobStatus::InProgress);
        assert_eq!(JobStatus::parse("in_progress"), JobStatus::InProgress);
        assert_eq!(JobStatus::parse("DONE"), JobStatus::Done);
        assert_eq!(JobStatus::parse("error"), JobStatus::Error);
        assert_eq!(JobStatus::parse("something-new"), JobStatus::InProgress);
        assert!(JobStatus::Done.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
    }

    #[test]
    fn test_result_fetched_is_sticky() {
        let mut job = GenerationJob::new("abc123", JobKind::Image);
        assert!(!job.result_fetched());
        assert!(job.mark_result_fetched());
        assert!(!job.mark_result_fetched());
        assert!(job.result_fetched());
    }

    #[test]
    fn test_progress_is_clamped() {
        let mut job = GenerationJob::new("abc123", JobKind::Image);
        job.set_progress(140.0);
        assert_eq!(job.progress, 100);
        job.set_progress(-3.0);
        assert_eq!(job.progress, 0);
        job.set_progress(f64::NAN);
        assert_eq!(job.progress, 0);
    }

    #[test]
    fn test_seed_bounds() {
        assert_eq!(parse_seed("4294967295"), Ok(u32::MAX));
        assert_eq!(parse_seed(" 0 "), Ok(0));
        assert!(parse_seed("4294967296").is_err());
        assert!(parse_seed("-1").is_err());
        assert!(parse_seed("12abc").is_err());
    }

    #[test]
    fn test_image_request_validation() {
        let start = ImageJobRequest::new("{ \"scene\": \"forest\" }")
            .with_seed("  ")
            .with_modified_text("")
            .validate()
            .unwrap();
        assert_eq!(start.json_data, r#"{"scene":"forest"}"#);
        assert_eq!(start.seed, None);
        assert_eq!(start.modified_text, None);

        assert!(matches!(
            ImageJobRequest::new("{ broken").validate(),
            Err(ValidationError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_voice_request_validation() {
        let mut request = VoiceJobRequest {
            text: "Once upon a time".to_string(),
            settings: VoiceSettings::default(),
        };
        assert_eq!(request.validate(), Err(ValidationError::MissingVoiceSample));

        request.settings.sample = Some("narrator.wav".to_string());
        request.settings.emotions.calm = 2.0;
        let start = request.validate().unwrap();
        assert_eq!(start.voice_sample, "narrator.wav");
        assert_eq!(start.calm, 1.0);

        request.text = "   ".to_string();
        assert_eq!(request.validate(), Err(ValidationError::MissingText));
    }

    // ─── Image flow ───────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn test_image_job_end_to_end() {
        let backend = ScriptedBackend::started("abc123")
            .status("in-progress", Some(40.0))
            .status("done", None)
            .result(Ok(FRAGMENT.to_string()));
        let controller = controller(backend);

        let outcome = controller
            .run_image(ImageJobRequest::new(r#"{"scene":"forest"}"#))
            .await
            .unwrap();

        assert_eq!(outcome.job_id, "abc123");
        assert_eq!(outcome.result, JobResult::Html(FRAGMENT.to_string()));
        assert!(!controller.is_in_progress(JobKind::Image));

        let view = controller.view();
        assert_eq!(
            view.events(),
            vec![
                Event::Busy(JobKind::Image, true),
                Event::Progress(JobKind::Image, 40),
                Event::Applied(JobKind::Image, JobResult::Html(FRAGMENT.to_string())),
                Event::Busy(JobKind::Image, false),
                Event::Notice(
                    NoticeLevel::Success,
                    "✅ Image regeneration completed successfully!".to_string()
                ),
            ]
        );
        assert_eq!(
            controller.backend().last_status_path.lock().unwrap().as_deref(),
            Some("/generation_status/abc123")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_waits_one_interval_per_tick() {
        let backend = ScriptedBackend::started("abc123")
            .status("in-progress", Some(10.0))
            .status("in-progress", Some(50.0))
            .status("done", None)
            .result(Ok(FRAGMENT.to_string()));
        let controller = controller(backend);

        let started = Instant::now();
        controller
            .run_image(ImageJobRequest::new("{}"))
            .await
            .unwrap();

        // Three 2s ticks; the 2s minimum display time has already elapsed
        assert_elapsed(started, 6000);
        assert_eq!(controller.backend().status_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_seed_is_forwarded_and_echoed() {
        let backend = ScriptedBackend::default()
            .status("done", None)
            .result(Ok(FRAGMENT.to_string()));
        *backend.start.lock().unwrap() = Some(Ok(StartJobResponse {
            job_id: Some("abc123".to_string()),
            seed: Some(u32::MAX),
            error: None,
        }));
        let controller = controller(backend);

        let outcome = controller
            .run_image(ImageJobRequest::new("{}").with_seed("4294967295"))
            .await
            .unwrap();

        assert_eq!(outcome.seed, Some(u32::MAX));
        let sent = controller.backend().last_image_request.lock().unwrap().clone();
        assert_eq!(sent.unwrap().seed, Some(u32::MAX));
        assert_eq!(controller.view().count(|e| *e == Event::Seed(u32::MAX)), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_out_of_range_seed_makes_no_call() {
        for seed in ["4294967296", "-1"] {
            let controller = controller(ScriptedBackend::started("abc123"));
            let err = controller
                .run_image(ImageJobRequest::new("{}").with_seed(seed))
                .await
                .unwrap_err();

            assert!(matches!(
                err,
                JobError::Validation(ValidationError::InvalidSeed(_))
            ));
            assert_eq!(controller.backend().start_calls(), 0);
            assert!(!controller.is_in_progress(JobKind::Image));
            let notices = controller.view().notices();
            assert_eq!(notices.len(), 1);
            assert_eq!(notices[0].0, NoticeLevel::Warning);
            // The lock was never taken, so the controls were never touched
            assert_eq!(controller.view().count(|e| matches!(e, Event::Busy(..))), 0);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_json_makes_no_call() {
        let controller = controller(ScriptedBackend::started("abc123"));
        let err = controller
            .run_image(ImageJobRequest::new("{\"scene\": "))
            .await
            .unwrap_err();

        assert!(matches!(err, JobError::Validation(_)));
        assert_eq!(controller.backend().start_calls(), 0);
        assert_eq!(
            controller.view().notices(),
            vec![(
                NoticeLevel::Error,
                "Invalid JSON format. Please check the syntax.".to_string()
            )]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_submission_is_rejected_while_running() {
        // No terminal status scripted: the first job polls until cancelled
        let controller = Arc::new(controller(ScriptedBackend::started("abc123")));

        let running = {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move { controller.run_image(ImageJobRequest::new("{}")).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(controller.is_in_progress(JobKind::Image));

        let err = controller
            .run_image(ImageJobRequest::new("{}"))
            .await
            .unwrap_err();
        assert_eq!(err, JobError::AlreadyInProgress(JobKind::Image));
        assert_eq!(controller.backend().start_calls(), 1);
        assert!(controller
            .view()
            .notices()
            .contains(&(NoticeLevel::Info, "Generation already in progress".to_string())));

        // Voice has its own lock
        assert!(!controller.is_in_progress(JobKind::Voice));

        assert!(controller.cancel(JobKind::Image));
        let first = running.await.unwrap();
        assert_eq!(first.unwrap_err(), JobError::Cancelled);
        assert!(!controller.is_in_progress(JobKind::Image));
        assert_eq!(controller.view().releases(JobKind::Image), 1);
        assert_eq!(controller.view().applied(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_submission_error_field_is_not_retried() {
        let backend = ScriptedBackend::default();
        *backend.start.lock().unwrap() = Some(Ok(StartJobResponse {
            error: Some("queue full".to_string()),
            ..Default::default()
        }));
        let controller = controller(backend);

        let err = controller
            .run_image(ImageJobRequest::new("{}"))
            .await
            .unwrap_err();

        assert_eq!(err, JobError::Submission("queue full".to_string()));
        assert_eq!(controller.backend().start_calls(), 1);
        assert_eq!(controller.backend().status_calls(), 0);
        assert_eq!(controller.view().releases(JobKind::Image), 1);
        assert!(!controller.is_in_progress(JobKind::Image));
    }

    #[tokio::test(start_paused = true)]
    async fn test_submission_http_error() {
        let backend = ScriptedBackend::default();
        *backend.start.lock().unwrap() = Some(Err(http_error(503)));
        let controller = controller(backend);

        let err = controller
            .run_image(ImageJobRequest::new("{}"))
            .await
            .unwrap_err();

        assert_eq!(err, JobError::Submission("HTTP 503".to_string()));
        assert_eq!(controller.view().releases(JobKind::Image), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backend_error_status_surfaces_text() {
        let backend = ScriptedBackend::started("abc123")
            .status("in-progress", Some(20.0))
            .status_response(Ok(JobStatusResponse {
                status: "error".to_string(),
                error: Some("CUDA out of memory".to_string()),
                ..Default::default()
            }));
        let controller = controller(backend);

        let err = controller
            .run_image(ImageJobRequest::new("{}"))
            .await
            .unwrap_err();

        assert_eq!(err, JobError::Backend(Some("CUDA out of memory".to_string())));
        assert_eq!(controller.backend().result_calls(), 0);
        assert_eq!(controller.view().releases(JobKind::Image), 1);
        assert_eq!(
            controller.view().notices(),
            vec![(
                NoticeLevel::Error,
                "Generation failed: CUDA out of memory".to_string()
            )]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_transport_failure_ends_polling() {
        let backend = ScriptedBackend::started("abc123")
            .status("in-progress", Some(20.0))
            .status_response(Err(http_error(502)))
            .status("done", None);
        let controller = controller(backend);

        let err = controller
            .run_image(ImageJobRequest::new("{}"))
            .await
            .unwrap_err();

        assert_eq!(err, JobError::Polling("HTTP 502".to_string()));
        assert_eq!(controller.backend().status_calls(), 2);
        assert_eq!(controller.view().releases(JobKind::Image), 1);
        assert_eq!(
            controller.view().notices(),
            vec![(
                NoticeLevel::Error,
                "Generation polling failed: HTTP 502".to_string()
            )]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_done_applies_once() {
        let backend = ScriptedBackend::started("abc123")
            .status("done", None)
            .status("done", None)
            .result(Ok(FRAGMENT.to_string()))
            .result(Ok(FRAGMENT.to_string()));
        let controller = controller(backend);

        controller
            .run_image(ImageJobRequest::new("{}"))
            .await
            .unwrap();

        assert_eq!(controller.backend().status_calls(), 1);
        assert_eq!(controller.backend().result_calls(), 1);
        assert_eq!(controller.view().applied(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_result_retry_then_success() {
        let backend = ScriptedBackend::started("abc123")
            .status("done", None)
            .result(Err(http_error(500)))
            .result(Ok(r#"{"error": "images not ready"}"#.to_string()))
            .result(Err(http_error(404)))
            .result(Ok(FRAGMENT.to_string()));
        let controller = controller(backend);

        let started = Instant::now();
        controller
            .run_image(ImageJobRequest::new("{}"))
            .await
            .unwrap();

        assert_eq!(controller.backend().result_calls(), 4);
        assert_eq!(controller.view().applied(), 1);
        assert_eq!(controller.view().releases(JobKind::Image), 1);
        // One 2s tick, then three 2s retry delays
        assert_elapsed(started, 8000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_result_retries_exhausted() {
        let controller = controller(ScriptedBackend::started("abc123").status("done", None));

        let err = controller
            .run_image(ImageJobRequest::new("{}"))
            .await
            .unwrap_err();

        assert_eq!(err, JobError::ResultUnavailable { attempts: 11 });
        assert_eq!(controller.backend().result_calls(), 11);
        assert_eq!(controller.view().applied(), 0);
        assert_eq!(controller.view().releases(JobKind::Image), 1);
        assert_eq!(
            controller.view().notices(),
            vec![(
                NoticeLevel::Error,
                "❌ Failed to load regenerated images after multiple attempts".to_string()
            )]
        );
    }

    #[tokio::test(start_paused = true)]
    #[allow(deprecated)]
    async fn test_legacy_status_endpoint() {
        let backend = ScriptedBackend::started("abc123")
            .status("done", None)
            .result(Ok(FRAGMENT.to_string()));
        let config = AppConfig {
            status_endpoint: StatusEndpoint::Legacy,
            ..AppConfig::default()
        };
        let controller = JobController::new(backend, RecordingView::default(), config);

        controller
            .run_image(ImageJobRequest::new("{}"))
            .await
            .unwrap();

        assert_eq!(
            controller.backend().last_status_path.lock().unwrap().as_deref(),
            Some("/job_status/abc123")
        );
    }

    // ─── Voice flow ───────────────────────────────────────────────────────────

    fn voice_request() -> VoiceJobRequest {
        VoiceJobRequest {
            text: "Once upon a time".to_string(),
            settings: VoiceSettings {
                sample: Some("narrator.wav".to_string()),
                ..Default::default()
            },
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_voice_job_applies_audio_files() {
        let files = vec![AudioFile {
            filename: "story_001.wav".to_string(),
            url: "/static/audio/story_001.wav".to_string(),
        }];
        let backend = ScriptedBackend::started("v-1")
            .status("in-progress", Some(30.0))
            .status_response(Ok(JobStatusResponse {
                status: "done".to_string(),
                audio_files: Some(files.clone()),
                ..Default::default()
            }));
        let controller = controller(backend);

        let started = Instant::now();
        let outcome = controller.run_voice(voice_request()).await.unwrap();

        assert_eq!(outcome.result, JobResult::Audio(files.clone()));
        assert_eq!(
            controller
                .view()
                .count(|e| *e == Event::Applied(JobKind::Voice, JobResult::Audio(files.clone()))),
            1
        );
        assert_eq!(controller.backend().result_calls(), 0);
        assert_eq!(controller.view().releases(JobKind::Voice), 1);
        // Voice polls every second
        assert_elapsed(started, 2000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_voice_done_without_audio_fails() {
        let controller = controller(ScriptedBackend::started("v-1").status("done", None));

        let err = controller.run_voice(voice_request()).await.unwrap_err();

        assert_eq!(err, JobError::NoAudio);
        assert_eq!(controller.view().applied(), 0);
        assert_eq!(controller.view().releases(JobKind::Voice), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_voice_without_sample_makes_no_call() {
        let controller = controller(ScriptedBackend::started("v-1"));
        let mut request = voice_request();
        request.settings.sample = None;

        let err = controller.run_voice(request).await.unwrap_err();

        assert_eq!(
            err,
            JobError::Validation(ValidationError::MissingVoiceSample)
        );
        assert_eq!(controller.backend().start_calls(), 0);
    }
}
