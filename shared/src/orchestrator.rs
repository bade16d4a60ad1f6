//! Generation orchestration: submit a music job and poll it until it settles.
//!
//! A request moves through `Idle → Submitting → Polling → Complete | Failed`.
//! Only non-terminal statuses and transient service errors are retried, and
//! both count against the same attempt bound. Giving up does not cancel the
//! remote job.

use std::fmt;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::ServiceError;
use crate::models::{
    GenerationRequest, Job, JobId, JobInput, JobOutput, JobStatus, MusicGenInput, OutputFormat,
};
use crate::prompt::{compose, DurationPolicy};
use crate::replicate::{JobService, ReplicateClient};
use crate::speech::SpeechSynthesizer;
use crate::{Error, Result};

/// How often and how long to poll a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Wait before each status fetch
    pub interval: Duration,
    /// Status fetches allowed before giving up
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_attempts: 180,
        }
    }
}

/// One status check inside a poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollAttempt {
    pub attempt_number: u32,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Submitting,
    Polling(PollAttempt),
    Complete,
    Failed,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Complete | Phase::Failed)
    }

    pub fn can_transition_to(&self, next: &Phase) -> bool {
        match (self, next) {
            (Phase::Idle, Phase::Submitting) => true,
            (Phase::Submitting, Phase::Polling(_) | Phase::Complete | Phase::Failed) => true,
            (Phase::Polling(_), Phase::Polling(_) | Phase::Complete | Phase::Failed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Idle => write!(f, "idle"),
            Phase::Submitting => write!(f, "submitting"),
            Phase::Polling(attempt) => write!(f, "polling (attempt {})", attempt.attempt_number),
            Phase::Complete => write!(f, "complete"),
            Phase::Failed => write!(f, "failed"),
        }
    }
}

/// Phase bookkeeping for one request.
#[derive(Debug)]
struct PhaseTracker {
    phase: Phase,
    history: Vec<Phase>,
}

impl PhaseTracker {
    fn new() -> Self {
        Self {
            phase: Phase::Idle,
            history: vec![Phase::Idle],
        }
    }

    /// Tracker for a job that was submitted elsewhere.
    fn polling() -> Self {
        let mut tracker = Self::new();
        tracker.advance(Phase::Submitting);
        tracker.advance(Phase::Polling(PollAttempt {
            attempt_number: 0,
            elapsed: Duration::ZERO,
        }));
        tracker
    }

    fn advance(&mut self, next: Phase) {
        if !self.phase.can_transition_to(&next) {
            warn!(from = %self.phase, to = %next, "Unexpected generation phase transition");
        }
        debug!(from = %self.phase, to = %next, "Generation phase");
        self.phase = next;
        self.history.push(next);
    }

    fn settle<T>(&mut self, result: Result<T>) -> Result<T> {
        self.advance(if result.is_ok() {
            Phase::Complete
        } else {
            Phase::Failed
        });
        result
    }
}

/// A job that finished successfully.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub job_id: JobId,
    pub output: JobOutput,
    /// Status fetches made after submission
    pub attempts: u32,
    pub elapsed: Duration,
}

impl Outcome {
    pub fn output_url(&self) -> Option<&str> {
        self.output.primary_url()
    }
}

/// Result of submitting without waiting.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// The job is still running; poll it by id.
    Pending(Job),
    /// The service finished the job during submission.
    Complete(Outcome),
}

/// Poll `job` until it reaches a terminal status or the bound runs out.
pub async fn wait_for_completion<S>(service: &S, job: Job, policy: &PollPolicy) -> Result<Outcome>
where
    S: JobService + ?Sized,
{
    let mut tracker = PhaseTracker::polling();
    let result = poll_until_settled(service, job, policy, &mut tracker).await;
    tracker.settle(result)
}

async fn poll_until_settled<S>(
    service: &S,
    job: Job,
    policy: &PollPolicy,
    tracker: &mut PhaseTracker,
) -> Result<Outcome>
where
    S: JobService + ?Sized,
{
    let started = Instant::now();
    let mut current = job;
    let mut attempts = 0u32;

    loop {
        if let Some(output) = terminal_output(&current)? {
            return Ok(Outcome {
                job_id: current.id,
                output,
                attempts,
                elapsed: started.elapsed(),
            });
        }

        if attempts >= policy.max_attempts {
            warn!(job_id = %current.id, attempts, "Giving up on job");
            return Err(Error::Timeout {
                job_id: current.id.to_string(),
                attempts,
                elapsed: started.elapsed(),
            });
        }

        sleep(policy.interval).await;
        attempts += 1;
        let attempt = PollAttempt {
            attempt_number: attempts,
            elapsed: started.elapsed(),
        };
        tracker.advance(Phase::Polling(attempt));

        match service.fetch_status(&current.id).await {
            Ok(job) => {
                debug!(
                    job_id = %job.id,
                    status = %job.status,
                    attempt = attempt.attempt_number,
                    elapsed_ms = attempt.elapsed.as_millis() as u64,
                    "Polled job"
                );
                current = job;
            }
            Err(Error::Service(e)) if e.is_transient() => {
                warn!(
                    job_id = %current.id,
                    attempt = attempt.attempt_number,
                    error = %e,
                    "Transient error while polling, retrying"
                );
            }
            Err(e) => return Err(e),
        }
    }
}

/// `Some(output)` for a succeeded job, `None` while still running.
fn terminal_output(job: &Job) -> Result<Option<JobOutput>> {
    match job.status {
        JobStatus::Starting | JobStatus::Processing => Ok(None),
        JobStatus::Succeeded => job.output.clone().map(Some).ok_or_else(|| {
            ServiceError::schema("fetch_status", format!("Job {} succeeded without output", job.id))
                .into()
        }),
        JobStatus::Failed => Err(Error::JobFailed {
            job_id: job.id.to_string(),
            status: job.status,
            message: job
                .error
                .clone()
                .unwrap_or_else(|| "Generation failed".to_string()),
        }),
        JobStatus::Canceled => Err(Error::JobFailed {
            job_id: job.id.to_string(),
            status: job.status,
            message: "Generation was canceled".to_string(),
        }),
    }
}

/// Payload settings that do not depend on the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GenerationSettings {
    pub duration_policy: DurationPolicy,
    pub output_format: OutputFormat,
}

/// Drives generation requests against a job service.
pub struct Orchestrator<S> {
    music: S,
    speech: Option<SpeechSynthesizer<S>>,
    settings: GenerationSettings,
    poll: PollPolicy,
}

impl Orchestrator<ReplicateClient> {
    /// Build the production orchestrator from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut orchestrator = Self::new(
            ReplicateClient::for_music(config)?,
            GenerationSettings {
                duration_policy: config.duration_policy,
                output_format: config.output_format,
            },
            config.poll,
        );

        if config.speech_guide_enabled && config.speech_token.is_some() {
            orchestrator = orchestrator.with_speech_guide(SpeechSynthesizer::new(
                ReplicateClient::for_speech(config)?,
                config.speech_voice_id.clone(),
                config.speech_poll,
            ));
        }

        Ok(orchestrator)
    }
}

impl<S: JobService> Orchestrator<S> {
    pub fn new(music: S, settings: GenerationSettings, poll: PollPolicy) -> Self {
        Self {
            music,
            speech: None,
            settings,
            poll,
        }
    }

    /// Condition generation on synthesized speech of the request text.
    pub fn with_speech_guide(mut self, speech: SpeechSynthesizer<S>) -> Self {
        self.speech = Some(speech);
        self
    }

    pub fn poll_policy(&self) -> &PollPolicy {
        &self.poll
    }

    /// Outbound payload for a request.
    pub fn music_input(&self, request: &GenerationRequest, input_audio: Option<String>) -> MusicGenInput {
        let mut input = MusicGenInput::new(
            compose(&request.text, request.mood),
            self.settings.duration_policy.duration_for(&request.text),
            self.settings.output_format,
        );
        input.input_audio = input_audio;
        input
    }

    /// Submit a request without waiting for the result.
    pub async fn start(&self, request: &GenerationRequest) -> Result<Submission> {
        let mut tracker = PhaseTracker::new();
        let result = self.submit(&mut tracker, request).await;

        match result {
            Ok(Submission::Pending(job)) => {
                tracker.advance(Phase::Polling(PollAttempt {
                    attempt_number: 0,
                    elapsed: Duration::ZERO,
                }));
                Ok(Submission::Pending(job))
            }
            other => tracker.settle(other),
        }
    }

    /// Wait for a previously submitted job.
    pub async fn wait(&self, job: Job) -> Result<Outcome> {
        wait_for_completion(&self.music, job, &self.poll).await
    }

    /// Submit a request and poll it to completion.
    pub async fn run(&self, request: &GenerationRequest) -> Result<Outcome> {
        let mut tracker = PhaseTracker::new();

        let result = match self.submit(&mut tracker, request).await {
            Ok(Submission::Complete(outcome)) => Ok(outcome),
            Ok(Submission::Pending(job)) => {
                tracker.advance(Phase::Polling(PollAttempt {
                    attempt_number: 0,
                    elapsed: Duration::ZERO,
                }));
                poll_until_settled(&self.music, job, &self.poll, &mut tracker).await
            }
            Err(e) => Err(e),
        };

        match &result {
            Ok(outcome) => info!(
                job_id = %outcome.job_id,
                attempts = outcome.attempts,
                elapsed_ms = outcome.elapsed.as_millis() as u64,
                "Generation complete"
            ),
            Err(e) => warn!(error = %e, "Generation failed"),
        }
        tracker.settle(result)
    }

    /// Current status of a job.
    pub async fn status(&self, id: &JobId) -> Result<Job> {
        self.music.fetch_status(id).await
    }

    async fn submit(
        &self,
        tracker: &mut PhaseTracker,
        request: &GenerationRequest,
    ) -> Result<Submission> {
        tracker.advance(Phase::Submitting);

        let input_audio = match &self.speech {
            Some(speech) => match speech.synthesize(&request.text).await {
                Ok(url) => Some(url),
                Err(e) => {
                    warn!(error = %e, "Speech guide unavailable, generating without it");
                    None
                }
            },
            None => None,
        };

        let input = self.music_input(request, input_audio);
        info!(
            mood = %request.mood,
            duration = input.duration,
            guided = input.input_audio.is_some(),
            "Submitting generation job"
        );

        let job = self.music.submit(&JobInput::Music(input)).await?;

        match terminal_output(&job)? {
            Some(output) => Ok(Submission::Complete(Outcome {
                job_id: job.id,
                output,
                attempts: 0,
                elapsed: Duration::ZERO,
            })),
            None => Ok(Submission::Pending(job)),
        }
    }
}
