//! Text-to-speech used as a melody guide for music generation.

use tracing::info;

use crate::models::{JobInput, SpeechInput};
use crate::orchestrator::{wait_for_completion, PollPolicy};
use crate::replicate::JobService;
use crate::{Error, Result};

/// Runs a speech job to completion and hands back the audio URL.
pub struct SpeechSynthesizer<S> {
    service: S,
    voice_id: String,
    poll: PollPolicy,
}

impl<S: JobService> SpeechSynthesizer<S> {
    pub fn new(service: S, voice_id: impl Into<String>, poll: PollPolicy) -> Self {
        Self {
            service,
            voice_id: voice_id.into(),
            poll,
        }
    }

    /// Synthesize `text`, returning the URL of the generated speech.
    pub async fn synthesize(&self, text: &str) -> Result<String> {
        info!(text_chars = text.chars().count(), voice = %self.voice_id, "Synthesizing speech");

        let input = JobInput::Speech(SpeechInput {
            text: text.to_string(),
            voice_id: self.voice_id.clone(),
        });

        let job = self.service.submit(&input).await?;
        let outcome = wait_for_completion(&self.service, job, &self.poll).await?;

        let url = outcome
            .output_url()
            .map(str::to_string)
            .ok_or_else(|| Error::Internal("Speech job finished without audio".to_string()))?;

        info!(job_id = %outcome.job_id, attempts = outcome.attempts, "Speech ready");
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Job, JobId, JobOutput, JobStatus};
    use crate::replicate::MockJobService;
    use std::time::Duration;

    fn job(status: JobStatus, output: Option<JobOutput>) -> Job {
        Job {
            id: JobId::parse("speech-1").unwrap(),
            status,
            output,
            error: None,
            created_at: None,
            completed_at: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_synthesize_waits_for_audio() {
        let mut service = MockJobService::new();
        service
            .expect_submit()
            .withf(|input| {
                matches!(input, JobInput::Speech(s) if s.text == "hush now" && s.voice_id == "male-qn-qingse")
            })
            .times(1)
            .returning(|_| Ok(job(JobStatus::Starting, None)));
        service.expect_fetch_status().times(1).returning(|_| {
            Ok(job(
                JobStatus::Succeeded,
                Some(JobOutput::Single("https://x/speech.mp3".to_string())),
            ))
        });

        let synthesizer = SpeechSynthesizer::new(
            service,
            "male-qn-qingse",
            PollPolicy {
                interval: Duration::from_secs(1),
                max_attempts: 5,
            },
        );

        let url = synthesizer.synthesize("hush now").await.unwrap();
        assert_eq!(url, "https://x/speech.mp3");
    }
}
