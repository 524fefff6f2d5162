// src/speech.rs
//
// Voice delivery sink. On Linux this shells out to espeak-ng; speaking is
// awaited per call, so with the dispatcher running on the frame-loop task
// speech directly gates frame cadence.

use crate::error::PipelineError;
use async_trait::async_trait;
use tokio::process::Command;
use tracing::info;

#[async_trait]
pub trait VoiceSink: Send + Sync {
    async fn speak(&self, text: &str) -> Result<(), PipelineError>;
}

pub struct EspeakVoice {
    /// Speaking rate in words per minute.
    rate_wpm: u32,
}

impl EspeakVoice {
    pub fn new(rate_wpm: u32) -> Self {
        info!("Voice output ready (espeak-ng, {} wpm)", rate_wpm);
        Self { rate_wpm }
    }
}

#[async_trait]
impl VoiceSink for EspeakVoice {
    async fn speak(&self, text: &str) -> Result<(), PipelineError> {
        let status = Command::new("espeak-ng")
            .arg("-s")
            .arg(self.rate_wpm.to_string())
            .arg(text)
            .status()
            .await
            .map_err(|e| PipelineError::Delivery(format!("espeak-ng failed to start: {}", e)))?;

        if !status.success() {
            return Err(PipelineError::Delivery(format!(
                "espeak-ng exited with {}",
                status
            )));
        }

        Ok(())
    }
}
