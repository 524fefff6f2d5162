// src/error.rs
//
// Failure taxonomy for the alert pipeline. Only Acquisition is fatal to the
// frame loop; Rewrite and Delivery stay local to one event or one sink.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// Frame source exhausted or unavailable. Terminates the run.
    #[error("frame acquisition failed: {0}")]
    Acquisition(String),

    /// The external rewrite call failed. The event is dropped, the
    /// cooldown slot stays consumed.
    #[error("message rewrite failed: {0}")]
    Rewrite(String),

    /// A delivery sink (voice, subscriber send) failed. Other sinks are
    /// unaffected.
    #[error("alert delivery failed: {0}")]
    Delivery(String),
}
