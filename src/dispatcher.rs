// src/dispatcher.rs
//
// Takes each alert event through the rewrite call and fans the result out to
// the voice sink and the WebSocket subscribers. Sink failures are isolated:
// a failed voice call never blocks the broadcast, a failed rewrite drops
// only that event.

use crate::registry::SubscriberRegistry;
use crate::rewriter::MessageRewriter;
use crate::speech::VoiceSink;
use crate::types::{AlertEvent, AlertPayload};
use std::sync::Arc;
use tracing::{info, warn};

pub struct AlertDispatcher {
    rewriter: Box<dyn MessageRewriter>,
    voice: Option<Box<dyn VoiceSink>>,
    registry: Arc<SubscriberRegistry>,
}

impl AlertDispatcher {
    pub fn new(
        rewriter: Box<dyn MessageRewriter>,
        voice: Option<Box<dyn VoiceSink>>,
        registry: Arc<SubscriberRegistry>,
    ) -> Self {
        Self {
            rewriter,
            voice,
            registry,
        }
    }

    /// Called once per event, in list order. Holds the only reference to the
    /// chat session, so rewrite calls are serialized by construction.
    pub async fn dispatch(&mut self, event: &AlertEvent) {
        let final_text = match self.rewriter.rewrite(&event.message).await {
            Ok(text) => text,
            Err(e) => {
                // The cooldown slot stays consumed; no retry.
                warn!("Dropping alert ({} on the {}): {}", event.payload_type(), event.side, e);
                return;
            }
        };

        info!("Alert: {}", final_text);

        if let Some(voice) = &self.voice {
            if let Err(e) = voice.speak(&final_text).await {
                warn!("Voice delivery failed: {}", e);
            }
        }

        let payload = AlertPayload {
            kind: event.payload_type().to_string(),
            position: event.side.as_str().to_string(),
            timestamp: event.timestamp,
            message: final_text,
        };
        self.registry.broadcast(&payload);
    }
}
