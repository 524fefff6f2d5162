// src/rewriter.rs
//
// Conversational rewrite of templated alert strings. The Gemini client keeps
// a running chat history seeded with the BeetleGuard.ai priming turn, so
// later rewrites stay consistent with earlier ones. History grows for the
// process lifetime; there is no truncation (known operational limit).

use crate::error::PipelineError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

const SYSTEM_PRIMING: &str = "You are BeetleGuard.ai, a conversational AI for drivers, \
providing rephrased and helpful responses.";

#[async_trait]
pub trait MessageRewriter: Send {
    async fn rewrite(&mut self, text: &str) -> Result<String, PipelineError>;
}

// ── Wire types (Gemini generateContent JSON) ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: u32,
    max_output_tokens: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: &'a [Content],
    generation_config: GenerationConfig,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

// ── Client ──

pub struct GeminiRewriter {
    http_client: reqwest::Client,
    model: String,
    api_key: String,
    history: Vec<Content>,
}

impl GeminiRewriter {
    pub fn new(model: &str, api_key: &str, timeout_secs: u64) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to build HTTP client");

        info!("Gemini rewriter ready (model: {})", model);

        Self {
            http_client,
            model: model.to_string(),
            api_key: api_key.to_string(),
            history: vec![user_turn(SYSTEM_PRIMING)],
        }
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}

#[async_trait]
impl MessageRewriter for GeminiRewriter {
    async fn rewrite(&mut self, text: &str) -> Result<String, PipelineError> {
        self.history.push(user_turn(text));

        let request = GenerateContentRequest {
            contents: &self.history,
            generation_config: GenerationConfig {
                temperature: 1.0,
                top_p: 0.95,
                top_k: 40,
                max_output_tokens: 8192,
            },
        };

        let url = format!(
            "{}/{}:generateContent?key={}",
            GEMINI_BASE_URL, self.model, self.api_key
        );

        let result = send_request(&self.http_client, &url, &request).await;

        match result {
            Ok(reply) => {
                debug!("Rewrite: {:?} -> {:?}", text, reply);
                self.history.push(Content {
                    role: "model".to_string(),
                    parts: vec![Part {
                        text: reply.clone(),
                    }],
                });
                Ok(reply)
            }
            Err(e) => {
                // Keep the history consistent: the failed turn never happened.
                self.history.pop();
                Err(e)
            }
        }
    }
}

async fn send_request(
    client: &reqwest::Client,
    url: &str,
    request: &GenerateContentRequest<'_>,
) -> Result<String, PipelineError> {
    let resp = client
        .post(url)
        .json(request)
        .send()
        .await
        .map_err(|e| PipelineError::Rewrite(format!("connection error: {}", e)))?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(PipelineError::Rewrite(format!("HTTP {}: {}", status, body)));
    }

    let parsed: GenerateContentResponse = resp
        .json()
        .await
        .map_err(|e| PipelineError::Rewrite(format!("parse error: {}", e)))?;

    parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content.parts.into_iter().next())
        .map(|p| p.text)
        .ok_or_else(|| PipelineError::Rewrite("empty response".to_string()))
}

fn user_turn(text: &str) -> Content {
    Content {
        role: "user".to_string(),
        parts: vec![Part {
            text: text.to_string(),
        }],
    }
}
