//! Vision-LLM text recognition over the Anthropic Messages API.
//!
//! One non-streaming request per snip: the cropped PNG goes up as a base64
//! image block, the transcription comes back as text blocks.

use super::OcrError;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

pub const DEFAULT_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
pub const DEFAULT_MODEL: &str = "claude-haiku-4-5";
pub const MAX_TOKENS: u32 = 2048;

const OCR_PROMPT: &str = "Transcribe all text visible in this image exactly as written. \
Preserve line breaks. Reply with the transcription only, without commentary or formatting.";

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: [RequestMessage<'a>; 1],
}

#[derive(Serialize)]
struct RequestMessage<'a> {
    role: &'static str,
    content: [RequestBlock<'a>; 2],
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum RequestBlock<'a> {
    Image { source: ImageSource },
    Text { text: &'a str },
}

#[derive(Serialize)]
struct ImageSource {
    #[serde(rename = "type")]
    kind: &'static str,
    media_type: &'static str,
    data: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ResponseBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}

pub struct VisionOcr {
    client: reqwest::Client,
    api_key: Option<String>,
    model: String,
    endpoint: String,
}

impl VisionOcr {
    /// Builds a client whose every request is bounded by `timeout`.
    pub fn new(
        api_key: Option<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, OcrError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OcrError::Request(format!("HTTP client setup failed: {e}")))?;
        Ok(Self {
            client,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            model: model.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
        })
    }

    /// Points the client at a different Messages-compatible endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Recognizes the text in a PNG image.
    pub async fn recognize_png(&self, png_bytes: &[u8]) -> Result<String, OcrError> {
        let api_key = self.api_key.as_deref().ok_or(OcrError::MissingApiKey)?;

        let start = Instant::now();
        log::info!(
            "[OCR] Sending {} byte crop to {} ({})",
            png_bytes.len(),
            self.model,
            self.endpoint
        );

        let body = MessagesRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            messages: [RequestMessage {
                role: "user",
                content: [
                    RequestBlock::Image {
                        source: ImageSource {
                            kind: "base64",
                            media_type: "image/png",
                            data: STANDARD.encode(png_bytes),
                        },
                    },
                    RequestBlock::Text { text: OCR_PROMPT },
                ],
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await
            .map_err(|e| OcrError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::error!("[OCR] API returned {}: {}", status, body);
            return Err(OcrError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let reply: MessagesResponse = response
            .json()
            .await
            .map_err(|e| OcrError::Request(e.to_string()))?;

        let text = clean_transcription(&extract_text(&reply));
        log::info!(
            "[OCR] Recognized {} chars in {}ms",
            text.chars().count(),
            start.elapsed().as_millis()
        );
        Ok(text)
    }
}

/// Concatenates every `text` content block of a Messages API response.
fn extract_text(reply: &MessagesResponse) -> String {
    reply
        .content
        .iter()
        .filter_map(|block| match block {
            ResponseBlock::Text { text } => Some(text.as_str()),
            ResponseBlock::Other => None,
        })
        .collect()
}

/// Strips markdown code fences and surrounding whitespace from a reply.
///
/// Models sometimes wrap the transcription in ``` despite being told not to.
pub fn clean_transcription(text: &str) -> String {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }

    let after_open = match trimmed.find('\n') {
        Some(pos) => &trimmed[pos + 1..],
        None => trimmed.trim_start_matches('`'),
    };
    let stripped = after_open.trim_end();
    match stripped.strip_suffix("```") {
        Some(body) => body.trim().to_string(),
        None => stripped.trim().to_string(),
    }
}
