//! Downstream generation call.
//!
//! The orchestrator only sees the [`Invoker`] trait: a call either yields
//! generated bytes or an [`ErrorSignal`] for the classifier. [`HttpInvoker`]
//! is the stock HTTP implementation: two image styles, a text style and a
//! speech style.

use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use reqwest::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::classifier::ErrorSignal;
use super::credential::Credential;
use super::http::{build_client, error_message_from_body};
use super::work::Generated;
use crate::error::Result;

/// Default endpoint for the `key_in_query` style.
pub const DEFAULT_PREDICT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default endpoint for the `bearer_json` style.
pub const DEFAULT_OPENAI_ENDPOINT: &str = "https://api.deepinfra.com/v1/openai";

/// Default endpoint for the `elevenlabs` style.
pub const DEFAULT_ELEVENLABS_ENDPOINT: &str = "https://api.elevenlabs.io/v1";

const DEFAULT_MEDIA_TYPE: &str = "image/png";
const TEXT_MEDIA_TYPE: &str = "text/plain";
const AUDIO_MEDIA_TYPE: &str = "audio/mpeg";

/// Generated text of this many characters or fewer counts as no answer.
pub const MIN_TEXT_LEN: usize = 10;

/// Header carrying the ElevenLabs credential.
const XI_API_KEY: &str = "xi-api-key";

/// Performs one generation call with one credential against one target.
#[async_trait]
pub trait Invoker: Send + Sync {
    async fn invoke(
        &self,
        credential: &Credential,
        target: &str,
        payload: &str,
    ) -> std::result::Result<Generated, ErrorSignal>;
}

// =============================================================================
// Request Style
// =============================================================================

/// Wire shape of the HTTP request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStyle {
    /// `POST {endpoint}/models/{target}:predict?key=..` with an
    /// `instances`/`parameters` body; image under
    /// `predictions[0].bytesBase64Encoded`.
    #[default]
    KeyInQuery,
    /// OpenAI-compatible `POST {endpoint}/images/generations` with a bearer
    /// token; image under `data[0].b64_json`.
    BearerJson,
    /// `POST {endpoint}/models/{target}:generateContent?key=..`; text under
    /// `candidates[0].content.parts[0].text`.
    GenerateContent,
    /// `POST {endpoint}/text-to-speech/{target}` with an `xi-api-key` header;
    /// the target is the voice id and the body is raw audio.
    #[serde(rename = "elevenlabs")]
    ElevenLabs,
}

impl RequestStyle {
    #[must_use]
    pub fn from_arg(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "key_in_query" | "predict" => Some(Self::KeyInQuery),
            "bearer_json" | "openai" => Some(Self::BearerJson),
            "generate_content" | "text" => Some(Self::GenerateContent),
            "elevenlabs" | "eleven_labs" | "speech" => Some(Self::ElevenLabs),
            _ => None,
        }
    }

    #[must_use]
    pub const fn default_endpoint(self) -> &'static str {
        match self {
            Self::KeyInQuery | Self::GenerateContent => DEFAULT_PREDICT_ENDPOINT,
            Self::BearerJson => DEFAULT_OPENAI_ENDPOINT,
            Self::ElevenLabs => DEFAULT_ELEVENLABS_ENDPOINT,
        }
    }

    fn default_parameters(self) -> Map<String, Value> {
        let value = match self {
            Self::KeyInQuery => json!({"sampleCount": 1, "aspectRatio": "16:9"}),
            Self::BearerJson => json!({"n": 1, "size": "1024x576"}),
            Self::GenerateContent => json!({}),
            Self::ElevenLabs => json!({
                "model_id": "eleven_multilingual_v2",
                "voice_settings": {"stability": 0.5, "similarity_boost": 0.75}
            }),
        };
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }
}

// =============================================================================
// HTTP Invoker
// =============================================================================

/// HTTP implementation of [`Invoker`].
#[derive(Debug, Clone)]
pub struct HttpInvoker {
    client: Client,
    endpoint: String,
    style: RequestStyle,
    parameters: Map<String, Value>,
}

impl HttpInvoker {
    /// Build an invoker. `parameters` are merged over the style's defaults.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built.
    pub fn new(
        style: RequestStyle,
        endpoint: Option<&str>,
        parameters: Map<String, Value>,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self::with_client(
            build_client(timeout)?,
            style,
            endpoint,
            parameters,
        ))
    }

    #[must_use]
    pub fn with_client(
        client: Client,
        style: RequestStyle,
        endpoint: Option<&str>,
        parameters: Map<String, Value>,
    ) -> Self {
        let mut merged = style.default_parameters();
        merged.extend(parameters);
        Self {
            client,
            endpoint: endpoint
                .unwrap_or_else(|| style.default_endpoint())
                .trim_end_matches('/')
                .to_string(),
            style,
            parameters: merged,
        }
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    #[must_use]
    pub const fn style(&self) -> RequestStyle {
        self.style
    }

    fn build_request(
        &self,
        credential: &Credential,
        target: &str,
        payload: &str,
    ) -> reqwest::RequestBuilder {
        match self.style {
            RequestStyle::KeyInQuery => {
                let url = format!(
                    "{}/models/{target}:predict?key={}",
                    self.endpoint,
                    credential.expose()
                );
                let body = json!({
                    "instances": [{"prompt": payload}],
                    "parameters": Value::Object(self.parameters.clone()),
                });
                self.client
                    .post(url)
                    .header(CONTENT_TYPE, "application/json")
                    .json(&body)
            }
            RequestStyle::BearerJson => {
                let url = format!("{}/images/generations", self.endpoint);
                let mut body = self.parameters.clone();
                body.insert("model".to_string(), Value::String(target.to_string()));
                body.insert("prompt".to_string(), Value::String(payload.to_string()));
                body.insert(
                    "response_format".to_string(),
                    Value::String("b64_json".to_string()),
                );
                self.client
                    .post(url)
                    .header(AUTHORIZATION, format!("Bearer {}", credential.expose()))
                    .header(CONTENT_TYPE, "application/json")
                    .json(&Value::Object(body))
            }
            RequestStyle::GenerateContent => {
                let url = format!(
                    "{}/models/{target}:generateContent?key={}",
                    self.endpoint,
                    credential.expose()
                );
                let mut body = json!({"contents": [{"parts": [{"text": payload}]}]});
                if !self.parameters.is_empty() {
                    body["generationConfig"] = Value::Object(self.parameters.clone());
                }
                self.client
                    .post(url)
                    .header(CONTENT_TYPE, "application/json")
                    .json(&body)
            }
            RequestStyle::ElevenLabs => {
                let url = format!("{}/text-to-speech/{target}", self.endpoint);
                let mut body = self.parameters.clone();
                body.insert("text".to_string(), Value::String(payload.to_string()));
                self.client
                    .post(url)
                    .header(XI_API_KEY, credential.expose())
                    .header(ACCEPT, AUDIO_MEDIA_TYPE)
                    .header(CONTENT_TYPE, "application/json")
                    .json(&Value::Object(body))
            }
        }
    }

    fn extract_text(body: &Value) -> std::result::Result<Generated, ErrorSignal> {
        let text = body
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(Value::as_str)
            .map(str::trim)
            .ok_or_else(|| ErrorSignal::transport("response contained no text"))?;
        if text.chars().count() <= MIN_TEXT_LEN {
            return Err(ErrorSignal::transport(format!(
                "response text too short ({} chars)",
                text.chars().count()
            )));
        }
        Ok(Generated::new(text.as_bytes(), TEXT_MEDIA_TYPE))
    }

    fn extract(&self, body: &Value) -> std::result::Result<Generated, ErrorSignal> {
        let (b64, media_type) = match self.style {
            RequestStyle::KeyInQuery => (
                body.pointer("/predictions/0/bytesBase64Encoded"),
                body.pointer("/predictions/0/mimeType").and_then(Value::as_str),
            ),
            RequestStyle::BearerJson => (body.pointer("/data/0/b64_json"), None),
            RequestStyle::GenerateContent => return Self::extract_text(body),
            RequestStyle::ElevenLabs => {
                return Err(ErrorSignal::transport("audio responses are not JSON"));
            }
        };

        let b64 = b64
            .and_then(Value::as_str)
            .ok_or_else(|| ErrorSignal::transport("response contained no image data"))?;
        let bytes = BASE64
            .decode(b64)
            .map_err(|e| ErrorSignal::transport(format!("invalid base64 image data: {e}")))?;

        Ok(Generated::new(
            bytes,
            media_type.unwrap_or(DEFAULT_MEDIA_TYPE),
        ))
    }
}

#[async_trait]
impl Invoker for HttpInvoker {
    async fn invoke(
        &self,
        credential: &Credential,
        target: &str,
        payload: &str,
    ) -> std::result::Result<Generated, ErrorSignal> {
        let response = self
            .build_request(credential, target, payload)
            .send()
            .await
            .map_err(|e| {
                // The query string may carry the credential.
                let e = e.without_url();
                if e.is_timeout() {
                    ErrorSignal::transport("request timed out")
                } else {
                    ErrorSignal::transport(format!("request failed: {e}"))
                }
            })?;

        let status = response.status();
        if status.is_success() && self.style == RequestStyle::ElevenLabs {
            let media_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or(AUDIO_MEDIA_TYPE)
                .to_string();
            let bytes = response
                .bytes()
                .await
                .map_err(|e| ErrorSignal::transport(format!("failed to read response: {e}")))?;
            if bytes.is_empty() {
                return Err(ErrorSignal::transport("response contained no audio"));
            }
            return Ok(Generated::new(bytes.to_vec(), media_type));
        }

        let text = response
            .text()
            .await
            .map_err(|e| ErrorSignal::transport(format!("failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(ErrorSignal::new(
                status.as_u16(),
                error_message_from_body(&text),
            ));
        }

        let body: Value = serde_json::from_str(&text)
            .map_err(|e| ErrorSignal::transport(format!("invalid JSON response: {e}")))?;
        self.extract(&body)
    }
}
