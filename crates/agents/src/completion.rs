use std::env;
use std::time::Duration;

use anyhow::Context;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/";
const DEFAULT_CONNECT_TIMEOUT_SECONDS: u64 = 6;
const DEFAULT_TIMEOUT_SECONDS: u64 = 20;

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("text completion is not configured")]
    NotConfigured,
    #[error("completion request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("completion service answered {status}: {body}")]
    Status { status: u16, body: String },
    #[error("completion service returned no text")]
    EmptyOutput,
}

/// A remote text-completion service: one prompt in, one free-form answer out.
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError>;
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub endpoint: Url,
    pub connect_timeout: Duration,
    pub timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> anyhow::Result<Self> {
        Ok(Self {
            api_key: api_key.into(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            endpoint: Url::parse(DEFAULT_GEMINI_ENDPOINT).context("invalid default Gemini endpoint")?,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECONDS),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
        })
    }

    /// `None` when no API key is set; the planner then runs on fallbacks only.
    pub fn from_env() -> anyhow::Result<Option<Self>> {
        let Some(api_key) = env::var("CAMROUTE_GEMINI_API_KEY")
            .ok()
            .filter(|value| !value.trim().is_empty())
        else {
            return Ok(None);
        };

        let mut config = Self::new(api_key.trim())?;
        if let Ok(model) = env::var("CAMROUTE_GEMINI_MODEL") {
            if !model.trim().is_empty() {
                config.model = model.trim().to_string();
            }
        }
        if let Ok(endpoint) = env::var("CAMROUTE_GEMINI_ENDPOINT") {
            config.endpoint = Url::parse(endpoint.trim())
                .with_context(|| format!("invalid CAMROUTE_GEMINI_ENDPOINT {}", endpoint))?;
        }
        if let Some(seconds) = env::var("CAMROUTE_HTTP_TIMEOUT_SECONDS")
            .ok()
            .and_then(|value| value.trim().parse::<u64>().ok())
        {
            config.timeout = Duration::from_secs(seconds.clamp(1, 300));
        }

        Ok(Some(config))
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: [RequestContent<'a>; 1],
}

#[derive(Serialize)]
struct RequestContent<'a> {
    parts: [RequestPart<'a>; 1],
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

fn candidate_text(response: GenerateResponse) -> Option<String> {
    let content = response.candidates.into_iter().next()?.content?;
    let text: String = content
        .parts
        .into_iter()
        .filter_map(|part| part.text)
        .collect();
    (!text.trim().is_empty()).then_some(text)
}

/// Gemini `generateContent` adapter.
#[derive(Clone)]
pub struct GeminiClient {
    http: Client,
    api_key: String,
    url: Url,
    model: String,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> anyhow::Result<Self> {
        let http = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.timeout)
            .build()
            .context("failed to build HTTP client")?;
        let url = config
            .endpoint
            .join(&format!("models/{}:generateContent", config.model))
            .with_context(|| format!("invalid Gemini model name {}", config.model))?;

        Ok(Self {
            http,
            api_key: config.api_key,
            url,
            model: config.model,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl CompletionClient for GeminiClient {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let payload = GenerateRequest {
            contents: [RequestContent {
                parts: [RequestPart { text: prompt }],
            }],
        };

        let response = self
            .http
            .post(self.url.clone())
            .header("x-goog-api-key", self.api_key.as_str())
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: GenerateResponse = response.json().await?;
        candidate_text(body).ok_or(CompletionError::EmptyOutput)
    }
}

/// The completion backend chosen at startup.
#[derive(Clone)]
pub enum CompletionBackend {
    Gemini(GeminiClient),
    /// No credentials: every call fails and callers use their fallbacks.
    Disabled,
}

impl CompletionBackend {
    pub fn from_config(config: Option<GeminiConfig>) -> anyhow::Result<Self> {
        match config {
            Some(config) => Ok(Self::Gemini(GeminiClient::new(config)?)),
            None => Ok(Self::Disabled),
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Gemini(_))
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Gemini(client) => format!("gemini:{}", client.model()),
            Self::Disabled => "disabled".to_string(),
        }
    }
}

impl CompletionClient for CompletionBackend {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        match self {
            Self::Gemini(client) => client.complete(prompt).await,
            Self::Disabled => Err(CompletionError::NotConfigured),
        }
    }
}
