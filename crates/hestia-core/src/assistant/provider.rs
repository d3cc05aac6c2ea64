use std::time::Duration;

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};

use crate::model::Persona;

/// One call to the text-completion collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub persona: Persona,
    pub context_json: String,
    pub system_instruction: String,
    pub temperature: f64,
}

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> anyhow::Result<String>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeminiSettings {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    /// `None` waits for as long as the service takes.
    pub timeout: Option<Duration>,
}

pub struct GeminiProvider {
    client: reqwest::Client,
    settings: GeminiSettings,
}

impl GeminiProvider {
    pub fn new(settings: GeminiSettings) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = settings.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("failed to build HTTP client")?;
        Ok(Self { client, settings })
    }

    fn url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.settings.endpoint.trim_end_matches('/'),
            self.settings.model
        )
    }
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("endpoint", &self.settings.endpoint)
            .field("model", &self.settings.model)
            .field("api_key", &self.settings.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[async_trait]
impl CompletionProvider for GeminiProvider {
    #[instrument(skip(self, request), fields(model = %self.settings.model))]
    async fn complete(&self, request: &CompletionRequest) -> anyhow::Result<String> {
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("no API key configured for the assistant"))?;

        let body = json!({
            "systemInstruction": { "parts": [{ "text": request.system_instruction }] },
            "contents": [{ "role": "user", "parts": [{ "text": request.prompt }] }],
            "generationConfig": { "temperature": request.temperature },
        });

        let resp = self
            .client
            .post(self.url())
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .context("completion request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!("completion service returned {status}: {text}"));
        }

        let parsed: GenerateResponse = resp
            .json()
            .await
            .context("failed to parse completion response")?;
        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(anyhow!("completion response carried no text"));
        }
        debug!(chars = text.len(), "received completion");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn request() -> CompletionRequest {
        CompletionRequest {
            prompt: "¿Qué cocino hoy?".to_string(),
            persona: Persona::Student,
            context_json: "{}".to_string(),
            system_instruction: "Eres HESTIA".to_string(),
            temperature: 0.7,
        }
    }

    fn provider(endpoint: String, api_key: Option<&str>) -> GeminiProvider {
        GeminiProvider::new(GeminiSettings {
            endpoint,
            model: "gemini-3-flash-preview".to_string(),
            api_key: api_key.map(str::to_string),
            timeout: Some(Duration::from_secs(5)),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn posts_instruction_and_returns_first_candidate_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-3-flash-preview:generateContent"))
            .and(header("x-goog-api-key", "secret"))
            .and(body_partial_json(json!({
                "systemInstruction": { "parts": [{ "text": "Eres HESTIA" }] },
                "generationConfig": { "temperature": 0.7 },
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [
                    { "content": { "parts": [{ "text": "Arroz " }, { "text": "con huevo." }] } },
                    { "content": { "parts": [{ "text": "ignorado" }] } }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = provider(server.uri(), Some("secret"))
            .complete(&request())
            .await
            .unwrap();
        assert_eq!(reply, "Arroz con huevo.");
    }

    #[tokio::test]
    async fn server_errors_become_failures() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let err = provider(server.uri(), Some("secret"))
            .complete(&request())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn missing_key_fails_without_a_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        assert!(provider(server.uri(), None).complete(&request()).await.is_err());
    }
}
