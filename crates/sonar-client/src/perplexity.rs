use serde::{Deserialize, Serialize};
use sonar_core::{Answer, Error, ResearchBackend, Result, SearchRequest};
use std::time::Instant;

// Docs: https://docs.perplexity.ai/api-reference/chat-completions-post
pub const DEFAULT_ENDPOINT: &str = "https://api.perplexity.ai/chat/completions";

const SYSTEM_PROMPT: &str = "Be precise and concise.";
const TOP_P: f64 = 0.9;
const QUERY_PREVIEW_CHARS: usize = 50;

#[derive(Debug, Clone)]
pub struct PerplexityClient {
    client: reqwest::Client,
    api_key: String,
    endpoint: url::Url,
}

impl PerplexityClient {
    pub fn new(client: reqwest::Client, api_key: String, endpoint: &str) -> Result<Self> {
        let endpoint = url::Url::parse(endpoint)
            .map_err(|e| Error::Config(format!("invalid Perplexity endpoint {endpoint:?}: {e}")))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "Perplexity endpoint must be http(s), got {}",
                endpoint.scheme()
            )));
        }
        Ok(Self {
            client,
            api_key,
            endpoint,
        })
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }

    /// Send one chat-completions request and normalize the reply.
    pub async fn invoke(
        &self,
        query: &str,
        model: &str,
        max_tokens: u32,
        temperature: f64,
    ) -> Result<Answer> {
        if self.api_key.trim().is_empty() {
            let e = Error::Config("PERPLEXITY_API_KEY is not set".to_string());
            tracing::warn!(model, kind = e.kind().as_str(), error = %e, "perplexity request skipped");
            return Err(e);
        }

        tracing::info!(model, query = %preview(query), "perplexity request");
        let t0 = Instant::now();
        let req = ChatCompletionsRequest {
            model: model.to_string(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: query.to_string(),
                },
            ],
            max_tokens,
            temperature,
            top_p: TOP_P,
            return_citations: true,
        };

        let out = self.send(&req).await;
        let elapsed_ms = t0.elapsed().as_millis() as u64;
        match &out {
            Ok(a) => tracing::info!(
                model,
                total_tokens = a.total_tokens,
                citations = a.citations.len(),
                elapsed_ms,
                "perplexity response"
            ),
            Err(e) => tracing::warn!(
                model,
                kind = e.kind().as_str(),
                error = %e,
                elapsed_ms,
                "perplexity request failed"
            ),
        }
        out
    }

    async fn send(&self, req: &ChatCompletionsRequest) -> Result<Answer> {
        let resp = self
            .client
            .post(self.endpoint.clone())
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {}", self.api_key),
            )
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .json(req)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Http {
                status: status.as_u16(),
                body: error_body(resp.text().await),
            });
        }

        let body = resp
            .text()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;
        parse_response(&body)
    }
}

#[async_trait::async_trait]
impl ResearchBackend for PerplexityClient {
    fn name(&self) -> &'static str {
        "perplexity"
    }

    async fn complete(&self, req: &SearchRequest) -> Result<Answer> {
        self.invoke(
            req.query(),
            req.kind().model(),
            req.max_tokens(),
            req.temperature(),
        )
        .await
    }
}

fn parse_response(body: &str) -> Result<Answer> {
    let parsed: ChatCompletionsResponse =
        serde_json::from_str(body).map_err(|e| Error::Parse(e.to_string()))?;
    let first = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| Error::Parse("no choices in response".to_string()))?;
    Ok(Answer {
        text: first.message.content,
        citations: parsed.citations.unwrap_or_default(),
        total_tokens: parsed.usage.and_then(|u| u.total_tokens).unwrap_or(0),
    })
}

/// Body of a non-2xx reply; a failed read still leaves a reason in the error text.
fn error_body<E: std::fmt::Display>(read: std::result::Result<String, E>) -> String {
    read.unwrap_or_else(|e| {
        tracing::debug!(error = %e, "failed to read error response body");
        format!("<body unavailable: {e}>")
    })
}

/// First 50 chars of the query, with `...` when cut.
fn preview(query: &str) -> String {
    let mut it = query.chars();
    let head: String = it.by_ref().take(QUERY_PREVIEW_CHARS).collect();
    if it.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatCompletionsRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
    temperature: f64,
    top_p: f64,
    return_citations: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionsResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    citations: Option<Vec<String>>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct Usage {
    #[serde(default)]
    total_tokens: Option<u64>,
}
