use serde::{Deserialize, Serialize};

/// Failure of a single upstream research call.
///
/// The set is closed: every call site matches each kind explicitly.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("{0}")]
    Config(String),
    #[error("Perplexity API error: {status} {body}")]
    Http { status: u16, body: String },
    #[error("{0}")]
    Network(String),
    #[error("Invalid response format from Perplexity API: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    Config,
    Http,
    Network,
    Parse,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Config => "config_error",
            Self::Http => "http_error",
            Self::Network => "network_error",
            Self::Parse => "parse_error",
        }
    }
}

impl Error {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Config(_) => FailureKind::Config,
            Self::Http { .. } => FailureKind::Http,
            Self::Network(_) => FailureKind::Network,
            Self::Parse(_) => FailureKind::Parse,
        }
    }
}

/// Inclusive parameter bounds for one tool variant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Limits {
    pub query_min_chars: usize,
    pub query_max_chars: usize,
    pub max_tokens_min: u32,
    pub max_tokens_max: u32,
    pub temperature_min: f64,
    pub temperature_max: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToolKind {
    QuickSearch,
    DeepResearch,
}

impl ToolKind {
    pub const ALL: [ToolKind; 2] = [ToolKind::QuickSearch, ToolKind::DeepResearch];

    /// Name the tool is registered under on the host transport.
    pub fn tool_name(self) -> &'static str {
        match self {
            Self::QuickSearch => "web-search",
            Self::DeepResearch => "deep-research",
        }
    }

    pub fn model(self) -> &'static str {
        match self {
            Self::QuickSearch => "sonar-reasoning-pro",
            Self::DeepResearch => "sonar-deep-research",
        }
    }

    pub fn limits(self) -> Limits {
        match self {
            Self::QuickSearch => Limits {
                query_min_chars: 3,
                query_max_chars: 1000,
                max_tokens_min: 50,
                max_tokens_max: 4000,
                temperature_min: 0.0,
                temperature_max: 1.0,
            },
            Self::DeepResearch => Limits {
                query_min_chars: 3,
                query_max_chars: 2000,
                max_tokens_min: 100,
                max_tokens_max: 8000,
                temperature_min: 0.0,
                temperature_max: 1.0,
            },
        }
    }
}

/// Values substituted when a caller omits an optional generation parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ToolDefaults {
    pub max_tokens: u32,
    pub temperature: f64,
}

impl Default for ToolDefaults {
    fn default() -> Self {
        Self {
            max_tokens: 500,
            temperature: 0.2,
        }
    }
}

impl ToolDefaults {
    /// Defaults must be acceptable to every tool variant.
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        for kind in ToolKind::ALL {
            let l = kind.limits();
            check_max_tokens(&l, self.max_tokens)?;
            check_temperature(&l, self.temperature)?;
        }
        Ok(())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("query must be between {min} and {max} characters (got {got})")]
    QueryLength { min: usize, max: usize, got: usize },
    #[error("max_tokens must be between {min} and {max} (got {got})")]
    MaxTokens { min: u32, max: u32, got: u32 },
    #[error("temperature must be between {min} and {max} (got {got})")]
    Temperature { min: f64, max: f64, got: f64 },
}

fn check_max_tokens(l: &Limits, v: u32) -> std::result::Result<(), ValidationError> {
    if v < l.max_tokens_min || v > l.max_tokens_max {
        return Err(ValidationError::MaxTokens {
            min: l.max_tokens_min,
            max: l.max_tokens_max,
            got: v,
        });
    }
    Ok(())
}

fn check_temperature(l: &Limits, v: f64) -> std::result::Result<(), ValidationError> {
    // NaN fails both comparisons, so test for containment rather than exclusion.
    if !(v >= l.temperature_min && v <= l.temperature_max) {
        return Err(ValidationError::Temperature {
            min: l.temperature_min,
            max: l.temperature_max,
            got: v,
        });
    }
    Ok(())
}

/// One validated inbound tool call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchRequest {
    kind: ToolKind,
    query: String,
    max_tokens: u32,
    temperature: f64,
}

impl SearchRequest {
    /// Validate caller-supplied values against `kind`'s limits, filling absent ones from `defaults`.
    pub fn new(
        kind: ToolKind,
        query: impl Into<String>,
        max_tokens: Option<u32>,
        temperature: Option<f64>,
        defaults: &ToolDefaults,
    ) -> std::result::Result<Self, ValidationError> {
        let query = query.into();
        let l = kind.limits();
        let n = query.chars().count();
        if n < l.query_min_chars || n > l.query_max_chars {
            return Err(ValidationError::QueryLength {
                min: l.query_min_chars,
                max: l.query_max_chars,
                got: n,
            });
        }
        if let Some(v) = max_tokens {
            check_max_tokens(&l, v)?;
        }
        if let Some(v) = temperature {
            check_temperature(&l, v)?;
        }
        Ok(Self {
            kind,
            query,
            max_tokens: max_tokens.unwrap_or(defaults.max_tokens),
            temperature: temperature.unwrap_or(defaults.temperature),
        })
    }

    pub fn kind(&self) -> ToolKind {
        self.kind
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }
}

/// Normalized successful upstream reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    /// Source URLs in the order the API returned them.
    pub citations: Vec<String>,
    pub total_tokens: u64,
}

/// Render answer text followed by a numbered `Sources:` list.
///
/// Citations keep their upstream order; duplicates are kept.
pub fn render(text: &str, citations: &[String]) -> String {
    if citations.is_empty() {
        return text.to_string();
    }
    let mut out = String::with_capacity(
        text.len() + 10 + citations.iter().map(|c| c.len() + 6).sum::<usize>(),
    );
    out.push_str(text);
    out.push_str("\n\nSources:");
    for (i, c) in citations.iter().enumerate() {
        out.push_str(&format!("\n[{}] {}", i + 1, c));
    }
    out
}

impl Answer {
    pub fn render(&self) -> String {
        render(&self.text, &self.citations)
    }
}

/// Something that can answer a research query with one upstream round trip.
#[async_trait::async_trait]
pub trait ResearchBackend: Send + Sync {
    fn name(&self) -> &'static str;
    async fn complete(&self, req: &SearchRequest) -> Result<Answer>;
}
