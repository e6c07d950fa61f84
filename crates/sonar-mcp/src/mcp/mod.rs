use rmcp::{
    handler::server::router::tool::ToolRouter as RmcpToolRouter,
    handler::server::wrapper::Parameters,
    model::{CallToolResult, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
    transport::stdio,
    ErrorData as McpError, ServiceExt,
};
use schemars::JsonSchema;
use serde::Deserialize;
use sonar_core::{ResearchBackend, SearchRequest, ToolDefaults, ToolKind};
use std::sync::Arc;

mod envelope;
use envelope::*;

#[derive(Debug, Deserialize, JsonSchema)]
pub(crate) struct WebSearchArgs {
    /// The search query (3-1000 characters).
    #[schemars(length(min = 3, max = 1000))]
    query: String,
    /// Maximum tokens in the answer (50-4000, default: 500).
    #[serde(default)]
    #[schemars(range(min = 50, max = 4000))]
    max_tokens: Option<u32>,
    /// Sampling temperature (0.0-1.0, default: 0.2).
    #[serde(default)]
    #[schemars(range(min = 0.0, max = 1.0))]
    temperature: Option<f64>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub(crate) struct DeepResearchArgs {
    /// The research question (3-2000 characters).
    #[schemars(length(min = 3, max = 2000))]
    query: String,
    /// Maximum tokens in the answer (100-8000, default: 500).
    #[serde(default)]
    #[schemars(range(min = 100, max = 8000))]
    max_tokens: Option<u32>,
    /// Sampling temperature (0.0-1.0, default: 0.2).
    #[serde(default)]
    #[schemars(range(min = 0.0, max = 1.0))]
    temperature: Option<f64>,
}

#[derive(Clone)]
pub(crate) struct SonarMcp {
    tool_router: RmcpToolRouter<Self>,
    backend: Arc<dyn ResearchBackend>,
    defaults: ToolDefaults,
}

#[tool_router]
impl SonarMcp {
    pub(crate) fn new(backend: Arc<dyn ResearchBackend>, defaults: ToolDefaults) -> Self {
        Self {
            tool_router: Self::tool_router(),
            backend,
            defaults,
        }
    }

    #[tool(
        name = "web-search",
        description = "Search the web and get a concise answer with source citations (Perplexity sonar-reasoning-pro)"
    )]
    async fn web_search(
        &self,
        Parameters(args): Parameters<WebSearchArgs>,
    ) -> Result<CallToolResult, McpError> {
        self.run(
            ToolKind::QuickSearch,
            args.query,
            args.max_tokens,
            args.temperature,
        )
        .await
    }

    #[tool(
        name = "deep-research",
        description = "Run an in-depth, multi-source research query and get a cited report (Perplexity sonar-deep-research; slow)"
    )]
    async fn deep_research(
        &self,
        Parameters(args): Parameters<DeepResearchArgs>,
    ) -> Result<CallToolResult, McpError> {
        self.run(
            ToolKind::DeepResearch,
            args.query,
            args.max_tokens,
            args.temperature,
        )
        .await
    }
}

impl SonarMcp {
    /// Shared body of both tools: validate, call upstream once, wrap the outcome.
    ///
    /// Only argument validation yields `Err`; upstream failures come back as error-flagged results.
    async fn run(
        &self,
        kind: ToolKind,
        query: String,
        max_tokens: Option<u32>,
        temperature: Option<f64>,
    ) -> Result<CallToolResult, McpError> {
        let req = SearchRequest::new(kind, query, max_tokens, temperature, &self.defaults)
            .map_err(|e| {
                tracing::warn!(tool = kind.tool_name(), error = %e, "rejected tool arguments");
                invalid_params(kind, &e)
            })?;

        match self.backend.complete(&req).await {
            Ok(answer) => Ok(tool_ok(answer.render())),
            Err(e) => {
                tracing::error!(
                    tool = kind.tool_name(),
                    backend = self.backend.name(),
                    kind = e.kind().as_str(),
                    error = %e,
                    "tool call failed"
                );
                Ok(tool_error(&e))
            }
        }
    }
}

#[tool_handler]
impl rmcp::ServerHandler for SonarMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Perplexity-backed research. Use web-search for quick factual lookups and deep-research for comprehensive, multi-source reports. Answers end with a numbered Sources list."
                    .to_string(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

pub(crate) async fn serve_stdio(svc: SonarMcp) -> Result<(), McpError> {
    let running = svc
        .serve(stdio())
        .await
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;
    tracing::info!("serving MCP over stdio");
    // Keep the stdio server alive until the client closes.
    running
        .waiting()
        .await
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;
    Ok(())
}
