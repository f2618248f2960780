

use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::*,
    service::RequestContext,
    tool, tool_handler, tool_router,
    transport::stdio,
    ErrorData as McpError, RoleServer, ServerHandler, ServiceExt,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::core::config::GeoarkConfig;
use crate::search::{RunOptions, SearchError, SearchPipeline};


#[derive(Debug, Deserialize, rmcp::schemars::JsonSchema)]
#[schemars(crate = "rmcp::schemars")]
pub struct SearchVariablesParams {
    #[schemars(description = "Natural-language description of the data needed")]
    pub query: String,
    #[schemars(description = "Ask the LLM judge to confirm relevance (default: from config)")]
    pub use_verification: Option<bool>,
    #[schemars(description = "Total number of candidates split across concepts (default: 15)")]
    pub total_budget: Option<usize>,
}

#[derive(Debug, Deserialize, rmcp::schemars::JsonSchema)]
#[schemars(crate = "rmcp::schemars")]
pub struct DecomposeQueryParams {
    #[schemars(description = "Natural-language query to break into concepts")]
    pub query: String,
}


#[derive(Clone)]
pub struct GeoarkMcpServer {
    pipeline: Arc<SearchPipeline>,
    config: Arc<GeoarkConfig>,
    tool_router: ToolRouter<Self>,
}

impl GeoarkMcpServer {
    pub fn new(pipeline: SearchPipeline, config: GeoarkConfig) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            config: Arc::new(config),
            tool_router: Self::tool_router(),
        }
    }

    fn convert_error(err: SearchError) -> McpError {
        match err {
            SearchError::EmptyQuery => McpError::invalid_params(err.to_string(), None),
            SearchError::Embedding(_) | SearchError::DimensionMismatch { .. } => {
                McpError::internal_error(err.to_string(), None)
            }
        }
    }

    fn result_to_json<T: Serialize>(result: T) -> Result<String, McpError> {
        serde_json::to_string_pretty(&result).map_err(|e| McpError::internal_error(e.to_string(), None))
    }

    fn options_for(&self, params: &SearchVariablesParams) -> RunOptions {
        let defaults = self.pipeline.default_options();
        RunOptions {
            use_verification: params.use_verification.unwrap_or(defaults.use_verification),
            total_budget: params.total_budget.filter(|b| *b > 0).unwrap_or(defaults.total_budget),
        }
    }
}

#[tool_router]
impl GeoarkMcpServer {
    #[tool(description = "Find catalog variables for a natural-language data request. Decomposes the query into primary/normalization/filter/related concepts, scores each against the catalog, and optionally verifies relevance. Returns: {query, decomposition, results_by_query, results_by_purpose, all_results, stats}")]
    async fn search_variables(
        &self,
        Parameters(params): Parameters<SearchVariablesParams>,
    ) -> Result<CallToolResult, McpError> {
        let options = self.options_for(&params);
        info!(
            "Searching variables: '{}' [verify={}, budget={}]",
            crate::text::safe_truncate(&params.query, 50),
            options.use_verification,
            options.total_budget
        );

        let result = self
            .pipeline
            .run(&params.query, options)
            .await
            .map_err(Self::convert_error)?;

        info!(
            "Found {} variables (run_id={})",
            result.stats.total_results, result.stats.run_id
        );

        let json = Self::result_to_json(&result)?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "Break a natural-language query into purpose-tagged search concepts without scoring. Returns: {concepts, primary_concepts, normalization_concepts, filter_concepts, related_concepts, geographic_level, fallback_used}")]
    async fn decompose_query(
        &self,
        Parameters(params): Parameters<DecomposeQueryParams>,
    ) -> Result<CallToolResult, McpError> {
        info!("Decomposing: '{}'", crate::text::safe_truncate(&params.query, 50));
        let decomposition = self
            .pipeline
            .decompose(&params.query)
            .await
            .map_err(Self::convert_error)?;

        let json = Self::result_to_json(&decomposition)?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }
}


#[tool_handler]
impl ServerHandler for GeoarkMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            server_info: Implementation {
                name: "geoark".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            instructions: Some(
                "GeoARK variable search - maps natural-language data requests to catalog variables. \
                 Use search_variables to find variables and decompose_query to inspect how a query \
                 is interpreted."
                    .to_string(),
            ),
        }
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _ctx: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        Ok(ListResourcesResult {
            resources: vec![RawResource::new("config://geoark", "geoark-config".to_string()).no_annotation()],
            next_cursor: None,
        })
    }

    async fn read_resource(
        &self,
        ReadResourceRequestParam { uri }: ReadResourceRequestParam,
        _ctx: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        match uri.as_str() {
            "config://geoark" => {
                let config = &self.config;
                let weights = self.pipeline.weights();
                let content = serde_json::to_string_pretty(&json!({
                    "version": env!("CARGO_PKG_VERSION"),
                    "catalog": {
                        "path": config.catalog_path,
                        "variables": self.pipeline.catalog_store().snapshot().len(),
                    },
                    "llm": {
                        "enabled": config.llm_enabled(),
                        "provider": config.llm_provider,
                        "model": config.llm_model,
                        "fallback_enabled": config.llm_fallback_enabled,
                    },
                    "embedding": {
                        "provider": config.embedding_provider,
                        "model": config.embedding_model,
                    },
                    "search": {
                        "semantic_weight": weights.semantic,
                        "keyword_weight": weights.keyword,
                        "total_budget": config.total_budget,
                        "max_results": config.max_results,
                        "max_concepts": config.max_concepts,
                        "use_verification": config.use_verification,
                    },
                    "tools": ["search_variables", "decompose_query"],
                }))
                .map_err(|e| McpError::internal_error(e.to_string(), None))?;

                Ok(ReadResourceResult {
                    contents: vec![ResourceContents::text(content, uri)],
                })
            }
            _ => Err(McpError::resource_not_found(
                format!("Unknown resource: {}", uri),
                Some(json!({ "uri": uri })),
            )),
        }
    }
}


pub async fn run_server(config_path: Option<&Path>) -> anyhow::Result<()> {
    info!("Initializing GeoARK MCP server...");

    let config = GeoarkConfig::load(config_path)?;
    let pipeline = SearchPipeline::from_config(&config).await?;

    info!("GeoARK MCP server ready");
    info!(
        "   Catalog: {} variables",
        pipeline.catalog_store().snapshot().len()
    );
    info!("   LLM: {}/{}", config.llm_provider, config.llm_model);
    info!("   Embeddings: {}/{}", config.embedding_provider, config.embedding_model);

    let server = GeoarkMcpServer::new(pipeline, config);
    let service = server.serve(stdio()).await?;
    service.waiting().await?;

    Ok(())
}
