use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::TravisLensError;

use super::protocol::*;
use super::resources::{read_resource, resource_list, resource_templates};
use super::tools::{tool_catalog, Toolbox};

const SERVER_NAME: &str = "travis-lens";

const INSTRUCTIONS: &str = "Tools for Travis CI: list and inspect builds, jobs and logs, \
trigger/restart/cancel builds, and analyze build history (analyze_build_insights) or a \
single build's logs (get_optimization_recommendations). Repositories are addressed by \
owner/name slug.";

/// Dispatches JSON-RPC requests to MCP methods.
pub struct McpHandler {
    toolbox: Toolbox,
}

impl McpHandler {
    pub fn new(toolbox: Toolbox) -> Self {
        Self { toolbox }
    }

    /// Handles one message. Notifications return `None`.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let Some(id) = request.id else {
            debug!("Notification received: {}", request.method);
            return None;
        };

        if request.jsonrpc != JSONRPC_VERSION {
            return Some(JsonRpcResponse::error(
                id,
                JsonRpcError::invalid_request(format!(
                    "Unsupported jsonrpc version '{}'",
                    request.jsonrpc
                )),
            ));
        }

        debug!("Request received: {}", request.method);
        let result = match request.method.as_str() {
            "initialize" => self.initialize(request.params),
            "ping" => Ok(json!({})),
            "tools/list" => to_result(ListToolsResult {
                tools: tool_catalog(),
            }),
            "tools/call" => self.call_tool(request.params).await,
            "resources/list" => to_result(ListResourcesResult {
                resources: resource_list(),
            }),
            "resources/templates/list" => to_result(ListResourceTemplatesResult {
                resource_templates: resource_templates(),
            }),
            "resources/read" => self.read_resource(request.params).await,
            method => {
                warn!("Unknown method: {method}");
                Err(JsonRpcError::method_not_found(method))
            }
        };

        Some(match result {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(error) => JsonRpcResponse::error(id, error),
        })
    }

    fn initialize(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params: InitializeParams = parse_params(params)?;
        let client = params
            .client_info
            .map(|c| format!("{} {}", c.name, c.version.unwrap_or_default()))
            .unwrap_or_else(|| "unknown client".to_string());
        info!(
            "Initializing session for {} (protocol {})",
            client.trim(),
            params.protocol_version
        );

        to_result(InitializeResult {
            protocol_version: MCP_PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                resources: Some(ResourcesCapability::default()),
                tools: Some(ToolsCapability::default()),
            },
            server_info: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            instructions: Some(INSTRUCTIONS.to_string()),
        })
    }

    /// Tool failures are reported in-band as `isError` results; only
    /// malformed `tools/call` params become JSON-RPC errors.
    async fn call_tool(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params: CallToolParams = parse_params(params)?;
        let arguments = params.arguments.unwrap_or(Value::Null);

        let result = match self.toolbox.call(&params.name, arguments).await {
            Ok(text) => CallToolResult::text(text),
            Err(e) => {
                warn!("Tool {} failed: {e}", params.name);
                CallToolResult::error(e)
            }
        };
        to_result(result)
    }

    async fn read_resource(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params: ReadResourceParams = parse_params(params)?;

        match read_resource(self.toolbox.client(), &params.uri).await {
            Ok(content) => to_result(ReadResourceResult {
                contents: vec![content],
            }),
            Err(e @ TravisLensError::UnknownResource(_)) => {
                Err(JsonRpcError::invalid_params(e.to_string()))
            }
            Err(e) => Err(JsonRpcError::internal_error(e.to_string())),
        }
    }
}

fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> Result<T, JsonRpcError> {
    let params = params.ok_or_else(|| JsonRpcError::invalid_params("Missing params"))?;
    serde_json::from_value(params)
        .map_err(|e| JsonRpcError::invalid_params(format!("Invalid params: {e}")))
}

fn to_result<T: Serialize>(value: T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(value).map_err(|e| JsonRpcError::internal_error(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::travis::TravisClient;

    fn handler_for(url: &str) -> McpHandler {
        let client = TravisClient::new(url, "https://app.travis-ci.com", None).unwrap();
        McpHandler::new(Toolbox::new(client, AnalysisConfig::default()))
    }

    fn offline_handler() -> McpHandler {
        handler_for("http://127.0.0.1:9")
    }

    fn request(method: &str, params: Option<Value>) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.to_string(),
            params,
            id: Some(JsonRpcId::Number(1)),
        }
    }

    #[tokio::test]
    async fn test_initialize() {
        let params = json!({"protocolVersion": "2024-11-05", "capabilities": {}, "clientInfo": {"name": "test"}});
        let response = offline_handler()
            .handle_request(request("initialize", Some(params)))
            .await
            .unwrap();

        let result = response.result.unwrap();
        assert_eq!(result["protocolVersion"], MCP_PROTOCOL_VERSION);
        assert_eq!(result["serverInfo"]["name"], SERVER_NAME);
        assert!(result["capabilities"]["tools"].is_object());
        assert!(result["capabilities"]["resources"].is_object());
    }

    #[tokio::test]
    async fn test_initialize_without_params_is_invalid() {
        let response = offline_handler()
            .handle_request(request("initialize", None))
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_notification_gets_no_response() {
        let mut notification = request("notifications/initialized", None);
        notification.id = None;
        assert!(offline_handler().handle_request(notification).await.is_none());
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let response = offline_handler()
            .handle_request(request("prompts/list", None))
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_wrong_jsonrpc_version() {
        let mut bad = request("ping", None);
        bad.jsonrpc = "1.0".to_string();
        let response = offline_handler().handle_request(bad).await.unwrap();
        assert_eq!(response.error.unwrap().code, INVALID_REQUEST);
    }

    #[tokio::test]
    async fn test_tools_list() {
        let response = offline_handler()
            .handle_request(request("tools/list", None))
            .await
            .unwrap();
        let tools = response.result.unwrap()["tools"].as_array().unwrap().len();
        assert_eq!(tools, tool_catalog().len());
    }

    #[tokio::test]
    async fn test_resource_templates_list() {
        let response = offline_handler()
            .handle_request(request("resources/templates/list", None))
            .await
            .unwrap();
        let result = response.result.unwrap();
        assert_eq!(result["resourceTemplates"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_tool_failure_is_in_band() {
        let response = offline_handler()
            .handle_request(request(
                "tools/call",
                Some(json!({"name": "get_build", "arguments": {}})),
            ))
            .await
            .unwrap();

        assert!(response.error.is_none());
        let result = response.result.unwrap();
        assert_eq!(result["isError"], true);
        assert!(result["content"][0]["text"]
            .as_str()
            .unwrap()
            .starts_with("Error: "));
    }

    #[tokio::test]
    async fn test_tool_call_success() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/job/5/log.txt")
            .with_body("one\ntwo\nthree\n")
            .create_async()
            .await;

        let response = handler_for(&server.url())
            .handle_request(request(
                "tools/call",
                Some(json!({"name": "get_job_log", "arguments": {"job_id": 5, "tail": 1}})),
            ))
            .await
            .unwrap();

        let result = response.result.unwrap();
        assert!(result.get("isError").is_none());
        assert_eq!(
            result["content"][0]["text"],
            "Last 1 of 3 lines of job 5:\nthree"
        );
    }

    #[tokio::test]
    async fn test_unknown_resource_is_invalid_params() {
        let response = offline_handler()
            .handle_request(request(
                "resources/read",
                Some(json!({"uri": "travis://nope"})),
            ))
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, INVALID_PARAMS);
    }
}
