use log::{debug, info, warn};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::Result;

use super::handler::McpHandler;
use super::protocol::{JsonRpcError, JsonRpcId, JsonRpcRequest, JsonRpcResponse};

/// Runs the newline-delimited JSON-RPC loop until `reader` hits EOF.
///
/// Each input line is one message; each response is written as one line
/// and flushed immediately. Blank lines are skipped. A line that is not
/// JSON (including invalid UTF-8) gets a parse error and the loop goes on.
pub async fn serve<R, W>(handler: &McpHandler, mut reader: R, mut writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }

        let line = buf.trim_ascii();
        if line.is_empty() {
            continue;
        }

        if let Some(response) = respond(handler, line).await {
            let mut payload = serde_json::to_vec(&response)?;
            payload.push(b'\n');
            writer.write_all(&payload).await?;
            writer.flush().await?;
            debug!("Sent response for id {:?}", response.id);
        }
    }

    info!("Input closed, shutting down");
    Ok(())
}

/// JSON that is not a request object is an invalid request; its id is
/// echoed when one can be read.
async fn respond(handler: &McpHandler, line: &[u8]) -> Option<JsonRpcResponse> {
    let value = match serde_json::from_slice::<Value>(line) {
        Ok(value) => value,
        Err(e) => {
            warn!("Discarding unparsable message: {e}");
            return Some(JsonRpcResponse::error(
                JsonRpcId::Null,
                JsonRpcError::parse_error(format!("Parse error: {e}")),
            ));
        }
    };

    let id = value
        .get("id")
        .and_then(|id| serde_json::from_value::<JsonRpcId>(id.clone()).ok())
        .unwrap_or(JsonRpcId::Null);

    match serde_json::from_value::<JsonRpcRequest>(value) {
        Ok(request) => handler.handle_request(request).await,
        Err(e) => {
            warn!("Rejecting malformed request: {e}");
            Some(JsonRpcResponse::error(
                id,
                JsonRpcError::invalid_request(format!("Invalid request: {e}")),
            ))
        }
    }
}

/// Serves on the process's stdin and stdout.
pub async fn serve_stdio(handler: &McpHandler) -> Result<()> {
    info!("Serving MCP over stdio");
    let reader = tokio::io::BufReader::new(tokio::io::stdin());
    serve(handler, reader, tokio::io::stdout()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::mcp::protocol::{INVALID_REQUEST, PARSE_ERROR};
    use crate::mcp::tools::Toolbox;
    use crate::travis::TravisClient;

    fn handler() -> McpHandler {
        let client =
            TravisClient::new("http://127.0.0.1:9", "https://app.travis-ci.com", None).unwrap();
        McpHandler::new(Toolbox::new(client, AnalysisConfig::default()))
    }

    async fn run(input: &str) -> Vec<Value> {
        run_bytes(input.as_bytes()).await
    }

    async fn run_bytes(input: &[u8]) -> Vec<Value> {
        let mut output = Vec::new();
        serve(&handler(), input, &mut output).await.unwrap();
        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_one_response_per_request_in_order() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n\n",
            r#"{"jsonrpc":"2.0","id":"two","method":"tools/list"}"#,
            "\n",
        );
        let responses = run(input).await;

        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["id"], 1);
        assert_eq!(responses[0]["result"], serde_json::json!({}));
        assert_eq!(responses[1]["id"], "two");
        assert!(responses[1]["result"]["tools"].is_array());
    }

    #[tokio::test]
    async fn test_parse_error_has_null_id() {
        let responses = run("{not json\n").await;
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["id"], Value::Null);
        assert_eq!(responses[0]["error"]["code"], PARSE_ERROR);
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_does_not_stop_the_server() {
        let mut input = vec![0xff, 0xfe, b'\n'];
        input.extend_from_slice(br#"{"jsonrpc":"2.0","id":7,"method":"ping"}"#);
        input.push(b'\n');

        let responses = run_bytes(&input).await;
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["id"], Value::Null);
        assert_eq!(responses[0]["error"]["code"], PARSE_ERROR);
        assert_eq!(responses[1]["id"], 7);
        assert_eq!(responses[1]["result"], serde_json::json!({}));
    }

    #[tokio::test]
    async fn test_json_that_is_not_a_request_is_invalid_request() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":"x","method":42}"#,
            "\n",
            "[1,2]\n",
        );
        let responses = run(input).await;

        assert_eq!(responses.len(), 3);
        assert_eq!(responses[0]["id"], 1);
        assert_eq!(responses[0]["error"]["code"], INVALID_REQUEST);
        assert_eq!(responses[1]["id"], "x");
        assert_eq!(responses[1]["error"]["code"], INVALID_REQUEST);
        assert_eq!(responses[2]["id"], Value::Null);
        assert_eq!(responses[2]["error"]["code"], INVALID_REQUEST);
    }

    #[tokio::test]
    async fn test_eof_without_trailing_newline() {
        let responses = run(r#"{"jsonrpc":"2.0","id":3,"method":"ping"}"#).await;
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["id"], 3);
    }

    #[tokio::test]
    async fn test_empty_input_ends_cleanly() {
        tokio_test::assert_ok!(serve(&handler(), "".as_bytes(), Vec::new()).await);
    }
}
