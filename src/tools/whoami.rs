//! `whoami` tool: reports the caller's identity claims

use async_trait::async_trait;
use serde_json::json;

use crate::error::Result;
use crate::mcp::auth::AuthContext;
use crate::mcp::types::{CallToolResponse, McpTool};
use crate::tools::ToolExecutor;

/// Name the tool is registered and advertised under.
pub const TOOL_NAME: &str = "whoami";

/// Returns the verified identity claims of whoever invoked it.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhoamiTool;

/// Build the tool result for `auth`.
///
/// The claims object is serialized in the order the identity provider sent
/// it. Without a context the text is `{"error":"Not authenticated"}`.
///
/// # Examples
///
/// ```
/// use whoami_mcp::tools::whoami::whoami;
/// use whoami_mcp::mcp::types::ToolResponseContent;
///
/// let result = whoami(None);
/// assert_eq!(
///     result.content[0],
///     ToolResponseContent::Text { text: r#"{"error":"Not authenticated"}"#.to_string() }
/// );
/// ```
pub fn whoami(auth: Option<&AuthContext>) -> CallToolResponse {
    let text = match auth {
        Some(ctx) => serde_json::Value::Object(ctx.claims.clone()).to_string(),
        None => json!({"error": "Not authenticated"}).to_string(),
    };
    CallToolResponse::text(text)
}

#[async_trait]
impl ToolExecutor for WhoamiTool {
    fn tool_definition(&self) -> McpTool {
        McpTool {
            name: TOOL_NAME.to_string(),
            description: Some("Returns the identity claims of the authenticated caller".to_string()),
            input_schema: json!({"type": "object", "properties": {}}),
        }
    }

    async fn execute(
        &self,
        _args: serde_json::Value,
        auth: Option<&AuthContext>,
    ) -> Result<CallToolResponse> {
        Ok(whoami(auth))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::types::ToolResponseContent;

    fn text_of(response: &CallToolResponse) -> &str {
        match &response.content[0] {
            ToolResponseContent::Text { text } => text,
        }
    }

    #[test]
    fn test_whoami_returns_claims_in_order() {
        let claims = match json!({"sub": "u1", "name": "Ann"}) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        };
        let ctx = AuthContext::new("tok", "https://idp", "u1", claims);
        let response = whoami(Some(&ctx));
        assert_eq!(response.content.len(), 1);
        assert_eq!(text_of(&response), r#"{"sub":"u1","name":"Ann"}"#);
    }

    #[test]
    fn test_whoami_without_context() {
        assert_eq!(text_of(&whoami(None)), r#"{"error":"Not authenticated"}"#);
    }

    #[test]
    fn test_whoami_does_not_leak_token() {
        let ctx = AuthContext::new("secret-token", "https://idp", "u1", serde_json::Map::new());
        assert!(!text_of(&whoami(Some(&ctx))).contains("secret-token"));
    }

    #[tokio::test]
    async fn test_executor_ignores_arguments() {
        let response = WhoamiTool
            .execute(json!({"unexpected": true}), None)
            .await
            .unwrap();
        assert_eq!(response, whoami(None));
    }

    #[test]
    fn test_definition() {
        let def = WhoamiTool.tool_definition();
        assert_eq!(def.name, "whoami");
        assert_eq!(def.input_schema["type"], "object");
    }
}
