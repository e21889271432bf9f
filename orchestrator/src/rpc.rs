//! JSON-RPC 2.0 agent invocation
//!
//! Agents expose one `POST /execute` endpoint taking a JSON-RPC envelope
//! whose `method` is the skill id. The `SkillInvoker` trait is the seam the
//! engine calls through; `HttpAgentClient` is the production implementation.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const JSONRPC_VERSION: &str = "2.0";

/// Errors from one agent skill invocation
#[derive(Debug, thiserror::Error)]
pub enum AgentCallError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("agent error {code}: {message}")]
    Agent {
        code: i64,
        message: String,
        data: Option<Value>,
    },
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Value,
    id: String,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcErrorBody {
    code: i64,
    message: String,
    data: Option<Value>,
}

/// Seam for invoking an agent skill at a URL
#[async_trait]
pub trait SkillInvoker: Send + Sync {
    /// Call `skill` on the agent at `url` with the given params, returning
    /// the JSON-RPC result
    async fn call_skill(
        &self,
        url: &str,
        skill: &str,
        params: Value,
    ) -> Result<Value, AgentCallError>;
}

/// HTTP JSON-RPC client for agent endpoints
///
/// Holds one pooled client; per-step deadlines are enforced by the engine,
/// so no request timeout is configured here.
#[derive(Debug, Clone, Default)]
pub struct HttpAgentClient {
    http: Client,
}

impl HttpAgentClient {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
        }
    }
}

#[async_trait]
impl SkillInvoker for HttpAgentClient {
    async fn call_skill(
        &self,
        url: &str,
        skill: &str,
        params: Value,
    ) -> Result<Value, AgentCallError> {
        let request = JsonRpcRequest {
            jsonrpc: JSONRPC_VERSION,
            method: skill,
            params,
            id: uuid::Uuid::new_v4().to_string(),
        };

        let endpoint = format!("{}/execute", url.trim_end_matches('/'));
        tracing::debug!(%endpoint, %skill, "calling agent skill");

        let response = self
            .http
            .post(&endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| AgentCallError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AgentCallError::Transport(format!(
                "agent at {} returned HTTP {}",
                endpoint, status
            )));
        }

        let envelope: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| AgentCallError::Transport(e.to_string()))?;

        if let Some(error) = envelope.error {
            return Err(AgentCallError::Agent {
                code: error.code,
                message: error.message,
                data: error.data,
            });
        }

        Ok(envelope
            .result
            .unwrap_or_else(|| Value::Object(Map::new())))
    }
}
