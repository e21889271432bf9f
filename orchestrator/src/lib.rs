//! Declarative multi-agent workflow orchestration
//!
//! This crate provides:
//! - A YAML workflow model with sequential, parallel, conditional, and
//!   switch steps
//! - Template expressions for passing data between steps through a shared
//!   execution context
//! - Capability-based discovery of agents and workflows from an OCI registry
//! - A workflow engine dispatching JSON-RPC skill calls with per-step
//!   timeouts
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use caravan::{Discovery, Engine};
//! use caravan_registry::RegistryClient;
//!
//! let registry = RegistryClient::new("http://localhost:5000");
//! let discovery = Arc::new(Discovery::new(registry));
//! let engine = Engine::new(discovery);
//!
//! let input = serde_json::json!({"document": "..."});
//! let result = engine
//!     .run("review-pipeline", input.as_object().unwrap().clone(), None)
//!     .await?;
//! println!("{}", result.final_output);
//! ```

pub mod config;
pub mod context;
pub mod discovery;
pub mod engine;
pub mod rpc;
pub mod template;
pub mod workflow;

pub use config::CaravanFileConfig;
pub use context::ExecutionContext;
pub use discovery::{AgentCard, AgentSkill, Discovery, DiscoveryError};
pub use engine::{Engine, EngineError, RunFailure, RunResult};
pub use rpc::{AgentCallError, HttpAgentClient, SkillInvoker};
pub use workflow::{StepKind, WorkflowDefinition, WorkflowError, WorkflowMetadata, WorkflowStep};
