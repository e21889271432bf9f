//! Workflow execution engine
//!
//! Interprets a validated step DAG:
//! - sequential leaf steps resolve inputs, discover the agent, and call it
//! - parallel groups fan out over context snapshots and merge on completion
//! - conditional and switch steps select a child sequence to run in place
//!
//! Every completed step files its output in the run's `ExecutionContext`;
//! sequential successors always observe it, parallel siblings never do.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::{try_join_all, BoxFuture, FutureExt};
use serde_json::{Map, Value};

use crate::context::ExecutionContext;
use crate::discovery::{Discovery, DiscoveryError};
use crate::rpc::{AgentCallError, HttpAgentClient, SkillInvoker};
use crate::template;
use crate::workflow::{StepKind, WorkflowStep};

/// Errors that fail a step or a whole run
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("step '{step_id}': transport failure: {message}")]
    Transport { step_id: String, message: String },

    #[error("step '{step_id}': agent error {code}: {message}")]
    Agent {
        step_id: String,
        code: i64,
        message: String,
        data: Option<Value>,
    },

    #[error("step '{step_id}' timed out after {seconds}s")]
    StepTimeout { step_id: String, seconds: u64 },
}

/// A failed run: the error plus whatever outputs completed before it
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct RunFailure {
    pub error: EngineError,
    pub step_outputs: Map<String, Value>,
}

/// The outcome of a completed run
#[derive(Debug, Clone, serde::Serialize)]
pub struct RunResult {
    pub workflow_id: String,
    pub workflow_name: String,
    pub workflow_version: String,
    pub initial_input: Map<String, Value>,
    pub step_outputs: Map<String, Value>,
    /// Output of the last step that completed
    pub final_output: Value,
    pub duration_ms: u64,
}

/// Workflow execution engine
///
/// Owns a discovery service for resolving workflows and skills, and a skill
/// invoker for the JSON-RPC calls themselves.
pub struct Engine {
    discovery: Arc<Discovery>,
    invoker: Arc<dyn SkillInvoker>,
}

impl Engine {
    /// Create an engine calling agents over HTTP
    pub fn new(discovery: Arc<Discovery>) -> Self {
        Self {
            discovery,
            invoker: Arc::new(HttpAgentClient::new()),
        }
    }

    /// Substitute the skill invoker (used by tests and embedders)
    pub fn with_invoker(mut self, invoker: Arc<dyn SkillInvoker>) -> Self {
        self.invoker = invoker;
        self
    }

    /// Run a workflow from the registry against an initial input.
    ///
    /// On failure the error carries every step output captured before the
    /// failing step, so callers can inspect partial state.
    pub async fn run(
        &self,
        workflow_id: &str,
        input: Map<String, Value>,
        version: Option<&str>,
    ) -> Result<RunResult, RunFailure> {
        let started = Instant::now();

        let workflow = self
            .discovery
            .find_workflow(workflow_id, version)
            .await
            .map_err(|e| RunFailure {
                error: e.into(),
                step_outputs: Map::new(),
            })?;

        tracing::info!(
            workflow = %workflow.metadata.id,
            version = %workflow.metadata.version,
            steps = workflow.steps.len(),
            "starting workflow run"
        );

        let mut context = ExecutionContext::new(input);
        match self.execute_steps(&workflow.steps, &mut context).await {
            Ok(()) => {
                let final_output = context
                    .step_outputs
                    .values()
                    .last()
                    .and_then(|v| v.get("outputs"))
                    .cloned()
                    .unwrap_or(Value::Null);

                let duration_ms = started.elapsed().as_millis() as u64;
                tracing::info!(workflow = %workflow.metadata.id, duration_ms, "workflow run completed");

                Ok(RunResult {
                    workflow_id: workflow.metadata.id.clone(),
                    workflow_name: workflow.metadata.name.clone(),
                    workflow_version: workflow.metadata.version.clone(),
                    initial_input: context.workflow_input,
                    step_outputs: context.step_outputs,
                    final_output,
                    duration_ms,
                })
            }
            Err(error) => {
                tracing::warn!(workflow = %workflow.metadata.id, %error, "workflow run failed");
                Err(RunFailure {
                    error,
                    step_outputs: context.step_outputs,
                })
            }
        }
    }

    async fn execute_steps(
        &self,
        steps: &[WorkflowStep],
        context: &mut ExecutionContext,
    ) -> Result<(), EngineError> {
        for step in steps {
            self.execute_step(step, context).await?;
        }
        Ok(())
    }

    // Boxed so composite steps can recurse through the dispatch table
    fn execute_step<'a>(
        &'a self,
        step: &'a WorkflowStep,
        context: &'a mut ExecutionContext,
    ) -> BoxFuture<'a, Result<(), EngineError>> {
        async move {
            match &step.kind {
                StepKind::Skill { skill } => self.execute_skill_step(step, skill, context).await,

                StepKind::Parallel { steps } => {
                    self.execute_parallel(step, steps, context).await
                }

                StepKind::Conditional {
                    condition,
                    if_true,
                    if_false,
                } => {
                    let value = template::resolve_expr(condition, context);
                    let taken = template::is_truthy(&value);
                    tracing::debug!(
                        step = %step.id,
                        branch = if taken { "if_true" } else { "if_false" },
                        "conditional resolved"
                    );
                    let branch = if taken { if_true } else { if_false };
                    self.execute_steps(branch, context).await
                }

                StepKind::Switch {
                    condition,
                    cases,
                    default,
                } => {
                    let value = template::resolve_expr(condition, context);
                    let key = template::case_key(&value);
                    // An exact case match wins over the default
                    match cases.get(&key).or(default.as_ref()) {
                        Some(branch) => {
                            tracing::debug!(step = %step.id, case = %key, "switch resolved");
                            self.execute_steps(branch, context).await
                        }
                        None => {
                            tracing::debug!(step = %step.id, case = %key, "no matching case, skipping");
                            Ok(())
                        }
                    }
                }
            }
        }
        .boxed()
    }

    /// Fan out over the children, each against its own snapshot of the
    /// context, and merge their outputs in branch order once all complete.
    /// The first child failure fails the group; dropping the join cancels
    /// in-flight siblings.
    async fn execute_parallel(
        &self,
        parent: &WorkflowStep,
        children: &[WorkflowStep],
        context: &mut ExecutionContext,
    ) -> Result<(), EngineError> {
        if children.is_empty() {
            tracing::debug!(step = %parent.id, "parallel group is empty, nothing to do");
            return Ok(());
        }

        tracing::info!(step = %parent.id, children = children.len(), "starting parallel group");

        let tasks: Vec<_> = children
            .iter()
            .map(|child| {
                let mut snapshot = context.clone();
                async move {
                    self.execute_step(child, &mut snapshot).await?;
                    Ok::<ExecutionContext, EngineError>(snapshot)
                }
            })
            .collect();

        let finished = try_join_all(tasks).await?;
        for child_context in finished {
            context.absorb(child_context);
        }
        Ok(())
    }

    async fn execute_skill_step(
        &self,
        step: &WorkflowStep,
        skill: &str,
        context: &mut ExecutionContext,
    ) -> Result<(), EngineError> {
        let params = template::resolve_inputs(&step.inputs, context);
        let url = self.discovery.find_agent_for_skill(skill).await?;

        tracing::info!(step = %step.id, %skill, "dispatching step");
        let started = Instant::now();

        let call = self.invoker.call_skill(&url, skill, Value::Object(params));
        let result = match tokio::time::timeout(Duration::from_secs(step.timeout), call).await {
            Ok(Ok(result)) => result,
            Ok(Err(AgentCallError::Transport(message))) => {
                return Err(EngineError::Transport {
                    step_id: step.id.clone(),
                    message,
                })
            }
            Ok(Err(AgentCallError::Agent {
                code,
                message,
                data,
            })) => {
                return Err(EngineError::Agent {
                    step_id: step.id.clone(),
                    code,
                    message,
                    data,
                })
            }
            Err(_) => {
                return Err(EngineError::StepTimeout {
                    step_id: step.id.clone(),
                    seconds: step.timeout,
                })
            }
        };

        tracing::info!(
            step = %step.id,
            duration_ms = started.elapsed().as_millis() as u64,
            "step completed"
        );

        let stored = match &step.outputs {
            Some(name) => {
                let mut wrapped = Map::new();
                wrapped.insert(name.clone(), result);
                Value::Object(wrapped)
            }
            None => result,
        };
        context.set_step_output(&step.id, stored);
        Ok(())
    }
}
