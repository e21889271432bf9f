//! Workflow definitions and YAML loading
//!
//! A workflow is a declarative step DAG with four step types:
//! - `sequential` leaf steps that invoke an agent skill
//! - `parallel` fan-out over child steps
//! - `conditional` two-way branches on a template expression
//! - `switch` multi-way branches with a `default` fallback
//!
//! Documents are parsed from YAML into a raw form and validated into the
//! typed model in one pass, so the engine never sees a malformed step.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};

/// Default per-step timeout in seconds
pub const DEFAULT_STEP_TIMEOUT: u64 = 300;

/// Errors raised while loading or validating workflows
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid workflow: {0}")]
    Validation(String),
}

/// Workflow identity and descriptive metadata
#[derive(Debug, Clone, PartialEq, Deserialize, serde::Serialize)]
pub struct WorkflowMetadata {
    pub id: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A validated workflow document
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowDefinition {
    pub metadata: WorkflowMetadata,
    pub steps: Vec<WorkflowStep>,
}

/// One validated node in the step DAG
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowStep {
    /// Unique within the workflow, including nested branch steps
    pub id: String,
    /// Parameter name/value pairs; string values may be template atoms
    pub inputs: Map<String, Value>,
    /// Key under which the agent result is wrapped before storage
    pub outputs: Option<String>,
    /// Per-step timeout in seconds
    pub timeout: u64,
    pub kind: StepKind,
}

/// Step behavior, keyed on `step_type` at parse time
#[derive(Debug, Clone, PartialEq)]
pub enum StepKind {
    /// Leaf step invoking one agent skill
    Skill { skill: String },
    /// Concurrent fan-out over children
    Parallel { steps: Vec<WorkflowStep> },
    /// Truthiness of `condition` selects one child sequence
    Conditional {
        condition: String,
        if_true: Vec<WorkflowStep>,
        if_false: Vec<WorkflowStep>,
    },
    /// Stringified `condition` selects a case, falling back to `default`
    Switch {
        condition: String,
        cases: BTreeMap<String, Vec<WorkflowStep>>,
        default: Option<Vec<WorkflowStep>>,
    },
}

// ============================================================================
// Raw serde form (pre-validation)
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawWorkflow {
    metadata: WorkflowMetadata,
    #[serde(default)]
    steps: Vec<RawStep>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
enum RawStepType {
    #[default]
    Sequential,
    Parallel,
    Conditional,
    Switch,
}

#[derive(Debug, Deserialize)]
struct RawStep {
    #[serde(default)]
    id: String,
    #[serde(default)]
    skill: Option<String>,
    #[serde(default)]
    step_type: RawStepType,
    #[serde(default)]
    inputs: Map<String, Value>,
    #[serde(default)]
    outputs: Option<String>,
    #[serde(default)]
    timeout: Option<i64>,
    #[serde(default)]
    condition: Option<String>,
    #[serde(default)]
    branches: Option<BTreeMap<String, Vec<RawStep>>>,
}

impl WorkflowDefinition {
    /// Load and validate a workflow from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, WorkflowError> {
        let raw: RawWorkflow =
            serde_yaml::from_str(yaml).map_err(|e| WorkflowError::Parse(e.to_string()))?;
        Self::validate(raw)
    }

    /// Load and validate a workflow from YAML bytes
    pub fn from_yaml_slice(bytes: &[u8]) -> Result<Self, WorkflowError> {
        let raw: RawWorkflow =
            serde_yaml::from_slice(bytes).map_err(|e| WorkflowError::Parse(e.to_string()))?;
        Self::validate(raw)
    }

    /// Load and validate a workflow from a YAML file
    pub fn from_yaml_file(path: &Path) -> Result<Self, WorkflowError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| WorkflowError::Io(e.to_string()))?;
        Self::from_yaml(&content)
    }

    fn validate(raw: RawWorkflow) -> Result<Self, WorkflowError> {
        if raw.metadata.id.is_empty() {
            return Err(WorkflowError::Validation("metadata.id is required".into()));
        }
        if raw.metadata.name.is_empty() {
            return Err(WorkflowError::Validation("metadata.name is required".into()));
        }
        if raw.metadata.version.is_empty() {
            return Err(WorkflowError::Validation(
                "metadata.version is required".into(),
            ));
        }
        if raw.steps.is_empty() {
            return Err(WorkflowError::Validation(
                "workflow must declare at least one step".into(),
            ));
        }

        let mut seen_ids = HashSet::new();
        let steps = raw
            .steps
            .into_iter()
            .map(|s| validate_step(s, &mut seen_ids))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            metadata: raw.metadata,
            steps,
        })
    }
}

fn validate_step(raw: RawStep, seen_ids: &mut HashSet<String>) -> Result<WorkflowStep, WorkflowError> {
    if raw.id.is_empty() {
        return Err(WorkflowError::Validation("step is missing an id".into()));
    }
    if !seen_ids.insert(raw.id.clone()) {
        return Err(WorkflowError::Validation(format!(
            "duplicate step id '{}'",
            raw.id
        )));
    }

    let timeout = match raw.timeout {
        None => DEFAULT_STEP_TIMEOUT,
        Some(t) if t > 0 => t as u64,
        Some(t) => {
            return Err(WorkflowError::Validation(format!(
                "step '{}' has non-positive timeout {}",
                raw.id, t
            )))
        }
    };

    let kind = match raw.step_type {
        RawStepType::Sequential => {
            let skill = raw.skill.filter(|s| !s.is_empty()).ok_or_else(|| {
                WorkflowError::Validation(format!("step '{}' is missing a skill", raw.id))
            })?;
            StepKind::Skill { skill }
        }

        RawStepType::Parallel => {
            let mut branches = require_branches(raw.branches, &raw.id)?;
            let children = branches.remove("steps").ok_or_else(|| {
                WorkflowError::Validation(format!(
                    "parallel step '{}' branches must contain 'steps'",
                    raw.id
                ))
            })?;
            StepKind::Parallel {
                steps: validate_children(children, seen_ids)?,
            }
        }

        RawStepType::Conditional => {
            let condition = require_condition(raw.condition, &raw.id)?;
            let mut branches = require_branches(raw.branches, &raw.id)?;
            let if_true = branches
                .remove("if_true")
                .map(|c| validate_children(c, seen_ids))
                .transpose()?
                .unwrap_or_default();
            let if_false = branches
                .remove("if_false")
                .map(|c| validate_children(c, seen_ids))
                .transpose()?
                .unwrap_or_default();
            StepKind::Conditional {
                condition,
                if_true,
                if_false,
            }
        }

        RawStepType::Switch => {
            let condition = require_condition(raw.condition, &raw.id)?;
            let mut branches = require_branches(raw.branches, &raw.id)?;
            let default = branches
                .remove("default")
                .map(|c| validate_children(c, seen_ids))
                .transpose()?;
            let cases = branches
                .into_iter()
                .map(|(case, children)| Ok((case, validate_children(children, seen_ids)?)))
                .collect::<Result<BTreeMap<_, _>, WorkflowError>>()?;
            StepKind::Switch {
                condition,
                cases,
                default,
            }
        }
    };

    Ok(WorkflowStep {
        id: raw.id,
        inputs: raw.inputs,
        outputs: raw.outputs.filter(|o| !o.is_empty()),
        timeout,
        kind,
    })
}

fn validate_children(
    children: Vec<RawStep>,
    seen_ids: &mut HashSet<String>,
) -> Result<Vec<WorkflowStep>, WorkflowError> {
    children
        .into_iter()
        .map(|c| validate_step(c, seen_ids))
        .collect()
}

fn require_condition(condition: Option<String>, step_id: &str) -> Result<String, WorkflowError> {
    condition.filter(|c| !c.is_empty()).ok_or_else(|| {
        WorkflowError::Validation(format!("step '{}' requires a condition", step_id))
    })
}

fn require_branches(
    branches: Option<BTreeMap<String, Vec<RawStep>>>,
    step_id: &str,
) -> Result<BTreeMap<String, Vec<RawStep>>, WorkflowError> {
    branches.ok_or_else(|| {
        WorkflowError::Validation(format!("composite step '{}' requires branches", step_id))
    })
}
