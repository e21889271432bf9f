//! Per-run execution state
//!
//! One `ExecutionContext` lives for the duration of a run. Every completed
//! step files its output under its own step id, and later steps read earlier
//! outputs through template expressions.

use serde_json::{json, Map, Value};

/// Mutable per-run state: the caller's input plus accumulated step outputs
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct ExecutionContext {
    /// Initial input mapping passed by the caller
    pub workflow_input: Map<String, Value>,
    /// step id -> `{"outputs": <value>}`, keyed in completion order
    pub step_outputs: Map<String, Value>,
}

impl ExecutionContext {
    /// Create a context for a new run
    pub fn new(workflow_input: Map<String, Value>) -> Self {
        Self {
            workflow_input,
            step_outputs: Map::new(),
        }
    }

    /// File a step's output under its id, wrapped in the `outputs` envelope
    pub fn set_step_output(&mut self, step_id: &str, value: Value) {
        self.step_outputs
            .insert(step_id.to_string(), json!({ "outputs": value }));
    }

    /// The stored output value for a step, unwrapped from its envelope
    pub fn step_output(&self, step_id: &str) -> Option<&Value> {
        self.step_outputs.get(step_id).and_then(|v| v.get("outputs"))
    }

    /// Merge outputs recorded by a child context cloned from this one.
    ///
    /// Only keys absent here are taken; step ids are unique, so entries a
    /// parallel child recorded never collide with a sibling's.
    pub fn absorb(&mut self, child: ExecutionContext) {
        for (step_id, output) in child.step_outputs {
            self.step_outputs.entry(step_id).or_insert(output);
        }
    }
}
