use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::error::{QueryError, Result};

/// Decision returned by a debugger at a suspension point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DebugAction {
    /// Continue to completion without further stops.
    Run,
    /// Stop at the next step at the same or shallower depth.
    Next,
    /// Stop at the next step, descending into sub-expressions.
    Into,
    /// Terminate the evaluation.
    Stop,
}

/// One frame of the evaluation call stack.
///
/// Frames carry enough captured state to answer source, variable, and
/// ad-hoc query requests without keeping the evaluation itself alive.
#[derive(Clone)]
pub struct DebugFrame {
    /// Byte offset in the query source where this frame is executing.
    pub position: usize,
    source: Arc<str>,
    context: Value,
    root: Value,
    bindings: Arc<HashMap<String, Value>>,
}

impl DebugFrame {
    pub(crate) fn new(
        position: usize,
        source: Arc<str>,
        context: Value,
        root: Value,
        bindings: Arc<HashMap<String, Value>>,
    ) -> Self {
        Self {
            position,
            source,
            context,
            root,
            bindings,
        }
    }

    /// Source code of the query this frame belongs to.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Names of the variables bound in this frame.
    pub fn variables(&self) -> Vec<String> {
        let mut names: Vec<String> = self.bindings.keys().cloned().collect();
        names.sort();
        names
    }

    /// Evaluate an arbitrary query in this frame's context.
    ///
    /// A query beginning with `$` followed by a plain name reads the named
    /// variable instead of evaluating a fresh expression.
    pub async fn query(&self, expression: &str) -> Result<Value> {
        if let Some(name) = expression.strip_prefix('$') {
            if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return self
                    .bindings
                    .get(name)
                    .cloned()
                    .or_else(|| (name == "root").then(|| self.root.clone()))
                    .ok_or_else(|| QueryError::UnknownVariable(name.to_string()));
            }
        }
        let parsed = crate::parser::parse(expression)?;
        let evaluator = crate::eval::Evaluator::detached(&self.root, self.bindings.clone());
        evaluator.eval_detached(&parsed, &self.context).await
    }
}

impl std::fmt::Debug for DebugFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugFrame")
            .field("position", &self.position)
            .field("source", &self.source)
            .finish()
    }
}

/// Evaluation context handed to the debugger at each suspension point.
#[derive(Clone, Debug)]
pub struct DebugContext {
    /// Identifier of the running query.
    pub uid: Uuid,
    /// Set once the query finished or was terminated.
    pub terminated: bool,
    frames: Vec<DebugFrame>,
}

impl DebugContext {
    pub(crate) fn new(uid: Uuid, terminated: bool, frames: Vec<DebugFrame>) -> Self {
        Self {
            uid,
            terminated,
            frames,
        }
    }

    /// The call stack, innermost frame last.
    pub fn stack(&self) -> &[DebugFrame] {
        &self.frames
    }
}

/// A step debugger attached to the query engine.
///
/// The engine suspends evaluation at each step until `handle` resolves.
/// There is no built-in timeout; the caller's cancellation token is the
/// backstop against a debugger that never answers.
#[async_trait]
pub trait QueryDebugger: Send + Sync {
    async fn handle(&self, context: DebugContext) -> DebugAction;
}
