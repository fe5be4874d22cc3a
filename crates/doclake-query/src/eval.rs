use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::ast::{BinOp, Expr, ExprKind, Step};
use crate::debugger::{DebugAction, DebugContext, DebugFrame, QueryDebugger};
use crate::error::{QueryError, Result};

type EvalFuture<'a> = Pin<Box<dyn Future<Output = Result<Value>> + Send + 'a>>;

/// Truthiness used by filters and `and`/`or`.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Equality that compares numbers numerically, so `3` equals `3.0`.
fn loose_eq(lhs: &Value, rhs: &Value) -> bool {
    match (lhs.as_f64(), rhs.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => lhs == rhs,
    }
}

struct DebugState {
    mode: DebugAction,
    stop_depth: usize,
}

struct DebugHook {
    debugger: Arc<dyn QueryDebugger>,
    state: tokio::sync::Mutex<DebugState>,
}

/// Tree-walking evaluator over one expression.
///
/// One evaluator serves one query run; the debugger state lives inside it.
pub(crate) struct Evaluator<'a> {
    root: &'a Value,
    bindings: Arc<HashMap<String, Value>>,
    source: Arc<str>,
    uid: Uuid,
    debug: Option<DebugHook>,
    cancel: CancellationToken,
}

impl<'a> Evaluator<'a> {
    pub(crate) fn new(
        root: &'a Value,
        bindings: Arc<HashMap<String, Value>>,
        source: Arc<str>,
        debugger: Option<Arc<dyn QueryDebugger>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            root,
            bindings,
            source,
            uid: Uuid::now_v7(),
            debug: debugger.map(|debugger| DebugHook {
                debugger,
                state: tokio::sync::Mutex::new(DebugState {
                    // Stop at the very first step until told otherwise.
                    mode: DebugAction::Into,
                    stop_depth: 0,
                }),
            }),
            cancel,
        }
    }

    /// An evaluator without a debugger, used by debug-frame queries.
    pub(crate) fn detached(root: &'a Value, bindings: Arc<HashMap<String, Value>>) -> Self {
        Self::new(root, bindings, Arc::from(""), None, CancellationToken::new())
    }

    pub(crate) async fn eval_detached(&self, expr: &Expr, context: &Value) -> Result<Value> {
        self.eval(expr, context, 0, &[]).await
    }

    /// Run the expression to completion against the given context.
    pub(crate) async fn evaluate(&self, expr: &Expr, context: &Value) -> Result<Value> {
        let result = self.eval(expr, context, 0, &[]).await;
        if let Some(hook) = &self.debug {
            // Final notification carries the terminated flag; the returned
            // action no longer matters. The cancellation token backstops
            // this await too, so a silent debugger cannot hang the caller.
            let ctx = DebugContext::new(self.uid, true, Vec::new());
            tokio::select! {
                _ = hook.debugger.handle(ctx) => {}
                _ = self.cancel.cancelled() => {}
            }
        }
        result
    }

    fn frame(&self, position: usize, context: &Value) -> DebugFrame {
        DebugFrame::new(
            position,
            self.source.clone(),
            context.clone(),
            self.root.clone(),
            self.bindings.clone(),
        )
    }

    /// Cooperative suspension point.
    ///
    /// Blocks (at the await point, never the thread) until the debugger
    /// answers. The caller's cancellation token is the backstop: when it
    /// fires, the evaluation terminates instead of hanging on a silent
    /// debugger.
    async fn checkpoint(&self, frames: &[DebugFrame], depth: usize) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(QueryError::Terminated);
        }
        let Some(hook) = &self.debug else {
            return Ok(());
        };
        let mut state = hook.state.lock().await;
        let should_stop = match state.mode {
            DebugAction::Run => false,
            DebugAction::Into => true,
            DebugAction::Next => depth <= state.stop_depth,
            DebugAction::Stop => return Err(QueryError::Terminated),
        };
        if !should_stop {
            return Ok(());
        }
        let context = DebugContext::new(self.uid, false, frames.to_vec());
        let action = tokio::select! {
            action = hook.debugger.handle(context) => action,
            _ = self.cancel.cancelled() => DebugAction::Stop,
        };
        match action {
            DebugAction::Run => state.mode = DebugAction::Run,
            DebugAction::Next => {
                state.mode = DebugAction::Next;
                state.stop_depth = depth;
            }
            DebugAction::Into => state.mode = DebugAction::Into,
            DebugAction::Stop => return Err(QueryError::Terminated),
        }
        Ok(())
    }

    fn eval<'b>(
        &'b self,
        expr: &'b Expr,
        context: &'b Value,
        depth: usize,
        parent_frames: &'b [DebugFrame],
    ) -> EvalFuture<'b> {
        Box::pin(async move {
            let mut frames = parent_frames.to_vec();
            frames.push(self.frame(expr.position, context));
            self.checkpoint(&frames, depth).await?;

            match &expr.kind {
                ExprKind::Literal(value) => Ok(value.clone()),
                ExprKind::Context => Ok(context.clone()),
                ExprKind::Variable(name) => self
                    .bindings
                    .get(name)
                    .cloned()
                    .or_else(|| (name == "root").then(|| self.root.clone()))
                    .ok_or_else(|| QueryError::UnknownVariable(name.clone())),
                ExprKind::Relative(steps) => {
                    self.apply_steps(context.clone(), steps, depth + 1, &frames).await
                }
                ExprKind::Path { head, steps } => {
                    let base = self.eval(head, context, depth + 1, &frames).await?;
                    self.apply_steps(base, steps, depth + 1, &frames).await
                }
                ExprKind::Binary { op, lhs, rhs } => {
                    match op {
                        BinOp::And => {
                            let left = self.eval(lhs, context, depth + 1, &frames).await?;
                            if !is_truthy(&left) {
                                return Ok(Value::Bool(false));
                            }
                            let right = self.eval(rhs, context, depth + 1, &frames).await?;
                            Ok(Value::Bool(is_truthy(&right)))
                        }
                        BinOp::Or => {
                            let left = self.eval(lhs, context, depth + 1, &frames).await?;
                            if is_truthy(&left) {
                                return Ok(Value::Bool(true));
                            }
                            let right = self.eval(rhs, context, depth + 1, &frames).await?;
                            Ok(Value::Bool(is_truthy(&right)))
                        }
                        _ => {
                            let left = self.eval(lhs, context, depth + 1, &frames).await?;
                            let right = self.eval(rhs, context, depth + 1, &frames).await?;
                            self.compare(*op, &left, &right, expr.position)
                        }
                    }
                }
            }
        })
    }

    fn compare(&self, op: BinOp, lhs: &Value, rhs: &Value, position: usize) -> Result<Value> {
        let result = match op {
            BinOp::Eq => loose_eq(lhs, rhs),
            BinOp::Ne => !loose_eq(lhs, rhs),
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
                let ordering = match (lhs, rhs) {
                    (Value::String(a), Value::String(b)) => a.cmp(b),
                    _ => match (lhs.as_f64(), rhs.as_f64()) {
                        (Some(a), Some(b)) => {
                            a.partial_cmp(&b).ok_or(QueryError::Eval {
                                position,
                                reason: "cannot order NaN".to_string(),
                            })?
                        }
                        _ => {
                            return Err(QueryError::Eval {
                                position,
                                reason: "ordering requires two numbers or two strings".to_string(),
                            })
                        }
                    },
                };
                match op {
                    BinOp::Lt => ordering.is_lt(),
                    BinOp::Le => ordering.is_le(),
                    BinOp::Gt => ordering.is_gt(),
                    BinOp::Ge => ordering.is_ge(),
                    _ => unreachable!(),
                }
            }
            BinOp::And | BinOp::Or => unreachable!("handled by eval"),
        };
        Ok(Value::Bool(result))
    }

    async fn apply_steps(
        &self,
        mut value: Value,
        steps: &[Step],
        depth: usize,
        frames: &[DebugFrame],
    ) -> Result<Value> {
        for step in steps {
            value = match step {
                Step::Field(name) => step_field(value, name),
                Step::Wildcard => step_wildcard(value),
                Step::Filter(expr) => self.step_filter(value, expr, depth, frames).await?,
            };
        }
        Ok(value)
    }

    async fn step_filter(
        &self,
        value: Value,
        expr: &Expr,
        depth: usize,
        frames: &[DebugFrame],
    ) -> Result<Value> {
        // A literal number filter is an index, not a predicate.
        if let ExprKind::Literal(Value::Number(n)) = &expr.kind {
            let Value::Array(items) = value else {
                return Ok(Value::Null);
            };
            let index = n.as_f64().unwrap_or(-1.0);
            if index < 0.0 || index.fract() != 0.0 {
                return Ok(Value::Null);
            }
            return Ok(items.into_iter().nth(index as usize).unwrap_or(Value::Null));
        }

        match value {
            Value::Array(items) => {
                let mut kept = Vec::new();
                for item in items {
                    let verdict = self.eval(expr, &item, depth + 1, frames).await?;
                    if is_truthy(&verdict) {
                        kept.push(item);
                    }
                }
                Ok(Value::Array(kept))
            }
            other => {
                let verdict = self.eval(expr, &other, depth + 1, frames).await?;
                if is_truthy(&verdict) {
                    Ok(other)
                } else {
                    Ok(Value::Null)
                }
            }
        }
    }
}

/// Property access; mapping over arrays, absent keys become `Null`.
fn step_field(value: Value, name: &str) -> Value {
    match value {
        Value::Object(mut map) => map.remove(name).unwrap_or(Value::Null),
        Value::Array(items) => {
            let mapped: Vec<Value> = items
                .into_iter()
                .filter_map(|item| match item {
                    Value::Object(mut map) => map.remove(name),
                    _ => None,
                })
                .filter(|v| !v.is_null())
                .collect();
            Value::Array(mapped)
        }
        _ => Value::Null,
    }
}

/// Wildcard: all values of an object, or the array itself.
fn step_wildcard(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Array(map.into_values().collect()),
        array @ Value::Array(_) => array,
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use serde_json::json;

    async fn run(expression: &str, root: Value) -> Result<Value> {
        run_with(expression, root, HashMap::new()).await
    }

    async fn run_with(
        expression: &str,
        root: Value,
        bindings: HashMap<String, Value>,
    ) -> Result<Value> {
        let expr = parse(expression)?;
        let evaluator = Evaluator::new(
            &root,
            Arc::new(bindings),
            Arc::from(expression),
            None,
            CancellationToken::new(),
        );
        let context = root.clone();
        evaluator.evaluate(&expr, &context).await
    }

    // -----------------------------------------------------------------------
    // Navigation
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn navigates_object_fields() {
        let root = json!({"docs": {"welcome": {"title": "Hi"}}});
        assert_eq!(run("docs.welcome.title", root).await.unwrap(), json!("Hi"));
    }

    #[tokio::test]
    async fn absent_field_is_null() {
        let root = json!({"docs": {}});
        assert_eq!(run("docs.absent.deeper", root).await.unwrap(), Value::Null);
    }

    #[tokio::test]
    async fn field_maps_over_arrays() {
        let root = json!({"items": [{"n": 1}, {"n": 2}, {"other": 3}]});
        assert_eq!(run("items.n", root).await.unwrap(), json!([1, 2]));
    }

    #[tokio::test]
    async fn wildcard_lists_object_values() {
        let root = json!({"docs": {"a": 1, "b": 2}});
        assert_eq!(run("docs.*", root).await.unwrap(), json!([1, 2]));
    }

    // -----------------------------------------------------------------------
    // Filters
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn predicate_filter() {
        let root = json!({"items": [{"type": "a", "n": 1}, {"type": "b", "n": 2}]});
        assert_eq!(
            run("items[type = 'a']", root).await.unwrap(),
            json!([{"type": "a", "n": 1}])
        );
    }

    #[tokio::test]
    async fn numeric_index_filter() {
        let root = json!({"items": ["x", "y", "z"]});
        assert_eq!(run("items[1]", root.clone()).await.unwrap(), json!("y"));
        assert_eq!(run("items[9]", root).await.unwrap(), Value::Null);
    }

    #[tokio::test]
    async fn comparison_and_logic() {
        let root = json!({"items": [{"n": 1}, {"n": 2}, {"n": 3}]});
        assert_eq!(
            run("items[n > 1 and n <= 3]", root).await.unwrap(),
            json!([{"n": 2}, {"n": 3}])
        );
    }

    #[tokio::test]
    async fn integer_and_float_compare_equal() {
        let root = json!({"items": [{"n": 3}]});
        assert_eq!(run("items[n = 3.0]", root).await.unwrap(), json!([{"n": 3}]));
    }

    // -----------------------------------------------------------------------
    // Variables
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn root_variable_and_bindings() {
        let root = json!({"items": [{"type": "a"}, {"type": "b"}]});
        let mut bindings = HashMap::new();
        bindings.insert("list".to_string(), json!([{"type": "a"}]));
        assert_eq!(
            run_with("$list[type = 'a']", root.clone(), bindings).await.unwrap(),
            json!([{"type": "a"}])
        );
        assert_eq!(
            run("$root.items[type = 'b']", root).await.unwrap(),
            json!([{"type": "b"}])
        );
    }

    #[tokio::test]
    async fn unknown_variable_fails() {
        let err = run("$missing", json!({})).await.unwrap_err();
        assert!(matches!(err, QueryError::UnknownVariable(n) if n == "missing"));
    }

    // -----------------------------------------------------------------------
    // Cancellation
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn cancelled_token_terminates() {
        let root = json!({"a": 1});
        let expr = parse("a").unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let evaluator = Evaluator::new(
            &root,
            Arc::new(HashMap::new()),
            Arc::from("a"),
            None,
            cancel,
        );
        let context = root.clone();
        let err = evaluator.evaluate(&expr, &context).await.unwrap_err();
        assert!(matches!(err, QueryError::Terminated));
    }
}
