use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use doclake_resolver::resolve_uri;

use crate::debugger::QueryDebugger;
use crate::error::{QueryError, Result};
use crate::eval::Evaluator;
use crate::parser::parse;
use crate::source::{DataSetProfile, OriginSet, SourceKind};

/// Loads the files a profile may reference during resolution.
///
/// The SDK implements this over the protocol and content registries; tests
/// implement it over fixture maps. The query engine itself never touches
/// transports.
#[async_trait]
pub trait DataSourceResolver: Send + Sync {
    /// Load a `*.jsonata` file, returning the expression text.
    async fn load_query_file(&self, uri: &str) -> Result<String>;

    /// Load and decode a data file.
    async fn load_data_file(&self, uri: &str) -> Result<Value>;
}

/// Options for a single query or profile resolution.
#[derive(Clone, Debug, Default)]
pub struct QueryOptions {
    /// Named variables bound for the evaluation.
    pub params: HashMap<String, Value>,
    /// Overrides the evaluation root.
    pub context: Option<Value>,
    /// Anchors relative file references found during resolution.
    pub base_uri: Option<String>,
    /// Backstop for debugger suspension: cancelling terminates evaluation.
    pub cancel: Option<CancellationToken>,
}

impl QueryOptions {
    pub fn with_param(mut self, name: impl Into<String>, value: Value) -> Self {
        self.params.insert(name.into(), value);
        self
    }

    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_base_uri(mut self, base_uri: impl Into<String>) -> Self {
        self.base_uri = Some(base_uri.into());
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// Evaluates expressions and dataset profiles against a graph snapshot.
pub struct QueryEngine {
    debugger: RwLock<Option<Arc<dyn QueryDebugger>>>,
}

impl QueryEngine {
    pub fn new() -> Self {
        Self {
            debugger: RwLock::new(None),
        }
    }

    /// Attach a step debugger. Replaces any previous one.
    pub fn register_debugger(&self, debugger: Arc<dyn QueryDebugger>) {
        *self.debugger.write().expect("engine lock poisoned") = Some(debugger);
    }

    /// Detach the debugger.
    pub fn unregister_debugger(&self) {
        *self.debugger.write().expect("engine lock poisoned") = None;
    }

    fn current_debugger(&self) -> Option<Arc<dyn QueryDebugger>> {
        self.debugger.read().expect("engine lock poisoned").clone()
    }

    async fn evaluate(
        &self,
        root: &Value,
        expression: &str,
        bindings: HashMap<String, Value>,
        context: Option<&Value>,
        cancel: CancellationToken,
    ) -> Result<Value> {
        let parsed = parse(expression)?;
        let evaluator = Evaluator::new(
            root,
            Arc::new(bindings),
            Arc::from(expression),
            self.current_debugger(),
            cancel,
        );
        let context = context.unwrap_or(root);
        evaluator.evaluate(&parsed, context).await
    }

    /// Evaluate a query expression, a bare lake path, or a literal object.
    pub async fn pull_data(
        &self,
        root: &Value,
        expression: &str,
        options: QueryOptions,
    ) -> Result<Value> {
        debug!(expression = %expression, "pullData");
        let effective_root = options.context.as_ref().unwrap_or(root);
        match SourceKind::ingest(&Value::String(expression.to_string())) {
            Ok(SourceKind::LakePath(path)) => {
                Ok(effective_root.pointer(&path.as_pointer()).cloned().unwrap_or(Value::Null))
            }
            Ok(SourceKind::InlineQuery(inner)) => {
                self.evaluate(
                    effective_root,
                    &inner,
                    options.params.clone(),
                    None,
                    options.cancel.clone().unwrap_or_default(),
                )
                .await
            }
            // Anything else is treated as raw expression text.
            _ => {
                self.evaluate(
                    effective_root,
                    expression,
                    options.params.clone(),
                    None,
                    options.cancel.clone().unwrap_or_default(),
                )
                .await
            }
        }
    }

    /// Anchor a possibly-relative file reference to the profile's base URI.
    fn anchor(&self, uri: &str, options: &QueryOptions) -> Result<String> {
        if uri.contains("://") {
            return Ok(uri.to_string());
        }
        match &options.base_uri {
            Some(base) => Ok(resolve_uri(&[base, uri])?),
            None => Err(QueryError::SourceLoad {
                uri: uri.to_string(),
                reason: "relative file reference without a base URI".to_string(),
            }),
        }
    }

    /// Resolve a single source with the given bindings in scope.
    async fn resolve_source(
        &self,
        root: &Value,
        kind: SourceKind,
        bindings: &HashMap<String, Value>,
        resolver: &dyn DataSourceResolver,
        options: &QueryOptions,
    ) -> Result<Value> {
        match kind {
            SourceKind::Literal(value) => Ok(value),
            SourceKind::LakePath(path) => {
                Ok(root.pointer(&path.as_pointer()).cloned().unwrap_or(Value::Null))
            }
            SourceKind::InlineQuery(expression) => {
                self.evaluate(
                    root,
                    &expression,
                    bindings.clone(),
                    None,
                    options.cancel.clone().unwrap_or_default(),
                )
                .await
            }
            SourceKind::QueryFile(uri) => {
                let uri = self.anchor(&uri, options)?;
                let expression = resolver.load_query_file(&uri).await?;
                self.evaluate(
                    root,
                    &expression,
                    bindings.clone(),
                    None,
                    options.cancel.clone().unwrap_or_default(),
                )
                .await
            }
            SourceKind::DataFile(uri) => {
                let uri = self.anchor(&uri, options)?;
                resolver.load_data_file(&uri).await
            }
        }
    }

    /// Resolve a dataset profile.
    ///
    /// Every `origin` entry is resolved first and bound as a named
    /// variable; `source` is then evaluated with those bindings plus the
    /// caller's params in scope.
    pub async fn resolve_profile(
        &self,
        root: &Value,
        profile: &DataSetProfile,
        resolver: &dyn DataSourceResolver,
        options: QueryOptions,
    ) -> Result<Value> {
        let mut bindings = options.params.clone();
        match &profile.origin {
            None => {}
            Some(OriginSet::Single(raw)) => {
                let kind = SourceKind::ingest(raw)?;
                let value = self
                    .resolve_source(root, kind, &bindings, resolver, &options)
                    .await?;
                bindings.insert("origin".to_string(), value);
            }
            Some(OriginSet::Named(entries)) => {
                for (name, raw) in entries {
                    let kind = SourceKind::ingest(raw)?;
                    let value = self
                        .resolve_source(root, kind, &bindings, resolver, &options)
                        .await?;
                    bindings.insert(name.clone(), value);
                }
            }
        }
        let kind = SourceKind::ingest(&profile.source)?;
        self.resolve_source(root, kind, &bindings, resolver, &options).await
    }
}

impl Default for QueryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for QueryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryEngine")
            .field("debugger", &self.current_debugger().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debugger::{DebugAction, DebugContext};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixtureResolver {
        queries: HashMap<String, String>,
        data: HashMap<String, Value>,
    }

    #[async_trait]
    impl DataSourceResolver for FixtureResolver {
        async fn load_query_file(&self, uri: &str) -> Result<String> {
            self.queries.get(uri).cloned().ok_or_else(|| QueryError::SourceLoad {
                uri: uri.to_string(),
                reason: "missing fixture".to_string(),
            })
        }

        async fn load_data_file(&self, uri: &str) -> Result<Value> {
            self.data.get(uri).cloned().ok_or_else(|| QueryError::SourceLoad {
                uri: uri.to_string(),
                reason: "missing fixture".to_string(),
            })
        }
    }

    fn empty_resolver() -> FixtureResolver {
        FixtureResolver {
            queries: HashMap::new(),
            data: HashMap::new(),
        }
    }

    // -----------------------------------------------------------------------
    // pull_data
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn pull_data_with_bare_path() {
        let engine = QueryEngine::new();
        let root = json!({"docs": {"welcome": {"title": "Hi"}}});
        let result = engine
            .pull_data(&root, "/docs/welcome", QueryOptions::default())
            .await
            .unwrap();
        assert_eq!(result, json!({"title": "Hi"}));
    }

    #[tokio::test]
    async fn pull_data_absent_path_is_null() {
        let engine = QueryEngine::new();
        let root = json!({"docs": {}});
        let result = engine
            .pull_data(&root, "/docs/welcome", QueryOptions::default())
            .await
            .unwrap();
        assert_eq!(result, Value::Null);
    }

    #[tokio::test]
    async fn pull_data_with_inline_query_and_params() {
        let engine = QueryEngine::new();
        let root = json!({"items": [{"type": "a"}, {"type": "b"}]});
        let options = QueryOptions::default().with_param("wanted", json!("b"));
        let result = engine
            .pull_data(&root, "($root.items[type = $wanted])", options)
            .await
            .unwrap();
        assert_eq!(result, json!([{"type": "b"}]));
    }

    #[tokio::test]
    async fn pull_data_context_overrides_root() {
        let engine = QueryEngine::new();
        let root = json!({"a": 1});
        let options = QueryOptions::default().with_context(json!({"a": 2}));
        let result = engine.pull_data(&root, "(a)", options).await.unwrap();
        assert_eq!(result, json!(2));
    }

    // -----------------------------------------------------------------------
    // resolve_profile
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn origin_binds_before_source() {
        let engine = QueryEngine::new();
        let root = json!({"items": [{"type": "a", "n": 1}, {"type": "b", "n": 2}]});
        let profile: DataSetProfile = serde_json::from_value(json!({
            "origin": {"list": "($root.items)"},
            "source": "($list[type = 'a'])"
        }))
        .unwrap();
        let result = engine
            .resolve_profile(&root, &profile, &empty_resolver(), QueryOptions::default())
            .await
            .unwrap();
        assert_eq!(result, json!([{"type": "a", "n": 1}]));
    }

    #[tokio::test]
    async fn single_origin_binds_as_origin_variable() {
        let engine = QueryEngine::new();
        let root = json!({"items": [1, 2, 3]});
        let profile: DataSetProfile = serde_json::from_value(json!({
            "origin": "($root.items)",
            "source": "($origin[$ > 1])"
        }))
        .unwrap();
        let result = engine
            .resolve_profile(&root, &profile, &empty_resolver(), QueryOptions::default())
            .await
            .unwrap();
        assert_eq!(result, json!([2, 3]));
    }

    #[tokio::test]
    async fn profile_sources_load_from_files() {
        let engine = QueryEngine::new();
        let root = json!({});
        let mut resolver = empty_resolver();
        resolver.queries.insert(
            "memory://repo/q/report.jsonata".to_string(),
            "$data[n > 1]".to_string(),
        );
        resolver.data.insert(
            "memory://repo/d/items.json".to_string(),
            json!([{"n": 1}, {"n": 2}]),
        );

        let profile: DataSetProfile = serde_json::from_value(json!({
            "origin": {"data": "d/items.json"},
            "source": "q/report.jsonata"
        }))
        .unwrap();
        let options = QueryOptions::default().with_base_uri("memory://repo/root.json");
        let result = engine
            .resolve_profile(&root, &profile, &resolver, options)
            .await
            .unwrap();
        assert_eq!(result, json!([{"n": 2}]));
    }

    #[tokio::test]
    async fn relative_file_without_base_uri_fails() {
        let engine = QueryEngine::new();
        let profile = DataSetProfile::from_source(json!("d/items.json"));
        let err = engine
            .resolve_profile(&json!({}), &profile, &empty_resolver(), QueryOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::SourceLoad { .. }));
    }

    #[tokio::test]
    async fn literal_profile_passes_through() {
        let engine = QueryEngine::new();
        let profile = DataSetProfile::from_source(json!({"fixed": true}));
        let result = engine
            .resolve_profile(&json!({}), &profile, &empty_resolver(), QueryOptions::default())
            .await
            .unwrap();
        assert_eq!(result, json!({"fixed": true}));
    }

    // -----------------------------------------------------------------------
    // Debugger
    // -----------------------------------------------------------------------

    /// Debugger that answers a fixed action and counts suspensions.
    struct CountingDebugger {
        action: DebugAction,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl QueryDebugger for CountingDebugger {
        async fn handle(&self, context: DebugContext) -> DebugAction {
            if !context.terminated {
                self.calls.fetch_add(1, Ordering::SeqCst);
            }
            self.action
        }
    }

    #[tokio::test]
    async fn run_stops_once_then_continues() {
        let engine = QueryEngine::new();
        let debugger = Arc::new(CountingDebugger {
            action: DebugAction::Run,
            calls: AtomicUsize::new(0),
        });
        engine.register_debugger(debugger.clone());

        let root = json!({"docs": {"a": 1, "b": 2}});
        let result = engine
            .pull_data(&root, "(docs.a)", QueryOptions::default())
            .await
            .unwrap();
        assert_eq!(result, json!(1));
        // One stop at the first step, then free running.
        assert_eq!(debugger.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn into_stops_at_every_step() {
        let engine = QueryEngine::new();
        let debugger = Arc::new(CountingDebugger {
            action: DebugAction::Into,
            calls: AtomicUsize::new(0),
        });
        engine.register_debugger(debugger.clone());

        // Filter predicates evaluate per item, so stepping into them yields
        // one suspension for the path plus several inside the filter.
        let root = json!({"items": [{"n": 1}, {"n": 2}]});
        engine
            .pull_data(&root, "(items[n > 1])", QueryOptions::default())
            .await
            .unwrap();
        assert!(debugger.calls.load(Ordering::SeqCst) > 1);
    }

    #[tokio::test]
    async fn stop_terminates_evaluation() {
        let engine = QueryEngine::new();
        engine.register_debugger(Arc::new(CountingDebugger {
            action: DebugAction::Stop,
            calls: AtomicUsize::new(0),
        }));

        let root = json!({"docs": {"a": 1}});
        let err = engine
            .pull_data(&root, "(docs.a)", QueryOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::Terminated));
    }

    /// Debugger that inspects the top frame on its first stop.
    struct InspectingDebugger {
        seen_variables: tokio::sync::Mutex<Vec<String>>,
        seen_value: tokio::sync::Mutex<Option<Value>>,
    }

    #[async_trait]
    impl QueryDebugger for InspectingDebugger {
        async fn handle(&self, context: DebugContext) -> DebugAction {
            if !context.terminated {
                if let Some(frame) = context.stack().last() {
                    *self.seen_variables.lock().await = frame.variables();
                    *self.seen_value.lock().await = frame.query("$wanted").await.ok();
                }
            }
            DebugAction::Run
        }
    }

    #[tokio::test]
    async fn frame_query_reads_variables() {
        let engine = QueryEngine::new();
        let debugger = Arc::new(InspectingDebugger {
            seen_variables: tokio::sync::Mutex::new(Vec::new()),
            seen_value: tokio::sync::Mutex::new(None),
        });
        engine.register_debugger(debugger.clone());

        let root = json!({"items": []});
        let options = QueryOptions::default().with_param("wanted", json!("a"));
        engine
            .pull_data(&root, "($root.items[type = $wanted])", options)
            .await
            .unwrap();

        assert_eq!(*debugger.seen_variables.lock().await, vec!["wanted".to_string()]);
        assert_eq!(*debugger.seen_value.lock().await, Some(json!("a")));
    }

    #[tokio::test]
    async fn cancellation_token_is_the_backstop() {
        struct NeverAnswers;

        #[async_trait]
        impl QueryDebugger for NeverAnswers {
            async fn handle(&self, _context: DebugContext) -> DebugAction {
                std::future::pending().await
            }
        }

        let engine = QueryEngine::new();
        engine.register_debugger(Arc::new(NeverAnswers));

        let cancel = CancellationToken::new();
        let options = QueryOptions::default().with_cancel(cancel.clone());
        let root = json!({"a": 1});

        let handle = tokio::spawn(async move { engine.pull_data(&root, "(a)", options).await });
        // Give the evaluation a moment to reach the suspension point.
        tokio::task::yield_now().await;
        cancel.cancel();
        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, QueryError::Terminated));
    }
}
