use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::info;

use doclake_content::{
    ContentProvider, ContentProviderRegistry, FileContentTypeRegistry, JsonContentProvider,
    TomlContentProvider,
};
use doclake_follow::{FollowHandle, FollowService};
use doclake_graph::{ManifestGraph, ReloadPattern};
use doclake_protocol::{BootstrapContext, ProtocolDriver, ProtocolRegistry, RequestConfig};
use doclake_query::{
    DataSetProfile, DataSourceResolver, QueryDebugger, QueryEngine, QueryError, QueryOptions,
};
use doclake_txn::TransactionManager;
use doclake_types::{
    DataLakeChange, DataLakePath, InitStatus, LakeEvent, Problem, TransactionStatus,
};

use crate::config::LakeConfig;
use crate::editors::{DifferDescriptor, EditorDescriptor, PatternRegistry};
use crate::error::Result;

const PROBLEM_CHANNEL_CAPACITY: usize = 64;

/// Loads query and data files through the lake's own registries.
struct LakeResolver {
    protocols: Arc<ProtocolRegistry>,
    providers: Arc<ContentProviderRegistry>,
    file_types: Arc<FileContentTypeRegistry>,
}

impl LakeResolver {
    async fn fetch(&self, uri: &str) -> doclake_query::Result<(String, Option<String>)> {
        let driver = self
            .protocols
            .driver_for_uri(uri)
            .map_err(|e| QueryError::SourceLoad {
                uri: uri.to_string(),
                reason: e.to_string(),
            })?;
        let response = driver
            .request(RequestConfig::get(uri))
            .await
            .map_err(|e| QueryError::SourceLoad {
                uri: uri.to_string(),
                reason: e.to_string(),
            })?;
        Ok((response.text(), response.content_type))
    }
}

#[async_trait]
impl DataSourceResolver for LakeResolver {
    async fn load_query_file(&self, uri: &str) -> doclake_query::Result<String> {
        let (content, _) = self.fetch(uri).await?;
        Ok(content)
    }

    async fn load_data_file(&self, uri: &str) -> doclake_query::Result<Value> {
        let (content, reported) = self.fetch(uri).await?;
        let content_type = self
            .file_types
            .content_type_for(uri)
            .or(reported)
            .ok_or_else(|| QueryError::SourceLoad {
                uri: uri.to_string(),
                reason: "cannot determine content type".to_string(),
            })?;
        let provider = self
            .providers
            .get(&content_type)
            .map_err(|e| QueryError::SourceLoad {
                uri: uri.to_string(),
                reason: e.to_string(),
            })?;
        provider.to_object(&content).map_err(|e| QueryError::SourceLoad {
            uri: uri.to_string(),
            reason: e.to_string(),
        })
    }
}

/// The data lake facade.
///
/// Owns every subsystem: protocol and content registries, the manifest
/// graph, the query engine, the transaction slot, the follow service,
/// and the editor and differ registries. Applications embed one
/// `DataLake` and drive everything through it.
pub struct DataLake {
    config: LakeConfig,
    protocols: Arc<ProtocolRegistry>,
    providers: Arc<ContentProviderRegistry>,
    file_types: Arc<FileContentTypeRegistry>,
    graph: Arc<ManifestGraph>,
    query: QueryEngine,
    txn: TransactionManager,
    follow: FollowService,
    editors: PatternRegistry<EditorDescriptor>,
    differs: PatternRegistry<DifferDescriptor>,
    problems: broadcast::Sender<Problem>,
}

impl DataLake {
    /// Build a lake with the JSON and TOML providers preinstalled.
    /// Protocol drivers are registered separately.
    pub fn new(config: LakeConfig) -> Self {
        let protocols = Arc::new(ProtocolRegistry::new());
        let providers = Arc::new(ContentProviderRegistry::new());
        providers.register("application/json", Arc::new(JsonContentProvider::new()));
        providers.register("application/toml", Arc::new(TomlContentProvider::new()));
        let file_types = Arc::new(FileContentTypeRegistry::new());

        let graph = Arc::new(ManifestGraph::new(
            protocols.clone(),
            providers.clone(),
            file_types.clone(),
        ));
        let txn = TransactionManager::new(graph.clone(), protocols.clone(), providers.clone());
        let (problems, _) = broadcast::channel(PROBLEM_CHANNEL_CAPACITY);

        Self {
            config,
            protocols,
            providers,
            file_types,
            graph,
            query: QueryEngine::new(),
            txn,
            follow: FollowService::new(),
            editors: PatternRegistry::new(),
            differs: PatternRegistry::new(),
            problems,
        }
    }

    // ---- Lifecycle ----

    /// Mount the configured root manifest and bring the lake up.
    pub async fn boot(&self) -> Result<()> {
        let Some(root) = self.config.root_manifest.clone() else {
            info!("no root manifest configured, lake stays unmounted");
            return Ok(());
        };
        self.graph.init(&root).await?;
        Ok(())
    }

    /// Resolve once the lake is ready; `immediately` fails instead of
    /// waiting.
    pub async fn when_ready(&self, immediately: bool) -> Result<()> {
        self.graph.when_ready(immediately).await?;
        Ok(())
    }

    pub fn init_status(&self) -> InitStatus {
        self.graph.init_status()
    }

    pub fn root_manifest(&self) -> Option<String> {
        self.graph.root_manifest()
    }

    /// Configured default entry page, if any.
    pub fn root_page(&self) -> Option<&str> {
        self.config.root_page.as_deref()
    }

    // ---- Registries ----

    /// Register a protocol driver under `scheme` and bootstrap it.
    pub async fn register_protocol(
        &self,
        scheme: &str,
        driver: Arc<dyn ProtocolDriver>,
    ) -> Result<()> {
        let context = BootstrapContext {
            root_manifest: self.config.root_manifest.clone(),
        };
        driver.bootstrap(&context).await?;
        self.protocols.register(scheme, driver);
        Ok(())
    }

    pub fn register_content_provider(
        &self,
        content_type: &str,
        provider: Arc<dyn ContentProvider>,
    ) {
        self.providers.register(content_type, provider);
    }

    /// Map files matching `pattern` to a content type, overriding what
    /// transports report.
    pub fn register_file_pattern(&self, pattern: &str, content_type: &str) -> Result<()> {
        self.file_types.register(pattern, content_type)?;
        Ok(())
    }

    pub fn register_editor(&self, pattern: &str, descriptor: EditorDescriptor) -> Result<()> {
        self.editors.register(pattern, descriptor)
    }

    pub fn register_default_editor(&self, descriptor: EditorDescriptor) {
        self.editors.register_default(descriptor);
    }

    pub fn editor_for(&self, content_type: &str) -> Option<EditorDescriptor> {
        self.editors.lookup(content_type)
    }

    pub fn fetch_editors(&self) -> Vec<(String, EditorDescriptor)> {
        self.editors.fetch()
    }

    pub fn register_differ(&self, pattern: &str, descriptor: DifferDescriptor) -> Result<()> {
        self.differs.register(pattern, descriptor)
    }

    pub fn register_default_differ(&self, descriptor: DifferDescriptor) {
        self.differs.register_default(descriptor);
    }

    pub fn differ_for(&self, content_type: &str) -> Option<DifferDescriptor> {
        self.differs.lookup(content_type)
    }

    // ---- Graph ----

    pub async fn mount(&self, uri: &str) -> Result<Vec<String>> {
        let changed = self.graph.mount(uri).await?;
        self.notify_followers(&changed);
        Ok(changed)
    }

    pub async fn unmount(&self, uri: &str) -> Result<()> {
        self.graph.unmount(uri).await?;
        self.follow.notify_changed(uri);
        Ok(())
    }

    pub async fn reload(&self, pattern: Option<ReloadPattern>) -> Result<Vec<String>> {
        let changed = self.graph.reload(pattern).await?;
        self.notify_followers(&changed);
        Ok(changed)
    }

    /// Fan a set of changed files out to their followers. The debounce
    /// window coalesces overlapping change bursts per URI.
    fn notify_followers(&self, uris: &[String]) {
        for uri in uris {
            self.follow.notify_changed(uri);
        }
    }

    /// Node of the merged graph at `path`.
    pub fn resolve(&self, path: &DataLakePath) -> Option<Value> {
        self.graph.resolve(path)
    }

    pub fn uris_for_path(&self, path: &DataLakePath) -> Vec<String> {
        self.graph.uris_for_path(path)
    }

    /// Reload and change events from the graph.
    pub fn events(&self) -> broadcast::Receiver<LakeEvent> {
        self.graph.subscribe()
    }

    // ---- Query ----

    /// Evaluate an expression or lake path against the merged graph.
    pub async fn pull_data(&self, expression: &str, options: QueryOptions) -> Result<Value> {
        let snapshot = self.graph.snapshot();
        Ok(self
            .query
            .pull_data(&snapshot, expression, self.anchored(options))
            .await?)
    }

    /// Resolve a dataset profile against the merged graph.
    pub async fn resolve_profile(
        &self,
        profile: &DataSetProfile,
        options: QueryOptions,
    ) -> Result<Value> {
        let snapshot = self.graph.snapshot();
        let resolver = LakeResolver {
            protocols: self.protocols.clone(),
            providers: self.providers.clone(),
            file_types: self.file_types.clone(),
        };
        Ok(self
            .query
            .resolve_profile(&snapshot, profile, &resolver, self.anchored(options))
            .await?)
    }

    /// Relative file references in profiles resolve against the root
    /// manifest unless the caller anchored them elsewhere.
    fn anchored(&self, mut options: QueryOptions) -> QueryOptions {
        if options.base_uri.is_none() {
            options.base_uri = self.graph.root_manifest();
        }
        options
    }

    pub fn register_debugger(&self, debugger: Arc<dyn QueryDebugger>) {
        self.query.register_debugger(debugger);
    }

    pub fn unregister_debugger(&self) {
        self.query.unregister_debugger();
    }

    // ---- Files ----

    /// Fetch a raw file with its resolved content type.
    pub async fn pull_file(&self, uri: &str) -> Result<(String, String)> {
        let driver = self.protocols.driver_for_uri(uri)?;
        let response = driver.request(RequestConfig::get(uri)).await?;
        let content_type = self
            .file_types
            .content_type_for(uri)
            .or(response.content_type.clone())
            .unwrap_or_else(|| "text/plain".to_string());
        Ok((response.text(), content_type))
    }

    /// Write a raw file through its protocol driver.
    pub async fn push_file(&self, uri: &str, content: &str) -> Result<()> {
        let driver = self.protocols.driver_for_uri(uri)?;
        driver
            .request(RequestConfig::put(uri, content.to_string()))
            .await?;
        self.follow.notify_changed(uri);
        Ok(())
    }

    /// Join URI parts into an absolute URI.
    pub fn resolve_uri(&self, parts: &[&str]) -> Result<String> {
        Ok(doclake_resolver::resolve_uri(parts)?)
    }

    // ---- Transactions ----

    pub fn begin_transaction(&self) -> Result<uuid::Uuid> {
        Ok(self.txn.begin()?)
    }

    /// Stage lake changes in the open transaction.
    pub async fn push_data(&self, changes: Vec<DataLakeChange>) -> Result<Vec<DataLakeChange>> {
        Ok(self.txn.push_data(changes).await?)
    }

    /// Commit the open transaction and notify followers of every file
    /// the commit touched.
    pub async fn commit_transaction(&self, comment: Option<String>) -> Result<Vec<String>> {
        let affected = self.txn.commit(comment).await?;
        self.notify_followers(&affected);
        Ok(affected)
    }

    pub fn rollback_transaction(&self) -> Result<()> {
        Ok(self.txn.rollback()?)
    }

    pub fn transaction_status(&self) -> TransactionStatus {
        self.txn.status()
    }

    pub fn transaction_events(&self) -> broadcast::Receiver<LakeEvent> {
        self.txn.subscribe()
    }

    // ---- Follow ----

    pub fn follow(
        &self,
        uri: &str,
        handler: Arc<dyn Fn(&str) + Send + Sync>,
    ) -> FollowHandle {
        self.follow.follow(uri, handler)
    }

    pub fn unfollow(&self, handle: FollowHandle) -> bool {
        self.follow.unfollow(handle)
    }

    /// Report an out-of-band change to a followed resource.
    pub fn notify_changed(&self, uri: &str) {
        self.follow.notify_changed(uri);
    }

    pub fn following(&self, pattern: &str) -> Result<Vec<String>> {
        Ok(self.follow.containing(pattern)?)
    }

    // ---- Problems ----

    /// Subscribe to reported problems.
    pub fn problems(&self) -> broadcast::Receiver<Problem> {
        self.problems.subscribe()
    }

    /// Publish a problem to all subscribers. Problems are reported, not
    /// thrown: a broken schema must not take the lake down.
    pub fn report_problem(&self, problem: Problem) {
        let _ = self.problems.send(problem);
    }
}

impl std::fmt::Debug for DataLake {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataLake")
            .field("status", &self.init_status())
            .field("root", &self.root_manifest())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryDriver;
    use serde_json::json;

    async fn lake_with(files: &[(&str, Value)]) -> (DataLake, Arc<MemoryDriver>) {
        let driver = Arc::new(MemoryDriver::with_files(
            files.iter().map(|(uri, doc)| (*uri, doc.to_string())),
        ));
        let config = LakeConfig::default().with_root_manifest("memory://root.json");
        let lake = DataLake::new(config);
        lake.register_protocol("memory", driver.clone()).await.unwrap();
        (lake, driver)
    }

    fn path(s: &str) -> DataLakePath {
        DataLakePath::parse(s).unwrap()
    }

    // -----------------------------------------------------------------------
    // Boot and query
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn boot_mounts_root_and_imports() {
        let (lake, _) = lake_with(&[
            (
                "memory://root.json",
                json!({"imports": ["memory://child.json"], "docs": {"title": "Root"}}),
            ),
            ("memory://child.json", json!({"docs": {"body": "text"}})),
        ])
        .await;

        lake.boot().await.unwrap();
        lake.when_ready(true).await.unwrap();
        assert_eq!(lake.init_status(), InitStatus::Success);
        assert_eq!(lake.root_manifest().as_deref(), Some("memory://root.json"));

        assert_eq!(
            lake.resolve(&path("/docs")).unwrap(),
            json!({"title": "Root", "body": "text"})
        );
        let result = lake
            .pull_data("/docs/title", QueryOptions::default())
            .await
            .unwrap();
        assert_eq!(result, json!("Root"));
    }

    #[tokio::test]
    async fn pull_data_evaluates_expressions() {
        let (lake, _) = lake_with(&[(
            "memory://root.json",
            json!({"items": [{"type": "a"}, {"type": "b"}]}),
        )])
        .await;
        lake.boot().await.unwrap();

        let result = lake
            .pull_data("($root.items[type = 'a'])", QueryOptions::default())
            .await
            .unwrap();
        assert_eq!(result, json!([{"type": "a"}]));
    }

    #[tokio::test]
    async fn profile_files_anchor_to_root_manifest() {
        let driver = Arc::new(MemoryDriver::with_files([(
            "memory://repo/root.json",
            json!({"items": [{"n": 1}, {"n": 2}]}).to_string(),
        )]));
        driver.insert("memory://repo/report.jsonata", "$origin[n > 1]");
        let lake = DataLake::new(
            LakeConfig::default().with_root_manifest("memory://repo/root.json"),
        );
        lake.register_protocol("memory", driver.clone()).await.unwrap();
        lake.boot().await.unwrap();

        let profile: DataSetProfile = serde_json::from_value(json!({
            "origin": "($root.items)",
            "source": "report.jsonata"
        }))
        .unwrap();
        let result = lake
            .resolve_profile(&profile, QueryOptions::default())
            .await
            .unwrap();
        assert_eq!(result, json!([{"n": 2}]));
    }

    // -----------------------------------------------------------------------
    // Write path
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn remove_change_disappears_from_queries_and_file() {
        let (lake, driver) = lake_with(&[(
            "memory://root.json",
            json!({"docs": {"title": "x", "keep": 1}}),
        )])
        .await;
        lake.boot().await.unwrap();

        lake.begin_transaction().unwrap();
        lake.push_data(vec![DataLakeChange::remove(path("/docs/title"), "drop title")])
            .await
            .unwrap();
        lake.commit_transaction(Some("cleanup".to_string())).await.unwrap();

        // Gone from the merged graph and from the stored manifest.
        assert!(lake.resolve(&path("/docs/title")).is_none());
        assert_eq!(
            lake.pull_data("/docs/title", QueryOptions::default()).await.unwrap(),
            Value::Null
        );
        let written: Value =
            serde_json::from_str(&driver.content("memory://root.json").unwrap()).unwrap();
        assert!(written["docs"].get("title").is_none());
        assert_eq!(written["docs"]["keep"], 1);
        assert_eq!(lake.transaction_status(), TransactionStatus::Closed);
    }

    #[tokio::test]
    async fn push_file_round_trips_and_notifies_followers() {
        tokio::time::pause();
        let (lake, _) = lake_with(&[("memory://root.json", json!({}))]).await;
        lake.boot().await.unwrap();

        let seen = Arc::new(std::sync::Mutex::new(Vec::<String>::new()));
        let sink = seen.clone();
        lake.follow(
            "memory://notes.json",
            Arc::new(move |uri: &str| sink.lock().unwrap().push(uri.to_string())),
        );

        lake.push_file("memory://notes.json", "{\"note\": true}").await.unwrap();
        let (content, content_type) = lake.pull_file("memory://notes.json").await.unwrap();
        assert_eq!(content, "{\"note\": true}");
        assert_eq!(content_type, "application/json");

        tokio::time::sleep(std::time::Duration::from_millis(80)).await;
        assert_eq!(*seen.lock().unwrap(), vec!["memory://notes.json".to_string()]);
    }

    #[tokio::test]
    async fn reload_notifies_followers_of_changed_files() {
        tokio::time::pause();
        let (lake, driver) = lake_with(&[("memory://root.json", json!({"docs": {"v": 1}}))]).await;
        lake.boot().await.unwrap();

        let seen = Arc::new(std::sync::Mutex::new(Vec::<String>::new()));
        let sink = seen.clone();
        lake.follow(
            "memory://root.json",
            Arc::new(move |uri: &str| sink.lock().unwrap().push(uri.to_string())),
        );

        driver.insert("memory://root.json", json!({"docs": {"v": 2}}).to_string());
        // Two back-to-back reloads land inside one debounce window.
        lake.reload(None).await.unwrap();
        driver.insert("memory://root.json", json!({"docs": {"v": 3}}).to_string());
        lake.reload(None).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(80)).await;
        assert_eq!(*seen.lock().unwrap(), vec!["memory://root.json".to_string()]);
        assert_eq!(lake.resolve(&path("/docs/v")).unwrap(), json!(3));
    }

    // -----------------------------------------------------------------------
    // Editors
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn editor_lookup_prefers_the_longest_pattern() {
        let (lake, _) = lake_with(&[]).await;
        lake.register_editor(
            "^application/.*",
            EditorDescriptor {
                component: "memory://editors/generic.js".to_string(),
                title: "generic".to_string(),
            },
        )
        .unwrap();
        lake.register_editor(
            "^application/json$",
            EditorDescriptor {
                component: "memory://editors/json.js".to_string(),
                title: "json".to_string(),
            },
        )
        .unwrap();
        lake.register_default_editor(EditorDescriptor {
            component: "memory://editors/plain.js".to_string(),
            title: "plain".to_string(),
        });

        assert_eq!(lake.editor_for("application/json").unwrap().title, "json");
        assert_eq!(lake.editor_for("application/toml").unwrap().title, "generic");
        assert_eq!(lake.editor_for("text/markdown").unwrap().title, "plain");
        assert_eq!(lake.fetch_editors().len(), 2);
    }

    // -----------------------------------------------------------------------
    // Problems
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn problems_reach_subscribers() {
        let (lake, _) = lake_with(&[]).await;
        let mut rx = lake.problems();

        lake.report_problem(
            Problem::new("net.doclake.schema", "Schema violation", "docs.title must be a string")
                .with_path(path("/docs/title")),
        );
        let problem = rx.try_recv().unwrap();
        assert_eq!(problem.uid, "net.doclake.schema");
        assert_eq!(problem.paths, vec![path("/docs/title")]);
    }
}
