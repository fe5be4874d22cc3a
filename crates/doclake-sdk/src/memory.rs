use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use tracing::trace;

use doclake_protocol::{
    BootstrapContext, CommitAction, ProtocolDriver, ProtocolError, ProtocolMethod, RequestConfig,
    ResourceFileMeta, ResourceMeta, Response,
};

fn content_type_by_extension(uri: &str) -> String {
    match uri.rsplit('.').next() {
        Some("json") => "application/json".to_string(),
        Some("toml") => "application/toml".to_string(),
        _ => "text/plain".to_string(),
    }
}

/// In-memory protocol driver for tests and embedded use.
///
/// Serves `memory://` URIs (or any scheme it is registered under) from a
/// process-local map. `COMMIT` batches validate before applying, so a
/// rejected batch leaves the store untouched.
pub struct MemoryDriver {
    files: RwLock<BTreeMap<String, String>>,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self {
            files: RwLock::new(BTreeMap::new()),
        }
    }

    /// Pre-populate the store.
    pub fn with_files<I, K, V>(files: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            files: RwLock::new(
                files
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    /// Direct read access, for assertions and seeding.
    pub fn content(&self, uri: &str) -> Option<String> {
        self.files.read().expect("memory store lock poisoned").get(uri).cloned()
    }

    /// Direct write access, bypassing the protocol layer.
    pub fn insert(&self, uri: impl Into<String>, content: impl Into<String>) {
        self.files
            .write()
            .expect("memory store lock poisoned")
            .insert(uri.into(), content.into());
    }
}

impl Default for MemoryDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProtocolDriver for MemoryDriver {
    fn is_active(&self) -> bool {
        true
    }

    async fn bootstrap(&self, _context: &BootstrapContext) -> doclake_protocol::Result<()> {
        Ok(())
    }

    fn resolve_url(&self, parts: &[&str]) -> doclake_protocol::Result<String> {
        Ok(parts.join("/"))
    }

    async fn request(&self, config: RequestConfig) -> doclake_protocol::Result<Response> {
        trace!(method = %config.method, uri = %config.uri, "memory request");
        match config.method {
            ProtocolMethod::Get => {
                let files = self.files.read().expect("memory store lock poisoned");
                match files.get(&config.uri) {
                    Some(content) => Ok(Response::ok(content.clone())
                        .with_content_type(content_type_by_extension(&config.uri))),
                    None => Err(ProtocolError::ResourceMissing(config.uri)),
                }
            }
            ProtocolMethod::Put => {
                let body = config.body.unwrap_or_default();
                self.files
                    .write()
                    .expect("memory store lock poisoned")
                    .insert(config.uri, String::from_utf8_lossy(&body).to_string());
                Ok(Response::ok(""))
            }
            ProtocolMethod::Delete => {
                let mut files = self.files.write().expect("memory store lock poisoned");
                match files.remove(&config.uri) {
                    Some(_) => Ok(Response::ok("")),
                    None => Err(ProtocolError::ResourceMissing(config.uri)),
                }
            }
            ProtocolMethod::Scan => {
                let files = self.files.read().expect("memory store lock poisoned");
                let listed: Vec<ResourceFileMeta> = files
                    .keys()
                    .filter(|uri| uri.starts_with(&config.uri))
                    .map(|uri| ResourceFileMeta {
                        name: uri.clone(),
                        content_type: content_type_by_extension(uri),
                    })
                    .collect();
                let meta = ResourceMeta::Folder { files: listed };
                let body = serde_json::to_string(&meta).map_err(|e| {
                    ProtocolError::Transport {
                        uri: config.uri.clone(),
                        reason: e.to_string(),
                    }
                })?;
                Ok(Response::ok(body).with_content_type("application/json"))
            }
            ProtocolMethod::Commit => {
                let mut files = self.files.write().expect("memory store lock poisoned");
                // Validate the whole batch before touching the store.
                for action in &config.actions {
                    if let CommitAction::Rename { from, .. } = action {
                        if !files.contains_key(from) {
                            return Err(ProtocolError::ResourceMissing(from.clone()));
                        }
                    }
                }
                for action in config.actions {
                    match action {
                        CommitAction::Post { uri, content } => {
                            files.insert(uri, content);
                        }
                        CommitAction::Delete { uri } => {
                            files.remove(&uri);
                        }
                        CommitAction::Rename { from, to } => {
                            if let Some(content) = files.remove(&from) {
                                files.insert(to, content);
                            }
                        }
                    }
                }
                Ok(Response::ok(""))
            }
            other => Err(ProtocolError::MethodUnavailable {
                method: other.to_string(),
                uri: config.uri,
            }),
        }
    }

    async fn available_methods_for(
        &self,
        _uri: &str,
    ) -> doclake_protocol::Result<Vec<ProtocolMethod>> {
        Ok(vec![
            ProtocolMethod::Get,
            ProtocolMethod::Put,
            ProtocolMethod::Delete,
            ProtocolMethod::Scan,
            ProtocolMethod::Commit,
        ])
    }

    fn extract_host(&self, _uri: &str) -> Option<String> {
        None
    }
}

impl std::fmt::Debug for MemoryDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let files = self.files.read().expect("memory store lock poisoned");
        f.debug_struct("MemoryDriver")
            .field("files", &files.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_delete_round_trip() {
        let driver = MemoryDriver::new();
        driver
            .request(RequestConfig::put("memory://a.json", "{\"a\":1}"))
            .await
            .unwrap();

        let response = driver
            .request(RequestConfig::get("memory://a.json"))
            .await
            .unwrap();
        assert_eq!(response.text(), "{\"a\":1}");
        assert_eq!(response.content_type.as_deref(), Some("application/json"));

        driver
            .request(RequestConfig::new(ProtocolMethod::Delete, "memory://a.json"))
            .await
            .unwrap();
        assert!(matches!(
            driver.request(RequestConfig::get("memory://a.json")).await,
            Err(ProtocolError::ResourceMissing(_))
        ));
    }

    #[tokio::test]
    async fn scan_lists_files_under_prefix() {
        let driver = MemoryDriver::with_files([
            ("memory://docs/a.json", "{}"),
            ("memory://docs/b.toml", ""),
            ("memory://other/c.json", "{}"),
        ]);
        let response = driver
            .request(RequestConfig::new(ProtocolMethod::Scan, "memory://docs/"))
            .await
            .unwrap();

        let meta: ResourceMeta = serde_json::from_str(&response.text()).unwrap();
        let ResourceMeta::Folder { files } = meta else {
            panic!("expected folder meta");
        };
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].name, "memory://docs/a.json");
        assert_eq!(files[1].content_type, "application/toml");
    }

    #[tokio::test]
    async fn rejected_commit_batch_leaves_store_untouched() {
        let driver = MemoryDriver::with_files([("memory://a.json", "old")]);
        let err = driver
            .request(RequestConfig::commit(
                "memory://a.json",
                vec![
                    CommitAction::Post {
                        uri: "memory://a.json".to_string(),
                        content: "new".to_string(),
                    },
                    CommitAction::Rename {
                        from: "memory://missing.json".to_string(),
                        to: "memory://b.json".to_string(),
                    },
                ],
                None,
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, ProtocolError::ResourceMissing(_)));
        assert_eq!(driver.content("memory://a.json").unwrap(), "old");
    }
}
