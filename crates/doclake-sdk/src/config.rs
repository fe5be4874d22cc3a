use serde::{Deserialize, Serialize};

/// Environment variable naming the root manifest URI.
pub const ENV_ROOT_MANIFEST: &str = "DOCLAKE_ROOT_MANIFEST";
/// Environment variable naming the default entry page path.
pub const ENV_ROOT_PAGE: &str = "DOCLAKE_ROOT_PAGE";

/// Boot configuration for a [`DataLake`].
///
/// [`DataLake`]: crate::lake::DataLake
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LakeConfig {
    /// URI of the root manifest mounted at startup.
    pub root_manifest: Option<String>,
    /// Lake path of the page shown when none is requested.
    pub root_page: Option<String>,
}

impl LakeConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Self {
        Self {
            root_manifest: std::env::var(ENV_ROOT_MANIFEST).ok().filter(|v| !v.is_empty()),
            root_page: std::env::var(ENV_ROOT_PAGE).ok().filter(|v| !v.is_empty()),
        }
    }

    pub fn with_root_manifest(mut self, uri: impl Into<String>) -> Self {
        self.root_manifest = Some(uri.into());
        self
    }

    pub fn with_root_page(mut self, path: impl Into<String>) -> Self {
        self.root_page = Some(path.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_fills_fields() {
        let config = LakeConfig::default()
            .with_root_manifest("memory://root.json")
            .with_root_page("/docs/welcome");
        assert_eq!(config.root_manifest.as_deref(), Some("memory://root.json"));
        assert_eq!(config.root_page.as_deref(), Some("/docs/welcome"));
    }

    #[test]
    fn from_env_reads_the_boundary_variables() {
        std::env::set_var(ENV_ROOT_MANIFEST, "memory://env-root.json");
        std::env::set_var(ENV_ROOT_PAGE, "/docs/start");
        let config = LakeConfig::from_env();
        std::env::remove_var(ENV_ROOT_MANIFEST);
        std::env::remove_var(ENV_ROOT_PAGE);

        assert_eq!(config.root_manifest.as_deref(), Some("memory://env-root.json"));
        assert_eq!(config.root_page.as_deref(), Some("/docs/start"));
    }
}
