use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::driver::ProtocolDriver;
use crate::error::{ProtocolError, Result};

/// Maps URI schemes to registered transport drivers.
///
/// Registries are constructed once at engine start and passed by reference
/// to every component that needs transport access. Re-registering a scheme
/// silently replaces the previous driver; looking up an unregistered scheme
/// fails with [`ProtocolError::NotFound`].
pub struct ProtocolRegistry {
    drivers: RwLock<HashMap<String, Arc<dyn ProtocolDriver>>>,
}

impl ProtocolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            drivers: RwLock::new(HashMap::new()),
        }
    }

    /// Register a driver for a scheme, replacing any previous registration.
    pub fn register(&self, scheme: impl Into<String>, driver: Arc<dyn ProtocolDriver>) {
        let scheme = scheme.into();
        debug!(scheme = %scheme, "registering protocol driver");
        self.drivers
            .write()
            .expect("registry lock poisoned")
            .insert(scheme, driver);
    }

    /// Look up a driver by scheme.
    pub fn get(&self, scheme: &str) -> Result<Arc<dyn ProtocolDriver>> {
        self.drivers
            .read()
            .expect("registry lock poisoned")
            .get(scheme)
            .cloned()
            .ok_or_else(|| ProtocolError::NotFound(scheme.to_string()))
    }

    /// Sorted list of registered schemes.
    pub fn fetch(&self) -> Vec<String> {
        let mut schemes: Vec<String> = self
            .drivers
            .read()
            .expect("registry lock poisoned")
            .keys()
            .cloned()
            .collect();
        schemes.sort();
        schemes
    }

    /// The scheme part of a URI, without the `:`.
    pub fn scheme_of(uri: &str) -> Result<&str> {
        let colon = uri.find(':').ok_or_else(|| ProtocolError::BadUri(uri.to_string()))?;
        let scheme = &uri[..colon];
        if scheme.is_empty()
            || !scheme.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
            || !scheme.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        {
            return Err(ProtocolError::BadUri(uri.to_string()));
        }
        Ok(scheme)
    }

    /// The driver serving a URI, resolved by its scheme.
    pub fn driver_for_uri(&self, uri: &str) -> Result<Arc<dyn ProtocolDriver>> {
        let scheme = Self::scheme_of(uri)?;
        self.get(scheme)
    }
}

impl Default for ProtocolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProtocolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolRegistry")
            .field("schemes", &self.fetch())
            .finish()
    }
}
