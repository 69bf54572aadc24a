//! Service and per-request configuration.

use entigraph_core::{Entity, IdentityCache};
use std::fmt;

/// Configuration for one [`EntityService`](crate::EntityService).
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Upstream resource name (`projects`, `units`).
    pub resource: String,
    /// Name of the service's global cache scope.
    pub scope_name: String,
    /// Share one transport read between concurrent requests for one id.
    pub dedupe_in_flight: bool,
    /// Let `query` answer from the last collection read with the same filter.
    pub reuse_query_snapshots: bool,
}

impl ServiceConfig {
    /// Creates a configuration for `resource`, with a scope of the same name.
    pub fn new(resource: impl Into<String>) -> Self {
        let resource = resource.into();
        Self {
            scope_name: resource.clone(),
            resource,
            dedupe_in_flight: true,
            reuse_query_snapshots: true,
        }
    }

    /// Sets the global scope name.
    pub fn with_scope_name(mut self, name: impl Into<String>) -> Self {
        self.scope_name = name.into();
        self
    }

    /// Enables or disables in-flight request sharing.
    pub fn with_dedupe_in_flight(mut self, enabled: bool) -> Self {
        self.dedupe_in_flight = enabled;
        self
    }

    /// Enables or disables query snapshot reuse.
    pub fn with_query_snapshots(mut self, enabled: bool) -> Self {
        self.reuse_query_snapshots = enabled;
        self
    }
}

/// Options accepted by every service call.
pub struct RequestOptions<T: Entity> {
    /// Target scope; the service's global scope when unset.
    pub cache: Option<IdentityCache<T>>,
    /// Constructor parameters for new instances.
    pub params: Option<T::Params>,
    /// Resource to read from instead of the configured one.
    pub endpoint: Option<String>,
}

impl<T: Entity> RequestOptions<T> {
    /// Creates empty options.
    pub fn new() -> Self {
        Self {
            cache: None,
            params: None,
            endpoint: None,
        }
    }

    /// Targets a specific cache scope.
    pub fn with_cache(mut self, cache: IdentityCache<T>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Supplies constructor parameters.
    pub fn with_params(mut self, params: T::Params) -> Self {
        self.params = Some(params);
        self
    }

    /// Overrides the resource name.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }
}

impl<T: Entity> Default for RequestOptions<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity> Clone for RequestOptions<T> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            params: self.params.clone(),
            endpoint: self.endpoint.clone(),
        }
    }
}

impl<T: Entity> fmt::Debug for RequestOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestOptions")
            .field("cache", &self.cache.as_ref().map(IdentityCache::name))
            .field("params", &self.params.is_some())
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_config_builder() {
        let config = ServiceConfig::new("projects")
            .with_scope_name("projects/global")
            .with_dedupe_in_flight(false)
            .with_query_snapshots(false);

        assert_eq!(config.resource, "projects");
        assert_eq!(config.scope_name, "projects/global");
        assert!(!config.dedupe_in_flight);
        assert!(!config.reuse_query_snapshots);
    }

    #[test]
    fn service_config_defaults() {
        let config = ServiceConfig::new("units");
        assert_eq!(config.scope_name, "units");
        assert!(config.dedupe_in_flight);
        assert!(config.reuse_query_snapshots);
    }
}
