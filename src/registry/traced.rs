//! Logging decorator for any `Registry`.
//!
//! Applied explicitly where the client is built: `Traced::new(client)`.

use crate::registry::{ChannelTypes, Registry, RegistryError, SystemState};

use std::time::Instant;
use tracing::debug;

pub struct Traced<R> {
    inner: R,
}

impl<R: Registry> Traced<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    fn observe<T>(
        &self,
        call: &'static str,
        arg: &str,
        f: impl FnOnce(&R) -> Result<T, RegistryError>,
    ) -> Result<T, RegistryError> {
        let started = Instant::now();
        let out = f(&self.inner);
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &out {
            Ok(_) => debug!(call, arg, elapsed_ms, "registry call ok"),
            Err(e) => debug!(call, arg, elapsed_ms, error = %e, "registry call failed"),
        }
        out
    }
}

impl<R: Registry> Registry for Traced<R> {
    fn snapshot(&self) -> Result<SystemState, RegistryError> {
        self.observe("snapshot", "", |r| r.snapshot())
    }

    fn channel_types(&self) -> Result<ChannelTypes, RegistryError> {
        self.observe("channel_types", "", |r| r.channel_types())
    }

    fn resolve_type(&self, service: &str) -> Result<String, RegistryError> {
        self.observe("resolve_type", service, |r| r.resolve_type(service))
    }

    fn resolve_process(&self, name: &str) -> Result<String, RegistryError> {
        self.observe("resolve_process", name, |r| r.resolve_process(name))
    }

    fn get_runtime_id(&self, uri: &str) -> Result<String, RegistryError> {
        self.observe("get_runtime_id", uri, |r| r.get_runtime_id(uri))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::StaticRegistry;

    #[test]
    fn test_passes_results_through() {
        let traced = Traced::new(
            StaticRegistry::new()
                .process("/A")
                .channel("/t", "T")
                .publish("/t", &["/A"]),
        );
        assert_eq!(traced.snapshot().unwrap(), traced.inner().snapshot().unwrap());
        assert_eq!(traced.channel_types().unwrap().len(), 1);
        let uri = traced.resolve_process("/A").unwrap();
        assert!(traced.get_runtime_id(&uri).is_ok());
        assert!(traced.resolve_process("/missing").unwrap_err().is_recoverable());
    }
}
