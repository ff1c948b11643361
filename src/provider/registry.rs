//! Name-keyed provider registries.
//!
//! One registry per capability, populated once at startup and shared behind
//! an `Arc`. Lookup failures are setup errors: they happen before any
//! network I/O and carry both the registry kind and the requested name.

use crate::error::{IntervoxError, Result};
use crate::provider::Provider;
use std::collections::HashMap;
use std::sync::Arc;

/// A registry of providers for one capability.
///
/// `P` is the capability trait object, e.g. `dyn LlmProvider`.
pub struct Registry<P: Provider + ?Sized> {
    kind: &'static str,
    providers: HashMap<String, Arc<P>>,
}

impl<P: Provider + ?Sized> Registry<P> {
    /// Create an empty registry. `kind` appears in not-found errors.
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            providers: HashMap::new(),
        }
    }

    /// Register a provider under its self-reported name.
    ///
    /// Re-registering a name replaces the previous provider.
    pub fn register(&mut self, provider: Arc<P>) {
        self.providers
            .insert(provider.name().to_string(), provider);
    }

    /// Look up a provider by name.
    pub fn get(&self, name: &str) -> Result<Arc<P>> {
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| IntervoxError::ProviderNotFound {
                kind: self.kind.to_string(),
                name: name.to_string(),
            })
    }

    /// All registered names, sorted for stable output.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }
}
