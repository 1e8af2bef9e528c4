//! Static-table handler registry.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::resolver::{HandlerResolver, Instance, instance};

type Factory = Arc<dyn Fn() -> Instance + Send + Sync>;

enum Registration {
    /// One instance shared by every resolution.
    Shared(Instance),
    /// A fresh instance per resolution.
    Transient(Factory),
}

impl Registration {
    fn resolve(&self) -> Instance {
        match self {
            Self::Shared(instance) => Arc::clone(instance),
            Self::Transient(factory) => factory(),
        }
    }
}

/// A [`HandlerResolver`] backed by an in-memory table.
///
/// Registrations are grouped by contract type and kept in registration
/// order. The registry is filled once at startup and then shared immutably,
/// so lookups take no lock.
#[derive(Default)]
pub struct HandlerRegistry {
    entries: HashMap<TypeId, Vec<Registration>>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a shared implementation of contract `T`.
    pub fn register<T>(&mut self, value: Arc<T>) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.push::<T>(Registration::Shared(instance(value)))
    }

    /// Registers a factory that builds a new implementation of `T` on every
    /// resolution.
    pub fn register_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn() -> Arc<T> + Send + Sync + 'static,
    {
        self.push::<T>(Registration::Transient(Arc::new(move || instance(factory()))))
    }

    /// Number of registrations for contract `T`.
    #[must_use]
    pub fn count<T>(&self) -> usize
    where
        T: ?Sized + 'static,
    {
        self.entries.get(&TypeId::of::<T>()).map_or(0, Vec::len)
    }

    /// Returns `true` when at least one implementation of `T` is registered.
    #[must_use]
    pub fn contains<T>(&self) -> bool
    where
        T: ?Sized + 'static,
    {
        self.count::<T>() > 0
    }

    fn push<T>(&mut self, registration: Registration) -> &mut Self
    where
        T: ?Sized + 'static,
    {
        self.entries
            .entry(TypeId::of::<T>())
            .or_default()
            .push(registration);
        self
    }
}

impl HandlerResolver for HandlerRegistry {
    fn resolve_one(&self, contract: TypeId, contract_name: &'static str) -> Option<Instance> {
        let registrations = self.entries.get(&contract)?;
        if registrations.len() > 1 {
            tracing::debug!(
                contract = contract_name,
                registrations = registrations.len(),
                "several implementations registered; using the last one"
            );
        }
        registrations.last().map(Registration::resolve)
    }

    fn resolve_all(&self, contract: TypeId, _contract_name: &'static str) -> Vec<Instance> {
        self.entries
            .get(&contract)
            .map(|registrations| registrations.iter().map(Registration::resolve).collect())
            .unwrap_or_default()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("contracts", &self.entries.len())
            .finish()
    }
}
