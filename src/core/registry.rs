//! Typed, hierarchical dependency registry
//!
//! A [`Registry`] maps capability types to values or lazily-invoked factories.
//! The server owns one registry for its whole lifetime; each request gets a
//! child created with [`Registry::extend`] that may shadow server bindings
//! without touching them.

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::error::RegistryError;

type Instance = Arc<dyn Any + Send + Sync>;
type Factory = Box<dyn Fn() -> Instance + Send + Sync>;

enum Provider {
    Value(Instance),
    Factory {
        factory: Factory,
        resolved: OnceLock<Instance>,
    },
}

/// A single capability binding.
pub struct Binding {
    key: TypeId,
    type_name: &'static str,
    provider: Provider,
}

impl Binding {
    pub fn value<T: Send + Sync + 'static>(value: T) -> Self {
        Self {
            key: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            provider: Provider::Value(Arc::new(value)),
        }
    }

    /// Bind an already shared value; lookups return this same `Arc`.
    pub fn shared<T: Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self {
            key: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            provider: Provider::Value(value as Instance),
        }
    }

    pub fn lazy<T, F>(factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            key: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            provider: Provider::Factory {
                factory: Box::new(move || Arc::new(factory()) as Instance),
                resolved: OnceLock::new(),
            },
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    // Factories run at most once per binding, and bindings are owned by a
    // single registry level.
    fn resolve(&self) -> Instance {
        match &self.provider {
            Provider::Value(value) => Arc::clone(value),
            Provider::Factory { factory, resolved } => Arc::clone(resolved.get_or_init(|| factory())),
        }
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.provider {
            Provider::Value(_) => "value",
            Provider::Factory { resolved, .. } if resolved.get().is_some() => "factory(resolved)",
            Provider::Factory { .. } => "factory",
        };
        f.debug_struct("Binding")
            .field("type", &self.type_name)
            .field("provider", &kind)
            .finish()
    }
}

/// Bindings to add on top of an existing registry.
///
/// Adding a type that is already present replaces the earlier entry, so a
/// level never holds two bindings for one type.
#[derive(Debug, Default)]
pub struct Bindings {
    entries: Vec<Binding>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// A set holding exactly one value.
    pub fn single<T: Send + Sync + 'static>(value: T) -> Self {
        Self::new().with(value)
    }

    pub fn with<T: Send + Sync + 'static>(mut self, value: T) -> Self {
        self.push(Binding::value(value));
        self
    }

    pub fn with_shared<T: Send + Sync + 'static>(mut self, value: Arc<T>) -> Self {
        self.push(Binding::shared(value));
        self
    }

    pub fn with_lazy<T, F>(mut self, factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.push(Binding::lazy(factory));
        self
    }

    pub fn push(&mut self, binding: Binding) {
        self.entries.retain(|existing| existing.key != binding.key);
        self.entries.push(binding);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Ordered collection of typed bindings with an optional parent.
#[derive(Debug, Default)]
pub struct Registry {
    entries: Vec<Binding>,
    parent: Option<Arc<Registry>>,
}

impl Registry {
    /// Create an empty root registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a root registry in a closure, stopping at the first error.
    ///
    /// ```ignore
    /// let registry = Registry::of(|r| {
    ///     r.add(Greeter("hi"))?;
    ///     r.add_lazy(|| Clock::system())?;
    ///     Ok(())
    /// })?;
    /// ```
    pub fn of<F>(build: F) -> Result<Self, RegistryError>
    where
        F: FnOnce(&mut Registry) -> Result<(), RegistryError>,
    {
        let mut registry = Self::new();
        build(&mut registry)?;
        Ok(registry)
    }

    /// Bind a precomputed value.
    pub fn add<T: Send + Sync + 'static>(&mut self, value: T) -> Result<&mut Self, RegistryError> {
        self.insert(Binding::value(value))
    }

    pub fn add_shared<T: Send + Sync + 'static>(
        &mut self,
        value: Arc<T>,
    ) -> Result<&mut Self, RegistryError> {
        self.insert(Binding::shared(value))
    }

    /// Bind a factory, invoked on first lookup.
    pub fn add_lazy<T, F>(&mut self, factory: F) -> Result<&mut Self, RegistryError>
    where
        T: Send + Sync + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.insert(Binding::lazy(factory))
    }

    /// Bind a prepared [`Binding`], refusing duplicates at this level.
    pub fn insert(&mut self, binding: Binding) -> Result<&mut Self, RegistryError> {
        if self.entries.iter().any(|existing| existing.key == binding.key) {
            return Err(RegistryError::DuplicateBinding {
                type_name: binding.type_name,
            });
        }
        self.entries.push(binding);
        Ok(self)
    }

    /// Resolve `T`, searching this level first and then the parents.
    pub fn get<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, RegistryError> {
        self.maybe_get::<T>().ok_or(RegistryError::UnresolvedType {
            type_name: type_name::<T>(),
        })
    }

    /// Resolve `T` if any level binds it.
    pub fn maybe_get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        let key = TypeId::of::<T>();
        let binding = self.find(key)?;
        binding.resolve().downcast::<T>().ok()
    }

    /// Whether any level binds `T`.
    pub fn contains<T: 'static>(&self) -> bool {
        self.find(TypeId::of::<T>()).is_some()
    }

    /// Create a child registry whose bindings shadow this one.
    pub fn extend(self: &Arc<Self>, bindings: Bindings) -> Registry {
        Registry {
            entries: bindings.entries,
            parent: Some(Arc::clone(self)),
        }
    }

    pub fn parent(&self) -> Option<&Arc<Registry>> {
        self.parent.as_ref()
    }

    /// Number of bindings at this level only.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Type names bound at this level, in registration order.
    pub fn type_names(&self) -> Vec<&'static str> {
        self.entries.iter().map(Binding::type_name).collect()
    }

    fn find(&self, key: TypeId) -> Option<&Binding> {
        let mut level = Some(self);
        while let Some(registry) = level {
            if let Some(binding) = registry.entries.iter().find(|b| b.key == key) {
                return Some(binding);
            }
            level = registry.parent.as_deref();
        }
        None
    }
}
