//! Plugin-based provider registry
//!
//! The registry lets race data providers and stores be registered at runtime,
//! so the binary resolves `"type"` tags from configuration without if-else
//! chains.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gridpick_core::registry::ProviderRegistry;
//!
//! let registry = ProviderRegistry::with_builtin_stores();
//! gridpick_provider_jolpica::register(&registry);
//!
//! let provider = registry.create_provider(&config.provider)?;
//! let store = registry.create_store(&config.store).await?;
//! ```
//!
//! ## Registration
//!
//! Provider crates register themselves:
//!
//! ```rust,ignore
//! pub fn register(registry: &ProviderRegistry) {
//!     registry.register_provider("jolpica", Box::new(JolpicaFactory));
//! }
//! ```

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::{ProviderConfig, StoreConfig};
use crate::error::{Error, Result};
use crate::state::{FileStoreFactory, MemoryStoreFactory};
use crate::traits::{RaceDataProvider, RaceDataProviderFactory, StateStore, StateStoreFactory};

/// Registry of provider and store factories keyed by type name
///
/// ## Thread Safety
///
/// Interior mutability with `RwLock`: concurrent reads, exclusive writes.
#[derive(Default)]
pub struct ProviderRegistry {
    /// Registered race data provider factories
    providers: RwLock<HashMap<String, Box<dyn RaceDataProviderFactory>>>,

    /// Registered store factories
    stores: RwLock<HashMap<String, Arc<dyn StateStoreFactory>>>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the `memory` and `file` stores registered
    pub fn with_builtin_stores() -> Self {
        let registry = Self::new();
        registry.register_store("memory", Box::new(MemoryStoreFactory));
        registry.register_store("file", Box::new(FileStoreFactory));
        registry
    }

    /// Register a race data provider factory
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use gridpick_core::registry::ProviderRegistry;
    /// # use gridpick_core::traits::{RaceDataProvider, RaceDataProviderFactory};
    /// # struct MyFactory;
    /// # impl RaceDataProviderFactory for MyFactory {
    /// #     fn create(&self, config: &gridpick_core::config::ProviderConfig) -> gridpick_core::Result<Box<dyn RaceDataProvider>> { unimplemented!() }
    /// # }
    /// let registry = ProviderRegistry::new();
    /// registry.register_provider("myprovider", Box::new(MyFactory));
    /// ```
    pub fn register_provider(
        &self,
        name: impl Into<String>,
        factory: Box<dyn RaceDataProviderFactory>,
    ) {
        write(&self.providers).insert(name.into(), factory);
    }

    /// Register a store factory
    pub fn register_store(&self, name: impl Into<String>, factory: Box<dyn StateStoreFactory>) {
        write(&self.stores).insert(name.into(), Arc::from(factory));
    }

    /// Create a race data provider from configuration
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if the provider type is not registered, or whatever
    /// the factory returns.
    pub fn create_provider(&self, config: &ProviderConfig) -> Result<Arc<dyn RaceDataProvider>> {
        let provider_type = config.type_name();
        let providers = read(&self.providers);

        let factory = providers
            .get(provider_type)
            .ok_or_else(|| Error::config(format!("Unknown provider type: {}", provider_type)))?;

        factory.create(config).map(Arc::from)
    }

    /// Create a store from configuration
    pub async fn create_store(&self, config: &StoreConfig) -> Result<Arc<dyn StateStore>> {
        let store_type = config.type_name();

        // Release the lock before the async create
        let factory = read(&self.stores)
            .get(store_type)
            .cloned()
            .ok_or_else(|| Error::config(format!("Unknown store type: {}", store_type)))?;

        factory.create(config).await
    }

    /// List all registered provider types
    pub fn list_providers(&self) -> Vec<String> {
        read(&self.providers).keys().cloned().collect()
    }

    /// List all registered store types
    pub fn list_stores(&self) -> Vec<String> {
        read(&self.stores).keys().cloned().collect()
    }

    /// Check if a provider type is registered
    pub fn has_provider(&self, name: &str) -> bool {
        read(&self.providers).contains_key(name)
    }

    /// Check if a store type is registered
    pub fn has_store(&self, name: &str) -> bool {
        read(&self.stores).contains_key(name)
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.list_providers())
            .field("stores", &self.list_stores())
            .finish()
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}
