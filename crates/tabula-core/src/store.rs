//! Runtime configuration store.
//!
//! A [`ConfigStore`] owns one decoded container and a type-keyed registry of
//! derived indices. Each index is built from the container the first time it
//! is requested (or eagerly, if it is on the warm list) and then shared for
//! the lifetime of the store. Construction goes through a [`OnceLock`], so
//! concurrent first requests observe exactly one build and the same
//! [`Arc`].
//!
//! Consumers extend generated indices with post-construction hooks
//! registered on the [`StoreBuilder`]; generated code is never edited.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use crate::codec::{self, DeserializeError};
use crate::index::{ConfigIndex, DuplicateKeyError};
use crate::record::ConfigContainer;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors returned by the runtime store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested index type was never registered. This is a wiring bug
    /// in the caller, not a data problem.
    #[error("index type {type_name} is not registered with the config store")]
    TypeNotRegistered { type_name: &'static str },

    /// The index exists but could not be built from the loaded data.
    #[error("failed to build index {index}: {source}")]
    IndexBuild {
        index: &'static str,
        source: DuplicateKeyError,
    },

    /// The snapshot could not be loaded.
    #[error(transparent)]
    Snapshot(#[from] DeserializeError),
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

type ErasedIndex = Arc<dyn Any + Send + Sync>;
type BuildFn<C> =
    Box<dyn Fn(&C) -> Result<Box<dyn Any + Send + Sync>, DuplicateKeyError> + Send + Sync>;
type HookFn<C> = Box<dyn Fn(&mut (dyn Any + Send + Sync), &C) + Send + Sync>;

struct Slot<C> {
    type_name: &'static str,
    build: BuildFn<C>,
    hooks: Vec<HookFn<C>>,
    cell: OnceLock<Result<ErasedIndex, DuplicateKeyError>>,
}

impl<C> Slot<C> {
    fn force(&self, container: &C) -> Result<ErasedIndex, StoreError> {
        self.cell
            .get_or_init(|| {
                tracing::debug!(index = self.type_name, "building config index");
                let mut built = (self.build)(container)?;
                for hook in &self.hooks {
                    hook(&mut *built, container);
                }
                Ok(Arc::from(built))
            })
            .clone()
            .map_err(|source| StoreError::IndexBuild {
                index: self.type_name,
                source,
            })
    }
}

/// Index builders keyed by index type.
///
/// Generated containers fill this in [`ConfigContainer::register_indices`];
/// hand-written indices can be added through [`StoreBuilder::register`].
pub struct IndexRegistry<C> {
    slots: HashMap<TypeId, Slot<C>>,
}

impl<C: 'static> Default for IndexRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: 'static> IndexRegistry<C> {
    pub fn new() -> Self {
        Self {
            slots: HashMap::new(),
        }
    }

    /// Register an index type built by its [`ConfigIndex`] impl.
    pub fn register<T: ConfigIndex<C>>(&mut self) -> &mut Self {
        self.register_with::<T, _>(T::build)
    }

    /// Register an index type with an explicit builder.
    ///
    /// Registering the same type twice replaces the earlier builder.
    pub fn register_with<T, F>(&mut self, build: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&C) -> Result<T, DuplicateKeyError> + Send + Sync + 'static,
    {
        let build: BuildFn<C> = Box::new(move |container| {
            build(container).map(|index| Box::new(index) as Box<dyn Any + Send + Sync>)
        });
        self.slots.insert(
            TypeId::of::<T>(),
            Slot {
                type_name: type_name::<T>(),
                build,
                hooks: Vec::new(),
                cell: OnceLock::new(),
            },
        );
        self
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.slots.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Registered index type names, sorted.
    pub fn type_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.slots.values().map(|s| s.type_name).collect();
        names.sort_unstable();
        names
    }

    fn slot(&self, id: TypeId, type_name: &'static str) -> Result<&Slot<C>, StoreError> {
        self.slots
            .get(&id)
            .ok_or(StoreError::TypeNotRegistered { type_name })
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

struct PendingHook<C> {
    id: TypeId,
    type_name: &'static str,
    hook: HookFn<C>,
}

/// Configures a [`ConfigStore`] before the snapshot is loaded.
pub struct StoreBuilder<C> {
    registry: IndexRegistry<C>,
    hooks: Vec<PendingHook<C>>,
    warm: Vec<(TypeId, &'static str)>,
}

impl<C: ConfigContainer> Default for StoreBuilder<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ConfigContainer> StoreBuilder<C> {
    /// Start from the container's generated index registrations.
    pub fn new() -> Self {
        let mut registry = IndexRegistry::new();
        C::register_indices(&mut registry);
        Self {
            registry,
            hooks: Vec::new(),
            warm: Vec::new(),
        }
    }

    /// Register an additional, hand-written index type.
    pub fn register<T: ConfigIndex<C>>(mut self) -> Self {
        self.registry.register::<T>();
        self
    }

    /// Run `hook` on every freshly built `T`, before it is published.
    pub fn on_built<T, F>(mut self, hook: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&mut T, &C) + Send + Sync + 'static,
    {
        self.hooks.push(PendingHook {
            id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            hook: Box::new(move |index, container| {
                if let Some(index) = index.downcast_mut::<T>() {
                    hook(index, container);
                }
            }),
        });
        self
    }

    /// Build `T` during initialization instead of on first access.
    pub fn warm<T: Send + Sync + 'static>(mut self) -> Self {
        self.warm.push((TypeId::of::<T>(), type_name::<T>()));
        self
    }

    /// Decode the snapshot at `path` and build the store.
    pub fn open(self, path: impl AsRef<Path>) -> Result<ConfigStore<C>, StoreError> {
        let path = path.as_ref();
        let container: C = codec::read_snapshot(path)?;
        tracing::info!(
            path = %path.display(),
            session = C::SESSION_TAG,
            tables = C::TABLES.len(),
            "loaded config snapshot"
        );
        self.build(container)
    }

    /// Build the store around an already decoded container.
    ///
    /// Hooks or warm entries naming an unregistered type are wiring errors
    /// and fail the build. An index on the warm list that fails to build is
    /// logged; the failure is cached and returned by later `get_config`
    /// calls while every other index stays available.
    pub fn build(self, container: C) -> Result<ConfigStore<C>, StoreError> {
        let StoreBuilder {
            mut registry,
            hooks,
            warm,
        } = self;

        for pending in hooks {
            let slot = registry
                .slots
                .get_mut(&pending.id)
                .ok_or(StoreError::TypeNotRegistered {
                    type_name: pending.type_name,
                })?;
            slot.hooks.push(pending.hook);
        }

        let store = ConfigStore {
            container: Arc::new(container),
            registry,
        };

        for (id, type_name) in warm {
            let slot = store.registry.slot(id, type_name)?;
            if let Err(e) = slot.force(&store.container) {
                tracing::warn!(index = type_name, error = %e, "warm index build failed");
            }
        }

        Ok(store)
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Loaded configuration plus lazily built indices.
pub struct ConfigStore<C> {
    container: Arc<C>,
    registry: IndexRegistry<C>,
}

impl<C: ConfigContainer> ConfigStore<C> {
    /// Load the snapshot at `path` with the generated index registrations.
    pub fn init(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        StoreBuilder::new().open(path)
    }

    pub fn builder() -> StoreBuilder<C> {
        StoreBuilder::new()
    }

    /// Wrap an in-memory container with the generated index registrations.
    pub fn from_container(container: C) -> Self {
        let mut registry = IndexRegistry::new();
        C::register_indices(&mut registry);
        Self {
            container: Arc::new(container),
            registry,
        }
    }

    pub fn container(&self) -> &C {
        &self.container
    }

    pub fn shared_container(&self) -> Arc<C> {
        Arc::clone(&self.container)
    }

    /// The index of type `T`, built on first access and cached.
    pub fn get_config<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, StoreError> {
        let slot = self.registry.slot(TypeId::of::<T>(), type_name::<T>())?;
        let erased = slot.force(&self.container)?;
        // The slot is keyed by `TypeId::of::<T>()` and only ever stores a `T`.
        match erased.downcast::<T>() {
            Ok(index) => Ok(index),
            Err(_) => unreachable!("index slot for {} holds another type", type_name::<T>()),
        }
    }

    /// Whether `T` has already been built (successfully or not).
    pub fn is_built<T: 'static>(&self) -> bool {
        self.registry
            .slots
            .get(&TypeId::of::<T>())
            .is_some_and(|slot| slot.cell.get().is_some())
    }

    pub fn registry(&self) -> &IndexRegistry<C> {
        &self.registry
    }
}

impl<C> fmt::Debug for ConfigStore<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.registry.slots.values().map(|s| s.type_name).collect();
        names.sort_unstable();
        f.debug_struct("ConfigStore")
            .field("indices", &names)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
