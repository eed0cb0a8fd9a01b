use std::any::type_name;

use derivative::Derivative;
use tracing::{debug, trace};

use crate::dense_map::DenseMap;
use crate::entities::EntityStorage;
use crate::entity::{Entity, EntityVersion};
use crate::storage::{Component, ComponentStorage, ErasedStorage};
use crate::view::{View, ViewExclude, ViewGet};
use crate::Error;

#[cfg(feature = "signals")]
use crate::signal::Sink;

/// Stable per-type identity within one process.
pub type TypeHash = u64;

/// Hash of the compiler-provided type name. Distinct component types must
/// map to distinct hashes; a collision trips the downcast check in
/// [`Registry::assure`].
pub fn type_hash<T: 'static>() -> TypeHash {
    fxhash::hash64(type_name::<T>())
}

/// The facade owning every component pool plus the authoritative entity
/// storage.
///
/// Pools spring into existence the first time a component type is touched
/// and live as long as the registry. All operations are single-threaded;
/// callers needing concurrency serialise externally.
#[derive(Derivative)]
#[derivative(Debug, Default)]
pub struct Registry {
    #[derivative(Debug = "ignore")]
    pools: DenseMap<TypeHash, Box<dyn ErasedStorage>>,
    entities: EntityStorage,
}

impl Registry {
    pub fn new() -> Self {
        debug!("registry created");
        Self::default()
    }

    /// The pool of `T`, created on first touch. Component hooks are
    /// connected exactly once, when the pool is born.
    pub fn assure<T: Component>(&mut self) -> &mut T::Storage {
        let hash = type_hash::<T>();
        let pool = self.pools.get_or_insert_with(hash, || {
            debug!(component = type_name::<T>(), "component pool created");
            let storage = Box::new(T::Storage::default());
            #[cfg(feature = "signals")]
            let storage = {
                let mut storage = storage;
                if let Some(hook) = T::construct_hook() {
                    storage.on_construct().connect(hook);
                }
                if let Some(hook) = T::destroy_hook() {
                    storage.on_destroy().connect(hook);
                }
                if let Some(hook) = T::update_hook() {
                    storage.on_update().connect(hook);
                }
                storage
            };
            storage as Box<dyn ErasedStorage>
        });
        match pool.downcast_mut::<T::Storage>() {
            Some(storage) => storage,
            None => panic!("component type hash collision on {}", type_name::<T>()),
        }
    }

    /// The pool of `T`, if it exists already.
    pub fn storage<T: Component>(&self) -> Option<&T::Storage> {
        self.pools.get(&type_hash::<T>()).map(|pool| {
            pool.downcast_ref::<T::Storage>()
                .expect("component type hash collision")
        })
    }

    pub fn storage_mut<T: Component>(&mut self) -> Option<&mut T::Storage> {
        match self.pools.get_mut(&type_hash::<T>()) {
            Some(pool) => Some(
                pool.downcast_mut::<T::Storage>()
                    .expect("component type hash collision"),
            ),
            None => None,
        }
    }

    // -- entity lifecycle ---------------------------------------------------

    pub fn create(&mut self) -> Entity {
        let entity = self.entities.emplace();
        trace!(entity = %entity, "entity created");
        entity
    }

    /// Non-panicking form of [`create`](Self::create); fails once every id
    /// below `ID_MAX` is alive.
    pub fn try_create(&mut self) -> Result<Entity, Error> {
        self.entities.try_emplace()
    }

    /// Re-introduces a destroyed id at the hinted version, or returns the
    /// live handle for that id unchanged. Hinting an id that was never
    /// issued is a precondition violation.
    pub fn create_hint(&mut self, hint: Entity) -> Entity {
        let entity = self.entities.emplace_hint(hint);
        trace!(entity = %entity, "entity created from hint");
        entity
    }

    /// Fills `out` with freshly created entities.
    pub fn create_many(&mut self, out: &mut [Entity]) {
        for slot in out {
            *slot = self.entities.emplace();
        }
    }

    /// Removes `entity` from every pool, then destroys the handle. Returns
    /// the bumped version now current for its id. Destruction signals fire
    /// in pool creation order.
    pub fn destroy(&mut self, entity: Entity) -> EntityVersion {
        debug_assert!(self.valid(entity), "destroying an invalid entity");
        for pool in self.pools.values_mut() {
            pool.pop_entity(entity);
        }
        self.entities.erase(entity);
        trace!(entity = %entity, "entity destroyed");
        self.entities
            .current(entity.id())
            .expect("destroyed id must remain in the cemetery")
    }

    pub fn destroy_many<I: IntoIterator<Item = Entity>>(&mut self, entities: I) {
        for entity in entities {
            self.destroy(entity);
        }
    }

    pub fn valid(&self, entity: Entity) -> bool {
        self.entities.contains(entity)
    }

    /// Version currently associated with the id of `entity`, dead or
    /// alive. `None` for ids never issued.
    pub fn current(&self, entity: Entity) -> Option<EntityVersion> {
        self.entities.current(entity.id())
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn alive(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entities.iter()
    }

    // -- component CRUD -----------------------------------------------------

    /// Attaches `value` to `entity`. A duplicate emplace keeps the existing
    /// value and drops the incoming one.
    pub fn emplace<T: Component>(&mut self, entity: Entity, value: T) -> &mut T {
        debug_assert!(self.valid(entity), "invalid entity");
        self.assure::<T>().emplace(entity, value).0
    }

    pub fn emplace_or_replace<T: Component>(&mut self, entity: Entity, value: T) -> &mut T {
        debug_assert!(self.valid(entity), "invalid entity");
        self.assure::<T>().emplace_or_replace(entity, value).0
    }

    /// Overwrites an existing component. The entity must own one.
    pub fn replace<T: Component>(&mut self, entity: Entity, value: T) -> &mut T {
        self.assure::<T>().replace(entity, value)
    }

    /// Applies `f` to the component of `entity`; the preferred mutator.
    /// Fires the update signal exactly once.
    pub fn patch<T: Component>(&mut self, entity: Entity, f: impl FnOnce(&mut T)) -> &mut T {
        self.assure::<T>().patch(entity, f)
    }

    /// Removes the component of `T` if present. `true` when something was
    /// actually removed.
    pub fn remove<T: Component>(&mut self, entity: Entity) -> bool {
        self.assure::<T>().remove(entity)
    }

    /// Removes a whole set of component types, e.g.
    /// `remove_many::<(A, B)>(entity)`. Returns how many pools removed
    /// something.
    pub fn remove_many<S: ComponentSet>(&mut self, entity: Entity) -> usize {
        S::remove_from(self, entity)
    }

    /// Asserting removal: the entity must own the component.
    pub fn erase<T: Component>(&mut self, entity: Entity) {
        let removed = self.remove::<T>(entity);
        assert!(removed, "erasing a component the entity does not own");
    }

    pub fn erase_many<S: ComponentSet>(&mut self, entity: Entity) {
        S::erase_from(self, entity);
    }

    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        self.storage::<T>()
            .map_or(false, |storage| storage.contains_entity(entity))
    }

    /// `all_of::<(A, B)>(entity)` — the entity owns every listed type.
    pub fn all_of<S: ComponentSet>(&self, entity: Entity) -> bool {
        S::all_of(self, entity)
    }

    /// `any_of::<(A, B)>(entity)` — the entity owns at least one of them.
    pub fn any_of<S: ComponentSet>(&self, entity: Entity) -> bool {
        S::any_of(self, entity)
    }

    /// Component of `T` owned by `entity`; panics when absent.
    pub fn get<T: Component>(&self, entity: Entity) -> &T {
        self.try_get::<T>(entity)
            .expect("entity does not own the requested component")
    }

    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> &mut T {
        self.try_get_mut::<T>(entity)
            .expect("entity does not own the requested component")
    }

    pub fn try_get<T: Component>(&self, entity: Entity) -> Option<&T> {
        self.storage::<T>()?.get(entity)
    }

    pub fn try_get_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        self.storage_mut::<T>()?.get_mut(entity)
    }

    /// Multi-component lookup, e.g. `get_all::<(A, B)>(entity)` yielding
    /// `(&A, &B)`. Panics when any component is absent.
    pub fn get_all<'a, S: MultiGet<'a>>(&'a self, entity: Entity) -> S::Refs {
        S::fetch(self, entity)
    }

    pub fn try_get_all<'a, S: MultiGet<'a>>(&'a self, entity: Entity) -> Option<S::Refs> {
        S::try_fetch(self, entity)
    }

    /// Existing component or a freshly emplaced `value`.
    pub fn get_or_emplace<T: Component>(&mut self, entity: Entity, value: T) -> &mut T {
        debug_assert!(self.valid(entity), "invalid entity");
        self.assure::<T>().get_or_insert_with(entity, move || value)
    }

    /// Bulk attach of one cloned value per entity.
    pub fn insert<T, I>(&mut self, entities: I, value: T)
    where
        T: Component + Clone,
        I: IntoIterator<Item = Entity>,
    {
        self.assure::<T>().insert(entities, value);
    }

    /// Bulk attach zipping entities with values.
    pub fn insert_from<T, I, C>(&mut self, entities: I, values: C)
    where
        T: Component,
        I: IntoIterator<Item = Entity>,
        C: IntoIterator<Item = T>,
    {
        self.assure::<T>().insert_from(entities, values);
    }

    /// Number of pools holding a component for `entity`.
    pub fn element_count(&self, entity: Entity) -> usize {
        debug_assert!(self.valid(entity), "invalid entity");
        self.pools
            .values()
            .filter(|pool| pool.contains_entity(entity))
            .count()
    }

    /// True when no pool holds anything for `entity`.
    pub fn orphan(&self, entity: Entity) -> bool {
        debug_assert!(self.valid(entity), "invalid entity");
        self.pools
            .values()
            .all(|pool| !pool.contains_entity(entity))
    }

    /// Drops every component of `T`.
    pub fn clear<T: Component>(&mut self) {
        self.assure::<T>().wipe();
    }

    /// Drops every component of every type, then every entity. Ids restart
    /// from zero.
    pub fn clear_all(&mut self) {
        for pool in self.pools.values_mut() {
            pool.wipe();
        }
        self.entities.clear();
    }

    // -- signals ------------------------------------------------------------

    #[cfg(feature = "signals")]
    pub fn on_construct<T: Component>(&mut self) -> Sink<'_, Entity> {
        self.assure::<T>().on_construct()
    }

    #[cfg(feature = "signals")]
    pub fn on_destroy<T: Component>(&mut self) -> Sink<'_, Entity> {
        self.assure::<T>().on_destroy()
    }

    #[cfg(feature = "signals")]
    pub fn on_update<T: Component>(&mut self) -> Sink<'_, Entity> {
        self.assure::<T>().on_update()
    }

    // -- views --------------------------------------------------------------

    /// Lazy join over the entities owning every component in `G`, e.g.
    /// `view::<(A, B)>()`.
    pub fn view<'a, G: ViewGet<'a>>(&'a self) -> View<'a, G, ()> {
        View::new(self)
    }

    /// As [`view`](Self::view), minus the entities owning any component in
    /// `X`.
    pub fn view_exclude<'a, G: ViewGet<'a>, X: ViewExclude<'a>>(&'a self) -> View<'a, G, X> {
        View::new(self)
    }
}

/// A compile-time list of component types usable with
/// [`Registry::remove_many`], [`Registry::all_of`] and friends.
/// Implemented for tuples of up to five components.
pub trait ComponentSet {
    fn remove_from(registry: &mut Registry, entity: Entity) -> usize;
    fn erase_from(registry: &mut Registry, entity: Entity);
    fn all_of(registry: &Registry, entity: Entity) -> bool;
    fn any_of(registry: &Registry, entity: Entity) -> bool;
}

/// Multi-component shared lookup for [`Registry::get_all`].
pub trait MultiGet<'a>: Sized {
    type Refs;

    fn fetch(registry: &'a Registry, entity: Entity) -> Self::Refs;
    fn try_fetch(registry: &'a Registry, entity: Entity) -> Option<Self::Refs>;
}

macro_rules! impl_component_tuple {
    ( $( $ty:ident ),+ ) => {
        impl<$( $ty: Component ),+> ComponentSet for ($( $ty, )+) {
            fn remove_from(registry: &mut Registry, entity: Entity) -> usize {
                0 $( + registry.remove::<$ty>(entity) as usize )+
            }

            fn erase_from(registry: &mut Registry, entity: Entity) {
                $( registry.erase::<$ty>(entity); )+
            }

            fn all_of(registry: &Registry, entity: Entity) -> bool {
                $( registry.has::<$ty>(entity) )&&+
            }

            fn any_of(registry: &Registry, entity: Entity) -> bool {
                $( registry.has::<$ty>(entity) )||+
            }
        }

        impl<'a, $( $ty: Component ),+> MultiGet<'a> for ($( $ty, )+) {
            type Refs = ($( &'a $ty, )+);

            fn fetch(registry: &'a Registry, entity: Entity) -> Self::Refs {
                ($( registry.get::<$ty>(entity), )+)
            }

            fn try_fetch(registry: &'a Registry, entity: Entity) -> Option<Self::Refs> {
                Some(($( registry.try_get::<$ty>(entity)?, )+))
            }
        }
    };
}

impl_component_tuple!(A);
impl_component_tuple!(A, B);
impl_component_tuple!(A, B, C);
impl_component_tuple!(A, B, C, D);
impl_component_tuple!(A, B, C, D, E);
