use std::any::type_name;
use std::cmp::Ordering;
use std::slice;

use derivative::Derivative;
use downcast_rs::{impl_downcast, Downcast};
use itertools::izip;
#[cfg(feature = "signals")]
use smallvec::SmallVec;

use crate::entity::Entity;
use crate::sparse_set::SparseSet;

#[cfg(feature = "signals")]
use crate::signal::{Signal, Sink};

/// Plain data attachable to entities.
///
/// The associated storage selects the pool layout: [`Storage`] for value
/// components, [`NullStorage`] for zero-sized tags. The hook functions, when
/// overridden to return `Some`, are connected to the matching pool signal
/// the first time the registry creates the pool.
pub trait Component: Sized + 'static {
    type Storage: ComponentStorage<Self>;

    fn construct_hook() -> Option<fn(Entity)> {
        None
    }

    fn destroy_hook() -> Option<fn(Entity)> {
        None
    }

    fn update_hook() -> Option<fn(Entity)> {
        None
    }
}

/// Type-erased contract shared by every pool, entity-self storage included.
/// This is what the registry's pool map and the view machinery program
/// against when the component type is out of reach.
pub trait ErasedStorage: Downcast {
    /// The sparse index backing the pool.
    fn raw(&self) -> &SparseSet;

    /// Removes `entity` if present; absence is a no-op.
    fn pop_entity(&mut self, entity: Entity) -> bool;

    /// Drops every element of the pool.
    fn wipe(&mut self);

    fn len(&self) -> usize {
        self.raw().len()
    }

    fn is_empty(&self) -> bool {
        self.raw().is_empty()
    }

    fn contains_entity(&self, entity: Entity) -> bool {
        self.raw().contains(entity)
    }

    fn stored_type_name(&self) -> &'static str;
}

impl_downcast!(ErasedStorage);

/// Typed contract the registry forwards component CRUD through.
pub trait ComponentStorage<T>: ErasedStorage + Default {
    /// Inserts `value` for `entity` unless the entity already owns one.
    /// Returns the stored value and whether a new entry was created; on a
    /// duplicate the incoming value is dropped and the existing one is
    /// left untouched.
    fn emplace(&mut self, entity: Entity, value: T) -> (&mut T, bool);

    /// Inserts or overwrites. `true` means a new entry was created.
    fn emplace_or_replace(&mut self, entity: Entity, value: T) -> (&mut T, bool);

    /// Overwrites an existing value. The entity must be present.
    fn replace(&mut self, entity: Entity, value: T) -> &mut T;

    /// Applies `f` to the stored value. The entity must be present. The
    /// update signal fires exactly once per call.
    fn patch(&mut self, entity: Entity, f: impl FnOnce(&mut T)) -> &mut T;

    fn get(&self, entity: Entity) -> Option<&T>;

    fn get_mut(&mut self, entity: Entity) -> Option<&mut T>;

    /// Default-inserting lookup.
    fn get_or_insert_with(&mut self, entity: Entity, default: impl FnOnce() -> T) -> &mut T;

    /// Removes `entity` if present; absence is a no-op.
    fn remove(&mut self, entity: Entity) -> bool;

    /// Bulk insert of one cloned value per entity.
    fn insert<I>(&mut self, entities: I, value: T)
    where
        I: IntoIterator<Item = Entity>,
        T: Clone,
    {
        for entity in entities {
            self.emplace(entity, value.clone());
        }
    }

    /// Bulk insert zipping entities with their values.
    fn insert_from<I, C>(&mut self, entities: I, values: C)
    where
        I: IntoIterator<Item = Entity>,
        C: IntoIterator<Item = T>,
    {
        for (entity, value) in entities.into_iter().zip(values) {
            self.emplace(entity, value);
        }
    }

    #[cfg(feature = "signals")]
    fn on_construct(&mut self) -> Sink<'_, Entity>;

    #[cfg(feature = "signals")]
    fn on_destroy(&mut self) -> Sink<'_, Entity>;

    #[cfg(feature = "signals")]
    fn on_update(&mut self) -> Sink<'_, Entity>;
}

/// One signal per pool event. Construction fires after the entity and its
/// value are in place, destruction before removal (listeners can still read
/// the value), update after a patch has run.
#[cfg(feature = "signals")]
#[derive(Debug, Default)]
pub(crate) struct StorageSignals {
    pub(crate) construction: Signal<Entity>,
    pub(crate) destruction: Signal<Entity>,
    pub(crate) update: Signal<Entity>,
}

/// Value-component pool: a sparse index plus a parallel payload array.
///
/// `payload[k]` belongs to `entities()[k]` at all times; swap-removal swaps
/// both arrays in lockstep. Pointer stability is *not* provided — a sparse
/// lookup is the stable way to reach a value after structural mutation.
#[derive(Derivative)]
#[derivative(Debug(bound = ""), Default(bound = ""))]
pub struct Storage<T> {
    index: SparseSet,
    #[derivative(Debug = "ignore")]
    payload: Vec<T>,
    #[cfg(feature = "signals")]
    signals: StorageSignals,
}

impl<T: 'static> Storage<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        debug_assert_eq!(self.index.len(), self.payload.len());
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.payload.capacity()
    }

    pub fn reserve(&mut self, additional: usize) {
        self.index.reserve(additional);
        self.payload.reserve(additional);
    }

    pub fn entities(&self) -> &[Entity] {
        self.index.entities()
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.index.contains(entity)
    }

    /// Destruction signal, then lockstep swap-removal of both arrays.
    fn swap_and_pop(&mut self, index: usize) -> T {
        #[cfg(feature = "signals")]
        {
            let entity = self.index.entities()[index];
            self.signals.destruction.emit(entity);
        }
        self.index.swap_and_pop(index);
        self.payload.swap_remove(index)
    }

    #[cfg(feature = "signals")]
    fn replay_construction(&mut self, from: usize) {
        if self.signals.construction.is_empty() {
            return;
        }
        let fresh: SmallVec<[Entity; 16]> = self.index.entities()[from..].iter().copied().collect();
        for entity in fresh {
            self.signals.construction.emit(entity);
        }
    }

    #[cfg(not(feature = "signals"))]
    fn replay_construction(&mut self, _from: usize) {}

    pub fn emplace(&mut self, entity: Entity, value: T) -> (&mut T, bool) {
        debug_assert!(!entity.is_null());
        let (index, inserted) = self.index.push(entity);
        if inserted {
            self.payload.push(value);
            #[cfg(feature = "signals")]
            self.signals.construction.emit(entity);
        }
        (&mut self.payload[index], inserted)
    }

    pub fn emplace_or_replace(&mut self, entity: Entity, value: T) -> (&mut T, bool) {
        debug_assert!(!entity.is_null());
        let (index, inserted) = self.index.push(entity);
        if inserted {
            self.payload.push(value);
            #[cfg(feature = "signals")]
            self.signals.construction.emit(entity);
        } else {
            self.payload[index] = value;
            #[cfg(feature = "signals")]
            self.signals.update.emit(entity);
        }
        (&mut self.payload[index], inserted)
    }

    pub fn replace(&mut self, entity: Entity, value: T) -> &mut T {
        let index = self.index.index(entity);
        self.payload[index] = value;
        #[cfg(feature = "signals")]
        self.signals.update.emit(entity);
        &mut self.payload[index]
    }

    pub fn patch(&mut self, entity: Entity, f: impl FnOnce(&mut T)) -> &mut T {
        let index = self.index.index(entity);
        f(&mut self.payload[index]);
        #[cfg(feature = "signals")]
        self.signals.update.emit(entity);
        &mut self.payload[index]
    }

    pub fn get(&self, entity: Entity) -> Option<&T> {
        self.index.find(entity).map(move |i| &self.payload[i])
    }

    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut T> {
        match self.index.find(entity) {
            Some(i) => Some(&mut self.payload[i]),
            None => None,
        }
    }

    pub fn get_or_insert_with(&mut self, entity: Entity, default: impl FnOnce() -> T) -> &mut T {
        let index = match self.index.find(entity) {
            Some(index) => index,
            None => {
                let (index, _) = self.index.push(entity);
                self.payload.push(default());
                #[cfg(feature = "signals")]
                self.signals.construction.emit(entity);
                index
            }
        };
        &mut self.payload[index]
    }

    pub fn remove(&mut self, entity: Entity) -> bool {
        self.take(entity).is_some()
    }

    /// Removes and returns the value owned by `entity`.
    pub fn take(&mut self, entity: Entity) -> Option<T> {
        self.index.find(entity).map(|index| self.swap_and_pop(index))
    }

    pub fn clear(&mut self) {
        #[cfg(feature = "signals")]
        {
            if !self.signals.destruction.is_empty() {
                let doomed: SmallVec<[Entity; 16]> = self.index.iter().copied().collect();
                for entity in doomed {
                    self.signals.destruction.emit(entity);
                }
            }
        }
        self.index.clear();
        self.payload.clear();
    }

    /// Bulk insert of one cloned value per entity. Construction signals are
    /// replayed once the whole batch is in place.
    pub fn insert<I>(&mut self, entities: I, value: T)
    where
        I: IntoIterator<Item = Entity>,
        T: Clone,
    {
        let from = self.len();
        for entity in entities {
            let (_, inserted) = self.index.push(entity);
            if inserted {
                self.payload.push(value.clone());
            }
        }
        self.replay_construction(from);
    }

    /// Bulk insert zipping entities with their values.
    pub fn insert_from<I, C>(&mut self, entities: I, values: C)
    where
        I: IntoIterator<Item = Entity>,
        C: IntoIterator<Item = T>,
    {
        let from = self.len();
        for (entity, value) in izip!(entities, values) {
            let (_, inserted) = self.index.push(entity);
            if inserted {
                self.payload.push(value);
            }
        }
        self.replay_construction(from);
    }

    /// Lazy `(entity, value)` sequence in dense order.
    pub fn each(&self) -> impl Iterator<Item = (Entity, &T)> {
        self.index.iter().copied().zip(self.payload.iter())
    }

    pub fn each_mut(&mut self) -> impl Iterator<Item = (Entity, &mut T)> {
        self.index.iter().copied().zip(self.payload.iter_mut())
    }

    /// Values only, dense order.
    pub fn reach(&self) -> slice::Iter<'_, T> {
        self.payload.iter()
    }

    pub fn reach_mut(&mut self) -> slice::IterMut<'_, T> {
        self.payload.iter_mut()
    }

    /// Sorts entities and payload together; the sparse slots are rebuilt by
    /// the index. Sort order becomes the iteration order of any view driven
    /// by this pool.
    pub fn sort_by(&mut self, compare: impl FnMut(Entity, Entity) -> Ordering) {
        let payload = &mut self.payload;
        self.index.sort_by_with(compare, |a, b| payload.swap(a, b));
    }

    pub fn sort(&mut self) {
        self.sort_by(|a, b| a.id().cmp(&b.id()));
    }

    /// Unstable partition keeping payload aligned. Returns the boundary.
    pub fn partition(&mut self, pred: impl FnMut(Entity) -> bool) -> usize {
        let payload = &mut self.payload;
        self.index.partition_with(pred, |a, b| payload.swap(a, b))
    }
}

#[cfg(feature = "signals")]
impl<T: 'static> Storage<T> {
    pub fn on_construct(&mut self) -> Sink<'_, Entity> {
        self.signals.construction.sink()
    }

    pub fn on_destroy(&mut self) -> Sink<'_, Entity> {
        self.signals.destruction.sink()
    }

    pub fn on_update(&mut self) -> Sink<'_, Entity> {
        self.signals.update.sink()
    }
}

impl<T: 'static> ErasedStorage for Storage<T> {
    fn raw(&self) -> &SparseSet {
        &self.index
    }

    fn pop_entity(&mut self, entity: Entity) -> bool {
        self.remove(entity)
    }

    fn wipe(&mut self) {
        self.clear();
    }

    fn stored_type_name(&self) -> &'static str {
        type_name::<T>()
    }
}

impl<T: 'static> ComponentStorage<T> for Storage<T> {
    fn emplace(&mut self, entity: Entity, value: T) -> (&mut T, bool) {
        Storage::emplace(self, entity, value)
    }

    fn emplace_or_replace(&mut self, entity: Entity, value: T) -> (&mut T, bool) {
        Storage::emplace_or_replace(self, entity, value)
    }

    fn replace(&mut self, entity: Entity, value: T) -> &mut T {
        Storage::replace(self, entity, value)
    }

    fn patch(&mut self, entity: Entity, f: impl FnOnce(&mut T)) -> &mut T {
        Storage::patch(self, entity, f)
    }

    fn get(&self, entity: Entity) -> Option<&T> {
        Storage::get(self, entity)
    }

    fn get_mut(&mut self, entity: Entity) -> Option<&mut T> {
        Storage::get_mut(self, entity)
    }

    fn get_or_insert_with(&mut self, entity: Entity, default: impl FnOnce() -> T) -> &mut T {
        Storage::get_or_insert_with(self, entity, default)
    }

    fn remove(&mut self, entity: Entity) -> bool {
        Storage::remove(self, entity)
    }

    fn insert<I>(&mut self, entities: I, value: T)
    where
        I: IntoIterator<Item = Entity>,
        T: Clone,
    {
        Storage::insert(self, entities, value)
    }

    fn insert_from<I, C>(&mut self, entities: I, values: C)
    where
        I: IntoIterator<Item = Entity>,
        C: IntoIterator<Item = T>,
    {
        Storage::insert_from(self, entities, values)
    }

    #[cfg(feature = "signals")]
    fn on_construct(&mut self) -> Sink<'_, Entity> {
        Storage::on_construct(self)
    }

    #[cfg(feature = "signals")]
    fn on_destroy(&mut self) -> Sink<'_, Entity> {
        Storage::on_destroy(self)
    }

    #[cfg(feature = "signals")]
    fn on_update(&mut self) -> Sink<'_, Entity> {
        Storage::on_update(self)
    }
}

/// Tag pool for zero-sized components: only the sparse index, no payload.
/// `get` hands back the single stored instance; `patch` runs the callback
/// for its side effects.
#[derive(Derivative)]
#[derivative(Debug(bound = ""), Default)]
pub struct NullStorage<T> {
    index: SparseSet,
    #[derivative(Debug = "ignore")]
    instance: T,
    #[cfg(feature = "signals")]
    signals: StorageSignals,
}

impl<T: Default + 'static> NullStorage<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn entities(&self) -> &[Entity] {
        self.index.entities()
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.index.contains(entity)
    }

    pub fn each(&self) -> impl Iterator<Item = (Entity, &T)> {
        let instance = &self.instance;
        self.index.iter().copied().map(move |e| (e, instance))
    }

    pub fn clear(&mut self) {
        #[cfg(feature = "signals")]
        {
            if !self.signals.destruction.is_empty() {
                let doomed: SmallVec<[Entity; 16]> = self.index.iter().copied().collect();
                for entity in doomed {
                    self.signals.destruction.emit(entity);
                }
            }
        }
        self.index.clear();
    }
}

impl<T: 'static> ErasedStorage for NullStorage<T> {
    fn raw(&self) -> &SparseSet {
        &self.index
    }

    fn pop_entity(&mut self, entity: Entity) -> bool {
        match self.index.find(entity) {
            Some(index) => {
                #[cfg(feature = "signals")]
                self.signals.destruction.emit(entity);
                self.index.swap_and_pop(index);
                true
            }
            None => false,
        }
    }

    fn wipe(&mut self) {
        #[cfg(feature = "signals")]
        {
            if !self.signals.destruction.is_empty() {
                let doomed: SmallVec<[Entity; 16]> = self.index.iter().copied().collect();
                for entity in doomed {
                    self.signals.destruction.emit(entity);
                }
            }
        }
        self.index.clear();
    }

    fn stored_type_name(&self) -> &'static str {
        type_name::<T>()
    }
}

impl<T: Default + 'static> ComponentStorage<T> for NullStorage<T> {
    fn emplace(&mut self, entity: Entity, _value: T) -> (&mut T, bool) {
        debug_assert!(!entity.is_null());
        debug_assert!(
            std::mem::size_of::<T>() == 0,
            "NullStorage holds zero-sized tag components only"
        );
        let (_, inserted) = self.index.push(entity);
        #[cfg(feature = "signals")]
        {
            if inserted {
                self.signals.construction.emit(entity);
            }
        }
        (&mut self.instance, inserted)
    }

    fn emplace_or_replace(&mut self, entity: Entity, value: T) -> (&mut T, bool) {
        let (_, inserted) = ComponentStorage::emplace(self, entity, value);
        #[cfg(feature = "signals")]
        {
            if !inserted {
                self.signals.update.emit(entity);
            }
        }
        (&mut self.instance, inserted)
    }

    fn replace(&mut self, entity: Entity, _value: T) -> &mut T {
        assert!(self.index.contains(entity), "entity not present in pool");
        #[cfg(feature = "signals")]
        self.signals.update.emit(entity);
        &mut self.instance
    }

    fn patch(&mut self, entity: Entity, f: impl FnOnce(&mut T)) -> &mut T {
        assert!(self.index.contains(entity), "entity not present in pool");
        f(&mut self.instance);
        #[cfg(feature = "signals")]
        self.signals.update.emit(entity);
        &mut self.instance
    }

    fn get(&self, entity: Entity) -> Option<&T> {
        if self.index.contains(entity) {
            Some(&self.instance)
        } else {
            None
        }
    }

    fn get_mut(&mut self, entity: Entity) -> Option<&mut T> {
        if self.index.contains(entity) {
            Some(&mut self.instance)
        } else {
            None
        }
    }

    fn get_or_insert_with(&mut self, entity: Entity, _default: impl FnOnce() -> T) -> &mut T {
        if !self.index.contains(entity) {
            self.index.push(entity);
            #[cfg(feature = "signals")]
            self.signals.construction.emit(entity);
        }
        &mut self.instance
    }

    fn remove(&mut self, entity: Entity) -> bool {
        self.pop_entity(entity)
    }

    #[cfg(feature = "signals")]
    fn on_construct(&mut self) -> Sink<'_, Entity> {
        self.signals.construction.sink()
    }

    #[cfg(feature = "signals")]
    fn on_destroy(&mut self) -> Sink<'_, Entity> {
        self.signals.destruction.sink()
    }

    #[cfg(feature = "signals")]
    fn on_update(&mut self) -> Sink<'_, Entity> {
        self.signals.update.sink()
    }
}
