use std::slice;

use downcast_rs::Downcast;

use crate::entity::Entity;
use crate::registry::{type_hash, Registry, TypeHash};
use crate::sparse_set::SparseSet;
use crate::storage::{Component, ComponentStorage, ErasedStorage};

/// The "get" side of a view: a compile-time list of component types, all of
/// which an entity must own to match. Implemented for tuples of up to five
/// components.
pub trait ViewGet<'a>: Sized {
    /// One shared storage reference per component type.
    type Refs: Copy;
    /// One component reference per component type.
    type Item;

    const LEN: usize;

    /// `None` when any pool is missing; such a view is inert.
    fn fetch(registry: &'a Registry) -> Option<Self::Refs>;

    fn raw(refs: Self::Refs, index: usize) -> &'a SparseSet;

    fn contains_all(refs: Self::Refs, entity: Entity) -> bool;

    /// Fetches every component of `entity`. The entity must match.
    fn item(refs: Self::Refs, entity: Entity) -> Self::Item;

    fn position_of(hash: TypeHash) -> Option<usize>;

    fn get_one<T: Component>(refs: Self::Refs, entity: Entity) -> Option<&'a T>;

    fn storage_one<T: Component>(refs: Self::Refs) -> Option<&'a T::Storage>;
}

/// The "exclude" side of a view: entities owning any of these components
/// are filtered out. A missing pool excludes nothing.
pub trait ViewExclude<'a>: Sized {
    type Refs: Copy;

    fn fetch(registry: &'a Registry) -> Self::Refs;

    fn none_contains(refs: Self::Refs, entity: Entity) -> bool;
}

/// A view over zero component types is inert.
impl<'a> ViewGet<'a> for () {
    type Refs = ();
    type Item = ();

    const LEN: usize = 0;

    fn fetch(_: &'a Registry) -> Option<()> {
        None
    }

    fn raw(_: (), _: usize) -> &'a SparseSet {
        unreachable!("inert views have no driver pool")
    }

    fn contains_all(_: (), _: Entity) -> bool {
        false
    }

    fn item(_: (), _: Entity) {}

    fn position_of(_: TypeHash) -> Option<usize> {
        None
    }

    fn get_one<T: Component>(_: (), _: Entity) -> Option<&'a T> {
        None
    }

    fn storage_one<T: Component>(_: ()) -> Option<&'a T::Storage> {
        None
    }
}

impl<'a> ViewExclude<'a> for () {
    type Refs = ();

    fn fetch(_: &'a Registry) {}

    fn none_contains(_: (), _: Entity) -> bool {
        true
    }
}

macro_rules! impl_view_get {
    ( $len:expr; $( $ty:ident => $idx:tt ),+ ) => {
        impl<'a, $( $ty: Component ),+> ViewGet<'a> for ($( $ty, )+) {
            type Refs = ($( &'a $ty::Storage, )+);
            type Item = ($( &'a $ty, )+);

            const LEN: usize = $len;

            fn fetch(registry: &'a Registry) -> Option<Self::Refs> {
                Some(($( registry.storage::<$ty>()?, )+))
            }

            fn raw(refs: Self::Refs, index: usize) -> &'a SparseSet {
                match index {
                    $( $idx => ErasedStorage::raw(refs.$idx), )+
                    _ => panic!("driver index out of range"),
                }
            }

            fn contains_all(refs: Self::Refs, entity: Entity) -> bool {
                $( ErasedStorage::raw(refs.$idx).contains(entity) )&&+
            }

            fn item(refs: Self::Refs, entity: Entity) -> Self::Item {
                ($( ComponentStorage::get(refs.$idx, entity)
                    .expect("view item requested for a non-matching entity"), )+)
            }

            fn position_of(hash: TypeHash) -> Option<usize> {
                $( if type_hash::<$ty>() == hash { return Some($idx); } )+
                None
            }

            fn get_one<T: Component>(refs: Self::Refs, entity: Entity) -> Option<&'a T> {
                $(
                    if let Some(storage) = Downcast::as_any(refs.$idx).downcast_ref::<T::Storage>() {
                        return ComponentStorage::get(storage, entity);
                    }
                )+
                None
            }

            fn storage_one<T: Component>(refs: Self::Refs) -> Option<&'a T::Storage> {
                $(
                    if let Some(storage) = Downcast::as_any(refs.$idx).downcast_ref::<T::Storage>() {
                        return Some(storage);
                    }
                )+
                None
            }
        }
    };
}

impl_view_get!(1; A => 0);
impl_view_get!(2; A => 0, B => 1);
impl_view_get!(3; A => 0, B => 1, C => 2);
impl_view_get!(4; A => 0, B => 1, C => 2, D => 3);
impl_view_get!(5; A => 0, B => 1, C => 2, D => 3, E => 4);

macro_rules! impl_view_exclude {
    ( $( $ty:ident => $idx:tt ),+ ) => {
        impl<'a, $( $ty: Component ),+> ViewExclude<'a> for ($( $ty, )+) {
            type Refs = ($( Option<&'a $ty::Storage>, )+);

            fn fetch(registry: &'a Registry) -> Self::Refs {
                ($( registry.storage::<$ty>(), )+)
            }

            fn none_contains(refs: Self::Refs, entity: Entity) -> bool {
                $( refs.$idx.map_or(true, |s| !ErasedStorage::raw(s).contains(entity)) )&&+
            }
        }
    };
}

impl_view_exclude!(A => 0);
impl_view_exclude!(A => 0, B => 1);
impl_view_exclude!(A => 0, B => 1, C => 2);
impl_view_exclude!(A => 0, B => 1, C => 2, D => 3);
impl_view_exclude!(A => 0, B => 1, C => 2, D => 3, E => 4);

/// Lazy join over the entities present in every `G` pool and absent from
/// every `X` pool.
///
/// Construction snapshots the storage pointers; any structural mutation of
/// a referenced pool invalidates outstanding iterators (the borrow checker
/// enforces this, since a view borrows the registry). The smallest `G` pool
/// drives iteration, which bounds the work at
/// O(|driver| · |G|); [`sort_as`](View::sort_as) overrides the choice when
/// a specific iteration order matters.
pub struct View<'a, G: ViewGet<'a>, X: ViewExclude<'a> = ()> {
    get: Option<G::Refs>,
    exclude: X::Refs,
    drive: usize,
}

impl<'a, G: ViewGet<'a>, X: ViewExclude<'a>> View<'a, G, X> {
    pub(crate) fn new(registry: &'a Registry) -> Self {
        let get = G::fetch(registry);
        let drive = match get {
            Some(refs) => (0..G::LEN)
                .min_by_key(|&i| G::raw(refs, i).len())
                .unwrap_or(G::LEN),
            None => G::LEN,
        };
        View {
            get,
            exclude: X::fetch(registry),
            drive,
        }
    }

    /// True when a `G` pool is missing (or `G` is empty): the view yields
    /// nothing and contains nothing.
    pub fn is_inert(&self) -> bool {
        self.get.is_none()
    }

    /// Constant-time membership test.
    pub fn contains(&self, entity: Entity) -> bool {
        match self.get {
            Some(refs) => {
                G::contains_all(refs, entity) && X::none_contains(self.exclude, entity)
            }
            None => false,
        }
    }

    /// Forces the pool of `T` to drive iteration regardless of its size,
    /// imposing that pool's dense order on the join.
    pub fn sort_as<T: Component>(&mut self) {
        self.drive = G::position_of(type_hash::<T>()).expect("type is not part of the view");
    }

    /// Component of `T` owned by `entity`. The entity must match the view.
    pub fn get<T: Component>(&self, entity: Entity) -> &'a T {
        debug_assert!(self.contains(entity));
        let refs = self.get.expect("view is inert");
        G::get_one(refs, entity).expect("entity does not match the view")
    }

    pub fn try_get<T: Component>(&self, entity: Entity) -> Option<&'a T> {
        if !self.contains(entity) {
            return None;
        }
        G::get_one(self.get?, entity)
    }

    /// The snapshotted pool of `T`, if `T` is part of `G`.
    pub fn storage<T: Component>(&self) -> Option<&'a T::Storage> {
        G::storage_one::<T>(self.get?)
    }

    /// Matching entities in driver order.
    pub fn iter(&self) -> ViewIter<'a, G, X> {
        let entities: &'a [Entity] = match self.get {
            Some(refs) => G::raw(refs, self.drive).entities(),
            None => &[],
        };
        ViewIter {
            get: self.get,
            exclude: self.exclude,
            entities: entities.iter(),
        }
    }

    /// Matching entities paired with their components, in driver order.
    pub fn each(&self) -> EachIter<'a, G, X> {
        EachIter {
            get: self.get,
            inner: self.iter(),
        }
    }

    pub fn for_each(&self, mut f: impl FnMut(Entity, G::Item)) {
        for (entity, item) in self.each() {
            f(entity, item);
        }
    }
}

/// Entity iterator of a [`View`].
pub struct ViewIter<'a, G: ViewGet<'a>, X: ViewExclude<'a>> {
    get: Option<G::Refs>,
    exclude: X::Refs,
    entities: slice::Iter<'a, Entity>,
}

impl<'a, G: ViewGet<'a>, X: ViewExclude<'a>> Iterator for ViewIter<'a, G, X> {
    type Item = Entity;

    fn next(&mut self) -> Option<Entity> {
        let refs = self.get?;
        while let Some(&entity) = self.entities.next() {
            if G::contains_all(refs, entity) && X::none_contains(self.exclude, entity) {
                return Some(entity);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.entities.len()))
    }
}

/// `(entity, components)` iterator of a [`View`].
pub struct EachIter<'a, G: ViewGet<'a>, X: ViewExclude<'a>> {
    get: Option<G::Refs>,
    inner: ViewIter<'a, G, X>,
}

impl<'a, G: ViewGet<'a>, X: ViewExclude<'a>> Iterator for EachIter<'a, G, X> {
    type Item = (Entity, G::Item);

    fn next(&mut self) -> Option<Self::Item> {
        let refs = self.get?;
        let entity = self.inner.next()?;
        Some((entity, G::item(refs, entity)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}
