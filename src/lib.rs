//! Warren is a sparse-set entity component system (ECS) library.
//!
//! A [`Registry`] hands out generational [`Entity`] handles and owns one
//! pool per component type, created the first time the type is touched.
//! Pools are sparse sets: O(1) insert, erase and lookup, with the live
//! entities and their components packed densely for tight iteration.
//! [`View`]s join multiple pools lazily, iterating the smallest pool and
//! probing the rest, optionally excluding entities that own unwanted
//! components.
//!
//! ```
//! use warren::{Component, NullStorage, Registry, Storage};
//!
//! #[derive(Debug, PartialEq)]
//! struct Position(f32, f32);
//! #[derive(Debug, PartialEq)]
//! struct Velocity(f32, f32);
//! #[derive(Debug, Default)]
//! struct Frozen;
//!
//! impl Component for Position {
//!     type Storage = Storage<Self>;
//! }
//! impl Component for Velocity {
//!     type Storage = Storage<Self>;
//! }
//! impl Component for Frozen {
//!     type Storage = NullStorage<Self>;
//! }
//!
//! let mut registry = Registry::new();
//!
//! let e1 = registry.create();
//! registry.emplace(e1, Position(0.0, 0.0));
//! registry.emplace(e1, Velocity(1.0, 2.0));
//!
//! let e2 = registry.create();
//! registry.emplace(e2, Position(10.0, 10.0));
//! registry.emplace(e2, Velocity(0.0, 0.0));
//! registry.emplace(e2, Frozen);
//!
//! // move everything that is not frozen
//! let mut moved = 0;
//! registry
//!     .view_exclude::<(Position, Velocity), (Frozen,)>()
//!     .for_each(|_, (_pos, _vel)| moved += 1);
//! assert_eq!(moved, 1);
//!
//! registry.patch::<Position>(e1, |p| p.0 += 5.0);
//! assert_eq!(registry.get::<Position>(e1), &Position(5.0, 0.0));
//!
//! registry.destroy(e1);
//! assert!(!registry.valid(e1));
//! ```
//!
//! The core is single-threaded; nothing here is safe to share between
//! threads without external serialisation.

pub mod dense_map;
pub mod entities;
pub mod entity;
pub mod registry;
#[cfg(feature = "signals")]
pub mod signal;
pub mod sparse_set;
pub mod storage;
pub mod view;

pub use crate::dense_map::DenseMap;
pub use crate::entities::EntityStorage;
pub use crate::entity::{
    next_version, Entity, EntityId, EntityRepr, EntityVersion, ID_MAX, VERSION_MAX,
};
pub use crate::registry::{type_hash, ComponentSet, MultiGet, Registry, TypeHash};
#[cfg(feature = "signals")]
pub use crate::signal::{Connection, Signal, Sink};
pub use crate::sparse_set::SparseSet;
pub use crate::storage::{Component, ComponentStorage, ErasedStorage, NullStorage, Storage};
pub use crate::view::{View, ViewExclude, ViewGet};

/// Slots per sparse page. Pages are allocated lazily, the first time an id
/// inside the page is occupied.
pub const SPARSE_PAGE_SIZE: usize = 4096;

const _: () = assert!(SPARSE_PAGE_SIZE.is_power_of_two() && SPARSE_PAGE_SIZE >= 64);

/// Recoverable failures. Everything else in the crate follows a
/// precondition model: invalid arguments are programmer defects and panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Every identifier below [`ID_MAX`] is alive.
    #[error("entity identifier space exhausted")]
    IdsExhausted,
}
