use crate::entity::{next_version, Entity, EntityId, EntityVersion, ID_MAX};
use crate::sparse_set::SparseSet;
use crate::Error;

/// The registry's authoritative pool of entity handles.
///
/// The dense array is split by a live-prefix length: entries below it are
/// alive, the suffix is the *cemetery* of destroyed handles kept around so
/// their ids can be recycled. Destruction swaps the handle to the boundary,
/// shrinks the prefix and bumps the stored version; the next plain
/// [`emplace`](Self::emplace) reveals the cemetery head with its already
/// bumped version, so stale handles stay detectable.
#[derive(Debug, Default)]
pub struct EntityStorage {
    index: SparseSet,
    alive: usize,
}

impl EntityStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entities.
    pub fn len(&self) -> usize {
        self.alive
    }

    pub fn is_empty(&self) -> bool {
        self.alive == 0
    }

    pub fn cemetery_len(&self) -> usize {
        self.index.len() - self.alive
    }

    pub fn cemetery_is_empty(&self) -> bool {
        self.index.len() == self.alive
    }

    /// Live handles, in dense order.
    pub fn entities(&self) -> &[Entity] {
        &self.index.entities()[..self.alive]
    }

    pub fn iter(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entities().iter().copied()
    }

    /// Version check included: a destroyed handle is not contained even
    /// though its id still sits in the cemetery.
    pub fn contains(&self, entity: Entity) -> bool {
        match self.index.find(entity) {
            Some(position) => position < self.alive,
            None => false,
        }
    }

    /// Version currently associated with `id`, dead or alive. `None` for
    /// ids this storage never issued.
    pub fn current(&self, id: EntityId) -> Option<EntityVersion> {
        self.index
            .find_id(id)
            .map(|position| self.index.entities()[position].version())
    }

    /// Issues a handle: the cemetery head when one exists (its id recycled
    /// at the version bumped by the earlier destruction), a fresh id at
    /// version zero otherwise.
    pub fn try_emplace(&mut self) -> Result<Entity, Error> {
        if self.cemetery_is_empty() {
            let id = self.index.len() as EntityId;
            if id >= ID_MAX {
                return Err(Error::IdsExhausted);
            }
            self.index.emplace(id, 0);
        }
        let entity = self.index.entities()[self.alive];
        self.alive += 1;
        Ok(entity)
    }

    pub fn emplace(&mut self) -> Entity {
        match self.try_emplace() {
            Ok(entity) => entity,
            Err(err) => panic!("{}", err),
        }
    }

    /// Re-introduces a specific handle.
    ///
    /// A live hinted id is returned unchanged. A cemetery id is revived at
    /// the hinted version. The id must have been issued before: hinting an
    /// id at or beyond the dense array is a precondition violation.
    pub fn emplace_hint(&mut self, hint: Entity) -> Entity {
        debug_assert!(!hint.is_null());
        debug_assert!(hint.id() < ID_MAX);
        debug_assert!(
            (hint.id() as usize) < self.index.len(),
            "hinted id was never issued"
        );
        let position = self
            .index
            .find_id(hint.id())
            .expect("hinted id was never issued");
        if position < self.alive {
            return self.index.entities()[position];
        }
        self.index.set_version(position, hint.version());
        self.index.swap_elements_index(self.alive, position);
        let entity = self.index.entities()[self.alive];
        self.alive += 1;
        entity
    }

    /// Destroys `entity` if alive: the handle moves to the cemetery head
    /// with its id preserved and its version advanced. Stale or unknown
    /// handles are a no-op.
    pub fn pop(&mut self, entity: Entity) -> bool {
        match self.index.find(entity) {
            Some(position) if position < self.alive => {
                self.alive -= 1;
                if position != self.alive {
                    self.index.swap_elements_index(position, self.alive);
                }
                self.index
                    .set_version(self.alive, next_version(entity.version()));
                true
            }
            _ => false,
        }
    }

    /// Asserting form of [`pop`](Self::pop).
    pub fn erase(&mut self, entity: Entity) {
        let removed = self.pop(entity);
        assert!(removed, "destroying an entity that is not alive");
    }

    /// Forgets everything, cemetery included; ids restart from zero.
    pub fn clear(&mut self) {
        self.index.clear();
        self.alive = 0;
    }
}
