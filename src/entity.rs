use std::fmt;
use std::fmt::Display;

/// Unsigned integer backing an [`Entity`] handle.
///
/// The default layout packs a 24 bit id and an 8 bit version into a `u32`.
/// The `entity-u64` feature widens the handle to 32/32 bits.
#[cfg(not(feature = "entity-u64"))]
pub type EntityRepr = u32;
#[cfg(feature = "entity-u64")]
pub type EntityRepr = u64;

pub type EntityId = EntityRepr;
pub type EntityVersion = EntityRepr;

#[cfg(not(feature = "entity-u64"))]
pub const ID_BITS: u32 = 24;
#[cfg(feature = "entity-u64")]
pub const ID_BITS: u32 = 32;

pub const ID_MASK: EntityRepr = (1 << ID_BITS) - 1;
pub const VERSION_MASK: EntityRepr = !ID_MASK;

/// Largest representable id. The all-ones pattern is reserved for
/// [`Entity::NULL`], so live entities stay strictly below this value.
pub const ID_MAX: EntityId = ID_MASK;
pub const VERSION_MAX: EntityVersion = VERSION_MASK >> ID_BITS;

/// Opaque entity handle: an id (stable position) and a generational version
/// packed into one integer. The handle is a plain value and owns nothing.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Entity(EntityRepr);

impl Entity {
    /// The null sentinel: every bit set. Decodes to `(ID_MAX, VERSION_MAX)`.
    pub const NULL: Entity = Entity(!0);

    pub const fn new(id: EntityId, version: EntityVersion) -> Entity {
        Entity(((version & VERSION_MAX) << ID_BITS) | (id & ID_MASK))
    }

    pub const fn from_repr(repr: EntityRepr) -> Entity {
        Entity(repr)
    }

    pub const fn repr(self) -> EntityRepr {
        self.0
    }

    pub const fn id(self) -> EntityId {
        self.0 & ID_MASK
    }

    pub const fn version(self) -> EntityVersion {
        (self.0 & VERSION_MASK) >> ID_BITS
    }

    pub const fn is_null(self) -> bool {
        self.0 == !0
    }

    /// Rebuilds a handle from the id of `id_source` and the version of
    /// `version_source`.
    pub const fn combine(id_source: Entity, version_source: Entity) -> Entity {
        Entity::new(id_source.id(), version_source.version())
    }

    /// Same id, version advanced by [`next_version`].
    pub const fn with_next_version(self) -> Entity {
        Entity::new(self.id(), next_version(self.version()))
    }
}

/// Version succession. Rolls from `VERSION_MAX` back to zero so a slot can
/// be recycled indefinitely.
pub const fn next_version(version: EntityVersion) -> EntityVersion {
    if version >= VERSION_MAX {
        0
    } else {
        version + 1
    }
}

impl Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}#{}", self.id(), self.version())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_unpack() {
        let e = Entity::new(42, 7);
        assert_eq!(e.id(), 42);
        assert_eq!(e.version(), 7);
    }

    #[test]
    fn id_is_masked() {
        let e = Entity::new(ID_MAX, 0);
        assert_eq!(e.id(), ID_MAX);
        assert_eq!(Entity::new(ID_MASK & 123, 0), Entity::new(123, 0));
    }

    #[test]
    fn null_decodes_to_maxima() {
        assert!(Entity::NULL.is_null());
        assert_eq!(Entity::NULL.id(), ID_MAX);
        assert_eq!(Entity::NULL.version(), VERSION_MAX);
        assert_eq!(Entity::new(ID_MAX, VERSION_MAX), Entity::NULL);
    }

    #[test]
    fn version_wraps_through_zero() {
        assert_eq!(next_version(0), 1);
        assert_eq!(next_version(VERSION_MAX - 1), VERSION_MAX);
        assert_eq!(next_version(VERSION_MAX), 0);

        let e = Entity::new(3, VERSION_MAX);
        assert_eq!(e.with_next_version(), Entity::new(3, 0));
    }

    #[test]
    fn combine_splices_fields() {
        let a = Entity::new(5, 1);
        let b = Entity::new(9, 4);
        assert_eq!(Entity::combine(a, b), Entity::new(5, 4));
        assert_eq!(Entity::combine(b, a), Entity::new(9, 1));
    }

    #[test]
    fn display_format() {
        assert_eq!(Entity::new(12, 3).to_string(), "12#3");
    }
}
