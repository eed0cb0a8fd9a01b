use std::collections::HashMap;

use itertools::Itertools;

use warren::*;

#[derive(Clone, Copy, Debug, PartialEq)]
struct Pos(f32, f32, f32);
#[derive(Clone, Copy, Debug, PartialEq)]
struct Vel(f32, f32, f32);
#[derive(Clone, Copy, Debug, PartialEq)]
struct Hp(i32);
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
struct Model(u32);
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
struct Static;

impl Component for Pos {
    type Storage = Storage<Self>;
}
impl Component for Vel {
    type Storage = Storage<Self>;
}
impl Component for Hp {
    type Storage = Storage<Self>;
}
impl Component for Model {
    type Storage = Storage<Self>;
}
impl Component for Static {
    type Storage = NullStorage<Self>;
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

// -- entity lifecycle -------------------------------------------------------

#[test]
fn lifecycle_recycling() {
    init_tracing();

    let mut registry = Registry::new();
    let e1 = registry.create();
    let e2 = registry.create();
    let e3 = registry.create();

    assert_eq!((e1.id(), e2.id(), e3.id()), (0, 1, 2));
    assert_eq!((e1.version(), e2.version(), e3.version()), (0, 0, 0));

    registry.destroy(e2);
    assert!(!registry.valid(e2));

    let e2b = registry.create();
    assert_eq!(e2b.id(), e2.id());
    assert_ne!(e2b.version(), 0);
    assert!(registry.valid(e2b));
    assert!(!registry.valid(e2));
}

#[test]
fn destroy_reports_the_bumped_version() {
    let mut registry = Registry::new();
    let e = registry.create();
    let bumped = registry.destroy(e);
    assert_ne!(bumped, e.version());
    assert_eq!(registry.current(e), Some(bumped));
}

#[test]
fn destroy_sweeps_all_pools() {
    let mut registry = Registry::new();
    let e = registry.create();
    registry.emplace(e, Pos(1., 2., 3.));
    registry.emplace(e, Vel(0.1, 0.2, 0.3));
    registry.emplace(e, Static);

    registry.destroy(e);

    assert!(!registry.has::<Pos>(e));
    assert!(!registry.has::<Vel>(e));
    assert!(!registry.has::<Static>(e));
    assert!(!registry.valid(e));

    // with an empty cemetery apart from e, the next create reuses its id
    let next = registry.create();
    assert_eq!(next.id(), e.id());
    assert_ne!(next.version(), e.version());
    assert!(registry.orphan(next));
}

#[test]
fn hinted_create_restores_a_destroyed_id() {
    let mut registry = Registry::new();
    let e = registry.create();
    registry.destroy(e);

    let revived = registry.create_hint(Entity::new(e.id(), 7));
    assert_eq!(revived, Entity::new(e.id(), 7));
    assert!(registry.valid(revived));
}

#[test]
fn create_many_and_destroy_many() {
    let mut registry = Registry::new();
    let mut entities = [Entity::NULL; 32];
    registry.create_many(&mut entities);
    assert!(entities.iter().all(|&e| registry.valid(e)));
    assert_eq!(registry.entity_count(), 32);

    registry.destroy_many(entities.iter().copied());
    assert_eq!(registry.entity_count(), 0);
    assert!(entities.iter().all(|&e| !registry.valid(e)));
}

// -- storage alignment ------------------------------------------------------

#[test]
fn swap_remove_preserves_payload_entity_alignment() {
    let mut registry = Registry::new();
    let e1 = registry.create();
    let e2 = registry.create();
    let e3 = registry.create();
    registry.emplace(e1, Hp(10));
    registry.emplace(e2, Hp(20));
    registry.emplace(e3, Hp(30));

    registry.erase::<Hp>(e1);

    let pool = registry.storage::<Hp>().unwrap();
    assert_eq!(pool.entities(), &[e3, e2]);
    let payload: Vec<Hp> = pool.reach().copied().collect();
    assert_eq!(payload, vec![Hp(30), Hp(20)]);
    assert_eq!(registry.get::<Hp>(e2), &Hp(20));
    assert_eq!(registry.get::<Hp>(e3), &Hp(30));
}

#[test]
fn emplace_then_erase_restores_the_pool() {
    let mut registry = Registry::new();
    let resident = registry.create();
    registry.emplace(resident, Hp(1));

    let e = registry.create();
    registry.emplace(e, Hp(99));
    registry.erase::<Hp>(e);

    let pool = registry.storage::<Hp>().unwrap();
    assert_eq!(pool.len(), 1);
    assert_eq!(pool.entities(), &[resident]);
    assert!(!pool.contains(e));
}

#[test]
fn pool_invariants_hold_under_churn() {
    let mut registry = Registry::new();
    let mut alive = Vec::new();

    let mut x = 88172645463325252u64;
    let mut rand = move || {
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        x
    };

    for _ in 0..500 {
        if alive.is_empty() || rand() % 3 != 0 {
            let e = registry.create();
            registry.emplace(e, Hp(e.id() as i32));
            if rand() % 2 == 0 {
                registry.emplace(e, Static);
            }
            alive.push(e);
        } else {
            let victim = alive.swap_remove((rand() % alive.len() as u64) as usize);
            registry.destroy(victim);
        }
    }

    // payload stays aligned with the dense entities
    let pool = registry.storage::<Hp>().unwrap();
    for (entity, hp) in pool.each() {
        assert_eq!(entity.id() as i32, hp.0);
    }
    assert_eq!(pool.len(), alive.len());
    for &e in &alive {
        assert!(registry.valid(e));
        assert_eq!(registry.current(e), Some(e.version()));
    }
}

// -- views ------------------------------------------------------------------

#[test]
fn view_picks_the_smallest_driver() {
    init_tracing();

    let mut registry = Registry::new();
    let mut tagged = Vec::new();
    for i in 0..1000 {
        let e = registry.create();
        registry.emplace(e, Pos(i as f32, 0., 0.));
        if i % 333 == 0 {
            registry.emplace(e, Vel(1., 1., 1.));
            tagged.push(e);
        }
    }
    assert_eq!(tagged.len(), 4);

    let view = registry.view::<(Pos, Vel)>();
    let mut touched = Vec::new();
    view.for_each(|entity, (_pos, _vel)| touched.push(entity));
    assert_eq!(
        touched.iter().copied().sorted().collect::<Vec<_>>(),
        tagged.iter().copied().sorted().collect::<Vec<_>>()
    );

    // the driver is the four-element Vel pool
    assert_eq!(view.iter().size_hint().1, Some(4));
}

#[test]
fn sort_as_imposes_the_chosen_pool_order() {
    let mut registry = Registry::new();
    let mut with_vel = Vec::new();
    for i in 0..100 {
        let e = registry.create();
        registry.emplace(e, Pos(i as f32, 0., 0.));
        if i % 10 == 0 {
            registry.emplace(e, Vel(0., 0., 0.));
            with_vel.push(e);
        }
    }

    let mut view = registry.view::<(Pos, Vel)>();
    view.sort_as::<Pos>();

    let visited: Vec<Entity> = view.iter().collect();
    let expected: Vec<Entity> = registry
        .storage::<Pos>()
        .unwrap()
        .entities()
        .iter()
        .copied()
        .filter(|e| with_vel.contains(e))
        .collect();
    assert_eq!(visited, expected);
}

#[test]
fn exclude_filters_out_tagged_entities() {
    let mut registry = Registry::new();
    let e1 = registry.create();
    let e2 = registry.create();
    let e3 = registry.create();
    for &e in &[e1, e2, e3] {
        registry.emplace(e, Pos(0., 0., 0.));
    }
    registry.emplace(e2, Static);

    let view = registry.view_exclude::<(Pos,), (Static,)>();
    let matched: Vec<Entity> = view.iter().sorted().collect();
    assert_eq!(matched, vec![e1, e3]);
    assert!(!view.contains(e2));
    assert!(view.contains(e1));
}

#[test]
fn view_each_yields_components_with_entities() {
    let mut registry = Registry::new();
    let mut expected = HashMap::new();
    for i in 0..10 {
        let e = registry.create();
        let pos = Pos(i as f32, i as f32 + 1., i as f32 + 2.);
        let vel = Vel(0.1 * i as f32, 0., 0.);
        registry.emplace(e, pos);
        registry.emplace(e, vel);
        expected.insert(e, (pos, vel));
    }

    let mut count = 0;
    for (entity, (pos, vel)) in registry.view::<(Pos, Vel)>().each() {
        let (want_pos, want_vel) = expected.get(&entity).unwrap();
        assert_eq!((pos, vel), (want_pos, want_vel));
        count += 1;
    }
    assert_eq!(count, expected.len());
}

#[test]
fn view_over_tags_joins_membership() {
    let mut registry = Registry::new();
    let a = registry.create();
    let b = registry.create();
    registry.emplace(a, Pos(0., 0., 0.));
    registry.emplace(b, Pos(0., 0., 0.));
    registry.emplace(b, Static);

    let matched: Vec<Entity> = registry.view::<(Pos, Static)>().iter().collect();
    assert_eq!(matched, vec![b]);
}

#[test]
fn view_with_missing_pool_is_inert() {
    let mut registry = Registry::new();
    let e = registry.create();
    registry.emplace(e, Pos(0., 0., 0.));

    let view = registry.view::<(Pos, Model)>();
    assert!(view.is_inert());
    assert_eq!(view.each().count(), 0);
    assert!(!view.contains(e));
}

// -- signals ----------------------------------------------------------------

#[cfg(feature = "signals")]
mod signals {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn construct_then_destroy_fire_once_each_in_order() {
        let log: Arc<Mutex<Vec<(&str, Entity)>>> = Arc::new(Mutex::new(Vec::new()));
        let mut registry = Registry::new();

        let l = log.clone();
        registry
            .on_construct::<Hp>()
            .connect(move |e: Entity| l.lock().unwrap().push(("construct", e)));
        let l = log.clone();
        registry
            .on_destroy::<Hp>()
            .connect(move |e: Entity| l.lock().unwrap().push(("destroy", e)));

        let e = registry.create();
        registry.emplace(e, Hp(3));
        registry.erase::<Hp>(e);

        assert_eq!(*log.lock().unwrap(), vec![("construct", e), ("destroy", e)]);
    }

    #[test]
    fn update_fires_once_per_patch_call() {
        let count = Arc::new(Mutex::new(0));
        let mut registry = Registry::new();

        let c = count.clone();
        registry
            .on_update::<Hp>()
            .connect(move |_: Entity| *c.lock().unwrap() += 1);

        let e = registry.create();
        registry.emplace(e, Hp(1));
        registry.patch::<Hp>(e, |hp| {
            hp.0 += 1;
            hp.0 *= 2;
        });
        registry.replace(e, Hp(9));

        assert_eq!(*count.lock().unwrap(), 2);
    }

    #[test]
    fn destroy_emits_destruction_for_every_owned_component() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = Registry::new();

        let l = log.clone();
        registry
            .on_destroy::<Pos>()
            .connect(move |_: Entity| l.lock().unwrap().push("pos"));
        let l = log.clone();
        registry
            .on_destroy::<Static>()
            .connect(move |_: Entity| l.lock().unwrap().push("static"));

        let e = registry.create();
        registry.emplace(e, Pos(0., 0., 0.));
        registry.emplace(e, Static);
        registry.destroy(e);

        // pool creation order: Pos first, then Static
        assert_eq!(*log.lock().unwrap(), vec!["pos", "static"]);
    }

    #[test]
    fn released_connection_is_ignored_by_later_operations() {
        let count = Arc::new(Mutex::new(0));
        let mut registry = Registry::new();

        let c = count.clone();
        let conn = registry
            .on_construct::<Hp>()
            .connect(move |_: Entity| *c.lock().unwrap() += 1);

        let e = registry.create();
        registry.emplace(e, Hp(1));
        conn.release();
        conn.release();

        let e2 = registry.create();
        registry.emplace(e2, Hp(2));
        assert_eq!(*count.lock().unwrap(), 1);
    }
}

// -- sparse set scenarios ---------------------------------------------------

#[test]
fn sort_rebuilds_the_sparse_index() {
    let mut set = SparseSet::new();
    let mut x = 0x2545f4914f6cdd1du64;
    let mut ids = Vec::new();
    while ids.len() < 100 {
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        let id = (x >> 40) as EntityRepr & 0x3fff;
        if !ids.contains(&id) {
            ids.push(id);
            set.emplace(id, 0);
        }
    }

    set.sort();

    let dense = set.entities();
    for k in 0..dense.len() {
        assert_eq!(set.find_id(dense[k].id()), Some(k));
        if k + 1 < dense.len() {
            assert!(dense[k].id() < dense[k + 1].id());
        }
    }
}

#[test]
fn version_overflow_wraps_to_zero() {
    assert_eq!(next_version(VERSION_MAX), 0);
    assert_eq!(Entity::new(3, VERSION_MAX).with_next_version().version(), 0);
}
