use warren::*;

#[derive(Clone, Copy, Debug, PartialEq)]
struct Pos(f32, f32, f32);
#[derive(Clone, Copy, Debug, PartialEq)]
struct Vel(f32, f32, f32);

impl Component for Pos {
    type Storage = Storage<Self>;
}
impl Component for Vel {
    type Storage = Storage<Self>;
}

fn main() {
    // create a registry
    let mut registry = Registry::new();

    // create entities
    for _ in 0..4 {
        let e = registry.create();
        registry.emplace(e, Pos(1., 2., 3.));
        registry.emplace(e, Vel(1., 2., 3.));
    }

    // update positions
    let moving: Vec<Entity> = registry.view::<(Pos, Vel)>().iter().collect();
    for e in moving {
        let vel = *registry.get::<Vel>(e);
        registry.patch::<Pos>(e, |pos| {
            pos.0 += vel.0;
            pos.1 += vel.1;
            pos.2 += vel.2;
        });
    }

    for (entity, pos) in registry.storage::<Pos>().unwrap().each() {
        println!("{}: {:?}", entity, pos);
    }
}
