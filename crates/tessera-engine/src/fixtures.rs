//! Demo schemas and a ready-wired [`PrototypeContext`].
//!
//! Three layouts exercise every view path: a flat resource, a component with
//! a scalar, a vector, and a nested composite:
//!
//! | layout        | fields                                       |
//! |---------------|----------------------------------------------|
//! | `MyInnerComp` | `a: f32`, `b: i32`                           |
//! | `MyComp`      | `a: f64`, `inner: MyInnerComp`, `vec: dvec3` |
//! | `MyRes`       | `a: f64`, `vec: dvec3`                       |
//!
//! [`increment_system`] adds 1 to every `MyComp.a` and to `MyRes.a` each
//! step.

use std::sync::Arc;

use glam::DVec3;
use tracing::warn;

use tessera_ecs::command::CommandBuffer;
use tessera_ecs::layout::{Layout, Value, ValueType};
use tessera_ecs::record::Record;
use tessera_ecs::view::View;
use tessera_ecs::world::World;
use tessera_ecs::EcsError;

use crate::prototype::PrototypeContext;
use crate::tick::{TickConfig, TickLoop};
use crate::EngineError;

pub const MY_INNER_COMP: &str = "MyInnerComp";
pub const MY_COMP: &str = "MyComp";
pub const MY_RES: &str = "MyRes";

// ---------------------------------------------------------------------------
// Layouts
// ---------------------------------------------------------------------------

pub fn my_inner_comp_layout() -> Arc<Layout> {
    Layout::builder(MY_INNER_COMP)
        .field("a", ValueType::F32)
        .field("b", ValueType::I32)
        .build()
}

pub fn my_comp_layout() -> Arc<Layout> {
    Layout::builder(MY_COMP)
        .field("a", ValueType::F64)
        .field("inner", ValueType::Composite(my_inner_comp_layout()))
        .field("vec", ValueType::DVec3)
        .build()
}

pub fn my_res_layout() -> Arc<Layout> {
    Layout::builder(MY_RES)
        .field("a", ValueType::F64)
        .field("vec", ValueType::DVec3)
        .build()
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

pub fn my_inner_comp(a: f32, b: i32) -> Result<Record, EcsError> {
    Record::zeroed(&my_inner_comp_layout())
        .with("a", a)?
        .with("b", b)
}

pub fn my_comp(a: f64, inner: Record, vec: DVec3) -> Result<Record, EcsError> {
    Record::zeroed(&my_comp_layout())
        .with("a", a)?
        .with_record("inner", inner)?
        .with("vec", vec)
}

pub fn my_res(a: f64, vec: DVec3) -> Result<Record, EcsError> {
    Record::zeroed(&my_res_layout())
        .with("a", a)?
        .with("vec", vec)
}

/// `a + b` of a `MyInnerComp` view, read through the live store.
pub fn inner_sum(inner: &View) -> Result<f32, EcsError> {
    let a = read_number(inner, "a")?;
    let b = read_number(inner, "b")?;
    Ok((a + b) as f32)
}

fn read_number(view: &View, field: &str) -> Result<f64, EcsError> {
    let value = view.read(field)?;
    value.as_f64().ok_or_else(|| EcsError::TypeMismatch {
        field: field.to_owned(),
        expected: "number".to_owned(),
        found: value.type_name(),
    })
}

// ---------------------------------------------------------------------------
// Systems
// ---------------------------------------------------------------------------

/// Adds 1 to `MyComp.a` on every entity and to `MyRes.a`.
pub fn increment_system(world: &World, cmds: &mut CommandBuffer) {
    for entity in world.entities_with(MY_COMP).unwrap_or_default() {
        match world.read_component_field(entity, MY_COMP, "a") {
            Ok(Value::F64(a)) => cmds.set_field(entity, MY_COMP, "a", a + 1.0),
            Ok(other) => warn!(entity = %entity, value = %other, "unexpected MyComp.a value"),
            Err(e) => warn!(entity = %entity, error = %e, "failed to read MyComp.a"),
        }
    }
    if let Ok(Value::F64(a)) = world.read_resource_field(MY_RES, "a") {
        cmds.set_resource_field(MY_RES, "a", a + 1.0);
    }
}

// ---------------------------------------------------------------------------
// Context builders
// ---------------------------------------------------------------------------

/// Register the demo schemas, spawn one entity carrying `comp`, insert `res`,
/// and wire [`increment_system`] into a fresh tick loop.
pub fn prototype_context(comp: Record, res: Record) -> Result<PrototypeContext, EngineError> {
    let mut world = World::new();
    world.register_component(my_comp_layout());
    world.register_resource(my_res_layout());
    let entity = world.spawn_with(comp)?;
    world.insert_resource(res)?;

    let mut tick_loop = TickLoop::new(world, TickConfig::default());
    tick_loop.add_system("increment", increment_system);
    Ok(PrototypeContext::new(tick_loop, entity, MY_COMP, MY_RES))
}

/// [`prototype_context`] seeded with `MyComp(0, MyInnerComp(0, 1), [100; 3])`
/// and `MyRes(0, [100; 3])`.
pub fn default_prototype_context() -> Result<PrototypeContext, EngineError> {
    let comp = my_comp(0.0, my_inner_comp(0.0, 1)?, DVec3::splat(100.0))?;
    let res = my_res(0.0, DVec3::splat(100.0))?;
    prototype_context(comp, res)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layouts_are_packed() {
        assert_eq!(my_inner_comp_layout().size(), 8);
        assert_eq!(my_comp_layout().size(), 8 + 8 + 24);
        assert_eq!(my_res_layout().size(), 32);
    }

    #[test]
    fn records_carry_seed_values() {
        let comp = my_comp(2.0, my_inner_comp(0.5, 3).unwrap(), DVec3::ONE).unwrap();
        assert_eq!(comp.get("a").unwrap(), Value::F64(2.0));
        assert_eq!(comp.get("inner.a").unwrap(), Value::F32(0.5));
        assert_eq!(comp.get("inner.b").unwrap(), Value::I32(3));
        assert_eq!(comp.get("vec").unwrap(), Value::DVec3(DVec3::ONE));
    }

    #[test]
    fn increment_system_queues_one_write_per_target() {
        let ctx = default_prototype_context().unwrap();
        let mut cmds = CommandBuffer::new();
        increment_system(ctx.tick_loop().world(), &mut cmds);
        assert_eq!(cmds.len(), 2);
    }

    #[test]
    fn inner_sum_reads_live_values() {
        let ctx = default_prototype_context().unwrap();
        let inner = ctx.get_comp_ref().unwrap().sub_view("inner").unwrap();
        inner.write("a", 1.5).unwrap();
        assert_eq!(inner_sum(&inner).unwrap(), 2.5);
    }

    #[test]
    fn inner_sum_rejects_non_numeric_fields() {
        let flag = Layout::builder("Flag")
            .field("a", ValueType::Bool)
            .field("b", ValueType::I32)
            .build();
        let mut world = World::new();
        world.register_resource(flag.clone());
        world.insert_resource(Record::zeroed(&flag)).unwrap();
        let view = world.resource_view_by_name("Flag").unwrap();
        assert!(matches!(
            inner_sum(&view),
            Err(EcsError::TypeMismatch { ref field, found: "bool", .. }) if field == "a"
        ));
    }

    #[test]
    fn prototype_rejects_unregistered_seed() {
        let stray = Record::zeroed(&Layout::builder("Stray").build());
        let res = my_res(0.0, DVec3::ZERO).unwrap();
        let err = prototype_context(stray, res).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Ecs(EcsError::UnknownComponent { .. })
        ));
    }
}
