//! A minimal harness binding one tick loop to one entity and one resource.
//!
//! [`PrototypeContext`] is what host bindings and tests drive: step the
//! simulation, then ask for fresh views of the tracked component and
//! resource. Views it hands out follow the normal rules and go stale on the
//! next [`step`](PrototypeContext::step); they report
//! [`EcsError::StoreDropped`] once the context itself is dropped.

use tessera_ecs::entity::EntityId;
use tessera_ecs::view::View;
use tessera_ecs::EcsError;

use crate::tick::TickLoop;

/// Owns a [`TickLoop`] plus the identities of the tracked component and
/// resource.
#[derive(Debug)]
pub struct PrototypeContext {
    tick_loop: TickLoop,
    entity: EntityId,
    component: String,
    resource: String,
}

impl PrototypeContext {
    pub fn new(tick_loop: TickLoop, entity: EntityId, component: &str, resource: &str) -> Self {
        Self {
            tick_loop,
            entity,
            component: component.to_owned(),
            resource: resource.to_owned(),
        }
    }

    /// Advance the simulation one step.
    pub fn step(&mut self) {
        self.tick_loop.step();
    }

    /// A fresh view of the tracked entity's component.
    pub fn get_comp_ref(&self) -> Result<View, EcsError> {
        self.tick_loop
            .get_component_view(self.entity, &self.component)
    }

    /// A fresh view of the tracked resource.
    pub fn get_res_ref(&self) -> Result<View, EcsError> {
        self.tick_loop.get_resource_view(&self.resource)
    }

    pub fn entity(&self) -> EntityId {
        self.entity
    }

    pub fn tick_loop(&self) -> &TickLoop {
        &self.tick_loop
    }

    pub fn tick_loop_mut(&mut self) -> &mut TickLoop {
        &mut self.tick_loop
    }
}
