//! Tessera ECS -- generation-checked views onto engine-owned memory.
//!
//! The [`World`](world::World) owns every component and resource as packed
//! bytes described by a [`Layout`](layout::Layout). Callers borrow that
//! memory through [`View`](view::View)s: cheap, non-owning handles that read
//! and write the store in place for as long as the store's
//! [`Generation`](generation::Generation) has not moved on, and fail with
//! [`EcsError::StaleView`] (never stale data, never a crash) afterwards.
//!
//! # Quick Start
//!
//! ```
//! use tessera_ecs::prelude::*;
//!
//! let inner = Layout::builder("inner")
//!     .field("a", ValueType::F32)
//!     .field("b", ValueType::I32)
//!     .build();
//! let comp = Layout::builder("comp")
//!     .field("a", ValueType::F64)
//!     .field("inner", ValueType::Composite(inner))
//!     .build();
//!
//! let mut world = World::new();
//! world.register_component(comp.clone());
//! let entity = world.spawn_with(Record::zeroed(&comp)).unwrap();
//!
//! let view = world.component_view_by_name(entity, "comp").unwrap();
//! let inner = view.sub_view("inner").unwrap();
//! inner.write("b", 7).unwrap();
//! assert_eq!(view.read("inner.b").unwrap(), Value::I32(7));
//!
//! world.advance_generation();
//! assert!(matches!(inner.read("b"), Err(EcsError::StaleView { .. })));
//! ```

#![deny(unsafe_code)]

pub mod command;
pub mod component;
pub mod entity;
pub mod generation;
pub mod layout;
pub mod record;
pub mod storage;
pub mod view;
pub mod world;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by store and view operations.
#[derive(Debug, thiserror::Error)]
pub enum EcsError {
    /// The entity does not exist (stale generation or never allocated).
    #[error("entity {entity:?} does not exist (stale or never allocated)")]
    StaleEntity { entity: entity::EntityId },

    /// A component type was referenced that has not been registered.
    #[error("component type '{name}' not registered. Registered components: [{registered}]")]
    UnknownComponent { name: String, registered: String },

    /// A resource type was referenced that has not been registered.
    #[error("resource type '{name}' not registered. Registered resources: [{registered}]")]
    UnknownResource { name: String, registered: String },

    /// The entity is alive but does not carry the component.
    #[error("entity {entity:?} has no component '{component}'")]
    ComponentNotFound {
        entity: entity::EntityId,
        component: String,
    },

    /// The resource is registered but not currently inserted.
    #[error("resource '{resource}' is not present in the world")]
    ResourceNotFound { resource: String },

    /// The view was minted before the store last advanced.
    #[error("view is stale: minted at {captured}, store is at {current}")]
    StaleView {
        captured: generation::Generation,
        current: generation::Generation,
    },

    /// The store the view points into has been dropped.
    #[error("underlying world has been dropped")]
    StoreDropped,

    /// A field path segment does not exist in the layout.
    #[error("layout '{layout}' has no field '{field}'")]
    UnknownField { layout: String, field: String },

    /// A view path went through a field hidden from views.
    #[error("field '{field}' of layout '{layout}' is hidden from views")]
    HiddenField { layout: String, field: String },

    /// A nested access went through a scalar field.
    #[error("field '{field}' is not a composite")]
    NotComposite { field: String },

    /// A scalar read or write targeted a composite field.
    #[error("field '{field}' is a composite; use a sub-view or record")]
    NotScalar { field: String },

    /// The value cannot be stored in the field's type.
    #[error("field '{field}' expects {expected}, got {found}")]
    TypeMismatch {
        field: String,
        expected: String,
        found: &'static str,
    },

    /// A record's layout differs from the one registered under its name.
    #[error("layout mismatch: expected layout of '{expected}', got record for '{found}'")]
    LayoutMismatch { expected: String, found: String },
}

impl EcsError {
    /// Whether this error means "the thing you asked for is not there".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            EcsError::StaleEntity { .. }
                | EcsError::UnknownComponent { .. }
                | EcsError::UnknownResource { .. }
                | EcsError::ComponentNotFound { .. }
                | EcsError::ResourceNotFound { .. }
        )
    }
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::command::{ApplyReport, Command, CommandBuffer, CommandKind};
    pub use crate::component::{ComponentInfo, ComponentRegistry, ComponentTypeId, ResourceId, ResourceInfo};
    pub use crate::entity::EntityId;
    pub use crate::generation::{Generation, GenerationTracker};
    pub use crate::layout::{FieldDescriptor, Layout, Value, ValueType};
    pub use crate::record::Record;
    pub use crate::storage::{Region, RegionLocation};
    pub use crate::view::{View, ViewState};
    pub use crate::world::World;
    pub use crate::EcsError;
}

// ---------------------------------------------------------------------------
// Integration Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use crate::prelude::*;
    use glam::DVec3;
    use std::sync::Arc;

    fn body() -> Arc<Layout> {
        Layout::builder("body")
            .field("mass", ValueType::F64)
            .field("pos", ValueType::DVec3)
            .build()
    }

    #[test]
    fn views_of_two_entities_stay_independent() {
        let mut world = World::new();
        world.register_component(body());
        let a = world.spawn_with(Record::zeroed(&body())).unwrap();
        let b = world.spawn_with(Record::zeroed(&body())).unwrap();

        let va = world.component_view_by_name(a, "body").unwrap();
        let vb = world.component_view_by_name(b, "body").unwrap();
        va.write("pos", DVec3::X).unwrap();
        vb.write("mass", 2.0).unwrap();

        assert_eq!(va.read("mass").unwrap(), Value::F64(0.0));
        assert_eq!(vb.read("pos").unwrap(), Value::DVec3(DVec3::ZERO));
        assert_eq!(va.read("pos").unwrap(), Value::DVec3(DVec3::X));
    }

    #[test]
    fn command_removal_invalidates_views() {
        let mut world = World::new();
        world.register_component(body());
        let a = world.spawn_with(Record::zeroed(&body())).unwrap();
        let view = world.component_view_by_name(a, "body").unwrap();

        let mut cmds = CommandBuffer::new();
        cmds.despawn(a);
        cmds.apply(&mut world);

        assert_eq!(view.state(), ViewState::Stale);
    }

    #[test]
    fn not_found_family() {
        assert!(EcsError::ResourceNotFound {
            resource: "r".into()
        }
        .is_not_found());
        assert!(!EcsError::StoreDropped.is_not_found());
        assert!(!EcsError::StaleView {
            captured: Generation::ZERO,
            current: Generation::ZERO,
        }
        .is_not_found());
    }

    #[test]
    fn error_messages_name_the_generations() {
        let err = EcsError::StaleView {
            captured: Generation::ZERO,
            current: GenerationTracker::new().advance(),
        };
        assert_eq!(err.to_string(), "view is stale: minted at gen 0, store is at gen 1");
    }
}
