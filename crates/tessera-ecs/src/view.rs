//! Generation-checked views onto store memory.
//!
//! A [`View`] is a transient, mutable window onto one component row or
//! resource slot (or a nested composite inside one). It holds no bytes of
//! its own: every read and write goes straight to the store's buffer, so a
//! write through one view is immediately visible through every other view
//! of the same bytes.
//!
//! Each view is stamped with the store [`Generation`] current when it was
//! minted. Every access first upgrades the weak memory handle, then compares
//! the stamp against the tracker, and only then touches memory. Once the
//! tracker has advanced the view is stale for good: there is no refresh,
//! callers mint a new view instead.
//!
//! ```
//! use tessera_ecs::prelude::*;
//!
//! let layout = Layout::builder("counter").field("n", ValueType::I64).build();
//! let mut world = World::new();
//! world.register_resource(layout.clone());
//! world.insert_resource(Record::zeroed(&layout)).unwrap();
//!
//! let view = world.resource_view_by_name("counter").unwrap();
//! view.update("n", |v| Value::I64(v.as_i128().unwrap_or(0) as i64 + 1)).unwrap();
//! assert_eq!(view.read("n").unwrap(), Value::I64(1));
//!
//! world.advance_generation();
//! assert!(matches!(view.read("n"), Err(EcsError::StaleView { .. })));
//! ```

use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::generation::Generation;
use crate::layout::{self, Layout, Value};
use crate::record::Record;
use crate::storage::{Memory, Region};
use crate::EcsError;

// ---------------------------------------------------------------------------
// ViewState
// ---------------------------------------------------------------------------

/// Lifecycle state of a [`View`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    /// The stamp matches the store's current generation.
    Fresh,
    /// The store has advanced since the view was minted.
    Stale,
    /// The store has been dropped.
    Detached,
}

// ---------------------------------------------------------------------------
// View
// ---------------------------------------------------------------------------

/// Non-owning, generation-stamped handle onto a [`Region`] of store memory.
///
/// Cloning a view is cheap and yields another handle with the same stamp.
/// Views are `!Send`: the store they point into is single-threaded.
#[derive(Clone)]
pub struct View {
    memory: Weak<Memory>,
    region: Region,
    layout: Arc<Layout>,
    generation: Generation,
}

impl View {
    /// Wrap a region. Performs no validation; callers pass the generation
    /// that was current when they resolved `region`.
    pub(crate) fn bind(
        memory: Weak<Memory>,
        region: Region,
        layout: Arc<Layout>,
        generation: Generation,
    ) -> Self {
        trace!(
            layout = layout.name(),
            region = ?region,
            %generation,
            "view minted"
        );
        Self {
            memory,
            region,
            layout,
            generation,
        }
    }

    /// The generation this view was minted at.
    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn layout(&self) -> &Arc<Layout> {
        &self.layout
    }

    pub fn region(&self) -> Region {
        self.region
    }

    pub fn state(&self) -> ViewState {
        match self.memory.upgrade() {
            None => ViewState::Detached,
            Some(memory) if memory.tracker.is_current(self.generation) => ViewState::Fresh,
            Some(_) => ViewState::Stale,
        }
    }

    pub fn is_fresh(&self) -> bool {
        self.state() == ViewState::Fresh
    }

    /// Read the scalar at `path`. Dotted paths reach into nested composites.
    pub fn read(&self, path: &str) -> Result<Value, EcsError> {
        let memory = self.validate()?;
        let (offset, field) = self.layout.resolve_visible(path)?;
        let tables = memory.tables.borrow();
        layout::read_field(tables.region(&self.region), offset, field)
    }

    /// Write `value` to the scalar at `path`, in place.
    pub fn write(&self, path: &str, value: impl Into<Value>) -> Result<(), EcsError> {
        let memory = self.validate()?;
        let (offset, field) = self.layout.resolve_visible(path)?;
        let mut tables = memory.tables.borrow_mut();
        layout::write_field(tables.region_mut(&self.region), offset, field, value.into())
    }

    /// Read-modify-write the scalar at `path`. Returns the value as stored,
    /// after coercion to the field type.
    pub fn update(
        &self,
        path: &str,
        f: impl FnOnce(Value) -> Value,
    ) -> Result<Value, EcsError> {
        let memory = self.validate()?;
        let (offset, field) = self.layout.resolve_visible(path)?;
        let current = layout::read_field(memory.tables.borrow().region(&self.region), offset, field)?;
        let next = f(current);
        let mut tables = memory.tables.borrow_mut();
        let bytes = tables.region_mut(&self.region);
        layout::write_field(bytes, offset, field, next)?;
        layout::read_field(bytes, offset, field)
    }

    /// A view of the nested composite at `path`, sharing this view's stamp.
    pub fn sub_view(&self, path: &str) -> Result<View, EcsError> {
        self.validate()?;
        let (offset, field) = self.layout.resolve_visible(path)?;
        let inner = field.composite().ok_or_else(|| EcsError::NotComposite {
            field: field.name().to_owned(),
        })?;
        Ok(View::bind(
            self.memory.clone(),
            self.region.sub(offset, field.size()),
            Arc::clone(inner),
            self.generation,
        ))
    }

    /// Overwrite the nested composite at `path` with the bytes of `record`.
    pub fn write_record(&self, path: &str, record: &Record) -> Result<(), EcsError> {
        let memory = self.validate()?;
        let (offset, field) = self.layout.resolve_visible(path)?;
        let inner = field.composite().ok_or_else(|| EcsError::NotComposite {
            field: field.name().to_owned(),
        })?;
        if **inner != **record.layout() {
            return Err(EcsError::LayoutMismatch {
                expected: inner.name().to_owned(),
                found: record.layout().name().to_owned(),
            });
        }
        let mut tables = memory.tables.borrow_mut();
        tables.region_mut(&self.region)[offset..offset + field.size()]
            .copy_from_slice(record.as_bytes());
        Ok(())
    }

    /// Copy the viewed bytes out into a detached [`Record`].
    pub fn to_record(&self) -> Result<Record, EcsError> {
        let memory = self.validate()?;
        let bytes = memory.tables.borrow().region(&self.region).to_vec();
        Ok(Record::from_bytes(Arc::clone(&self.layout), bytes))
    }

    // -- internal helpers ---------------------------------------------------

    fn validate(&self) -> Result<Rc<Memory>, EcsError> {
        let Some(memory) = self.memory.upgrade() else {
            debug!(layout = self.layout.name(), "view access rejected: store dropped");
            return Err(EcsError::StoreDropped);
        };
        let current = memory.tracker.current();
        if current != self.generation {
            debug!(
                layout = self.layout.name(),
                captured = %self.generation,
                current = %current,
                "view access rejected: stale generation"
            );
            return Err(EcsError::StaleView {
                captured: self.generation,
                current,
            });
        }
        Ok(memory)
    }
}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("layout", &self.layout.name())
            .field("region", &self.region)
            .field("generation", &self.generation)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::*;
    use glam::DVec3;

    fn inner_layout() -> Arc<Layout> {
        Layout::builder("inner")
            .field("a", ValueType::F32)
            .field("b", ValueType::I32)
            .build()
    }

    fn comp_layout() -> Arc<Layout> {
        Layout::builder("comp")
            .field("a", ValueType::F64)
            .field("inner", ValueType::Composite(inner_layout()))
            .field("vec", ValueType::DVec3)
            .build()
    }

    fn world_with_entity() -> (World, EntityId) {
        let mut world = World::new();
        let layout = comp_layout();
        world.register_component(layout.clone());
        let record = Record::zeroed(&layout)
            .with("inner.b", 1)
            .unwrap()
            .with("vec", DVec3::splat(100.0))
            .unwrap();
        let entity = world.spawn_with(record).unwrap();
        (world, entity)
    }

    #[test]
    fn fresh_view_reads_and_writes() {
        let (world, e) = world_with_entity();
        let view = world.component_view_by_name(e, "comp").unwrap();
        assert_eq!(view.state(), ViewState::Fresh);
        assert_eq!(view.read("inner.b").unwrap(), Value::I32(1));
        view.write("a", 2.5).unwrap();
        assert_eq!(view.read("a").unwrap(), Value::F64(2.5));
    }

    #[test]
    fn writes_are_visible_through_other_views() {
        let (world, e) = world_with_entity();
        let v1 = world.component_view_by_name(e, "comp").unwrap();
        let v2 = world.component_view_by_name(e, "comp").unwrap();
        v1.write("a", 7.0).unwrap();
        assert_eq!(v2.read("a").unwrap(), Value::F64(7.0));
        assert_eq!(
            world.read_component_field(e, "comp", "a").unwrap(),
            Value::F64(7.0)
        );
    }

    #[test]
    fn update_returns_stored_value() {
        let (world, e) = world_with_entity();
        let view = world.component_view_by_name(e, "comp").unwrap();
        let stored = view
            .update("inner.a", |v| Value::F64(v.as_f64().unwrap() + 1.0))
            .unwrap();
        assert_eq!(stored, Value::F32(1.0));
    }

    #[test]
    fn advance_makes_view_stale() {
        let (mut world, e) = world_with_entity();
        let view = world.component_view_by_name(e, "comp").unwrap();
        let captured = view.generation();
        world.advance_generation();

        assert_eq!(view.state(), ViewState::Stale);
        match view.read("a").unwrap_err() {
            EcsError::StaleView {
                captured: c,
                current,
            } => {
                assert_eq!(c, captured);
                assert_eq!(current, world.generation());
            }
            other => panic!("expected StaleView, got {other:?}"),
        }
        assert!(matches!(view.write("a", 1.0), Err(EcsError::StaleView { .. })));
        assert!(matches!(view.sub_view("inner"), Err(EcsError::StaleView { .. })));
        assert!(matches!(view.to_record(), Err(EcsError::StaleView { .. })));
    }

    #[test]
    fn stale_write_leaves_memory_untouched() {
        let (mut world, e) = world_with_entity();
        let view = world.component_view_by_name(e, "comp").unwrap();
        world.advance_generation();
        let _ = view.write("a", 99.0);
        assert_eq!(
            world.read_component_field(e, "comp", "a").unwrap(),
            Value::F64(0.0)
        );
    }

    #[test]
    fn sub_view_shares_stamp_and_memory() {
        let (mut world, e) = world_with_entity();
        let view = world.component_view_by_name(e, "comp").unwrap();
        let inner = view.sub_view("inner").unwrap();
        assert_eq!(inner.generation(), view.generation());
        assert_eq!(inner.layout().name(), "inner");
        assert_eq!(inner.region().offset(), 8);

        inner.write("a", 3.0).unwrap();
        assert_eq!(view.read("inner.a").unwrap(), Value::F32(3.0));

        world.advance_generation();
        assert_eq!(inner.state(), ViewState::Stale);
        assert!(matches!(inner.read("a"), Err(EcsError::StaleView { .. })));
    }

    #[test]
    fn sub_view_of_scalar_is_rejected() {
        let (world, e) = world_with_entity();
        let view = world.component_view_by_name(e, "comp").unwrap();
        assert!(matches!(
            view.sub_view("a").unwrap_err(),
            EcsError::NotComposite { .. }
        ));
        assert!(matches!(
            view.sub_view("missing").unwrap_err(),
            EcsError::UnknownField { .. }
        ));
    }

    #[test]
    fn scalar_access_to_composite_is_rejected() {
        let (world, e) = world_with_entity();
        let view = world.component_view_by_name(e, "comp").unwrap();
        assert!(matches!(view.read("inner"), Err(EcsError::NotScalar { .. })));
        assert!(matches!(
            view.write("inner", 1.0),
            Err(EcsError::NotScalar { .. })
        ));
    }

    #[test]
    fn write_type_mismatch() {
        let (world, e) = world_with_entity();
        let view = world.component_view_by_name(e, "comp").unwrap();
        assert!(matches!(
            view.write("vec", true),
            Err(EcsError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn write_record_replaces_nested_composite() {
        let (world, e) = world_with_entity();
        let view = world.component_view_by_name(e, "comp").unwrap();
        let replacement = Record::zeroed(&inner_layout())
            .with("a", 4.0)
            .unwrap()
            .with("b", 9)
            .unwrap();
        view.write_record("inner", &replacement).unwrap();
        assert_eq!(view.read("inner.b").unwrap(), Value::I32(9));

        let wrong = Record::zeroed(&comp_layout());
        assert!(matches!(
            view.write_record("inner", &wrong),
            Err(EcsError::LayoutMismatch { .. })
        ));
    }

    #[test]
    fn to_record_is_detached() {
        let (world, e) = world_with_entity();
        let view = world.component_view_by_name(e, "comp").unwrap();
        let snapshot = view.to_record().unwrap();
        view.write("a", 5.0).unwrap();
        assert_eq!(snapshot.get("a").unwrap(), Value::F64(0.0));
        assert_eq!(snapshot.get("vec").unwrap(), Value::DVec3(DVec3::splat(100.0)));
    }

    #[test]
    fn dropped_store_detaches_views() {
        let (world, e) = world_with_entity();
        let view = world.component_view_by_name(e, "comp").unwrap();
        let inner = view.sub_view("inner").unwrap();
        drop(world);

        assert_eq!(view.state(), ViewState::Detached);
        assert!(matches!(view.read("a"), Err(EcsError::StoreDropped)));
        assert!(matches!(inner.write("a", 1.0), Err(EcsError::StoreDropped)));
        assert!(matches!(view.sub_view("inner"), Err(EcsError::StoreDropped)));
    }

    #[test]
    fn hidden_fields_are_unreachable_through_views() {
        let mut world = World::new();
        let layout = Layout::builder("guarded")
            .field("a", ValueType::F64)
            .hidden_field("secret", ValueType::I64)
            .hidden_field("inner", ValueType::Composite(inner_layout()))
            .build();
        world.register_resource(layout.clone());
        world
            .insert_resource(Record::zeroed(&layout).with("secret", 7i64).unwrap())
            .unwrap();
        let view = world.resource_view_by_name("guarded").unwrap();

        assert!(matches!(view.read("secret"), Err(EcsError::HiddenField { .. })));
        assert!(matches!(view.write("secret", 1i64), Err(EcsError::HiddenField { .. })));
        assert!(matches!(view.read("inner.a"), Err(EcsError::HiddenField { .. })));
        assert!(matches!(view.sub_view("inner"), Err(EcsError::HiddenField { .. })));
        view.write("a", 1.0).unwrap();

        world.write_resource_field("guarded", "secret", 9i64).unwrap();
        assert_eq!(
            world.read_resource_field("guarded", "secret").unwrap(),
            Value::I64(9)
        );
    }

    #[test]
    fn debug_shows_state() {
        let (world, e) = world_with_entity();
        let view = world.component_view_by_name(e, "comp").unwrap();
        let text = format!("{view:?}");
        assert!(text.contains("comp"));
        assert!(text.contains("Fresh"));
    }
}
