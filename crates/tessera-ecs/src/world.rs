//! The engine store: entities, registered schemas, and the shared memory
//! block that views point into.
//!
//! [`World`] owns all component and resource bytes. Callers get at them in
//! two ways: field-level reads and writes addressed by entity and name, or
//! [`View`]s minted by [`component_view`](World::component_view) and
//! [`resource_view`](World::resource_view).
//!
//! Structural removals (`despawn`, `remove_component`, `remove_resource`)
//! relocate or free bytes, so each one advances the store generation and
//! every view minted before it goes stale. Spawning, inserting, and field
//! writes never move existing bytes and leave views fresh.

use std::rc::Rc;
use std::sync::Arc;

use tracing::debug;

use crate::component::{ComponentRegistry, ComponentTypeId, ResourceId};
use crate::entity::{EntityAllocator, EntityId};
use crate::generation::Generation;
use crate::layout::{self, Layout, Value};
use crate::record::Record;
use crate::storage::{Column, Memory, Region, RegionLocation};
use crate::view::View;
use crate::EcsError;

/// The store. Owns entity ids, schemas, and all component/resource memory.
pub struct World {
    allocator: EntityAllocator,
    registry: ComponentRegistry,
    memory: Rc<Memory>,
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("entity_count", &self.allocator.alive_count())
            .field("component_types", &self.registry.component_count())
            .field("resource_types", &self.registry.resource_count())
            .field("generation", &self.generation())
            .finish()
    }
}

impl World {
    /// Create an empty world at [`Generation::ZERO`].
    pub fn new() -> Self {
        Self {
            allocator: EntityAllocator::new(),
            registry: ComponentRegistry::new(),
            memory: Rc::new(Memory::default()),
        }
    }

    /// Read-only access to the schema registry.
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    // -- registration -------------------------------------------------------

    /// Register a component layout and allocate its column.
    pub fn register_component(&mut self, layout: Arc<Layout>) -> ComponentTypeId {
        let size = layout.size();
        let id = self.registry.register_component(layout);
        let mut tables = self.memory.tables.borrow_mut();
        if id.0 as usize == tables.columns.len() {
            tables.columns.push(Column::new(size));
        }
        id
    }

    /// Register a resource layout and allocate its (empty) slot.
    pub fn register_resource(&mut self, layout: Arc<Layout>) -> ResourceId {
        let id = self.registry.register_resource(layout);
        let mut tables = self.memory.tables.borrow_mut();
        if id.0 as usize == tables.resources.len() {
            tables.resources.push(None);
        }
        id
    }

    // -- generation ---------------------------------------------------------

    /// The store's current generation.
    pub fn generation(&self) -> Generation {
        self.memory.tracker.current()
    }

    /// Advance the generation, invalidating every outstanding view.
    pub fn advance_generation(&mut self) -> Generation {
        self.memory.tracker.advance()
    }

    // -- entity lifecycle ---------------------------------------------------

    /// Spawn an entity with no components.
    pub fn spawn(&mut self) -> EntityId {
        self.allocator.allocate()
    }

    /// Spawn an entity with a single component.
    pub fn spawn_with(&mut self, record: Record) -> Result<EntityId, EcsError> {
        self.spawn_bundle(vec![record])
    }

    /// Spawn an entity with several components.
    ///
    /// Every record is checked against the registry before the entity is
    /// allocated, so a bad record leaves the world untouched.
    pub fn spawn_bundle(&mut self, records: Vec<Record>) -> Result<EntityId, EcsError> {
        let ids = records
            .iter()
            .map(|record| self.component_id_for(record))
            .collect::<Result<Vec<_>, _>>()?;
        let entity = self.allocator.allocate();
        let mut tables = self.memory.tables.borrow_mut();
        for (id, record) in ids.into_iter().zip(records) {
            tables.columns[id.0 as usize].insert(entity, record.as_bytes());
        }
        Ok(entity)
    }

    /// Despawn an entity, dropping all its components and recycling the id.
    pub fn despawn(&mut self, entity: EntityId) -> Result<(), EcsError> {
        self.despawn_deferred(entity)?;
        let generation = self.memory.tracker.advance();
        debug!(entity = %entity, %generation, "entity despawned, views invalidated");
        Ok(())
    }

    /// [`despawn`](Self::despawn) without advancing the generation. The
    /// caller must advance it before any view is used again.
    pub(crate) fn despawn_deferred(&mut self, entity: EntityId) -> Result<(), EcsError> {
        self.check_alive(entity)?;
        {
            let mut tables = self.memory.tables.borrow_mut();
            for column in &mut tables.columns {
                column.swap_remove(entity);
            }
        }
        self.allocator.deallocate(entity);
        Ok(())
    }

    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.allocator.is_alive(entity)
    }

    /// Number of live entities.
    pub fn entity_count(&self) -> usize {
        self.allocator.alive_count()
    }

    // -- components ---------------------------------------------------------

    /// Insert a component, overwriting it in place if already present.
    pub fn insert_component(&mut self, entity: EntityId, record: Record) -> Result<(), EcsError> {
        self.check_alive(entity)?;
        let id = self.component_id_for(&record)?;
        self.memory.tables.borrow_mut().columns[id.0 as usize].insert(entity, record.as_bytes());
        Ok(())
    }

    /// Remove a component from an entity and return its last value.
    pub fn remove_component(&mut self, entity: EntityId, component: &str) -> Result<Record, EcsError> {
        let record = self.remove_component_deferred(entity, component)?;
        let generation = self.memory.tracker.advance();
        debug!(entity = %entity, component, %generation, "component removed, views invalidated");
        Ok(record)
    }

    /// [`remove_component`](Self::remove_component) without advancing the
    /// generation. The caller must advance it before any view is used again.
    pub(crate) fn remove_component_deferred(
        &mut self,
        entity: EntityId,
        component: &str,
    ) -> Result<Record, EcsError> {
        self.check_alive(entity)?;
        let id = self.component_id(component)?;
        let bytes = self.memory.tables.borrow_mut().columns[id.0 as usize]
            .swap_remove(entity)
            .ok_or_else(|| EcsError::ComponentNotFound {
                entity,
                component: component.to_owned(),
            })?;
        Ok(Record::from_bytes(self.component_layout(id), bytes))
    }

    pub fn has_component(&self, entity: EntityId, component: &str) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        let Some(id) = self.registry.lookup_component(component) else {
            return false;
        };
        self.memory.tables.borrow().columns[id.0 as usize]
            .row_of(entity)
            .is_some()
    }

    /// All entities carrying `component`, in storage order.
    pub fn entities_with(&self, component: &str) -> Result<Vec<EntityId>, EcsError> {
        let id = self.component_id(component)?;
        Ok(self.memory.tables.borrow().columns[id.0 as usize]
            .entities()
            .to_vec())
    }

    /// Copy a component out into a detached [`Record`].
    pub fn component_record(&self, entity: EntityId, component: &str) -> Result<Record, EcsError> {
        let (id, row) = self.locate_component(entity, component)?;
        let bytes = self.memory.tables.borrow().columns[id.0 as usize]
            .row(row)
            .to_vec();
        Ok(Record::from_bytes(self.component_layout(id), bytes))
    }

    pub fn read_component_field(
        &self,
        entity: EntityId,
        component: &str,
        path: &str,
    ) -> Result<Value, EcsError> {
        let (id, row) = self.locate_component(entity, component)?;
        let schema = self.component_layout(id);
        let (offset, field) = schema.resolve(path)?;
        let tables = self.memory.tables.borrow();
        layout::read_field(tables.columns[id.0 as usize].row(row), offset, field)
    }

    pub fn write_component_field(
        &mut self,
        entity: EntityId,
        component: &str,
        path: &str,
        value: impl Into<Value>,
    ) -> Result<(), EcsError> {
        let (id, row) = self.locate_component(entity, component)?;
        let schema = self.component_layout(id);
        let (offset, field) = schema.resolve(path)?;
        let mut tables = self.memory.tables.borrow_mut();
        layout::write_field(
            tables.columns[id.0 as usize].row_mut(row),
            offset,
            field,
            value.into(),
        )
    }

    // -- resources ----------------------------------------------------------

    /// Insert a resource, overwriting it in place if already present.
    pub fn insert_resource(&mut self, record: Record) -> Result<(), EcsError> {
        let name = record.layout().name();
        let id = self.resource_id(name)?;
        let layout = self.resource_layout(id);
        if *layout != **record.layout() {
            return Err(EcsError::LayoutMismatch {
                expected: layout.name().to_owned(),
                found: name.to_owned(),
            });
        }
        let mut tables = self.memory.tables.borrow_mut();
        let slot = &mut tables.resources[id.0 as usize];
        if let Some(bytes) = slot.as_mut() {
            bytes.copy_from_slice(record.as_bytes());
        } else {
            *slot = Some(record.into_bytes());
        }
        Ok(())
    }

    /// Remove a resource and return its last value.
    pub fn remove_resource(&mut self, resource: &str) -> Result<Record, EcsError> {
        let id = self.resource_id(resource)?;
        let bytes = self.memory.tables.borrow_mut().resources[id.0 as usize]
            .take()
            .ok_or_else(|| EcsError::ResourceNotFound {
                resource: resource.to_owned(),
            })?;
        let generation = self.memory.tracker.advance();
        debug!(resource, %generation, "resource removed, views invalidated");
        Ok(Record::from_bytes(self.resource_layout(id), bytes))
    }

    pub fn has_resource(&self, resource: &str) -> bool {
        self.registry
            .lookup_resource(resource)
            .is_some_and(|id| self.memory.tables.borrow().resources[id.0 as usize].is_some())
    }

    /// Copy a resource out into a detached [`Record`].
    pub fn resource_record(&self, resource: &str) -> Result<Record, EcsError> {
        let id = self.resource_id(resource)?;
        let bytes = self.memory.tables.borrow().resources[id.0 as usize]
            .clone()
            .ok_or_else(|| EcsError::ResourceNotFound {
                resource: resource.to_owned(),
            })?;
        Ok(Record::from_bytes(self.resource_layout(id), bytes))
    }

    pub fn read_resource_field(&self, resource: &str, path: &str) -> Result<Value, EcsError> {
        let id = self.resource_id(resource)?;
        let schema = self.resource_layout(id);
        let tables = self.memory.tables.borrow();
        let bytes = tables.resources[id.0 as usize]
            .as_deref()
            .ok_or_else(|| EcsError::ResourceNotFound {
                resource: resource.to_owned(),
            })?;
        let (offset, field) = schema.resolve(path)?;
        layout::read_field(bytes, offset, field)
    }

    pub fn write_resource_field(
        &mut self,
        resource: &str,
        path: &str,
        value: impl Into<Value>,
    ) -> Result<(), EcsError> {
        let id = self.resource_id(resource)?;
        let schema = self.resource_layout(id);
        let mut tables = self.memory.tables.borrow_mut();
        let bytes = tables.resources[id.0 as usize]
            .as_deref_mut()
            .ok_or_else(|| EcsError::ResourceNotFound {
                resource: resource.to_owned(),
            })?;
        let (offset, field) = schema.resolve(path)?;
        layout::write_field(bytes, offset, field, value.into())
    }

    // -- views --------------------------------------------------------------

    /// Mint a fresh view over the whole of `entity`'s `component`.
    ///
    /// # Errors
    ///
    /// [`EcsError::StaleEntity`] if the entity is dead,
    /// [`EcsError::UnknownComponent`] if `component` was never registered,
    /// [`EcsError::ComponentNotFound`] if the entity lacks it.
    pub fn component_view(
        &self,
        entity: EntityId,
        component: ComponentTypeId,
    ) -> Result<View, EcsError> {
        self.check_alive(entity)?;
        let info = self
            .registry
            .component_info(component)
            .ok_or_else(|| self.unknown_component(&format!("{component:?}")))?;
        let row = self.memory.tables.borrow().columns[component.0 as usize]
            .row_of(entity)
            .ok_or_else(|| EcsError::ComponentNotFound {
                entity,
                component: info.name().to_owned(),
            })?;
        let region = Region::new(RegionLocation::Component { component, row }, info.layout.size());
        Ok(View::bind(
            Rc::downgrade(&self.memory),
            region,
            Arc::clone(&info.layout),
            self.generation(),
        ))
    }

    /// [`component_view`](Self::component_view) addressed by registered name.
    pub fn component_view_by_name(&self, entity: EntityId, component: &str) -> Result<View, EcsError> {
        // Dead entities report StaleEntity ahead of name lookup.
        self.check_alive(entity)?;
        self.component_view(entity, self.component_id(component)?)
    }

    /// Mint a fresh view over a resource.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownResource`] if `resource` was never registered,
    /// [`EcsError::ResourceNotFound`] if it is not currently inserted.
    pub fn resource_view(&self, resource: ResourceId) -> Result<View, EcsError> {
        let info = self
            .registry
            .resource_info(resource)
            .ok_or_else(|| self.unknown_resource(&format!("{resource:?}")))?;
        if self.memory.tables.borrow().resources[resource.0 as usize].is_none() {
            return Err(EcsError::ResourceNotFound {
                resource: info.name().to_owned(),
            });
        }
        let region = Region::new(RegionLocation::Resource { resource }, info.layout.size());
        Ok(View::bind(
            Rc::downgrade(&self.memory),
            region,
            Arc::clone(&info.layout),
            self.generation(),
        ))
    }

    /// [`resource_view`](Self::resource_view) addressed by registered name.
    pub fn resource_view_by_name(&self, resource: &str) -> Result<View, EcsError> {
        self.resource_view(self.resource_id(resource)?)
    }

    // -- internal helpers ---------------------------------------------------

    fn check_alive(&self, entity: EntityId) -> Result<(), EcsError> {
        if self.allocator.is_alive(entity) {
            Ok(())
        } else {
            Err(EcsError::StaleEntity { entity })
        }
    }

    fn unknown_component(&self, name: &str) -> EcsError {
        EcsError::UnknownComponent {
            name: name.to_owned(),
            registered: self.registry.component_names().join(", "),
        }
    }

    fn unknown_resource(&self, name: &str) -> EcsError {
        EcsError::UnknownResource {
            name: name.to_owned(),
            registered: self.registry.resource_names().join(", "),
        }
    }

    fn component_id(&self, name: &str) -> Result<ComponentTypeId, EcsError> {
        self.registry
            .lookup_component(name)
            .ok_or_else(|| self.unknown_component(name))
    }

    fn resource_id(&self, name: &str) -> Result<ResourceId, EcsError> {
        self.registry
            .lookup_resource(name)
            .ok_or_else(|| self.unknown_resource(name))
    }

    /// Map a record to its registered component id, checking the layout.
    fn component_id_for(&self, record: &Record) -> Result<ComponentTypeId, EcsError> {
        let name = record.layout().name();
        let id = self.component_id(name)?;
        let layout = self.component_layout(id);
        if *layout != **record.layout() {
            return Err(EcsError::LayoutMismatch {
                expected: layout.name().to_owned(),
                found: name.to_owned(),
            });
        }
        Ok(id)
    }

    fn locate_component(
        &self,
        entity: EntityId,
        component: &str,
    ) -> Result<(ComponentTypeId, usize), EcsError> {
        self.check_alive(entity)?;
        let id = self.component_id(component)?;
        let row = self.memory.tables.borrow().columns[id.0 as usize]
            .row_of(entity)
            .ok_or_else(|| EcsError::ComponentNotFound {
                entity,
                component: component.to_owned(),
            })?;
        Ok((id, row))
    }

    fn component_layout(&self, id: ComponentTypeId) -> Arc<Layout> {
        Arc::clone(self.registry.component_layout(id))
    }

    fn resource_layout(&self, id: ResourceId) -> Arc<Layout> {
        Arc::clone(self.registry.resource_layout(id))
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}
