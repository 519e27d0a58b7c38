//! Component and resource schema registration.
//!
//! Every component or resource type is registered with the [`World`] by
//! handing it a [`Layout`]. Registration assigns a dense id
//! ([`ComponentTypeId`] / [`ResourceId`]) that indexes straight into the
//! store's byte tables. The layout's name doubles as the lookup key for
//! name-based access.
//!
//! [`World`]: crate::world::World

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::layout::Layout;

// ---------------------------------------------------------------------------
// Ids
// ---------------------------------------------------------------------------

/// Identifier for a registered component type.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentTypeId(pub(crate) u32);

impl fmt::Debug for ComponentTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentTypeId({})", self.0)
    }
}

/// Identifier for a registered resource type.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub(crate) u32);

impl fmt::Debug for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceId({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// Infos
// ---------------------------------------------------------------------------

/// Metadata about a registered component type.
#[derive(Debug, Clone)]
pub struct ComponentInfo {
    pub id: ComponentTypeId,
    pub layout: Arc<Layout>,
}

impl ComponentInfo {
    pub fn name(&self) -> &str {
        self.layout.name()
    }
}

/// Metadata about a registered resource type.
#[derive(Debug, Clone)]
pub struct ResourceInfo {
    pub id: ResourceId,
    pub layout: Arc<Layout>,
}

impl ResourceInfo {
    pub fn name(&self) -> &str {
        self.layout.name()
    }
}

// ---------------------------------------------------------------------------
// ComponentRegistry
// ---------------------------------------------------------------------------

/// Maps layout names to dense component and resource ids.
///
/// Re-registering an identical layout under the same name returns the
/// existing id. Registering a *different* layout under a taken name panics:
/// two schemas fighting over one name is a setup bug.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    components_by_name: HashMap<String, ComponentTypeId>,
    components: Vec<ComponentInfo>,
    resources_by_name: HashMap<String, ResourceId>,
    resources: Vec<ResourceInfo>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component layout. Returns the existing id if already known.
    ///
    /// # Panics
    ///
    /// Panics if the name is registered with a different layout.
    pub fn register_component(&mut self, layout: Arc<Layout>) -> ComponentTypeId {
        if let Some(&existing) = self.components_by_name.get(layout.name()) {
            let info = &self.components[existing.0 as usize];
            assert!(
                *info.layout == *layout,
                "component name '{}' is already registered with a different layout",
                layout.name()
            );
            return existing;
        }
        let id = ComponentTypeId(self.components.len() as u32);
        self.components_by_name.insert(layout.name().to_owned(), id);
        self.components.push(ComponentInfo { id, layout });
        id
    }

    /// Register a resource layout. Returns the existing id if already known.
    ///
    /// # Panics
    ///
    /// Panics if the name is registered with a different layout.
    pub fn register_resource(&mut self, layout: Arc<Layout>) -> ResourceId {
        if let Some(&existing) = self.resources_by_name.get(layout.name()) {
            let info = &self.resources[existing.0 as usize];
            assert!(
                *info.layout == *layout,
                "resource name '{}' is already registered with a different layout",
                layout.name()
            );
            return existing;
        }
        let id = ResourceId(self.resources.len() as u32);
        self.resources_by_name.insert(layout.name().to_owned(), id);
        self.resources.push(ResourceInfo { id, layout });
        id
    }

    pub fn lookup_component(&self, name: &str) -> Option<ComponentTypeId> {
        self.components_by_name.get(name).copied()
    }

    pub fn lookup_resource(&self, name: &str) -> Option<ResourceId> {
        self.resources_by_name.get(name).copied()
    }

    pub fn component_info(&self, id: ComponentTypeId) -> Option<&ComponentInfo> {
        self.components.get(id.0 as usize)
    }

    pub fn resource_info(&self, id: ResourceId) -> Option<&ResourceInfo> {
        self.resources.get(id.0 as usize)
    }

    // Ids are only minted here, so indexing by one cannot miss.
    pub(crate) fn component_layout(&self, id: ComponentTypeId) -> &Arc<Layout> {
        &self.components[id.0 as usize].layout
    }

    pub(crate) fn resource_layout(&self, id: ResourceId) -> &Arc<Layout> {
        &self.resources[id.0 as usize].layout
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    /// Names of all registered components, sorted. Used in error messages.
    pub fn component_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.components_by_name.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Names of all registered resources, sorted. Used in error messages.
    pub fn resource_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.resources_by_name.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
