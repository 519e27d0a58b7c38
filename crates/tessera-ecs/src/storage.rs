//! Byte storage owned by the store.
//!
//! Each registered component type gets one [`Column`]: a densely packed byte
//! buffer holding one row per entity that has the component, plus the
//! row ↔ entity maps. Each resource type gets one optional byte slot. Both
//! live in [`Tables`], which together with the
//! [`GenerationTracker`] forms the shared [`Memory`] block that views point
//! into.
//!
//! A [`Region`] is a coordinate into that memory, not a pointer: the row or
//! slot is looked up again on every access. Removing a row swaps the last
//! row into its place, which is why every structural removal must advance
//! the tracker before anyone can observe the moved bytes through an old
//! region.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::component::{ComponentTypeId, ResourceId};
use crate::entity::EntityId;
use crate::generation::GenerationTracker;

// ---------------------------------------------------------------------------
// Region
// ---------------------------------------------------------------------------

/// Which buffer a [`Region`] lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionLocation {
    /// Row `row` of the column for `component`.
    Component {
        component: ComponentTypeId,
        row: usize,
    },
    /// The slot for `resource`.
    Resource { resource: ResourceId },
}

/// A byte range inside one component row or resource slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region {
    location: RegionLocation,
    offset: usize,
    len: usize,
}

impl Region {
    pub(crate) fn new(location: RegionLocation, len: usize) -> Self {
        Self {
            location,
            offset: 0,
            len,
        }
    }

    /// The sub-range `[offset, offset + len)` relative to this region.
    ///
    /// # Panics
    ///
    /// Panics if the sub-range does not fit; descriptors are validated when
    /// layouts are built, so this only fires on a corrupted layout.
    pub(crate) fn sub(&self, offset: usize, len: usize) -> Self {
        assert!(
            offset + len <= self.len,
            "sub-region {offset}..{} exceeds parent region of {} bytes",
            offset + len,
            self.len
        );
        Self {
            location: self.location,
            offset: self.offset + offset,
            len,
        }
    }

    pub fn location(&self) -> RegionLocation {
        self.location
    }

    /// Offset from the start of the row or slot.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn range(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.len
    }
}

// ---------------------------------------------------------------------------
// Column
// ---------------------------------------------------------------------------

/// Packed rows of one component type.
#[derive(Debug)]
pub(crate) struct Column {
    item_size: usize,
    data: Vec<u8>,
    entities: Vec<EntityId>,
    rows: HashMap<EntityId, usize>,
}

impl Column {
    pub(crate) fn new(item_size: usize) -> Self {
        Self {
            item_size,
            data: Vec::new(),
            entities: Vec::new(),
            rows: HashMap::new(),
        }
    }

    pub(crate) fn row_of(&self, entity: EntityId) -> Option<usize> {
        self.rows.get(&entity).copied()
    }

    pub(crate) fn entities(&self) -> &[EntityId] {
        &self.entities
    }

    /// Insert or overwrite the row for `entity`. Returns the row index.
    pub(crate) fn insert(&mut self, entity: EntityId, bytes: &[u8]) -> usize {
        assert_eq!(bytes.len(), self.item_size, "component byte size mismatch");
        if let Some(row) = self.row_of(entity) {
            self.row_mut(row).copy_from_slice(bytes);
            return row;
        }
        let row = self.entities.len();
        self.data.extend_from_slice(bytes);
        self.entities.push(entity);
        self.rows.insert(entity, row);
        row
    }

    pub(crate) fn row(&self, row: usize) -> &[u8] {
        let start = row * self.item_size;
        &self.data[start..start + self.item_size]
    }

    pub(crate) fn row_mut(&mut self, row: usize) -> &mut [u8] {
        let start = row * self.item_size;
        &mut self.data[start..start + self.item_size]
    }

    /// Remove the row for `entity`, moving the last row into the hole.
    /// Returns the removed bytes, or `None` if the entity had no row.
    pub(crate) fn swap_remove(&mut self, entity: EntityId) -> Option<Vec<u8>> {
        let row = self.rows.remove(&entity)?;
        let last = self.entities.len() - 1;
        let removed = self.row(row).to_vec();
        if row != last {
            let start = last * self.item_size;
            self.data.copy_within(start..start + self.item_size, row * self.item_size);
            let moved = self.entities[last];
            self.entities[row] = moved;
            self.rows.insert(moved, row);
        }
        self.entities.pop();
        self.data.truncate(last * self.item_size);
        Some(removed)
    }
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// All component columns and resource slots, indexed by id.
#[derive(Debug, Default)]
pub(crate) struct Tables {
    pub(crate) columns: Vec<Column>,
    pub(crate) resources: Vec<Option<Vec<u8>>>,
}

impl Tables {
    fn location_bytes(&self, location: RegionLocation) -> &[u8] {
        match location {
            RegionLocation::Component { component, row } => {
                self.columns[component.0 as usize].row(row)
            }
            RegionLocation::Resource { resource } => self.resources[resource.0 as usize]
                .as_deref()
                .expect("resource region resolved after removal without a generation bump"),
        }
    }

    fn location_bytes_mut(&mut self, location: RegionLocation) -> &mut [u8] {
        match location {
            RegionLocation::Component { component, row } => {
                self.columns[component.0 as usize].row_mut(row)
            }
            RegionLocation::Resource { resource } => self.resources[resource.0 as usize]
                .as_deref_mut()
                .expect("resource region resolved after removal without a generation bump"),
        }
    }

    /// The bytes covered by `region`.
    pub(crate) fn region(&self, region: &Region) -> &[u8] {
        &self.location_bytes(region.location)[region.range()]
    }

    pub(crate) fn region_mut(&mut self, region: &Region) -> &mut [u8] {
        &mut self.location_bytes_mut(region.location)[region.range()]
    }
}

// ---------------------------------------------------------------------------
// Memory
// ---------------------------------------------------------------------------

/// The shared block views resolve against.
///
/// Owned by the world through an `Rc`; views hold a `Weak` so they never
/// keep the store alive.
#[derive(Debug, Default)]
pub(crate) struct Memory {
    pub(crate) tracker: GenerationTracker,
    pub(crate) tables: RefCell<Tables>,
}
