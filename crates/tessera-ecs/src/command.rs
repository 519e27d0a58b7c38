//! Deferred world mutations.
//!
//! Systems receive the world by shared reference and queue their changes in
//! a [`CommandBuffer`]. After every system has run, the tick loop applies the
//! buffer in strict insertion order (FIFO). Field values travel as
//! [`Value`]s and spawned components as [`Record`]s, so commands never hold
//! pointers into store memory.
//!
//! # Example
//!
//! ```
//! use tessera_ecs::prelude::*;
//!
//! let health = Layout::builder("health").field("hp", ValueType::U32).build();
//! let mut world = World::new();
//! world.register_component(health.clone());
//! let entity = world.spawn_with(Record::zeroed(&health).with("hp", 100u32).unwrap()).unwrap();
//!
//! let mut cmds = CommandBuffer::new();
//! cmds.set_field(entity, "health", "hp", 50u32);
//!
//! let applied = cmds.apply(&mut world);
//! assert_eq!(applied.len(), 1);
//! assert!(applied[0].applied_successfully);
//! assert_eq!(world.read_component_field(entity, "health", "hp").unwrap(), Value::U32(50));
//! ```

use std::collections::BTreeMap;

use tracing::warn;

use crate::entity::EntityId;
use crate::layout::Value;
use crate::record::Record;
use crate::world::World;
use crate::EcsError;

// ---------------------------------------------------------------------------
// CommandKind
// ---------------------------------------------------------------------------

/// The mutation a command performs.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandKind {
    /// Overwrite one scalar field of a component.
    SetField {
        entity: EntityId,
        component: String,
        path: String,
        value: Value,
    },
    /// Overwrite one scalar field of a resource.
    SetResourceField {
        resource: String,
        path: String,
        value: Value,
    },
    /// Spawn an entity carrying `components`.
    Spawn { components: Vec<Record> },
    /// Despawn an entity entirely.
    Despawn { entity: EntityId },
    /// Remove a component from an entity.
    RemoveComponent { entity: EntityId, component: String },
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// A single deferred mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub kind: CommandKind,
    /// Sequential index within the buffer (set on insertion).
    pub command_index: u32,
    /// For spawn commands: the entity created on application.
    pub spawned_entity: Option<EntityId>,
    /// `false` until [`CommandBuffer::apply`] succeeds on this command.
    pub applied_successfully: bool,
}

impl Command {
    /// The existing entity this command acts on, if any.
    pub fn target(&self) -> Option<EntityId> {
        match &self.kind {
            CommandKind::SetField { entity, .. }
            | CommandKind::Despawn { entity }
            | CommandKind::RemoveComponent { entity, .. } => Some(*entity),
            CommandKind::SetResourceField { .. } | CommandKind::Spawn { .. } => None,
        }
    }

    /// Whether applying this command relocates or frees existing store bytes.
    pub fn is_structural(&self) -> bool {
        matches!(
            self.kind,
            CommandKind::Despawn { .. } | CommandKind::RemoveComponent { .. }
        )
    }

    /// Key used to detect several commands touching the same data.
    fn conflict_key(&self) -> Option<(Option<EntityId>, String)> {
        match &self.kind {
            CommandKind::SetField {
                entity,
                component,
                path,
                ..
            } => Some((Some(*entity), format!("{component}.{path}"))),
            CommandKind::SetResourceField { resource, path, .. } => {
                Some((None, format!("{resource}.{path}")))
            }
            CommandKind::RemoveComponent { entity, component } => {
                Some((Some(*entity), component.clone()))
            }
            CommandKind::Spawn { .. } | CommandKind::Despawn { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// ApplyReport
// ---------------------------------------------------------------------------

/// Summary of the last [`CommandBuffer::apply`] call.
///
/// `conflict_count` counts data keys written by more than one command in the
/// same batch. Conflicts are warnings; the last write wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub conflict_count: usize,
    pub failed_count: usize,
    pub success_count: usize,
    /// Successful despawns and component removals.
    pub structural_count: usize,
}

// ---------------------------------------------------------------------------
// CommandBuffer
// ---------------------------------------------------------------------------

/// Collects commands during a tick and applies them in insertion order.
#[derive(Debug, Default)]
pub struct CommandBuffer {
    commands: Vec<Command>,
    next_index: u32,
    last_apply_report: ApplyReport,
}

impl CommandBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a write of `value` to `component`'s field at `path`.
    pub fn set_field(
        &mut self,
        entity: EntityId,
        component: &str,
        path: &str,
        value: impl Into<Value>,
    ) {
        self.push(CommandKind::SetField {
            entity,
            component: component.to_owned(),
            path: path.to_owned(),
            value: value.into(),
        });
    }

    /// Queue a write of `value` to `resource`'s field at `path`.
    pub fn set_resource_field(&mut self, resource: &str, path: &str, value: impl Into<Value>) {
        self.push(CommandKind::SetResourceField {
            resource: resource.to_owned(),
            path: path.to_owned(),
            value: value.into(),
        });
    }

    /// Queue a spawn. The new id is reported on the applied command.
    pub fn spawn(&mut self, components: Vec<Record>) {
        self.push(CommandKind::Spawn { components });
    }

    pub fn despawn(&mut self, entity: EntityId) {
        self.push(CommandKind::Despawn { entity });
    }

    pub fn remove_component(&mut self, entity: EntityId, component: &str) {
        self.push(CommandKind::RemoveComponent {
            entity,
            component: component.to_owned(),
        });
    }

    /// Queued commands in insertion order.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Report from the last [`apply`](Self::apply). All zero before the
    /// first call.
    pub fn last_apply_report(&self) -> &ApplyReport {
        &self.last_apply_report
    }

    /// Apply every queued command to `world` in insertion order.
    ///
    /// Failed commands are logged and skipped; they stay in the returned
    /// list with `applied_successfully == false`. The buffer is empty
    /// afterwards. If any despawn or removal succeeded, the world generation
    /// advances once at the end of the batch.
    pub fn apply(&mut self, world: &mut World) -> Vec<Command> {
        let applied = self.apply_deferred(world);
        if self.last_apply_report.structural_count > 0 {
            world.advance_generation();
        }
        applied
    }

    /// Like [`apply`](Self::apply) but never advances the generation.
    ///
    /// For callers that advance it themselves once the whole batch is in,
    /// such as a tick loop. Until then, views minted before the batch may
    /// still report fresh after a despawn or removal.
    pub fn apply_deferred(&mut self, world: &mut World) -> Vec<Command> {
        let mut commands = std::mem::take(&mut self.commands);
        self.next_index = 0;

        // --- Conflict detection ---
        let mut seen: BTreeMap<(Option<EntityId>, String), Vec<u32>> = BTreeMap::new();
        for cmd in &commands {
            if let Some(key) = cmd.conflict_key() {
                seen.entry(key).or_default().push(cmd.command_index);
            }
        }
        let mut conflict_count = 0;
        for ((entity, key), indices) in &seen {
            if indices.len() > 1 {
                conflict_count += 1;
                warn!(
                    entity = ?entity,
                    key = %key,
                    command_indices = ?indices,
                    "conflict: {} commands target the same data in this batch (last-write-wins)",
                    indices.len()
                );
            }
        }

        // --- Apply loop ---
        let mut success_count = 0;
        let mut failed_count = 0;
        let mut structural_count = 0;
        for cmd in &mut commands {
            match Self::apply_one(world, &cmd.kind) {
                Ok(spawned) => {
                    cmd.spawned_entity = spawned;
                    cmd.applied_successfully = true;
                    success_count += 1;
                    if cmd.is_structural() {
                        structural_count += 1;
                    }
                }
                Err(e) => {
                    failed_count += 1;
                    warn!(
                        command_index = cmd.command_index,
                        target = ?cmd.target(),
                        error = %e,
                        "command application failed"
                    );
                }
            }
        }

        self.last_apply_report = ApplyReport {
            conflict_count,
            success_count,
            failed_count,
            structural_count,
        };
        commands
    }

    /// Drop all queued commands without applying them.
    pub fn clear(&mut self) {
        self.commands.clear();
        self.next_index = 0;
    }

    // -- internal helpers ---------------------------------------------------

    fn apply_one(world: &mut World, kind: &CommandKind) -> Result<Option<EntityId>, EcsError> {
        match kind {
            CommandKind::SetField {
                entity,
                component,
                path,
                value,
            } => world
                .write_component_field(*entity, component, path, *value)
                .map(|()| None),
            CommandKind::SetResourceField {
                resource,
                path,
                value,
            } => world
                .write_resource_field(resource, path, *value)
                .map(|()| None),
            CommandKind::Spawn { components } => {
                world.spawn_bundle(components.clone()).map(Some)
            }
            CommandKind::Despawn { entity } => world.despawn_deferred(*entity).map(|()| None),
            CommandKind::RemoveComponent { entity, component } => world
                .remove_component_deferred(*entity, component)
                .map(|_| None),
        }
    }

    fn push(&mut self, kind: CommandKind) {
        let index = self.next_index;
        self.next_index += 1;
        self.commands.push(Command {
            kind,
            command_index: index,
            spawned_entity: None,
            applied_successfully: false,
        });
    }
}
