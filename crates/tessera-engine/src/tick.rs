//! Fixed-timestep tick loop.
//!
//! Each [`TickLoop::step`]:
//!
//! 1. Runs every registered system once, in registration order. Systems get
//!    a shared reference to the [`World`] and queue mutations in the
//!    [`CommandBuffer`].
//! 2. Applies the command buffer (FIFO).
//! 3. Advances the store generation. Every view minted before this point is
//!    now stale.
//! 4. Advances the tick counter.
//!
//! The generation advance comes strictly after all mutation for the step, so
//! a view minted between two steps observes a settled store.

use std::path::Path;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use tessera_ecs::command::{ApplyReport, Command, CommandBuffer};
use tessera_ecs::entity::EntityId;
use tessera_ecs::generation::Generation;
use tessera_ecs::view::View;
use tessera_ecs::world::World;
use tessera_ecs::EcsError;

use crate::EngineError;

// ---------------------------------------------------------------------------
// TickConfig
// ---------------------------------------------------------------------------

/// Configuration for the tick loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickConfig {
    /// Fixed time step in seconds per tick. Must be positive and finite.
    pub fixed_dt: f64,
}

impl Default for TickConfig {
    /// Defaults to 60 Hz.
    fn default() -> Self {
        Self {
            fixed_dt: 1.0 / 60.0,
        }
    }
}

impl TickConfig {
    /// Parse a config from JSON. Missing keys take their defaults.
    pub fn from_json_str(text: &str) -> Result<Self, EngineError> {
        let config: TickConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON config file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| EngineError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json_str(&text)?;
        info!(path = %path.display(), "loaded tick config");
        Ok(config)
    }

    /// Load the config file named by environment variable `var`.
    pub fn from_env_path(var: &str) -> Result<Self, EngineError> {
        let path = std::env::var_os(var).ok_or_else(|| EngineError::ConfigEnvMissing {
            var: var.to_owned(),
        })?;
        Self::from_path(path)
    }

    /// Use `explicit` if given, otherwise load from the file named by `var`.
    pub fn or_from_env_path(explicit: Option<Self>, var: &str) -> Result<Self, EngineError> {
        match explicit {
            Some(config) => {
                config.validate()?;
                Ok(config)
            }
            None => Self::from_env_path(var),
        }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.fixed_dt > 0.0 && self.fixed_dt.is_finite() {
            Ok(())
        } else {
            Err(EngineError::InvalidConfig {
                reason: format!("fixed_dt must be positive and finite, got {}", self.fixed_dt),
            })
        }
    }
}

// ---------------------------------------------------------------------------
// TickDiagnostics
// ---------------------------------------------------------------------------

/// Timing and command statistics for the last step.
#[derive(Debug, Clone, Default)]
pub struct TickDiagnostics {
    /// Wall-clock time per system, in execution order.
    pub system_times: Vec<(String, Duration)>,
    /// Total time for the step.
    pub total_time: Duration,
    pub command_apply_time: Duration,
    pub apply_report: ApplyReport,
}

// ---------------------------------------------------------------------------
// SystemFn
// ---------------------------------------------------------------------------

/// A system run once per step.
///
/// Systems read the world through the shared reference and queue all
/// mutations in the command buffer.
pub type SystemFn = fn(&World, &mut CommandBuffer);

#[derive(Debug)]
struct RegisteredSystem {
    name: String,
    func: SystemFn,
}

// ---------------------------------------------------------------------------
// TickLoop
// ---------------------------------------------------------------------------

/// Owns a [`World`] and steps it forward.
pub struct TickLoop {
    world: World,
    command_buffer: CommandBuffer,
    systems: Vec<RegisteredSystem>,
    tick_counter: u64,
    fixed_dt: f64,
    last_diagnostics: TickDiagnostics,
}

impl TickLoop {
    /// Create a tick loop at tick 0.
    ///
    /// # Panics
    ///
    /// Panics if `config.fixed_dt` is not positive and finite.
    pub fn new(world: World, config: TickConfig) -> Self {
        assert!(
            config.fixed_dt > 0.0 && config.fixed_dt.is_finite(),
            "fixed_dt must be positive and finite, got {}",
            config.fixed_dt
        );
        Self {
            world,
            command_buffer: CommandBuffer::new(),
            systems: Vec::new(),
            tick_counter: 0,
            fixed_dt: config.fixed_dt,
            last_diagnostics: TickDiagnostics::default(),
        }
    }

    /// Register a system. Systems run in registration order.
    ///
    /// # Panics
    ///
    /// Panics if a system with the same name is already registered.
    pub fn add_system(&mut self, name: &str, func: SystemFn) {
        assert!(
            !self.systems.iter().any(|s| s.name == name),
            "duplicate system name: {name:?}"
        );
        self.systems.push(RegisteredSystem {
            name: name.to_owned(),
            func,
        });
    }

    /// Run one step and return the processed commands.
    pub fn step(&mut self) -> Vec<Command> {
        let step_start = Instant::now();
        let mut system_times = Vec::with_capacity(self.systems.len());

        // Phase 1: systems.
        for system in &self.systems {
            let sys_start = Instant::now();
            (system.func)(&self.world, &mut self.command_buffer);
            system_times.push((system.name.clone(), sys_start.elapsed()));
        }

        // Phase 2: commands.
        let apply_start = Instant::now();
        let applied = self.command_buffer.apply_deferred(&mut self.world);
        let command_apply_time = apply_start.elapsed();
        let apply_report = self.command_buffer.last_apply_report().clone();

        // Phase 3: invalidate outstanding views. The only advance in a step.
        let generation = self.world.advance_generation();

        // Phase 4: tick counter.
        self.tick_counter += 1;

        debug!(
            tick = self.tick_counter,
            %generation,
            commands = applied.len(),
            failed = apply_report.failed_count,
            conflicts = apply_report.conflict_count,
            "step complete"
        );

        self.last_diagnostics = TickDiagnostics {
            system_times,
            total_time: step_start.elapsed(),
            command_apply_time,
            apply_report,
        };
        applied
    }

    /// Run `count` steps. Returns the total number of commands processed.
    pub fn run_steps(&mut self, count: u64) -> u64 {
        let mut total_commands = 0u64;
        for _ in 0..count {
            total_commands += self.step().len() as u64;
        }
        total_commands
    }

    // -- view accessors -----------------------------------------------------

    /// Mint a view of `entity`'s `component`, valid until the next step.
    pub fn get_component_view(&self, entity: EntityId, component: &str) -> Result<View, EcsError> {
        self.world.component_view_by_name(entity, component)
    }

    /// Mint a view of `resource`, valid until the next step.
    pub fn get_resource_view(&self, resource: &str) -> Result<View, EcsError> {
        self.world.resource_view_by_name(resource)
    }

    // -- accessors ----------------------------------------------------------

    pub fn tick_count(&self) -> u64 {
        self.tick_counter
    }

    /// Simulation time in seconds, computed as `tick_count * fixed_dt` so it
    /// never drifts.
    pub fn sim_time(&self) -> f64 {
        self.tick_counter as f64 * self.fixed_dt
    }

    pub fn fixed_dt(&self) -> f64 {
        self.fixed_dt
    }

    /// The store's current generation.
    pub fn generation(&self) -> Generation {
        self.world.generation()
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Mutable access to the world, for setup and tests.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    /// Names of all registered systems, in execution order.
    pub fn system_names(&self) -> Vec<&str> {
        self.systems.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn last_diagnostics(&self) -> &TickDiagnostics {
        &self.last_diagnostics
    }
}

impl std::fmt::Debug for TickLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickLoop")
            .field("tick_count", &self.tick_counter)
            .field("fixed_dt", &self.fixed_dt)
            .field("systems", &self.system_names())
            .field("world", &self.world)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
