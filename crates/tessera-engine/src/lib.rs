//! Tessera Engine -- tick loop and prototype harness around [`tessera_ecs`].
//!
//! The [`TickLoop`](tick::TickLoop) owns a [`World`](tessera_ecs::world::World)
//! and drives it one step at a time: systems run, their queued commands are
//! applied, and then the store generation advances so every view handed out
//! during the previous step goes stale.
//!
//! # Quick Start
//!
//! ```
//! use tessera_engine::prelude::*;
//!
//! let counter = Layout::builder("counter").field("n", ValueType::I64).build();
//! let mut world = World::new();
//! world.register_resource(counter.clone());
//! world.insert_resource(Record::zeroed(&counter)).unwrap();
//!
//! let mut tick_loop = TickLoop::new(world, TickConfig::default());
//! tick_loop.add_system("count", |world, cmds| {
//!     if let Ok(Value::I64(n)) = world.read_resource_field("counter", "n") {
//!         cmds.set_resource_field("counter", "n", n + 1);
//!     }
//! });
//!
//! let view = tick_loop.get_resource_view("counter").unwrap();
//! tick_loop.run_steps(3);
//! assert!(!view.is_fresh());
//! assert_eq!(
//!     tick_loop.get_resource_view("counter").unwrap().read("n").unwrap(),
//!     Value::I64(3)
//! );
//! ```

#![deny(unsafe_code)]

pub mod fixtures;
pub mod prototype;
pub mod tick;

use std::path::PathBuf;

/// Re-export the ECS crate for convenience.
pub use tessera_ecs;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by engine setup and configuration.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A store or view operation failed.
    #[error(transparent)]
    Ecs(#[from] tessera_ecs::EcsError),

    /// Configuration text was not valid JSON for the expected shape.
    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// A config file could not be read.
    #[error("failed to read config {path:?}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The environment variable naming a config file is not set.
    #[error("config path variable {var} is not set")]
    ConfigEnvMissing { var: String },

    /// Configuration parsed but holds an unusable value.
    #[error("invalid config: {reason}")]
    InvalidConfig { reason: String },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common engine usage.
pub mod prelude {
    pub use tessera_ecs::prelude::*;

    pub use crate::prototype::PrototypeContext;
    pub use crate::tick::{SystemFn, TickConfig, TickDiagnostics, TickLoop};
    pub use crate::EngineError;
}
