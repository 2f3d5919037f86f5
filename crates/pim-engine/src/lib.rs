//! PIM Engine - moves a running process instance onto another process definition
//!
//! A migrate command runs through a fixed pipeline:
//!
//! 1. [`precondition`]: command-level checks, fail fast
//! 2. [`mapping`]: source element id to target element id, root included
//! 3. [`traversal`]: breadth-first walk over the instance's execution tree
//! 4. [`validator`]: per-element invariants, in a fixed order
//! 5. [`emitter`]: buffered follow-up events, grouped per kind
//! 6. [`rejection`]: expected failures become rejections, anything else is fatal
//!
//! [`MigrationEngine`] wraps the pipeline with the event log and the
//! projection: it appends the command, processes it against a read-only view,
//! appends the follow-up batch and applies it.
//!
//! # Example
//!
//! ```rust
//! use pim_engine::prelude::*;
//!
//! let mut engine = MigrationEngine::new(EngineConfig::default());
//! let command = Command::new(
//!     ProcessInstanceMigrationRecord::new(Key(1), Key(2)),
//!     AuthorizationContext::default_tenant(),
//! );
//!
//! let response = engine.submit(command).unwrap();
//! assert_eq!(response.rejection().unwrap().rejection_type, RejectionType::NotFound);
//! ```

pub mod config;
pub mod emitter;
pub mod engine;
pub mod error;
pub mod logging;
pub mod mapping;
pub mod precondition;
pub mod processor;
pub mod rejection;
pub mod test_harness;
pub mod traversal;
pub mod validator;

pub use config::{ConfigError, EngineConfig};
pub use engine::MigrationEngine;
pub use error::{
    InvariantViolation, MappingSide, MigrationError, PreconditionError, ProcessingError,
};
pub use mapping::ElementIdMapping;
pub use processor::{CommandProcessor, MigrateProcessor};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Commonly used types
pub mod prelude {
    pub use crate::config::EngineConfig;
    pub use crate::engine::MigrationEngine;
    pub use crate::error::{InvariantViolation, MigrationError, PreconditionError, ProcessingError};
    pub use crate::processor::{CommandProcessor, MigrateProcessor};
    pub use pim_log::{CommandResponse, EventLog, ProcessingResult, ResponseOutcome};
    pub use pim_model::{
        AuthorizationContext, Command, DeployedProcess, ElementType, Intent, Key,
        ProcessInstanceMigrationRecord, RecordValue, Rejection, RejectionType, TenantId,
    };
    pub use pim_state::{MemoryState, ProcessingState};
}
