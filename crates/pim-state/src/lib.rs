//! PIM State - the execution-state projection seen by the migration engine
//!
//! The engine reads state only through the narrow traits in [`api`]. The
//! [`MemoryState`] projection implements all of them over an arena of element
//! instances indexed by key, with a parent → children index for on-demand
//! child lookup. [`EventApplier`] folds committed migration events back into
//! the projection.

pub mod api;
pub mod applier;
pub mod error;
pub mod memory;

pub use api::{
    ElementInstanceState, EventScopeInstanceState, IncidentState, JobState, ProcessState,
    ProcessingState, VariableState,
};
pub use applier::EventApplier;
pub use error::StateError;
pub use memory::MemoryState;
