//! PIM Log - the engine's only write surface
//!
//! - [`EventLog`]: hash-chained partition log; a batch is appended under one
//!   lock so no other batch can interleave with it
//! - [`ProcessingResultBuilder`]: collects the follow-up events, rejection and
//!   response of one command before anything touches the log

pub mod error;
pub mod log;
pub mod result;

pub use error::LogError;
pub use log::{EventLog, IntegrityReport, LogEntry, Position};
pub use result::{CommandResponse, ProcessingResult, ProcessingResultBuilder, ResponseOutcome};
