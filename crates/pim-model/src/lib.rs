//! PIM Model - the vocabulary of process-instance migration
//!
//! Defines the fundamental types shared by every PIM crate:
//! - Keys, tenants and the partition-aware key generator
//! - BPMN element kinds and deployed (immutable) process definitions
//! - Live execution state: element instances, jobs, variables, incidents
//! - Migration commands, follow-up records and rejections
//!
//! # Example
//!
//! ```rust
//! use pim_model::{DeployedProcess, ElementType, Key};
//!
//! let process = DeployedProcess::builder(Key(1), "order", 1)
//!     .element("charge", ElementType::ServiceTask, None)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(process.root_id(), "order");
//! assert_eq!(process.element("charge").unwrap().element_type, ElementType::ServiceTask);
//! ```

pub mod command;
pub mod element;
pub mod error;
pub mod instance;
pub mod key;
pub mod process;
pub mod record;

pub use command::{
    AuthorizationContext, Command, MappingInstruction, Permission, PermissionType,
    ProcessInstanceMigrationRecord, RequestId, ResourceScope,
};
pub use element::{ElementType, EventType};
pub use error::ModelError;
pub use instance::{ElementInstance, ErrorType, EventTrigger, Incident, Job, Variable};
pub use key::{Key, KeyGenerator, TenantId};
pub use process::{DeployedProcess, ExecutableElement, ProcessBuilder};
pub use record::{
    Intent, JobRecord, ProcessInstanceRecord, Record, RecordType, RecordValue, Rejection,
    RejectionType, ValueType, VariableRecord,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
