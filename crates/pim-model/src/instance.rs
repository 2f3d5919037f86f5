//! Live execution state
//!
//! Element instances form a tree through `flow_scope_key`; parents never hold
//! their children. Jobs, variables and incidents reference element instances
//! by key.

use crate::element::ElementType;
use crate::key::{Key, TenantId};
use serde::{Deserialize, Serialize};

/// A live node of a process instance's execution tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementInstance {
    /// Element instance key
    pub key: Key,
    /// Root of the owning process instance
    pub process_instance_key: Key,
    /// Enclosing element instance; `None` for the process instance itself
    pub flow_scope_key: Option<Key>,
    /// Set on the root of a child process instance (e.g. via call activity)
    pub parent_process_instance_key: Option<Key>,
    /// Process definition the instance runs
    pub process_definition_key: Key,
    /// BPMN process id of that definition
    pub bpmn_process_id: String,
    /// Version of that definition
    pub version: i32,
    /// Element id within that definition
    pub element_id: String,
    /// BPMN type
    pub element_type: ElementType,
    /// Owning tenant
    pub tenant_id: TenantId,
    /// Active job, if the element waits on one
    pub job_key: Option<Key>,
    /// Active user task, if any
    pub user_task_key: Option<Key>,
    /// Sequence-flow tokens taken but not yet consumed
    pub active_sequence_flows: u32,
}

impl ElementInstance {
    /// Whether this is the process instance itself
    #[inline]
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.flow_scope_key.is_none()
    }
}

/// Unit of work bound to one element instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Job key
    pub key: Key,
    /// Job type workers subscribe to
    pub job_type: String,
    /// Owning element instance
    pub element_instance_key: Key,
    /// Owning process instance
    pub process_instance_key: Key,
    /// Process definition of the owner
    pub process_definition_key: Key,
    /// Version of that definition
    pub process_definition_version: i32,
    /// BPMN process id of that definition
    pub bpmn_process_id: String,
    /// Element id of the owner
    pub element_id: String,
    /// Owning tenant
    pub tenant_id: TenantId,
    /// Remaining retries
    pub retries: u32,
}

/// Named value scoped to an element instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    /// Variable key
    pub key: Key,
    /// Element instance the variable is local to
    pub scope_key: Key,
    /// Name, unique within its scope
    pub name: String,
    /// JSON value
    pub value: serde_json::Value,
    /// Owning process instance
    pub process_instance_key: Key,
    /// Process definition of the owner
    pub process_definition_key: Key,
    /// BPMN process id of that definition
    pub bpmn_process_id: String,
    /// Owning tenant
    pub tenant_id: TenantId,
}

/// Kind of blocking error behind an incident
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorType {
    /// Job failed with no retries left
    JobNoRetries,
    /// Value could not be extracted
    ExtractValueError,
    /// Input or output mapping failed
    IoMappingError,
    /// Condition could not be evaluated
    ConditionError,
    /// Called process could not be resolved
    CalledElementError,
    /// Thrown error had no catch event
    UnhandledErrorEvent,
    /// Anything else
    Unknown,
}

/// Open incident on an element instance or its job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Incident {
    /// Incident key
    pub key: Key,
    /// Owning process instance
    pub process_instance_key: Key,
    /// Element instance the incident blocks
    pub element_instance_key: Key,
    /// Failed job, for job incidents
    pub job_key: Option<Key>,
    /// Error class
    pub error_type: ErrorType,
    /// Error detail
    pub error_message: String,
}

/// Pending trigger queued on an event scope (job completion, timer, message
/// or signal correlation that has not been processed yet)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventTrigger {
    /// Key of the triggering event
    pub event_key: Key,
    /// Element the trigger activates
    pub element_id: String,
}
