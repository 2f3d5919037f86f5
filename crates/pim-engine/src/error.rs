//! Failure kinds of the migration pipeline
//!
//! [`PreconditionError`] and [`InvariantViolation`] are expected outcomes of a
//! migrate command: each one becomes a rejection. Everything else reaching
//! [`ProcessingError`] means the engine or its projection is broken and must
//! not be answered with a rejection.

use pim_log::LogError;
use pim_model::{ElementType, EventType, Key, TenantId};
use pim_state::StateError;
use std::fmt;

/// Which half of a mapping instruction a check refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingSide {
    /// Source element id
    Source,
    /// Target element id
    Target,
}

impl fmt::Display for MappingSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MappingSide::Source => f.write_str("source"),
            MappingSide::Target => f.write_str("target"),
        }
    }
}

fn join_event_types(event_types: &[EventType]) -> String {
    event_types
        .iter()
        .copied()
        .map(EventType::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Command-level failures, checked before the execution tree is visited
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PreconditionError {
    /// No process instance with this key
    #[error("Expected to migrate process instance but no process instance found with key '{process_instance_key}'")]
    ProcessInstanceNotFound {
        /// Key that was not found
        process_instance_key: Key,
    },

    /// Same message as [`PreconditionError::ProcessInstanceNotFound`]
    #[error("Expected to migrate process instance but no process instance found with key '{process_instance_key}'")]
    TenantNotAuthorized {
        /// Instance that was requested
        process_instance_key: Key,
        /// Tenant the caller is not authorized for
        tenant_id: TenantId,
    },

    /// Caller may not update instances of this process
    #[error("Insufficient permissions to perform operation 'UPDATE_PROCESS_INSTANCE' on process instance '{process_instance_key}' of process '{bpmn_process_id}'")]
    PermissionDenied {
        /// Instance that was requested
        process_instance_key: Key,
        /// Process the instance runs
        bpmn_process_id: String,
    },

    /// Instance was started by another process instance
    #[error("Expected to migrate process instance '{process_instance_key}' but process instance is a child process instance of '{parent_process_instance_key}'. Child process instances cannot be migrated.")]
    ChildProcessInstance {
        /// Instance that was requested
        process_instance_key: Key,
        /// Instance that started it
        parent_process_instance_key: Key,
    },

    /// Mapping instruction with an empty element id
    #[error("Expected to migrate process instance '{process_instance_key}' but mapping instruction at index {index} has an empty {side} element id. Mapping instructions must reference elements by id.")]
    EmptyElementId {
        /// Instance that was requested
        process_instance_key: Key,
        /// Position of the instruction
        index: usize,
        /// Which id is empty
        side: MappingSide,
    },

    /// More mapping instructions than configured
    #[error("Expected to migrate process instance '{process_instance_key}' with at most {limit} mapping instructions but {count} were given")]
    TooManyMappingInstructions {
        /// Instance that was requested
        process_instance_key: Key,
        /// Instructions given
        count: usize,
        /// Configured maximum
        limit: usize,
    },

    /// Source element mapped more than once
    #[error("Expected to migrate process instance '{process_instance_key}' but the mapping instructions contain duplicate source element ids '[{}]'.", .duplicates.join(", "))]
    DuplicateSourceElementIds {
        /// Instance that was requested
        process_instance_key: Key,
        /// Every repeated source id, in first-seen order
        duplicates: Vec<String>,
    },

    /// No target process definition with this key
    #[error("Expected to migrate process instance to process definition but no process definition found with key '{target_process_definition_key}'")]
    TargetProcessNotFound {
        /// Instance that was requested
        process_instance_key: Key,
        /// Key that was not found
        target_process_definition_key: Key,
    },

    /// Mapping source missing from the source process
    #[error("Expected to migrate process instance '{process_instance_key}' but mapping instructions contain a non-existing source element id '{element_id}'. Elements provided in mapping instructions must exist in the source process definition.")]
    UnknownSourceElement {
        /// Instance that was requested
        process_instance_key: Key,
        /// Unknown source id
        element_id: String,
    },

    /// Mapping target missing from the target process
    #[error("Expected to migrate process instance '{process_instance_key}' but mapping instructions contain a non-existing target element id '{element_id}'. Elements provided in mapping instructions must exist in the target process definition.")]
    UnknownTargetElement {
        /// Instance that was requested
        process_instance_key: Key,
        /// Unknown target id
        element_id: String,
    },

    /// Source process declares an event sub-process
    #[error("Expected to migrate process instance '{process_instance_key}' but active process with id '{bpmn_process_id}' has an event subprocess. Process instances with event subprocesses cannot be migrated yet.")]
    EventSubProcessInSource {
        /// Instance that was requested
        process_instance_key: Key,
        /// Source process id
        bpmn_process_id: String,
    },

    /// Target process declares an event sub-process
    #[error("Expected to migrate process instance '{process_instance_key}' but target process with id '{bpmn_process_id}' has an event subprocess. Process instances cannot be migrated to processes with event subprocesses yet.")]
    EventSubProcessInTarget {
        /// Instance that was requested
        process_instance_key: Key,
        /// Target process id
        bpmn_process_id: String,
    },
}

/// Per-element failures found while visiting the execution tree
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    /// Active element of a type that cannot migrate
    #[error("Expected to migrate process instance '{process_instance_key}' but active element with id '{element_id}' has an unsupported type. The migration of a {} is not supported.", .element_type.as_str())]
    UnsupportedElementType {
        /// Instance being migrated
        process_instance_key: Key,
        /// Active element
        element_id: String,
        /// Its type
        element_type: ElementType,
    },

    /// Active element without a mapping
    #[error("Expected to migrate process instance '{process_instance_key}' but no mapping instruction defined for active element with id '{element_id}'. Elements cannot be migrated without a mapping.")]
    UnmappedElement {
        /// Instance being migrated
        process_instance_key: Key,
        /// Active element
        element_id: String,
    },

    /// Active element or its job has an open incident
    #[error("Expected to migrate process instance '{process_instance_key}' but active element with id '{element_id}' has an incident. Elements cannot be migrated with an incident yet. Please try again once the incident is resolved.")]
    ActiveIncident {
        /// Instance being migrated
        process_instance_key: Key,
        /// Active element
        element_id: String,
    },

    /// Mapping changes the element type
    #[error("Expected to migrate process instance '{process_instance_key}' but active element with id '{element_id}' and type '{}' is mapped to an element with id '{target_element_id}' and different type '{}'. Elements must be mapped to elements of the same type.", .source_type.as_str(), .target_type.as_str())]
    ElementTypeChanged {
        /// Instance being migrated
        process_instance_key: Key,
        /// Active element
        element_id: String,
        /// Its type
        source_type: ElementType,
        /// Mapped target element
        target_element_id: String,
        /// Type of the target element
        target_type: ElementType,
    },

    /// Mapping moves the element to another flow scope
    #[error("Expected to migrate process instance '{process_instance_key}' but the flow scope of active element with id '{element_id}' is changed. The flow scope of the active element is expected to be '{expected_flow_scope}' but was '{actual_flow_scope}'. The flow scope of an element cannot be changed during migration yet.")]
    FlowScopeChanged {
        /// Instance being migrated
        process_instance_key: Key,
        /// Active element
        element_id: String,
        /// Target element of the migrated flow scope
        expected_flow_scope: String,
        /// Flow scope the target element declares
        actual_flow_scope: String,
    },

    /// Active element has boundary events
    #[error("Expected to migrate process instance '{process_instance_key}' but active element with id '{element_id}' has one or more boundary events of types '{}'. Migrating active elements with boundary events is not possible yet.", join_event_types(.event_types))]
    BoundaryEventInSource {
        /// Instance being migrated
        process_instance_key: Key,
        /// Active element
        element_id: String,
        /// Types of its boundary events
        event_types: Vec<EventType>,
    },

    /// Target element has boundary events
    #[error("Expected to migrate process instance '{process_instance_key}' but target element with id '{target_element_id}' has one or more boundary events of types '{}'. Migrating target elements with boundary events is not possible yet.", join_event_types(.event_types))]
    BoundaryEventInTarget {
        /// Instance being migrated
        process_instance_key: Key,
        /// Mapped target element
        target_element_id: String,
        /// Types of its boundary events
        event_types: Vec<EventType>,
    },

    /// Pending trigger or taken sequence flow on the element
    #[error("Expected to migrate process instance '{process_instance_key}' but a concurrent command was executed on active element with id '{element_id}'. Please retry the migration.")]
    ConcurrentCommand {
        /// Instance being migrated
        process_instance_key: Key,
        /// Active element
        element_id: String,
    },

    /// Active element waits on a user task
    #[error("Expected to migrate process instance '{process_instance_key}' but active element with id '{element_id}' has an active user task. Elements with active user tasks cannot be migrated yet.")]
    ActiveUserTask {
        /// Instance being migrated
        process_instance_key: Key,
        /// Active element
        element_id: String,
    },
}

/// Every expected way a migrate command can fail
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MigrationError {
    /// Command-level check failed
    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    /// Element-level check failed
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
}

/// Outcome of processing a command that did not succeed
#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    /// Expected failure; translated into a rejection
    #[error(transparent)]
    Migration(#[from] MigrationError),

    /// The projection contradicts itself
    #[error("inconsistent state: {0}")]
    State(#[from] StateError),

    /// The log refused a write or failed verification
    #[error("log failure: {0}")]
    Log(#[from] LogError),

    /// Bug in the engine
    #[error("internal error: {0}")]
    Internal(String),
}

impl ProcessingError {
    /// Whether this failure is answered with a rejection
    #[inline]
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(self, ProcessingError::Migration(_))
    }

    /// Whether processing must stop without a response
    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !self.is_rejection()
    }
}

impl From<PreconditionError> for ProcessingError {
    fn from(error: PreconditionError) -> Self {
        ProcessingError::Migration(MigrationError::Precondition(error))
    }
}

impl From<InvariantViolation> for ProcessingError {
    fn from(error: InvariantViolation) -> Self {
        ProcessingError::Migration(MigrationError::Invariant(error))
    }
}
