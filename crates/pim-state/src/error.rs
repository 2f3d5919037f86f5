//! Projection errors
//!
//! Every variant here means the projection is inconsistent with the records
//! being applied or inserted. None of them is a caller error.

use pim_model::Key;

/// Inconsistency between the projection and what is read or written
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    /// No element instance with this key
    #[error("element instance {0} not found")]
    ElementInstanceNotFound(Key),

    /// No deployed process definition with this key
    #[error("process definition {0} not found")]
    ProcessNotFound(Key),

    /// No job with this key
    #[error("job {0} not found")]
    JobNotFound(Key),

    /// No variable with this key
    #[error("variable {0} not found")]
    VariableNotFound(Key),

    /// A process definition lacks an element an instance refers to
    #[error("element '{element_id}' not found in process definition {process_definition_key}")]
    UnknownElement {
        /// Definition that was searched
        process_definition_key: Key,
        /// Missing element id
        element_id: String,
    },

    /// Traversal reached the same element instance twice
    #[error("element instance {0} is reachable twice from its process instance")]
    CyclicExecutionTree(Key),

    /// Insert with a key that is already taken
    #[error("key {0} is already in use")]
    DuplicateKey(Key),

    /// Element instance inserted before its flow scope
    #[error("flow scope {flow_scope_key} of element instance {key} not found")]
    DanglingFlowScope {
        /// Instance being inserted
        key: Key,
        /// Missing flow scope instance
        flow_scope_key: Key,
    },

    /// Event whose value does not belong to its intent
    #[error("record {intent:?} cannot carry a {value_type:?} value")]
    UnexpectedRecordValue {
        /// Intent of the record
        intent: pim_model::Intent,
        /// Type of the value it carried
        value_type: pim_model::ValueType,
    },
}
