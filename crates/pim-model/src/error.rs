//! Error types for building process definitions

/// Errors raised while assembling a [`DeployedProcess`](crate::DeployedProcess)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// Two elements share the same id
    #[error("duplicate element id '{0}'")]
    DuplicateElementId(String),

    /// Element declares a flow scope that is not part of the process
    #[error("element '{element_id}' declares unknown flow scope '{flow_scope}'")]
    UnknownFlowScope {
        /// Offending element
        element_id: String,
        /// Declared flow scope id
        flow_scope: String,
    },

    /// Flow scope is an element that cannot contain other elements
    #[error("element '{element_id}' cannot be contained by '{flow_scope}'")]
    InvalidFlowScope {
        /// Offending element
        element_id: String,
        /// Declared flow scope id
        flow_scope: String,
    },

    /// Boundary event attached to a missing element
    #[error("boundary event '{element_id}' is attached to unknown element '{attached_to}'")]
    UnknownAttachment {
        /// Boundary event id
        element_id: String,
        /// Declared activity id
        attached_to: String,
    },

    /// Boundary event attached to something that is not an activity
    #[error("boundary event '{element_id}' cannot be attached to '{attached_to}'")]
    InvalidAttachment {
        /// Boundary event id
        element_id: String,
        /// Declared activity id
        attached_to: String,
    },

    /// Empty element or process id
    #[error("element ids must not be empty")]
    EmptyElementId,
}
