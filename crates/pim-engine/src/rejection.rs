//! Turns expected migration failures into rejections

use crate::error::{InvariantViolation, MigrationError, PreconditionError, ProcessingError};
use pim_model::{Rejection, RejectionType};

/// Rejection type for an expected failure
///
/// Every per-element invariant is an invalid state. A caller outside the
/// instance's tenant sees the same `NOT_FOUND` as for a missing instance.
#[must_use]
pub fn rejection_type(error: &MigrationError) -> RejectionType {
    match error {
        MigrationError::Precondition(error) => match error {
            PreconditionError::ProcessInstanceNotFound { .. }
            | PreconditionError::TenantNotAuthorized { .. }
            | PreconditionError::TargetProcessNotFound { .. } => RejectionType::NotFound,
            PreconditionError::PermissionDenied { .. } => RejectionType::Forbidden,
            PreconditionError::EmptyElementId { .. }
            | PreconditionError::TooManyMappingInstructions { .. }
            | PreconditionError::DuplicateSourceElementIds { .. }
            | PreconditionError::UnknownSourceElement { .. }
            | PreconditionError::UnknownTargetElement { .. } => RejectionType::InvalidArgument,
            PreconditionError::ChildProcessInstance { .. }
            | PreconditionError::EventSubProcessInSource { .. }
            | PreconditionError::EventSubProcessInTarget { .. } => RejectionType::InvalidState,
        },
        MigrationError::Invariant(
            InvariantViolation::UnsupportedElementType { .. }
            | InvariantViolation::UnmappedElement { .. }
            | InvariantViolation::ActiveIncident { .. }
            | InvariantViolation::ElementTypeChanged { .. }
            | InvariantViolation::FlowScopeChanged { .. }
            | InvariantViolation::BoundaryEventInSource { .. }
            | InvariantViolation::BoundaryEventInTarget { .. }
            | InvariantViolation::ConcurrentCommand { .. }
            | InvariantViolation::ActiveUserTask { .. },
        ) => RejectionType::InvalidState,
    }
}

/// Rejection for `error`, or `error` itself when it is not an expected failure
///
/// # Errors
/// Any [`ProcessingError`] other than [`ProcessingError::Migration`], unchanged
pub fn translate(error: ProcessingError) -> Result<Rejection, ProcessingError> {
    match error {
        ProcessingError::Migration(error) => {
            Ok(Rejection::new(rejection_type(&error), error.to_string()))
        }
        other => Err(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pim_model::{ElementType, Key};
    use pim_state::StateError;
    use pretty_assertions::assert_eq;

    #[test]
    fn precondition_types() {
        let cases = [
            (
                PreconditionError::TenantNotAuthorized {
                    process_instance_key: Key(1),
                    tenant_id: "t".into(),
                },
                RejectionType::NotFound,
            ),
            (
                PreconditionError::PermissionDenied {
                    process_instance_key: Key(1),
                    bpmn_process_id: "p".into(),
                },
                RejectionType::Forbidden,
            ),
            (
                PreconditionError::DuplicateSourceElementIds {
                    process_instance_key: Key(1),
                    duplicates: vec!["A".into()],
                },
                RejectionType::InvalidArgument,
            ),
            (
                PreconditionError::ChildProcessInstance {
                    process_instance_key: Key(1),
                    parent_process_instance_key: Key(2),
                },
                RejectionType::InvalidState,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(rejection_type(&error.into()), expected);
        }
    }

    #[test]
    fn rejection_carries_the_message() {
        let violation = InvariantViolation::UnsupportedElementType {
            process_instance_key: Key(5),
            element_id: "gw".into(),
            element_type: ElementType::ParallelGateway,
        };
        let message = violation.to_string();

        let rejection = translate(violation.into()).unwrap();
        assert_eq!(rejection, Rejection::new(RejectionType::InvalidState, message));
    }

    #[test]
    fn unexpected_errors_pass_through() {
        let result = translate(StateError::ProcessNotFound(Key(9)).into());

        assert!(matches!(
            result,
            Err(ProcessingError::State(StateError::ProcessNotFound(Key(9))))
        ));
    }
}
