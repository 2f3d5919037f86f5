//! Per-element invariants
//!
//! Checked in this order, first failure wins:
//!
//! 1. element type is migratable
//! 2. element id is mapped
//! 3. no incident on the element instance or its job
//! 4. target element has the same type
//! 5. target flow scope is the mapped id of the actual flow scope
//! 6. no boundary events on source or target element
//! 7. no pending trigger and no taken sequence flow
//! 8. no active user task

use crate::error::{InvariantViolation, ProcessingError};
use crate::mapping::ElementIdMapping;
use pim_model::{DeployedProcess, ElementInstance, ElementType, ExecutableElement, Key};
use pim_state::{ProcessingState, StateError};

/// Element types whose instances can be moved to another definition
pub const SUPPORTED_ELEMENT_TYPES: [ElementType; 3] = [
    ElementType::Process,
    ElementType::ServiceTask,
    ElementType::UserTask,
];

/// An element instance that passed every check, with the element it moves to
#[derive(Debug, Clone, Copy)]
pub struct ValidatedElement<'s> {
    /// Active element instance
    pub instance: &'s ElementInstance,
    /// Element it migrates to
    pub target_element: &'s ExecutableElement,
}

/// Per-element checks against the target process
pub struct ElementValidator<'s, S: ?Sized> {
    state: &'s S,
    process_instance_key: Key,
    target: &'s DeployedProcess,
    mapping: &'s ElementIdMapping,
}

impl<'s, S> ElementValidator<'s, S>
where
    S: ProcessingState + ?Sized,
{
    /// Validator for one migrate command
    #[must_use]
    pub fn new(
        state: &'s S,
        process_instance_key: Key,
        target: &'s DeployedProcess,
        mapping: &'s ElementIdMapping,
    ) -> Self {
        Self {
            state,
            process_instance_key,
            target,
            mapping,
        }
    }

    /// # Errors
    /// The first [`InvariantViolation`], or [`ProcessingError::State`] if the
    /// instance refers to elements or instances the state does not hold.
    pub fn validate(
        &self,
        instance: &'s ElementInstance,
    ) -> Result<ValidatedElement<'s>, ProcessingError> {
        let process_instance_key = self.process_instance_key;
        let element_id = &instance.element_id;

        if !SUPPORTED_ELEMENT_TYPES.contains(&instance.element_type) {
            return Err(InvariantViolation::UnsupportedElementType {
                process_instance_key,
                element_id: element_id.clone(),
                element_type: instance.element_type,
            }
            .into());
        }

        let target_element_id = self
            .mapping
            .target_of(element_id)
            .ok_or_else(|| InvariantViolation::UnmappedElement {
                process_instance_key,
                element_id: element_id.clone(),
            })?;

        if self.has_incident(instance) {
            return Err(InvariantViolation::ActiveIncident {
                process_instance_key,
                element_id: element_id.clone(),
            }
            .into());
        }

        let target_element = self
            .target
            .element(target_element_id)
            .ok_or_else(|| StateError::UnknownElement {
                process_definition_key: self.target.key(),
                element_id: target_element_id.to_string(),
            })?;

        if target_element.element_type != instance.element_type {
            return Err(InvariantViolation::ElementTypeChanged {
                process_instance_key,
                element_id: element_id.clone(),
                source_type: instance.element_type,
                target_element_id: target_element.id.clone(),
                target_type: target_element.element_type,
            }
            .into());
        }

        self.check_flow_scope(instance, target_element)?;
        self.check_boundary_events(instance, target_element)?;

        if self.state.peek_event_trigger(instance.key).is_some()
            || instance.active_sequence_flows > 0
        {
            return Err(InvariantViolation::ConcurrentCommand {
                process_instance_key,
                element_id: element_id.clone(),
            }
            .into());
        }

        if instance.user_task_key.is_some() {
            return Err(InvariantViolation::ActiveUserTask {
                process_instance_key,
                element_id: element_id.clone(),
            }
            .into());
        }

        Ok(ValidatedElement {
            instance,
            target_element,
        })
    }

    fn has_incident(&self, instance: &ElementInstance) -> bool {
        self.state.incident_for_element_instance(instance.key).is_some()
            || instance
                .job_key
                .is_some_and(|job_key| self.state.incident_for_job(job_key).is_some())
    }

    fn check_flow_scope(
        &self,
        instance: &ElementInstance,
        target_element: &ExecutableElement,
    ) -> Result<(), ProcessingError> {
        let Some(flow_scope_key) = instance.flow_scope_key else {
            return Ok(());
        };
        let flow_scope = self
            .state
            .element_instance(flow_scope_key)
            .ok_or(StateError::ElementInstanceNotFound(flow_scope_key))?;

        // An unmapped flow scope fails on its own visit; compare against its
        // unmapped id here.
        let expected = self
            .mapping
            .target_of(&flow_scope.element_id)
            .unwrap_or(flow_scope.element_id.as_str());
        let actual = target_element.flow_scope.as_deref().unwrap_or_default();

        if expected == actual {
            Ok(())
        } else {
            Err(InvariantViolation::FlowScopeChanged {
                process_instance_key: self.process_instance_key,
                element_id: instance.element_id.clone(),
                expected_flow_scope: expected.to_string(),
                actual_flow_scope: actual.to_string(),
            }
            .into())
        }
    }

    fn check_boundary_events(
        &self,
        instance: &ElementInstance,
        target_element: &ExecutableElement,
    ) -> Result<(), ProcessingError> {
        let source = self
            .state
            .process_by_key(instance.process_definition_key)
            .ok_or(StateError::ProcessNotFound(instance.process_definition_key))?;
        if !source.contains(&instance.element_id) {
            return Err(StateError::UnknownElement {
                process_definition_key: source.key(),
                element_id: instance.element_id.clone(),
            }
            .into());
        }

        let source_events = source.boundary_event_types(&instance.element_id);
        if !source_events.is_empty() {
            return Err(InvariantViolation::BoundaryEventInSource {
                process_instance_key: self.process_instance_key,
                element_id: instance.element_id.clone(),
                event_types: source_events,
            }
            .into());
        }

        let target_events = self.target.boundary_event_types(&target_element.id);
        if !target_events.is_empty() {
            return Err(InvariantViolation::BoundaryEventInTarget {
                process_instance_key: self.process_instance_key,
                target_element_id: target_element.id.clone(),
                event_types: target_events,
            }
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MigrationError;
    use pim_model::{EventType, MappingInstruction};
    use pim_state::ProcessState;
    use pim_test_utils::{
        create_service_task_process, create_single_task_process, create_sub_process_process,
        StateFixture,
    };
    use pretty_assertions::assert_eq;

    fn validate(
        fixture: &StateFixture,
        target_key: Key,
        instructions: &[(&str, &str)],
        element_instance_key: Key,
    ) -> Result<String, InvariantViolation> {
        let state = fixture.state();
        let instance = fixture.instance(element_instance_key);
        let target = state.process_by_key(target_key).unwrap();
        let source = state.process_by_key(instance.process_definition_key).unwrap();
        let instructions: Vec<_> = instructions
            .iter()
            .map(|(s, t)| MappingInstruction::new(*s, *t))
            .collect();
        let mapping = ElementIdMapping::build(&instructions, source.root_id(), target.root_id());

        let validator =
            ElementValidator::new(state, instance.process_instance_key, target, &mapping);
        match validator.validate(instance) {
            Ok(validated) => Ok(validated.target_element.id.clone()),
            Err(ProcessingError::Migration(MigrationError::Invariant(v))) => Err(v),
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn root_maps_to_target_root() {
        let mut fixture = StateFixture::new();
        let source = fixture.deploy(create_service_task_process(1, "v1", "A"));
        fixture.deploy(create_service_task_process(2, "v2", "B"));
        let root = fixture.start_instance(source);

        assert_eq!(validate(&fixture, Key(2), &[], root), Ok("v2".to_string()));
    }

    #[test]
    fn unsupported_type_is_checked_before_mapping() {
        let mut fixture = StateFixture::new();
        let source = fixture.deploy(
            DeployedProcess::builder(Key(1), "v1", 1)
                .element("gw", ElementType::ExclusiveGateway, None)
                .build()
                .unwrap(),
        );
        fixture.deploy(create_service_task_process(2, "v2", "B"));
        let root = fixture.start_instance(source);
        let gateway = fixture.activate(root, "gw");

        assert_eq!(
            validate(&fixture, Key(2), &[], gateway),
            Err(InvariantViolation::UnsupportedElementType {
                process_instance_key: root,
                element_id: "gw".to_string(),
                element_type: ElementType::ExclusiveGateway,
            })
        );
    }

    #[test]
    fn incident_on_job_is_found() {
        let mut fixture = StateFixture::new();
        let source = fixture.deploy(create_service_task_process(1, "v1", "A"));
        fixture.deploy(create_service_task_process(2, "v2", "B"));
        let root = fixture.start_instance(source);
        let task = fixture.activate(root, "A");
        fixture.create_job(task, "charge");
        fixture.raise_job_incident(task);

        assert_eq!(
            validate(&fixture, Key(2), &[("A", "B")], task),
            Err(InvariantViolation::ActiveIncident {
                process_instance_key: root,
                element_id: "A".to_string(),
            })
        );
    }

    #[test]
    fn incident_wins_over_type_change() {
        let mut fixture = StateFixture::new();
        let source = fixture.deploy(create_service_task_process(1, "v1", "A"));
        fixture.deploy(create_single_task_process(2, "v2", "B", ElementType::UserTask));
        let root = fixture.start_instance(source);
        let task = fixture.activate(root, "A");
        fixture.raise_incident(task);

        assert!(matches!(
            validate(&fixture, Key(2), &[("A", "B")], task),
            Err(InvariantViolation::ActiveIncident { .. })
        ));
    }

    #[test]
    fn moving_into_a_sub_process_changes_the_flow_scope() {
        let mut fixture = StateFixture::new();
        let source = fixture.deploy(create_service_task_process(1, "v1", "A"));
        fixture.deploy(create_sub_process_process(2, "v2", "sub", "B"));
        let root = fixture.start_instance(source);
        let task = fixture.activate(root, "A");

        assert_eq!(
            validate(&fixture, Key(2), &[("A", "B")], task),
            Err(InvariantViolation::FlowScopeChanged {
                process_instance_key: root,
                element_id: "A".to_string(),
                expected_flow_scope: "v2".to_string(),
                actual_flow_scope: "sub".to_string(),
            })
        );
    }

    #[test]
    fn renamed_flow_scope_is_preserved() {
        let mut fixture = StateFixture::new();
        let source = fixture.deploy(create_sub_process_process(1, "v1", "sub", "A"));
        fixture.deploy(create_sub_process_process(2, "v2", "sub2", "B"));
        let root = fixture.start_instance(source);
        let sub = fixture.activate(root, "sub");
        let task = fixture.activate(sub, "A");

        assert_eq!(
            validate(&fixture, Key(2), &[("sub", "sub2"), ("A", "B")], task),
            Ok("B".to_string())
        );
        assert!(matches!(
            validate(&fixture, Key(2), &[("sub", "sub2"), ("A", "B")], sub),
            Err(InvariantViolation::UnsupportedElementType { .. })
        ));
    }

    #[test]
    fn boundary_event_on_target() {
        let mut fixture = StateFixture::new();
        let source = fixture.deploy(create_service_task_process(1, "v1", "A"));
        fixture.deploy(
            DeployedProcess::builder(Key(2), "v2", 1)
                .element("B", ElementType::ServiceTask, None)
                .boundary_event("timeout", EventType::Timer, "B")
                .build()
                .unwrap(),
        );
        let root = fixture.start_instance(source);
        let task = fixture.activate(root, "A");

        assert_eq!(
            validate(&fixture, Key(2), &[("A", "B")], task),
            Err(InvariantViolation::BoundaryEventInTarget {
                process_instance_key: root,
                target_element_id: "B".to_string(),
                event_types: vec![EventType::Timer],
            })
        );
    }

    #[test]
    fn taken_sequence_flow_is_a_concurrent_command() {
        let mut fixture = StateFixture::new();
        let source = fixture.deploy(create_service_task_process(1, "v1", "A"));
        fixture.deploy(create_service_task_process(2, "v2", "B"));
        let root = fixture.start_instance(source);
        let task = fixture.activate_with(root, "A", |i| i.active_sequence_flows = 1);

        assert!(matches!(
            validate(&fixture, Key(2), &[("A", "B")], task),
            Err(InvariantViolation::ConcurrentCommand { .. })
        ));
    }

    #[test]
    fn pending_trigger_is_a_concurrent_command() {
        let mut fixture = StateFixture::new();
        let source = fixture.deploy(create_service_task_process(1, "v1", "A"));
        fixture.deploy(create_service_task_process(2, "v2", "B"));
        let root = fixture.start_instance(source);
        let task = fixture.activate(root, "A");
        fixture.queue_trigger(task);

        assert!(matches!(
            validate(&fixture, Key(2), &[("A", "B")], task),
            Err(InvariantViolation::ConcurrentCommand { .. })
        ));
    }

    #[test]
    fn active_user_task() {
        let mut fixture = StateFixture::new();
        let source =
            fixture.deploy(create_single_task_process(1, "v1", "A", ElementType::UserTask));
        fixture.deploy(create_single_task_process(2, "v2", "B", ElementType::UserTask));
        let root = fixture.start_instance(source);
        let task = fixture.activate_with(root, "A", |i| i.user_task_key = Some(Key(77)));

        assert_eq!(
            validate(&fixture, Key(2), &[("A", "B")], task),
            Err(InvariantViolation::ActiveUserTask {
                process_instance_key: root,
                element_id: "A".to_string(),
            })
        );
    }
}
