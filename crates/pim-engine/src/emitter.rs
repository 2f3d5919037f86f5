//! Follow-up events of a migration
//!
//! Events are buffered while the tree is walked and only handed to the
//! result builder once every element passed validation. They are grouped:
//! all element events, then all job events, then all variable events, then
//! the completed event.

use crate::error::ProcessingError;
use crate::validator::ValidatedElement;
use pim_log::ProcessingResultBuilder;
use pim_model::{
    DeployedProcess, Intent, JobRecord, Key, ProcessInstanceMigrationRecord, ProcessInstanceRecord,
    RecordValue, VariableRecord,
};
use pim_state::{ProcessingState, StateError};

type Buffered = (Key, Intent, RecordValue);

/// Buffers follow-up events per group until the whole tree validated
pub struct FollowUpEmitter<'s, S: ?Sized> {
    state: &'s S,
    target: &'s DeployedProcess,
    elements: Vec<Buffered>,
    jobs: Vec<Buffered>,
    variables: Vec<Buffered>,
}

/// Number of events per group written by [`FollowUpEmitter::commit`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmittedCounts {
    /// `ELEMENT_MIGRATED` events
    pub elements: usize,
    /// `JOB_MIGRATED` events
    pub jobs: usize,
    /// `VARIABLE_MIGRATED` events
    pub variables: usize,
}

impl EmittedCounts {
    /// Events across all groups
    #[must_use]
    pub fn total(&self) -> usize {
        self.elements + self.jobs + self.variables
    }
}

impl<'s, S> FollowUpEmitter<'s, S>
where
    S: ProcessingState + ?Sized,
{
    /// Emitter for a migration into `target`
    #[must_use]
    pub fn new(state: &'s S, target: &'s DeployedProcess) -> Self {
        Self {
            state,
            target,
            elements: Vec::new(),
            jobs: Vec::new(),
            variables: Vec::new(),
        }
    }

    /// Buffer the events for one validated element instance
    ///
    /// # Errors
    /// [`ProcessingError::State`] if the instance's job is missing
    pub fn emit(&mut self, validated: ValidatedElement<'_>) -> Result<(), ProcessingError> {
        let instance = validated.instance;
        let target_element_id = &validated.target_element.id;

        let mut element = ProcessInstanceRecord::from(instance);
        element.process_definition_key = self.target.key();
        element.bpmn_process_id = self.target.bpmn_process_id().to_string();
        element.version = self.target.version();
        element.element_id.clone_from(target_element_id);
        self.elements.push((
            instance.key,
            Intent::ElementMigrated,
            RecordValue::ProcessInstance(element),
        ));

        if let Some(job_key) = instance.job_key {
            let job = self
                .state
                .job(job_key)
                .ok_or(StateError::JobNotFound(job_key))?;
            let mut record = JobRecord::from(job);
            record.process_definition_key = self.target.key();
            record.process_definition_version = self.target.version();
            record.bpmn_process_id = self.target.bpmn_process_id().to_string();
            record.element_id.clone_from(target_element_id);
            self.jobs
                .push((job_key, Intent::JobMigrated, RecordValue::Job(record)));
        }

        for variable in self.state.local_variables(instance.key) {
            let mut record = VariableRecord::from(variable);
            record.process_definition_key = self.target.key();
            record.bpmn_process_id = self.target.bpmn_process_id().to_string();
            self.variables.push((
                variable.key,
                Intent::VariableMigrated,
                RecordValue::Variable(record),
            ));
        }

        Ok(())
    }

    /// Write the buffered events followed by the completed event
    pub fn commit(
        self,
        command: &ProcessInstanceMigrationRecord,
        builder: &mut ProcessingResultBuilder,
    ) -> EmittedCounts {
        let counts = EmittedCounts {
            elements: self.elements.len(),
            jobs: self.jobs.len(),
            variables: self.variables.len(),
        };

        for (key, intent, value) in self
            .elements
            .into_iter()
            .chain(self.jobs)
            .chain(self.variables)
        {
            builder.append_follow_up_event(key, intent, value);
        }
        builder.append_follow_up_event(
            command.process_instance_key,
            Intent::Migrated,
            RecordValue::ProcessInstanceMigration(command.clone()),
        );

        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::ElementIdMapping;
    use crate::validator::ElementValidator;
    use pim_model::MappingInstruction;
    use pim_state::{ElementInstanceState, ProcessState};
    use pim_test_utils::{create_service_task_process, intents, StateFixture};
    use pretty_assertions::assert_eq;

    #[test]
    fn events_are_grouped_by_kind() {
        let mut fixture = StateFixture::new();
        let source = fixture.deploy(create_service_task_process(1, "v1", "A"));
        fixture.deploy(create_service_task_process(2, "v2", "B"));
        let root = fixture.start_instance(source);
        fixture.set_variable(root, "order", serde_json::json!(42));
        let task = fixture.activate(root, "A");
        let job = fixture.create_job(task, "charge");
        fixture.set_variable(task, "attempt", serde_json::json!(1));

        let state = fixture.state();
        let target = state.process_by_key(Key(2)).unwrap();
        let mapping = ElementIdMapping::build(&[MappingInstruction::new("A", "B")], "v1", "v2");
        let validator = ElementValidator::new(state, root, target, &mapping);
        let mut emitter = FollowUpEmitter::new(state, target);
        for key in [root, task] {
            let instance = state.element_instance(key).unwrap();
            emitter.emit(validator.validate(instance).unwrap()).unwrap();
        }

        let command = ProcessInstanceMigrationRecord::new(root, Key(2)).with_mapping("A", "B");
        let mut builder = ProcessingResultBuilder::new();
        let counts = emitter.commit(&command, &mut builder);
        let result = builder.build();

        assert_eq!(
            counts,
            EmittedCounts {
                elements: 2,
                jobs: 1,
                variables: 2
            }
        );
        assert_eq!(
            intents(&result.records),
            vec![
                Intent::ElementMigrated,
                Intent::ElementMigrated,
                Intent::JobMigrated,
                Intent::VariableMigrated,
                Intent::VariableMigrated,
                Intent::Migrated,
            ]
        );

        let RecordValue::Job(job_record) = &result.records[2].value else {
            panic!("expected a job record");
        };
        assert_eq!(result.records[2].key, job);
        assert_eq!(job_record.element_id, "B");
        assert_eq!(job_record.bpmn_process_id, "v2");
        assert_eq!(
            result.records[5].value,
            RecordValue::ProcessInstanceMigration(command)
        );
    }

    #[test]
    fn missing_job_is_fatal() {
        let mut fixture = StateFixture::new();
        let source = fixture.deploy(create_service_task_process(1, "v1", "A"));
        fixture.deploy(create_service_task_process(2, "v2", "B"));
        let root = fixture.start_instance(source);
        let task = fixture.activate_with(root, "A", |i| i.job_key = Some(Key(404)));

        let state = fixture.state();
        let target = state.process_by_key(Key(2)).unwrap();
        let mapping = ElementIdMapping::build(&[MappingInstruction::new("A", "B")], "v1", "v2");
        let validator = ElementValidator::new(state, root, target, &mapping);
        let mut emitter = FollowUpEmitter::new(state, target);
        let instance = state.element_instance(task).unwrap();

        let error = emitter
            .emit(validator.validate(instance).unwrap())
            .unwrap_err();
        assert!(matches!(
            error,
            ProcessingError::State(StateError::JobNotFound(Key(404)))
        ));
    }
}
