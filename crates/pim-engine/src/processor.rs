//! Command processors
//!
//! A processor reads the state, decides, and writes its decision into a
//! [`ProcessingResult`]. It never mutates the state and never touches the log.

use crate::config::EngineConfig;
use crate::emitter::FollowUpEmitter;
use crate::error::ProcessingError;
use crate::mapping::ElementIdMapping;
use crate::precondition::PreconditionChecker;
use crate::rejection;
use crate::traversal::traverse;
use crate::validator::ElementValidator;
use pim_log::{CommandResponse, ProcessingResult, ProcessingResultBuilder, ResponseOutcome};
use pim_model::{Command, Intent, ProcessInstanceMigrationRecord, Record, RecordValue};
use pim_state::ProcessingState;

/// Processes one kind of command
pub trait CommandProcessor {
    type Value;

    /// Decide the outcome of `command` against `state`
    ///
    /// An `Ok` result holds either the follow-up events or a rejection, always
    /// with a response. `Err` is reserved for failures that must not be
    /// answered.
    ///
    /// # Errors
    /// Any [`ProcessingError`] that is not a rejection
    fn process<S: ProcessingState + ?Sized>(
        &self,
        state: &S,
        command: &Command<Self::Value>,
    ) -> Result<ProcessingResult, ProcessingError>;
}

/// Log record of a migrate command
#[must_use]
pub fn command_record(command: &Command<ProcessInstanceMigrationRecord>) -> Record {
    Record::command(
        command.value.process_instance_key,
        Intent::Migrate,
        RecordValue::ProcessInstanceMigration(command.value.clone()),
    )
}

/// Handles `MIGRATE` commands
#[derive(Debug, Clone, Default)]
pub struct MigrateProcessor {
    config: EngineConfig,
}

impl MigrateProcessor {
    /// Processor with the given limits
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    fn migrate<S: ProcessingState + ?Sized>(
        &self,
        state: &S,
        command: &Command<ProcessInstanceMigrationRecord>,
        builder: &mut ProcessingResultBuilder,
    ) -> Result<(), ProcessingError> {
        let record = &command.value;
        let checked = PreconditionChecker::new(state, &self.config).check(command)?;
        let process_instance_key = checked.process_instance.key;

        let mapping = ElementIdMapping::build(
            &record.mapping_instructions,
            checked.source.root_id(),
            checked.target.root_id(),
        );
        let validator =
            ElementValidator::new(state, process_instance_key, checked.target, &mapping);
        let mut emitter = FollowUpEmitter::new(state, checked.target);

        let visited = traverse(state, checked.process_instance, |instance| {
            let validated = validator.validate(instance)?;
            emitter.emit(validated)
        })?;

        let counts = emitter.commit(record, builder);
        builder.write_response(CommandResponse {
            request_id: command.request_id,
            key: process_instance_key,
            outcome: ResponseOutcome::Accepted {
                intent: Intent::Migrated,
                value: RecordValue::ProcessInstanceMigration(record.clone()),
            },
        });

        tracing::debug!(
            process_instance_key = %process_instance_key,
            visited,
            mapped_elements = mapping.len(),
            events = counts.total(),
            elements = counts.elements,
            jobs = counts.jobs,
            variables = counts.variables,
            "Process instance migration decided"
        );
        Ok(())
    }
}

impl CommandProcessor for MigrateProcessor {
    type Value = ProcessInstanceMigrationRecord;

    fn process<S: ProcessingState + ?Sized>(
        &self,
        state: &S,
        command: &Command<ProcessInstanceMigrationRecord>,
    ) -> Result<ProcessingResult, ProcessingError> {
        let mut builder = ProcessingResultBuilder::new();

        if let Err(error) = self.migrate(state, command, &mut builder) {
            let rejection = rejection::translate(error)?;
            tracing::info!(
                process_instance_key = %command.value.process_instance_key,
                rejection_type = %rejection.rejection_type,
                reason = %rejection.reason,
                "Process instance migration rejected"
            );

            builder.reset();
            builder.append_rejection(&command_record(command), rejection.clone());
            builder.write_response(CommandResponse {
                request_id: command.request_id,
                key: command.value.process_instance_key,
                outcome: ResponseOutcome::Rejected(rejection),
            });
        }

        Ok(builder.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pim_model::{Key, RecordType, RejectionType};
    use pim_test_utils::{
        create_migrate_command, create_service_task_process, intents, StateFixture,
    };
    use pretty_assertions::assert_eq;

    #[test]
    fn accepted_command_gets_events_and_response() {
        let mut fixture = StateFixture::new();
        let source = fixture.deploy(create_service_task_process(1, "v1", "A"));
        fixture.deploy(create_service_task_process(2, "v2", "B"));
        let root = fixture.start_instance(source);
        fixture.activate(root, "A");
        let command = create_migrate_command(root, Key(2), &[("A", "B")]);

        let result = MigrateProcessor::default()
            .process(fixture.state(), &command)
            .unwrap();

        assert_eq!(
            intents(&result.records),
            vec![Intent::ElementMigrated, Intent::ElementMigrated, Intent::Migrated]
        );
        let response = result.response.unwrap();
        assert_eq!(response.request_id, command.request_id);
        assert!(!response.is_rejection());
    }

    #[test]
    fn late_failure_leaves_only_the_rejection() {
        let mut fixture = StateFixture::new();
        let source = fixture.deploy(create_service_task_process(1, "v1", "A"));
        fixture.deploy(create_service_task_process(2, "v2", "B"));
        let root = fixture.start_instance(source);
        let task = fixture.activate(root, "A");
        fixture.create_job(task, "charge");
        fixture.raise_job_incident(task);
        let command = create_migrate_command(root, Key(2), &[("A", "B")]);

        let result = MigrateProcessor::default()
            .process(fixture.state(), &command)
            .unwrap();

        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].record_type, RecordType::CommandRejection);
        assert_eq!(result.events().count(), 0);
        assert_eq!(
            result.response.unwrap().rejection().map(|r| r.rejection_type),
            Some(RejectionType::InvalidState)
        );
    }

    #[test]
    fn dangling_process_definition_is_not_answered() {
        let mut fixture = StateFixture::new();
        let source = fixture.deploy(create_service_task_process(1, "v1", "A"));
        fixture.deploy(create_service_task_process(2, "v2", "B"));
        let root = fixture.start_instance(source);
        fixture.activate_with(root, "A", |i| i.process_definition_key = Key(3));
        let command = create_migrate_command(root, Key(2), &[("A", "B")]);

        let result = MigrateProcessor::default().process(fixture.state(), &command);
        assert!(matches!(result, Err(ProcessingError::State(_))));
    }
}
