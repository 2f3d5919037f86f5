//! End-to-end migrate commands through the engine facade

use pim_engine::prelude::*;
use pim_log::LogEntry;
use pim_model::{EventType, RecordType};
use pim_state::{ElementInstanceState, JobState};
use pim_test_utils::{
    create_migrate_command, create_service_task_process, create_single_task_process,
    create_sub_process_process, StateFixture,
};
use pretty_assertions::assert_eq;

fn engine(fixture: StateFixture) -> MigrationEngine {
    MigrationEngine::with_state(
        EngineConfig::default().with_log_verification(true),
        fixture.into_state(),
    )
}

fn intents(entries: &[LogEntry]) -> Vec<Intent> {
    entries.iter().map(|e| e.record.intent).collect()
}

fn assert_rejected_without_events(
    engine: &MigrationEngine,
    response: &CommandResponse,
    expected: RejectionType,
) -> String {
    let rejection = response.rejection().expect("expected a rejection");
    assert_eq!(rejection.rejection_type, expected);

    let follow_ups = engine.log().follow_ups(1);
    assert_eq!(follow_ups.len(), 1);
    assert_eq!(follow_ups[0].record.record_type, RecordType::CommandRejection);
    assert_eq!(follow_ups[0].record.rejection.as_ref(), Some(rejection));
    rejection.reason.clone()
}

#[test]
fn test_service_task_moves_to_new_version() {
    let mut fixture = StateFixture::new();
    let source = fixture.deploy(create_service_task_process(1, "order", "charge"));
    fixture.deploy(
        DeployedProcess::builder(Key(2), "order", 2)
            .element("start", ElementType::StartEvent, None)
            .element("charge", ElementType::ServiceTask, None)
            .element("end", ElementType::EndEvent, None)
            .build()
            .unwrap(),
    );
    let root = fixture.start_instance(source);
    let task = fixture.activate(root, "charge");
    let mut engine = engine(fixture);

    let response = engine
        .submit(create_migrate_command(root, Key(2), &[("charge", "charge")]))
        .unwrap();

    assert!(!response.is_rejection());
    let follow_ups = engine.log().follow_ups(1);
    assert_eq!(
        intents(&follow_ups),
        vec![Intent::ElementMigrated, Intent::ElementMigrated, Intent::Migrated]
    );
    let task_events: Vec<_> = follow_ups.iter().filter(|e| e.record.key == task).collect();
    assert_eq!(task_events.len(), 1);
    let RecordValue::ProcessInstance(value) = &task_events[0].record.value else {
        panic!("expected a process instance value");
    };
    assert_eq!(value.process_definition_key, Key(2));
    assert_eq!(value.version, 2);
    assert_eq!(value.element_id, "charge");

    let migrated = engine.state().element_instance(task).unwrap();
    assert_eq!(migrated.process_definition_key, Key(2));
    assert_eq!(migrated.version, 2);
}

#[test]
fn test_active_gateway_is_rejected() {
    let mut fixture = StateFixture::new();
    let source = fixture.deploy(
        DeployedProcess::builder(Key(1), "v1", 1)
            .element("A", ElementType::ServiceTask, None)
            .element("split", ElementType::ParallelGateway, None)
            .build()
            .unwrap(),
    );
    fixture.deploy(create_service_task_process(2, "v2", "A"));
    let root = fixture.start_instance(source);
    fixture.activate(root, "A");
    fixture.activate(root, "split");
    let mut engine = engine(fixture);

    let response = engine
        .submit(create_migrate_command(root, Key(2), &[("A", "A")]))
        .unwrap();

    let reason = assert_rejected_without_events(&engine, &response, RejectionType::InvalidState);
    assert!(reason.contains("'split'"));
    assert!(reason.contains("PARALLEL_GATEWAY"));
}

#[test]
fn test_incident_blocks_migration_despite_valid_mapping() {
    let mut fixture = StateFixture::new();
    let source = fixture.deploy(create_service_task_process(1, "v1", "A"));
    fixture.deploy(create_service_task_process(2, "v2", "B"));
    let root = fixture.start_instance(source);
    let task = fixture.activate(root, "A");
    fixture.raise_incident(task);
    let mut engine = engine(fixture);

    let response = engine
        .submit(create_migrate_command(root, Key(2), &[("A", "B")]))
        .unwrap();

    let reason = assert_rejected_without_events(&engine, &response, RejectionType::InvalidState);
    assert!(reason.contains("has an incident"));
    assert_eq!(engine.state().element_instance(task).unwrap().element_id, "A");
}

#[test]
fn test_remaining_incident_blocks_migration_after_another_is_resolved() {
    let mut fixture = StateFixture::new();
    let source = fixture.deploy(create_service_task_process(1, "v1", "A"));
    fixture.deploy(create_service_task_process(2, "v2", "B"));
    let root = fixture.start_instance(source);
    let task = fixture.activate(root, "A");
    let first = fixture.raise_incident(task);
    fixture.raise_incident(task);
    assert!(fixture.state_mut().resolve_incident(first).is_some());
    let mut engine = engine(fixture);

    let response = engine
        .submit(create_migrate_command(root, Key(2), &[("A", "B")]))
        .unwrap();

    let reason = assert_rejected_without_events(&engine, &response, RejectionType::InvalidState);
    assert!(reason.contains("has an incident"));
    assert_eq!(engine.state().element_instance(task).unwrap().element_id, "A");
}

#[test]
fn test_type_change_is_rejected() {
    let mut fixture = StateFixture::new();
    let source = fixture.deploy(create_service_task_process(1, "v1", "A"));
    fixture.deploy(create_single_task_process(2, "v2", "A", ElementType::UserTask));
    let root = fixture.start_instance(source);
    fixture.activate(root, "A");
    let mut engine = engine(fixture);

    let response = engine
        .submit(create_migrate_command(root, Key(2), &[("A", "A")]))
        .unwrap();

    let reason = assert_rejected_without_events(&engine, &response, RejectionType::InvalidState);
    assert!(reason.contains("'SERVICE_TASK'"));
    assert!(reason.contains("'USER_TASK'"));
}

#[test]
fn test_duplicate_source_ids_are_rejected_before_traversal() {
    let mut fixture = StateFixture::new();
    let source = fixture.deploy(create_service_task_process(1, "v1", "A"));
    fixture.deploy(create_service_task_process(2, "v2", "B"));
    let root = fixture.start_instance(source);
    // Would fail traversal as well; the duplicate must be reported instead.
    let task = fixture.activate(root, "A");
    fixture.raise_incident(task);
    let mut engine = engine(fixture);

    let response = engine
        .submit(create_migrate_command(root, Key(2), &[("A", "B"), ("A", "end")]))
        .unwrap();

    let reason = assert_rejected_without_events(&engine, &response, RejectionType::InvalidArgument);
    assert!(reason.contains("duplicate source element ids '[A]'"));
}

#[test]
fn test_task_cannot_move_into_a_sub_process() {
    let mut fixture = StateFixture::new();
    let source = fixture.deploy(create_service_task_process(1, "v1", "A"));
    fixture.deploy(create_sub_process_process(2, "v2", "sub", "B"));
    let root = fixture.start_instance(source);
    let task = fixture.activate(root, "A");
    let mut engine = engine(fixture);

    let response = engine
        .submit(create_migrate_command(root, Key(2), &[("A", "B")]))
        .unwrap();

    let reason = assert_rejected_without_events(&engine, &response, RejectionType::InvalidState);
    assert!(reason.contains("flow scope of active element with id 'A' is changed"));
    assert!(reason.contains("expected to be 'v2' but was 'sub'"));
    assert_eq!(engine.state().element_instance(task).unwrap().element_id, "A");
}

#[test]
fn test_active_sub_process_is_unsupported() {
    let mut fixture = StateFixture::new();
    let source = fixture.deploy(create_sub_process_process(1, "v1", "sub", "A"));
    fixture.deploy(create_sub_process_process(2, "v2", "sub2", "B"));
    let root = fixture.start_instance(source);
    let sub = fixture.activate(root, "sub");
    let task = fixture.activate(sub, "A");
    let mut engine = engine(fixture);

    let response = engine
        .submit(create_migrate_command(root, Key(2), &[("sub", "sub2"), ("A", "B")]))
        .unwrap();

    // The sub-process is visited before its task and stops the traversal.
    let reason = assert_rejected_without_events(&engine, &response, RejectionType::InvalidState);
    assert!(reason.contains("active element with id 'sub' has an unsupported type"));
    assert!(reason.contains("SUB_PROCESS"));
    let state = engine.state();
    assert_eq!(state.element_instance(sub).unwrap().element_id, "sub");
    assert_eq!(state.element_instance(task).unwrap().element_id, "A");
    assert_eq!(state.element_instance(root).unwrap().process_definition_key, Key(1));
}

#[test]
fn test_jobs_and_variables_follow_their_element() {
    let mut fixture = StateFixture::new();
    let source = fixture.deploy(create_service_task_process(1, "v1", "A"));
    fixture.deploy(create_service_task_process(2, "v2", "B"));
    let root = fixture.start_instance(source);
    let global = fixture.set_variable(root, "customer", serde_json::json!("c-1"));
    let task = fixture.activate(root, "A");
    let job = fixture.create_job(task, "payment");
    let local = fixture.set_variable(task, "amount", serde_json::json!(12.5));
    let mut engine = engine(fixture);

    let response = engine
        .submit(create_migrate_command(root, Key(2), &[("A", "B")]))
        .unwrap();

    assert!(!response.is_rejection());
    assert_eq!(
        intents(&engine.log().follow_ups(1)),
        vec![
            Intent::ElementMigrated,
            Intent::ElementMigrated,
            Intent::JobMigrated,
            Intent::VariableMigrated,
            Intent::VariableMigrated,
            Intent::Migrated,
        ]
    );

    let state = engine.state();
    let job = state.job(job).unwrap();
    assert_eq!(job.element_id, "B");
    assert_eq!(job.process_definition_key, Key(2));
    assert_eq!(job.bpmn_process_id, "v2");
    assert_eq!(job.job_type, "payment");
    for key in [global, local] {
        let variable = state.variable(key).unwrap();
        assert_eq!(variable.process_definition_key, Key(2));
        assert_eq!(variable.bpmn_process_id, "v2");
    }
}

#[test]
fn test_completed_event_echoes_the_command() {
    let mut fixture = StateFixture::new();
    let source = fixture.deploy(create_service_task_process(1, "v1", "A"));
    fixture.deploy(create_service_task_process(2, "v2", "B"));
    let root = fixture.start_instance(source);
    fixture.activate(root, "A");
    let mut engine = engine(fixture);
    let command = create_migrate_command(root, Key(2), &[("A", "B")]);

    let response = engine.submit(command.clone()).unwrap();

    let expected = RecordValue::ProcessInstanceMigration(command.value.clone());
    assert_eq!(response.request_id, command.request_id);
    assert_eq!(
        response.outcome,
        ResponseOutcome::Accepted {
            intent: Intent::Migrated,
            value: expected.clone(),
        }
    );
    let last = engine.log().follow_ups(1).pop().unwrap();
    assert_eq!(last.record.value, expected);
    assert_eq!(last.record.key, root);
}

#[test]
fn test_rejection_is_idempotent() {
    let mut fixture = StateFixture::new();
    let source = fixture.deploy(create_service_task_process(1, "v1", "A"));
    fixture.deploy(
        DeployedProcess::builder(Key(2), "v2", 1)
            .element("A", ElementType::ServiceTask, None)
            .boundary_event("A_timeout", EventType::Timer, "A")
            .build()
            .unwrap(),
    );
    let root = fixture.start_instance(source);
    fixture.activate(root, "A");
    let mut engine = engine(fixture);
    let command = create_migrate_command(root, Key(2), &[("A", "A")]);

    let first = engine.submit(command.clone()).unwrap();
    let second = engine.submit(command).unwrap();

    assert!(first.is_rejection());
    assert_eq!(first, second);
    let entries = engine.log().entries();
    assert_eq!(entries.len(), 4);
    assert_eq!(entries[1].record.rejection, entries[3].record.rejection);
}

#[test]
fn test_successful_migration_can_be_repeated() {
    let mut fixture = StateFixture::new();
    let source = fixture.deploy(create_service_task_process(1, "v1", "A"));
    fixture.deploy(create_service_task_process(2, "v2", "A"));
    let root = fixture.start_instance(source);
    let task = fixture.activate(root, "A");
    let mut engine = engine(fixture);

    engine
        .submit(create_migrate_command(root, Key(2), &[("A", "A")]))
        .unwrap();
    let again = engine
        .submit(create_migrate_command(root, Key(2), &[("A", "A")]))
        .unwrap();

    assert!(!again.is_rejection());
    assert_eq!(engine.state().element_instance(task).unwrap().process_definition_key, Key(2));
    assert!(engine.log().verify_integrity().is_ok());
}

#[test]
fn test_unexpected_error_is_not_answered() {
    let mut fixture = StateFixture::new();
    let source = fixture.deploy(create_service_task_process(1, "v1", "A"));
    fixture.deploy(create_service_task_process(2, "v2", "B"));
    let root = fixture.start_instance(source);
    fixture.activate_with(root, "A", |instance| instance.job_key = Some(Key(404)));
    let mut engine = engine(fixture);

    let result = engine.submit(create_migrate_command(root, Key(2), &[("A", "B")]));

    let error = result.unwrap_err();
    assert!(matches!(error, ProcessingError::State(_)));
    assert!(error.is_fatal());
    // Only the command itself reached the log.
    assert_eq!(engine.log().len(), 1);
    assert!(engine.log().follow_ups(1).is_empty());
    assert_eq!(engine.state().element_instance(root).unwrap().process_definition_key, Key(1));
}

#[test]
fn test_process_instance_not_found() {
    let mut engine = MigrationEngine::new(EngineConfig::default());

    let response = engine
        .submit(create_migrate_command(Key(12), Key(2), &[]))
        .unwrap();

    let reason = assert_rejected_without_events(&engine, &response, RejectionType::NotFound);
    assert_eq!(
        reason,
        "Expected to migrate process instance but no process instance found with key '12'"
    );
}

#[test]
fn test_missing_target_definition_is_rejected_after_the_command_record() {
    let mut fixture = StateFixture::new();
    let source = fixture.deploy(create_service_task_process(1, "v1", "A"));
    let root = fixture.start_instance(source);
    let task = fixture.activate(root, "A");
    let mut engine = engine(fixture);

    let response = engine
        .submit(create_migrate_command(root, Key(99), &[("A", "B")]))
        .unwrap();

    let reason = assert_rejected_without_events(&engine, &response, RejectionType::NotFound);
    assert!(reason.contains("no process definition found with key '99'"));

    let entries = engine.log().entries();
    let types: Vec<RecordType> = entries.iter().map(|e| e.record.record_type).collect();
    assert_eq!(types, vec![RecordType::Command, RecordType::CommandRejection]);
    assert_eq!(entries[1].source_position, Some(entries[0].position));
    assert_eq!(engine.state().element_instance(task).unwrap().element_id, "A");
}
