//! Testing utilities for the PIM workspace
//!
//! Shared process fixtures, an execution-state builder and command helpers.

#![allow(missing_docs)]

use pim_model::{
    AuthorizationContext, Command, DeployedProcess, ElementInstance, ElementType, ErrorType,
    EventTrigger, Incident, Intent, Job, Key, KeyGenerator, ProcessInstanceMigrationRecord, Record,
    Variable,
};
use pim_state::{MemoryState, ProcessState};

/// Request id used by [`create_migrate_command`]
pub const TEST_REQUEST_ID: u64 = 1;

/// `bpmn_process_id` with one task `task_id` of `element_type` directly under the root
pub fn create_single_task_process(
    key: i64,
    bpmn_process_id: &str,
    task_id: &str,
    element_type: ElementType,
) -> DeployedProcess {
    DeployedProcess::builder(Key(key), bpmn_process_id, 1)
        .element("start", ElementType::StartEvent, None)
        .element(task_id, element_type, None)
        .element("end", ElementType::EndEvent, None)
        .build()
        .unwrap()
}

pub fn create_service_task_process(
    key: i64,
    bpmn_process_id: &str,
    task_id: &str,
) -> DeployedProcess {
    create_single_task_process(key, bpmn_process_id, task_id, ElementType::ServiceTask)
}

/// `bpmn_process_id` > `sub_process_id` > service task `task_id`
pub fn create_sub_process_process(
    key: i64,
    bpmn_process_id: &str,
    sub_process_id: &str,
    task_id: &str,
) -> DeployedProcess {
    DeployedProcess::builder(Key(key), bpmn_process_id, 1)
        .element(sub_process_id, ElementType::SubProcess, None)
        .element(task_id, ElementType::ServiceTask, Some(sub_process_id))
        .build()
        .unwrap()
}

/// Migrate command for the default tenant with full permissions
pub fn create_migrate_command(
    process_instance_key: Key,
    target_process_definition_key: Key,
    mappings: &[(&str, &str)],
) -> Command<ProcessInstanceMigrationRecord> {
    create_migrate_command_as(
        AuthorizationContext::default_tenant(),
        process_instance_key,
        target_process_definition_key,
        mappings,
    )
}

pub fn create_migrate_command_as(
    authorizations: AuthorizationContext,
    process_instance_key: Key,
    target_process_definition_key: Key,
    mappings: &[(&str, &str)],
) -> Command<ProcessInstanceMigrationRecord> {
    let value = mappings.iter().fold(
        ProcessInstanceMigrationRecord::new(process_instance_key, target_process_definition_key),
        |record, (source, target)| record.with_mapping(*source, *target),
    );
    Command::new(value, authorizations).with_request_id(TEST_REQUEST_ID)
}

/// Intents of `records`, in order
pub fn intents(records: &[Record]) -> Vec<Intent> {
    records.iter().map(|r| r.intent).collect()
}

/// Builds an execution-state projection the way the engine's neighbours would
/// have left it: deployed processes, element instances, jobs, variables,
/// incidents and pending triggers.
#[derive(Debug, Clone)]
pub struct StateFixture {
    state: MemoryState,
    keys: KeyGenerator,
}

impl Default for StateFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl StateFixture {
    pub fn new() -> Self {
        Self {
            state: MemoryState::new(),
            keys: KeyGenerator::new(1),
        }
    }

    pub fn deploy(&mut self, process: DeployedProcess) -> Key {
        let key = process.key();
        self.state.deploy(process).unwrap();
        key
    }

    /// Root element instance of a new process instance; its key is the
    /// process instance key
    pub fn start_instance(&mut self, process_definition_key: Key) -> Key {
        self.start(process_definition_key, None)
    }

    /// Process instance started by a call activity of `parent_process_instance_key`
    pub fn start_child_instance(
        &mut self,
        process_definition_key: Key,
        parent_process_instance_key: Key,
    ) -> Key {
        self.start(process_definition_key, Some(parent_process_instance_key))
    }

    fn start(&mut self, process_definition_key: Key, parent: Option<Key>) -> Key {
        let key = self.keys.next_key();
        let process = self.process(process_definition_key);
        let instance = ElementInstance {
            key,
            process_instance_key: key,
            flow_scope_key: None,
            parent_process_instance_key: parent,
            process_definition_key,
            bpmn_process_id: process.bpmn_process_id().to_string(),
            version: process.version(),
            element_id: process.root_id().to_string(),
            element_type: ElementType::Process,
            tenant_id: process.tenant_id().clone(),
            job_key: None,
            user_task_key: None,
            active_sequence_flows: 0,
        };
        self.state.insert_element_instance(instance).unwrap();
        key
    }

    /// Activate `element_id` inside the element instance `flow_scope_key`
    pub fn activate(&mut self, flow_scope_key: Key, element_id: &str) -> Key {
        self.activate_with(flow_scope_key, element_id, |_| {})
    }

    /// As [`StateFixture::activate`], letting `modify` adjust the instance first
    pub fn activate_with(
        &mut self,
        flow_scope_key: Key,
        element_id: &str,
        modify: impl FnOnce(&mut ElementInstance),
    ) -> Key {
        let key = self.keys.next_key();
        let scope = self.instance(flow_scope_key).clone();
        let element_type = self
            .process(scope.process_definition_key)
            .element(element_id)
            .unwrap_or_else(|| panic!("element '{element_id}' is not deployed"))
            .element_type;
        let mut instance = ElementInstance {
            key,
            flow_scope_key: Some(flow_scope_key),
            parent_process_instance_key: None,
            element_id: element_id.to_string(),
            element_type,
            job_key: None,
            user_task_key: None,
            active_sequence_flows: 0,
            ..scope
        };
        modify(&mut instance);
        self.state.insert_element_instance(instance).unwrap();
        key
    }

    pub fn create_job(&mut self, element_instance_key: Key, job_type: &str) -> Key {
        let key = self.keys.next_key();
        let instance = self.instance(element_instance_key).clone();
        let job = Job {
            key,
            job_type: job_type.to_string(),
            element_instance_key,
            process_instance_key: instance.process_instance_key,
            process_definition_key: instance.process_definition_key,
            process_definition_version: instance.version,
            bpmn_process_id: instance.bpmn_process_id,
            element_id: instance.element_id,
            tenant_id: instance.tenant_id,
            retries: 3,
        };
        self.state.insert_job(job).unwrap();
        key
    }

    pub fn set_variable(&mut self, scope_key: Key, name: &str, value: serde_json::Value) -> Key {
        let key = self.keys.next_key();
        let scope = self.instance(scope_key).clone();
        let variable = Variable {
            key,
            scope_key,
            name: name.to_string(),
            value,
            process_instance_key: scope.process_instance_key,
            process_definition_key: scope.process_definition_key,
            bpmn_process_id: scope.bpmn_process_id,
            tenant_id: scope.tenant_id,
        };
        self.state.insert_variable(variable).unwrap();
        key
    }

    /// Incident on the element instance itself
    pub fn raise_incident(&mut self, element_instance_key: Key) -> Key {
        self.insert_incident(element_instance_key, None, ErrorType::IoMappingError)
    }

    /// Incident on the job of `element_instance_key`
    pub fn raise_job_incident(&mut self, element_instance_key: Key) -> Key {
        let job_key = self
            .instance(element_instance_key)
            .job_key
            .unwrap_or_else(|| panic!("element instance {element_instance_key} has no job"));
        self.insert_incident(element_instance_key, Some(job_key), ErrorType::JobNoRetries)
    }

    fn insert_incident(
        &mut self,
        element_instance_key: Key,
        job_key: Option<Key>,
        error_type: ErrorType,
    ) -> Key {
        let key = self.keys.next_key();
        let incident = Incident {
            key,
            process_instance_key: self.instance(element_instance_key).process_instance_key,
            element_instance_key,
            job_key,
            error_type,
            error_message: "failed".to_string(),
        };
        self.state.insert_incident(incident).unwrap();
        key
    }

    /// Queue an unprocessed trigger (e.g. a correlated message) on `element_instance_key`
    pub fn queue_trigger(&mut self, element_instance_key: Key) {
        let trigger = EventTrigger {
            event_key: self.keys.next_key(),
            element_id: self.instance(element_instance_key).element_id.clone(),
        };
        self.state
            .push_event_trigger(element_instance_key, trigger)
            .unwrap();
    }

    pub fn instance(&self, key: Key) -> &ElementInstance {
        use pim_state::ElementInstanceState;
        self.state
            .element_instance(key)
            .unwrap_or_else(|| panic!("element instance {key} not found"))
    }

    fn process(&self, key: Key) -> &DeployedProcess {
        self.state
            .process_by_key(key)
            .unwrap_or_else(|| panic!("process definition {key} not deployed"))
    }

    pub fn state(&self) -> &MemoryState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut MemoryState {
        &mut self.state
    }

    pub fn into_state(self) -> MemoryState {
        self.state
    }
}
