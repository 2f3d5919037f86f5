//! In-memory state projection
//!
//! Element instances live in an arena keyed by [`Key`]. Children are found
//! through a parent → children index; an instance never stores its children.

use crate::api::{
    ElementInstanceState, EventScopeInstanceState, IncidentState, JobState, ProcessState,
    VariableState,
};
use crate::error::StateError;
use pim_model::{
    DeployedProcess, ElementInstance, EventTrigger, Incident, Job, Key, Variable,
};
use std::collections::{HashMap, VecDeque};

/// Already-replicated execution state of one partition
#[derive(Debug, Default, Clone)]
pub struct MemoryState {
    processes: HashMap<Key, DeployedProcess>,
    element_instances: HashMap<Key, ElementInstance>,
    children: HashMap<Key, Vec<Key>>,
    jobs: HashMap<Key, Job>,
    variables: HashMap<Key, Variable>,
    variables_by_scope: HashMap<Key, Vec<Key>>,
    incidents: HashMap<Key, Incident>,
    incidents_by_element_instance: HashMap<Key, Vec<Key>>,
    incidents_by_job: HashMap<Key, Vec<Key>>,
    event_triggers: HashMap<Key, VecDeque<EventTrigger>>,
}

impl MemoryState {
    /// Empty projection
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a deployed process definition
    ///
    /// # Errors
    /// [`StateError::DuplicateKey`] if the key is already deployed
    pub fn deploy(&mut self, process: DeployedProcess) -> Result<(), StateError> {
        let key = process.key();
        if self.processes.contains_key(&key) {
            return Err(StateError::DuplicateKey(key));
        }
        tracing::debug!(
            process_definition_key = %key,
            bpmn_process_id = process.bpmn_process_id(),
            version = process.version(),
            "Process deployed"
        );
        self.processes.insert(key, process);
        Ok(())
    }

    /// Add an element instance; its flow scope must already exist
    ///
    /// # Errors
    /// [`StateError::DuplicateKey`] or [`StateError::DanglingFlowScope`]
    pub fn insert_element_instance(&mut self, instance: ElementInstance) -> Result<(), StateError> {
        let key = instance.key;
        if self.element_instances.contains_key(&key) {
            return Err(StateError::DuplicateKey(key));
        }
        if let Some(flow_scope_key) = instance.flow_scope_key {
            if !self.element_instances.contains_key(&flow_scope_key) {
                return Err(StateError::DanglingFlowScope { key, flow_scope_key });
            }
            self.children.entry(flow_scope_key).or_default().push(key);
        }
        self.element_instances.insert(key, instance);
        Ok(())
    }

    /// # Errors
    /// [`StateError::DuplicateKey`] or [`StateError::ElementInstanceNotFound`]
    pub fn insert_job(&mut self, job: Job) -> Result<(), StateError> {
        if self.jobs.contains_key(&job.key) {
            return Err(StateError::DuplicateKey(job.key));
        }
        let instance = self
            .element_instances
            .get_mut(&job.element_instance_key)
            .ok_or(StateError::ElementInstanceNotFound(job.element_instance_key))?;
        instance.job_key = Some(job.key);
        self.jobs.insert(job.key, job);
        Ok(())
    }

    /// # Errors
    /// [`StateError::DuplicateKey`] or [`StateError::ElementInstanceNotFound`]
    pub fn insert_variable(&mut self, variable: Variable) -> Result<(), StateError> {
        if self.variables.contains_key(&variable.key) {
            return Err(StateError::DuplicateKey(variable.key));
        }
        if !self.element_instances.contains_key(&variable.scope_key) {
            return Err(StateError::ElementInstanceNotFound(variable.scope_key));
        }
        self.variables_by_scope
            .entry(variable.scope_key)
            .or_default()
            .push(variable.key);
        self.variables.insert(variable.key, variable);
        Ok(())
    }

    /// # Errors
    /// [`StateError::DuplicateKey`] or [`StateError::ElementInstanceNotFound`]
    pub fn insert_incident(&mut self, incident: Incident) -> Result<(), StateError> {
        if self.incidents.contains_key(&incident.key) {
            return Err(StateError::DuplicateKey(incident.key));
        }
        if !self
            .element_instances
            .contains_key(&incident.element_instance_key)
        {
            return Err(StateError::ElementInstanceNotFound(
                incident.element_instance_key,
            ));
        }
        let index = match incident.job_key {
            Some(job_key) => self.incidents_by_job.entry(job_key),
            None => self
                .incidents_by_element_instance
                .entry(incident.element_instance_key),
        };
        index.or_default().push(incident.key);
        self.incidents.insert(incident.key, incident);
        Ok(())
    }

    /// Drop a resolved incident. Returns the removed incident, if any.
    ///
    /// Other open incidents of the same owner stay indexed.
    pub fn resolve_incident(&mut self, key: Key) -> Option<Incident> {
        let incident = self.incidents.remove(&key)?;
        let (index, owner) = match incident.job_key {
            Some(job_key) => (&mut self.incidents_by_job, job_key),
            None => (
                &mut self.incidents_by_element_instance,
                incident.element_instance_key,
            ),
        };
        if let Some(keys) = index.get_mut(&owner) {
            keys.retain(|k| *k != key);
            if keys.is_empty() {
                index.remove(&owner);
            }
        }
        Some(incident)
    }

    /// Queue a trigger on the event scope `key`
    ///
    /// # Errors
    /// [`StateError::ElementInstanceNotFound`]
    pub fn push_event_trigger(
        &mut self,
        key: Key,
        trigger: EventTrigger,
    ) -> Result<(), StateError> {
        if !self.element_instances.contains_key(&key) {
            return Err(StateError::ElementInstanceNotFound(key));
        }
        self.event_triggers.entry(key).or_default().push_back(trigger);
        Ok(())
    }

    /// Remove and return the oldest trigger of the event scope `key`
    pub fn poll_event_trigger(&mut self, key: Key) -> Option<EventTrigger> {
        let queue = self.event_triggers.get_mut(&key)?;
        let trigger = queue.pop_front();
        if queue.is_empty() {
            self.event_triggers.remove(&key);
        }
        trigger
    }

    /// All element instances of one process instance, in no particular order
    pub fn element_instances_of(
        &self,
        process_instance_key: Key,
    ) -> impl Iterator<Item = &ElementInstance> {
        self.element_instances
            .values()
            .filter(move |i| i.process_instance_key == process_instance_key)
    }

    pub(crate) fn element_instance_mut(&mut self, key: Key) -> Option<&mut ElementInstance> {
        self.element_instances.get_mut(&key)
    }

    pub(crate) fn job_mut(&mut self, key: Key) -> Option<&mut Job> {
        self.jobs.get_mut(&key)
    }

    pub(crate) fn variable_mut(&mut self, key: Key) -> Option<&mut Variable> {
        self.variables.get_mut(&key)
    }

    /// Variable by key
    #[must_use]
    pub fn variable(&self, key: Key) -> Option<&Variable> {
        self.variables.get(&key)
    }
}

impl ElementInstanceState for MemoryState {
    fn element_instance(&self, key: Key) -> Option<&ElementInstance> {
        self.element_instances.get(&key)
    }

    fn children(&self, parent_key: Key) -> Vec<&ElementInstance> {
        self.children
            .get(&parent_key)
            .map(|keys| {
                keys.iter()
                    .filter_map(|k| self.element_instances.get(k))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl ProcessState for MemoryState {
    fn process_by_key(&self, key: Key) -> Option<&DeployedProcess> {
        self.processes.get(&key)
    }
}

impl JobState for MemoryState {
    fn job(&self, key: Key) -> Option<&Job> {
        self.jobs.get(&key)
    }
}

impl IncidentState for MemoryState {
    fn incident_for_element_instance(&self, element_instance_key: Key) -> Option<&Incident> {
        self.incidents_by_element_instance
            .get(&element_instance_key)
            .and_then(|keys| keys.first())
            .and_then(|k| self.incidents.get(k))
    }

    fn incident_for_job(&self, job_key: Key) -> Option<&Incident> {
        self.incidents_by_job
            .get(&job_key)
            .and_then(|keys| keys.first())
            .and_then(|k| self.incidents.get(k))
    }
}

impl VariableState for MemoryState {
    fn local_variables(&self, scope_key: Key) -> Vec<&Variable> {
        self.variables_by_scope
            .get(&scope_key)
            .map(|keys| keys.iter().filter_map(|k| self.variables.get(k)).collect())
            .unwrap_or_default()
    }
}

impl EventScopeInstanceState for MemoryState {
    fn peek_event_trigger(&self, key: Key) -> Option<&EventTrigger> {
        self.event_triggers.get(&key).and_then(VecDeque::front)
    }
}
