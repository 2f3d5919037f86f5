//! Read-only state interfaces
//!
//! Each trait covers one external subsystem's state. During a command the
//! engine holds a shared reference to one [`ProcessingState`] for the whole
//! command and never mutates through it.

use pim_model::{
    DeployedProcess, ElementInstance, EventTrigger, Incident, Job, Key, TenantId, Variable,
};

/// Execution tree lookups
pub trait ElementInstanceState {
    /// Element instance by key, live or not yet removed
    fn element_instance(&self, key: Key) -> Option<&ElementInstance>;

    /// Direct children of `parent_key`, in activation order
    fn children(&self, parent_key: Key) -> Vec<&ElementInstance>;
}

/// Deployed process cache
pub trait ProcessState {
    /// Deployed definition by key, any tenant
    fn process_by_key(&self, key: Key) -> Option<&DeployedProcess>;

    /// Process definition visible to `tenant_id`
    fn process_by_key_and_tenant(
        &self,
        key: Key,
        tenant_id: &TenantId,
    ) -> Option<&DeployedProcess> {
        self.process_by_key(key)
            .filter(|process| process.tenant_id() == tenant_id)
    }
}

/// Job lookups
pub trait JobState {
    /// Job by key
    fn job(&self, key: Key) -> Option<&Job>;
}

/// Open incidents
pub trait IncidentState {
    /// An open incident owned by the element instance
    fn incident_for_element_instance(&self, element_instance_key: Key) -> Option<&Incident>;

    /// An open incident owned by the job
    fn incident_for_job(&self, job_key: Key) -> Option<&Incident>;
}

/// Variable lookups
pub trait VariableState {
    /// Variables whose scope is exactly `scope_key`
    fn local_variables(&self, scope_key: Key) -> Vec<&Variable>;
}

/// Pending event triggers
pub trait EventScopeInstanceState {
    /// Oldest trigger not yet processed for the event scope `key`
    fn peek_event_trigger(&self, key: Key) -> Option<&EventTrigger>;
}

/// Everything the migration engine reads
pub trait ProcessingState:
    ElementInstanceState
    + ProcessState
    + JobState
    + IncidentState
    + VariableState
    + EventScopeInstanceState
{
}

impl<T> ProcessingState for T where
    T: ElementInstanceState
        + ProcessState
        + JobState
        + IncidentState
        + VariableState
        + EventScopeInstanceState
{
}
