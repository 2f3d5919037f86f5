//! Log records: commands, follow-up events and rejections

use crate::command::ProcessInstanceMigrationRecord;
use crate::element::ElementType;
use crate::instance::{ElementInstance, Job, Variable};
use crate::key::{Key, TenantId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of a record in the log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordType {
    /// Request to change state
    Command,
    /// State change that happened
    Event,
    /// Refusal of a command
    CommandRejection,
}

/// Kind of value a record carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueType {
    /// Element instance
    ProcessInstance,
    /// Job
    Job,
    /// Variable
    Variable,
    /// Migration command value
    ProcessInstanceMigration,
}

/// What a record says happened or is requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    /// Migration command
    Migrate,
    /// Terminal event: the whole process instance was migrated
    Migrated,
    /// One element instance now belongs to the target process
    ElementMigrated,
    /// One job now belongs to the target process
    JobMigrated,
    /// One variable now belongs to the target process
    VariableMigrated,
}

/// Reason class of a rejected command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionType {
    /// Malformed command
    InvalidArgument,
    /// Referenced entity does not exist
    NotFound,
    /// Current state does not allow the command
    InvalidState,
    /// Caller lacks tenant access or permission
    Forbidden,
}

impl fmt::Display for RejectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RejectionType::InvalidArgument => "INVALID_ARGUMENT",
            RejectionType::NotFound => "NOT_FOUND",
            RejectionType::InvalidState => "INVALID_STATE",
            RejectionType::Forbidden => "FORBIDDEN",
        };
        f.write_str(name)
    }
}

/// Caller-visible refusal of a command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    /// Reason class
    pub rejection_type: RejectionType,
    /// Human-readable reason
    pub reason: String,
}

impl Rejection {
    /// Rejection of the given class
    #[must_use]
    pub fn new(rejection_type: RejectionType, reason: impl Into<String>) -> Self {
        Self {
            rejection_type,
            reason: reason.into(),
        }
    }
}

/// Element instance snapshot carried by `ELEMENT_MIGRATED`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessInstanceRecord {
    /// Root of the owning process instance
    pub process_instance_key: Key,
    /// Enclosing element instance
    pub flow_scope_key: Option<Key>,
    /// Calling process instance, if any
    pub parent_process_instance_key: Option<Key>,
    /// Process definition after migration
    pub process_definition_key: Key,
    /// BPMN process id after migration
    pub bpmn_process_id: String,
    /// Process version after migration
    pub version: i32,
    /// Element id after migration
    pub element_id: String,
    /// BPMN type, unchanged by migration
    pub element_type: ElementType,
    /// Owning tenant
    pub tenant_id: TenantId,
}

impl From<&ElementInstance> for ProcessInstanceRecord {
    fn from(instance: &ElementInstance) -> Self {
        Self {
            process_instance_key: instance.process_instance_key,
            flow_scope_key: instance.flow_scope_key,
            parent_process_instance_key: instance.parent_process_instance_key,
            process_definition_key: instance.process_definition_key,
            bpmn_process_id: instance.bpmn_process_id.clone(),
            version: instance.version,
            element_id: instance.element_id.clone(),
            element_type: instance.element_type,
            tenant_id: instance.tenant_id.clone(),
        }
    }
}

/// Job snapshot carried by `JOB_MIGRATED`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Job type
    pub job_type: String,
    /// Owning element instance
    pub element_instance_key: Key,
    /// Owning process instance
    pub process_instance_key: Key,
    /// Process definition after migration
    pub process_definition_key: Key,
    /// Process version after migration
    pub process_definition_version: i32,
    /// BPMN process id after migration
    pub bpmn_process_id: String,
    /// Element id after migration
    pub element_id: String,
    /// Owning tenant
    pub tenant_id: TenantId,
    /// Remaining retries
    pub retries: u32,
}

impl From<&Job> for JobRecord {
    fn from(job: &Job) -> Self {
        Self {
            job_type: job.job_type.clone(),
            element_instance_key: job.element_instance_key,
            process_instance_key: job.process_instance_key,
            process_definition_key: job.process_definition_key,
            process_definition_version: job.process_definition_version,
            bpmn_process_id: job.bpmn_process_id.clone(),
            element_id: job.element_id.clone(),
            tenant_id: job.tenant_id.clone(),
            retries: job.retries,
        }
    }
}

/// Variable snapshot carried by `VARIABLE_MIGRATED`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableRecord {
    /// Variable name
    pub name: String,
    /// JSON value
    pub value: serde_json::Value,
    /// Scope element instance
    pub scope_key: Key,
    /// Owning process instance
    pub process_instance_key: Key,
    /// Process definition after migration
    pub process_definition_key: Key,
    /// BPMN process id after migration
    pub bpmn_process_id: String,
    /// Owning tenant
    pub tenant_id: TenantId,
}

impl From<&Variable> for VariableRecord {
    fn from(variable: &Variable) -> Self {
        Self {
            name: variable.name.clone(),
            value: variable.value.clone(),
            scope_key: variable.scope_key,
            process_instance_key: variable.process_instance_key,
            process_definition_key: variable.process_definition_key,
            bpmn_process_id: variable.bpmn_process_id.clone(),
            tenant_id: variable.tenant_id.clone(),
        }
    }
}

/// Typed payload of a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "valueType", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordValue {
    /// Element instance snapshot
    ProcessInstance(ProcessInstanceRecord),
    /// Job snapshot
    Job(JobRecord),
    /// Variable snapshot
    Variable(VariableRecord),
    /// Migration command value
    ProcessInstanceMigration(ProcessInstanceMigrationRecord),
}

impl RecordValue {
    /// Type tag of the payload
    #[must_use]
    pub fn value_type(&self) -> ValueType {
        match self {
            RecordValue::ProcessInstance(_) => ValueType::ProcessInstance,
            RecordValue::Job(_) => ValueType::Job,
            RecordValue::Variable(_) => ValueType::Variable,
            RecordValue::ProcessInstanceMigration(_) => ValueType::ProcessInstanceMigration,
        }
    }
}

/// One entry of the partition log before positions are assigned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Key of the entity the record is about
    pub key: Key,
    /// Command, event or rejection
    pub record_type: RecordType,
    /// Intent
    pub intent: Intent,
    /// Payload
    pub value: RecordValue,
    /// Set on rejection records only
    pub rejection: Option<Rejection>,
}

impl Record {
    /// Command record
    #[must_use]
    pub fn command(key: Key, intent: Intent, value: RecordValue) -> Self {
        Self {
            key,
            record_type: RecordType::Command,
            intent,
            value,
            rejection: None,
        }
    }

    /// Event record
    #[must_use]
    pub fn event(key: Key, intent: Intent, value: RecordValue) -> Self {
        Self {
            key,
            record_type: RecordType::Event,
            intent,
            value,
            rejection: None,
        }
    }

    /// Rejection of `command`, carrying the command value unchanged
    #[must_use]
    pub fn rejection(command: &Record, rejection: Rejection) -> Self {
        Self {
            key: command.key,
            record_type: RecordType::CommandRejection,
            intent: command.intent,
            value: command.value.clone(),
            rejection: Some(rejection),
        }
    }

    /// Type tag of the payload
    #[inline]
    #[must_use]
    pub fn value_type(&self) -> ValueType {
        self.value.value_type()
    }

    /// Whether this is a follow-up event
    #[inline]
    #[must_use]
    pub fn is_event(&self) -> bool {
        self.record_type == RecordType::Event
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_echoes_command() {
        let value = ProcessInstanceMigrationRecord::new(Key(1), Key(2)).with_mapping("a", "b");
        let command = Record::command(
            Key(1),
            Intent::Migrate,
            RecordValue::ProcessInstanceMigration(value),
        );

        let rejected = Record::rejection(
            &command,
            Rejection::new(RejectionType::InvalidState, "nope"),
        );

        assert_eq!(rejected.record_type, RecordType::CommandRejection);
        assert_eq!(rejected.value, command.value);
        assert_eq!(rejected.value_type(), ValueType::ProcessInstanceMigration);
        assert_eq!(rejected.rejection.unwrap().reason, "nope");
    }

    #[test]
    fn value_type_is_tagged_in_json() {
        let value = RecordValue::ProcessInstanceMigration(ProcessInstanceMigrationRecord::new(
            Key(7),
            Key(8),
        ));
        let json = serde_json::to_value(&value).unwrap();

        assert_eq!(json["valueType"], "PROCESS_INSTANCE_MIGRATION");
        assert_eq!(json["value"]["process_instance_key"], 7);
    }
}
