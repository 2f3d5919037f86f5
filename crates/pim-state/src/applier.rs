//! Applies committed migration events to the projection
//!
//! Only events mutate state. Commands and rejections are ignored.

use crate::error::StateError;
use crate::memory::MemoryState;
use pim_model::{Intent, Record, RecordType, RecordValue};

/// Stateless folder of migration events into a [`MemoryState`]
#[derive(Debug, Default, Clone, Copy)]
pub struct EventApplier;

impl EventApplier {
    /// New applier
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Apply a committed batch in log order
    ///
    /// # Errors
    /// Stops at the first record that does not fit the projection.
    pub fn apply_all<'r>(
        &self,
        state: &mut MemoryState,
        records: impl IntoIterator<Item = &'r Record>,
    ) -> Result<usize, StateError> {
        let mut applied = 0;
        for record in records {
            if self.apply(state, record)? {
                applied += 1;
            }
        }
        Ok(applied)
    }

    /// Apply one record. Returns whether the projection changed.
    ///
    /// # Errors
    /// [`StateError`] if the entity the event refers to is missing or the
    /// value does not match the intent.
    pub fn apply(&self, state: &mut MemoryState, record: &Record) -> Result<bool, StateError> {
        if record.record_type != RecordType::Event {
            return Ok(false);
        }

        match (record.intent, &record.value) {
            (Intent::ElementMigrated, RecordValue::ProcessInstance(value)) => {
                let instance = state
                    .element_instance_mut(record.key)
                    .ok_or(StateError::ElementInstanceNotFound(record.key))?;
                instance.process_definition_key = value.process_definition_key;
                instance.bpmn_process_id.clone_from(&value.bpmn_process_id);
                instance.version = value.version;
                instance.element_id.clone_from(&value.element_id);
                Ok(true)
            }
            (Intent::JobMigrated, RecordValue::Job(value)) => {
                let job = state
                    .job_mut(record.key)
                    .ok_or(StateError::JobNotFound(record.key))?;
                job.process_definition_key = value.process_definition_key;
                job.process_definition_version = value.process_definition_version;
                job.bpmn_process_id.clone_from(&value.bpmn_process_id);
                job.element_id.clone_from(&value.element_id);
                Ok(true)
            }
            (Intent::VariableMigrated, RecordValue::Variable(value)) => {
                let variable = state
                    .variable_mut(record.key)
                    .ok_or(StateError::VariableNotFound(record.key))?;
                variable.process_definition_key = value.process_definition_key;
                variable.bpmn_process_id.clone_from(&value.bpmn_process_id);
                Ok(true)
            }
            (Intent::Migrated, RecordValue::ProcessInstanceMigration(_)) => Ok(false),
            (intent, value) => Err(StateError::UnexpectedRecordValue {
                intent,
                value_type: value.value_type(),
            }),
        }
    }
}
