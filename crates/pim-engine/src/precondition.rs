//! Command-level checks run before any element instance is visited
//!
//! Checks run in a fixed order and the first failure wins. A caller who is
//! not authorized for the instance's tenant gets the same message as for a
//! missing instance.

use crate::config::EngineConfig;
use crate::error::{MappingSide, PreconditionError, ProcessingError};
use pim_model::{
    Command, DeployedProcess, ElementInstance, PermissionType, ProcessInstanceMigrationRecord,
};
use pim_state::{ProcessingState, StateError};
use std::collections::HashSet;

/// Everything the later stages need once the command passed its preconditions
#[derive(Debug, Clone, Copy)]
pub struct CheckedCommand<'s> {
    /// Root element instance of the process instance
    pub process_instance: &'s ElementInstance,
    /// Process definition the instance runs
    pub source: &'s DeployedProcess,
    /// Process definition to migrate to
    pub target: &'s DeployedProcess,
}

/// Command-level checks, run in a fixed order
pub struct PreconditionChecker<'s, S: ?Sized> {
    state: &'s S,
    max_mapping_instructions: usize,
}

impl<'s, S> PreconditionChecker<'s, S>
where
    S: ProcessingState + ?Sized,
{
    /// Checker over `state` with the configured limits
    #[must_use]
    pub fn new(state: &'s S, config: &EngineConfig) -> Self {
        Self {
            state,
            max_mapping_instructions: config.max_mapping_instructions,
        }
    }

    /// Run every check in order
    ///
    /// # Errors
    /// The first failed [`PreconditionError`]. [`ProcessingError::State`] if
    /// the instance refers to a process definition the cache does not hold.
    pub fn check(
        &self,
        command: &Command<ProcessInstanceMigrationRecord>,
    ) -> Result<CheckedCommand<'s>, ProcessingError> {
        let record = &command.value;
        let process_instance_key = record.process_instance_key;

        let process_instance = self
            .state
            .element_instance(process_instance_key)
            .filter(|instance| instance.is_root())
            .ok_or(PreconditionError::ProcessInstanceNotFound {
                process_instance_key,
            })?;

        if !command
            .authorizations
            .is_tenant_authorized(&process_instance.tenant_id)
        {
            return Err(PreconditionError::TenantNotAuthorized {
                process_instance_key,
                tenant_id: process_instance.tenant_id.clone(),
            }
            .into());
        }

        if !command.authorizations.is_permitted(
            PermissionType::UpdateProcessInstance,
            &process_instance.bpmn_process_id,
        ) {
            return Err(PreconditionError::PermissionDenied {
                process_instance_key,
                bpmn_process_id: process_instance.bpmn_process_id.clone(),
            }
            .into());
        }

        if let Some(parent_process_instance_key) = process_instance.parent_process_instance_key {
            return Err(PreconditionError::ChildProcessInstance {
                process_instance_key,
                parent_process_instance_key,
            }
            .into());
        }

        self.check_input_shape(record)?;
        check_unique_sources(record)?;

        let target = self
            .state
            .process_by_key_and_tenant(
                record.target_process_definition_key,
                &process_instance.tenant_id,
            )
            .ok_or(PreconditionError::TargetProcessNotFound {
                process_instance_key,
                target_process_definition_key: record.target_process_definition_key,
            })?;

        let source = self
            .state
            .process_by_key(process_instance.process_definition_key)
            .ok_or(StateError::ProcessNotFound(
                process_instance.process_definition_key,
            ))?;

        check_referenced_elements(record, source, target)?;

        if source.has_event_sub_process() {
            return Err(PreconditionError::EventSubProcessInSource {
                process_instance_key,
                bpmn_process_id: source.bpmn_process_id().to_string(),
            }
            .into());
        }
        if target.has_event_sub_process() {
            return Err(PreconditionError::EventSubProcessInTarget {
                process_instance_key,
                bpmn_process_id: target.bpmn_process_id().to_string(),
            }
            .into());
        }

        tracing::debug!(
            process_instance_key = %process_instance_key,
            source_process_definition_key = %source.key(),
            target_process_definition_key = %target.key(),
            "Migration preconditions passed"
        );

        Ok(CheckedCommand {
            process_instance,
            source,
            target,
        })
    }

    fn check_input_shape(
        &self,
        record: &ProcessInstanceMigrationRecord,
    ) -> Result<(), PreconditionError> {
        let process_instance_key = record.process_instance_key;
        let count = record.mapping_instructions.len();
        if count > self.max_mapping_instructions {
            return Err(PreconditionError::TooManyMappingInstructions {
                process_instance_key,
                count,
                limit: self.max_mapping_instructions,
            });
        }

        for (index, instruction) in record.mapping_instructions.iter().enumerate() {
            let side = if instruction.source_element_id.is_empty() {
                MappingSide::Source
            } else if instruction.target_element_id.is_empty() {
                MappingSide::Target
            } else {
                continue;
            };
            return Err(PreconditionError::EmptyElementId {
                process_instance_key,
                index,
                side,
            });
        }
        Ok(())
    }
}

/// Duplicates are reported once each, in order of first repetition
fn check_unique_sources(record: &ProcessInstanceMigrationRecord) -> Result<(), PreconditionError> {
    let mut seen = HashSet::new();
    let mut duplicates: Vec<String> = Vec::new();
    for instruction in &record.mapping_instructions {
        let id = instruction.source_element_id.as_str();
        if !seen.insert(id) && !duplicates.iter().any(|d| d == id) {
            duplicates.push(id.to_string());
        }
    }

    if duplicates.is_empty() {
        Ok(())
    } else {
        Err(PreconditionError::DuplicateSourceElementIds {
            process_instance_key: record.process_instance_key,
            duplicates,
        })
    }
}

/// All source ids are checked before any target id
fn check_referenced_elements(
    record: &ProcessInstanceMigrationRecord,
    source: &DeployedProcess,
    target: &DeployedProcess,
) -> Result<(), PreconditionError> {
    let process_instance_key = record.process_instance_key;
    if let Some(instruction) = record
        .mapping_instructions
        .iter()
        .find(|i| !source.contains(&i.source_element_id))
    {
        return Err(PreconditionError::UnknownSourceElement {
            process_instance_key,
            element_id: instruction.source_element_id.clone(),
        });
    }
    if let Some(instruction) = record
        .mapping_instructions
        .iter()
        .find(|i| !target.contains(&i.target_element_id))
    {
        return Err(PreconditionError::UnknownTargetElement {
            process_instance_key,
            element_id: instruction.target_element_id.clone(),
        });
    }
    Ok(())
}
