//! Single-partition migration engine
//!
//! Owns the projection and the log. Commands are processed one at a time:
//! the command record is appended, the processor decides against a shared
//! view of the projection, and the follow-up batch is applied to a copy of
//! the projection. Only when that succeeds is the batch appended and the copy
//! swapped in, so the log and the projection never disagree.

use crate::config::EngineConfig;
use crate::error::ProcessingError;
use crate::processor::{command_record, CommandProcessor, MigrateProcessor};
use pim_log::{CommandResponse, EventLog, Position, ProcessingResult};
use pim_model::{Command, ProcessInstanceMigrationRecord, Record};
use std::ops::Range;
use pim_state::{EventApplier, MemoryState};

/// Single-partition migration engine: projection, log and processor
#[derive(Debug)]
pub struct MigrationEngine {
    config: EngineConfig,
    state: MemoryState,
    log: EventLog,
    applier: EventApplier,
    processor: MigrateProcessor,
}

impl MigrationEngine {
    /// Engine over an empty projection
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self::with_state(config, MemoryState::new())
    }

    /// Engine over an existing projection
    #[must_use]
    pub fn with_state(config: EngineConfig, state: MemoryState) -> Self {
        Self {
            processor: MigrateProcessor::new(config.clone()),
            config,
            state,
            log: EventLog::new(),
            applier: EventApplier::new(),
        }
    }

    /// Configuration
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current projection
    #[must_use]
    pub fn state(&self) -> &MemoryState {
        &self.state
    }

    /// Direct access for the subsystems that own the rest of the projection
    /// (deployments, jobs, variables, incidents)
    pub fn state_mut(&mut self) -> &mut MemoryState {
        &mut self.state
    }

    /// The partition log
    #[must_use]
    pub fn log(&self) -> &EventLog {
        &self.log
    }

    /// Process a migrate command end to end
    ///
    /// Returns the response for the caller, which is either the accepted
    /// completed event or a rejection. Both are also in the log.
    ///
    /// # Errors
    /// Failures that are not rejections. Nothing beyond the command record
    /// has been appended and the projection is untouched. A failed integrity
    /// check is the exception: it runs after the batch is committed.
    pub fn submit(
        &mut self,
        command: Command<ProcessInstanceMigrationRecord>,
    ) -> Result<CommandResponse, ProcessingError> {
        let process_instance_key = command.value.process_instance_key;
        tracing::debug!(
            process_instance_key = %process_instance_key,
            target_process_definition_key = %command.value.target_process_definition_key,
            mapping_instructions = command.value.mapping_instructions.len(),
            "Migrate command received"
        );

        let position = self.log.append(command_record(&command), None)?;

        let result = match self.processor.process(&self.state, &command) {
            Ok(result) => result,
            Err(error) => {
                tracing::error!(
                    process_instance_key = %process_instance_key,
                    error = %error,
                    "Unexpected error while migrating process instance"
                );
                return Err(error);
            }
        };
        let events = result.events().count();
        let ProcessingResult { records, response } = result;

        let response = response.ok_or_else(|| {
            ProcessingError::Internal(format!(
                "no response written for migrate command at position {position}"
            ))
        })?;

        let (range, applied) = self.commit(position, &records)?;

        if self.config.verify_log_integrity {
            self.log.verify_integrity()?;
        }

        tracing::info!(
            process_instance_key = %process_instance_key,
            source_position = position,
            first_position = range.start,
            records = records.len(),
            events,
            applied,
            rejected = response.is_rejection(),
            "Migrate command committed"
        );
        Ok(response)
    }

    /// Apply `records` to a copy of the projection, append them as one batch
    /// after `position`, then replace the projection with the copy
    fn commit(
        &mut self,
        position: Position,
        records: &[Record],
    ) -> Result<(Range<Position>, usize), ProcessingError> {
        let mut next = self.state.clone();
        let applied = self.applier.apply_all(&mut next, records)?;
        let range = self.log.append_batch(records.to_vec(), Some(position))?;
        self.state = next;
        Ok((range, applied))
    }
}
