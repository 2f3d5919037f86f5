//! Buffered output of one processed command
//!
//! Processors never write to the log directly. They fill a
//! [`ProcessingResultBuilder`]; the caller appends the finished result as a
//! single batch.

use pim_model::{Intent, Key, Record, RecordValue, Rejection, RequestId};

/// What the caller of a command gets back
#[derive(Debug, Clone, PartialEq)]
pub struct CommandResponse {
    /// Request id copied from the command
    pub request_id: Option<RequestId>,
    /// Key of the process instance the command targeted
    pub key: Key,
    /// Accepted or rejected
    pub outcome: ResponseOutcome,
}

/// How a command was answered
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseOutcome {
    /// The command took effect
    Accepted {
        /// Intent of the event that answers the command
        intent: Intent,
        /// Value of that event
        value: RecordValue,
    },
    /// The command was refused without side effects
    Rejected(Rejection),
}

impl CommandResponse {
    /// Whether the command was rejected
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(self.outcome, ResponseOutcome::Rejected(_))
    }

    /// The rejection, if any
    #[must_use]
    pub fn rejection(&self) -> Option<&Rejection> {
        match &self.outcome {
            ResponseOutcome::Rejected(r) => Some(r),
            ResponseOutcome::Accepted { .. } => None,
        }
    }
}

/// Records to append plus the optional response
#[derive(Debug, Clone, Default)]
pub struct ProcessingResult {
    /// Follow-up events and rejection records, in append order
    pub records: Vec<Record>,
    /// Response for the command's sender
    pub response: Option<CommandResponse>,
}

impl ProcessingResult {
    /// Follow-up events, excluding rejection records
    pub fn events(&self) -> impl Iterator<Item = &Record> {
        self.records.iter().filter(|r| r.is_event())
    }
}

/// Write buffer for one command
#[derive(Debug, Default)]
pub struct ProcessingResultBuilder {
    records: Vec<Record>,
    response: Option<CommandResponse>,
}

impl ProcessingResultBuilder {
    /// Empty buffer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// State writer: append a follow-up event
    pub fn append_follow_up_event(&mut self, key: Key, intent: Intent, value: RecordValue) {
        self.records.push(Record::event(key, intent, value));
    }

    /// Rejection writer: append the rejection record for `command`
    pub fn append_rejection(&mut self, command: &Record, rejection: Rejection) {
        self.records.push(Record::rejection(command, rejection));
    }

    /// Response writer
    pub fn write_response(&mut self, response: CommandResponse) {
        self.response = Some(response);
    }

    /// Drop everything written so far
    pub fn reset(&mut self) {
        self.records.clear();
        self.response = None;
    }

    /// Finish the buffer
    #[must_use]
    pub fn build(self) -> ProcessingResult {
        ProcessingResult {
            records: self.records,
            response: self.response,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pim_model::{ProcessInstanceMigrationRecord, RecordType, RejectionType};

    fn migrate_command() -> Record {
        Record::command(
            Key(1),
            Intent::Migrate,
            RecordValue::ProcessInstanceMigration(ProcessInstanceMigrationRecord::new(
                Key(1),
                Key(2),
            )),
        )
    }

    #[test]
    fn reset_discards_buffered_events() {
        let command = migrate_command();
        let mut builder = ProcessingResultBuilder::new();
        builder.append_follow_up_event(Key(1), Intent::Migrated, command.value.clone());
        builder.reset();
        builder.append_rejection(&command, Rejection::new(RejectionType::InvalidState, "busy"));

        let result = builder.build();
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].record_type, RecordType::CommandRejection);
        assert_eq!(result.events().count(), 0);
    }
}
