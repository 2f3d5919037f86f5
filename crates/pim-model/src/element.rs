//! BPMN element kinds

use serde::{Deserialize, Serialize};
use std::fmt;

/// BPMN element type of an executable element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ElementType {
    /// Root of a process definition
    Process,
    /// Embedded sub-process
    SubProcess,
    /// Sub-process started by an event
    EventSubProcess,
    /// Start event
    StartEvent,
    /// Catch event inside a flow
    IntermediateCatchEvent,
    /// Throw event inside a flow
    IntermediateThrowEvent,
    /// Event attached to an activity
    BoundaryEvent,
    /// End event
    EndEvent,
    /// Task worked by a job worker
    ServiceTask,
    /// Task waiting for a message
    ReceiveTask,
    /// Task worked by a person
    UserTask,
    /// Task without automation
    ManualTask,
    /// Undefined task
    Task,
    /// Task run by a script
    ScriptTask,
    /// Task sending a message
    SendTask,
    /// Task evaluating a decision
    BusinessRuleTask,
    /// Gateway taking one outgoing flow
    ExclusiveGateway,
    /// Gateway forking or joining all flows
    ParallelGateway,
    /// Gateway waiting for the first event
    EventBasedGateway,
    /// Gateway taking every matching flow
    InclusiveGateway,
    /// Activity starting another process
    CallActivity,
    /// Multi-instance wrapper of an activity
    MultiInstanceBody,
    /// Sequence flow between elements
    SequenceFlow,
}

impl ElementType {
    /// Wire name, as used in records and rejection messages
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ElementType::Process => "PROCESS",
            ElementType::SubProcess => "SUB_PROCESS",
            ElementType::EventSubProcess => "EVENT_SUB_PROCESS",
            ElementType::StartEvent => "START_EVENT",
            ElementType::IntermediateCatchEvent => "INTERMEDIATE_CATCH_EVENT",
            ElementType::IntermediateThrowEvent => "INTERMEDIATE_THROW_EVENT",
            ElementType::BoundaryEvent => "BOUNDARY_EVENT",
            ElementType::EndEvent => "END_EVENT",
            ElementType::ServiceTask => "SERVICE_TASK",
            ElementType::ReceiveTask => "RECEIVE_TASK",
            ElementType::UserTask => "USER_TASK",
            ElementType::ManualTask => "MANUAL_TASK",
            ElementType::Task => "TASK",
            ElementType::ScriptTask => "SCRIPT_TASK",
            ElementType::SendTask => "SEND_TASK",
            ElementType::BusinessRuleTask => "BUSINESS_RULE_TASK",
            ElementType::ExclusiveGateway => "EXCLUSIVE_GATEWAY",
            ElementType::ParallelGateway => "PARALLEL_GATEWAY",
            ElementType::EventBasedGateway => "EVENT_BASED_GATEWAY",
            ElementType::InclusiveGateway => "INCLUSIVE_GATEWAY",
            ElementType::CallActivity => "CALL_ACTIVITY",
            ElementType::MultiInstanceBody => "MULTI_INSTANCE_BODY",
            ElementType::SequenceFlow => "SEQUENCE_FLOW",
        }
    }

    /// Elements that may carry boundary events
    #[must_use]
    pub const fn is_activity(self) -> bool {
        matches!(
            self,
            ElementType::SubProcess
                | ElementType::ServiceTask
                | ElementType::ReceiveTask
                | ElementType::UserTask
                | ElementType::ManualTask
                | ElementType::Task
                | ElementType::ScriptTask
                | ElementType::SendTask
                | ElementType::BusinessRuleTask
                | ElementType::CallActivity
        )
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trigger kind of an event element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    /// No trigger
    Unspecified,
    /// Timer
    Timer,
    /// Message
    Message,
    /// Signal
    Signal,
    /// Error
    Error,
    /// Escalation
    Escalation,
    /// Compensation
    Compensation,
    /// Condition
    Conditional,
    /// Link
    Link,
}

impl EventType {
    /// Wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            EventType::Unspecified => "UNSPECIFIED",
            EventType::Timer => "TIMER",
            EventType::Message => "MESSAGE",
            EventType::Signal => "SIGNAL",
            EventType::Error => "ERROR",
            EventType::Escalation => "ESCALATION",
            EventType::Compensation => "COMPENSATION",
            EventType::Conditional => "CONDITIONAL",
            EventType::Link => "LINK",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
