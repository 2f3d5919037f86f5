//! Migration simulator - randomized end-to-end checks of the engine
//!
//! Each simulated instance gets its own engine: a random source process, a
//! structurally identical target process, a random execution tree and at most
//! one injected fault. The simulator predicts the outcome from the fault,
//! submits the migrate command and then checks the engine's invariants.

use crate::config::EngineConfig;
use crate::engine::MigrationEngine;
use pim_log::{LogEntry, ResponseOutcome};
use pim_model::{
    AuthorizationContext, Command, DeployedProcess, ElementInstance, ElementType, EventTrigger,
    EventType, ErrorType, Incident, Intent, Job, Key, KeyGenerator, ModelError,
    ProcessInstanceMigrationRecord, RecordType, RejectionType, TenantId, Variable,
};
use pim_state::{ElementInstanceState, JobState, MemoryState, StateError};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;

const SOURCE_KEY: Key = Key(1);
const TARGET_KEY: Key = Key(2);
const SOURCE_ID: &str = "sim_v1";
const TARGET_ID: &str = "sim_v2";
const TARGET_VERSION: i32 = 2;
const GATEWAY_ID: &str = "gateway";
const RELOCATED_SCOPE_ID: &str = "relocated";

/// Simulator configuration
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    /// Number of process instances to migrate
    pub instances: u64,
    /// Share of instances that get one injected fault
    pub fault_rate: f64,
    /// Upper bound on nested sub-processes per instance
    pub max_sub_processes: usize,
    /// Upper bound on service and user tasks per instance
    pub max_tasks: usize,
    /// Stop conditions
    pub stop_on_first_violation: bool,
    /// Configuration of the engine under test
    pub engine: EngineConfig,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            instances: 1_000,
            fault_rate: 0.5,
            max_sub_processes: 3,
            max_tasks: 6,
            stop_on_first_violation: true,
            engine: EngineConfig::default().with_log_verification(true),
        }
    }
}

/// Faults the simulator can inject into an otherwise migratable instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    /// Caller is not authorized for the instance's tenant
    ForeignTenant,
    /// Caller lacks the update permission
    MissingPermission,
    /// Instance was started by a call activity
    ChildInstance,
    /// A source element is mapped twice
    DuplicateSource,
    /// Mapping names a missing target element
    UnknownTarget,
    /// An unsupported element is active
    UnsupportedElement,
    /// An active element has no mapping
    UnmappedElement,
    /// An active element has an incident
    Incident,
    /// A job of an active element has an incident
    JobIncident,
    /// A mapping changes the element type
    TypeChange,
    /// A mapping moves a task into another scope
    FlowScopeChange,
    /// An active element has a boundary event
    SourceBoundaryEvent,
    /// A target element has a boundary event
    TargetBoundaryEvent,
    /// An event trigger is pending
    PendingTrigger,
    /// A sequence flow was taken but not consumed
    TakenSequenceFlow,
    /// A user task is active
    ActiveUserTask,
}

impl Fault {
    /// Every fault, in generation order
    pub const ALL: [Fault; 16] = [
        Fault::ForeignTenant,
        Fault::MissingPermission,
        Fault::ChildInstance,
        Fault::DuplicateSource,
        Fault::UnknownTarget,
        Fault::UnsupportedElement,
        Fault::UnmappedElement,
        Fault::Incident,
        Fault::JobIncident,
        Fault::TypeChange,
        Fault::FlowScopeChange,
        Fault::SourceBoundaryEvent,
        Fault::TargetBoundaryEvent,
        Fault::PendingTrigger,
        Fault::TakenSequenceFlow,
        Fault::ActiveUserTask,
    ];

    /// Rejection type the fault must produce
    #[must_use]
    pub fn expected_rejection(self) -> RejectionType {
        match self {
            Fault::ForeignTenant => RejectionType::NotFound,
            Fault::MissingPermission => RejectionType::Forbidden,
            Fault::DuplicateSource | Fault::UnknownTarget => RejectionType::InvalidArgument,
            _ => RejectionType::InvalidState,
        }
    }
}

/// What the simulator predicts for one instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedOutcome {
    /// Migrated to the target process
    Migrated,
    /// Rejected with this type
    Rejected(RejectionType),
}

impl ExpectedOutcome {
    fn of(fault: Option<Fault>) -> Self {
        fault.map_or(ExpectedOutcome::Migrated, |f| {
            ExpectedOutcome::Rejected(f.expected_rejection())
        })
    }
}

/// Engine invariants checked after every simulated command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvariantCheck {
    /// The engine answered instead of failing
    CommandIsAnswered,
    /// A rejected command leaves no trace besides its rejection
    NoPartialMutation,
    /// Every element instance, job and variable moved to the target
    AllEntitiesMigrated,
    /// Element, job and variable events in that order, completed event last
    FollowUpsAreGrouped,
    /// The log hash chain verifies
    HashChainIsUnbroken,
}

/// One failed invariant check
#[derive(Debug, Clone)]
pub struct InvariantFailure {
    /// Which check
    pub check: InvariantCheck,
    /// What was observed
    pub details: String,
}

/// A violation detected during simulation
#[derive(Debug, Clone)]
pub enum Violation {
    /// The generated scenario could not be installed
    /// Setup failure
    Setup {
        /// Instance number
        instance: u64,
        /// Why it failed
        details: String,
    },
    /// The engine answered differently than predicted
    UnexpectedOutcome {
        /// Instance number
        instance: u64,
        /// Injected fault
        fault: Option<Fault>,
        /// Predicted outcome
        expected: ExpectedOutcome,
        /// Observed outcome
        actual: String,
    },
    /// An engine invariant did not hold
    Invariant {
        /// Instance number
        instance: u64,
        /// Injected fault
        fault: Option<Fault>,
        /// The failed check
        failure: InvariantFailure,
    },
}

/// Statistics collected during simulation
#[derive(Debug, Clone, Default)]
pub struct SimulationStats {
    /// Instances simulated
    pub instances: u64,
    /// Instances migrated
    pub migrated: u64,
    /// Instances rejected
    pub rejected: u64,
    /// `ELEMENT_MIGRATED` events written
    pub element_events: u64,
    /// `JOB_MIGRATED` events written
    pub job_events: u64,
    /// `VARIABLE_MIGRATED` events written
    pub variable_events: u64,
    /// Injected faults by kind
    pub faults: HashMap<Fault, u64>,
}

/// Final report from the simulator
#[derive(Debug, Clone)]
pub struct SimulatorReport {
    /// Configuration of the run
    pub config: SimulatorConfig,
    /// Counters
    pub stats: SimulationStats,
    /// Every violation found
    pub violations: Vec<Violation>,
}

impl SimulatorReport {
    /// Check if simulation passed all criteria
    #[must_use]
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }

    /// Generate a text report
    #[must_use]
    pub fn generate_text(&self) -> String {
        let mut report = String::new();
        let stats = &self.stats;

        report.push_str("=== Migration Simulator Report ===\n\n");
        let _ = writeln!(report, "Seed: {}", self.config.seed);
        let _ = writeln!(report, "Instances: {}", stats.instances);
        let _ = writeln!(report, "Migrated: {}", stats.migrated);
        let _ = writeln!(report, "Rejected: {}", stats.rejected);
        let _ = writeln!(report, "Element events: {}", stats.element_events);
        let _ = writeln!(report, "Job events: {}", stats.job_events);
        let _ = writeln!(report, "Variable events: {}", stats.variable_events);
        let _ = writeln!(report, "Violations: {}", self.violations.len());

        if !stats.faults.is_empty() {
            report.push_str("\n=== Injected Faults ===\n");
            let mut faults: Vec<_> = stats.faults.iter().collect();
            faults.sort_by_key(|(fault, _)| format!("{fault:?}"));
            for (fault, count) in faults {
                let _ = writeln!(report, "{fault:?}: {count}");
            }
        }

        if !self.violations.is_empty() {
            report.push_str("\n=== Violations ===\n");
            for (i, v) in self.violations.iter().enumerate() {
                let _ = writeln!(report, "{}. {v:?}", i + 1);
            }
        }

        let _ = write!(
            report,
            "\n=== Result: {} ===\n",
            if self.passed() { "PASS" } else { "FAIL" }
        );
        report
    }
}

/// Run the migration simulator
#[must_use]
pub fn run_simulator(config: SimulatorConfig) -> SimulatorReport {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut stats = SimulationStats::default();
    let mut violations = Vec::new();

    for instance in 0..config.instances {
        let fault = rng
            .gen_bool(config.fault_rate.clamp(0.0, 1.0))
            .then(|| Fault::ALL[rng.gen_range(0..Fault::ALL.len())]);

        let found = match Scenario::generate(&mut rng, &config, fault) {
            Ok(scenario) => {
                if let Some(fault) = scenario.fault {
                    *stats.faults.entry(fault).or_insert(0) += 1;
                }
                scenario.run(instance, &mut stats)
            }
            Err(error) => vec![Violation::Setup {
                instance,
                details: error.to_string(),
            }],
        };
        stats.instances += 1;

        let stop = config.stop_on_first_violation && !found.is_empty();
        violations.extend(found);
        if stop {
            break;
        }
    }

    tracing::info!(
        seed = config.seed,
        instances = stats.instances,
        violations = violations.len(),
        "Simulation finished"
    );

    SimulatorReport {
        config,
        stats,
        violations,
    }
}

#[derive(Debug, thiserror::Error)]
enum SetupError {
    #[error("invalid process: {0}")]
    Model(#[from] ModelError),

    #[error("invalid state: {0}")]
    State(#[from] StateError),
}

#[derive(Debug, Clone)]
struct ElementSpec {
    id: String,
    element_type: ElementType,
    /// `None` places the element directly in the process
    scope: Option<String>,
}

impl ElementSpec {
    fn new(id: impl Into<String>, element_type: ElementType, scope: Option<String>) -> Self {
        Self {
            id: id.into(),
            element_type,
            scope,
        }
    }
}

/// Entities a successful migration must move
#[derive(Debug, Default, Clone, Copy)]
struct Expected {
    element_instances: usize,
    jobs: usize,
    variables: usize,
}

struct Scenario {
    engine: MigrationEngine,
    command: Command<ProcessInstanceMigrationRecord>,
    process_instance_key: Key,
    /// Fault actually injected; may differ from the one drawn when the
    /// generated tree offers no element it applies to
    fault: Option<Fault>,
    expected: Expected,
}

impl Scenario {
    fn generate(
        rng: &mut StdRng,
        config: &SimulatorConfig,
        fault: Option<Fault>,
    ) -> Result<Self, SetupError> {
        let specs = generate_elements(rng, config);

        let mut active = HashSet::new();
        for spec in &specs {
            let scope_active = spec.scope.as_ref().map_or(true, |s| active.contains(s));
            // Only process, service task and user task instances are
            // migratable, so sub-processes stay inactive on clean runs.
            let wanted = match spec.element_type {
                ElementType::ExclusiveGateway | ElementType::SubProcess => {
                    fault == Some(Fault::UnsupportedElement)
                }
                _ => spec.id == "task_0" || rng.gen_bool(0.6),
            };
            if scope_active && wanted {
                active.insert(spec.id.clone());
            }
        }

        let (fault, victim) = pick_victim(rng, &specs, &active, fault);

        let mut target_specs = specs.clone();
        let mut source_boundary = None;
        let mut target_boundary = None;
        match (fault, victim.as_deref()) {
            (Some(Fault::TypeChange), Some(victim)) => {
                for spec in target_specs.iter_mut().filter(|s| s.id == victim) {
                    spec.element_type = match spec.element_type {
                        ElementType::ServiceTask => ElementType::UserTask,
                        _ => ElementType::ServiceTask,
                    };
                }
            }
            (Some(Fault::FlowScopeChange), Some(victim)) => {
                target_specs.push(ElementSpec::new(
                    RELOCATED_SCOPE_ID,
                    ElementType::SubProcess,
                    None,
                ));
                for spec in target_specs.iter_mut().filter(|s| s.id == victim) {
                    spec.scope = Some(RELOCATED_SCOPE_ID.to_string());
                }
            }
            (Some(Fault::SourceBoundaryEvent), Some(victim)) => source_boundary = Some(victim),
            (Some(Fault::TargetBoundaryEvent), Some(victim)) => target_boundary = Some(victim),
            _ => {}
        }
        let source = build_process(SOURCE_KEY, SOURCE_ID, 1, &specs, source_boundary)?;
        let target = build_process(
            TARGET_KEY,
            TARGET_ID,
            TARGET_VERSION,
            &target_specs,
            target_boundary,
        )?;

        let mut tree = TreeBuilder::new(config.engine.partition_id);
        tree.state.deploy(source)?;
        tree.state.deploy(target)?;

        let process_instance_key = if fault == Some(Fault::ChildInstance) {
            let parent = tree.start(None)?;
            tree.start(Some(parent))?
        } else {
            tree.start(None)?
        };

        let mut keys_by_id = HashMap::new();
        keys_by_id.insert(SOURCE_ID.to_string(), process_instance_key);
        tree.add_variables(rng, process_instance_key)?;

        for spec in specs.iter().filter(|s| active.contains(&s.id)) {
            let scope_key = spec
                .scope
                .as_ref()
                .and_then(|s| keys_by_id.get(s).copied())
                .unwrap_or(process_instance_key);
            let is_victim = victim.as_deref() == Some(spec.id.as_str());

            let key = tree.activate(scope_key, spec, |instance| match fault {
                Some(Fault::TakenSequenceFlow) if is_victim => instance.active_sequence_flows = 1,
                Some(Fault::ActiveUserTask) if is_victim => {
                    instance.user_task_key = Some(Key(i64::MAX));
                }
                _ => {}
            })?;
            keys_by_id.insert(spec.id.clone(), key);

            if spec.element_type == ElementType::ServiceTask {
                tree.add_job(key)?;
            }
            tree.add_variables(rng, key)?;

            if is_victim {
                match fault {
                    Some(Fault::Incident) => tree.add_incident(key, false)?,
                    Some(Fault::JobIncident) => tree.add_incident(key, true)?,
                    Some(Fault::PendingTrigger) => tree.add_trigger(key, &spec.id)?,
                    _ => {}
                }
            }
        }

        let mut record = ProcessInstanceMigrationRecord::new(process_instance_key, TARGET_KEY);
        for spec in &specs {
            let is_victim = victim.as_deref() == Some(spec.id.as_str());
            match fault {
                Some(Fault::UnmappedElement) if is_victim => {}
                Some(Fault::UnknownTarget) if is_victim => {
                    record = record.with_mapping(spec.id.clone(), "missing");
                }
                _ => record = record.with_mapping(spec.id.clone(), spec.id.clone()),
            }
        }
        if fault == Some(Fault::DuplicateSource) {
            record = record.with_mapping("task_0", "task_0");
        }

        let authorizations = match fault {
            Some(Fault::ForeignTenant) => AuthorizationContext::for_tenant("foreign"),
            Some(Fault::MissingPermission) => {
                AuthorizationContext::tenant_only(TenantId::default())
            }
            _ => AuthorizationContext::default_tenant(),
        };

        let expected = tree.expected;
        Ok(Self {
            engine: MigrationEngine::with_state(config.engine.clone(), tree.state),
            command: Command::new(record, authorizations).with_request_id(1),
            process_instance_key,
            fault,
            expected,
        })
    }

    fn run(mut self, instance: u64, stats: &mut SimulationStats) -> Vec<Violation> {
        let mut violations = Vec::new();
        let fault = self.fault;
        let expected = ExpectedOutcome::of(fault);
        let before = snapshot(self.engine.state(), self.process_instance_key);
        let mut invariant = |check: InvariantCheck, details: String| {
            violations.push(Violation::Invariant {
                instance,
                fault,
                failure: InvariantFailure { check, details },
            });
        };

        let response = match self.engine.submit(self.command.clone()) {
            Ok(response) => response,
            Err(error) => {
                invariant(InvariantCheck::CommandIsAnswered, error.to_string());
                return violations;
            }
        };
        let follow_ups = self.engine.log().follow_ups(1);

        if let Err(error) = self.engine.log().verify_integrity() {
            invariant(InvariantCheck::HashChainIsUnbroken, error.to_string());
        }

        let actual = match &response.outcome {
            ResponseOutcome::Accepted { .. } => ExpectedOutcome::Migrated,
            ResponseOutcome::Rejected(rejection) => {
                ExpectedOutcome::Rejected(rejection.rejection_type)
            }
        };

        match actual {
            ExpectedOutcome::Migrated => {
                stats.migrated += 1;
                for entry in &follow_ups {
                    match entry.record.intent {
                        Intent::ElementMigrated => stats.element_events += 1,
                        Intent::JobMigrated => stats.job_events += 1,
                        Intent::VariableMigrated => stats.variable_events += 1,
                        _ => {}
                    }
                }
                if let Err(details) = check_grouping(&follow_ups) {
                    invariant(InvariantCheck::FollowUpsAreGrouped, details);
                }
                if let Err(details) = check_migrated(
                    self.engine.state(),
                    self.process_instance_key,
                    &follow_ups,
                    self.expected,
                ) {
                    invariant(InvariantCheck::AllEntitiesMigrated, details);
                }
            }
            ExpectedOutcome::Rejected(_) => {
                stats.rejected += 1;
                let only_rejection = follow_ups.len() == 1
                    && follow_ups[0].record.record_type == RecordType::CommandRejection;
                if !only_rejection {
                    invariant(
                        InvariantCheck::NoPartialMutation,
                        format!("{} follow-up records written for a rejection", follow_ups.len()),
                    );
                }
                if snapshot(self.engine.state(), self.process_instance_key) != before {
                    invariant(
                        InvariantCheck::NoPartialMutation,
                        "execution state changed by a rejected command".to_string(),
                    );
                }
            }
        }

        if actual != expected {
            violations.push(Violation::UnexpectedOutcome {
                instance,
                fault,
                expected,
                actual: format!("{:?}", response.outcome),
            });
        }

        violations
    }
}

fn generate_elements(rng: &mut StdRng, config: &SimulatorConfig) -> Vec<ElementSpec> {
    let mut specs = Vec::new();
    let mut scopes: Vec<Option<String>> = vec![None];

    for n in 0..rng.gen_range(0..=config.max_sub_processes) {
        let scope = scopes[rng.gen_range(0..scopes.len())].clone();
        let id = format!("sub_{n}");
        specs.push(ElementSpec::new(id.clone(), ElementType::SubProcess, scope));
        scopes.push(Some(id));
    }

    for n in 0..rng.gen_range(1..=config.max_tasks.max(1)) {
        let scope = if n == 0 {
            None
        } else {
            scopes[rng.gen_range(0..scopes.len())].clone()
        };
        let element_type = if rng.gen_bool(0.7) {
            ElementType::ServiceTask
        } else {
            ElementType::UserTask
        };
        specs.push(ElementSpec::new(format!("task_{n}"), element_type, scope));
    }

    specs.push(ElementSpec::new(GATEWAY_ID, ElementType::ExclusiveGateway, None));
    specs
}

/// Choose the element the fault is injected into. Falls back to a fault that
/// applies to any active task when the drawn one has no candidate.
fn pick_victim(
    rng: &mut StdRng,
    specs: &[ElementSpec],
    active: &HashSet<String>,
    fault: Option<Fault>,
) -> (Option<Fault>, Option<String>) {
    let Some(fault) = fault else {
        return (None, None);
    };
    if fault == Fault::UnsupportedElement {
        return (Some(fault), Some(GATEWAY_ID.to_string()));
    }

    let candidates = |wanted: Option<ElementType>| -> Vec<&ElementSpec> {
        specs
            .iter()
            .filter(|s| active.contains(&s.id))
            .filter(|s| matches!(s.element_type, ElementType::ServiceTask | ElementType::UserTask))
            .filter(|s| wanted.map_or(true, |t| s.element_type == t))
            .collect()
    };

    let (fault, pool) = match fault {
        Fault::JobIncident => {
            let pool = candidates(Some(ElementType::ServiceTask));
            if pool.is_empty() {
                (Fault::Incident, candidates(None))
            } else {
                (fault, pool)
            }
        }
        Fault::ActiveUserTask => {
            let pool = candidates(Some(ElementType::UserTask));
            if pool.is_empty() {
                (Fault::PendingTrigger, candidates(None))
            } else {
                (fault, pool)
            }
        }
        _ => (fault, candidates(None)),
    };

    // task_0 is always active, so the pool is never empty.
    let victim = (!pool.is_empty()).then(|| pool[rng.gen_range(0..pool.len())].id.clone());
    (Some(fault), victim)
}

fn build_process(
    key: Key,
    bpmn_process_id: &str,
    version: i32,
    specs: &[ElementSpec],
    boundary_on: Option<&str>,
) -> Result<DeployedProcess, ModelError> {
    let mut builder = DeployedProcess::builder(key, bpmn_process_id, version);
    for spec in specs {
        builder = builder.element(spec.id.clone(), spec.element_type, spec.scope.as_deref());
    }
    if let Some(host) = boundary_on {
        builder = builder.boundary_event(format!("{host}_timeout"), EventType::Timer, host);
    }
    builder.build()
}

/// Installs a process instance of the source process into a fresh projection
struct TreeBuilder {
    state: MemoryState,
    keys: KeyGenerator,
    expected: Expected,
}

impl TreeBuilder {
    fn new(partition_id: u16) -> Self {
        Self {
            state: MemoryState::new(),
            keys: KeyGenerator::new(partition_id),
            expected: Expected::default(),
        }
    }

    fn start(&mut self, parent: Option<Key>) -> Result<Key, StateError> {
        let key = self.keys.next_key();
        self.state.insert_element_instance(ElementInstance {
            key,
            process_instance_key: key,
            flow_scope_key: None,
            parent_process_instance_key: parent,
            process_definition_key: SOURCE_KEY,
            bpmn_process_id: SOURCE_ID.to_string(),
            version: 1,
            element_id: SOURCE_ID.to_string(),
            element_type: ElementType::Process,
            tenant_id: TenantId::default(),
            job_key: None,
            user_task_key: None,
            active_sequence_flows: 0,
        })?;
        self.expected = Expected {
            element_instances: 1,
            ..Expected::default()
        };
        Ok(key)
    }

    fn activate(
        &mut self,
        scope_key: Key,
        spec: &ElementSpec,
        modify: impl FnOnce(&mut ElementInstance),
    ) -> Result<Key, StateError> {
        let scope = self
            .state
            .element_instance(scope_key)
            .ok_or(StateError::ElementInstanceNotFound(scope_key))?
            .clone();
        let mut instance = ElementInstance {
            key: self.keys.next_key(),
            flow_scope_key: Some(scope_key),
            parent_process_instance_key: None,
            element_id: spec.id.clone(),
            element_type: spec.element_type,
            ..scope
        };
        modify(&mut instance);
        let key = instance.key;
        self.state.insert_element_instance(instance)?;
        self.expected.element_instances += 1;
        Ok(key)
    }

    fn add_job(&mut self, element_instance_key: Key) -> Result<(), StateError> {
        let instance = self
            .state
            .element_instance(element_instance_key)
            .ok_or(StateError::ElementInstanceNotFound(element_instance_key))?
            .clone();
        self.state.insert_job(Job {
            key: self.keys.next_key(),
            job_type: format!("{}_worker", instance.element_id),
            element_instance_key,
            process_instance_key: instance.process_instance_key,
            process_definition_key: instance.process_definition_key,
            process_definition_version: instance.version,
            bpmn_process_id: instance.bpmn_process_id,
            element_id: instance.element_id,
            tenant_id: instance.tenant_id,
            retries: 3,
        })?;
        self.expected.jobs += 1;
        Ok(())
    }

    fn add_variables(&mut self, rng: &mut StdRng, scope_key: Key) -> Result<(), StateError> {
        let process_instance_key = self
            .state
            .element_instance(scope_key)
            .ok_or(StateError::ElementInstanceNotFound(scope_key))?
            .process_instance_key;
        for n in 0..rng.gen_range(0..=2) {
            self.state.insert_variable(Variable {
                key: self.keys.next_key(),
                scope_key,
                name: format!("var_{n}"),
                value: serde_json::json!(rng.gen_range(0..1_000)),
                process_instance_key,
                process_definition_key: SOURCE_KEY,
                bpmn_process_id: SOURCE_ID.to_string(),
                tenant_id: TenantId::default(),
            })?;
            self.expected.variables += 1;
        }
        Ok(())
    }

    fn add_incident(&mut self, element_instance_key: Key, on_job: bool) -> Result<(), StateError> {
        let instance = self
            .state
            .element_instance(element_instance_key)
            .ok_or(StateError::ElementInstanceNotFound(element_instance_key))?;
        let job_key = if on_job { instance.job_key } else { None };
        let process_instance_key = instance.process_instance_key;
        self.state.insert_incident(Incident {
            key: self.keys.next_key(),
            process_instance_key,
            element_instance_key,
            job_key,
            error_type: if on_job {
                ErrorType::JobNoRetries
            } else {
                ErrorType::IoMappingError
            },
            error_message: "injected".to_string(),
        })
    }

    fn add_trigger(
        &mut self,
        element_instance_key: Key,
        element_id: &str,
    ) -> Result<(), StateError> {
        let trigger = EventTrigger {
            event_key: self.keys.next_key(),
            element_id: element_id.to_string(),
        };
        self.state.push_event_trigger(element_instance_key, trigger)
    }
}

/// Element instances and jobs of one process instance, ordered by key
fn snapshot(state: &MemoryState, process_instance_key: Key) -> (Vec<ElementInstance>, Vec<Job>) {
    let mut instances: Vec<ElementInstance> = state
        .element_instances_of(process_instance_key)
        .cloned()
        .collect();
    instances.sort_by_key(|i| i.key);
    let jobs = instances
        .iter()
        .filter_map(|i| i.job_key)
        .filter_map(|key| state.job(key).cloned())
        .collect();
    (instances, jobs)
}

fn check_grouping(follow_ups: &[LogEntry]) -> Result<(), String> {
    let rank = |intent: Intent| match intent {
        Intent::ElementMigrated => 0,
        Intent::JobMigrated => 1,
        Intent::VariableMigrated => 2,
        _ => 3,
    };
    let ranks: Vec<u8> = follow_ups.iter().map(|e| rank(e.record.intent)).collect();

    if ranks.windows(2).any(|w| w[0] > w[1]) {
        return Err(format!("follow-up intents out of order: {ranks:?}"));
    }
    match follow_ups.last() {
        Some(last) if last.record.intent == Intent::Migrated => {}
        _ => return Err("completed event is not the last follow-up".to_string()),
    }
    if ranks.iter().filter(|r| **r == 3).count() != 1 {
        return Err("expected exactly one completed event".to_string());
    }
    Ok(())
}

fn check_migrated(
    state: &MemoryState,
    process_instance_key: Key,
    follow_ups: &[LogEntry],
    expected: Expected,
) -> Result<(), String> {
    let count = |intent: Intent| follow_ups.iter().filter(|e| e.record.intent == intent).count();
    let actual = (
        count(Intent::ElementMigrated),
        count(Intent::JobMigrated),
        count(Intent::VariableMigrated),
    );
    let wanted = (expected.element_instances, expected.jobs, expected.variables);
    if actual != wanted {
        return Err(format!(
            "expected (elements, jobs, variables) = {wanted:?} but got {actual:?}"
        ));
    }

    let (instances, jobs) = snapshot(state, process_instance_key);
    if let Some(stale) = instances
        .iter()
        .find(|i| {
            i.process_definition_key != TARGET_KEY
                || i.version != TARGET_VERSION
                || i.bpmn_process_id != TARGET_ID
        })
    {
        return Err(format!("element instance {} still references the source", stale.key));
    }
    if let Some(stale) = jobs
        .iter()
        .find(|j| j.process_definition_key != TARGET_KEY || j.bpmn_process_id != TARGET_ID)
    {
        return Err(format!("job {} still references the source", stale.key));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(seed: u64, instances: u64) -> SimulatorConfig {
        SimulatorConfig {
            seed,
            instances,
            stop_on_first_violation: false,
            ..SimulatorConfig::default()
        }
    }

    #[test]
    fn clean_instances_all_migrate() {
        let report = run_simulator(SimulatorConfig {
            fault_rate: 0.0,
            ..config(7, 100)
        });

        assert!(report.passed(), "{}", report.generate_text());
        assert_eq!(report.stats.migrated, 100);
        assert!(report.stats.element_events >= 200);
    }

    #[test]
    fn every_fault_is_rejected_as_predicted() {
        let report = run_simulator(SimulatorConfig {
            fault_rate: 1.0,
            ..config(11, 400)
        });

        assert!(report.passed(), "{}", report.generate_text());
        assert_eq!(report.stats.rejected, 400);
        assert_eq!(report.stats.migrated, 0);
    }

    #[test]
    fn mixed_run_is_reproducible() {
        let first = run_simulator(config(42, 200));
        let second = run_simulator(config(42, 200));

        assert!(first.passed(), "{}", first.generate_text());
        assert_eq!(first.stats.migrated, second.stats.migrated);
        assert_eq!(first.stats.variable_events, second.stats.variable_events);
    }

    #[test]
    fn report_text_names_the_result() {
        let report = run_simulator(config(1, 5));
        let text = report.generate_text();

        assert!(text.contains("Seed: 1"));
        assert!(text.contains("=== Result: PASS ==="));
    }
}
