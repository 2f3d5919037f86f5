use pim_engine::prelude::*;
use pim_engine::test_harness::{run_simulator, SimulatorConfig};
use pim_state::ElementInstanceState;
use pim_test_utils::{create_migrate_command, StateFixture};
use proptest::prelude::*;

/// Flat process with `tasks` service tasks named `{prefix}{i}`
fn flat_process(key: i64, bpmn_process_id: &str, prefix: &str, tasks: usize) -> DeployedProcess {
    (0..tasks)
        .fold(DeployedProcess::builder(Key(key), bpmn_process_id, 1), |builder, i| {
            builder.element(format!("{prefix}{i}"), ElementType::ServiceTask, None)
        })
        .build()
        .unwrap()
}

fn snapshot(engine: &MigrationEngine, keys: &[Key]) -> Vec<(Key, String)> {
    keys.iter()
        .map(|key| {
            let instance = engine.state().element_instance(*key).unwrap();
            (instance.process_definition_key, instance.element_id.clone())
        })
        .collect()
}

#[test]
fn test_simulator_clean_run() {
    let report = run_simulator(SimulatorConfig {
        instances: 200,
        fault_rate: 0.0,
        ..SimulatorConfig::default()
    });

    assert!(report.passed(), "{}", report.generate_text());
}

#[test]
fn test_simulator_with_faults() {
    let report = run_simulator(SimulatorConfig {
        seed: 7,
        instances: 300,
        fault_rate: 0.7,
        ..SimulatorConfig::default()
    });

    assert!(report.passed(), "{}", report.generate_text());
}

proptest! {
    #[test]
    fn prop_migration_is_all_or_nothing(
        tasks in 1usize..6,
        active in proptest::collection::vec(any::<bool>(), 6),
        incident_at in proptest::option::of(0usize..6),
    ) {
        let mut fixture = StateFixture::new();
        let source = fixture.deploy(flat_process(1, "v1", "a", tasks));
        fixture.deploy(flat_process(2, "v2", "b", tasks));
        let root = fixture.start_instance(source);

        let mut keys = vec![root];
        for (i, _) in active.iter().enumerate().take(tasks).filter(|(_, on)| **on) {
            let key = fixture.activate(root, &format!("a{i}"));
            if incident_at == Some(i) {
                fixture.raise_incident(key);
            }
            keys.push(key);
        }
        let blocked = incident_at.is_some_and(|i| i < tasks && active[i]);

        let mapping: Vec<(String, String)> = (0..tasks)
            .map(|i| (format!("a{i}"), format!("b{i}")))
            .collect();
        let mapping: Vec<(&str, &str)> = mapping
            .iter()
            .map(|(s, t)| (s.as_str(), t.as_str()))
            .collect();

        let mut engine = MigrationEngine::with_state(EngineConfig::default(), fixture.into_state());
        let before = snapshot(&engine, &keys);
        let response = engine.submit(create_migrate_command(root, Key(2), &mapping)).unwrap();
        let after = snapshot(&engine, &keys);

        prop_assert_eq!(response.is_rejection(), blocked);
        if blocked {
            prop_assert_eq!(before, after);
            prop_assert_eq!(engine.log().follow_ups(1).len(), 1);
        } else {
            prop_assert!(after.iter().all(|(definition, _)| *definition == Key(2)));
            prop_assert!(after.iter().skip(1).all(|(_, id)| id.starts_with('b')));
            // One event per element instance plus the completed event.
            prop_assert_eq!(engine.log().follow_ups(1).len(), keys.len() + 1);
        }
    }

    #[test]
    fn prop_every_command_is_answered(seed in any::<u64>()) {
        let report = run_simulator(SimulatorConfig {
            seed,
            instances: 20,
            ..SimulatorConfig::default()
        });

        prop_assert!(report.passed(), "{}", report.generate_text());
    }
}
