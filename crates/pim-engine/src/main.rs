//! Command-line entry point: runs the migration simulator and its
//! multi-seed certification.

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, Command};
use pim_engine::test_harness::{run_simulator, SimulatorConfig, TestHarness};
use pim_engine::{logging, EngineConfig};
use std::path::PathBuf;

fn cli() -> Command {
    Command::new("pim-engine")
        .version(pim_engine::VERSION)
        .about("Process-instance migration engine")
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Engine configuration file (TOML)"),
        )
        .subcommand(
            Command::new("simulate")
                .about("Run the migration simulator")
                .arg(
                    Arg::new("instances")
                        .long("instances")
                        .default_value("1000")
                        .value_parser(value_parser!(u64))
                        .help("Number of process instances to migrate"),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .default_value("42")
                        .value_parser(value_parser!(u64))
                        .help("Random seed for reproducibility"),
                )
                .arg(
                    Arg::new("fault-rate")
                        .long("fault-rate")
                        .default_value("0.5")
                        .value_parser(value_parser!(f64))
                        .help("Share of instances with an injected fault"),
                )
                .arg(
                    Arg::new("stop-on-violation")
                        .long("stop-on-violation")
                        .action(ArgAction::SetTrue)
                        .help("Stop simulation on first violation"),
                ),
        )
        .subcommand(
            Command::new("certify")
                .about("Run the simulator over a range of seeds")
                .arg(
                    Arg::new("seeds")
                        .long("seeds")
                        .default_value("10")
                        .value_parser(value_parser!(u64))
                        .help("Number of seeds, starting at 0"),
                )
                .arg(
                    Arg::new("instances")
                        .long("instances")
                        .default_value("1000")
                        .value_parser(value_parser!(u64))
                        .help("Instances per seed"),
                ),
        )
        .subcommand(Command::new("show-config").about("Print the effective engine configuration"))
}

fn main() -> Result<()> {
    let matches = cli().get_matches();

    logging::init(matches.get_flag("json-logs")).context("failed to initialise logging")?;

    let engine = match matches.get_one::<PathBuf>("config") {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => EngineConfig::default(),
    };

    match matches.subcommand() {
        Some(("simulate", args)) => {
            let config = SimulatorConfig {
                seed: args.get_one::<u64>("seed").copied().unwrap_or(42),
                instances: args.get_one::<u64>("instances").copied().unwrap_or(1_000),
                fault_rate: args.get_one::<f64>("fault-rate").copied().unwrap_or(0.5),
                stop_on_first_violation: args.get_flag("stop-on-violation"),
                engine: engine.with_log_verification(true),
                ..SimulatorConfig::default()
            };

            println!("Running migration simulator...");
            println!("Instances: {}", config.instances);
            println!("Seed: {}", config.seed);
            println!();

            let report = run_simulator(config);
            println!("{}", report.generate_text());

            std::process::exit(if report.passed() { 0 } else { 1 });
        }
        Some(("certify", args)) => {
            let seeds = args.get_one::<u64>("seeds").copied().unwrap_or(10);
            let instances = args.get_one::<u64>("instances").copied().unwrap_or(1_000);

            let report = TestHarness::run_certification(0..seeds, instances);
            println!("Certification Report:");
            println!("  Seeds tested: {}", report.seeds_tested);
            println!("  Violations: {}", report.total_violations);
            println!("  Passed: {}", report.passed);

            std::process::exit(if report.passed { 0 } else { 1 });
        }
        Some(("show-config", _)) => {
            print!("{}", engine.to_toml_string()?);
        }
        _ => {
            cli().print_help()?;
        }
    }
    Ok(())
}
