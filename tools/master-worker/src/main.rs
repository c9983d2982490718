use std::io::Write;

use clap::error::ErrorKind;
use clap::{ArgAction, Command, CommandFactory, FromArgMatches, Parser};
use env_logger::Builder;
use itertools::Itertools;
use log::info;

use dslab_activity::config::{SchedulerConfig, TaskSpec, WorkerSpec};
use dslab_activity::error::{ActivityError, Result};
use dslab_activity::experiment::{average_makespan, Experiment, RunSetup};
use dslab_activity::policy::describe_policies;
use dslab_activity::simulation::ActivitySimulation;
use dslab_activity::topology::{default_workers, star, MASTER_HOST};
use dslab_activity::workload::bag_of_tasks;

#[derive(Parser, Debug)]
#[command(about, long_about = None)]
/// Runs a bag of independent tasks on workers connected to a master node
struct Args {
    /// Task triples: <input MB> <flops> <output MB>
    #[arg(required = true, value_name = "TASK")]
    tasks: Vec<f64>,

    /// Task selection policy
    #[arg(long = "ts", default_value_t = 0)]
    task_policy: u32,

    /// Resource selection policy
    #[arg(long = "cs", default_value_t = 0)]
    resource_policy: u32,

    /// Worker replacing the default ones: <id> <Gflop/s> <MB/s>
    #[arg(long, num_args = 3, value_names = ["ID", "GFLOPS", "BANDWIDTH"], action = ArgAction::Append)]
    worker: Vec<String>,

    /// Seed for the random policies
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Number of invocations, each with the next seed
    #[arg(long, default_value_t = 1)]
    inv: u64,

    /// Path to produced JSON report
    #[arg(long, default_value = "/tmp/workflow_data.json")]
    report: String,
}

fn command() -> Command {
    Args::command().after_help(describe_policies())
}

/// Help listing all flags and policy codes.
fn usage() -> String {
    command().render_help().to_string()
}

fn parse_args() -> Args {
    let argv = std::env::args().filter(|arg| !arg.starts_with("--log"));
    let parsed = command()
        .try_get_matches_from(argv)
        .and_then(|matches| Args::from_arg_matches(&matches));
    match parsed {
        Ok(args) => args,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => err.exit(),
        Err(err) => {
            eprintln!("{}\n{}", err, usage());
            std::process::exit(1);
        }
    }
}

fn task_specs(values: &[f64]) -> Result<Vec<TaskSpec>> {
    if values.len() % 3 != 0 {
        return Err(ActivityError::invalid_parameter(
            "tasks",
            format!("{} values given, expected triples of <input> <flops> <output>", values.len()),
        ));
    }
    Ok(values
        .iter()
        .tuples()
        .map(|(&input, &flops, &output)| TaskSpec { input, flops, output })
        .collect())
}

fn worker_specs(values: &[String]) -> Result<Vec<WorkerSpec>> {
    if values.is_empty() {
        return Ok(default_workers());
    }
    let number = |name: &str, value: &str| {
        value
            .parse::<f64>()
            .map_err(|_| ActivityError::invalid_parameter(name, format!("{} is not a number", value)))
    };
    values
        .iter()
        .tuples()
        .map(|(id, gflops, bandwidth)| {
            Ok(WorkerSpec::new(
                id,
                number("worker speed", gflops)?,
                number("worker bandwidth", bandwidth)?,
            ))
        })
        .collect()
}

/// Runs the simulation and writes the resulting makespan to `out`.
fn run(args: Args, out: &mut impl Write) -> Result<()> {
    if args.inv == 0 {
        return Err(ActivityError::invalid_parameter("inv", "at least one invocation is required"));
    }
    let dag = bag_of_tasks(&task_specs(&args.tasks)?)?;
    let topology = star(&worker_specs(&args.worker)?)?;
    let scheduler = SchedulerConfig::new(args.task_policy, args.resource_policy, args.seed, MASTER_HOST)
        .with_link_speed(topology.link_speed);
    let (task_policy, resource_policy) = scheduler.policies()?;
    info!(
        "{} tasks on {} workers, task policy: {}, resource policy: {}",
        dag.task_count(),
        topology.platform.hosts.len(),
        task_policy,
        resource_policy
    );

    if args.inv > 1 {
        let setup = RunSetup {
            dag,
            platform: topology.platform,
            scheduler,
        };
        let threads = std::thread::available_parallelism().map_or(1, |n| n.get());
        let results = Experiment::new(setup, args.inv).run(threads)?;
        writeln!(out, "Average makespan over {} runs: {:.3}", results.len(), average_makespan(&results))?;
        return Ok(());
    }

    let mut sim = ActivitySimulation::new(topology.platform, scheduler);
    let runner = sim.init(dag)?;
    sim.step_until_no_events();
    let runner = runner.borrow();
    runner.validate_completed()?;
    writeln!(out, "Makespan: {:.3}", runner.run_stats().makespan)?;
    runner.save_report(&args.report)?;
    info!("report saved to {}", args.report);
    Ok(())
}

fn main() {
    Builder::from_default_env()
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .init();

    if let Err(err) = run(parse_args(), &mut std::io::stdout()) {
        eprintln!("error: {}", err);
        if err.is_configuration_error() {
            eprintln!("\n{}", usage());
        }
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{run, task_specs, usage, worker_specs, Args};

    #[test]
    fn workers_are_given_as_triples() {
        let args = Args::try_parse_from([
            "master-worker",
            "--worker",
            "a",
            "10",
            "100",
            "--worker",
            "b",
            "20",
            "200",
            "--ts",
            "1",
            "5",
            "1000",
            "5",
        ])
        .unwrap();
        assert_eq!(args.task_policy, 1);
        assert_eq!(args.resource_policy, 0);
        assert_eq!(args.report, "/tmp/workflow_data.json");
        let workers = worker_specs(&args.worker).unwrap();
        assert_eq!(workers.len(), 2);
        assert_eq!(workers[1].name, "b");
        assert_eq!(workers[1].bandwidth, 200.);
        assert_eq!(task_specs(&args.tasks).unwrap()[0].flops, 1000.);
    }

    #[test]
    fn malformed_values_are_rejected() {
        assert!(task_specs(&[1., 2.]).is_err());
        assert!(worker_specs(&["a".to_string(), "fast".to_string(), "1".to_string()]).is_err());
        assert_eq!(worker_specs(&[]).unwrap().len(), 3);
        assert!(Args::try_parse_from(["master-worker", "--ts", "x", "1", "1", "1"]).is_err());
        assert!(Args::try_parse_from(["master-worker"]).is_err());
    }

    #[test]
    fn repeated_runs_report_average_makespan() {
        let args = Args::try_parse_from([
            "master-worker",
            "--ts",
            "1",
            "--cs",
            "1",
            "--inv",
            "3",
            "100",
            "1e12",
            "100",
        ])
        .unwrap();
        let mut out: Vec<u8> = Vec::new();
        run(args, &mut out).unwrap();
        // worker_one: 100 MB each way at 10000 MB/s plus 1 s of compute
        assert_eq!(String::from_utf8(out).unwrap(), "Average makespan over 3 runs: 1.019\n");
    }

    #[test]
    fn usage_lists_flags_and_policies() {
        let text = usage();
        for flag in ["Usage:", "--ts", "--cs", "--worker", "--seed", "--inv", "--report"] {
            assert!(text.contains(flag), "{} is missing", flag);
        }
        assert!(text.contains("task policies (--ts): 0 - Random"));
        for argv in [vec!["master-worker", "1", "2"], vec!["master-worker", "--ts", "9", "1", "2", "3"]] {
            let args = Args::try_parse_from(argv).unwrap();
            assert!(run(args, &mut std::io::sink()).unwrap_err().is_configuration_error());
        }
    }
}
