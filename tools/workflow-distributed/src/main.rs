use std::io::Write;

use clap::error::ErrorKind;
use clap::{Command, CommandFactory, FromArgMatches, Parser};
use env_logger::Builder;
use log::info;

use dslab_activity::config::{ClusterSpec, SchedulerConfig};
use dslab_activity::error::Result;
use dslab_activity::policy::describe_policies;
use dslab_activity::simulation::ActivitySimulation;
use dslab_activity::topology::{cluster, STORAGE_HOST};
use dslab_activity::workload::fork_join;

#[derive(Parser, Debug)]
#[command(about, long_about = None)]
/// Runs the fork-join workflow on a cluster behind a wide-area link
struct Args {
    /// Number of cluster hosts
    #[arg(value_parser = clap::value_parser!(u32).range(1..))]
    hosts: u32,

    /// Number of cores per host
    #[arg(value_parser = clap::value_parser!(u32).range(1..))]
    cores: u32,

    /// Bandwidth of the wide-area link in MB/s
    bandwidth: f64,

    /// Task selection policy
    #[arg(long = "ts", default_value_t = 0)]
    task_policy: u32,

    /// Resource selection policy
    #[arg(long = "cs", default_value_t = 0)]
    resource_policy: u32,

    /// Seed for the random policies
    #[arg(long, default_value_t = 0)]
    seed: u64,

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

/// Runs the simulation and writes the resulting makespan to `out`.
fn run(args: Args, out: &mut impl Write) -> Result<()> {
    let topology = cluster(&ClusterSpec {
        hosts: args.hosts,
        cores_per_host: args.cores,
        bandwidth: args.bandwidth,
    })?;
    let scheduler = SchedulerConfig::new(args.task_policy, args.resource_policy, args.seed, STORAGE_HOST)
        .with_link_speed(topology.link_speed);
    let (task_policy, resource_policy) = scheduler.policies()?;
    info!(
        "fork-join on {} hosts with {} cores, task policy: {}, resource policy: {}",
        args.hosts, args.cores, task_policy, resource_policy
    );

    let mut sim = ActivitySimulation::new(topology.platform, scheduler);
    let runner = sim.init(fork_join())?;
    sim.step_until_no_events();
    let runner = runner.borrow();
    runner.validate_completed()?;
    writeln!(
        out,
        "Makespan: {:.3}, max used cores: {}",
        runner.run_stats().makespan,
        runner.run_stats().max_used_cores
    )?;
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

    use super::{run, usage, Args};

    #[test]
    fn run_reports_makespan_and_saves_report() {
        let report = std::env::temp_dir().join("workflow-distributed-report.json");
        let report = report.to_string_lossy().to_string();
        let args = Args::try_parse_from(["workflow-distributed", "--report", &report, "2", "4", "1000"]).unwrap();
        let mut out: Vec<u8> = Vec::new();
        run(args, &mut out).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.starts_with("Makespan: "));
        assert!(out.ends_with("max used cores: 8\n"));
        assert!(std::fs::metadata(&report).unwrap().len() > 0);
    }

    #[test]
    fn invalid_arguments_are_configuration_errors() {
        assert!(Args::try_parse_from(["workflow-distributed", "0", "4", "100"]).is_err());
        let args = Args::try_parse_from(["workflow-distributed", "2", "4", "0.5"]).unwrap();
        assert!(run(args, &mut std::io::sink()).unwrap_err().is_configuration_error());
        let args = Args::try_parse_from(["workflow-distributed", "--cs", "5", "2", "4", "100"]).unwrap();
        assert!(run(args, &mut std::io::sink()).unwrap_err().is_configuration_error());
        let text = usage();
        for flag in ["Usage:", "--ts", "--cs", "--seed", "--report", "resource policies (--cs)"] {
            assert!(text.contains(flag), "{} is missing", flag);
        }
    }
}
