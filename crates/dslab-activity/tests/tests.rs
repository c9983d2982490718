use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;

use env_logger::Builder;
use rand::prelude::*;
use rand_pcg::Pcg64;

use dslab_activity::config::{
    ClusterSpec, HostConfig, LinkConfig, PlatformConfig, SchedulerConfig, TaskSpec, WorkerSpec,
};
use dslab_activity::dag::TaskGraph;
use dslab_activity::error::ActivityError;
use dslab_activity::experiment::{average_makespan, Experiment, RunSetup};
use dslab_activity::runner::ActivityRunner;
use dslab_activity::simulation::ActivitySimulation;
use dslab_activity::task::TaskState;
use dslab_activity::topology::{cluster, default_workers, star, Topology, MASTER_HOST};
use dslab_activity::trace_log::{Event, TraceLog};
use dslab_activity::workload::{bag_of_tasks, fork_join, FORK_JOIN_WIDTH};

fn init_logger() {
    Builder::from_default_env()
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .is_test(true)
        .try_init()
        .ok();
}

fn assert_float_eq(x: f64, y: f64, eps: f64) {
    assert!(
        (x - y).abs() < eps || (x.max(y) - x.min(y)) / x.min(y) < eps,
        "Values do not match: {:.15} vs {:.15}",
        x,
        y
    );
}

fn gen_dag(rng: &mut Pcg64, num_tasks: usize, num_files: usize) -> TaskGraph {
    let mut dag = TaskGraph::new();

    for i in 0..num_tasks {
        dag.add_task(
            &i.to_string(),
            rng.gen_range(1e9..1e12),
            rng.gen_range(0..1024),
            1,
            rng.gen_range(1..5),
            rng.gen_range(0.5..1.0),
        );
    }

    let mut tasks_topsort: Vec<usize> = (0..num_tasks).collect();
    for i in 0..num_tasks {
        tasks_topsort.swap(i, rng.gen_range(0..i + 1));
    }

    for i in 0..num_files {
        let num_participants = rng.gen_range(2..4);
        let mut participants: Vec<usize> = Vec::new();
        for _ in 0..num_participants {
            participants.push(rng.gen_range(0..num_tasks));
        }
        participants.sort();
        participants.dedup();
        for task_id in participants.iter_mut() {
            *task_id = tasks_topsort[*task_id];
        }

        let size = rng.gen_range(1e3..1e8);

        // rarely generate pre-staged inputs
        if rng.gen_range(0..10) == 0 {
            let id = dag.add_file(&i.to_string(), size);
            for task in participants.into_iter() {
                dag.add_data_dependency(id, task);
            }
        } else {
            let id = dag.add_task_output(participants[0], &i.to_string(), size);
            for task in participants.into_iter().skip(1) {
                dag.add_data_dependency(id, task);
            }
        }
    }

    dag
}

fn gen_platform(rng: &mut Pcg64, num_hosts: usize, shared_link: bool) -> PlatformConfig {
    let mut platform = PlatformConfig {
        storage: "storage".to_string(),
        hosts: Vec::new(),
        links: Vec::new(),
    };
    for i in 0..num_hosts {
        let link = if shared_link {
            "shared".to_string()
        } else {
            format!("link_{}", i)
        };
        if !shared_link || i == 0 {
            platform.links.push(LinkConfig {
                name: link.clone(),
                bandwidth: rng.gen_range(1e6..1e9),
                latency: rng.gen_range(0.0..0.01),
            });
        }
        platform.hosts.push(HostConfig {
            name: format!("host_{}", i),
            speed: rng.gen_range(1e9..1e10),
            cores: rng.gen_range(1..8),
            memory: rng.gen_range(1024..4096),
            link,
        });
    }
    platform
}

fn run(
    dag: TaskGraph,
    platform: PlatformConfig,
    config: SchedulerConfig,
) -> Rc<RefCell<ActivityRunner>> {
    init_logger();
    let mut sim = ActivitySimulation::new(platform, config);
    let runner = sim.init(dag).unwrap();
    sim.step_until_no_events();
    assert!(runner.borrow().is_completed());
    runner
}

fn run_on(
    dag: TaskGraph,
    topology: Topology,
    task_policy: u32,
    resource_policy: u32,
    seed: u64,
) -> Rc<RefCell<ActivityRunner>> {
    let config = SchedulerConfig::new(task_policy, resource_policy, seed, &topology.platform.storage)
        .with_link_speed(topology.link_speed);
    run(dag, topology.platform, config)
}

fn scheduled(trace: &TraceLog) -> Vec<(f64, String, String)> {
    trace
        .events
        .iter()
        .filter_map(|e| match e {
            Event::TaskScheduled {
                time,
                task_name,
                location,
                ..
            } => Some((*time, task_name.clone(), location.clone())),
            _ => None,
        })
        .collect()
}

fn completion_times(trace: &TraceLog) -> HashMap<usize, f64> {
    trace
        .events
        .iter()
        .filter_map(|e| match e {
            Event::TaskCompleted { time, task_id, .. } => Some((*task_id, *time)),
            _ => None,
        })
        .collect()
}

#[test]
fn highest_flops_go_to_fastest_worker() {
    let specs = [1e12, 5e12, 3e12]
        .iter()
        .map(|&flops| TaskSpec {
            input: 1.,
            flops,
            output: 1.,
        })
        .collect::<Vec<_>>();
    let runner = run_on(bag_of_tasks(&specs).unwrap(), star(&default_workers()).unwrap(), 1, 1, 0);
    let runner = runner.borrow();
    let first_round = scheduled(runner.trace_log())
        .into_iter()
        .filter(|(time, _, _)| *time == 0.)
        .map(|(_, task, location)| (task, location))
        .collect::<Vec<_>>();
    assert_eq!(
        first_round,
        vec![
            ("task1".to_string(), "worker_one".to_string()),
            ("task2".to_string(), "worker_zero".to_string()),
            ("task0".to_string(), "worker_two".to_string()),
        ]
    );
}

#[test]
fn fork_join_waits_for_all_branches() {
    let topology = cluster(&ClusterSpec {
        hosts: 2,
        cores_per_host: 4,
        bandwidth: 100.,
    })
    .unwrap();
    let runner = run_on(fork_join(), topology, 0, 0, 7);
    let runner = runner.borrow();
    let completed = completion_times(runner.trace_log());
    let last_branch = (1..=FORK_JOIN_WIDTH).map(|t| completed[&t]).fold(0., f64::max);
    let (join_start, _, _) = scheduled(runner.trace_log())
        .into_iter()
        .find(|(_, task, _)| task == "final")
        .unwrap();
    assert_eq!(join_start, last_branch);
    assert!(completed[&0] > last_branch);
    assert_eq!(runner.run_stats().makespan, completed[&0]);
    // 32 GB hosts fit four 8 GB branches each
    assert!(runner.run_stats().max_used_cores <= 8);
    assert!(runner.run_stats().max_used_memory <= 64_000_000_000);
}

#[test]
fn earliest_completion_prefers_well_connected_worker() {
    let workers = vec![
        WorkerSpec::new("fast", 1000., 1.),
        WorkerSpec::new("connected", 100., 1000.),
    ];
    let specs = vec![TaskSpec {
        input: 100.,
        flops: 1e12,
        output: 1.,
    }];
    let runner = run_on(bag_of_tasks(&specs).unwrap(), star(&workers).unwrap(), 1, 4, 0);
    let runner = runner.borrow();
    assert_eq!(scheduled(runner.trace_log())[0].2, "connected");
    // links carry 1000 MB/s / 0.97
    assert_float_eq(runner.run_stats().makespan, 0.097 + 10. + 0.00097, 1e-9);

    let runner = run_on(bag_of_tasks(&specs).unwrap(), star(&workers).unwrap(), 1, 1, 0);
    assert_eq!(scheduled(runner.borrow().trace_log())[0].2, "fast");
}

#[test]
fn random_policies_are_reproducible() {
    let mut rng = Pcg64::seed_from_u64(3);
    let dag = gen_dag(&mut rng, 50, 100);
    let platform = gen_platform(&mut rng, 4, false);
    let trace = |seed| {
        let runner = run(dag.clone(), platform.clone(), SchedulerConfig::new(0, 0, seed, "storage"));
        let events = serde_json::to_string(&runner.borrow().trace_log().events).unwrap();
        events
    };
    assert_eq!(trace(11), trace(11));
}

#[test]
fn capacity_is_never_exceeded() {
    let mut rng = Pcg64::seed_from_u64(5);
    for shared_link in [false, true] {
        let dag = gen_dag(&mut rng, 100, 200);
        let platform = gen_platform(&mut rng, 5, shared_link);
        let runner = run(dag, platform.clone(), SchedulerConfig::new(5, 3, 0, "storage"));
        let runner = runner.borrow();
        for (peak, host) in runner.trace_log().peak_cores().iter().zip(platform.hosts.iter()) {
            assert!(*peak <= host.cores, "{} uses {} of {} cores", host.name, peak, host.cores);
        }
    }
}

#[test]
fn all_policy_pairs_complete_random_dags() {
    let mut rng = Pcg64::seed_from_u64(1);
    let dag = gen_dag(&mut rng, 30, 60);
    let platform = gen_platform(&mut rng, 3, true);
    for task_policy in 0..7 {
        for resource_policy in 0..5 {
            let config = SchedulerConfig::new(task_policy, resource_policy, 123, "storage");
            let runner = run(dag.clone(), platform.clone(), config);
            let runner = runner.borrow();
            let readiness = runner.controller().readiness();
            assert_eq!(readiness.count(TaskState::Completed), dag.task_count());
            assert_eq!(runner.run_stats().completion_times.len(), dag.task_count());
            assert!(runner.run_stats().makespan > 0.);
        }
    }
}

#[test]
fn tasks_start_after_their_inputs_are_produced() {
    let mut rng = Pcg64::seed_from_u64(9);
    let dag = gen_dag(&mut rng, 80, 160);
    let platform = gen_platform(&mut rng, 4, false);
    let runner = run(dag.clone(), platform, SchedulerConfig::new(0, 4, 1, "storage"));
    let runner = runner.borrow();
    let completed = completion_times(runner.trace_log());
    let mut scheduled_count = vec![0; dag.task_count()];
    for event in runner.trace_log().events.iter() {
        if let Event::TaskScheduled { time, task_id, .. } = event {
            scheduled_count[*task_id] += 1;
            for &file in dag.get_task(*task_id).inputs.iter() {
                if let Some(producer) = dag.get_file(file).producer {
                    assert!(completed[&producer] <= *time);
                }
            }
            assert!(completed[task_id] > *time);
        }
    }
    assert!(scheduled_count.iter().all(|&c| c == 1));
}

#[test]
fn experiment_averages_over_seeds() {
    let specs = vec![
        TaskSpec {
            input: 10.,
            flops: 1e11,
            output: 10.,
        };
        6
    ];
    let topology = star(&default_workers()).unwrap();
    let setup = RunSetup {
        dag: bag_of_tasks(&specs).unwrap(),
        scheduler: SchedulerConfig::new(1, 2, 10, MASTER_HOST).with_link_speed(topology.link_speed),
        platform: topology.platform,
    };
    let results = Experiment::new(setup, 4).run(2).unwrap();
    assert_eq!(results.iter().map(|r| r.seed).collect::<Vec<_>>(), vec![10, 11, 12, 13]);
    // deterministic policies do not depend on the seed
    assert!(results.iter().all(|r| r.makespan == results[0].makespan));
    assert_eq!(average_makespan(&results), results[0].makespan);
}

#[test]
fn configuration_errors_are_reported_before_start() {
    let dag = bag_of_tasks(&[TaskSpec {
        input: 1.,
        flops: 1.,
        output: 1.,
    }])
    .unwrap();
    let topology = star(&default_workers()).unwrap();
    let mut sim = ActivitySimulation::new(topology.platform.clone(), SchedulerConfig::new(7, 0, 0, MASTER_HOST));
    assert!(matches!(sim.init(dag.clone()), Err(ActivityError::InvalidTaskPolicy(7))));
    let mut sim = ActivitySimulation::new(topology.platform.clone(), SchedulerConfig::new(0, 5, 0, MASTER_HOST));
    assert!(matches!(sim.init(dag.clone()), Err(ActivityError::InvalidResourcePolicy(5))));

    let mut large = TaskGraph::new();
    large.add_task("large", 1., 0, 2, 2, 1.);
    let mut sim = ActivitySimulation::new(topology.platform, SchedulerConfig::new(0, 0, 0, MASTER_HOST));
    assert!(matches!(sim.init(large), Err(ActivityError::Unschedulable { .. })));
    assert_eq!(sim.event_count(), 0);
}
