//! Platform topologies.

use std::collections::HashSet;

use indexmap::IndexMap;

use crate::config::{ClusterSpec, HostConfig, LinkConfig, PlatformConfig, WorkerSpec, GFLOP, LINK_EFFICIENCY, MB};
use crate::error::{ActivityError, Result};

pub const MASTER_HOST: &str = "master";
pub const STORAGE_HOST: &str = "storage.edu";
/// Memory of every compute host in bytes.
pub const HOST_MEMORY: u64 = 32_000_000_000;
/// Per-core speed of cluster hosts in flop/s.
pub const CLUSTER_CORE_SPEED: f64 = 100. * GFLOP;
/// Latency of the wide-area link in seconds.
pub const WIDE_AREA_LATENCY: f64 = 0.01;

/// Platform together with the nominal link speeds used by the scheduling policies.
#[derive(Clone, Debug)]
pub struct Topology {
    pub platform: PlatformConfig,
    /// Effective bandwidth in bytes/s between each host and the storage.
    pub link_speed: IndexMap<String, f64>,
}

/// Workers used when none are given explicitly.
pub fn default_workers() -> Vec<WorkerSpec> {
    vec![
        WorkerSpec::new("worker_zero", 500., 1000.),
        WorkerSpec::new("worker_one", 1000., 10000.),
        WorkerSpec::new("worker_two", 100., 100000.),
    ]
}

fn physical_bandwidth(effective_mbps: f64) -> f64 {
    effective_mbps * MB / LINK_EFFICIENCY
}

/// Star of single-core workers, each with a dedicated link to the master which holds the files.
pub fn star(workers: &[WorkerSpec]) -> Result<Topology> {
    if workers.is_empty() {
        return Err(ActivityError::EmptyPlatform);
    }
    let mut names = HashSet::new();
    let mut platform = PlatformConfig {
        storage: MASTER_HOST.to_string(),
        hosts: Vec::with_capacity(workers.len()),
        links: Vec::with_capacity(workers.len()),
    };
    let mut link_speed = IndexMap::new();
    for worker in workers.iter() {
        worker.validate()?;
        if !names.insert(worker.name.as_str()) {
            return Err(ActivityError::invalid_parameter(
                "worker name",
                format!("{} is used twice", worker.name),
            ));
        }
        let link = format!("link_{}", worker.name);
        platform.links.push(LinkConfig {
            name: link.clone(),
            bandwidth: physical_bandwidth(worker.bandwidth),
            latency: 0.,
        });
        platform.hosts.push(HostConfig {
            name: worker.name.clone(),
            speed: worker.gflops * GFLOP,
            cores: 1,
            memory: HOST_MEMORY,
            link,
        });
        link_speed.insert(worker.name.clone(), worker.bandwidth * MB);
    }
    platform.validate()?;
    Ok(Topology { platform, link_speed })
}

/// Cluster of identical hosts `hpc_<i>.edu` reaching the storage over one shared wide-area link.
pub fn cluster(spec: &ClusterSpec) -> Result<Topology> {
    spec.validate()?;
    let link = "wide_area".to_string();
    let mut platform = PlatformConfig {
        storage: STORAGE_HOST.to_string(),
        hosts: Vec::with_capacity(spec.hosts as usize),
        links: vec![LinkConfig {
            name: link.clone(),
            bandwidth: physical_bandwidth(spec.bandwidth),
            latency: WIDE_AREA_LATENCY,
        }],
    };
    let mut link_speed = IndexMap::new();
    for i in 1..=spec.hosts {
        let name = format!("hpc_{}.edu", i);
        platform.hosts.push(HostConfig {
            name: name.clone(),
            speed: CLUSTER_CORE_SPEED,
            cores: spec.cores_per_host,
            memory: HOST_MEMORY,
            link: link.clone(),
        });
        link_speed.insert(name, spec.bandwidth * MB);
    }
    platform.validate()?;
    Ok(Topology { platform, link_speed })
}
