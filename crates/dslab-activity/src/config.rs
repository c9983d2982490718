//! Run configuration.

use std::collections::HashSet;
use std::convert::TryFrom;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{ActivityError, Result};
use crate::policy::{ResourcePolicy, TaskPolicy};
use crate::resource::Resource;

pub const MB: f64 = 1e6;
pub const GB: f64 = 1e9;
pub const GFLOP: f64 = 1e9;

/// Maximum number of tasks in a bag-of-tasks workload.
pub const MAX_NUM_TASKS: usize = 100;
/// Maximum task input size in MB.
pub const MAX_TASK_INPUT: f64 = 1e6;
/// Maximum task output size in MB.
pub const MAX_TASK_OUTPUT: f64 = 1e6;
/// Maximum task computation amount in flops.
pub const MAX_TASK_FLOP: f64 = 1e15;
/// Fraction of the physical link bandwidth available to transfers.
pub const LINK_EFFICIENCY: f64 = 0.97;

/// Scheduler parameters: policy codes, random seed and the link speeds seen by the policies.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub task_policy: u32,
    pub resource_policy: u32,
    pub seed: u64,
    /// Name of the storage host.
    pub storage: String,
    /// Bandwidth in bytes/s of the link between each resource and the storage.
    /// Resources missing here use the bandwidth of their platform link.
    #[serde(default)]
    pub link_speed: IndexMap<String, f64>,
}

impl SchedulerConfig {
    pub fn new(task_policy: u32, resource_policy: u32, seed: u64, storage: &str) -> Self {
        Self {
            task_policy,
            resource_policy,
            seed,
            storage: storage.to_string(),
            link_speed: IndexMap::new(),
        }
    }

    pub fn with_link_speed(mut self, link_speed: IndexMap<String, f64>) -> Self {
        self.link_speed = link_speed;
        self
    }

    /// Same configuration with another seed.
    pub fn with_seed(&self, seed: u64) -> Self {
        Self { seed, ..self.clone() }
    }

    /// Converts policy codes into policies.
    pub fn policies(&self) -> Result<(TaskPolicy, ResourcePolicy)> {
        Ok((
            TaskPolicy::try_from(self.task_policy)?,
            ResourcePolicy::try_from(self.resource_policy)?,
        ))
    }

    pub fn validate(&self) -> Result<()> {
        self.policies()?;
        for (name, &speed) in self.link_speed.iter() {
            if !(speed.is_finite() && speed > 0.) {
                return Err(ActivityError::invalid_parameter(
                    format!("link speed of {}", name),
                    format!("{} is not a positive number", speed),
                ));
            }
        }
        Ok(())
    }
}

/// Compute host of the platform.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HostConfig {
    pub name: String,
    /// Per-core speed in flop/s.
    pub speed: f64,
    pub cores: u32,
    /// Memory in bytes.
    pub memory: u64,
    /// Name of the link connecting the host to the storage.
    pub link: String,
}

/// Network link between compute hosts and the storage.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LinkConfig {
    pub name: String,
    /// Bandwidth in bytes/s shared by all concurrent transfers.
    pub bandwidth: f64,
    /// Latency in seconds added to every transfer.
    pub latency: f64,
}

/// Execution platform: a storage host connected to compute hosts through links.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlatformConfig {
    pub storage: String,
    pub hosts: Vec<HostConfig>,
    pub links: Vec<LinkConfig>,
}

impl PlatformConfig {
    /// Returns the link of the given host.
    pub fn host_link(&self, host: &HostConfig) -> Option<&LinkConfig> {
        self.links.iter().find(|l| l.name == host.link)
    }

    /// Scheduler-side view of the hosts, in the same order, with the bandwidth of their links.
    pub fn resources(&self) -> Vec<Resource> {
        self.hosts
            .iter()
            .map(|host| {
                let bandwidth = self.host_link(host).map_or(0., |l| l.bandwidth);
                Resource::new(&host.name, host.speed, host.cores, host.memory, bandwidth)
            })
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.hosts.is_empty() {
            return Err(ActivityError::EmptyPlatform);
        }
        let mut names = HashSet::new();
        for link in self.links.iter() {
            if !(link.bandwidth.is_finite() && link.bandwidth > 0.) {
                return Err(ActivityError::invalid_parameter(
                    format!("bandwidth of link {}", link.name),
                    format!("{} is not a positive number", link.bandwidth),
                ));
            }
            if !(link.latency.is_finite() && link.latency >= 0.) {
                return Err(ActivityError::invalid_parameter(
                    format!("latency of link {}", link.name),
                    format!("{} is negative", link.latency),
                ));
            }
        }
        for host in self.hosts.iter() {
            if !names.insert(host.name.as_str()) || host.name == self.storage {
                return Err(ActivityError::invalid_parameter(
                    "host name",
                    format!("{} is used twice", host.name),
                ));
            }
            if !(host.speed.is_finite() && host.speed > 0.) {
                return Err(ActivityError::invalid_parameter(
                    format!("speed of {}", host.name),
                    format!("{} is not a positive number", host.speed),
                ));
            }
            if host.cores == 0 {
                return Err(ActivityError::invalid_parameter(
                    format!("cores of {}", host.name),
                    "host must have at least one core",
                ));
            }
            if self.host_link(host).is_none() {
                return Err(ActivityError::invalid_parameter(
                    format!("link of {}", host.name),
                    format!("unknown link {}", host.link),
                ));
            }
        }
        Ok(())
    }
}

/// Task of a bag-of-tasks workload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Input size in MB.
    pub input: f64,
    /// Computation amount in flops.
    pub flops: f64,
    /// Output size in MB.
    pub output: f64,
}

impl TaskSpec {
    pub fn validate(&self) -> Result<()> {
        if !(1. ..=MAX_TASK_INPUT).contains(&self.input) {
            return Err(ActivityError::invalid_parameter(
                "task input",
                format!("{} is outside of the range [1, {}] MB", self.input, MAX_TASK_INPUT),
            ));
        }
        if !(1. ..=MAX_TASK_FLOP).contains(&self.flops) {
            return Err(ActivityError::invalid_parameter(
                "task flops",
                format!("{} is outside of the range [1, {:e}]", self.flops, MAX_TASK_FLOP),
            ));
        }
        if !(1. ..=MAX_TASK_OUTPUT).contains(&self.output) {
            return Err(ActivityError::invalid_parameter(
                "task output",
                format!("{} is outside of the range [1, {}] MB", self.output, MAX_TASK_OUTPUT),
            ));
        }
        Ok(())
    }
}

/// Worker of a master-worker platform.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkerSpec {
    pub name: String,
    /// Speed in Gflop/s.
    pub gflops: f64,
    /// Effective bandwidth of the link to the master in MB/s.
    pub bandwidth: f64,
}

impl WorkerSpec {
    pub fn new(name: &str, gflops: f64, bandwidth: f64) -> Self {
        Self {
            name: name.to_string(),
            gflops,
            bandwidth,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(ActivityError::invalid_parameter("worker name", "name is empty"));
        }
        if !(self.gflops.is_finite() && self.gflops > 0.) {
            return Err(ActivityError::invalid_parameter(
                format!("speed of worker {}", self.name),
                format!("{} is not a positive number", self.gflops),
            ));
        }
        if !(self.bandwidth.is_finite() && self.bandwidth > 0.) {
            return Err(ActivityError::invalid_parameter(
                format!("bandwidth of worker {}", self.name),
                format!("{} is not a positive number", self.bandwidth),
            ));
        }
        Ok(())
    }
}

/// Cluster platform behind a shared wide-area link.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClusterSpec {
    pub hosts: u32,
    pub cores_per_host: u32,
    /// Effective wide-area bandwidth in MB/s.
    pub bandwidth: f64,
}

impl ClusterSpec {
    pub fn validate(&self) -> Result<()> {
        if self.hosts < 1 {
            return Err(ActivityError::invalid_parameter(
                "number of hosts",
                "must be at least 1",
            ));
        }
        if self.cores_per_host < 1 {
            return Err(ActivityError::invalid_parameter(
                "number of cores per host",
                "must be at least 1",
            ));
        }
        if !(self.bandwidth.is_finite() && self.bandwidth >= 1.) {
            return Err(ActivityError::invalid_parameter(
                "network bandwidth",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}
