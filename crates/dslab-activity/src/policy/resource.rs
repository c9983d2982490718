//! Resource selection policies.

use std::convert::TryFrom;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use strum_macros::{Display, EnumIter};

use crate::dag::TaskGraph;
use crate::error::ActivityError;
use crate::policy::{best_by, Rank};

/// Eligible resource as seen by a [`ResourcePolicy`].
#[derive(Clone, Debug)]
pub struct ResourceCandidate {
    pub id: usize,
    /// Per-core processing rate in flop/s.
    pub speed: f64,
    /// Bandwidth of the link to the storage in bytes/s.
    pub bandwidth: f64,
    /// Number of cores the task would get on this resource.
    pub cores: u32,
}

/// Strategy for picking a resource for the selected task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, EnumIter, Serialize)]
pub enum ResourcePolicy {
    #[strum(serialize = "Random")]
    Random,
    #[strum(serialize = "Faster Worker(Flops) First")]
    FastestWorker,
    #[strum(serialize = "Best Connected Worker(Bandwidth) First")]
    BestConnected,
    #[strum(serialize = "Largest Compute Time/IO Time Ratio First")]
    LargestComputeIoRatio,
    #[strum(serialize = "Earliest Completion (Estimate) First")]
    EarliestCompletion,
}

impl TryFrom<u32> for ResourcePolicy {
    type Error = ActivityError;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Random),
            1 => Ok(Self::FastestWorker),
            2 => Ok(Self::BestConnected),
            3 => Ok(Self::LargestComputeIoRatio),
            4 => Ok(Self::EarliestCompletion),
            _ => Err(ActivityError::InvalidResourcePolicy(code)),
        }
    }
}

/// Time to compute the task on the candidate with its allotted cores.
pub fn compute_time(dag: &TaskGraph, task_id: usize, candidate: &ResourceCandidate) -> f64 {
    let task = dag.get_task(task_id);
    task.flops / (candidate.speed * task.speedup(candidate.cores))
}

/// Estimated completion time of the task started at `now` on the candidate:
/// stage-in, computation and stage-out performed one after another.
pub fn completion_estimate(dag: &TaskGraph, task_id: usize, candidate: &ResourceCandidate, now: f64) -> f64 {
    now + dag.input_size(task_id) / candidate.bandwidth
        + compute_time(dag, task_id, candidate)
        + dag.output_size(task_id) / candidate.bandwidth
}

fn compute_io_ratio(dag: &TaskGraph, task_id: usize, candidate: &ResourceCandidate) -> f64 {
    let io_time = dag.total_io(task_id) / candidate.bandwidth;
    if io_time > 0. {
        compute_time(dag, task_id, candidate) / io_time
    } else {
        f64::INFINITY
    }
}

impl ResourcePolicy {
    /// Integer code of the policy as accepted on the command line.
    pub fn code(&self) -> u32 {
        *self as u32
    }

    /// Picks a resource for the task among eligible `candidates` and returns its id.
    /// Returns `None` only if there are no candidates.
    ///
    /// Ties are broken by the smallest resource id.
    pub fn select<R: Rng>(
        &self,
        task_id: usize,
        candidates: &[ResourceCandidate],
        dag: &TaskGraph,
        now: f64,
        rng: &mut R,
    ) -> Option<usize> {
        let id = |c: &ResourceCandidate| c.id;
        match self {
            Self::Random => candidates.choose(rng),
            Self::FastestWorker => best_by(candidates, id, |c| c.speed, Rank::Highest),
            Self::BestConnected => best_by(candidates, id, |c| c.bandwidth, Rank::Highest),
            Self::LargestComputeIoRatio => {
                best_by(candidates, id, |c| compute_io_ratio(dag, task_id, c), Rank::Highest)
            }
            Self::EarliestCompletion => best_by(
                candidates,
                id,
                |c| completion_estimate(dag, task_id, c, now),
                Rank::Lowest,
            ),
        }
        .map(|c| c.id)
    }
}
