//! Task selection policies.

use std::convert::TryFrom;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use strum_macros::{Display, EnumIter};

use crate::dag::TaskGraph;
use crate::error::ActivityError;
use crate::policy::{best_by, Rank};

/// Strategy for picking the next task to dispatch from the ready set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, EnumIter, Serialize)]
pub enum TaskPolicy {
    #[strum(serialize = "Random")]
    Random,
    #[strum(serialize = "Highest Flop First")]
    HighestFlops,
    #[strum(serialize = "Lowest Flop First")]
    LowestFlops,
    #[strum(serialize = "Highest Bytes First")]
    HighestBytes,
    #[strum(serialize = "Lowest Bytes First")]
    LowestBytes,
    #[strum(serialize = "Highest Flops/Bytes First")]
    HighestFlopsPerByte,
    #[strum(serialize = "Lowest Flops/Bytes First")]
    LowestFlopsPerByte,
}

impl TryFrom<u32> for TaskPolicy {
    type Error = ActivityError;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Random),
            1 => Ok(Self::HighestFlops),
            2 => Ok(Self::LowestFlops),
            3 => Ok(Self::HighestBytes),
            4 => Ok(Self::LowestBytes),
            5 => Ok(Self::HighestFlopsPerByte),
            6 => Ok(Self::LowestFlopsPerByte),
            _ => Err(ActivityError::InvalidTaskPolicy(code)),
        }
    }
}

/// Computation amount per byte of I/O, infinite for tasks without I/O.
pub fn flops_per_byte(dag: &TaskGraph, task_id: usize) -> f64 {
    let io = dag.total_io(task_id);
    if io > 0. {
        dag.get_task(task_id).flops / io
    } else {
        f64::INFINITY
    }
}

impl TaskPolicy {
    /// Integer code of the policy as accepted on the command line.
    pub fn code(&self) -> u32 {
        *self as u32
    }

    /// Picks one task among `candidates`. Returns `None` only if there are no candidates.
    ///
    /// Deterministic policies pick the task with the extreme metric value and break ties by the
    /// smallest task id. The random source is consumed only by [`TaskPolicy::Random`].
    pub fn select<R: Rng>(&self, candidates: &[usize], dag: &TaskGraph, rng: &mut R) -> Option<usize> {
        let flops = |&t: &usize| dag.get_task(t).flops;
        let bytes = |&t: &usize| dag.total_io(t);
        let ratio = |&t: &usize| flops_per_byte(dag, t);
        let id = |&t: &usize| t;
        match self {
            Self::Random => candidates.choose(rng),
            Self::HighestFlops => best_by(candidates, id, flops, Rank::Highest),
            Self::LowestFlops => best_by(candidates, id, flops, Rank::Lowest),
            Self::HighestBytes => best_by(candidates, id, bytes, Rank::Highest),
            Self::LowestBytes => best_by(candidates, id, bytes, Rank::Lowest),
            Self::HighestFlopsPerByte => best_by(candidates, id, ratio, Rank::Highest),
            Self::LowestFlopsPerByte => best_by(candidates, id, ratio, Rank::Lowest),
        }
        .copied()
    }
}
