//! Task and resource selection policies.

pub mod resource;
pub mod task;

use itertools::Itertools;
use strum::IntoEnumIterator;

pub use resource::{ResourceCandidate, ResourcePolicy};
pub use task::TaskPolicy;

/// Lists the codes and names of all policies, one policy kind per line.
pub fn describe_policies() -> String {
    format!(
        "task policies (--ts): {}\nresource policies (--cs): {}",
        TaskPolicy::iter().map(|p| format!("{} - {}", p.code(), p)).join(", "),
        ResourcePolicy::iter().map(|p| format!("{} - {}", p.code(), p)).join(", ")
    )
}

/// Direction in which a policy ranks its metric.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Rank {
    Highest,
    Lowest,
}

/// Returns the item with the best metric value, breaking ties by the smallest id.
///
/// Ranking is a total order over `(metric, id)`, so the result does not depend on the order of `items`.
pub(crate) fn best_by<T, I, M>(items: &[T], id: I, metric: M, rank: Rank) -> Option<&T>
where
    I: Fn(&T) -> usize,
    M: Fn(&T) -> f64,
{
    items.iter().min_by(|a, b| {
        let ord = metric(a).total_cmp(&metric(b));
        let ord = match rank {
            Rank::Highest => ord.reverse(),
            Rank::Lowest => ord,
        };
        ord.then(id(a).cmp(&id(b)))
    })
}

#[cfg(test)]
mod tests {
    use super::{best_by, describe_policies, Rank};

    #[test]
    fn ties_go_to_smallest_id() {
        let items = vec![(3, 5.), (1, 7.), (2, 7.), (0, 1.)];
        let best = |rank| best_by(&items, |x| x.0, |x| x.1, rank).map(|x| x.0);
        assert_eq!(best(Rank::Highest), Some(1));
        assert_eq!(best(Rank::Lowest), Some(0));
        let mut reversed = items.clone();
        reversed.reverse();
        assert_eq!(best_by(&reversed, |x| x.0, |x| x.1, Rank::Highest).map(|x| x.0), Some(1));
        assert_eq!(best_by(&Vec::<(usize, f64)>::new(), |x| x.0, |x| x.1, Rank::Lowest), None);
    }

    #[test]
    fn policies_are_listed_by_code() {
        let text = describe_policies();
        assert!(text.contains("1 - Highest Flop First"));
        assert!(text.contains("4 - Earliest Completion (Estimate) First"));
        assert_eq!(text.lines().count(), 2);
    }
}
