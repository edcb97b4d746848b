use crate::scoring::PortfolioPerformance;
use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// One scored allocation. `id` is the generation index within its run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Decode, Encode)]
pub struct Trial {
    pub id: usize,
    pub weights: Vec<f64>,
    pub return_pct: f64,
    pub risk_pct: f64,
    pub sharpe_ratio: Option<f64>,
}

impl Trial {
    pub fn new(id: usize, weights: Vec<f64>, performance: PortfolioPerformance) -> Self {
        Trial {
            id,
            weights,
            return_pct: performance.return_pct,
            risk_pct: performance.risk_pct,
            sharpe_ratio: performance.sharpe_ratio,
        }
    }

    fn to_metrics_vector(&self) -> [f64; 2] {
        // We negate the risk to make maximization the global goal
        [self.return_pct, -self.risk_pct]
    }

    pub fn is_dominated_by(&self, other: &Trial) -> bool {
        let self_metrics = self.to_metrics_vector();
        let other_metrics = other.to_metrics_vector();

        let other_is_at_least_as_good_in_all = self_metrics
            .iter()
            .zip(other_metrics.iter())
            .all(|(&self_metric, &other_metric)| other_metric >= self_metric);

        let other_is_strictly_better_in_one = self_metrics
            .iter()
            .zip(other_metrics.iter())
            .any(|(&self_metric, &other_metric)| other_metric > self_metric);

        other_is_at_least_as_good_in_all && other_is_strictly_better_in_one
    }
}

/// Non-dominated trials (no other trial has higher return at no more risk),
/// ordered by increasing risk: the upper-left envelope of the cloud.
pub fn efficient_frontier(trials: &[Trial]) -> Vec<&Trial> {
    let mut by_risk: Vec<&Trial> = trials.iter().collect();
    by_risk.sort_by(|a, b| {
        a.risk_pct
            .total_cmp(&b.risk_pct)
            .then(b.return_pct.total_cmp(&a.return_pct))
    });

    // Returns increase along the frontier, so the last kept trial is the only
    // candidate that can dominate the next one.
    let mut frontier: Vec<&Trial> = Vec::new();
    for trial in by_risk {
        let dominated = frontier
            .last()
            .is_some_and(|best| trial.is_dominated_by(best));
        if !dominated {
            frontier.push(trial);
        }
    }
    frontier
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trial(id: usize, return_pct: f64, risk_pct: f64) -> Trial {
        Trial {
            id,
            weights: vec![1.0],
            return_pct,
            risk_pct,
            sharpe_ratio: Some(return_pct / risk_pct),
        }
    }

    #[test]
    fn test_dominance() {
        let a = trial(0, 10.0, 20.0);
        let better = trial(1, 12.0, 18.0);
        let same = trial(2, 10.0, 20.0);
        let tradeoff = trial(3, 14.0, 25.0);
        assert!(a.is_dominated_by(&better));
        assert!(!better.is_dominated_by(&a));
        assert!(!a.is_dominated_by(&same));
        assert!(!a.is_dominated_by(&tradeoff));
    }

    #[test]
    fn test_frontier_keeps_only_non_dominated_trials() {
        let trials = vec![
            trial(0, 5.0, 10.0),
            trial(1, 4.0, 12.0),
            trial(2, 8.0, 15.0),
            trial(3, 7.0, 15.0),
            trial(4, 9.0, 30.0),
            trial(5, 8.5, 31.0),
        ];
        let frontier: Vec<usize> = efficient_frontier(&trials).iter().map(|t| t.id).collect();
        assert_eq!(frontier, vec![0, 2, 4]);

        for kept in efficient_frontier(&trials) {
            assert!(trials.iter().all(|other| !kept.is_dominated_by(other)));
        }
    }

    #[test]
    fn test_frontier_of_empty_run_is_empty() {
        assert!(efficient_frontier(&[]).is_empty());
    }
}
