use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};

/// Per-information-set regret and strategy-sum accumulator.
///
/// Accumulators (`regret_sum`, `strategy`, `strategy_sum`) use `f64` to
/// tolerate long runs (>=10^7 iterations) without losing precision; the
/// persisted `average_strategy` is kept at `f32`, the precision actually
/// written to disk.
pub struct InfoSetNode {
    num_actions: usize,
    regret_sum: Array1<f64>,
    strategy: Array1<f64>,
    strategy_sum: Array1<f64>,
    average_strategy: Array1<f32>,
    dirty: bool,
}

impl InfoSetNode {
    pub fn new(num_actions: usize) -> Self {
        assert!(num_actions >= 1, "a node must have at least one action");
        Self {
            num_actions,
            regret_sum: Array1::zeros(num_actions),
            strategy: Array1::zeros(num_actions),
            strategy_sum: Array1::zeros(num_actions),
            average_strategy: Array1::zeros(num_actions),
            dirty: true,
        }
    }

    /// Build a read-only node from a persisted average strategy. All other
    /// accumulators are zeroed and the dirty flag is cleared, per the
    /// serialization contract.
    pub fn from_average_strategy(average_strategy: Vec<f32>) -> Self {
        let num_actions = average_strategy.len();
        Self {
            num_actions,
            regret_sum: Array1::zeros(num_actions),
            strategy: Array1::zeros(num_actions),
            strategy_sum: Array1::zeros(num_actions),
            average_strategy: Array1::from_vec(average_strategy),
            dirty: false,
        }
    }

    pub fn num_actions(&self) -> usize {
        self.num_actions
    }

    /// Regret-matching: `p[a] = max(regretSum[a], 0)`, normalized; uniform if
    /// the positive part sums to zero.
    pub fn current_strategy(&mut self) -> ArrayView1<f64> {
        let mut normalizing_sum = 0.0f64;
        for a in 0..self.num_actions {
            self.strategy[a] = self.regret_sum[a].max(0.0);
            normalizing_sum += self.strategy[a];
        }
        for a in 0..self.num_actions {
            self.strategy[a] = if normalizing_sum > 0.0 {
                self.strategy[a] / normalizing_sum
            } else {
                1.0 / self.num_actions as f64
            };
        }
        self.strategy.view()
    }

    /// `strategySum[a] += weight * strategy[a]` for all `a`; marks dirty.
    pub fn accumulate_strategy(&mut self, strategy: ArrayView1<f64>, weight: f64) {
        for a in 0..self.num_actions {
            self.strategy_sum[a] += weight * strategy[a];
        }
        self.dirty = true;
    }

    /// Recompute (if dirty) and return the normalized average strategy.
    /// Uniform, never NaN/Inf, when the strategy sum is all zero.
    pub fn average_strategy(&mut self) -> ArrayView1<f32> {
        if self.dirty {
            let normalizing_sum: f64 = self.strategy_sum.sum();
            for a in 0..self.num_actions {
                self.average_strategy[a] = if normalizing_sum > 0.0 {
                    (self.strategy_sum[a] / normalizing_sum) as f32
                } else {
                    1.0 / self.num_actions as f32
                };
            }
            self.dirty = false;
        }
        self.average_strategy.view()
    }

    pub fn get_regret(&self, action: usize) -> f64 {
        self.regret_sum[action]
    }

    pub fn set_regret(&mut self, action: usize, value: f64) {
        self.regret_sum[action] = value;
    }

    /// Byte-serializable view of the persisted average strategy, used by the
    /// strategy-file writer. Forces a recompute if dirty.
    pub fn persisted_average_strategy(&mut self) -> Vec<f32> {
        self.average_strategy().to_vec()
    }

    /// Read the average strategy without recomputing, widened to `f64`.
    /// Only meaningful for nodes loaded via [`Self::from_average_strategy`],
    /// where the cache is never dirty; used by fixed-opponent lookups, which
    /// only ever hold such nodes.
    pub fn peek_average_strategy(&self) -> Vec<f64> {
        self.average_strategy.iter().map(|&x| x as f64).collect()
    }
}

/// On-disk representation of one entry of the strategy file: the info-set
/// key and its averaged mixed strategy. Only this is ever written or read;
/// regrets and strategy sums never leave the trainer.
#[derive(Serialize, Deserialize)]
pub struct PersistedEntry {
    pub key: Vec<u8>,
    pub average_strategy: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sum_to_one(v: ArrayView1<f64>) -> bool {
        (v.sum() - 1.0).abs() < 1e-6 && v.iter().all(|&x| x >= 0.0)
    }

    #[test]
    fn fresh_node_is_uniform() {
        let mut node = InfoSetNode::new(3);
        let strat = node.current_strategy().to_owned();
        assert!(sum_to_one(strat.view()));
        assert!(strat.iter().all(|&p| (p - 1.0 / 3.0).abs() < 1e-9));
    }

    #[test]
    fn regret_matching_prefers_positive_regret() {
        let mut node = InfoSetNode::new(2);
        node.set_regret(0, 3.0);
        node.set_regret(1, -1.0);
        let strat = node.current_strategy();
        assert!((strat[0] - 1.0).abs() < 1e-9);
        assert!(strat[1].abs() < 1e-9);
    }

    #[test]
    fn average_strategy_uniform_when_sum_zero() {
        let mut node = InfoSetNode::new(4);
        let avg = node.average_strategy();
        for &p in avg.iter() {
            assert!((p - 0.25).abs() < 1e-6);
        }
    }

    #[test]
    fn average_strategy_tracks_accumulation() {
        let mut node = InfoSetNode::new(2);
        let strat = Array1::from_vec(vec![0.25, 0.75]);
        node.accumulate_strategy(strat.view(), 2.0);
        node.accumulate_strategy(strat.view(), 2.0);
        let avg = node.average_strategy();
        assert!((avg[0] - 0.25).abs() < 1e-5);
        assert!((avg[1] - 0.75).abs() < 1e-5);
    }

    #[test]
    fn round_trip_average_strategy_only() {
        let mut node = InfoSetNode::new(2);
        node.set_regret(0, 5.0);
        node.current_strategy();
        node.accumulate_strategy(Array1::from_vec(vec![1.0, 0.0]).view(), 1.0);
        let persisted = node.persisted_average_strategy();

        let mut reloaded = InfoSetNode::from_average_strategy(persisted.clone());
        assert_eq!(reloaded.average_strategy().to_vec(), persisted);
        assert_eq!(reloaded.get_regret(0), 0.0);
    }
}
