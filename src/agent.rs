use ndarray_rand::rand_distr::{Distribution, WeightedIndex};
use rand::RngCore;

use crate::error::TrainerError;
use crate::game::GameState;
use crate::table::NodeTable;

/// Wraps a persisted profile behind a sampling function, so callers can draw
/// actions from a trained policy during play or evaluation without touching
/// the underlying table directly.
pub struct Agent<'a, R: RngCore> {
    strategy: &'a NodeTable,
    rng: &'a mut R,
}

impl<'a, R: RngCore> Agent<'a, R> {
    pub fn new(strategy: &'a NodeTable, rng: &'a mut R) -> Self {
        Self { strategy, rng }
    }

    /// Sample one action from the profile's `average_strategy` at the
    /// current info set. Single-action decisions are short-circuited without
    /// consulting the profile.
    pub fn action<S: GameState>(&mut self, state: &S) -> Result<usize, TrainerError> {
        if state.num_actions() == 1 {
            return Ok(0);
        }
        let strategy = self.strategy(state)?;
        let dist = WeightedIndex::new(&strategy)
            .map_err(|e| TrainerError::ProfileMismatch(format!("invalid strategy weights: {e}")))?;
        Ok(dist.sample(self.rng))
    }

    /// The profile's probability vector at the current info set, without
    /// sampling.
    pub fn strategy<S: GameState>(&self, state: &S) -> Result<Vec<f64>, TrainerError> {
        let key = state.info_set_key();
        let node = self.strategy.get(&key).ok_or_else(|| {
            TrainerError::ProfileMismatch(format!(
                "unknown info-set key (profile/game mismatch): {key:?}"
            ))
        })?;
        Ok(node.peek_average_strategy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Game;
    use crate::kuhn::KuhnGame;
    use crate::node::InfoSetNode;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn unknown_info_set_is_profile_mismatch() {
        let table = NodeTable::new();
        let mut rng = StdRng::seed_from_u64(0);
        let mut agent = Agent::new(&table, &mut rng);

        let game = KuhnGame::new(2);
        let mut dealer_rng = StdRng::seed_from_u64(1);
        let state = game.reset(&mut dealer_rng, true);

        let err = agent.action(&state).unwrap_err();
        assert!(matches!(err, TrainerError::ProfileMismatch(_)));
    }

    #[test]
    fn single_action_short_circuits_profile() {
        let mut table = NodeTable::new();
        // Intentionally no entry for this key: a single-action node must
        // never consult the profile.
        table.insert(b"unrelated".to_vec(), InfoSetNode::from_average_strategy(vec![1.0]));
        let mut rng = StdRng::seed_from_u64(0);

        #[derive(Clone)]
        struct OneActionState;
        impl GameState for OneActionState {
            fn is_terminal(&self) -> bool {
                false
            }
            fn is_chance_node(&self) -> bool {
                false
            }
            fn current_player(&self) -> usize {
                0
            }
            fn num_actions(&self) -> usize {
                1
            }
            fn chance_probability(&self) -> f64 {
                1.0
            }
            fn payoff(&self, _player: usize) -> f64 {
                0.0
            }
            fn info_set_key(&self) -> Vec<u8> {
                b"does-not-exist".to_vec()
            }
            fn step(&self, _action: usize) -> Self {
                self.clone()
            }
        }

        let mut agent = Agent::new(&table, &mut rng);
        assert_eq!(agent.action(&OneActionState).unwrap(), 0);
    }
}
