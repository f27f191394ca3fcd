//! Post-hoc evaluation of an arbitrary strategy profile: expected payoff
//! and exploitability via best response.

use std::collections::HashMap;

use rand::rngs::mock::StepRng;

use crate::game::{Game, GameState};

/// A per-player policy callable: given a state at that player's decision
/// node, returns a probability vector over its legal actions.
pub type StrategyFn<'a, S> = dyn Fn(&S) -> Vec<f64> + 'a;

/// Pure tree walk computing the expected payoff vector under `strategies`.
/// Terminal states return the payoff vector; chance nodes mix by
/// `chance_probability`; decision nodes mix by the acting player's callable.
pub fn expected_payoff<S: GameState>(
    state: &S,
    num_players: usize,
    strategies: &[Box<StrategyFn<S>>],
) -> Vec<f64> {
    if state.is_terminal() {
        return (0..num_players).map(|p| state.payoff(p)).collect();
    }
    if state.is_chance_node() {
        let mut total = vec![0.0; num_players];
        for a in 0..state.num_actions() {
            let child = state.step(a);
            let c = child.chance_probability();
            let child_payoff = expected_payoff(&child, num_players, strategies);
            for p in 0..num_players {
                total[p] += c * child_payoff[p];
            }
        }
        return total;
    }
    let q = state.current_player();
    let sigma = strategies[q](state);
    let mut total = vec![0.0; num_players];
    for a in 0..state.num_actions() {
        let child = state.step(a);
        let child_payoff = expected_payoff(&child, num_players, strategies);
        for p in 0..num_players {
            total[p] += sigma[a] * child_payoff[p];
        }
    }
    total
}

/// Convenience wrapper that resets `game` to its root (exposing the root
/// chance node rather than sampling it) and runs [`expected_payoff`]. No
/// randomness is consumed since the walk enumerates every chance outcome.
pub fn calculate_payoff<G: Game>(game: &G, strategies: &[Box<StrategyFn<G::State>>]) -> Vec<f64> {
    let mut unused_rng = StepRng::new(0, 0);
    let root = game.reset(&mut unused_rng, false);
    expected_payoff(&root, game.num_players(), strategies)
}

/// Per-info-set list of `(state, opponent reach)` pairs collected while
/// walking the tree for a fixed responding player.
type InfoSetIndex<S> = HashMap<Vec<u8>, Vec<(S, f64)>>;

fn build_index<S: GameState>(
    state: &S,
    reach_others: f64,
    responder: usize,
    strategies: &[Box<StrategyFn<S>>],
    index: &mut InfoSetIndex<S>,
) {
    if state.is_terminal() {
        return;
    }
    if state.is_chance_node() {
        for a in 0..state.num_actions() {
            let child = state.step(a);
            let c = child.chance_probability();
            build_index(&child, reach_others * c, responder, strategies, index);
        }
        return;
    }

    let q = state.current_player();
    if q == responder {
        index
            .entry(state.info_set_key())
            .or_default()
            .push((state.clone(), reach_others));
        for a in 0..state.num_actions() {
            let child = state.step(a);
            build_index(&child, reach_others, responder, strategies, index);
        }
    } else {
        let sigma = strategies[q](state);
        for a in 0..state.num_actions() {
            let child = state.step(a);
            build_index(&child, reach_others * sigma[a], responder, strategies, index);
        }
    }
}

fn best_response_eval<S: GameState>(
    state: &S,
    responder: usize,
    strategies: &[Box<StrategyFn<S>>],
    index: &InfoSetIndex<S>,
    memo: &mut HashMap<Vec<u8>, usize>,
) -> f64 {
    if state.is_terminal() {
        return state.payoff(responder);
    }
    if state.is_chance_node() {
        let mut total = 0.0;
        for a in 0..state.num_actions() {
            let child = state.step(a);
            total += child.chance_probability()
                * best_response_eval(&child, responder, strategies, index, memo);
        }
        return total;
    }

    let q = state.current_player();
    if q != responder {
        let sigma = strategies[q](state);
        let mut total = 0.0;
        for a in 0..state.num_actions() {
            let child = state.step(a);
            total += sigma[a] * best_response_eval(&child, responder, strategies, index, memo);
        }
        return total;
    }

    let key = state.info_set_key();
    if !memo.contains_key(&key) {
        let mut best_action = 0usize;
        let mut best_value = f64::NEG_INFINITY;
        for a in 0..state.num_actions() {
            let mut value = 0.0;
            if let Some(occurrences) = index.get(&key) {
                for (g, w) in occurrences {
                    let child = g.step(a);
                    value += w * best_response_eval(&child, responder, strategies, index, memo);
                }
            }
            if value > best_value {
                best_value = value;
                best_action = a;
            }
        }
        memo.insert(key.clone(), best_action);
    }
    let action = memo[&key];
    let child = state.step(action);
    best_response_eval(&child, responder, strategies, index, memo)
}

/// Best-response value for `responder` against `strategies`, computed over
/// the whole game tree from `game`'s root.
pub fn best_response_value<G: Game>(
    game: &G,
    responder: usize,
    strategies: &[Box<StrategyFn<G::State>>],
) -> f64 {
    let mut unused_rng = StepRng::new(0, 0);
    let root = game.reset(&mut unused_rng, false);
    let mut index = InfoSetIndex::new();
    build_index(&root, 1.0, responder, strategies, &mut index);
    let mut memo = HashMap::new();
    best_response_eval(&root, responder, strategies, &index, &mut memo)
}

/// Exploitability: sum of every player's best-response value against the
/// given profile. Returned un-normalized (not divided by player count);
/// callers that want the NashConv/2 convention for two-player zero-sum games
/// can divide by 2 themselves.
pub fn exploitability<G: Game>(game: &G, strategies: &[Box<StrategyFn<G::State>>]) -> f64 {
    (0..game.num_players())
        .map(|p| best_response_value(game, p, strategies))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kuhn::{KuhnGame, KuhnState};

    fn uniform_strategy() -> Box<StrategyFn<'static, KuhnState>> {
        Box::new(|state: &KuhnState| vec![1.0 / state.num_actions() as f64; state.num_actions()])
    }

    #[test]
    fn uniform_profile_is_zero_sum() {
        let game = KuhnGame::new(2);
        let strategies: Vec<Box<StrategyFn<KuhnState>>> = vec![uniform_strategy(), uniform_strategy()];
        let payoff = calculate_payoff(&game, &strategies);
        assert_eq!(payoff.len(), 2);
        assert!((payoff[0] + payoff[1]).abs() < 1e-9);
    }

    #[test]
    fn exploitability_of_uniform_profile_is_positive() {
        let game = KuhnGame::new(2);
        let strategies: Vec<Box<StrategyFn<KuhnState>>> = vec![uniform_strategy(), uniform_strategy()];
        let value = exploitability(&game, &strategies);
        // The uniform-random profile is not an equilibrium, so some player
        // can profitably deviate.
        assert!(value > 0.0);
    }

    #[test]
    fn exploitability_nonnegative_for_always_bet() {
        let game = KuhnGame::new(2);
        let always_bet: Box<StrategyFn<KuhnState>> = Box::new(|state: &KuhnState| {
            let mut v = vec![0.0; state.num_actions()];
            v[1] = 1.0;
            v
        });
        let strategies: Vec<Box<StrategyFn<KuhnState>>> = vec![always_bet, uniform_strategy()];
        let value = exploitability(&game, &strategies);
        assert!(value >= 0.0);
    }
}
