//! N-player Kuhn poker, the one concrete [`Game`] this crate ships.
//!
//! Ported from `original_source/Game/Kuhn/Game.cpp`: the deck has
//! `num_players + 1` cards, each player antes one chip, and players act in
//! turn choosing to pass (check/fold) or bet. The "all bet" / "all fold" /
//! "one bet" / "more than two bet" terminal payoff branches are carried over
//! unchanged; two-player Kuhn only ever exercises the first three.

use rand::RngCore;

use crate::game::{Game, GameState};

/// Acting role at a [`KuhnState`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Actor {
    Chance,
    Player(usize),
}

#[derive(Clone, Debug)]
pub struct KuhnState {
    num_players: usize,
    cards: Vec<u8>,
    history: Vec<u8>,
    actor: Actor,
    chance_probability: f64,
    first_bet_turn: Option<usize>,
    bet_count: usize,
    payoff: Vec<f64>,
    done: bool,
}

fn factorial(n: usize) -> usize {
    (1..=n).product::<usize>().max(1)
}

/// Decode a permutation index into a Fisher-Yates shuffle of `0..card_num`,
/// exactly as `Game::step` does for the chance action index.
fn decode_permutation(mut action: usize, card_num: usize) -> Vec<u8> {
    let mut cards: Vec<u8> = (0..card_num as u8).collect();
    let mut c1 = cards.len();
    while c1 > 1 {
        c1 -= 1;
        let c2 = action % (c1 + 1);
        cards.swap(c1, c2);
        action /= c1 + 1;
    }
    cards
}

impl KuhnState {
    fn card_num(&self) -> usize {
        self.num_players + 1
    }

    fn chance_action_num(&self) -> usize {
        factorial(self.card_num())
    }
}

impl GameState for KuhnState {
    fn is_terminal(&self) -> bool {
        self.done
    }

    fn is_chance_node(&self) -> bool {
        matches!(self.actor, Actor::Chance)
    }

    fn current_player(&self) -> usize {
        match self.actor {
            Actor::Player(p) => p,
            Actor::Chance => panic!("current_player called on a chance node"),
        }
    }

    fn num_actions(&self) -> usize {
        match self.actor {
            Actor::Chance => self.chance_action_num(),
            Actor::Player(_) => 2, // pass (0) or bet (1)
        }
    }

    fn chance_probability(&self) -> f64 {
        self.chance_probability
    }

    fn payoff(&self, player: usize) -> f64 {
        debug_assert!(self.done, "payoff queried on a non-terminal state");
        self.payoff[player]
    }

    fn info_set_key(&self) -> Vec<u8> {
        let p = self.current_player();
        let mut key = Vec::with_capacity(1 + self.history.len());
        key.push(self.cards[p]);
        key.extend_from_slice(&self.history);
        key
    }

    fn step(&self, action: usize) -> Self {
        let mut next = self.clone();
        match self.actor {
            Actor::Chance => {
                let card_num = self.card_num();
                next.cards = decode_permutation(action, card_num);
                next.chance_probability = 1.0 / self.chance_action_num() as f64;
                next.history.clear();
                next.first_bet_turn = None;
                next.bet_count = 0;
                next.done = false;
                next.payoff = vec![0.0; self.num_players];
                next.actor = Actor::Player(0);
            }
            Actor::Player(acting) => {
                next.history.push(action as u8);
                next.bet_count += action;
                let turn = next.history.len();
                if next.first_bet_turn.is_none() && action == 1 {
                    next.first_bet_turn = Some(turn);
                }

                let next_player = (acting + 1) % self.num_players;
                if turn > 1 {
                    let n = self.num_players;
                    let terminal_pass = matches!(next.first_bet_turn, Some(fbt) if fbt > 0 && turn - fbt == n - 1)
                        || (turn == n && next.first_bet_turn.is_none() && action == 0);

                    if next.bet_count == n {
                        // all players bet: the highest card among all players wins
                        let winner = (0..n).max_by_key(|&i| next.cards[i]).unwrap();
                        next.payoff = vec![-2.0; n];
                        next.payoff[winner] = 2.0 * (n as f64 - 1.0);
                        next.done = true;
                    } else if terminal_pass {
                        if next.bet_count == 0 {
                            // all fold to showdown: highest card wins the antes
                            let winner = (0..n).max_by_key(|&i| next.cards[i]).unwrap();
                            next.payoff = vec![-1.0; n];
                            next.payoff[winner] = n as f64 - 1.0;
                            next.done = true;
                        } else if next.bet_count == 1 {
                            // exactly one bettor, everyone else folded
                            let bettor = turn % n;
                            next.payoff = vec![-1.0; n];
                            next.payoff[bettor] = n as f64 - 1.0;
                            next.done = true;
                        } else {
                            // more than two players bet: showdown among bettors only
                            let mut card = vec![-1i32; n];
                            let mut is_bet = vec![false; n];
                            for i in 0..turn {
                                if next.history[i] == 1 {
                                    card[i % n] = next.cards[i % n] as i32;
                                    is_bet[i % n] = true;
                                }
                            }
                            let winner = (0..n).max_by_key(|&i| card[i]).unwrap();
                            let mut payoff = vec![0.0; n];
                            for i in 0..n {
                                if !is_bet[i] {
                                    payoff[i] = -1.0;
                                } else if i != winner {
                                    payoff[i] = -2.0;
                                }
                            }
                            payoff[winner] = 2.0 * (next.bet_count as f64 - 1.0)
                                + (n as f64 - next.bet_count as f64);
                            next.payoff = payoff;
                            next.done = true;
                        }
                    }
                }
                next.actor = Actor::Player(next_player);
            }
        }
        next
    }
}

#[derive(Clone)]
pub struct KuhnGame {
    num_players: usize,
}

impl KuhnGame {
    pub fn new(num_players: usize) -> Self {
        assert!(num_players >= 2, "Kuhn poker needs at least two players");
        Self { num_players }
    }
}

impl Game for KuhnGame {
    type State = KuhnState;

    fn name(&self) -> &str {
        "kuhn"
    }

    fn num_players(&self) -> usize {
        self.num_players
    }

    fn reset(&self, rng: &mut dyn RngCore, skip_chance: bool) -> Self::State {
        let card_num = self.num_players + 1;
        let chance_action_num = factorial(card_num);
        let empty = KuhnState {
            num_players: self.num_players,
            cards: (0..card_num as u8).collect(),
            history: Vec::new(),
            actor: Actor::Chance,
            chance_probability: 1.0 / chance_action_num as f64,
            first_bet_turn: None,
            bet_count: 0,
            payoff: vec![0.0; self.num_players],
            done: false,
        };
        if skip_chance {
            let action = (rng.next_u64() % chance_action_num as u64) as usize;
            empty.step(action)
        } else {
            empty
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn deal_then_two_checks_goes_to_showdown() {
        let game = KuhnGame::new(2);
        let mut rng = StdRng::seed_from_u64(1);
        let mut state = game.reset(&mut rng, true);
        assert!(!state.is_terminal());
        assert_eq!(state.current_player(), 0);
        state = state.step(0); // player 0 checks
        assert!(!state.is_terminal());
        state = state.step(0); // player 1 checks
        assert!(state.is_terminal());
        assert!((state.payoff(0) + state.payoff(1)).abs() < 1e-9);
    }

    #[test]
    fn bet_then_fold_awards_pot_to_bettor() {
        let game = KuhnGame::new(2);
        let mut rng = StdRng::seed_from_u64(7);
        let mut state = game.reset(&mut rng, true);
        state = state.step(1); // player 0 bets
        assert!(!state.is_terminal());
        state = state.step(0); // player 1 folds
        assert!(state.is_terminal());
        assert_eq!(state.payoff(0), 1.0);
        assert_eq!(state.payoff(1), -1.0);
    }

    #[test]
    fn bet_then_call_is_showdown_for_two() {
        let game = KuhnGame::new(2);
        let mut rng = StdRng::seed_from_u64(3);
        let mut state = game.reset(&mut rng, true);
        let high = state.cards[0].max(state.cards[1]);
        state = state.step(1);
        state = state.step(1);
        assert!(state.is_terminal());
        assert!((state.payoff(0) + state.payoff(1)).abs() < 1e-9);
        if state.cards[0] == high {
            assert_eq!(state.payoff(0), 2.0);
        } else {
            assert_eq!(state.payoff(1), 2.0);
        }
    }

    #[test]
    fn info_set_key_distinguishes_histories() {
        let game = KuhnGame::new(2);
        let mut rng = StdRng::seed_from_u64(42);
        let state = game.reset(&mut rng, true);
        let passed = state.clone().step(0);
        let bet = state.clone().step(1);
        assert_ne!(passed.info_set_key(), bet.info_set_key());
    }

    #[test]
    fn reset_without_skip_chance_exposes_chance_node() {
        let game = KuhnGame::new(2);
        let mut rng = StdRng::seed_from_u64(0);
        let state = game.reset(&mut rng, false);
        assert!(state.is_chance_node());
        assert_eq!(state.num_actions(), factorial(3));
    }
}
