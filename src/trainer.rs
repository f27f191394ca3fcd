use std::fs;
use std::path::{Path, PathBuf};

use ndarray::Array1;
use ndarray_rand::rand_distr::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::TrainerError;
use crate::game::{Game, GameState};
use crate::node::InfoSetNode;
use crate::strategy_io;
use crate::table::NodeTable;

/// Which CFR variant drives an iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Algorithm {
    Vanilla,
    ChanceSampling,
    ExternalSampling,
    OutcomeSampling,
}

impl Algorithm {
    pub fn parse(s: &str) -> Result<Self, TrainerError> {
        match s {
            "vanilla" => Ok(Algorithm::Vanilla),
            "chance" => Ok(Algorithm::ChanceSampling),
            "external" => Ok(Algorithm::ExternalSampling),
            "outcome" => Ok(Algorithm::OutcomeSampling),
            other => Err(TrainerError::Config(format!(
                "unknown algorithm \"{other}\" (expected vanilla|chance|external|outcome)"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Vanilla => "vanilla",
            Algorithm::ChanceSampling => "chance",
            Algorithm::ExternalSampling => "external",
            Algorithm::OutcomeSampling => "outcome",
        }
    }
}

const OUTCOME_SAMPLING_EPSILON: f64 = 0.6;

/// Bundles the mutable state threaded through a single recursive tree-walk
/// so the CFR functions read as plain recursive equations rather than
/// methods on a large struct.
struct Ctx<'a> {
    table: &'a mut NodeTable,
    fixed: &'a [Option<NodeTable>],
    updating: &'a [bool],
    rng: &'a mut StdRng,
    nodes_touched: u64,
}

impl<'a> Ctx<'a> {
    fn fixed_strategy(&mut self, player: usize, key: &[u8]) -> Result<Vec<f64>, TrainerError> {
        let table = self.fixed[player].as_ref().ok_or_else(|| {
            TrainerError::ProfileMismatch(format!("no fixed strategy loaded for player {player}"))
        })?;
        let node = table.get(key).ok_or_else(|| {
            TrainerError::ProfileMismatch(format!("unknown info-set key for fixed player {player}"))
        })?;
        Ok(node.peek_average_strategy())
    }
}

fn sample_action(weights: &[f64], rng: &mut StdRng) -> usize {
    let dist = WeightedIndex::new(weights).expect("strategy weights must be a valid distribution");
    dist.sample(rng)
}

/// Vanilla CFR and chance-sampling MCCFR share this recursion: the only
/// difference between the two variants is whether the state passed in can
/// still be a chance node, which is controlled entirely by whether the
/// caller dealt with `reset(skip_chance)`.
fn cfr_recurse<S: GameState>(
    ctx: &mut Ctx,
    state: &S,
    target: usize,
    pi: f64,
    pj: f64,
) -> Result<f64, TrainerError> {
    ctx.nodes_touched += 1;

    if state.is_terminal() {
        return Ok(state.payoff(target));
    }

    if state.is_chance_node() {
        let mut node_util = 0.0;
        for a in 0..state.num_actions() {
            let child = state.step(a);
            let c = child.chance_probability();
            node_util += c * cfr_recurse(ctx, &child, target, pi, pj * c)?;
        }
        return Ok(node_util);
    }

    let q = state.current_player();
    let key = state.info_set_key();
    let num_actions = state.num_actions();

    if !ctx.updating[q] {
        let strategy = ctx.fixed_strategy(q, &key)?;
        let mut node_util = 0.0;
        for a in 0..num_actions {
            let child = state.step(a);
            node_util += strategy[a] * cfr_recurse(ctx, &child, target, pi, pj * strategy[a])?;
        }
        return Ok(node_util);
    }

    let node = ctx.table.get_or_create(&key, num_actions)?;
    let sigma = node.current_strategy().to_owned();

    let mut utils = Array1::<f64>::zeros(num_actions);
    let mut node_util = 0.0;
    for a in 0..num_actions {
        let child = state.step(a);
        utils[a] = if q == target {
            cfr_recurse(ctx, &child, target, pi * sigma[a], pj)?
        } else {
            cfr_recurse(ctx, &child, target, pi, pj * sigma[a])?
        };
        node_util += sigma[a] * utils[a];
    }

    if q == target {
        let node = ctx.table.get_or_create(&key, num_actions)?;
        for a in 0..num_actions {
            let regret = node.get_regret(a) + pj * (utils[a] - node_util);
            node.set_regret(a, regret);
        }
        node.accumulate_strategy(sigma.view(), pi);
    }

    Ok(node_util)
}

/// External-sampling MCCFR. Disallows fixed opponents; callers must check
/// this before invoking (see [`Trainer::train`]).
fn external_sampling_recurse<S: GameState>(
    ctx: &mut Ctx,
    state: &S,
    target: usize,
) -> Result<f64, TrainerError> {
    ctx.nodes_touched += 1;

    if state.is_terminal() {
        return Ok(state.payoff(target));
    }

    if state.is_chance_node() {
        let mut node_util = 0.0;
        for a in 0..state.num_actions() {
            let child = state.step(a);
            node_util += child.chance_probability() * external_sampling_recurse(ctx, &child, target)?;
        }
        return Ok(node_util);
    }

    let q = state.current_player();
    let key = state.info_set_key();
    let num_actions = state.num_actions();
    let node = ctx.table.get_or_create(&key, num_actions)?;
    let sigma = node.current_strategy().to_owned();

    if q != target {
        let action = sample_action(sigma.as_slice().unwrap(), ctx.rng);
        let child = state.step(action);
        let util = external_sampling_recurse(ctx, &child, target)?;
        let node = ctx.table.get_or_create(&key, num_actions)?;
        node.accumulate_strategy(sigma.view(), 1.0);
        return Ok(util);
    }

    let mut utils = Array1::<f64>::zeros(num_actions);
    let mut node_util = 0.0;
    for a in 0..num_actions {
        let child = state.step(a);
        utils[a] = external_sampling_recurse(ctx, &child, target)?;
        node_util += sigma[a] * utils[a];
    }

    let node = ctx.table.get_or_create(&key, num_actions)?;
    for a in 0..num_actions {
        let regret = node.get_regret(a) + (utils[a] - node_util);
        node.set_regret(a, regret);
    }

    Ok(node_util)
}

/// Outcome-sampling MCCFR. Returns `(utility, tail probability)`.
fn outcome_sampling_recurse<S: GameState>(
    ctx: &mut Ctx,
    state: &S,
    target: usize,
    pi: f64,
    pj: f64,
    s: f64,
) -> Result<(f64, f64), TrainerError> {
    ctx.nodes_touched += 1;

    if state.is_terminal() {
        return Ok((state.payoff(target) / s, 1.0));
    }

    if state.is_chance_node() {
        // Kuhn always absorbs chance into reset(); this branch only matters
        // for a Game implementation with chance beyond the deal and samples
        // uniformly across the fan since we have no per-action probability
        // without stepping every child first.
        let num_actions = state.num_actions();
        let action = ctx.rng.gen_range(0..num_actions);
        let child = state.step(action);
        return outcome_sampling_recurse(ctx, &child, target, pi, pj, s / num_actions as f64);
    }

    let q = state.current_player();
    let key = state.info_set_key();
    let num_actions = state.num_actions();
    let node = ctx.table.get_or_create(&key, num_actions)?;
    let sigma = node.current_strategy().to_owned();

    let probability: Vec<f64> = if q == target {
        (0..num_actions)
            .map(|a| OUTCOME_SAMPLING_EPSILON / num_actions as f64 + (1.0 - OUTCOME_SAMPLING_EPSILON) * sigma[a])
            .collect()
    } else {
        sigma.to_vec()
    };
    let action = sample_action(&probability, ctx.rng);

    let new_pi = if q == target { pi * sigma[action] } else { pi };
    let new_pj = if q == target { pj } else { pj * sigma[action] };
    let new_s = s * probability[action];

    let child = state.step(action);
    let (util, tail) = outcome_sampling_recurse(ctx, &child, target, new_pi, new_pj, new_s)?;

    if q == target {
        let node = ctx.table.get_or_create(&key, num_actions)?;
        let weight = util * pj;
        for a in 0..num_actions {
            let regret = if a == action {
                weight * (1.0 - sigma[action]) * tail
            } else {
                -weight * sigma[action] * tail
            };
            node.set_regret(a, node.get_regret(a) + regret);
        }
    } else {
        let node = ctx.table.get_or_create(&key, num_actions)?;
        node.accumulate_strategy(sigma.view(), pj / s);
    }

    Ok((util, tail * sigma[action]))
}

/// The CFR trainer: drives `G` through episodes, accumulates regret and
/// average strategy into an owned [`NodeTable`], and periodically persists
/// a snapshot.
pub struct Trainer<G: Game> {
    game: G,
    rng: StdRng,
    table: NodeTable,
    updating: Vec<bool>,
    fixed: Vec<Option<NodeTable>>,
}

impl<G: Game> Trainer<G> {
    pub fn new(game: G, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let num_players = game.num_players();
        Self {
            game,
            rng,
            table: NodeTable::new(),
            updating: vec![true; num_players],
            fixed: (0..num_players).map(|_| None).collect(),
        }
    }

    pub fn table(&self) -> &NodeTable {
        &self.table
    }

    /// Mark `player` as a fixed (non-updating) opponent whose moves are
    /// drawn from `table`'s `average_strategy` fields.
    pub fn set_fixed_strategy(&mut self, player: usize, table: NodeTable) {
        self.updating[player] = false;
        self.fixed[player] = Some(table);
    }

    fn validate(&self, algorithm: Algorithm) -> Result<(), TrainerError> {
        let has_fixed_opponent = self.fixed.iter().any(|f| f.is_some());
        if has_fixed_opponent
            && matches!(algorithm, Algorithm::ExternalSampling | Algorithm::OutcomeSampling)
        {
            return Err(TrainerError::InvariantViolation(
                "external/outcome-sampling CFR does not support fixed opponents".into(),
            ));
        }
        Ok(())
    }

    /// Run `iterations` rounds of `algorithm`, logging progress every
    /// `progress_every` iterations and persisting a snapshot every
    /// `checkpoint_every` iterations, writing under
    /// `<output_root>/<game.name()>/`.
    pub fn train(
        &mut self,
        algorithm: Algorithm,
        iterations: u64,
        progress_every: u64,
        checkpoint_every: u64,
        output_root: &Path,
    ) -> Result<(), TrainerError> {
        if iterations == 0 {
            return Err(TrainerError::Config("iteration count must be positive".into()));
        }
        self.validate(algorithm)?;

        let num_players = self.game.num_players();
        let mut cumulative_nodes_touched: u64 = 0;
        let mut last_utility = vec![0.0f64; num_players];
        let output_dir = output_root.join(self.game.name());
        fs::create_dir_all(&output_dir)?;

        for i in 0..iterations {
            for p in 0..num_players {
                if !self.updating[p] {
                    continue;
                }
                let (util, nodes_touched) = self.run_episode(algorithm, p)?;
                last_utility[p] = util;
                cumulative_nodes_touched += nodes_touched;
            }

            if (i + 1) % progress_every == 0 {
                log::info!(
                    "iteration {} nodes_touched={} info_sets={} utilities={:?}",
                    i + 1,
                    cumulative_nodes_touched,
                    self.table.len(),
                    last_utility
                );
            }
            if (i + 1) % checkpoint_every == 0 {
                let path = output_dir.join(format!("strategy_{}_{}.bin", i + 1, algorithm.as_str()));
                strategy_io::save(&mut self.table, &path)?;
            }
        }

        let path = output_dir.join(format!("strategy_{}.bin", algorithm.as_str()));
        strategy_io::save(&mut self.table, &path)?;
        Ok(())
    }

    fn run_episode(&mut self, algorithm: Algorithm, target: usize) -> Result<(f64, u64), TrainerError> {
        let skip_chance = !matches!(algorithm, Algorithm::Vanilla);
        let state = self.game.reset(&mut self.rng, skip_chance);

        let mut ctx = Ctx {
            table: &mut self.table,
            fixed: &self.fixed,
            updating: &self.updating,
            rng: &mut self.rng,
            nodes_touched: 0,
        };
        let util = match algorithm {
            Algorithm::Vanilla | Algorithm::ChanceSampling => cfr_recurse(&mut ctx, &state, target, 1.0, 1.0),
            Algorithm::ExternalSampling => external_sampling_recurse(&mut ctx, &state, target),
            Algorithm::OutcomeSampling => {
                outcome_sampling_recurse(&mut ctx, &state, target, 1.0, 1.0, 1.0).map(|(u, _)| u)
            }
        }?;
        Ok((util, ctx.nodes_touched))
    }
}

pub fn default_output_root() -> PathBuf {
    PathBuf::from("..").join("strategies")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::{self, StrategyFn};
    use crate::kuhn::{KuhnGame, KuhnState};
    use tempfile_free::TempDir;

    mod tempfile_free {
        use std::path::PathBuf;
        use std::sync::atomic::{AtomicU64, Ordering};

        pub struct TempDir(PathBuf);
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        impl TempDir {
            pub fn new() -> Self {
                let n = COUNTER.fetch_add(1, Ordering::Relaxed);
                let path = std::env::temp_dir().join(format!("kuhn-cfr-trainer-test-{}-{}", std::process::id(), n));
                std::fs::create_dir_all(&path).unwrap();
                Self(path)
            }
            pub fn path(&self) -> &std::path::Path {
                &self.0
            }
        }

        impl Drop for TempDir {
            fn drop(&mut self) {
                let _ = std::fs::remove_dir_all(&self.0);
            }
        }
    }

    /// Builds a strategy callable that reads straight from `table`, falling
    /// back to uniform for any info set the table never visited.
    fn strategy_fn_from(table: &NodeTable) -> Box<StrategyFn<'_, KuhnState>> {
        Box::new(move |state: &KuhnState| {
            let key = state.info_set_key();
            match table.get(&key) {
                Some(node) => node.peek_average_strategy(),
                None => vec![1.0 / state.num_actions() as f64; state.num_actions()],
            }
        })
    }

    /// Vanilla CFR on two-player Kuhn converges toward the known equilibrium
    /// root payoff (-1/18, +1/18). A reduced iteration count and a looser
    /// tolerance stand in for a full-length run so this test finishes
    /// quickly.
    #[test]
    fn vanilla_cfr_converges_toward_kuhn_equilibrium() {
        let dir = TempDir::new();
        let game = KuhnGame::new(2);
        let mut trainer = Trainer::new(game.clone(), Some(42));
        trainer
            .train(Algorithm::Vanilla, 50_000, 50_000, 50_000, dir.path())
            .unwrap();

        assert!(!trainer.table().is_empty());

        let table = trainer.table();
        let strategies: Vec<Box<StrategyFn<KuhnState>>> =
            vec![strategy_fn_from(table), strategy_fn_from(table)];

        let payoff = evaluator::calculate_payoff(&game, &strategies);
        assert!((payoff[0] - (-1.0 / 18.0)).abs() < 0.05);
        assert!((payoff[0] + payoff[1]).abs() < 1e-9);
    }

    /// Chance-sampling MCCFR at a moderate iteration count already drives
    /// exploitability well below the bound a full-length run would need to
    /// clear.
    #[test]
    fn chance_sampling_reduces_exploitability() {
        let dir = TempDir::new();
        let game = KuhnGame::new(2);
        let mut trainer = Trainer::new(game.clone(), Some(42));
        trainer
            .train(Algorithm::ChanceSampling, 50_000, 50_000, 50_000, dir.path())
            .unwrap();

        let table = trainer.table();
        let strategies: Vec<Box<StrategyFn<KuhnState>>> =
            vec![strategy_fn_from(table), strategy_fn_from(table)];
        let value = evaluator::exploitability(&game, &strategies);
        assert!(value < 0.1);
    }

    #[test]
    fn external_sampling_rejects_fixed_opponent() {
        let dir = TempDir::new();
        let game = KuhnGame::new(2);
        let mut trainer = Trainer::new(game, Some(1));
        trainer.set_fixed_strategy(0, NodeTable::new());
        let err = trainer
            .train(Algorithm::ExternalSampling, 10, 10, 10, dir.path())
            .unwrap_err();
        assert!(matches!(err, TrainerError::InvariantViolation(_)));
    }

    #[test]
    fn outcome_sampling_rejects_fixed_opponent() {
        let dir = TempDir::new();
        let game = KuhnGame::new(2);
        let mut trainer = Trainer::new(game, Some(1));
        trainer.set_fixed_strategy(1, NodeTable::new());
        let err = trainer
            .train(Algorithm::OutcomeSampling, 10, 10, 10, dir.path())
            .unwrap_err();
        assert!(matches!(err, TrainerError::InvariantViolation(_)));
    }

    /// Player 0 plays a fixed equilibrium-ish strategy while only player 1
    /// updates. Player 1's best-response value against that fixed opponent
    /// should end up close to the (symmetric) Kuhn equilibrium value rather
    /// than staying at the uniform-random baseline.
    #[test]
    fn fixed_opponent_vanilla_training_improves_best_response() {
        let dir = TempDir::new();
        let game = KuhnGame::new(2);

        let mut pretrained = Trainer::new(game.clone(), Some(42));
        pretrained
            .train(Algorithm::Vanilla, 20_000, 20_000, 20_000, dir.path())
            .unwrap();

        let copy_fixed_table = |src: &mut NodeTable| {
            let mut dst = NodeTable::new();
            for (key, node) in src.iter_mut() {
                dst.insert(
                    key.clone(),
                    InfoSetNode::from_average_strategy(node.persisted_average_strategy()),
                );
            }
            dst
        };

        let mut trainer = Trainer::new(game.clone(), Some(7));
        trainer.set_fixed_strategy(0, copy_fixed_table(&mut pretrained.table));
        trainer
            .train(Algorithm::Vanilla, 20_000, 20_000, 20_000, dir.path())
            .unwrap();

        let fixed_opponent = copy_fixed_table(&mut pretrained.table);
        let player0: Box<StrategyFn<KuhnState>> = strategy_fn_from(&fixed_opponent);
        let player1: Box<StrategyFn<KuhnState>> = strategy_fn_from(trainer.table());
        let strategies: Vec<Box<StrategyFn<KuhnState>>> = vec![player0, player1];

        // -1/18 is the equilibrium value for player 0; player 1's
        // best-response value against a near-equilibrium opponent should sit
        // close to +1/18, well above what an undertrained policy achieves.
        let br = evaluator::best_response_value(&game, 1, &strategies);
        assert!(br > 0.0);
    }

    #[test]
    fn zero_iterations_is_config_error() {
        let dir = TempDir::new();
        let game = KuhnGame::new(2);
        let mut trainer = Trainer::new(game, Some(1));
        let err = trainer
            .train(Algorithm::Vanilla, 0, 1, 1, dir.path())
            .unwrap_err();
        assert!(matches!(err, TrainerError::Config(_)));
    }

    #[test]
    fn algorithm_parse_round_trips() {
        for name in ["vanilla", "chance", "external", "outcome"] {
            let algorithm = Algorithm::parse(name).unwrap();
            assert_eq!(algorithm.as_str(), name);
        }
        assert!(Algorithm::parse("bogus").is_err());
    }
}
