//! Evaluation entry point: loads one strategy profile per player and
//! reports expected payoffs and exploitability.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use kuhn_cfr::evaluator::{self, StrategyFn};
use kuhn_cfr::game::GameState;
use kuhn_cfr::kuhn::{KuhnGame, KuhnState};
use kuhn_cfr::strategy_io;
use kuhn_cfr::table::NodeTable;

/// Evaluate a persisted strategy profile against itself: expected payoffs
/// and total exploitability.
#[derive(Parser, Debug)]
struct Args {
    /// Number of players at the table; must match the number of
    /// `--strategy-path` arguments.
    #[arg(long, default_value_t = 2)]
    players: usize,

    /// One strategy file per player, in seat order.
    #[arg(long = "strategy-path", required = true)]
    strategy_paths: Vec<PathBuf>,

    /// RNG seed. Expected payoff and exploitability are computed by an exact
    /// tree walk and consume no randomness, so this only matters if a future
    /// `Game` implementation needs one to reconstruct its root; accepted
    /// here for CLI-surface parity with the trainer binary.
    #[arg(long)]
    #[allow(dead_code)]
    seed: Option<u64>,
}

fn strategy_fn(table: NodeTable) -> Box<StrategyFn<'static, KuhnState>> {
    Box::new(move |state: &KuhnState| {
        let key = state.info_set_key();
        match table.get(&key) {
            Some(node) => node.peek_average_strategy(),
            None => vec![1.0 / state.num_actions() as f64; state.num_actions()],
        }
    })
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    if args.strategy_paths.len() != args.players {
        anyhow::bail!(
            "expected {} --strategy-path arguments, got {}",
            args.players,
            args.strategy_paths.len()
        );
    }

    let game = KuhnGame::new(args.players);
    let mut strategies: Vec<Box<StrategyFn<KuhnState>>> = Vec::with_capacity(args.players);
    for path in &args.strategy_paths {
        let table = strategy_io::load(path)
            .with_context(|| format!("loading strategy file {}", path.display()))?;
        strategies.push(strategy_fn(table));
    }

    let payoffs = evaluator::calculate_payoff(&game, &strategies);
    let exploitability = evaluator::exploitability(&game, &strategies);
    let payoffs_str = payoffs
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(",");

    log::info!("expected payoffs: ({payoffs_str})");
    log::info!("exploitability: {exploitability}");
    println!("expected payoffs: ({payoffs_str})");
    println!("exploitability: {exploitability}");
    Ok(())
}
