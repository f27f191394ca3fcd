//! Training entry point: runs one CFR variant to convergence and persists
//! the resulting average strategy.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use kuhn_cfr::error::TrainerError;
use kuhn_cfr::game::Game;
use kuhn_cfr::kuhn::KuhnGame;
use kuhn_cfr::trainer::{Algorithm, Trainer};

/// Train a CFR strategy profile for N-player Kuhn poker.
#[derive(Parser, Debug)]
struct Args {
    /// CFR variant: vanilla, chance, external, or outcome.
    #[arg(long, default_value = "vanilla")]
    algorithm: String,

    /// Number of training iterations. Must be positive.
    #[arg(long)]
    iteration: u64,

    /// Number of players at the table.
    #[arg(long, default_value_t = 2)]
    players: usize,

    /// RNG seed; omit for a non-deterministic run.
    #[arg(long)]
    seed: Option<u64>,

    /// Log a progress line every N iterations.
    #[arg(long, default_value_t = 1_000)]
    progress_every: u64,

    /// Persist an intermediate snapshot every N iterations.
    #[arg(long, default_value_t = 10_000_000)]
    checkpoint_every: u64,

    /// Directory strategies are written under (a `<game name>/` subdirectory
    /// is created inside it).
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let algorithm = Algorithm::parse(&args.algorithm).map_err(anyhow::Error::from)?;
    if args.iteration == 0 {
        return Err(TrainerError::Config("iteration count must be positive".into()).into());
    }

    let game = KuhnGame::new(args.players);
    let mut trainer = Trainer::new(game.clone(), args.seed);
    let output_root = args.output.unwrap_or_else(kuhn_cfr::trainer::default_output_root);

    trainer
        .train(
            algorithm,
            args.iteration,
            args.progress_every.max(1),
            args.checkpoint_every.max(1),
            &output_root,
        )
        .with_context(|| format!("training {} with {} algorithm", game.name(), algorithm.as_str()))?;

    log::info!(
        "finished: {} info sets learned for {}",
        trainer.table().len(),
        game.name()
    );
    Ok(())
}
