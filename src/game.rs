use rand::RngCore;

/// A single state of play for some [`Game`].
///
/// `GameState` is the opaque tree-walk surface the trainer, evaluator and
/// agent depend on; they never reason about the concrete game. Every state
/// must be cheaply cloneable since the CFR walk snapshots before recursing
/// into each branch rather than mutating in place.
pub trait GameState: Clone {
    /// `true` once the episode has reached a payoff-bearing leaf.
    fn is_terminal(&self) -> bool;

    /// `true` when the acting role is the synthetic chance player.
    fn is_chance_node(&self) -> bool;

    /// The acting real player index. Meaningless at chance or terminal states.
    fn current_player(&self) -> usize;

    /// Number of legal actions at the current state (decision node) or the
    /// size of the chance fan (chance node).
    fn num_actions(&self) -> usize;

    /// Probability of the chance action that produced this state. Only
    /// meaningful immediately after stepping through a chance node.
    fn chance_probability(&self) -> f64;

    /// Terminal payoff for `player`. Calling this on a non-terminal state is
    /// a programmer error in the `Game` implementation.
    fn payoff(&self, player: usize) -> f64;

    /// Byte-string information-set key visible to `current_player()`. Keys
    /// must be stable across equal observation sequences and distinct across
    /// distinguishable ones; the trainer treats them as opaque.
    fn info_set_key(&self) -> Vec<u8>;

    /// Advance by `action`, returning the resulting state. For chance nodes
    /// `action` selects one of the chance outcomes; for decision nodes, one
    /// of the legal actions.
    fn step(&self, action: usize) -> Self;
}

/// Factory / configuration for a game, parametric over its state type.
///
/// This is the capability set the trainer, evaluator and agent are generic
/// over (see the "Polymorphic Game parameter" remapping note) in place of a
/// generic-parameter coupling to one concrete game.
pub trait Game: Clone {
    type State: GameState;

    /// Human-readable name, used as the strategy output subdirectory.
    fn name(&self) -> &str;

    fn num_players(&self) -> usize;

    /// Start a new episode.
    ///
    /// If `skip_chance` is `true`, the chance move (e.g. the deal) is sampled
    /// internally using `rng` and the returned state's acting role is a real
    /// player. If `false`, the returned state is itself a chance node and the
    /// caller is responsible for calling `step` with a chance action index.
    fn reset(&self, rng: &mut dyn RngCore, skip_chance: bool) -> Self::State;
}
