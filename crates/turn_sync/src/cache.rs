//! The per-game state cache and its derived views.
//!
//! All mutation of cached game state funnels through [`GameCache`]; every
//! operation is a single non-suspending step, and every successful mutation
//! republishes the derived views synchronously.

use std::collections::HashMap;

use derive_more::{Display, Error};
use tokio::sync::watch;
use tracing::debug;

use crate::types::{GameEntry, GameId, GameState, MoveId, MoveRecord, PlayerId};

/// Reactive view of the games the local participant plays in.
///
/// Re-emitted on every cache mutation.
pub type MyGamesView = watch::Receiver<HashMap<GameId, GameEntry>>;

/// Reactive view of a single game's state, `None` until the game is cached.
///
/// Re-emitted on every cache mutation.
pub type GameView<M> = watch::Receiver<Option<GameState<M>>>;

/// Cache operation error.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum CacheError {
    /// The game is not present in the cache.
    #[display("game {} is not present in the cache", game_id)]
    GameAbsent {
        /// The missing game.
        game_id: GameId,
    },
    /// The game has no moves to remove.
    #[display("game {} has no moves to remove", game_id)]
    NoMoves {
        /// The affected game.
        game_id: GameId,
    },
    /// The game has no move at the given position.
    #[display("game {} has no move at position {}", game_id, index)]
    BadMoveIndex {
        /// The affected game.
        game_id: GameId,
        /// The out-of-range position.
        index: usize,
    },
}

/// Mapping from game identifier to cached state, the single source of
/// truth for game data in this process.
///
/// Entries are created on first fetch or on a game-started signal and are
/// never proactively deleted; they persist for the lifetime of the process
/// unless explicitly refreshed.
pub(crate) struct GameCache<M> {
    me: PlayerId,
    games: HashMap<GameId, GameState<M>>,
    my_games_tx: watch::Sender<HashMap<GameId, GameEntry>>,
    game_txs: HashMap<GameId, watch::Sender<Option<GameState<M>>>>,
}

impl<M: Clone> GameCache<M> {
    /// Creates an empty cache for the given local participant.
    pub(crate) fn new(me: PlayerId) -> Self {
        let (my_games_tx, _) = watch::channel(HashMap::new());
        Self {
            me,
            games: HashMap::new(),
            my_games_tx,
            game_txs: HashMap::new(),
        }
    }

    /// Pure read of a game's cached state.
    pub(crate) fn get(&self, game_id: &GameId) -> Option<&GameState<M>> {
        self.games.get(game_id)
    }

    /// Checks whether a game is cached.
    pub(crate) fn contains(&self, game_id: &GameId) -> bool {
        self.games.contains_key(game_id)
    }

    /// Inserts a game with an empty move chain if absent.
    ///
    /// Idempotent: an already-cached game keeps its move history untouched,
    /// since entries are immutable and a fresh fetch carries no new
    /// information.
    pub(crate) fn upsert_game(&mut self, game_id: &GameId, entry: GameEntry) {
        if self.games.contains_key(game_id) {
            debug!(game_id = %game_id, "Game already cached, keeping move history");
        } else {
            debug!(game_id = %game_id, "Caching new game");
            self.games
                .insert(game_id.clone(), GameState::new(entry));
        }
        self.publish(game_id);
    }

    /// Wholesale replacement of a game's move chain after an authoritative
    /// full-history fetch. Silent no-op if the game is not cached.
    pub(crate) fn replace_moves(&mut self, game_id: &GameId, moves: Vec<MoveRecord<M>>) {
        match self.games.get_mut(game_id) {
            Some(state) => {
                debug!(game_id = %game_id, count = moves.len(), "Replacing move history");
                state.moves = moves;
                self.publish(game_id);
            }
            None => {
                debug!(game_id = %game_id, "Game not cached, ignoring move history");
            }
        }
    }

    /// Appends one move to the tail of a game's chain, returning its
    /// position.
    pub(crate) fn append_move(
        &mut self,
        game_id: &GameId,
        record: MoveRecord<M>,
    ) -> Result<usize, CacheError> {
        let state = self.games.get_mut(game_id).ok_or_else(|| CacheError::GameAbsent {
            game_id: game_id.clone(),
        })?;
        state.moves.push(record);
        let index = state.moves.len() - 1;
        debug!(game_id = %game_id, index, "Appended move");
        self.publish(game_id);
        Ok(index)
    }

    /// Removes the most recent move, undoing a failed optimistic append.
    pub(crate) fn remove_tail_move(&mut self, game_id: &GameId) -> Result<MoveRecord<M>, CacheError> {
        let state = self.games.get_mut(game_id).ok_or_else(|| CacheError::GameAbsent {
            game_id: game_id.clone(),
        })?;
        let record = state.moves.pop().ok_or_else(|| CacheError::NoMoves {
            game_id: game_id.clone(),
        })?;
        debug!(game_id = %game_id, remaining = state.moves.len(), "Removed tail move");
        self.publish(game_id);
        Ok(record)
    }

    /// Records a backend-assigned identifier onto the unconfirmed move at
    /// the given position.
    pub(crate) fn confirm_move(
        &mut self,
        game_id: &GameId,
        index: usize,
        move_id: MoveId,
    ) -> Result<(), CacheError> {
        let state = self.games.get_mut(game_id).ok_or_else(|| CacheError::GameAbsent {
            game_id: game_id.clone(),
        })?;
        let record = state.moves.get_mut(index).ok_or(CacheError::BadMoveIndex {
            game_id: game_id.clone(),
            index,
        })?;
        debug!(game_id = %game_id, index, move_id = %move_id, "Confirmed move");
        record.move_id = Some(move_id);
        self.publish(game_id);
        Ok(())
    }

    /// Subscribes to the games the local participant plays in.
    pub(crate) fn subscribe_my_games(&self) -> MyGamesView {
        self.my_games_tx.subscribe()
    }

    /// Subscribes to a single game's state, creating the channel on first
    /// subscription.
    pub(crate) fn subscribe_game(&mut self, game_id: &GameId) -> GameView<M> {
        let current = self.games.get(game_id).cloned();
        let tx = self
            .game_txs
            .entry(game_id.clone())
            .or_insert_with(|| watch::channel(current).0);
        tx.subscribe()
    }

    /// Recomputes and re-emits the derived views. Runs synchronously within
    /// the mutation that triggered it.
    fn publish(&self, game_id: &GameId) {
        self.my_games_tx.send_replace(self.project_my_games());
        if let Some(tx) = self.game_txs.get(game_id) {
            tx.send_replace(self.games.get(game_id).cloned());
        }
    }

    /// Projects the cache down to entries the local participant plays in.
    fn project_my_games(&self) -> HashMap<GameId, GameEntry> {
        self.games
            .iter()
            .filter(|(_, state)| state.entry.has_player(&self.me))
            .map(|(game_id, state)| (game_id.clone(), state.entry.clone()))
            .collect()
    }
}
