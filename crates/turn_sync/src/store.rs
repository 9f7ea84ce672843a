//! The game store: the engine's public handle.
//!
//! A [`GameStore`] owns the per-game cache and wires the backend boundary,
//! the identity resolver, and the move codec together. Fetches populate the
//! cache, [`GameStore::submit_move`] runs the submission protocol, and
//! [`GameStore::handle_signal`] folds remote notifications in; consumers
//! observe the result through the reactive views.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use derive_more::{Display, Error, From};
use tracing::{debug, info, instrument};

use crate::cache::{CacheError, GameCache, GameView, MyGamesView};
use crate::chain::{self, ChainError};
use crate::codec::{CodecError, MoveCodec};
use crate::protocol::RetryPolicy;
use crate::service::{GameService, IdentityResolver, ServiceError};
use crate::types::{GameEntry, GameId, GameState, MoveRecord, PlayerId};

/// Synchronization failure surfaced to callers.
#[derive(Debug, Clone, Display, Error, From)]
pub enum SyncError {
    /// The operation requires the game to be fetched first.
    #[display("game {} has not been fetched yet", game_id)]
    NotFetched {
        /// The unfetched game.
        game_id: GameId,
    },
    /// Another submission is already in flight for this game.
    #[display("a submission is already in flight for game {}", game_id)]
    SubmissionInProgress {
        /// The contended game.
        game_id: GameId,
    },
    /// The move could not be submitted; the optimistic append has been
    /// rolled back and the local chain is exactly as before the call.
    #[display("move rejected for game {}: {}", game_id, cause)]
    MoveRejected {
        /// The game the submission targeted.
        game_id: GameId,
        /// Why the move was rejected.
        cause: RejectCause,
    },
    /// The backend has no record of the requested game.
    #[display("game {} is unknown to the backend", game_id)]
    NotFound {
        /// The requested game.
        game_id: GameId,
    },
    /// A move payload could not be decoded; nothing was cached.
    #[display("malformed move payload: {}", _0)]
    #[from]
    Malformed(CodecError),
    /// A fetched move history does not form a single causal chain.
    #[display("invalid move history: {}", _0)]
    #[from]
    Chain(ChainError),
    /// A cache operation failed.
    #[display("cache operation failed: {}", _0)]
    #[from]
    Cache(CacheError),
    /// A backend call failed.
    #[display("backend call failed: {}", _0)]
    #[from]
    Service(ServiceError),
}

/// Why a submission was rejected.
#[derive(Debug, Clone, Display, Error)]
pub enum RejectCause {
    /// Every attempt saw the predecessor still invisible to the backend.
    #[display("retry budget exhausted after {} attempts waiting for predecessor visibility", attempts)]
    RetriesExhausted {
        /// How many submission attempts were made.
        attempts: u32,
    },
    /// The backend rejected the move with a non-recoverable failure.
    #[display("{}", _0)]
    Backend(ServiceError),
}

pub(crate) struct StoreInner<M> {
    pub(crate) me: PlayerId,
    pub(crate) service: Arc<dyn GameService>,
    pub(crate) identities: Arc<dyn IdentityResolver>,
    pub(crate) codec: Arc<dyn MoveCodec<M>>,
    pub(crate) retry: RetryPolicy,
    pub(crate) cache: Mutex<GameCache<M>>,
    pub(crate) in_flight: Mutex<HashSet<GameId>>,
}

/// Clone-cheap handle to the synchronization engine for one participant.
pub struct GameStore<M> {
    pub(crate) inner: Arc<StoreInner<M>>,
}

impl<M> Clone for GameStore<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M> GameStore<M>
where
    M: Clone + Send + Sync + 'static,
{
    /// Creates a store for the given local participant.
    #[instrument(skip_all, fields(me = %me))]
    pub fn new(
        me: PlayerId,
        service: Arc<dyn GameService>,
        identities: Arc<dyn IdentityResolver>,
        codec: Arc<dyn MoveCodec<M>>,
        retry: RetryPolicy,
    ) -> Self {
        info!("Creating game store");
        Self {
            inner: Arc::new(StoreInner {
                cache: Mutex::new(GameCache::new(me.clone())),
                me,
                service,
                identities,
                codec,
                retry,
                in_flight: Mutex::new(HashSet::new()),
            }),
        }
    }

    /// Returns the local participant.
    pub fn me(&self) -> &PlayerId {
        &self.inner.me
    }

    /// Returns the other participant of a game.
    pub fn opponent(&self, entry: &GameEntry) -> PlayerId {
        entry.opponent_of(&self.inner.me).clone()
    }

    /// Returns a snapshot of a game's cached state.
    pub fn game_state(&self, game_id: &GameId) -> Option<GameState<M>> {
        self.inner.cache.lock().unwrap().get(game_id).cloned()
    }

    /// Subscribes to the games the local participant plays in.
    pub fn my_games(&self) -> MyGamesView {
        self.inner.cache.lock().unwrap().subscribe_my_games()
    }

    /// Subscribes to a single game's state.
    pub fn game(&self, game_id: &GameId) -> GameView<M> {
        self.inner.cache.lock().unwrap().subscribe_game(game_id)
    }

    /// Fetches a game entry into the cache.
    ///
    /// Game entries are immutable, so a cached game is not fetched again.
    /// Resolves both players' identities before caching.
    #[instrument(skip(self), fields(me = %self.inner.me))]
    pub async fn fetch_game(&self, game_id: &GameId) -> Result<(), SyncError> {
        if self.inner.cache.lock().unwrap().contains(game_id) {
            debug!(game_id = %game_id, "Game already cached, skipping fetch");
            return Ok(());
        }

        let entry = match self.inner.service.fetch_game(game_id).await {
            Ok(entry) => entry,
            Err(ServiceError::NotFound { game_id }) => {
                return Err(SyncError::NotFound { game_id });
            }
            Err(error) => return Err(SyncError::Service(error)),
        };

        self.inner
            .identities
            .resolve(&entry.players)
            .await
            .map_err(SyncError::Service)?;

        self.inner.cache.lock().unwrap().upsert_game(game_id, entry);
        info!(game_id = %game_id, "Fetched game");
        Ok(())
    }

    /// Fetches all games the local participant plays in.
    ///
    /// Resolves every opponent's identity, then upserts each entry; cached
    /// move histories are never dropped by a refresh.
    #[instrument(skip(self), fields(me = %self.inner.me))]
    pub async fn fetch_my_current_games(&self) -> Result<(), SyncError> {
        let games = self
            .inner
            .service
            .fetch_my_current_games()
            .await
            .map_err(SyncError::Service)?;

        let opponents: Vec<PlayerId> = games.values().map(|entry| self.opponent(entry)).collect();
        self.inner
            .identities
            .resolve(&opponents)
            .await
            .map_err(SyncError::Service)?;

        let count = games.len();
        let mut cache = self.inner.cache.lock().unwrap();
        for (game_id, entry) in games {
            cache.upsert_game(&game_id, entry);
        }
        drop(cache);

        info!(count, "Fetched current games");
        Ok(())
    }

    /// Fetches the authoritative full move history of a game and replaces
    /// the cached chain with it.
    ///
    /// The fetched batch is reordered by its predecessor links and every
    /// payload is decoded before anything is cached. No-op if the game is
    /// not cached.
    #[instrument(skip(self), fields(me = %self.inner.me))]
    pub async fn fetch_game_moves(&self, game_id: &GameId) -> Result<(), SyncError> {
        let raw = self
            .inner
            .service
            .fetch_moves(game_id)
            .await
            .map_err(SyncError::Service)?;

        let ordered = chain::order_moves(raw)?;

        let mut moves = Vec::with_capacity(ordered.len());
        for (move_id, envelope) in ordered {
            let game_move = self.inner.codec.decode(&envelope.payload)?;
            moves.push(MoveRecord {
                move_id: Some(move_id),
                author: envelope.author,
                game_id: envelope.game_id,
                game_move,
                previous_move_id: envelope.previous_move_id,
            });
        }

        let count = moves.len();
        self.inner.cache.lock().unwrap().replace_moves(game_id, moves);
        info!(game_id = %game_id, count, "Fetched move history");
        Ok(())
    }

    /// Returns a snapshot of all cached games of the local participant.
    pub fn my_games_snapshot(&self) -> HashMap<GameId, GameEntry> {
        self.my_games().borrow().clone()
    }
}
