//! Reconciliation of asynchronous remote notifications.
//!
//! Signals arrive from the push channel with no ordering guarantee and may
//! be duplicated. Each one is folded into the cache as a small atomic step,
//! and the loop spawned by [`GameStore::spawn_signal_loop`] processes a
//! signal to completion before starting the next, so one game never sees
//! interleaved partial updates from two signals.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::store::{GameStore, SyncError};
use crate::types::{GameEntry, GameId, MoveEnvelope, MoveId, MoveRecord};

/// A push notification about remote game activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, strum::Display)]
pub enum GameSignal {
    /// A game involving the local participant was created.
    GameStarted {
        /// The new game.
        game_id: GameId,
        /// Its entry.
        entry: GameEntry,
    },
    /// An opponent submitted a move.
    NewMove {
        /// The confirmed identifier of the move.
        move_id: MoveId,
        /// The move in wire form.
        envelope: MoveEnvelope,
    },
    /// A game was removed from the participant's current games.
    GameRemoved {
        /// The removed game.
        game_id: GameId,
    },
}

impl<M> GameStore<M>
where
    M: Clone + Send + Sync + 'static,
{
    /// Folds one remote notification into the cache.
    ///
    /// `GameRemoved` is deliberately inert: whether the entry should be
    /// evicted or refetched is unresolved, and the cache keeps the game
    /// rather than silently changing the visible game list. Known
    /// limitation.
    #[instrument(skip(self, signal), fields(me = %self.inner.me, signal = %signal))]
    pub async fn handle_signal(&self, signal: GameSignal) -> Result<(), SyncError> {
        match signal {
            GameSignal::GameStarted { game_id, entry } => {
                let opponent = self.opponent(&entry);
                self.inner
                    .identities
                    .resolve(std::slice::from_ref(&opponent))
                    .await
                    .map_err(SyncError::Service)?;

                self.inner.cache.lock().unwrap().upsert_game(&game_id, entry);
                info!(game_id = %game_id, opponent = %opponent, "Remote game registered");
                Ok(())
            }
            GameSignal::NewMove { move_id, envelope } => {
                let MoveEnvelope {
                    author,
                    game_id,
                    payload,
                    previous_move_id,
                } = envelope;

                if !self.inner.cache.lock().unwrap().contains(&game_id) {
                    debug!(game_id = %game_id, "Not tracking game, dropping move signal");
                    return Ok(());
                }

                let game_move = self.inner.codec.decode(&payload)?;

                // Dedup check and append must happen in one cache step:
                // the same signal can be delivered more than once.
                let mut cache = self.inner.cache.lock().unwrap();
                let Some(state) = cache.get(&game_id) else {
                    debug!(game_id = %game_id, "Not tracking game, dropping move signal");
                    return Ok(());
                };
                if state.has_move(&move_id) {
                    debug!(move_id = %move_id, "Move already cached, dropping duplicate signal");
                    return Ok(());
                }
                let record = MoveRecord {
                    move_id: Some(move_id.clone()),
                    author,
                    game_id: game_id.clone(),
                    game_move,
                    previous_move_id,
                };
                cache.append_move(&game_id, record)?;
                info!(game_id = %game_id, move_id = %move_id, "Remote move appended");
                Ok(())
            }
            GameSignal::GameRemoved { game_id } => {
                debug!(game_id = %game_id, "Game removal signal received, cache kept as is");
                Ok(())
            }
        }
    }

    /// Spawns a task draining the push channel.
    ///
    /// Signals are processed strictly one at a time; a failed
    /// reconciliation is logged and the loop continues. The task ends when
    /// the channel closes.
    pub fn spawn_signal_loop(
        &self,
        mut signals: mpsc::UnboundedReceiver<GameSignal>,
    ) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            while let Some(signal) = signals.recv().await {
                if let Err(error) = store.handle_signal(signal).await {
                    warn!(%error, "Failed to reconcile signal");
                }
            }
            debug!("Push channel closed, signal loop exiting");
        })
    }
}
