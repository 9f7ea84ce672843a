//! The move submission protocol.
//!
//! Submitting a move is an optimistic local append followed by a bounded
//! retry loop against the backend. The backend's consistency model permits
//! a submission to momentarily reference a predecessor the backend has not
//! yet indexed; that race is absorbed here with a fixed-delay retry instead
//! of surfacing transient noise to the caller.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use derive_new::new;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

use crate::store::{GameStore, RejectCause, SyncError};
use crate::types::{GameId, MoveId, MoveRecord};

/// Retry policy for move submission.
///
/// The delay is deliberately fixed rather than exponential: with two
/// players per game the backend sees little load, and fast turn-around
/// matters more than backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, new)]
pub struct RetryPolicy {
    /// Total number of submission attempts before giving up.
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            delay: Duration::from_secs(1),
        }
    }
}

/// Removes the game from the in-flight set when the submission ends, on
/// every exit path.
struct SubmissionGuard<'a> {
    in_flight: &'a Mutex<HashSet<GameId>>,
    game_id: GameId,
}

impl Drop for SubmissionGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.lock().unwrap().remove(&self.game_id);
    }
}

impl<M> GameStore<M>
where
    M: Clone + Send + Sync + 'static,
{
    /// Submits a move causally after the current tail of the game's chain.
    ///
    /// The move appears in the reactive views immediately as an unconfirmed
    /// record; the backend call then runs under the retry policy. On
    /// success the record is confirmed in place and the backend-assigned
    /// identifier is returned. On rejection or retry exhaustion the append
    /// is rolled back, leaving the chain exactly as before the call.
    ///
    /// # Errors
    ///
    /// - [`SyncError::NotFetched`] if the game is not in the cache.
    /// - [`SyncError::SubmissionInProgress`] if another submission for the
    ///   same game is still in flight.
    /// - [`SyncError::MoveRejected`] after rollback, naming the cause.
    #[instrument(skip(self, game_move), fields(me = %self.inner.me, game_id = %game_id))]
    pub async fn submit_move(&self, game_id: &GameId, game_move: M) -> Result<MoveId, SyncError> {
        let _guard = self.begin_submission(game_id)?;
        let payload = self.inner.codec.encode(&game_move)?;

        // Read the tail and append the placeholder in one cache step, so no
        // other operation can slip in between.
        let (expected_predecessor, index) = {
            let mut cache = self.inner.cache.lock().unwrap();
            let state = cache.get(game_id).ok_or_else(|| SyncError::NotFetched {
                game_id: game_id.clone(),
            })?;
            let previous = state.tail_move_id().cloned();
            let record = MoveRecord {
                move_id: None,
                author: self.inner.me.clone(),
                game_id: game_id.clone(),
                game_move,
                previous_move_id: previous.clone(),
            };
            let index = cache.append_move(game_id, record)?;
            (previous, index)
        };
        info!(index, previous = ?expected_predecessor, "Optimistically appended move");

        let policy = self.inner.retry;
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self
                .inner
                .service
                .submit_move(game_id, expected_predecessor.as_ref(), &payload)
                .await
            {
                Ok(move_id) => {
                    self.inner
                        .cache
                        .lock()
                        .unwrap()
                        .confirm_move(game_id, index, move_id.clone())?;
                    info!(move_id = %move_id, attempt, "Move confirmed by backend");
                    return Ok(move_id);
                }
                Err(error) if error.is_causal_visibility_race() && attempt < policy.max_attempts => {
                    debug!(
                        attempt,
                        max_attempts = policy.max_attempts,
                        "Predecessor not yet visible to the backend, retrying"
                    );
                    sleep(policy.delay).await;
                }
                Err(error) => {
                    self.inner.cache.lock().unwrap().remove_tail_move(game_id)?;
                    let cause = if error.is_causal_visibility_race() {
                        warn!(
                            attempts = attempt,
                            "Gave up waiting for predecessor visibility, move rolled back"
                        );
                        RejectCause::RetriesExhausted { attempts: attempt }
                    } else {
                        warn!(error = %error, "Backend rejected move, rolled back");
                        RejectCause::Backend(error)
                    };
                    return Err(SyncError::MoveRejected {
                        game_id: game_id.clone(),
                        cause,
                    });
                }
            }
        }
    }

    /// Marks a submission as in flight for the game, failing fast if one
    /// already is.
    fn begin_submission(&self, game_id: &GameId) -> Result<SubmissionGuard<'_>, SyncError> {
        let mut in_flight = self.inner.in_flight.lock().unwrap();
        if !in_flight.insert(game_id.clone()) {
            return Err(SyncError::SubmissionInProgress {
                game_id: game_id.clone(),
            });
        }
        Ok(SubmissionGuard {
            in_flight: &self.inner.in_flight,
            game_id: game_id.clone(),
        })
    }
}
