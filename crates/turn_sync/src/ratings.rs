//! Aggregated rating and match-result cache.
//!
//! A smaller sibling of the game store built on the same pattern: owned
//! state behind a mutation API, a backend boundary trait, reactive views,
//! and a signal handler folding remote notifications in. Ratings are
//! computed by the backend; this cache only stores and projects them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use derive_new::new;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, instrument};

use crate::service::{IdentityResolver, ServiceError};
use crate::store::SyncError;
use crate::types::PlayerId;

/// Unique identifier for a recorded match result.
pub type ResultId = String;

/// One player's side of a match result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, new)]
pub struct RatingUpdate {
    /// The rated player.
    pub player: PlayerId,
    /// The player's rating after this result.
    pub current_rating: f64,
    /// The player's previous result, absent for their first recorded
    /// match.
    pub previous_result: Option<ResultId>,
}

/// The outcome of one match between two players.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, new)]
pub struct MatchResult {
    /// First player's update.
    pub player_a: RatingUpdate,
    /// Second player's update.
    pub player_b: RatingUpdate,
    /// Score of the first player: 1.0 win, 0.5 draw, 0.0 loss.
    pub score_player_a: f64,
}

impl MatchResult {
    /// Returns the opponent of the given player in this match.
    ///
    /// If `player` took part in neither side, the first player is
    /// returned.
    pub fn opponent_of(&self, player: &PlayerId) -> &PlayerId {
        if self.player_a.player == *player {
            &self.player_b.player
        } else {
            &self.player_a.player
        }
    }

    /// Returns the score of the given player in this match.
    pub fn score_of(&self, player: &PlayerId) -> f64 {
        if self.player_a.player == *player {
            self.score_player_a
        } else {
            1.0 - self.score_player_a
        }
    }

    /// Returns both players of the match.
    pub fn players(&self) -> [PlayerId; 2] {
        [self.player_a.player.clone(), self.player_b.player.clone()]
    }
}

/// A match outcome from one player's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ShortResult {
    /// The player won.
    Win,
    /// The match was drawn.
    Draw,
    /// The player lost.
    Loss,
}

impl ShortResult {
    /// Returns the score value of this outcome.
    pub fn score(self) -> f64 {
        match self {
            ShortResult::Win => 1.0,
            ShortResult::Draw => 0.5,
            ShortResult::Loss => 0.0,
        }
    }

    /// Classifies a score value as an outcome.
    pub fn from_score(score: f64) -> Self {
        if score > 0.5 {
            ShortResult::Win
        } else if score < 0.5 {
            ShortResult::Loss
        } else {
            ShortResult::Draw
        }
    }
}

/// Remote operations the rating cache depends on.
#[async_trait::async_trait]
pub trait RatingService: Send + Sync {
    /// Fetches the recorded match results of the given players, newest
    /// first.
    async fn fetch_results_for(
        &self,
        players: &[PlayerId],
    ) -> Result<HashMap<PlayerId, Vec<(ResultId, MatchResult)>>, ServiceError>;

    /// Fetches the current ratings of the given players.
    async fn fetch_ratings_for(
        &self,
        players: &[PlayerId],
    ) -> Result<HashMap<PlayerId, f64>, ServiceError>;
}

/// A push notification about a newly recorded match result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, strum::Display)]
pub enum RatingSignal {
    /// A match involving the local participant was scored.
    NewGameResult {
        /// The identifier of the recorded result.
        result_id: ResultId,
        /// The result itself.
        result: MatchResult,
    },
}

struct RatingState {
    results_by_player: HashMap<PlayerId, Vec<(ResultId, MatchResult)>>,
    ratings_by_player: HashMap<PlayerId, f64>,
    ratings_tx: watch::Sender<HashMap<PlayerId, f64>>,
    ranking_tx: watch::Sender<Vec<(PlayerId, f64)>>,
}

impl RatingState {
    /// Re-emits the rating views. Runs synchronously within the mutation
    /// that triggered it.
    fn publish(&self) {
        self.ratings_tx.send_replace(self.ratings_by_player.clone());

        let mut ranking: Vec<(PlayerId, f64)> = self
            .ratings_by_player
            .iter()
            .map(|(player, rating)| (player.clone(), *rating))
            .collect();
        ranking.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        self.ranking_tx.send_replace(ranking);
    }
}

struct RatingInner {
    me: PlayerId,
    service: Arc<dyn RatingService>,
    identities: Arc<dyn IdentityResolver>,
    state: Mutex<RatingState>,
}

/// Clone-cheap handle to the rating cache for one participant.
pub struct RatingStore {
    inner: Arc<RatingInner>,
}

impl Clone for RatingStore {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl RatingStore {
    /// Creates a rating store for the given local participant.
    #[instrument(skip_all, fields(me = %me))]
    pub fn new(
        me: PlayerId,
        service: Arc<dyn RatingService>,
        identities: Arc<dyn IdentityResolver>,
    ) -> Self {
        info!("Creating rating store");
        let (ratings_tx, _) = watch::channel(HashMap::new());
        let (ranking_tx, _) = watch::channel(Vec::new());
        Self {
            inner: Arc::new(RatingInner {
                me,
                service,
                identities,
                state: Mutex::new(RatingState {
                    results_by_player: HashMap::new(),
                    ratings_by_player: HashMap::new(),
                    ratings_tx,
                    ranking_tx,
                }),
            }),
        }
    }

    /// Returns the local participant.
    pub fn me(&self) -> &PlayerId {
        &self.inner.me
    }

    /// Subscribes to the ratings of all cached players.
    pub fn ratings(&self) -> watch::Receiver<HashMap<PlayerId, f64>> {
        self.inner.state.lock().unwrap().ratings_tx.subscribe()
    }

    /// Subscribes to the cached players ranked by rating, best first.
    pub fn ranking(&self) -> watch::Receiver<Vec<(PlayerId, f64)>> {
        self.inner.state.lock().unwrap().ranking_tx.subscribe()
    }

    /// Returns the local participant's cached rating, if fetched.
    pub fn my_rating(&self) -> Option<f64> {
        self.inner
            .state
            .lock()
            .unwrap()
            .ratings_by_player
            .get(&self.inner.me)
            .copied()
    }

    /// Returns the local participant's cached match results.
    pub fn my_results(&self) -> Vec<(ResultId, MatchResult)> {
        self.inner
            .state
            .lock()
            .unwrap()
            .results_by_player
            .get(&self.inner.me)
            .cloned()
            .unwrap_or_default()
    }

    /// Fetches the local participant's match results.
    #[instrument(skip(self), fields(me = %self.inner.me))]
    pub async fn fetch_my_results(&self) -> Result<(), SyncError> {
        self.fetch_results_for(std::slice::from_ref(&self.inner.me))
            .await
    }

    /// Fetches the local participant's rating.
    #[instrument(skip(self), fields(me = %self.inner.me))]
    pub async fn fetch_my_rating(&self) -> Result<(), SyncError> {
        self.fetch_ratings_for(std::slice::from_ref(&self.inner.me))
            .await
    }

    /// Fetches and caches the match results of the given players.
    #[instrument(skip(self), fields(me = %self.inner.me))]
    pub async fn fetch_results_for(&self, players: &[PlayerId]) -> Result<(), SyncError> {
        let results = self
            .inner
            .service
            .fetch_results_for(players)
            .await
            .map_err(SyncError::Service)?;

        let count = results.len();
        let mut state = self.inner.state.lock().unwrap();
        state.results_by_player.extend(results);
        state.publish();
        drop(state);

        debug!(players = count, "Cached match results");
        Ok(())
    }

    /// Fetches and caches the ratings of the given players.
    #[instrument(skip(self), fields(me = %self.inner.me))]
    pub async fn fetch_ratings_for(&self, players: &[PlayerId]) -> Result<(), SyncError> {
        let ratings = self
            .inner
            .service
            .fetch_ratings_for(players)
            .await
            .map_err(SyncError::Service)?;

        let count = ratings.len();
        let mut state = self.inner.state.lock().unwrap();
        state.ratings_by_player.extend(ratings);
        state.publish();
        drop(state);

        debug!(players = count, "Cached ratings");
        Ok(())
    }

    /// Folds one remote notification into the cache.
    ///
    /// A new result changes both players' aggregates, so their results,
    /// ratings, and identities are refreshed together.
    #[instrument(skip(self, signal), fields(me = %self.inner.me, signal = %signal))]
    pub async fn handle_signal(&self, signal: RatingSignal) -> Result<(), SyncError> {
        match signal {
            RatingSignal::NewGameResult { result_id, result } => {
                let players = result.players();
                let resolve = async {
                    self.inner
                        .identities
                        .resolve(&players)
                        .await
                        .map_err(SyncError::Service)
                };
                tokio::try_join!(
                    self.fetch_results_for(&players),
                    self.fetch_ratings_for(&players),
                    resolve,
                )?;
                info!(result_id = %result_id, "Match result reconciled");
                Ok(())
            }
        }
    }
}
