//! Boundary traits for the remote game backend.
//!
//! The engine never talks to a transport directly; it depends on these
//! traits and leaves latency, retries below a single call, and wire
//! encoding to the implementation.

use std::collections::HashMap;

use derive_more::{Display, Error};

use crate::types::{GameEntry, GameId, MoveEnvelope, MoveId, PlayerId};

/// Remote operations the engine depends on.
///
/// Calls have unspecified latency and may be slow to reflect causally-prior
/// writes made by other peers.
#[async_trait::async_trait]
pub trait GameService: Send + Sync {
    /// Fetches a single game entry.
    ///
    /// Fails with [`ServiceError::NotFound`] if the identifier is unknown
    /// to the backend.
    async fn fetch_game(&self, game_id: &GameId) -> Result<GameEntry, ServiceError>;

    /// Fetches all games the calling participant plays in.
    async fn fetch_my_current_games(&self) -> Result<HashMap<GameId, GameEntry>, ServiceError>;

    /// Fetches the authoritative full move history of a game.
    async fn fetch_moves(&self, game_id: &GameId)
    -> Result<Vec<(MoveId, MoveEnvelope)>, ServiceError>;

    /// Submits a move causally after `previous_move_id`.
    ///
    /// Implementations must report the expected causal-visibility race with
    /// [`ServiceError::PredecessorNotVisible`] so the caller can distinguish
    /// it from permanent rejections.
    async fn submit_move(
        &self,
        game_id: &GameId,
        previous_move_id: Option<&MoveId>,
        payload: &[u8],
    ) -> Result<MoveId, ServiceError>;
}

/// Resolves participant identifiers into an external identity cache.
///
/// The engine only triggers resolution; it never owns the resolved
/// profiles.
#[async_trait::async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Resolves the given participants, populating the identity cache as a
    /// side effect.
    async fn resolve(&self, players: &[PlayerId]) -> Result<(), ServiceError>;
}

/// Typed classification of backend failures.
///
/// The recoverable causal-visibility race is a dedicated variant rather
/// than a description-text convention, so callers never inspect error
/// messages.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum ServiceError {
    /// The backend has no record of the requested game.
    #[display("game {} is unknown to the backend", game_id)]
    NotFound {
        /// The requested game.
        game_id: GameId,
    },
    /// The submitted move references a predecessor the backend has not yet
    /// indexed. Expected under eventual consistency and recoverable by
    /// retrying.
    #[display("predecessor move is not yet visible to the backend for game {}", game_id)]
    PredecessorNotVisible {
        /// The game the submission targeted.
        game_id: GameId,
    },
    /// Any other backend failure.
    #[display("backend call failed: {}", message)]
    Backend {
        /// Description of the failure.
        message: String,
    },
}

impl ServiceError {
    /// Checks whether this failure is the recoverable causal-visibility
    /// race.
    pub fn is_causal_visibility_race(&self) -> bool {
        matches!(self, ServiceError::PredecessorNotVisible { .. })
    }
}
