//! Core domain types for the game synchronization engine.

use chrono::serde::ts_milliseconds;
use chrono::{DateTime, Utc};
use derive_new::new;
use serde::{Deserialize, Serialize};

/// Unique identifier for a game, assigned by the backend.
pub type GameId = String;

/// Unique identifier for a participant.
pub type PlayerId = String;

/// Unique identifier for a confirmed move, assigned by the backend.
pub type MoveId = String;

/// A game between exactly two participants.
///
/// Immutable once created: the backend never edits a game entry, so a cached
/// copy stays valid for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, new)]
pub struct GameEntry {
    /// The two participants. The pair is unordered.
    pub players: [PlayerId; 2],
    /// When the game was created, as reported by the backend.
    #[serde(with = "ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl GameEntry {
    /// Checks whether the given participant plays in this game.
    pub fn has_player(&self, player: &PlayerId) -> bool {
        self.players.contains(player)
    }

    /// Returns the other participant of the game.
    ///
    /// If `player` is not part of the game, the first participant is
    /// returned.
    pub fn opponent_of(&self, player: &PlayerId) -> &PlayerId {
        if self.players[0] == *player {
            &self.players[1]
        } else {
            &self.players[0]
        }
    }
}

/// Wire form of a move: the payload is opaque bytes until decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, new)]
pub struct MoveEnvelope {
    /// The participant who authored the move.
    pub author: PlayerId,
    /// The game the move belongs to.
    pub game_id: GameId,
    /// Encoded move payload.
    pub payload: Vec<u8>,
    /// The causal predecessor move, absent only for the first move.
    pub previous_move_id: Option<MoveId>,
}

/// One submitted move in a game's causal chain, with its payload decoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveRecord<M> {
    /// Backend-assigned identifier, absent until the backend confirms the
    /// move. Once set it never changes.
    pub move_id: Option<MoveId>,
    /// The participant who authored the move.
    pub author: PlayerId,
    /// The game the move belongs to.
    pub game_id: GameId,
    /// The decoded move payload.
    pub game_move: M,
    /// The causal predecessor move, absent only for the first move.
    pub previous_move_id: Option<MoveId>,
}

/// The cached state of one game: its entry plus the move chain in local
/// causal-submission order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState<M> {
    /// The immutable game entry.
    pub entry: GameEntry,
    /// Moves ordered by causal submission. For consecutive confirmed pairs,
    /// each move's `previous_move_id` equals its predecessor's `move_id`.
    pub moves: Vec<MoveRecord<M>>,
}

impl<M> GameState<M> {
    /// Creates a game state with an empty move chain.
    pub fn new(entry: GameEntry) -> Self {
        Self {
            entry,
            moves: Vec::new(),
        }
    }

    /// Returns the confirmed identifier of the last move in the chain, if
    /// the chain is non-empty and its tail has been confirmed.
    pub fn tail_move_id(&self) -> Option<&MoveId> {
        self.moves.last().and_then(|m| m.move_id.as_ref())
    }

    /// Checks whether a move with the given confirmed identifier is already
    /// part of the chain.
    pub fn has_move(&self, move_id: &MoveId) -> bool {
        self.moves
            .iter()
            .any(|m| m.move_id.as_ref() == Some(move_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(a: &str, b: &str) -> GameEntry {
        GameEntry::new([a.to_string(), b.to_string()], Utc::now())
    }

    #[test]
    fn test_has_player() {
        let game = entry("alice", "bob");
        assert!(game.has_player(&"alice".to_string()));
        assert!(game.has_player(&"bob".to_string()));
        assert!(!game.has_player(&"carol".to_string()));
    }

    #[test]
    fn test_opponent_of() {
        let game = entry("alice", "bob");
        assert_eq!(game.opponent_of(&"alice".to_string()), "bob");
        assert_eq!(game.opponent_of(&"bob".to_string()), "alice");
    }

    #[test]
    fn test_tail_move_id_skips_unconfirmed() {
        let mut state: GameState<u8> = GameState::new(entry("alice", "bob"));
        assert!(state.tail_move_id().is_none());

        state.moves.push(MoveRecord {
            move_id: None,
            author: "alice".to_string(),
            game_id: "g1".to_string(),
            game_move: 7,
            previous_move_id: None,
        });
        assert!(state.tail_move_id().is_none());

        state.moves[0].move_id = Some("m1".to_string());
        assert_eq!(state.tail_move_id(), Some(&"m1".to_string()));
    }

    #[test]
    fn test_has_move() {
        let mut state: GameState<u8> = GameState::new(entry("alice", "bob"));
        state.moves.push(MoveRecord {
            move_id: Some("m1".to_string()),
            author: "alice".to_string(),
            game_id: "g1".to_string(),
            game_move: 7,
            previous_move_id: None,
        });
        assert!(state.has_move(&"m1".to_string()));
        assert!(!state.has_move(&"m2".to_string()));
    }

    #[test]
    fn test_game_entry_timestamp_round_trips_as_millis() {
        let game = entry("alice", "bob");
        let json = serde_json::to_string(&game).expect("serialize failed");
        let back: GameEntry = serde_json::from_str(&json).expect("deserialize failed");
        assert_eq!(back.players, game.players);
        assert_eq!(
            back.created_at.timestamp_millis(),
            game.created_at.timestamp_millis()
        );
    }
}
