//! Causal ordering of move histories.
//!
//! The backend stores moves as a linked chain: each move names its
//! predecessor, and only the first move of a game has none. A fetched batch
//! may arrive in any order; [`order_moves`] reassembles the chain and
//! rejects histories that do not form a single unbroken line.

use std::collections::HashMap;

use derive_more::{Display, Error};
use tracing::instrument;

use crate::types::{MoveEnvelope, MoveId};

/// A move history that does not form a single causal chain.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum ChainError {
    /// Two moves claim the same predecessor.
    #[display("two moves claim move {} as their predecessor", move_id)]
    Forked {
        /// The contested predecessor.
        move_id: MoveId,
    },
    /// More than one move has no predecessor.
    #[display("history contains more than one first move")]
    TwoFirstMoves,
    /// The same move identifier appears twice.
    #[display("history contains two moves with id {}", move_id)]
    DuplicateMove {
        /// The repeated identifier.
        move_id: MoveId,
    },
    /// No move without a predecessor exists.
    #[display("history has no first move")]
    NoFirstMove,
    /// A referenced predecessor is missing from the batch.
    #[display("move {} is referenced but missing from the history", move_id)]
    MissingMove {
        /// The missing identifier.
        move_id: MoveId,
    },
    /// Some moves are unreachable from the first move.
    #[display("{} moves are not connected to the chain", count)]
    Disconnected {
        /// How many moves were left over.
        count: usize,
    },
}

/// Orders an unordered batch of moves by their predecessor links.
///
/// Returns the moves from the first move of the game to the tail, or an
/// error if the batch is forked, has duplicates, or is missing links.
#[instrument(skip(moves), fields(count = moves.len()))]
pub fn order_moves(
    moves: Vec<(MoveId, MoveEnvelope)>,
) -> Result<Vec<(MoveId, MoveEnvelope)>, ChainError> {
    if moves.is_empty() {
        return Ok(Vec::new());
    }

    // predecessor id -> successor id
    let mut successors: HashMap<MoveId, MoveId> = HashMap::new();
    let mut by_id: HashMap<MoveId, MoveEnvelope> = HashMap::new();
    let mut first: Option<MoveId> = None;

    for (move_id, envelope) in moves {
        match &envelope.previous_move_id {
            Some(previous) => {
                if successors.insert(previous.clone(), move_id.clone()).is_some() {
                    return Err(ChainError::Forked {
                        move_id: previous.clone(),
                    });
                }
            }
            None => {
                if first.is_some() {
                    return Err(ChainError::TwoFirstMoves);
                }
                first = Some(move_id.clone());
            }
        }
        if by_id.insert(move_id.clone(), envelope).is_some() {
            return Err(ChainError::DuplicateMove { move_id });
        }
    }

    let first = first.ok_or(ChainError::NoFirstMove)?;

    let mut ordered = Vec::with_capacity(by_id.len());
    let mut cursor = Some(first);
    while let Some(move_id) = cursor {
        let envelope = by_id.remove(&move_id).ok_or_else(|| ChainError::MissingMove {
            move_id: move_id.clone(),
        })?;
        cursor = successors.get(&move_id).cloned();
        ordered.push((move_id, envelope));
    }

    if !by_id.is_empty() {
        return Err(ChainError::Disconnected { count: by_id.len() });
    }

    Ok(ordered)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(previous: Option<&str>) -> MoveEnvelope {
        MoveEnvelope::new(
            "alice".to_string(),
            "g1".to_string(),
            vec![],
            previous.map(|m| m.to_string()),
        )
    }

    fn link(move_id: &str, previous: Option<&str>) -> (MoveId, MoveEnvelope) {
        (move_id.to_string(), envelope(previous))
    }

    #[test]
    fn test_empty_history_is_ordered() {
        let ordered = order_moves(vec![]).expect("Order failed");
        assert!(ordered.is_empty());
    }

    #[test]
    fn test_orders_shuffled_history() {
        let moves = vec![
            link("m3", Some("m2")),
            link("m1", None),
            link("m2", Some("m1")),
        ];
        let ordered = order_moves(moves).expect("Order failed");
        let ids: Vec<&str> = ordered.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2", "m3"]);
    }

    #[test]
    fn test_forked_history_fails() {
        let moves = vec![
            link("m1", None),
            link("m2", Some("m1")),
            link("m3", Some("m1")),
        ];
        assert!(matches!(order_moves(moves), Err(ChainError::Forked { .. })));
    }

    #[test]
    fn test_two_first_moves_fail() {
        let moves = vec![link("m1", None), link("m2", None)];
        assert_eq!(order_moves(moves), Err(ChainError::TwoFirstMoves));
    }

    #[test]
    fn test_duplicate_move_id_fails() {
        let moves = vec![link("m1", None), link("m1", Some("m0"))];
        assert!(matches!(
            order_moves(moves),
            Err(ChainError::DuplicateMove { .. })
        ));
    }

    #[test]
    fn test_missing_first_move_fails() {
        let moves = vec![link("m2", Some("m1")), link("m3", Some("m2"))];
        assert_eq!(order_moves(moves), Err(ChainError::NoFirstMove));
    }

    #[test]
    fn test_broken_link_fails() {
        let moves = vec![link("m1", None), link("m3", Some("m2"))];
        assert!(matches!(
            order_moves(moves),
            Err(ChainError::Disconnected { count: 1 })
        ));
    }
}
