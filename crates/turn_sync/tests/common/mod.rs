//! Shared test doubles for the store integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use turn_sync::{
    GameEntry, GameId, GameService, GameStore, IdentityResolver, JsonMoveCodec, MoveEnvelope,
    MoveId, PlayerId, RetryPolicy, ServiceError,
};

/// Move payload used throughout the tests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub x: u8,
    pub y: u8,
}

/// Creates a game entry between the two players.
pub fn entry(a: &str, b: &str) -> GameEntry {
    GameEntry::new([a.to_string(), b.to_string()], Utc::now())
}

/// Encodes a placement the way the JSON codec does.
pub fn payload(x: u8, y: u8) -> Vec<u8> {
    serde_json::to_vec(&Placement { x, y }).expect("Encode failed")
}

/// An in-memory backend with scripted submission responses.
///
/// Fetches serve the configured maps; each `submit_move` call consumes the
/// next scripted response and records what was submitted. An optional gate
/// semaphore makes submissions block until the test releases them.
pub struct ScriptedGameService {
    pub games: Mutex<HashMap<GameId, GameEntry>>,
    pub moves: Mutex<HashMap<GameId, Vec<(MoveId, MoveEnvelope)>>>,
    pub submit_script: Mutex<VecDeque<Result<MoveId, ServiceError>>>,
    pub submissions: Mutex<Vec<(GameId, Option<MoveId>, Vec<u8>)>>,
    pub fetch_game_calls: Mutex<u32>,
    pub current_games_calls: Mutex<u32>,
    pub gate: Option<Arc<Semaphore>>,
}

impl ScriptedGameService {
    pub fn new() -> Self {
        Self {
            games: Mutex::new(HashMap::new()),
            moves: Mutex::new(HashMap::new()),
            submit_script: Mutex::new(VecDeque::new()),
            submissions: Mutex::new(Vec::new()),
            fetch_game_calls: Mutex::new(0),
            current_games_calls: Mutex::new(0),
            gate: None,
        }
    }

    pub fn with_gate(gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new()
        }
    }

    pub fn insert_game(&self, game_id: &str, entry: GameEntry) {
        self.games.lock().unwrap().insert(game_id.to_string(), entry);
    }

    pub fn insert_moves(&self, game_id: &str, moves: Vec<(MoveId, MoveEnvelope)>) {
        self.moves.lock().unwrap().insert(game_id.to_string(), moves);
    }

    pub fn script_submit(&self, response: Result<&str, ServiceError>) {
        self.submit_script
            .lock()
            .unwrap()
            .push_back(response.map(|id| id.to_string()));
    }

    pub fn submission_count(&self) -> usize {
        self.submissions.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl GameService for ScriptedGameService {
    async fn fetch_game(&self, game_id: &GameId) -> Result<GameEntry, ServiceError> {
        *self.fetch_game_calls.lock().unwrap() += 1;
        self.games
            .lock()
            .unwrap()
            .get(game_id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound {
                game_id: game_id.clone(),
            })
    }

    async fn fetch_my_current_games(&self) -> Result<HashMap<GameId, GameEntry>, ServiceError> {
        *self.current_games_calls.lock().unwrap() += 1;
        Ok(self.games.lock().unwrap().clone())
    }

    async fn fetch_moves(
        &self,
        game_id: &GameId,
    ) -> Result<Vec<(MoveId, MoveEnvelope)>, ServiceError> {
        Ok(self
            .moves
            .lock()
            .unwrap()
            .get(game_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn submit_move(
        &self,
        game_id: &GameId,
        previous_move_id: Option<&MoveId>,
        payload: &[u8],
    ) -> Result<MoveId, ServiceError> {
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("Gate closed").forget();
        }
        self.submissions.lock().unwrap().push((
            game_id.clone(),
            previous_move_id.cloned(),
            payload.to_vec(),
        ));
        self.submit_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(ServiceError::Backend {
                    message: "no scripted response".to_string(),
                })
            })
    }
}

/// Resolver that always succeeds.
pub struct NoopResolver;

#[async_trait::async_trait]
impl IdentityResolver for NoopResolver {
    async fn resolve(&self, _players: &[PlayerId]) -> Result<(), ServiceError> {
        Ok(())
    }
}

/// Resolver that fails a configured number of times, then succeeds.
pub struct FlakyResolver {
    pub remaining_failures: Mutex<u32>,
}

impl FlakyResolver {
    pub fn failing(times: u32) -> Self {
        Self {
            remaining_failures: Mutex::new(times),
        }
    }
}

#[async_trait::async_trait]
impl IdentityResolver for FlakyResolver {
    async fn resolve(&self, _players: &[PlayerId]) -> Result<(), ServiceError> {
        let mut remaining = self.remaining_failures.lock().unwrap();
        if *remaining > 0 {
            *remaining -= 1;
            return Err(ServiceError::Backend {
                message: "identity lookup failed".to_string(),
            });
        }
        Ok(())
    }
}

/// Creates a store over the scripted service with the default retry
/// policy.
pub fn test_store(me: &str, service: Arc<ScriptedGameService>) -> GameStore<Placement> {
    test_store_with_retry(me, service, RetryPolicy::default())
}

/// Creates a store over the scripted service with the given retry policy.
pub fn test_store_with_retry(
    me: &str,
    service: Arc<ScriptedGameService>,
    retry: RetryPolicy,
) -> GameStore<Placement> {
    GameStore::new(
        me.to_string(),
        service,
        Arc::new(NoopResolver),
        Arc::new(JsonMoveCodec),
        retry,
    )
}

/// A short retry policy so exhaustion tests stay small.
pub fn short_retry() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_millis(100))
}
