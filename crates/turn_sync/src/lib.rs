//! Client-side synchronization engine for turn-based two-player games.
//!
//! Keeps a local, reactive view of games consistent with an
//! eventually-consistent backend that has no global lock and no delivery
//! order: moves form a causal chain per game, and the backend may be slow
//! to reflect a peer's just-written move.
//!
//! # Architecture
//!
//! - **Store**: [`GameStore`], the per-game state cache and its reactive
//!   views
//! - **Protocol**: optimistic move submission with bounded fixed-delay
//!   retry against the causal-visibility race
//! - **Signals**: reconciliation of unordered remote notifications
//!   ([`GameSignal`]) into the cache
//! - **Boundary**: [`GameService`], [`IdentityResolver`], and
//!   [`MoveCodec`] traits the transport layer implements
//! - **Ratings**: [`RatingStore`], the aggregated rating/result sibling
//!   cache
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use turn_sync::{GameStore, JsonMoveCodec, RetryPolicy};
//!
//! # #[derive(Clone, serde::Serialize, serde::Deserialize)]
//! # struct Placement { x: u8, y: u8 }
//! # async fn example(
//! #     service: Arc<dyn turn_sync::GameService>,
//! #     identities: Arc<dyn turn_sync::IdentityResolver>,
//! # ) -> Result<(), turn_sync::SyncError> {
//! let store: GameStore<Placement> = GameStore::new(
//!     "alice".to_string(),
//!     service,
//!     identities,
//!     Arc::new(JsonMoveCodec),
//!     RetryPolicy::default(),
//! );
//!
//! store.fetch_my_current_games().await?;
//! let move_id = store
//!     .submit_move(&"game1".to_string(), Placement { x: 0, y: 0 })
//!     .await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod cache;
mod chain;
mod codec;
mod config;
mod protocol;
mod ratings;
mod refresh;
mod service;
mod signals;
mod store;
mod types;

// Crate-level exports - Store and error taxonomy
pub use store::{GameStore, RejectCause, SyncError};

// Crate-level exports - Cache views
pub use cache::{CacheError, GameView, MyGamesView};

// Crate-level exports - Submission protocol
pub use protocol::RetryPolicy;

// Crate-level exports - Signals
pub use signals::GameSignal;

// Crate-level exports - Backend boundary
pub use service::{GameService, IdentityResolver, ServiceError};

// Crate-level exports - Move codec
pub use codec::{CodecError, JsonMoveCodec, MoveCodec};

// Crate-level exports - Chain ordering
pub use chain::{ChainError, order_moves};

// Crate-level exports - Domain types
pub use types::{GameEntry, GameId, GameState, MoveEnvelope, MoveId, MoveRecord, PlayerId};

// Crate-level exports - Ratings
pub use ratings::{
    MatchResult, RatingService, RatingSignal, RatingStore, RatingUpdate, ResultId, ShortResult,
};

// Crate-level exports - Periodic refresh
pub use refresh::RefreshTask;

// Crate-level exports - Configuration
pub use config::{ConfigError, SyncConfig};
