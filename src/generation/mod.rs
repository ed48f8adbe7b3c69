//! Generation orchestration.
//!
//! [`AudioGenerator`] composes the credential provider, [`RateLimiter`],
//! [`Transport`] and [`ContentStore`] into one cancellable operation and
//! publishes its progress as a [`GenerationPhase`].
//!
//! [`RateLimiter`]: crate::network::RateLimiter
//! [`Transport`]: crate::network::Transport
//! [`ContentStore`]: crate::storage::ContentStore

pub mod orchestrator;
pub mod state;

pub use orchestrator::{AudioGenerator, GenerationError};
pub use state::{new_shared_phase, GenerationPhase, SharedPhase};
