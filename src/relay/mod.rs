//! Streaming relay
//!
//! Consumes gateway chunks, keeps running reasoning and answer text, and emits
//! the event sequence the front-end renders:
//! - `thinking` for every reasoning delta while no answer has started
//! - `answering` for every non-empty answer delta
//! - `usage` whenever the provider reports token accounting
//! - one terminal `completed` (or `error`) event

pub mod events;
pub mod state;
pub mod stream;

pub use events::RelayEvent;
pub use state::{Phase, RelayState};
pub use stream::{relay, RelayOptions};
