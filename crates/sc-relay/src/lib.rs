//! sc-relay: HTTP relay between streamchat clients and an LLM provider.
//!
//! Accepts a whole conversation, opens a streamed completion upstream and
//! re-frames every text chunk as a `data:` line the moment it arrives.

pub mod config;
pub mod relay;

pub use config::{ConfigError, RelayConfig, UpstreamConfig};
pub use relay::{relay_events, routes, GENERIC_ERROR, MAX_BODY_BYTES};
