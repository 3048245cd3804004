//! External read-only interfaces (spec §6): the HTTP read API. The chain
//! write path (`BroadcastTx`) and provider adapters are internal and have
//! no surface here — this module is strictly the read side.

pub mod http;

pub use http::{router, AppState};
