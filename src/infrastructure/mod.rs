//! Concrete adapters for the ports defined in `domain::ports`.

pub mod chain;
pub mod core;
pub mod observability;
pub mod providers;
