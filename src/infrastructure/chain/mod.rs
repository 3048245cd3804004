//! Chain client abstraction (spec §4.K): only an in-memory mock backing
//! ships with the core. Real gRPC wire transport to a Cosmos SDK chain is
//! out of scope (spec §1).

pub mod mock_client;

pub use mock_client::MockChainClient;
