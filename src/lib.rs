pub mod api;
pub mod breaker;
pub mod clients;
pub mod config;
pub mod idempotency;
pub mod ledger;
pub mod pipeline;
pub mod resolver;
pub mod signature;
pub mod sync;
