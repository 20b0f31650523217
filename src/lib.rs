//! rsbootstrap library — idempotent MongoDB replica-set bootstrap.
//!
//! Brings a freshly started replica set deployment into a usable state:
//! initiates the topology once, reconciles the optional secondary, waits
//! for a primary, provisions the application user, and seeds demo data.
//! Safe to re-run on every container start.

pub mod admin;
pub mod bootstrap;
pub mod config;
pub mod errors;
pub mod logging;
pub mod retry;

pub use admin::memory;
pub use admin::mongo;
