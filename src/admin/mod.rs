//! Administrative session layer.
//!
//! The [`client::ClusterAdmin`] trait defines the control-plane calls the
//! bootstrap consumes; [`mongo::MongoClusterAdmin`] is the production
//! implementation and [`memory::MemoryCluster`] a simulated replica set.

pub mod client;
pub mod memory;
pub mod mongo;
