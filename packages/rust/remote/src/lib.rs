//! Client for the remote retrieval service that hosts indexed docs.
//!
//! Documents, partitions, and entity-extraction instructions are managed
//! through a small JSON API authenticated with a bearer token.

pub mod client;
pub mod types;

pub use client::RemoteClient;
pub use types::{
    EntitiesPage, Instruction, NewDocument, NewPartition, Pagination, Partition, PartitionPatch,
};
