//! Core domain logic and pipeline orchestration for docsync.
//!
//! This crate ties together discovery, normalization, and the remote client
//! into the end-to-end `sync` workflow, and regenerates table reference
//! pages from schema snapshots.

pub mod local;
pub mod pipeline;
pub mod poll;
pub mod provision;
pub mod reconcile;
pub mod snapshot;
pub mod taxonomy;

pub use pipeline::{
    ProgressReporter, SilentProgress, SyncMode, SyncOptions, SyncResult, run_sync,
    sync_with_client,
};
pub use provision::InstructionScope;
pub use snapshot::{DEFAULT_NAV_GROUP, RegenerateOptions, RegenerateReport, regenerate_tables};
