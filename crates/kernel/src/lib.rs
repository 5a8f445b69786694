//! World kernel: per-world simulation state and the fixed tick graph.
//!
//! # Invariants
//! - A tick is a pure function of the world state, the `reset`/`action`
//!   rows and the shared episode counter.
//! - Worlds only touch their own rows of the export buffers.
//! - Every spawned body's footprint comes from the shared object storage.

pub mod episode;
pub mod exports;
pub mod geometry;
pub mod init;
pub mod rng;
pub mod sim;

use hideseek_common::ObjectId;

pub use episode::EpisodeCounter;
pub use exports::{HostExports, WorldExports};
pub use init::{WorldInit, WorldInitTable};
pub use sim::{Agent, Body, EntityRef, Hit, Sim, Team};

#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    #[error("object storage has no entry for catalog object {0:?}")]
    MissingObject(ObjectId),
}

pub fn crate_info() -> &'static str {
    "hideseek-kernel v0.1.0"
}
