//! Batched hide & seek simulation manager.
//!
//! Builds one execution backend over many independent worlds and exposes its
//! buffers as typed, shaped tensors for an external training loop.
//!
//! # Invariants
//! - Exactly one backend per [`Manager`], chosen at construction and dropped
//!   before the shared asset tables.
//! - Tensor shapes come only from the export registry, so both backends
//!   agree on them.
//! - `reset` and `action` are the only writable exports; everything else is
//!   written by `step()` or by construction.
//!
//! # Features
//! - `accelerator`: wgpu compute backend. Without it, requesting
//!   [`ExecMode::Accelerator`] fails with
//!   [`ManagerError::AcceleratorUnavailable`].

pub mod backend;
pub mod error;
pub mod manager;
pub mod tensor;

pub use error::ManagerError;
pub use hideseek_common::{Config, ElementType, ExecMode, ExportSlot};
pub use manager::Manager;
pub use tensor::{BufferHandle, BufferHandleMut, Device, Tensor, TensorElement, TensorError, TensorMut};

pub fn crate_info() -> &'static str {
    "hideseek-manager v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("manager"));
    }
}
